/// Console rendering of run events and the interactive space prompt.
use filetrend_core::guard::SpaceOperator;
use filetrend_core::model::size::format_size;
use filetrend_core::pipeline::RunEvent;
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing::{info, warn};

/// How the operator answers a manual-cleanup request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    Ask,
    AssumeYes,
    Decline,
}

/// [`SpaceOperator`] backed by the terminal.
///
/// In [`PromptMode::Ask`] the scratch folder is opened in the system file
/// browser and the user is asked on stdin whether to continue.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleOperator {
    mode: PromptMode,
}

impl ConsoleOperator {
    pub fn new(mode: PromptMode) -> Self {
        Self { mode }
    }
}

impl SpaceOperator for ConsoleOperator {
    fn request_manual_cleanup(&self, scratch_dir: &Path, available: Option<u64>, required: u64) -> bool {
        let free = available.map_or_else(|| "unknown".to_string(), format_size);
        match self.mode {
            PromptMode::Decline => {
                warn!("Low disk space ({free} free, {} needed); not prompting", format_size(required));
                false
            }
            PromptMode::AssumeYes => {
                info!("Low disk space ({free} free); continuing as requested");
                true
            }
            PromptMode::Ask => {
                let mut err = io::stderr();
                let _ = writeln!(
                    err,
                    "\nDisk space is low: {free} free, more than {} needed.\nFree some space (scratch folder: {}).",
                    format_size(required),
                    scratch_dir.display()
                );
                if let Err(e) = open::that(scratch_dir) {
                    warn!("Could not open {}: {e}", scratch_dir.display());
                }
                confirm(&mut io::stdin().lock(), &mut err, "Continue processing? [y/N] ").unwrap_or(false)
            }
        }
    }
}

/// Ask a yes/no question. Anything but `y`/`yes` (case-insensitive) is no.
pub fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> io::Result<bool> {
    write!(output, "{question}")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    let answer = line.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// Print one event. Period progress rewrites the current line.
pub fn render<W: Write>(event: &RunEvent, out: &mut W) -> io::Result<()> {
    match event {
        RunEvent::Info(text) => writeln!(out, "\r{text}"),
        RunEvent::ProgressOverall(pct) => writeln!(out, "\rOverall: {pct:>3}%"),
        RunEvent::ProgressPeriod(pct) => {
            write!(out, "\r  period: {pct:>3}%")?;
            out.flush()
        }
        RunEvent::Done { periods_processed } => {
            writeln!(out, "\rFinished: {periods_processed} periods processed")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn confirm_accepts_only_yes() {
        for (input, expected) in [("y\n", true), ("YES\n", true), ("n\n", false), ("\n", false), ("", false)] {
            let mut out = Vec::new();
            let answer = confirm(&mut Cursor::new(input), &mut out, "Go? ").unwrap();
            assert_eq!(answer, expected, "input {input:?}");
            assert_eq!(out, b"Go? ");
        }
    }

    #[test]
    fn unattended_modes_do_not_prompt() {
        let root = Path::new("/nonexistent");
        assert!(!ConsoleOperator::new(PromptMode::Decline).request_manual_cleanup(root, Some(1), 10));
        assert!(ConsoleOperator::new(PromptMode::AssumeYes).request_manual_cleanup(root, None, 10));
    }

    #[test]
    fn render_lines() {
        let mut out = Vec::new();
        render(&RunEvent::Info("hello".into()), &mut out).unwrap();
        render(&RunEvent::ProgressOverall(50), &mut out).unwrap();
        render(&RunEvent::Done { periods_processed: 2 }, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "\rhello\n\rOverall:  50%\n\rFinished: 2 periods processed\n");
    }
}

/// Command-line arguments and their mapping onto a [`RunConfig`].
use crate::console::PromptMode;
use anyhow::{bail, Context};
use clap::Parser;
use filetrend_core::RunConfig;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "filetrend",
    version,
    about = "Inventory tabular files per MMYYYY period folder and classify how they change"
)]
pub struct Args {
    /// Base folder holding the MMYYYY period folders.
    #[arg(value_name = "BASE")]
    pub base: Option<PathBuf>,

    /// Row/size floor below which changes are always "Slight Change".
    #[arg(long, value_name = "N")]
    pub floor: Option<u32>,

    /// JSON configuration file; flags override its values.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Folder in which a `filetrend_scratch` folder is created for archive
    /// extraction. Nothing else under DIR is touched.
    #[arg(long, value_name = "DIR")]
    pub scratch: Option<PathBuf>,

    /// Move existing ledger files and period outputs into a timestamped
    /// folder under DIR before running.
    #[arg(long, value_name = "DIR")]
    pub backup_outputs_to: Option<PathBuf>,

    /// Answer "yes" when asked to free disk space by hand.
    #[arg(long, conflicts_with = "no_prompt")]
    pub yes: bool,

    /// Never prompt; stop the run if disk space cannot be recovered.
    #[arg(long)]
    pub no_prompt: bool,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn prompt_mode(&self) -> PromptMode {
        if self.yes {
            PromptMode::AssumeYes
        } else if self.no_prompt {
            PromptMode::Decline
        } else {
            PromptMode::Ask
        }
    }

    /// Build the run configuration: config file (if any), then flags.
    pub fn to_config(&self) -> anyhow::Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_json_file(path)
                .with_context(|| format!("Cannot load config {}", path.display()))?,
            None => RunConfig::default(),
        };
        if let Some(base) = &self.base {
            config.base_path = base.clone();
        }
        if let Some(floor) = self.floor {
            config.row_floor = floor;
        }
        if let Some(scratch) = &self.scratch {
            config.scratch_root = scratch.clone();
        }
        if !config.base_path.is_dir() {
            bail!("Base folder {} does not exist", config.base_path.display());
        }
        Ok(config)
    }
}

use std::path::PathBuf;

use clap::Parser;
use glance_core::{BlipVariant, DeviceMap, ModelSource, DEFAULT_MODEL_ID};

use crate::shell::ShellConfig;

// Define command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Glance image captioning server")]
pub struct Args {
    /// Use CPU instead of GPU
    #[arg(long)]
    pub cpu: bool,

    /// Hub repository holding the BLIP weights
    #[arg(long, default_value = DEFAULT_MODEL_ID)]
    pub model: String,

    /// Hub revision to fetch the weights from
    #[arg(long)]
    pub revision: Option<String>,

    /// BLIP checkpoint size (base or large), detected from the model id when omitted
    #[arg(long)]
    pub variant: Option<BlipVariant>,

    /// Host address to bind the server to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind the server to
    #[arg(long, default_value_t = 7860)]
    pub port: u16,

    /// Maximum caption length in tokens
    #[arg(long, default_value_t = 50)]
    pub max_length: usize,

    /// Let the model's own default cap the caption length
    #[arg(long, conflicts_with = "max_length")]
    pub no_max_length: bool,

    /// Do not keep copies of uploaded images
    #[arg(long)]
    pub no_persist: bool,

    /// Directory uploaded images are archived in
    #[arg(long, default_value = "uploads")]
    pub upload_dir: PathBuf,

    /// Hide the example gallery
    #[arg(long)]
    pub no_examples: bool,
}

impl Args {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn device_map(&self) -> DeviceMap {
        DeviceMap::from_cpu_flag(self.cpu)
    }

    pub fn model_source(&self) -> ModelSource {
        ModelSource {
            model_id: self.model.clone(),
            revision: self.revision.clone(),
            variant: self.variant,
        }
    }

    pub fn shell_config(&self) -> ShellConfig {
        ShellConfig {
            persist_uploads: !self.no_persist,
            max_length: (!self.no_max_length).then_some(self.max_length),
            show_examples: !self.no_examples,
            upload_dir: self.upload_dir.clone(),
        }
    }
}

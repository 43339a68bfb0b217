use std::path::PathBuf;

use anyhow::{bail, Result};
use glance_core::{CaptionService, MAX_LENGTH_LIMIT};
use image::DynamicImage;
use tracing::{debug, info};

use crate::archive::UploadArchive;

/// Behaviour switches of the captioning form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    /// Keep a copy of every uploaded image in `upload_dir`.
    pub persist_uploads: bool,
    /// Cap on the generated sequence; the model default applies when unset.
    pub max_length: Option<usize>,
    pub show_examples: bool,
    pub upload_dir: PathBuf,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            persist_uploads: true,
            max_length: Some(50),
            show_examples: true,
            upload_dir: PathBuf::from("uploads"),
        }
    }
}

/// Takes one image from the user, archives it if asked to and captions it.
#[derive(Clone)]
pub struct Shell {
    service: CaptionService,
    archive: Option<UploadArchive>,
    max_length: Option<usize>,
}

impl Shell {
    pub fn new(service: CaptionService, config: &ShellConfig) -> Result<Self> {
        if let Some(max_length) = config.max_length.filter(|&max_length| max_length > MAX_LENGTH_LIMIT) {
            bail!("max length {max_length} exceeds the limit of {MAX_LENGTH_LIMIT}");
        }
        let archive = if config.persist_uploads {
            let archive = UploadArchive::new(&config.upload_dir)?;
            info!(dir = %archive.dir().display(), "archiving uploads");
            Some(archive)
        } else {
            None
        };
        Ok(Self {
            service,
            archive,
            max_length: config.max_length,
        })
    }

    pub fn max_length(&self) -> Option<usize> {
        self.max_length
    }

    pub fn submit(&self, image: Option<&DynamicImage>) -> Result<String> {
        self.submit_with(image, self.max_length)
    }

    pub fn submit_with(&self, image: Option<&DynamicImage>, max_length: Option<usize>) -> Result<String> {
        if let (Some(archive), Some(image)) = (&self.archive, image) {
            let path = archive.store(image)?;
            debug!(path = %path.display(), "archived upload");
        }
        self.service.caption(image, max_length)
    }

    /// Runs [`Shell::submit_with`] on the blocking pool so inference does not
    /// stall the async runtime.
    pub async fn submit_blocking(&self, image: Option<DynamicImage>, max_length: Option<usize>) -> Result<String> {
        let shell = self.clone();
        tokio::task::spawn_blocking(move || shell.submit_with(image.as_ref(), max_length)).await?
    }
}

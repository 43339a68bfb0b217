use std::sync::RwLock;

use anyhow::{anyhow, Context, Result};
use image::DynamicImage;
use serde::Serialize;
use tracing::{info, warn};

use crate::shell::Shell;

/// Example photos offered as one-click inputs on the form.
pub const EXAMPLE_IMAGE_URLS: [&str; 3] = [
    "https://images.unsplash.com/photo-1575936123452-b67c3203c357?q=80&w=1000",
    "https://images.unsplash.com/photo-1618588507085-c79565432917?q=80&w=1000",
    "https://images.unsplash.com/photo-1682687220063-4742bd7fd538?q=80&w=1000",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GalleryEntry {
    pub index: usize,
    pub url: String,
    pub caption: Option<String>,
}

/// Example images together with their captions once computed.
pub struct Gallery {
    entries: RwLock<Vec<GalleryEntry>>,
}

impl Gallery {
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = urls
            .into_iter()
            .enumerate()
            .map(|(index, url)| GalleryEntry {
                index,
                url: url.into(),
                caption: None,
            })
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn examples() -> Self {
        Self::new(EXAMPLE_IMAGE_URLS)
    }

    pub fn entries(&self) -> Vec<GalleryEntry> {
        self.entries
            .read()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn url(&self, index: usize) -> Option<String> {
        self.entries
            .read()
            .ok()?
            .get(index)
            .map(|entry| entry.url.clone())
    }

    fn cached(&self, index: usize) -> Option<String> {
        self.entries
            .read()
            .ok()?
            .get(index)
            .and_then(|entry| entry.caption.clone())
    }

    pub async fn fetch_image(client: &reqwest::Client, url: &str) -> Result<DynamicImage> {
        let bytes = client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .with_context(|| format!("failed to fetch example image {url}"))?
            .bytes()
            .await
            .with_context(|| format!("failed to read example image {url}"))?;
        image::load_from_memory(&bytes)
            .with_context(|| format!("failed to decode example image {url}"))
    }

    /// Returns the caption of example `index`, computing and caching it on
    /// first use. The image goes through the same pipeline as an upload.
    pub async fn select(&self, index: usize, shell: &Shell, client: &reqwest::Client) -> Result<String> {
        if let Some(caption) = self.cached(index) {
            return Ok(caption);
        }
        let url = self
            .url(index)
            .ok_or_else(|| anyhow!("no example image at index {index}"))?;
        let image = Self::fetch_image(client, &url).await?;
        let caption = shell.submit_blocking(Some(image), shell.max_length()).await?;

        let mut entries = self
            .entries
            .write()
            .map_err(|_| anyhow!("gallery lock poisoned"))?;
        if let Some(entry) = entries.get_mut(index) {
            entry.caption = Some(caption.clone());
        }
        Ok(caption)
    }

    /// Captions every example up front. Failures are logged and retried on
    /// selection.
    pub async fn warm(&self, shell: &Shell, client: &reqwest::Client) {
        let count = self.entries().len();
        for index in 0..count {
            match self.select(index, shell, client).await {
                Ok(caption) => info!(index, %caption, "cached example caption"),
                Err(e) => warn!(index, "could not caption example: {e:#}"),
            }
        }
    }
}

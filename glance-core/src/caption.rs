use std::sync::Arc;

use anyhow::{Error, Result};
use image::DynamicImage;
use tokenizers::Tokenizer;

/// Returned instead of a caption when the request carries no image.
pub const MISSING_IMAGE_MESSAGE: &str = "Please upload an image to generate a caption.";

/// Something that can describe an image in words.
pub trait Captioner: Send + Sync {
    fn caption_image(&self, image: &DynamicImage, max_length: Option<usize>) -> Result<String>;
}

/// Decodes generated token ids into text, dropping special tokens such as
/// `[DEC]`, `[SEP]` and `[PAD]`.
pub fn decode_caption(tokenizer: &Tokenizer, token_ids: &[u32]) -> Result<String> {
    let text = tokenizer.decode(token_ids, true).map_err(Error::msg)?;
    Ok(text.trim().to_string())
}

/// The captioning service handed to request handlers.
///
/// Holds the loaded model as shared read-only state, so clones are cheap and
/// every clone talks to the same weights.
#[derive(Clone)]
pub struct CaptionService {
    captioner: Arc<dyn Captioner>,
}

impl CaptionService {
    pub fn new(captioner: Arc<dyn Captioner>) -> Self {
        Self { captioner }
    }

    /// Captions `image`, or returns [`MISSING_IMAGE_MESSAGE`] without touching
    /// the model when there is nothing to caption.
    pub fn caption(&self, image: Option<&DynamicImage>, max_length: Option<usize>) -> Result<String> {
        match image {
            Some(image) => self.captioner.caption_image(image, max_length),
            None => Ok(MISSING_IMAGE_MESSAGE.to_string()),
        }
    }
}

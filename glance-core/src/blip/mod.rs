use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Error, Result};
use candle_core::{DType, Device, Module, Tensor};
use candle_transformers::generation::{LogitsProcessor, Sampling};
use candle_transformers::models::{blip, blip_text};
use hf_hub::api::tokio::Api;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::{
    decode_caption, generate, image_to_tensor, select_best_device, Captioner, DeviceMap,
    GenerationParams, Loader, ModelSource, TokenStep,
};

/// BLIP checkpoint sizes with known configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlipVariant {
    Base,
    Large,
}

impl BlipVariant {
    /// Guesses the checkpoint size from a hub repository id.
    pub fn from_model_id(model_id: &str) -> Self {
        if model_id.to_lowercase().contains("large") {
            Self::Large
        } else {
            Self::Base
        }
    }

    pub fn config(self) -> blip::Config {
        match self {
            Self::Base => base_config(),
            Self::Large => blip::Config::image_captioning_large(),
        }
    }

    /// Revision carrying `model.safetensors` for the Salesforce checkpoints.
    pub fn default_revision(self) -> &'static str {
        match self {
            Self::Base => "main",
            Self::Large => "refs/pr/18",
        }
    }
}

impl FromStr for BlipVariant {
    type Err = serde_plain::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_plain::from_str(s)
    }
}

impl fmt::Display for BlipVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = serde_plain::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&name)
    }
}

fn base_config() -> blip::Config {
    let text_config = blip_text::Config {
        vocab_size: 30524,
        hidden_size: 768,
        encoder_hidden_size: 768,
        intermediate_size: 3072,
        projection_dim: 768,
        num_hidden_layers: 12,
        num_attention_heads: 12,
        max_position_embeddings: 512,
        hidden_act: candle_nn::Activation::Gelu,
        layer_norm_eps: 1e-12,
        is_decoder: true,
    };
    let vision_config = blip::VisionConfig {
        hidden_size: 768,
        intermediate_size: 3072,
        projection_dim: 512,
        num_hidden_layers: 12,
        num_attention_heads: 12,
        image_size: 384,
        patch_size: 16,
        hidden_act: candle_nn::Activation::Gelu,
        layer_norm_eps: 1e-5,
    };
    blip::Config {
        text_config,
        vision_config,
        projection_dim: 512,
        image_text_hidden_size: 256,
    }
}

pub struct BlipModel {
    device: Device,
    image_size: usize,
    tokenizer: Tokenizer,
    // The text decoder keeps a kv cache, so one caption runs at a time.
    model: Mutex<blip::BlipForConditionalGeneration>,
}

/// Greedy decoding step over BLIP's text decoder for one image.
struct BlipStep<'a> {
    decoder: &'a mut blip_text::TextLMHeadModel,
    image_embeds: &'a Tensor,
    device: &'a Device,
    logits_processor: LogitsProcessor,
}

impl TokenStep for BlipStep<'_> {
    fn next_token(&mut self, tokens: &[u32], start: usize) -> Result<u32> {
        let input_ids = Tensor::new(&tokens[start..], self.device)?.unsqueeze(0)?;
        let logits = self.decoder.forward(&input_ids, self.image_embeds)?;
        let logits = logits.squeeze(0)?;
        let logits = logits.get(logits.dim(0)? - 1)?;
        Ok(self.logits_processor.sample(&logits)?)
    }
}

impl BlipModel {
    pub fn new(
        model: blip::BlipForConditionalGeneration,
        config: &blip::Config,
        tokenizer: Tokenizer,
        device: Device,
    ) -> Self {
        Self {
            device,
            image_size: config.vision_config.image_size,
            tokenizer,
            model: Mutex::new(model),
        }
    }
}

impl Captioner for BlipModel {
    fn caption_image(&self, image: &DynamicImage, max_length: Option<usize>) -> Result<String> {
        let pixels = image_to_tensor(image, self.image_size)?.to_device(&self.device)?;

        let mut model = self
            .model
            .lock()
            .map_err(|_| anyhow!("BLIP model lock poisoned"))?;
        let image_embeds = model.vision_model().forward(&pixels.unsqueeze(0)?)?;

        let decoder = model.text_decoder();
        decoder.reset_kv_cache();
        let mut step = BlipStep {
            decoder,
            image_embeds: &image_embeds,
            device: &self.device,
            logits_processor: LogitsProcessor::from_sampling(0, Sampling::ArgMax),
        };
        let params = GenerationParams::blip(max_length);
        let tokens = generate(&mut step, params)?;
        debug!(tokens = tokens.len(), max_length = params.max_length, "generated caption tokens");

        decode_caption(&self.tokenizer, &tokens)
    }
}

pub struct BlipLoader;

impl Loader for BlipLoader {
    type Model = BlipModel;

    async fn load(source: ModelSource, api: Api, device_map: DeviceMap) -> Result<Self::Model> {
        let device = select_best_device(device_map).context("failed to set up device")?;
        let variant = source.variant();
        info!(model = %source.model_id, revision = %source.revision(), %variant, "fetching BLIP weights");

        // Weights and tokenizer come from the same revision.
        let repo = api.repo(hub_repo(&source));
        let model_file = repo
            .get("model.safetensors")
            .await
            .context("failed to get BLIP model file")?;
        let tokenizer_file = repo
            .get("tokenizer.json")
            .await
            .context("failed to get BLIP tokenizer")?;

        let vb = unsafe {
            candle_nn::VarBuilder::from_mmaped_safetensors(&[model_file], DType::F32, &device)
                .context("failed to build BLIP var builder")?
        };
        let config = variant.config();
        let model = blip::BlipForConditionalGeneration::new(&config, vb)
            .context("failed to load BLIP model")?;
        let tokenizer = Tokenizer::from_file(tokenizer_file)
            .map_err(Error::msg)
            .context("failed to load BLIP tokenizer")?;

        info!(model = %source.model_id, "BLIP model ready");
        Ok(BlipModel::new(model, &config, tokenizer, device))
    }
}

fn hub_repo(source: &ModelSource) -> hf_hub::Repo {
    hf_hub::Repo::with_revision(
        source.model_id.clone(),
        hf_hub::RepoType::Model,
        source.revision(),
    )
}

use std::future::Future;

use anyhow::Result;
use hf_hub::api::tokio::Api;

use crate::{BlipVariant, Captioner, DeviceMap};

/// Hub repository holding the weights served by default.
pub const DEFAULT_MODEL_ID: &str = "Salesforce/blip-image-captioning-base";

/// Names the pretrained weights to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSource {
    pub model_id: String,
    /// Hub revision; the variant's default when unset.
    pub revision: Option<String>,
    /// Architecture override; detected from `model_id` when unset.
    pub variant: Option<BlipVariant>,
}

impl ModelSource {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            revision: None,
            variant: None,
        }
    }

    pub fn variant(&self) -> BlipVariant {
        self.variant
            .unwrap_or_else(|| BlipVariant::from_model_id(&self.model_id))
    }

    pub fn revision(&self) -> String {
        self.revision
            .clone()
            .unwrap_or_else(|| self.variant().default_revision().to_string())
    }
}

impl Default for ModelSource {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_ID)
    }
}

pub trait Loader {
    type Model: Captioner;

    fn load(
        source: ModelSource,
        api: Api,
        device_map: DeviceMap,
    ) -> impl Future<Output = Result<Self::Model>>
    where
        Self: Sized;
}

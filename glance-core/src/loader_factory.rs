use anyhow::{anyhow, Result};
use hf_hub::api::tokio::Api;
use std::sync::Arc;
use tracing::info;

use crate::{BlipLoader, Captioner, DeviceMap, Loader, ModelSource};

/// Enum of supported model architectures
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModelType {
    Blip,
}

impl ModelType {
    /// Detect model type from the source, trusting an explicit variant
    pub fn detect(source: &ModelSource) -> Option<Self> {
        if source.variant.is_some() || source.model_id.to_uppercase().contains("BLIP") {
            Some(ModelType::Blip)
        } else {
            None
        }
    }
}

/// Load a captioner for `source`, picking the loader from the detected model type
pub async fn load_captioner(
    source: ModelSource,
    api: Api,
    device_map: DeviceMap,
) -> Result<Arc<dyn Captioner>> {
    let model_type = ModelType::detect(&source)
        .ok_or_else(|| anyhow!("Unsupported model type: {}", source.model_id))?;

    info!(
        model = %source.model_id,
        ?model_type,
        variant = %source.variant(),
        "loading model"
    );

    match model_type {
        ModelType::Blip => {
            let model = BlipLoader::load(source, api, device_map).await?;
            Ok(Arc::new(model))
        }
    }
}

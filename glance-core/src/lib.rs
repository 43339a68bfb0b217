#[cfg(feature = "mkl")]
extern crate intel_mkl_src;

#[cfg(feature = "accelerate")]
extern crate accelerate_src;

pub mod device_map;
pub mod generation;
pub mod loader;
mod loader_factory;
mod util;

mod blip;
mod caption;

pub use blip::{BlipLoader, BlipModel, BlipVariant};
pub use caption::*;
pub use device_map::*;
pub use generation::*;
pub use loader::*;
pub use loader_factory::*;
pub use util::*;

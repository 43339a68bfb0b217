use anyhow::Result;
use candle_core::utils::{cuda_is_available, metal_is_available};
use candle_core::{DType, Device, Tensor};
use image::{imageops::FilterType, DynamicImage};
use tracing::info;

use crate::DeviceMap;

/// Per-channel normalisation the BLIP vision encoder was trained with.
const IMAGE_MEAN: [f32; 3] = [0.48145466, 0.4578275, 0.40821073];
const IMAGE_STD: [f32; 3] = [0.26862954, 0.261_302_6, 0.275_777_1];

pub fn select_best_device(device_map: DeviceMap) -> Result<Device> {
    match device_map {
        DeviceMap::ForceCpu => Ok(Device::Cpu),
        DeviceMap::Ordinal(ordinal) if cuda_is_available() => Ok(Device::new_cuda(ordinal)?),
        DeviceMap::Ordinal(ordinal) if metal_is_available() => Ok(Device::new_metal(ordinal)?),
        DeviceMap::Ordinal(_) => {
            #[cfg(all(target_os = "macos", target_arch = "aarch64"))]
            {
                info!("running on CPU, to run on GPU(metal), build with `--features metal`");
            }
            #[cfg(not(all(target_os = "macos", target_arch = "aarch64")))]
            {
                info!("running on CPU, to run on GPU, build with `--features cuda`");
            }
            Ok(Device::Cpu)
        }
    }
}

/// Converts an image into a normalised tensor with shape (3, size, size).
///
/// The whole image is stretched onto the square with a bicubic filter, nothing
/// is cropped. It is converted to RGB first, so any format the `image` crate
/// decodes is accepted.
pub fn image_to_tensor(img: &DynamicImage, size: usize) -> Result<Tensor> {
    let img = img
        .resize_exact(size as u32, size as u32, FilterType::CatmullRom)
        .to_rgb8();
    let data = Tensor::from_vec(img.into_raw(), (size, size, 3), &Device::Cpu)?.permute((2, 0, 1))?;
    let mean = Tensor::new(&IMAGE_MEAN, &Device::Cpu)?.reshape((3, 1, 1))?;
    let std = Tensor::new(&IMAGE_STD, &Device::Cpu)?.reshape((3, 1, 1))?;
    let normalised = (data.to_dtype(DType::F32)? / 255.)?
        .broadcast_sub(&mean)?
        .broadcast_div(&std)?;
    Ok(normalised)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, RgbaImage};

    #[test]
    fn tensor_has_square_channel_first_shape() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(20, 10));
        let tensor = image_to_tensor(&img, 384).unwrap();
        assert_eq!(tensor.dims3().unwrap(), (3, 384, 384));
        assert_eq!(tensor.dtype(), DType::F32);
    }

    #[test]
    fn white_pixels_are_normalised_per_channel() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([255, 255, 255])));
        let values = image_to_tensor(&img, 4)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();
        assert_eq!(values.len(), 3 * 4 * 4);
        for channel in 0..3 {
            let expected = (1.0 - IMAGE_MEAN[channel]) / IMAGE_STD[channel];
            let got = values[channel * 16];
            assert!((got - expected).abs() < 1e-4, "channel {channel}: {got} vs {expected}");
        }
    }

    #[test]
    fn edges_of_wide_images_are_kept() {
        // Red strip along the left edge of an otherwise black 300x100 image.
        let mut img = RgbImage::new(300, 100);
        for (x, _, pixel) in img.enumerate_pixels_mut() {
            if x < 30 {
                *pixel = Rgb([255, 0, 0]);
            }
        }
        let size = 30;
        let values = image_to_tensor(&DynamicImage::ImageRgb8(img), size)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();

        let plane = size * size;
        let middle_row = size / 2 * size;
        let red = values[middle_row];
        let green = values[plane + middle_row];
        let red_at_right = values[middle_row + size - 1];
        assert!(red > 1.5, "left edge lost its red: {red}");
        assert!(green < -1.0, "left edge picked up green: {green}");
        assert!(red_at_right < -1.0, "right edge should stay black: {red_at_right}");
    }

    #[test]
    fn alpha_channel_is_dropped() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(5, 7));
        let tensor = image_to_tensor(&img, 16).unwrap();
        assert_eq!(tensor.dims3().unwrap(), (3, 16, 16));
    }

    #[test]
    fn forced_cpu_selects_cpu() {
        let device = select_best_device(DeviceMap::ForceCpu).unwrap();
        assert!(device.is_cpu());
    }
}

//! Image decoding into RGB frames

use contracts::{ImageData, ImageFormat};
use image::ImageFormat as CodecFormat;

use crate::error::{IngestionError, Result};

/// Decode any supported container (format sniffed from magic bytes)
pub fn decode_image(bytes: &[u8], origin: &str) -> Result<ImageData> {
    let image = image::load_from_memory(bytes).map_err(|e| IngestionError::decode(origin, e))?;
    Ok(to_rgb(image))
}

/// Decode one JPEG (MJPEG frame)
pub fn decode_jpeg(bytes: &[u8], origin: &str) -> Result<ImageData> {
    let image = image::load_from_memory_with_format(bytes, CodecFormat::Jpeg)
        .map_err(|e| IngestionError::decode(origin, e))?;
    Ok(to_rgb(image))
}

fn to_rgb(image: image::DynamicImage) -> ImageData {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    ImageData::new(width, height, ImageFormat::Rgb8, rgb.into_raw())
}

//! Raster image handler: PNG, JPEG and BMP via the `image` crate.
//!
//! Every declared format is both readable and writable, so the handler
//! contributes a full mesh of edges between the three.
//!
//! ## Why spawn_blocking?
//!
//! Decoding and re-encoding a large raster is CPU-bound and can take tens of
//! milliseconds. Running it on the blocking pool keeps the runtime free to
//! report progress while a hop is in flight.

use crate::error::HandlerError;
use crate::format::{FileRecord, FormatDescriptor};
use crate::handler::FormatHandler;
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

pub struct ImageHandler;

impl ImageHandler {
    pub const NAME: &'static str = "image";
}

#[async_trait]
impl FormatHandler for ImageHandler {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn init(&self) -> Result<Vec<FormatDescriptor>, HandlerError> {
        Ok(vec![
            FormatDescriptor::new("Portable Network Graphics", "png", "png", "image/png")
                .readable()
                .writable()
                .internal("Png")
                .lossless(true),
            FormatDescriptor::new("JPEG Image", "jpeg", "jpg", "image/jpeg")
                .readable()
                .writable()
                .internal("Jpeg")
                .lossless(false),
            FormatDescriptor::new("Windows Bitmap", "bmp", "bmp", "image/bmp")
                .readable()
                .writable()
                .internal("Bmp")
                .lossless(true),
        ])
    }

    async fn convert(
        &self,
        files: Vec<FileRecord>,
        input: &FormatDescriptor,
        output: &FormatDescriptor,
        _args: Option<&[String]>,
    ) -> Result<Vec<FileRecord>, HandlerError> {
        let from = image_format(input).ok_or_else(|| unsupported(input, output))?;
        let to = image_format(output).ok_or_else(|| unsupported(input, output))?;
        let extension = output.extension.clone();

        tokio::task::spawn_blocking(move || {
            files
                .iter()
                .map(|file| -> Result<FileRecord, HandlerError> {
                    let bytes = transcode(&file.bytes, from, to)?;
                    debug!(
                        "image: {} {:?} → {:?} ({} → {} bytes)",
                        file.name,
                        from,
                        to,
                        file.bytes.len(),
                        bytes.len()
                    );
                    Ok(FileRecord::new(file.renamed_with_extension(&extension), bytes))
                })
                .collect()
        })
        .await
        .map_err(|e| HandlerError::Encode(format!("image task panicked: {e}")))?
    }
}

fn unsupported(input: &FormatDescriptor, output: &FormatDescriptor) -> HandlerError {
    HandlerError::Unsupported {
        from: input.format.clone(),
        to: output.format.clone(),
    }
}

fn image_format(desc: &FormatDescriptor) -> Option<ImageFormat> {
    match desc.format.as_str() {
        "png" => Some(ImageFormat::Png),
        "jpeg" | "jpg" => Some(ImageFormat::Jpeg),
        "bmp" => Some(ImageFormat::Bmp),
        _ => None,
    }
}

fn transcode(bytes: &[u8], from: ImageFormat, to: ImageFormat) -> Result<Vec<u8>, HandlerError> {
    let img = image::load_from_memory_with_format(bytes, from)
        .map_err(|e| HandlerError::Decode(e.to_string()))?;

    // The JPEG encoder rejects alpha channels.
    let img = match to {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()),
        _ => img,
    };

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), to)
        .map_err(|e| HandlerError::Encode(e.to_string()))?;
    Ok(buf)
}

use std::io::Cursor;

use image::{ImageFormat, ImageReader};

/// Format and dimensions read from an image header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedImage {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl DecodedImage {
    /// Upper-case format name, e.g. `JPEG`, `PNG`, `WEBP`.
    pub fn format_name(&self) -> String {
        format!("{:?}", self.format).to_uppercase()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("cannot identify image format")]
    UnknownFormat,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Identify the image format from its content and read its dimensions.
///
/// Only the header is parsed; pixel data is never decoded.
pub fn probe(bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let format = reader.format().ok_or(DecodeError::UnknownFormat)?;
    let (width, height) = reader.into_dimensions()?;

    Ok(DecodedImage {
        format,
        width,
        height,
    })
}

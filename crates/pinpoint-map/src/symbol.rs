use std::fs;
use std::path::Path;
use std::sync::Arc;

use exn::ResultExt;
use image::ImageFormat;
use serde::Serialize;

use crate::Error;

/// How a point graphic is drawn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Symbol {
    /// Built-in vector marker.
    Simple(SimpleMarkerSymbol),
    /// Marker drawn from an image.
    Picture(PictureMarkerSymbol),
}

impl Symbol {
    /// The default red pin.
    #[must_use]
    pub const fn pin() -> Self {
        Self::Simple(SimpleMarkerSymbol {
            color: [0xe0, 0x1b, 0x24, 0xff],
            size: 24.0,
        })
    }
}

/// Vector pin marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimpleMarkerSymbol {
    /// RGBA.
    pub color: [u8; 4],
    pub size: f32,
}

/// Image-backed marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PictureMarkerSymbol {
    pub width: u32,
    pub height: u32,
    #[serde(skip)]
    image: Arc<[u8]>,
}

impl PictureMarkerSymbol {
    /// Decode a PNG image. The encoded bytes are kept for rendering.
    pub fn from_png(bytes: Vec<u8>) -> exn::Result<Self, Error> {
        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Png)
            .or_raise(|| Error::Asset("decode PNG".into()))?;
        Ok(Self {
            width: decoded.width(),
            height: decoded.height(),
            image: bytes.into(),
        })
    }

    /// Read and decode a PNG file.
    pub fn load(path: &Path) -> exn::Result<Self, Error> {
        let bytes =
            fs::read(path).or_raise(|| Error::Asset(format!("read {}", path.display())))?;
        Self::from_png(bytes)
    }

    #[must_use]
    pub fn image(&self) -> &[u8] {
        &self.image
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{Rgba, RgbaImage};

    use super::*;

    fn encoded_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |_, _| Rgba([0xe0, 0x1b, 0x24, 0xff]));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn reads_png_dimensions() {
        let bytes = encoded_png(48, 64);
        let len = bytes.len();
        let symbol = PictureMarkerSymbol::from_png(bytes).unwrap();
        assert_eq!((symbol.width, symbol.height), (48, 64));
        assert_eq!(symbol.image().len(), len);
    }

    #[test]
    fn rejects_non_png() {
        assert!(PictureMarkerSymbol::from_png(b"GIF89a not a png at all".to_vec()).is_err());
        assert!(PictureMarkerSymbol::from_png(Vec::new()).is_err());
    }

    #[test]
    fn rejects_truncated_png() {
        let mut bytes = encoded_png(48, 64);
        // Signature and IHDR survive, image data does not.
        bytes.truncate(33);
        assert!(PictureMarkerSymbol::from_png(bytes).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let path = std::env::temp_dir().join("pinpoint-definitely-missing-pin.png");
        assert!(PictureMarkerSymbol::load(&path).is_err());
    }
}

use std::path::Path;

use image::{Rgba, RgbaImage};

use crate::world::Color;

use super::{SaveError, SaveReader, SaveWriter, Tag};

pub const THUMBNAIL_WIDTH: u32 = 250;
pub const THUMBNAIL_HEIGHT: u32 = 188;

/// Save-slot preview image stored as RGB565 pixels, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    width: u32,
    height: u32,
    pixels: Vec<u16>,
}

impl Thumbnail {
    pub fn new(width: u32, height: u32, pixels: Vec<u16>) -> Option<Self> {
        (pixels.len() == (width as usize) * (height as usize)).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    /// Nearest-neighbour downscale of an RGBA8 frame into a thumbnail.
    pub fn from_rgba(
        source_width: u32,
        source_height: u32,
        rgba: &[u8],
        width: u32,
        height: u32,
    ) -> Option<Self> {
        let expected = (source_width as usize) * (source_height as usize) * 4;
        if source_width == 0 || source_height == 0 || rgba.len() != expected {
            return None;
        }
        let mut pixels = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            let sy = (y as u64 * source_height as u64 / height.max(1) as u64) as usize;
            for x in 0..width {
                let sx = (x as u64 * source_width as u64 / width.max(1) as u64) as usize;
                let offset = (sy * source_width as usize + sx) * 4;
                let color = Color::new(rgba[offset], rgba[offset + 1], rgba[offset + 2]);
                pixels.push(color.to_rgb565());
            }
        }
        Self::new(width, height, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    pub fn to_rgba_image(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            let value = self.pixels[(y * self.width + x) as usize];
            let color = Color::from_rgb565(value);
            Rgba([color.r, color.g, color.b, 255])
        })
    }

    pub fn save_png(&self, path: &Path) -> Result<(), SaveError> {
        self.to_rgba_image()
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|source| SaveError::ThumbnailExport {
                path: path.to_path_buf(),
                source,
            })
    }

    pub fn write(&self, sink: &mut SaveWriter) {
        sink.begin_section(Tag::SCREENSHOT);
        sink.write_u32(self.width);
        sink.write_u32(self.height);
        for pixel in &self.pixels {
            sink.write_u16(*pixel);
        }
        sink.end_section();
    }

    pub(crate) fn read(source: &mut SaveReader<'_>) -> Result<Self, SaveError> {
        source.begin_section(Tag::SCREENSHOT)?;
        let width = source.read_u32()?;
        let height = source.read_u32()?;
        let count = (width as usize).saturating_mul(height as usize);
        if count.saturating_mul(2) != source.remaining() {
            return Err(SaveError::invalid_format(format!(
                "thumbnail {width}x{height} does not match section size"
            )));
        }
        let mut pixels = Vec::with_capacity(count);
        for _ in 0..count {
            pixels.push(source.read_u16()?);
        }
        source.end_section()?;
        Ok(Self {
            width,
            height,
            pixels,
        })
    }
}

/// Reads the leading thumbnail section of a save stream.
pub fn read_thumbnail(bytes: &[u8]) -> Result<Thumbnail, SaveError> {
    let mut source = SaveReader::new(bytes)?;
    Thumbnail::read(&mut source)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn checker(width: u32, height: u32) -> Vec<u8> {
        let mut rgba = Vec::new();
        for y in 0..height {
            for x in 0..width {
                let on = (x + y) % 2 == 0;
                let value = if on { 255 } else { 0 };
                rgba.extend_from_slice(&[value, 0, 0, 255]);
            }
        }
        rgba
    }

    #[test]
    fn downscale_produces_requested_size() {
        let rgba = checker(640, 480);
        let thumbnail =
            Thumbnail::from_rgba(640, 480, &rgba, THUMBNAIL_WIDTH, THUMBNAIL_HEIGHT)
                .expect("thumbnail");
        assert_eq!(thumbnail.pixels().len(), (250 * 188) as usize);
        assert_eq!(thumbnail.pixels()[0], Color::new(255, 0, 0).to_rgb565());
    }

    #[test]
    fn mismatched_source_buffer_is_rejected() {
        assert!(Thumbnail::from_rgba(4, 4, &[0; 12], 2, 2).is_none());
    }

    #[test]
    fn thumbnail_section_is_read_back_and_exported() {
        let thumbnail = Thumbnail::new(2, 1, vec![0xf800, 0x001f]).expect("thumbnail");
        let mut sink = SaveWriter::new();
        thumbnail.write(&mut sink);
        let bytes = sink.finish();

        let read = read_thumbnail(&bytes).expect("read");
        assert_eq!(read, thumbnail);

        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("thumb.png");
        read.save_png(&path).expect("png");
        let decoded = image::open(&path).expect("decode").to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(decoded.get_pixel(1, 0), &Rgba([0, 0, 255, 255]));
    }
}

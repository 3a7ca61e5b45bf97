use crate::savegame::{SaveError, SaveReader, SaveWriter};

use super::{Point, PoolKind, PoolObject};

/// A 2D image resource, drawn as scene background, object state or layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    pub filename: String,
    pub pos: Point,
    pub width: u32,
    pub height: u32,
    pub current_image: u32,
}

impl Bitmap {
    pub fn new(filename: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            filename: filename.into(),
            pos: Point::default(),
            width,
            height,
            current_image: 1,
        }
    }
}

impl PoolObject for Bitmap {
    const KIND: PoolKind = PoolKind::Bitmap;

    fn save_record(&self, sink: &mut SaveWriter) {
        sink.write_string(&self.filename);
        self.pos.write(sink);
        sink.write_u32(self.width);
        sink.write_u32(self.height);
        sink.write_u32(self.current_image);
    }

    fn restore_record(source: &mut SaveReader<'_>) -> Result<Self, SaveError> {
        Ok(Self {
            filename: source.read_string()?,
            pos: Point::read(source)?,
            width: source.read_u32()?,
            height: source.read_u32()?,
            current_image: source.read_u32()?,
        })
    }
}

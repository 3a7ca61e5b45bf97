use crate::savegame::{SaveError, SaveReader, SaveWriter};

use super::{Bitmap, Id, PoolKind, PoolObject, World};

/// A scene-bound sound handle. Only the Monkey4 variant pools these.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolSound {
    pub filename: String,
    pub volume: i32,
    pub balance: i32,
    pub looping: bool,
    pub playing: bool,
}

impl PoolSound {
    pub fn new(filename: impl Into<String>, volume: i32, looping: bool) -> Self {
        Self {
            filename: filename.into(),
            volume,
            balance: 0,
            looping,
            playing: true,
        }
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }
}

impl PoolObject for PoolSound {
    const KIND: PoolKind = PoolKind::PoolSound;

    fn save_record(&self, sink: &mut SaveWriter) {
        sink.write_string(&self.filename);
        sink.write_i32(self.volume);
        sink.write_i32(self.balance);
        sink.write_bool(self.looping);
        sink.write_bool(self.playing);
    }

    fn restore_record(source: &mut SaveReader<'_>) -> Result<Self, SaveError> {
        Ok(Self {
            filename: source.read_string()?,
            volume: source.read_i32()?,
            balance: source.read_i32()?,
            looping: source.read_bool()?,
            playing: source.read_bool()?,
        })
    }
}

/// Sorted 2D layer drawn over the scene. Only the Monkey4 variant pools these.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub bitmap: Option<Id<Bitmap>>,
    pub sort_order: i32,
    pub frame: u32,
}

impl PoolObject for Layer {
    const KIND: PoolKind = PoolKind::Layer;

    fn save_record(&self, sink: &mut SaveWriter) {
        sink.write_id(self.bitmap);
        sink.write_i32(self.sort_order);
        sink.write_u32(self.frame);
    }

    fn restore_record(source: &mut SaveReader<'_>) -> Result<Self, SaveError> {
        Ok(Self {
            bitmap: source.read_id()?,
            sort_order: source.read_i32()?,
            frame: source.read_u32()?,
        })
    }

    fn resolve_references(&self, world: &World) -> Result<(), SaveError> {
        world.bitmaps.resolve(Self::KIND, self.bitmap)
    }
}

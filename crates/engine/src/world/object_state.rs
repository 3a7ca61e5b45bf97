use crate::savegame::{SaveError, SaveReader, SaveWriter};

use super::{Bitmap, Id, PoolKind, PoolObject, World};

/// Compositing layer an object state is drawn in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateLayer {
    Background,
    State,
    Underlay,
    Overlay,
}

impl StateLayer {
    fn to_u8(self) -> u8 {
        match self {
            StateLayer::Background => 0,
            StateLayer::State => 1,
            StateLayer::Underlay => 2,
            StateLayer::Overlay => 3,
        }
    }

    fn from_u8(value: u8) -> Result<Self, SaveError> {
        match value {
            0 => Ok(StateLayer::Background),
            1 => Ok(StateLayer::State),
            2 => Ok(StateLayer::Underlay),
            3 => Ok(StateLayer::Overlay),
            other => Err(SaveError::invalid_format(format!(
                "invalid object state layer {other}"
            ))),
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "background" => Some(StateLayer::Background),
            "state" => Some(StateLayer::State),
            "underlay" => Some(StateLayer::Underlay),
            "overlay" => Some(StateLayer::Overlay),
            _ => None,
        }
    }
}

/// A bitmap overlay attached to one setup of a set (doors, lamps, props).
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectState {
    pub setup: u32,
    pub layer: StateLayer,
    pub bitmap: Option<Id<Bitmap>>,
    pub zbitmap: Option<Id<Bitmap>>,
    pub visible: bool,
}

impl ObjectState {
    pub fn new(setup: u32, layer: StateLayer, bitmap: Option<Id<Bitmap>>) -> Self {
        Self {
            setup,
            layer,
            bitmap,
            zbitmap: None,
            visible: true,
        }
    }
}

impl PoolObject for ObjectState {
    const KIND: PoolKind = PoolKind::ObjectState;

    fn save_record(&self, sink: &mut SaveWriter) {
        sink.write_u32(self.setup);
        sink.write_u8(self.layer.to_u8());
        sink.write_id(self.bitmap);
        sink.write_id(self.zbitmap);
        sink.write_bool(self.visible);
    }

    fn restore_record(source: &mut SaveReader<'_>) -> Result<Self, SaveError> {
        Ok(Self {
            setup: source.read_u32()?,
            layer: StateLayer::from_u8(source.read_u8()?)?,
            bitmap: source.read_id()?,
            zbitmap: source.read_id()?,
            visible: source.read_bool()?,
        })
    }

    fn resolve_references(&self, world: &World) -> Result<(), SaveError> {
        world.bitmaps.resolve(Self::KIND, self.bitmap)?;
        world.bitmaps.resolve(Self::KIND, self.zbitmap)
    }
}

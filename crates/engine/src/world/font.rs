use crate::savegame::{SaveError, SaveReader, SaveWriter};

use super::{PoolKind, PoolObject};

const DEFAULT_LINE_HEIGHT: u32 = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Font {
    name: String,
    line_height: u32,
}

impl Font {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_line_height(name, DEFAULT_LINE_HEIGHT)
    }

    pub fn with_line_height(name: impl Into<String>, line_height: u32) -> Self {
        Self {
            name: name.into(),
            line_height,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn line_height(&self) -> u32 {
        self.line_height
    }
}

impl PoolObject for Font {
    const KIND: PoolKind = PoolKind::Font;

    fn save_record(&self, sink: &mut SaveWriter) {
        sink.write_string(&self.name);
        sink.write_u32(self.line_height);
    }

    fn restore_record(source: &mut SaveReader<'_>) -> Result<Self, SaveError> {
        Ok(Self {
            name: source.read_string()?,
            line_height: source.read_u32()?,
        })
    }
}

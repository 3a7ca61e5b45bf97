use crate::savegame::{SaveError, SaveReader, SaveWriter};

use super::{Color, Font, Id, Point, PoolKind, PoolObject, World};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Justify {
    #[default]
    Left,
    Center,
    Right,
}

impl Justify {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Justify::Left => 0,
            Justify::Center => 1,
            Justify::Right => 2,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Result<Self, SaveError> {
        match value {
            0 => Ok(Justify::Left),
            1 => Ok(Justify::Center),
            2 => Ok(Justify::Right),
            other => Err(SaveError::invalid_format(format!(
                "invalid justification {other}"
            ))),
        }
    }
}

/// Placement and look of on-screen text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub pos: Point,
    pub width: i32,
    pub height: i32,
    pub fg_color: Color,
    pub font: Option<Id<Font>>,
    pub justify: Justify,
    /// Milliseconds on screen; 0 keeps the text until it is removed.
    pub duration_ms: i32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            pos: Point::default(),
            width: 0,
            height: 0,
            fg_color: Color::WHITE,
            font: None,
            justify: Justify::Left,
            duration_ms: 0,
        }
    }
}

impl TextStyle {
    pub(crate) fn write(&self, sink: &mut SaveWriter) {
        self.pos.write(sink);
        sink.write_i32(self.width);
        sink.write_i32(self.height);
        self.fg_color.write(sink);
        sink.write_id(self.font);
        sink.write_u8(self.justify.to_u8());
        sink.write_i32(self.duration_ms);
    }

    pub(crate) fn read(source: &mut SaveReader<'_>) -> Result<Self, SaveError> {
        Ok(Self {
            pos: Point::read(source)?,
            width: source.read_i32()?,
            height: source.read_i32()?,
            fg_color: Color::read(source)?,
            font: source.read_id()?,
            justify: Justify::from_u8(source.read_u8()?)?,
            duration_ms: source.read_i32()?,
        })
    }
}

/// Default styles scripts start from for each kind of text.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TextDefaults {
    pub say_line: TextStyle,
    pub print_line: TextStyle,
    pub blast_text: TextStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextObject {
    pub text: String,
    pub style: TextStyle,
    pub elapsed_ms: i32,
    pub blast: bool,
}

impl TextObject {
    pub fn new(text: impl Into<String>, style: TextStyle) -> Self {
        Self {
            text: text.into(),
            style,
            elapsed_ms: 0,
            blast: false,
        }
    }

    /// Advances the display timer; returns `false` once a timed text has expired.
    pub fn update(&mut self, frame_time_ms: u32) -> bool {
        if self.style.duration_ms <= 0 {
            return true;
        }
        self.elapsed_ms = self
            .elapsed_ms
            .saturating_add(i32::try_from(frame_time_ms).unwrap_or(i32::MAX));
        self.elapsed_ms < self.style.duration_ms
    }
}

impl PoolObject for TextObject {
    const KIND: PoolKind = PoolKind::TextObject;

    fn save_record(&self, sink: &mut SaveWriter) {
        sink.write_string(&self.text);
        self.style.write(sink);
        sink.write_i32(self.elapsed_ms);
        sink.write_bool(self.blast);
    }

    fn restore_record(source: &mut SaveReader<'_>) -> Result<Self, SaveError> {
        Ok(Self {
            text: source.read_string()?,
            style: TextStyle::read(source)?,
            elapsed_ms: source.read_i32()?,
            blast: source.read_bool()?,
        })
    }

    fn resolve_references(&self, world: &World) -> Result<(), SaveError> {
        world.fonts.resolve(Self::KIND, self.style.font)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timed_text_expires_after_duration() {
        let mut text = TextObject::new(
            "hello",
            TextStyle {
                duration_ms: 100,
                ..TextStyle::default()
            },
        );
        assert!(text.update(60));
        assert!(!text.update(60));
    }

    #[test]
    fn untimed_text_never_expires() {
        let mut text = TextObject::new("menu", TextStyle::default());
        assert!(text.update(u32::MAX / 2));
    }

    #[test]
    fn oversized_frame_time_still_expires_timed_text() {
        let mut text = TextObject::new(
            "hello",
            TextStyle {
                duration_ms: 100,
                ..TextStyle::default()
            },
        );
        assert!(!text.update(u32::MAX));
    }
}

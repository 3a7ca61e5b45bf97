use crate::savegame::{SaveError, SaveReader, SaveWriter};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(self, other: Vec3) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub(crate) fn write(self, sink: &mut SaveWriter) {
        sink.write_f32(self.x);
        sink.write_f32(self.y);
        sink.write_f32(self.z);
    }

    pub(crate) fn read(source: &mut SaveReader<'_>) -> Result<Self, SaveError> {
        Ok(Self {
            x: source.read_f32()?,
            y: source.read_f32()?,
            z: source.read_f32()?,
        })
    }
}

/// Screen-space position in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub(crate) fn write(self, sink: &mut SaveWriter) {
        sink.write_i32(self.x);
        sink.write_i32(self.y);
    }

    pub(crate) fn read(source: &mut SaveReader<'_>) -> Result<Self, SaveError> {
        Ok(Self {
            x: source.read_i32()?,
            y: source.read_i32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const WHITE: Color = Color::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub(crate) fn write(self, sink: &mut SaveWriter) {
        sink.write_u8(self.r);
        sink.write_u8(self.g);
        sink.write_u8(self.b);
    }

    pub(crate) fn read(source: &mut SaveReader<'_>) -> Result<Self, SaveError> {
        Ok(Self {
            r: source.read_u8()?,
            g: source.read_u8()?,
            b: source.read_u8()?,
        })
    }

    /// Packs the color into the 16-bit 5-6-5 layout used by save thumbnails.
    pub fn to_rgb565(self) -> u16 {
        let r = u16::from(self.r >> 3);
        let g = u16::from(self.g >> 2);
        let b = u16::from(self.b >> 3);
        (r << 11) | (g << 5) | b
    }

    pub fn from_rgb565(value: u16) -> Self {
        let r = ((value >> 11) & 0x1f) as u8;
        let g = ((value >> 5) & 0x3f) as u8;
        let b = (value & 0x1f) as u8;
        Self {
            r: (r << 3) | (r >> 2),
            g: (g << 2) | (g >> 4),
            b: (b << 3) | (b >> 2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb565_keeps_primary_channels_saturated() {
        for color in [
            Color::new(255, 0, 0),
            Color::new(0, 255, 0),
            Color::new(0, 0, 255),
            Color::WHITE,
            Color::BLACK,
        ] {
            assert_eq!(Color::from_rgb565(color.to_rgb565()), color);
        }
    }

    #[test]
    fn distance_is_euclidean() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 4.0, 0.0);
        assert!((a.distance(b) - 5.0).abs() < 0.0001);
    }
}

use crate::savegame::{SaveError, SaveReader, SaveWriter};

use super::{Color, Point, PoolKind, PoolObject};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveShape {
    Rectangle,
    Line,
    Polygon,
}

impl PrimitiveShape {
    fn to_u8(self) -> u8 {
        match self {
            PrimitiveShape::Rectangle => 0,
            PrimitiveShape::Line => 1,
            PrimitiveShape::Polygon => 2,
        }
    }

    fn from_u8(value: u8) -> Result<Self, SaveError> {
        match value {
            0 => Ok(PrimitiveShape::Rectangle),
            1 => Ok(PrimitiveShape::Line),
            2 => Ok(PrimitiveShape::Polygon),
            other => Err(SaveError::invalid_format(format!(
                "invalid primitive shape {other}"
            ))),
        }
    }
}

/// Script-drawn 2D shape composited above the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveObject {
    pub shape: PrimitiveShape,
    pub points: Vec<Point>,
    pub color: Color,
    pub filled: bool,
}

impl PrimitiveObject {
    pub fn rectangle(top_left: Point, bottom_right: Point, color: Color, filled: bool) -> Self {
        Self {
            shape: PrimitiveShape::Rectangle,
            points: vec![top_left, bottom_right],
            color,
            filled,
        }
    }

    pub fn line(from: Point, to: Point, color: Color) -> Self {
        Self {
            shape: PrimitiveShape::Line,
            points: vec![from, to],
            color,
            filled: false,
        }
    }
}

impl PoolObject for PrimitiveObject {
    const KIND: PoolKind = PoolKind::PrimitiveObject;

    fn save_record(&self, sink: &mut SaveWriter) {
        sink.write_u8(self.shape.to_u8());
        sink.write_u32(self.points.len() as u32);
        for point in &self.points {
            point.write(sink);
        }
        self.color.write(sink);
        sink.write_bool(self.filled);
    }

    fn restore_record(source: &mut SaveReader<'_>) -> Result<Self, SaveError> {
        let shape = PrimitiveShape::from_u8(source.read_u8()?)?;
        let count = source.read_u32()?;
        let mut points = Vec::new();
        for _ in 0..count {
            points.push(Point::read(source)?);
        }
        Ok(Self {
            shape,
            points,
            color: Color::read(source)?,
            filled: source.read_bool()?,
        })
    }
}

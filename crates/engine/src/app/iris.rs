use crate::savegame::{SaveError, SaveReader, SaveWriter};
use crate::services::Renderer;
use crate::world::Point;

const SCREEN_WIDTH: i32 = 640;
const SCREEN_HEIGHT: i32 = 480;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IrisDirection {
    #[default]
    Open,
    Close,
}

/// Circular wipe used for scene transitions. The visible region shrinks
/// towards (or grows from) a target point over a fixed duration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Iris {
    playing: bool,
    direction: IrisDirection,
    target: Point,
    top_left: Point,
    bottom_right: Point,
    length_ms: i32,
    current_ms: i32,
}

impl Iris {
    pub fn play(&mut self, direction: IrisDirection, target: Point, length_ms: i32) {
        self.playing = true;
        self.direction = direction;
        self.target = target;
        self.length_ms = length_ms;
        self.current_ms = 0;
        self.update(0);
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn direction(&self) -> IrisDirection {
        self.direction
    }

    pub fn region(&self) -> (Point, Point) {
        (self.top_left, self.bottom_right)
    }

    pub fn update(&mut self, frame_time_ms: u32) {
        if !self.playing {
            return;
        }
        self.current_ms = self
            .current_ms
            .saturating_add(i32::try_from(frame_time_ms).unwrap_or(i32::MAX));
        if self.current_ms >= self.length_ms {
            self.playing = false;
            return;
        }
        let mut factor = self.current_ms as f32 / self.length_ms as f32;
        if self.direction == IrisDirection::Open {
            factor = 1.0 - factor;
        }
        let scale = |value: i32| (value as f32 * factor) as i32;
        self.top_left = Point::new(scale(self.target.x), scale(self.target.y));
        self.bottom_right = Point::new(
            SCREEN_WIDTH - scale(SCREEN_WIDTH - self.target.x),
            SCREEN_HEIGHT - scale(SCREEN_HEIGHT - self.target.y),
        );
    }

    /// A finished close keeps the screen covered; a finished open draws nothing.
    pub fn draw(&self, renderer: &mut dyn Renderer) {
        if self.playing {
            renderer.iris_around_region(self.top_left, self.bottom_right);
        } else if self.direction == IrisDirection::Close {
            let center = Point::new(SCREEN_WIDTH / 2, SCREEN_HEIGHT / 2);
            renderer.iris_around_region(center, center);
        }
    }

    pub(crate) fn save(&self, sink: &mut SaveWriter) {
        sink.write_bool(self.playing);
        sink.write_bool(self.direction == IrisDirection::Close);
        self.target.write(sink);
        self.top_left.write(sink);
        self.bottom_right.write(sink);
        sink.write_i32(self.length_ms);
        sink.write_i32(self.current_ms);
    }

    pub(crate) fn restore(&mut self, source: &mut SaveReader<'_>) -> Result<(), SaveError> {
        *self = Self {
            playing: source.read_bool()?,
            direction: if source.read_bool()? {
                IrisDirection::Close
            } else {
                IrisDirection::Open
            },
            target: Point::read(source)?,
            top_left: Point::read(source)?,
            bottom_right: Point::read(source)?,
            length_ms: source.read_i32()?,
            current_ms: source.read_i32()?,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{DrawCall, DrawLog, HeadlessRenderer, RendererConfig};

    #[test]
    fn closing_iris_shrinks_towards_target() {
        let mut iris = Iris::default();
        iris.play(IrisDirection::Close, Point::new(320, 240), 1000);
        assert_eq!(iris.region(), (Point::new(0, 0), Point::new(640, 480)));

        iris.update(500);
        assert_eq!(iris.region(), (Point::new(160, 120), Point::new(480, 360)));

        iris.update(500);
        assert!(!iris.is_playing());
    }

    #[test]
    fn opening_iris_grows_from_target() {
        let mut iris = Iris::default();
        iris.play(IrisDirection::Open, Point::new(100, 100), 400);
        assert_eq!(iris.region(), (Point::new(100, 100), Point::new(100, 100)));
        iris.update(300);
        assert_eq!(iris.region(), (Point::new(25, 25), Point::new(505, 385)));
    }

    #[test]
    fn finished_close_still_covers_screen() {
        let log = DrawLog::default();
        let config = RendererConfig {
            width: 640,
            height: 480,
            fullscreen: false,
            software: true,
        };
        let mut renderer = HeadlessRenderer::new(config, log.clone());
        let mut iris = Iris::default();
        iris.draw(&mut renderer);
        assert!(log.calls().is_empty());

        iris.play(IrisDirection::Close, Point::new(10, 10), 10);
        iris.update(20);
        iris.draw(&mut renderer);
        assert_eq!(log.calls(), vec![DrawCall::Iris]);
    }
}

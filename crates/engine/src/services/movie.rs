use crate::savegame::{SaveError, SaveReader, SaveWriter};
use crate::world::Point;

/// A decoded frame ready to be blitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieFrame {
    pub number: u32,
    pub pos: Point,
    pub width: u32,
    pub height: u32,
}

/// Full-motion video playback consumed by the engine.
pub trait MoviePlayer {
    fn play(&mut self, name: &str, pos: Point) -> bool;
    fn is_playing(&self) -> bool;
    fn movie_time_ms(&self) -> u32;
    fn is_update_needed(&self) -> bool;
    fn clear_update_needed(&mut self);
    fn frame(&self) -> Option<MovieFrame>;
    fn stop(&mut self);
    fn pause(&mut self, paused: bool);

    fn save_state(&self, sink: &mut SaveWriter);
    fn restore_state(&mut self, source: &mut SaveReader<'_>) -> Result<(), SaveError>;
}

/// Movie player without a decoder: tracks playback state and hands out a
/// single placeholder frame for the playing movie.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NullMoviePlayer {
    name: Option<String>,
    pos: Point,
    paused: bool,
    update_needed: bool,
    movie_time_ms: u32,
    frame_number: u32,
}

impl NullMoviePlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Moves playback forward as a decoder thread would.
    pub fn advance(&mut self, elapsed_ms: u32) {
        if self.name.is_none() || self.paused {
            return;
        }
        self.movie_time_ms = self.movie_time_ms.saturating_add(elapsed_ms);
        self.frame_number += 1;
        self.update_needed = true;
    }
}

impl MoviePlayer for NullMoviePlayer {
    fn play(&mut self, name: &str, pos: Point) -> bool {
        self.name = Some(name.to_string());
        self.pos = pos;
        self.paused = false;
        self.update_needed = true;
        self.movie_time_ms = 0;
        self.frame_number = 0;
        true
    }

    fn is_playing(&self) -> bool {
        self.name.is_some()
    }

    fn movie_time_ms(&self) -> u32 {
        self.movie_time_ms
    }

    fn is_update_needed(&self) -> bool {
        self.update_needed
    }

    fn clear_update_needed(&mut self) {
        self.update_needed = false;
    }

    fn frame(&self) -> Option<MovieFrame> {
        self.name.as_ref().map(|_| MovieFrame {
            number: self.frame_number,
            pos: self.pos,
            width: 0,
            height: 0,
        })
    }

    fn stop(&mut self) {
        self.name = None;
        self.update_needed = false;
        self.movie_time_ms = 0;
        self.frame_number = 0;
    }

    fn pause(&mut self, paused: bool) {
        self.paused = paused;
    }

    fn save_state(&self, sink: &mut SaveWriter) {
        sink.write_bool(self.name.is_some());
        if let Some(name) = &self.name {
            sink.write_string(name);
            self.pos.write(sink);
            sink.write_u32(self.movie_time_ms);
            sink.write_u32(self.frame_number);
        }
    }

    fn restore_state(&mut self, source: &mut SaveReader<'_>) -> Result<(), SaveError> {
        self.stop();
        if source.read_bool()? {
            self.name = Some(source.read_string()?);
            self.pos = Point::read(source)?;
            self.movie_time_ms = source.read_u32()?;
            self.frame_number = source.read_u32()?;
            self.update_needed = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paused_movie_does_not_advance() {
        let mut movie = NullMoviePlayer::new();
        movie.play("intro.snm", Point::default());
        movie.pause(true);
        movie.advance(100);
        assert_eq!(movie.movie_time_ms(), 0);

        movie.pause(false);
        movie.advance(100);
        assert_eq!(movie.movie_time_ms(), 100);
        assert_eq!(movie.frame().map(|frame| frame.number), Some(1));
    }

    #[test]
    fn stop_clears_frame() {
        let mut movie = NullMoviePlayer::new();
        movie.play("intro.snm", Point::default());
        movie.stop();
        assert!(!movie.is_playing());
        assert!(movie.frame().is_none());
    }
}

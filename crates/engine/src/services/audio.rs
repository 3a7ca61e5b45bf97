use tracing::debug;

use crate::savegame::{SaveError, SaveReader, SaveWriter};

/// Music and sound mixer consumed by the engine.
pub trait AudioEngine {
    /// Applies queued track commands.
    fn flush_tracks(&mut self);
    fn refresh_scripts(&mut self);
    fn pause(&mut self, paused: bool);
    fn is_paused(&self) -> bool;
    fn stop_all_sounds(&mut self);
    fn reset_state(&mut self);
    fn set_music_state(&mut self, state: i32);
    fn music_state(&self) -> i32;

    fn save_state(&self, sink: &mut SaveWriter);
    fn restore_state(&mut self, source: &mut SaveReader<'_>) -> Result<(), SaveError>;
}

/// Silent mixer that keeps the state a real one would persist.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NullAudioEngine {
    paused: bool,
    music_state: i32,
    flushes: u64,
    stops: u32,
}

impl NullAudioEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    pub fn stops(&self) -> u32 {
        self.stops
    }
}

impl AudioEngine for NullAudioEngine {
    fn flush_tracks(&mut self) {
        self.flushes += 1;
    }

    fn refresh_scripts(&mut self) {}

    fn pause(&mut self, paused: bool) {
        self.paused = paused;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn stop_all_sounds(&mut self) {
        self.stops += 1;
    }

    fn reset_state(&mut self) {
        self.music_state = 0;
    }

    fn set_music_state(&mut self, state: i32) {
        if state != self.music_state {
            debug!(from = self.music_state, to = state, "music_state_changed");
        }
        self.music_state = state;
    }

    fn music_state(&self) -> i32 {
        self.music_state
    }

    fn save_state(&self, sink: &mut SaveWriter) {
        sink.write_i32(self.music_state);
    }

    fn restore_state(&mut self, source: &mut SaveReader<'_>) -> Result<(), SaveError> {
        self.music_state = source.read_i32()?;
        Ok(())
    }
}

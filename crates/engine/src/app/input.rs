use std::fmt;

/// Platform-independent key identity. Printable keys use their ASCII code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub const BACKSPACE: KeyCode = KeyCode(8);
    pub const TAB: KeyCode = KeyCode(9);
    pub const RETURN: KeyCode = KeyCode(13);
    pub const PAUSE: KeyCode = KeyCode(19);
    pub const ESCAPE: KeyCode = KeyCode(27);
    pub const SPACE: KeyCode = KeyCode(32);
    pub const Q: KeyCode = KeyCode(b'q' as u16);
    pub const UP: KeyCode = KeyCode(273);
    pub const DOWN: KeyCode = KeyCode(274);
    pub const RIGHT: KeyCode = KeyCode(275);
    pub const LEFT: KeyCode = KeyCode(276);
    pub const F1: KeyCode = KeyCode(282);
    pub const F5: KeyCode = KeyCode(286);
    pub const F11: KeyCode = KeyCode(292);

    /// One past the highest key code the controls table tracks.
    pub const LIMIT: usize = 512;

    pub fn from_char(value: char) -> Option<Self> {
        value.is_ascii().then(|| KeyCode(value as u16))
    }

    /// ASCII character typed by this key, if any.
    pub fn ascii(self) -> Option<char> {
        u8::try_from(self.0)
            .ok()
            .filter(u8::is_ascii)
            .map(char::from)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ascii().filter(char::is_ascii_graphic) {
            Some(ch) => write!(f, "'{ch}'"),
            None => write!(f, "key#{}", self.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    KeyDown(KeyCode),
    KeyUp(KeyCode),
    /// Window closed or the platform asked the game to end.
    Quit,
    /// The window contents were lost and the script must repaint.
    Expose,
}

/// Per-key pressed state, plus which keys scripts asked to be notified about.
#[derive(Debug, Clone)]
pub struct ControlTable {
    state: Vec<bool>,
    enabled: Vec<bool>,
}

impl Default for ControlTable {
    fn default() -> Self {
        Self {
            state: vec![false; KeyCode::LIMIT],
            enabled: vec![false; KeyCode::LIMIT],
        }
    }
}

impl ControlTable {
    /// Records the edge; returns whether scripts want to hear about this key.
    pub fn handle(&mut self, key: KeyCode, pressed: bool) -> bool {
        let Some(slot) = self.state.get_mut(key.0 as usize) else {
            return false;
        };
        *slot = pressed;
        self.is_enabled(key)
    }

    pub fn is_pressed(&self, key: KeyCode) -> bool {
        self.state.get(key.0 as usize).copied().unwrap_or(false)
    }

    pub fn is_enabled(&self, key: KeyCode) -> bool {
        self.enabled.get(key.0 as usize).copied().unwrap_or(false)
    }

    pub fn set_enabled(&mut self, key: KeyCode, enabled: bool) {
        if let Some(slot) = self.enabled.get_mut(key.0 as usize) {
            *slot = enabled;
        }
    }

    pub fn clear_state(&mut self) {
        self.state.iter_mut().for_each(|pressed| *pressed = false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_tracks_state_and_reports_enabled_keys() {
        let mut controls = ControlTable::default();
        controls.set_enabled(KeyCode::RETURN, true);

        assert!(controls.handle(KeyCode::RETURN, true));
        assert!(controls.is_pressed(KeyCode::RETURN));
        assert!(!controls.handle(KeyCode::SPACE, true));
        assert!(controls.is_pressed(KeyCode::SPACE));

        controls.handle(KeyCode::RETURN, false);
        assert!(!controls.is_pressed(KeyCode::RETURN));
    }

    #[test]
    fn clear_state_keeps_enabled_flags() {
        let mut controls = ControlTable::default();
        controls.set_enabled(KeyCode::UP, true);
        controls.handle(KeyCode::UP, true);
        controls.clear_state();
        assert!(!controls.is_pressed(KeyCode::UP));
        assert!(controls.is_enabled(KeyCode::UP));
    }

    #[test]
    fn out_of_range_keys_are_ignored() {
        let mut controls = ControlTable::default();
        assert!(!controls.handle(KeyCode(u16::MAX), true));
        assert!(!controls.is_pressed(KeyCode(u16::MAX)));
    }

    #[test]
    fn ascii_mapping() {
        assert_eq!(KeyCode::Q.ascii(), Some('q'));
        assert_eq!(KeyCode::UP.ascii(), None);
        assert_eq!(KeyCode::from_char('q'), Some(KeyCode::Q));
    }
}

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use lantern_engine::services::Platform;
use lantern_engine::{InputEvent, KeyCode};
use thiserror::Error;
use tracing::{debug, error};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::EventLoop;
use winit::keyboard::{KeyCode as WinitKey, PhysicalKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowBuilder};

pub const WINDOW_TITLE: &str = "Lantern";

const LETTERS: [(WinitKey, char); 26] = [
    (WinitKey::KeyA, 'a'),
    (WinitKey::KeyB, 'b'),
    (WinitKey::KeyC, 'c'),
    (WinitKey::KeyD, 'd'),
    (WinitKey::KeyE, 'e'),
    (WinitKey::KeyF, 'f'),
    (WinitKey::KeyG, 'g'),
    (WinitKey::KeyH, 'h'),
    (WinitKey::KeyI, 'i'),
    (WinitKey::KeyJ, 'j'),
    (WinitKey::KeyK, 'k'),
    (WinitKey::KeyL, 'l'),
    (WinitKey::KeyM, 'm'),
    (WinitKey::KeyN, 'n'),
    (WinitKey::KeyO, 'o'),
    (WinitKey::KeyP, 'p'),
    (WinitKey::KeyQ, 'q'),
    (WinitKey::KeyR, 'r'),
    (WinitKey::KeyS, 's'),
    (WinitKey::KeyT, 't'),
    (WinitKey::KeyU, 'u'),
    (WinitKey::KeyV, 'v'),
    (WinitKey::KeyW, 'w'),
    (WinitKey::KeyX, 'x'),
    (WinitKey::KeyY, 'y'),
    (WinitKey::KeyZ, 'z'),
];

const DIGITS: [WinitKey; 10] = [
    WinitKey::Digit0,
    WinitKey::Digit1,
    WinitKey::Digit2,
    WinitKey::Digit3,
    WinitKey::Digit4,
    WinitKey::Digit5,
    WinitKey::Digit6,
    WinitKey::Digit7,
    WinitKey::Digit8,
    WinitKey::Digit9,
];

const FUNCTION_KEYS: [WinitKey; 12] = [
    WinitKey::F1,
    WinitKey::F2,
    WinitKey::F3,
    WinitKey::F4,
    WinitKey::F5,
    WinitKey::F6,
    WinitKey::F7,
    WinitKey::F8,
    WinitKey::F9,
    WinitKey::F10,
    WinitKey::F11,
    WinitKey::F12,
];

/// Window system integration: owns the event loop and pumps it whenever the
/// engine asks for input.
pub struct WinitPlatform {
    event_loop: EventLoop<()>,
    window: Arc<Window>,
    queue: VecDeque<InputEvent>,
}

impl WinitPlatform {
    pub fn new(width: u32, height: u32) -> Result<Self, WindowError> {
        let event_loop = EventLoop::new().map_err(WindowError::CreateEventLoop)?;
        let window = WindowBuilder::new()
            .with_title(WINDOW_TITLE)
            .with_inner_size(LogicalSize::new(width as f64, height as f64))
            .build(&event_loop)
            .map_err(WindowError::CreateWindow)?;
        Ok(Self {
            event_loop,
            window: Arc::new(window),
            queue: VecDeque::new(),
        })
    }

    pub fn window(&self) -> Arc<Window> {
        Arc::clone(&self.window)
    }

    fn pump(&mut self) {
        let queue = &mut self.queue;
        let status = self
            .event_loop
            .pump_events(Some(Duration::ZERO), |event, _target| {
                if let Event::WindowEvent { event, .. } = event {
                    if let Some(input) = translate_window_event(&event) {
                        queue.push_back(input);
                    }
                }
            });
        if let PumpStatus::Exit(code) = status {
            debug!(code, "event_loop_exited");
            self.queue.push_back(InputEvent::Quit);
        }
    }
}

impl Platform for WinitPlatform {
    fn poll_event(&mut self) -> Option<InputEvent> {
        if self.queue.is_empty() {
            self.pump();
        }
        self.queue.pop_front()
    }

    fn clear_events(&mut self) {
        self.pump();
        self.queue.clear();
    }

    fn display_error(&mut self, message: &str) {
        error!(message, "error_dialog");
        self.window.set_title(&format!("{WINDOW_TITLE} - {message}"));
    }
}

#[derive(Debug, Error)]
pub enum WindowError {
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
}

fn translate_window_event(event: &WindowEvent) -> Option<InputEvent> {
    match event {
        WindowEvent::CloseRequested => Some(InputEvent::Quit),
        WindowEvent::RedrawRequested => Some(InputEvent::Expose),
        WindowEvent::KeyboardInput { event, .. } => translate_key_event(event),
        _ => None,
    }
}

fn translate_key_event(event: &KeyEvent) -> Option<InputEvent> {
    if event.repeat {
        return None;
    }
    let PhysicalKey::Code(code) = event.physical_key else {
        return None;
    };
    let key = map_key(code)?;
    Some(match event.state {
        ElementState::Pressed => InputEvent::KeyDown(key),
        ElementState::Released => InputEvent::KeyUp(key),
    })
}

pub fn map_key(code: WinitKey) -> Option<KeyCode> {
    if let Some((_, letter)) = LETTERS.iter().find(|(key, _)| *key == code) {
        return KeyCode::from_char(*letter);
    }
    if let Some(digit) = DIGITS.iter().position(|key| *key == code) {
        return Some(KeyCode(u16::from(b'0') + digit as u16));
    }
    if let Some(offset) = FUNCTION_KEYS.iter().position(|key| *key == code) {
        return Some(KeyCode(KeyCode::F1.0 + offset as u16));
    }
    let key = match code {
        WinitKey::Backspace => KeyCode::BACKSPACE,
        WinitKey::Tab => KeyCode::TAB,
        WinitKey::Enter | WinitKey::NumpadEnter => KeyCode::RETURN,
        WinitKey::Pause => KeyCode::PAUSE,
        WinitKey::Escape => KeyCode::ESCAPE,
        WinitKey::Space => KeyCode::SPACE,
        WinitKey::ArrowUp => KeyCode::UP,
        WinitKey::ArrowDown => KeyCode::DOWN,
        WinitKey::ArrowRight => KeyCode::RIGHT,
        WinitKey::ArrowLeft => KeyCode::LEFT,
        _ => return None,
    };
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_map_to_lowercase_ascii() {
        assert_eq!(map_key(WinitKey::KeyQ), Some(KeyCode::Q));
        assert_eq!(map_key(WinitKey::KeyA), Some(KeyCode(u16::from(b'a'))));
        assert_eq!(map_key(WinitKey::KeyZ), Some(KeyCode(u16::from(b'z'))));
    }

    #[test]
    fn digits_and_function_keys_map_to_engine_codes() {
        assert_eq!(map_key(WinitKey::Digit7), Some(KeyCode(u16::from(b'7'))));
        assert_eq!(map_key(WinitKey::F1), Some(KeyCode::F1));
        assert_eq!(map_key(WinitKey::F5), Some(KeyCode::F5));
        assert_eq!(map_key(WinitKey::F11), Some(KeyCode::F11));
    }

    #[test]
    fn named_keys_map_and_unknown_keys_are_dropped() {
        assert_eq!(map_key(WinitKey::Pause), Some(KeyCode::PAUSE));
        assert_eq!(map_key(WinitKey::Escape), Some(KeyCode::ESCAPE));
        assert_eq!(map_key(WinitKey::NumpadEnter), Some(KeyCode::RETURN));
        assert_eq!(map_key(WinitKey::ArrowLeft), Some(KeyCode::LEFT));
        assert_eq!(map_key(WinitKey::ShiftLeft), None);
    }

    #[test]
    fn close_and_redraw_requests_become_engine_events() {
        assert_eq!(
            translate_window_event(&WindowEvent::CloseRequested),
            Some(InputEvent::Quit)
        );
        assert_eq!(
            translate_window_event(&WindowEvent::RedrawRequested),
            Some(InputEvent::Expose)
        );
        assert_eq!(translate_window_event(&WindowEvent::Focused(true)), None);
    }
}

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::warn;

use crate::app::InputEvent;

/// Window system events in, user-visible dialogs out.
pub trait Platform {
    fn poll_event(&mut self) -> Option<InputEvent>;
    fn clear_events(&mut self);
    fn display_error(&mut self, message: &str);
}

#[derive(Debug, Default)]
struct HeadlessPlatformState {
    events: VecDeque<InputEvent>,
    errors: Vec<String>,
}

/// Scripted input queue; error dialogs are recorded instead of shown.
#[derive(Debug, Clone, Default)]
pub struct HeadlessPlatform {
    state: Rc<RefCell<HeadlessPlatformState>>,
}

impl HeadlessPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_event(&self, event: InputEvent) {
        self.state.borrow_mut().events.push_back(event);
    }

    pub fn pending_events(&self) -> usize {
        self.state.borrow().events.len()
    }

    pub fn errors(&self) -> Vec<String> {
        self.state.borrow().errors.clone()
    }
}

impl Platform for HeadlessPlatform {
    fn poll_event(&mut self) -> Option<InputEvent> {
        self.state.borrow_mut().events.pop_front()
    }

    fn clear_events(&mut self) {
        self.state.borrow_mut().events.clear();
    }

    fn display_error(&mut self, message: &str) {
        warn!(message, "error_dialog");
        self.state.borrow_mut().errors.push(message.to_string());
    }
}

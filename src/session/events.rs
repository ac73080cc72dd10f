use std::collections::VecDeque;

use crate::foundation::core::PixelRect;

/// Mouse buttons the host reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Keys the application layer cares about; anything else arrives as `Other` with the host code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Return,
    Space,
    Escape,
    Control,
    Other(u32),
}

/// One host window event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostEvent {
    /// Unconditional quit (e.g. session end).
    Quit,
    /// The user asked to close the window.
    CloseRequested,
    MouseDown { x: i32, y: i32, button: MouseButton },
    MouseUp { x: i32, y: i32, button: MouseButton },
    MouseMove { x: i32, y: i32 },
    KeyDown { key: Key, repeat: bool },
    KeyUp { key: Key },
    /// Wheel rotation; positive is away from the user.
    Wheel { delta: i32 },
    /// A window region must be repainted from the last frame.
    Expose { rect: PixelRect },
}

/// Non-blocking host event pump.
pub trait EventSource {
    /// Next pending event, or `None` when the queue is drained. Never blocks.
    fn poll_event(&mut self) -> Option<HostEvent>;
}

/// Event source that never produces anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoEvents;

impl EventSource for NoEvents {
    fn poll_event(&mut self) -> Option<HostEvent> {
        None
    }
}

/// Pre-recorded events, delivered a batch per pump.
///
/// Batches are separated by [`ScriptedEvents::next_pump`]; each drain of the source (one
/// pump) releases at most one batch, so tests can place events at specific loop iterations.
#[derive(Clone, Debug, Default)]
pub struct ScriptedEvents {
    batches: VecDeque<VecDeque<HostEvent>>,
    current: VecDeque<HostEvent>,
    end_pump: bool,
}

impl ScriptedEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event in the current batch.
    pub fn push(mut self, event: HostEvent) -> Self {
        match self.batches.back_mut() {
            Some(batch) => batch.push_back(event),
            None => self.batches.push_back(VecDeque::from([event])),
        }
        self
    }

    /// Start a new batch; events pushed after this arrive on a later pump.
    pub fn next_pump(mut self) -> Self {
        if self.batches.is_empty() {
            self.batches.push_back(VecDeque::new());
        }
        self.batches.push_back(VecDeque::new());
        self
    }

    /// Events not delivered yet.
    pub fn remaining(&self) -> usize {
        self.current.len() + self.batches.iter().map(VecDeque::len).sum::<usize>()
    }
}

impl EventSource for ScriptedEvents {
    fn poll_event(&mut self) -> Option<HostEvent> {
        if let Some(ev) = self.current.pop_front() {
            self.end_pump = self.current.is_empty();
            return Some(ev);
        }
        if self.end_pump {
            self.end_pump = false;
            return None;
        }
        self.current = self.batches.pop_front()?;
        if self.current.is_empty() {
            return None;
        }
        self.poll_event()
    }
}

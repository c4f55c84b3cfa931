// Transport - Playback control and state management
// Controls play/stop/record state, playhead position and display mode

use crate::command::ObjectRef;
use crate::messaging::{Change, ChangeExtra, ListenerSet};
use std::rc::Rc;

/// Transport state (play/stop/record)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Recording,
    Paused,
}

impl TransportState {
    /// Check if transport is in a playing state (Playing or Recording)
    pub fn is_playing(&self) -> bool {
        matches!(self, TransportState::Playing | TransportState::Recording)
    }

    /// Check if transport is recording
    pub fn is_recording(&self) -> bool {
        matches!(self, TransportState::Recording)
    }

    /// Check if transport is stopped or paused
    pub fn is_stopped(&self) -> bool {
        matches!(self, TransportState::Stopped | TransportState::Paused)
    }
}

/// How the playhead position is displayed
///
/// Persisted as an integer in the project parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    #[default]
    HoursMinsSecs,
    BarsBeats,
}

impl TransportMode {
    pub fn as_i64(self) -> i64 {
        match self {
            TransportMode::HoursMinsSecs => 1,
            TransportMode::BarsBeats => 2,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(TransportMode::HoursMinsSecs),
            2 => Some(TransportMode::BarsBeats),
            _ => None,
        }
    }
}

/// Transport controller
///
/// Owned by the project. Instruments follow its play state through the
/// listener set returned by [`Transport::listeners`].
pub struct Transport {
    state: TransportState,
    position: f64,
    mode: TransportMode,
    listeners: Rc<ListenerSet>,
}

impl Transport {
    pub fn new() -> Self {
        Self {
            state: TransportState::Stopped,
            position: 0.0,
            mode: TransportMode::default(),
            listeners: ListenerSet::new(),
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Playhead position in seconds
    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn mode(&self) -> TransportMode {
        self.mode
    }

    pub fn listeners(&self) -> &Rc<ListenerSet> {
        &self.listeners
    }

    pub fn play(&mut self) {
        self.set_state(TransportState::Playing);
    }

    pub fn record(&mut self) {
        self.set_state(TransportState::Recording);
    }

    pub fn pause(&mut self) {
        if self.state.is_playing() {
            self.set_state(TransportState::Paused);
        }
    }

    /// Stop playback and return to the start
    pub fn stop(&mut self) {
        self.set_state(TransportState::Stopped);
        self.seek(0.0);
    }

    /// Move the playhead; negative positions clamp to zero
    pub fn seek(&mut self, position: f64) {
        let position = if position.is_finite() { position.max(0.0) } else { 0.0 };
        if position == self.position {
            return;
        }
        self.position = position;
        self.listeners.notify(
            &ObjectRef::Transport,
            Change::TransportPosition,
            Some(&ChangeExtra::Position(position)),
        );
    }

    pub fn set_mode(&mut self, mode: TransportMode) {
        if mode == self.mode {
            return;
        }
        self.mode = mode;
        self.listeners
            .notify(&ObjectRef::Transport, Change::TransportMode, None);
    }

    fn set_state(&mut self, state: TransportState) {
        if state == self.state {
            return;
        }
        log::debug!("Transport {:?} -> {:?}", self.state, state);
        self.state = state;
        self.listeners.notify(
            &ObjectRef::Transport,
            Change::TransportState,
            Some(&ChangeExtra::Transport(state)),
        );
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

// Change descriptors delivered to entity listeners

use crate::sequencer::TransportState;
use std::path::PathBuf;

/// What changed on the notifying entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Change {
    // Project
    Author,
    InstrumentAdded,
    InstrumentRemoved,
    InstrumentReordered,
    ViewChanged,
    ClipboardChanged,
    Undo,
    Redo,
    Saved,
    Closing,

    // Instrument
    Name,
    Pan,
    Volume,
    Mute,
    Solo,
    EventAdded,
    EventRemoved,
    EffectsChanged,
    Image,

    // Event
    Moved,
    FadePoints,
    Levels,
    Duration,

    // Transport
    TransportState,
    TransportPosition,
    TransportMode,
}

/// Optional context attached to a change
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeExtra {
    /// Id of the instrument or event the change is about
    Id(u32),
    /// A time position in seconds
    Position(f64),
    /// A file the change is about
    File(PathBuf),
    /// New transport play state
    Transport(TransportState),
    Text(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_extra_equality() {
        assert_eq!(ChangeExtra::Id(3), ChangeExtra::Id(3));
        assert_ne!(ChangeExtra::Id(3), ChangeExtra::Position(3.0));
        assert_ne!(Change::Moved, Change::Name);
    }
}

// DAW session core - library exports for the binary, tests and benchmarks

pub mod command;
pub mod config;
pub mod context;
pub mod media;
pub mod messaging;
pub mod project;
pub mod sequencer;
pub mod value;

// Re-export commonly used types for convenience
pub use command::{AtomicUndoAction, CommandError, ObjectRef, UndoCommand, UndoLog};
pub use config::Settings;
pub use context::SessionContext;
pub use media::{MediaError, MediaGraph, SoftwareGraph};
pub use messaging::{Change, ChangeExtra, ChangeRecorder, Listener, ListenerSet, Subscription};
pub use project::{
    Event, FormatVersion, Instrument, Project, ProjectError, ProjectManager, validate_project,
};
pub use sequencer::{Transport, TransportMode, TransportState};
pub use value::Value;

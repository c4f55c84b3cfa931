// Project persistence for the session
// Gzip-compressed XML project files in three format versions, the entity
// model they restore (project, instruments, events) and the manager that
// owns the active project.

pub mod event;
pub mod icons;
pub mod instrument;
pub mod loader;
pub mod manager;
pub mod migration;
pub mod serialization;
pub mod types;
pub mod waveform;
pub mod writer;

pub use event::{Event, EventClip, FadePoints};
pub use icons::{IconCache, IconHandle};
pub use instrument::{GlobalEffect, Instrument};
pub use manager::{ProjectError, ProjectManager, parse_location, validate_project};
pub use migration::FormatVersion;
pub use types::Project;
pub use writer::{project_to_document, save_project_file};

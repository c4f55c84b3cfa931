// Command targets, object references and command errors

use crate::command::action::UndoCommand;
use crate::media::MediaError;
use std::fmt;
use std::str::FromStr;

/// Result type for command operations
pub type CommandResult<T> = Result<T, CommandError>;

/// Errors that can occur while recording or replaying commands
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    /// Undo or redo requested with nothing on the stack
    #[error("Nothing to {0}")]
    EmptyStack(&'static str),

    /// The command's object reference does not resolve
    #[error("Unknown command target: {0}")]
    UnknownTarget(String),

    /// No registered operation with this name for the target kind
    #[error("Unknown operation '{operation}' on {target}")]
    UnknownOperation { target: String, operation: String },

    /// Arguments do not match what the operation expects
    #[error("Invalid arguments for '{operation}': {reason}")]
    InvalidArguments { operation: String, reason: String },

    /// The operation ran but failed
    #[error("Execution failed: {0}")]
    Execution(String),

    /// commit() or add_command() without an open action, or nested begin
    #[error("Invalid undo log state: {0}")]
    InvalidState(String),
}

impl From<MediaError> for CommandError {
    fn from(e: MediaError) -> Self {
        CommandError::Execution(e.to_string())
    }
}

/// Reference to a live entity, persisted as text in undo history
///
/// Textual forms: `P`, `T`, `I<id>`, `E<instrument>.<event>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectRef {
    Project,
    Transport,
    Instrument(u32),
    Event { instrument: u32, event: u32 },
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectRef::Project => write!(f, "P"),
            ObjectRef::Transport => write!(f, "T"),
            ObjectRef::Instrument(id) => write!(f, "I{}", id),
            ObjectRef::Event { instrument, event } => write!(f, "E{}.{}", instrument, event),
        }
    }
}

impl FromStr for ObjectRef {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || CommandError::UnknownTarget(s.to_string());
        match s {
            "P" => return Ok(ObjectRef::Project),
            "T" => return Ok(ObjectRef::Transport),
            _ => {}
        }
        if let Some(rest) = s.strip_prefix('I') {
            return rest
                .parse()
                .map(ObjectRef::Instrument)
                .map_err(|_| unknown());
        }
        if let Some(rest) = s.strip_prefix('E') {
            let (instrument, event) = rest.split_once('.').ok_or_else(unknown)?;
            return Ok(ObjectRef::Event {
                instrument: instrument.parse().map_err(|_| unknown())?,
                event: event.parse().map_err(|_| unknown())?,
            });
        }
        Err(unknown())
    }
}

/// Something undo commands can be executed against
///
/// `execute` applies one command and returns the command that reverses it.
/// Implementations must not record anything on their own undo log while
/// executing; the log collects the returned inverses itself.
pub trait CommandTarget {
    fn execute(&mut self, command: &UndoCommand) -> CommandResult<UndoCommand>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_ref_text_forms() {
        let refs = [
            ObjectRef::Project,
            ObjectRef::Transport,
            ObjectRef::Instrument(12),
            ObjectRef::Event {
                instrument: 3,
                event: 40,
            },
        ];
        for r in refs {
            let text = r.to_string();
            assert_eq!(text.parse::<ObjectRef>().unwrap(), r);
        }
        assert_eq!(
            ObjectRef::Event {
                instrument: 3,
                event: 40
            }
            .to_string(),
            "E3.40"
        );
    }

    #[test]
    fn test_object_ref_rejects_garbage() {
        for text in ["", "X1", "I", "Ix", "E3", "E3.", "E.4", "P1"] {
            assert!(text.parse::<ObjectRef>().is_err(), "{} parsed", text);
        }
    }

    #[test]
    fn test_error_display() {
        assert_eq!(CommandError::EmptyStack("undo").to_string(), "Nothing to undo");
    }
}

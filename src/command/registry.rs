// Closed table of undoable project operations
//
// Undo history stores commands as (target, operation name, arguments). The
// registry is the only way such a command turns back into a call: a fixed
// table of handlers keyed by target kind and name. Unknown names are errors.

use crate::command::action::UndoCommand;
use crate::command::trait_def::{CommandError, CommandResult, CommandTarget, ObjectRef};
use crate::project::Project;
use crate::value::Value;

/// Kind of entity a command addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Project,
    Instrument,
    Event,
}

impl TargetKind {
    /// Transport references are notification sources only, never command targets
    pub fn of(target: &ObjectRef) -> Option<Self> {
        match target {
            ObjectRef::Project => Some(TargetKind::Project),
            ObjectRef::Instrument(_) => Some(TargetKind::Instrument),
            ObjectRef::Event { .. } => Some(TargetKind::Event),
            ObjectRef::Transport => None,
        }
    }
}

type Handler = fn(&mut Project, &ObjectRef, &[Value]) -> CommandResult<UndoCommand>;

struct Entry {
    kind: TargetKind,
    operation: &'static str,
    handler: Handler,
}

const COMMANDS: &[Entry] = &[
    Entry { kind: TargetKind::Project, operation: "DeleteInstrument", handler: delete_instrument },
    Entry { kind: TargetKind::Project, operation: "ResurrectInstrument", handler: resurrect_instrument },
    Entry { kind: TargetKind::Project, operation: "MoveInstrument", handler: move_instrument },
    Entry { kind: TargetKind::Instrument, operation: "SetName", handler: set_instrument_name },
    Entry { kind: TargetKind::Instrument, operation: "SetPan", handler: set_pan },
    Entry { kind: TargetKind::Instrument, operation: "SetVolume", handler: set_volume },
    Entry { kind: TargetKind::Instrument, operation: "ToggleMute", handler: toggle_mute },
    Entry { kind: TargetKind::Instrument, operation: "ToggleSolo", handler: toggle_solo },
    Entry { kind: TargetKind::Instrument, operation: "DeleteEvent", handler: delete_event },
    Entry { kind: TargetKind::Instrument, operation: "ResurrectEvent", handler: resurrect_event },
    Entry { kind: TargetKind::Event, operation: "Move", handler: move_event },
    Entry { kind: TargetKind::Event, operation: "SetName", handler: set_event_name },
    Entry { kind: TargetKind::Event, operation: "SetFadePoint", handler: set_fade_point },
    Entry { kind: TargetKind::Event, operation: "RemoveFadePoint", handler: remove_fade_point },
];

fn lookup(kind: TargetKind, operation: &str) -> Option<Handler> {
    COMMANDS
        .iter()
        .find(|entry| entry.kind == kind && entry.operation == operation)
        .map(|entry| entry.handler)
}

/// Whether `operation` is registered for this kind of target
pub fn is_registered(kind: TargetKind, operation: &str) -> bool {
    lookup(kind, operation).is_some()
}

/// Operation names registered for a target kind
pub fn operations(kind: TargetKind) -> impl Iterator<Item = &'static str> {
    COMMANDS
        .iter()
        .filter(move |entry| entry.kind == kind)
        .map(|entry| entry.operation)
}

/// Run a command against the project, returning its inverse
pub fn execute(project: &mut Project, command: &UndoCommand) -> CommandResult<UndoCommand> {
    let kind = TargetKind::of(&command.target)
        .ok_or_else(|| CommandError::UnknownTarget(command.target.to_string()))?;
    let handler = lookup(kind, &command.operation).ok_or_else(|| CommandError::UnknownOperation {
        target: command.target.to_string(),
        operation: command.operation.clone(),
    })?;
    handler(project, &command.target, &command.args)
}

impl CommandTarget for Project {
    fn execute(&mut self, command: &UndoCommand) -> CommandResult<UndoCommand> {
        execute(self, command)
    }
}

// ---------------------------------------------------------------------------
// Argument decoding

fn invalid(operation: &str, reason: impl Into<String>) -> CommandError {
    CommandError::InvalidArguments {
        operation: operation.to_string(),
        reason: reason.into(),
    }
}

fn arity(operation: &str, args: &[Value], min: usize, max: usize) -> CommandResult<()> {
    if args.len() < min || args.len() > max {
        return Err(invalid(
            operation,
            format!("expected {}..={} arguments, got {}", min, max, args.len()),
        ));
    }
    Ok(())
}

fn arg_u32(operation: &str, args: &[Value], index: usize) -> CommandResult<u32> {
    args.get(index)
        .and_then(Value::as_u32)
        .ok_or_else(|| invalid(operation, format!("argument {} must be an id", index)))
}

fn arg_index(operation: &str, args: &[Value], index: usize) -> CommandResult<usize> {
    arg_u32(operation, args, index).map(|v| v as usize)
}

fn arg_f64(operation: &str, args: &[Value], index: usize) -> CommandResult<f64> {
    args.get(index)
        .and_then(Value::as_f64)
        .ok_or_else(|| invalid(operation, format!("argument {} must be a number", index)))
}

fn arg_str<'a>(operation: &str, args: &'a [Value], index: usize) -> CommandResult<&'a str> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(operation, format!("argument {} must be a string", index)))
}

/// Optional trailing index; absent or `None` both mean "append"
fn arg_opt_index(operation: &str, args: &[Value], index: usize) -> CommandResult<Option<usize>> {
    match args.get(index) {
        None | Some(Value::None) => Ok(None),
        Some(_) => arg_index(operation, args, index).map(Some),
    }
}

fn instrument_id(target: &ObjectRef) -> CommandResult<u32> {
    match target {
        ObjectRef::Instrument(id) => Ok(*id),
        other => Err(CommandError::UnknownTarget(other.to_string())),
    }
}

fn event_ids(target: &ObjectRef) -> CommandResult<(u32, u32)> {
    match target {
        ObjectRef::Event { instrument, event } => Ok((*instrument, *event)),
        other => Err(CommandError::UnknownTarget(other.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Handlers

fn delete_instrument(p: &mut Project, _: &ObjectRef, args: &[Value]) -> CommandResult<UndoCommand> {
    arity("DeleteInstrument", args, 1, 1)?;
    p.apply_delete_instrument(arg_u32("DeleteInstrument", args, 0)?)
}

fn resurrect_instrument(p: &mut Project, _: &ObjectRef, args: &[Value]) -> CommandResult<UndoCommand> {
    arity("ResurrectInstrument", args, 1, 2)?;
    p.apply_resurrect_instrument(
        arg_u32("ResurrectInstrument", args, 0)?,
        arg_opt_index("ResurrectInstrument", args, 1)?,
    )
}

fn move_instrument(p: &mut Project, _: &ObjectRef, args: &[Value]) -> CommandResult<UndoCommand> {
    arity("MoveInstrument", args, 2, 2)?;
    p.apply_move_instrument(
        arg_u32("MoveInstrument", args, 0)?,
        arg_index("MoveInstrument", args, 1)?,
    )
}

fn set_instrument_name(p: &mut Project, target: &ObjectRef, args: &[Value]) -> CommandResult<UndoCommand> {
    arity("SetName", args, 1, 1)?;
    p.apply_set_instrument_name(instrument_id(target)?, arg_str("SetName", args, 0)?)
}

fn set_pan(p: &mut Project, target: &ObjectRef, args: &[Value]) -> CommandResult<UndoCommand> {
    arity("SetPan", args, 1, 1)?;
    p.apply_set_pan(instrument_id(target)?, arg_f64("SetPan", args, 0)?)
}

fn set_volume(p: &mut Project, target: &ObjectRef, args: &[Value]) -> CommandResult<UndoCommand> {
    arity("SetVolume", args, 1, 1)?;
    p.apply_set_volume(instrument_id(target)?, arg_f64("SetVolume", args, 0)?)
}

fn toggle_mute(p: &mut Project, target: &ObjectRef, args: &[Value]) -> CommandResult<UndoCommand> {
    arity("ToggleMute", args, 0, 0)?;
    p.apply_toggle_mute(instrument_id(target)?)
}

fn toggle_solo(p: &mut Project, target: &ObjectRef, args: &[Value]) -> CommandResult<UndoCommand> {
    arity("ToggleSolo", args, 0, 0)?;
    p.apply_toggle_solo(instrument_id(target)?)
}

fn delete_event(p: &mut Project, target: &ObjectRef, args: &[Value]) -> CommandResult<UndoCommand> {
    arity("DeleteEvent", args, 1, 1)?;
    p.apply_delete_event(instrument_id(target)?, arg_u32("DeleteEvent", args, 0)?)
}

fn resurrect_event(p: &mut Project, target: &ObjectRef, args: &[Value]) -> CommandResult<UndoCommand> {
    arity("ResurrectEvent", args, 1, 2)?;
    p.apply_resurrect_event(
        instrument_id(target)?,
        arg_u32("ResurrectEvent", args, 0)?,
        arg_opt_index("ResurrectEvent", args, 1)?,
    )
}

fn move_event(p: &mut Project, target: &ObjectRef, args: &[Value]) -> CommandResult<UndoCommand> {
    arity("Move", args, 1, 1)?;
    let (instrument, event) = event_ids(target)?;
    p.apply_move_event(instrument, event, arg_f64("Move", args, 0)?)
}

fn set_event_name(p: &mut Project, target: &ObjectRef, args: &[Value]) -> CommandResult<UndoCommand> {
    arity("SetName", args, 1, 1)?;
    let (instrument, event) = event_ids(target)?;
    p.apply_set_event_name(instrument, event, arg_str("SetName", args, 0)?)
}

fn set_fade_point(p: &mut Project, target: &ObjectRef, args: &[Value]) -> CommandResult<UndoCommand> {
    arity("SetFadePoint", args, 2, 2)?;
    let (instrument, event) = event_ids(target)?;
    p.apply_set_fade_point(
        instrument,
        event,
        arg_f64("SetFadePoint", args, 0)?,
        arg_f64("SetFadePoint", args, 1)?,
    )
}

fn remove_fade_point(p: &mut Project, target: &ObjectRef, args: &[Value]) -> CommandResult<UndoCommand> {
    arity("RemoveFadePoint", args, 1, 1)?;
    let (instrument, event) = event_ids(target)?;
    p.apply_remove_fade_point(instrument, event, arg_f64("RemoveFadePoint", args, 0)?)
}

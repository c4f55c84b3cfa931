// Undo/redo for project edits
//
// Every recorded edit stores the command that reverses it, as a
// (target, operation, arguments) triple. Triples are persisted in project
// files and turned back into calls through the closed registry.
//
// Architecture:
// - UndoCommand / AtomicUndoAction: the recorded data
// - UndoLog: undo and redo stacks, action grouping
// - CommandTarget: what the log replays commands against
// - registry: operation name -> handler table for Project

pub mod action;
pub mod manager;
pub mod registry;
pub mod trait_def;

pub use action::{AtomicUndoAction, UndoCommand};
pub use manager::UndoLog;
pub use trait_def::{CommandError, CommandResult, CommandTarget, ObjectRef};

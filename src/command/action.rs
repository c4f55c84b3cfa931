// Undo commands and atomic undo actions

use crate::command::trait_def::ObjectRef;
use crate::value::Value;
use std::fmt;

/// One reversible step: call `operation` on `target` with `args`
#[derive(Debug, Clone, PartialEq)]
pub struct UndoCommand {
    pub target: ObjectRef,
    pub operation: String,
    pub args: Vec<Value>,
}

impl UndoCommand {
    pub fn new(target: ObjectRef, operation: &str, args: Vec<Value>) -> Self {
        Self {
            target,
            operation: operation.to_string(),
            args,
        }
    }
}

impl fmt::Display for UndoCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}(", self.target, self.operation)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ")")
    }
}

/// A single user operation, made of one or more commands
///
/// Commands are stored in the order they were recorded and executed in
/// reverse when the action is undone.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AtomicUndoAction {
    commands: Vec<UndoCommand>,
}

impl AtomicUndoAction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an action from already recorded commands
    pub fn from_commands(commands: Vec<UndoCommand>) -> Self {
        Self { commands }
    }

    pub fn add_command(&mut self, command: UndoCommand) {
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[UndoCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Human-readable summary, used for "Undo ..." menu labels
    pub fn description(&self) -> String {
        match self.commands.as_slice() {
            [] => String::from("Nothing"),
            [single] => single.operation.clone(),
            [first, rest @ ..] => format!("{} (+{} more)", first.operation, rest.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_display() {
        let cmd = UndoCommand::new(
            ObjectRef::Event {
                instrument: 1,
                event: 2,
            },
            "Move",
            vec![Value::Float(1.5), Value::Str("x".into())],
        );
        assert_eq!(cmd.to_string(), "E1.2.Move(1.5, \"x\")");
    }

    #[test]
    fn test_action_description() {
        let mut action = AtomicUndoAction::new();
        assert_eq!(action.description(), "Nothing");
        action.add_command(UndoCommand::new(ObjectRef::Project, "DeleteInstrument", vec![]));
        assert_eq!(action.description(), "DeleteInstrument");
        action.add_command(UndoCommand::new(ObjectRef::Project, "MoveInstrument", vec![]));
        assert_eq!(action.description(), "DeleteInstrument (+1 more)");
    }
}

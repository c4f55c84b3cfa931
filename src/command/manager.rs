// UndoLog - Manages undo/redo stacks of atomic actions

use crate::command::action::{AtomicUndoAction, UndoCommand};
use crate::command::trait_def::{CommandError, CommandResult, CommandTarget};
use std::collections::VecDeque;

/// Default maximum number of actions to keep in history
pub const DEFAULT_MAX_HISTORY: usize = 100;

/// Records reversible actions and replays them against a [`CommandTarget`]
///
/// The log maintains two stacks:
/// - Undo stack: actions whose inverse commands restore the previous state
/// - Redo stack: inverses of actions that have been undone
///
/// Recording a new action:
/// 1. `begin_action()` opens an action (calls may nest)
/// 2. `add_command()` appends inverse commands to it
/// 3. `commit()` closes the outermost level, pushes the action on the undo
///    stack and clears the redo stack (new timeline)
///
/// A command added while no action is open becomes an action of its own.
///
/// Undo pops an action, executes its commands in reverse order, and pushes
/// the inverses they return as one action on the redo stack. Redo is the
/// mirror image. Neither touches the open action, so replay never records
/// onto the live stacks.
#[derive(Debug)]
pub struct UndoLog {
    /// Actions that can be undone (most recent at the back)
    undo_stack: VecDeque<AtomicUndoAction>,

    /// Actions that can be redone (most recent at the back)
    redo_stack: VecDeque<AtomicUndoAction>,

    /// Action being recorded, and how many begin_action() calls are open
    open_action: Option<AtomicUndoAction>,
    depth: usize,

    /// Maximum number of actions kept on the undo stack
    max_history: usize,
}

impl UndoLog {
    /// Create a new UndoLog with default settings
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_HISTORY)
    }

    /// Create a new UndoLog with a custom history limit
    pub fn with_capacity(max_history: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            open_action: None,
            depth: 0,
            max_history: max_history.max(1),
        }
    }

    /// Open a new atomic action, or a nested level of the open one
    pub fn begin_action(&mut self) {
        if self.depth == 0 {
            self.open_action = Some(AtomicUndoAction::new());
        }
        self.depth += 1;
    }

    /// Whether an action is currently being recorded
    pub fn is_recording(&self) -> bool {
        self.depth > 0
    }

    /// Append one reversible step to the open action
    ///
    /// Without an open action the command is committed on its own.
    pub fn add_command(&mut self, command: UndoCommand) {
        match self.open_action.as_mut() {
            Some(action) => action.add_command(command),
            None => self.push_committed(AtomicUndoAction::from_commands(vec![command])),
        }
    }

    /// Close one level of the open action
    ///
    /// When the outermost level closes, a non-empty action is pushed on the
    /// undo stack and the redo stack is cleared.
    ///
    /// # Errors
    /// Returns an error if no action is open.
    pub fn commit(&mut self) -> CommandResult<()> {
        if self.depth == 0 {
            return Err(CommandError::InvalidState(
                "commit without begin_action".into(),
            ));
        }
        self.depth -= 1;
        if self.depth == 0 {
            if let Some(action) = self.open_action.take() {
                if !action.is_empty() {
                    self.push_committed(action);
                }
            }
        }
        Ok(())
    }

    /// Throw away the open action, all nesting levels included
    pub fn abandon(&mut self) -> Option<AtomicUndoAction> {
        self.depth = 0;
        self.open_action.take()
    }

    fn push_committed(&mut self, action: AtomicUndoAction) {
        self.undo_stack.push_back(action);

        // Clear redo stack (we're on a new timeline now)
        self.redo_stack.clear();

        // Trim history if needed
        while self.undo_stack.len() > self.max_history {
            self.undo_stack.pop_front();
        }
    }

    /// Undo the most recent action
    ///
    /// # Errors
    /// Returns `EmptyStack` if there is nothing to undo, or the first error a
    /// command returns. Commands already run are reversed and the action goes
    /// back on the undo stack.
    pub fn undo(&mut self, target: &mut dyn CommandTarget) -> CommandResult<String> {
        let action = self
            .undo_stack
            .pop_back()
            .ok_or(CommandError::EmptyStack("undo"))?;

        match Self::replay(&action, target) {
            Ok(inverse) => {
                let description = action.description();
                self.redo_stack.push_back(inverse);
                Ok(description)
            }
            Err(e) => {
                self.undo_stack.push_back(action);
                Err(e)
            }
        }
    }

    /// Redo the most recently undone action
    ///
    /// # Errors
    /// Returns `EmptyStack` if there is nothing to redo, or the first error a
    /// command returns. Commands already run are reversed and the action goes
    /// back on the redo stack.
    pub fn redo(&mut self, target: &mut dyn CommandTarget) -> CommandResult<String> {
        let action = self
            .redo_stack
            .pop_back()
            .ok_or(CommandError::EmptyStack("redo"))?;

        match Self::replay(&action, target) {
            Ok(inverse) => {
                let description = action.description();
                self.undo_stack.push_back(inverse);
                Ok(description)
            }
            Err(e) => {
                self.redo_stack.push_back(action);
                Err(e)
            }
        }
    }

    fn replay(
        action: &AtomicUndoAction,
        target: &mut dyn CommandTarget,
    ) -> CommandResult<AtomicUndoAction> {
        let mut inverse = AtomicUndoAction::new();
        for command in action.commands().iter().rev() {
            log::debug!("replaying {}", command);
            match target.execute(command) {
                Ok(undone) => inverse.add_command(undone),
                Err(e) => {
                    Self::roll_back(&inverse, target);
                    return Err(e);
                }
            }
        }
        Ok(inverse)
    }

    /// Reverse the commands of a partially replayed action
    fn roll_back(applied: &AtomicUndoAction, target: &mut dyn CommandTarget) {
        for command in applied.commands().iter().rev() {
            if let Err(e) = target.execute(command) {
                log::error!("Could not roll back {}: {}", command, e);
            }
        }
    }

    /// Install history read from a file, bypassing commit()
    pub fn restore(&mut self, undo: Vec<AtomicUndoAction>, redo: Vec<AtomicUndoAction>) {
        self.undo_stack = undo.into();
        self.redo_stack = redo.into();
        self.open_action = None;
        self.depth = 0;
    }

    /// Actions on the undo stack, oldest first
    pub fn undo_actions(&self) -> impl Iterator<Item = &AtomicUndoAction> {
        self.undo_stack.iter()
    }

    /// Actions on the redo stack, oldest first
    pub fn redo_actions(&self) -> impl Iterator<Item = &AtomicUndoAction> {
        self.redo_stack.iter()
    }

    /// Check if there are actions that can be undone
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if there are actions that can be redone
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.undo_stack.back().map(|a| a.description())
    }

    pub fn redo_description(&self) -> Option<String> {
        self.redo_stack.back().map(|a| a.description())
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.open_action = None;
        self.depth = 0;
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }
}

impl Default for UndoLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::trait_def::ObjectRef;
    use crate::value::Value;

    /// Integer cell addressed as instrument 0; "Set" returns the old value
    struct Counter {
        value: i64,
        executed: Vec<String>,
    }

    impl Counter {
        fn new() -> Self {
            Self {
                value: 0,
                executed: Vec::new(),
            }
        }

        /// Set a new value the way an entity would: mutate, return inverse
        fn set(&mut self, value: i64) -> UndoCommand {
            let old = self.value;
            self.value = value;
            UndoCommand::new(ObjectRef::Instrument(0), "Set", vec![Value::Int(old)])
        }
    }

    impl CommandTarget for Counter {
        fn execute(&mut self, command: &UndoCommand) -> CommandResult<UndoCommand> {
            self.executed.push(command.to_string());
            match (command.operation.as_str(), command.args.as_slice()) {
                ("Set", [Value::Int(v)]) => Ok(self.set(*v)),
                ("Fail", _) => Err(CommandError::Execution("boom".into())),
                _ => Err(CommandError::UnknownOperation {
                    target: command.target.to_string(),
                    operation: command.operation.clone(),
                }),
            }
        }
    }

    #[test]
    fn test_single_command_commits_itself() {
        let mut log = UndoLog::new();
        let mut counter = Counter::new();

        log.add_command(counter.set(5));

        assert_eq!(log.undo_count(), 1);
        assert_eq!(log.redo_count(), 0);
        assert!(log.can_undo());
        assert!(!log.can_redo());
    }

    #[test]
    fn test_undo_then_redo() {
        let mut log = UndoLog::new();
        let mut counter = Counter::new();
        log.add_command(counter.set(5));

        let description = log.undo(&mut counter).unwrap();
        assert_eq!(description, "Set");
        assert_eq!(counter.value, 0);
        assert_eq!(log.undo_count(), 0);
        assert_eq!(log.redo_count(), 1);

        log.redo(&mut counter).unwrap();
        assert_eq!(counter.value, 5);
        assert_eq!(log.undo_count(), 1);
        assert_eq!(log.redo_count(), 0);
    }

    #[test]
    fn test_atomic_action_replays_in_reverse() {
        let mut log = UndoLog::new();
        let mut counter = Counter::new();

        log.begin_action();
        log.add_command(counter.set(1)); // inverse Set(0)
        log.add_command(counter.set(2)); // inverse Set(1)
        log.commit().unwrap();
        assert_eq!(log.undo_count(), 1);

        log.undo(&mut counter).unwrap();
        assert_eq!(counter.value, 0);
        assert_eq!(
            counter.executed,
            vec!["I0.Set(1)".to_string(), "I0.Set(0)".to_string()]
        );

        log.redo(&mut counter).unwrap();
        assert_eq!(counter.value, 2);
    }

    #[test]
    fn test_nested_begin_is_one_action() {
        let mut log = UndoLog::new();
        let mut counter = Counter::new();

        log.begin_action();
        log.add_command(counter.set(1));
        log.begin_action();
        log.add_command(counter.set(2));
        log.commit().unwrap();
        assert_eq!(log.undo_count(), 0);
        log.commit().unwrap();

        assert_eq!(log.undo_count(), 1);
        assert_eq!(log.undo_actions().next().unwrap().len(), 2);
    }

    #[test]
    fn test_redo_stack_cleared_on_commit() {
        let mut log = UndoLog::new();
        let mut counter = Counter::new();

        log.add_command(counter.set(1));
        log.undo(&mut counter).unwrap();
        assert!(log.can_redo());

        log.add_command(counter.set(2));
        assert!(!log.can_redo());
        assert_eq!(log.redo_count(), 0);
    }

    #[test]
    fn test_redo_keeps_remaining_redo_stack() {
        let mut log = UndoLog::new();
        let mut counter = Counter::new();
        log.add_command(counter.set(1));
        log.add_command(counter.set(2));
        log.undo(&mut counter).unwrap();
        log.undo(&mut counter).unwrap();
        assert_eq!(log.redo_count(), 2);

        log.redo(&mut counter).unwrap();
        assert_eq!(log.redo_count(), 1);
        assert_eq!(counter.value, 1);
    }

    #[test]
    fn test_history_limit() {
        let mut log = UndoLog::with_capacity(3);
        let mut counter = Counter::new();

        for i in 0..5 {
            log.add_command(counter.set(i));
        }

        assert_eq!(log.undo_count(), 3);
    }

    #[test]
    fn test_empty_stacks() {
        let mut log = UndoLog::new();
        let mut counter = Counter::new();

        assert_eq!(
            log.undo(&mut counter),
            Err(CommandError::EmptyStack("undo"))
        );
        assert_eq!(
            log.redo(&mut counter),
            Err(CommandError::EmptyStack("redo"))
        );
    }

    #[test]
    fn test_commit_without_begin() {
        let mut log = UndoLog::new();
        assert!(matches!(log.commit(), Err(CommandError::InvalidState(_))));
    }

    #[test]
    fn test_failed_undo_keeps_action() {
        let mut log = UndoLog::new();
        let mut counter = Counter::new();
        log.add_command(UndoCommand::new(ObjectRef::Instrument(0), "Fail", vec![]));

        assert!(log.undo(&mut counter).is_err());
        assert_eq!(log.undo_count(), 1);
        assert_eq!(log.redo_count(), 0);
    }

    #[test]
    fn test_failed_undo_reverses_applied_commands() {
        let mut log = UndoLog::new();
        let mut counter = Counter::new();
        counter.value = 3;
        // Replayed in reverse: Set(8) runs first, then Fail
        log.restore(
            vec![AtomicUndoAction::from_commands(vec![
                UndoCommand::new(ObjectRef::Instrument(0), "Fail", vec![]),
                UndoCommand::new(ObjectRef::Instrument(0), "Set", vec![Value::Int(8)]),
            ])],
            Vec::new(),
        );

        assert_eq!(
            log.undo(&mut counter),
            Err(CommandError::Execution("boom".into()))
        );
        assert_eq!(counter.value, 3);
        assert_eq!(log.undo_count(), 1);
        assert_eq!(log.redo_count(), 0);

        // Retrying applies nothing twice
        assert!(log.undo(&mut counter).is_err());
        assert_eq!(counter.value, 3);
    }

    #[test]
    fn test_restore_bypasses_commit() {
        let mut log = UndoLog::new();
        let mut counter = Counter::new();
        let undo = vec![AtomicUndoAction::from_commands(vec![UndoCommand::new(
            ObjectRef::Instrument(0),
            "Set",
            vec![Value::Int(7)],
        )])];
        let redo = vec![AtomicUndoAction::from_commands(vec![UndoCommand::new(
            ObjectRef::Instrument(0),
            "Set",
            vec![Value::Int(9)],
        )])];

        log.restore(undo, redo);
        assert_eq!(log.undo_count(), 1);
        assert_eq!(log.redo_count(), 1);
        assert!(!log.is_recording());

        log.undo(&mut counter).unwrap();
        assert_eq!(counter.value, 7);
        assert_eq!(log.redo_count(), 2);
    }
}

// Loader for version 0.9 project files, the current format
//
// On top of 0.2: persisted undo/redo history and graveyards of removed
// instruments and events.

use super::v0_2::{restore_event, restore_instrument};
use super::VersionLoader;
use crate::command::registry::{self, TargetKind};
use crate::command::{AtomicUndoAction, ObjectRef, UndoCommand};
use crate::project::ProjectError;
use crate::project::event::Event;
use crate::project::instrument::Instrument;
use crate::project::migration::FormatVersion;
use crate::project::serialization::{XmlElement, load_list};
use crate::project::types::Project;
use std::path::Path;

pub struct V0_9Loader;

impl V0_9Loader {
    /// Decode one persisted command
    ///
    /// `None` when the target or operation is not one the registry accepts;
    /// such a command could never be replayed.
    fn read_command(node: &XmlElement) -> Result<Option<UndoCommand>, ProjectError> {
        let object = node.attr("object").unwrap_or("");
        let function = node.attr("function").unwrap_or("");

        let target: ObjectRef = match object.parse() {
            Ok(target) => target,
            Err(e) => {
                log::warn!("Skipping history command on '{}': {}", object, e);
                return Ok(None);
            }
        };
        let registered = TargetKind::of(&target)
            .map(|kind| registry::is_registered(kind, function))
            .unwrap_or(false);
        if !registered {
            log::warn!("Skipping unknown history command {}.{}", object, function);
            return Ok(None);
        }

        Ok(Some(UndoCommand::new(target, function, load_list(node)?)))
    }

    /// An action with any undecodable command is dropped whole
    fn read_action(node: &XmlElement) -> Result<Option<AtomicUndoAction>, ProjectError> {
        let mut action = AtomicUndoAction::new();
        for command_node in node.children_named("Command") {
            match Self::read_command(command_node)? {
                Some(command) => action.add_command(command),
                None => return Ok(None),
            }
        }
        Ok(Some(action))
    }

    fn read_stack(root: &XmlElement, tag: &str) -> Result<Vec<AtomicUndoAction>, ProjectError> {
        let Some(stack) = root.child(tag) else {
            log::debug!("No saved {} in project file", tag);
            return Ok(Vec::new());
        };
        let mut actions = Vec::new();
        for action_node in stack.children_named("Action") {
            if let Some(action) = Self::read_action(action_node)? {
                actions.push(action);
            }
        }
        Ok(actions)
    }
}

impl VersionLoader for V0_9Loader {
    fn version(&self) -> FormatVersion {
        FormatVersion::V0_9
    }

    fn load_instrument(
        &self,
        project: &Project,
        instrument: &mut Instrument,
        node: &XmlElement,
    ) -> Result<(), ProjectError> {
        restore_instrument(self, project, instrument, node, true)
    }

    fn load_event(
        &self,
        project: &Project,
        asset_dir: &Path,
        event: &mut Event,
        node: &XmlElement,
    ) -> Result<(), ProjectError> {
        restore_event(project, asset_dir, event, node)
    }

    fn load_history(&self, project: &mut Project, root: &XmlElement) -> Result<(), ProjectError> {
        let undo = Self::read_stack(root, "Undo")?;
        let redo = Self::read_stack(root, "Redo")?;
        log::debug!("Restored {} undo and {} redo actions", undo.len(), redo.len());
        project.restore_history(undo, redo);
        Ok(())
    }

    fn has_graveyards(&self) -> bool {
        true
    }
}

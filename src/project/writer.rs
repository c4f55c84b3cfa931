// Project document writer
//
// Always writes the current format version; older files are upgraded by
// loading and saving them.

use crate::command::AtomicUndoAction;
use crate::project::ProjectError;
use crate::project::event::Event;
use crate::project::instrument::Instrument;
use crate::project::migration::FormatVersion;
use crate::project::serialization::{
    XmlElement, levels_to_text, store_dictionary, store_list, write_compressed_document,
};
use crate::project::types::Project;
use crate::value::Value;
use std::path::Path;

/// Root element name of every project document
pub const ROOT_ELEMENT: &str = "JokosherProject";

/// Build the full document for a project
pub fn project_to_document(project: &Project) -> XmlElement {
    let mut root = XmlElement::new(ROOT_ELEMENT).with_attr("version", FormatVersion::CURRENT.as_str());
    root.push(project.to_params().to_xml());

    root.push(history_node("Undo", project.history().undo_actions()));
    root.push(history_node("Redo", project.history().redo_actions()));

    for instrument in project.instruments() {
        root.push(instrument_node("Instrument", instrument));
    }
    for instrument in project.graveyard() {
        root.push(instrument_node("DeadInstrument", instrument));
    }
    root
}

fn history_node<'a>(tag: &str, actions: impl Iterator<Item = &'a AtomicUndoAction>) -> XmlElement {
    let mut node = XmlElement::new(tag);
    for action in actions {
        let mut action_node = XmlElement::new("Action");
        for command in action.commands() {
            let mut command_node = XmlElement::new("Command")
                .with_attr("object", command.target.to_string())
                .with_attr("function", command.operation.as_str());
            store_list(&mut command_node, &command.args);
            action_node.push(command_node);
        }
        node.push(action_node);
    }
    node
}

fn instrument_node(tag: &str, instrument: &Instrument) -> XmlElement {
    let mut node = XmlElement::new(tag).with_attr("id", instrument.id().to_string());
    node.push(instrument.to_params().to_xml());

    for effect in instrument.effects() {
        let mut effect_node = XmlElement::new("GlobalEffect").with_attr("element", effect.factory());
        let entries: Vec<(Value, Value)> = effect
            .properties()
            .iter()
            .map(|(key, value)| (Value::from(key.as_str()), value.clone()))
            .collect();
        store_dictionary(&mut effect_node, &entries);
        node.push(effect_node);
    }

    for event in instrument.events() {
        node.push(event_node("Event", event, instrument.path()));
    }
    for event in instrument.graveyard() {
        node.push(event_node("DeadEvent", event, instrument.path()));
    }
    node
}

fn event_node(tag: &str, event: &Event, asset_dir: &Path) -> XmlElement {
    let mut node = XmlElement::new(tag).with_attr("id", event.id().to_string());
    node.push(event.to_params(asset_dir).to_xml());

    if !event.fade_points().is_empty() {
        let mut fades = XmlElement::new("FadePoints");
        let entries: Vec<(Value, Value)> = event
            .fade_points()
            .iter()
            .map(|(position, gain)| (Value::Float(position), Value::Float(gain)))
            .collect();
        store_dictionary(&mut fades, &entries);
        node.push(fades);
    }
    if !event.levels().is_empty() {
        node.push(XmlElement::new("Levels").with_attr("value", levels_to_text(event.levels())));
    }
    node
}

/// Write the project to `path` as a compressed document
///
/// Listeners are told the project was saved only after the file is in place.
pub fn save_project_file(project: &Project, path: &Path) -> Result<(), ProjectError> {
    let document = project_to_document(project);
    write_compressed_document(path, &document).map_err(|e| match e {
        crate::project::serialization::SerializationError::Io(source) => ProjectError::IoFailure {
            path: path.to_path_buf(),
            source,
        },
        other => ProjectError::Serialization(other),
    })?;
    log::info!("Saved '{}' to {}", project.name(), path.display());
    project.mark_saved();
    Ok(())
}

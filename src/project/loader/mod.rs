// Version-specific project loaders
//
// Each historical file format has its own loader. They share the walk over
// the document (parameters, history, instruments, graveyard) and differ in
// how instruments and events are restored. Dispatch is an exhaustive match
// on FormatVersion; there is no string lookup at this level.

pub mod v0_1;
pub mod v0_2;
pub mod v0_9;

use crate::project::event::Event;
use crate::project::instrument::Instrument;
use crate::project::migration::FormatVersion;
use crate::project::serialization::{
    ParamMap, SerializationError, XmlElement, levels_from_text, load_dictionary,
};
use crate::project::types::Project;
use crate::project::ProjectError;
use std::path::{Path, PathBuf};

/// Restores a project from one version of the document format
pub trait VersionLoader {
    fn version(&self) -> FormatVersion;

    /// Restore one instrument from an `Instrument` or `DeadInstrument` node
    fn load_instrument(
        &self,
        project: &Project,
        instrument: &mut Instrument,
        node: &XmlElement,
    ) -> Result<(), ProjectError>;

    /// Restore one event; `asset_dir` resolves relative file names
    fn load_event(
        &self,
        project: &Project,
        asset_dir: &Path,
        event: &mut Event,
        node: &XmlElement,
    ) -> Result<(), ProjectError>;

    /// Restore persisted undo/redo history; formats without one do nothing
    fn load_history(&self, _project: &mut Project, _root: &XmlElement) -> Result<(), ProjectError> {
        Ok(())
    }

    /// Whether the format persists removed instruments and events
    fn has_graveyards(&self) -> bool {
        false
    }

    /// Populate an empty project from the document root
    fn load_project(&self, project: &mut Project, root: &XmlElement) -> Result<(), ProjectError> {
        let params = read_parameters(root)?;
        project.restore_parameters(&params);
        log::debug!(
            "Loading version {} project '{}'",
            self.version(),
            project.name()
        );

        self.load_history(project, root)?;

        for node in root.children_named("Instrument") {
            let instrument = build_instrument(self, project, node)?;
            project.push_instrument(instrument)?;
        }
        if self.has_graveyards() {
            for node in root.children_named("DeadInstrument") {
                let instrument = build_instrument(self, project, node)?;
                project.bury_instrument(instrument)?;
            }
        }

        log::info!(
            "Loaded '{}': {} instruments, {} in graveyard",
            project.name(),
            project.instruments().len(),
            project.graveyard().len()
        );
        Ok(())
    }
}

/// Loader for a format version
pub fn loader_for(version: FormatVersion) -> &'static dyn VersionLoader {
    match version {
        FormatVersion::V0_1 => &v0_1::V0_1Loader,
        FormatVersion::V0_2 => &v0_2::V0_2Loader,
        FormatVersion::V0_9 => &v0_9::V0_9Loader,
    }
}

/// Decode the required `Parameters` child of `node`
pub(crate) fn read_parameters(node: &XmlElement) -> Result<ParamMap, ProjectError> {
    Ok(ParamMap::from_xml(node.require_child("Parameters")?)?)
}

fn parse_id(node: &XmlElement) -> Option<u32> {
    node.attr("id")?.trim().parse().ok()
}

fn build_instrument<L: VersionLoader + ?Sized>(
    loader: &L,
    project: &Project,
    node: &XmlElement,
) -> Result<Instrument, ProjectError> {
    let id = match parse_id(node) {
        Some(id) if !project.has_instrument_id(id) => id,
        _ => {
            let fresh = project.next_instrument_id();
            log::warn!(
                "Instrument id {:?} is missing or taken, using {}",
                node.attr("id"),
                fresh
            );
            fresh
        }
    };
    let mut instrument = project.create_instrument(id, "", "")?;
    loader.load_instrument(project, &mut instrument, node)?;
    Ok(instrument)
}

/// Restore every `tag` child of an instrument node as an event
///
/// `dead` events go to the instrument's graveyard.
pub(crate) fn load_events<L: VersionLoader + ?Sized>(
    loader: &L,
    project: &Project,
    instrument: &mut Instrument,
    node: &XmlElement,
    tag: &str,
    dead: bool,
) -> Result<(), ProjectError> {
    let wire_graveyard = project.context().settings.wire_graveyard;
    for event_node in node.children_named(tag) {
        let id = match parse_id(event_node) {
            Some(id) if !instrument.has_event_id(id) => id,
            _ => {
                let fresh = instrument.next_event_id();
                log::warn!(
                    "Event id {:?} on instrument {} is missing or taken, using {}",
                    event_node.attr("id"),
                    instrument.id(),
                    fresh
                );
                fresh
            }
        };

        let mut event = Event::new(id, instrument.id(), PathBuf::new());
        loader.load_event(project, instrument.path(), &mut event, event_node)?;
        if dead {
            instrument.push_dead_event(event, wire_graveyard)?;
        } else {
            instrument.push_event(event)?;
        }
    }
    Ok(())
}

/// Restore cached levels, regenerating them when absent or when asked to
pub(crate) fn restore_levels(
    project: &Project,
    event: &mut Event,
    node: &XmlElement,
    regenerate: bool,
) -> Result<(), ProjectError> {
    if let Some(levels) = node.child("Levels") {
        event.set_levels(levels_from_text(levels.attr("value").unwrap_or(""))?);
    }
    if regenerate || event.levels().is_empty() {
        log::debug!("Regenerating levels for {}", event.file().display());
        event.generate_waveform(project.context().settings.levels_per_second);
    }
    Ok(())
}

fn invalid(node: &str, reason: String) -> SerializationError {
    SerializationError::InvalidValue {
        node: node.to_string(),
        reason,
    }
}

/// Fade points stored as a generic dictionary (0.2 onward)
pub(crate) fn read_fade_dictionary(node: &XmlElement) -> Result<Vec<(f64, f64)>, ProjectError> {
    let Some(fades) = node.child("FadePoints") else {
        return Ok(Vec::new());
    };
    load_dictionary(fades)?
        .into_iter()
        .map(|(key, value)| match (key.as_f64(), value.as_f64()) {
            (Some(position), Some(gain)) => Ok((position, gain)),
            _ => Err(invalid("FadePoints", format!("non-numeric fade point {} -> {}", key, value)).into()),
        })
        .collect()
}

/// Global effects of an instrument (0.2 onward)
///
/// An effect whose element cannot be created, or a property the element
/// does not have, is skipped with a warning.
pub(crate) fn load_effects(instrument: &mut Instrument, node: &XmlElement) -> Result<(), ProjectError> {
    for effect_node in node.children_named("GlobalEffect") {
        let Some(factory) = effect_node.attr("element") else {
            log::warn!("GlobalEffect without element name on instrument {}", instrument.id());
            continue;
        };
        let index = match instrument.add_effect(factory) {
            Ok(index) => index,
            Err(e) => {
                log::warn!(
                    "Skipping effect '{}' on instrument {}: {}",
                    factory,
                    instrument.id(),
                    e
                );
                continue;
            }
        };
        for (key, value) in load_dictionary(effect_node)? {
            let key = key.to_text();
            if let Err(e) = instrument.set_effect_property(index, &key, value) {
                log::warn!("Skipping property '{}' of effect '{}': {}", key, factory, e);
            }
        }
    }
    Ok(())
}

/// Shared instrument tail: icon lookup and mixer state onto the graph
pub(crate) fn finish_instrument(project: &Project, instrument: &mut Instrument) -> Result<(), ProjectError> {
    instrument.resolve_icon(&project.context().icons);
    instrument.sync_mixer()?;
    Ok(())
}

// Loader for version 0.2 project files
//
// Adds global effects, dictionary-encoded fade points, and source files
// stored relative to the asset directory.

use super::{
    VersionLoader, finish_instrument, load_effects, load_events, read_fade_dictionary,
    read_parameters, restore_levels,
};
use crate::project::ProjectError;
use crate::project::event::Event;
use crate::project::instrument::Instrument;
use crate::project::migration::FormatVersion;
use crate::project::serialization::XmlElement;
use crate::project::types::Project;
use std::path::Path;

pub struct V0_2Loader;

/// Instrument restore shared by 0.2 and 0.9; only 0.9 has `DeadEvent` nodes
pub(super) fn restore_instrument<L: VersionLoader + ?Sized>(
    loader: &L,
    project: &Project,
    instrument: &mut Instrument,
    node: &XmlElement,
    with_graveyard: bool,
) -> Result<(), ProjectError> {
    let params = read_parameters(node)?;
    instrument.restore_parameters(&params);
    instrument.set_path(project.asset_dir());

    load_effects(instrument, node)?;
    load_events(loader, project, instrument, node, "Event", false)?;
    if with_graveyard {
        load_events(loader, project, instrument, node, "DeadEvent", true)?;
    }
    finish_instrument(project, instrument)
}

/// Event restore shared by 0.2 and 0.9
pub(super) fn restore_event(
    project: &Project,
    asset_dir: &Path,
    event: &mut Event,
    node: &XmlElement,
) -> Result<(), ProjectError> {
    let params = read_parameters(node)?;
    event.restore_parameters(&params);
    event.resolve_file(asset_dir);

    let regenerate = event.is_loading() || event.is_recording();
    restore_levels(project, event, node, regenerate)?;

    event.restore_fade_points(read_fade_dictionary(node)?);
    Ok(())
}

impl VersionLoader for V0_2Loader {
    fn version(&self) -> FormatVersion {
        FormatVersion::V0_2
    }

    fn load_instrument(
        &self,
        project: &Project,
        instrument: &mut Instrument,
        node: &XmlElement,
    ) -> Result<(), ProjectError> {
        restore_instrument(self, project, instrument, node, false)
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
}

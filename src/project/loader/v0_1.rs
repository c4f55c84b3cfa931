// Loader for version 0.1 project files
//
// The earliest format: no effects, no history, no graveyards. The
// instrument type is only recorded through the path of its icon, and fade
// points are positional `FadePoint` children.

use super::{VersionLoader, finish_instrument, load_events, read_parameters, restore_levels};
use crate::project::ProjectError;
use crate::project::event::Event;
use crate::project::instrument::Instrument;
use crate::project::migration::FormatVersion;
use crate::project::serialization::{SerializationError, XmlElement};
use crate::project::types::Project;
use std::path::Path;

pub struct V0_1Loader;

impl V0_1Loader {
    /// `pixbufPath="/usr/share/icons/guitar.png"` names the type "guitar"
    fn type_from_pixbuf(path: &str) -> Option<String> {
        Path::new(path)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .filter(|stem| !stem.is_empty())
    }

    fn read_fade_points(node: &XmlElement) -> Result<Vec<(f64, f64)>, SerializationError> {
        let Some(fades) = node.child("FadePoints") else {
            log::debug!("Missing FadePoints in event node");
            return Ok(Vec::new());
        };
        fades
            .children
            .iter()
            .map(|point| {
                let number = |key: &str| -> Result<f64, SerializationError> {
                    let text = point.attr(key).unwrap_or("");
                    text.trim().parse().map_err(|_| SerializationError::InvalidValue {
                        node: point.name.clone(),
                        reason: format!("{}='{}' is not a number", key, text),
                    })
                };
                Ok((number("position")?, number("fade")?))
            })
            .collect()
    }
}

impl VersionLoader for V0_1Loader {
    fn version(&self) -> FormatVersion {
        FormatVersion::V0_1
    }

    fn load_instrument(
        &self,
        project: &Project,
        instrument: &mut Instrument,
        node: &XmlElement,
    ) -> Result<(), ProjectError> {
        let params = read_parameters(node)?;
        instrument.restore_parameters(&params);
        instrument.set_path(project.asset_dir());

        load_events(self, project, instrument, node, "Event", false)?;

        match params.get_str("pixbufPath").and_then(Self::type_from_pixbuf) {
            Some(instr_type) => instrument.set_instr_type(&instr_type),
            None => log::warn!("Instrument {} has no pixbufPath", instrument.id()),
        }
        finish_instrument(project, instrument)
    }

    fn load_event(
        &self,
        project: &Project,
        asset_dir: &Path,
        event: &mut Event,
        node: &XmlElement,
    ) -> Result<(), ProjectError> {
        let params = read_parameters(node)?;
        event.restore_parameters(&params);
        event.resolve_file(asset_dir);

        restore_levels(project, event, node, event.is_loading())?;
        event.restore_fade_points(Self::read_fade_points(node)?);
        Ok(())
    }
}

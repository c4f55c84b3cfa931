// Event - a placed audio clip inside an instrument

use crate::command::{CommandError, CommandResult, ObjectRef};
use crate::media::{ElementId, MediaGraph, MediaResult, PropertyValue};
use crate::messaging::{Change, ChangeExtra, ListenerSet};
use crate::project::serialization::ParamMap;
use crate::project::waveform;
use crate::value::format_float;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Gain envelope of an event, keyed by position relative to the event start
///
/// Kept sorted by position; at most one gain per position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FadePoints {
    points: Vec<(f64, f64)>,
}

impl FadePoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the gain at `position`, returning the gain it replaced
    pub fn insert(&mut self, position: f64, gain: f64) -> Option<f64> {
        match self.points.binary_search_by(|(p, _)| p.total_cmp(&position)) {
            Ok(index) => Some(std::mem::replace(&mut self.points[index].1, gain)),
            Err(index) => {
                self.points.insert(index, (position, gain));
                None
            }
        }
    }

    pub fn remove(&mut self, position: f64) -> Option<f64> {
        self.points
            .binary_search_by(|(p, _)| p.total_cmp(&position))
            .ok()
            .map(|index| self.points.remove(index).1)
    }

    pub fn get(&self, position: f64) -> Option<f64> {
        self.points
            .binary_search_by(|(p, _)| p.total_cmp(&position))
            .ok()
            .map(|index| self.points[index].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.points.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `pos:gain;pos:gain` form handed to the file source element
    fn to_property_text(&self) -> String {
        self.points
            .iter()
            .map(|(p, g)| format!("{}:{}", format_float(*p), format_float(*g)))
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Copy of an event's content, held by the project clipboard
#[derive(Debug, Clone, PartialEq)]
pub struct EventClip {
    pub name: String,
    pub start: f64,
    pub duration: f64,
    pub offset: f64,
    pub file: PathBuf,
    pub fade_points: FadePoints,
    pub levels: Vec<f32>,
}

pub struct Event {
    id: u32,
    instrument_id: u32,
    name: String,
    /// Seconds from the start of the timeline, never negative
    start: f64,
    duration: f64,
    /// Seconds into the source file where playback begins
    offset: f64,
    file: PathBuf,
    fade_points: FadePoints,
    levels: Vec<f32>,
    is_loading: bool,
    is_recording: bool,
    source: Option<ElementId>,
    listeners: Rc<ListenerSet>,
}

fn clamp_start(start: f64) -> f64 {
    if start.is_finite() { start.max(0.0) } else { 0.0 }
}

impl Event {
    pub fn new(id: u32, instrument_id: u32, file: impl Into<PathBuf>) -> Self {
        let file = file.into();
        let name = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            id,
            instrument_id,
            name,
            start: 0.0,
            duration: 0.0,
            offset: 0.0,
            file,
            fade_points: FadePoints::new(),
            levels: Vec::new(),
            is_loading: false,
            is_recording: false,
            source: None,
            listeners: ListenerSet::new(),
        }
    }

    /// New event carrying a clipboard clip, placed at `start`
    pub fn from_clip(id: u32, instrument_id: u32, clip: &EventClip, start: f64) -> Self {
        let mut event = Self::new(id, instrument_id, clip.file.clone());
        event.name = clip.name.clone();
        event.start = clamp_start(start);
        event.duration = clip.duration;
        event.offset = clip.offset;
        event.fade_points = clip.fade_points.clone();
        event.levels = clip.levels.clone();
        event
    }

    pub fn to_clip(&self) -> EventClip {
        EventClip {
            name: self.name.clone(),
            start: self.start,
            duration: self.duration,
            offset: self.offset,
            file: self.file.clone(),
            fade_points: self.fade_points.clone(),
            levels: self.levels.clone(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn instrument_id(&self) -> u32 {
        self.instrument_id
    }

    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::Event {
            instrument: self.instrument_id,
            event: self.id,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Absolute path of the source audio file
    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn fade_points(&self) -> &FadePoints {
        &self.fade_points
    }

    pub fn levels(&self) -> &[f32] {
        &self.levels
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    pub fn source_element(&self) -> Option<ElementId> {
        self.source
    }

    pub fn listeners(&self) -> &Rc<ListenerSet> {
        &self.listeners
    }

    fn notify(&self, change: Change, extra: Option<ChangeExtra>) {
        self.listeners
            .notify(&self.object_ref(), change, extra.as_ref());
    }

    pub fn set_name(&mut self, name: &str) -> String {
        let old = std::mem::replace(&mut self.name, name.to_string());
        self.notify(Change::Name, None);
        old
    }

    /// Move the event; negative or non-finite starts clamp to 0
    ///
    /// Returns the previous start.
    pub fn move_to(&mut self, start: f64) -> f64 {
        let old = self.start;
        self.start = clamp_start(start);
        self.notify(Change::Moved, Some(ChangeExtra::Position(self.start)));
        old
    }

    pub fn set_duration(&mut self, duration: f64) {
        self.duration = duration.max(0.0);
        self.notify(Change::Duration, None);
    }

    /// Whether a fade point may sit at `position`
    pub fn accepts_fade_position(&self, position: f64) -> bool {
        position.is_finite() && position >= 0.0 && position < self.duration
    }

    /// Set a fade point, returning the gain it replaced
    ///
    /// # Errors
    /// Rejects positions outside `[0, duration)` and non-finite gains.
    pub fn set_fade_point(&mut self, position: f64, gain: f64) -> CommandResult<Option<f64>> {
        if !self.accepts_fade_position(position) {
            return Err(CommandError::InvalidArguments {
                operation: "SetFadePoint".to_string(),
                reason: format!(
                    "position {} outside [0, {})",
                    position,
                    format_float(self.duration)
                ),
            });
        }
        if !gain.is_finite() {
            return Err(CommandError::InvalidArguments {
                operation: "SetFadePoint".to_string(),
                reason: format!("gain {} is not finite", gain),
            });
        }
        let old = self.fade_points.insert(position, gain);
        self.notify(Change::FadePoints, None);
        Ok(old)
    }

    pub fn remove_fade_point(&mut self, position: f64) -> Option<f64> {
        let old = self.fade_points.remove(position);
        if old.is_some() {
            self.notify(Change::FadePoints, None);
        }
        old
    }

    /// Replace the fade envelope with persisted points
    ///
    /// Points outside `[0, duration)` are dropped with a warning. Returns how
    /// many were dropped.
    pub fn restore_fade_points(&mut self, points: impl IntoIterator<Item = (f64, f64)>) -> usize {
        let mut restored = FadePoints::new();
        let mut dropped = 0;
        for (position, gain) in points {
            if self.accepts_fade_position(position) && gain.is_finite() {
                restored.insert(position, gain);
            } else {
                log::warn!(
                    "Dropping fade point {} on event {} (duration {})",
                    position,
                    self.object_ref(),
                    self.duration
                );
                dropped += 1;
            }
        }
        self.fade_points = restored;
        dropped
    }

    pub fn set_levels(&mut self, levels: Vec<f32>) {
        self.levels = levels;
        self.notify(Change::Levels, None);
    }

    /// Recompute levels from the source file
    ///
    /// Also fills in a missing duration and clears the loading flag. A file
    /// that cannot be decoded is logged and leaves the levels as they were.
    pub fn generate_waveform(&mut self, levels_per_second: u32) -> bool {
        match waveform::generate_levels(&self.file, levels_per_second) {
            Ok(generated) => {
                if self.duration <= 0.0 {
                    self.duration = generated.duration;
                }
                self.is_loading = false;
                self.set_levels(generated.levels);
                true
            }
            Err(e) => {
                log::warn!(
                    "Cannot generate waveform for {}: {}",
                    self.file.display(),
                    e
                );
                false
            }
        }
    }

    /// Resolve a relative source file against the instrument's asset directory
    pub fn resolve_file(&mut self, asset_dir: &Path) {
        if self.file.is_relative() && !self.file.as_os_str().is_empty() {
            self.file = asset_dir.join(&self.file);
        }
    }

    /// Flat parameters as persisted; files inside `asset_dir` are stored relative
    pub fn to_params(&self, asset_dir: &Path) -> ParamMap {
        let file = self
            .file
            .strip_prefix(asset_dir)
            .unwrap_or(&self.file)
            .to_string_lossy()
            .into_owned();

        let mut params = ParamMap::new();
        params.insert("name", self.name.as_str());
        params.insert("start", self.start);
        params.insert("duration", self.duration);
        params.insert("offset", self.offset);
        params.insert("file", file);
        params.insert("isLoading", self.is_loading);
        params.insert("isRecording", self.is_recording);
        params
    }

    /// Apply persisted parameters; unknown keys are ignored
    pub fn restore_parameters(&mut self, params: &ParamMap) {
        if let Some(name) = params.get_str("name") {
            self.name = name.to_string();
        }
        if let Some(start) = params.get_f64("start") {
            if start < 0.0 {
                log::warn!("Event {} had negative start {}, clamping", self.object_ref(), start);
            }
            self.start = clamp_start(start);
        }
        if let Some(duration) = params.get_f64("duration") {
            self.duration = duration.max(0.0);
        }
        if let Some(offset) = params.get_f64("offset") {
            self.offset = offset.max(0.0);
        }
        if let Some(file) = params.get_str("file") {
            self.file = PathBuf::from(file);
        }
        if let Some(loading) = params.get_bool("isLoading") {
            self.is_loading = loading;
        }
        if let Some(recording) = params.get_bool("isRecording") {
            self.is_recording = recording;
        }
    }

    // -----------------------------------------------------------------------
    // Media graph

    /// Create the file source element inside `composition`
    pub fn materialize(&mut self, graph: &dyn MediaGraph, composition: ElementId) -> MediaResult<()> {
        if let Some(old) = self.source.take() {
            graph.release(old)?;
        }
        let source = graph.create_element("gnlfilesource")?;
        self.source = Some(source);
        self.sync_graph(graph)?;
        graph.add_child(composition, source)
    }

    /// Push timing, file and fades onto the source element
    pub fn sync_graph(&self, graph: &dyn MediaGraph) -> MediaResult<()> {
        let Some(source) = self.source else {
            return Ok(());
        };
        graph.set_property(
            source,
            "location",
            PropertyValue::Str(self.file.to_string_lossy().into_owned()),
        )?;
        graph.set_property(source, "start", PropertyValue::Float(self.start))?;
        graph.set_property(source, "duration", PropertyValue::Float(self.duration))?;
        graph.set_property(source, "media-start", PropertyValue::Float(self.offset))?;
        graph.set_property(source, "media-duration", PropertyValue::Float(self.duration))?;
        graph.set_property(
            source,
            "fade-points",
            PropertyValue::Str(self.fade_points.to_property_text()),
        )
    }

    /// Take the source out of the composition without releasing it
    pub fn detach(&self, graph: &dyn MediaGraph, composition: ElementId) -> MediaResult<()> {
        match self.source {
            Some(source) => graph.remove_child(composition, source),
            None => Ok(()),
        }
    }

    pub fn attach(&self, graph: &dyn MediaGraph, composition: ElementId) -> MediaResult<()> {
        match self.source {
            Some(source) => graph.add_child(composition, source),
            None => Ok(()),
        }
    }

    /// Release the source element
    pub fn release(&mut self, graph: &dyn MediaGraph) {
        if let Some(source) = self.source.take() {
            if let Err(e) = graph.release(source) {
                log::debug!("Releasing source of event {}: {}", self.object_ref(), e);
            }
        }
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("start", &self.start)
            .field("duration", &self.duration)
            .field("file", &self.file)
            .finish()
    }
}

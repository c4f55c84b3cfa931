// Project - the session aggregate
//
// Owns instruments (and their events), the transport, the clipboard and the
// undo history, plus the pipeline every instrument bin is linked into.
// Edits go through `perform`, which runs the command registry and records
// the returned inverse; the registry handlers are the `apply_*` methods.

use crate::command::{CommandError, CommandResult, ObjectRef, UndoCommand, UndoLog, registry};
use crate::context::SessionContext;
use crate::media::{ElementId, ElementState, MediaError, MediaGraph, MediaResult};
use crate::messaging::{Change, ChangeExtra, ListenerSet};
use crate::project::ProjectError;
use crate::project::event::{Event, EventClip};
use crate::project::instrument::Instrument;
use crate::project::serialization::ParamMap;
use crate::sequencer::{Transport, TransportMode};
use crate::value::Value;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Name of the asset directory next to the project file
pub const AUDIO_DIR: &str = "audio";

/// Default zoom, in pixels per second
pub const DEFAULT_VIEW_SCALE: f64 = 25.0;

#[derive(Debug, Clone, Copy)]
struct PipelineElements {
    pipeline: ElementId,
    adder: ElementId,
    convert: ElementId,
    volume: ElementId,
    level: ElementId,
    sink: ElementId,
}

pub struct Project {
    name: String,
    author: String,
    project_file: Option<PathBuf>,
    view_start: f64,
    view_scale: f64,
    transport: Transport,
    solo_count: u32,
    instruments: Vec<Instrument>,
    graveyard: Vec<Instrument>,
    clipboard: Vec<EventClip>,
    history: UndoLog,
    listeners: Rc<ListenerSet>,
    context: SessionContext,
    elements: PipelineElements,
}

impl Project {
    /// Create an empty project and its output pipeline
    ///
    /// # Errors
    /// `ElementNotFound` naming the first required plugin the graph lacks.
    pub fn new(context: SessionContext) -> MediaResult<Self> {
        let graph = Rc::clone(&context.graph);
        for plugin in &context.settings.required_plugins {
            if !graph.has_factory(plugin) {
                return Err(MediaError::ElementNotFound {
                    factory: plugin.clone(),
                });
            }
        }

        let elements = Self::build_pipeline(graph.as_ref())?;
        let history = UndoLog::with_capacity(context.settings.max_undo_history);

        Ok(Self {
            name: String::new(),
            author: String::new(),
            project_file: None,
            view_start: 0.0,
            view_scale: DEFAULT_VIEW_SCALE,
            transport: Transport::new(),
            solo_count: 0,
            instruments: Vec::new(),
            graveyard: Vec::new(),
            clipboard: Vec::new(),
            history,
            listeners: ListenerSet::new(),
            context,
            elements,
        })
    }

    fn build_pipeline(graph: &dyn MediaGraph) -> MediaResult<PipelineElements> {
        let mut created = Vec::new();
        let result = (|| -> MediaResult<PipelineElements> {
            let mut make = |factory: &str| -> MediaResult<ElementId> {
                let element = graph.create_element(factory)?;
                created.push(element);
                Ok(element)
            };
            let elements = PipelineElements {
                pipeline: make("pipeline")?,
                adder: make("adder")?,
                convert: make("audioconvert")?,
                volume: make("volume")?,
                level: make("level")?,
                sink: make("autoaudiosink")?,
            };
            for child in [
                elements.adder,
                elements.convert,
                elements.volume,
                elements.level,
                elements.sink,
            ] {
                graph.add_child(elements.pipeline, child)?;
            }
            graph.set_state(elements.pipeline, ElementState::Ready)?;
            Ok(elements)
        })();

        if result.is_err() {
            for element in created {
                let _ = graph.release(element);
            }
        }
        result
    }

    // -----------------------------------------------------------------------
    // Accessors

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
        self.notify(Change::Name, None);
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn set_author(&mut self, author: &str) {
        self.author = author.to_string();
        self.notify(Change::Author, None);
    }

    pub fn project_file(&self) -> Option<&Path> {
        self.project_file.as_deref()
    }

    pub fn set_project_file(&mut self, path: impl Into<PathBuf>) {
        self.project_file = Some(path.into());
    }

    /// Asset directory, `<project dir>/audio`
    pub fn asset_dir(&self) -> PathBuf {
        self.project_file
            .as_deref()
            .and_then(Path::parent)
            .map(|dir| dir.join(AUDIO_DIR))
            .unwrap_or_else(|| PathBuf::from(AUDIO_DIR))
    }

    pub fn view_start(&self) -> f64 {
        self.view_start
    }

    pub fn view_scale(&self) -> f64 {
        self.view_scale
    }

    pub fn set_view(&mut self, start: f64, scale: f64) {
        self.view_start = start.max(0.0);
        if scale > 0.0 {
            self.view_scale = scale;
        }
        self.notify(Change::ViewChanged, None);
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut Transport {
        &mut self.transport
    }

    /// Number of soloed active instruments
    pub fn solo_count(&self) -> u32 {
        self.solo_count
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    pub fn instrument(&self, id: u32) -> Option<&Instrument> {
        self.instruments.iter().find(|i| i.id() == id)
    }

    pub fn instrument_mut(&mut self, id: u32) -> Option<&mut Instrument> {
        self.instruments.iter_mut().find(|i| i.id() == id)
    }

    pub fn graveyard(&self) -> &[Instrument] {
        &self.graveyard
    }

    pub fn clipboard(&self) -> &[EventClip] {
        &self.clipboard
    }

    pub fn history(&self) -> &UndoLog {
        &self.history
    }

    pub fn listeners(&self) -> &Rc<ListenerSet> {
        &self.listeners
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn pipeline(&self) -> ElementId {
        self.elements.pipeline
    }

    fn graph(&self) -> Rc<dyn MediaGraph> {
        Rc::clone(&self.context.graph)
    }

    fn wire_graveyard(&self) -> bool {
        self.context.settings.wire_graveyard
    }

    fn notify(&self, change: Change, extra: Option<ChangeExtra>) {
        self.listeners
            .notify(&ObjectRef::Project, change, extra.as_ref());
    }

    /// Smallest id not used by any active or buried instrument
    pub fn next_instrument_id(&self) -> u32 {
        self.instruments
            .iter()
            .chain(self.graveyard.iter())
            .map(|i| i.id() + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn has_instrument_id(&self, id: u32) -> bool {
        self.instruments
            .iter()
            .chain(self.graveyard.iter())
            .any(|i| i.id() == id)
    }

    // -----------------------------------------------------------------------
    // Construction contracts used by loaders

    /// Create an unlinked instrument whose assets live in this project
    pub fn create_instrument(&self, id: u32, name: &str, instr_type: &str) -> MediaResult<Instrument> {
        let mut instrument = Instrument::new(id, name, instr_type, self.graph())?;
        instrument.set_path(self.asset_dir());
        Ok(instrument)
    }

    /// Link an instrument into the pipeline and append it
    pub fn push_instrument(&mut self, mut instrument: Instrument) -> MediaResult<()> {
        self.graph().add_child(self.elements.pipeline, instrument.bin())?;
        instrument.attach_transport(&self.transport);
        if instrument.is_solo() {
            self.solo_count += 1;
        }
        let id = instrument.id();
        self.instruments.push(instrument);
        self.refresh_mute_states()?;
        self.notify(Change::InstrumentAdded, Some(ChangeExtra::Id(id)));
        Ok(())
    }

    /// Place a persisted dead instrument straight into the graveyard
    pub fn bury_instrument(&mut self, mut instrument: Instrument) -> MediaResult<()> {
        if self.wire_graveyard() {
            self.graph().add_child(self.elements.pipeline, instrument.bin())?;
            instrument.attach_transport(&self.transport);
        }
        self.graveyard.push(instrument);
        Ok(())
    }

    /// Apply persisted project parameters; unknown keys are ignored
    pub fn restore_parameters(&mut self, params: &ParamMap) {
        if let Some(name) = params.get_str("name") {
            self.name = name.to_string();
        }
        if let Some(author) = params.get_str("author") {
            self.author = author.to_string();
        }
        if let Some(start) = params.get_f64("viewStart") {
            self.view_start = start.max(0.0);
        }
        if let Some(scale) = params.get_f64("viewScale").filter(|s| *s > 0.0) {
            self.view_scale = scale;
        }
        if let Some(mode) = params.get_i64("transportMode") {
            match TransportMode::from_i64(mode) {
                Some(mode) => self.transport.set_mode(mode),
                None => log::warn!("Ignoring unknown transport mode {}", mode),
            }
        }
    }

    pub fn to_params(&self) -> ParamMap {
        let mut params = ParamMap::new();
        params.insert("name", self.name.as_str());
        params.insert("author", self.author.as_str());
        params.insert("viewStart", self.view_start);
        params.insert("viewScale", self.view_scale);
        params.insert("transportMode", self.transport.mode().as_i64());
        params
    }

    /// Install persisted history without recording anything
    pub fn restore_history(
        &mut self,
        undo: Vec<crate::command::AtomicUndoAction>,
        redo: Vec<crate::command::AtomicUndoAction>,
    ) {
        self.history.restore(undo, redo);
    }

    fn refresh_mute_states(&mut self) -> MediaResult<()> {
        let solo_count = self.solo_count;
        for instrument in &mut self.instruments {
            instrument.update_mute(solo_count)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Recorded edits

    /// Run one command and record its inverse
    pub fn perform(&mut self, command: UndoCommand) -> Result<(), ProjectError> {
        let inverse = registry::execute(self, &command)?;
        self.history.add_command(inverse);
        Ok(())
    }

    /// Group the following edits into one undo action
    pub fn begin_action(&mut self) {
        self.history.begin_action();
    }

    pub fn commit_action(&mut self) -> Result<(), ProjectError> {
        self.history.commit()?;
        Ok(())
    }

    /// Undo the latest action; returns its description
    pub fn undo(&mut self) -> Result<String, ProjectError> {
        let mut history = std::mem::take(&mut self.history);
        let result = history.undo(self);
        self.history = history;
        let description = result?;
        self.notify(Change::Undo, None);
        Ok(description)
    }

    /// Redo the latest undone action; returns its description
    pub fn redo(&mut self) -> Result<String, ProjectError> {
        let mut history = std::mem::take(&mut self.history);
        let result = history.redo(self);
        self.history = history;
        let description = result?;
        self.notify(Change::Redo, None);
        Ok(description)
    }

    pub fn add_instrument(&mut self, name: &str, instr_type: &str) -> Result<u32, ProjectError> {
        let id = self.next_instrument_id();
        let mut instrument = self.create_instrument(id, name, instr_type)?;
        instrument.resolve_icon(&self.context.icons);
        self.push_instrument(instrument)?;
        self.history.add_command(UndoCommand::new(
            ObjectRef::Project,
            "DeleteInstrument",
            vec![Value::from(id)],
        ));
        log::info!("Added instrument {} '{}'", id, name);
        Ok(id)
    }

    pub fn delete_instrument(&mut self, id: u32) -> Result<(), ProjectError> {
        self.perform(UndoCommand::new(
            ObjectRef::Project,
            "DeleteInstrument",
            vec![Value::from(id)],
        ))
    }

    pub fn move_instrument(&mut self, id: u32, index: usize) -> Result<(), ProjectError> {
        self.perform(UndoCommand::new(
            ObjectRef::Project,
            "MoveInstrument",
            vec![Value::from(id), Value::from(index)],
        ))
    }

    pub fn set_instrument_name(&mut self, id: u32, name: &str) -> Result<(), ProjectError> {
        self.perform(UndoCommand::new(
            ObjectRef::Instrument(id),
            "SetName",
            vec![Value::from(name)],
        ))
    }

    pub fn set_instrument_pan(&mut self, id: u32, pan: f64) -> Result<(), ProjectError> {
        self.perform(UndoCommand::new(
            ObjectRef::Instrument(id),
            "SetPan",
            vec![Value::from(pan)],
        ))
    }

    pub fn set_instrument_volume(&mut self, id: u32, volume: f64) -> Result<(), ProjectError> {
        self.perform(UndoCommand::new(
            ObjectRef::Instrument(id),
            "SetVolume",
            vec![Value::from(volume)],
        ))
    }

    pub fn toggle_mute(&mut self, id: u32) -> Result<(), ProjectError> {
        self.perform(UndoCommand::new(ObjectRef::Instrument(id), "ToggleMute", vec![]))
    }

    pub fn toggle_solo(&mut self, id: u32) -> Result<(), ProjectError> {
        self.perform(UndoCommand::new(ObjectRef::Instrument(id), "ToggleSolo", vec![]))
    }

    /// Add an event playing `file`, placed at `start` (clamped to 0)
    ///
    /// Levels and duration come from decoding the file; an undecodable file
    /// still yields an event, with no levels.
    pub fn add_event_from_file(
        &mut self,
        instrument_id: u32,
        start: f64,
        file: impl Into<PathBuf>,
    ) -> Result<u32, ProjectError> {
        let levels_per_second = self.context.settings.levels_per_second;
        let instrument = self
            .instrument_mut(instrument_id)
            .ok_or_else(|| CommandError::UnknownTarget(ObjectRef::Instrument(instrument_id).to_string()))?;

        let id = instrument.next_event_id();
        let mut event = Event::new(id, instrument_id, file);
        event.move_to(start);
        event.generate_waveform(levels_per_second);
        instrument.push_event(event)?;

        self.history.add_command(UndoCommand::new(
            ObjectRef::Instrument(instrument_id),
            "DeleteEvent",
            vec![Value::from(id)],
        ));
        Ok(id)
    }

    pub fn delete_event(&mut self, instrument_id: u32, event_id: u32) -> Result<(), ProjectError> {
        self.perform(UndoCommand::new(
            ObjectRef::Instrument(instrument_id),
            "DeleteEvent",
            vec![Value::from(event_id)],
        ))
    }

    pub fn move_event(&mut self, instrument_id: u32, event_id: u32, start: f64) -> Result<(), ProjectError> {
        self.perform(UndoCommand::new(
            ObjectRef::Event {
                instrument: instrument_id,
                event: event_id,
            },
            "Move",
            vec![Value::from(start)],
        ))
    }

    pub fn set_event_name(&mut self, instrument_id: u32, event_id: u32, name: &str) -> Result<(), ProjectError> {
        self.perform(UndoCommand::new(
            ObjectRef::Event {
                instrument: instrument_id,
                event: event_id,
            },
            "SetName",
            vec![Value::from(name)],
        ))
    }

    pub fn set_fade_point(
        &mut self,
        instrument_id: u32,
        event_id: u32,
        position: f64,
        gain: f64,
    ) -> Result<(), ProjectError> {
        self.perform(UndoCommand::new(
            ObjectRef::Event {
                instrument: instrument_id,
                event: event_id,
            },
            "SetFadePoint",
            vec![Value::from(position), Value::from(gain)],
        ))
    }

    pub fn remove_fade_point(&mut self, instrument_id: u32, event_id: u32, position: f64) -> Result<(), ProjectError> {
        self.perform(UndoCommand::new(
            ObjectRef::Event {
                instrument: instrument_id,
                event: event_id,
            },
            "RemoveFadePoint",
            vec![Value::from(position)],
        ))
    }

    /// Replace the clipboard with copies of the given events
    pub fn copy_events(&mut self, events: &[(u32, u32)]) -> Result<usize, ProjectError> {
        let mut clips = Vec::with_capacity(events.len());
        for &(instrument_id, event_id) in events {
            let event = self
                .instrument(instrument_id)
                .and_then(|i| i.event(event_id))
                .ok_or_else(|| {
                    CommandError::UnknownTarget(
                        ObjectRef::Event {
                            instrument: instrument_id,
                            event: event_id,
                        }
                        .to_string(),
                    )
                })?;
            clips.push(event.to_clip());
        }
        self.clipboard = clips;
        self.notify(Change::ClipboardChanged, None);
        Ok(self.clipboard.len())
    }

    /// Paste the clipboard into an instrument, earliest clip at `start`
    ///
    /// Recorded as one action. Returns the ids of the new events.
    pub fn paste_clipboard(&mut self, instrument_id: u32, start: f64) -> Result<Vec<u32>, ProjectError> {
        let clips = self.clipboard.clone();
        let earliest = clips.iter().map(|c| c.start).fold(f64::INFINITY, f64::min);

        self.history.begin_action();
        let result = (|| -> Result<Vec<u32>, ProjectError> {
            let mut pasted = Vec::with_capacity(clips.len());
            for clip in &clips {
                let instrument = self.instrument_mut(instrument_id).ok_or_else(|| {
                    CommandError::UnknownTarget(ObjectRef::Instrument(instrument_id).to_string())
                })?;
                let id = instrument.next_event_id();
                let event = Event::from_clip(id, instrument_id, clip, start + (clip.start - earliest));
                instrument.push_event(event)?;
                self.history.add_command(UndoCommand::new(
                    ObjectRef::Instrument(instrument_id),
                    "DeleteEvent",
                    vec![Value::from(id)],
                ));
                pasted.push(id);
            }
            Ok(pasted)
        })();
        self.history.commit()?;
        result
    }

    // -----------------------------------------------------------------------
    // Registry handlers; each returns the inverse command and records nothing

    fn instrument_index(&self, id: u32) -> CommandResult<usize> {
        self.instruments
            .iter()
            .position(|i| i.id() == id)
            .ok_or_else(|| CommandError::UnknownTarget(ObjectRef::Instrument(id).to_string()))
    }

    fn active_instrument(&mut self, id: u32) -> CommandResult<&mut Instrument> {
        let index = self.instrument_index(id)?;
        Ok(&mut self.instruments[index])
    }

    pub(crate) fn apply_delete_instrument(&mut self, id: u32) -> CommandResult<UndoCommand> {
        let index = self.instrument_index(id)?;
        if !self.wire_graveyard() {
            self.graph()
                .remove_child(self.elements.pipeline, self.instruments[index].bin())?;
        }
        let mut instrument = self.instruments.remove(index);
        if !self.wire_graveyard() {
            instrument.detach_transport();
        }
        if instrument.is_solo() {
            self.solo_count = self.solo_count.saturating_sub(1);
        }
        self.graveyard.push(instrument);
        self.refresh_mute_states()?;
        self.notify(Change::InstrumentRemoved, Some(ChangeExtra::Id(id)));

        Ok(UndoCommand::new(
            ObjectRef::Project,
            "ResurrectInstrument",
            vec![Value::from(id), Value::from(index)],
        ))
    }

    pub(crate) fn apply_resurrect_instrument(&mut self, id: u32, index: Option<usize>) -> CommandResult<UndoCommand> {
        let position = self
            .graveyard
            .iter()
            .position(|i| i.id() == id)
            .ok_or_else(|| CommandError::UnknownTarget(ObjectRef::Instrument(id).to_string()))?;
        if !self.wire_graveyard() {
            self.graph()
                .add_child(self.elements.pipeline, self.graveyard[position].bin())?;
        }
        let mut instrument = self.graveyard.remove(position);
        if !instrument.follows_transport() {
            instrument.attach_transport(&self.transport);
        }
        if instrument.is_solo() {
            self.solo_count += 1;
        }
        let index = index
            .unwrap_or(self.instruments.len())
            .min(self.instruments.len());
        self.instruments.insert(index, instrument);
        self.refresh_mute_states()?;
        self.notify(Change::InstrumentAdded, Some(ChangeExtra::Id(id)));

        Ok(UndoCommand::new(
            ObjectRef::Project,
            "DeleteInstrument",
            vec![Value::from(id)],
        ))
    }

    pub(crate) fn apply_move_instrument(&mut self, id: u32, index: usize) -> CommandResult<UndoCommand> {
        let old = self.instrument_index(id)?;
        let instrument = self.instruments.remove(old);
        let index = index.min(self.instruments.len());
        self.instruments.insert(index, instrument);
        self.notify(Change::InstrumentReordered, Some(ChangeExtra::Id(id)));

        Ok(UndoCommand::new(
            ObjectRef::Project,
            "MoveInstrument",
            vec![Value::from(id), Value::from(old)],
        ))
    }

    pub(crate) fn apply_set_instrument_name(&mut self, id: u32, name: &str) -> CommandResult<UndoCommand> {
        let old = self.active_instrument(id)?.set_name(name);
        Ok(UndoCommand::new(ObjectRef::Instrument(id), "SetName", vec![Value::from(old)]))
    }

    pub(crate) fn apply_set_pan(&mut self, id: u32, pan: f64) -> CommandResult<UndoCommand> {
        let old = self.active_instrument(id)?.set_pan(pan)?;
        Ok(UndoCommand::new(ObjectRef::Instrument(id), "SetPan", vec![Value::from(old)]))
    }

    pub(crate) fn apply_set_volume(&mut self, id: u32, volume: f64) -> CommandResult<UndoCommand> {
        let old = self.active_instrument(id)?.set_volume(volume)?;
        Ok(UndoCommand::new(ObjectRef::Instrument(id), "SetVolume", vec![Value::from(old)]))
    }

    pub(crate) fn apply_toggle_mute(&mut self, id: u32) -> CommandResult<UndoCommand> {
        let solo_count = self.solo_count;
        self.active_instrument(id)?.toggle_mute(solo_count)?;
        Ok(UndoCommand::new(ObjectRef::Instrument(id), "ToggleMute", vec![]))
    }

    pub(crate) fn apply_toggle_solo(&mut self, id: u32) -> CommandResult<UndoCommand> {
        if self.active_instrument(id)?.toggle_solo() {
            self.solo_count += 1;
        } else {
            self.solo_count = self.solo_count.saturating_sub(1);
        }
        self.refresh_mute_states()?;
        Ok(UndoCommand::new(ObjectRef::Instrument(id), "ToggleSolo", vec![]))
    }

    pub(crate) fn apply_delete_event(&mut self, instrument_id: u32, event_id: u32) -> CommandResult<UndoCommand> {
        let wire = self.wire_graveyard();
        let instrument = self.active_instrument(instrument_id)?;
        let index = instrument
            .events()
            .iter()
            .position(|e| e.id() == event_id);
        instrument.bury_event(event_id, wire)?;

        let mut args = vec![Value::from(event_id)];
        args.extend(index.map(Value::from));
        Ok(UndoCommand::new(ObjectRef::Instrument(instrument_id), "ResurrectEvent", args))
    }

    pub(crate) fn apply_resurrect_event(
        &mut self,
        instrument_id: u32,
        event_id: u32,
        index: Option<usize>,
    ) -> CommandResult<UndoCommand> {
        let wire = self.wire_graveyard();
        let instrument = self.active_instrument(instrument_id)?;
        instrument.resurrect_event(event_id, wire)?;
        if let Some(index) = index {
            instrument.reorder_event(event_id, index);
        }
        Ok(UndoCommand::new(
            ObjectRef::Instrument(instrument_id),
            "DeleteEvent",
            vec![Value::from(event_id)],
        ))
    }

    pub(crate) fn apply_move_event(&mut self, instrument_id: u32, event_id: u32, start: f64) -> CommandResult<UndoCommand> {
        let old = self
            .active_instrument(instrument_id)?
            .with_event(event_id, |event| Ok(event.move_to(start)))?;
        Ok(UndoCommand::new(
            ObjectRef::Event {
                instrument: instrument_id,
                event: event_id,
            },
            "Move",
            vec![Value::from(old)],
        ))
    }

    pub(crate) fn apply_set_event_name(&mut self, instrument_id: u32, event_id: u32, name: &str) -> CommandResult<UndoCommand> {
        let old = self
            .active_instrument(instrument_id)?
            .with_event(event_id, |event| Ok(event.set_name(name)))?;
        Ok(UndoCommand::new(
            ObjectRef::Event {
                instrument: instrument_id,
                event: event_id,
            },
            "SetName",
            vec![Value::from(old)],
        ))
    }

    pub(crate) fn apply_set_fade_point(
        &mut self,
        instrument_id: u32,
        event_id: u32,
        position: f64,
        gain: f64,
    ) -> CommandResult<UndoCommand> {
        let old = self
            .active_instrument(instrument_id)?
            .with_event(event_id, |event| event.set_fade_point(position, gain))?;
        let target = ObjectRef::Event {
            instrument: instrument_id,
            event: event_id,
        };
        Ok(match old {
            Some(old_gain) => UndoCommand::new(
                target,
                "SetFadePoint",
                vec![Value::from(position), Value::from(old_gain)],
            ),
            None => UndoCommand::new(target, "RemoveFadePoint", vec![Value::from(position)]),
        })
    }

    pub(crate) fn apply_remove_fade_point(
        &mut self,
        instrument_id: u32,
        event_id: u32,
        position: f64,
    ) -> CommandResult<UndoCommand> {
        let old = self
            .active_instrument(instrument_id)?
            .with_event(event_id, |event| {
                event
                    .remove_fade_point(position)
                    .ok_or_else(|| CommandError::InvalidArguments {
                        operation: "RemoveFadePoint".to_string(),
                        reason: format!("no fade point at {}", position),
                    })
            })?;
        Ok(UndoCommand::new(
            ObjectRef::Event {
                instrument: instrument_id,
                event: event_id,
            },
            "SetFadePoint",
            vec![Value::from(position), Value::from(old)],
        ))
    }

    // -----------------------------------------------------------------------

    /// Tell listeners the project is going away, then release it
    pub fn close(self) {
        log::info!("Closing project '{}'", self.name);
        self.notify(Change::Closing, None);
    }

    /// Notify listeners that the project was written to disk
    pub(crate) fn mark_saved(&self) {
        let extra = self.project_file.clone().map(ChangeExtra::File);
        self.notify(Change::Saved, extra);
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        let graph = self.graph();
        let _ = graph.set_state(self.elements.pipeline, ElementState::Null);

        // Instruments release their own bins and events
        self.instruments.clear();
        self.graveyard.clear();

        let PipelineElements {
            pipeline,
            adder,
            convert,
            volume,
            level,
            sink,
        } = self.elements;
        for element in [adder, convert, volume, level, sink, pipeline] {
            if let Err(e) = graph.release(element) {
                log::debug!("Releasing pipeline element {}: {}", element, e);
            }
        }
    }
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("name", &self.name)
            .field("author", &self.author)
            .field("project_file", &self.project_file)
            .field("instruments", &self.instruments)
            .field("graveyard", &self.graveyard.len())
            .finish()
    }
}

// Instrument - a track owning audio events, effects and its playback bin

use crate::command::{CommandError, CommandResult, ObjectRef};
use crate::media::{ElementId, ElementState, MediaGraph, MediaResult, PropertyValue};
use crate::messaging::{Change, ChangeExtra, Listener, ListenerSet, Subscription};
use crate::project::event::Event;
use crate::project::icons::{IconCache, IconHandle};
use crate::project::serialization::ParamMap;
use crate::sequencer::{Transport, TransportState};
use crate::value::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// An effect applied to the whole instrument, backed by one graph element
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalEffect {
    factory: String,
    element: ElementId,
    properties: BTreeMap<String, Value>,
}

impl GlobalEffect {
    pub fn factory(&self) -> &str {
        &self.factory
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    /// Properties that were set explicitly, as persisted
    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }
}

/// Graph elements making up an instrument's playback chain
#[derive(Debug, Clone, Copy)]
struct Elements {
    bin: ElementId,
    composition: ElementId,
    volume: ElementId,
    panorama: ElementId,
    level: ElementId,
}

/// Drives the instrument bin from the transport play state
struct TransportFollower {
    graph: Rc<dyn MediaGraph>,
    bin: ElementId,
}

impl Listener for TransportFollower {
    fn on_state_changed(&self, _source: &ObjectRef, change: Change, extra: Option<&ChangeExtra>) {
        let (Change::TransportState, Some(ChangeExtra::Transport(state))) = (change, extra) else {
            return;
        };
        let target = match state {
            TransportState::Playing | TransportState::Recording => ElementState::Playing,
            TransportState::Paused => ElementState::Paused,
            TransportState::Stopped => ElementState::Ready,
        };
        if let Err(e) = self.graph.set_state(self.bin, target) {
            log::warn!("Instrument bin {} did not follow transport: {}", self.bin, e);
        }
    }
}

pub struct Instrument {
    id: u32,
    name: String,
    /// Icon lookup key, e.g. "guitar"
    instr_type: String,
    /// Asset directory for recorded and imported audio
    path: PathBuf,
    pan: f64,
    volume: f64,
    is_muted: bool,
    is_solo: bool,
    is_armed: bool,
    actually_muted: bool,
    events: Vec<Event>,
    graveyard: Vec<Event>,
    effects: Vec<GlobalEffect>,
    icon: Option<IconHandle>,
    listeners: Rc<ListenerSet>,
    graph: Rc<dyn MediaGraph>,
    elements: Elements,
    follower: Rc<dyn Listener>,
    transport_link: Option<Subscription>,
}

impl Instrument {
    /// Create an instrument and its playback bin
    pub fn new(id: u32, name: &str, instr_type: &str, graph: Rc<dyn MediaGraph>) -> MediaResult<Self> {
        let elements = Self::build_elements(graph.as_ref())?;
        let follower: Rc<dyn Listener> = Rc::new(TransportFollower {
            graph: Rc::clone(&graph),
            bin: elements.bin,
        });

        Ok(Self {
            id,
            name: name.to_string(),
            instr_type: instr_type.to_string(),
            path: PathBuf::new(),
            pan: 0.0,
            volume: 1.0,
            is_muted: false,
            is_solo: false,
            is_armed: false,
            actually_muted: false,
            events: Vec::new(),
            graveyard: Vec::new(),
            effects: Vec::new(),
            icon: None,
            listeners: ListenerSet::new(),
            graph,
            elements,
            follower,
            transport_link: None,
        })
    }

    fn build_elements(graph: &dyn MediaGraph) -> MediaResult<Elements> {
        let mut created = Vec::new();
        let result = (|| -> MediaResult<Elements> {
            let mut make = |factory: &str| -> MediaResult<ElementId> {
                let element = graph.create_element(factory)?;
                created.push(element);
                Ok(element)
            };
            let elements = Elements {
                bin: make("bin")?,
                composition: make("gnlcomposition")?,
                volume: make("volume")?,
                panorama: make("audiopanorama")?,
                level: make("level")?,
            };
            for child in [
                elements.composition,
                elements.volume,
                elements.panorama,
                elements.level,
            ] {
                graph.add_child(elements.bin, child)?;
            }
            Ok(elements)
        })();

        if result.is_err() {
            for element in created {
                let _ = graph.release(element);
            }
        }
        result
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::Instrument(self.id)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instr_type(&self) -> &str {
        &self.instr_type
    }

    pub fn set_instr_type(&mut self, instr_type: &str) {
        self.instr_type = instr_type.to_string();
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = path.into();
    }

    pub fn pan(&self) -> f64 {
        self.pan
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.is_muted
    }

    pub fn is_solo(&self) -> bool {
        self.is_solo
    }

    pub fn is_armed(&self) -> bool {
        self.is_armed
    }

    /// Muted either explicitly or because another instrument is soloed
    pub fn is_actually_muted(&self) -> bool {
        self.actually_muted
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn graveyard(&self) -> &[Event] {
        &self.graveyard
    }

    pub fn effects(&self) -> &[GlobalEffect] {
        &self.effects
    }

    pub fn icon(&self) -> Option<&IconHandle> {
        self.icon.as_ref()
    }

    pub fn listeners(&self) -> &Rc<ListenerSet> {
        &self.listeners
    }

    /// Top-level bin linked into the project pipeline
    pub fn bin(&self) -> ElementId {
        self.elements.bin
    }

    pub fn composition(&self) -> ElementId {
        self.elements.composition
    }

    pub fn level_element(&self) -> ElementId {
        self.elements.level
    }

    fn notify(&self, change: Change, extra: Option<ChangeExtra>) {
        self.listeners
            .notify(&self.object_ref(), change, extra.as_ref());
    }

    // -----------------------------------------------------------------------
    // Transport

    /// Follow the transport's play state until detached or dropped
    pub fn attach_transport(&mut self, transport: &Transport) {
        self.transport_link = Some(transport.listeners().subscribe(&self.follower));
    }

    pub fn detach_transport(&mut self) {
        self.transport_link = None;
    }

    pub fn follows_transport(&self) -> bool {
        self.transport_link.is_some()
    }

    // -----------------------------------------------------------------------
    // Mixer state

    pub fn set_name(&mut self, name: &str) -> String {
        let old = std::mem::replace(&mut self.name, name.to_string());
        self.notify(Change::Name, None);
        old
    }

    /// Set pan, clamped to [-1, 1]; returns the previous pan
    pub fn set_pan(&mut self, pan: f64) -> MediaResult<f64> {
        let old = self.pan;
        self.pan = if pan.is_finite() { pan.clamp(-1.0, 1.0) } else { 0.0 };
        self.push_pan()?;
        self.notify(Change::Pan, None);
        Ok(old)
    }

    fn push_pan(&self) -> MediaResult<()> {
        self.graph
            .set_property(self.elements.panorama, "panorama", PropertyValue::Float(self.pan))
    }

    /// Set volume (never negative); returns the previous volume
    pub fn set_volume(&mut self, volume: f64) -> MediaResult<f64> {
        let old = self.volume;
        self.volume = if volume.is_finite() { volume.max(0.0) } else { 1.0 };
        self.graph.set_property(
            self.elements.volume,
            "volume",
            PropertyValue::Float(self.volume),
        )?;
        self.notify(Change::Volume, None);
        Ok(old)
    }

    pub fn toggle_mute(&mut self, solo_count: u32) -> MediaResult<()> {
        self.is_muted = !self.is_muted;
        self.update_mute(solo_count)
    }

    /// Flip the solo flag; the caller re-derives mute state for every instrument
    pub fn toggle_solo(&mut self) -> bool {
        self.is_solo = !self.is_solo;
        self.notify(Change::Solo, None);
        self.is_solo
    }

    pub fn set_armed(&mut self, armed: bool) {
        self.is_armed = armed;
    }

    /// Re-derive the actuated mute flag and push it onto the volume element
    pub fn update_mute(&mut self, solo_count: u32) -> MediaResult<()> {
        let muted = self.is_muted || (solo_count > 0 && !self.is_solo);
        self.actually_muted = muted;
        self.graph
            .set_property(self.elements.volume, "mute", PropertyValue::Bool(muted))?;
        self.notify(Change::Mute, None);
        Ok(())
    }

    /// Push restored mixer values onto the graph
    pub fn sync_mixer(&self) -> MediaResult<()> {
        self.push_pan()?;
        self.graph.set_property(
            self.elements.volume,
            "volume",
            PropertyValue::Float(self.volume),
        )
    }

    // -----------------------------------------------------------------------
    // Events

    /// Smallest id not used by any active or buried event
    pub fn next_event_id(&self) -> u32 {
        self.events
            .iter()
            .chain(self.graveyard.iter())
            .map(|e| e.id() + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn has_event_id(&self, id: u32) -> bool {
        self.events.iter().chain(self.graveyard.iter()).any(|e| e.id() == id)
    }

    pub fn event(&self, id: u32) -> Option<&Event> {
        self.events.iter().find(|e| e.id() == id)
    }

    pub fn event_mut(&mut self, id: u32) -> Option<&mut Event> {
        self.events.iter_mut().find(|e| e.id() == id)
    }

    /// Materialize an event into the composition and append it
    pub fn push_event(&mut self, mut event: Event) -> MediaResult<()> {
        event.materialize(self.graph.as_ref(), self.elements.composition)?;
        let id = event.id();
        self.events.push(event);
        self.notify(Change::EventAdded, Some(ChangeExtra::Id(id)));
        Ok(())
    }

    /// Materialize a persisted dead event straight into the graveyard
    pub fn push_dead_event(&mut self, mut event: Event, wire_graveyard: bool) -> MediaResult<()> {
        event.materialize(self.graph.as_ref(), self.elements.composition)?;
        if !wire_graveyard {
            event.detach(self.graph.as_ref(), self.elements.composition)?;
        }
        self.graveyard.push(event);
        Ok(())
    }

    /// Move an event to the graveyard
    pub fn bury_event(&mut self, id: u32, wire_graveyard: bool) -> CommandResult<()> {
        let index = self
            .events
            .iter()
            .position(|e| e.id() == id)
            .ok_or_else(|| self.unknown_event(id))?;
        if !wire_graveyard {
            self.events[index].detach(self.graph.as_ref(), self.elements.composition)?;
        }
        let event = self.events.remove(index);
        self.graveyard.push(event);
        self.notify(Change::EventRemoved, Some(ChangeExtra::Id(id)));
        Ok(())
    }

    /// Bring an event back from the graveyard
    pub fn resurrect_event(&mut self, id: u32, wire_graveyard: bool) -> CommandResult<()> {
        let index = self
            .graveyard
            .iter()
            .position(|e| e.id() == id)
            .ok_or_else(|| self.unknown_event(id))?;
        if !wire_graveyard {
            self.graveyard[index].attach(self.graph.as_ref(), self.elements.composition)?;
        }
        let event = self.graveyard.remove(index);
        self.events.push(event);
        self.notify(Change::EventAdded, Some(ChangeExtra::Id(id)));
        Ok(())
    }

    /// Move an active event to `index` in the event list
    pub fn reorder_event(&mut self, id: u32, index: usize) {
        if let Some(current) = self.events.iter().position(|e| e.id() == id) {
            let event = self.events.remove(current);
            let index = index.min(self.events.len());
            self.events.insert(index, event);
        }
    }

    fn unknown_event(&self, id: u32) -> CommandError {
        CommandError::UnknownTarget(
            ObjectRef::Event {
                instrument: self.id,
                event: id,
            }
            .to_string(),
        )
    }

    /// Run `f` on an active event, then push its new state to the graph
    pub fn with_event<T>(
        &mut self,
        id: u32,
        f: impl FnOnce(&mut Event) -> CommandResult<T>,
    ) -> CommandResult<T> {
        let graph = Rc::clone(&self.graph);
        let missing = self.unknown_event(id);
        let event = self.event_mut(id).ok_or(missing)?;
        let result = f(event)?;
        event.sync_graph(graph.as_ref())?;
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Effects

    /// Create an effect element inside the bin; returns its index
    pub fn add_effect(&mut self, factory: &str) -> MediaResult<usize> {
        let element = self.graph.create_element(factory)?;
        if let Err(e) = self.graph.add_child(self.elements.bin, element) {
            let _ = self.graph.release(element);
            return Err(e);
        }
        self.effects.push(GlobalEffect {
            factory: factory.to_string(),
            element,
            properties: BTreeMap::new(),
        });
        self.notify(Change::EffectsChanged, None);
        Ok(self.effects.len() - 1)
    }

    pub fn set_effect_property(&mut self, index: usize, key: &str, value: Value) -> MediaResult<()> {
        let Some(effect) = self.effects.get_mut(index) else {
            return Ok(());
        };
        if let Some(property) = value.to_property() {
            self.graph.set_property(effect.element, key, property)?;
        }
        effect.properties.insert(key.to_string(), value);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Persistence

    /// Resolve the icon for the type tag; a missing icon is not an error
    pub fn resolve_icon(&mut self, icons: &IconCache) {
        self.icon = icons.lookup(&self.instr_type).cloned();
        if self.icon.is_none() {
            log::warn!(
                "No icon for instrument type '{}' (instrument {})",
                self.instr_type,
                self.id
            );
        }
        self.notify(Change::Image, None);
    }

    pub fn to_params(&self) -> ParamMap {
        let mut params = ParamMap::new();
        params.insert("name", self.name.as_str());
        params.insert("instrType", self.instr_type.as_str());
        params.insert("pan", self.pan);
        params.insert("volume", self.volume);
        params.insert("isMuted", self.is_muted);
        params.insert("isSolo", self.is_solo);
        params.insert("isArmed", self.is_armed);
        params
    }

    /// Apply persisted parameters; unknown keys are ignored
    pub fn restore_parameters(&mut self, params: &ParamMap) {
        if let Some(name) = params.get_str("name") {
            self.name = name.to_string();
        }
        if let Some(instr_type) = params.get_str("instrType") {
            self.instr_type = instr_type.to_string();
        }
        if let Some(pan) = params.get_f64("pan") {
            self.pan = pan.clamp(-1.0, 1.0);
        }
        if let Some(volume) = params.get_f64("volume") {
            self.volume = volume.max(0.0);
        }
        if let Some(muted) = params.get_bool("isMuted") {
            self.is_muted = muted;
        }
        if let Some(solo) = params.get_bool("isSolo") {
            self.is_solo = solo;
        }
        if let Some(armed) = params.get_bool("isArmed") {
            self.is_armed = armed;
        }
    }
}

impl Drop for Instrument {
    fn drop(&mut self) {
        // Stop listening before any element goes away
        self.transport_link = None;

        let graph = Rc::clone(&self.graph);
        for event in self.events.iter_mut().chain(self.graveyard.iter_mut()) {
            event.release(graph.as_ref());
        }
        for effect in self.effects.drain(..) {
            let _ = graph.release(effect.element);
        }
        let Elements {
            bin,
            composition,
            volume,
            panorama,
            level,
        } = self.elements;
        for element in [composition, volume, panorama, level, bin] {
            if let Err(e) = graph.release(element) {
                log::debug!("Releasing {} of instrument {}: {}", element, self.id, e);
            }
        }
    }
}

impl std::fmt::Debug for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrument")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("instr_type", &self.instr_type)
            .field("events", &self.events.len())
            .field("graveyard", &self.graveyard.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::software::SoftwareGraph;

    fn setup() -> (Rc<SoftwareGraph>, Instrument) {
        let graph = Rc::new(SoftwareGraph::with_standard_plugins());
        let instrument = Instrument::new(1, "Guitar", "guitar", graph.clone()).unwrap();
        (graph, instrument)
    }

    fn event(id: u32) -> Event {
        Event::new(id, 1, format!("/audio/{}.wav", id))
    }

    #[test]
    fn test_new_builds_bin() {
        let (graph, instrument) = setup();
        assert_eq!(graph.children(instrument.bin()).unwrap().len(), 4);
        assert_eq!(graph.parent_of(instrument.composition()), Some(instrument.bin()));
    }

    #[test]
    fn test_new_fails_without_composition() {
        let graph = Rc::new(SoftwareGraph::with_standard_plugins().without_factory("gnlcomposition"));
        assert!(Instrument::new(1, "Guitar", "guitar", graph.clone()).is_err());
        assert_eq!(graph.element_count(), 0);
    }

    #[test]
    fn test_pan_clamped_and_pushed() {
        let (graph, mut instrument) = setup();
        assert_eq!(instrument.set_pan(-3.0).unwrap(), 0.0);
        assert_eq!(instrument.pan(), -1.0);
        let panorama = graph.children(instrument.bin()).unwrap()[2];
        assert_eq!(
            graph.get_property(panorama, "panorama").unwrap(),
            PropertyValue::Float(-1.0)
        );
    }

    #[test]
    fn test_mute_derivation() {
        let (_graph, mut instrument) = setup();
        instrument.update_mute(1).unwrap();
        assert!(instrument.is_actually_muted());

        instrument.toggle_solo();
        instrument.update_mute(1).unwrap();
        assert!(!instrument.is_actually_muted());

        instrument.toggle_mute(1).unwrap();
        assert!(instrument.is_actually_muted());
    }

    #[test]
    fn test_event_ids_cover_graveyard() {
        let (_graph, mut instrument) = setup();
        instrument.push_event(event(0)).unwrap();
        instrument.push_event(event(3)).unwrap();
        instrument.bury_event(3, false).unwrap();
        assert_eq!(instrument.next_event_id(), 4);
        assert!(instrument.has_event_id(3));
        assert!(instrument.event(3).is_none());
    }

    #[test]
    fn test_bury_and_resurrect_rewire() {
        let (graph, mut instrument) = setup();
        instrument.push_event(event(0)).unwrap();
        let source = instrument.events()[0].source_element().unwrap();

        instrument.bury_event(0, false).unwrap();
        assert_eq!(graph.parent_of(source), None);
        assert_eq!(instrument.graveyard().len(), 1);

        instrument.resurrect_event(0, false).unwrap();
        assert_eq!(graph.parent_of(source), Some(instrument.composition()));

        instrument.bury_event(0, true).unwrap();
        assert_eq!(graph.parent_of(source), Some(instrument.composition()));

        assert!(instrument.bury_event(9, false).is_err());
    }

    #[test]
    fn test_effects() {
        let (graph, mut instrument) = setup();
        let index = instrument.add_effect("audioecho").unwrap();
        instrument
            .set_effect_property(index, "intensity", Value::Float(0.5))
            .unwrap();
        let effect = &instrument.effects()[0];
        assert_eq!(
            graph.get_property(effect.element(), "intensity").unwrap(),
            PropertyValue::Float(0.5)
        );
        assert!(instrument.add_effect("flanger9000").is_err());
        assert!(
            instrument
                .set_effect_property(index, "warp", Value::Int(1))
                .is_err()
        );
    }

    #[test]
    fn test_follows_transport_until_dropped() {
        let (graph, mut instrument) = setup();
        let mut transport = Transport::new();
        instrument.attach_transport(&transport);
        transport.play();
        assert_eq!(graph.state(instrument.bin()).unwrap(), ElementState::Playing);

        instrument.detach_transport();
        transport.stop();
        assert_eq!(graph.state(instrument.bin()).unwrap(), ElementState::Playing);

        instrument.attach_transport(&transport);
        drop(instrument);
        assert!(transport.listeners().is_empty());
        assert_eq!(graph.element_count(), 0);
        transport.play();
    }
}

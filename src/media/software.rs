// SoftwareGraph - In-process media graph
//
// Keeps a registry of element factories (each with its default properties and
// pad capabilities) and a table of live elements with their parent/child
// links. It performs no signal processing; it exists so that the session core
// can be driven, inspected and tested without a native engine.

use super::{
    Caps, CapsValue, ElementId, ElementState, MediaError, MediaGraph, MediaResult, PropertyValue,
};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};

/// Description of an element factory: properties with defaults and pad caps
#[derive(Debug, Clone, Default)]
pub struct FactorySpec {
    pub properties: BTreeMap<String, PropertyValue>,
    pub pads: BTreeMap<String, Caps>,
}

impl FactorySpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn property(mut self, name: &str, default: PropertyValue) -> Self {
        self.properties.insert(name.to_string(), default);
        self
    }

    pub fn pad(mut self, name: &str, caps: Caps) -> Self {
        self.pads.insert(name.to_string(), caps);
        self
    }
}

#[derive(Debug)]
struct ElementRecord {
    factory: String,
    state: ElementState,
    properties: BTreeMap<String, PropertyValue>,
    pads: BTreeMap<String, Caps>,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
}

/// In-process media graph backed by a factory registry
pub struct SoftwareGraph {
    factories: HashMap<String, FactorySpec>,
    elements: RefCell<HashMap<ElementId, ElementRecord>>,
    next_element_id: Cell<u64>,
}

impl SoftwareGraph {
    /// Create an empty graph with no factories registered
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            elements: RefCell::new(HashMap::new()),
            next_element_id: Cell::new(1),
        }
    }

    /// Create a graph with the factories a session needs plus a few effects
    pub fn with_standard_plugins() -> Self {
        let mut graph = Self::new();

        graph.register("pipeline", FactorySpec::new());
        graph.register("bin", FactorySpec::new());
        graph.register("adder", FactorySpec::new());
        graph.register("audioconvert", FactorySpec::new());
        graph.register("audioresample", FactorySpec::new());
        graph.register(
            "level",
            FactorySpec::new()
                .property("interval", PropertyValue::Int(100_000_000))
                .property("message", PropertyValue::Bool(true)),
        );
        graph.register(
            "volume",
            FactorySpec::new()
                .property("volume", PropertyValue::Float(1.0))
                .property("mute", PropertyValue::Bool(false)),
        );
        graph.register(
            "audiopanorama",
            FactorySpec::new().property("panorama", PropertyValue::Float(0.0)),
        );
        graph.register(
            "gnlcomposition",
            FactorySpec::new().property("caps", PropertyValue::Str("audio/x-raw".into())),
        );
        graph.register(
            "gnlfilesource",
            FactorySpec::new()
                .property("location", PropertyValue::Str(String::new()))
                .property("start", PropertyValue::Float(0.0))
                .property("duration", PropertyValue::Float(0.0))
                .property("media-start", PropertyValue::Float(0.0))
                .property("media-duration", PropertyValue::Float(0.0))
                .property("fade-points", PropertyValue::Str(String::new())),
        );
        graph.register(
            "autoaudiosink",
            FactorySpec::new().pad("sink", stereo_caps(8_000, 192_000)),
        );
        graph.register(
            "alsasrc",
            FactorySpec::new()
                .property("device", PropertyValue::Str("hw:0".into()))
                .property("device-name", PropertyValue::Str("Default".into()))
                .pad("src", stereo_caps(8_000, 192_000)),
        );
        graph.register(
            "audioecho",
            FactorySpec::new()
                .property("delay", PropertyValue::Int(1))
                .property("max-delay", PropertyValue::Int(1))
                .property("intensity", PropertyValue::Float(0.0))
                .property("feedback", PropertyValue::Float(0.0)),
        );
        graph.register(
            "audioamplify",
            FactorySpec::new()
                .property("amplification", PropertyValue::Float(1.0))
                .property("clipping-method", PropertyValue::Int(0)),
        );
        graph.register(
            "audiocheblimit",
            FactorySpec::new()
                .property("mode", PropertyValue::Int(0))
                .property("cutoff", PropertyValue::Float(1000.0))
                .property("ripple", PropertyValue::Float(0.25)),
        );

        graph
    }

    /// Register (or replace) an element factory
    pub fn register(&mut self, factory: &str, spec: FactorySpec) {
        self.factories.insert(factory.to_string(), spec);
    }

    /// Remove a factory, simulating a missing plugin
    pub fn unregister(&mut self, factory: &str) -> bool {
        self.factories.remove(factory).is_some()
    }

    /// Builder form of [`unregister`](Self::unregister)
    pub fn without_factory(mut self, factory: &str) -> Self {
        self.unregister(factory);
        self
    }

    /// Number of live elements
    pub fn element_count(&self) -> usize {
        self.elements.borrow().len()
    }

    /// Number of live elements created from the given factory
    pub fn count_of(&self, factory: &str) -> usize {
        self.elements
            .borrow()
            .values()
            .filter(|record| record.factory == factory)
            .count()
    }

    /// Parent bin of an element, if linked
    pub fn parent_of(&self, element: ElementId) -> Option<ElementId> {
        self.elements
            .borrow()
            .get(&element)
            .and_then(|record| record.parent)
    }

    fn is_ancestor(
        elements: &HashMap<ElementId, ElementRecord>,
        candidate: ElementId,
        of: ElementId,
    ) -> bool {
        let mut current = elements.get(&of).and_then(|r| r.parent);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = elements.get(&id).and_then(|r| r.parent);
        }
        false
    }
}

impl Default for SoftwareGraph {
    fn default() -> Self {
        Self::with_standard_plugins()
    }
}

fn stereo_caps(low_rate: i64, high_rate: i64) -> Caps {
    let mut caps = Caps::new();
    caps.insert(
        "rate".to_string(),
        CapsValue::Range {
            low: low_rate,
            high: high_rate,
        },
    );
    caps.insert("channels".to_string(), CapsValue::Range { low: 1, high: 2 });
    caps
}

impl MediaGraph for SoftwareGraph {
    fn has_factory(&self, factory: &str) -> bool {
        self.factories.contains_key(factory)
    }

    fn create_element(&self, factory: &str) -> MediaResult<ElementId> {
        let spec = self
            .factories
            .get(factory)
            .ok_or_else(|| MediaError::ElementNotFound {
                factory: factory.to_string(),
            })?;

        let id = ElementId(self.next_element_id.get());
        self.next_element_id.set(id.0 + 1);

        self.elements.borrow_mut().insert(
            id,
            ElementRecord {
                factory: factory.to_string(),
                state: ElementState::Null,
                properties: spec.properties.clone(),
                pads: spec.pads.clone(),
                parent: None,
                children: Vec::new(),
            },
        );

        log::trace!("created {} from '{}'", id, factory);
        Ok(id)
    }

    fn factory_of(&self, element: ElementId) -> MediaResult<String> {
        self.elements
            .borrow()
            .get(&element)
            .map(|record| record.factory.clone())
            .ok_or(MediaError::UnknownElement(element))
    }

    fn set_state(&self, element: ElementId, state: ElementState) -> MediaResult<()> {
        let mut elements = self.elements.borrow_mut();
        let children = {
            let record = elements
                .get_mut(&element)
                .ok_or(MediaError::UnknownElement(element))?;
            record.state = state;
            record.children.clone()
        };

        // Bins propagate their state to everything inside them
        let mut pending = children;
        while let Some(child) = pending.pop() {
            if let Some(record) = elements.get_mut(&child) {
                record.state = state;
                pending.extend(record.children.iter().copied());
            }
        }

        Ok(())
    }

    fn state(&self, element: ElementId) -> MediaResult<ElementState> {
        self.elements
            .borrow()
            .get(&element)
            .map(|record| record.state)
            .ok_or(MediaError::UnknownElement(element))
    }

    fn get_property(&self, element: ElementId, name: &str) -> MediaResult<PropertyValue> {
        let elements = self.elements.borrow();
        let record = elements
            .get(&element)
            .ok_or(MediaError::UnknownElement(element))?;
        record
            .properties
            .get(name)
            .cloned()
            .ok_or_else(|| MediaError::UnknownProperty {
                element,
                property: name.to_string(),
            })
    }

    fn set_property(
        &self,
        element: ElementId,
        name: &str,
        value: PropertyValue,
    ) -> MediaResult<()> {
        let mut elements = self.elements.borrow_mut();
        let record = elements
            .get_mut(&element)
            .ok_or(MediaError::UnknownElement(element))?;
        match record.properties.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(MediaError::UnknownProperty {
                element,
                property: name.to_string(),
            }),
        }
    }

    fn add_child(&self, parent: ElementId, child: ElementId) -> MediaResult<()> {
        let mut elements = self.elements.borrow_mut();
        if !elements.contains_key(&parent) {
            return Err(MediaError::UnknownElement(parent));
        }
        let current_parent = elements
            .get(&child)
            .ok_or(MediaError::UnknownElement(child))?
            .parent;

        if parent == child || Self::is_ancestor(&elements, child, parent) {
            return Err(MediaError::Link {
                parent,
                child,
                reason: "link would create a cycle".to_string(),
            });
        }
        if let Some(existing) = current_parent {
            return Err(MediaError::Link {
                parent,
                child,
                reason: format!("already inside {}", existing),
            });
        }

        if let Some(record) = elements.get_mut(&child) {
            record.parent = Some(parent);
        }
        if let Some(record) = elements.get_mut(&parent) {
            record.children.push(child);
        }
        Ok(())
    }

    fn remove_child(&self, parent: ElementId, child: ElementId) -> MediaResult<()> {
        let mut elements = self.elements.borrow_mut();
        let record = elements
            .get_mut(&parent)
            .ok_or(MediaError::UnknownElement(parent))?;
        let before = record.children.len();
        record.children.retain(|c| *c != child);
        if record.children.len() == before {
            return Err(MediaError::Link {
                parent,
                child,
                reason: "not a child of this bin".to_string(),
            });
        }
        if let Some(child_record) = elements.get_mut(&child) {
            child_record.parent = None;
        }
        Ok(())
    }

    fn children(&self, parent: ElementId) -> MediaResult<Vec<ElementId>> {
        self.elements
            .borrow()
            .get(&parent)
            .map(|record| record.children.clone())
            .ok_or(MediaError::UnknownElement(parent))
    }

    fn release(&self, element: ElementId) -> MediaResult<()> {
        let mut elements = self.elements.borrow_mut();
        let record = elements
            .remove(&element)
            .ok_or(MediaError::UnknownElement(element))?;

        if let Some(parent) = record.parent {
            if let Some(parent_record) = elements.get_mut(&parent) {
                parent_record.children.retain(|c| *c != element);
            }
        }
        // Children survive their bin; their owners release them
        for child in record.children {
            if let Some(child_record) = elements.get_mut(&child) {
                child_record.parent = None;
            }
        }

        log::trace!("released {} ('{}')", element, record.factory);
        Ok(())
    }

    fn query_pad_caps(&self, element: ElementId, pad: &str) -> MediaResult<Caps> {
        let elements = self.elements.borrow();
        let record = elements
            .get(&element)
            .ok_or(MediaError::UnknownElement(element))?;
        if record.state < ElementState::Ready {
            return Err(MediaError::InvalidState {
                element,
                required: ElementState::Ready,
            });
        }
        record
            .pads
            .get(pad)
            .cloned()
            .ok_or_else(|| MediaError::UnknownPad {
                element,
                pad: pad.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_unknown_factory() {
        let graph = SoftwareGraph::new();
        let result = graph.create_element("adder");
        assert_eq!(
            result,
            Err(MediaError::ElementNotFound {
                factory: "adder".to_string()
            })
        );
    }

    #[test]
    fn test_properties_have_factory_defaults() {
        let graph = SoftwareGraph::with_standard_plugins();
        let volume = graph.create_element("volume").unwrap();

        assert_eq!(
            graph.get_property(volume, "volume").unwrap(),
            PropertyValue::Float(1.0)
        );
        graph
            .set_property(volume, "mute", PropertyValue::Bool(true))
            .unwrap();
        assert_eq!(
            graph.get_property(volume, "mute").unwrap(),
            PropertyValue::Bool(true)
        );
        assert!(matches!(
            graph.set_property(volume, "bogus", PropertyValue::Int(1)),
            Err(MediaError::UnknownProperty { .. })
        ));
    }

    #[test]
    fn test_link_and_release() {
        let graph = SoftwareGraph::with_standard_plugins();
        let bin = graph.create_element("bin").unwrap();
        let src = graph.create_element("gnlfilesource").unwrap();

        graph.add_child(bin, src).unwrap();
        assert_eq!(graph.children(bin).unwrap(), vec![src]);
        assert_eq!(graph.parent_of(src), Some(bin));

        // A second parent is refused
        let other = graph.create_element("bin").unwrap();
        assert!(graph.add_child(other, src).is_err());

        // Cycles are refused
        assert!(graph.add_child(src, bin).is_err());

        graph.release(src).unwrap();
        assert!(graph.children(bin).unwrap().is_empty());
        assert_eq!(graph.element_count(), 2);
    }

    #[test]
    fn test_state_propagates_to_children() {
        let graph = SoftwareGraph::with_standard_plugins();
        let pipeline = graph.create_element("pipeline").unwrap();
        let bin = graph.create_element("bin").unwrap();
        let src = graph.create_element("gnlfilesource").unwrap();
        graph.add_child(pipeline, bin).unwrap();
        graph.add_child(bin, src).unwrap();

        graph.set_state(pipeline, ElementState::Playing).unwrap();
        assert_eq!(graph.state(src).unwrap(), ElementState::Playing);
    }

    #[test]
    fn test_caps_require_ready_state() {
        let graph = SoftwareGraph::with_standard_plugins();
        let src = graph.create_element("alsasrc").unwrap();

        assert!(matches!(
            graph.query_pad_caps(src, "src"),
            Err(MediaError::InvalidState { .. })
        ));

        graph.set_state(src, ElementState::Ready).unwrap();
        let caps = graph.query_pad_caps(src, "src").unwrap();
        assert_eq!(
            caps.get("channels"),
            Some(&CapsValue::Range { low: 1, high: 2 })
        );
        assert!(matches!(
            graph.query_pad_caps(src, "sink"),
            Err(MediaError::UnknownPad { .. })
        ));
    }
}

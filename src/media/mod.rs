// Media graph adapter
//
// The session core never processes audio itself. It asks a media graph to
// create elements (mixers, file sources, effects), links them into bins,
// pushes properties and drives state transitions. The graph runs its own
// real-time threads; every call here may block but never re-enters the caller.
//
// Architecture:
// - MediaGraph trait: the capability the core consumes
// - SoftwareGraph: in-process implementation with a factory registry
// - probe: capability queries built on top of pad caps

pub mod probe;
pub mod software;

pub use software::SoftwareGraph;

use std::collections::BTreeMap;
use std::fmt;

/// Opaque handle to an element living inside a media graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element#{}", self.0)
    }
}

/// Element state, ordered from fully released to running
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ElementState {
    #[default]
    Null,
    Ready,
    Paused,
    Playing,
}

/// Property value exchanged with the graph
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl PropertyValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(v) => Some(*v),
            PropertyValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(v) => Some(v),
            _ => None,
        }
    }
}

/// One field of a pad capability structure
#[derive(Debug, Clone, PartialEq)]
pub enum CapsValue {
    /// Exactly one supported value
    Single(i64),
    /// Inclusive range of supported values
    Range { low: i64, high: i64 },
    /// Enumerated supported values
    List(Vec<i64>),
}

/// Capability description of a pad, keyed by field name ("rate", "channels")
pub type Caps = BTreeMap<String, CapsValue>;

/// Media graph errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MediaError {
    #[error("no element factory named '{factory}'")]
    ElementNotFound { factory: String },

    #[error("unknown element {0}")]
    UnknownElement(ElementId),

    #[error("element {element} has no property '{property}'")]
    UnknownProperty { element: ElementId, property: String },

    #[error("element {element} has no pad '{pad}'")]
    UnknownPad { element: ElementId, pad: String },

    #[error("element {element} must be at least {required:?} for this operation")]
    InvalidState {
        element: ElementId,
        required: ElementState,
    },

    #[error("cannot link {child} into {parent}: {reason}")]
    Link {
        parent: ElementId,
        child: ElementId,
        reason: String,
    },
}

pub type MediaResult<T> = Result<T, MediaError>;

/// The media-processing capability configured by the session core
///
/// Element handles are reference-like: implementations use interior
/// mutability, so every method takes `&self` and the graph can be shared
/// between the project and all of its instruments.
pub trait MediaGraph {
    /// Whether an element factory (plugin) is available
    fn has_factory(&self, factory: &str) -> bool;

    /// Create a new element from a factory name
    fn create_element(&self, factory: &str) -> MediaResult<ElementId>;

    /// Name of the factory an element was created from
    fn factory_of(&self, element: ElementId) -> MediaResult<String>;

    /// Request a state transition
    fn set_state(&self, element: ElementId, state: ElementState) -> MediaResult<()>;

    /// Current state of an element
    fn state(&self, element: ElementId) -> MediaResult<ElementState>;

    fn get_property(&self, element: ElementId, name: &str) -> MediaResult<PropertyValue>;

    fn set_property(&self, element: ElementId, name: &str, value: PropertyValue)
    -> MediaResult<()>;

    /// Put `child` inside the bin `parent`
    fn add_child(&self, parent: ElementId, child: ElementId) -> MediaResult<()>;

    /// Take `child` out of the bin `parent`; the child stays alive
    fn remove_child(&self, parent: ElementId, child: ElementId) -> MediaResult<()>;

    /// Children of a bin, in insertion order
    fn children(&self, parent: ElementId) -> MediaResult<Vec<ElementId>>;

    /// Destroy an element, unlinking it from its parent first
    fn release(&self, element: ElementId) -> MediaResult<()>;

    /// Capabilities of the named pad; the element must be at least Ready
    fn query_pad_caps(&self, element: ElementId, pad: &str) -> MediaResult<Caps>;
}

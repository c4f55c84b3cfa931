// Sequencer module
// Transport state consumed by instruments through the listener protocol

pub mod transport;

pub use transport::{Transport, TransportMode, TransportState};

// Capability probing on top of pad caps
//
// Opens an element (Ready state) so the graph negotiates its caps, reads one
// field and releases the element again.

use super::{CapsValue, ElementState, MediaGraph, MediaResult, PropertyValue};

/// Default capture element and its device
pub const DEFAULT_CAPTURE_ELEMENT: &str = "alsasrc";
pub const DEFAULT_CAPTURE_DEVICE: &str = "hw:0";

/// Above this upper bound a channel range is the engine's generic maximum,
/// not something the device actually offers
const GENERIC_CHANNEL_LIMIT: i64 = 20_000;

/// Read the "rate" caps field of a pad on a freshly created element
///
/// `properties` are applied before the element is opened. Returns `Ok(None)`
/// when the pad exposes no rate information.
pub fn element_sample_rate(
    graph: &dyn MediaGraph,
    factory: &str,
    pad: &str,
    properties: &[(&str, PropertyValue)],
) -> MediaResult<Option<CapsValue>> {
    let element = graph.create_element(factory)?;

    let result: MediaResult<Option<CapsValue>> = (|| {
        for (name, value) in properties {
            graph.set_property(element, name, value.clone())?;
        }
        graph.set_state(element, ElementState::Ready)?;
        let caps = graph.query_pad_caps(element, pad)?;
        Ok(caps.get("rate").cloned())
    })();

    // Clean up whatever happened above
    if let Err(e) = graph.set_state(element, ElementState::Null) {
        log::debug!("could not reset probe element: {}", e);
    }
    graph.release(element)?;

    result
}

/// Sample rates supported by a capture device
pub fn recording_sample_rate(
    graph: &dyn MediaGraph,
    device: &str,
) -> MediaResult<Option<CapsValue>> {
    element_sample_rate(
        graph,
        DEFAULT_CAPTURE_ELEMENT,
        "src",
        &[("device", PropertyValue::Str(device.to_string()))],
    )
}

/// Number of independent inputs a capture device offers
///
/// A stereo device counts as one input. Returns 0 when the device cannot be
/// opened or exposes no channel information.
pub fn channels_offered(graph: &dyn MediaGraph, device: &str) -> u32 {
    let element = match graph.create_element(DEFAULT_CAPTURE_ELEMENT) {
        Ok(element) => element,
        Err(e) => {
            log::warn!("cannot probe channels on {}: {}", device, e);
            return 0;
        }
    };

    let caps = graph
        .set_property(element, "device", PropertyValue::Str(device.to_string()))
        .and_then(|_| graph.set_state(element, ElementState::Ready))
        .and_then(|_| graph.query_pad_caps(element, "src"));

    let _ = graph.set_state(element, ElementState::Null);
    if let Err(e) = graph.release(element) {
        log::debug!("could not release probe element: {}", e);
    }

    let caps = match caps {
        Ok(caps) => caps,
        Err(e) => {
            log::warn!("couldn't get source pad for {}: {}", device, e);
            return 0;
        }
    };

    let channels = match caps.get("channels") {
        Some(CapsValue::Single(n)) => *n,
        Some(CapsValue::Range { low, high }) => {
            if *high > GENERIC_CHANNEL_LIMIT {
                *low
            } else {
                *high
            }
        }
        Some(CapsValue::List(values)) => values.iter().copied().max().unwrap_or(0),
        None => 0,
    };

    match channels {
        2 => 1,
        n if n < 0 => 0,
        n => n as u32,
    }
}

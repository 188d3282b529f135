//! These are all the messages that pass between a host and a running simulation.
//!
//! Every message is a single line of JSON. Input arrives on STDIN and output leaves on STDOUT.

use constellation::{
    events::Event,
    forces::{ForceId, ForceKind},
    glam::Vec2,
    render::RenderSnapshot,
    simulation::{InputEvent, TickOutput},
};
use snafu::ResultExt as _;

/// All the errors that can happen when reading or writing messages.
#[derive(Debug, snafu::Snafu)]
#[non_exhaustive]
pub enum ProtocolError {
    #[snafu(display("Couldn't decode message: {line}"))]
    /// The line wasn't a valid input message
    Decode {
        /// The offending line
        line: String,
        /// The parent error type
        source: serde_json::Error,
    },

    #[snafu(display("Couldn't encode message"))]
    /// An output message couldn't be serialised
    Encode {
        /// The parent error type
        source: serde_json::Error,
    },
}

/// Messages for the host loop itself rather than the simulation.
#[derive(serde::Serialize, serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Control {
    /// Resume ticking.
    Start,
    /// Pause ticking. Nothing changes until `start`.
    Stop,
    /// Exit gracefully.
    End,
}

/// The various kinds of messages that a host can send to the simulation.
///
/// On the wire there's no extra nesting: `"end"` is a control message and
/// `{"pointer_down": {...}}` is simulation input, exactly as [`InputEvent`] serialises.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
#[non_exhaustive]
pub enum InputMessages {
    /// `start`, `stop` or `end`.
    Control(Control),
    /// Anything that goes straight into the next tick.
    Simulation(InputEvent),
}

impl InputMessages {
    /// The simulation input this message carries, if any. Control messages are for the host
    /// loop, not the simulation.
    #[must_use]
    pub fn into_input_event(self) -> Option<InputEvent> {
        match self {
            Self::Simulation(event) => Some(event),
            Self::Control(_) => None,
        }
    }
}

/// All the message kinds that the simulation sends to the host.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum OutputMessages {
    /// Everything to draw for one frame.
    Frame {
        /// The tick that made the frame
        tick: u64,
        /// Visible particles, edges and trails
        snapshot: RenderSnapshot,
    },
    /// Everything that happened during one tick.
    Events {
        /// The tick the events happened in
        tick: u64,
        /// The events, in order
        events: Vec<Event>,
    },
    /// Something went wrong, but the simulation carries on.
    Error {
        /// A description of the problem
        message: String,
    },
}

impl OutputMessages {
    /// The messages to send for a tick: its events, if there were any, then its frame, if one was
    /// due.
    #[must_use]
    pub fn from_tick(output: TickOutput) -> Vec<Self> {
        let mut messages = Vec::new();
        if !output.events.is_empty() {
            messages.push(Self::Events {
                tick: output.tick,
                events: output.events,
            });
        }
        if let Some(snapshot) = output.snapshot {
            messages.push(Self::Frame {
                tick: output.tick,
                snapshot,
            });
        }
        messages
    }
}

/// Parse a single line of input.
///
/// # Errors
/// When the line isn't a known message.
pub fn decode_input(line: &str) -> Result<InputMessages, ProtocolError> {
    serde_json::from_str(line.trim()).context(DecodeSnafu { line })
}

/// Serialise a message to a single line of JSON, without the newline.
///
/// # Errors
/// When the message can't be serialised, eg. it contains a non-finite number in a map key.
pub fn encode_output(message: &OutputMessages) -> Result<String, ProtocolError> {
    serde_json::to_string(message).context(EncodeSnafu)
}

#[expect(
    clippy::default_numeric_fallback,
    clippy::indexing_slicing,
    reason = "Tests aren't so strict"
)]

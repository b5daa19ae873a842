//! Host runtime for scripted protocol decoders
//!
//! This library discovers, registers, instantiates, and drives pluggable
//! protocol-decoder components during a logic-signal capture session. The
//! decoders themselves are opaque scripted components; this crate owns the
//! host side of the boundary:
//!
//! - **Decoder registry**: descriptors for every component discovered at
//!   startup, registered via callback while their modules load
//! - **Instance management**: per-session instantiation, probe-to-channel
//!   binding, and object lifetime across the scripting boundary
//! - **Session controller**: the `init -> start -> feed -> exit` state
//!   machine broadcasting metadata and sample buffers to every active
//!   instance in creation order
//! - **Emission sinks**: never-raising consumers for the records decoders
//!   emit back into the host
//!
//! The scripting execution environment is supplied by the embedder as a
//! [`ScriptEngine`] implementation.
//!
//! # Example
//!
//! ```ignore
//! use sigdec::Session;
//!
//! let mut session = Session::new(engine);
//! session.init(std::path::Path::new("/usr/share/decoders"))?;
//! let uart = session.instance_new("uart")?;
//! session.set_probe(uart, "RX", 0)?;
//! session.start("demo", 1, 0, 1_000_000)?;
//! session.feed(&[0x55, 0xAA])?;
//! session.exit()?;
//! # Ok::<(), sigdec::HostError>(())
//! ```

use std::path::PathBuf;

use thiserror::Error;

pub mod bridge;
pub mod runtime;

pub use bridge::{
    ChannelSink, ComponentHandle, EmissionSink, HostCallbacks, ObjectHandle, ScriptEngine,
    ScriptError, ScriptValue, StdoutSink,
};
pub use runtime::{
    DecoderDescriptor, DecoderInstance, DecoderRegistry, InstanceId, Session, SessionState,
    TimeBase,
};

/// Error type for host operations
#[derive(Debug, Error)]
pub enum HostError {
    #[error("invalid argument: {0}")]
    Args(&'static str),

    #[error("script error: {0}")]
    Script(#[from] ScriptError),

    #[error("decoder candidate rejected: field `{field}` {reason}")]
    Metadata { field: &'static str, reason: String },

    #[error("decoder id `{0}` is already registered")]
    DuplicateDecoder(String),

    #[error("no decoder registered with id `{0}`")]
    UnknownDecoder(String),

    #[error("cannot access decoders directory `{path}`: {source}")]
    DecodersDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("`{operation}` not permitted while session is {state:?}")]
    State {
        operation: &'static str,
        state: SessionState,
    },
}

/// Result type for host operations
pub type Result<T> = std::result::Result<T, HostError>;

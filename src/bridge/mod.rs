//! The boundary layer between the host runtime and externally-implemented
//! decoder components
//!
//! The scripting execution environment lives behind the [`ScriptEngine`]
//! trait: module loading, object instantiation, attribute access, and method
//! invocation are all synchronous blocking capabilities. Loaded components
//! call back into the host through [`HostCallbacks`], which the host passes
//! into every engine call that may reenter it.
//!
//! ## Handle ownership
//!
//! Objects crossing the boundary are referenced by opaque handles minted by
//! the engine. A handle given to the host is owned by the host from that
//! point on and must be released exactly once, through
//! [`ScriptEngine::release_component`] or [`ScriptEngine::release_object`].
//! The host releases at session teardown, or immediately when it rejects a
//! registration candidate before taking ownership of it.

use std::path::Path;

use thiserror::Error;

pub mod sink;
pub mod value;

pub use sink::{ChannelSink, EmissionSink, StdoutSink};
pub use value::ScriptValue;

use crate::HostError;

/// Opaque reference to a decoder component's factory inside the engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ComponentHandle(pub u64);

/// Opaque reference to an instantiated scripted object inside the engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectHandle(pub u64);

/// Failure signaled by the scripting boundary
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("scripting engine failed to start: {0}")]
    Startup(String),

    #[error("module `{module}` failed to load: {reason}")]
    LoadFailed { module: String, reason: String },

    #[error("attribute `{attr}` is missing or not a string")]
    BadAttr { attr: String },

    #[error("component instantiation failed: {0}")]
    Instantiate(String),

    #[error("`{method}` raised: {reason}")]
    Raised { method: String, reason: String },

    #[error("stale or unknown handle")]
    InvalidHandle,
}

/// Host-side capabilities available to scripted components
///
/// The engine reenters the host through this object while executing
/// `load_module` or `invoke`. The outcome of `register` reaches the
/// scripting side solely through the returned `Result`; the engine decides
/// how to surface a rejection to the running script.
pub trait HostCallbacks {
    /// A loaded module presents a decoder candidate for registration.
    /// Ownership of `candidate` transfers to the host, which releases it
    /// itself if it rejects the registration.
    fn register(
        &mut self,
        engine: &mut dyn ScriptEngine,
        candidate: ComponentHandle,
    ) -> Result<(), HostError>;

    /// A decoder emits an output record. Never fails; delivery problems are
    /// absorbed by the host and do not propagate into the calling decoder.
    fn emit(&mut self, record: ScriptValue);
}

/// Capability contract the scripting execution environment implements
///
/// All calls are synchronous and single-threaded: the host never issues two
/// scripted invocations concurrently, and an invocation runs to completion
/// or failure before the host proceeds.
pub trait ScriptEngine {
    /// Bring the engine up. Called once per session, before anything else.
    fn startup(&mut self) -> Result<(), ScriptError>;

    /// Tear the engine down, invalidating every outstanding handle.
    fn shutdown(&mut self);

    /// File extension (without the dot) identifying decoder sources,
    /// e.g. `"py"`.
    fn source_extension(&self) -> &'static str;

    /// Add a directory to the engine's module search path.
    fn append_search_path(&mut self, dir: &Path) -> Result<(), ScriptError>;

    /// Load a module by name. Loading is expected to trigger zero or one
    /// `host.register(..)` callback as a side effect.
    fn load_module(
        &mut self,
        name: &str,
        host: &mut dyn HostCallbacks,
    ) -> Result<(), ScriptError>;

    /// Read a string attribute from a component.
    fn string_attr(
        &mut self,
        component: ComponentHandle,
        attr: &str,
    ) -> Result<String, ScriptError>;

    /// Instantiate a component with zero constructor arguments.
    fn instantiate(&mut self, component: ComponentHandle) -> Result<ObjectHandle, ScriptError>;

    /// Write `key = value` into a mapping attribute of a scripted object.
    fn set_mapping_entry(
        &mut self,
        object: ObjectHandle,
        attr: &str,
        key: &str,
        value: i64,
    ) -> Result<(), ScriptError>;

    /// Invoke a method on a scripted object with one structured argument.
    /// The object may reenter the host through `host` while running.
    fn invoke(
        &mut self,
        object: ObjectHandle,
        method: &str,
        args: ScriptValue,
        host: &mut dyn HostCallbacks,
    ) -> Result<ScriptValue, ScriptError>;

    /// Drop the host's reference to a component. Each handle is released
    /// at most once.
    fn release_component(&mut self, component: ComponentHandle);

    /// Drop the host's reference to an instantiated object.
    fn release_object(&mut self, object: ObjectHandle);
}

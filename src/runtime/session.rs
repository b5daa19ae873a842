//! Session controller driving decoder instances through a capture
//!
//! ## State machine
//!
//! A session moves through `Uninitialized -> Initialized -> Started ->
//! Feeding -> Exited`. `init` brings up the scripting engine and runs
//! decoder discovery; `start` broadcasts capture metadata to every active
//! instance; `feed` broadcasts sample buffers (repeatable); `exit` unwinds
//! instances and registry and shuts the engine down. Every operation
//! validates the current state first and surfaces violations as
//! [`HostError::State`].
//!
//! Exactly one session per engine: the engine is owned by the session and
//! `Exited` is terminal, so a second live session cannot be conjured from
//! the same value. Construct a fresh `Session` for a new capture.
//!
//! ## Broadcast order
//!
//! `start` and `feed` deliver to instances strictly in creation order. This
//! order is load-bearing for decoders that depend on peer decoders' side
//! effects through the emission sink.

use std::ffi::OsStr;
use std::fs;
use std::path::Path;

use tracing::{debug, error, info};

use crate::bridge::{
    ComponentHandle, EmissionSink, HostCallbacks, ScriptEngine, ScriptValue, StdoutSink,
};
use crate::runtime::instance::{DecoderInstance, InstanceId};
use crate::runtime::registry::DecoderRegistry;
use crate::runtime::timebase::TimeBase;
use crate::HostError;

/// Placeholder duration attached to every decode record; no per-buffer
/// duration is available from the synthesized timebase.
const FEED_DURATION: i64 = 10;

/// Lifecycle state of a decoding session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initialized,
    Started,
    Feeding,
    Exited,
}

/// Callback adapter handed to the engine for every call that may reenter
/// the host: registrations go to the registry, emissions to the sink. Both
/// capabilities stay available for the whole session, so a decoder may emit
/// during load and (pathologically) register during a feed.
struct HostDispatch<'a> {
    registry: &'a mut DecoderRegistry,
    sink: &'a mut dyn EmissionSink,
}

impl HostCallbacks for HostDispatch<'_> {
    fn register(
        &mut self,
        engine: &mut dyn ScriptEngine,
        candidate: ComponentHandle,
    ) -> Result<(), HostError> {
        self.registry.register(engine, candidate)
    }

    fn emit(&mut self, record: ScriptValue) {
        self.sink.emit(&record);
    }
}

/// A decoding session: owns the engine, the registry, and the active
/// instance list
pub struct Session<E> {
    engine: E,
    state: SessionState,
    registry: DecoderRegistry,
    instances: Vec<DecoderInstance>,
    timebase: TimeBase,
    sink: Box<dyn EmissionSink>,
}

impl<E: ScriptEngine> Session<E> {
    /// Create a session around a scripting engine. Emissions go to stdout
    /// unless a sink is supplied with [`with_sink`](Self::with_sink).
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            state: SessionState::Uninitialized,
            registry: DecoderRegistry::new(),
            instances: Vec::new(),
            timebase: TimeBase::new(),
            sink: Box::new(StdoutSink),
        }
    }

    /// Replace the emission sink. Only meaningful before `init`.
    pub fn with_sink(mut self, sink: impl EmissionSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn registry(&self) -> &DecoderRegistry {
        &self.registry
    }

    /// Active instances in creation order.
    pub fn instances(&self) -> &[DecoderInstance] {
        &self.instances
    }

    /// Start the engine and discover decoders in `decoders_dir`.
    ///
    /// Candidate modules are files carrying the engine's source extension,
    /// loaded in sorted filename order so registration order is
    /// deterministic. Loading a module is expected to trigger zero or one
    /// registration callback; a module that loads without registering
    /// contributes nothing, while a module that fails to load aborts the
    /// whole discovery. On any failure the engine is shut back down and
    /// everything registered so far is released, so `init` may be retried.
    pub fn init(&mut self, decoders_dir: &Path) -> Result<(), HostError> {
        self.expect_state("init", &[SessionState::Uninitialized])?;

        self.engine.startup()?;
        if let Err(e) = self.discover(decoders_dir) {
            self.registry.clear(&mut self.engine);
            self.engine.shutdown();
            return Err(e);
        }

        self.state = SessionState::Initialized;
        info!(
            "session initialized, {} decoders registered",
            self.registry.len()
        );
        Ok(())
    }

    fn discover(&mut self, decoders_dir: &Path) -> Result<(), HostError> {
        self.engine.append_search_path(decoders_dir)?;

        let dir_error = |source: std::io::Error| HostError::DecodersDir {
            path: decoders_dir.to_path_buf(),
            source,
        };
        let extension = self.engine.source_extension();
        let mut modules = Vec::new();
        for entry in fs::read_dir(decoders_dir).map_err(dir_error)? {
            let path = entry.map_err(dir_error)?.path();
            if path.extension().and_then(OsStr::to_str) != Some(extension) {
                continue;
            }
            if let Some(name) = path.file_stem().and_then(OsStr::to_str) {
                modules.push(name.to_string());
            }
        }
        modules.sort();

        for module in &modules {
            debug!("loading decoder module '{}'", module);
            let mut host = HostDispatch {
                registry: &mut self.registry,
                sink: self.sink.as_mut(),
            };
            if let Err(e) = self.engine.load_module(module, &mut host) {
                error!("decoder module '{}' failed to load: {}", module, e);
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Create an instance of the decoder registered under `id` and append
    /// it to the active list. The append position fixes its slot in the
    /// `start`/`feed` broadcast order.
    pub fn instance_new(&mut self, id: &str) -> Result<InstanceId, HostError> {
        self.expect_state(
            "instance_new",
            &[
                SessionState::Initialized,
                SessionState::Started,
                SessionState::Feeding,
            ],
        )?;

        let descriptor = self
            .registry
            .get(id)
            .ok_or_else(|| HostError::UnknownDecoder(id.to_string()))?;
        let object = self
            .engine
            .instantiate(descriptor.component())
            .map_err(|e| {
                error!("instantiation of decoder '{}' failed: {}", id, e);
                HostError::from(e)
            })?;

        debug!("created instance of decoder '{}'", id);
        self.instances.push(DecoderInstance::new(id, object));
        Ok(InstanceId(self.instances.len() - 1))
    }

    /// Bind a named probe to a channel index in the instance's own `probes`
    /// mapping. No range constraint is placed on `channel`; a duplicate
    /// probe name overwrites the previous index.
    pub fn set_probe(
        &mut self,
        instance: InstanceId,
        probe: &str,
        channel: i64,
    ) -> Result<(), HostError> {
        let di = self
            .instances
            .get(instance.0)
            .ok_or(HostError::Args("unknown decoder instance"))?;
        self.engine
            .set_mapping_entry(di.object(), "probes", probe, channel)
            .map_err(|e| {
                error!(
                    "probe binding '{}' on decoder '{}' failed: {}",
                    probe,
                    di.decoder_id(),
                    e
                );
                HostError::from(e)
            })
    }

    /// Broadcast capture metadata to every active instance, in creation
    /// order. The first failing instance aborts the call; instances already
    /// started are left started.
    pub fn start(
        &mut self,
        driver: &str,
        unitsize: u32,
        start_time: u64,
        sample_rate: u64,
    ) -> Result<(), HostError> {
        self.expect_state("start", &[SessionState::Initialized, SessionState::Started])?;

        let metadata = ScriptValue::map([
            ("driver", ScriptValue::from(driver)),
            ("unitsize", ScriptValue::Int(unitsize as i64)),
            ("starttime", ScriptValue::Int(start_time as i64)),
            ("samplerate", ScriptValue::Int(sample_rate as i64)),
        ]);

        for di in &self.instances {
            let mut host = HostDispatch {
                registry: &mut self.registry,
                sink: self.sink.as_mut(),
            };
            if let Err(e) = self
                .engine
                .invoke(di.object(), "start", metadata.clone(), &mut host)
            {
                error!("decoder '{}' failed to start: {}", di.decoder_id(), e);
                return Err(e.into());
            }
        }

        self.state = SessionState::Started;
        info!("session started, {} instances active", self.instances.len());
        Ok(())
    }

    /// Broadcast one sample buffer to every active instance, in creation
    /// order.
    ///
    /// The record carries the synthesized timestamp (total samples fed
    /// before this buffer) and the placeholder duration. Fail-fast: the
    /// first failing `decode` invocation aborts the whole feed as a fatal
    /// session error, and later-ordered instances are not invoked for this
    /// buffer. A partially fed session must not be fed further; `exit` is
    /// the only sensible continuation.
    pub fn feed(&mut self, buffer: &[u8]) -> Result<(), HostError> {
        self.expect_state("feed", &[SessionState::Started, SessionState::Feeding])?;
        if buffer.is_empty() {
            return Err(HostError::Args("empty sample buffer"));
        }

        let time = self.timebase.advance(buffer.len() as u64);
        let record = ScriptValue::map([
            ("time", ScriptValue::Int(time as i64)),
            ("duration", ScriptValue::Int(FEED_DURATION)),
            ("data", ScriptValue::Bytes(buffer.to_vec())),
        ]);

        for di in &self.instances {
            let mut host = HostDispatch {
                registry: &mut self.registry,
                sink: self.sink.as_mut(),
            };
            if let Err(e) = self
                .engine
                .invoke(di.object(), "decode", record.clone(), &mut host)
            {
                error!(
                    "decoder '{}' failed while decoding, aborting feed: {}",
                    di.decoder_id(),
                    e
                );
                return Err(e.into());
            }
        }

        self.state = SessionState::Feeding;
        Ok(())
    }

    /// Unwind the session: release every instance's object handle, then
    /// every descriptor's component handle, and shut the engine down.
    pub fn exit(&mut self) -> Result<(), HostError> {
        self.expect_state(
            "exit",
            &[
                SessionState::Initialized,
                SessionState::Started,
                SessionState::Feeding,
            ],
        )?;

        for instance in self.instances.drain(..) {
            self.engine.release_object(instance.object());
        }
        self.registry.clear(&mut self.engine);
        self.engine.shutdown();

        self.state = SessionState::Exited;
        info!("session exited");
        Ok(())
    }

    fn expect_state(
        &self,
        operation: &'static str,
        allowed: &[SessionState],
    ) -> Result<(), HostError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(HostError::State {
                operation,
                state: self.state,
            })
        }
    }
}

//! Example: Driving a decoder session end to end
//!
//! Hosts a small in-process scripting engine with one built-in UART-flavored
//! decoder and drives it through a full session: discovery, instantiation,
//! probe binding, start, several feeds, exit. Emitted records appear on
//! stdout as JSON lines.
//!
//! Usage:
//!   cargo run --example feed_session
//!
//! With an existing decoders directory (the engine only recognizes a module
//! named "uart"):
//!   cargo run --example feed_session -- --decoders-dir /path/to/decoders

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use clap::Parser;
use sigdec::{
    ComponentHandle, HostCallbacks, ObjectHandle, ScriptEngine, ScriptError, ScriptValue, Session,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory to discover decoder modules in. A throwaway directory with
    /// a single uart module is created when omitted.
    #[arg(long)]
    decoders_dir: Option<PathBuf>,

    /// Number of sample buffers to feed
    #[arg(short, long, default_value = "4")]
    feeds: usize,
}

/// In-process engine exposing one built-in decoder module named "uart".
///
/// Stands in for a real scripting environment: module loading triggers the
/// registration callback, and the "decoder" emits one record per fed byte.
struct DemoEngine {
    components: HashMap<u64, ()>,
    objects: HashMap<u64, BTreeMap<String, i64>>,
    next_handle: u64,
}

impl DemoEngine {
    fn new() -> Self {
        Self {
            components: HashMap::new(),
            objects: HashMap::new(),
            next_handle: 0,
        }
    }

    fn mint(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl ScriptEngine for DemoEngine {
    fn startup(&mut self) -> Result<(), ScriptError> {
        Ok(())
    }

    fn shutdown(&mut self) {
        self.components.clear();
        self.objects.clear();
    }

    fn source_extension(&self) -> &'static str {
        "py"
    }

    fn append_search_path(&mut self, _dir: &Path) -> Result<(), ScriptError> {
        Ok(())
    }

    fn load_module(&mut self, name: &str, host: &mut dyn HostCallbacks) -> Result<(), ScriptError> {
        if name != "uart" {
            return Err(ScriptError::LoadFailed {
                module: name.to_string(),
                reason: "unknown module".to_string(),
            });
        }
        let handle = self.mint();
        self.components.insert(handle, ());
        host.register(self, ComponentHandle(handle))
            .map_err(|e| ScriptError::LoadFailed {
                module: name.to_string(),
                reason: e.to_string(),
            })
    }

    fn string_attr(
        &mut self,
        _component: ComponentHandle,
        attr: &str,
    ) -> Result<String, ScriptError> {
        let value = match attr {
            "id" => "uart",
            "name" => "UART",
            "longname" => "Universal Asynchronous Receiver/Transmitter",
            "desc" => "Asynchronous serial protocol",
            "longdesc" => "Decodes asynchronous serial frames fed as raw sample bytes",
            "author" => "Demo Engine",
            "email" => "demo@example.org",
            "license" => "gplv2+",
            _ => {
                return Err(ScriptError::BadAttr {
                    attr: attr.to_string(),
                })
            }
        };
        Ok(value.to_string())
    }

    fn instantiate(&mut self, component: ComponentHandle) -> Result<ObjectHandle, ScriptError> {
        if !self.components.contains_key(&component.0) {
            return Err(ScriptError::InvalidHandle);
        }
        let handle = self.mint();
        self.objects.insert(handle, BTreeMap::new());
        Ok(ObjectHandle(handle))
    }

    fn set_mapping_entry(
        &mut self,
        object: ObjectHandle,
        attr: &str,
        key: &str,
        value: i64,
    ) -> Result<(), ScriptError> {
        if attr != "probes" {
            return Err(ScriptError::BadAttr {
                attr: attr.to_string(),
            });
        }
        let probes = self
            .objects
            .get_mut(&object.0)
            .ok_or(ScriptError::InvalidHandle)?;
        probes.insert(key.to_string(), value);
        Ok(())
    }

    fn invoke(
        &mut self,
        object: ObjectHandle,
        method: &str,
        args: ScriptValue,
        host: &mut dyn HostCallbacks,
    ) -> Result<ScriptValue, ScriptError> {
        if !self.objects.contains_key(&object.0) {
            return Err(ScriptError::InvalidHandle);
        }
        match method {
            "start" => Ok(ScriptValue::Int(0)),
            "decode" => {
                let time = args.get("time").and_then(ScriptValue::as_int).unwrap_or(0);
                let data = args
                    .get("data")
                    .and_then(ScriptValue::as_bytes)
                    .unwrap_or(&[]);
                for (i, byte) in data.iter().enumerate() {
                    host.emit(ScriptValue::map([
                        ("time", ScriptValue::Int(time + i as i64)),
                        ("duration", ScriptValue::Int(1)),
                        ("data", ScriptValue::from(format!("uart: 0x{byte:02X}"))),
                    ]));
                }
                Ok(ScriptValue::Int(data.len() as i64))
            }
            _ => Err(ScriptError::Raised {
                method: method.to_string(),
                reason: "no such method".to_string(),
            }),
        }
    }

    fn release_component(&mut self, component: ComponentHandle) {
        self.components.remove(&component.0);
    }

    fn release_object(&mut self, object: ObjectHandle) {
        self.objects.remove(&object.0);
    }
}

/// Create a throwaway decoders directory holding the uart module source.
fn scratch_decoders_dir() -> Result<PathBuf, std::io::Error> {
    let dir = std::env::temp_dir().join(format!("sigdec-demo-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    std::fs::write(dir.join("uart.py"), "# uart decoder source\n")?;
    Ok(dir)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let decoders_dir = match &args.decoders_dir {
        Some(dir) => dir.clone(),
        None => scratch_decoders_dir()?,
    };
    info!("=== Decoder Session Example ===");
    info!("Decoders directory: {}", decoders_dir.display());

    let mut session = Session::new(DemoEngine::new());
    session.init(&decoders_dir)?;

    for descriptor in session.registry().descriptors() {
        info!("available: {}", descriptor);
    }

    let uart = session.instance_new("uart")?;
    session.set_probe(uart, "RX", 0)?;
    session.start("demo", 1, 0, 1_000_000)?;

    // Feed a recognizable alternating pattern, two bytes at a time.
    for n in 0..args.feeds {
        let buffer = [0x55u8 ^ (n as u8), 0xAA ^ (n as u8)];
        session.feed(&buffer)?;
    }

    session.exit()?;
    info!("Done!");

    Ok(())
}

//! Registry of discovered decoder components
//!
//! Built once during session initialization: loading a decoder module
//! triggers a registration callback carrying a candidate object, whose
//! metadata is validated here before a durable handle is taken on it.
//! Descriptors are immutable once registered and live until session exit.

use std::fmt;

use tracing::info;

use crate::bridge::{ComponentHandle, ScriptEngine};
use crate::HostError;

/// Registry record describing one decoder component
///
/// All metadata fields are non-empty strings exactly as supplied by the
/// component. The descriptor holds the durable reference to the component's
/// factory; the registry releases it at teardown.
#[derive(Debug)]
pub struct DecoderDescriptor {
    pub id: String,
    pub name: String,
    pub longname: String,
    pub desc: String,
    pub longdesc: String,
    pub author: String,
    pub email: String,
    pub license: String,
    component: ComponentHandle,
}

impl DecoderDescriptor {
    fn from_candidate(
        engine: &mut dyn ScriptEngine,
        candidate: ComponentHandle,
    ) -> Result<Self, HostError> {
        Ok(Self {
            id: string_field(engine, candidate, "id")?,
            name: string_field(engine, candidate, "name")?,
            longname: string_field(engine, candidate, "longname")?,
            desc: string_field(engine, candidate, "desc")?,
            longdesc: string_field(engine, candidate, "longdesc")?,
            author: string_field(engine, candidate, "author")?,
            email: string_field(engine, candidate, "email")?,
            license: string_field(engine, candidate, "license")?,
            component: candidate,
        })
    }

    /// Handle of the component's factory inside the engine.
    pub fn component(&self) -> ComponentHandle {
        self.component
    }
}

impl fmt::Display for DecoderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.longname)
    }
}

/// Extract one required metadata field. Missing, non-string, and empty
/// values all reject the candidate.
fn string_field(
    engine: &mut dyn ScriptEngine,
    candidate: ComponentHandle,
    field: &'static str,
) -> Result<String, HostError> {
    let value = engine
        .string_attr(candidate, field)
        .map_err(|e| HostError::Metadata {
            field,
            reason: e.to_string(),
        })?;
    if value.is_empty() {
        return Err(HostError::Metadata {
            field,
            reason: "is empty".to_string(),
        });
    }
    Ok(value)
}

/// All discovered decoder descriptors, in registration order
#[derive(Debug, Default)]
pub struct DecoderRegistry {
    descriptors: Vec<DecoderDescriptor>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a registration candidate and append its descriptor.
    ///
    /// On any rejection (bad metadata, duplicate id) the candidate's handle
    /// is released here and the registry is left unchanged.
    pub fn register(
        &mut self,
        engine: &mut dyn ScriptEngine,
        candidate: ComponentHandle,
    ) -> Result<(), HostError> {
        let descriptor = match DecoderDescriptor::from_candidate(engine, candidate) {
            Ok(d) => d,
            Err(e) => {
                engine.release_component(candidate);
                return Err(e);
            }
        };

        if self.get(&descriptor.id).is_some() {
            engine.release_component(candidate);
            return Err(HostError::DuplicateDecoder(descriptor.id));
        }

        info!("registered decoder '{}'", descriptor.id);
        self.descriptors.push(descriptor);
        Ok(())
    }

    /// Full registry in registration order.
    pub fn descriptors(&self) -> &[DecoderDescriptor] {
        &self.descriptors
    }

    /// Registered decoder ids, in registration order.
    pub fn ids(&self) -> Vec<&str> {
        self.descriptors.iter().map(|d| d.id.as_str()).collect()
    }

    /// Look up a descriptor by id. Linear scan; decoder counts are small.
    pub fn get(&self, id: &str) -> Option<&DecoderDescriptor> {
        self.descriptors.iter().find(|d| d.id == id)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Release every held component handle and empty the registry.
    pub(crate) fn clear(&mut self, engine: &mut dyn ScriptEngine) {
        for descriptor in self.descriptors.drain(..) {
            engine.release_component(descriptor.component);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{HostCallbacks, ObjectHandle, ScriptError, ScriptValue};
    use std::collections::HashMap;
    use std::path::Path;

    // Minimal engine double: components are attribute tables, everything
    // else is unreachable from registry code.
    #[derive(Default)]
    struct AttrEngine {
        components: HashMap<u64, HashMap<&'static str, String>>,
        released: Vec<u64>,
        next: u64,
    }

    impl AttrEngine {
        fn add_component(&mut self, attrs: HashMap<&'static str, String>) -> ComponentHandle {
            self.next += 1;
            self.components.insert(self.next, attrs);
            ComponentHandle(self.next)
        }
    }

    impl ScriptEngine for AttrEngine {
        fn startup(&mut self) -> Result<(), ScriptError> {
            Ok(())
        }

        fn shutdown(&mut self) {}

        fn source_extension(&self) -> &'static str {
            "py"
        }

        fn append_search_path(&mut self, _dir: &Path) -> Result<(), ScriptError> {
            Ok(())
        }

        fn load_module(
            &mut self,
            name: &str,
            _host: &mut dyn HostCallbacks,
        ) -> Result<(), ScriptError> {
            Err(ScriptError::LoadFailed {
                module: name.to_string(),
                reason: "not supported by this double".to_string(),
            })
        }

        fn string_attr(
            &mut self,
            component: ComponentHandle,
            attr: &str,
        ) -> Result<String, ScriptError> {
            self.components
                .get(&component.0)
                .and_then(|attrs| attrs.get(attr))
                .cloned()
                .ok_or_else(|| ScriptError::BadAttr {
                    attr: attr.to_string(),
                })
        }

        fn instantiate(&mut self, _component: ComponentHandle) -> Result<ObjectHandle, ScriptError> {
            Err(ScriptError::Instantiate(
                "not supported by this double".to_string(),
            ))
        }

        fn set_mapping_entry(
            &mut self,
            _object: ObjectHandle,
            attr: &str,
            _key: &str,
            _value: i64,
        ) -> Result<(), ScriptError> {
            Err(ScriptError::BadAttr {
                attr: attr.to_string(),
            })
        }

        fn invoke(
            &mut self,
            _object: ObjectHandle,
            method: &str,
            _args: ScriptValue,
            _host: &mut dyn HostCallbacks,
        ) -> Result<ScriptValue, ScriptError> {
            Err(ScriptError::Raised {
                method: method.to_string(),
                reason: "not supported by this double".to_string(),
            })
        }

        fn release_component(&mut self, component: ComponentHandle) {
            self.components.remove(&component.0);
            self.released.push(component.0);
        }

        fn release_object(&mut self, _object: ObjectHandle) {}
    }

    fn uart_attrs() -> HashMap<&'static str, String> {
        [
            ("id", "uart"),
            ("name", "UART"),
            ("longname", "Universal Asynchronous Receiver/Transmitter"),
            ("desc", "Async serial protocol"),
            ("longdesc", "Decodes asynchronous serial frames"),
            ("author", "Jane Doe"),
            ("email", "jane@example.org"),
            ("license", "gplv2+"),
        ]
        .into_iter()
        .map(|(k, v)| (k, v.to_string()))
        .collect()
    }

    #[test]
    fn test_register_valid_candidate() {
        let mut engine = AttrEngine::default();
        let candidate = engine.add_component(uart_attrs());
        let mut registry = DecoderRegistry::new();

        registry.register(&mut engine, candidate).unwrap();

        let descriptor = registry.get("uart").expect("descriptor should exist");
        assert_eq!(descriptor.id, "uart");
        assert_eq!(descriptor.name, "UART");
        assert_eq!(descriptor.email, "jane@example.org");
        assert_eq!(registry.ids(), vec!["uart"]);
        assert!(engine.released.is_empty());
    }

    #[test]
    fn test_missing_field_rejects_and_releases() {
        let mut engine = AttrEngine::default();
        let mut attrs = uart_attrs();
        attrs.remove("license");
        let candidate = engine.add_component(attrs);
        let mut registry = DecoderRegistry::new();

        let err = registry.register(&mut engine, candidate).unwrap_err();
        assert!(matches!(err, HostError::Metadata { field: "license", .. }));
        assert!(registry.is_empty());
        assert_eq!(engine.released, vec![candidate.0]);
    }

    #[test]
    fn test_empty_field_rejects_and_releases() {
        let mut engine = AttrEngine::default();
        let mut attrs = uart_attrs();
        attrs.insert("desc", String::new());
        let candidate = engine.add_component(attrs);
        let mut registry = DecoderRegistry::new();

        let err = registry.register(&mut engine, candidate).unwrap_err();
        assert!(matches!(err, HostError::Metadata { field: "desc", .. }));
        assert!(registry.is_empty());
        assert_eq!(engine.released, vec![candidate.0]);
    }

    #[test]
    fn test_duplicate_id_rejected_first_wins() {
        let mut engine = AttrEngine::default();
        let first = engine.add_component(uart_attrs());
        let mut second_attrs = uart_attrs();
        second_attrs.insert("name", "UART (other)".to_string());
        let second = engine.add_component(second_attrs);
        let mut registry = DecoderRegistry::new();

        registry.register(&mut engine, first).unwrap();
        let err = registry.register(&mut engine, second).unwrap_err();

        assert!(matches!(err, HostError::DuplicateDecoder(ref id) if id == "uart"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("uart").unwrap().name, "UART");
        assert_eq!(engine.released, vec![second.0]);
    }

    #[test]
    fn test_get_unknown_id() {
        let registry = DecoderRegistry::new();
        assert!(registry.get("nonexistent").is_none());
        assert!(registry.descriptors().is_empty());
    }

    #[test]
    fn test_clear_releases_every_handle() {
        let mut engine = AttrEngine::default();
        let uart = engine.add_component(uart_attrs());
        let mut spi_attrs = uart_attrs();
        spi_attrs.insert("id", "spi".to_string());
        let spi = engine.add_component(spi_attrs);
        let mut registry = DecoderRegistry::new();

        registry.register(&mut engine, uart).unwrap();
        registry.register(&mut engine, spi).unwrap();
        registry.clear(&mut engine);

        assert!(registry.is_empty());
        assert_eq!(engine.released, vec![uart.0, spi.0]);
    }
}

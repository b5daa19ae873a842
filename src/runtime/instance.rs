//! Decoder instances active within a session

use crate::bridge::ObjectHandle;

/// Identifier of an active decoder instance
///
/// Indexes into the session's creation-ordered instance list; that order is
/// also the `start`/`feed` broadcast order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(pub(crate) usize);

/// One running instantiation of a registered decoder
///
/// The instance exclusively owns its scripted object handle for its whole
/// lifetime; the handle is released once, at session teardown. Probe
/// bindings live in the scripted object's own `probes` mapping, so the host
/// keeps no shadow copy here.
#[derive(Debug)]
pub struct DecoderInstance {
    decoder_id: String,
    object: ObjectHandle,
}

impl DecoderInstance {
    pub(crate) fn new(decoder_id: impl Into<String>, object: ObjectHandle) -> Self {
        Self {
            decoder_id: decoder_id.into(),
            object,
        }
    }

    /// Registry id of the decoder this instance was created from.
    pub fn decoder_id(&self) -> &str {
        &self.decoder_id
    }

    /// Handle of the instantiated scripted object.
    pub fn object(&self) -> ObjectHandle {
        self.object
    }
}

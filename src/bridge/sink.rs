//! Consumers for records emitted by decoder instances
//!
//! Sinks sit at the far end of the `emit` callback. Their contract is
//! print/serialize, never raise: a sink that cannot deliver a record logs
//! and drops it, so a misbehaving consumer can never fail the decoder
//! invocation that produced the record.

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::debug;

use super::value::ScriptValue;

/// Destination for decoder output records
pub trait EmissionSink {
    /// Consume one emitted record. Infallible by contract.
    fn emit(&mut self, record: &ScriptValue);
}

/// Default sink: one JSON line per record on stdout
#[derive(Debug, Default)]
pub struct StdoutSink;

impl EmissionSink for StdoutSink {
    fn emit(&mut self, record: &ScriptValue) {
        println!("{}", record);
    }
}

/// Sink that forwards records over a crossbeam channel
///
/// Lets an embedding application consume emissions off-session. Records
/// sent after the receiving side disconnects are dropped silently.
pub struct ChannelSink {
    tx: Sender<ScriptValue>,
}

impl ChannelSink {
    pub fn new(tx: Sender<ScriptValue>) -> Self {
        Self { tx }
    }

    /// Create a sink paired with an unbounded receiver.
    pub fn unbounded() -> (Self, Receiver<ScriptValue>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }
}

impl EmissionSink for ChannelSink {
    fn emit(&mut self, record: &ScriptValue) {
        if self.tx.send(record.clone()).is_err() {
            debug!("emission receiver disconnected, record dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_delivers_in_order() {
        let (mut sink, rx) = ChannelSink::unbounded();

        sink.emit(&ScriptValue::Int(1));
        sink.emit(&ScriptValue::Int(2));

        assert_eq!(rx.try_recv().unwrap(), ScriptValue::Int(1));
        assert_eq!(rx.try_recv().unwrap(), ScriptValue::Int(2));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_sink_survives_disconnected_receiver() {
        let (mut sink, rx) = ChannelSink::unbounded();
        drop(rx);

        // Must not panic or error; the record is dropped.
        sink.emit(&ScriptValue::Int(1));
    }
}

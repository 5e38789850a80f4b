//! Deterministic trace hooks.

use std::sync::mpsc::Sender;

use crate::{AccessKind, Decision, RegisterWriteResult};

/// Events emitted by [`crate::Iopmp`] when tracing is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceEvent {
    /// A transaction was arbitrated.
    Decision {
        /// Operation checked.
        kind: AccessKind,
        /// First byte address of the request.
        address: u64,
        /// Request length in bytes.
        length: u64,
        /// Arbitration outcome.
        decision: Decision,
    },
    /// An allowed transaction failed downstream.
    DownstreamError {
        /// Operation forwarded.
        kind: AccessKind,
        /// First byte address of the request.
        address: u64,
    },
    /// A configuration write completed.
    RegisterWrite {
        /// Register offset of the first byte.
        offset: u64,
        /// Access width in bytes.
        width: usize,
        /// Host-visible outcome.
        result: RegisterWriteResult,
    },
    /// The unit was reset.
    Reset,
}

/// Sink trait for deterministic trace hooks.
pub trait TraceSink {
    /// Records an event in the order it happened.
    fn on_event(&mut self, event: TraceEvent);
}

impl TraceSink for Vec<TraceEvent> {
    fn on_event(&mut self, event: TraceEvent) {
        self.push(event);
    }
}

impl TraceSink for Sender<TraceEvent> {
    fn on_event(&mut self, event: TraceEvent) {
        // A dropped receiver only means nobody is listening any more.
        let _ = self.send(event);
    }
}

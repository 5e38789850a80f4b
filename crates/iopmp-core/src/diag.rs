//! Saturating diagnostic counters for gates and the configuration port.

use crate::{Decision, DenyReason, RegisterWriteResult};

/// Per-gate decision counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct GateDiagnostics {
    /// Transactions forwarded downstream.
    pub allowed: u32,
    /// Denials where no entry matched.
    pub denied_no_match: u32,
    /// Denials where the governing entry lacked the permission.
    pub denied_permission: u32,
    /// Denials where the request straddled a region boundary.
    pub denied_partial_overlap: u32,
    /// Denials of malformed requests.
    pub denied_malformed: u32,
    /// Allowed transactions the downstream port failed.
    pub downstream_errors: u32,
    /// Last deny reason observed, if any.
    pub last_deny_reason: Option<DenyReason>,
    /// Address of the last denied request.
    pub last_deny_address: u64,
}

impl GateDiagnostics {
    /// Zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            allowed: 0,
            denied_no_match: 0,
            denied_permission: 0,
            denied_partial_overlap: 0,
            denied_malformed: 0,
            downstream_errors: 0,
            last_deny_reason: None,
            last_deny_address: 0,
        }
    }

    /// Records one arbitration outcome.
    pub fn record_decision(&mut self, decision: Decision, address: u64) {
        let Decision::Deny { reason, .. } = decision else {
            self.allowed = self.allowed.saturating_add(1);
            return;
        };
        self.last_deny_reason = Some(reason);
        self.last_deny_address = address;
        let counter = match reason {
            DenyReason::NoMatchingRegion => &mut self.denied_no_match,
            DenyReason::PermissionDenied => &mut self.denied_permission,
            DenyReason::PartialOverlap => &mut self.denied_partial_overlap,
            DenyReason::MalformedRequest => &mut self.denied_malformed,
        };
        *counter = counter.saturating_add(1);
    }

    /// Records a downstream failure on an allowed transaction.
    #[allow(clippy::missing_const_for_fn)]
    pub fn record_downstream_error(&mut self) {
        self.downstream_errors = self.downstream_errors.saturating_add(1);
    }

    /// Sum of all denial counters.
    #[must_use]
    pub const fn denied_total(&self) -> u32 {
        self.denied_no_match
            .saturating_add(self.denied_permission)
            .saturating_add(self.denied_partial_overlap)
            .saturating_add(self.denied_malformed)
    }

    /// Clears all counters.
    #[allow(clippy::missing_const_for_fn)]
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Configuration-port counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct PortDiagnostics {
    /// Register writes that changed or confirmed state.
    pub applied_writes: u32,
    /// Register writes that hit a locked field and were dropped.
    pub ignored_locked_writes: u32,
    /// Register writes rejected as unmapped or mis-sized.
    pub register_errors: u32,
}

impl PortDiagnostics {
    /// Records the outcome of one register write.
    #[allow(clippy::missing_const_for_fn)]
    pub fn record_write(&mut self, result: RegisterWriteResult) {
        match result {
            RegisterWriteResult::Applied => {
                self.applied_writes = self.applied_writes.saturating_add(1);
            }
            RegisterWriteResult::IgnoredLocked => {
                self.ignored_locked_writes = self.ignored_locked_writes.saturating_add(1);
            }
        }
    }

    /// Records a rejected register access.
    #[allow(clippy::missing_const_for_fn)]
    pub fn record_error(&mut self) {
        self.register_errors = self.register_errors.saturating_add(1);
    }
}

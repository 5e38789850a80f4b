//! Per-direction transaction gates.
//!
//! One generic [`TransactionGate`] is instantiated per bus direction. The
//! direction fixes which permission bit the arbiter checks.

use core::marker::PhantomData;

use crate::{
    evaluate, AccessKind, AccessRequest, Decision, DenyReason, GateDiagnostics, RegionTable,
};

/// Largest transaction a gate accepts, in bytes (one AXI burst never crosses
/// a 4 KiB boundary).
pub const MAX_TRANSFER_BYTES: usize = 4096;

/// Downstream transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortError {
    /// The target could not complete the read.
    ReadFailed,
    /// The target could not complete the write.
    WriteFailed,
}

/// Downstream memory or device behind the gates.
pub trait MemoryPort {
    /// Fills `buf` from `address` onward.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::ReadFailed`] when the target cannot complete the
    /// read.
    fn read(&mut self, address: u64, buf: &mut [u8]) -> Result<(), PortError>;

    /// Stores `data` from `address` onward.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::WriteFailed`] when the target cannot complete the
    /// write.
    fn write(&mut self, address: u64, data: &[u8]) -> Result<(), PortError>;
}

/// AXI response code returned to the initiator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum ResponseCode {
    /// Transfer completed.
    Okay = 0b00,
    /// Transfer refused or failed at the slave.
    SlvErr = 0b10,
}

impl ResponseCode {
    /// Two-bit `RRESP`/`BRESP` encoding.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Returns `true` for [`ResponseCode::Okay`].
    #[must_use]
    pub const fn is_okay(self) -> bool {
        matches!(self, Self::Okay)
    }
}

/// Response to a read or fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadResponse {
    /// Bus response code.
    pub code: ResponseCode,
    /// Returned bytes; zero-filled unless the read was allowed and succeeded.
    ///
    /// Empty for requests longer than [`MAX_TRANSFER_BYTES`].
    pub data: Vec<u8>,
    /// Arbitration outcome.
    pub decision: Decision,
}

/// Response to a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteResponse {
    /// Bus response code.
    pub code: ResponseCode,
    /// Arbitration outcome.
    pub decision: Decision,
}

/// Bus direction a gate guards.
pub trait Direction {
    /// Operation checked against each entry's permissions.
    const KIND: AccessKind;
}

/// Data-read direction (`R` bit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadPath;

/// Data-write direction (`W` bit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WritePath;

/// Instruction-fetch direction (`X` bit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchPath;

impl Direction for ReadPath {
    const KIND: AccessKind = AccessKind::Read;
}

impl Direction for WritePath {
    const KIND: AccessKind = AccessKind::Write;
}

impl Direction for FetchPath {
    const KIND: AccessKind = AccessKind::Execute;
}

/// Gate for one direction; holds only its counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionGate<D> {
    diagnostics: GateDiagnostics,
    direction: PhantomData<D>,
}

impl<D> Default for TransactionGate<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> TransactionGate<D> {
    /// Builds a gate with zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            diagnostics: GateDiagnostics::new(),
            direction: PhantomData,
        }
    }

    /// Gate counters.
    #[must_use]
    pub const fn diagnostics(&self) -> &GateDiagnostics {
        &self.diagnostics
    }

    /// Clears the counters.
    #[allow(clippy::missing_const_for_fn)]
    pub fn reset_diagnostics(&mut self) {
        self.diagnostics.reset();
    }
}

impl<D: Direction> TransactionGate<D> {
    /// Operation this gate checks.
    #[must_use]
    pub const fn kind(&self) -> AccessKind {
        D::KIND
    }

    /// Arbitrates one request against `table` and records the outcome.
    pub fn decide(&mut self, table: &RegionTable, address: u64, length: usize) -> Decision {
        let decision = if length > MAX_TRANSFER_BYTES {
            Decision::Deny {
                entry: None,
                reason: DenyReason::MalformedRequest,
            }
        } else {
            evaluate(table, &AccessRequest::new(address, length as u64, D::KIND))
        };
        self.diagnostics.record_decision(decision, address);
        if let Decision::Deny { entry, reason } = decision {
            log::debug!(
                "{:?} of {length} bytes at {address:#x} denied by entry {entry:?}: {reason}",
                D::KIND
            );
        }
        decision
    }

    fn load<M: MemoryPort>(
        &mut self,
        table: &RegionTable,
        memory: &mut M,
        address: u64,
        length: usize,
    ) -> ReadResponse {
        let decision = self.decide(table, address, length);
        // Oversized requests are refused without sizing a buffer from them.
        let mut data = if length > MAX_TRANSFER_BYTES {
            Vec::new()
        } else {
            vec![0_u8; length]
        };
        let code = if decision.is_allowed() {
            match memory.read(address, &mut data) {
                Ok(()) => ResponseCode::Okay,
                Err(err) => {
                    self.diagnostics.record_downstream_error();
                    log::debug!("downstream read at {address:#x} failed: {err:?}");
                    data.fill(0);
                    ResponseCode::SlvErr
                }
            }
        } else {
            ResponseCode::SlvErr
        };
        ReadResponse {
            code,
            data,
            decision,
        }
    }
}

impl TransactionGate<ReadPath> {
    /// Reads `length` bytes if the governing entry grants `R`.
    ///
    /// Denied reads are never forwarded and return zero-filled data.
    pub fn read<M: MemoryPort>(
        &mut self,
        table: &RegionTable,
        memory: &mut M,
        address: u64,
        length: usize,
    ) -> ReadResponse {
        self.load(table, memory, address, length)
    }
}

impl TransactionGate<FetchPath> {
    /// Fetches `length` bytes if the governing entry grants `X`.
    pub fn fetch<M: MemoryPort>(
        &mut self,
        table: &RegionTable,
        memory: &mut M,
        address: u64,
        length: usize,
    ) -> ReadResponse {
        self.load(table, memory, address, length)
    }
}

impl TransactionGate<WritePath> {
    /// Writes `data` if the governing entry grants `W`.
    ///
    /// Denied writes are never forwarded; memory is untouched.
    pub fn write<M: MemoryPort>(
        &mut self,
        table: &RegionTable,
        memory: &mut M,
        address: u64,
        data: &[u8],
    ) -> WriteResponse {
        let decision = self.decide(table, address, data.len());
        let code = if decision.is_allowed() {
            match memory.write(address, data) {
                Ok(()) => ResponseCode::Okay,
                Err(err) => {
                    self.diagnostics.record_downstream_error();
                    log::debug!("downstream write at {address:#x} failed: {err:?}");
                    ResponseCode::SlvErr
                }
            }
        } else {
            ResponseCode::SlvErr
        };
        WriteResponse { code, decision }
    }
}

/// Read gate.
pub type ReadGate = TransactionGate<ReadPath>;
/// Write gate.
pub type WriteGate = TransactionGate<WritePath>;
/// Instruction-fetch gate.
pub type FetchGate = TransactionGate<FetchPath>;

#[cfg(test)]
mod tests {
    use super::{
        FetchGate, MemoryPort, PortError, ReadGate, ResponseCode, WriteGate, MAX_TRANSFER_BYTES,
    };
    use crate::{
        AddressMode, ConfigPort, DenyReason, EntryConfig, IopmpConfig, Permissions, SimRam,
    };
    use rstest::rstest;

    struct FailingPort;

    impl MemoryPort for FailingPort {
        fn read(&mut self, _address: u64, buf: &mut [u8]) -> Result<(), PortError> {
            buf.fill(0xEE);
            Err(PortError::ReadFailed)
        }

        fn write(&mut self, _address: u64, _data: &[u8]) -> Result<(), PortError> {
            Err(PortError::WriteFailed)
        }
    }

    fn port_with(perms: Permissions) -> ConfigPort {
        let mut port = ConfigPort::new(IopmpConfig::default()).expect("default config is valid");
        // [0, 4096)
        port.write_entry(0, EntryConfig::new(AddressMode::Napot, perms), 0x1FF)
            .expect("entry 0 exists");
        port
    }

    #[test]
    fn response_codes_match_axi_encoding() {
        assert_eq!(ResponseCode::Okay.bits(), 0b00);
        assert_eq!(ResponseCode::SlvErr.bits(), 0b10);
        assert!(ResponseCode::Okay.is_okay());
        assert!(!ResponseCode::SlvErr.is_okay());
    }

    #[test]
    fn allowed_write_then_read_returns_payload() {
        let port = port_with(Permissions::READ_WRITE);
        let mut ram = SimRam::default();
        let mut read_gate = ReadGate::new();
        let mut write_gate = WriteGate::new();

        let write = write_gate.write(port.table(), &mut ram, 0x100, &[1, 2, 3, 4]);
        assert_eq!(write.code, ResponseCode::Okay);
        let read = read_gate.read(port.table(), &mut ram, 0x100, 4);
        assert_eq!(read.code, ResponseCode::Okay);
        assert_eq!(read.data, [1, 2, 3, 4]);
        assert_eq!(read_gate.diagnostics().allowed, 1);
        assert_eq!(write_gate.diagnostics().allowed, 1);
    }

    #[test]
    fn denied_write_leaves_memory_untouched() {
        let port = port_with(Permissions::READ);
        let mut ram = SimRam::default();
        ram.load(0x100, &[9; 4]);
        let mut gate = WriteGate::new();

        let write = gate.write(port.table(), &mut ram, 0x100, &[1, 2, 3, 4]);
        assert_eq!(write.code, ResponseCode::SlvErr);
        assert_eq!(write.decision.reason(), Some(DenyReason::PermissionDenied));
        assert_eq!(ram.peek(0x100, 4), [9; 4]);
        assert_eq!(gate.diagnostics().denied_permission, 1);
    }

    #[test]
    fn denied_read_is_zero_filled() {
        let port = port_with(Permissions::WRITE);
        let mut ram = SimRam::default();
        ram.load(0x100, &[0xA5; 8]);
        let mut gate = ReadGate::new();

        let read = gate.read(port.table(), &mut ram, 0x100, 8);
        assert_eq!(read.code, ResponseCode::SlvErr);
        assert_eq!(read.data, [0; 8]);
    }

    #[test]
    fn fetch_gate_checks_execute_bit() {
        let mut ram = SimRam::default();
        let mut gate = FetchGate::new();

        let port = port_with(Permissions::READ_WRITE);
        assert_eq!(
            gate.fetch(port.table(), &mut ram, 0, 4).code,
            ResponseCode::SlvErr
        );
        let port = port_with(Permissions::EXECUTE);
        assert_eq!(
            gate.fetch(port.table(), &mut ram, 0, 4).code,
            ResponseCode::Okay
        );
    }

    #[rstest]
    #[case(0)]
    #[case(MAX_TRANSFER_BYTES + 1)]
    fn malformed_lengths_are_refused(#[case] length: usize) {
        let port = port_with(Permissions::ALL);
        let mut ram = SimRam::default();
        let mut gate = ReadGate::new();
        let read = gate.read(port.table(), &mut ram, 0, length);
        assert_eq!(read.code, ResponseCode::SlvErr);
        assert_eq!(read.decision.reason(), Some(DenyReason::MalformedRequest));
        assert_eq!(gate.diagnostics().denied_malformed, 1);
    }

    #[rstest]
    #[case(MAX_TRANSFER_BYTES + 1)]
    #[case(usize::MAX / 2)]
    #[case(usize::MAX)]
    fn oversized_requests_return_no_data(#[case] length: usize) {
        let port = port_with(Permissions::ALL);
        let mut ram = SimRam::default();
        let mut read_gate = ReadGate::new();
        let mut fetch_gate = FetchGate::new();

        let read = read_gate.read(port.table(), &mut ram, 0, length);
        assert_eq!(read.code, ResponseCode::SlvErr);
        assert_eq!(read.decision.reason(), Some(DenyReason::MalformedRequest));
        assert!(read.data.is_empty());

        let fetch = fetch_gate.fetch(port.table(), &mut ram, 0, length);
        assert_eq!(fetch.code, ResponseCode::SlvErr);
        assert!(fetch.data.is_empty());
    }

    #[test]
    fn downstream_failures_become_slverr() {
        let port = port_with(Permissions::READ_WRITE);
        let mut read_gate = ReadGate::new();
        let mut write_gate = WriteGate::new();

        let read = read_gate.read(port.table(), &mut FailingPort, 0, 4);
        assert_eq!(read.code, ResponseCode::SlvErr);
        assert!(read.decision.is_allowed());
        assert_eq!(read.data, [0; 4]);
        assert_eq!(read_gate.diagnostics().downstream_errors, 1);

        let write = write_gate.write(port.table(), &mut FailingPort, 0, &[1]);
        assert_eq!(write.code, ResponseCode::SlvErr);
        assert_eq!(write_gate.diagnostics().downstream_errors, 1);
    }
}

//! Access-control decision engine for an I/O physical memory protection unit.

/// Denial reasons and configuration/register error types.
pub mod fault;
pub use fault::{ConfigError, DenyReason, RegisterError};

/// Static hardware parameters and their validation.
pub mod config;
pub use config::{
    IopmpConfig, ADDR_REGISTER_STRIDE, CFG_WINDOW_BYTES, DEFAULT_ADDR_BASE, DEFAULT_CFG_BASE,
    DEFAULT_ENTRY_COUNT, DEFAULT_GRANULARITY_LOG2, DEFAULT_PMP_LEN, MAX_ENTRIES, MAX_PMP_LEN,
};

/// Region entries, the priority table and the address decoder.
pub mod region;
pub use region::{
    address_field_mask, decode, effective_address_field, AddressMode, AddressRange, EntryConfig,
    Permissions, RegionEntry, RegionTable, CFG_LOCK_BIT, CFG_MODE_MASK, CFG_MODE_SHIFT,
    CFG_PERMISSION_MASK, CFG_RESERVED_MASK,
};

/// First-match priority arbitration.
pub mod arbiter;
pub use arbiter::{evaluate, AccessKind, AccessRequest, Decision};

/// Saturating gate and port counters.
pub mod diag;
pub use diag::{GateDiagnostics, PortDiagnostics};

/// Register-mapped configuration port.
pub mod port;
pub use port::{ConfigPort, RegisterWriteResult, MAX_REGISTER_ACCESS_BYTES};

/// Per-direction transaction gates and the downstream port contract.
pub mod gate;
pub use gate::{
    Direction, FetchGate, FetchPath, MemoryPort, PortError, ReadGate, ReadPath, ReadResponse,
    ResponseCode, TransactionGate, WriteGate, WritePath, WriteResponse, MAX_TRANSFER_BYTES,
};

/// Simulated downstream RAM.
pub mod memory;
pub use memory::{SimRam, DEFAULT_SIM_RAM_BYTES};

/// Driver-side region programming and granularity discovery.
pub mod configurator;
pub use configurator::{
    napot_address_field, probe_granularity, program_napot, program_tor, tor_address_field,
    RegisterInterface,
};

/// Deterministic trace hooks.
pub mod trace;
pub use trace::{TraceEvent, TraceSink};

/// Top-level unit composing port, gates and memory.
pub mod iopmp;
pub use iopmp::Iopmp;

#[cfg(test)]
use proptest as _;

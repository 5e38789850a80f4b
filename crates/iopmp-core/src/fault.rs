use thiserror::Error;

/// Why a transaction was refused.
///
/// Every variant is reported to the bus as `SLVERR`; the distinction only
/// exists for diagnostics and trace consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum DenyReason {
    /// No active entry covers any byte of the request.
    #[error("no region covers the requested range")]
    NoMatchingRegion = 0x01,
    /// The governing entry covers the request but lacks the permission bit.
    #[error("governing region does not grant the requested operation")]
    PermissionDenied = 0x02,
    /// The request crosses the boundary of the governing entry.
    #[error("request straddles a region boundary")]
    PartialOverlap = 0x03,
    /// Zero-length, oversized or address-overflowing request.
    #[error("malformed transaction request")]
    MalformedRequest = 0x04,
}

impl DenyReason {
    /// Converts the reason to its stable diagnostic code.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Converts a stable diagnostic code back into a reason.
    #[must_use]
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::NoMatchingRegion),
            0x02 => Some(Self::PermissionDenied),
            0x03 => Some(Self::PartialOverlap),
            0x04 => Some(Self::MalformedRequest),
            _ => None,
        }
    }

    /// Returns `true` for the access-denied class (unclaimed space or a
    /// governing entry without the permission).
    #[must_use]
    pub const fn is_access_denied(self) -> bool {
        matches!(self, Self::NoMatchingRegion | Self::PermissionDenied)
    }
}

/// Failures on the register-mapped configuration surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum RegisterError {
    /// At least one byte of the access falls outside the ADDR and CFG windows.
    #[error("register offset {0:#x} is not mapped")]
    UnmappedOffset(u64),
    /// Access width outside `1..=16` bytes.
    #[error("unsupported register access width of {0} bytes")]
    InvalidWidth(usize),
    /// Entry index beyond the configured table size.
    #[error("entry {index} does not exist (table holds {count} entries)")]
    EntryOutOfRange {
        /// Requested entry index.
        index: usize,
        /// Number of implemented entries.
        count: usize,
    },
}

/// Failures building a unit or programming regions into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ConfigError {
    /// Entry count outside `1..=MAX_ENTRIES`.
    #[error("invalid entry count {0}")]
    InvalidEntryCount(usize),
    /// Address-field width outside `1..=MAX_PMP_LEN`.
    #[error("invalid address field width {0}")]
    InvalidPmpLen(u32),
    /// Granularity cannot be represented by the address field width.
    #[error("granularity 2^{granularity_log2} is not representable with a {pmp_len}-bit address field")]
    InvalidGranularity {
        /// Requested log2 of the minimum region size.
        granularity_log2: u32,
        /// Configured address-field width.
        pmp_len: u32,
    },
    /// The ADDR and CFG register windows intersect.
    #[error("ADDR window at {addr_base:#x} overlaps CFG window at {cfg_base:#x}")]
    OverlappingWindows {
        /// Base offset of the address registers.
        addr_base: u64,
        /// Base offset of the control-byte registers.
        cfg_base: u64,
    },
    /// NAPOT base/size pair that the encoding cannot express.
    #[error("cannot encode NAPOT region of {size:#x} bytes at {base:#x}")]
    InvalidNapotRegion {
        /// Requested base address.
        base: u64,
        /// Requested size in bytes.
        size: u64,
    },
    /// TOR boundary that is not word aligned or exceeds the address field.
    #[error("cannot encode TOR boundary {0:#x}")]
    InvalidTorBoundary(u64),
    /// The entry is locked and its configuration cannot change until reset.
    #[error("entry {0} is locked")]
    EntryLocked(usize),
    /// Probe readback had no bit set, so granularity cannot be derived.
    #[error("granularity probe read back zero")]
    GranularityUndetectable,
    /// Underlying register access failed.
    #[error(transparent)]
    Register(#[from] RegisterError),
}

//! Static hardware parameters for one IOPMP instance.

use crate::ConfigError;

/// Largest number of region entries the register map can describe.
pub const MAX_ENTRIES: usize = 16;

/// Widest supported address field (RV64 `pmpaddr` width, 56-bit physical).
pub const MAX_PMP_LEN: u32 = 54;

/// Default number of region entries.
pub const DEFAULT_ENTRY_COUNT: usize = 16;

/// Default address-field width.
pub const DEFAULT_PMP_LEN: u32 = 54;

/// Default log2 of the minimum enforceable region size (4 KiB).
pub const DEFAULT_GRANULARITY_LOG2: u32 = 12;

/// Default byte offset of `ADDR_0`.
pub const DEFAULT_ADDR_BASE: u64 = 0x00;

/// Default byte offset of the packed control-byte registers.
pub const DEFAULT_CFG_BASE: u64 = 0x80;

/// Stride between consecutive `ADDR_i` registers.
pub const ADDR_REGISTER_STRIDE: u64 = 8;

/// Size of the CFG window; always covers [`MAX_ENTRIES`] control bytes.
pub const CFG_WINDOW_BYTES: u64 = MAX_ENTRIES as u64;

/// Top-level immutable configuration for a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct IopmpConfig {
    /// Number of implemented region entries.
    pub entry_count: usize,
    /// Width in bits of every `address_field`.
    pub pmp_len: u32,
    /// log2 of the smallest region size the hardware can enforce.
    pub granularity_log2: u32,
    /// Byte offset of `ADDR_0` on the configuration bus.
    pub addr_base: u64,
    /// Byte offset of the first control byte on the configuration bus.
    pub cfg_base: u64,
    /// Enables dispatch of [`crate::TraceEvent`]s to an installed sink.
    pub tracing_enabled: bool,
}

impl Default for IopmpConfig {
    fn default() -> Self {
        Self {
            entry_count: DEFAULT_ENTRY_COUNT,
            pmp_len: DEFAULT_PMP_LEN,
            granularity_log2: DEFAULT_GRANULARITY_LOG2,
            addr_base: DEFAULT_ADDR_BASE,
            cfg_base: DEFAULT_CFG_BASE,
            tracing_enabled: false,
        }
    }
}

impl IopmpConfig {
    /// Checks that the parameters describe buildable hardware.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found: entry count, address width,
    /// granularity, then register-window placement.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entry_count == 0 || self.entry_count > MAX_ENTRIES {
            return Err(ConfigError::InvalidEntryCount(self.entry_count));
        }
        if self.pmp_len == 0 || self.pmp_len > MAX_PMP_LEN {
            return Err(ConfigError::InvalidPmpLen(self.pmp_len));
        }
        // Bits [G-3:0] are hardwired, so at least one writable bit must remain
        // for the granularity probe to observe.
        if self.granularity_log2 < 2 || self.granularity_log2 > self.pmp_len + 1 {
            return Err(ConfigError::InvalidGranularity {
                granularity_log2: self.granularity_log2,
                pmp_len: self.pmp_len,
            });
        }

        let addr_end = self
            .addr_base
            .checked_add(self.addr_window_bytes())
            .ok_or(ConfigError::OverlappingWindows {
                addr_base: self.addr_base,
                cfg_base: self.cfg_base,
            })?;
        let cfg_end = self
            .cfg_base
            .checked_add(CFG_WINDOW_BYTES)
            .ok_or(ConfigError::OverlappingWindows {
                addr_base: self.addr_base,
                cfg_base: self.cfg_base,
            })?;
        if self.addr_base < cfg_end && self.cfg_base < addr_end {
            return Err(ConfigError::OverlappingWindows {
                addr_base: self.addr_base,
                cfg_base: self.cfg_base,
            });
        }
        Ok(())
    }

    /// Size in bytes of the ADDR register window.
    #[must_use]
    pub const fn addr_window_bytes(&self) -> u64 {
        self.entry_count as u64 * ADDR_REGISTER_STRIDE
    }

    /// Byte offset of `ADDR_index`.
    #[must_use]
    pub const fn addr_offset(&self, index: usize) -> u64 {
        self.addr_base + index as u64 * ADDR_REGISTER_STRIDE
    }

    /// Byte offset of the control byte for entry `index`.
    #[must_use]
    pub const fn cfg_offset(&self, index: usize) -> u64 {
        self.cfg_base + index as u64
    }

    /// Byte offset of the 64-bit CFG register that packs entry `index`.
    #[must_use]
    pub const fn cfg_register_offset(&self, index: usize) -> u64 {
        self.cfg_base + (index as u64 / 8) * 8
    }

    /// Smallest region size, in bytes, the hardware enforces.
    #[must_use]
    pub const fn granule_bytes(&self) -> u64 {
        1 << self.granularity_log2
    }
}

//! Register-mapped configuration port owning the region table.
//!
//! The table lives behind a copy-on-write [`Arc`]. Gates take a snapshot per
//! transaction, so a configuration write is observed by a transaction either
//! entirely or not at all.

use std::sync::Arc;

use crate::{
    address_field_mask, AddressMode, ConfigError, EntryConfig, IopmpConfig, PortDiagnostics,
    RegionTable, RegisterError, ADDR_REGISTER_STRIDE, CFG_WINDOW_BYTES,
};

/// Largest single register access, in bytes.
pub const MAX_REGISTER_ACCESS_BYTES: usize = 16;

/// Host-visible outcome of a configuration write.
///
/// The bus never sees an error for a locked write; the distinction exists
/// for the host and the diagnostic counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RegisterWriteResult {
    /// Every targeted field took the written value.
    Applied,
    /// At least one targeted field is locked and kept its previous value.
    IgnoredLocked,
}

impl RegisterWriteResult {
    pub(crate) const fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Applied, Self::Applied) => Self::Applied,
            _ => Self::IgnoredLocked,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lane {
    Addr { index: usize, byte: usize },
    Cfg { index: usize },
}

/// Configuration port: the only writer of the region table.
#[derive(Debug, Clone)]
pub struct ConfigPort {
    config: IopmpConfig,
    table: Arc<RegionTable>,
    diagnostics: PortDiagnostics,
}

impl ConfigPort {
    /// Builds a port with every entry OFF and unlocked.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] reported by [`IopmpConfig::validate`].
    pub fn new(config: IopmpConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let table = Arc::new(RegionTable::new(&config));
        Ok(Self {
            config,
            table,
            diagnostics: PortDiagnostics::default(),
        })
    }

    /// Static hardware parameters.
    #[must_use]
    pub const fn config(&self) -> &IopmpConfig {
        &self.config
    }

    /// Current table contents.
    #[must_use]
    pub fn table(&self) -> &RegionTable {
        &self.table
    }

    /// Shared handle to the current table; later writes never alter it.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RegionTable> {
        Arc::clone(&self.table)
    }

    /// Port counters.
    #[must_use]
    pub const fn diagnostics(&self) -> &PortDiagnostics {
        &self.diagnostics
    }

    /// Hardware reset: every entry OFF, unlocked, address zero.
    pub fn reset(&mut self) {
        Arc::make_mut(&mut self.table).reset();
        self.diagnostics = PortDiagnostics::default();
        log::debug!("configuration port reset");
    }

    /// Reads `buf.len()` bytes starting at register offset `offset`.
    ///
    /// ADDR registers return the mode-dependent view of the address field;
    /// control bytes of unimplemented entries read as zero.
    ///
    /// # Errors
    ///
    /// [`RegisterError::InvalidWidth`] for widths outside `1..=16`,
    /// [`RegisterError::UnmappedOffset`] when any byte falls outside both
    /// windows.
    pub fn read(&self, offset: u64, buf: &mut [u8]) -> Result<(), RegisterError> {
        let lanes = self.map_lanes(offset, buf.len())?;
        for (lane, out) in lanes.into_iter().zip(buf.iter_mut()) {
            *out = match lane {
                Lane::Addr { index, byte } => self
                    .table
                    .effective_address_field(index)
                    .map_or(0, |field| field.to_le_bytes()[byte]),
                Lane::Cfg { index } => self
                    .table
                    .entry(index)
                    .map_or(0, |entry| entry.config.to_byte()),
            };
        }
        Ok(())
    }

    /// Writes `data` starting at register offset `offset`.
    ///
    /// Bytes are merged into their registers lane by lane, then registers are
    /// committed in ascending offset order. Locked fields keep their value.
    ///
    /// # Errors
    ///
    /// Same conditions as [`ConfigPort::read`]; nothing is written on error.
    pub fn write(
        &mut self,
        offset: u64,
        data: &[u8],
    ) -> Result<RegisterWriteResult, RegisterError> {
        let lanes = match self.map_lanes(offset, data.len()) {
            Ok(lanes) => lanes,
            Err(err) => {
                self.diagnostics.record_error();
                log::debug!("rejected config write at {offset:#x}: {err}");
                return Err(err);
            }
        };

        let field_mask = address_field_mask(self.config.pmp_len);
        let table = Arc::make_mut(&mut self.table);
        let mut result = RegisterWriteResult::Applied;
        let mut pending: Option<(usize, [u8; 8])> = None;

        for (lane, &value) in lanes.into_iter().zip(data) {
            match lane {
                Lane::Addr { index, byte } => {
                    let mut bytes = match pending {
                        Some((pending_index, bytes)) if pending_index == index => bytes,
                        Some((pending_index, bytes)) => {
                            result = result.merge(store_address_field(
                                table,
                                pending_index,
                                u64::from_le_bytes(bytes) & field_mask,
                            ));
                            raw_field_bytes(table, index)
                        }
                        None => raw_field_bytes(table, index),
                    };
                    bytes[byte] = value;
                    pending = Some((index, bytes));
                }
                Lane::Cfg { index } => {
                    if let Some((pending_index, bytes)) = pending.take() {
                        result = result.merge(store_address_field(
                            table,
                            pending_index,
                            u64::from_le_bytes(bytes) & field_mask,
                        ));
                    }
                    result = result.merge(store_config_byte(table, index, value));
                }
            }
        }
        if let Some((pending_index, bytes)) = pending {
            result = result.merge(store_address_field(
                table,
                pending_index,
                u64::from_le_bytes(bytes) & field_mask,
            ));
        }

        self.diagnostics.record_write(result);
        match result {
            RegisterWriteResult::Applied => {
                log::trace!("config write at {offset:#x} ({} bytes) applied", data.len());
            }
            RegisterWriteResult::IgnoredLocked => {
                log::debug!("config write at {offset:#x} hit a locked entry");
            }
        }
        Ok(result)
    }

    /// Reads one 64-bit little-endian register.
    ///
    /// # Errors
    ///
    /// See [`ConfigPort::read`].
    pub fn read_u64(&self, offset: u64) -> Result<u64, RegisterError> {
        let mut bytes = [0_u8; 8];
        self.read(offset, &mut bytes)?;
        Ok(u64::from_le_bytes(bytes))
    }

    /// Writes one 64-bit little-endian register.
    ///
    /// # Errors
    ///
    /// See [`ConfigPort::write`].
    pub fn write_u64(
        &mut self,
        offset: u64,
        value: u64,
    ) -> Result<RegisterWriteResult, RegisterError> {
        self.write(offset, &value.to_le_bytes())
    }

    /// Reads `ADDR_index` as the hardware exposes it.
    ///
    /// # Errors
    ///
    /// [`RegisterError::EntryOutOfRange`] for unimplemented entries.
    pub fn read_address_field(&self, index: usize) -> Result<u64, RegisterError> {
        self.check_index(index)?;
        self.read_u64(self.config.addr_offset(index))
    }

    /// Writes `ADDR_index`; bits above the field width are dropped.
    ///
    /// # Errors
    ///
    /// [`RegisterError::EntryOutOfRange`] for unimplemented entries.
    pub fn write_address_field(
        &mut self,
        index: usize,
        value: u64,
    ) -> Result<RegisterWriteResult, RegisterError> {
        self.check_index(index)?;
        self.write_u64(self.config.addr_offset(index), value)
    }

    /// Reads the control byte of entry `index`.
    ///
    /// # Errors
    ///
    /// [`RegisterError::EntryOutOfRange`] for unimplemented entries.
    pub fn read_config_byte(&self, index: usize) -> Result<u8, RegisterError> {
        self.check_index(index)?;
        let mut byte = [0_u8; 1];
        self.read(self.config.cfg_offset(index), &mut byte)?;
        Ok(byte[0])
    }

    /// Writes the control byte of entry `index`.
    ///
    /// # Errors
    ///
    /// [`RegisterError::EntryOutOfRange`] for unimplemented entries.
    pub fn write_config_byte(
        &mut self,
        index: usize,
        byte: u8,
    ) -> Result<RegisterWriteResult, RegisterError> {
        self.check_index(index)?;
        self.write(self.config.cfg_offset(index), &[byte])
    }

    /// Programs one entry: address field first, then the control byte, so a
    /// configuration that sets the lock bit still takes its address.
    ///
    /// # Errors
    ///
    /// [`RegisterError::EntryOutOfRange`] for unimplemented entries.
    pub fn write_entry(
        &mut self,
        index: usize,
        config: EntryConfig,
        address_field: u64,
    ) -> Result<RegisterWriteResult, RegisterError> {
        let address = self.write_address_field(index, address_field)?;
        let control = self.write_config_byte(index, config.to_byte())?;
        Ok(address.merge(control))
    }

    const fn check_index(&self, index: usize) -> Result<(), RegisterError> {
        if index < self.config.entry_count {
            Ok(())
        } else {
            Err(RegisterError::EntryOutOfRange {
                index,
                count: self.config.entry_count,
            })
        }
    }

    fn lane(&self, offset: u64) -> Option<Lane> {
        if let Some(rel) = offset.checked_sub(self.config.addr_base) {
            if rel < self.config.addr_window_bytes() {
                return Some(Lane::Addr {
                    index: usize::try_from(rel / ADDR_REGISTER_STRIDE).ok()?,
                    byte: usize::try_from(rel % ADDR_REGISTER_STRIDE).ok()?,
                });
            }
        }
        let rel = offset.checked_sub(self.config.cfg_base)?;
        if rel < CFG_WINDOW_BYTES {
            return Some(Lane::Cfg {
                index: usize::try_from(rel).ok()?,
            });
        }
        None
    }

    fn map_lanes(&self, offset: u64, width: usize) -> Result<Vec<Lane>, RegisterError> {
        if width == 0 || width > MAX_REGISTER_ACCESS_BYTES {
            return Err(RegisterError::InvalidWidth(width));
        }
        (0..width as u64)
            .map(|i| {
                offset
                    .checked_add(i)
                    .and_then(|at| self.lane(at))
                    .ok_or_else(|| RegisterError::UnmappedOffset(offset.wrapping_add(i)))
            })
            .collect()
    }
}

fn raw_field_bytes(table: &RegionTable, index: usize) -> [u8; 8] {
    table
        .entry(index)
        .map_or(0, |entry| entry.address_field)
        .to_le_bytes()
}

fn address_locked(table: &RegionTable, index: usize) -> bool {
    let own = table.entry(index).is_some_and(|entry| entry.config.locked);
    let next_tor = table.entry(index + 1).is_some_and(|next| {
        next.config.locked && next.config.mode == AddressMode::Tor
    });
    own || next_tor
}

fn store_address_field(table: &mut RegionTable, index: usize, value: u64) -> RegisterWriteResult {
    let locked = address_locked(table, index);
    let Some(entry) = table.entry_mut(index) else {
        return RegisterWriteResult::Applied;
    };
    if entry.address_field == value {
        return RegisterWriteResult::Applied;
    }
    if locked {
        return RegisterWriteResult::IgnoredLocked;
    }
    entry.address_field = value;
    RegisterWriteResult::Applied
}

fn store_config_byte(table: &mut RegionTable, index: usize, byte: u8) -> RegisterWriteResult {
    let granularity_log2 = table.granularity_log2();
    let Some(entry) = table.entry_mut(index) else {
        return RegisterWriteResult::Applied;
    };
    let mut config = EntryConfig::from_byte(byte);
    // NA4 needs a four-byte granule.
    if config.mode == AddressMode::Na4 && granularity_log2 > 2 {
        config.mode = AddressMode::Napot;
    }
    if entry.config == config {
        return RegisterWriteResult::Applied;
    }
    if entry.config.locked {
        return RegisterWriteResult::IgnoredLocked;
    }
    entry.config = config;
    RegisterWriteResult::Applied
}

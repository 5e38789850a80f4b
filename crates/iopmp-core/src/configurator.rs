//! Driver-side helpers that program regions over the register interface.
//!
//! Everything here goes through [`RegisterInterface`], so the same sequences
//! drive a bare [`ConfigPort`] or a full [`crate::Iopmp`] unit.

use crate::{
    AddressMode, ConfigError, ConfigPort, EntryConfig, IopmpConfig, Permissions, RegisterError,
    RegisterWriteResult, CFG_LOCK_BIT, CFG_MODE_MASK, MAX_PMP_LEN,
};

/// Byte-addressed configuration registers.
pub trait RegisterInterface {
    /// Static parameters of the unit behind the interface.
    fn iopmp_config(&self) -> &IopmpConfig;

    /// Reads `buf.len()` register bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns a [`RegisterError`] for unmapped or mis-sized accesses.
    fn read_register(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), RegisterError>;

    /// Writes `data` to the registers starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns a [`RegisterError`] for unmapped or mis-sized accesses.
    fn write_register(
        &mut self,
        offset: u64,
        data: &[u8],
    ) -> Result<RegisterWriteResult, RegisterError>;
}

impl RegisterInterface for ConfigPort {
    fn iopmp_config(&self) -> &IopmpConfig {
        self.config()
    }

    fn read_register(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), RegisterError> {
        self.read(offset, buf)
    }

    fn write_register(
        &mut self,
        offset: u64,
        data: &[u8],
    ) -> Result<RegisterWriteResult, RegisterError> {
        self.write(offset, data)
    }
}

/// Encodes a NAPOT region as an address field.
///
/// # Errors
///
/// [`ConfigError::InvalidNapotRegion`] unless `size` is a power of two of at
/// least 8, `base` is aligned to `size`, and the field fits the widest
/// supported address register.
pub fn napot_address_field(base: u64, size: u64) -> Result<u64, ConfigError> {
    let invalid = ConfigError::InvalidNapotRegion { base, size };
    if size < 8 || !size.is_power_of_two() || base & (size - 1) != 0 {
        return Err(invalid);
    }
    let field = base.checked_add(size / 2 - 1).ok_or(invalid)? >> 2;
    if field >> MAX_PMP_LEN != 0 {
        return Err(invalid);
    }
    Ok(field)
}

/// Encodes an exclusive TOR upper boundary as an address field.
///
/// # Errors
///
/// [`ConfigError::InvalidTorBoundary`] for unaligned or out-of-range
/// boundaries.
pub const fn tor_address_field(top: u64) -> Result<u64, ConfigError> {
    if top & 0b11 != 0 || (top >> 2) >> MAX_PMP_LEN != 0 {
        return Err(ConfigError::InvalidTorBoundary(top));
    }
    Ok(top >> 2)
}

/// Programs entry `index` as the NAPOT region `[base, base + size)`.
///
/// Writes `ADDR_index`, then read-modify-writes the 64-bit CFG register
/// holding the entry's control byte.
///
/// # Errors
///
/// Encoding errors from [`napot_address_field`], [`ConfigError::EntryLocked`]
/// for a locked entry, or the underlying [`RegisterError`].
pub fn program_napot<R: RegisterInterface + ?Sized>(
    bus: &mut R,
    index: usize,
    base: u64,
    size: u64,
    permissions: Permissions,
) -> Result<RegisterWriteResult, ConfigError> {
    let field = napot_address_field(base, size)?;
    program_entry(
        bus,
        index,
        field,
        EntryConfig::new(AddressMode::Napot, permissions),
    )
}

/// Programs entry `index` as a TOR region ending at `top` (exclusive).
///
/// The lower bound is whatever `ADDR_{index-1}` holds.
///
/// # Errors
///
/// Encoding errors from [`tor_address_field`], [`ConfigError::EntryLocked`]
/// for a locked entry, or the underlying [`RegisterError`].
pub fn program_tor<R: RegisterInterface + ?Sized>(
    bus: &mut R,
    index: usize,
    top: u64,
    permissions: Permissions,
) -> Result<RegisterWriteResult, ConfigError> {
    let field = tor_address_field(top)?;
    program_entry(
        bus,
        index,
        field,
        EntryConfig::new(AddressMode::Tor, permissions),
    )
}

/// Discovers the region granularity, as log2 bytes, using entry `index`.
///
/// Turns the entry OFF, writes all-ones to its address field and counts the
/// hardwired trailing zeros of the readback. The entry's previous control
/// byte and address view are restored afterwards.
///
/// # Errors
///
/// [`ConfigError::EntryLocked`] when the entry or its address register is
/// frozen, [`ConfigError::GranularityUndetectable`] when nothing reads back.
pub fn probe_granularity<R: RegisterInterface + ?Sized>(
    bus: &mut R,
    index: usize,
) -> Result<u32, ConfigError> {
    let config = bus.iopmp_config().clone();
    check_index(&config, index)?;

    let saved_cfg = read_cfg_byte(bus, &config, index)?;
    if saved_cfg & CFG_LOCK_BIT != 0 {
        return Err(ConfigError::EntryLocked(index));
    }
    let saved_addr = read_u64(bus, config.addr_offset(index))?;

    write_cfg_byte(bus, &config, index, saved_cfg & !CFG_MODE_MASK)?;
    let probe = write_u64(bus, config.addr_offset(index), u64::MAX)?;
    let readback = read_u64(bus, config.addr_offset(index))?;

    write_u64(bus, config.addr_offset(index), saved_addr)?;
    write_cfg_byte(bus, &config, index, saved_cfg)?;

    if probe == RegisterWriteResult::IgnoredLocked {
        return Err(ConfigError::EntryLocked(index));
    }
    if readback == 0 {
        return Err(ConfigError::GranularityUndetectable);
    }
    let granularity_log2 = 2 + readback.trailing_zeros();
    log::debug!("probed granularity 2^{granularity_log2} on entry {index}");
    Ok(granularity_log2)
}

fn program_entry<R: RegisterInterface + ?Sized>(
    bus: &mut R,
    index: usize,
    field: u64,
    entry: EntryConfig,
) -> Result<RegisterWriteResult, ConfigError> {
    let config = bus.iopmp_config().clone();
    check_index(&config, index)?;
    if read_cfg_byte(bus, &config, index)? & CFG_LOCK_BIT != 0 {
        return Err(ConfigError::EntryLocked(index));
    }
    let address = write_u64(bus, config.addr_offset(index), field)?;
    let control = write_cfg_byte(bus, &config, index, entry.to_byte())?;
    log::debug!(
        "programmed entry {index} as {:?} field {field:#x} perms {:#05b}",
        entry.mode,
        entry.permissions.bits()
    );
    Ok(address.merge(control))
}

const fn check_index(config: &IopmpConfig, index: usize) -> Result<(), RegisterError> {
    if index < config.entry_count {
        Ok(())
    } else {
        Err(RegisterError::EntryOutOfRange {
            index,
            count: config.entry_count,
        })
    }
}

const fn cfg_lane(index: usize) -> usize {
    index % 8
}

fn read_u64<R: RegisterInterface + ?Sized>(bus: &mut R, offset: u64) -> Result<u64, RegisterError> {
    let mut bytes = [0_u8; 8];
    bus.read_register(offset, &mut bytes)?;
    Ok(u64::from_le_bytes(bytes))
}

fn write_u64<R: RegisterInterface + ?Sized>(
    bus: &mut R,
    offset: u64,
    value: u64,
) -> Result<RegisterWriteResult, RegisterError> {
    bus.write_register(offset, &value.to_le_bytes())
}

fn read_cfg_byte<R: RegisterInterface + ?Sized>(
    bus: &mut R,
    config: &IopmpConfig,
    index: usize,
) -> Result<u8, RegisterError> {
    let register = read_u64(bus, config.cfg_register_offset(index))?;
    Ok(register.to_le_bytes()[cfg_lane(index)])
}

fn write_cfg_byte<R: RegisterInterface + ?Sized>(
    bus: &mut R,
    config: &IopmpConfig,
    index: usize,
    byte: u8,
) -> Result<RegisterWriteResult, RegisterError> {
    let offset = config.cfg_register_offset(index);
    let mut bytes = read_u64(bus, offset)?.to_le_bytes();
    bytes[cfg_lane(index)] = byte;
    write_u64(bus, offset, u64::from_le_bytes(bytes))
}

//! Region entry fields and the packed control-byte layout.

use core::ops::BitOr;

/// Control byte: lock bit.
pub const CFG_LOCK_BIT: u8 = 1 << 7;
/// Control byte: reserved bits, hardwired to zero.
pub const CFG_RESERVED_MASK: u8 = 0b0110_0000;
/// Control byte: address-mode field shift.
pub const CFG_MODE_SHIFT: u8 = 3;
/// Control byte: address-mode field mask.
pub const CFG_MODE_MASK: u8 = 0b11 << CFG_MODE_SHIFT;
/// Control byte: permission bits mask (`X W R`).
pub const CFG_PERMISSION_MASK: u8 = 0b111;

/// Address-matching mode of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum AddressMode {
    /// Entry disabled; never matches.
    #[default]
    Off = 0,
    /// Top of range: bounded below by the previous entry's address field.
    Tor = 1,
    /// Naturally aligned four-byte region.
    Na4 = 2,
    /// Naturally aligned power-of-two region.
    Napot = 3,
}

impl AddressMode {
    /// Decodes the two-bit mode field.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::Off,
            1 => Self::Tor,
            2 => Self::Na4,
            _ => Self::Napot,
        }
    }

    /// Returns the two-bit encoding.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self as u8
    }
}

/// Set of operations an entry grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Permissions(u8);

impl Permissions {
    /// No access.
    pub const NONE: Self = Self(0);
    /// Read access.
    pub const READ: Self = Self(1 << 0);
    /// Write access.
    pub const WRITE: Self = Self(1 << 1);
    /// Execute access.
    pub const EXECUTE: Self = Self(1 << 2);
    /// Read and write access.
    pub const READ_WRITE: Self = Self(Self::READ.0 | Self::WRITE.0);
    /// Every operation.
    pub const ALL: Self = Self(CFG_PERMISSION_MASK);

    /// Builds a set from the low three control-byte bits.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & CFG_PERMISSION_MASK)
    }

    /// Returns the `X W R` bit encoding.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns `true` when every operation in `other` is granted.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the union of both sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns `true` when no operation is granted.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Decoded control byte of one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct EntryConfig {
    /// Address-matching mode.
    pub mode: AddressMode,
    /// Granted operations.
    pub permissions: Permissions,
    /// Configuration frozen until reset.
    pub locked: bool,
}

impl EntryConfig {
    /// Reset state: disabled, no access, unlocked.
    pub const OFF: Self = Self {
        mode: AddressMode::Off,
        permissions: Permissions::NONE,
        locked: false,
    };

    /// Builds an unlocked entry configuration.
    #[must_use]
    pub const fn new(mode: AddressMode, permissions: Permissions) -> Self {
        Self {
            mode,
            permissions,
            locked: false,
        }
    }

    /// Returns the same configuration with the lock bit set.
    #[must_use]
    pub const fn locked(self) -> Self {
        Self {
            locked: true,
            ..self
        }
    }

    /// Unpacks a control byte; reserved bits are discarded.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        Self {
            mode: AddressMode::from_bits((byte & CFG_MODE_MASK) >> CFG_MODE_SHIFT),
            permissions: Permissions::from_bits(byte),
            locked: byte & CFG_LOCK_BIT != 0,
        }
    }

    /// Packs into the control-byte layout (`L 0 0 A A X W R`).
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        let lock = if self.locked { CFG_LOCK_BIT } else { 0 };
        lock | (self.mode.bits() << CFG_MODE_SHIFT) | self.permissions.bits()
    }
}

/// One slot of the region table as stored by the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegionEntry {
    /// Control byte contents.
    pub config: EntryConfig,
    /// Raw written address field, masked to the implemented width.
    ///
    /// Granularity-dependent bits are applied on read and decode, not here.
    pub address_field: u64,
}

#[cfg(test)]
mod tests {
    use super::{AddressMode, EntryConfig, Permissions, CFG_LOCK_BIT, CFG_RESERVED_MASK};
    use rstest::rstest;

    #[rstest]
    #[case(0b00, AddressMode::Off)]
    #[case(0b01, AddressMode::Tor)]
    #[case(0b10, AddressMode::Na4)]
    #[case(0b11, AddressMode::Napot)]
    fn mode_field_decodes_all_encodings(#[case] bits: u8, #[case] mode: AddressMode) {
        assert_eq!(AddressMode::from_bits(bits), mode);
        assert_eq!(mode.bits(), bits);
    }

    #[test]
    fn napot_read_write_byte_matches_testbench_encoding() {
        // locked=0, reserved=00, mode=11, access=011
        let cfg = EntryConfig::new(AddressMode::Napot, Permissions::READ_WRITE);
        assert_eq!(cfg.to_byte(), 0b0001_1011);
        assert_eq!(EntryConfig::from_byte(0b0001_1011), cfg);
    }

    #[test]
    fn lock_bit_is_most_significant() {
        let cfg = EntryConfig::new(AddressMode::Tor, Permissions::EXECUTE).locked();
        assert_eq!(cfg.to_byte(), CFG_LOCK_BIT | 0b0000_1100);
        assert!(EntryConfig::from_byte(0x80).locked);
    }

    #[test]
    fn reserved_bits_are_dropped_on_unpack() {
        let cfg = EntryConfig::from_byte(CFG_RESERVED_MASK | 0b0001_1001);
        assert_eq!(cfg.to_byte() & CFG_RESERVED_MASK, 0);
        assert_eq!(cfg.mode, AddressMode::Napot);
        assert_eq!(cfg.permissions, Permissions::READ);
    }

    #[test]
    fn permission_set_operations() {
        let rw = Permissions::READ | Permissions::WRITE;
        assert_eq!(rw, Permissions::READ_WRITE);
        assert!(rw.contains(Permissions::READ));
        assert!(rw.contains(Permissions::WRITE));
        assert!(!rw.contains(Permissions::EXECUTE));
        assert!(Permissions::NONE.is_empty());
        assert!(Permissions::ALL.contains(rw | Permissions::EXECUTE));
        assert_eq!(Permissions::from_bits(0xFF), Permissions::ALL);
    }

    #[test]
    fn reset_entry_is_off_and_unlocked() {
        assert_eq!(EntryConfig::default(), EntryConfig::OFF);
        assert_eq!(EntryConfig::OFF.to_byte(), 0);
    }
}

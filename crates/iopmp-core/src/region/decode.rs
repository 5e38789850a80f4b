//! Granularity-aware decoding of address fields into byte ranges.

use crate::{AddressMode, MAX_PMP_LEN};

/// Half-open byte range `[low, high)` claimed by an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct AddressRange {
    /// Inclusive lower bound.
    pub low: u64,
    /// Exclusive upper bound; always greater than `low`.
    pub high: u64,
}

impl AddressRange {
    /// Size of the range in bytes.
    #[must_use]
    pub const fn size(self) -> u64 {
        self.high - self.low
    }

    /// Returns `true` when `[start, end)` lies entirely inside this range.
    #[must_use]
    pub const fn contains(self, start: u64, end: u64) -> bool {
        start >= self.low && end <= self.high
    }

    /// Returns `true` when `[start, end)` shares at least one byte with this range.
    #[must_use]
    pub const fn overlaps(self, start: u64, end: u64) -> bool {
        start < self.high && end > self.low
    }
}

const fn low_mask(bits: u32) -> u64 {
    if bits >= u64::BITS {
        u64::MAX
    } else {
        (1 << bits) - 1
    }
}

/// Mask selecting the implemented bits of a `pmp_len`-wide address field.
#[must_use]
pub const fn address_field_mask(pmp_len: u32) -> u64 {
    low_mask(pmp_len)
}

/// Applies the hardwired low-order bits to a raw address field.
///
/// With `g = granularity_log2 - 2`: OFF and TOR read bits `[g-1:0]` as zero,
/// NAPOT reads bits `[g-2:0]` as one. NA4 is returned unchanged.
#[must_use]
pub const fn effective_address_field(raw: u64, mode: AddressMode, granularity_log2: u32) -> u64 {
    let g = granularity_log2.saturating_sub(2);
    match mode {
        AddressMode::Off | AddressMode::Tor => raw & !low_mask(g),
        AddressMode::Napot => {
            if g >= 2 {
                raw | low_mask(g - 1)
            } else {
                raw
            }
        }
        AddressMode::Na4 => raw,
    }
}

/// Decodes one entry's (already granularity-adjusted) address field.
///
/// `prev_entry_boundary` is the previous entry's address field and is only
/// consulted for [`AddressMode::Tor`]; pass `0` for entry 0. Fields wider than
/// [`MAX_PMP_LEN`] bits are truncated to the register width.
///
/// Returns `None` for OFF entries and for TOR entries whose bounds are empty
/// or inverted.
#[must_use]
pub const fn decode(
    address_field: u64,
    mode: AddressMode,
    prev_entry_boundary: u64,
) -> Option<AddressRange> {
    let field = address_field & low_mask(MAX_PMP_LEN);
    match mode {
        AddressMode::Off => None,
        AddressMode::Na4 => {
            let low = field << 2;
            Some(AddressRange { low, high: low + 4 })
        }
        AddressMode::Napot => {
            let ones = field.trailing_ones();
            let size = 8_u64 << ones;
            let low = (field & !low_mask(ones)) << 2;
            Some(AddressRange {
                low,
                high: low + size,
            })
        }
        AddressMode::Tor => {
            let low = (prev_entry_boundary & low_mask(MAX_PMP_LEN)) << 2;
            let high = field << 2;
            if low < high {
                Some(AddressRange { low, high })
            } else {
                None
            }
        }
    }
}

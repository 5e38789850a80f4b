//! Priority-ordered storage of region entries.

use crate::{
    decode, effective_address_field, AddressMode, AddressRange, IopmpConfig, RegionEntry,
};

/// Fixed-size, priority-ordered table of region entries.
///
/// Index 0 has the highest priority. The table itself never enforces lock
/// or WARL rules; only [`crate::ConfigPort`] mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegionTable {
    entries: Vec<RegionEntry>,
    granularity_log2: u32,
}

impl RegionTable {
    /// Allocates `config.entry_count` entries in the reset state.
    #[must_use]
    pub fn new(config: &IopmpConfig) -> Self {
        Self {
            entries: vec![RegionEntry::default(); config.entry_count],
            granularity_log2: config.granularity_log2,
        }
    }

    /// Number of implemented entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// log2 of the minimum enforceable region size.
    #[must_use]
    pub const fn granularity_log2(&self) -> u32 {
        self.granularity_log2
    }

    /// Returns entry `index`, if implemented.
    #[must_use]
    pub fn entry(&self, index: usize) -> Option<&RegionEntry> {
        self.entries.get(index)
    }

    /// All entries in priority order.
    #[must_use]
    pub fn entries(&self) -> &[RegionEntry] {
        &self.entries
    }

    #[allow(clippy::missing_const_for_fn)]
    pub(crate) fn entry_mut(&mut self, index: usize) -> Option<&mut RegionEntry> {
        self.entries.get_mut(index)
    }

    /// Address field as the hardware exposes it for the entry's current mode.
    #[must_use]
    pub fn effective_address_field(&self, index: usize) -> Option<u64> {
        let entry = self.entries.get(index)?;
        Some(effective_address_field(
            entry.address_field,
            entry.config.mode,
            self.granularity_log2,
        ))
    }

    /// Materializes the byte range entry `index` currently claims.
    ///
    /// The TOR lower bound is the previous entry's field, granule-aligned,
    /// whatever mode that entry is in.
    #[must_use]
    pub fn decode(&self, index: usize) -> Option<AddressRange> {
        let entry = self.entries.get(index)?;
        let field = self.effective_address_field(index)?;
        let prev = match index.checked_sub(1).and_then(|i| self.entries.get(i)) {
            Some(prev) => {
                effective_address_field(prev.address_field, AddressMode::Tor, self.granularity_log2)
            }
            None => 0,
        };
        decode(field, entry.config.mode, prev)
    }

    /// Returns every entry to OFF, unlocked, address zero.
    pub fn reset(&mut self) {
        self.entries.fill(RegionEntry::default());
    }
}

#[cfg(test)]
mod tests {
    use super::RegionTable;
    use crate::{AddressMode, AddressRange, EntryConfig, IopmpConfig, Permissions, RegionEntry};

    fn table_with(entries: &[(usize, EntryConfig, u64)]) -> RegionTable {
        let mut table = RegionTable::new(&IopmpConfig::default());
        for &(index, config, address_field) in entries {
            *table.entry_mut(index).expect("entry exists") = RegionEntry {
                config,
                address_field,
            };
        }
        table
    }

    #[test]
    fn new_table_is_all_off() {
        let table = RegionTable::new(&IopmpConfig::default());
        assert_eq!(table.len(), 16);
        assert!(!table.is_empty());
        assert!(table
            .entries()
            .iter()
            .all(|entry| entry.config == EntryConfig::OFF && entry.address_field == 0));
        assert!((0..table.len()).all(|index| table.decode(index).is_none()));
        assert_eq!(table.decode(16), None);
    }

    #[test]
    fn napot_entry_is_rounded_up_to_granule() {
        let table = table_with(&[(
            0,
            EntryConfig::new(AddressMode::Napot, Permissions::READ),
            0x7,
        )]);
        assert_eq!(table.effective_address_field(0), Some(0x1FF));
        assert_eq!(
            table.decode(0),
            Some(AddressRange {
                low: 0,
                high: 4096
            })
        );
    }

    #[test]
    fn tor_bound_comes_from_previous_entry_even_when_off() {
        let table = table_with(&[
            (0, EntryConfig::OFF, 0x1000),
            (1, EntryConfig::new(AddressMode::Tor, Permissions::READ), 0x2000),
        ]);
        assert_eq!(table.decode(0), None);
        assert_eq!(
            table.decode(1),
            Some(AddressRange {
                low: 0x4000,
                high: 0x8000
            })
        );
    }

    #[test]
    fn tor_bounds_are_granule_aligned() {
        let table = table_with(&[
            (0, EntryConfig::OFF, 0x4FF),
            (1, EntryConfig::new(AddressMode::Tor, Permissions::READ), 0xBFF),
        ]);
        assert_eq!(
            table.decode(1),
            Some(AddressRange {
                low: 0x1000,
                high: 0x2000
            })
        );
    }

    #[test]
    fn reset_clears_every_entry() {
        let mut table = table_with(&[(
            3,
            EntryConfig::new(AddressMode::Napot, Permissions::ALL).locked(),
            0x1FF,
        )]);
        table.reset();
        assert_eq!(table, RegionTable::new(&IopmpConfig::default()));
    }
}

//! Fixed-priority, first-match-wins arbitration over the region table.

use crate::{DenyReason, Permissions, RegionTable};

/// Operation carried by a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum AccessKind {
    /// Data read.
    Read,
    /// Data write.
    Write,
    /// Instruction fetch.
    Execute,
}

impl AccessKind {
    /// Permission bit an entry must grant for this operation.
    #[must_use]
    pub const fn permission(self) -> Permissions {
        match self {
            Self::Read => Permissions::READ,
            Self::Write => Permissions::WRITE,
            Self::Execute => Permissions::EXECUTE,
        }
    }
}

/// One already-split, single-region bus transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessRequest {
    /// First byte address.
    pub address: u64,
    /// Number of bytes.
    pub length: u64,
    /// Operation kind.
    pub kind: AccessKind,
}

impl AccessRequest {
    /// Builds a request.
    #[must_use]
    pub const fn new(address: u64, length: u64, kind: AccessKind) -> Self {
        Self {
            address,
            length,
            kind,
        }
    }

    /// Exclusive end address, or `None` for empty or overflowing requests.
    #[must_use]
    pub const fn end(&self) -> Option<u64> {
        if self.length == 0 {
            return None;
        }
        self.address.checked_add(self.length)
    }
}

/// Outcome of arbitration for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Decision {
    /// Forward the transaction.
    Allow {
        /// Index of the governing entry.
        entry: usize,
    },
    /// Reject the transaction.
    Deny {
        /// Index of the governing entry, `None` when nothing matched.
        entry: Option<usize>,
        /// Why the request was refused.
        reason: DenyReason,
    },
}

impl Decision {
    /// Returns `true` for [`Decision::Allow`].
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allow { .. })
    }

    /// Index of the governing entry, if any.
    #[must_use]
    pub const fn entry(self) -> Option<usize> {
        match self {
            Self::Allow { entry } => Some(entry),
            Self::Deny { entry, .. } => entry,
        }
    }

    /// Deny reason, `None` for allowed requests.
    #[must_use]
    pub const fn reason(self) -> Option<DenyReason> {
        match self {
            Self::Allow { .. } => None,
            Self::Deny { reason, .. } => Some(reason),
        }
    }
}

/// Selects the entry governing `request` and derives the verdict.
///
/// Entries are scanned from index 0. The first active entry whose range
/// shares any byte with the request governs it: full containment plus the
/// permission bit allows, containment without the bit denies, and a partial
/// overlap denies. Nothing matching denies (fail-closed).
#[must_use]
pub fn evaluate(table: &RegionTable, request: &AccessRequest) -> Decision {
    let Some(end) = request.end() else {
        return Decision::Deny {
            entry: None,
            reason: DenyReason::MalformedRequest,
        };
    };

    for (index, entry) in table.entries().iter().enumerate() {
        let Some(range) = table.decode(index) else {
            continue;
        };
        if !range.overlaps(request.address, end) {
            continue;
        }
        if !range.contains(request.address, end) {
            return Decision::Deny {
                entry: Some(index),
                reason: DenyReason::PartialOverlap,
            };
        }
        if entry.config.permissions.contains(request.kind.permission()) {
            return Decision::Allow { entry: index };
        }
        return Decision::Deny {
            entry: Some(index),
            reason: DenyReason::PermissionDenied,
        };
    }

    Decision::Deny {
        entry: None,
        reason: DenyReason::NoMatchingRegion,
    }
}

#[cfg(test)]
mod tests {
    use super::{evaluate, AccessKind, AccessRequest, Decision};
    use crate::{AddressMode, ConfigPort, DenyReason, EntryConfig, IopmpConfig, Permissions};
    use rstest::rstest;

    const fn napot(base: u64, size: u64) -> u64 {
        (base + size / 2 - 1) >> 2
    }

    fn port() -> ConfigPort {
        ConfigPort::new(IopmpConfig::default()).expect("default config is valid")
    }

    fn program(port: &mut ConfigPort, index: usize, config: EntryConfig, address_field: u64) {
        port.write_entry(index, config, address_field)
            .expect("entry in range");
    }

    #[test]
    fn empty_table_denies_everything() {
        let port = port();
        for kind in [AccessKind::Read, AccessKind::Write, AccessKind::Execute] {
            assert_eq!(
                evaluate(port.table(), &AccessRequest::new(0, 4, kind)),
                Decision::Deny {
                    entry: None,
                    reason: DenyReason::NoMatchingRegion
                }
            );
        }
    }

    #[rstest]
    #[case(4092, 4, true)]
    #[case(0, 4096, true)]
    #[case(4096, 4, false)]
    #[case(4088, 16, false)]
    fn napot_boundaries(#[case] address: u64, #[case] length: u64, #[case] allowed: bool) {
        let mut port = port();
        program(
            &mut port,
            0,
            EntryConfig::new(AddressMode::Napot, Permissions::READ_WRITE),
            napot(0, 4096),
        );
        let decision = evaluate(
            port.table(),
            &AccessRequest::new(address, length, AccessKind::Write),
        );
        assert_eq!(decision.is_allowed(), allowed);
    }

    #[test]
    fn straddling_request_reports_partial_overlap() {
        let mut port = port();
        program(
            &mut port,
            0,
            EntryConfig::new(AddressMode::Napot, Permissions::READ_WRITE),
            napot(0, 4096),
        );
        assert_eq!(
            evaluate(
                port.table(),
                &AccessRequest::new(4088, 16, AccessKind::Read)
            ),
            Decision::Deny {
                entry: Some(0),
                reason: DenyReason::PartialOverlap
            }
        );
    }

    #[test]
    fn crossing_between_two_allowing_regions_is_denied() {
        let mut port = port();
        let rw = EntryConfig::new(AddressMode::Napot, Permissions::READ_WRITE);
        program(&mut port, 0, rw, napot(0, 4096));
        program(&mut port, 1, rw, napot(4096, 4096));

        let inside_low = AccessRequest::new(4080, 16, AccessKind::Read);
        let inside_high = AccessRequest::new(4096, 16, AccessKind::Read);
        let crossing = AccessRequest::new(4088, 16, AccessKind::Read);

        assert_eq!(
            evaluate(port.table(), &inside_low),
            Decision::Allow { entry: 0 }
        );
        assert_eq!(
            evaluate(port.table(), &inside_high),
            Decision::Allow { entry: 1 }
        );
        assert_eq!(
            evaluate(port.table(), &crossing).reason(),
            Some(DenyReason::PartialOverlap)
        );
    }

    #[rstest]
    #[case(Permissions::READ_WRITE, Permissions::NONE, true)]
    #[case(Permissions::NONE, Permissions::READ_WRITE, false)]
    fn lower_index_shadows_higher_index(
        #[case] high_priority: Permissions,
        #[case] low_priority: Permissions,
        #[case] allowed: bool,
    ) {
        let mut port = port();
        program(
            &mut port,
            2,
            EntryConfig::new(AddressMode::Napot, high_priority),
            napot(0, 4096),
        );
        program(
            &mut port,
            9,
            EntryConfig::new(AddressMode::Napot, low_priority),
            napot(0, 4096),
        );
        let decision = evaluate(port.table(), &AccessRequest::new(64, 64, AccessKind::Read));
        assert_eq!(decision.is_allowed(), allowed);
        assert_eq!(decision.entry(), Some(2));
    }

    #[test]
    fn permission_bits_are_checked_per_operation() {
        let mut port = port();
        program(
            &mut port,
            0,
            EntryConfig::new(AddressMode::Napot, Permissions::READ),
            napot(0, 4096),
        );
        let table = port.table();
        assert!(evaluate(table, &AccessRequest::new(0, 8, AccessKind::Read)).is_allowed());
        assert_eq!(
            evaluate(table, &AccessRequest::new(0, 8, AccessKind::Write)),
            Decision::Deny {
                entry: Some(0),
                reason: DenyReason::PermissionDenied
            }
        );
        assert!(!evaluate(table, &AccessRequest::new(0, 8, AccessKind::Execute)).is_allowed());
    }

    #[test]
    fn off_entry_is_skipped_even_with_permissions() {
        let mut port = port();
        program(
            &mut port,
            0,
            EntryConfig::new(AddressMode::Off, Permissions::ALL),
            napot(0, 4096),
        );
        program(
            &mut port,
            1,
            EntryConfig::new(AddressMode::Napot, Permissions::NONE),
            napot(0, 4096),
        );
        assert_eq!(
            evaluate(port.table(), &AccessRequest::new(0, 4, AccessKind::Read)),
            Decision::Deny {
                entry: Some(1),
                reason: DenyReason::PermissionDenied
            }
        );
    }

    #[test]
    fn tor_region_between_entries() {
        let mut port = port();
        // Entry 0 only supplies the lower bound 0x4000.
        program(&mut port, 0, EntryConfig::OFF, 0x4000 >> 2);
        program(
            &mut port,
            1,
            EntryConfig::new(AddressMode::Tor, Permissions::READ),
            0x8000 >> 2,
        );
        let table = port.table();
        assert!(evaluate(table, &AccessRequest::new(0x5000, 4, AccessKind::Read)).is_allowed());
        assert!(evaluate(table, &AccessRequest::new(0x7FFC, 4, AccessKind::Read)).is_allowed());
        assert_eq!(
            evaluate(table, &AccessRequest::new(0x3000, 4, AccessKind::Read)).reason(),
            Some(DenyReason::NoMatchingRegion)
        );
        assert_eq!(
            evaluate(table, &AccessRequest::new(0x8000, 4, AccessKind::Read)).reason(),
            Some(DenyReason::NoMatchingRegion)
        );
    }

    #[rstest]
    #[case(0, 0)]
    #[case(u64::MAX, 2)]
    #[case(u64::MAX - 3, 8)]
    fn malformed_requests_are_denied(#[case] address: u64, #[case] length: u64) {
        let mut port = port();
        program(
            &mut port,
            0,
            EntryConfig::new(AddressMode::Napot, Permissions::ALL),
            u64::MAX,
        );
        assert_eq!(
            evaluate(
                port.table(),
                &AccessRequest::new(address, length, AccessKind::Read)
            ),
            Decision::Deny {
                entry: None,
                reason: DenyReason::MalformedRequest
            }
        );
    }

    #[test]
    fn decision_accessors() {
        let allow = Decision::Allow { entry: 3 };
        assert!(allow.is_allowed());
        assert_eq!(allow.entry(), Some(3));
        assert_eq!(allow.reason(), None);

        let deny = Decision::Deny {
            entry: None,
            reason: DenyReason::NoMatchingRegion,
        };
        assert!(!deny.is_allowed());
        assert_eq!(deny.entry(), None);
        assert_eq!(deny.reason(), Some(DenyReason::NoMatchingRegion));
    }
}

//! Region table storage and the per-entry address decoder.

/// Granularity-aware range decoding.
pub mod decode;
/// Entry fields and control-byte packing.
pub mod entry;
/// Priority-ordered entry storage.
pub mod table;

pub use decode::{address_field_mask, decode, effective_address_field, AddressRange};
pub use entry::{
    AddressMode, EntryConfig, Permissions, RegionEntry, CFG_LOCK_BIT, CFG_MODE_MASK,
    CFG_MODE_SHIFT, CFG_PERMISSION_MASK, CFG_RESERVED_MASK,
};
pub use table::RegionTable;

//! Simulated downstream RAM.

use crate::{MemoryPort, PortError};

/// Default RAM size (64 KiB).
pub const DEFAULT_SIM_RAM_BYTES: usize = 1 << 16;

/// Power-of-two byte store whose addresses wrap modulo its size.
///
/// Stands in for the memory behind the gates. [`SimRam::load`] and
/// [`SimRam::peek`] bypass the gates entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimRam {
    bytes: Box<[u8]>,
    mask: u64,
}

impl Default for SimRam {
    fn default() -> Self {
        Self::zeroed(DEFAULT_SIM_RAM_BYTES)
    }
}

impl SimRam {
    /// Allocates `size` zeroed bytes; `None` unless `size` is a non-zero
    /// power of two.
    #[must_use]
    pub fn new(size: usize) -> Option<Self> {
        size.is_power_of_two().then(|| Self::zeroed(size))
    }

    fn zeroed(size: usize) -> Self {
        Self {
            bytes: vec![0; size].into_boxed_slice(),
            mask: size as u64 - 1,
        }
    }

    /// Size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always `false`; a RAM holds at least one byte.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn index(&self, address: u64) -> usize {
        usize::try_from(address & self.mask).unwrap_or(0)
    }

    /// Backdoor write that bypasses the gates.
    pub fn load(&mut self, address: u64, data: &[u8]) {
        for (offset, &byte) in (0_u64..).zip(data) {
            let index = self.index(address.wrapping_add(offset));
            self.bytes[index] = byte;
        }
    }

    /// Backdoor read that bypasses the gates.
    #[must_use]
    pub fn peek(&self, address: u64, length: usize) -> Vec<u8> {
        (0_u64..)
            .take(length)
            .map(|offset| self.bytes[self.index(address.wrapping_add(offset))])
            .collect()
    }
}

impl MemoryPort for SimRam {
    fn read(&mut self, address: u64, buf: &mut [u8]) -> Result<(), PortError> {
        for (offset, out) in (0_u64..).zip(buf.iter_mut()) {
            *out = self.bytes[self.index(address.wrapping_add(offset))];
        }
        Ok(())
    }

    fn write(&mut self, address: u64, data: &[u8]) -> Result<(), PortError> {
        self.load(address, data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{SimRam, DEFAULT_SIM_RAM_BYTES};
    use crate::MemoryPort;

    #[test]
    fn default_ram_is_64kib_of_zeroes() {
        let ram = SimRam::default();
        assert_eq!(ram.len(), DEFAULT_SIM_RAM_BYTES);
        assert!(!ram.is_empty());
        assert_eq!(ram.peek(0, 16), [0; 16]);
    }

    #[test]
    fn only_powers_of_two_are_accepted() {
        assert!(SimRam::new(0).is_none());
        assert!(SimRam::new(3000).is_none());
        assert_eq!(SimRam::new(4096).map(|ram| ram.len()), Some(4096));
    }

    #[test]
    fn addresses_wrap_modulo_size() {
        let mut ram = SimRam::new(4096).expect("power of two");
        ram.write(0x1_0000_0FFE, &[1, 2, 3, 4]).expect("ram never fails");
        assert_eq!(ram.peek(0xFFE, 2), [1, 2]);
        assert_eq!(ram.peek(0, 2), [3, 4]);

        let mut buf = [0_u8; 4];
        ram.read(0x2FFE, &mut buf).expect("ram never fails");
        assert_eq!(buf, [1, 2, 3, 4]);
    }
}

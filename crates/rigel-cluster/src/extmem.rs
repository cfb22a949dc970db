//! External memory device
//!
//! Host-side arena standing in for the off-cluster backing store. Cores
//! never touch it directly: during a run all traffic goes through the
//! transfer engine. The host uses [`ExternalMemory::write`] to stage input
//! before a run and [`ExternalMemory::read`] / [`ExternalMemory::snapshot`]
//! to collect results after; it is the only tier whose contents survive
//! cluster teardown.

use crate::error::{ClusterError, Result};
use crate::mem::MemoryBank;
use bytes::Bytes;
use rigel_soc::mem::Tier;

/// The external backing device.
#[derive(Debug)]
pub struct ExternalMemory {
    bank: MemoryBank,
}

impl ExternalMemory {
    /// A zero-filled device of `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            bank: MemoryBank::new(Tier::External, capacity),
        }
    }

    /// Device capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bank.size()
    }

    /// Host-side write into the device.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::ExternalOutOfRange`] if the range does not
    /// fit the device.
    pub fn write(&self, offset: usize, bytes: &[u8]) -> Result<()> {
        self.check_range(offset, bytes.len())?;
        self.bank.copy_in(offset, bytes);
        Ok(())
    }

    /// Host-side read out of the device.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::ExternalOutOfRange`] if the range does not
    /// fit the device.
    pub fn read(&self, offset: usize, out: &mut [u8]) -> Result<()> {
        self.check_range(offset, out.len())?;
        self.bank.copy_out(offset, out);
        Ok(())
    }

    /// Immutable snapshot of a device range.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::ExternalOutOfRange`] if the range does not
    /// fit the device.
    pub fn snapshot(&self, offset: usize, len: usize) -> Result<Bytes> {
        self.check_range(offset, len)?;
        let mut buf = vec![0u8; len];
        self.bank.copy_out(offset, &mut buf);
        Ok(Bytes::from(buf))
    }

    /// Engine-side access to the backing bank.
    pub(crate) fn bank(&self) -> &MemoryBank {
        &self.bank
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<()> {
        let capacity = self.capacity();
        if offset.checked_add(len).is_none_or(|end| end > capacity) {
            return Err(ClusterError::ExternalOutOfRange {
                offset,
                len,
                capacity,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_roundtrips() {
        let ext = ExternalMemory::new(1024);
        let payload: Vec<u8> = (0u8..200).collect();
        ext.write(100, &payload).unwrap();
        let mut out = vec![0u8; 200];
        ext.read(100, &mut out).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn snapshot_matches_contents() {
        let ext = ExternalMemory::new(64);
        ext.write(0, &[9u8; 64]).unwrap();
        let snap = ext.snapshot(8, 16).unwrap();
        assert_eq!(&snap[..], &[9u8; 16]);
    }

    #[test]
    fn out_of_range_access_is_an_error() {
        let ext = ExternalMemory::new(32);
        let err = ext.write(30, &[0u8; 4]).unwrap_err();
        assert!(matches!(err, ClusterError::ExternalOutOfRange { .. }));
        let mut out = [0u8; 8];
        assert!(ext.read(28, &mut out).is_err());
        assert!(ext.snapshot(0, 33).is_err());
    }

    #[test]
    fn zero_capacity_device_accepts_empty_accesses() {
        let ext = ExternalMemory::new(0);
        ext.write(0, &[]).unwrap();
        let snap = ext.snapshot(0, 0).unwrap();
        assert!(snap.is_empty());
    }
}

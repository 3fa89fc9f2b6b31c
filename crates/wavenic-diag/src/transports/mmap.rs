//! Memory-mapped PCIe BAR region.
//!
//! Maps a BAR through sysfs `resourceN` and exposes bounds-checked volatile
//! word access. Unsafe is confined to the mapping and the volatile
//! accessors.

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsFd;
use std::ptr::NonNull;

use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};

use crate::error::{DiagError, Result};

/// A mapped PCIe BAR.
#[derive(Debug)]
pub struct BarRegion {
    ptr: NonNull<u8>,
    size: usize,
    _file: File,
    pcie_address: String,
    bar_index: usize,
}

impl BarRegion {
    /// Map `resource{bar_index}` of the given PCIe device.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the resource file cannot be opened,
    /// reports zero size (device not enabled), or the mapping fails.
    pub fn map(pcie_address: &str, bar_index: usize) -> Result<Self> {
        let path = format!("/sys/bus/pci/devices/{pcie_address}/resource{bar_index}");

        tracing::debug!("Mapping PCIe BAR: {path}");

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| {
                DiagError::transport(format!("cannot open {path}: {e}. Is the device enabled?"))
            })?;

        #[allow(clippy::cast_possible_truncation)]
        let size = file
            .metadata()
            .map_err(|e| DiagError::transport(format!("cannot stat BAR: {e}")))?
            .len() as usize;

        if size == 0 {
            return Err(DiagError::transport(
                "BAR size is 0 (device not enabled?)",
            ));
        }

        // SAFETY: mmap preconditions hold:
        // - the fd was just opened read/write and stays open for the life of
        //   the mapping (stored in the struct)
        // - size is non-zero (checked above)
        // - PROT_READ|PROT_WRITE with MAP_SHARED is what MMIO needs
        // - rustix returns Result, failures are propagated
        // - the region is unmapped exactly once, in Drop
        let ptr = unsafe {
            let addr = mmap(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                file.as_fd(),
                0,
            )
            .map_err(|e| DiagError::transport(format!("mmap failed: {e}")))?;

            NonNull::new(addr.cast::<u8>())
                .ok_or_else(|| DiagError::transport("mmap returned null"))?
        };

        tracing::info!(
            "Mapped BAR{bar_index} for {pcie_address} ({size:#x} bytes at {ptr:p})"
        );

        Ok(Self {
            ptr,
            size,
            _file: file,
            pcie_address: pcie_address.to_string(),
            bar_index,
        })
    }

    /// Read a 32-bit register at `offset`.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the offset is out of bounds.
    pub fn read_u32(&self, offset: usize) -> Result<u32> {
        if offset + 4 > self.size {
            return Err(DiagError::transport(format!(
                "out-of-bounds read: offset={offset:#x}, limit={:#x}",
                self.size
            )));
        }

        // SAFETY: volatile read of a memory-mapped hardware register.
        // - bounds validated above: offset + 4 <= self.size
        // - ptr is valid for self.size bytes (successful mmap)
        // - registers are 4-byte aligned on the BAR
        // - read_volatile is required: the hardware may change the value
        #[allow(clippy::cast_ptr_alignment)]
        let value = unsafe { self.ptr.as_ptr().add(offset).cast::<u32>().read_volatile() };

        tracing::trace!("read u32 @ {offset:#x} = {value:#x}");
        Ok(value)
    }

    /// Write a 32-bit register at `offset`.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the offset is out of bounds.
    pub fn write_u32(&self, offset: usize, value: u32) -> Result<()> {
        if offset + 4 > self.size {
            return Err(DiagError::transport(format!(
                "out-of-bounds write: offset={offset:#x}, limit={:#x}",
                self.size
            )));
        }

        tracing::trace!("write u32 @ {offset:#x} = {value:#x}");

        // SAFETY: volatile write to a memory-mapped hardware register.
        // - bounds validated above: offset + 4 <= self.size
        // - ptr is valid for self.size bytes (successful mmap)
        // - registers are 4-byte aligned on the BAR
        // - write_volatile is required: MMIO writes have side effects
        #[allow(clippy::cast_ptr_alignment)]
        unsafe {
            self.ptr.as_ptr().add(offset).cast::<u32>().write_volatile(value);
        }

        Ok(())
    }

    /// Mapped size in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// PCIe address this region belongs to.
    #[must_use]
    pub fn pcie_address(&self) -> &str {
        &self.pcie_address
    }
}

impl Drop for BarRegion {
    fn drop(&mut self) {
        tracing::debug!(
            "Unmapping BAR{} for {} ({:#x} bytes)",
            self.bar_index,
            self.pcie_address,
            self.size
        );

        // SAFETY: ptr/size are exactly what mmap returned in map(); Drop
        // runs at most once and no other references to the mapping exist.
        unsafe {
            if let Err(e) = munmap(self.ptr.as_ptr().cast(), self.size) {
                tracing::error!("munmap failed during drop: {e}");
            }
        }
    }
}

// SAFETY: BarRegion owns its mapping exclusively and the mapping stays
// valid wherever the value moves (the fd is kept open in the struct).
unsafe impl Send for BarRegion {}

// SAFETY: all accessors are bounds-checked volatile operations; concurrent
// MMIO reads are safe and writes are serialized by the callers' arbitration
// discipline, not by aliasing rules.
unsafe impl Sync for BarRegion {}

// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Low-level register access for TW686x capture controllers.
//!
//! This crate is the hardware contract of the `tw686x` capture core: the
//! fixed register map in [`regs`] and the [`RegisterIo`] trait through which
//! every register read and write flows. [`Mmio`] implements the trait over a
//! mapped BAR; test and simulation backends implement it over plain memory.

use std::ptr::NonNull;
use std::sync::Arc;

pub mod regs;

/// 32-bit register access at DWORD-indexed offsets.
///
/// Implementations must be callable from interrupt and timer context, so
/// neither method may block beyond a short critical section.
pub trait RegisterIo: Send + Sync {
    /// Read the register at DWORD index `reg`.
    fn read(&self, reg: u32) -> u32;

    /// Write `value` to the register at DWORD index `reg`.
    fn write(&self, reg: u32, value: u32);
}

impl<T: RegisterIo + ?Sized> RegisterIo for &T {
    fn read(&self, reg: u32) -> u32 {
        (**self).read(reg)
    }

    fn write(&self, reg: u32, value: u32) {
        (**self).write(reg, value)
    }
}

impl<T: RegisterIo + ?Sized> RegisterIo for Arc<T> {
    fn read(&self, reg: u32) -> u32 {
        (**self).read(reg)
    }

    fn write(&self, reg: u32, value: u32) {
        (**self).write(reg, value)
    }
}

impl<T: RegisterIo + ?Sized> RegisterIo for Box<T> {
    fn read(&self, reg: u32) -> u32 {
        (**self).read(reg)
    }

    fn write(&self, reg: u32, value: u32) {
        (**self).write(reg, value)
    }
}

/// Volatile access to a memory-mapped register window.
///
/// Reads outside the window return all ones, as an absent PCI device would;
/// writes outside the window are dropped.
#[derive(Debug)]
pub struct Mmio {
    base: NonNull<u32>,
    len: usize,
}

// SAFETY: the window is device memory accessed only through volatile
// single-DWORD operations, which the device serializes.
unsafe impl Send for Mmio {}
unsafe impl Sync for Mmio {}

impl Mmio {
    /// Wrap a mapped register window of `len` bytes.
    ///
    /// Returns `None` if `base` is null or not 4-byte aligned.
    ///
    /// # Safety
    ///
    /// `base` must point to a live mapping of at least `len` bytes of device
    /// registers that outlives the returned value.
    pub unsafe fn new(base: *mut u8, len: usize) -> Option<Self> {
        if base as usize % 4 != 0 {
            return None;
        }
        let base = NonNull::new(base.cast::<u32>())?;
        Some(Mmio { base, len })
    }

    /// Size of the window in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn in_range(&self, reg: u32) -> bool {
        (reg as usize + 1) * 4 <= self.len
    }
}

impl RegisterIo for Mmio {
    fn read(&self, reg: u32) -> u32 {
        if !self.in_range(reg) {
            return u32::MAX;
        }
        // SAFETY: bounds checked above; the mapping is valid per `new`.
        unsafe { self.base.as_ptr().add(reg as usize).read_volatile() }
    }

    fn write(&self, reg: u32, value: u32) {
        if !self.in_range(reg) {
            return;
        }
        // SAFETY: bounds checked above; the mapping is valid per `new`.
        unsafe { self.base.as_ptr().add(reg as usize).write_volatile(value) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mmio_over_plain_memory() {
        let mut window = vec![0u32; 16];
        let mmio = unsafe { Mmio::new(window.as_mut_ptr().cast::<u8>(), 64) }.unwrap();

        mmio.write(regs::DMA_CMD, 0x8000_0001);
        assert_eq!(mmio.read(regs::DMA_CMD), 0x8000_0001);
        assert_eq!(mmio.read(regs::DMA_INT_STATUS), 0);

        // Out of range
        mmio.write(16, 0x1234);
        assert_eq!(mmio.read(16), u32::MAX);
        assert_eq!(mmio.len(), 64);
        drop(mmio);
        assert_eq!(window[2], 0x8000_0001);
    }

    #[test]
    fn test_mmio_rejects_misaligned_base() {
        let mut window = vec![0u32; 4];
        let base = unsafe { window.as_mut_ptr().cast::<u8>().add(1) };
        assert!(unsafe { Mmio::new(base, 8) }.is_none());
        assert!(unsafe { Mmio::new(std::ptr::null_mut(), 8) }.is_none());
    }
}

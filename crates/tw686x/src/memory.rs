// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::{lock, Error};
use std::{
    fmt,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Mutex,
    },
};
use tw686x_sys::regs::PAGE_SIZE;

/// Bus addresses handed out by [`HeapAllocator`] start here.
const HEAP_BUS_BASE: u32 = 0x1000_0000;

/// A DMA-coherent memory region and its bus address.
///
/// Clones share the same storage: the core keeps one handle and the device
/// (or a model of it) writes through another.
#[derive(Clone)]
pub struct DmaBuffer {
    addr: u32,
    data: Arc<Mutex<Box<[u8]>>>,
}

impl DmaBuffer {
    /// Zero-filled region of `size` bytes at bus address `addr`.
    pub fn new(addr: u32, size: usize) -> Self {
        DmaBuffer {
            addr,
            data: Arc::new(Mutex::new(vec![0u8; size].into_boxed_slice())),
        }
    }

    /// Bus address programmed into the DMA registers.
    pub fn addr(&self) -> u32 {
        self.addr
    }

    pub fn len(&self) -> usize {
        lock(&self.data).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` over the region contents.
    pub fn with_data<T>(&self, f: impl FnOnce(&[u8]) -> T) -> T {
        f(&lock(&self.data))
    }

    pub fn with_data_mut<T>(&self, f: impl FnOnce(&mut [u8]) -> T) -> T {
        f(&mut lock(&self.data))
    }

    /// Copy from `offset` into `dst`, returning the bytes copied.
    pub fn read_at(&self, offset: usize, dst: &mut [u8]) -> usize {
        self.with_data(|data| {
            let src = data.get(offset..).unwrap_or(&[]);
            let n = src.len().min(dst.len());
            dst[..n].copy_from_slice(&src[..n]);
            n
        })
    }

    /// Copy `src` to `offset`, returning the bytes copied.
    pub fn write_at(&self, offset: usize, src: &[u8]) -> usize {
        self.with_data_mut(|data| {
            let dst = data.get_mut(offset..).unwrap_or(&mut []);
            let n = src.len().min(dst.len());
            dst[..n].copy_from_slice(&src[..n]);
            n
        })
    }

    /// Whether both handles refer to the same storage.
    pub fn same_region(&self, other: &DmaBuffer) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for DmaBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DmaBuffer")
            .field("addr", &format_args!("{:#010x}", self.addr))
            .field("len", &self.len())
            .finish()
    }
}

/// Source of DMA-coherent memory.
pub trait DmaAllocator: Send + Sync {
    /// Allocate `size` bytes addressable by the device.
    fn allocate(&self, size: usize) -> Result<DmaBuffer, Error>;
}

impl<T: DmaAllocator + ?Sized> DmaAllocator for Arc<T> {
    fn allocate(&self, size: usize) -> Result<DmaBuffer, Error> {
        (**self).allocate(size)
    }
}

/// Heap-backed allocator with page-aligned bus addresses from a private
/// 32-bit window.
#[derive(Debug)]
pub struct HeapAllocator {
    next: AtomicU32,
}

impl HeapAllocator {
    pub fn new() -> Self {
        HeapAllocator::with_base(HEAP_BUS_BASE)
    }

    /// Allocator handing out addresses from `base` upwards.
    pub fn with_base(base: u32) -> Self {
        HeapAllocator {
            next: AtomicU32::new(base),
        }
    }

    fn reserve(&self, size: usize) -> Option<u32> {
        let pages = (size.max(1) + PAGE_SIZE - 1) / PAGE_SIZE;
        let span = u32::try_from(pages.checked_mul(PAGE_SIZE)?).ok()?;
        let mut current = self.next.load(Ordering::Relaxed);
        loop {
            let end = current.checked_add(span)?;
            match self.next.compare_exchange_weak(
                current,
                end,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some(current),
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for HeapAllocator {
    fn default() -> Self {
        HeapAllocator::new()
    }
}

impl DmaAllocator for HeapAllocator {
    fn allocate(&self, size: usize) -> Result<DmaBuffer, Error> {
        let addr = self.reserve(size).ok_or(Error::DmaAlloc(size))?;
        log::trace!("allocated {} bytes of DMA memory at {:#010x}", size, addr);
        Ok(DmaBuffer::new(addr, size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_storage() {
        let buf = DmaBuffer::new(0x1000, 8);
        let alias = buf.clone();

        assert_eq!(alias.write_at(6, &[1, 2, 3, 4]), 2);
        let mut out = [0u8; 8];
        assert_eq!(buf.read_at(0, &mut out), 8);
        assert_eq!(out, [0, 0, 0, 0, 0, 0, 1, 2]);
        assert!(buf.same_region(&alias));
        assert_eq!(buf.read_at(100, &mut out), 0);
    }

    #[test]
    fn test_heap_allocator_pages() {
        let alloc = HeapAllocator::with_base(0x2000);
        let a = alloc.allocate(100).unwrap();
        let b = alloc.allocate(PAGE_SIZE + 1).unwrap();
        let c = alloc.allocate(0).unwrap();

        assert_eq!(a.addr(), 0x2000);
        assert_eq!(b.addr(), 0x3000);
        assert_eq!(c.addr(), 0x5000);
        assert_eq!(b.len(), PAGE_SIZE + 1);
        assert!(c.is_empty());
    }

    #[test]
    fn test_heap_allocator_exhaustion() {
        let alloc = HeapAllocator::with_base(u32::MAX - PAGE_SIZE as u32);
        assert!(matches!(alloc.allocate(2 * PAGE_SIZE), Err(Error::DmaAlloc(_))));
    }
}

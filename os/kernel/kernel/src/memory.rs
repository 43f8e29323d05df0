//! # Kernel page pool
//!
//! The one page allocator the kernel owns. It is empty until [`page_init`]
//! hands it the memory behind the kernel image.

use crate::config::KernelPageSize;
use kernel_alloc::{LockedPageAllocator, PageAllocator, PageInitError};
use kernel_memory_addresses::PhysicalAddress;
use log::info;

/// Kernel-wide physical page pool.
pub static PAGES: LockedPageAllocator<'static, KernelPageSize> = LockedPageAllocator::new();

/// Hand `[start, start + size)` to [`PAGES`], keeping the descriptor table in
/// the first pages of the span.
///
/// # Errors
/// * [`PageInitError::AlreadyInitialized`] on any call after the first
///   success; the span is not touched.
/// * Region errors from [`PageAllocator::with_embedded_table`].
///
/// # Safety
/// The span must be RAM that nothing else uses for the rest of the kernel's
/// life.
pub unsafe fn page_init(start: PhysicalAddress, size: u64) -> Result<(), PageInitError> {
    PAGES.init_with(|| {
        // SAFETY: forwarded from the caller.
        unsafe { PageAllocator::with_embedded_table(start, size) }
    })?;

    if let Some(region) = PAGES.with_allocator(|a| *a.region()) {
        info!(
            "page_init: {} pages at {}..{}",
            region.pages(),
            region.base(),
            region.end()
        );
    }
    Ok(())
}

/// [`page_init`] over the heap span the linker script places after `.bss`.
///
/// # Errors
/// As for [`page_init`].
#[cfg(target_os = "none")]
pub fn page_init_from_linker() -> Result<(), PageInitError> {
    unsafe extern "C" {
        static _heap_start: u8;
        static _heap_size: u8;
    }

    let start = PhysicalAddress::from_ptr(&raw const _heap_start);
    // The symbol's address is the size.
    let size = (&raw const _heap_size).addr() as u64;

    // SAFETY: the linker reserves this span for the page allocator alone.
    unsafe { page_init(start, size) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_alloc::PageAlloc;
    use std::alloc::{Layout, alloc_zeroed};

    /// Only test that touches the global pool.
    #[test]
    fn page_init_installs_once() {
        const SPAN: usize = 64 * 4096;
        let layout = Layout::from_size_align(SPAN, 4096).unwrap();
        let memory = unsafe { alloc_zeroed(layout) };
        assert!(!memory.is_null());
        let start = PhysicalAddress::from_ptr(memory);

        assert_eq!(PAGES.alloc(1), None);
        unsafe { page_init(start, SPAN as u64) }.unwrap();
        assert!(PAGES.is_initialized());

        let mut pages = &PAGES;
        // One descriptor page carved off the front.
        assert_eq!(pages.total_pages(), 63);
        let again = unsafe { page_init(start, SPAN as u64) };
        assert_eq!(again, Err(PageInitError::AlreadyInitialized));
        assert_eq!(pages.total_pages(), 63);

        let run = pages.page_alloc(63).unwrap();
        assert_eq!(run.as_u64(), start.as_u64() + 4096);
        pages.page_free(run).unwrap();
        assert_eq!(pages.free_page_count(), 63);
    }
}

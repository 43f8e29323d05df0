//! # Kernel Physical Page Allocation
//!
//! This crate owns the physical memory that remains after the kernel image is
//! loaded and hands it out in runs of contiguous, fixed-size pages.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │            LockedPageAllocator (optional)           │
//! │    • spin lock around every entry point             │
//! │    • const-constructible for a kernel `static`      │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │                  PageAllocator                      │
//! │    • first-fit search in address order              │
//! │    • split on allocate, coalesce on free            │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │        PageRegion  +  [PageDescriptor] table        │
//! │    • address ↔ page index, bounds checks            │
//! │    • one 64-bit word per page, boundary tags        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## No-Heap Design
//!
//! The allocator cannot depend on a heap it would itself back. The descriptor
//! table is a borrowed slice: either a `static` array, or the first pages of
//! the managed memory ([`PageAllocator::with_embedded_table`]).
//!
//! ## Failure Signaling
//!
//! * Exhaustion (and a request for zero pages) is `None` from
//!   [`PageAllocator::alloc`]; nothing is changed.
//! * Freeing an address that is not the start of an outstanding allocation is
//!   detected and returned as [`FreeError`]; nothing is changed.
//! * Initialization problems are [`PageInitError`].
//!
//! ## Usage
//!
//! ```rust
//! use kernel_alloc::{PageAllocator, PageDescriptor, PageRegion};
//! use kernel_memory_addresses::{PhysicalAddress, Size4K};
//!
//! let mut table = [PageDescriptor::new(); 16];
//! let region = PageRegion::<Size4K>::new(PhysicalAddress::new(0x8040_0000), 16 * 4096).unwrap();
//! let mut pages = PageAllocator::new(region, &mut table).unwrap();
//!
//! let run = pages.alloc(3).unwrap();
//! assert_eq!(run.as_u64(), 0x8040_0000);
//! assert_eq!(pages.free_page_count(), 13);
//!
//! pages.free(run).unwrap();
//! assert_eq!(pages.largest_free_run(), 16);
//! ```
//!
//! ## Concurrency
//!
//! [`PageAllocator`] mutates through `&mut self` only. The teaching kernel is
//! single core with no preemption during allocator calls; any use from more
//! than one hart or from interrupt context requires [`LockedPageAllocator`].

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod descriptor;
mod error;
mod locked;
mod page_alloc;
mod region;

pub use descriptor::{MAX_RUN_PAGES, PageDescriptor, PageState};
pub use error::{FreeError, LayoutError, PageInitError};
pub use locked::{LockedPageAllocator, PageAllocatorGuard};
pub use page_alloc::{PageAllocator, Run, Runs};
pub use region::PageRegion;

use kernel_memory_addresses::PhysicalAddress;

/// The allocator boundary seen by the kernel and its self-test.
pub trait PageAlloc {
    /// Allocate `pages` contiguous pages; `None` on exhaustion or `pages == 0`.
    fn page_alloc(&mut self, pages: usize) -> Option<PhysicalAddress>;

    /// Release the run starting at `addr`.
    ///
    /// # Errors
    /// `addr` is not the start of an outstanding allocation.
    fn page_free(&mut self, addr: PhysicalAddress) -> Result<(), FreeError>;

    /// Page size in bytes.
    fn page_size(&self) -> u64;

    /// Number of pages under management.
    fn total_pages(&self) -> usize;

    /// Number of pages not part of any outstanding allocation.
    fn free_page_count(&self) -> usize;
}

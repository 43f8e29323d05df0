//! # Physical Memory Addresses
//!
//! Strongly-typed physical addresses and page-size markers shared by the page
//! allocator, the UART driver and the kernel entry.
//!
//! * [`PhysicalAddress`]: a `u64` newtype with page alignment helpers.
//! * [`PageSize`]: sealed marker trait; [`Size4K`] is the default granule,
//!   [`Size2M`] exists for megapage-sized regions.
//!
//! All alignment helpers are `const` and panic-free; arithmetic that could
//! leave the address space returns `Option`.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod page_size;
mod physical_address;

pub use page_size::{PageSize, Size2M, Size4K};
pub use physical_address::PhysicalAddress;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_helpers_4k() {
        let a = PhysicalAddress::new(0x8000_2345);
        assert_eq!(a.align_down::<Size4K>().as_u64(), 0x8000_2000);
        assert_eq!(a.align_up::<Size4K>().map(PhysicalAddress::as_u64), Some(0x8000_3000));
        assert_eq!(a.page_offset::<Size4K>(), 0x345);
        assert!(!a.is_aligned::<Size4K>());
        assert!(a.align_down::<Size4K>().is_aligned::<Size4K>());
    }

    #[test]
    fn align_up_keeps_aligned_addresses() {
        let a = PhysicalAddress::new(0x8020_0000);
        assert_eq!(a.align_up::<Size4K>(), Some(a));
        assert_eq!(a.align_up::<Size2M>(), Some(a));
    }

    #[test]
    fn align_up_overflow_is_none() {
        let a = PhysicalAddress::new(u64::MAX - 10);
        assert_eq!(a.align_up::<Size4K>(), None);
        assert_eq!(a.checked_add(11), None);
        assert_eq!(a.checked_add(10).map(PhysicalAddress::as_u64), Some(u64::MAX));
    }

    #[test]
    fn offset_from_base() {
        let base = PhysicalAddress::new(0x8000_0000);
        assert_eq!(PhysicalAddress::new(0x8000_3000).offset_from(base), Some(0x3000));
        assert_eq!(PhysicalAddress::new(0x7FFF_F000).offset_from(base), None);
    }

    #[test]
    fn page_counting() {
        assert_eq!(Size4K::whole_pages(3 * 4096 + 17), 3);
        assert_eq!(Size4K::pages_for(3 * 4096 + 17), 4);
        assert_eq!(Size4K::pages_for(3 * 4096), 3);
        assert_eq!(Size2M::whole_pages(Size2M::SIZE * 5), 5);
    }

    #[test]
    fn formatting() {
        let a = PhysicalAddress::new(0x8000_1000);
        assert_eq!(format!("{a}"), "0x0000000080001000");
        assert_eq!(format!("{a:?}"), "PA(0x0000000080001000)");
        assert_eq!(format!("{a:#x}"), "0x80001000");
    }
}

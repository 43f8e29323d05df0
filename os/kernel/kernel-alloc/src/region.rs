//! # Managed memory region
//!
//! Address ↔ page-index translation and bounds checks for the single
//! contiguous span the allocator owns.

use crate::descriptor::MAX_RUN_PAGES;
use crate::{FreeError, PageInitError};
use core::fmt;
use core::marker::PhantomData;
use kernel_memory_addresses::{PageSize, PhysicalAddress, Size4K};

/// A page-aligned span `[base, base + pages * S::SIZE)`.
///
/// Fixed at initialization; never resized.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct PageRegion<S: PageSize = Size4K> {
    base: PhysicalAddress,
    pages: usize,
    _size: PhantomData<S>,
}

impl<S: PageSize> PageRegion<S> {
    /// Build the largest page-aligned region inside `[start, start + size)`.
    ///
    /// The start is rounded up and the end rounded down to page boundaries.
    ///
    /// # Errors
    /// * [`PageInitError::Overflow`] if the span leaves the address space.
    /// * [`PageInitError::Empty`] if no whole page fits.
    /// * [`PageInitError::TooManyPages`] if the page count does not fit a
    ///   descriptor or `usize`.
    pub fn new(start: PhysicalAddress, size: u64) -> Result<Self, PageInitError> {
        let end = start.checked_add(size).ok_or(PageInitError::Overflow)?;
        let base = start.align_up::<S>().ok_or(PageInitError::Overflow)?;
        let end = end.align_down::<S>();
        let bytes = end.offset_from(base).unwrap_or(0);
        Self::from_base(base, S::whole_pages(bytes))
    }

    /// Build a region of exactly `pages` pages at an already aligned `base`.
    ///
    /// # Errors
    /// * [`PageInitError::Unaligned`] if `base` is not page aligned.
    /// * [`PageInitError::Overflow`] if the region end leaves the address space.
    /// * [`PageInitError::Empty`] / [`PageInitError::TooManyPages`] as for [`PageRegion::new`].
    pub fn with_pages(base: PhysicalAddress, pages: usize) -> Result<Self, PageInitError> {
        if !base.is_aligned::<S>() {
            return Err(PageInitError::Unaligned(base));
        }
        let pages = pages as u64;
        pages
            .checked_mul(S::SIZE)
            .and_then(|bytes| base.checked_add(bytes))
            .ok_or(PageInitError::Overflow)?;
        Self::from_base(base, pages)
    }

    fn from_base(base: PhysicalAddress, pages: u64) -> Result<Self, PageInitError> {
        if pages == 0 {
            return Err(PageInitError::Empty);
        }
        if pages > MAX_RUN_PAGES {
            return Err(PageInitError::TooManyPages);
        }
        let pages = usize::try_from(pages).map_err(|_| PageInitError::TooManyPages)?;
        Ok(Self {
            base,
            pages,
            _size: PhantomData,
        })
    }

    #[inline]
    #[must_use]
    pub const fn base(&self) -> PhysicalAddress {
        self.base
    }

    /// Number of pages in the region.
    #[inline]
    #[must_use]
    pub const fn pages(&self) -> usize {
        self.pages
    }

    #[inline]
    #[must_use]
    pub const fn page_size(&self) -> u64 {
        S::SIZE
    }

    #[inline]
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        (self.pages as u64) << S::SHIFT
    }

    /// First address past the region.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.base.as_u64() + self.size_bytes())
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, addr: PhysicalAddress) -> bool {
        addr >= self.base && addr < self.end()
    }

    /// Base address of page `index`. The caller keeps `index` in bounds.
    #[inline]
    #[must_use]
    pub const fn address_of(&self, index: usize) -> PhysicalAddress {
        debug_assert!(index < self.pages);
        PhysicalAddress::new(self.base.as_u64() + ((index as u64) << S::SHIFT))
    }

    /// Page index of `addr`.
    ///
    /// # Errors
    /// * [`FreeError::OutOfRange`] if `addr` is outside the region.
    /// * [`FreeError::Unaligned`] if `addr` is not a page boundary.
    #[allow(clippy::cast_possible_truncation)]
    pub fn index_of(&self, addr: PhysicalAddress) -> Result<usize, FreeError> {
        if !self.contains(addr) {
            return Err(FreeError::OutOfRange(addr));
        }
        if !addr.is_aligned::<S>() {
            return Err(FreeError::Unaligned(addr));
        }
        let offset = addr.offset_from(self.base).ok_or(FreeError::OutOfRange(addr))?;
        // Bounded by `self.pages`, which is a usize.
        Ok((offset >> S::SHIFT) as usize)
    }
}

impl<S: PageSize> fmt::Debug for PageRegion<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageRegion")
            .field("base", &self.base)
            .field("end", &self.end())
            .field("pages", &self.pages)
            .field("page_size", &S::as_str())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_memory_addresses::Size2M;

    #[test]
    fn new_trims_to_whole_pages() {
        // 0x8000_0010 .. 0x8000_5010 holds pages 0x8000_1000 .. 0x8000_5000.
        let r = PageRegion::<Size4K>::new(PhysicalAddress::new(0x8000_0010), 0x5000).unwrap();
        assert_eq!(r.base().as_u64(), 0x8000_1000);
        assert_eq!(r.pages(), 4);
        assert_eq!(r.end().as_u64(), 0x8000_5000);
        assert_eq!(r.size_bytes(), 4 * 4096);
    }

    #[test]
    fn new_rejects_spans_without_a_whole_page() {
        let r = PageRegion::<Size4K>::new(PhysicalAddress::new(0x8000_0010), 4096);
        assert_eq!(r, Err(PageInitError::Empty));
        let r = PageRegion::<Size4K>::new(PhysicalAddress::new(0x8000_0000), 0);
        assert_eq!(r, Err(PageInitError::Empty));
    }

    #[test]
    fn new_rejects_overflowing_spans() {
        let r = PageRegion::<Size4K>::new(PhysicalAddress::new(u64::MAX - 4095), 8192);
        assert_eq!(r, Err(PageInitError::Overflow));
    }

    #[test]
    fn with_pages_requires_alignment() {
        let r = PageRegion::<Size4K>::with_pages(PhysicalAddress::new(0x8000_0800), 4);
        assert_eq!(r, Err(PageInitError::Unaligned(PhysicalAddress::new(0x8000_0800))));
        let r = PageRegion::<Size2M>::with_pages(PhysicalAddress::new(0x8010_0000), 4);
        assert!(r.is_err());
    }

    #[test]
    fn index_translation_round_trips() {
        let r = PageRegion::<Size4K>::with_pages(PhysicalAddress::new(0x8000_0000), 16).unwrap();
        for i in 0..16 {
            assert_eq!(r.index_of(r.address_of(i)), Ok(i));
        }
    }

    #[test]
    fn index_of_checks_bounds_and_alignment() {
        let r = PageRegion::<Size4K>::with_pages(PhysicalAddress::new(0x8000_0000), 16).unwrap();
        let below = PhysicalAddress::new(0x7FFF_F000);
        let past = PhysicalAddress::new(0x8001_0000);
        let inside = PhysicalAddress::new(0x8000_0004);
        assert_eq!(r.index_of(below), Err(FreeError::OutOfRange(below)));
        assert_eq!(r.index_of(past), Err(FreeError::OutOfRange(past)));
        assert_eq!(r.index_of(inside), Err(FreeError::Unaligned(inside)));
    }

    #[test]
    fn megapage_regions() {
        let r = PageRegion::<Size2M>::new(PhysicalAddress::new(0x8000_0000), 9 * Size2M::SIZE).unwrap();
        assert_eq!(r.pages(), 9);
        assert_eq!(r.address_of(3).as_u64(), 0x8000_0000 + 3 * Size2M::SIZE);
    }
}

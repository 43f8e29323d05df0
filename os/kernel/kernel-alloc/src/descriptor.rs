//! # Page descriptors
//!
//! One 64-bit descriptor per managed page. Runs are delimited by boundary
//! tags: the first page of a run carries `head`, the last carries `tail`, and
//! both store the run length. A single-page run has both bits on the same
//! descriptor.
//!
//! ```text
//!  63                      3   2    1    0
//! +-------------------------+----+----+---+
//! |     run_pages[60:0]     |tail|head|A  |
//! +-------------------------+----+----+---+   (A = allocated)
//! ```
//!
//! Interior descriptors carry only the `allocated` bit; their `run_pages` is 0.

use bitfield_struct::bitfield;

/// Largest run length a descriptor can record.
pub const MAX_RUN_PAGES: u64 = (1 << 61) - 1;

/// Allocation state of a single page.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum PageState {
    Free,
    Allocated,
}

impl PageState {
    #[inline]
    #[must_use]
    pub const fn from_allocated(allocated: bool) -> Self {
        if allocated { Self::Allocated } else { Self::Free }
    }

    #[inline]
    #[must_use]
    pub const fn is_free(self) -> bool {
        matches!(self, Self::Free)
    }
}

/// Bookkeeping word for one page.
///
/// The table of descriptors is caller-provided storage; a `const` empty
/// descriptor lets it live in a `static`:
///
/// ```rust
/// # use kernel_alloc::PageDescriptor;
/// static mut TABLE: [PageDescriptor; 64] = [PageDescriptor::new(); 64];
/// ```
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct PageDescriptor {
    /// Page belongs to an allocated run.
    allocated: bool,
    /// First page of a run.
    head: bool,
    /// Last page of a run.
    tail: bool,
    /// Run length in pages (boundary descriptors only).
    #[bits(61)]
    run_pages: u64,
}

impl PageDescriptor {
    /// Descriptor for a page inside a run (neither head nor tail).
    #[inline]
    pub(crate) const fn interior(state: PageState) -> Self {
        Self::new().with_allocated(matches!(state, PageState::Allocated))
    }

    /// Descriptor for the first and/or last page of a run of `pages` pages.
    #[inline]
    pub(crate) const fn boundary(state: PageState, pages: usize, head: bool, tail: bool) -> Self {
        Self::interior(state)
            .with_head(head)
            .with_tail(tail)
            .with_run_pages(pages as u64)
    }

    #[inline]
    #[must_use]
    pub const fn state(self) -> PageState {
        PageState::from_allocated(self.allocated())
    }

    #[inline]
    #[must_use]
    pub const fn is_head(self) -> bool {
        self.head()
    }

    #[inline]
    #[must_use]
    pub const fn is_tail(self) -> bool {
        self.tail()
    }

    /// Run length recorded on a boundary descriptor, 0 on interior pages.
    ///
    /// Lengths never exceed the region's page count, which fits `usize`.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn run_len(self) -> usize {
        self.run_pages() as usize
    }

    /// Head of an allocated run, i.e. a valid argument for `free`.
    #[inline]
    #[must_use]
    pub const fn is_allocation_start(self) -> bool {
        self.head() && self.allocated()
    }

    /// Tail of a free run; used to find the run preceding a freed one.
    #[inline]
    #[must_use]
    pub const fn ends_free_run(self) -> bool {
        self.tail() && !self.allocated()
    }

    /// Head of a free run; used to find the run following a freed one.
    #[inline]
    #[must_use]
    pub const fn starts_free_run(self) -> bool {
        self.head() && !self.allocated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_page_run_sets_both_tags() {
        let d = PageDescriptor::boundary(PageState::Allocated, 1, true, true);
        assert!(d.is_head());
        assert!(d.is_tail());
        assert!(d.is_allocation_start());
        assert_eq!(d.run_len(), 1);
        assert_eq!(d.into_bits(), 0b1 | 0b10 | 0b100 | (1 << 3));
    }

    #[test]
    fn interior_pages_carry_only_state() {
        let d = PageDescriptor::interior(PageState::Free);
        assert_eq!(d.state(), PageState::Free);
        assert!(!d.is_head());
        assert!(!d.is_tail());
        assert_eq!(d.run_len(), 0);
        assert_eq!(d, PageDescriptor::new());
    }

    #[test]
    fn free_run_tags() {
        let head = PageDescriptor::boundary(PageState::Free, 7, true, false);
        let tail = PageDescriptor::boundary(PageState::Free, 7, false, true);
        assert!(head.starts_free_run());
        assert!(!head.ends_free_run());
        assert!(tail.ends_free_run());
        assert!(!tail.starts_free_run());
        assert!(!head.is_allocation_start());
    }

    #[test]
    fn run_length_uses_all_61_bits() {
        let d = PageDescriptor::new().with_run_pages(MAX_RUN_PAGES);
        assert_eq!(d.run_pages(), MAX_RUN_PAGES);
        assert!(!d.allocated());
    }
}

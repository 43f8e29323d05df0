//! # First-fit page allocator
//!
//! Hands out runs of contiguous pages from one [`PageRegion`], tracking every
//! page in a caller-provided [`PageDescriptor`] table.
//!
//! ## Algorithm
//! - **Search**: walk runs from page 0 upwards, jumping by each head's run
//!   length, and take the first free run that is long enough.
//! - **Split**: the first `n` pages of the chosen run become the allocation,
//!   the rest stays a free run directly behind it.
//! - **Free**: the head descriptor of the run records its length, so the
//!   start address alone identifies the pages to release.
//! - **Coalesce**: the tail tag of the page before and the head tag of the
//!   page after a freed run locate free neighbors in O(1); both are merged
//!   so no two free runs are ever adjacent.
//!
//! ## Invariants
//! - Runs tile the region: every page belongs to exactly one run.
//! - Head and tail descriptors of a run agree on its length.
//! - No two free runs are adjacent.
//! - `free_pages` equals the sum of free run lengths.
//!
//! [`PageAllocator::verify`] checks all of the above.

use crate::descriptor::{PageDescriptor, PageState};
use crate::region::PageRegion;
use crate::{FreeError, LayoutError, PageAlloc, PageInitError};
use kernel_memory_addresses::{PageSize, PhysicalAddress, Size4K};
use log::{debug, info, trace, warn};

/// A maximal span of pages in one state.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Run {
    /// Index of the first page in the region.
    pub first_page: usize,
    /// Length in pages (never zero).
    pub pages: usize,
    pub state: PageState,
    /// Address of the first page.
    pub start: PhysicalAddress,
}

impl Run {
    /// Index one past the last page.
    #[inline]
    #[must_use]
    pub const fn end_page(&self) -> usize {
        self.first_page + self.pages
    }

    #[inline]
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.state.is_free()
    }
}

/// Iterator over the runs of a descriptor table in ascending address order.
pub struct Runs<'t, S: PageSize> {
    table: &'t [PageDescriptor],
    region: PageRegion<S>,
    next: usize,
}

impl<S: PageSize> Iterator for Runs<'_, S> {
    type Item = Run;

    fn next(&mut self) -> Option<Run> {
        let first = self.next;
        let head = *self.table.get(first)?;
        let pages = head.run_len();
        if !head.is_head() || pages == 0 {
            // Corrupted table; stop rather than loop.
            self.next = self.table.len();
            return None;
        }
        self.next = first.saturating_add(pages);
        Some(Run {
            first_page: first,
            pages,
            state: head.state(),
            start: self.region.address_of(first),
        })
    }
}

/// Physical page allocator over a single contiguous region.
///
/// Every mutation takes `&mut self`; shared use across cores or interrupt
/// handlers must go through [`LockedPageAllocator`](crate::LockedPageAllocator).
pub struct PageAllocator<'a, S: PageSize = Size4K> {
    region: PageRegion<S>,
    table: &'a mut [PageDescriptor],
    free_pages: usize,
}

impl<'a, S: PageSize> PageAllocator<'a, S> {
    /// Take over `region`, marking every page free.
    ///
    /// Only the first `region.pages()` entries of `table` are used.
    ///
    /// # Errors
    /// [`PageInitError::TableTooSmall`] if `table` has fewer entries than the region has pages.
    pub fn new(
        region: PageRegion<S>,
        table: &'a mut [PageDescriptor],
    ) -> Result<Self, PageInitError> {
        let need = region.pages();
        let have = table.len();
        if have < need {
            return Err(PageInitError::TableTooSmall { have, need });
        }

        let mut allocator = Self {
            region,
            table: &mut table[..need],
            free_pages: need,
        };
        allocator.mark_run(0, need, PageState::Free);

        info!(
            "page allocator: {need} pages of {} at {}..{}",
            S::as_str(),
            region.base(),
            region.end()
        );
        Ok(allocator)
    }

    /// Take over `[start, start + size)`, storing the descriptor table in its
    /// first pages and managing the rest.
    ///
    /// # Errors
    /// As for [`PageRegion::new`]; [`PageInitError::Empty`] if nothing is left
    /// once the table is carved out.
    ///
    /// # Safety
    /// The span must be RAM that is valid, writable, reachable at its physical
    /// address, and not used by anything else for as long as `'a`.
    pub unsafe fn with_embedded_table(
        start: PhysicalAddress,
        size: u64,
    ) -> Result<Self, PageInitError> {
        let whole = PageRegion::<S>::new(start, size)?;
        let table_bytes = (whole.pages() as u64) * (size_of::<PageDescriptor>() as u64);
        let table_pages =
            usize::try_from(S::pages_for(table_bytes)).map_err(|_| PageInitError::TooManyPages)?;
        let managed = whole
            .pages()
            .checked_sub(table_pages)
            .filter(|&pages| pages > 0)
            .ok_or(PageInitError::Empty)?;

        let region = PageRegion::with_pages(whole.address_of(table_pages), managed)?;
        debug!(
            "page allocator: descriptor table at {} uses {table_pages} pages",
            whole.base()
        );

        // SAFETY: the caller hands us the whole span; the table pages lie in front
        // of `region`, are page aligned, and nothing else references them.
        let table = unsafe {
            core::slice::from_raw_parts_mut(
                whole.base().as_mut_ptr::<PageDescriptor>(),
                region.pages(),
            )
        };
        Self::new(region, table)
    }

    #[inline]
    #[must_use]
    pub const fn region(&self) -> &PageRegion<S> {
        &self.region
    }

    #[inline]
    #[must_use]
    pub const fn total_pages(&self) -> usize {
        self.region.pages()
    }

    #[inline]
    #[must_use]
    pub const fn free_page_count(&self) -> usize {
        self.free_pages
    }

    #[inline]
    #[must_use]
    pub const fn allocated_pages(&self) -> usize {
        self.region.pages() - self.free_pages
    }

    /// All runs, lowest address first.
    #[must_use]
    pub fn runs(&self) -> Runs<'_, S> {
        Runs {
            table: &*self.table,
            region: self.region,
            next: 0,
        }
    }

    pub fn free_runs(&self) -> impl Iterator<Item = Run> + '_ {
        self.runs().filter(Run::is_free)
    }

    /// Length of the longest free run; the largest request that can succeed.
    #[must_use]
    pub fn largest_free_run(&self) -> usize {
        self.free_runs().map(|run| run.pages).max().unwrap_or(0)
    }

    #[must_use]
    pub fn page_state(&self, index: usize) -> Option<PageState> {
        self.table.get(index).map(|d| d.state())
    }

    /// Length of the outstanding allocation starting at `addr`, if any.
    #[must_use]
    pub fn allocation_pages(&self, addr: PhysicalAddress) -> Option<usize> {
        let index = self.region.index_of(addr).ok()?;
        let head = self.table[index];
        head.is_allocation_start().then(|| head.run_len())
    }

    /// Allocate `pages` contiguous pages, first fit by address.
    ///
    /// Returns the base of the run, or `None` when `pages` is zero or no free
    /// run is long enough. A failed call changes nothing.
    pub fn alloc(&mut self, pages: usize) -> Option<PhysicalAddress> {
        if pages == 0 {
            debug!("page_alloc: rejecting request for zero pages");
            return None;
        }
        if pages > self.free_pages {
            debug!(
                "page_alloc: {pages} pages requested, {} free",
                self.free_pages
            );
            return None;
        }

        let Some(run) = self.free_runs().find(|run| run.pages >= pages) else {
            debug!(
                "page_alloc: no free run of {pages} pages, largest is {}",
                self.largest_free_run()
            );
            return None;
        };

        self.mark_run(run.first_page, pages, PageState::Allocated);
        if run.pages > pages {
            self.mark_run(run.first_page + pages, run.pages - pages, PageState::Free);
        }
        self.free_pages -= pages;

        trace!("page_alloc: {pages} pages at {}", run.start);
        Some(run.start)
    }

    /// Return the run starting at `addr` to the free pool.
    ///
    /// # Errors
    /// `addr` outside the region, unaligned, or not the start of an outstanding
    /// allocation (including a second free of the same run). The table is left
    /// untouched in every error case.
    pub fn free(&mut self, addr: PhysicalAddress) -> Result<(), FreeError> {
        let index = self
            .region
            .index_of(addr)
            .inspect_err(|e| warn!("page_free: {e}"))?;

        let head = self.table[index];
        if !head.is_allocation_start() {
            let err = FreeError::NotAllocated(addr);
            warn!("page_free: {err}");
            return Err(err);
        }

        let pages = head.run_len();
        let mut first = index;
        let mut end = index + pages;

        if let Some(prev) = index.checked_sub(1).map(|i| self.table[i]) {
            if prev.ends_free_run() {
                first -= prev.run_len();
            }
        }
        if let Some(next) = self.table.get(end) {
            if next.starts_free_run() {
                end += next.run_len();
            }
        }

        self.mark_run(first, end - first, PageState::Free);
        self.free_pages += pages;

        trace!(
            "page_free: {pages} pages at {addr}, free run now {}..{}",
            self.region.address_of(first),
            self.region.address_of(end - 1)
        );
        Ok(())
    }

    /// Check every bookkeeping invariant.
    ///
    /// # Errors
    /// The first inconsistency found, scanning from the lowest page.
    pub fn verify(&self) -> Result<(), LayoutError> {
        let len = self.table.len();
        let mut index = 0;
        let mut free = 0;
        let mut previous_free = None;

        while index < len {
            let head = self.table[index];
            if !head.is_head() {
                return Err(LayoutError::MissingHead(index));
            }
            let pages = head.run_len();
            if pages == 0 {
                return Err(LayoutError::EmptyRun(index));
            }
            let Some(end) = index.checked_add(pages).filter(|&end| end <= len) else {
                return Err(LayoutError::RunPastEnd {
                    first: index,
                    pages,
                });
            };
            let last = end - 1;
            let tail = self.table[last];
            if !tail.is_tail() || tail.run_len() != pages {
                return Err(LayoutError::BadTail { first: index });
            }

            let state = head.state();
            let stray = (index..end).find(|&page| {
                let d = self.table[page];
                d.state() != state
                    || (page != index && d.is_head())
                    || (page != last && d.is_tail())
            });
            if let Some(page) = stray {
                return Err(LayoutError::StateMismatch { page });
            }

            if state.is_free() {
                if let Some(first) = previous_free {
                    return Err(LayoutError::AdjacentFreeRuns {
                        first,
                        second: index,
                    });
                }
                previous_free = Some(index);
                free += pages;
            } else {
                previous_free = None;
            }
            index = end;
        }

        if free != self.free_pages {
            return Err(LayoutError::FreeCountMismatch {
                counted: self.free_pages,
                actual: free,
            });
        }
        Ok(())
    }

    /// Log the run layout at debug level.
    pub fn dump(&self) {
        debug!(
            "page allocator: {} of {} pages free",
            self.free_pages,
            self.region.pages()
        );
        for run in self.runs() {
            debug!(
                "  {}..{} {:?} ({} pages)",
                run.start,
                self.region.address_of(run.end_page() - 1),
                run.state,
                run.pages
            );
        }
    }

    /// Rewrite the descriptors of `[first, first + pages)` as one run.
    ///
    /// The only place the table is written after construction.
    fn mark_run(&mut self, first: usize, pages: usize, state: PageState) {
        debug_assert!(pages > 0 && first + pages <= self.table.len());
        let last = first + pages - 1;
        self.table[first..=last].fill(PageDescriptor::interior(state));
        self.table[first] = PageDescriptor::boundary(state, pages, true, first == last);
        if last != first {
            self.table[last] = PageDescriptor::boundary(state, pages, false, true);
        }
    }
}

impl<S: PageSize> PageAlloc for PageAllocator<'_, S> {
    #[inline]
    fn page_alloc(&mut self, pages: usize) -> Option<PhysicalAddress> {
        self.alloc(pages)
    }

    #[inline]
    fn page_free(&mut self, addr: PhysicalAddress) -> Result<(), FreeError> {
        self.free(addr)
    }

    #[inline]
    fn page_size(&self) -> u64 {
        S::SIZE
    }

    #[inline]
    fn total_pages(&self) -> usize {
        self.region.pages()
    }

    #[inline]
    fn free_page_count(&self) -> usize {
        self.free_pages
    }
}

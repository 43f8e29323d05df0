//! # Shared page allocator
//!
//! Search, split and coalesce are multi-step writes to the descriptor table
//! and must not interleave. On the single-core teaching kernel nothing else
//! runs during an allocator call, but any caller on another hart or in an
//! interrupt handler has to go through this wrapper.
//!
//! The lock is a test-and-test-and-set spin lock. It does not mask
//! interrupts: taking it from an interrupt handler that preempted a holder
//! deadlocks.

use crate::{FreeError, PageAlloc, PageAllocator, PageInitError};
use core::cell::UnsafeCell;
use core::hint::spin_loop;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};
use kernel_memory_addresses::{PageSize, PhysicalAddress, Size4K};
use log::info;

/// A [`PageAllocator`] slot behind a spin lock, `const`-constructible for `static` use.
///
/// The slot is empty until [`init`](Self::init) runs; allocations before that
/// fail and frees report [`FreeError::Uninitialized`].
pub struct LockedPageAllocator<'a, S: PageSize = Size4K> {
    /// * `false`: unlocked
    /// * `true`: locked
    locked: AtomicBool,
    inner: UnsafeCell<Option<PageAllocator<'a, S>>>,
}

// Safety: the slot is only touched while `locked` is held; the allocator is `Send`.
unsafe impl<S: PageSize> Sync for LockedPageAllocator<'_, S> {}

impl<S: PageSize> Default for LockedPageAllocator<'_, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, S: PageSize> LockedPageAllocator<'a, S> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
            inner: UnsafeCell::new(None),
        }
    }

    /// Install the allocator. Runs once.
    ///
    /// # Errors
    /// [`PageInitError::AlreadyInitialized`] if a previous call succeeded; the
    /// installed allocator is kept and `allocator` is dropped.
    pub fn init(&self, allocator: PageAllocator<'a, S>) -> Result<(), PageInitError> {
        self.init_with(|| Ok(allocator))
    }

    /// Build and install the allocator while holding the lock.
    ///
    /// `build` only runs if the slot is still empty, so a second call never
    /// rewrites a descriptor table that is already in use.
    ///
    /// # Errors
    /// [`PageInitError::AlreadyInitialized`], or whatever `build` returns.
    pub fn init_with(
        &self,
        build: impl FnOnce() -> Result<PageAllocator<'a, S>, PageInitError>,
    ) -> Result<(), PageInitError> {
        let mut slot = self.lock();
        if slot.is_some() {
            return Err(PageInitError::AlreadyInitialized);
        }
        let allocator = build()?;
        info!(
            "page allocator installed: {} pages",
            allocator.total_pages()
        );
        *slot = Some(allocator);
        Ok(())
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.lock().is_some()
    }

    /// Try once; returns immediately.
    #[inline]
    pub fn try_lock(&self) -> Option<PageAllocatorGuard<'_, 'a, S>> {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
            .then(|| PageAllocatorGuard { lock: self })
    }

    /// Spin until acquired, then return a guard over the slot.
    #[inline]
    pub fn lock(&self) -> PageAllocatorGuard<'_, 'a, S> {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            // Spin on a plain load until the holder releases.
            while self.locked.load(Ordering::Relaxed) {
                spin_loop();
            }
        }
        PageAllocatorGuard { lock: self }
    }

    /// Run `f` on the installed allocator; `None` if there is none yet.
    #[inline]
    pub fn with_allocator<R>(&self, f: impl FnOnce(&mut PageAllocator<'a, S>) -> R) -> Option<R> {
        let mut slot = self.lock();
        slot.as_mut().map(f)
    }

    pub fn alloc(&self, pages: usize) -> Option<PhysicalAddress> {
        self.with_allocator(|a| a.alloc(pages)).flatten()
    }

    /// # Errors
    /// See [`PageAllocator::free`]; [`FreeError::Uninitialized`] before [`init`](Self::init).
    pub fn free(&self, addr: PhysicalAddress) -> Result<(), FreeError> {
        self.with_allocator(|a| a.free(addr))
            .unwrap_or(Err(FreeError::Uninitialized))
    }
}

/// Exclusive access to the allocator slot; unlocks on drop.
pub struct PageAllocatorGuard<'l, 'a, S: PageSize> {
    lock: &'l LockedPageAllocator<'a, S>,
}

impl<'a, S: PageSize> Deref for PageAllocatorGuard<'_, 'a, S> {
    type Target = Option<PageAllocator<'a, S>>;

    fn deref(&self) -> &Self::Target {
        unsafe { &*self.lock.inner.get() }
    }
}

impl<S: PageSize> DerefMut for PageAllocatorGuard<'_, '_, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { &mut *self.lock.inner.get() }
    }
}

impl<S: PageSize> Drop for PageAllocatorGuard<'_, '_, S> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

impl<S: PageSize> PageAlloc for &LockedPageAllocator<'_, S> {
    fn page_alloc(&mut self, pages: usize) -> Option<PhysicalAddress> {
        self.alloc(pages)
    }

    fn page_free(&mut self, addr: PhysicalAddress) -> Result<(), FreeError> {
        self.free(addr)
    }

    fn page_size(&self) -> u64 {
        S::SIZE
    }

    fn total_pages(&self) -> usize {
        self.with_allocator(|a| a.total_pages()).unwrap_or(0)
    }

    fn free_page_count(&self) -> usize {
        self.with_allocator(|a| a.free_page_count()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PageDescriptor, PageRegion};

    #[test]
    fn empty_slot_fails_closed() {
        let locked = LockedPageAllocator::<Size4K>::new();
        assert!(!locked.is_initialized());
        assert_eq!(locked.alloc(1), None);
        assert_eq!(
            locked.free(PhysicalAddress::new(0x8000_0000)),
            Err(FreeError::Uninitialized)
        );
    }

    #[test]
    fn second_init_is_rejected() {
        let mut first = [PageDescriptor::new(); 4];
        let mut second = [PageDescriptor::new(); 4];
        let region = PageRegion::<Size4K>::with_pages(PhysicalAddress::new(0x8000_0000), 4).unwrap();

        let locked = LockedPageAllocator::new();
        locked.init(PageAllocator::new(region, &mut first).unwrap()).unwrap();
        let again = locked.init(PageAllocator::new(region, &mut second).unwrap());
        assert_eq!(again, Err(PageInitError::AlreadyInitialized));
        assert_eq!((&locked).total_pages(), 4);
    }

    #[test]
    fn init_with_skips_the_builder_once_installed() {
        let mut table = [PageDescriptor::new(); 4];
        let region = PageRegion::<Size4K>::with_pages(PhysicalAddress::new(0x8000_0000), 4).unwrap();

        let locked = LockedPageAllocator::new();
        locked
            .init_with(|| PageAllocator::new(region, &mut table))
            .unwrap();
        let again = locked.init_with(|| panic!("builder must not run"));
        assert_eq!(again, Err(PageInitError::AlreadyInitialized));
    }

    #[test]
    fn init_with_propagates_builder_errors() {
        let locked = LockedPageAllocator::<Size4K>::new();
        let err = locked.init_with(|| Err(PageInitError::Empty));
        assert_eq!(err, Err(PageInitError::Empty));
        assert!(!locked.is_initialized());
    }

    #[test]
    fn try_lock_fails_while_held() {
        let locked = LockedPageAllocator::<Size4K>::new();
        let guard = locked.try_lock();
        assert!(guard.is_some());
        assert!(locked.try_lock().is_none());
        drop(guard);
        assert!(locked.try_lock().is_some());
    }
}

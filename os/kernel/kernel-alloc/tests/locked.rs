use kernel_alloc::{LockedPageAllocator, PageAlloc, PageAllocator, PageDescriptor, PageRegion};
use kernel_memory_addresses::{PhysicalAddress, Size4K};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

const PAGES: usize = 256;

fn leak_table() -> &'static mut [PageDescriptor] {
    Box::leak(vec![PageDescriptor::new(); PAGES].into_boxed_slice())
}

fn installed() -> &'static LockedPageAllocator<'static> {
    let region = PageRegion::<Size4K>::with_pages(PhysicalAddress::new(0x8800_0000), PAGES).unwrap();
    let locked: &'static LockedPageAllocator<'static> = Box::leak(Box::new(LockedPageAllocator::new()));
    locked
        .init(PageAllocator::new(region, leak_table()).unwrap())
        .unwrap();
    locked
}

#[test]
fn static_slot_is_const_constructible() {
    static PAGES_SLOT: LockedPageAllocator<'static> = LockedPageAllocator::new();
    assert!(!PAGES_SLOT.is_initialized());
    assert_eq!(PAGES_SLOT.alloc(1), None);
}

#[test]
fn trait_boundary_through_the_lock() {
    let mut pages = installed();
    assert_eq!(pages.total_pages(), PAGES);
    assert_eq!(pages.page_size(), 4096);

    let a = pages.page_alloc(4).unwrap();
    assert_eq!(pages.free_page_count(), PAGES - 4);
    pages.page_free(a).unwrap();
    assert_eq!(pages.free_page_count(), PAGES);
    pages.with_allocator(|a| a.verify()).unwrap().unwrap();
}

#[test]
fn contended_alloc_free_never_overlaps() {
    let threads = 8;
    let iters = 500;

    let pages = installed();
    let owners = Arc::new((0..PAGES).map(|_| AtomicUsize::new(usize::MAX)).collect::<Vec<_>>());
    let start = Arc::new(Barrier::new(threads));
    let failures = Arc::new(Mutex::new(0usize));

    let mut handles = Vec::with_capacity(threads);
    for t in 0..threads {
        let owners = Arc::clone(&owners);
        let start = Arc::clone(&start);
        let failures = Arc::clone(&failures);
        handles.push(thread::spawn(move || {
            start.wait();
            for i in 0..iters {
                let n = 1 + (t + i) % 4;
                let Some(addr) = pages.alloc(n) else {
                    *failures.lock().unwrap() += 1;
                    continue;
                };
                let first = ((addr.as_u64() - 0x8800_0000) / 4096) as usize;
                for page in first..first + n {
                    let prev = owners[page].swap(t, Ordering::SeqCst);
                    assert_eq!(prev, usize::MAX, "page {page} handed out twice");
                }
                for page in first..first + n {
                    owners[page].store(usize::MAX, Ordering::SeqCst);
                }
                pages.free(addr).unwrap();
                thread::yield_now();
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    // 8 threads × at most 4 pages never exhaust 256 pages.
    assert_eq!(*failures.lock().unwrap(), 0);
    assert_eq!(pages.with_allocator(|a| a.free_page_count()), Some(PAGES));
    pages.with_allocator(|a| a.verify()).unwrap().unwrap();
}

#[test]
fn lock_is_released_on_panic() {
    let pages = installed();
    let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _: Option<()> = pages.with_allocator(|a| {
            let _ = a.alloc(1);
            panic!("boom");
        });
    }));
    assert!(res.is_err());
    assert!(pages.try_lock().is_some());
}

/// `LockedPageAllocator` can sit in a `static` and be shared across threads.
#[test]
fn locked_allocator_is_sync() {
    fn takes_sync<S: Sync>(_s: &S) {}
    let locked = LockedPageAllocator::<Size4K>::new();
    takes_sync(&locked);
}

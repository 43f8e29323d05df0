use kernel_memory_addresses::PhysicalAddress;

/// Reasons `page_init` refuses a region or descriptor table.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageInitError {
    #[error("region holds no whole page")]
    Empty,
    #[error("region base {0} is not page aligned")]
    Unaligned(PhysicalAddress),
    #[error("region end overflows the physical address space")]
    Overflow,
    #[error("region has more pages than a descriptor can count")]
    TooManyPages,
    #[error("descriptor table holds {have} entries but the region has {need} pages")]
    TableTooSmall { have: usize, need: usize },
    #[error("page allocator is already initialized")]
    AlreadyInitialized,
}

/// Reasons `page_free` rejects an address. Rejection never changes allocator state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FreeError {
    #[error("address {0} lies outside the managed region")]
    OutOfRange(PhysicalAddress),
    #[error("address {0} is not page aligned")]
    Unaligned(PhysicalAddress),
    #[error("address {0} is not the start of an outstanding allocation")]
    NotAllocated(PhysicalAddress),
    #[error("page allocator is not initialized")]
    Uninitialized,
}

/// Bookkeeping inconsistencies reported by `PageAllocator::verify`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("page {0} should start a run but carries no head tag")]
    MissingHead(usize),
    #[error("run at page {0} has zero length")]
    EmptyRun(usize),
    #[error("run at page {first} with {pages} pages runs past the region end")]
    RunPastEnd { first: usize, pages: usize },
    #[error("run at page {first} has no matching tail tag")]
    BadTail { first: usize },
    #[error("page {page} disagrees with the state of its run")]
    StateMismatch { page: usize },
    #[error("free runs at pages {first} and {second} are adjacent")]
    AdjacentFreeRuns { first: usize, second: usize },
    #[error("free page counter says {counted} but the table holds {actual}")]
    FreeCountMismatch { counted: usize, actual: usize },
}

//! # Boot-time page allocator self-test
//!
//! Exercises the allocator through the [`PageAlloc`] boundary and reports
//! every step on a [`CharSink`], so a run under QEMU shows on the console
//! whether the allocator behaves.
//!
//! | Step | Request                  | Expectation                          |
//! |------|--------------------------|--------------------------------------|
//! | 1    | 1 page, then free        | succeeds                             |
//! | 2    | 3 pages, then free       | succeeds                             |
//! | 3    | [`OVERSIZED_REQUEST`]    | refused                              |
//! | 4    | 5 × 2 pages, then free   | all succeed, no two overlap          |
//! | 5    | every page, then free    | succeeds: nothing leaked or split    |

use kernel_alloc::{FreeError, PageAlloc};
use kernel_memory_addresses::PhysicalAddress;
use kernel_uart::CharSink;
use log::{info, warn};

/// Page count no test machine has.
pub const OVERSIZED_REQUEST: usize = 100_000;

const BLOCKS: usize = 5;
const BLOCK_PAGES: usize = 2;

/// Addresses handed out during a successful run.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SelfTestReport {
    pub total_pages: usize,
    pub single: PhysicalAddress,
    pub triple: PhysicalAddress,
    pub blocks: [PhysicalAddress; BLOCKS],
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelfTestError {
    #[error("allocation of {0} pages failed")]
    AllocFailed(usize),
    #[error("allocation of {pages} pages unexpectedly succeeded at {addr}")]
    UnexpectedAllocation { pages: usize, addr: PhysicalAddress },
    #[error("blocks at {0} and {1} overlap")]
    Overlap(PhysicalAddress, PhysicalAddress),
    #[error("only {free} of {total} pages are free after the run")]
    CapacityNotRestored { free: usize, total: usize },
    #[error(transparent)]
    Free(#[from] FreeError),
}

/// Run all steps against `pages`, printing progress to `out`.
///
/// Expects an otherwise idle allocator: step 5 needs every page free.
/// Pages taken by a failing step are released before the error returns.
///
/// # Errors
/// The first step that misbehaves.
pub fn run<A, S>(pages: &mut A, out: &mut S) -> Result<SelfTestReport, SelfTestError>
where
    A: PageAlloc + ?Sized,
    S: CharSink + ?Sized,
{
    let total = pages.total_pages();
    info!("self-test: {total} pages of {} bytes", pages.page_size());

    out.puts("\n[Test 1] Alloc 1 page:\n");
    let single = alloc_reported(pages, out, 1)?;
    pages.page_free(single)?;
    out.puts("Freed 1 page.\n");

    out.puts("\n[Test 2] Alloc 3 pages:\n");
    let triple = alloc_reported(pages, out, 3)?;
    pages.page_free(triple)?;
    out.puts("Freed 3 pages.\n");

    out.puts("\n[Test 3] Alloc too many pages:\n");
    if let Some(addr) = pages.page_alloc(OVERSIZED_REQUEST) {
        out.puts("Unexpected allocation! Address: ");
        out.put_hex(addr.as_u64());
        out.putc(b'\n');
        pages.page_free(addr)?;
        return Err(SelfTestError::UnexpectedAllocation {
            pages: OVERSIZED_REQUEST,
            addr,
        });
    }
    out.puts("Allocation failed as expected (NULL).\n");

    out.puts("\n[Test 4] Alloc and free multiple times:\n");
    let mut blocks = [PhysicalAddress::zero(); BLOCKS];
    let mut filled = 0;
    while filled < BLOCKS {
        let Some(addr) = pages.page_alloc(BLOCK_PAGES) else {
            release(pages, &blocks[..filled]);
            return Err(SelfTestError::AllocFailed(BLOCK_PAGES));
        };
        out.puts("Allocated 2 pages at: ");
        out.put_hex(addr.as_u64());
        out.putc(b'\n');
        blocks[filled] = addr;
        filled += 1;
    }
    let span = BLOCK_PAGES as u64 * pages.page_size();
    if let Some((a, b)) = find_overlap(&blocks, span) {
        release(pages, &blocks);
        return Err(SelfTestError::Overlap(a, b));
    }
    for addr in blocks {
        pages.page_free(addr)?;
        out.puts("Freed 2 pages at: ");
        out.put_hex(addr.as_u64());
        out.putc(b'\n');
    }

    out.puts("\n[Test 5] Alloc every page:\n");
    let free = pages.free_page_count();
    if free != total {
        return Err(SelfTestError::CapacityNotRestored { free, total });
    }
    let all = alloc_reported(pages, out, total)?;
    pages.page_free(all)?;
    out.puts("Freed all pages.\n");

    out.puts("\nAll tests completed.\n");
    Ok(SelfTestReport {
        total_pages: total,
        single,
        triple,
        blocks,
    })
}

fn alloc_reported<A, S>(
    pages: &mut A,
    out: &mut S,
    count: usize,
) -> Result<PhysicalAddress, SelfTestError>
where
    A: PageAlloc + ?Sized,
    S: CharSink + ?Sized,
{
    let addr = pages
        .page_alloc(count)
        .ok_or(SelfTestError::AllocFailed(count))?;
    out.puts("Allocated address: ");
    out.put_hex(addr.as_u64());
    out.putc(b'\n');
    Ok(addr)
}

fn release<A: PageAlloc + ?Sized>(pages: &mut A, blocks: &[PhysicalAddress]) {
    for &addr in blocks {
        if let Err(e) = pages.page_free(addr) {
            warn!("self-test: cleanup of {addr} failed: {e}");
        }
    }
}

/// First pair of `span`-byte blocks that share a byte.
fn find_overlap(blocks: &[PhysicalAddress], span: u64) -> Option<(PhysicalAddress, PhysicalAddress)> {
    blocks.iter().enumerate().find_map(|(i, &a)| {
        blocks[i + 1..]
            .iter()
            .find(|&&b| a.as_u64() < b.as_u64() + span && b.as_u64() < a.as_u64() + span)
            .map(|&b| (a, b))
    })
}

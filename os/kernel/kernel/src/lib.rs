//! # RVOS Kernel
//!
//! Boot-time pieces of the teaching kernel that do not depend on running on
//! the target: the kernel's page pool, its initialization from the linker
//! layout, and the allocator self-test printed to the console.
//!
//! ## Boot Sequence
//!
//! ```text
//! _start (hart 0, M-mode)
//!     ↓  zero .bss, set up boot stack
//! start_kernel
//!     ↓  "Hello, RVOS!", UartLogger
//! memory::page_init_from_linker
//!     ↓  [_heap_start, _heap_start + _heap_size) → PAGES
//! selftest::run(&PAGES, uart)
//!     ↓
//! wfi loop
//! ```
//!
//! The entry itself lives in the binary and only exists on `target_os = "none"`.
//! On a hosted target the same self-test runs against a simulated region.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod config;
pub mod memory;
pub mod selftest;

pub use memory::{PAGES, page_init};
pub use selftest::{SelfTestError, SelfTestReport};

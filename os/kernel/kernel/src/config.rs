//! # Compile-time kernel configuration

use log::LevelFilter;

/// MMIO base of the console UART.
pub const UART_BASE: usize = kernel_uart::UART_BASE;

/// Most verbose level the UART logger emits.
///
/// `Info` shows the allocator lifecycle; `Debug` adds rejected requests and
/// layout dumps, `Trace` every allocation and free.
pub const LOG_LEVEL: LevelFilter = LevelFilter::Info;

/// Granule handed out by the page allocator.
pub type KernelPageSize = kernel_memory_addresses::Size4K;

/// Boot stack for hart 0.
pub const BOOT_STACK_SIZE: usize = 64 * 1024;

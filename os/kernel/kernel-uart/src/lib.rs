//! # UART Console Output
//!
//! Polling, transmit-only console for the RISC-V QEMU `virt` machine, plus a
//! `log` backend so the rest of the kernel can use `info!` and friends.
//!
//! ## Output Path
//!
//! ```text
//! log::info!(...)              sink.puts("...") / sink.put_hex(x)
//!       ↓                                   ↓
//! UartLogger (log::Log)  →  SinkWriter  →  CharSink::putc
//!                                           ↓
//!                              Uart: poll TXDATA[31], write byte
//! ```
//!
//! ## Core Components
//!
//! * [`CharSink`]: byte output with `puts` and `put_hex` built on `putc`.
//!   Anything that can take bytes (a UART, a test buffer) implements it.
//! * [`Uart`]: the MMIO driver. `putc` blocks until the FIFO has room; the
//!   device needs no setup.
//! * [`SinkWriter`]: `core::fmt::Write` over any sink, no allocation.
//! * [`UartLogger`]: `log::Log` implementation, installed once at boot.
//!
//! ## `enabled` Feature (default)
//!
//! Without it, [`Uart`] never touches its registers and every byte is
//! dropped, so the logger and console output cost nothing.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use kernel_uart::{CharSink, UART_BASE, Uart, UartLogger};
//! use log::LevelFilter;
//!
//! static LOGGER: UartLogger = UartLogger::new(unsafe { Uart::new(UART_BASE) }, LevelFilter::Info);
//!
//! let mut uart = unsafe { Uart::new(UART_BASE) };
//! uart.puts("Hello, RVOS!\n");
//! uart.put_hex(0x8020_0000);
//! LOGGER.init().ok();
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod logger;
mod sink;
mod uart;

pub use logger::UartLogger;
pub use sink::{CharSink, SinkWriter};
pub use uart::{UART_BASE, Uart};

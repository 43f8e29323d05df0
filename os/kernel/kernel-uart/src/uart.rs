//! # Memory-mapped UART transmitter
//!
//! The driver touches a single 32-bit word at the register base:
//!
//! | Offset | Name     | Use                                              |
//! |--------|----------|--------------------------------------------------|
//! | `0x00` | `TXDATA` | write: byte to send; bit 31 reads `1` while full |
//!
//! The QEMU `virt` UART decodes only 8 bytes and comes out of reset ready to
//! transmit, so there is nothing to initialize.

use crate::CharSink;

/// Base address of the UART on the QEMU `virt` machine.
pub const UART_BASE: usize = 0x1000_0000;

#[cfg(feature = "enabled")]
const TXDATA: usize = 0x00;

/// `TXDATA` bit that stays set while the transmit FIFO cannot take a byte.
#[cfg(feature = "enabled")]
const TXDATA_FULL: u32 = 1 << 31;

/// Polling transmit-only driver.
///
/// Holds only the register base, so copies are cheap and all of them drive the
/// same device.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Uart {
    base: usize,
}

impl Uart {
    /// # Safety
    /// `base` must be the 4-byte aligned start of a UART register block that is
    /// mapped at that address for as long as any copy of this driver is used.
    #[must_use]
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    #[cfg(feature = "enabled")]
    #[inline]
    fn read(&self, offset: usize) -> u32 {
        // SAFETY: `new` guarantees a mapped, aligned register block.
        unsafe { core::ptr::read_volatile((self.base + offset) as *const u32) }
    }

    #[cfg(feature = "enabled")]
    #[inline]
    fn write(&mut self, offset: usize, value: u32) {
        // SAFETY: as for `read`.
        unsafe { core::ptr::write_volatile((self.base + offset) as *mut u32, value) }
    }
}

impl CharSink for Uart {
    #[inline]
    fn putc(&mut self, byte: u8) {
        #[cfg(feature = "enabled")]
        {
            while self.read(TXDATA) & TXDATA_FULL != 0 {
                core::hint::spin_loop();
            }
            self.write(TXDATA, u32::from(byte));
        }
        #[cfg(not(feature = "enabled"))]
        let _ = byte;
    }
}

//! # Kernel Entry Point
//!
//! On `target_os = "none"` this is the RISC-V kernel image QEMU boots with
//! `-bios none -kernel`. On a hosted target it runs the same allocator
//! self-test against a simulated heap and prints to stdout.

#![cfg_attr(target_os = "none", no_std, no_main)]
#![allow(unsafe_code)]

#[cfg(target_os = "none")]
mod entry {
    use core::fmt::Write;
    use kernel::config::{BOOT_STACK_SIZE, LOG_LEVEL, UART_BASE};
    use kernel::{PAGES, memory, selftest};
    use kernel_uart::{CharSink, SinkWriter, Uart, UartLogger};
    use log::{error, info};

    static LOGGER: UartLogger = UartLogger::new(unsafe { Uart::new(UART_BASE) }, LOG_LEVEL);

    /// 16-byte aligned stack
    #[repr(align(16))]
    struct Aligned<const N: usize>([u8; N]);

    #[unsafe(link_section = ".bss.boot")]
    static mut BOOT_STACK: Aligned<BOOT_STACK_SIZE> = Aligned([0; BOOT_STACK_SIZE]);

    /// Reset entry.
    ///
    /// QEMU starts every hart here in machine mode with no stack. Hart 0
    /// clears `.bss`, points `sp` at the top of [`BOOT_STACK`] and jumps to
    /// [`start_kernel`]; all other harts park in `wfi`.
    #[unsafe(link_section = ".text.boot")]
    #[unsafe(no_mangle)]
    #[unsafe(naked)]
    pub extern "C" fn _start() -> ! {
        core::arch::naked_asm!(
            "csrr   t0, mhartid",
            "bnez   t0, 3f",

            // Zero .bss; the linker script keeps both ends 16-byte aligned.
            "la     t0, _bss_start",
            "la     t1, _bss_end",
            "1:",
            "bgeu   t0, t1, 2f",
            "sd     zero, 0(t0)",
            "addi   t0, t0, 8",
            "j      1b",

            "2:",
            "la     sp, {stack_sym}",
            "li     t0, {stack_size}",
            "add    sp, sp, t0",
            "j      {rust_entry}",

            "3:",
            "wfi",
            "j      3b",
            stack_sym = sym BOOT_STACK,
            stack_size = const BOOT_STACK_SIZE,
            rust_entry = sym start_kernel,
        );
    }

    #[unsafe(no_mangle)]
    extern "C" fn start_kernel() -> ! {
        // SAFETY: the QEMU virt UART is identity mapped in M-mode.
        let mut uart = unsafe { Uart::new(UART_BASE) };
        uart.puts("Hello, RVOS!\n");

        if LOGGER.init().is_err() {
            uart.puts("logger already installed\n");
        }

        if let Err(e) = memory::page_init_from_linker() {
            error!("page_init failed: {e}");
            halt();
        }
        uart.puts("Page management initialized.\n");

        match selftest::run(&mut &PAGES, &mut uart) {
            Ok(report) => info!("self-test passed on {} pages", report.total_pages),
            Err(e) => error!("self-test failed: {e}"),
        }

        if log::log_enabled!(log::Level::Debug) {
            PAGES.with_allocator(|a| a.dump());
        }
        halt()
    }

    fn halt() -> ! {
        loop {
            unsafe { core::arch::asm!("wfi", options(nomem, nostack)) };
        }
    }

    #[panic_handler]
    fn panic(info: &core::panic::PanicInfo) -> ! {
        // SAFETY: as in `start_kernel`.
        let mut uart = unsafe { Uart::new(UART_BASE) };
        let _ = writeln!(SinkWriter(&mut uart), "\nkernel panic: {info}");
        halt()
    }
}

#[cfg(not(target_os = "none"))]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    hosted::run()
}

#[cfg(not(target_os = "none"))]
mod hosted {
    use kernel::config::KernelPageSize;
    use kernel::selftest;
    use kernel_alloc::{PageAllocator, PageDescriptor, PageRegion};
    use kernel_memory_addresses::PhysicalAddress;
    use kernel_uart::CharSink;
    use std::io::{self, Write};

    /// Where a small kernel image leaves the heap on QEMU virt.
    const HEAP_START: u64 = 0x8020_0000;
    const HEAP_PAGES: usize = 1024;

    /// Console over a host writer. The first write error is kept and later
    /// bytes are dropped.
    struct Console<W: Write> {
        out: W,
        error: Option<io::Error>,
    }

    impl<W: Write> Console<W> {
        const fn new(out: W) -> Self {
            Self { out, error: None }
        }

        fn finish(mut self) -> io::Result<()> {
            if let Some(e) = self.error.take() {
                return Err(e);
            }
            self.out.flush()
        }
    }

    impl<W: Write> CharSink for Console<W> {
        fn putc(&mut self, byte: u8) {
            if self.error.is_some() {
                return;
            }
            if let Err(e) = self.out.write_all(&[byte]) {
                self.error = Some(e);
            }
        }
    }

    pub fn run() -> Result<(), Box<dyn std::error::Error>> {
        let mut out = Console::new(io::stdout().lock());
        out.puts("Hello, RVOS!\n");

        // Only the bookkeeping is real; the simulated pages are never touched.
        let mut table = vec![PageDescriptor::new(); HEAP_PAGES];
        let region =
            PageRegion::<KernelPageSize>::with_pages(PhysicalAddress::new(HEAP_START), HEAP_PAGES)?;
        let mut pages = PageAllocator::new(region, &mut table)?;
        out.puts("Page management initialized.\n");

        selftest::run(&mut pages, &mut out)?;
        pages.verify()?;
        out.finish()?;
        Ok(())
    }

}

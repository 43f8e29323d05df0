use std::{env, path::PathBuf};

/// Start of RAM on the QEMU `virt` machine; QEMU jumps here with `-bios none`.
const RAM_BASE: u64 = 0x8000_0000;

/// RAM size the kernel is linked for (`qemu-system-riscv64 -m 128M`).
const RAM_SIZE: u64 = 128 * 1024 * 1024;

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let ld = manifest_dir.join("kernel.ld");
    println!("cargo:rerun-if-changed={}", ld.display());

    // Hosted builds are plain executables.
    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("none") {
        return;
    }

    assert_eq!(
        RAM_BASE & 0xfff,
        0,
        "RAM_BASE must be 4 KiB aligned (got {RAM_BASE:#x})"
    );
    assert_eq!(
        RAM_SIZE & 0xfff,
        0,
        "RAM_SIZE must be a whole number of 4 KiB pages (got {RAM_SIZE:#x})"
    );

    println!("cargo:rustc-link-arg-bins=-T{}", ld.display());
    println!("cargo:rustc-link-arg-bins=--defsym=RAM_BASE={RAM_BASE:#x}");
    println!("cargo:rustc-link-arg-bins=--defsym=RAM_SIZE={RAM_SIZE:#x}");
}

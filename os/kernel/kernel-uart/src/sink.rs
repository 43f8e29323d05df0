use core::fmt;

/// A byte-oriented character output.
///
/// Only [`putc`](Self::putc) talks to hardware; strings and numbers are built
/// on top of it.
pub trait CharSink {
    /// Emit one byte, waiting until the device accepts it.
    fn putc(&mut self, byte: u8);

    /// Emit every byte of `s` in order.
    fn puts(&mut self, s: &str) {
        for b in s.bytes() {
            self.putc(b);
        }
    }

    /// Emit `value` as `0x` followed by lowercase hex digits, without leading
    /// zeros. Zero prints as `0x0`.
    fn put_hex(&mut self, value: u64) {
        self.puts("0x");
        let digits = (u64::BITS - value.leading_zeros()).div_ceil(4).max(1);
        for shift in (0..digits).rev() {
            #[allow(clippy::cast_possible_truncation)]
            let nibble = ((value >> (shift * 4)) & 0xF) as u8;
            self.putc(match nibble {
                0..=9 => b'0' + nibble,
                _ => b'a' + nibble - 10,
            });
        }
    }
}

impl<S: CharSink + ?Sized> CharSink for &mut S {
    #[inline]
    fn putc(&mut self, byte: u8) {
        (**self).putc(byte);
    }
}

/// Adapts a [`CharSink`] to [`core::fmt::Write`] so `write!` works without allocation.
pub struct SinkWriter<'a, S: ?Sized>(pub &'a mut S);

impl<S: CharSink + ?Sized> fmt::Write for SinkWriter<'_, S> {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.puts(s);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write;

    impl CharSink for Vec<u8> {
        fn putc(&mut self, byte: u8) {
            self.push(byte);
        }
    }

    fn hex(value: u64) -> String {
        let mut out = Vec::new();
        out.put_hex(value);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn puts_emits_bytes_in_order() {
        let mut out = Vec::new();
        out.puts("Hello, RVOS!\n");
        assert_eq!(out, b"Hello, RVOS!\n");
    }

    #[test]
    fn put_hex_drops_leading_zeros() {
        assert_eq!(hex(0), "0x0");
        assert_eq!(hex(0x7), "0x7");
        assert_eq!(hex(0x10), "0x10");
        assert_eq!(hex(0x8020_1000), "0x80201000");
        assert_eq!(hex(0xdead_beef), "0xdeadbeef");
        assert_eq!(hex(u64::MAX), "0xffffffffffffffff");
    }

    #[test]
    fn writer_formats_through_the_sink() {
        let mut out = Vec::new();
        write!(SinkWriter(&mut out), "[{}] {}", "INFO", 42).unwrap();
        assert_eq!(out, b"[INFO] 42");
    }

    #[test]
    fn mutable_references_are_sinks() {
        fn greet(mut sink: impl CharSink) {
            sink.puts("ok");
        }
        let mut out = Vec::new();
        greet(&mut out);
        assert_eq!(out, b"ok");
    }
}

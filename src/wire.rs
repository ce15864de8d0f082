//! Big-endian byte codec shared by all GRAIL protocol faces
//!
//! Everything on the wire is network byte order. Strings travel as UTF-16BE
//! code units, either with a `u32` byte-length prefix ("sized") or running
//! to the end of the frame ("tail"). Byte blobs use the same sized/tail
//! split.
//!
//! Encoding appends to a plain `Vec<u8>`; every `push_*` function returns
//! the number of bytes it wrote so message builders can accumulate the
//! frame length as they go. Decoding goes through [`WireReader`], a
//! bounds-checked cursor over one complete frame: a read past the end of
//! the buffer pins the cursor, latches an out-of-range flag, and yields a
//! zero value instead of panicking. Decoders check the flag once, after the
//! last field.

/// Append a `u8`. Returns the number of bytes written.
pub fn push_u8(buf: &mut Vec<u8>, val: u8) -> usize {
    buf.push(val);
    1
}

/// Append a `u16` in big-endian order.
pub fn push_u16(buf: &mut Vec<u8>, val: u16) -> usize {
    buf.extend_from_slice(&val.to_be_bytes());
    2
}

/// Append a `u32` in big-endian order.
pub fn push_u32(buf: &mut Vec<u8>, val: u32) -> usize {
    buf.extend_from_slice(&val.to_be_bytes());
    4
}

/// Append an `i32` in big-endian order.
pub fn push_i32(buf: &mut Vec<u8>, val: i32) -> usize {
    buf.extend_from_slice(&val.to_be_bytes());
    4
}

/// Append a `u64` in big-endian order.
pub fn push_u64(buf: &mut Vec<u8>, val: u64) -> usize {
    buf.extend_from_slice(&val.to_be_bytes());
    8
}

/// Append an `i64` in big-endian order.
pub fn push_i64(buf: &mut Vec<u8>, val: i64) -> usize {
    buf.extend_from_slice(&val.to_be_bytes());
    8
}

/// Append an `f32` in big-endian (IEEE-754) order.
pub fn push_f32(buf: &mut Vec<u8>, val: f32) -> usize {
    buf.extend_from_slice(&val.to_be_bytes());
    4
}

/// Append a `u128` as two big-endian 64-bit halves, upper half first.
pub fn push_u128(buf: &mut Vec<u8>, val: u128) -> usize {
    buf.extend_from_slice(&val.to_be_bytes());
    16
}

/// Overwrite four bytes at `index` with a big-endian `u32`.
///
/// Message builders reserve the first four bytes of a frame and patch the
/// total length in here once the payload is complete.
pub fn put_u32_at(buf: &mut [u8], index: usize, val: u32) {
    buf[index..index + 4].copy_from_slice(&val.to_be_bytes());
}

/// Append a UTF-16BE string with a `u32` byte-length prefix.
pub fn push_sized_utf16(buf: &mut Vec<u8>, s: &str) -> usize {
    let start = buf.len();
    buf.extend_from_slice(&[0, 0, 0, 0]);
    let mut bytes = 0usize;
    for unit in s.encode_utf16() {
        bytes += push_u16(buf, unit);
    }
    put_u32_at(buf, start, bytes as u32);
    4 + bytes
}

/// Append a UTF-16BE string with no length prefix (tail position only).
pub fn push_utf16(buf: &mut Vec<u8>, s: &str) -> usize {
    let mut bytes = 0usize;
    for unit in s.encode_utf16() {
        bytes += push_u16(buf, unit);
    }
    bytes
}

/// Append a byte blob with a `u32` length prefix.
pub fn push_sized_bytes(buf: &mut Vec<u8>, data: &[u8]) -> usize {
    push_u32(buf, data.len() as u32);
    buf.extend_from_slice(data);
    4 + data.len()
}

/// Append a byte blob with no length prefix (tail position only).
pub fn push_bytes(buf: &mut Vec<u8>, data: &[u8]) -> usize {
    buf.extend_from_slice(data);
    data.len()
}

/// Bounds-checked cursor over one complete frame.
///
/// Reads never fail and never leave the buffer: a read that would pass the
/// end instead pins the cursor at the end, latches the out-of-range flag,
/// and returns a zero value. Every read against an exhausted buffer does
/// the same, so a decoder can read all of its fields unconditionally and
/// check [`WireReader::out_of_range`] once at the end.
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
    out_of_range: bool,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            out_of_range: false,
        }
    }

    /// True if any read tried to go beyond the end of the buffer.
    pub fn out_of_range(&self) -> bool {
        self.out_of_range
    }

    /// Current cursor offset from the start of the frame.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes between the cursor and the end of the frame.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Advance the cursor without interpreting the bytes.
    pub fn skip(&mut self, bytes: usize) {
        self.pos = (self.pos + bytes).min(self.buf.len());
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        if self.pos + N <= self.buf.len() {
            out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
            self.pos += N;
        } else {
            self.pos = self.buf.len();
            self.out_of_range = true;
        }
        out
    }

    pub fn read_u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    pub fn read_u16(&mut self) -> u16 {
        u16::from_be_bytes(self.take())
    }

    pub fn read_u32(&mut self) -> u32 {
        u32::from_be_bytes(self.take())
    }

    pub fn read_i32(&mut self) -> i32 {
        i32::from_be_bytes(self.take())
    }

    pub fn read_u64(&mut self) -> u64 {
        u64::from_be_bytes(self.take())
    }

    pub fn read_i64(&mut self) -> i64 {
        i64::from_be_bytes(self.take())
    }

    pub fn read_f32(&mut self) -> f32 {
        f32::from_be_bytes(self.take())
    }

    pub fn read_u128(&mut self) -> u128 {
        u128::from_be_bytes(self.take())
    }

    /// Read a `u32` byte length, then that many bytes as UTF-16BE.
    ///
    /// An odd length or a length past the end of the frame latches
    /// out-of-range and yields an empty string.
    pub fn read_sized_utf16(&mut self) -> String {
        let bytes = self.read_u32() as usize;
        self.read_utf16_units(bytes)
    }

    /// Read every remaining byte as UTF-16BE.
    pub fn read_tail_utf16(&mut self) -> String {
        let bytes = self.remaining();
        self.read_utf16_units(bytes)
    }

    fn read_utf16_units(&mut self, bytes: usize) -> String {
        if bytes % 2 != 0 || bytes > self.remaining() {
            self.pos = self.buf.len();
            self.out_of_range = true;
            return String::new();
        }
        let mut units = Vec::with_capacity(bytes / 2);
        for _ in 0..bytes / 2 {
            units.push(self.read_u16());
        }
        String::from_utf16_lossy(&units)
    }

    /// Read a `u32` byte length, then that many raw bytes.
    pub fn read_sized_bytes(&mut self) -> Vec<u8> {
        let bytes = self.read_u32() as usize;
        if bytes > self.remaining() {
            self.pos = self.buf.len();
            self.out_of_range = true;
            return Vec::new();
        }
        let out = self.buf[self.pos..self.pos + bytes].to_vec();
        self.pos += bytes;
        out
    }

    /// Read every remaining byte as a raw blob.
    pub fn read_tail_bytes(&mut self) -> Vec<u8> {
        let out = self.buf[self.pos..].to_vec();
        self.pos = self.buf.len();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_roundtrip() {
        let mut buf = Vec::new();
        assert_eq!(push_u8(&mut buf, 0xAB), 1);
        assert_eq!(push_u16(&mut buf, 0x1234), 2);
        assert_eq!(push_u32(&mut buf, 0xDEADBEEF), 4);
        assert_eq!(push_i32(&mut buf, -7), 4);
        assert_eq!(push_u64(&mut buf, 0x0102030405060708), 8);
        assert_eq!(push_i64(&mut buf, -1000), 8);
        assert_eq!(push_f32(&mut buf, -42.5), 4);
        assert_eq!(push_u128(&mut buf, (1u128 << 64) | 2), 16);

        let mut r = WireReader::new(&buf);
        assert_eq!(r.read_u8(), 0xAB);
        assert_eq!(r.read_u16(), 0x1234);
        assert_eq!(r.read_u32(), 0xDEADBEEF);
        assert_eq!(r.read_i32(), -7);
        assert_eq!(r.read_u64(), 0x0102030405060708);
        assert_eq!(r.read_i64(), -1000);
        assert_eq!(r.read_f32(), -42.5);
        assert_eq!(r.read_u128(), (1u128 << 64) | 2);
        assert!(!r.out_of_range());
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_big_endian_layout() {
        let mut buf = Vec::new();
        push_u32(&mut buf, 0x01020304);
        assert_eq!(buf, [0x01, 0x02, 0x03, 0x04]);

        buf.clear();
        push_u128(&mut buf, (0x0102030405060708u128 << 64) | 0x090A0B0C0D0E0F10);
        assert_eq!(&buf[..8], [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
        assert_eq!(&buf[8..], [0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, 0x10]);
    }

    #[test]
    fn test_read_past_end_pins_cursor() {
        let buf = [0x01, 0x02];
        let mut r = WireReader::new(&buf);
        assert_eq!(r.read_u32(), 0);
        assert!(r.out_of_range());
        assert_eq!(r.position(), buf.len());
        // Further reads keep returning zero without moving
        assert_eq!(r.read_u64(), 0);
        assert_eq!(r.read_u8(), 0);
        assert_eq!(r.position(), buf.len());
    }

    #[test]
    fn test_sized_utf16_roundtrip() {
        let mut buf = Vec::new();
        let written = push_sized_utf16(&mut buf, "lamp.kitchen");
        assert_eq!(written, 4 + 24);
        assert_eq!(&buf[..4], [0, 0, 0, 24]);

        let mut r = WireReader::new(&buf);
        assert_eq!(r.read_sized_utf16(), "lamp.kitchen");
        assert!(!r.out_of_range());
    }

    #[test]
    fn test_sized_utf16_non_ascii() {
        let mut buf = Vec::new();
        push_sized_utf16(&mut buf, "döner.🌍");
        let mut r = WireReader::new(&buf);
        assert_eq!(r.read_sized_utf16(), "döner.🌍");
        assert!(!r.out_of_range());
    }

    #[test]
    fn test_sized_utf16_odd_length_rejected() {
        let buf = [0, 0, 0, 3, 0x00, 0x61, 0x00];
        let mut r = WireReader::new(&buf);
        assert_eq!(r.read_sized_utf16(), "");
        assert!(r.out_of_range());
    }

    #[test]
    fn test_sized_utf16_truncated_rejected() {
        let buf = [0, 0, 0, 8, 0x00, 0x61];
        let mut r = WireReader::new(&buf);
        assert_eq!(r.read_sized_utf16(), "");
        assert!(r.out_of_range());
    }

    #[test]
    fn test_tail_utf16() {
        let mut buf = Vec::new();
        push_u8(&mut buf, 9);
        push_utf16(&mut buf, "origin.a");
        let mut r = WireReader::new(&buf);
        assert_eq!(r.read_u8(), 9);
        assert_eq!(r.read_tail_utf16(), "origin.a");
        assert!(!r.out_of_range());
    }

    #[test]
    fn test_tail_utf16_odd_remainder() {
        let buf = [0x00, 0x61, 0x00];
        let mut r = WireReader::new(&buf);
        assert_eq!(r.read_tail_utf16(), "");
        assert!(r.out_of_range());
    }

    #[test]
    fn test_sized_bytes_roundtrip() {
        let mut buf = Vec::new();
        push_sized_bytes(&mut buf, &[1, 2, 3]);
        push_sized_bytes(&mut buf, &[]);
        let mut r = WireReader::new(&buf);
        assert_eq!(r.read_sized_bytes(), vec![1, 2, 3]);
        assert_eq!(r.read_sized_bytes(), Vec::<u8>::new());
        assert!(!r.out_of_range());
    }

    #[test]
    fn test_sized_bytes_overrun_rejected() {
        let buf = [0, 0, 0, 10, 1, 2];
        let mut r = WireReader::new(&buf);
        assert_eq!(r.read_sized_bytes(), Vec::<u8>::new());
        assert!(r.out_of_range());
    }

    #[test]
    fn test_put_u32_at_patches_length() {
        let mut buf = vec![0u8; 4];
        push_u8(&mut buf, 0xFF);
        put_u32_at(&mut buf, 0, 1);
        assert_eq!(buf, [0, 0, 0, 1, 0xFF]);
    }
}

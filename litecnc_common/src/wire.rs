//! Bit-stream codec for FPGA transaction buffers.
//!
//! A transaction is the concatenation of fixed-width blocks in a stable
//! module order. Two kinds of block exist:
//!
//! - **Shared flag registers**: one bit per channel, packed MSB-first within
//!   each byte. Channel `i` lives in byte `i / 8` under mask `0x80 >> (i % 8)`.
//!   Bits beyond the channel count are zero. Width is `ceil(count / 8)`.
//! - **Records**: fixed-size groups of 32-bit fields in network byte order
//!   (most-significant byte first), see [`WireRecord`].
//!
//! ## Buffer ownership
//!
//! [`WireWriter`] and [`WireReader`] borrow a caller-owned buffer and advance
//! a cursor. They never allocate. The caller sizes the buffer from the board
//! configuration; running past its end is a layout bug and panics.

/// Width in bytes of a shared flag register holding `count` channels.
#[inline]
pub const fn shared_register_size(count: usize) -> usize {
    count.div_ceil(8)
}

/// Mask selecting channel `index` inside its register byte.
#[inline]
const fn flag_mask(index: usize) -> u8 {
    0x80 >> (index % 8)
}

/// A fixed-size record of 32-bit big-endian fields.
///
/// Every field is mandatory; `SIZE` is the exact byte width on the wire.
pub trait WireRecord: Sized {
    /// Encoded width in bytes.
    const SIZE: usize;

    /// Serialize into `out`, which is exactly `SIZE` bytes.
    fn encode(&self, out: &mut [u8]);

    /// Deserialize from `data`, which is exactly `SIZE` bytes.
    fn decode(data: &[u8]) -> Self;
}

/// Write a big-endian `u32` into the first four bytes of `out`.
#[inline]
pub fn put_u32(out: &mut [u8], value: u32) {
    out[..4].copy_from_slice(&value.to_be_bytes());
}

/// Read a big-endian `u32` from the first four bytes of `data`.
#[inline]
pub fn get_u32(data: &[u8]) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[..4]);
    u32::from_be_bytes(bytes)
}

/// Write a big-endian `i32` into the first four bytes of `out`.
#[inline]
pub fn put_i32(out: &mut [u8], value: i32) {
    out[..4].copy_from_slice(&value.to_be_bytes());
}

/// Read a big-endian `i32` from the first four bytes of `data`.
#[inline]
pub fn get_i32(data: &[u8]) -> i32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[..4]);
    i32::from_be_bytes(bytes)
}

// ─── Cursors ────────────────────────────────────────────────────────

/// Advancing writer over a caller-owned outbound buffer.
#[derive(Debug)]
pub struct WireWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> WireWriter<'a> {
    /// Start writing at the beginning of `buf`.
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes written so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left in the buffer.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Reserve the next `len` bytes and advance past them.
    #[inline]
    fn take(&mut self, len: usize) -> &mut [u8] {
        let start = self.pos;
        self.pos += len;
        &mut self.buf[start..self.pos]
    }

    /// Pack one flag per item into a shared register and advance by its width.
    ///
    /// The register bytes are cleared first, so padding is always zero even
    /// when the buffer was not zero-initialized.
    pub fn pack_flags<I>(&mut self, flags: I)
    where
        I: IntoIterator<Item = bool>,
        I::IntoIter: ExactSizeIterator,
    {
        let flags = flags.into_iter();
        let register = self.take(shared_register_size(flags.len()));
        register.fill(0);
        for (i, flag) in flags.enumerate() {
            if flag {
                register[i / 8] |= flag_mask(i);
            }
        }
    }

    /// Append a record and advance by its exact width.
    #[inline]
    pub fn put_record<R: WireRecord>(&mut self, record: &R) {
        record.encode(self.take(R::SIZE));
    }
}

/// Advancing reader over an inbound buffer.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    /// Start reading at the beginning of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left in the buffer.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[inline]
    fn take(&mut self, len: usize) -> &'a [u8] {
        let start = self.pos;
        self.pos += len;
        &self.buf[start..self.pos]
    }

    /// Unpack a shared register of `count` flags, calling `f(index, flag)`
    /// for every channel in order, and advance by the register width.
    pub fn unpack_flags<F>(&mut self, count: usize, mut f: F)
    where
        F: FnMut(usize, bool),
    {
        let register = self.take(shared_register_size(count));
        for i in 0..count {
            f(i, register[i / 8] & flag_mask(i) != 0);
        }
    }

    /// Consume one record.
    #[inline]
    pub fn get_record<R: WireRecord>(&mut self) -> R {
        R::decode(self.take(R::SIZE))
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

/// Widest code a GIF LZW stream can contain
pub const MAX_READ_BITS: u8 = 12;

/// Pulls variable width codes out of the concatenated image sub-blocks.
///
/// GIF packs codes least significant bit first: every source byte is shifted in above the bits
/// already buffered, and codes are taken from the bottom of the buffer.
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    // bits are consumed from the low end
    bitbuf: u32,
    bitcnt: u8,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            bitbuf: 0,
            bitcnt: 0,
        }
    }

    /// Returns the next `n` bits, or `None` once the source can't fill the request.
    ///
    /// Running out of bytes is how image data normally ends when the end code is missing, so it
    /// isn't an error.
    pub fn read_bits(&mut self, n: u8) -> Option<u16> {
        debug_assert!((1..=MAX_READ_BITS).contains(&n));
        while self.bitcnt < n {
            let byte = *self.data.get(self.pos)?;
            self.bitbuf |= (byte as u32) << self.bitcnt;
            self.pos += 1;
            self.bitcnt += 8;
        }
        let out = self.bitbuf & ((1 << n) - 1);
        self.bitbuf >>= n;
        self.bitcnt -= n;
        Some(out as u16)
    }

    /// Bytes not yet pulled into the bit buffer
    pub fn remaining_bytes(&self) -> usize {
        self.data.len() - self.pos
    }
}

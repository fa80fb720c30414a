use embedded_graphics::{pixelcolor::Rgb565, prelude::*};
use std::vec::Vec;
use weezl::{encode::Encoder, BitOrder};

use crate::{
    frame::Frame,
    header::{GraphicsControl, LocalImageDescriptor},
    lzw::LzwStatus,
    player::Timer,
    render::BlockSink,
};

/// Heap backed RGB565 framebuffer; draws outside the buffer are clipped.
pub(crate) struct Framebuffer {
    width: usize,
    height: usize,
    pixels: Vec<Rgb565>,
}

impl Framebuffer {
    pub const CLEAR: Rgb565 = Rgb565::MAGENTA;

    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![Self::CLEAR; width * height],
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> Rgb565 {
        self.pixels[y * self.width + x]
    }
}

impl DrawTarget for Framebuffer {
    type Error = std::convert::Infallible;
    type Color = Rgb565;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = embedded_graphics::Pixel<Rgb565>>,
    {
        for Pixel(p, c) in pixels {
            if p.x >= 0 && p.y >= 0 && (p.x as usize) < self.width && (p.y as usize) < self.height {
                self.pixels[p.y as usize * self.width + p.x as usize] = c;
            }
        }

        Ok(())
    }
}

impl OriginDimensions for Framebuffer {
    fn size(&self) -> Size {
        Size::new(self.width as u32, self.height as u32)
    }
}

pub(crate) struct RecordedBlock {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
    pub data: Vec<u8>,
}

/// Keeps every block it is handed
#[derive(Default)]
pub(crate) struct RecordingSink {
    pub blocks: Vec<RecordedBlock>,
    /// Fail every block after this many succeeded
    pub fail_after: Option<usize>,
}

impl RecordingSink {
    pub fn rects(&self) -> Vec<(i32, i32, i32, i32)> {
        self.blocks
            .iter()
            .map(|b| (b.x0, b.y0, b.x1, b.y1))
            .collect()
    }

    /// All received pixels, decoded from big endian
    pub fn pixels(&self) -> Vec<u16> {
        self.blocks
            .iter()
            .flat_map(|b| b.data.chunks_exact(2))
            .map(|px| u16::from_be_bytes([px[0], px[1]]))
            .collect()
    }
}

impl BlockSink for RecordingSink {
    type Error = ();

    fn block(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, data: &[u8]) -> Result<(), ()> {
        if self.fail_after.map_or(false, |n| self.blocks.len() >= n) {
            return Err(());
        }
        let area = (x1 - x0 + 1) * (y1 - y0 + 1);
        assert_eq!(data.len(), area as usize * 2, "block size doesn't match its rectangle");
        self.blocks.push(RecordedBlock {
            x0,
            y0,
            x1,
            y1,
            data: data.to_vec(),
        });
        Ok(())
    }
}

/// Clock that moves `step` ms per reading and records sleeps instead of sleeping
pub(crate) struct FakeTimer {
    now: u64,
    step: u64,
    pub sleeps: Vec<u32>,
}

impl FakeTimer {
    pub fn new(step: u64) -> Self {
        Self {
            now: 0,
            step,
            sleeps: Vec::new(),
        }
    }
}

impl Timer for FakeTimer {
    fn now_ms(&mut self) -> u64 {
        self.now += self.step;
        self.now
    }

    fn sleep_ms(&mut self, ms: u32) {
        self.now += ms as u64;
        self.sleeps.push(ms);
    }
}

pub(crate) fn frame_with(
    origin: Point,
    size: Size,
    interlaced: bool,
    transparent_idx: Option<u8>,
    indices: Vec<u8>,
) -> Frame {
    let descriptor = LocalImageDescriptor {
        origin,
        size,
        interlaced,
        local_table: None,
    };
    let control = GraphicsControl {
        delay_ms: 0,
        transparent_idx,
    };
    Frame::new(descriptor, control, indices, LzwStatus::Done)
}

/// Deterministic xorshift indices below `1 << bits`, in short runs so the dictionary gets
/// repeated strings as well as noise
pub(crate) fn pseudo_random_indices(len: usize, bits: u8, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(0x9e37_79b9) | 1;
    let mask = ((1u32 << bits) - 1) as u8;
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let value = (state >> 24) as u8 & mask;
        let run = 1 + (state & 3) as usize;
        for _ in 0..run.min(len - out.len()) {
            out.push(value);
        }
    }
    out
}

/// GIF flavoured LZW from weezl, including the leading clear and trailing end code
pub(crate) fn reference_encode(min_code_size: u8, indices: &[u8]) -> Vec<u8> {
    Encoder::new(BitOrder::Lsb, min_code_size)
        .encode(indices)
        .unwrap()
}

/// Smallest table size field that holds `len` entries
fn table_bits(len: usize) -> u8 {
    let mut bits = 0;
    while (2usize << bits) < len {
        bits += 1;
    }
    bits
}

fn push_table(bytes: &mut Vec<u8>, table: &[[u8; 3]]) {
    let entries = 2usize << table_bits(table.len());
    for idx in 0..entries {
        bytes.extend_from_slice(table.get(idx).unwrap_or(&[0, 0, 0]));
    }
}

fn push_sub_blocks(bytes: &mut Vec<u8>, data: &[u8]) {
    for chunk in data.chunks(255) {
        bytes.push(chunk.len() as u8);
        bytes.extend_from_slice(chunk);
    }
    bytes.push(0);
}

pub(crate) struct ImageSpec<'a> {
    left: u16,
    top: u16,
    width: u16,
    height: u16,
    interlaced: bool,
    local_table: Option<&'a [[u8; 3]]>,
    min_code_size: u8,
    indices: &'a [u8],
    lzw_data: Option<&'a [u8]>,
}

impl<'a> ImageSpec<'a> {
    pub fn new(width: u16, height: u16, indices: &'a [u8]) -> Self {
        Self {
            left: 0,
            top: 0,
            width,
            height,
            interlaced: false,
            local_table: None,
            min_code_size: 2,
            indices,
            lzw_data: None,
        }
    }

    pub fn at(mut self, left: u16, top: u16) -> Self {
        self.left = left;
        self.top = top;
        self
    }

    /// Only sets the flag; `indices` must already be in interlaced row order
    pub fn interlaced(mut self) -> Self {
        self.interlaced = true;
        self
    }

    pub fn local_table(mut self, table: &'a [[u8; 3]]) -> Self {
        self.local_table = Some(table);
        self
    }

    pub fn min_code_size(mut self, size: u8) -> Self {
        self.min_code_size = size;
        self
    }

    /// Writes `data` as the image data instead of encoding `indices`
    pub fn lzw_data(mut self, data: &'a [u8]) -> Self {
        self.lzw_data = Some(data);
        self
    }
}

/// Assembles GIF89a streams block by block
pub(crate) struct GifBuilder {
    bytes: Vec<u8>,
}

impl GifBuilder {
    pub fn new(width: u16, height: u16, global_table: Option<&[[u8; 3]]>) -> Self {
        let mut bytes = b"GIF89a".to_vec();
        bytes.extend_from_slice(&width.to_le_bytes());
        bytes.extend_from_slice(&height.to_le_bytes());
        let packed = match global_table {
            Some(table) => 0x80 | 0x70 | table_bits(table.len()),
            None => 0,
        };
        bytes.extend_from_slice(&[packed, 0, 0]);
        if let Some(table) = global_table {
            push_table(&mut bytes, table);
        }
        Self { bytes }
    }

    pub fn background_index(mut self, index: u8) -> Self {
        self.bytes[11] = index;
        self
    }

    pub fn graphics_control(mut self, delay_cs: u16, transparent: Option<u8>) -> Self {
        let packed = if transparent.is_some() { 0b0000_0101 } else { 0b0000_0100 };
        self.bytes.extend_from_slice(&[0x21, 0xf9, 4, packed]);
        self.bytes.extend_from_slice(&delay_cs.to_le_bytes());
        self.bytes.extend_from_slice(&[transparent.unwrap_or(0), 0]);
        self
    }

    pub fn comment(mut self, text: &[u8]) -> Self {
        self.bytes.extend_from_slice(&[0x21, 0xfe]);
        push_sub_blocks(&mut self.bytes, text);
        self
    }

    pub fn netscape_loop(mut self, count: u16) -> Self {
        self.bytes.extend_from_slice(&[0x21, 0xff, 11]);
        self.bytes.extend_from_slice(b"NETSCAPE2.0");
        self.bytes.extend_from_slice(&[3, 1]);
        self.bytes.extend_from_slice(&count.to_le_bytes());
        self.bytes.push(0);
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn image(mut self, image: ImageSpec<'_>) -> Self {
        self.bytes.push(0x2c);
        for field in [image.left, image.top, image.width, image.height] {
            self.bytes.extend_from_slice(&field.to_le_bytes());
        }
        let mut packed = if image.interlaced { 0x40 } else { 0 };
        if let Some(table) = image.local_table {
            packed |= 0x80 | table_bits(table.len());
        }
        self.bytes.push(packed);
        if let Some(table) = image.local_table {
            push_table(&mut self.bytes, table);
        }
        self.bytes.push(image.min_code_size);
        match image.lzw_data {
            Some(data) => push_sub_blocks(&mut self.bytes, data),
            None => {
                let encoded = reference_encode(image.min_code_size, image.indices);
                push_sub_blocks(&mut self.bytes, &encoded);
            }
        }
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.bytes.push(0x3b);
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_output_is_readable_by_gif() {
        let indices = pseudo_random_indices(300, 3, 1);
        let palette: Vec<[u8; 3]> = (0..8).map(|i| [i, i, i]).collect();
        let gif = GifBuilder::new(20, 15, Some(&palette))
            .comment(b"built for tests")
            .image(ImageSpec::new(20, 15, &indices).min_code_size(3))
            .finish();

        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::Indexed);
        let mut decoder = options.read_info(&gif[..]).unwrap();
        let frame = decoder.read_next_frame().unwrap().unwrap();
        assert_eq!(&frame.buffer[..], &indices[..]);
    }

    #[test]
    fn table_sizes() {
        assert_eq!(table_bits(1), 0);
        assert_eq!(table_bits(2), 0);
        assert_eq!(table_bits(3), 1);
        assert_eq!(table_bits(16), 3);
        assert_eq!(table_bits(256), 7);
    }
}

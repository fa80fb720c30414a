use alloc::vec::Vec;
use embedded_graphics::{
    pixelcolor::{
        raw::{RawData, RawU16},
        Rgb565,
    },
    prelude::*,
    primitives::Rectangle,
};
use smallvec::SmallVec;

use crate::frame::Frame;

/// Scanlines per blit unless configured otherwise
pub const DEFAULT_CHUNK_LINES: usize = 8;

/// Bytes per pixel in the packed display format
const BYTES_PER_PIXEL: usize = 2;

/// Truncating RGB888 to RGB565 conversion
pub fn color565(r: u8, g: u8, b: u8) -> Rgb565 {
    Rgb565::new(r >> 3, g >> 2, b >> 3)
}

/// The 16 bit value a display expects for `color`
pub fn pack565(color: Rgb565) -> u16 {
    RawU16::from(color).into_inner()
}

/// A color table already converted to packed RGB565.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NativePalette {
    colors: SmallVec<[u16; 256]>,
}

impl NativePalette {
    pub fn new<I: IntoIterator<Item = Rgb565>>(colors: I) -> Self {
        Self {
            colors: colors.into_iter().map(pack565).collect(),
        }
    }

    pub fn get(&self, index: u8) -> Option<u16> {
        self.colors.get(index as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

/// Something that can blit a rectangle of packed pixels, e.g. a SPI display driver.
pub trait BlockSink {
    type Error;

    /// Writes `data` (big endian RGB565, row major) into the inclusive rectangle
    /// `(x0, y0)..=(x1, y1)`.
    fn block(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, data: &[u8]) -> Result<(), Self::Error>;
}

impl<K: BlockSink + ?Sized> BlockSink for &mut K {
    type Error = K::Error;

    fn block(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, data: &[u8]) -> Result<(), Self::Error> {
        (**self).block(x0, y0, x1, y1, data)
    }
}

/// Lets any embedded-graphics draw target receive blocks.
pub struct DrawTargetSink<D> {
    target: D,
}

impl<D> DrawTargetSink<D> {
    pub fn new(target: D) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &D {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut D {
        &mut self.target
    }

    pub fn into_inner(self) -> D {
        self.target
    }
}

impl<D> BlockSink for DrawTargetSink<D>
where
    D: DrawTarget<Color = Rgb565>,
{
    type Error = D::Error;

    fn block(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, data: &[u8]) -> Result<(), Self::Error> {
        let area = Rectangle::with_corners(Point::new(x0, y0), Point::new(x1, y1));
        let colors = data
            .chunks_exact(BYTES_PER_PIXEL)
            .map(|px| Rgb565::from(RawU16::new(u16::from_be_bytes([px[0], px[1]]))));
        self.target.fill_contiguous(&area, colors)
    }
}

/// Rows in the order an interlaced image stores them: every 8th row from 0, every 8th from 4,
/// every 4th from 2, then every odd row.
pub fn interlace_rows(height: usize) -> impl Iterator<Item = usize> {
    (0..height)
        .step_by(8)
        .chain((4..height).step_by(8))
        .chain((2..height).step_by(4))
        .chain((1..height).step_by(2))
}

/// Stored row drawn at display row `row` of an interlaced frame: the `row`-th entry of
/// [`interlace_rows`], worked out from the pass sizes instead of a lookup table.
pub fn interlace_row(row: usize, height: usize) -> usize {
    let pass1 = (height + 7) / 8;
    let pass2 = (height + 3) / 8;
    let pass3 = (height + 1) / 4;
    if row < pass1 {
        row * 8
    } else if row < pass1 + pass2 {
        4 + (row - pass1) * 8
    } else if row < pass1 + pass2 + pass3 {
        2 + (row - pass1 - pass2) * 4
    } else {
        1 + (row - pass1 - pass2 - pass3) * 2
    }
}

/// Per pixel color resolution for one frame.
pub(crate) struct PixelResolver<'a> {
    indices: &'a [u8],
    width: usize,
    height: usize,
    interlaced: bool,
    transparent: Option<u8>,
    palette: &'a NativePalette,
    background: u16,
}

impl<'a> PixelResolver<'a> {
    pub(crate) fn new(frame: &'a Frame, palette: &'a NativePalette, background: Rgb565) -> Self {
        let size = frame.img_size();
        Self {
            indices: frame.indices(),
            width: size.width as usize,
            height: size.height as usize,
            interlaced: frame.interlaced(),
            transparent: frame.transparent_idx(),
            palette,
            background: pack565(background),
        }
    }

    /// Rows worth drawing. A short non-interlaced index buffer stops at its last row.
    pub(crate) fn drawable_rows(&self) -> usize {
        if self.width == 0 || self.indices.is_empty() {
            0
        } else if self.interlaced {
            self.height
        } else {
            self.height.min((self.indices.len() + self.width - 1) / self.width)
        }
    }

    fn resolve(&self, index: Option<u8>) -> u16 {
        match index {
            Some(idx) if Some(idx) != self.transparent => {
                self.palette.get(idx).unwrap_or(self.background)
            }
            _ => self.background,
        }
    }

    /// Packed colors of display row `row`
    pub(crate) fn row(&self, row: usize) -> impl Iterator<Item = u16> + '_ {
        let source = if self.interlaced {
            interlace_row(row, self.height)
        } else {
            row
        };
        let start = source * self.width;
        (start..start + self.width).map(move |idx| self.resolve(self.indices.get(idx).copied()))
    }
}

/// Streams decoded frames to a [`BlockSink`] a few scanlines at a time.
///
/// The only pixel buffer is one chunk: frame width × chunk lines × 2 bytes, reused between chunks
/// and frames.
pub struct FrameRenderer {
    chunk_lines: usize,
    buffer: Vec<u8>,
}

impl Default for FrameRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_LINES)
    }
}

impl FrameRenderer {
    pub fn new(chunk_lines: usize) -> Self {
        Self {
            chunk_lines: chunk_lines.max(1),
            buffer: Vec::new(),
        }
    }

    pub fn chunk_lines(&self) -> usize {
        self.chunk_lines
    }

    /// Bytes currently held by the chunk buffer
    pub fn buffer_capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Frees the chunk buffer; the next frame allocates a fresh one
    pub fn release(&mut self) {
        self.buffer = Vec::new();
    }

    /// Draws `frame` at `offset` plus the frame's own position within the canvas.
    ///
    /// Transparent pixels, missing indices and indices past the end of `palette` all come out as
    /// `background`. Returns the number of blocks handed to the sink.
    pub fn draw_frame<K: BlockSink>(
        &mut self,
        sink: &mut K,
        frame: &Frame,
        offset: Point,
        background: Rgb565,
        palette: &NativePalette,
    ) -> Result<usize, K::Error> {
        let pixels = PixelResolver::new(frame, palette, background);
        let rows = pixels.drawable_rows();
        let width = frame.img_size().width as usize;
        if rows == 0 {
            return Ok(0);
        }

        let origin = offset + frame.origin();
        let chunk_bytes = width * self.chunk_lines.min(rows) * BYTES_PER_PIXEL;
        if self.buffer.len() < chunk_bytes {
            self.buffer.resize(chunk_bytes, 0);
        }

        let mut blocks = 0;
        let mut y_out = 0;
        while y_out < rows {
            let chunk_rows = self.chunk_lines.min(rows - y_out);
            let len = width * chunk_rows * BYTES_PER_PIXEL;
            let chunk = &mut self.buffer[..len];
            for (row, out) in (y_out..y_out + chunk_rows).zip(chunk.chunks_exact_mut(width * BYTES_PER_PIXEL)) {
                for (color, px) in pixels.row(row).zip(out.chunks_exact_mut(BYTES_PER_PIXEL)) {
                    px.copy_from_slice(&color.to_be_bytes());
                }
            }

            let top = origin.y + y_out as i32;
            sink.block(
                origin.x,
                top,
                origin.x + width as i32 - 1,
                top + chunk_rows as i32 - 1,
                chunk,
            )?;
            blocks += 1;
            y_out += chunk_rows;
        }
        log::trace!("drew {}x{} frame in {} blocks", width, rows, blocks);
        Ok(blocks)
    }
}

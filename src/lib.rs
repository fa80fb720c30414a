//! A small GIF decoder and player for displays that can't hold a whole frame in RAM.
//!
//! Frames are decoded one at a time into palette indices and then pushed to the display a few
//! scanlines at a time, so the only pixel buffer is `frame width × chunk lines × 2` bytes of
//! RGB565. Output goes to anything implementing [`BlockSink`] (a "write this rectangle" display
//! driver), or to an [`embedded_graphics`] [`DrawTarget`] through [`DrawTargetSink`] or
//! [`FrameImage`].
//!
//! ```ignore
//! let mut player = GifPlayer::new(display, timer);
//! player.play(SeekableSliceIter::new(include_bytes!("eye.gif")), &PlayOptions::default())?;
//! ```
//!
//! The pieces can also be used on their own:
//!
//! - [`GifFrameStreamer`] walks the block structure and yields decoded [`Frame`]s lazily,
//! - [`decode_lzw`] and [`LzwDecoder`] decompress a single image's data,
//! - [`FrameRenderer`] maps indices to colors and streams chunks to a sink.
//!
//! Disposal methods are not applied; each frame is drawn over whatever is on screen.
//!
//! Enable the `std` feature for [`FileSource`] and [`StdTimer`].
//!
//! [`DrawTarget`]: embedded_graphics::draw_target::DrawTarget
#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

use embedded_graphics::{
    pixelcolor::{raw::RawU16, Rgb565},
    prelude::*,
    primitives::Rectangle,
};

mod bit_reader;
mod common;
mod frame;
mod header;
mod iterators;
mod lzw;
mod player;
mod render;
#[cfg(test)]
mod test_utils;

pub use bit_reader::BitReader;
pub use common::{Block, ExtensionLabel, ParseError};
pub use frame::{Frame, GifFrameStreamer};
pub use header::{
    ColorTable, GraphicsControl, GraphicsControlRecord, Header, LocalImageDescriptor, Version,
};
#[cfg(feature = "std")]
pub use iterators::FileSource;
pub use iterators::{ByteIterator, SeekableIter, SeekableSliceIter};
pub use lzw::{decode as decode_lzw, Dictionary, InvalidCodeSize, LzwDecoder, LzwStatus, MAX_CODES};
#[cfg(feature = "std")]
pub use player::StdTimer;
pub use player::{
    remaining_delay, FrameInfo, GifPlayer, PlayError, PlayOptions, PlaybackSummary, PlayerConfig,
    Timer, DEFAULT_MIN_DELAY_MS,
};
pub use render::{
    color565, interlace_row, interlace_rows, pack565, BlockSink, DrawTargetSink,
    FrameRenderer, NativePalette, DEFAULT_CHUNK_LINES,
};

use render::PixelResolver;

/// A decoded frame as an embedded-graphics image, drawn at its own top left corner.
///
/// Position it with `Image::new(&image, canvas_origin + frame.origin())`.
pub struct FrameImage<'a> {
    frame: &'a Frame,
    palette: &'a NativePalette,
    background: Rgb565,
}

impl<'a> FrameImage<'a> {
    pub fn new(frame: &'a Frame, palette: &'a NativePalette, background: Rgb565) -> Self {
        Self {
            frame,
            palette,
            background,
        }
    }
}

impl ImageDrawable for FrameImage<'_> {
    type Color = Rgb565;

    fn draw<D>(&self, target: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb565>,
    {
        let pixels = PixelResolver::new(self.frame, self.palette, self.background);
        let rows = pixels.drawable_rows();
        let area = Rectangle::new(
            Point::zero(),
            Size::new(self.frame.img_size().width, rows as u32),
        );
        let pixels = &pixels;
        let colors = (0..rows)
            .flat_map(move |row| pixels.row(row))
            .map(|packed| Rgb565::from(RawU16::new(packed)));
        target.fill_contiguous(&area, colors)
    }

    fn draw_sub_image<D>(&self, target: &mut D, area: &Rectangle) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Self::Color>,
    {
        self.draw(&mut target.translated(-area.top_left).clipped(area))
    }
}

impl OriginDimensions for FrameImage<'_> {
    fn size(&self) -> Size {
        self.frame.img_size()
    }
}

use core::ops::{BitAnd, Shr};

use alloc::vec::Vec;
use embedded_graphics::{
    pixelcolor::{Rgb565, Rgb888},
    prelude::*,
    primitives::Rectangle,
};
use smallvec::SmallVec;

use crate::{
    common::ParseError,
    iterators::{ByteIterator, SeekableIter},
    render::{color565, NativePalette},
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Version {
    V87a,
    V89a,
}

/// Header and logical screen descriptor, read once per stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub version: Version,
    /// Canvas size in pixels.
    pub image_size: Size,
    /// Index into the global table of the background color
    pub background_index: u8,
    /// Global color table (if it exists)
    pub global_table: Option<ColorTable>,
}

impl Header {
    pub fn parser<S: SeekableIter>(raw_header: &mut ByteIterator<S>) -> Result<Header, ParseError> {
        let name: [u8; 6] = raw_header.take_arr()?;
        let version = match &name {
            b"GIF87a" => Version::V87a,
            b"GIF89a" => Version::V89a,
            _ => return Err(ParseError::BadGifFile),
        };

        let width = raw_header.take_u16_le()? as u32;
        let height = raw_header.take_u16_le()? as u32;
        let packed = raw_header.take_byte()?;
        let background_index = raw_header.take_byte()?;
        // pixel aspect ratio
        raw_header.take_byte()?;

        let global_table = if packed.bitand(0x80) == 0x80 {
            Some(ColorTable::new(table_len(packed), raw_header)?)
        } else {
            None
        };

        Ok(Header {
            version,
            image_size: Size { width, height },
            background_index,
            global_table,
        })
    }

    /// The global table entry at the background index, when there is one
    pub fn background_color(&self) -> Option<Rgb565> {
        self.global_table
            .as_ref()?
            .get(self.background_index)
            .map(|rgb| color565(rgb.r(), rgb.g(), rgb.b()))
    }
}

/// `2^(N+1)` entries from the low three bits of a packed descriptor byte
fn table_len(packed: u8) -> u16 {
    1 << (packed.bitand(0x07) + 1)
}

/// Palette of RGB triplets; its length is a power of two between 2 and 256.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColorTable {
    table: SmallVec<[Rgb888; 256]>,
}

impl ColorTable {
    pub fn new<S: SeekableIter>(
        len: u16,
        iter: &mut ByteIterator<S>,
    ) -> Result<Self, ParseError> {
        let mut table = SmallVec::with_capacity(len as usize);
        for _ in 0..len {
            let [r, g, b] = iter.take_arr()?;
            table.push(Rgb888::new(r, g, b));
        }
        Ok(Self { table })
    }

    pub fn from_rgb(entries: &[[u8; 3]]) -> Self {
        Self {
            table: entries
                .iter()
                .map(|&[r, g, b]| Rgb888::new(r, g, b))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn get(&self, index: u8) -> Option<Rgb888> {
        self.table.get(index as usize).copied()
    }

    /// Converts every entry to packed RGB565 once, ahead of rendering
    pub fn to_native(&self) -> NativePalette {
        NativePalette::new(
            self.table
                .iter()
                .map(|rgb| color565(rgb.r(), rgb.g(), rgb.b())),
        )
    }
}

/// Transient state from a graphic control extension, consumed by the next image.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct GraphicsControl {
    /// Delay before the next frame, in milliseconds
    pub delay_ms: u32,
    /// Table index for a transparent color
    pub transparent_idx: Option<u8>,
}

/// Outcome of reading a graphic control extension.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GraphicsControlRecord {
    Valid(GraphicsControl),
    /// The block didn't declare the standard 4 byte payload. Its declared bytes and any trailing
    /// sub-blocks were skipped and nothing was applied.
    Malformed { declared_len: u8 },
}

impl GraphicsControl {
    pub fn parse<S: SeekableIter>(
        raw_header: &mut ByteIterator<S>,
    ) -> Result<GraphicsControlRecord, ParseError> {
        let len = raw_header.take_byte()?;
        if len != 4 {
            raw_header.seek_by(len as usize)?;
            skip_sub_blocks(raw_header)?;
            return Ok(GraphicsControlRecord::Malformed { declared_len: len });
        }

        let ctrl = raw_header.take_byte()?;
        // hundredths of a second
        let delay_time = raw_header.take_u16_le()?;
        let transparent_idx = raw_header.take_byte()?;
        // block terminator
        raw_header.take_byte()?;

        Ok(GraphicsControlRecord::Valid(GraphicsControl {
            delay_ms: delay_time as u32 * 10,
            transparent_idx: ctrl.bitand(1).eq(&1).then_some(transparent_idx),
        }))
    }
}

/// Image descriptor fields plus the optional local color table that follows it.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalImageDescriptor {
    pub origin: Point,
    pub size: Size,
    pub interlaced: bool,
    pub local_table: Option<ColorTable>,
}

impl LocalImageDescriptor {
    pub fn parser<S: SeekableIter>(
        raw_header: &mut ByteIterator<S>,
    ) -> Result<LocalImageDescriptor, ParseError> {
        let left = raw_header.take_u16_le()? as i32;
        let top = raw_header.take_u16_le()? as i32;
        let width = raw_header.take_u16_le()? as u32;
        let height = raw_header.take_u16_le()? as u32;

        let packed = raw_header.take_byte()?;
        let interlaced = packed.bitand(0x40) == 0x40;
        let local_table = if packed.shr(7u8) == 1 {
            Some(ColorTable::new(table_len(packed), raw_header)?)
        } else {
            None
        };

        Ok(Self {
            origin: Point::new(left, top),
            size: Size::new(width, height),
            interlaced,
            local_table,
        })
    }

    pub fn bounding_box(&self) -> Rectangle {
        Rectangle::new(self.origin, self.size)
    }

    pub fn num_pixels(&self) -> usize {
        self.size.width as usize * self.size.height as usize
    }
}

/// Skips a chain of length prefixed sub-blocks up to and including the empty terminator
pub fn skip_sub_blocks<S: SeekableIter>(
    raw_header: &mut ByteIterator<S>,
) -> Result<(), ParseError> {
    loop {
        match raw_header.take_byte()? {
            0 => return Ok(()),
            len => raw_header.seek_by(len as usize)?,
        }
    }
}

/// Image data gathered from a sub-block chain.
pub struct SubBlockData {
    pub data: Vec<u8>,
    /// The stream ended before the zero length terminator
    pub truncated: bool,
}

/// Concatenates a sub-block chain. Running out of bytes keeps whatever was read.
pub fn read_sub_blocks<S: SeekableIter>(raw_header: &mut ByteIterator<S>) -> SubBlockData {
    let mut data = Vec::new();
    loop {
        let len = match raw_header.next_byte() {
            Some(0) => return SubBlockData { data, truncated: false },
            Some(len) => len as usize,
            None => return SubBlockData { data, truncated: true },
        };
        data.reserve(len);
        for _ in 0..len {
            match raw_header.next_byte() {
                Some(byte) => data.push(byte),
                None => return SubBlockData { data, truncated: true },
            }
        }
    }
}

use alloc::vec::Vec;
use embedded_graphics::{
    prelude::{Point, Size},
    primitives::Rectangle,
};

use crate::{
    common::{Block, ExtensionLabel, ParseError},
    header::{
        read_sub_blocks, skip_sub_blocks, ColorTable, GraphicsControl, GraphicsControlRecord,
        Header, LocalImageDescriptor,
    },
    iterators::{ByteIterator, SeekableIter, SeekableSliceIter},
    lzw::{self, LzwStatus},
};

/// One decoded image block.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    descriptor: LocalImageDescriptor,
    control: GraphicsControl,
    indices: Vec<u8>,
    status: LzwStatus,
}

impl Frame {
    pub fn new(
        descriptor: LocalImageDescriptor,
        control: GraphicsControl,
        indices: Vec<u8>,
        status: LzwStatus,
    ) -> Self {
        Self {
            descriptor,
            control,
            indices,
            status,
        }
    }

    pub fn frame_area(&self) -> Rectangle {
        self.descriptor.bounding_box()
    }

    pub fn img_size(&self) -> Size {
        self.descriptor.size
    }

    /// Position within the logical screen
    pub fn origin(&self) -> Point {
        self.descriptor.origin
    }

    pub fn num_pixels(&self) -> usize {
        self.descriptor.num_pixels()
    }

    pub fn interlaced(&self) -> bool {
        self.descriptor.interlaced
    }

    /// Amount of time to delay until the next frame
    pub fn delay_ms(&self) -> u32 {
        self.control.delay_ms
    }

    pub fn transparent_idx(&self) -> Option<u8> {
        self.control.transparent_idx
    }

    /// Palette indices, row by row in stream order. Shorter than `num_pixels` if the image data
    /// was corrupt or truncated.
    pub fn indices(&self) -> &[u8] {
        &self.indices
    }

    pub fn lzw_status(&self) -> LzwStatus {
        self.status
    }

    pub fn local_table(&self) -> Option<&ColorTable> {
        self.descriptor.local_table.as_ref()
    }

    /// The local table if the frame has one, otherwise `global`
    pub fn color_table<'a>(&'a self, global: Option<&'a ColorTable>) -> Option<&'a ColorTable> {
        self.local_table().or(global)
    }
}

/// Lazily decodes frames from a byte source, one image block per `next()`.
///
/// Fatal problems (an unknown block separator) are yielded once as `Err` and end the sequence.
/// A stream that runs out early just ends. [`reset`](Self::reset) restarts the sequence from
/// the top of the source, which yields the same frames again.
pub struct GifFrameStreamer<S: SeekableIter> {
    header: Header,
    bytes: ByteIterator<S>,
    /// Graphic control state waiting for the next image
    control: GraphicsControl,
    frame_offset: usize,
    done: bool,
}

impl<'iter> GifFrameStreamer<SeekableSliceIter<'iter>> {
    pub fn from_slice(slice: &'iter [u8]) -> Result<Self, ParseError> {
        Self::new(SeekableSliceIter::new(slice))
    }
}

impl<S: SeekableIter> GifFrameStreamer<S> {
    /// Reads the header and logical screen descriptor. Bad magic bytes fail here.
    pub fn new(source: S) -> Result<Self, ParseError> {
        let mut bytes = ByteIterator::new(source);
        let header = Header::parser(&mut bytes)?;
        log::debug!(
            "{:?} stream, {}x{} canvas, global table: {}",
            header.version,
            header.image_size.width,
            header.image_size.height,
            header.global_table.is_some()
        );
        Ok(Self {
            header,
            bytes,
            control: GraphicsControl::default(),
            frame_offset: 0,
            done: false,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn base_size(&self) -> Size {
        self.header.image_size
    }

    pub fn global_table(&self) -> Option<&ColorTable> {
        self.header.global_table.as_ref()
    }

    /// Frames produced since the start of the current pass
    pub fn frames_read(&self) -> usize {
        self.frame_offset
    }

    /// Starts a new pass from the first byte of the source
    pub fn reset(&mut self) -> Result<(), ParseError> {
        self.bytes.rewind()?;
        self.header = Header::parser(&mut self.bytes)?;
        self.control = GraphicsControl::default();
        self.frame_offset = 0;
        self.done = false;
        Ok(())
    }

    /// Hands back the byte source
    pub fn into_inner(self) -> S {
        self.bytes.into_inner()
    }

    pub fn next_frame(&mut self) -> Result<Option<Frame>, ParseError> {
        if self.done {
            return Ok(None);
        }
        match self.advance() {
            Ok(Some(frame)) => {
                self.frame_offset += 1;
                Ok(Some(frame))
            }
            Ok(None) => {
                self.done = true;
                Ok(None)
            }
            Err(ParseError::UnexpectedEof) => {
                log::warn!(
                    "stream truncated at byte {} after {} frames",
                    self.bytes.get_offset(),
                    self.frame_offset
                );
                self.done = true;
                Ok(None)
            }
            Err(err) => {
                self.done = true;
                Err(err)
            }
        }
    }

    fn advance(&mut self) -> Result<Option<Frame>, ParseError> {
        loop {
            let separator = match self.bytes.next_byte() {
                Some(byte) => byte,
                None => return Err(ParseError::UnexpectedEof),
            };
            match Block::from_u8(separator)? {
                Block::Trailer => {
                    log::debug!("trailer after {} frames", self.frame_offset);
                    return Ok(None);
                }
                Block::Extension => self.parse_extension()?,
                Block::Image => return self.parse_image().map(Some),
            }
        }
    }

    fn parse_extension(&mut self) -> Result<(), ParseError> {
        let label = self.bytes.take_byte()?;
        match ExtensionLabel::from_u8(label) {
            Some(ExtensionLabel::Graphics) => match GraphicsControl::parse(&mut self.bytes)? {
                GraphicsControlRecord::Valid(control) => {
                    log::trace!("graphics control at {}: {:?}", self.bytes.get_offset(), control);
                    self.control = control;
                }
                GraphicsControlRecord::Malformed { declared_len } => {
                    log::warn!(
                        "skipped graphics control declaring {} bytes at {}",
                        declared_len,
                        self.bytes.get_offset()
                    );
                }
            },
            extension => {
                log::trace!(
                    "skipping extension {:?} (0x{:02x}) at {}",
                    extension,
                    label,
                    self.bytes.get_offset()
                );
                skip_sub_blocks(&mut self.bytes)?;
            }
        }
        Ok(())
    }

    fn parse_image(&mut self) -> Result<Frame, ParseError> {
        let descriptor = LocalImageDescriptor::parser(&mut self.bytes)?;
        let min_code_size = self.bytes.take_byte()?;
        let blocks = read_sub_blocks(&mut self.bytes);
        if blocks.truncated {
            log::warn!("image data truncated after {} bytes", blocks.data.len());
        }

        let expected = descriptor.num_pixels();
        let (indices, status) = lzw::decode(min_code_size, &blocks.data, Some(expected));
        drop(blocks);
        if indices.len() < expected {
            log::warn!(
                "frame {} decoded {} of {} pixels ({:?})",
                self.frame_offset,
                indices.len(),
                expected,
                status
            );
        }

        // the control state applies to exactly this image
        let control = core::mem::take(&mut self.control);
        log::debug!(
            "frame {}: {:?} at {:?}, delay {}ms, transparent {:?}",
            self.frame_offset,
            descriptor.size,
            descriptor.origin,
            control.delay_ms,
            control.transparent_idx
        );
        Ok(Frame::new(descriptor, control, indices, status))
    }
}

impl<S: SeekableIter> Iterator for GifFrameStreamer<S> {
    type Item = Result<Frame, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}

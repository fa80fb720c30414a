use crate::common::ParseError;
use core::slice::Iter;

/// A forward-only byte source that can be restarted from its first byte.
///
/// Parsing never seeks backwards; `rewind` is only used to replay a stream for looped playback.
pub trait SeekableIter: Iterator<Item = u8> {
    /// Restart iteration at byte 0 of the stream
    fn rewind(&mut self) -> Result<(), ParseError>;
}

/// Byte source over an in-memory GIF (e.g. one that lives in flash)
#[derive(Clone)]
pub struct SeekableSliceIter<'a>(&'a [u8], Iter<'a, u8>);

impl<'a> SeekableSliceIter<'a> {
    pub fn new(slice: &'a [u8]) -> Self {
        Self(slice, slice.iter())
    }
}

impl Iterator for SeekableSliceIter<'_> {
    type Item = u8;
    fn next(&mut self) -> Option<Self::Item> {
        self.1.next().copied()
    }

    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        self.1.nth(n).copied()
    }
}

impl SeekableIter for SeekableSliceIter<'_> {
    fn rewind(&mut self) -> Result<(), ParseError> {
        self.1 = self.0.iter();
        Ok(())
    }
}

impl<S: SeekableIter + ?Sized> SeekableIter for &mut S {
    fn rewind(&mut self) -> Result<(), ParseError> {
        (**self).rewind()
    }
}

#[cfg(feature = "std")]
pub use self::file::FileSource;

#[cfg(feature = "std")]
mod file {
    use super::SeekableIter;
    use crate::common::ParseError;
    use std::{
        fs::File,
        io::{self, BufReader, Read},
        path::{Path, PathBuf},
    };

    const READ_BUFFER: usize = 512;

    /// Buffered file reader; rewinding reopens the file.
    ///
    /// An I/O error mid-stream is logged and ends the byte sequence, which the parser treats as a
    /// truncated file.
    pub struct FileSource {
        path: PathBuf,
        bytes: io::Bytes<BufReader<File>>,
    }

    impl FileSource {
        pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ParseError> {
            let path = path.as_ref().to_path_buf();
            let bytes = Self::open_bytes(&path)?;
            Ok(Self { path, bytes })
        }

        pub fn path(&self) -> &Path {
            &self.path
        }

        fn open_bytes(path: &Path) -> Result<io::Bytes<BufReader<File>>, ParseError> {
            let file = File::open(path).map_err(|err| {
                log::warn!("could not open {}: {}", path.display(), err);
                ParseError::SourceUnavailable
            })?;
            Ok(BufReader::with_capacity(READ_BUFFER, file).bytes())
        }
    }

    impl Iterator for FileSource {
        type Item = u8;
        fn next(&mut self) -> Option<u8> {
            match self.bytes.next()? {
                Ok(byte) => Some(byte),
                Err(err) => {
                    log::warn!("read from {} failed: {}", self.path.display(), err);
                    None
                }
            }
        }
    }

    impl SeekableIter for FileSource {
        fn rewind(&mut self) -> Result<(), ParseError> {
            self.bytes = Self::open_bytes(&self.path)?;
            Ok(())
        }
    }
}

/// Abstraction for iterating through an entire gif source
pub struct ByteIterator<S: SeekableIter> {
    iterator: S,
    offset: usize,
}

impl<'a> ByteIterator<SeekableSliceIter<'a>> {
    pub fn from_slice(slice: &'a [u8]) -> Self {
        Self::new(SeekableSliceIter::new(slice))
    }
}

impl<S: SeekableIter> ByteIterator<S> {
    pub fn new(iterator: S) -> Self {
        Self {
            iterator,
            offset: 0,
        }
    }

    pub(crate) fn take_u16_le(&mut self) -> Result<u16, ParseError> {
        self.take_arr().map(u16::from_le_bytes)
    }

    pub(crate) fn take_byte(&mut self) -> Result<u8, ParseError> {
        let byte = self.iterator.next().ok_or(ParseError::UnexpectedEof)?;
        self.offset += 1;
        Ok(byte)
    }

    /// Like `take_byte`, but a clean end of stream is `None` rather than an error
    pub(crate) fn next_byte(&mut self) -> Option<u8> {
        let byte = self.iterator.next()?;
        self.offset += 1;
        Some(byte)
    }

    #[inline]
    pub(crate) fn take_arr<const N: usize>(&mut self) -> Result<[u8; N], ParseError> {
        let mut arr = [0; N];
        for slot in arr.iter_mut() {
            *slot = self.take_byte()?;
        }
        Ok(arr)
    }

    pub(crate) fn get_offset(&self) -> usize {
        self.offset
    }

    pub(crate) fn seek_by(&mut self, len: usize) -> Result<(), ParseError> {
        if len == 0 {
            return Ok(());
        }
        self.iterator
            .nth(len - 1)
            .ok_or(ParseError::UnexpectedEof)?;
        self.offset += len;
        Ok(())
    }

    pub(crate) fn rewind(&mut self) -> Result<(), ParseError> {
        self.iterator.rewind()?;
        self.offset = 0;
        Ok(())
    }

    pub fn into_inner(self) -> S {
        self.iterator
    }
}

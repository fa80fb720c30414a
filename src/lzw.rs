//! GIF flavoured LZW decompression.
//!
//! The dictionary is an append-only arena of at most [`MAX_CODES`] entries. Each entry is stored
//! as its prefix code plus one trailing byte, so the whole table has a fixed size no matter how
//! long the decoded strings get. Strings are materialised by walking the prefix chain backwards
//! straight into the output buffer.

use alloc::vec::Vec;

use crate::bit_reader::{BitReader, MAX_READ_BITS};

/// Hard ceiling on dictionary size (12 bit codes)
pub const MAX_CODES: usize = 1 << MAX_READ_BITS;

/// How a decode run ended
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LzwStatus {
    /// End code read
    Done,
    /// The expected number of indices was produced
    Filled,
    /// Ran out of input before an end code
    Exhausted,
    /// Undefined code, or the dictionary ran out without a clear code
    Corrupt,
}

/// The minimum code size in the image descriptor is outside `2..=8`
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InvalidCodeSize(pub u8);

#[derive(Debug, Copy, Clone, Default)]
struct Entry {
    prefix: u16,
    first: u8,
    last: u8,
    /// 0 marks the clear and end placeholders
    len: u16,
}

/// Code to string table, indexed by code.
pub struct Dictionary {
    entries: Vec<Entry>,
    clear_code: u16,
}

impl Dictionary {
    pub fn new(min_code_size: u8) -> Self {
        let mut dict = Self {
            entries: Vec::with_capacity(MAX_CODES),
            clear_code: 1 << min_code_size,
        };
        dict.reset();
        dict
    }

    /// Back to the identity entries plus the clear/end placeholders
    pub fn reset(&mut self) {
        self.entries.clear();
        self.entries.extend((0..self.clear_code).map(|byte| Entry {
            prefix: 0,
            first: byte as u8,
            last: byte as u8,
            len: 1,
        }));
        // clear and end codes
        self.entries.push(Entry::default());
        self.entries.push(Entry::default());
    }

    /// Number of assigned codes, which is also the next code to be assigned
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= MAX_CODES
    }

    /// Length of the string for `code`, `None` for placeholders and unassigned codes
    pub fn entry_len(&self, code: u16) -> Option<usize> {
        self.entries
            .get(code as usize)
            .filter(|entry| entry.len > 0)
            .map(|entry| entry.len as usize)
    }

    fn first_byte(&self, code: u16) -> u8 {
        self.entries[code as usize].first
    }

    /// Appends `prefix` + `byte`. Returns `false` when the table is already full.
    fn push(&mut self, prefix: u16, byte: u8) -> bool {
        if self.is_full() {
            return false;
        }
        let parent = self.entries[prefix as usize];
        self.entries.push(Entry {
            prefix,
            first: parent.first,
            last: byte,
            len: parent.len + 1,
        });
        true
    }

    /// Writes the string for `code` into `dst`, which must be exactly `entry_len(code)` long
    fn write_entry(&self, code: u16, dst: &mut [u8]) {
        let mut code = code;
        for slot in dst.iter_mut().rev() {
            let entry = self.entries[code as usize];
            *slot = entry.last;
            code = entry.prefix;
        }
    }

    /// Copies out the string for `code`
    pub fn entry(&self, code: u16) -> Option<Vec<u8>> {
        let len = self.entry_len(code)?;
        let mut out = alloc::vec![0; len];
        self.write_entry(code, &mut out);
        Some(out)
    }
}

/// Decoder state for one image: dictionary, current code width and the previous code.
pub struct LzwDecoder {
    min_code_size: u8,
    clear_code: u16,
    end_code: u16,
    code_size: u8,
    prev: Option<u16>,
    dict: Dictionary,
}

impl LzwDecoder {
    pub fn new(min_code_size: u8) -> Result<Self, InvalidCodeSize> {
        if !(2..=8).contains(&min_code_size) {
            return Err(InvalidCodeSize(min_code_size));
        }
        let clear_code = 1u16 << min_code_size;
        Ok(Self {
            min_code_size,
            clear_code,
            end_code: clear_code + 1,
            code_size: min_code_size + 1,
            prev: None,
            dict: Dictionary::new(min_code_size),
        })
    }

    pub fn reset(&mut self) {
        self.dict.reset();
        self.code_size = self.min_code_size + 1;
        self.prev = None;
    }

    pub fn code_size(&self) -> u8 {
        self.code_size
    }

    pub fn next_code(&self) -> usize {
        self.dict.len()
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    /// Adds a dictionary entry and widens codes at the power of two boundary.
    /// Returns `false` if the dictionary is exhausted.
    fn add_entry(&mut self, prefix: u16, byte: u8) -> bool {
        if !self.dict.push(prefix, byte) {
            return false;
        }
        if self.dict.len() == 1 << self.code_size && self.code_size < MAX_READ_BITS {
            self.code_size += 1;
        }
        true
    }

    /// Decodes `data` and appends palette indices to `out`.
    ///
    /// With `expected` set, decoding stops once `out` holds that many indices and anything
    /// beyond is cut off. Corrupt input stops decoding but keeps what was produced so far.
    pub fn decode_into(&mut self, data: &[u8], expected: Option<usize>, out: &mut Vec<u8>) -> LzwStatus {
        let mut reader = BitReader::new(data);
        if expected.map_or(false, |expected| out.len() >= expected) {
            return LzwStatus::Filled;
        }

        loop {
            let code = match reader.read_bits(self.code_size) {
                Some(code) => code,
                None => return LzwStatus::Exhausted,
            };

            if code == self.clear_code {
                self.reset();
                continue;
            }
            if code == self.end_code {
                return LzwStatus::Done;
            }

            let start = out.len();
            let first = if let Some(len) = self.dict.entry_len(code) {
                out.resize(start + len, 0);
                self.dict.write_entry(code, &mut out[start..]);
                self.dict.first_byte(code)
            } else if let Some(prev) = self.prev.filter(|_| code as usize == self.dict.len()) {
                // code not yet in the table: it's prev + first byte of prev
                let first = self.dict.first_byte(prev);
                let len = self.dict.entry_len(prev).unwrap_or(0);
                out.resize(start + len + 1, 0);
                self.dict.write_entry(prev, &mut out[start..start + len]);
                out[start + len] = first;
                first
            } else {
                log::warn!(
                    "undefined lzw code {} with {} codes assigned",
                    code,
                    self.dict.len()
                );
                return LzwStatus::Corrupt;
            };

            if let Some(expected) = expected {
                if out.len() >= expected {
                    out.truncate(expected);
                    return LzwStatus::Filled;
                }
            }

            if let Some(prev) = self.prev {
                if !self.add_entry(prev, first) {
                    log::warn!("lzw dictionary exhausted without a clear code");
                    return LzwStatus::Corrupt;
                }
            }
            self.prev = Some(code);
        }
    }
}

/// Decodes one image's LZW data into palette indices.
///
/// An invalid minimum code size decodes to nothing and reports [`LzwStatus::Corrupt`].
pub fn decode(min_code_size: u8, data: &[u8], expected: Option<usize>) -> (Vec<u8>, LzwStatus) {
    let mut out = Vec::with_capacity(expected.unwrap_or(0).min(data.len().saturating_mul(4)));
    let status = match LzwDecoder::new(min_code_size) {
        Ok(mut decoder) => decoder.decode_into(data, expected, &mut out),
        Err(InvalidCodeSize(size)) => {
            log::warn!("invalid lzw minimum code size {}", size);
            LzwStatus::Corrupt
        }
    };
    (out, status)
}

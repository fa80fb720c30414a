use core::fmt;

/// Separator byte that introduces each top level block after the screen descriptor.
///
/// Only the separator says how the following bytes are framed, so an unknown value leaves the
/// parser with no way to find the next block.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Block {
    /// Image descriptor, optional local table, then LZW data.
    Image = 0x2C,
    /// Labelled extension wrapped in sub-blocks.
    Extension = 0x21,
    /// End of the stream.
    Trailer = 0x3B,
}

impl Block {
    /// Try to parse from u8
    pub fn from_u8(n: u8) -> Result<Self, ParseError> {
        match n {
            0x2C => Ok(Block::Image),
            0x21 => Ok(Block::Extension),
            0x3B => Ok(Block::Trailer),
            _ => Err(ParseError::IncorrectBlockLabel(n)),
        }
    }
}

/// Known GIF Extension labels.
///
/// Only the graphics control extension is interpreted; the others are named so the skip can be
/// logged meaningfully.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum ExtensionLabel {
    /// Graphic control extension (delay, transparency).
    Graphics = 0xf9,
    /// Application extension.
    App = 0xff,
    /// Plain text extension.
    Text = 0x01,
    /// Comment extension
    Comment = 0xfe,
}

impl ExtensionLabel {
    pub fn from_u8(n: u8) -> Option<Self> {
        match n {
            0xf9 => Some(ExtensionLabel::Graphics),
            0xff => Some(ExtensionLabel::App),
            0x01 => Some(ExtensionLabel::Text),
            0xfe => Some(ExtensionLabel::Comment),
            _ => None,
        }
    }
}

/// Errors that emerge when parsing our gif file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Magic bytes are neither `GIF87a` nor `GIF89a`
    BadGifFile,
    /// EoF came early
    UnexpectedEof,
    /// Invalid block separator; the stream position can't be trusted after this
    IncorrectBlockLabel(u8),
    /// The byte source could not be (re)opened
    SourceUnavailable,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::BadGifFile => f.write_str("not a GIF87a/GIF89a stream"),
            ParseError::UnexpectedEof => f.write_str("unexpected end of stream"),
            ParseError::IncorrectBlockLabel(label) => {
                write!(f, "unknown block separator 0x{:02x}", label)
            }
            ParseError::SourceUnavailable => f.write_str("byte source could not be opened"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParseError {}

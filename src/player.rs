use core::fmt;

use embedded_graphics::{pixelcolor::Rgb565, prelude::*, primitives::Rectangle};

use crate::{
    common::ParseError,
    frame::{Frame, GifFrameStreamer},
    iterators::SeekableIter,
    render::{BlockSink, FrameRenderer, NativePalette, DEFAULT_CHUNK_LINES},
};

/// Shortest delay between frames unless configured otherwise
pub const DEFAULT_MIN_DELAY_MS: u32 = 10;

/// Millisecond clock and sleep used to pace frames.
pub trait Timer {
    /// Monotonic milliseconds; only differences are used
    fn now_ms(&mut self) -> u64;

    fn sleep_ms(&mut self, ms: u32);
}

impl<T: Timer + ?Sized> Timer for &mut T {
    fn now_ms(&mut self) -> u64 {
        (**self).now_ms()
    }

    fn sleep_ms(&mut self, ms: u32) {
        (**self).sleep_ms(ms)
    }
}

#[cfg(feature = "std")]
pub use self::std_timer::StdTimer;

#[cfg(feature = "std")]
mod std_timer {
    use std::time::{Duration, Instant};

    /// Wall clock timer that sleeps the current thread
    pub struct StdTimer {
        start: Instant,
    }

    impl Default for StdTimer {
        fn default() -> Self {
            Self {
                start: Instant::now(),
            }
        }
    }

    impl super::Timer for StdTimer {
        fn now_ms(&mut self) -> u64 {
            self.start.elapsed().as_millis() as u64
        }

        fn sleep_ms(&mut self, ms: u32) {
            std::thread::sleep(Duration::from_millis(ms as u64));
        }
    }
}

/// Tuning knobs for a [`GifPlayer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerConfig {
    chunk_lines: usize,
    min_delay_ms: u32,
    release_between_frames: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerConfig {
    pub const fn new() -> Self {
        Self {
            chunk_lines: DEFAULT_CHUNK_LINES,
            min_delay_ms: DEFAULT_MIN_DELAY_MS,
            release_between_frames: false,
        }
    }

    /// Scanlines per blit. Trades RAM (width × lines × 2 bytes) against per-blit overhead.
    /// Values below 1 are treated as 1.
    pub fn chunk_lines(mut self, lines: usize) -> Self {
        self.chunk_lines = lines.max(1);
        self
    }

    /// Floor for frame delays so zero-delay animations don't spin
    pub fn min_delay_ms(mut self, ms: u32) -> Self {
        self.min_delay_ms = ms.max(1);
        self
    }

    /// Free the chunk buffer after every frame instead of keeping it for the next one
    pub fn release_between_frames(mut self, release: bool) -> Self {
        self.release_between_frames = release;
        self
    }
}

/// Per call playback parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayOptions {
    /// Canvas position on the display
    pub origin: Point,
    /// Replay the animation after it ends
    pub looping: bool,
    /// Drawn for transparent pixels and out of range palette indices
    pub background: Rgb565,
    /// Stop after this many passes; `None` loops until aborted
    pub max_loops: Option<u32>,
    /// Prefer the stream's own background color (global table entry) over `background`
    pub stream_background: bool,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            origin: Point::zero(),
            looping: true,
            background: Rgb565::BLACK,
            max_loops: None,
            stream_background: false,
        }
    }
}

/// What happened during [`GifPlayer::play`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackSummary {
    /// Completed passes over the stream
    pub loops: u32,
    pub frames_drawn: u32,
    /// Frames without a usable color table
    pub frames_skipped: u32,
    /// The caller stopped playback between frames
    pub aborted: bool,
}

/// Handed to the between-frames callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub loop_index: u32,
    pub frame_index: usize,
    pub area: Rectangle,
    pub delay_ms: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayError<E> {
    /// Bad magic bytes or an unknown block; nothing after that point is trusted
    Parse(ParseError),
    /// The display sink failed
    Sink(E),
}

impl<E> From<ParseError> for PlayError<E> {
    fn from(err: ParseError) -> Self {
        PlayError::Parse(err)
    }
}

impl<E: fmt::Debug> fmt::Display for PlayError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayError::Parse(err) => write!(f, "gif stream error: {}", err),
            PlayError::Sink(err) => write!(f, "display error: {:?}", err),
        }
    }
}

#[cfg(feature = "std")]
impl<E: fmt::Debug> std::error::Error for PlayError<E> {}

/// How long to sleep after a frame that asked for `delay_ms` and took `elapsed_ms` to draw.
pub fn remaining_delay(delay_ms: u32, elapsed_ms: u64, min_delay_ms: u32) -> u32 {
    let budget = delay_ms.max(min_delay_ms) as u64;
    budget.saturating_sub(elapsed_ms) as u32
}

/// Decodes, draws and paces an animation on a [`BlockSink`].
///
/// Everything happens on the calling thread: one frame is decoded, drawn in chunks, then the
/// player sleeps out the rest of the frame delay before decoding the next.
pub struct GifPlayer<K, T> {
    sink: K,
    timer: T,
    renderer: FrameRenderer,
    config: PlayerConfig,
}

impl<K: BlockSink, T: Timer> GifPlayer<K, T> {
    pub fn new(sink: K, timer: T) -> Self {
        Self::with_config(sink, timer, PlayerConfig::default())
    }

    pub fn with_config(sink: K, timer: T, config: PlayerConfig) -> Self {
        Self {
            sink,
            timer,
            renderer: FrameRenderer::new(config.chunk_lines),
            config,
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    pub fn into_parts(self) -> (K, T) {
        (self.sink, self.timer)
    }

    /// Draws a single decoded frame with the right palette. Returns `false` if the frame has no
    /// color table to draw with.
    pub fn draw_frame(
        &mut self,
        frame: &Frame,
        global: Option<&NativePalette>,
        offset: Point,
        background: Rgb565,
    ) -> Result<bool, K::Error> {
        let local;
        let palette = match frame.local_table() {
            Some(table) => {
                local = table.to_native();
                &local
            }
            None => match global {
                Some(palette) => palette,
                None => return Ok(false),
            },
        };
        self.renderer
            .draw_frame(&mut self.sink, frame, offset, background, palette)?;
        if self.config.release_between_frames {
            self.renderer.release();
        }
        Ok(true)
    }

    /// Plays `source` until it ends, `max_loops` passes complete, or forever when looping.
    pub fn play<S: SeekableIter>(
        &mut self,
        source: S,
        options: &PlayOptions,
    ) -> Result<PlaybackSummary, PlayError<K::Error>> {
        self.play_until(source, options, |_, _| true)
    }

    /// Like [`play`](Self::play), calling `keep_going` after each frame's delay. Returning
    /// `false` stops playback before the next frame.
    pub fn play_until<S, F>(
        &mut self,
        source: S,
        options: &PlayOptions,
        mut keep_going: F,
    ) -> Result<PlaybackSummary, PlayError<K::Error>>
    where
        S: SeekableIter,
        F: FnMut(&mut K, &FrameInfo) -> bool,
    {
        let result = self.run_passes(source, options, &mut keep_going);
        // the chunk buffer is dropped however playback ended
        self.renderer.release();
        result
    }

    fn run_passes<S, F>(
        &mut self,
        source: S,
        options: &PlayOptions,
        keep_going: &mut F,
    ) -> Result<PlaybackSummary, PlayError<K::Error>>
    where
        S: SeekableIter,
        F: FnMut(&mut K, &FrameInfo) -> bool,
    {
        let mut summary = PlaybackSummary::default();
        let mut frames = GifFrameStreamer::new(source)?;

        loop {
            let global = frames.global_table().map(|table| table.to_native());
            let background = frames
                .header()
                .background_color()
                .filter(|_| options.stream_background)
                .unwrap_or(options.background);
            log::debug!("starting pass {}", summary.loops);

            let mut drawn_this_pass = 0;
            while let Some(frame) = frames.next_frame()? {
                let frame_index = frames.frames_read() - 1;
                let started = self.timer.now_ms();
                let drawn = self
                    .draw_frame(&frame, global.as_ref(), options.origin, background)
                    .map_err(PlayError::Sink)?;
                if !drawn {
                    log::warn!("frame {} has no color table, skipped", frame_index);
                    summary.frames_skipped += 1;
                    continue;
                }
                summary.frames_drawn += 1;
                drawn_this_pass += 1;

                let info = FrameInfo {
                    loop_index: summary.loops,
                    frame_index,
                    area: frame.frame_area(),
                    delay_ms: frame.delay_ms(),
                };
                // indices aren't needed past this point
                drop(frame);

                let elapsed = self.timer.now_ms().saturating_sub(started);
                let wait = remaining_delay(info.delay_ms, elapsed, self.config.min_delay_ms);
                if wait > 0 {
                    self.timer.sleep_ms(wait);
                }

                if !keep_going(&mut self.sink, &info) {
                    log::debug!("playback aborted after frame {}", frame_index);
                    summary.aborted = true;
                    return Ok(summary);
                }
            }

            summary.loops += 1;
            if !options.looping {
                break;
            }
            if options.max_loops.map_or(false, |max| summary.loops >= max) {
                break;
            }
            if drawn_this_pass == 0 {
                log::warn!("pass drew no frames, not looping");
                break;
            }
            frames.reset()?;
        }

        Ok(summary)
    }

    /// Opens `path` and plays it; looping reopens the file for every pass.
    #[cfg(feature = "std")]
    pub fn play_file<P: AsRef<std::path::Path>>(
        &mut self,
        path: P,
        options: &PlayOptions,
    ) -> Result<PlaybackSummary, PlayError<K::Error>> {
        let source = crate::iterators::FileSource::open(path)?;
        self.play(source, options)
    }
}

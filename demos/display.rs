//! This example plays GIF animations using the embedded-graphics simulator.
//!
//! Basic usage: `cargo run --features std --example display -- GIF_FILE`
//!
//! More usage and arguments can be listed by running `cargo run --features std --example display -- --help`
//! Set `RUST_LOG=chunkgif=debug` to follow the decoder.

use chunkgif::{
    DrawTargetSink, GifFrameStreamer, GifPlayer, PlayOptions, PlayerConfig, SeekableSliceIter,
    StdTimer,
};
use clap::Parser;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics_simulator::{
    OutputSettings, OutputSettingsBuilder, SimulatorDisplay, SimulatorEvent, Window,
};
use std::{fs, num::NonZeroU32, path::PathBuf};

#[derive(Parser)]
struct Args {
    /// Pixel scale
    #[clap(long, default_value = "1")]
    scale: NonZeroU32,

    /// Scanlines per blit
    #[clap(long, default_value = "8")]
    chunk_lines: usize,

    /// Shortest time a frame stays on screen
    #[clap(long, default_value = "10")]
    min_delay_ms: u32,

    /// Stop after this many passes
    #[clap(long)]
    loops: Option<u32>,

    /// Play the animation once
    #[clap(long)]
    once: bool,

    /// Use the file's background color instead of black
    #[clap(long)]
    stream_background: bool,

    /// GIF file
    gif_file: PathBuf,
}

fn play_gif(data: &[u8], args: &Args, settings: &OutputSettings) {
    let canvas = GifFrameStreamer::from_slice(data).unwrap().base_size();
    let display = SimulatorDisplay::<Rgb565>::new(canvas);
    let mut window = Window::new("GIF player", settings);

    let config = PlayerConfig::new()
        .chunk_lines(args.chunk_lines)
        .min_delay_ms(args.min_delay_ms);
    let mut player = GifPlayer::with_config(DrawTargetSink::new(display), StdTimer::default(), config);
    let options = PlayOptions {
        looping: !args.once,
        max_loops: args.loops,
        stream_background: args.stream_background,
        ..PlayOptions::default()
    };

    let summary = player
        .play_until(SeekableSliceIter::new(data), &options, |sink, _| {
            window.update(sink.target());
            !window.events().any(|e| e == SimulatorEvent::Quit)
        })
        .unwrap();
    log::info!("{:?}", summary);
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let settings = OutputSettingsBuilder::new()
        .scale(args.scale.into())
        .build();

    let data = fs::read(&args.gif_file).unwrap();

    play_gif(&data, &args, &settings);
}

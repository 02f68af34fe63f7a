use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Builder;
use image::{ImageBuffer, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_polygon_mut};
use imageproc::point::Point;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn, LevelFilter};
use minimp4::Mp4Muxer;
use openh264::encoder::{BitRate, Encoder, EncoderConfig, FrameRate};
use openh264::formats::YUVBuffer;
use palette::{FromColor, Hsv, Srgb};
use rand::seq::SliceRandom;
use rand::Rng;
use rayon::prelude::*;
use simulation_common::{circle_fan, load_snapshots, BodySample, SimulationConfig, Snapshot, Vec2, DEFAULT_SLICES};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Command-line arguments for the visualizer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input snapshot file path (.bin, .json or .msgpack)
    #[arg(short, long)]
    input: PathBuf,

    /// Output video file path (.mp4)
    #[arg(short, long, default_value = "ball_collision.mp4")]
    output: PathBuf,

    /// Width of the output video in pixels
    #[arg(long, default_value_t = 1024)]
    width: u32,

    /// Height of the output video in pixels (calculated from aspect ratio if not provided)
    #[arg(long)]
    height: Option<u32>,

    /// Frames per second for the output video
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Optional path to the config.toml file to get the exact arena size
    #[arg(long)]
    config: Option<PathBuf>,

    /// Arena width (used if config is not provided)
    #[arg(long, default_value_t = 1024.0)]
    arena_width: f32,

    /// Arena height (used if config is not provided)
    #[arg(long, default_value_t = 768.0)]
    arena_height: f32,

    /// Vertices per body outline
    #[arg(long, default_value_t = DEFAULT_SLICES)]
    slices: usize,

    /// Body color - use "palette" for a color per body, or a specific color name
    /// (black, white, red, green, blue, yellow, cyan, magenta)
    #[arg(long, default_value = "palette")]
    color: String,

    /// Background color - name of the color for the background
    #[arg(long, default_value = "black")]
    bg_color: String,

    /// Frames rendered in parallel before being handed to the encoder
    #[arg(long, default_value_t = 32)]
    chunk_size: usize,

    /// Also plot total kinetic energy over time to this PNG
    #[arg(long)]
    energy_plot: Option<PathBuf>,
}

// Color definitions for named colors (RGBA format)
const COLOR_MAP: &[(&str, [u8; 4])] = &[
    ("black", [0, 0, 0, 255]),
    ("white", [255, 255, 255, 255]),
    ("red", [255, 0, 0, 255]),
    ("green", [0, 255, 0, 255]),
    ("blue", [0, 0, 255, 255]),
    ("yellow", [255, 255, 0, 255]),
    ("cyan", [0, 255, 255, 255]),
    ("magenta", [255, 0, 255, 255]),
];

/// Parse a color name to RGBA values
fn parse_color(color_name: &str) -> [u8; 4] {
    COLOR_MAP
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(color_name))
        .map(|&(_, color)| color)
        .unwrap_or_else(|| {
            warn!("Color '{}' not recognized, using white.", color_name);
            [255, 255, 255, 255]
        })
}

/// Evenly spaced hues with slight jitter, shuffled so neighbouring indices differ.
fn generate_color_palette<R: Rng>(count: usize, rng: &mut R) -> Vec<[u8; 4]> {
    let count = count.max(1);
    let mut colors: Vec<[u8; 4]> = (0..count)
        .map(|i| {
            let hue = (i as f32) / (count as f32);
            let saturation = 0.7 + rng.random_range(-0.1..0.1);
            let value = 0.85 + rng.random_range(-0.1..0.1);
            let rgb = Srgb::from_color(Hsv::new(hue * 360.0, saturation, value));
            [(rgb.red * 255.0) as u8, (rgb.green * 255.0) as u8, (rgb.blue * 255.0) as u8, 255]
        })
        .collect();
    colors.shuffle(rng);
    colors
}

/// Scales a body to pixels and tessellates it into a closed polygon.
/// Consecutive duplicate vertices (tiny bodies) are dropped.
fn body_polygon(body: &BodySample, pixels_per_unit: f32, slices: usize) -> Vec<Point<i32>> {
    let center = Vec2::new(body.x, body.y) * pixels_per_unit;
    let mut points: Vec<Point<i32>> = Vec::with_capacity(slices);
    for v in circle_fan(center, body.radius * pixels_per_unit, slices) {
        let p = Point::new(v.x.round() as i32, v.y.round() as i32);
        if points.last() != Some(&p) {
            points.push(p);
        }
    }
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    points
}

/// Draw one snapshot as filled N-gons on a background.
fn draw_frame(
    snapshot: &Snapshot,
    width: u32,
    height: u32,
    pixels_per_unit: f32,
    slices: usize,
    bg_color: [u8; 4],
    color_palette: &[[u8; 4]],
) -> RgbaImage {
    let mut image = ImageBuffer::from_pixel(width, height, Rgba(bg_color));

    for (i, body) in snapshot.bodies.iter().enumerate() {
        let color = Rgba(color_palette[i % color_palette.len()]);
        let polygon = body_polygon(body, pixels_per_unit, slices);
        if polygon.len() >= 3 {
            draw_polygon_mut(&mut image, &polygon, color);
        } else {
            let cx = (body.x * pixels_per_unit).round() as i32;
            let cy = (body.y * pixels_per_unit).round() as i32;
            let r = ((body.radius * pixels_per_unit).round() as i32).max(1);
            draw_filled_circle_mut(&mut image, (cx, cy), r, color);
        }
    }

    image
}

/// RGB to YUV 4:2:0 (BT.601) for the H.264 encoder. Dimensions must be even.
fn rgb_to_yuv420(image: &RgbaImage) -> Vec<u8> {
    let width = image.width() as usize;
    let height = image.height() as usize;
    let (chroma_w, chroma_h) = (width / 2, height / 2);

    let mut yuv = vec![0u8; width * height + 2 * chroma_w * chroma_h];
    let (y_plane, chroma) = yuv.split_at_mut(width * height);
    let (u_plane, v_plane) = chroma.split_at_mut(chroma_w * chroma_h);

    for (luma, pixel) in y_plane.iter_mut().zip(image.pixels()) {
        let [r, g, b, _] = pixel.0;
        *luma = (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round() as u8;
    }

    // one chroma sample per 2x2 block
    for cy in 0..chroma_h {
        for cx in 0..chroma_w {
            let (mut u, mut v) = (0f32, 0f32);
            for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                let [r, g, b, _] = image.get_pixel((2 * cx + dx) as u32, (2 * cy + dy) as u32).0;
                let (r, g, b) = (r as f32, g as f32, b as f32);
                u += -0.169 * r - 0.331 * g + 0.5 * b + 128.0;
                v += 0.5 * r - 0.419 * g - 0.081 * b + 128.0;
            }
            u_plane[cy * chroma_w + cx] = (u / 4.0).round().clamp(0.0, 255.0) as u8;
            v_plane[cy * chroma_w + cx] = (v / 4.0).round().clamp(0.0, 255.0) as u8;
        }
    }

    yuv
}

/// Line plot of total kinetic energy against simulated time.
fn plot_energy(snapshots: &[Snapshot], path: &Path) -> Result<()> {
    use plotters::prelude::*;

    let max_time = snapshots.last().map_or(1.0, |s| s.time).max(1e-3);
    let (min_e, max_e) = snapshots
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), s| (lo.min(s.kinetic_energy), hi.max(s.kinetic_energy)));
    let pad = ((max_e - min_e) * 0.1).max(max_e.abs() * 0.01).max(1e-3);

    let root = BitMapBackend::new(path, (900, 400)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| anyhow::anyhow!("Failed to draw energy plot: {}", e))?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Total kinetic energy", ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(70)
        .build_cartesian_2d(0f32..max_time, (min_e - pad)..(max_e + pad))
        .map_err(|e| anyhow::anyhow!("Failed to build energy chart: {}", e))?;
    chart
        .configure_mesh()
        .x_desc("time (s)")
        .y_desc("energy")
        .draw()
        .map_err(|e| anyhow::anyhow!("Failed to draw chart mesh: {}", e))?;
    chart
        .draw_series(LineSeries::new(snapshots.iter().map(|s| (s.time, s.kinetic_energy)), &RED))
        .map_err(|e| anyhow::anyhow!("Failed to draw energy series: {}", e))?;
    root.present().map_err(|e| anyhow::anyhow!("Failed to write energy plot: {}", e))?;

    info!("Energy plot saved to {}", path.display());
    Ok(())
}

fn progress_style(template: &str) -> Result<ProgressStyle> {
    Ok(ProgressStyle::default_bar()
        .template(template)
        .context("Invalid progress bar template")?
        .progress_chars("#>-"))
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    run_with_args(args)
}

fn run_with_args(args: Args) -> Result<()> {
    // Initialize logger
    Builder::from_default_env()
        .filter(None, LevelFilter::Info)
        .init();

    info!("Starting Simulation Visualizer...");
    info!("Input file: {}", args.input.display());
    info!("Output video: {}", args.output.display());

    // --- Determine Arena Dimensions ---
    let (arena_width, arena_height) = match &args.config {
        Some(config_path) => match SimulationConfig::load(config_path) {
            Ok(config) => {
                info!("Loaded arena dimensions from {}", config_path.display());
                (config.arena.width, config.arena.height)
            }
            Err(e) => {
                warn!("Failed to load config file '{}': {}. Using provided dimensions.", config_path.display(), e);
                (args.arena_width, args.arena_height)
            }
        },
        None => (args.arena_width, args.arena_height),
    };
    if !(arena_width > 0.0 && arena_height > 0.0) {
        anyhow::bail!("Arena dimensions must be positive (got {}x{}).", arena_width, arena_height);
    }
    info!("Arena size: {:.1} x {:.1}", arena_width, arena_height);

    // --- Calculate Output Dimensions and Scale ---
    // H.264 4:2:0 needs even dimensions
    let output_width_px = (args.width.max(2)) & !1;
    let output_height_px = args
        .height
        .unwrap_or_else(|| (output_width_px as f32 * arena_height / arena_width) as u32)
        .max(2)
        & !1;
    let pixels_per_unit = (output_width_px as f32 / arena_width).min(output_height_px as f32 / arena_height);
    info!("Output video dimensions: {}x{} px at {} fps", output_width_px, output_height_px, args.fps);
    info!("Scale: {:.4} pixels per unit, {} vertices per body", pixels_per_unit, args.slices);

    // --- Load Snapshots ---
    let snapshots = load_snapshots(&args.input)?;
    info!("Found {} snapshots in the file", snapshots.len());
    if snapshots.is_empty() {
        warn!("Input file contains no snapshots. Exiting.");
        return Ok(());
    }
    let with_bodies = snapshots.iter().filter(|s| !s.bodies.is_empty()).count();
    if with_bodies == 0 {
        warn!("No snapshots contain body positions! The video will be blank.");
        warn!("Enable save_positions_in_snapshot in the engine config.");
    }

    if let Some(plot_path) = &args.energy_plot {
        if let Err(e) = plot_energy(&snapshots, plot_path) {
            error!("{:#}", e);
        }
    }

    // --- Set up Colors ---
    let bg_color = parse_color(&args.bg_color);
    let max_bodies = snapshots.iter().map(|s| s.bodies.len()).max().unwrap_or(1);
    let color_palette: Vec<[u8; 4]> = if args.color.eq_ignore_ascii_case("palette") {
        generate_color_palette(max_bodies, &mut rand::rng())
    } else {
        vec![parse_color(&args.color)]
    };

    // --- Initialize video encoder ---
    let mut encoder = Encoder::with_api_config(
        openh264::OpenH264API::from_source(),
        EncoderConfig::new()
            .max_frame_rate(FrameRate::from_hz(args.fps as f32))
            .bitrate(BitRate::from_bps(5_000_000)),
    )
    .context("Failed to initialize H.264 encoder")?;
    let mut h264_data = Vec::new();

    let progress_bar = ProgressBar::new(snapshots.len() as u64);
    progress_bar.set_style(progress_style(
        "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames ({percent}%) [{eta}]",
    )?);

    let start_time = Instant::now();
    let mut frame_count = 0usize;

    // Draw a chunk in parallel, then feed it to the encoder in order.
    for chunk in snapshots.chunks(args.chunk_size.max(1)) {
        let yuv_frames: Vec<Vec<u8>> = chunk
            .par_iter()
            .map(|snapshot| {
                let image = draw_frame(
                    snapshot,
                    output_width_px,
                    output_height_px,
                    pixels_per_unit,
                    args.slices,
                    bg_color,
                    &color_palette,
                );
                rgb_to_yuv420(&image)
            })
            .collect();

        for (offset, yuv_data) in yuv_frames.into_iter().enumerate() {
            let yuv_source = YUVBuffer::from_vec(yuv_data, output_width_px as usize, output_height_px as usize);
            match encoder.encode(&yuv_source) {
                Ok(bitstream) => {
                    bitstream.write_vec(&mut h264_data);
                    frame_count += 1;
                }
                Err(e) => error!("Error encoding frame {}: {}", frame_count + offset, e),
            }
            progress_bar.inc(1);
        }
    }
    progress_bar.finish_with_message(format!("Encoded {} frames", frame_count));

    // --- Mux into MP4 ---
    info!("Creating MP4 file...");
    let mut video_buffer = Cursor::new(Vec::new());
    {
        let mut mp4muxer = Mp4Muxer::new(&mut video_buffer);
        let description = format!("Ball collision simulation - {} bodies", max_bodies);
        mp4muxer.init_video(output_width_px as i32, output_height_px as i32, false, &description);
        mp4muxer.write_video(&h264_data);
        mp4muxer.close();
    }
    fs::write(&args.output, video_buffer.into_inner())
        .with_context(|| format!("Failed to write video file to {}", args.output.display()))?;

    let duration = start_time.elapsed();
    info!(
        "Video generation completed in {:.2?} ({:.1} frames per second)",
        duration,
        frame_count as f64 / duration.as_secs_f64().max(1e-9)
    );
    info!("Output saved to: {}", args.output.display());

    Ok(())
}

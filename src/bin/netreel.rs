use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "netreel", version)]
struct Cli {
    /// Directory for the log file (`<dir>/netreel.log`).
    #[arg(long, default_value = "log")]
    log_dir: PathBuf,

    /// Log level: error, warn, info, debug, trace.
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Slice a dynamic GEXF into the intermediate slice JSON.
    Slice(SliceArgs),
    /// Slice, lay out, and render a single snapshot as a PNG.
    Frame(FrameArgs),
    /// Run the whole pipeline and write one PNG per snapshot.
    Render(RenderArgs),
}

#[derive(Args, Debug)]
struct WindowOpts {
    /// Window width, in the graph's time unit (milliseconds for date-like
    /// formats). Defaults to a week for dates, 1 otherwise.
    #[arg(long)]
    range: Option<f64>,

    /// Window stride. Defaults to a day for dates, 0.1 otherwise.
    #[arg(long)]
    step: Option<f64>,
}

impl WindowOpts {
    fn to_options(&self) -> netreel::SliceOptions {
        netreel::SliceOptions { range: self.range, step: self.step }
    }
}

#[derive(Args, Debug)]
struct LayoutOpts {
    /// Scales every layout iteration budget.
    #[arg(long, default_value_t = 1.0)]
    iterations_factor: f64,

    /// Skip the anti-overlap sweeps.
    #[arg(long)]
    no_overlap_removal: bool,

    /// Determinism seed for placement and jitter.
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

impl LayoutOpts {
    fn to_settings(&self) -> netreel::LayoutSettings {
        netreel::LayoutSettings {
            iterations_factor: self.iterations_factor,
            overlap_removal: !self.no_overlap_removal,
            seed: self.seed,
            ..netreel::LayoutSettings::default()
        }
    }
}

#[derive(Args, Debug)]
struct RenderOpts {
    /// Image width in millimetres.
    #[arg(long, default_value_t = 200.0)]
    width_mm: f64,

    /// Image height in millimetres.
    #[arg(long, default_value_t = 200.0)]
    height_mm: f64,

    /// Internal rendering density.
    #[arg(long, default_value_t = 96.0)]
    rendering_dpi: f64,

    /// Output density; the frame is resampled when it differs.
    #[arg(long, default_value_t = 96.0)]
    output_dpi: f64,

    /// TTF/OTF font for labels. Without it, common system locations are
    /// searched; if none works the label layer is skipped.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Draw edges as arcs instead of straight lines.
    #[arg(long)]
    curved_edges: bool,

    /// Coarser edge polylines (faster, rougher).
    #[arg(long)]
    fast_edges: bool,

    /// Disable the hillshaded density background.
    #[arg(long)]
    no_hillshade: bool,

    /// Color the hillshade by density height instead of a flat tint.
    #[arg(long)]
    hypsometric: bool,

    /// Mirror the layout horizontally / vertically.
    #[arg(long)]
    flip_x: bool,
    #[arg(long)]
    flip_y: bool,

    /// Rotate the layout, degrees clockwise.
    #[arg(long, default_value_t = 0.0)]
    rotate: f64,

    /// Maximum number of labels to draw.
    #[arg(long, default_value_t = 30)]
    label_count: usize,

    /// Render snapshots in parallel (after layout).
    #[arg(long)]
    parallel: bool,

    /// Worker threads for --parallel.
    #[arg(long)]
    threads: Option<usize>,
}

impl RenderOpts {
    fn to_settings(&self, seed: u64) -> netreel::RenderSettings {
        netreel::RenderSettings {
            image_width_mm: self.width_mm,
            image_height_mm: self.height_mm,
            rendering_dpi: self.rendering_dpi,
            output_dpi: self.output_dpi,
            edge_curved: self.curved_edges,
            edge_high_quality: !self.fast_edges,
            hillshade: !self.no_hillshade,
            hypsometric: self.hypsometric,
            flip_x: self.flip_x,
            flip_y: self.flip_y,
            rotate: self.rotate,
            label_count: self.label_count,
            seed,
            ..netreel::RenderSettings::default()
        }
    }

    fn brush(&self) -> anyhow::Result<Option<netreel::FontBrush>> {
        match &self.font {
            Some(path) => {
                let brush = netreel::FontBrush::from_path(path)
                    .with_context(|| format!("load font '{}'", path.display()))?;
                Ok(Some(brush))
            }
            None => Ok(netreel::FontBrush::discover()),
        }
    }
}

#[derive(Args, Debug)]
struct SliceArgs {
    /// Input dynamic GEXF.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output JSON path.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    window: WindowOpts,
}

#[derive(Args, Debug)]
struct FrameArgs {
    /// Input dynamic GEXF.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Snapshot index (0-based).
    #[arg(long, default_value_t = 0)]
    slice: usize,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    window: WindowOpts,
    #[command(flatten)]
    layout: LayoutOpts,
    #[command(flatten)]
    render: RenderOpts,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Input dynamic GEXF.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output directory for `frame_00000.png, ...`.
    #[arg(long)]
    out_dir: PathBuf,

    #[command(flatten)]
    window: WindowOpts,
    #[command(flatten)]
    layout: LayoutOpts,
    #[command(flatten)]
    render: RenderOpts,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_dir, &cli.log_level)?;
    match cli.cmd {
        Command::Slice(args) => cmd_slice(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Render(args) => cmd_render(args),
    }
}

fn init_logging(log_dir: &Path, level: &str) -> anyhow::Result<()> {
    let level = match level {
        "error" => tracing::Level::ERROR,
        "warn" => tracing::Level::WARN,
        "info" => tracing::Level::INFO,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        other => anyhow::bail!("unknown log level '{other}'"),
    };
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("create log dir '{}'", log_dir.display()))?;
    let path = log_dir.join("netreel.log");
    let file = File::create(&path).with_context(|| format!("create log file '{}'", path.display()))?;
    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(level)
        .with_writer(move || file.try_clone().expect("clone log file handle"))
        .init();
    Ok(())
}

fn cmd_slice(args: SliceArgs) -> anyhow::Result<()> {
    let (_doc, series) = netreel::slice_file(&args.in_path, &args.window.to_options())?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    let file = File::create(&args.out)
        .with_context(|| format!("create '{}'", args.out.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &series)
        .with_context(|| "serialize slice JSON")?;

    eprintln!("wrote {} slices to {}", series.slices.len(), args.out.display());
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let (_doc, mut series) = netreel::slice_file(&args.in_path, &args.window.to_options())?;
    if args.slice >= series.slices.len() {
        anyhow::bail!("slice {} out of range ({} slices)", args.slice, series.slices.len());
    }
    // layout has to walk every snapshot up to the requested one
    series.slices.truncate(args.slice + 1);
    netreel::layout_series(&mut series, &args.layout.to_settings());

    let brush = args.render.brush()?;
    let mut renderer = netreel::Renderer::new(args.render.to_settings(args.layout.seed));
    let snapshot = &series.slices[args.slice];
    let frame = renderer.render(snapshot, brush.as_ref().map(|b| b as &dyn netreel::TextBrush))?;
    netreel::save_frame(&frame, &args.out)?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let opts = netreel::PipelineOptions {
        slice: args.window.to_options(),
        layout: args.layout.to_settings(),
        render: args.render.to_settings(args.layout.seed),
        threading: netreel::RenderThreading {
            parallel: args.render.parallel,
            threads: args.render.threads,
            ..netreel::RenderThreading::default()
        },
    };

    let brush = args.render.brush()?;
    let stats = netreel::run_file(
        &args.in_path,
        &args.out_dir,
        &opts,
        brush.as_ref().map(|b| b as &dyn netreel::TextBrush),
    )?;

    eprintln!(
        "rendered {}/{} frames to {} ({} failed)",
        stats.frames_written,
        stats.snapshots,
        args.out_dir.display(),
        stats.frames_failed
    );
    Ok(())
}

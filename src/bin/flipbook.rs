use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use sha2::Digest as _;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "flipbook", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Composite an animated image with its layers and export it.
    Export(ExportArgs),
    /// Render a single composite frame as a PNG.
    Frame(FrameArgs),
    /// Re-encode an animated image as MP4 (requires `ffmpeg` and `ffprobe` on PATH).
    Transcode(TranscodeArgs),
    /// Send a drawing to the animation service, then export the returned animation.
    Animate(AnimateArgs),
}

#[derive(Args, Debug)]
struct LayerArgs {
    /// Export configuration JSON. Flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Solid background color (`#rrggbb` or `#rrggbbaa`).
    #[arg(long)]
    background_color: Option<flipbook::Color>,

    /// Background image drawn behind the animation.
    #[arg(long)]
    background_image: Option<PathBuf>,

    /// Overlay image drawn above the animation.
    #[arg(long)]
    overlay: Option<PathBuf>,

    /// Caption text.
    #[arg(long)]
    text: Option<String>,

    /// Caption font size in pixels.
    #[arg(long)]
    font_size: Option<f32>,

    /// Caption fill color.
    #[arg(long)]
    text_color: Option<flipbook::Color>,
}

#[derive(Args, Debug)]
struct ExportOpts {
    #[command(flatten)]
    layers: LayerArgs,

    /// Recording length in milliseconds.
    #[arg(long)]
    duration_ms: Option<u64>,

    /// Paint and capture rate.
    #[arg(long)]
    fps: Option<u32>,

    /// Output kind.
    #[arg(long, value_enum)]
    format: Option<flipbook::ExportFormat>,

    /// Video container for `video` exports.
    #[arg(long, value_enum)]
    container: Option<flipbook::VideoContainer>,

    /// Round-trip the source through an MP4 before compositing.
    #[arg(long)]
    transcode: bool,

    /// Code or name used for the download file name.
    #[arg(long)]
    file_code: Option<String>,

    /// Directory the artifact is written to.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Print the number of font faces available for captions.
    #[arg(long)]
    dump_fonts: bool,
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Animated image (GIF, APNG, WebP) or still image.
    #[arg(long = "in")]
    in_path: PathBuf,

    #[command(flatten)]
    opts: ExportOpts,
}

#[derive(Args, Debug)]
struct FrameArgs {
    /// Animated image (GIF, APNG, WebP) or still image.
    #[arg(long = "in")]
    in_path: PathBuf,

    #[command(flatten)]
    layers: LayerArgs,

    /// Playback time of the frame, in milliseconds.
    #[arg(long, default_value_t = 0)]
    time_ms: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct TranscodeArgs {
    /// Animated image to convert.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    /// Output pixel format.
    #[arg(long, value_enum, default_value_t = flipbook::PixelFormat::Yuv420p)]
    pixel_format: flipbook::PixelFormat,

    /// Longer sources are truncated to this many seconds.
    #[arg(long, default_value_t = 10.0)]
    max_duration_sec: f64,
}

#[derive(Args, Debug)]
struct AnimateArgs {
    /// Drawing to animate.
    #[arg(long)]
    drawing: PathBuf,

    /// Base URL of the animation service.
    #[arg(long, default_value = "http://localhost:3000")]
    service: String,

    #[command(flatten)]
    opts: ExportOpts,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Export(args) => cmd_export(args).await,
        Command::Frame(args) => cmd_frame(args).await,
        Command::Transcode(args) => cmd_transcode(args).await,
        Command::Animate(args) => cmd_animate(args).await,
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flipbook=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn read_source(path: &Path) -> anyhow::Result<flipbook::AnimatedSource> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("read animation '{}'", path.display()))?;
    Ok(flipbook::AnimatedSource::from_bytes(bytes)?)
}

fn base_config(layers: &LayerArgs) -> anyhow::Result<flipbook::ExportConfig> {
    let mut config = match &layers.config {
        Some(path) => flipbook::ExportConfig::from_json_file(path)?,
        None => flipbook::ExportConfig::default(),
    };
    let stack = &mut config.layers;
    if let Some(color) = layers.background_color {
        stack.background_fill = Some(color);
    }
    if let Some(path) = &layers.background_image {
        stack.background_image = Some(path.clone());
    }
    if let Some(path) = &layers.overlay {
        stack.overlay_image = Some(path.clone());
    }
    if let Some(text) = &layers.text {
        stack.text = Some(flipbook::TextLayer::new(text.clone()));
    }
    if let Some(caption) = stack.text.as_mut() {
        if let Some(size) = layers.font_size {
            caption.font_size = size;
        }
        if let Some(color) = layers.text_color {
            caption.fill = color;
        }
    }
    Ok(config)
}

fn export_config(opts: &ExportOpts) -> anyhow::Result<flipbook::ExportConfig> {
    let mut config = base_config(&opts.layers)?;
    if let Some(ms) = opts.duration_ms {
        config.duration_ms = ms;
    }
    if let Some(fps) = opts.fps {
        config.fps = fps;
    }
    if let Some(format) = opts.format {
        config.format = format;
    }
    if let Some(container) = opts.container {
        config.container = container;
    }
    if opts.transcode && config.transcode.is_none() {
        config.transcode = Some(flipbook::TranscodeOptions::default());
    }
    if opts.file_code.is_some() {
        config.file_code = opts.file_code.clone();
    }
    config.validate()?;
    Ok(config)
}

async fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let source = read_source(&args.in_path).await?;
    run_export(source, &args.opts).await
}

async fn run_export(source: flipbook::AnimatedSource, opts: &ExportOpts) -> anyhow::Result<()> {
    let config = export_config(opts)?;
    if opts.dump_fonts {
        let faces = flipbook::TextRasterizer::new().face_count();
        eprintln!("caption font faces: {faces}");
    }

    let engine = Arc::new(flipbook::CodecEngine::system());
    let mut controller = flipbook::ExportController::new(engine, flipbook::ResourceLedger::new());
    controller.load_source(source, config);

    if let Err(err) = controller.run().await {
        if let Some(failure) = controller.session().and_then(flipbook::ExportSession::failure) {
            eprintln!("{}", failure.message);
        }
        return Err(err.into());
    }
    let session = controller
        .session()
        .context("export session disappeared before download")?;
    let artifact = session
        .artifact()
        .context("ready session has no artifact")?;
    let path = session.download_to(&opts.out_dir).await?;

    println!("path:     {}", path.display());
    println!("mime:     {}", artifact.mime());
    println!("duration: {} ms", artifact.duration().as_millis());
    println!("frames:   {}", artifact.frame_count());
    println!("sha256:   {}", sha256_hex(artifact.bytes()));

    controller.start_over();
    Ok(())
}

async fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let source = read_source(&args.in_path).await?;
    let config = base_config(&args.layers)?;
    config.validate()?;

    let mut images = flipbook::LayerImageCache::spawn_loads(&config.layers);
    images.settle(config.layer_load_timeout()).await;
    let mut compositor = flipbook::Compositor::new(images);

    let time = Duration::from_millis(args.time_ms);
    let mut player = flipbook::FramePlayer::new(source.sequence()?);
    let frame = player.frame_at(time)?;
    let mut canvas = flipbook::Canvas::new(frame.size)?;
    compositor.composite(&mut canvas, frame, &config.layers, time)?;
    let snapshot = canvas.snapshot();

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    image::save_buffer_with_format(
        &args.out,
        &snapshot.to_straight_rgba8(),
        snapshot.size.width,
        snapshot.size.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

async fn cmd_transcode(args: TranscodeArgs) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(&args.in_path)
        .await
        .with_context(|| format!("read animation '{}'", args.in_path.display()))?;
    let engine = flipbook::CodecEngine::system();
    let opts = flipbook::TranscodeOptions {
        max_duration_sec: args.max_duration_sec,
        pixel_format: args.pixel_format,
    };
    let video = flipbook::transcode_to_video(&engine, &bytes, opts).await?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    tokio::fs::write(&args.out, &video)
        .await
        .with_context(|| format!("write video '{}'", args.out.display()))?;

    let info = flipbook::probe_video(&engine, &args.out).await?;
    eprintln!(
        "wrote {} ({}x{} @ {}/{} fps, {:.2}s)",
        args.out.display(),
        info.size.width,
        info.size.height,
        info.fps.num,
        info.fps.den,
        info.duration_sec
    );
    Ok(())
}

async fn cmd_animate(args: AnimateArgs) -> anyhow::Result<()> {
    let drawing = tokio::fs::read(&args.drawing)
        .await
        .with_context(|| format!("read drawing '{}'", args.drawing.display()))?;
    let file_name = args
        .drawing
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("drawing.png")
        .to_owned();

    let client = flipbook::AnimateClient::new(&args.service)?;
    let reply = client.submit_drawing(drawing, &file_name).await?;
    tracing::info!(upload = %reply.upload_id, url = %reply.animation_url, "animation generated");
    let bytes = client.fetch_animation(&reply.animation_url).await?;

    let source = flipbook::AnimatedSource::from_bytes(bytes)?;
    run_export(source, &args.opts).await
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = sha2::Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

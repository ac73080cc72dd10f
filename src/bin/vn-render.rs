use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vn_render::{
    App, BackendKind, BlendType, EngineConfig, FrameBufferSurface, FrameLoop, FrameResult,
    FrameTiming, FsAssetSource, Image, MASK_LEVELS, NoEvents, PixelFormat, RenderContext,
    RenderResult, TransferRect,
};

#[derive(Parser, Debug)]
#[command(name = "vn-render", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Composite one image onto another and write a PNG.
    Blend(BlendArgs),
    /// Run a 28-step mask dissolve through the frame loop and write the final frame.
    Dissolve(DissolveArgs),
}

#[derive(Parser, Debug)]
struct BlendArgs {
    /// Destination image.
    #[arg(long)]
    dst: PathBuf,

    /// Source image drawn onto the destination.
    #[arg(long)]
    src: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Blend mode: none, fast, normal, add or sub.
    #[arg(long, default_value_t = BlendType::Normal)]
    mode: BlendType,

    /// Global opacity (0-255).
    #[arg(long, default_value_t = 255)]
    alpha: u8,

    /// Destination x of the source's top-left corner.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    x: i32,

    /// Destination y of the source's top-left corner.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    y: i32,

    /// Backend used for compositing.
    #[arg(long, default_value_t = BackendKind::Software)]
    backend: BackendKind,
}

#[derive(Parser, Debug)]
struct DissolveArgs {
    /// Image shown before the transition.
    #[arg(long)]
    from: PathBuf,

    /// Image revealed by the transition.
    #[arg(long)]
    to: PathBuf,

    /// Output PNG of the last presented frame.
    #[arg(long)]
    out: PathBuf,

    /// Engine config JSON. Without it the window takes the size of `--from`.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Backend; overrides the config file and the environment.
    #[arg(long)]
    backend: Option<BackendKind>,

    /// Write every finished frame as `frame_NN.png` into this directory.
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// Frame interval in milliseconds.
    #[arg(long, default_value_t = 33)]
    interval_ms: u64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Blend(args) => cmd_blend(args),
        Command::Dissolve(args) => cmd_dissolve(args),
    }
}

/// Split a path into an asset root and file name.
fn asset_location(path: &Path) -> anyhow::Result<(FsAssetSource, String)> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("invalid image path '{}'", path.display()))?;
    let root = path.parent().unwrap_or_else(|| Path::new("."));
    Ok((FsAssetSource::new(root), name.to_owned()))
}

fn load_image(path: &Path, format: PixelFormat) -> anyhow::Result<Image<'static>> {
    let (source, name) = asset_location(path)?;
    Ok(Image::create_from_file(&source, "", &name, format)?)
}

fn write_png(img: &image::RgbaImage, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    img.save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("write png '{}'", path.display()))
}

fn cmd_blend(args: BlendArgs) -> anyhow::Result<()> {
    let probe = load_image(&args.dst, PixelFormat::Argb)?;
    let config = EngineConfig {
        window_width: probe.width(),
        window_height: probe.height(),
        backend: args.backend,
        ..EngineConfig::default()
    };
    drop(probe);
    let mut backend = vn_render::create_backend(config.backend, &config)?;
    let format = backend.pixel_format();
    let mut dst = load_image(&args.dst, format)?;
    let mut src = load_image(&args.src, format)?;

    let rect = TransferRect::new(
        args.x,
        args.y,
        i32::try_from(src.width())?,
        i32::try_from(src.height())?,
        0,
        0,
    );
    let full = dst.bounds();
    let mut surface = FrameBufferSurface::new(dst.width(), dst.height())?;
    backend.start_frame()?;
    let base = TransferRect::new(0, 0, full.width, full.height, 0, 0);
    backend.render_image(&mut dst, base, 255, BlendType::None)?;
    backend.render_image(&mut src, rect, args.alpha, args.mode)?;
    backend.end_frame(full, &mut surface)?;
    dst.destroy(&mut *backend);
    src.destroy(&mut *backend);

    write_png(&surface.to_rgba_image(), &args.out)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_dissolve(args: DissolveArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => {
            let probe = load_image(&args.from, PixelFormat::Argb)?;
            EngineConfig {
                window_width: probe.width(),
                window_height: probe.height(),
                ..EngineConfig::default()
            }
            .with_backend_override(std::env::var(vn_render::BACKEND_ENV).ok().as_deref())?
        }
    };
    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    let language = config.language();

    let mut ctx = match RenderContext::from_config(config) {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("{}", language.startup_failed());
            return Err(err.into());
        }
    };
    let (width, height) = (ctx.config().window_width, ctx.config().window_height);
    tracing::info!(backend = %ctx.backend_kind(), width, height, "dissolve starting");

    let from = load_ctx_image(&ctx, &args.from)?;
    let to = load_ctx_image(&ctx, &args.to)?;
    let mut app = Dissolve {
        from: Some(from),
        to: Some(to),
        level: 0,
        frames_dir: args.frames_dir.clone(),
    };

    let mut surface = FrameBufferSurface::new(width, height)?;
    let frame_loop = FrameLoop::new(FrameTiming {
        interval: Duration::from_millis(args.interval_ms.max(1)),
        ..FrameTiming::default()
    });
    let stats = frame_loop.run(&mut ctx, &mut app, &mut NoEvents, &mut surface)?;
    tracing::info!(
        frames = stats.frames,
        dropped = stats.dropped_frames,
        skipped = stats.skipped_draws,
        "dissolve finished"
    );

    let last = surface.to_rgba_image();
    if let Some(dir) = &args.frames_dir {
        write_png(&last, &dir.join(frame_name(MASK_LEVELS - 1)))?;
    }
    write_png(&last, &args.out)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn load_ctx_image(ctx: &RenderContext<'_>, path: &Path) -> anyhow::Result<Image<'static>> {
    let (source, name) = asset_location(path)?;
    Ok(ctx.load_image(&source, "", &name)?)
}

fn frame_name(level: u8) -> String {
    format!("frame_{level:02}.png")
}

/// Reveals `to` over `from` one mask level per frame.
struct Dissolve {
    from: Option<Image<'static>>,
    to: Option<Image<'static>>,
    level: u8,
    frames_dir: Option<PathBuf>,
}

impl Dissolve {
    /// Save the previously finished frame.
    fn dump_previous(&self, ctx: &mut RenderContext<'_>) -> RenderResult<()> {
        let Some(dir) = &self.frames_dir else {
            return Ok(());
        };
        let Some(prev) = self.level.checked_sub(1) else {
            return Ok(());
        };
        let snap = ctx.backend_mut().snapshot()?;
        write_png(&snap.to_rgba_image(), &dir.join(frame_name(prev)))?;
        Ok(())
    }
}

impl App for Dissolve {
    fn frame(&mut self, ctx: &mut RenderContext<'_>) -> RenderResult<FrameResult> {
        self.dump_previous(ctx)?;
        let full = ctx.full_rect();
        let to_rect = |img: &Image<'_>| {
            TransferRect::new(
                0,
                0,
                i32::try_from(img.width()).unwrap_or(i32::MAX),
                i32::try_from(img.height()).unwrap_or(i32::MAX),
                0,
                0,
            )
        };

        // Coverage at a level includes every lower level, so one mask pass rebuilds the frame.
        if ctx.needs_full_redraw() {
            let black = ctx.pixel_format().black();
            ctx.render_clear(full, black);
            if let Some(from) = self.from.as_mut() {
                let rect = to_rect(from);
                ctx.render_image(from, rect, 255, BlendType::Normal);
            }
        }
        if let Some(to) = self.to.as_mut() {
            let rect = to_rect(to);
            ctx.render_image_mask(to, rect, self.level);
        }

        if self.level + 1 >= MASK_LEVELS {
            return Ok(FrameResult::finished(full));
        }
        self.level += 1;
        Ok(FrameResult::dirty(full))
    }

    fn cleanup(&mut self, ctx: &mut RenderContext<'_>) {
        for img in [self.from.take(), self.to.take()].into_iter().flatten() {
            ctx.destroy_image(img);
        }
    }
}

//! Demo binary: runs the full snapshot pipeline headless against a
//! synthetic camera frame and writes the encoded JPEG to disk.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{ArgAction, Parser};
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, fmt};

use camsnap::config::CaptureConfig;
use camsnap::overlay::{Canvas, Color, OverlayDrawer};
use camsnap::preview::{FrameEvent, FrameHub, FrameProducer};
use camsnap::render::{PixelBufferProducer, SharedGpu, WgpuFactory};
use camsnap::tasks::worker::Worker;
use camsnap::{AspectRatio, CaptureRequest, Size, SnapshotRecorder, compute_crop};

#[derive(Debug, Parser)]
#[command(name = "camsnap", about = "Headless camera snapshot demo")]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Where to write the encoded snapshot
    #[arg(short, long, value_name = "FILE", default_value = "snapshot.jpg")]
    output: PathBuf,

    /// Override the requested rotation (degrees)
    #[arg(long, value_name = "DEGREES")]
    rotation: Option<i32>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("camsnap={level}").parse()?)
        .add_directive("wgpu=warn".parse()?);
    fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

/// Draws a framing reticle in the image center.
struct ReticleDrawer;

impl OverlayDrawer for ReticleDrawer {
    fn draw_for_picture_snapshot(&self, canvas: &mut Canvas) {
        let size = canvas.size();
        let cx = size.width / 2;
        let cy = size.height / 2;
        let arm = size.width.min(size.height) / 8;
        let white = Color::rgba(255, 255, 255, 220);
        canvas.fill_rect(cx.saturating_sub(arm), cy.saturating_sub(2), arm * 2, 4, white);
        canvas.fill_rect(cx.saturating_sub(2), cy.saturating_sub(arm), 4, arm * 2, white);
    }
}

/// A horizontal/vertical gradient standing in for a camera frame.
fn test_pattern(size: Size) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(size.area() as usize * 4);
    for y in 0..size.height {
        for x in 0..size.width {
            let r = (x * 255 / size.width.max(1)) as u8;
            let g = (y * 255 / size.height.max(1)) as u8;
            pixels.extend_from_slice(&[r, g, 128, 255]);
        }
    }
    pixels
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let mut cfg = match &cli.config {
        Some(path) => CaptureConfig::from_yaml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => CaptureConfig::default(),
    };
    if let Some(rotation) = cli.rotation {
        cfg.rotation = rotation;
    }
    cfg.validate().context("validating configuration")?;

    let shared = SharedGpu::headless().context("initializing GPU")?;

    let size = cfg.size();
    let ratio = AspectRatio::of(16, 9);
    let output_size = compute_crop(size, ratio);
    let camera_tex = shared.alloc_texture(output_size);

    let producer_gpu = shared.clone();
    let hub = Arc::new(FrameHub::new(
        camera_tex,
        Box::new(move || {
            let mut producer =
                PixelBufferProducer::new(producer_gpu.clone(), camera_tex, output_size);
            producer.push_frame(test_pattern(output_size));
            Ok(Box::new(producer) as Box<dyn FrameProducer>)
        }),
    ));

    let facing = cfg.facing.clone().into();
    let request = CaptureRequest {
        size,
        output_ratio: ratio,
        rotation: cfg.rotation,
        facing,
        with_overlay: cfg.with_overlay,
    };

    let drawers: Vec<Box<dyn OverlayDrawer>> = if cfg.with_overlay {
        vec![Box::new(ReticleDrawer)]
    } else {
        Vec::new()
    };

    let angles = camsnap::Angles::new(facing, 0, 0, 0).map_err(|e| anyhow!(e))?;
    let factory = Arc::new(WgpuFactory::new(shared, cfg.jpeg_quality));
    let runner = Arc::new(Worker::spawn("camsnap-worker"));
    let recorder = SnapshotRecorder::new(hub.clone(), factory, runner, angles, drawers);

    let (tx, rx) = crossbeam_channel::bounded(1);
    recorder.take(request, move |outcome| {
        let _ = tx.send(outcome);
    });

    // Simulate one rendered preview frame; uncropped preview, so full scale.
    hub.dispatch_frame(&FrameEvent {
        scale_x: 1.0,
        scale_y: 1.0,
    });

    let result = rx
        .recv()
        .context("snapshot worker dropped")?
        .map_err(|e| anyhow!(e))?;
    std::fs::write(&cli.output, &result.data)
        .with_context(|| format!("writing {}", cli.output.display()))?;
    info!(
        output = %cli.output.display(),
        size = %result.size,
        bytes = result.data.len(),
        "snapshot written"
    );
    Ok(())
}

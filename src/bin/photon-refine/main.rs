//! photon-refine - headless progressive render of the demo scene.

use std::env;
use std::path::{Path, PathBuf};

use glam::Vec3;
use photon_refine::prelude::*;
use photon_refine::scene::demo::{BoxScene, ShotCamera};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn main() {
    let args: Vec<String> = env::args().collect();

    let mut level = "info";
    let mut settings_path: Option<PathBuf> = None;
    let mut output_dir: Option<PathBuf> = None;
    let mut no_capture = false;
    let mut dump_settings = false;

    let mut iter = args[1..].iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "warn",
            "-o" | "--output" => match iter.next() {
                Some(dir) => output_dir = Some(PathBuf::from(dir)),
                None => {
                    eprintln!("Error: --output needs a directory");
                    std::process::exit(1);
                }
            },
            "--no-capture" => no_capture = true,
            "--dump-settings" => dump_settings = true,
            "-h" | "--help" => {
                print_help();
                return;
            }
            other if other.starts_with('-') => {
                eprintln!("Error: unknown option {other}");
                print_help();
                std::process::exit(1);
            }
            path => settings_path = Some(PathBuf::from(path)),
        }
    }

    #[allow(clippy::let_unit_value)]
    let _guard = init_tracing(level);

    let mut settings = match settings_path.as_deref().map(RendererSettings::load) {
        Some(Ok(s)) => s,
        Some(Err(e)) => {
            eprintln!("Error: cannot load settings: {e}");
            std::process::exit(1);
        }
        None => RendererSettings::default(),
    };
    if let Some(dir) = output_dir {
        settings.capture.output_dir = dir;
    }
    if no_capture {
        settings.capture.enabled = false;
    }

    if dump_settings {
        match serde_json::to_string_pretty(&settings) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    print_banner(&settings, settings_path.as_deref());
    if let Err(e) = run(settings) {
        tracing::error!(error = %e, "render failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(settings: RendererSettings) -> Result<()> {
    let aspect = settings.render.width as f32 / settings.render.height.max(1) as f32;
    // Hold the front view for the first half of the loop, then cut to a corner view.
    let cut = settings.render.animation_seconds * 0.5;
    let cameras = ShotCamera::front(aspect).with_cut(cut, Vec3::new(1.6, 0.4, 2.8), Vec3::new(0.0, -0.3, 0.0));
    let scene = BoxScene::default();

    let mut renderer = ProgressiveRenderer::new(settings)?;
    let summary = renderer.run(&scene, &cameras)?;

    println!(
        "Rendered {} frames ({} resets) in {:.2}s",
        summary.frames,
        summary.resets,
        summary.elapsed.as_secs_f64()
    );
    if let Some(capture) = summary.capture {
        println!(
            "Exported {} frames ({} failed, {:.1} KiB)",
            capture.written,
            capture.failed,
            capture.bytes_written as f64 / 1024.0
        );
    }
    Ok(())
}

fn print_banner(settings: &RendererSettings, settings_path: Option<&Path>) {
    let r = &settings.render;
    println!(
        "photon-refine {} (built {} {})",
        env!("CARGO_PKG_VERSION"),
        env!("PHOTON_REFINE_BUILD_DATE"),
        env!("PHOTON_REFINE_BUILD_TIME")
    );
    println!(
        "  {}x{} @ {} fps, {} frames, settings: {}",
        r.width,
        r.height,
        r.target_fps,
        r.total_frames(),
        settings_path.map_or_else(|| "defaults".to_string(), |p| p.display().to_string())
    );
    if settings.capture.enabled {
        println!("  output: {}", settings.capture.output_dir.display());
    }
}

fn print_help() {
    println!("photon-refine - progressive path-tracing core, headless demo render");
    println!();
    println!("USAGE:");
    println!("    photon-refine [OPTIONS] [settings.json]");
    println!();
    println!("OPTIONS:");
    println!("    -o, --output <dir>   Directory for exported frames");
    println!("    --no-capture         Render without writing frames");
    println!("    --dump-settings      Print the effective settings as JSON and exit");
    println!("    -v, --verbose        Show debug output");
    println!("    -vv, --trace         Show trace output (very verbose)");
    println!("    -q, --quiet          Only warnings and errors");
    println!("    -h, --help           Show this help");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG             Overrides the log filter");
    println!("    PHOTON_TRACE=1       Write trace.json (requires the `trace` feature)");
}

/// Console logging, plus a Chrome trace file when `PHOTON_TRACE=1`.
#[cfg(feature = "trace")]
fn init_tracing(level: &str) -> Option<tracing_chrome::FlushGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false));

    if env::var("PHOTON_TRACE").ok().as_deref() != Some("1") {
        registry.init();
        return None;
    }
    let (chrome_layer, guard) = tracing_chrome::ChromeLayerBuilder::new().file("trace.json").build();
    registry.with(chrome_layer).init();
    Some(guard)
}

/// Console logging filtered by `RUST_LOG` or the verbosity flags.
#[cfg(not(feature = "trace"))]
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

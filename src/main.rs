//! cartload - loads a cartridge project into an in-memory engine
//!
//! Mounts the project directory at the project root (`/Game/` by default) and
//! an optional built-in asset directory at `/App/`, runs one load pass and
//! prints what ended up in engine state.
//!
//! # Execution Flow
//!
//! 1. Initialize logging → logs/cartload.<date>
//! 2. Load `cartridge-loader.yaml` (when `--config` is given) plus `CARTLOAD_*` overrides
//! 3. Create the tokio runtime and the load service
//! 4. Run the pass inline, or on the background worker with `--background`
//! 5. Print the engine summary and the load metrics

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use cartridge_loader::logging::{self, LogFormat};
use cartridge_loader::models::parse_flags;
use cartridge_loader::{
    APP_NAME, ConfigManager, FileFlags, LoadEvent, LoadOutcome, LoadService, LoaderSettings, MemoryEngine,
    MountedFileSystem, RoutePlan, VERSION,
};
use clap::Parser;
use std::sync::{Arc, RwLock};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "cartload", version, about = "Load a fantasy-console cartridge project")]
struct Args {
    /// Project directory, mounted as the project root
    project: Utf8PathBuf,

    /// Directory with built-in fallback assets, mounted as the built-in root
    #[arg(long)]
    builtin: Option<Utf8PathBuf>,

    /// `all` or a comma separated category list (system,colors,sprites,...).
    /// Defaults to every category the mounted folders can serve.
    #[arg(long)]
    flags: Option<String>,

    /// Step the pass on the background worker and report progress
    #[arg(long)]
    background: bool,

    /// Directory containing cartridge-loader.yaml
    #[arg(long)]
    config: Option<Utf8PathBuf>,

    #[arg(long, default_value = "logs")]
    log_dir: String,

    /// Write log files as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let _guard = if args.json_logs {
        logging::setup_logging_as(&args.log_dir, "cartload", args.debug, LogFormat::Json)?
    } else {
        logging::setup_logging_with_console(&args.log_dir, "cartload", args.debug, true)?
    };

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let settings = match &args.config {
        Some(dir) => ConfigManager::new(dir)?.load_settings()?,
        None => LoaderSettings::default(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("cartload-worker")
        .build()
        .context("Failed to create tokio runtime")?;

    let mut files = MountedFileSystem::new().mount(&settings.project_root, &args.project);
    if let Some(builtin) = &args.builtin {
        files = files.mount(&settings.builtin_root, builtin);
    }

    let service = LoadService::new(Arc::new(files), settings, runtime.handle().clone());
    let listing = service.list_files()?;
    tracing::info!("Found {} files", listing.len());

    let flags = match &args.flags {
        Some(flags) => parse_flags(flags)?,
        None => FileFlags::all(),
    };
    let flags = if args.builtin.is_some() {
        flags
    } else {
        without_builtin_fallbacks(&service, &listing, flags, args.flags.is_none())?
    };

    let result = if args.background {
        run_background(&runtime, &service, &listing, flags)
    } else {
        let mut engine = MemoryEngine::new();
        service
            .load_synchronously(&listing, &mut engine, flags)
            .map(|plan| (plan, engine))
            .context("Load pass failed")
    };

    service.metrics().log_summary();
    runtime.shutdown_timeout(Duration::from_secs(5));

    let (plan, engine) = result?;
    print_summary(&plan, &engine);
    Ok(())
}

/// Without a built-in root the synthesized fallbacks cannot be read. A default
/// mask drops the categories that need them; an explicit one is an error.
fn without_builtin_fallbacks(
    service: &LoadService,
    listing: &[String],
    flags: FileFlags,
    defaulted: bool,
) -> Result<FileFlags> {
    let plan = service.router().route(listing, flags);
    let missing = plan.unlisted(listing);
    if missing.is_empty() {
        return Ok(flags);
    }

    if !defaulted {
        let paths: Vec<&str> = missing.iter().map(|r| r.path.as_str()).collect();
        anyhow::bail!(
            "Built-in assets {} are needed but no --builtin directory is mounted",
            paths.join(", ")
        );
    }

    let mut reduced = flags;
    for route in missing {
        if reduced.contains(route.category.flag()) {
            tracing::warn!(
                "Skipping {} without --builtin: {} is not in the project",
                route.category,
                route.path
            );
            reduced.remove(route.category.flag());
        }
    }
    Ok(reduced)
}

fn run_background(
    runtime: &tokio::runtime::Runtime,
    service: &LoadService,
    listing: &[String],
    flags: FileFlags,
) -> Result<(RoutePlan, MemoryEngine)> {
    let engine = Arc::new(RwLock::new(MemoryEngine::new()));
    let mut events = service.subscribe();

    let pass = service
        .start_background_load(listing, Arc::clone(&engine), flags)
        .context("Could not start background load")?;
    let plan = pass.plan().clone();

    let outcome = runtime.block_on(async move {
        let reporter = tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                match event {
                    LoadEvent::Progress(progress) => {
                        let current = progress.current.as_deref().unwrap_or("-");
                        println!("[{:>3}%] {}", progress.percent(), current);
                    }
                    LoadEvent::Finished(_) => break,
                    LoadEvent::Started { .. } => {}
                }
            }
        });

        let outcome = pass.wait().await;
        if let Err(e) = reporter.await {
            tracing::error!("Progress reporter crashed: {}", e);
        }
        outcome
    });

    match outcome {
        LoadOutcome::Completed => {}
        LoadOutcome::Failed(e) => return Err(e).context("Background load pass failed"),
        LoadOutcome::Cancelled => anyhow::bail!("Background load pass was cancelled"),
    }

    let engine = engine.read().map_err(|_| anyhow::anyhow!("Engine lock poisoned"))?;
    Ok((plan, engine.clone()))
}

fn print_summary(plan: &RoutePlan, engine: &MemoryEngine) {
    println!("Routed {} parsers:", plan.len());
    for route in &plan.routes {
        println!("  {:<12} {:<14} {}", route.category.to_string(), route.kind.to_string(), route.path);
    }
    if !plan.unmatched.is_empty() {
        println!("Unmatched files: {}", plan.unmatched.len());
    }

    let tiles = engine
        .tiles
        .iter()
        .filter(|tile| tile.sprite_id.is_some_and(|id| id >= 0))
        .count();

    println!(
        "Game: {}",
        engine.game_name.as_deref().unwrap_or("(unnamed)")
    );
    println!("Colors: {}", engine.colors.len());
    println!("Sprites: {}", engine.sprites.sprites_in_memory());
    println!("Fonts: {}", engine.fonts.len());
    println!(
        "Tiles: {} of {}x{}",
        tiles, engine.tilemap_size.0, engine.tilemap_size.1
    );
    println!("Sounds: {}, songs: {}", engine.sounds.len(), engine.songs.len());
    println!(
        "Meta entries: {}, meta sprites: {}",
        engine.meta.len(),
        engine.meta_sprites.len()
    );
}

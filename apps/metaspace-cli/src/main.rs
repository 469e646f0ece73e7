use anyhow::Context;
use clap::{Parser, Subcommand};
use glam::Vec3;
use metaspace_assets::AssetOutcome;
use metaspace_common::SceneDocument;
use metaspace_ecs::tags;
use metaspace_kernel::EntityStore;
use metaspace_scene::{ComponentRegistry, LoadStatus, SceneConfig, SceneEvent, SceneWorld};
use metaspace_stream::LoadMode;
use metaspace_tools::{SceneInspector, validate_document};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "metaspace-cli", about = "CLI tool for metaspace scene documents")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print engine version and crate info
    Info,
    /// Check a scene document without loading it
    Validate {
        /// Scene document (JSON)
        scene: PathBuf,
    },
    /// Load a scene, print its tree, then settle every pending asset
    Load {
        /// Scene document (JSON)
        scene: PathBuf,
        /// Scene config (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Load every entity immediately, ignoring dynamic-load markers
        #[arg(long)]
        editor: bool,
    },
    /// Load a scene and walk an observer along a path
    Stream {
        /// Scene document (JSON)
        scene: PathBuf,
        /// Scene config (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Observer positions as "x,y,z"
        #[arg(short, long = "path", value_parser = parse_point, num_args = 1..)]
        path: Vec<Vec3>,
    },
}

fn parse_point(s: &str) -> Result<Vec3, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [x, y, z] = parts[..] else {
        return Err(format!("expected x,y,z, got `{s}`"));
    };
    let parse = |v: &str| v.parse::<f32>().map_err(|e| format!("`{v}`: {e}"));
    Ok(Vec3::new(parse(x)?, parse(y)?, parse(z)?))
}

fn read_document(path: &Path) -> anyhow::Result<SceneDocument> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    SceneDocument::from_json_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn read_config(path: Option<&Path>) -> anyhow::Result<SceneConfig> {
    match path {
        Some(path) => SceneConfig::load(path).with_context(|| format!("loading config {}", path.display())),
        None => Ok(SceneConfig::default()),
    }
}

fn print_events(world: &mut SceneWorld) {
    for event in world.drain_events() {
        match event {
            SceneEvent::LoadingProgress { progress } => println!("  progress {progress}%"),
            SceneEvent::SceneLoaded => println!("  scene loaded"),
            SceneEvent::RendererReset => println!("  renderer reset"),
        }
    }
}

/// Staged full load, one engine tick at a time.
fn load_staged(world: &mut SceneWorld, document: &SceneDocument) -> anyhow::Result<usize> {
    world.begin_scene_load(document)?;
    let mut ticks = 0;
    loop {
        ticks += 1;
        match world.step() {
            Some(LoadStatus::InProgress { materialized, total }) => {
                tracing::debug!(materialized, total, "loading");
            }
            Some(LoadStatus::Complete { top_level }) => {
                println!("Loaded {} top-level entities in {ticks} ticks", top_level.len());
                return Ok(top_level.len());
            }
            None => return Ok(0),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Commands::Info => {
            println!("metaspace-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("kernel: tick={}", EntityStore::new().tick());
            println!("ecs: builtin components={}", tags::BUILTIN.len());
            println!("assets: {}", metaspace_assets::crate_info());
            println!("stream: {}", metaspace_stream::crate_info());
            println!("scene: {}", metaspace_scene::crate_info());
            println!("tools: {}", metaspace_tools::crate_info());
        }
        Commands::Validate { scene } => {
            let document = read_document(&scene)?;
            let report = validate_document(&document, &ComponentRegistry::with_builtins());
            print!("{report}");
            if !report.is_valid() {
                anyhow::bail!("{} is not a valid scene", scene.display());
            }
            println!("OK");
        }
        Commands::Load {
            scene,
            config,
            editor,
        } => {
            let mut config = read_config(config.as_deref())?;
            if editor {
                config.mode = LoadMode::Editor;
            }
            let document = read_document(&scene)?;
            let mut world = SceneWorld::new(config, ComponentRegistry::with_builtins())?;

            load_staged(&mut world, &document)?;
            print!("{}", SceneInspector::dump_tree(&world));
            println!("{}", SceneInspector::summary(&world));
            print_events(&mut world);

            let pending: Vec<_> = world
                .components()
                .entities_with(&tags::ASSET_PENDING)
                .collect();
            for entity in pending {
                world.settle_asset(entity, AssetOutcome::Loaded)?;
            }
            print_events(&mut world);
            println!("{}", SceneInspector::summary(&world));
        }
        Commands::Stream {
            scene,
            config,
            path,
        } => {
            let config = read_config(config.as_deref())?;
            let document = read_document(&scene)?;
            let mut world = SceneWorld::new(config, ComponentRegistry::with_builtins())?;
            world.load_scene(&document)?;
            println!("{}", SceneInspector::summary(&world));

            for observer in path {
                let created = world.update_dynamic_load(observer)?;
                println!(
                    "observer ({:.1}, {:.1}, {:.1}): {} materialized, {} deferred",
                    observer.x,
                    observer.y,
                    observer.z,
                    created.len(),
                    world.deferred().len()
                );
                for entity in created {
                    if let Some(info) = SceneInspector::inspect_entity(&world, entity) {
                        println!("  {info}");
                    }
                }
                if let Some(next) = SceneInspector::deferred_by_distance(&world, observer).first() {
                    println!(
                        "  nearest deferred: {} at {:.1} (triggers under {:.1})",
                        next.name, next.distance, next.trigger_distance
                    );
                }
            }
            println!("{}", SceneInspector::summary(&world));
        }
    }

    Ok(())
}

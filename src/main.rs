use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use glam::Vec2;
use rayon::prelude::*;

use atlas_batcher::build_info::BuildInfo;
use atlas_batcher::file_io;
use atlas_batcher::logging;
use atlas_batcher::manifest::AtlasManifest;
use atlas_batcher::settings::UserSettings;
use atlas_batcher::{
    AtlasBatcher, BatcherConfig, BatcherError, HeadlessBackend, Result, SourceImage, SubmitOptions,
};

#[allow(unused_imports)]
use log::{Level, trace, debug, info, warn, error};

#[derive(Parser, Debug)]
#[command(name = "atlas_batcher", version = BuildInfo::build_string(), about = "Skyline atlas packing and sprite batching")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,

    /// Settings file to use instead of the default location
    #[arg(long, global = true)]
    settings: Option<String>,

    /// Write the buffered log lines to the log directory before exiting
    #[arg(long, global = true)]
    export_logs: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pack images into one atlas PNG
    Pack {
        /// Image files or directories of images
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(long, default_value = "atlas.png")]
        out: PathBuf,
        /// Also write a JSON manifest of the placements
        #[arg(long)]
        manifest: Option<PathBuf>,
        /// Initial atlas width and height, overrides the settings file
        #[arg(long)]
        atlas_size: Option<u32>,
        /// Initial quad capacity, overrides the settings file
        #[arg(long)]
        capacity: Option<usize>,
    },
    /// Write the current settings, with comments, to the settings file
    InitSettings,
    /// Print build information
    Info,
}

fn pack(
    settings: &UserSettings,
    inputs: &[PathBuf],
    out: PathBuf,
    manifest: Option<PathBuf>,
    atlas_size: Option<u32>,
    capacity: Option<usize>,
) -> Result<()> {
    let mut config = BatcherConfig::from(settings);
    if let Some(atlas_size) = atlas_size {
        config.initial_atlas_size = atlas_size;
    }
    if let Some(capacity) = capacity {
        config.initial_sprite_capacity = capacity;
    }

    let paths = file_io::collect_image_paths(inputs);
    if paths.is_empty() {
        return Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no input images found").into());
    }
    info!("Decoding {} images", paths.len());

    let images = paths
        .par_iter()
        .map(|path| SourceImage::open(path).map(|image| (path.clone(), image)))
        .collect::<Result<Vec<_>>>()?;

    let mut batcher = AtlasBatcher::with_config(HeadlessBackend::default(), config)?;

    let mut handles = Vec::with_capacity(images.len());
    for (path, image) in &images {
        handles.push((path.clone(), batcher.create_handle(image)?));
    }

    // One quad per image at its atlas position, so the recorded frame mirrors the atlas
    for (_, handle) in &handles {
        let position = batcher
            .placement(handle)
            .map(|record| Vec2::new(record.bounds.x as f32, record.bounds.y as f32))
            .unwrap_or(Vec2::ZERO);
        batcher.draw_at(*handle, position)?;
    }

    let report = batcher.submit(SubmitOptions::default());
    let size = batcher.atlas_size();
    info!(
        "Packed {} images into a {}x{} atlas ({} uploads, {} draw calls)",
        handles.len(),
        size.width,
        size.height,
        report.uploads,
        report.draw_calls
    );

    let atlas = batcher
        .backend()
        .surface(batcher.atlas_surface())
        .ok_or_else(|| BatcherError::config("atlas surface missing after submit"))?;
    atlas.save(&out)?;
    info!("Wrote {}", out.display());

    if let Some(manifest_path) = manifest {
        AtlasManifest::from_batcher(&batcher, &out, &handles)?.save(&manifest_path)?;
        info!("Wrote {}", manifest_path.display());
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let shared_log_buffer = logging::setup_logger();
    logging::setup_panic_hook(Arc::clone(&shared_log_buffer));
    debug!("atlas_batcher {}", BuildInfo::display_version());

    let settings = UserSettings::load(cli.settings.as_deref());

    let result = match cli.cmd {
        Command::Pack { inputs, out, manifest, atlas_size, capacity } => {
            pack(&settings, &inputs, out, manifest, atlas_size, capacity)
        }
        Command::InitSettings => {
            let saved = match cli.settings.as_deref() {
                Some(path) => settings.save_to(std::path::Path::new(path)),
                None => settings.save(),
            };
            saved.map_err(BatcherError::config)
        }
        Command::Info => {
            println!("{}", BuildInfo::detailed_info());
            Ok(())
        }
    };

    if cli.export_logs {
        match logging::export_debug_logs(&shared_log_buffer) {
            Ok(path) => println!("Debug logs exported to {}", path.display()),
            Err(e) => eprintln!("Failed to export debug logs: {e}"),
        }
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

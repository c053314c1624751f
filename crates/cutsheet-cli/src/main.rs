use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use cutsheet_contracts::events::EventLog;
use cutsheet_contracts::request::GenerationParams;
use cutsheet_contracts::shots::SHOTS;
use cutsheet_engine::{
    ArchiveBundle, ClientConfig, QualityMode, Selection, SessionContext, TileSet,
};

#[derive(Debug, Parser)]
#[command(
    name = "cutsheet",
    version,
    about = "Turn one photo into a 3x3 cinematic contact sheet and export the cuts"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload a photo, generate the contact sheet, cut it and export a ZIP.
    Generate(GenerateArgs),
    /// Cut an existing contact sheet and export a ZIP (no generation call).
    Slice(SliceArgs),
    /// List the nine shot labels in grid order.
    Shots,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long, default_value = "1K")]
    resolution: String,
    #[arg(long, default_value = "16:9")]
    aspect_ratio: String,
    #[command(flatten)]
    export: ExportArgs,
}

#[derive(Debug, Parser)]
struct SliceArgs {
    #[arg(long)]
    composite: PathBuf,
    #[command(flatten)]
    export: ExportArgs,
}

#[derive(Debug, Args)]
struct ExportArgs {
    #[arg(long)]
    out: PathBuf,
    /// Cut numbers to export, e.g. `1,5,9`.
    #[arg(long, value_delimiter = ',', conflicts_with = "all")]
    select: Vec<usize>,
    #[arg(long)]
    all: bool,
    /// Upscale each exported cut (2x) before archiving.
    #[arg(long)]
    upscale: bool,
    /// Overrides FAL_KEY / FAL_API_KEY.
    #[arg(long)]
    api_key: Option<String>,
    #[arg(long)]
    events: Option<PathBuf>,
}

impl ExportArgs {
    fn open_session(&self) -> Result<SessionContext> {
        let config = ClientConfig::from_env()?.with_api_key(self.api_key.clone());
        let session_id = EventLog::new_session_id();
        let events = match &self.events {
            Some(path) => EventLog::with_file(path, session_id),
            None => EventLog::with_file(self.out.join("events.jsonl"), session_id),
        };
        Ok(SessionContext::with_fal(config, events)?)
    }

    fn quality(&self) -> QualityMode {
        if self.upscale {
            QualityMode::Upscale
        } else {
            QualityMode::Plain
        }
    }
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("cutsheet error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Generate(args) => run_generate(args),
        Command::Slice(args) => run_slice(args),
        Command::Shots => {
            for shot in SHOTS.iter() {
                println!("{}", shot.caption());
            }
            Ok(0)
        }
    }
}

fn run_generate(args: GenerateArgs) -> Result<i32> {
    let params = GenerationParams::parse(&args.resolution, &args.aspect_ratio)?;
    let bytes =
        fs::read(&args.image).with_context(|| format!("failed reading {}", args.image.display()))?;
    let mut session = args.export.open_session()?;
    let source = session.load_source(bytes)?;
    println!(
        "Loaded {} ({}x{}, {})",
        args.image.display(),
        source.width,
        source.height,
        source.mime
    );

    println!(
        "Generating 3x3 contact sheet at {} / {} (usually 1-2 minutes)...",
        params.resolution, params.aspect_ratio
    );
    session.generate(params).context("contact sheet generation failed")?;
    if let Some(composite) = session.composite() {
        let path = args.export.out.join("composite.png");
        write_file(&path, &composite.bytes)?;
        println!("Saved composite to {}", path.display());
    }
    export(&mut session, &args.export)
}

fn run_slice(args: SliceArgs) -> Result<i32> {
    let bytes = fs::read(&args.composite)
        .with_context(|| format!("failed reading {}", args.composite.display()))?;
    let mut session = args.export.open_session()?;
    session.load_composite(bytes)?;
    export(&mut session, &args.export)
}

fn export(session: &mut SessionContext, args: &ExportArgs) -> Result<i32> {
    let Some(tiles) = session.tiles() else {
        bail!("no tiles available");
    };
    print_tiles(tiles);

    if args.all {
        session.select_all();
    } else if !args.select.is_empty() {
        *session.selection_mut() = Selection::from_one_based(&args.select)?;
    } else {
        println!("No cuts selected; pass --select 1,5,9 or --all to export a ZIP.");
        return Ok(0);
    }

    let bundle = session.download(args.quality())?;
    let path = bundle.save_in(&args.out)?;
    print_bundle(&bundle, &path);
    Ok(0)
}

fn print_tiles(tiles: &TileSet) {
    let (width, height) = tiles.source_dimensions();
    println!("Cut {width}x{height} sheet into {} tiles:", tiles.len());
    for tile in tiles {
        println!(
            "  {:<32} {}x{} at ({}, {})",
            tile.shot.caption(),
            tile.bounds.width(),
            tile.bounds.height(),
            tile.bounds.left,
            tile.bounds.top
        );
    }
}

fn print_bundle(bundle: &ArchiveBundle, path: &Path) {
    for warning in &bundle.warnings {
        println!("warning: {warning}");
    }
    println!(
        "Wrote {} ({} files, {} upscaled, {} bytes, {})",
        path.display(),
        bundle.entries.len(),
        bundle.upscaled_count(),
        bundle.bytes.len(),
        bundle.mime
    );
    for entry in &bundle.entries {
        println!("  {}", entry.name);
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

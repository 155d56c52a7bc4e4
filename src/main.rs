use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use log::{info, LevelFilter};
use std::path::{Path, PathBuf};

use rom_asset_scanner::catalog::parse_hex;
use rom_asset_scanner::export::{
    split_rom, write_assets, write_map_csv, write_results_csv, write_scan_payloads, write_text_summary,
};
use rom_asset_scanner::scan::LogObserver;
use rom_asset_scanner::{AssetExtractor, Catalog, Pipeline, RomImage, ScannerConfig, VERSION};

/// Fin du code exécutable dans la ROM d'origine
const DEFAULT_BOUNDARY: &str = "0x000D8324";

#[derive(Parser)]
#[command(
    name = "rom-scanner",
    about = "Analyse une image ROM et en extrait les assets",
    version
)]
struct Cli {
    /// Fichier de configuration TOML
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbosité (-v: debug, -vv: trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan complet : blocs compressés, trous, fichiers non compressés
    Scan {
        /// Image ROM à analyser
        rom: PathBuf,

        /// Catalogue des fichiers connus (file_table.json)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Répertoire de sortie
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// N'écrit pas le contenu des fichiers découverts
        #[arg(long)]
        no_payloads: bool,
    },

    /// Extraction des assets décrits par le catalogue
    Extract {
        rom: PathBuf,
        catalog: PathBuf,
        output_dir: Option<PathBuf>,

        /// Limite l'extraction à une étiquette de type
        #[arg(long)]
        filter: Option<String>,
    },

    /// Sépare la ROM en code et assets
    Split {
        rom: PathBuf,
        out_dir: PathBuf,

        /// Adresse de la frontière (hexadécimal)
        #[arg(long, value_parser = parse_boundary, default_value = DEFAULT_BOUNDARY)]
        boundary: u32,
    },
}

fn parse_boundary(text: &str) -> Result<u32, String> {
    parse_hex(text).ok_or_else(|| format!("adresse hexadécimale invalide: {text}"))
}

fn level_filter(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG reste prioritaire sur -v
    env_logger::Builder::new()
        .filter_level(level_filter(cli.verbose))
        .parse_default_env()
        .init();
    info!("ROM Asset Scanner v{}", VERSION);

    let config = match &cli.config {
        Some(path) => ScannerConfig::load_from_file(path)?,
        None => ScannerConfig::default(),
    };

    match cli.command {
        Commands::Scan {
            rom,
            catalog,
            output_dir,
            no_payloads,
        } => run_scan(&config, &rom, catalog.as_deref(), output_dir, no_payloads),
        Commands::Extract {
            rom,
            catalog,
            output_dir,
            filter,
        } => run_extract(&config, &rom, &catalog, output_dir, filter.as_deref()),
        Commands::Split {
            rom,
            out_dir,
            boundary,
        } => {
            let rom = RomImage::map_file(&rom)?;
            split_rom(&rom, boundary, &out_dir)?;
            Ok(())
        }
    }
}

fn load_catalog(path: &Path) -> Result<Catalog> {
    Catalog::load(path).with_context(|| format!("catalogue invalide: {}", path.display()))
}

fn run_scan(
    config: &ScannerConfig,
    rom_path: &Path,
    catalog_path: Option<&Path>,
    output_dir: Option<PathBuf>,
    no_payloads: bool,
) -> Result<()> {
    // Entrées fatales vérifiées avant le scan
    let rom = RomImage::map_file(rom_path)?;
    let catalog = catalog_path.map(load_catalog).transpose()?;
    let output_dir = output_dir.unwrap_or_else(|| config.output.directory.clone());

    let report = Pipeline::new(&rom, catalog.as_ref(), &config.scan)?.run(&LogObserver::new());
    let results = report.results();

    write_results_csv(&output_dir.join(&config.output.results_csv), &results)?;
    write_map_csv(&output_dir.join(&config.output.map_csv), &report.map)?;

    if config.output.write_payloads && !no_payloads {
        let written = write_scan_payloads(&output_dir.join("files"), &rom, &results)?;
        info!("{} fichiers écrits dans {}", written, output_dir.join("files").display());
    }

    Ok(())
}

fn run_extract(
    config: &ScannerConfig,
    rom_path: &Path,
    catalog_path: &Path,
    output_dir: Option<PathBuf>,
    filter: Option<&str>,
) -> Result<()> {
    let rom = RomImage::map_file(rom_path)?;
    let mut catalog = load_catalog(catalog_path)?;
    if let Some(tag) = filter {
        catalog = catalog.filtered(tag)?;
        info!("Extraction limitée aux fichiers {}", tag);
    }
    if catalog.is_empty() {
        return Err(anyhow!("aucune entrée à extraire dans {}", catalog_path.display()));
    }
    let output_dir = output_dir.unwrap_or_else(|| config.extract.directory.clone());

    info!(
        "Extraction de {} fichiers ({} types)",
        catalog.len(),
        catalog.type_tags().count()
    );
    let assets = AssetExtractor::new(&rom).extract_all(&catalog, &LogObserver::new());
    let stats = write_assets(&output_dir, &assets)?;

    let rows: Vec<_> = assets.iter().filter_map(|asset| asset.text_row()).collect();
    if !rows.is_empty() {
        write_text_summary(&output_dir.join(&config.extract.text_summary_csv), &rows)?;
    }

    info!(
        "{} assets écrits: {} images, {} textes, {} bruts",
        stats.total(),
        stats.images,
        stats.texts,
        stats.raw
    );
    Ok(())
}

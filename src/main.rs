//! busca-doggo CLI
//!
//! ```sh
//! # Download, unpack and normalize the dataset described in metadata.json
//! busca-doggo get-dataset --verbose
//!
//! # Rebuild everything from an archive already on disk
//! busca-doggo get-dataset --force --from-archive stanford-dogs-dataset.zip
//!
//! # Images per breed
//! busca-doggo --meta-path other/metadata.json summary
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use busca_doggo::{
    logging, Credentials, Dataset, DatasetConfig, DatasetHost, DogBreedDataset, KaggleClient,
    LocalArchive, Metadata,
};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "busca-doggo", version, about = "Dog breed dataset acquisition")]
struct Cli {
    /// Project metadata file (paths, logger settings)
    #[arg(long, global = true, default_value = "metadata.json")]
    meta_path: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download, unpack and normalize the dataset
    GetDataset {
        /// Redo every step even if its output already exists
        #[arg(short, long)]
        force: bool,

        /// Show progress bars
        #[arg(short, long)]
        verbose: bool,

        /// Use this archive instead of downloading it
        #[arg(long, value_name = "ZIP")]
        from_archive: Option<PathBuf>,
    },

    /// Print the number of images per breed
    Summary,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let metadata = Metadata::from_file(&cli.meta_path)
        .with_context(|| format!("loading metadata from {}", cli.meta_path.display()))?;

    logging::setup_logs_folder(&metadata.logger_path("folder")?)
        .context("creating logs folder")?;
    logging::setup_logger(Some(&metadata.logger_path("config")?))
        .context("configuring logger")?;
    log::info!(
        "Starting {} {} CLI",
        metadata.project_name(),
        metadata.version()
    );

    match cli.command {
        Command::GetDataset {
            force,
            verbose,
            from_archive,
        } => get_dataset(&metadata, force, verbose, from_archive),
        Command::Summary => summary(&metadata),
    }
}

fn get_dataset(
    metadata: &Metadata,
    force: bool,
    verbose: bool,
    from_archive: Option<PathBuf>,
) -> Result<()> {
    let config = DatasetConfig::from_metadata(metadata, force, verbose)?;

    let host: Box<dyn DatasetHost> = match from_archive {
        Some(path) => Box::new(LocalArchive::new(path)),
        None => {
            let credentials =
                Credentials::discover().context("looking up dataset host credentials")?;
            Box::new(KaggleClient::authenticate(credentials)?)
        }
    };

    let dataset = DogBreedDataset::prepare(&config, host.as_ref())
        .with_context(|| format!("preparing dataset {}", config.dataset))?;
    log::info!(
        "{} images of {} breeds ready in {}",
        dataset.len(),
        dataset.index().classes().len(),
        dataset.root().display()
    );
    Ok(())
}

fn summary(metadata: &Metadata) -> Result<()> {
    let image_dir = metadata.data_path("image_path")?;
    let dataset = DogBreedDataset::open(&image_dir)
        .with_context(|| format!("opening {}", image_dir.display()))?;

    let counts = dataset.index().label_counts();
    let width = counts.keys().map(|k| k.len()).max().unwrap_or(0);
    for (label, count) in &counts {
        println!("{label:<width$}  {count:>5}");
    }
    println!("{} images, {} breeds", dataset.len(), counts.len());
    Ok(())
}

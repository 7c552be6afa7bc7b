use clap::{Parser, Subcommand};
use listing_intake::config::{self, IntakeConfig};
use listing_intake::form::{Field, FormManager};
use listing_intake::imaging::RustBackend;
use listing_intake::output;
use listing_intake::selection::{self, SelectionPolicy};
use listing_intake::session::{IntakeError, IntakeSession};
use listing_intake::store::{FsDocumentStore, FsObjectStore};
use listing_intake::types::CandidateFile;
use listing_intake::upload::{IntakeEvent, ProgressTracker, Uploader};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "listing-intake")]
#[command(about = "Photo and contact-detail intake for a rental listing")]
#[command(long_about = "\
Photo and contact-detail intake for a rental listing

Photos are checked against the image limit, re-encoded as JPEG under the size
budget, and stored as image-1.jpeg, image-2.jpeg, ... after the images already
stored. Contact details are validated and appended to the document store.

Limits (defaults):
  At most 10 images in total, including those already stored
  Files over 30 MB, or not JPEG/PNG, are skipped
  Each stored image is at most 1 MB

Set RUST_LOG=debug to trace each compression attempt.
Run 'listing-intake gen-config' to generate a documented intake.toml.")]
#[command(version)]
struct Cli {
    /// Config file (stock defaults when missing)
    #[arg(long, default_value = config::CONFIG_FILE_NAME, global = true)]
    config: PathBuf,

    /// Store directory, overriding storage.root
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show how many images are already stored
    Count,
    /// Compress and upload images
    Upload(UploadArgs),
    /// Validate and save contact details
    Submit(ContactArgs),
    /// Print a stock intake.toml with all options documented
    GenConfig,
}

#[derive(clap::Args)]
struct UploadArgs {
    /// Keep the images that uploaded when others fail
    #[arg(long)]
    keep_going: bool,

    /// Image files, in the order they should be numbered
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[derive(clap::Args)]
struct ContactArgs {
    #[arg(long)]
    housing_name: String,
    /// Digits only
    #[arg(long)]
    street_number: String,
    #[arg(long)]
    street_name: String,
    /// Digits only
    #[arg(long)]
    post_code: String,
    #[arg(long)]
    town: String,
    #[arg(long)]
    country: String,
    #[arg(long)]
    site_web: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    surname: String,
}

impl ContactArgs {
    fn values(&self) -> [(Field, &str); 9] {
        [
            (Field::HousingName, self.housing_name.as_str()),
            (Field::StreetNumber, self.street_number.as_str()),
            (Field::StreetName, self.street_name.as_str()),
            (Field::PostCode, self.post_code.as_str()),
            (Field::Town, self.town.as_str()),
            (Field::Country, self.country.as_str()),
            (Field::SiteWeb, self.site_web.as_str()),
            (Field::Name, self.name.as_str()),
            (Field::Surname, self.surname.as_str()),
        ]
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging();

    match &cli.command {
        Command::Count => {
            let (config, root) = load(&cli)?;
            let objects = object_store(&config, &root);
            let uploader = Uploader::from_config(&objects, &config.storage);
            let count = uploader.refresh_existing_count().map_err(|e| {
                error!(error = %e, "listing failed");
                output::upload_message(&e)
            })?;
            if count == 0 {
                println!("No images stored yet.");
            }
            output::print_existing_count(count);
        }
        Command::Upload(args) => {
            let (config, root) = load(&cli)?;
            init_thread_pool(&config.processing);
            let objects = object_store(&config, &root);
            let policy = SelectionPolicy::from_config(&config.selection);
            let candidates: Vec<CandidateFile> = args
                .files
                .iter()
                .map(|path| selection::load_candidate(path, &policy))
                .collect();
            let (tx, rx) = mpsc::channel();
            let printer = std::thread::spawn(move || {
                let mut progress = ProgressTracker::new();
                for event in rx {
                    for line in output::format_event(&event) {
                        println!("{}", line);
                    }
                    progress.observe(&event);
                    if let Some(bar) = output::format_progress(progress.percent()) {
                        println!("{}", bar);
                    }
                }
            });
            let mut summary = Vec::new();
            let result = run_upload(
                &objects,
                &config,
                candidates,
                args.keep_going,
                tx,
                &mut summary,
            );
            printer
                .join()
                .map_err(|_| "progress printer panicked")?;
            for line in summary {
                println!("{}", line);
            }
            result?;
        }
        Command::Submit(args) => {
            let (config, root) = load(&cli)?;
            let documents = FsDocumentStore::new(&root);
            let mut manager = FormManager::from_config(&config.form, &config.documents);
            for (field, value) in args.values() {
                if let Err(e) = manager.input(field, value) {
                    return Err(format!("{field}: {e}").into());
                }
            }
            let id = manager.submit(&documents).map_err(|e| {
                error!(error = ?e, "submission failed");
                e.to_string()
            })?;
            if let Some(message) = manager.success_message() {
                println!("{}", message);
            }
            println!("    id: {}", id);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load the config and resolve the store root (`--store` wins over the file).
fn load(cli: &Cli) -> Result<(IntakeConfig, PathBuf), config::ConfigError> {
    let config = config::load_config(&cli.config)?;
    let root = cli
        .store
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.storage.root));
    Ok((config, root))
}

fn object_store(config: &IntakeConfig, root: &Path) -> FsObjectStore {
    FsObjectStore::new(root, Some(config.storage.public_base_url.clone()))
}

/// Mount a session, gate and compress the files, then upload them.
///
/// Lines for the final summary go to `summary`, to be printed once the
/// progress printer has finished. Returns the user-facing message on
/// failure; details go to the log.
fn run_upload(
    objects: &FsObjectStore,
    config: &IntakeConfig,
    candidates: Vec<CandidateFile>,
    keep_going: bool,
    events: Sender<IntakeEvent>,
    summary: &mut Vec<String>,
) -> Result<(), String> {
    let backend = RustBackend::new();
    let mut session = IntakeSession::new(&backend, objects, config)
        .map_err(|e| e.to_string())?
        .with_events(events);

    let report = |e: IntakeError| {
        error!(error = %e, "intake failed");
        output::user_message(&e)
    };

    // Nothing has been sent to the printer yet.
    let existing = session.mount().map_err(report)?;
    output::print_existing_count(existing);

    if session.choose_files(candidates).map_err(report)? == 0 {
        summary.push("Nothing to upload.".to_string());
        return Ok(());
    }

    if keep_going {
        let outcomes = session.upload_each();
        summary.extend(output::format_outcomes(&outcomes));
        match session.status() {
            Some(message) => Err(message.to_string()),
            None => Ok(()),
        }
    } else {
        let results = session.upload().map_err(report)?;
        summary.extend(output::format_upload_results(results));
        Ok(())
    }
}

/// Log to stderr; `RUST_LOG` overrides the default `warn` level.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

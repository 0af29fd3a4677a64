//! blobfs-cli - Command-line interface for the blobfs adapter
//!
//! Reads blobs from Azure Blob Storage (or the Azurite emulator) through the
//! same filesystem contract the library exposes:
//! - Streaming an object to stdout, whole or in part
//! - Positional reads
//! - Stat, listing and normalized metadata, optionally as JSON

use anyhow::{Context, Result};
use blobfs::{
    Backend, BlobFileSystem, BlobFsError, BlobFsOptions, ErrorKind, InputStream, RandomAccessFile,
};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

mod output;

/// Bytes requested per read when copying an object to stdout
const COPY_CHUNK_SIZE: usize = 1024 * 1024;

/// blobfs - Read-only access to Azure Blob Storage
///
/// Paths take the form `container/path/to/object`. URIs such as
/// `abfss://...` are not accepted.
#[derive(Parser)]
#[command(name = "blobfs")]
#[command(author, version, about = "Read-only access to Azure Blob Storage", long_about = None)]
struct Cli {
    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file to load instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Talk to a local Azurite emulator
    #[arg(long, global = true)]
    azurite: bool,

    /// Storage account name
    #[arg(long, global = true)]
    account: Option<String>,

    /// Blob service endpoint, e.g. http://127.0.0.1:10000/devstoreaccount1
    #[arg(long, global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an object to stdout
    Cat {
        /// Object path
        path: String,
    },

    /// Write the first bytes of an object to stdout
    Head {
        /// Object path
        path: String,

        /// Number of bytes to read
        #[arg(short = 'n', long, default_value_t = 1024)]
        bytes: usize,
    },

    /// Write a byte range of an object to stdout
    ReadAt {
        /// Object path
        path: String,

        /// Offset of the first byte
        #[arg(long)]
        offset: u64,

        /// Number of bytes to read
        #[arg(long)]
        length: usize,
    },

    /// Show what a path refers to
    Stat {
        /// Container, directory or object path
        path: String,

        /// Output format as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the normalized metadata of an object
    Meta {
        /// Object path
        path: String,

        /// Output format as JSON
        #[arg(long)]
        json: bool,
    },

    /// List a container or directory; lists containers when no path is given
    Ls {
        /// Container or directory path
        #[arg(default_value = "")]
        path: String,

        /// Output format as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show configuration
    Config {
        /// Show the effective configuration
        #[arg(long, conflicts_with_all = ["path", "init"])]
        show: bool,

        /// Show configuration file path
        #[arg(long, conflicts_with_all = ["show", "init"])]
        path: bool,

        /// Print an example configuration file
        #[arg(long, conflicts_with_all = ["show", "path"])]
        init: bool,
    },
}

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let result = run();

    match result {
        Ok(_) => process::exit(0),
        Err(e) => {
            error!("Error: {:#}", e);

            let exit_code = map_error_to_exit_code(&e);
            process::exit(exit_code);
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let options = load_options(&cli)?;
    debug!(?options, "Resolved options");

    let make_fs = || BlobFileSystem::make(options.clone());
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Cat { path } => {
            info!("Reading {}", path);
            let stream = make_fs()?.open_input_stream(&path)?;
            let mut total = 0u64;
            loop {
                let chunk = stream.read(COPY_CHUNK_SIZE)?;
                if chunk.is_empty() {
                    break;
                }
                total += chunk.len() as u64;
                out.write_all(&chunk)?;
            }
            stream.close()?;
            debug!(bytes = total, "Copied object");
        }

        Commands::Head { path, bytes } => {
            let stream = make_fs()?.open_input_stream(&path)?;
            out.write_all(&stream.read(bytes)?)?;
            stream.close()?;
        }

        Commands::ReadAt {
            path,
            offset,
            length,
        } => {
            let file = make_fs()?.open_input_file(&path)?;
            out.write_all(&file.read_at(offset, length)?)?;
            file.close()?;
        }

        Commands::Stat { path, json } => {
            let info = make_fs()?.get_file_info(&path)?;
            output::print_file_info(&mut out, &info, json)?;
        }

        Commands::Meta { path, json } => {
            let stream = make_fs()?.open_input_stream(&path)?;
            let metadata = stream.read_metadata()?;
            output::print_metadata(&mut out, &metadata, json)?;
        }

        Commands::Ls { path, json } => {
            let entries = make_fs()?
                .list(&path)
                .with_context(|| format!("Failed to list '{}'", path))?;
            output::print_listing(&mut out, &entries, json)?;
        }

        Commands::Config { show, path, init } => {
            handle_config(&mut out, &options, show, path, init)?;
        }
    }

    out.flush()?;
    Ok(())
}

/// Options from the config file, adjusted by command-line flags
fn load_options(cli: &Cli) -> Result<BlobFsOptions> {
    let mut options = match &cli.config {
        Some(path) => BlobFsOptions::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None if cli.azurite => BlobFsOptions::azurite(),
        None => BlobFsOptions::load()?,
    };

    if cli.azurite {
        options.backend = Backend::Azurite;
    }
    if let Some(account) = &cli.account {
        options.account_name = account.clone();
    }
    if let Some(endpoint) = &cli.endpoint {
        options.blob_endpoint = Some(endpoint.clone());
    }
    Ok(options)
}

fn handle_config(
    out: &mut impl Write,
    options: &BlobFsOptions,
    show: bool,
    path: bool,
    init: bool,
) -> Result<()> {
    if path {
        writeln!(out, "{}", BlobFsOptions::config_path()?.display())?;
    } else if init {
        write!(out, "{}", BlobFsOptions::default_config_content())?;
    } else if show {
        writeln!(out, "{:#?}", options)?;
    } else {
        writeln!(out, "Use --show, --path or --init")?;
    }
    Ok(())
}

fn map_error_to_exit_code(err: &anyhow::Error) -> i32 {
    if let Some(blob_err) = err.downcast_ref::<BlobFsError>() {
        match blob_err.kind() {
            ErrorKind::NotFound => 2,
            ErrorKind::Io => 2,
            ErrorKind::InvalidArgument => 3,
            ErrorKind::InvalidState => 3,
        }
    } else if err.is::<std::io::Error>() {
        2
    } else {
        1
    }
}

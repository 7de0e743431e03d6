//! qtag - command-line front end for queue-slot tags
//!
//! Drives the session controller against tag images stored as JSON files,
//! standing in for the proximity hardware.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use qtag_common::config::{LoggingConfig, TomlConfig};
use qtag_common::ScanContext;
use qtag_nfc::codec::{self, NdefMessage, RecordProfile};
use qtag_nfc::transport::simulated::DEFAULT_CAPACITY;
use qtag_nfc::transport::{SimulatedTransport, TagImage};
use qtag_nfc::{classify, Identifier, Role, ScanResult, TagController, WriteRequest};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// qtag - read and write queue-slot tags
#[derive(Parser, Debug)]
#[command(name = "qtag")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a tag image file
    InitTag {
        /// Tag image to create
        #[arg(long)]
        tag: PathBuf,

        /// Bytes available for records
        #[arg(long, default_value_t = DEFAULT_CAPACITY)]
        capacity: usize,

        /// Create the tag already locked
        #[arg(long, conflicts_with = "unsupported")]
        read_only: bool,

        /// Create a tag without the supported record format
        #[arg(long)]
        unsupported: bool,
    },

    /// Run a read session against a tag image
    Read {
        #[arg(long)]
        tag: PathBuf,

        /// Read for diagnostics (either role accepted)
        #[arg(long)]
        diagnostics: bool,
    },

    /// Run a write session against a tag image
    Write {
        #[arg(long)]
        tag: PathBuf,

        /// Queue-slot identifier
        #[arg(long)]
        id: String,

        /// primary (staff) or secondary (customer)
        #[arg(long)]
        role: Role,

        /// Permanently lock the tag after writing
        #[arg(long)]
        lock: bool,
    },

    /// Print the encoded message for an identifier
    Encode {
        #[arg(long)]
        id: String,

        #[arg(long)]
        role: Role,
    },

    /// Decode and classify a hex-encoded message
    Decode {
        /// Message bytes as hex
        hex: String,

        #[arg(long)]
        diagnostics: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = TomlConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;
    init_tracing(&config.logging)?;

    match cli.command {
        Commands::InitTag {
            tag,
            capacity,
            read_only,
            unsupported,
        } => init_tag(&tag, capacity, read_only, unsupported),
        Commands::Read { tag, diagnostics } => read(&config, &tag, context_for(diagnostics)).await,
        Commands::Write {
            tag,
            id,
            role,
            lock,
        } => write(&config, &tag, Identifier::new(id, role), lock).await,
        Commands::Encode { id, role } => {
            let profile = RecordProfile::try_from(&config.record)?;
            let message = codec::encode(&Identifier::new(id, role), &profile);
            println!("{}", hex::encode(message.to_bytes()));
            println!("{} bytes, {} record(s)", message.byte_len(), message.len());
            Ok(())
        }
        Commands::Decode { hex, diagnostics } => decode(&config, &hex, context_for(diagnostics)),
    }
}

/// Log to stderr, or append to the configured file
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "qtag_nfc={level},qtag_common={level}",
            level = logging.level
        ))
    });

    match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(Mutex::new(file))
                        .with_ansi(false),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
    Ok(())
}

fn context_for(diagnostics: bool) -> ScanContext {
    if diagnostics {
        ScanContext::Diagnostics
    } else {
        ScanContext::Normal
    }
}

fn init_tag(path: &Path, capacity: usize, read_only: bool, unsupported: bool) -> Result<()> {
    let image = if unsupported {
        TagImage::unsupported()
    } else {
        let mut image = TagImage::blank(capacity);
        image.locked = read_only;
        image
    };
    image
        .save(path)
        .with_context(|| format!("Failed to write tag image {}", path.display()))?;
    info!("Created {} tag image {}", image.reported_capability(), path.display());
    Ok(())
}

fn load_tag(path: &Path) -> Result<SimulatedTransport> {
    let image = TagImage::load(path)
        .with_context(|| format!("Failed to load tag image {}", path.display()))?;
    Ok(SimulatedTransport::new(image))
}

async fn read(config: &TomlConfig, tag: &Path, context: ScanContext) -> Result<()> {
    let mut controller = TagController::from_config(load_tag(tag)?, config)?;

    match controller.start_read(context).await {
        Ok(result) => {
            print_result(&result)?;
            if !result.is_success() {
                bail!("Scan failed");
            }
            Ok(())
        }
        Err(e) => bail!("Read session failed: {}", e),
    }
}

async fn write(config: &TomlConfig, tag: &Path, payload: Identifier, lock: bool) -> Result<()> {
    let mut controller = TagController::from_config(load_tag(tag)?, config)?;
    let outcome = controller.start_write(WriteRequest::new(payload, lock)).await;

    // Persist whatever reached the tag, including a write whose lock failed
    if let Some(image) = controller.transport().tag() {
        image
            .save(tag)
            .with_context(|| format!("Failed to save tag image {}", tag.display()))?;
    }

    match outcome {
        Ok(report) => {
            println!(
                "Wrote {} bytes{}",
                report.bytes,
                if report.locked { " and locked the tag" } else { "" }
            );
            Ok(())
        }
        Err(e) => bail!("Write session failed: {}", e),
    }
}

fn decode(config: &TomlConfig, hex_message: &str, context: ScanContext) -> Result<()> {
    let bytes = hex::decode(hex_message.trim()).context("Message is not valid hex")?;
    let message = NdefMessage::from_bytes(&bytes).context("Message bytes are malformed")?;

    let profile = RecordProfile::try_from(&config.record)?;
    let decoded = codec::decode(message.records(), &profile);
    let outcome = classify(decoded.as_ref(), context);

    let result = ScanResult::from_outcome(
        outcome,
        qtag_common::TagCapability::ReadWrite,
        chrono::Utc::now(),
    );
    print_result(&result)
}

fn print_result(result: &ScanResult) -> Result<()> {
    match result {
        ScanResult::Success(observed) => println!(
            "{} ({}){}",
            observed.identifier.id,
            observed.identifier.role,
            if observed.is_read_only { ", read-only" } else { "" }
        ),
        ScanResult::Failure(reason) => println!("{}", reason),
    }
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}

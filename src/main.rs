//! Hatchway CLI - gateway-side operations
//!
//! `retrieve` pulls a stored file back through the public gateway;
//! `fetch-url` runs a policy-checked download and reports the blob.
//! Upload commits require backend credentials owned by the storage
//! collaborator and are driven through the library API.

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hatchway::codec::Encoding;
use hatchway::{resource, Args, ArchiveRetriever, UrlIngestor};

#[derive(Parser, Debug)]
#[command(name = "hatchway", version)]
struct Cli {
    #[command(flatten)]
    args: Args,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Retrieve a stored file through the public gateway
    Retrieve {
        /// Locator: bare CID path, /ipfs/ path, or ipfs:// URL
        path: String,
        /// Emit multibase-tagged text instead of bare base-64
        #[arg(long)]
        self_describing: bool,
        /// Write the raw bytes to stdout instead of encoded text
        #[arg(long)]
        raw: bool,
    },
    /// Download a URL under the ingestion policy and report the blob
    FetchUrl {
        url: String,
        /// Entry name recorded for the blob
        #[arg(long, default_value = "download")]
        name: String,
        /// Override the detected MIME type
        #[arg(long)]
        mime_type: Option<String>,
        /// Write the downloaded bytes to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let args = cli.args;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("hatchway={},info", args.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("Hatchway - content-addressed storage gateway");
    info!("Gateway: {}", args.gateway_url);

    match cli.command {
        Command::Retrieve {
            path,
            self_describing,
            raw,
        } => {
            let resource = resource::parse(&path)?;
            let retriever = ArchiveRetriever::new(&args.gateway_url, &args.user_agent)?;

            if raw {
                let stream = retriever.retrieve(&resource).await?;
                let bytes = stream.collect_bytes()?;
                std::io::stdout().write_all(&bytes)?;
            } else {
                let encoding = if self_describing {
                    Encoding::SelfDescribing
                } else {
                    Encoding::Plain
                };
                let result = retriever.retrieve_to_text(&resource, encoding).await?;
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
        }
        Command::FetchUrl {
            url,
            name,
            mime_type,
            output,
        } => {
            let policy = args.upload_policy();
            let ingestor = UrlIngestor::new(&args.user_agent)?;
            let blob = ingestor
                .fetch(&url, &name, mime_type.as_deref(), &policy, None)
                .await?;

            info!(name = %blob.name, size = blob.len(), mime = %blob.mime_type, "fetched");
            if let Some(path) = output {
                std::fs::write(&path, &blob.bytes)?;
                info!("written to {}", path.display());
            }
            println!(
                "{}",
                serde_json::json!({
                    "name": blob.name,
                    "size": blob.len(),
                    "mimeType": blob.mime_type,
                })
            );
        }
    }

    Ok(())
}

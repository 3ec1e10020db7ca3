//! Configuration for Hatchway
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::collections::HashSet;

use crate::policy::UrlUploadPolicy;

/// Hatchway - ingestion/retrieval gateway for content-addressed storage
#[derive(Parser, Debug, Clone)]
#[command(name = "hatchway")]
#[command(about = "Ingestion/retrieval gateway for content-addressed storage")]
pub struct Args {
    /// Public gateway base URL for retrieval and upload links
    #[arg(long, env = "GATEWAY_URL", default_value = "https://w3s.link")]
    pub gateway_url: String,

    /// Maximum accepted upload size in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value = "10485760")]
    pub max_upload_bytes: u64,

    /// Comma-separated URL schemes accepted for URL ingestion
    #[arg(long, env = "ALLOWED_SCHEMES", default_value = "https")]
    pub allowed_schemes: String,

    /// Accept any domain for URL ingestion
    #[arg(long, env = "ALLOW_ALL_DOMAINS", default_value = "false")]
    pub allow_all_domains: bool,

    /// Comma-separated domain allow-list (consulted only when
    /// --allow-all-domains is off)
    #[arg(long, env = "ALLOWED_DOMAINS", default_value = "")]
    pub allowed_domains: String,

    /// URL fetch timeout in milliseconds (0 disables the timer)
    #[arg(long, env = "FETCH_TIMEOUT_MS", default_value = "30000")]
    pub fetch_timeout_ms: u64,

    /// Signing key for the storage backend
    #[arg(long, env = "STORAGE_KEY")]
    pub storage_key: Option<String>,

    /// Base64-encoded space delegation for the storage backend
    #[arg(long, env = "STORAGE_DELEGATION")]
    pub storage_delegation: Option<String>,

    /// User-agent presented to gateways and ingestion targets
    #[arg(
        long,
        env = "USER_AGENT",
        default_value = concat!("hatchway/", env!("CARGO_PKG_VERSION"))
    )]
    pub user_agent: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Parsed scheme allow-list
    pub fn allowed_scheme_list(&self) -> Vec<String> {
        split_list(&self.allowed_schemes)
    }

    /// Parsed domain allow-list
    pub fn allowed_domain_list(&self) -> Vec<String> {
        split_list(&self.allowed_domains)
    }

    /// Assemble the ingestion policy from the configured surface
    pub fn upload_policy(&self) -> UrlUploadPolicy {
        UrlUploadPolicy {
            max_bytes: self.max_upload_bytes,
            allowed_schemes: self.allowed_scheme_list().into_iter().collect::<HashSet<_>>(),
            allow_all_domains: self.allow_all_domains,
            allowed_domains: self.allowed_domain_list().into_iter().collect::<HashSet<_>>(),
            fetch_timeout_ms: self.fetch_timeout_ms,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if url::Url::parse(&self.gateway_url).is_err() {
            return Err(format!("GATEWAY_URL is not a valid URL: {}", self.gateway_url));
        }
        self.upload_policy().validate()?;
        Ok(())
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

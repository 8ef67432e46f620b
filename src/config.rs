//! Process-wide configuration, constructed once at startup and shared
//! read-only via `axum::extract::State` (see `http_server::AppState`).
//!
//! Mirrors the teacher's `bin/kotadb-api-server.rs` pattern of a `clap`
//! `Parser` struct whose fields double as environment variables.

use anyhow::{bail, Result};
use clap::Parser;
use url::Url;
use uuid::Uuid;

const DEFAULT_PAGE_SIZE_DEFAULT: u32 = 20;
const DEFAULT_PAGE_SIZE_MAX: u32 = 50;
const DEFAULT_DOWNSTREAM_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_PORT: u16 = 8000;

/// Raw CLI/env surface. `DB_ENDPOINT` and `PGREST_ENDPOINT` are both accepted
/// (some deployments use the latter name); exactly one must resolve.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Query-translation gateway over a REST-over-PostgreSQL table service")]
pub struct ConfigArgs {
    #[arg(long, env = "DB_ENDPOINT")]
    pub db_endpoint: Option<String>,

    #[arg(long, env = "PGREST_ENDPOINT")]
    pub pgrest_endpoint: Option<String>,

    #[arg(long, env = "SERVER_NAME", default_value = "localhost")]
    pub server_name: String,

    #[arg(long, env = "SCHEME", default_value = "http")]
    pub scheme: String,

    #[arg(long, env = "PAGE_SIZE_DEFAULT", default_value_t = DEFAULT_PAGE_SIZE_DEFAULT)]
    pub page_size_default: u32,

    #[arg(long, env = "PAGE_SIZE_MAX", default_value_t = DEFAULT_PAGE_SIZE_MAX)]
    pub page_size_max: u32,

    /// Comma-separated list of resource UUIDs granted aggregation access
    /// regardless of the directory-derived `aggregation_allowed` flag.
    #[arg(long, env = "ALLOW_AGGREGATION", default_value = "")]
    pub allow_aggregation: String,

    #[arg(long, env = "SENTRY_DSN")]
    pub sentry_dsn: Option<String>,

    #[arg(long, env = "SENTRY_ENV")]
    pub sentry_env: Option<String>,

    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    #[arg(long, env = "DOWNSTREAM_TIMEOUT_MS", default_value_t = DEFAULT_DOWNSTREAM_TIMEOUT_MS)]
    pub downstream_timeout_ms: u64,
}

/// Validated configuration. Constructing one is the only place config
/// parsing errors can occur; everything downstream treats these fields as
/// already-correct.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub downstream_base: Url,
    pub server_name: String,
    pub scheme: String,
    pub page_size_default: u32,
    pub page_size_max: u32,
    pub allow_aggregation: Vec<Uuid>,
    pub sentry_dsn: Option<String>,
    pub sentry_env: Option<String>,
    pub port: u16,
    pub downstream_timeout_ms: u64,
}

impl GatewayConfig {
    /// Validate and normalize raw CLI/env arguments.
    ///
    /// # Preconditions
    /// - Exactly one of `db_endpoint`/`pgrest_endpoint` is set and parses as
    ///   a URL (DB_ENDPOINT takes precedence when both are present).
    /// - `scheme` is `http` or `https`.
    /// - `1 <= page_size_default <= page_size_max`.
    /// - Every entry in `allow_aggregation` parses as a UUID.
    pub fn from_args(args: ConfigArgs) -> Result<Self> {
        let endpoint = args
            .db_endpoint
            .or(args.pgrest_endpoint)
            .ok_or_else(|| anyhow::anyhow!("one of DB_ENDPOINT or PGREST_ENDPOINT is required"))?;
        let downstream_base = Url::parse(&endpoint)?;

        if args.scheme != "http" && args.scheme != "https" {
            bail!("SCHEME must be 'http' or 'https', got '{}'", args.scheme);
        }
        if args.page_size_default < 1 {
            bail!("PAGE_SIZE_DEFAULT must be >= 1");
        }
        if args.page_size_max < args.page_size_default {
            bail!("PAGE_SIZE_MAX must be >= PAGE_SIZE_DEFAULT");
        }

        let allow_aggregation = args
            .allow_aggregation
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Uuid::parse_str)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            downstream_base,
            server_name: args.server_name,
            scheme: args.scheme,
            page_size_default: args.page_size_default,
            page_size_max: args.page_size_max,
            allow_aggregation,
            sentry_dsn: args.sentry_dsn,
            sentry_env: args.sentry_env,
            port: args.port,
            downstream_timeout_ms: args.downstream_timeout_ms,
        })
    }

    pub fn public_base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.server_name)
    }
}

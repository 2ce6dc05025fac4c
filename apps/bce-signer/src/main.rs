//! bce-signer - sign and verify requests with `bce-signer-v1`.
//!
//! # Usage
//!
//! ```text
//! BCE_ACCESS_KEY=ak BCE_SECRET_KEY=sk bce-signer sign --url https://bucket.bj.bcebos.com/object
//! bce-signer sign --url https://bucket.bj.bcebos.com/object --query
//! bce-signer verify --url https://bucket.bj.bcebos.com/object \
//!     -H 'x-bce-date: 2024-01-01T00:00:00Z' --auth 'bce-signer-v1/...'
//! bce-signer config
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `BCE_ACCESS_KEY` | *(unset)* | Access key identifier |
//! | `BCE_SECRET_KEY` | *(unset)* | Secret key |
//! | `BCE_EXPIRATION_SECONDS` | `1800` | Validity window of produced signatures |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

mod config;

use anyhow::{Context, Result, bail};
use bce_auth::signing::{format_timestamp, parse_timestamp};
use bce_auth::transport::{Placement, sign_request, verify_request_at};
use bce_auth::{SigningContext, StaticCredentialProvider};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use http::header::AUTHORIZATION;
use http::{HeaderName, HeaderValue};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::SignerConfig;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "bce-signer",
    version,
    about = "Sign and verify HTTP requests with bce-signer-v1 AK/SK authentication."
)]
struct Cli {
    /// Access key (overrides BCE_ACCESS_KEY)
    #[arg(long, global = true)]
    access_key: Option<String>,
    /// Secret key (overrides BCE_SECRET_KEY)
    #[arg(long, global = true)]
    secret_key: Option<String>,
    /// Subcommand to run
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign a request and print what to send
    Sign {
        #[command(flatten)]
        request: RequestArgs,
        /// Signing timestamp, YYYY-MM-DDTHH:MM:SSZ (defaults to now)
        #[arg(long)]
        timestamp: Option<String>,
        /// Validity window in seconds (overrides BCE_EXPIRATION_SECONDS)
        #[arg(long)]
        expiration: Option<u64>,
        /// Put the authentication string in the URL instead of a header
        #[arg(long)]
        query: bool,
    },
    /// Verify a signed request against the configured credential
    Verify {
        #[command(flatten)]
        request: RequestArgs,
        /// Authentication string; read from the headers or URL when omitted
        #[arg(long)]
        auth: Option<String>,
        /// Verification time, YYYY-MM-DDTHH:MM:SSZ (defaults to now)
        #[arg(long)]
        now: Option<String>,
    },
    /// Print the effective configuration as JSON
    Config,
}

#[derive(Args, Debug)]
struct RequestArgs {
    /// HTTP method
    #[arg(long, default_value = "GET")]
    method: String,
    /// Full request URL
    #[arg(long)]
    url: String,
    /// Extra header, `Name: value` (repeatable)
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,
}

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Parse a `Name: value` header argument.
fn parse_header(raw: &str) -> Result<(HeaderName, HeaderValue)> {
    let (name, value) = raw
        .split_once(':')
        .with_context(|| format!("header must look like 'Name: value', got {raw:?}"))?;
    let name = HeaderName::try_from(name.trim())
        .with_context(|| format!("invalid header name in {raw:?}"))?;
    let value = HeaderValue::from_str(value.trim_start())
        .with_context(|| format!("invalid header value in {raw:?}"))?;
    Ok((name, value))
}

/// Parse a timestamp argument, or take the current time.
fn parse_instant(raw: Option<&str>) -> Result<DateTime<Utc>> {
    match raw {
        Some(raw) => parse_timestamp(raw)
            .with_context(|| format!("timestamp must be YYYY-MM-DDTHH:MM:SSZ, got {raw:?}")),
        None => Ok(Utc::now()),
    }
}

/// Build an `http::Request` from the command-line description.
fn build_request(args: &RequestArgs) -> Result<http::Request<()>> {
    let mut builder = http::Request::builder()
        .method(args.method.to_uppercase().as_str())
        .uri(args.url.as_str());
    for raw in &args.headers {
        let (name, value) = parse_header(raw)?;
        builder = builder.header(name, value);
    }
    builder
        .body(())
        .with_context(|| format!("invalid request {} {}", args.method, args.url))
}

fn run_sign(
    config: &SignerConfig,
    args: &RequestArgs,
    timestamp: Option<&str>,
    expiration: Option<u64>,
    query: bool,
) -> Result<()> {
    let credential = config.credential()?;
    let signed_at = parse_instant(timestamp)?;
    let validity = expiration.unwrap_or(config.expiration_secs);
    let ctx = SigningContext::at(credential, signed_at, validity);

    let mut request = build_request(args)?;
    let placement = if query {
        Placement::Query
    } else {
        Placement::Header
    };
    let auth = sign_request(&mut request, &ctx, placement)?;

    info!(
        access_key = %ctx.credential().access_key(),
        timestamp = %ctx.timestamp(),
        validity_secs = validity,
        signed_headers = %auth.signed_headers().join(";"),
        "signed request"
    );

    println!("{} {}", request.method(), request.uri());
    for (name, value) in request.headers() {
        println!("{name}: {}", value.to_str().unwrap_or("<binary>"));
    }

    Ok(())
}

fn run_verify(
    config: &SignerConfig,
    args: &RequestArgs,
    auth: Option<&str>,
    now: Option<&str>,
) -> Result<()> {
    let credential = config.credential()?;
    let provider = StaticCredentialProvider::from(&credential);
    let now = parse_instant(now)?;

    let mut request = build_request(args)?;
    if let Some(auth) = auth {
        let value = HeaderValue::from_str(auth).context("invalid authentication string")?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }
    let (parts, ()) = request.into_parts();

    match verify_request_at(&parts, &provider, now) {
        Ok(result) => {
            println!(
                "ok: access_key={} signed_at={} expires_at={} signed_headers={}",
                result.access_key,
                format_timestamp(result.signed_at),
                format_timestamp(result.expires_at),
                result.signed_headers.join(";")
            );
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "request rejected");
            bail!("rejected: {e}")
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = SignerConfig::from_env()?;
    if let Some(access_key) = cli.access_key {
        config.access_key = Some(access_key);
    }
    if let Some(secret_key) = cli.secret_key {
        config.secret_key = Some(secret_key);
    }

    init_tracing(&config.log_level)?;

    match &cli.command {
        Command::Sign {
            request,
            timestamp,
            expiration,
            query,
        } => run_sign(
            &config,
            request,
            timestamp.as_deref(),
            *expiration,
            *query,
        ),
        Command::Verify { request, auth, now } => {
            run_verify(&config, request, auth.as_deref(), now.as_deref())
        }
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

//! Sigil CLI - credential and signature tooling
//!
//! Loads a credentials file, builds the same backend chain a front end
//! would use and runs lookups, signing and verification against it.
//! Every command prints JSON on stdout.

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use sigil_auth::presign::{presign_v4_query, sign_v4_headers};
use sigil_auth::{
    AuthRequest, Authentication, Backend, BackendChain, CredentialConfig, InMemoryBackend,
    KeyPair, RequestVerifier, V4Signer, VerifierConfig,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "sigil-cli")]
#[command(about = "Sigil credential and signature CLI")]
#[command(version)]
struct Args {
    /// Credentials file (JSON authdata)
    #[arg(short, long, env = "SIGIL_CREDENTIALS")]
    credentials: Option<PathBuf>,

    /// Region used for signing
    #[arg(short, long, env = "SIGIL_REGION", default_value = "us-east-1")]
    region: String,

    /// Per-backend timeout in milliseconds
    #[arg(long)]
    backend_timeout_ms: Option<u64>,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the credentials file
    CheckConfig,
    /// Resolve emails to canonical IDs
    CanonicalIds {
        /// Email addresses
        #[arg(required = true)]
        emails: Vec<String>,
    },
    /// Resolve canonical IDs to emails
    Emails {
        /// Canonical IDs
        #[arg(required = true)]
        canonical_ids: Vec<String>,
    },
    /// Resolve canonical IDs to account IDs
    AccountIds {
        /// Canonical IDs
        #[arg(required = true)]
        canonical_ids: Vec<String>,
    },
    /// Sign a request with SigV4 and print it as JSON
    SignV4 {
        /// Access key to sign with (secret comes from the credentials file)
        #[arg(short, long)]
        access_key: String,
        /// HTTP method
        #[arg(short, long, default_value = "GET")]
        method: String,
        /// Request path
        #[arg(short, long, default_value = "/")]
        path: String,
        /// Host header
        #[arg(long, default_value = "localhost")]
        host: String,
        /// Service in the credential scope
        #[arg(long, default_value = "s3")]
        service: String,
        /// Extra header as `name:value`
        #[arg(long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,
        /// Query parameter as `name=value`
        #[arg(long = "query", value_parser = parse_query_param)]
        query: Vec<(String, String)>,
        /// Presign with this lifetime in seconds instead of an Authorization header
        #[arg(long)]
        presign_expires: Option<u64>,
    },
    /// Verify a request stored as JSON
    Verify {
        /// Path to the request JSON (as printed by sign-v4)
        request: PathBuf,
    },
    /// Report backend health
    Health,
}

fn parse_header(value: &str) -> Result<(String, String), String> {
    value
        .split_once(':')
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .ok_or_else(|| format!("expected name:value, got {value}"))
}

fn parse_query_param(value: &str) -> Result<(String, String), String> {
    Ok(value
        .split_once('=')
        .map_or_else(|| (value.to_string(), String::new()), |(k, v)| (k.to_string(), v.to_string())))
}

fn load_config(path: Option<&Path>) -> Result<Option<CredentialConfig>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let config = CredentialConfig::from_file(path)
        .with_context(|| format!("Failed to load credentials from {}", path.display()))?;
    info!(
        path = %path.display(),
        accounts = config.accounts.len(),
        "Loaded credentials"
    );
    Ok(Some(config))
}

fn build_chain(config: Option<&CredentialConfig>, timeout: Option<Duration>) -> Result<BackendChain> {
    let memory: Arc<dyn Backend> = Arc::new(InMemoryBackend::new(config));
    let chain = BackendChain::new(vec![memory])?;
    Ok(match timeout {
        Some(timeout) => chain.with_timeout(timeout),
        None => chain,
    })
}

async fn run(args: Args) -> Result<Value> {
    let config = load_config(args.credentials.as_deref())?;
    let verifier_config = VerifierConfig {
        backend_timeout: args.backend_timeout_ms.map(Duration::from_millis),
        ..VerifierConfig::default()
    };
    let chain = build_chain(config.as_ref(), verifier_config.backend_timeout)?;

    let output = match args.command {
        Commands::CheckConfig => {
            let Some(config) = config else {
                bail!("check-config needs --credentials or SIGIL_CREDENTIALS");
            };
            let issues: Vec<Value> = config
                .validate()
                .iter()
                .map(|issue| json!({ "issue": issue, "message": issue.to_string() }))
                .collect();
            json!({
                "valid": issues.is_empty(),
                "accounts": config.accounts.len(),
                "keys": config.key_count(),
                "issues": issues,
            })
        }
        Commands::CanonicalIds { emails } => json!(chain.get_canonical_ids(&emails).await?),
        Commands::Emails { canonical_ids } => {
            json!(chain.get_email_addresses(&canonical_ids).await?)
        }
        Commands::AccountIds { canonical_ids } => {
            let memory = InMemoryBackend::new(config.as_ref());
            json!(memory.get_account_ids(&canonical_ids))
        }
        Commands::SignV4 {
            access_key,
            method,
            path,
            host,
            service,
            headers,
            query,
            presign_expires,
        } => {
            let secret = InMemoryBackend::new(config.as_ref())
                .index()
                .secret_key(&access_key)
                .with_context(|| format!("Access key {access_key} is not in the credentials"))?;
            let key = KeyPair::new(access_key, secret);
            let signer = V4Signer::new(&key, &args.region, Utc::now()).with_service(&service);

            let mut request = AuthRequest::new(method, path).with_header("host", host);
            for (name, value) in headers {
                request = request.with_header(&name, value);
            }
            for (name, value) in query {
                request = request.with_query(name, value);
            }

            match presign_expires {
                Some(secs) => presign_v4_query(&mut request, &signer, Duration::from_secs(secs))?,
                None => sign_v4_headers(&mut request, &signer, sigil_auth::canonical::UNSIGNED_PAYLOAD)?,
            }
            serde_json::to_value(&request)?
        }
        Commands::Verify { request } => {
            let contents = std::fs::read_to_string(&request)
                .with_context(|| format!("Failed to read {}", request.display()))?;
            let request: AuthRequest =
                serde_json::from_str(&contents).context("Failed to parse request JSON")?;

            let verifier = RequestVerifier::new(Arc::new(chain), verifier_config);
            match verifier.authenticate(&request).await {
                Ok(Authentication::Anonymous) => json!({ "authenticated": false }),
                Ok(Authentication::Authenticated {
                    identity,
                    access_key,
                    streaming,
                }) => json!({
                    "authenticated": true,
                    "accessKey": access_key,
                    "identity": identity,
                    "streaming": streaming.is_some(),
                }),
                Err(e) => json!({
                    "authenticated": false,
                    "error": e.code(),
                    "status": e.http_status_code(),
                    "message": e.to_string(),
                }),
            }
        }
        Commands::Health => {
            let reports: Vec<Value> = chain
                .health_reports()
                .await
                .into_iter()
                .map(|report| match report.result {
                    Ok(status) => json!({ "backend": report.backend, "healthy": true, "status": status }),
                    Err(e) => json!({ "backend": report.backend, "healthy": false, "error": e.to_string() }),
                })
                .collect();
            json!(reports)
        }
    };
    Ok(output)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let output = run(args).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUTHDATA: &str = r#"{
        "accounts": [{
            "name": "Bart",
            "email": "bart@example.com",
            "arn": "arn:aws:iam::123456789012:root",
            "canonicalID": "canonical-bart",
            "shortid": "123456789012",
            "keys": [{ "access": "accessKey1", "secret": "verySecretKey1" }]
        }]
    }"#;

    fn write_credentials(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("authdata.json");
        std::fs::write(&path, AUTHDATA).unwrap();
        path
    }

    fn args(credentials: &Path, command: &[&str]) -> Args {
        let mut argv = vec!["sigil-cli", "--credentials", credentials.to_str().unwrap()];
        argv.extend_from_slice(command);
        Args::parse_from(argv)
    }

    #[test]
    fn test_parse_header_and_query() {
        assert_eq!(
            parse_header("Content-Type: text/plain").unwrap(),
            ("Content-Type".to_string(), "text/plain".to_string())
        );
        assert!(parse_header("no-colon").is_err());
        assert_eq!(
            parse_query_param("acl").unwrap(),
            ("acl".to_string(), String::new())
        );
    }

    #[tokio::test]
    async fn test_check_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_credentials(&dir);
        let output = run(args(&path, &["check-config"])).await.unwrap();
        assert_eq!(output["valid"], true);
        assert_eq!(output["accounts"], 1);
        assert_eq!(output["keys"], 1);
    }

    #[tokio::test]
    async fn test_lookups() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_credentials(&dir);

        let ids = run(args(&path, &["canonical-ids", "BART@example.com", "x@example.com"]))
            .await
            .unwrap();
        assert_eq!(ids["BART@example.com"], "canonical-bart");
        assert_eq!(ids["x@example.com"], "NotFound");

        let accounts = run(args(&path, &["account-ids", "canonical-bart"])).await.unwrap();
        assert_eq!(accounts["canonical-bart"], "123456789012");
    }

    #[tokio::test]
    async fn test_sign_then_verify() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_credentials(&dir);

        for extra in [&[][..], &["--presign-expires", "300"][..]] {
            let mut command = vec!["sign-v4", "--access-key", "accessKey1", "--path", "/bucket/key"];
            command.extend_from_slice(extra);
            let signed = run(args(&path, &command)).await.unwrap();

            let request_path = dir.path().join("request.json");
            std::fs::write(&request_path, signed.to_string()).unwrap();
            let verified = run(args(&path, &["verify", request_path.to_str().unwrap()]))
                .await
                .unwrap();
            assert_eq!(verified["authenticated"], true, "{verified}");
            assert_eq!(verified["identity"]["canonicalID"], "canonical-bart");
        }
    }

    #[tokio::test]
    async fn test_sign_unknown_key_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_credentials(&dir);
        assert!(run(args(&path, &["sign-v4", "--access-key", "nope"])).await.is_err());
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_credentials(&dir);
        let output = run(args(&path, &["health"])).await.unwrap();
        assert_eq!(output[0]["backend"], "memory");
        assert_eq!(output[0]["healthy"], true);
    }
}

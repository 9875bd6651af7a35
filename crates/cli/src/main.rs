//! agdir CLI (spec.md §6): one subcommand per directory operation, wiring
//! `agdir_config`, `agdir_client`, and `agdir_importer` together the way
//! `control_cli`'s `main.rs` wires the teacher's stages — `.env` loading up
//! front, then a single `match` over a `Subcommand` enum.

mod backend;
mod error;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use agdir_client::DirectoryClient;
use agdir_config::Config;
use agdir_importer::{FetcherFilters, McpFetcher, PipelineConfig};
use agdir_oci::{ReferrerArtifact, ReferrerKind};
use agdir_record::{Record, RecordRef};
use agdir_sign::{sign_cid, verify_cid, verify_cid_with_key, Ed25519Signer, Ed25519Verifier, Signer};

use crate::error::CliError;

#[derive(Parser)]
#[command(name = "agdir", version, about = "Agent directory client and importer")]
struct Args {
    /// TOML config path (spec.md §6 recognised keys); defaults to agdir.toml
    /// in the current directory if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Push(record) -> RecordRef.
    Push {
        #[arg(long)]
        record_json: PathBuf,
    },
    /// Pull(ref) -> Record.
    Pull {
        #[arg(long)]
        cid: String,
    },
    /// PullBatch([]ref) -> []Record.
    PullBatch {
        #[arg(long, num_args = 1..)]
        cids: Vec<String>,
    },
    Delete {
        #[arg(long)]
        cid: String,
    },
    PushReferrer {
        #[arg(long)]
        host_cid: String,
        #[arg(long, value_enum)]
        kind: ReferrerKindArg,
        #[arg(long)]
        bytes_file: PathBuf,
    },
    PullReferrer {
        #[arg(long)]
        host_cid: String,
        #[arg(long, value_enum)]
        kind: ReferrerKindArg,
    },
    /// Sign(CID, provider) -> packages and pushes signature + public-key referrers.
    Sign {
        #[arg(long)]
        cid: String,
        /// PKCS#8 PEM private key; a fresh key is generated if omitted.
        #[arg(long)]
        key_pem: Option<PathBuf>,
    },
    Verify {
        #[arg(long)]
        cid: String,
        /// Verify against this PEM public key instead of whatever
        /// `PublicKey` referrer the registry hands back.
        #[arg(long)]
        public_key_pem: Option<PathBuf>,
    },
    /// Runs the import pipeline against an MCP-shaped source.
    Import {
        #[arg(long)]
        source_url: String,
        /// `key=value` filter pairs from the closed set (search, version,
        /// updated_since, limit, cursor).
        #[arg(long, value_parser = parse_key_value)]
        filter: Vec<(String, String)>,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        force: bool,
        #[arg(long)]
        debug: bool,
    },
}

#[derive(Clone, clap::ValueEnum)]
enum ReferrerKindArg {
    Signature,
    PublicKey,
}

impl From<ReferrerKindArg> for ReferrerKind {
    fn from(value: ReferrerKindArg) -> Self {
        match value {
            ReferrerKindArg::Signature => ReferrerKind::Signature,
            ReferrerKindArg::PublicKey => ReferrerKind::PublicKey,
        }
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=').map(|(k, v)| (k.to_string(), v.to_string())).ok_or_else(|| format!("expected key=value, got {raw}"))
}

fn command_name(cmd: &Command) -> &'static str {
    match cmd {
        Command::Push { .. } => "push",
        Command::Pull { .. } => "pull",
        Command::PullBatch { .. } => "pull_batch",
        Command::Delete { .. } => "delete",
        Command::PushReferrer { .. } => "push_referrer",
        Command::PullReferrer { .. } => "pull_referrer",
        Command::Sign { .. } => "sign",
        Command::Verify { .. } => "verify",
        Command::Import { .. } => "import",
    }
}

fn load_config(path: &Option<PathBuf>) -> Result<Config, CliError> {
    let candidate = path.clone().unwrap_or_else(|| PathBuf::from("agdir.toml"));
    if candidate.exists() {
        Ok(Config::load(&candidate)?)
    } else {
        eprintln!("no config file at {}, using defaults", candidate.display());
        Ok(Config::default())
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let repo_env = PathBuf::from(".env");
    if repo_env.exists() {
        let _ = dotenvy::from_path(&repo_env);
    }

    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    let _span = tracing::info_span!("subcommand", name = command_name(&args.cmd)).entered();

    match args.cmd {
        Command::Push { record_json } => {
            let bytes = std::fs::read(&record_json)?;
            let record = Record::unmarshal_record(&bytes)?;
            let backend = backend::build_backend(&config)?;
            let client = DirectoryClient::new(backend);
            let r#ref = client.push(record).await?;
            println!("{}", r#ref.cid);
            Ok(())
        }
        Command::Pull { cid } => {
            let backend = backend::build_backend(&config)?;
            let client = DirectoryClient::new(backend);
            let record = client.pull(&RecordRef::new(cid)).await?;
            let bytes = record.marshal_canonical()?;
            println!("{}", String::from_utf8_lossy(&bytes));
            Ok(())
        }
        Command::PullBatch { cids } => {
            let backend = backend::build_backend(&config)?;
            let client = DirectoryClient::new(backend);
            let refs: Vec<RecordRef> = cids.into_iter().map(RecordRef::new).collect();
            let records = client.pull_batch(refs).await?;
            for record in records {
                println!("{}", String::from_utf8_lossy(&record.marshal_canonical()?));
            }
            Ok(())
        }
        Command::Delete { cid } => {
            let backend = backend::build_backend(&config)?;
            let client = DirectoryClient::new(backend);
            client.delete(&RecordRef::new(cid)).await?;
            Ok(())
        }
        Command::PushReferrer { host_cid, kind, bytes_file } => {
            let backend = backend::build_backend(&config)?;
            let client = DirectoryClient::new(backend);
            let bytes = std::fs::read(&bytes_file)?;
            let artifact = ReferrerArtifact::new(kind.into(), bytes);
            client.push_referrer(&RecordRef::new(host_cid), artifact).await?;
            Ok(())
        }
        Command::PullReferrer { host_cid, kind } => {
            let backend = backend::build_backend(&config)?;
            let client = DirectoryClient::new(backend);
            let artifacts = client.pull_referrer(&RecordRef::new(host_cid), kind.into()).await?;
            for artifact in artifacts {
                println!("{}", String::from_utf8_lossy(&artifact.bytes));
            }
            Ok(())
        }
        Command::Sign { cid, key_pem } => {
            let backend = backend::build_backend(&config)?;
            let signer: Box<dyn Signer> = match key_pem {
                Some(path) => Box::new(Ed25519Signer::from_pkcs8_pem(&std::fs::read_to_string(path)?)?),
                None => Box::new(Ed25519Signer::generate()),
            };
            sign_cid(backend.as_ref(), &cid, signer.as_ref()).await?;
            println!("signed {cid}");
            Ok(())
        }
        Command::Verify { cid, public_key_pem } => {
            let backend = backend::build_backend(&config)?;
            let verified = match public_key_pem {
                Some(path) => {
                    let pem = std::fs::read_to_string(path)?;
                    verify_cid_with_key(backend.as_ref(), &cid, &pem, &Ed25519Verifier).await?
                }
                None => {
                    let zot = backend::build_zot(&config);
                    verify_cid(backend.as_ref(), zot.as_deref(), &cid, &Ed25519Verifier).await?
                }
            };
            println!("{verified}");
            Ok(())
        }
        Command::Import { source_url, filter, dry_run, force, debug } => {
            let mut raw_filters: BTreeMap<String, String> = filter.into_iter().collect();
            for (key, value) in &config.importer.filters {
                raw_filters.entry(key.clone()).or_insert_with(|| value.clone());
            }
            let filters = FetcherFilters::from_map(&raw_filters)?;

            let backend = backend::build_backend(&config)?;
            let client = Arc::new(DirectoryClient::new(backend.clone()));
            let fetcher = McpFetcher::new(source_url, 30_000)?;

            let pipeline_config = PipelineConfig {
                concurrency: config.importer.concurrency_or_default() as usize,
                dry_run: dry_run || config.importer.dry_run,
                force: force || config.importer.force,
                debug: debug || config.importer.debug,
            };

            let result = agdir_importer::run_pipeline(&fetcher, filters, None, backend, client, None, pipeline_config, CancellationToken::new()).await?;

            println!(
                "{}",
                serde_json::json!({
                    "total": result.total,
                    "skipped": result.skipped,
                    "imported": result.imported,
                    "failed": result.failed,
                    "errors": result.errors,
                })
            );
            Ok(())
        }
    }
}

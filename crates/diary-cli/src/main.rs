use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use diary_core::{pow::Difficulty, verify, view, Identity, Integrity, LedgerStore};
use diary_storage::FileStore;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "diary-cli")]
#[command(about = "CLI client for the tamper-evident diary node")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account; prints a session token
    Register {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Log in; prints a session token
    Login {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// End a session
    Logout {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
        #[arg(long)]
        token: String,
    },
    /// Append a diary entry
    Write {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
        #[arg(long)]
        token: String,
        /// Entry text
        content: String,
    },
    /// Print blocks and entries
    Show {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
        #[arg(long)]
        token: String,
    },
    /// Ask the node to verify the chain
    Validate {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
        #[arg(long)]
        token: String,
    },
    /// Verify a user's files directly, without a running node
    Audit(AuditArgs),
}

#[derive(Args, Debug)]
struct AuditArgs {
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,
    #[arg(long)]
    user: String,
    /// Lowercase hex prefix the node mined with
    #[arg(long, default_value = diary_core::constants::POW_HEX_PREFIX, value_parser = Difficulty::hex_prefix)]
    difficulty_prefix: Difficulty,
    /// Leading zero bits the node mined with, instead of a hex prefix
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=256), conflicts_with = "difficulty_prefix")]
    difficulty_bits: Option<u32>,
    /// Only check prev-hash links
    #[arg(long)]
    links_only: bool,
}

impl AuditArgs {
    fn difficulty(&self) -> Difficulty {
        match self.difficulty_bits {
            Some(bits) => Difficulty::LeadingZeroBits(bits),
            None => self.difficulty_prefix.clone(),
        }
    }
}

#[derive(Serialize)]
struct CredentialsOut {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct EntryOut {
    content: String,
}

async fn print_response(res: reqwest::Response) -> Result<bool> {
    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }
    Ok(status.is_success())
}

/// Load a user's files, print the entries and return the verdict.
fn audit(args: &AuditArgs) -> Result<Integrity> {
    let identity = Identity::parse(args.user.as_str())?;
    let store = FileStore::new(&args.data_dir);
    let ledger = store.load(&identity)?;

    for entry in view::distinct_entries(&ledger) {
        println!("[{}] {}", entry.created_at.format("%Y-%m-%d %H:%M:%S"), entry.text);
    }

    let verdict = if args.links_only {
        verify::verify_links(&ledger)
    } else {
        verify::verify(&ledger, &args.difficulty())
    };
    println!("{} blocks: {}", ledger.len(), serde_json::to_string(&verdict)?);
    Ok(verdict)
}

/// 0 when intact, 2 when tampered. Load failures exit with 1 through `main`.
fn audit_exit_code(verdict: &Integrity) -> u8 {
    match verdict {
        Integrity::Intact => 0,
        Integrity::Tampered { .. } => 2,
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let ok = match cli.cmd {
        Command::Register { node, username, password } => {
            let body = CredentialsOut { username, password };
            let res = client.post(format!("{node}/register")).json(&body).send().await?;
            print_response(res).await?
        }
        Command::Login { node, username, password } => {
            let body = CredentialsOut { username, password };
            let res = client.post(format!("{node}/login")).json(&body).send().await?;
            print_response(res).await?
        }
        Command::Logout { node, token } => {
            let res = client.post(format!("{node}/logout")).bearer_auth(token).send().await?;
            print_response(res).await?
        }
        Command::Write { node, token, content } => {
            if content.trim().is_empty() {
                bail!("entry content must not be empty");
            }
            let res = client
                .post(format!("{node}/diary"))
                .bearer_auth(token)
                .json(&EntryOut { content })
                .send()
                .await?;
            print_response(res).await?
        }
        Command::Show { node, token } => {
            let res = client.get(format!("{node}/diary")).bearer_auth(token).send().await?;
            print_response(res).await?
        }
        Command::Validate { node, token } => {
            let res = client.get(format!("{node}/validate")).bearer_auth(token).send().await?;
            print_response(res).await?
        }
        Command::Audit(args) => {
            let verdict = audit(&args)?;
            return Ok(ExitCode::from(audit_exit_code(&verdict)));
        }
    };
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

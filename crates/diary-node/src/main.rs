use clap::Parser;
use diary_core::{constants::MAX_MINING_ATTEMPTS, pow::Difficulty, Miner, SearchStrategy};
use diary_node::{router, spawn_session_reaper, AppState};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use tracing::{info, Level};

#[derive(Parser, Debug)]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: String,

    /// Directory holding chain files, diary files and credentials
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// Lowercase hex prefix every block hash must start with
    #[arg(long, default_value = diary_core::constants::POW_HEX_PREFIX, value_parser = Difficulty::hex_prefix)]
    difficulty_prefix: Difficulty,

    /// Require this many leading zero bits instead of a hex prefix
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=256), conflicts_with = "difficulty_prefix")]
    difficulty_bits: Option<u32>,

    /// Nonces tried per block before giving up
    #[arg(long, default_value_t = MAX_MINING_ATTEMPTS)]
    max_attempts: u64,

    /// Search nonces on all cores
    #[arg(long)]
    parallel_mining: bool,

    /// Seconds a session token may sit unused before it expires
    #[arg(long, default_value_t = 30 * 60)]
    session_idle_secs: u64,
}

impl Args {
    fn miner(&self) -> Miner {
        let difficulty = match self.difficulty_bits {
            Some(bits) => Difficulty::LeadingZeroBits(bits),
            None => self.difficulty_prefix.clone(),
        };
        let strategy = if self.parallel_mining {
            SearchStrategy::Parallel
        } else {
            SearchStrategy::Sequential
        };
        Miner::new(difficulty, self.max_attempts).with_strategy(strategy)
    }
}


#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let miner = args.miner();
    info!(difficulty = ?miner.difficulty(), max_attempts = miner.max_attempts(), "miner configured");

    let idle = Duration::from_secs(args.session_idle_secs);
    let state = AppState::open(&args.data_dir, miner)?.with_session_idle(idle);
    let reaper = spawn_session_reaper(state.clone(), idle.max(Duration::from_secs(1)));
    let app = router(state);

    let addr: SocketAddr = args.listen.parse()?;
    info!("diary-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    reaper.abort();
    Ok(())
}

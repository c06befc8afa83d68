//! forge - command-line front end for the offline action queue.
//!
//! ```bash
//! forge enqueue complete_task --data '{"id":"t-1"}'
//! forge sync
//! forge status
//! forge dead-letters --clear
//! forge watch --probe-interval-ms 5000
//! ```
//!
//! 設定は `--config`（省略時はカレントの `forge.toml` があれば読む）。
//! ログは `RUST_LOG` で調整できる（デフォルト `info`）。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use forge_core::app::SyncAppBuilder;
use forge_core::config::SyncConfig;
use forge_core::domain::{ActionKind, OfflineAction, SkipReason, SyncOutcome};
use forge_core::impls::{FileStore, HttpTaskApi, ReachabilitySignal, TracingNotifier};

const DEFAULT_CONFIG: &str = "forge.toml";

#[derive(Parser)]
#[command(name = "forge", about = "Queue task mutations offline and replay them later")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, env = "FORGE_CONFIG")]
    config: Option<PathBuf>,

    /// Override `api.user_id`
    #[arg(long, global = true, env = "FORGE_USER_ID")]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record a mutation for later replay
    Enqueue {
        /// create_task, update_task or complete_task
        kind: ActionKind,

        /// JSON payload of the mutation
        #[arg(long, default_value = "{}")]
        data: String,
    },
    /// Probe the API and run one sync pass
    Sync,
    /// Show pending and dead-lettered actions
    Status,
    /// List (or clear) actions that ran out of retries
    DeadLetters {
        #[arg(long)]
        clear: bool,
    },
    /// Track API reachability and sync on every reconnect until Ctrl-C
    Watch {
        #[arg(long, default_value_t = 5_000, value_parser = clap::value_parser!(u64).range(1..))]
        probe_interval_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(user) = cli.user {
        config.api.user_id = user;
    }

    match cli.command {
        Command::Enqueue { kind, data } => cmd_enqueue(&config, kind, &data),
        Command::Sync => cmd_sync(&config).await,
        Command::Status => cmd_status(&config),
        Command::DeadLetters { clear } => cmd_dead_letters(&config, clear),
        Command::Watch { probe_interval_ms } => {
            cmd_watch(&config, Duration::from_millis(probe_interval_ms)).await
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<SyncConfig> {
    match path {
        Some(path) => SyncConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            SyncConfig::load(Path::new(DEFAULT_CONFIG)).context("failed to load forge.toml")
        }
        None => Ok(SyncConfig::default()),
    }
}

// ── Wiring ────────────────────────────────────────────────────────────────────

fn build_app(config: &SyncConfig, signal: Arc<ReachabilitySignal>) -> Result<forge_core::SyncApp> {
    if config.api.user_id.trim().is_empty() {
        bail!("no user id configured: set api.user_id in the config or pass --user");
    }

    let store = FileStore::open(&config.store.dir)
        .with_context(|| format!("failed to open store at {}", config.store.dir.display()))?;
    let mut api = HttpTaskApi::with_timeout(&config.api.base_url, config.api_timeout())?;
    if let Some(token) = &config.api.token {
        api = api.with_token(token);
    }

    let app = SyncAppBuilder::from_config(config)
        .store(store)
        .reachability(signal)
        .api(api)
        .notifier(Arc::new(TracingNotifier))
        .build()?;
    Ok(app)
}

/// API に届くかどうかだけを見る（ステータスコードは問わない）
async fn probe(client: &reqwest::Client, base_url: &str) -> bool {
    match client.get(base_url).send().await {
        Ok(_) => true,
        Err(e) => {
            tracing::debug!(error = %e, "reachability probe failed");
            false
        }
    }
}

fn probe_client(config: &SyncConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.api_timeout())
        .build()
        .context("failed to build probe client")
}

// ── Subcommand handlers ───────────────────────────────────────────────────────

fn cmd_enqueue(config: &SyncConfig, kind: ActionKind, data: &str) -> Result<()> {
    let payload: serde_json::Value =
        serde_json::from_str(data).context("--data must be valid JSON")?;

    // enqueue 自体は到達性を見ない
    let app = build_app(config, Arc::new(ReachabilitySignal::new(false)))?;
    let id = app.queue().enqueue(kind, payload)?;
    let pending = app.queue().pending()?.len();

    println!("queued {id} ({kind}), {pending} pending");
    Ok(())
}

async fn cmd_sync(config: &SyncConfig) -> Result<()> {
    let online = probe(&probe_client(config)?, &config.api.base_url).await;
    let app = build_app(config, Arc::new(ReachabilitySignal::new(online)))?;

    match app.queue().sync().await? {
        SyncOutcome::Skipped(SkipReason::Offline) => {
            println!("offline: {} is not reachable, nothing sent", config.api.base_url)
        }
        SyncOutcome::Skipped(SkipReason::AlreadyRunning) => println!("a sync pass is already running"),
        SyncOutcome::Empty => println!("queue is empty"),
        SyncOutcome::Completed(report) => {
            println!("{}", report.summary());
            if report.deferred > 0 {
                println!("  deferred (backing off) : {}", report.deferred);
            }
            for id in &report.dead_lettered {
                println!("  dead-lettered          : {id}");
            }
        }
    }
    Ok(())
}

fn cmd_status(config: &SyncConfig) -> Result<()> {
    let app = build_app(config, Arc::new(ReachabilitySignal::new(false)))?;
    let stats = app.queue().stats()?;
    let pending = app.queue().pending()?;

    println!("  Storage key    : {}", app.queue().options().storage_key);
    println!("  Pending        : {}", stats.pending);
    println!("  Dead letters   : {}", stats.dead_lettered);

    if !pending.is_empty() {
        println!();
        print_actions(&pending);
    }
    Ok(())
}

fn cmd_dead_letters(config: &SyncConfig, clear: bool) -> Result<()> {
    let app = build_app(config, Arc::new(ReachabilitySignal::new(false)))?;

    if clear {
        let dropped = app.queue().clear_dead_letters()?;
        println!("cleared {dropped} dead letter(s)");
        return Ok(());
    }

    let letters = app.queue().dead_letters()?;
    if letters.is_empty() {
        println!("No dead letters.");
    } else {
        print_actions(&letters);
    }
    Ok(())
}

async fn cmd_watch(config: &SyncConfig, interval: Duration) -> Result<()> {
    let client = probe_client(config)?;
    let signal = Arc::new(ReachabilitySignal::new(
        probe(&client, &config.api.base_url).await,
    ));
    let mut app = build_app(config, signal.clone())?;
    app.start();

    tracing::info!(
        base_url = %config.api.base_url,
        interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
        "watching"
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let online = probe(&client, &config.api.base_url).await;
                if signal.set_online(online) {
                    tracing::info!(online, "reachability changed");
                }
            }
            res = tokio::signal::ctrl_c() => {
                res.context("failed to listen for ctrl-c")?;
                break;
            }
        }
    }

    app.shutdown().await;
    Ok(())
}

fn print_actions(actions: &[OfflineAction]) {
    for a in actions {
        println!("  ┌─ {}", a.id);
        println!("  │  type     : {}", a.kind);
        println!("  │  data     : {}", a.payload);
        if let Some(err) = &a.last_error {
            println!("  │  error    : {err}");
        }
        println!("  └─ attempts : {}", a.attempts);
    }
}

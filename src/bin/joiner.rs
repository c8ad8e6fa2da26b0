//! Command-line front end for joining a linear pool.
//!
//! Usage: cargo run --bin joiner -- --help

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use linear_pool_joiner::chain::is_address;
use linear_pool_joiner::config::settings::DEFAULT_SETTINGS_PATH;
use linear_pool_joiner::pool::{MAIN_TOKEN_SLOT, SLOT_COUNT};
use linear_pool_joiner::provider::http::HttpProvider;
use linear_pool_joiner::provider::WalletProvider;
use linear_pool_joiner::session::SessionChange;
use linear_pool_joiner::swap::SwapSubmission;
use linear_pool_joiner::{App, AppView, Settings};

#[derive(Parser)]
#[command(name = "joiner", about = "Approve tokens and join a Balancer linear pool")]
struct Cli {
    /// Settings file; built-in defaults are used if it does not exist.
    #[arg(long, default_value = DEFAULT_SETTINGS_PATH)]
    settings: PathBuf,

    /// Overrides `rpc_url` from the settings file.
    #[arg(long)]
    rpc_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show wallet and network.
    Status,
    /// Ask the wallet for an account.
    Connect,
    /// Read a linear pool's tokens, pool id and approvals.
    Inspect { pool: String },
    /// Grant the vault an unlimited allowance for one tracked token.
    Approve {
        pool: String,
        /// 0 = pool token, 1 = main token, 2 = wrapped token.
        #[arg(long, default_value_t = 1)]
        slot: usize,
    },
    /// Join the pool with a batchSwap of the main token.
    Join {
        pool: String,
        /// Main token amount in base units.
        #[arg(long)]
        amount: String,
        #[arg(long)]
        slippage: Option<String>,
        /// 0 = given in, 1 = given out.
        #[arg(long)]
        kind: Option<String>,
        /// Wait for the swap to be mined.
        #[arg(long)]
        wait: bool,
    },
    /// Print session changes until Ctrl-C.
    Watch,
}

fn print_view(view: &AppView) {
    let session = &view.session;
    println!("👛 {}", session.button_text());
    if session.connected {
        println!("   Account: {}", session.display_address());
    }
    if !session.network_label.is_empty() {
        println!("   Network: {}", session.network_label);
    }

    let pool = &view.pool;
    if let Some(id) = pool.pool_id {
        println!("\n🏊 Pool id: {}", id);
    }
    for slot in 0..SLOT_COUNT {
        if let Some(token) = pool.tokens.slot(slot) {
            println!("   Token {}: {}  [{}]", slot + 1, token, pool.approval_label(slot));
        }
    }
}

async fn ensure_connected(app: &mut App) -> Result<()> {
    if !app.session().connected {
        app.on_connect_clicked().await;
    }
    if !app.session().connected {
        bail!("wallet not connected");
    }
    Ok(())
}

async fn load_pool(app: &mut App, pool: &str) -> Result<()> {
    if !is_address(pool.trim()) {
        bail!("`{}` is not a valid address", pool);
    }
    if app.on_contract_address_edited(pool).await.is_none() {
        bail!("{} could not be resolved as a linear pool", pool);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let mut settings = if cli.settings.exists() {
        Settings::load_from_file(&cli.settings)?
    } else {
        Settings::default()
    };
    if let Some(url) = cli.rpc_url {
        url::Url::parse(&url)?;
        settings.rpc_url = url;
    }
    if let Command::Join { wait: true, .. } = &cli.command {
        settings.swap_submission = SwapSubmission::AwaitInclusion;
    }

    let provider = Arc::new(HttpProvider::new(settings.rpc_url.clone())?);
    let event_poll = settings.event_poll_interval();
    let mut app = App::new(settings, Some(provider.clone() as Arc<dyn WalletProvider>));
    app.start().await;

    match cli.command {
        Command::Status => print_view(&app.view().await),
        Command::Connect => {
            ensure_connected(&mut app).await?;
            print_view(&app.view().await);
        }
        Command::Inspect { pool } => {
            load_pool(&mut app, &pool).await?;
            print_view(&app.view().await);
        }
        Command::Approve { pool, slot } => {
            ensure_connected(&mut app).await?;
            load_pool(&mut app, &pool).await?;
            let receipt = app.on_approve_clicked(slot).await?;
            println!("✅ Approved in {} (block {:?})", receipt.transaction_hash, receipt.block_number);
            print_view(&app.view().await);
        }
        Command::Join {
            pool,
            amount,
            slippage,
            kind,
            ..
        } => {
            ensure_connected(&mut app).await?;
            load_pool(&mut app, &pool).await?;
            app.set_amount(MAIN_TOKEN_SLOT, &amount);
            if let Some(slippage) = slippage {
                app.set_slippage(&slippage);
            }
            if let Some(kind) = kind {
                app.set_join_kind(&kind);
            }
            let hash = app.on_join_clicked().await?;
            println!("🚀 batchSwap sent: {}", hash);
        }
        Command::Watch => {
            let watcher = provider.spawn_event_watcher(event_poll);
            print_view(&app.view().await);
            println!("\n👀 Watching for wallet changes (Ctrl-C to stop)...");
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    change = app.next_session_change() => match change {
                        Some(SessionChange::Connected { address, network }) => {
                            println!("🔗 Connected {} on {}", address, network);
                        }
                        Some(SessionChange::Disconnected) => println!("🔒 Disconnected"),
                        Some(SessionChange::NetworkChanged { network }) => {
                            println!("🌐 Network: {}", network);
                        }
                        None => break,
                    },
                }
            }
            watcher.abort();
        }
    }

    app.teardown();
    Ok(())
}

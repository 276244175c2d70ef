//! Interactive PeerLink peer.
//!
//! Negotiates a real peer connection through a relay, then sends stdin lines
//! over the data channel and prints whatever the remote peer sends.
//!
//! ```text
//! peerlink relay                       # terminal 1
//! peerlink-peer --answer               # terminal 2
//! peerlink-peer --offer                # terminal 3
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use clap::Parser;
use peerlink::{
    engine::PeerConnectionEngine, Config, ConnectionState, Session, SignalingClient,
    SignalingState, WebSocketRelay, VERSION,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser)]
#[command(name = "peerlink-peer")]
#[command(version = VERSION)]
#[command(about = "Interactive peer: negotiate through a relay and chat over the data channel", long_about = None)]
struct Cli {
    /// Send the offer once the relay is reachable
    #[arg(long, conflicts_with = "answer", required_unless_present = "answer")]
    offer: bool,

    /// Wait for an offer and answer it
    #[arg(long)]
    answer: bool,

    /// Relay WebSocket URL (overrides config)
    #[arg(short, long)]
    url: Option<String>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let mut config = Config::load(cli.config)?;
    if let Some(url) = cli.url {
        config.signaling.url = url;
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_peer(cli.offer, config))
}

async fn run_peer(offer: bool, config: Config) -> anyhow::Result<()> {
    let (engine, engine_events) = PeerConnectionEngine::new(&config.ice).await?;
    let relay = Arc::new(WebSocketRelay::new(config.signaling.url.clone()));
    let (signaling, signaling_events) = SignalingClient::new(relay, config.signaling.codec());

    let session = Arc::new(Session::new(Arc::new(engine), signaling).with_auto_answer(!offer));
    let pump = session.spawn(signaling_events, engine_events);

    let mut changes = session.watch();
    let mut incoming = session.incoming_data();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    println!("Session {} ({})", session.id(), if offer { "offer" } else { "answer" });
    println!("Relay: {}", config.signaling.url);
    session.connect();

    let mut signaling_state = SignalingState::Disconnected;
    let mut connection_state = ConnectionState::New;
    let mut offered = false;

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = *changes.borrow_and_update();

                if snapshot.signaling_state != signaling_state {
                    signaling_state = snapshot.signaling_state;
                    println!("* signaling {signaling_state}");
                    if signaling_state == SignalingState::Disconnected {
                        break;
                    }
                }
                if snapshot.connection_state != connection_state {
                    connection_state = snapshot.connection_state;
                    println!(
                        "* connection {connection_state} (candidates local={} remote={})",
                        snapshot.candidates.local(),
                        snapshot.candidates.remote()
                    );
                    if connection_state.is_terminal() {
                        break;
                    }
                }

                if offer && !offered && signaling_state == SignalingState::Connected {
                    offered = true;
                    if let Err(e) = session.make_offer().await {
                        eprintln!("! offer failed: {e}");
                        break;
                    }
                }
            },
            data = incoming.recv() => match data {
                Ok(data) => println!("< {}", String::from_utf8_lossy(&data)),
                Err(RecvError::Lagged(skipped)) => eprintln!("! {skipped} messages skipped"),
                Err(RecvError::Closed) => break,
            },
            line = stdin.next_line() => match line? {
                Some(line) if line.is_empty() => {},
                Some(line) => {
                    if let Err(e) = session.send_data(Bytes::from(line)).await {
                        eprintln!("! not sent: {e}");
                    }
                },
                None => break,
            },
        }
    }

    session.close().await?;
    pump.await?;

    let stats = session.signaling_stats();
    println!(
        "Signaling: sent={} received={} dropped_out={} dropped_in={}",
        stats.sent, stats.received, stats.dropped_outbound, stats.dropped_inbound
    );
    Ok(())
}

//! PeerLink CLI binary.
//!
//! # Commands
//!
//! - `relay` - Run the signaling relay server
//! - `encode` - Print the wire envelope of a negotiation message
//! - `decode` - Decode a wire envelope

use std::io::{self, Read};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use peerlink::{
    server::{serve, ServerConfig},
    Config, EnvelopeCodec, IceCandidate, NegotiationMessage, SessionDescription, VERSION,
};

#[derive(Parser)]
#[command(name = "peerlink")]
#[command(version = VERSION)]
#[command(about = "PeerLink - signaling for peer-to-peer sessions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the signaling relay server
    Relay {
        /// Listen port (default from config, 8080)
        #[arg(short, long)]
        port: Option<u16>,

        /// Listen host (default from config, 127.0.0.1)
        #[arg(long)]
        host: Option<String>,

        /// Bind to all interfaces
        #[arg(long)]
        bind_all: bool,

        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Encode a negotiation message to its wire envelope
    Encode {
        #[command(subcommand)]
        message: EncodeMessage,

        /// Output file path (default: stdout)
        #[arg(short, long, global = true)]
        output: Option<PathBuf>,
    },

    /// Decode a wire envelope
    Decode {
        /// Envelope input (or - for stdin)
        input: Option<String>,

        /// Input file path
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Also accept type-name discriminators
        #[arg(long)]
        legacy: bool,
    },
}

#[derive(Subcommand)]
enum EncodeMessage {
    /// Session description of kind offer
    Offer {
        /// SDP body
        #[arg(long)]
        sdp: String,
    },

    /// Session description of kind answer
    Answer {
        /// SDP body
        #[arg(long)]
        sdp: String,
    },

    /// Session description of kind provisional answer
    PrAnswer {
        /// SDP body
        #[arg(long)]
        sdp: String,
    },

    /// Connectivity candidate
    Candidate {
        /// Candidate line
        #[arg(long)]
        sdp: String,

        /// Media line index
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        mline_index: i32,

        /// Media stream identification
        #[arg(long)]
        mid: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Relay {
            port,
            host,
            bind_all,
            config,
            verbose,
        } => cmd_relay(port, host, bind_all, config, verbose),

        Commands::Encode { message, output } => cmd_encode(message, output),

        Commands::Decode {
            input,
            file,
            legacy,
        } => cmd_decode(input, file, legacy),
    }
}

fn cmd_relay(
    port: Option<u16>,
    host: Option<String>,
    bind_all: bool,
    config_path: Option<PathBuf>,
    verbose: bool,
) -> anyhow::Result<()> {
    // Initialize logging
    let log_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    // Build config: file and environment first, flags override
    let mut relay = Config::load(config_path)?.relay;
    if let Some(host) = host {
        relay.host = host;
    }
    if let Some(port) = port {
        relay.port = port;
    }

    let mut config = ServerConfig::from_relay(&relay)?;
    if bind_all {
        config = config.bind_all();
    }

    tracing::info!("Starting PeerLink relay on {}", config.addr);
    tracing::info!("Max message size: {} bytes", config.max_message_size);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(config))?;
    Ok(())
}

fn cmd_encode(message: EncodeMessage, output: Option<PathBuf>) -> anyhow::Result<()> {
    let message: NegotiationMessage = match message {
        EncodeMessage::Offer { sdp } => SessionDescription::offer(sdp).into(),
        EncodeMessage::Answer { sdp } => SessionDescription::answer(sdp).into(),
        EncodeMessage::PrAnswer { sdp } => SessionDescription::pr_answer(sdp).into(),
        EncodeMessage::Candidate {
            sdp,
            mline_index,
            mid,
        } => IceCandidate::new(sdp, mline_index, mid).into(),
    };

    let wire = EnvelopeCodec::new().encode(&message)?;
    write_output(output, &String::from_utf8_lossy(&wire))
}

fn cmd_decode(input: Option<String>, file: Option<PathBuf>, legacy: bool) -> anyhow::Result<()> {
    let content = read_input(input, file)?;
    let codec = EnvelopeCodec::new().with_legacy_type_names(legacy);

    match codec.decode(content.trim().as_bytes())? {
        NegotiationMessage::SessionDescription(desc) => {
            println!("Type:     {}", peerlink::protocol::TYPE_SESSION_DESCRIPTION);
            println!("Kind:     {}", desc.kind);
            println!("SDP:");
            for line in desc.sdp.lines() {
                println!("  {line}");
            }
        },
        NegotiationMessage::Candidate(candidate) => {
            println!("Type:     {}", peerlink::protocol::TYPE_CANDIDATE);
            println!("SDP:      {}", candidate.sdp);
            println!("M-line:   {}", candidate.sdp_mline_index);
            println!(
                "Mid:      {}",
                candidate.sdp_mid.as_deref().unwrap_or("(none)")
            );
        },
    }

    Ok(())
}

fn read_input(input: Option<String>, file: Option<PathBuf>) -> anyhow::Result<String> {
    if let Some(path) = file {
        Ok(std::fs::read_to_string(path)?)
    } else if let Some(s) = input.filter(|s| s != "-") {
        Ok(s)
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    }
}

fn write_output(output: Option<PathBuf>, content: &str) -> anyhow::Result<()> {
    if let Some(path) = output {
        std::fs::write(path, content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

use clap::{Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser)]
#[command(name = "duet")]
#[command(about = "Duet signaling server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the signaling server (HTTP health probe + WebSocket signaling on one port).
    Serve {
        /// Config file path (default: DUET_CONFIG_PATH or ~/.duet/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP and WebSocket port (default from config, DUET_PORT, or 3000)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Join a room as a diagnostic client and print every server event until the
    /// connection closes.
    Join {
        /// Server WebSocket URL.
        #[arg(long, default_value = "ws://127.0.0.1:3000/ws")]
        url: String,

        /// Room identifier to join.
        #[arg(long)]
        room: String,

        /// User label to present (not authenticated).
        #[arg(long, default_value = "duet-cli")]
        user: String,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("duet {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("serve failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Join { url, room, user }) => {
            if let Err(e) = run_join(url, room, user).await {
                log::error!("join failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, _path) = lib::config::load_config(config_path)?;
    config.signaling.port = lib::config::resolve_port(&config);
    if let Some(p) = port {
        config.signaling.port = p;
    }
    log::info!(
        "starting signaling server on {}:{}",
        config.signaling.bind,
        config.signaling.port
    );
    lib::gateway::run_server(config).await
}

async fn run_join(url: String, room: String, user: String) -> anyhow::Result<()> {
    let (mut ws, _) = tokio_tungstenite::connect_async(&url).await?;

    let join = serde_json::json!({
        "event": "join",
        "payload": { "roomId": room, "userId": user }
    });
    ws.send(Message::Text(join.to_string())).await?;
    println!("> join sent for room {} as {}", room, user);

    while let Some(msg) = ws.next().await {
        let msg = msg?;
        let Message::Text(text) = msg else { continue };
        println!("< {}", text);
    }
    Ok(())
}

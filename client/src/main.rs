mod commands;
mod display;
mod network;

use clap::Parser;
use log::info;
use shared::{GroupId, PlayerId};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Your player id, unique on the server
    #[arg(short = 'i', long)]
    player_id: PlayerId,

    /// Display name shown to the other players
    #[arg(short = 'n', long)]
    name: String,

    /// Group whose game you take part in
    #[arg(short = 'g', long, default_value = "-1", allow_hyphen_values = true)]
    group: GroupId,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    info!("Playing as {} ({}) in group {}", args.name, args.player_id, args.group);

    let mut client =
        network::Client::new(&args.server, args.player_id, &args.name, args.group).await?;

    client.run().await?;

    Ok(())
}

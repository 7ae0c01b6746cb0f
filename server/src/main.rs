use clap::Parser;
use log::info;
use server::config::GameConfig;
use server::network::Server;
use shared::MIN_PLAYERS;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Maximum number of connected players
    #[arg(short, long, default_value = "64")]
    max_clients: usize,

    /// Players needed before the lobby countdown starts
    #[arg(long, default_value_t = MIN_PLAYERS)]
    min_players: usize,

    /// Lobby countdown in seconds
    #[arg(long, default_value = "60")]
    lobby_secs: u64,

    /// Night length in seconds
    #[arg(long, default_value = "60")]
    night_secs: u64,

    /// Discussion length in seconds
    #[arg(long, default_value = "90")]
    discussion_secs: u64,

    /// Voting length in seconds
    #[arg(long, default_value = "30")]
    voting_secs: u64,
}

impl Args {
    fn game_config(&self) -> GameConfig {
        let defaults = GameConfig::default();
        GameConfig {
            min_players: self.min_players.max(MIN_PLAYERS),
            lobby: defaults.lobby.with_duration(self.lobby_secs),
            night: defaults.night.with_duration(self.night_secs),
            discussion: defaults.discussion.with_duration(self.discussion_secs),
            voting: defaults.voting.with_duration(self.voting_secs),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.game_config();
    let address = format!("{}:{}", args.host, args.port);

    info!(
        "Phases: lobby {}s, night {}s, discussion {}s, voting {}s; {} players to start",
        config.lobby.secs(),
        config.night.secs(),
        config.discussion.secs(),
        config.voting.secs(),
        config.min_players
    );

    let mut server = Server::new(&address, args.max_clients, config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

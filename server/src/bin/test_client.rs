//! Plays one whole game against a running server with simulated players.
//!
//! Start the server with short phases first, for example
//! `server --lobby-secs 5 --night-secs 5 --discussion-secs 5 --voting-secs 5`.

use bincode::{deserialize, serialize};
use clap::Parser;
use rand::seq::SliceRandom;
use shared::{Announcement, GroupId, Packet, Phase, PlayerId, PlayerView, Role, PROTOCOL_VERSION};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, timeout};

#[derive(Parser, Debug)]
#[command(about = "Scripted players for a quick end-to-end game")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: SocketAddr,

    /// Number of simulated players
    #[arg(short, long, default_value = "6")]
    players: usize,

    /// Group to play in
    #[arg(short, long, default_value = "-1000")]
    group: GroupId,
}

/// What one simulated player has learned so far
struct Bot {
    id: PlayerId,
    socket: UdpSocket,
    role: Option<Role>,
    teammates: HashSet<PlayerId>,
}

impl Bot {
    async fn send(&self, server: SocketAddr, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        self.socket.send_to(&serialize(packet)?, server).await?;
        Ok(())
    }

    /// Picks a living target this player is allowed to choose
    fn pick(&self, phase: Phase, living: &[PlayerView]) -> Option<PlayerId> {
        let candidates: Vec<PlayerId> = living
            .iter()
            .map(|p| p.id)
            .filter(|id| *id != self.id)
            .filter(|id| phase != Phase::Night || !self.teammates.contains(id))
            .collect();
        candidates.choose(&mut rand::thread_rng()).copied()
    }

    fn acts_at_night(&self) -> bool {
        self.role.and_then(Role::ability).is_some()
    }
}

async fn play(mut bot: Bot, server: SocketAddr, group_id: GroupId) -> Result<(), Box<dyn std::error::Error>> {
    let mut buf = [0u8; 2048];
    let mut heartbeat = interval(Duration::from_secs(10));

    loop {
        let received = tokio::select! {
            _ = heartbeat.tick() => {
                bot.send(server, &Packet::Heartbeat).await?;
                continue;
            }
            received = timeout(Duration::from_secs(300), bot.socket.recv_from(&mut buf)) => received,
        };

        let Ok(Ok((len, _))) = received else {
            println!("Player {}: no news from the server, giving up", bot.id);
            return Ok(());
        };

        let announcement = match deserialize::<Packet>(&buf[0..len]) {
            Ok(Packet::Announcement { announcement, .. }) => announcement,
            Ok(other) => {
                println!("Player {}: unexpected packet {:?}", bot.id, other);
                continue;
            }
            Err(e) => {
                println!("Player {}: failed to deserialize packet: {}", bot.id, e);
                continue;
            }
        };

        match announcement {
            Announcement::RoleAssigned {
                role,
                nickname,
                teammates,
            } => {
                println!(
                    "Player {} is a {}{}",
                    bot.id,
                    role,
                    nickname.map(|n| format!(" ({})", n)).unwrap_or_default()
                );
                bot.role = Some(role);
                bot.teammates = teammates.iter().map(|p| p.id).collect();
            }
            Announcement::PhaseStarted { phase, living, .. } => {
                let wants_to_act = match phase {
                    Phase::Night => bot.acts_at_night(),
                    Phase::Voting => true,
                    _ => false,
                };
                if !wants_to_act || !living.iter().any(|p| p.id == bot.id) {
                    continue;
                }
                if let Some(target_id) = bot.pick(phase, &living) {
                    bot.send(
                        server,
                        &Packet::Select {
                            group_id,
                            target_id,
                            phase,
                        },
                    )
                    .await?;
                }
            }
            Announcement::Rejected { error } => {
                println!("Player {}: rejected: {}", bot.id, error);
            }
            Announcement::GameEnded { winner, roster } => {
                if bot.id == 1 {
                    println!("Game over, {} win", winner);
                    for entry in roster {
                        println!(
                            "  {} ({}): {:?} {}",
                            entry.name,
                            entry.id,
                            entry.role,
                            if entry.alive { "alive" } else { "dead" }
                        );
                    }
                }
                bot.send(server, &Packet::Goodbye).await?;
                return Ok(());
            }
            Announcement::Aborted { reason } => {
                println!("Player {}: game aborted ({:?})", bot.id, reason);
                return Ok(());
            }
            other => {
                if bot.id == 1 {
                    println!("{:?}", other);
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let mut bots = Vec::with_capacity(args.players);
    let mut buf = [0u8; 2048];

    for id in 1..=args.players as PlayerId {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let bot = Bot {
            id,
            socket,
            role: None,
            teammates: HashSet::new(),
        };
        bot.send(
            args.server,
            &Packet::Hello {
                client_version: PROTOCOL_VERSION,
                player_id: id,
                name: format!("Bot{}", id),
            },
        )
        .await?;

        let (len, _) = bot.socket.recv_from(&mut buf).await?;
        match deserialize::<Packet>(&buf[0..len])? {
            Packet::Welcome { player_id } => println!("Player {} connected", player_id),
            other => {
                println!("Expected Welcome but got: {:?}", other);
                return Ok(());
            }
        }
        bots.push(bot);
    }

    let server = args.server;
    let group_id = args.group;

    // Joins are only accepted once the lobby is open
    if let Some(first) = bots.first() {
        first.send(server, &Packet::Start { group_id }).await?;
        let (len, _) = timeout(Duration::from_secs(5), first.socket.recv_from(&mut buf)).await??;
        println!("{:?}", deserialize::<Packet>(&buf[0..len])?);
    }
    for bot in &bots {
        bot.send(server, &Packet::Join { group_id }).await?;
    }

    let mut tasks = Vec::new();
    for bot in bots {
        tasks.push(tokio::spawn(async move {
            if let Err(e) = play(bot, server, group_id).await {
                println!("Bot failed: {}", e);
            }
        }));
    }
    for task in tasks {
        task.await?;
    }

    println!("Test client finished");
    Ok(())
}

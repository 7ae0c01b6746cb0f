use crate::commands::{self, Command, HELP};
use crate::display;
use bincode::{deserialize, serialize};
use log::{error, info, warn};
use shared::{Announcement, GroupId, Packet, Phase, PlayerId, PlayerView, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UdpSocket;
use tokio::time::interval;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// What the client knows about its group's game
#[derive(Debug, Default)]
pub struct GameView {
    pub phase: Option<Phase>,
    pub living: Vec<PlayerView>,
}

impl GameView {
    pub fn apply(&mut self, announcement: &Announcement) {
        match announcement {
            Announcement::PhaseStarted { phase, living, .. } => {
                self.phase = Some(*phase);
                self.living = living.clone();
            }
            Announcement::GameEnded { .. } | Announcement::Aborted { .. } => {
                self.phase = None;
                self.living.clear();
            }
            _ => {}
        }
    }

    pub fn is_living(&self, id: PlayerId) -> bool {
        self.living.iter().any(|p| p.id == id)
    }
}

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    player_id: PlayerId,
    name: String,
    group_id: GroupId,
    connected: bool,
    view: GameView,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        player_id: PlayerId,
        name: &str,
        group_id: GroupId,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            player_id,
            name: name.to_string(),
            group_id,
            connected: false,
            view: GameView::default(),
        })
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server...");

        let packet = Packet::Hello {
            client_version: PROTOCOL_VERSION,
            player_id: self.player_id,
            name: self.name.clone(),
        };
        self.send_packet(&packet).await?;

        Ok(())
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Welcome { player_id } => {
                info!("Connected as player {}", player_id);
                self.connected = true;
                println!("Connected. Type /help for commands.");
            }

            Packet::Announcement {
                group_id,
                announcement,
            } => {
                if group_id.is_some_and(|g| g != self.group_id) {
                    return;
                }
                self.view.apply(&announcement);
                for line in display::render(&announcement) {
                    println!("{}", line);
                }
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                println!("Disconnected: {}", reason);
                self.connected = false;
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }
    }

    /// Returns false when the player wants to leave
    async fn handle_line(&mut self, line: &str) -> Result<bool, Box<dyn std::error::Error>> {
        let command = match commands::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(true),
            Err(message) => {
                println!("{}", message);
                return Ok(true);
            }
        };

        match command {
            Command::Quit => return Ok(false),
            Command::Help => println!("{}", HELP),
            Command::Pick(target) if !self.view.is_living(target) => {
                println!("Player {} is not in the game.", target);
            }
            command => match commands::to_packet(command, self.group_id, self.view.phase) {
                Some(packet) if self.connected => self.send_packet(&packet).await?,
                Some(_) => println!("Not connected yet."),
                None => println!("Nothing to pick right now."),
            },
        }

        Ok(true)
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut heartbeat_interval = interval(HEARTBEAT_INTERVAL);
        let mut buffer = [0u8; 2048];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => match deserialize::<Packet>(&buffer[0..len]) {
                            Ok(packet) => self.handle_packet(packet),
                            Err(e) => warn!("Failed to deserialize packet: {}", e),
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                line = lines.next_line() => {
                    match line? {
                        Some(line) => {
                            if !self.handle_line(&line).await? {
                                break;
                            }
                        }
                        None => break,
                    }
                },

                _ = heartbeat_interval.tick() => {
                    if self.connected {
                        if let Err(e) = self.send_packet(&Packet::Heartbeat).await {
                            error!("Error sending heartbeat: {}", e);
                        }
                    }
                },
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Goodbye).await;
        }

        Ok(())
    }
}

//! UDP relay carrying player commands to the engine and announcements back

use crate::config::GameConfig;
use crate::engine::Engine;
use crate::notifier::{ChannelNotifier, Outbound, Recipient};
use crate::subscribers::{SubscriberManager, SUBSCRIBER_TIMEOUT};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{GroupId, Packet, Phase, PlayerId, PROTOCOL_VERSION};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};

/// Messages sent from network tasks to main relay loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        player_id: PlayerId,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Direct replies that bypass the game, such as handshake answers
#[derive(Debug)]
pub struct Reply {
    pub packet: Packet,
    pub addr: SocketAddr,
}

/// A game command waiting for its turn at the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Start { group_id: GroupId },
    Join { group_id: GroupId, name: String },
    Cancel { group_id: GroupId },
    Select {
        group_id: GroupId,
        target_id: PlayerId,
        phase: Phase,
    },
}

/// Relay between terminal clients and the game engine
pub struct Server {
    socket: Arc<UdpSocket>,
    subscribers: Arc<RwLock<SubscriberManager>>,
    engine: Engine,
    notifier: ChannelNotifier,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    reply_tx: mpsc::UnboundedSender<Reply>,
    reply_rx: Option<mpsc::UnboundedReceiver<Reply>>,
    outbound_rx: Option<mpsc::UnboundedReceiver<Outbound>>,

    // One queue per player keeps their commands in arrival order
    queues: HashMap<PlayerId, mpsc::UnboundedSender<EngineCall>>,
}

impl Server {
    pub async fn new(
        addr: &str,
        max_clients: usize,
        config: GameConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Relay listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let (notifier, outbound_rx) = ChannelNotifier::new();
        let engine = Engine::new(Arc::new(notifier.clone()), config);

        Ok(Server {
            socket,
            subscribers: Arc::new(RwLock::new(SubscriberManager::new(max_clients))),
            engine,
            notifier,
            server_tx,
            server_rx,
            reply_tx,
            reply_rx: Some(reply_rx),
            outbound_rx: Some(outbound_rx),
            queues: HashMap::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Box<dyn std::error::Error>> {
        Ok(self.socket.local_addr()?)
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that delivers replies and game announcements
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let subscribers = Arc::clone(&self.subscribers);
        let (Some(mut reply_rx), Some(mut outbound_rx)) =
            (self.reply_rx.take(), self.outbound_rx.take())
        else {
            warn!("Network sender already running");
            return;
        };

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    reply = reply_rx.recv() => {
                        let Some(Reply { packet, addr }) = reply else { break };
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    outbound = outbound_rx.recv() => {
                        let Some(outbound) = outbound else { break };
                        Self::deliver(&socket, &subscribers, outbound).await;
                    }
                }
            }
        });
    }

    async fn deliver(
        socket: &UdpSocket,
        subscribers: &RwLock<SubscriberManager>,
        outbound: Outbound,
    ) {
        let targets: Vec<(PlayerId, SocketAddr)> = {
            let subscribers = subscribers.read().await;
            match outbound.recipient {
                Recipient::Group(group_id) => subscribers.group_addrs(group_id),
                Recipient::Player(player_id) => subscribers
                    .addr_of(player_id)
                    .map(|addr| vec![(player_id, addr)])
                    .unwrap_or_default(),
            }
        };

        if targets.is_empty() {
            debug!("No address for {:?}, dropping announcement", outbound.recipient);
            return;
        }

        let packet = Packet::Announcement {
            group_id: outbound.group_id,
            announcement: outbound.announcement,
        };
        for (player_id, addr) in targets {
            if let Err(e) = Self::send_packet_impl(socket, &packet, addr).await {
                error!("Failed to send to player {}: {}", player_id, e);
            }
        }
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let subscribers = Arc::clone(&self.subscribers);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut subscribers = subscribers.write().await;
                    subscribers.check_timeouts(SUBSCRIBER_TIMEOUT)
                };

                for player_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { player_id }) {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.reply_tx.send(Reply { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// Spawns the task that feeds one player's commands to the engine in order
    fn spawn_player_worker(
        engine: Engine,
        player_id: PlayerId,
    ) -> mpsc::UnboundedSender<EngineCall> {
        let (tx, mut rx) = mpsc::unbounded_channel::<EngineCall>();

        tokio::spawn(async move {
            while let Some(call) = rx.recv().await {
                let (group_id, result) = match call {
                    EngineCall::Start { group_id } => {
                        (group_id, engine.on_start_request(group_id, player_id).await)
                    }
                    EngineCall::Join { group_id, name } => (
                        group_id,
                        engine.on_join_request(group_id, player_id, &name).await,
                    ),
                    EngineCall::Cancel { group_id } => {
                        (group_id, engine.on_cancel_request(group_id, player_id).await)
                    }
                    EngineCall::Select {
                        group_id,
                        target_id,
                        phase,
                    } => (
                        group_id,
                        engine
                            .on_selection(group_id, player_id, target_id, phase)
                            .await,
                    ),
                };
                if let Err(e) = result {
                    debug!("Group {}: command from {} refused: {}", group_id, player_id, e);
                }
            }
        });

        tx
    }

    /// Queues a command behind the player's earlier ones
    fn dispatch(&mut self, player_id: PlayerId, call: EngineCall) {
        if let Some(queue) = self.queues.get(&player_id) {
            match queue.send(call) {
                Ok(()) => return,
                Err(mpsc::error::SendError(call)) => {
                    warn!("Queue for player {} closed, restarting it", player_id);
                    let queue = Self::spawn_player_worker(self.engine.clone(), player_id);
                    if queue.send(call).is_ok() {
                        self.queues.insert(player_id, queue);
                    }
                    return;
                }
            }
        }

        let queue = Self::spawn_player_worker(self.engine.clone(), player_id);
        if let Err(e) = queue.send(call) {
            error!("Failed to queue command for player {}: {}", player_id, e);
        }
        self.queues.insert(player_id, queue);
    }

    /// Player speaking from `addr`, with the name they announced
    async fn identify(&self, addr: SocketAddr) -> Option<(PlayerId, String)> {
        let mut subscribers = self.subscribers.write().await;
        let player_id = subscribers.find_by_addr(addr)?;
        subscribers.touch(player_id);
        subscribers.get(&player_id).map(|s| (player_id, s.name.clone()))
    }

    /// Processes incoming packets, handing game commands to the engine
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Hello {
                client_version,
                player_id,
                name,
            } => {
                info!(
                    "Player {} ({}) saying hello from {} (version: {})",
                    player_id, name, addr, client_version
                );

                if client_version != PROTOCOL_VERSION {
                    self.send_packet(
                        Packet::Disconnected {
                            reason: "Protocol version mismatch".to_string(),
                        },
                        addr,
                    );
                    return;
                }

                let added = {
                    let mut subscribers = self.subscribers.write().await;
                    subscribers.add_subscriber(player_id, &name, addr)
                };

                if added {
                    self.notifier.mark_reachable(player_id).await;
                    self.send_packet(Packet::Welcome { player_id }, addr);
                } else {
                    self.send_packet(
                        Packet::Disconnected {
                            reason: "Server full".to_string(),
                        },
                        addr,
                    );
                }
            }

            Packet::Heartbeat => {
                self.identify(addr).await;
            }

            Packet::Join { group_id } => {
                let Some((player_id, name)) = self.identify(addr).await else {
                    warn!("Join from unknown address {}", addr);
                    return;
                };
                self.subscribers.write().await.subscribe(player_id, group_id);
                self.dispatch(player_id, EngineCall::Join { group_id, name });
            }

            Packet::Start { group_id } => {
                let Some((player_id, _)) = self.identify(addr).await else {
                    warn!("Start from unknown address {}", addr);
                    return;
                };
                self.subscribers.write().await.subscribe(player_id, group_id);
                self.dispatch(player_id, EngineCall::Start { group_id });
            }

            Packet::Cancel { group_id } => {
                let Some((player_id, _)) = self.identify(addr).await else {
                    warn!("Cancel from unknown address {}", addr);
                    return;
                };
                self.dispatch(player_id, EngineCall::Cancel { group_id });
            }

            Packet::Select {
                group_id,
                target_id,
                phase,
            } => {
                let Some((player_id, _)) = self.identify(addr).await else {
                    warn!("Selection from unknown address {}", addr);
                    return;
                };
                self.dispatch(
                    player_id,
                    EngineCall::Select {
                        group_id,
                        target_id,
                        phase,
                    },
                );
            }

            Packet::Goodbye => {
                let player_id = {
                    let subscribers = self.subscribers.read().await;
                    subscribers.find_by_addr(addr)
                };

                if let Some(player_id) = player_id {
                    self.subscribers.write().await.remove_subscriber(&player_id);
                    self.notifier.mark_unreachable(player_id).await;
                    self.queues.remove(&player_id);
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Main relay loop
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        info!("Relay started successfully");

        while let Some(message) = self.server_rx.recv().await {
            match message {
                ServerMessage::PacketReceived { packet, addr } => {
                    self.handle_packet(packet, addr).await;
                }
                ServerMessage::ClientTimeout { player_id } => {
                    info!("Player {} timed out", player_id);
                    self.notifier.mark_unreachable(player_id).await;
                    self.queues.remove(&player_id);
                }
                ServerMessage::Shutdown => {
                    info!("Relay shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

//! Integration tests for the game engine and the UDP relay
//!
//! These tests drive whole games through the public entry points and let
//! the phase timers run on paused tokio time.

use bincode::{deserialize, serialize};
use client::commands::{self, Command};
use server::config::GameConfig;
use server::engine::Engine;
use server::network::Server;
use server::notifier::{ChannelNotifier, Outbound, Recipient};
use server::session::SessionHandle;
use shared::{
    AbortReason, Announcement, Faction, GameError, GroupId, Packet, Phase, PlayerId, Role,
    PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::sleep;

async fn engine() -> (Engine, ChannelNotifier, mpsc::UnboundedReceiver<Outbound>) {
    let (notifier, rx) = ChannelNotifier::new();
    for id in 1..=30 {
        notifier.mark_reachable(id).await;
    }
    let engine = Engine::new(Arc::new(notifier.clone()), GameConfig::default());
    (engine, notifier, rx)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> Vec<Outbound> {
    let mut out = Vec::new();
    while let Ok(outbound) = rx.try_recv() {
        out.push(outbound);
    }
    out
}

/// Opens a lobby and joins players `first..=last`
async fn fill_lobby(engine: &Engine, group: GroupId, first: PlayerId, last: PlayerId) -> SessionHandle {
    engine.on_start_request(group, first).await.unwrap();
    for id in first..=last {
        engine
            .on_join_request(group, id, &format!("Player{}", id))
            .await
            .unwrap();
    }
    engine.registry().get(group).await.unwrap()
}

async fn phase_of(handle: &SessionHandle) -> Phase {
    handle.lock().await.phase()
}

async fn ids_with_role(handle: &SessionHandle, role: Role) -> Vec<PlayerId> {
    handle
        .lock()
        .await
        .players()
        .iter()
        .filter(|p| p.role == Some(role))
        .map(|p| p.id)
        .collect()
}

/// FULL GAME TESTS
mod game_flow_tests {
    use super::*;

    /// Lobby countdown, a quiet night, discussion, then a unanimous vote
    #[tokio::test(start_paused = true)]
    async fn village_wins_by_voting_out_the_predator() {
        let (engine, _notifier, mut rx) = engine().await;
        let group = -100;
        let handle = fill_lobby(&engine, group, 1, 5).await;
        assert_eq!(phase_of(&handle).await, Phase::Lobby);

        sleep(Duration::from_secs(61)).await;
        assert_eq!(phase_of(&handle).await, Phase::Night);

        let private_roles = drain(&mut rx)
            .into_iter()
            .filter(|o| {
                matches!(o.recipient, Recipient::Player(_))
                    && matches!(o.announcement, Announcement::RoleAssigned { .. })
            })
            .count();
        assert_eq!(private_roles, 5);

        sleep(Duration::from_secs(61)).await;
        assert_eq!(phase_of(&handle).await, Phase::Discussion);
        sleep(Duration::from_secs(91)).await;
        assert_eq!(phase_of(&handle).await, Phase::Voting);

        let predator = ids_with_role(&handle, Role::Predator).await[0];
        let scapegoat = (1..=5).find(|id| *id != predator).unwrap();
        for voter in 1..=5 {
            let target = if voter == predator { scapegoat } else { predator };
            engine
                .on_selection(group, voter, target, Phase::Voting)
                .await
                .unwrap();
        }

        let outbound = drain(&mut rx);
        let lynch = outbound
            .iter()
            .find_map(|o| match &o.announcement {
                Announcement::LynchOutcome(outcome) => Some(outcome.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(lynch.executed.map(|c| c.id), Some(predator));
        assert_eq!(lynch.votes_cast, 5);

        assert!(outbound.iter().any(|o| matches!(
            &o.announcement,
            Announcement::GameEnded { winner: Faction::Village, roster } if roster.len() == 5
        )));

        let session = handle.lock().await;
        assert!(!session.is_active());
        assert!(session.players().is_empty());
    }

    /// Predators reach parity after three nights of unopposed attacks
    #[tokio::test(start_paused = true)]
    async fn predators_win_at_parity() {
        let (engine, _notifier, mut rx) = engine().await;
        let group = -101;
        let handle = fill_lobby(&engine, group, 1, 5).await;
        sleep(Duration::from_secs(61)).await;

        let predator = ids_with_role(&handle, Role::Predator).await[0];
        let mut victims = ids_with_role(&handle, Role::Bystander).await;
        victims.truncate(3);

        // Night 1 kill, then nobody votes
        engine
            .on_selection(group, predator, victims[0], Phase::Night)
            .await
            .unwrap();
        sleep(Duration::from_secs(61)).await;
        assert_eq!(phase_of(&handle).await, Phase::Discussion);
        assert!(!handle.lock().await.player(victims[0]).unwrap().alive);
        sleep(Duration::from_secs(91 + 31)).await;
        assert_eq!(phase_of(&handle).await, Phase::Night);

        // Night 2 kill leaves one predator against two villagers
        engine
            .on_selection(group, predator, victims[1], Phase::Night)
            .await
            .unwrap();
        sleep(Duration::from_secs(61)).await;
        assert_eq!(phase_of(&handle).await, Phase::Discussion);
        sleep(Duration::from_secs(91 + 31)).await;

        // Night 3 kill reaches parity
        engine
            .on_selection(group, predator, victims[2], Phase::Night)
            .await
            .unwrap();
        sleep(Duration::from_secs(61)).await;

        let outbound = drain(&mut rx);
        assert!(outbound.iter().any(|o| matches!(
            o.announcement,
            Announcement::GameEnded {
                winner: Faction::Predators,
                ..
            }
        )));
        assert!(!handle.lock().await.is_active());
    }

    /// A selection made for a phase that already ended is refused
    #[tokio::test(start_paused = true)]
    async fn late_selection_is_stale() {
        let (engine, _notifier, _rx) = engine().await;
        let group = -102;
        let handle = fill_lobby(&engine, group, 1, 6).await;
        sleep(Duration::from_secs(61 + 61)).await;
        assert_eq!(phase_of(&handle).await, Phase::Discussion);

        let predator = ids_with_role(&handle, Role::Predator).await[0];
        let target = if predator == 1 { 2 } else { 1 };
        assert_eq!(
            engine
                .on_selection(group, predator, target, Phase::Night)
                .await,
            Err(GameError::StalePhase)
        );
    }

    /// The same group can host a new game once the previous one is cancelled
    #[tokio::test(start_paused = true)]
    async fn cancelled_group_can_start_again() {
        let (engine, _notifier, mut rx) = engine().await;
        let group = -103;
        let handle = fill_lobby(&engine, group, 1, 5).await;

        engine.on_cancel_request(group, 1).await.unwrap();
        assert!(drain(&mut rx).iter().any(|o| o.announcement
            == Announcement::Aborted {
                reason: AbortReason::Cancelled
            }));

        // The cancelled countdown must not start a game
        sleep(Duration::from_secs(120)).await;
        assert!(!handle.lock().await.is_active());
        assert_eq!(phase_of(&handle).await, Phase::Lobby);

        engine.on_start_request(group, 2).await.unwrap();
        assert_eq!(handle.lock().await.initiator(), Some(2));
    }
}

/// MULTI-GROUP TESTS
mod group_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn groups_progress_independently() {
        let (engine, _notifier, _rx) = engine().await;
        let first = fill_lobby(&engine, -200, 1, 5).await;
        let second = fill_lobby(&engine, -201, 11, 16).await;

        sleep(Duration::from_secs(61)).await;
        assert_eq!(phase_of(&first).await, Phase::Night);
        assert_eq!(phase_of(&second).await, Phase::Night);

        engine.on_cancel_request(-200, 1).await.unwrap();
        sleep(Duration::from_secs(61)).await;

        assert!(!first.lock().await.is_active());
        assert_eq!(phase_of(&second).await, Phase::Discussion);
        assert_eq!(engine.registry().len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn announcements_carry_their_group() {
        let (engine, _notifier, mut rx) = engine().await;
        fill_lobby(&engine, -210, 1, 2).await;
        fill_lobby(&engine, -211, 3, 4).await;

        let outbound = drain(&mut rx);
        assert!(!outbound.is_empty());
        for outbound in outbound {
            match (outbound.recipient, outbound.group_id) {
                (Recipient::Group(group), tagged) => assert_eq!(tagged, Some(group)),
                // Reachability checks belong to no group
                (Recipient::Player(_), None) => {
                    assert_eq!(outbound.announcement, Announcement::PrivateAck)
                }
                (Recipient::Player(id), Some(group)) => {
                    let expected = if id <= 2 { -210 } else { -211 };
                    assert_eq!(group, expected);
                }
            }
        }
    }
}

/// RELAY TESTS
mod relay_tests {
    use super::*;

    async fn spawn_relay() -> SocketAddr {
        let mut server = Server::new("127.0.0.1:0", 16, GameConfig::default())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        addr
    }

    async fn send(socket: &UdpSocket, relay: SocketAddr, packet: &Packet) {
        socket
            .send_to(&serialize(packet).unwrap(), relay)
            .await
            .unwrap();
    }

    async fn receive(socket: &UdpSocket) -> Packet {
        let mut buffer = [0u8; 2048];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buffer))
            .await
            .expect("relay did not answer")
            .unwrap();
        deserialize(&buffer[..len]).unwrap()
    }

    async fn connect(relay: SocketAddr, player_id: PlayerId, name: &str) -> UdpSocket {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        send(
            &socket,
            relay,
            &Packet::Hello {
                client_version: PROTOCOL_VERSION,
                player_id,
                name: name.to_string(),
            },
        )
        .await;
        assert!(matches!(receive(&socket).await, Packet::Welcome { .. }));
        socket
    }

    /// Reads packets until one matches, failing after a handful
    async fn wait_for(socket: &UdpSocket, wanted: impl Fn(&Announcement) -> bool) -> Announcement {
        for _ in 0..8 {
            if let Packet::Announcement { announcement, .. } = receive(socket).await {
                if wanted(&announcement) {
                    return announcement;
                }
            }
        }
        panic!("expected announcement never arrived");
    }

    #[tokio::test]
    async fn join_is_broadcast_to_the_group() {
        let relay = spawn_relay().await;
        let ada = connect(relay, 1, "Ada").await;
        let bo = connect(relay, 2, "Bo").await;

        let start = commands::to_packet(Command::Start, -300, None).unwrap();
        send(&ada, relay, &start).await;
        let opened = wait_for(&ada, |a| matches!(a, Announcement::LobbyStatus { .. })).await;
        assert_eq!(
            opened,
            Announcement::LobbyStatus {
                players: vec![],
                threshold: 5
            }
        );

        let join = commands::to_packet(Command::Join, -300, None).unwrap();
        send(&ada, relay, &join).await;
        send(&bo, relay, &join).await;

        let joined = wait_for(&bo, |a| {
            matches!(a, Announcement::PlayerJoined { player } if player.id == 2)
        })
        .await;
        assert!(matches!(joined, Announcement::PlayerJoined { .. }));

        let status = wait_for(&ada, |a| {
            matches!(a, Announcement::LobbyStatus { players, .. } if players.len() == 2)
        })
        .await;
        match status {
            Announcement::LobbyStatus { players, .. } => {
                let names: Vec<&str> = players.iter().map(|p| p.name.as_str()).collect();
                assert!(names.contains(&"Ada"));
                assert!(names.contains(&"Bo"));
            }
            other => panic!("Unexpected announcement: {:?}", other),
        }
    }

    #[tokio::test]
    async fn selection_without_game_is_rejected() {
        let relay = spawn_relay().await;
        let eve = connect(relay, 5, "Eve").await;

        send(
            &eve,
            relay,
            &Packet::Select {
                group_id: -301,
                target_id: 6,
                phase: Phase::Voting,
            },
        )
        .await;

        let rejected = wait_for(&eve, |a| matches!(a, Announcement::Rejected { .. })).await;
        assert_eq!(
            rejected,
            Announcement::Rejected {
                error: GameError::NoActiveGame
            }
        );
    }

    #[tokio::test]
    async fn malformed_packet_is_ignored() {
        let relay = spawn_relay().await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        socket.send_to(&[0xff, 0x00, 0x13], relay).await.unwrap();

        // The relay keeps serving after garbage
        send(
            &socket,
            relay,
            &Packet::Hello {
                client_version: PROTOCOL_VERSION,
                player_id: 9,
                name: "Ivy".to_string(),
            },
        )
        .await;
        assert!(matches!(
            receive(&socket).await,
            Packet::Welcome { player_id: 9 }
        ));
    }
}

//! Outbound announcements and the channel-backed notifier used by the relay

use async_trait::async_trait;
use log::warn;
use shared::{
    AbortReason, Announcement, Faction, GameError, GroupId, LynchOutcome, NightAbility,
    NightOutcome, Phase, Player, PlayerId, PlayerView, Role, RosterEntry,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

/// Everything the game tells the outside world.
///
/// Group-wide calls take the group id; private calls take the player they
/// are addressed to. Calls returning `bool` report whether the private
/// message reached the player.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn announce_join(&self, group_id: GroupId, player: &Player);

    async fn announce_lobby_status(&self, group_id: GroupId, players: &[Player], threshold: usize);

    /// Private role notice; predators also learn their teammates
    async fn announce_role_assignment(&self, player: &Player, role: Role, teammates: &[Player])
        -> bool;

    async fn announce_unreachable(&self, group_id: GroupId, players: &[Player], majority: bool);

    async fn announce_phase_start(
        &self,
        group_id: GroupId,
        phase: Phase,
        duration: Duration,
        living: &[Player],
    );

    async fn announce_reminder(&self, group_id: GroupId, phase: Phase, seconds_remaining: u64);

    async fn announce_action_recorded(
        &self,
        actor: &Player,
        ability: NightAbility,
        target: &Player,
        effective: bool,
    );

    async fn announce_night_outcome(&self, group_id: GroupId, outcome: &NightOutcome);

    async fn announce_vote_cast(&self, group_id: GroupId, voter: &Player, target: &Player);

    async fn announce_lynch_outcome(&self, group_id: GroupId, outcome: &LynchOutcome);

    async fn announce_game_end(&self, group_id: GroupId, winner: Faction, roster: &[Player]);

    async fn announce_aborted(&self, group_id: GroupId, reason: AbortReason);

    async fn announce_rejection(&self, group_id: GroupId, player_id: PlayerId, error: &GameError);

    /// Checks that `player` can receive private messages
    async fn request_private_ack(&self, player: &Player) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recipient {
    Group(GroupId),
    Player(PlayerId),
}

/// One announcement waiting to be delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub recipient: Recipient,
    /// Group the announcement concerns, when there is one
    pub group_id: Option<GroupId>,
    pub announcement: Announcement,
}

fn views(players: &[Player]) -> Vec<PlayerView> {
    players.iter().map(Player::view).collect()
}

/// Notifier that queues every announcement on an unbounded channel.
///
/// Private delivery succeeds only for players marked reachable; the relay
/// marks players as they say hello and unmarks them when they leave.
#[derive(Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Outbound>,
    reachable: Arc<RwLock<HashSet<PlayerId>>>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                reachable: Arc::new(RwLock::new(HashSet::new())),
            },
            rx,
        )
    }

    pub async fn mark_reachable(&self, player_id: PlayerId) {
        self.reachable.write().await.insert(player_id);
    }

    pub async fn mark_unreachable(&self, player_id: PlayerId) {
        self.reachable.write().await.remove(&player_id);
    }

    pub async fn is_reachable(&self, player_id: PlayerId) -> bool {
        self.reachable.read().await.contains(&player_id)
    }

    fn push(&self, recipient: Recipient, group_id: Option<GroupId>, announcement: Announcement) -> bool {
        if let Err(e) = self.tx.send(Outbound {
            recipient,
            group_id,
            announcement,
        }) {
            warn!("Dropping announcement, relay is gone: {:?}", e.0.announcement);
            return false;
        }
        true
    }

    fn to_group(&self, group_id: GroupId, announcement: Announcement) {
        self.push(Recipient::Group(group_id), Some(group_id), announcement);
    }

    async fn to_player(
        &self,
        player_id: PlayerId,
        group_id: Option<GroupId>,
        announcement: Announcement,
    ) -> bool {
        if !self.is_reachable(player_id).await {
            return false;
        }
        self.push(Recipient::Player(player_id), group_id, announcement)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn announce_join(&self, group_id: GroupId, player: &Player) {
        self.to_group(
            group_id,
            Announcement::PlayerJoined {
                player: player.view(),
            },
        );
    }

    async fn announce_lobby_status(&self, group_id: GroupId, players: &[Player], threshold: usize) {
        self.to_group(
            group_id,
            Announcement::LobbyStatus {
                players: views(players),
                threshold,
            },
        );
    }

    async fn announce_role_assignment(
        &self,
        player: &Player,
        role: Role,
        teammates: &[Player],
    ) -> bool {
        self.to_player(
            player.id,
            None,
            Announcement::RoleAssigned {
                role,
                nickname: player.nickname.clone(),
                teammates: views(teammates),
            },
        )
        .await
    }

    async fn announce_unreachable(&self, group_id: GroupId, players: &[Player], majority: bool) {
        self.to_group(
            group_id,
            Announcement::Unreachable {
                players: views(players),
                majority,
            },
        );
    }

    async fn announce_phase_start(
        &self,
        group_id: GroupId,
        phase: Phase,
        duration: Duration,
        living: &[Player],
    ) {
        self.to_group(
            group_id,
            Announcement::PhaseStarted {
                phase,
                duration_secs: duration.as_secs(),
                living: views(living),
            },
        );
    }

    async fn announce_reminder(&self, group_id: GroupId, phase: Phase, seconds_remaining: u64) {
        self.to_group(
            group_id,
            Announcement::Reminder {
                phase,
                seconds_remaining,
            },
        );
    }

    async fn announce_action_recorded(
        &self,
        actor: &Player,
        ability: NightAbility,
        target: &Player,
        effective: bool,
    ) {
        self.to_player(
            actor.id,
            None,
            Announcement::ActionRecorded {
                ability,
                target: target.view(),
                effective,
            },
        )
        .await;
    }

    async fn announce_night_outcome(&self, group_id: GroupId, outcome: &NightOutcome) {
        self.to_group(group_id, Announcement::NightOutcome(outcome.clone()));
    }

    async fn announce_vote_cast(&self, group_id: GroupId, voter: &Player, target: &Player) {
        self.to_group(
            group_id,
            Announcement::VoteCast {
                voter: voter.view(),
                target: target.view(),
            },
        );
    }

    async fn announce_lynch_outcome(&self, group_id: GroupId, outcome: &LynchOutcome) {
        self.to_group(group_id, Announcement::LynchOutcome(outcome.clone()));
    }

    async fn announce_game_end(&self, group_id: GroupId, winner: Faction, roster: &[Player]) {
        self.to_group(
            group_id,
            Announcement::GameEnded {
                winner,
                roster: roster.iter().map(RosterEntry::from).collect(),
            },
        );
    }

    async fn announce_aborted(&self, group_id: GroupId, reason: AbortReason) {
        self.to_group(group_id, Announcement::Aborted { reason });
    }

    async fn announce_rejection(&self, group_id: GroupId, player_id: PlayerId, error: &GameError) {
        // Rejections still go out to players we cannot confirm, the relay
        // drops them if the address is unknown.
        self.push(
            Recipient::Player(player_id),
            Some(group_id),
            Announcement::Rejected {
                error: error.clone(),
            },
        );
    }

    async fn request_private_ack(&self, player: &Player) -> bool {
        self.to_player(player.id, None, Announcement::PrivateAck).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: PlayerId) -> Player {
        Player::new(id, format!("Player{}", id))
    }

    #[tokio::test]
    async fn test_group_announcement_queued() {
        let (notifier, mut rx) = ChannelNotifier::new();
        notifier.announce_join(-5, &player(1)).await;

        let outbound = rx.try_recv().unwrap();
        assert_eq!(outbound.recipient, Recipient::Group(-5));
        assert_eq!(outbound.group_id, Some(-5));
        match outbound.announcement {
            Announcement::PlayerJoined { player } => assert_eq!(player.id, 1),
            _ => panic!("Unexpected announcement"),
        }
    }

    #[tokio::test]
    async fn test_private_ack_requires_reachability() {
        let (notifier, mut rx) = ChannelNotifier::new();
        let ada = player(1);

        assert!(!notifier.request_private_ack(&ada).await);
        assert!(rx.try_recv().is_err());

        notifier.mark_reachable(1).await;
        assert!(notifier.request_private_ack(&ada).await);
        let outbound = rx.try_recv().unwrap();
        assert_eq!(outbound.recipient, Recipient::Player(1));
        assert_eq!(outbound.announcement, Announcement::PrivateAck);

        notifier.mark_unreachable(1).await;
        assert!(!notifier.request_private_ack(&ada).await);
    }

    #[tokio::test]
    async fn test_role_notice_lists_teammates() {
        let (notifier, mut rx) = ChannelNotifier::new();
        notifier.mark_reachable(1).await;

        let mut predator = player(1);
        predator.role = Some(Role::Predator);
        let teammate = player(2);

        assert!(
            notifier
                .announce_role_assignment(&predator, Role::Predator, &[teammate])
                .await
        );

        match rx.try_recv().unwrap().announcement {
            Announcement::RoleAssigned {
                role,
                nickname,
                teammates,
            } => {
                assert_eq!(role, Role::Predator);
                assert!(nickname.is_none());
                assert_eq!(teammates.len(), 1);
                assert_eq!(teammates[0].id, 2);
            }
            _ => panic!("Unexpected announcement"),
        }
    }

    #[tokio::test]
    async fn test_rejection_always_queued() {
        let (notifier, mut rx) = ChannelNotifier::new();
        notifier
            .announce_rejection(-5, 9, &GameError::AlreadyVoted)
            .await;

        let outbound = rx.try_recv().unwrap();
        assert_eq!(outbound.recipient, Recipient::Player(9));
        assert_eq!(outbound.group_id, Some(-5));
        assert_eq!(
            outbound.announcement,
            Announcement::Rejected {
                error: GameError::AlreadyVoted
            }
        );
    }

    #[tokio::test]
    async fn test_closed_channel_fails_private_delivery() {
        let (notifier, rx) = ChannelNotifier::new();
        notifier.mark_reachable(1).await;
        drop(rx);

        assert!(!notifier.request_private_ack(&player(1)).await);
    }
}

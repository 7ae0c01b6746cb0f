//! Inbound entry points: joins, start and cancel commands, target selections

use crate::config::GameConfig;
use crate::notifier::Notifier;
use crate::registry::SessionRegistry;
use crate::scheduler::PhaseScheduler;
use crate::session::{Session, SessionHandle};
use log::{debug, info};
use shared::{AbortReason, GameError, GroupId, Phase, PlayerId};
use std::sync::Arc;

/// Routes every external event to the right session.
///
/// Each call locks exactly one session for its whole duration. A rejected
/// request is reported to the requesting player through the notifier and
/// also returned to the caller.
#[derive(Clone)]
pub struct Engine {
    registry: Arc<SessionRegistry>,
    scheduler: PhaseScheduler,
    notifier: Arc<dyn Notifier>,
}

impl Engine {
    pub fn new(notifier: Arc<dyn Notifier>, config: GameConfig) -> Self {
        let scheduler = PhaseScheduler::new(Arc::clone(&notifier), Arc::new(config));
        Self {
            registry: Arc::new(SessionRegistry::new()),
            scheduler,
            notifier,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &PhaseScheduler {
        &self.scheduler
    }

    pub async fn on_start_request(
        &self,
        group_id: GroupId,
        initiator_id: PlayerId,
    ) -> Result<(), GameError> {
        let result = self.start(group_id, initiator_id).await;
        self.report(group_id, initiator_id, result).await
    }

    pub async fn on_join_request(
        &self,
        group_id: GroupId,
        player_id: PlayerId,
        name: &str,
    ) -> Result<(), GameError> {
        let result = self.join(group_id, player_id, name).await;
        self.report(group_id, player_id, result).await
    }

    pub async fn on_cancel_request(
        &self,
        group_id: GroupId,
        requester_id: PlayerId,
    ) -> Result<(), GameError> {
        let result = self.cancel(group_id, requester_id).await;
        self.report(group_id, requester_id, result).await
    }

    /// A night target or a vote, depending on the phase the player saw
    pub async fn on_selection(
        &self,
        group_id: GroupId,
        actor_id: PlayerId,
        target_id: PlayerId,
        claimed_phase: Phase,
    ) -> Result<(), GameError> {
        let result = self
            .select(group_id, actor_id, target_id, claimed_phase)
            .await;
        self.report(group_id, actor_id, result).await
    }

    async fn report(
        &self,
        group_id: GroupId,
        player_id: PlayerId,
        result: Result<(), GameError>,
    ) -> Result<(), GameError> {
        if let Err(e) = &result {
            debug!("Group {}: rejected {} for {}", group_id, e, player_id);
            self.notifier
                .announce_rejection(group_id, player_id, e)
                .await;
        }
        result
    }

    async fn active_session(&self, group_id: GroupId) -> Result<SessionHandle, GameError> {
        self.registry
            .get(group_id)
            .await
            .ok_or(GameError::NoActiveGame)
    }

    async fn start(&self, group_id: GroupId, initiator_id: PlayerId) -> Result<(), GameError> {
        let handle = self.registry.get_or_create(group_id).await;
        let mut session = handle.lock().await;

        session.activate(initiator_id)?;
        self.notifier
            .announce_lobby_status(group_id, &[], self.scheduler.config().min_players)
            .await;
        Ok(())
    }

    async fn join(&self, group_id: GroupId, player_id: PlayerId, name: &str) -> Result<(), GameError> {
        let handle = self.active_session(group_id).await?;
        let mut session = handle.lock().await;

        if !session.is_active() {
            return Err(GameError::NoActiveGame);
        }
        if session.phase() != Phase::Lobby || session.roles_assigned() {
            return Err(GameError::NotInLobby);
        }
        if !session.add_player(player_id, name) {
            return Err(GameError::AlreadyJoined);
        }

        let Some(player) = session.player(player_id).cloned() else {
            return Err(GameError::NotAPlayer);
        };
        if !self.notifier.request_private_ack(&player).await {
            session.remove_player(player_id);
            return Err(GameError::UnreachablePlayer);
        }

        info!(
            "Group {}: {} joined ({} players)",
            group_id,
            name,
            session.players().len()
        );
        self.notifier.announce_join(group_id, &player).await;
        self.notifier
            .announce_lobby_status(
                group_id,
                session.players(),
                self.scheduler.config().min_players,
            )
            .await;
        self.scheduler.lobby_joined(&handle, &mut session).await;
        Ok(())
    }

    async fn cancel(&self, group_id: GroupId, requester_id: PlayerId) -> Result<(), GameError> {
        let handle = self.active_session(group_id).await?;
        let mut session = handle.lock().await;

        if !session.is_active() {
            return Err(GameError::NoActiveGame);
        }
        if session.initiator() != Some(requester_id) {
            return Err(GameError::NotInitiator);
        }

        session.reset();
        info!("Group {}: game cancelled by {}", group_id, requester_id);
        self.notifier
            .announce_aborted(group_id, AbortReason::Cancelled)
            .await;
        Ok(())
    }

    async fn select(
        &self,
        group_id: GroupId,
        actor_id: PlayerId,
        target_id: PlayerId,
        claimed_phase: Phase,
    ) -> Result<(), GameError> {
        let handle = self.active_session(group_id).await?;
        let mut session = handle.lock().await;

        if !session.is_active() {
            return Err(GameError::NoActiveGame);
        }
        if claimed_phase != session.phase() {
            return Err(GameError::StalePhase);
        }

        match claimed_phase {
            Phase::Night => self.night_action(&handle, &mut session, actor_id, target_id).await,
            Phase::Voting => self.vote(&handle, &mut session, actor_id, target_id).await,
            Phase::Lobby | Phase::Discussion | Phase::Ended => Err(GameError::NotEligible),
        }
    }

    async fn night_action(
        &self,
        handle: &SessionHandle,
        session: &mut Session,
        actor_id: PlayerId,
        target_id: PlayerId,
    ) -> Result<(), GameError> {
        let receipt = session.record_night_action(actor_id, target_id)?;

        if let (Some(actor), Some(target)) = (
            session.player(actor_id).cloned(),
            session.player(target_id).cloned(),
        ) {
            self.notifier
                .announce_action_recorded(&actor, receipt.ability, &target, receipt.effective)
                .await;
        }

        if receipt.all_acted {
            debug!("Group {}: every night actor has chosen", session.group_id());
            self.scheduler.complete_early(handle, session).await;
        }
        Ok(())
    }

    async fn vote(
        &self,
        handle: &SessionHandle,
        session: &mut Session,
        voter_id: PlayerId,
        target_id: PlayerId,
    ) -> Result<(), GameError> {
        let receipt = session.record_vote(voter_id, target_id)?;

        if let (Some(voter), Some(target)) = (
            session.player(voter_id).cloned(),
            session.player(target_id).cloned(),
        ) {
            self.notifier
                .announce_vote_cast(session.group_id(), &voter, &target)
                .await;
        }

        if receipt.all_voted {
            debug!("Group {}: every vote is in", session.group_id());
            self.scheduler.complete_early(handle, session).await;
        }
        Ok(())
    }
}

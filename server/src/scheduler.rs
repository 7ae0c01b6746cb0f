//! Timed phase transitions.
//!
//! Each session owns at most one timer task. A task sleeps towards its
//! reminder marks, announcing each one, and finally calls
//! [`PhaseScheduler::fire`]. Before touching the session the task compares
//! the [`TimerToken`] it was armed with against the session; a mismatch means
//! the phase already moved on and the task quietly exits.

use crate::config::{GameConfig, PhaseTimer};
use crate::notifier::Notifier;
use crate::rules::{self, Verdict, WinState};
use crate::session::{Session, SessionHandle, TimerHandle, TimerToken};
use log::{debug, info, warn};
use shared::{AbortReason, Faction, GameError, LynchOutcome, NightOutcome, Phase, Player, Role};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Clone)]
pub struct PhaseScheduler {
    notifier: Arc<dyn Notifier>,
    config: Arc<GameConfig>,
}

impl PhaseScheduler {
    pub fn new(notifier: Arc<dyn Notifier>, config: Arc<GameConfig>) -> Self {
        Self { notifier, config }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Arms the timer for the session's current phase, replacing any other
    fn arm(&self, handle: &SessionHandle, session: &mut Session) {
        let Some(timer) = self.config.timer(session.phase()).cloned() else {
            return;
        };

        let token = session.next_token();
        let task = tokio::spawn(self.clone().run_timer(handle.clone(), token, timer));
        session.set_timer(TimerHandle { token, task });
        debug!(
            "Group {}: armed {} timer (generation {})",
            session.group_id(),
            token.phase,
            token.generation
        );
    }

    async fn run_timer(self, handle: SessionHandle, token: TimerToken, timer: PhaseTimer) {
        let mut elapsed = Duration::ZERO;

        for mark in &timer.reminders {
            let at = timer.duration - Duration::from_secs(*mark);
            sleep(at - elapsed).await;
            elapsed = at;

            let session = handle.lock().await;
            if !session.is_current(token) {
                return;
            }
            self.notifier
                .announce_reminder(session.group_id(), token.phase, *mark)
                .await;
        }

        sleep(timer.duration - elapsed).await;
        self.fire(&handle, token).await;
    }

    /// Runs the transition a timer armed with `token` is responsible for.
    ///
    /// Returns `false` without touching the session when the token is
    /// stale.
    pub async fn fire(&self, handle: &SessionHandle, token: TimerToken) -> bool {
        let mut session = handle.lock().await;
        if !session.is_current(token) {
            debug!(
                "Group {}: stale {} timer ignored (generation {})",
                session.group_id(),
                token.phase,
                token.generation
            );
            return false;
        }

        session.detach_timer();
        self.advance(handle, &mut session).await;
        true
    }

    /// Ends the current phase ahead of its timer
    pub async fn complete_early(&self, handle: &SessionHandle, session: &mut Session) {
        session.cancel_timer();
        self.advance(handle, session).await;
    }

    async fn advance(&self, handle: &SessionHandle, session: &mut Session) {
        match session.phase() {
            Phase::Lobby => self.close_lobby(handle, session).await,
            Phase::Night => self.finish_night(handle, session).await,
            Phase::Discussion => self.begin_voting(handle, session).await,
            Phase::Voting => self.finish_voting(handle, session).await,
            Phase::Ended => {}
        }
    }

    /// (Re)starts the lobby countdown once enough players have joined
    pub async fn lobby_joined(&self, handle: &SessionHandle, session: &mut Session) {
        if session.players().len() < self.config.min_players {
            return;
        }

        self.arm(handle, session);
        self.notifier
            .announce_phase_start(
                session.group_id(),
                Phase::Lobby,
                self.config.lobby.duration,
                session.players(),
            )
            .await;
    }

    async fn close_lobby(&self, handle: &SessionHandle, session: &mut Session) {
        let have = session.players().len();
        if have < self.config.min_players {
            info!(
                "Group {}: lobby closed with {} of {} players",
                session.group_id(),
                have,
                self.config.min_players
            );
            self.notifier
                .announce_aborted(session.group_id(), AbortReason::InsufficientPlayers)
                .await;
            session.reset();
            return;
        }

        if let Err(e) = self.start_game(handle, session).await {
            warn!("Group {}: could not start game: {}", session.group_id(), e);
            self.notifier
                .announce_aborted(session.group_id(), AbortReason::InsufficientPlayers)
                .await;
            session.reset();
        }
    }

    /// Assigns roles, sends the private notices and opens the first night
    pub async fn start_game(
        &self,
        handle: &SessionHandle,
        session: &mut Session,
    ) -> Result<(), GameError> {
        session.assign_roles(&mut rand::thread_rng())?;

        let players: Vec<Player> = session.players().to_vec();
        let predators: Vec<Player> = players
            .iter()
            .filter(|p| p.role == Some(Role::Predator))
            .cloned()
            .collect();

        let mut unreachable = Vec::new();
        for player in &players {
            let Some(role) = player.role else {
                continue;
            };
            let teammates: Vec<Player> = match role {
                Role::Predator => predators
                    .iter()
                    .filter(|p| p.id != player.id)
                    .cloned()
                    .collect(),
                _ => Vec::new(),
            };

            if !self
                .notifier
                .announce_role_assignment(player, role, &teammates)
                .await
            {
                session.mark_unreachable(player.id);
                unreachable.push(player.clone());
            }
        }

        if !unreachable.is_empty() {
            let majority = unreachable.len() * 2 > players.len();
            warn!(
                "Group {}: {} of {} players unreachable",
                session.group_id(),
                unreachable.len(),
                players.len()
            );
            self.notifier
                .announce_unreachable(session.group_id(), &unreachable, majority)
                .await;
        }

        info!("Group {}: game started", session.group_id());
        self.begin_night(handle, session).await;
        Ok(())
    }

    async fn begin_night(&self, handle: &SessionHandle, session: &mut Session) {
        session.begin_night();
        info!("Group {}: night {}", session.group_id(), session.round());
        self.arm(handle, session);
        self.notifier
            .announce_phase_start(
                session.group_id(),
                Phase::Night,
                self.config.night.duration,
                &session.living(),
            )
            .await;
    }

    async fn finish_night(&self, handle: &SessionHandle, session: &mut Session) {
        let resolution = session.resolve_night();
        let mut outcome = NightOutcome {
            attacked: resolution.attacked,
            protected: resolution.protected,
            hunted: resolution.hunted,
            casualties: Vec::new(),
        };

        let mut state = WinState::Ongoing;
        for id in resolution.deaths {
            if let Some(casualty) = session.kill(id) {
                outcome.casualties.push(casualty);
            }
            state = rules::evaluate_players(session.players());
            if state != WinState::Ongoing {
                break;
            }
        }

        self.notifier
            .announce_night_outcome(session.group_id(), &outcome)
            .await;

        match state {
            WinState::Decided(winner) => self.conclude(session, winner).await,
            WinState::Ongoing => self.begin_discussion(handle, session).await,
        }
    }

    async fn begin_discussion(&self, handle: &SessionHandle, session: &mut Session) {
        session.begin_discussion();
        self.arm(handle, session);
        self.notifier
            .announce_phase_start(
                session.group_id(),
                Phase::Discussion,
                self.config.discussion.duration,
                &session.living(),
            )
            .await;
    }

    async fn begin_voting(&self, handle: &SessionHandle, session: &mut Session) {
        session.begin_voting();
        self.notifier
            .announce_phase_start(
                session.group_id(),
                Phase::Voting,
                self.config.voting.duration,
                &session.living(),
            )
            .await;

        if session.expected().is_empty() {
            debug!("Group {}: nobody can vote", session.group_id());
            self.finish_voting(handle, session).await;
            return;
        }
        self.arm(handle, session);
    }

    async fn finish_voting(&self, handle: &SessionHandle, session: &mut Session) {
        let tally = session.tally();
        let mut outcome = LynchOutcome {
            executed: None,
            tied: Vec::new(),
            votes_cast: session.votes().len(),
            eligible: session.expected().len(),
            breakdown: tally.breakdown,
        };

        match tally.verdict {
            Verdict::Executed(id) => outcome.executed = session.kill(id),
            Verdict::Tie(candidates) => outcome.tied = candidates,
            Verdict::NoVotes => {}
        }

        self.notifier
            .announce_lynch_outcome(session.group_id(), &outcome)
            .await;

        match rules::evaluate_players(session.players()) {
            WinState::Decided(winner) => self.conclude(session, winner).await,
            WinState::Ongoing => self.begin_night(handle, session).await,
        }
    }

    async fn conclude(&self, session: &mut Session, winner: Faction) {
        session.finish();
        info!("Group {}: {} win", session.group_id(), winner);
        self.notifier
            .announce_game_end(session.group_id(), winner, session.players())
            .await;
        session.reset();
    }
}

//! Per-group game session state and its bookkeeping rules

use crate::roles;
use crate::rules::{self, NightActionSet, NightResolution, Tally};
use log::{debug, info};
use rand::Rng;
use shared::{Casualty, GameError, GroupId, NightAbility, Phase, Player, PlayerId, Role, MIN_PLAYERS};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Shared, serialized access to one session
pub type SessionHandle = Arc<Mutex<Session>>;

/// Identifies the phase instance a timer was armed for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerToken {
    pub generation: u64,
    pub phase: Phase,
}

/// The single outstanding timer task of a session
#[derive(Debug)]
pub struct TimerHandle {
    pub token: TimerToken,
    pub task: JoinHandle<()>,
}

/// Result of an accepted night action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionReceipt {
    pub ability: NightAbility,
    /// False when a hunt targets someone it cannot harm
    pub effective: bool,
    pub all_acted: bool,
}

/// Result of an accepted vote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteReceipt {
    pub all_voted: bool,
}

/// Everything observable about a session from the outside
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub group_id: GroupId,
    pub active: bool,
    pub initiator: Option<PlayerId>,
    pub phase: Phase,
    pub round: u32,
    pub players: Vec<Player>,
    pub roles_assigned: bool,
    pub night_actions: NightActionSet,
    pub votes: BTreeMap<PlayerId, PlayerId>,
    pub expected: BTreeSet<PlayerId>,
    pub has_timer: bool,
}

#[derive(Debug)]
pub struct Session {
    group_id: GroupId,
    active: bool,
    initiator: Option<PlayerId>,
    phase: Phase,
    round: u32,
    players: Vec<Player>,
    roles_assigned: bool,
    night_actions: NightActionSet,
    votes: BTreeMap<PlayerId, PlayerId>,
    expected: BTreeSet<PlayerId>,
    generation: u64,
    timer: Option<TimerHandle>,
}

impl Session {
    pub fn new(group_id: GroupId) -> Self {
        Self {
            group_id,
            active: false,
            initiator: None,
            phase: Phase::Lobby,
            round: 0,
            players: Vec::new(),
            roles_assigned: false,
            night_actions: NightActionSet::default(),
            votes: BTreeMap::new(),
            expected: BTreeSet::new(),
            generation: 0,
            timer: None,
        }
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn initiator(&self) -> Option<PlayerId> {
        self.initiator
    }

    /// Nights started so far in this game
    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn roles_assigned(&self) -> bool {
        self.roles_assigned
    }

    /// Players in join order
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn living(&self) -> Vec<Player> {
        self.players.iter().filter(|p| p.alive).cloned().collect()
    }

    pub fn expected(&self) -> &BTreeSet<PlayerId> {
        &self.expected
    }

    pub fn votes(&self) -> &BTreeMap<PlayerId, PlayerId> {
        &self.votes
    }

    pub fn night_actions(&self) -> &NightActionSet {
        &self.night_actions
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            group_id: self.group_id,
            active: self.active,
            initiator: self.initiator,
            phase: self.phase,
            round: self.round,
            players: self.players.clone(),
            roles_assigned: self.roles_assigned,
            night_actions: self.night_actions.clone(),
            votes: self.votes.clone(),
            expected: self.expected.clone(),
            has_timer: self.timer.is_some(),
        }
    }

    /// Opens a fresh lobby started by `initiator`
    pub fn activate(&mut self, initiator: PlayerId) -> Result<(), GameError> {
        if self.active {
            return Err(GameError::AlreadyActive);
        }

        self.reset();
        self.phase = Phase::Lobby;
        self.active = true;
        self.initiator = Some(initiator);
        info!("Group {}: lobby opened by {}", self.group_id, initiator);
        Ok(())
    }

    pub fn add_player(&mut self, id: PlayerId, name: &str) -> bool {
        if self.phase != Phase::Lobby || self.roles_assigned || self.player(id).is_some() {
            return false;
        }

        self.players.push(Player::new(id, name));
        debug!("Group {}: {} ({}) joined", self.group_id, name, id);
        true
    }

    /// Rolls back a join; only possible before roles are handed out
    pub fn remove_player(&mut self, id: PlayerId) -> bool {
        if self.phase != Phase::Lobby || self.roles_assigned {
            return false;
        }

        let before = self.players.len();
        self.players.retain(|p| p.id != id);
        self.players.len() != before
    }

    pub fn assign_roles(&mut self, rng: &mut impl Rng) -> Result<(), GameError> {
        if self.roles_assigned {
            return Err(GameError::RolesAlreadyAssigned);
        }
        if self.phase != Phase::Lobby {
            return Err(GameError::NotInLobby);
        }
        if self.players.len() < MIN_PLAYERS {
            return Err(GameError::InsufficientPlayers {
                have: self.players.len(),
                need: MIN_PLAYERS,
            });
        }

        roles::assign_roles(&mut self.players, rng);
        self.roles_assigned = true;
        info!(
            "Group {}: roles assigned to {} players",
            self.group_id,
            self.players.len()
        );
        Ok(())
    }

    pub fn mark_unreachable(&mut self, id: PlayerId) {
        if let Some(player) = self.players.iter_mut().find(|p| p.id == id) {
            player.reachable = false;
        }
    }

    /// Kills a living player; returns the casualty only on the first call
    pub fn kill(&mut self, id: PlayerId) -> Option<Casualty> {
        let player = self.players.iter_mut().find(|p| p.id == id && p.alive)?;
        player.alive = false;
        self.expected.remove(&id);

        let role = player.role?;
        info!("Group {}: {} ({}) died as {}", self.group_id, player.name, id, role);
        Some(Casualty {
            id,
            name: player.name.clone(),
            role,
        })
    }

    pub fn begin_night(&mut self) {
        self.enter(Phase::Night);
        self.round += 1;
        self.night_actions.clear();
        self.expected = self
            .players
            .iter()
            .filter(|p| p.alive && p.role.and_then(Role::ability).is_some())
            .map(|p| p.id)
            .collect();
    }

    pub fn begin_discussion(&mut self) {
        self.enter(Phase::Discussion);
        self.expected.clear();
    }

    pub fn begin_voting(&mut self) {
        self.enter(Phase::Voting);
        self.votes.clear();
        self.expected = self
            .players
            .iter()
            .filter(|p| p.alive)
            .map(|p| p.id)
            .collect();
    }

    pub fn finish(&mut self) {
        self.enter(Phase::Ended);
        self.expected.clear();
    }

    fn enter(&mut self, phase: Phase) {
        debug!("Group {}: {} -> {}", self.group_id, self.phase, phase);
        self.phase = phase;
        self.generation += 1;
    }

    pub fn record_night_action(
        &mut self,
        actor_id: PlayerId,
        target_id: PlayerId,
    ) -> Result<ActionReceipt, GameError> {
        if self.phase != Phase::Night {
            return Err(GameError::StalePhase);
        }
        let actor = self.player(actor_id).ok_or(GameError::NotAPlayer)?;
        if !actor.alive {
            return Err(GameError::DeadActor);
        }
        // A repeat submission is always reported as such, whatever its target.
        if self.night_actions.has_acted(actor_id) {
            return Err(GameError::AlreadyActed);
        }
        let target = self.player(target_id).ok_or(GameError::NoCandidate)?;
        if !target.alive {
            return Err(GameError::DeadTarget);
        }

        let ability = actor
            .role
            .and_then(Role::ability)
            .ok_or(GameError::NoNightAbility)?;

        // Predators never strike their own side; nobody targets themselves.
        if actor_id == target_id
            || (ability == NightAbility::Attack && target.role == Some(Role::Predator))
        {
            return Err(GameError::InvalidTarget);
        }

        let effective = match ability {
            NightAbility::Hunt => target.role == Some(Role::Predator),
            _ => true,
        };

        match ability {
            NightAbility::Attack => {
                self.night_actions.attacks.insert(actor_id, target_id);
            }
            NightAbility::Protect => {
                if self.night_actions.protection.is_some() {
                    return Err(GameError::AlreadyActed);
                }
                self.night_actions.protection = Some((actor_id, target_id));
            }
            NightAbility::Hunt => {
                if self.night_actions.hunt.is_some() {
                    return Err(GameError::AlreadyActed);
                }
                self.night_actions.hunt = Some((actor_id, target_id));
            }
        }

        debug!(
            "Group {}: night action {:?} by {} on {}",
            self.group_id, ability, actor_id, target_id
        );

        Ok(ActionReceipt {
            ability,
            effective,
            all_acted: self.all_acted(),
        })
    }

    /// Every expected night actor has a recorded action
    pub fn all_acted(&self) -> bool {
        self.expected
            .iter()
            .all(|id| self.night_actions.has_acted(*id))
    }

    pub fn record_vote(
        &mut self,
        voter_id: PlayerId,
        target_id: PlayerId,
    ) -> Result<VoteReceipt, GameError> {
        if self.phase != Phase::Voting {
            return Err(GameError::StalePhase);
        }
        let voter = self.player(voter_id).ok_or(GameError::NotAPlayer)?;
        if !voter.alive {
            return Err(GameError::DeadActor);
        }
        if !self.expected.contains(&voter_id) {
            return Err(GameError::NotEligible);
        }
        if self.votes.contains_key(&voter_id) {
            return Err(GameError::AlreadyVoted);
        }
        let target = self.player(target_id).ok_or(GameError::NoCandidate)?;
        if !target.alive {
            return Err(GameError::DeadTarget);
        }

        self.votes.insert(voter_id, target_id);
        debug!(
            "Group {}: {} voted for {} ({}/{})",
            self.group_id,
            voter_id,
            target_id,
            self.votes.len(),
            self.expected.len()
        );

        Ok(VoteReceipt {
            all_voted: self.all_voted(),
        })
    }

    pub fn all_voted(&self) -> bool {
        self.votes.len() >= self.expected.len()
    }

    pub fn resolve_night(&self) -> NightResolution {
        rules::resolve_night(&self.night_actions, &self.players)
    }

    pub fn tally(&self) -> Tally {
        rules::tally(&self.votes)
    }

    /// Token for the phase instance currently running
    pub fn token(&self) -> TimerToken {
        TimerToken {
            generation: self.generation,
            phase: self.phase,
        }
    }

    /// Starts a new timer epoch within the current phase, invalidating
    /// every token handed out before
    pub fn next_token(&mut self) -> TimerToken {
        self.generation += 1;
        self.token()
    }

    pub fn is_current(&self, token: TimerToken) -> bool {
        self.active && token.generation == self.generation && token.phase == self.phase
    }

    /// Installs a timer, aborting the previous one
    pub fn set_timer(&mut self, timer: TimerHandle) {
        self.cancel_timer();
        self.timer = Some(timer);
    }

    pub fn has_timer(&self) -> bool {
        self.timer.is_some()
    }

    /// Forgets the timer without aborting it; used by the timer task itself
    pub fn detach_timer(&mut self) -> Option<TimerHandle> {
        self.timer.take()
    }

    pub fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.task.abort();
            debug!(
                "Group {}: cancelled {} timer (generation {})",
                self.group_id, timer.token.phase, timer.token.generation
            );
        }
    }

    /// Returns the session to its inactive baseline. Safe to repeat.
    pub fn reset(&mut self) {
        self.cancel_timer();
        self.generation += 1;
        self.active = false;
        self.initiator = None;
        self.phase = Phase::Lobby;
        self.round = 0;
        self.players.clear();
        self.roles_assigned = false;
        self.night_actions.clear();
        self.votes.clear();
        self.expected.clear();
    }
}

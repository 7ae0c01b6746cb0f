//! Pure game rules: win detection, vote tallying and night resolution

use shared::{Faction, Player, PlayerId, Role, VoteCount};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinState {
    Ongoing,
    Decided(Faction),
}

/// Predators win at parity, the village wins once no predator is left
pub fn evaluate(living_predators: usize, living_others: usize) -> WinState {
    if living_predators == 0 {
        WinState::Decided(Faction::Village)
    } else if living_predators >= living_others {
        WinState::Decided(Faction::Predators)
    } else {
        WinState::Ongoing
    }
}

pub fn evaluate_players(players: &[Player]) -> WinState {
    let (predators, others) = players
        .iter()
        .filter(|p| p.alive)
        .fold((0, 0), |(a, b), p| match p.faction() {
            Some(Faction::Predators) => (a + 1, b),
            _ => (a, b + 1),
        });
    evaluate(predators, others)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    NoVotes,
    Executed(PlayerId),
    Tie(Vec<PlayerId>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    pub verdict: Verdict,
    /// Votes per target, highest count first, ties broken by target id
    pub breakdown: Vec<VoteCount>,
}

/// Counts `voter -> target` pairs. A single leader is executed; a tie at
/// the top means nobody dies.
pub fn tally(votes: &BTreeMap<PlayerId, PlayerId>) -> Tally {
    let mut per_target: BTreeMap<PlayerId, Vec<PlayerId>> = BTreeMap::new();
    for (voter, target) in votes {
        per_target.entry(*target).or_default().push(*voter);
    }

    let mut breakdown: Vec<VoteCount> = per_target
        .into_iter()
        .map(|(target, voters)| VoteCount { target, voters })
        .collect();
    breakdown.sort_by(|a, b| b.count().cmp(&a.count()).then(a.target.cmp(&b.target)));

    let Some(top) = breakdown.first().map(VoteCount::count) else {
        return Tally {
            verdict: Verdict::NoVotes,
            breakdown,
        };
    };

    let leaders: Vec<PlayerId> = breakdown
        .iter()
        .take_while(|entry| entry.count() == top)
        .map(|entry| entry.target)
        .collect();

    let verdict = match leaders.as_slice() {
        [single] => Verdict::Executed(*single),
        _ => Verdict::Tie(leaders),
    };

    Tally { verdict, breakdown }
}

/// Night choices recorded so far, one slot per acting role
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NightActionSet {
    pub attacks: BTreeMap<PlayerId, PlayerId>,
    pub protection: Option<(PlayerId, PlayerId)>,
    pub hunt: Option<(PlayerId, PlayerId)>,
}

impl NightActionSet {
    pub fn is_empty(&self) -> bool {
        self.attacks.is_empty() && self.protection.is_none() && self.hunt.is_none()
    }

    pub fn has_acted(&self, actor: PlayerId) -> bool {
        self.attacks.contains_key(&actor)
            || self.protection.map(|(id, _)| id) == Some(actor)
            || self.hunt.map(|(id, _)| id) == Some(actor)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Who dies tonight, in the order deaths are applied
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NightResolution {
    pub attacked: bool,
    pub protected: bool,
    pub hunted: bool,
    pub deaths: Vec<PlayerId>,
}

/// Resolves one night against the current roster.
///
/// The protected player is immune to every death source. The hunt only
/// lands on a living predator; predator attacks land on any unprotected
/// living target not already marked.
pub fn resolve_night(actions: &NightActionSet, players: &[Player]) -> NightResolution {
    let protected = actions.protection.map(|(_, target)| target);
    let is_alive = |id: PlayerId| players.iter().any(|p| p.id == id && p.alive);
    let role_of = |id: PlayerId| players.iter().find(|p| p.id == id).and_then(|p| p.role);

    let mut deaths = Vec::new();

    if let Some((_, target)) = actions.hunt {
        if is_alive(target) && role_of(target) == Some(Role::Predator) && Some(target) != protected
        {
            deaths.push(target);
        }
    }

    for target in actions.attacks.values() {
        if Some(*target) != protected && is_alive(*target) && !deaths.contains(target) {
            deaths.push(*target);
        }
    }

    NightResolution {
        attacked: !actions.attacks.is_empty(),
        protected: actions.protection.is_some(),
        hunted: actions.hunt.is_some(),
        deaths,
    }
}

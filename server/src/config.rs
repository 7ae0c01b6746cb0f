//! Phase durations and player thresholds

use shared::{Phase, MIN_PLAYERS};
use std::time::Duration;

/// Length of one timed phase plus the marks (seconds remaining) at which a
/// reminder is announced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTimer {
    pub duration: Duration,
    pub reminders: Vec<u64>,
}

impl PhaseTimer {
    /// Builds a timer, keeping only reminder marks strictly inside the
    /// duration, sorted from the earliest announcement to the latest.
    pub fn new(duration_secs: u64, reminders: &[u64]) -> Self {
        let mut marks: Vec<u64> = reminders
            .iter()
            .copied()
            .filter(|mark| *mark > 0 && *mark < duration_secs)
            .collect();
        marks.sort_unstable_by(|a, b| b.cmp(a));
        marks.dedup();

        Self {
            duration: Duration::from_secs(duration_secs),
            reminders: marks,
        }
    }

    /// Same reminder marks with a different duration; marks that no longer
    /// fit are dropped
    pub fn with_duration(&self, duration_secs: u64) -> Self {
        Self::new(duration_secs, &self.reminders)
    }

    pub fn secs(&self) -> u64 {
        self.duration.as_secs()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    pub min_players: usize,
    pub lobby: PhaseTimer,
    pub night: PhaseTimer,
    pub discussion: PhaseTimer,
    pub voting: PhaseTimer,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_players: MIN_PLAYERS,
            lobby: PhaseTimer::new(60, &[30]),
            night: PhaseTimer::new(60, &[30, 10]),
            discussion: PhaseTimer::new(90, &[60, 30, 10]),
            voting: PhaseTimer::new(30, &[15]),
        }
    }
}

impl GameConfig {
    /// Timer driving the given phase; `Ended` has none
    pub fn timer(&self, phase: Phase) -> Option<&PhaseTimer> {
        match phase {
            Phase::Lobby => Some(&self.lobby),
            Phase::Night => Some(&self.night),
            Phase::Discussion => Some(&self.discussion),
            Phase::Voting => Some(&self.voting),
            Phase::Ended => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timings() {
        let config = GameConfig::default();

        assert_eq!(config.min_players, 5);
        assert_eq!(config.lobby.secs(), 60);
        assert_eq!(config.lobby.reminders, vec![30]);
        assert_eq!(config.night.secs(), 60);
        assert_eq!(config.night.reminders, vec![30, 10]);
        assert_eq!(config.discussion.secs(), 90);
        assert_eq!(config.discussion.reminders, vec![60, 30, 10]);
        assert_eq!(config.voting.secs(), 30);
        assert_eq!(config.voting.reminders, vec![15]);
    }

    #[test]
    fn test_reminders_sorted_and_deduplicated() {
        let timer = PhaseTimer::new(100, &[10, 50, 30, 50]);
        assert_eq!(timer.reminders, vec![50, 30, 10]);
    }

    #[test]
    fn test_reminders_outside_duration_dropped() {
        let timer = PhaseTimer::new(20, &[0, 10, 20, 45]);
        assert_eq!(timer.reminders, vec![10]);
    }

    #[test]
    fn test_shortened_duration_drops_marks() {
        let discussion = GameConfig::default().discussion;
        let shortened = discussion.with_duration(45);

        assert_eq!(shortened.secs(), 45);
        assert_eq!(shortened.reminders, vec![30, 10]);

        let tiny = discussion.with_duration(5);
        assert!(tiny.reminders.is_empty());
    }

    #[test]
    fn test_timer_lookup_by_phase() {
        let config = GameConfig::default();

        assert_eq!(config.timer(Phase::Lobby), Some(&config.lobby));
        assert_eq!(config.timer(Phase::Night), Some(&config.night));
        assert_eq!(config.timer(Phase::Discussion), Some(&config.discussion));
        assert_eq!(config.timer(Phase::Voting), Some(&config.voting));
        assert!(config.timer(Phase::Ended).is_none());
    }
}

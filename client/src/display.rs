//! Plain-text rendering of announcements

use shared::{AbortReason, Announcement, NightAbility, Phase, PlayerView, Role, VoteCount};

fn names(players: &[PlayerView]) -> String {
    players
        .iter()
        .map(|p| format!("{} [{}]", p.name, p.id))
        .collect::<Vec<_>>()
        .join(", ")
}

fn role_blurb(role: Role) -> &'static str {
    match role {
        Role::Predator => "Each night, pick someone to attack.",
        Role::Protector => "Each night, pick someone to shield from every harm.",
        Role::Hunter => "Each night, pick someone to hunt. Only predators fall to you.",
        Role::Bystander => "Find the predators and vote them out.",
    }
}

fn breakdown(counts: &[VoteCount]) -> String {
    counts
        .iter()
        .map(|c| format!("[{}] x{}", c.target, c.count()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// One or more lines describing `announcement`
pub fn render(announcement: &Announcement) -> Vec<String> {
    match announcement {
        Announcement::PlayerJoined { player } => {
            vec![format!("{} joined the game.", player.name)]
        }
        Announcement::LobbyStatus { players, threshold } => {
            if players.is_empty() {
                vec![format!("A lobby is open. {} players are needed. Type /join.", threshold)]
            } else {
                vec![format!(
                    "Lobby {}/{}: {}",
                    players.len(),
                    threshold,
                    names(players)
                )]
            }
        }
        Announcement::RoleAssigned {
            role,
            nickname,
            teammates,
        } => {
            let mut lines = vec![match nickname {
                Some(nickname) => format!("You are a {}, known as the {}.", role, nickname),
                None => format!("You are a {}.", role),
            }];
            lines.push(role_blurb(*role).to_string());
            if !teammates.is_empty() {
                lines.push(format!("Your fellow predators: {}", names(teammates)));
            }
            lines
        }
        Announcement::Unreachable { players, majority } => {
            let mut lines = vec![format!("Could not reach privately: {}", names(players))];
            if *majority {
                lines.push("Most players never got their role. Play on with care.".to_string());
            }
            lines
        }
        Announcement::PhaseStarted {
            phase,
            duration_secs,
            living,
        } => {
            let headline = match phase {
                Phase::Lobby => format!("The game starts in {} seconds.", duration_secs),
                Phase::Night => format!(
                    "Night falls ({}s). If your role acts at night, /pick a target.",
                    duration_secs
                ),
                Phase::Discussion => format!("Day breaks. Discuss for {} seconds.", duration_secs),
                Phase::Voting => format!("Voting is open for {} seconds. /pick to vote.", duration_secs),
                Phase::Ended => "The game is over.".to_string(),
            };
            vec![headline, format!("Players: {}", names(living))]
        }
        Announcement::Reminder {
            phase,
            seconds_remaining,
        } => vec![format!("{}: {} seconds left.", phase, seconds_remaining)],
        Announcement::ActionRecorded {
            ability,
            target,
            effective,
        } => {
            let verb = match ability {
                NightAbility::Attack => "attack",
                NightAbility::Protect => "protect",
                NightAbility::Hunt => "hunt",
            };
            let mut line = format!("You chose to {} {}.", verb, target.name);
            if !effective {
                line.push_str(" They are no predator, the hunt will come to nothing.");
            }
            vec![line]
        }
        Announcement::NightOutcome(outcome) => {
            let mut lines = Vec::new();
            if outcome.attacked {
                lines.push("Predators prowled the village.".to_string());
            }
            if outcome.protected {
                lines.push("The Protector kept watch.".to_string());
            }
            if outcome.hunted {
                lines.push("The Hunter went out.".to_string());
            }
            if outcome.casualties.is_empty() {
                lines.push("Nobody died tonight.".to_string());
            }
            for casualty in &outcome.casualties {
                lines.push(format!("{} was found dead. They were a {}.", casualty.name, casualty.role));
            }
            lines
        }
        Announcement::VoteCast { voter, target } => {
            vec![format!("{} votes for {}.", voter.name, target.name)]
        }
        Announcement::LynchOutcome(outcome) => {
            let mut lines = vec![format!("{} of {} voted.", outcome.votes_cast, outcome.eligible)];
            if !outcome.breakdown.is_empty() {
                lines.push(format!("Votes: {}", breakdown(&outcome.breakdown)));
            }
            match &outcome.executed {
                Some(casualty) => lines.push(format!(
                    "{} was executed. They were a {}.",
                    casualty.name, casualty.role
                )),
                None if !outcome.tied.is_empty() => {
                    lines.push("The vote is tied. Nobody is executed.".to_string())
                }
                None => lines.push("Nobody is executed.".to_string()),
            }
            lines
        }
        Announcement::GameEnded { winner, roster } => {
            let mut lines = vec![format!("The {} win!", winner)];
            for entry in roster {
                let role = entry
                    .role
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "?".to_string());
                let nickname = entry
                    .nickname
                    .as_ref()
                    .map(|n| format!(" ({})", n))
                    .unwrap_or_default();
                let status = if entry.alive { "alive" } else { "dead" };
                lines.push(format!("  {}: {}{}, {}", entry.name, role, nickname, status));
            }
            lines
        }
        Announcement::Aborted { reason } => vec![match reason {
            AbortReason::Cancelled => "The game was cancelled.".to_string(),
            AbortReason::InsufficientPlayers => "Not enough players joined. The game is off.".to_string(),
        }],
        Announcement::Rejected { error } => vec![format!("Not accepted: {}.", error)],
        Announcement::PrivateAck => vec!["The game can reach you privately.".to_string()],
    }
}

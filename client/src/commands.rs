//! Slash commands typed by the player and their translation into packets

use shared::{GroupId, Packet, Phase, PlayerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Join,
    Cancel,
    /// Night target or vote, depending on the current phase
    Pick(PlayerId),
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  /start       open a lobby in this group
  /join        join the open lobby
  /cancel      cancel the game (only whoever started it)
  /pick <id>   choose a night target or cast your vote
  /help        show this text
  /quit        leave";

/// Parses one line of input. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };

    let command = match head.trim_start_matches('/') {
        "start" => Command::Start,
        "join" => Command::Join,
        "cancel" => Command::Cancel,
        "pick" | "vote" => {
            let id = words
                .next()
                .ok_or_else(|| "usage: /pick <player id>".to_string())?;
            let id = id
                .parse::<PlayerId>()
                .map_err(|_| format!("not a player id: {}", id))?;
            Command::Pick(id)
        }
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command: {}", other)),
    };

    Ok(Some(command))
}

/// Packet for a command, given the group and the phase last announced.
///
/// Returns `None` for commands handled locally, and for picks made while
/// no phase accepts them.
pub fn to_packet(command: Command, group_id: GroupId, phase: Option<Phase>) -> Option<Packet> {
    match command {
        Command::Start => Some(Packet::Start { group_id }),
        Command::Join => Some(Packet::Join { group_id }),
        Command::Cancel => Some(Packet::Cancel { group_id }),
        Command::Pick(target_id) => match phase {
            Some(phase @ (Phase::Night | Phase::Voting)) => Some(Packet::Select {
                group_id,
                target_id,
                phase,
            }),
            _ => None,
        },
        Command::Help | Command::Quit => None,
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MIN_PLAYERS: usize = 5;

pub type PlayerId = i64;
pub type GroupId = i64;

/// Side a player wins with. Predators form faction A, everyone else faction B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Faction {
    Predators,
    Village,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NightAbility {
    Attack,
    Protect,
    Hunt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Predator,
    Protector,
    Hunter,
    Bystander,
}

impl Role {
    pub fn faction(self) -> Faction {
        match self {
            Role::Predator => Faction::Predators,
            Role::Protector | Role::Hunter | Role::Bystander => Faction::Village,
        }
    }

    pub fn ability(self) -> Option<NightAbility> {
        match self {
            Role::Predator => Some(NightAbility::Attack),
            Role::Protector => Some(NightAbility::Protect),
            Role::Hunter => Some(NightAbility::Hunt),
            Role::Bystander => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Predator => write!(f, "Predator"),
            Role::Protector => write!(f, "Protector"),
            Role::Hunter => write!(f, "Hunter"),
            Role::Bystander => write!(f, "Bystander"),
        }
    }
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Faction::Predators => write!(f, "Predators"),
            Faction::Village => write!(f, "Village"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Lobby,
    Night,
    Discussion,
    Voting,
    Ended,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Lobby => write!(f, "Lobby"),
            Phase::Night => write!(f, "Night"),
            Phase::Discussion => write!(f, "Discussion"),
            Phase::Voting => write!(f, "Voting"),
            Phase::Ended => write!(f, "Ended"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub role: Option<Role>,
    pub alive: bool,
    /// Cosmetic tag some bystanders receive at role assignment
    pub nickname: Option<String>,
    /// Cleared when a private message to this player could not be delivered
    pub reachable: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            role: None,
            alive: true,
            nickname: None,
            reachable: true,
        }
    }

    pub fn faction(&self) -> Option<Faction> {
        self.role.map(Role::faction)
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id,
            name: self.name.clone(),
            alive: self.alive,
        }
    }
}

/// What every group member may know about a player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub alive: bool,
}

/// A player who died, with the role revealed on death
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Casualty {
    pub id: PlayerId,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCount {
    pub target: PlayerId,
    pub voters: Vec<PlayerId>,
}

impl VoteCount {
    pub fn count(&self) -> usize {
        self.voters.len()
    }
}

/// Aggregate night result; never says who acted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightOutcome {
    pub attacked: bool,
    pub protected: bool,
    pub hunted: bool,
    pub casualties: Vec<Casualty>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LynchOutcome {
    pub executed: Option<Casualty>,
    /// Players tied at the highest count when nobody was executed
    pub tied: Vec<PlayerId>,
    pub breakdown: Vec<VoteCount>,
    pub votes_cast: usize,
    pub eligible: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: PlayerId,
    pub name: String,
    pub role: Option<Role>,
    pub nickname: Option<String>,
    pub alive: bool,
}

impl From<&Player> for RosterEntry {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id,
            name: player.name.clone(),
            role: player.role,
            nickname: player.nickname.clone(),
            alive: player.alive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbortReason {
    Cancelled,
    InsufficientPlayers,
}

/// Every reason the game can turn a player's input down.
///
/// None of these end a session; they are reported back to the player who
/// caused them.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("there is no active game in this group")]
    NoActiveGame,
    #[error("a game is already running in this group")]
    AlreadyActive,
    #[error("the lobby is closed, the game has already started")]
    NotInLobby,
    #[error("you already joined this game")]
    AlreadyJoined,
    #[error("you could not be reached privately, message the bot first")]
    UnreachablePlayer,
    #[error("not enough players: {have} joined, {need} needed")]
    InsufficientPlayers { have: usize, need: usize },
    #[error("only the player who started the game can cancel it")]
    NotInitiator,
    #[error("you are not part of this game")]
    NotAPlayer,
    #[error("roles were already handed out for this game")]
    RolesAlreadyAssigned,
    #[error("your role has no night action")]
    NoNightAbility,
    #[error("you already acted tonight")]
    AlreadyActed,
    #[error("you already voted")]
    AlreadyVoted,
    #[error("you are not entitled to act in this phase")]
    NotEligible,
    #[error("you cannot target that player")]
    InvalidTarget,
    #[error("dead players cannot act")]
    DeadActor,
    #[error("that player is already dead")]
    DeadTarget,
    #[error("that selection belongs to a phase that has ended")]
    StalePhase,
    #[error("that player is not a valid candidate")]
    NoCandidate,
}

/// One outbound message, mirroring the notifier calls the game makes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Announcement {
    PlayerJoined {
        player: PlayerView,
    },
    LobbyStatus {
        players: Vec<PlayerView>,
        threshold: usize,
    },
    RoleAssigned {
        role: Role,
        nickname: Option<String>,
        teammates: Vec<PlayerView>,
    },
    Unreachable {
        players: Vec<PlayerView>,
        majority: bool,
    },
    PhaseStarted {
        phase: Phase,
        duration_secs: u64,
        living: Vec<PlayerView>,
    },
    Reminder {
        phase: Phase,
        seconds_remaining: u64,
    },
    ActionRecorded {
        ability: NightAbility,
        target: PlayerView,
        effective: bool,
    },
    NightOutcome(NightOutcome),
    VoteCast {
        voter: PlayerView,
        target: PlayerView,
    },
    LynchOutcome(LynchOutcome),
    GameEnded {
        winner: Faction,
        roster: Vec<RosterEntry>,
    },
    Aborted {
        reason: AbortReason,
    },
    Rejected {
        error: GameError,
    },
    PrivateAck,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Hello {
        client_version: u32,
        player_id: PlayerId,
        name: String,
    },
    Heartbeat,
    Join {
        group_id: GroupId,
    },
    Start {
        group_id: GroupId,
    },
    Cancel {
        group_id: GroupId,
    },
    Select {
        group_id: GroupId,
        target_id: PlayerId,
        phase: Phase,
    },
    Goodbye,

    Welcome {
        player_id: PlayerId,
    },
    Announcement {
        group_id: Option<GroupId>,
        announcement: Announcement,
    },
    Disconnected {
        reason: String,
    },
}

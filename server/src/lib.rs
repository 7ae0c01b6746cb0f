//! # Game Server Library
//!
//! This library runs hidden-role party games ("predators among villagers")
//! for any number of chat groups at once. Every group owns one session that
//! moves through a lobby, then alternating nights and days, until one side
//! wins. Players talk to the server through a small UDP relay that stands in
//! for a chat transport.
//!
//! ## Core Responsibilities
//!
//! ### Session State Machine
//! Each group's session tracks its players, the current phase, the night
//! actions and day votes recorded so far, and exactly one pending timer.
//! Phases run `Lobby -> Night -> Discussion -> Voting -> Night ...` and end
//! in `Ended`, after which the session is reset for reuse.
//!
//! ### Secret Roles
//! At the start of play every player receives one role. Predators scale with
//! group size (one up to six players, two up to twelve, three beyond), one
//! Protector is always present, a Hunter joins from ten players on, and the
//! rest are Bystanders, some of them with a cosmetic nickname.
//!
//! ### Timed Transitions
//! Phase timers announce reminders as they count down and advance the game
//! when they expire. A phase can also end early once every expected player
//! has acted; the result is identical to natural expiry.
//!
//! ## Architecture Design
//!
//! ### One Lock Per Session
//! Sessions live behind their own `tokio::sync::Mutex`. Joins, votes, night
//! actions and timer callbacks all take that lock, so events for one group
//! are totally ordered while different groups progress independently. The
//! registry map has a separate lock that is held only for lookups.
//!
//! ### Generation Tokens
//! Every timer task carries the session generation and phase it was armed
//! for. Phase changes and resets bump the generation, so a timer that wakes
//! up late finds a mismatch and leaves the session alone.
//!
//! ### Notifier Seam
//! The game never formats text or touches sockets. Everything it wants to
//! say goes through the [`notifier::Notifier`] trait; the relay plugs in a
//! channel-backed implementation.
//!
//! ## Module Organization
//!
//! ### Rules (`roles`, `rules`)
//! Pure functions: role assignment, win evaluation, vote tallying and night
//! resolution.
//!
//! ### Session (`session`, `registry`)
//! The per-group state and the lazily filled map from group id to session.
//!
//! ### Scheduling (`scheduler`, `config`)
//! Timer tasks and every automatic phase transition, driven by configurable
//! durations.
//!
//! ### Entry Points (`engine`, `notifier`)
//! Inbound events (start, join, cancel, selection) and the outbound
//! announcement contract.
//!
//! ### Relay (`network`, `subscribers`)
//! UDP transport for terminal clients: handshake, group subscriptions,
//! timeouts and delivery of announcements.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::GameConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Relay on port 8080 serving at most 64 connected players
//!     let mut server = Server::new("127.0.0.1:8080", 64, GameConfig::default()).await?;
//!
//!     // Runs until the receive loop shuts down:
//!     // - Accepts hellos and tracks which address speaks for which player
//!     // - Hands joins, starts, cancels and selections to the engine
//!     // - Delivers group and private announcements back to clients
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! The relay uses internal async tasks that handle:
//! - **Network Receiver**: Continuously listens for incoming packets
//! - **Network Sender**: Delivers direct replies and game announcements
//! - **Timeout Checker**: Drops players who have gone silent
//! - **Session Timers**: One per active group, owned by the scheduler

pub mod config;
pub mod engine;
pub mod network;
pub mod notifier;
pub mod registry;
pub mod roles;
pub mod rules;
pub mod scheduler;
pub mod session;
pub mod subscribers;

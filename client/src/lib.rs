//! # Game Client Library
//!
//! This library provides a terminal client for the hidden-role game server.
//! It reads slash commands from standard input, sends them to the relay as
//! UDP packets and prints every announcement the server pushes back.
//!
//! ## Architecture Overview
//!
//! The client is deliberately thin. The server owns every rule, timer and
//! decision; the client only remembers enough to make typing commands
//! pleasant.
//!
//! ### Handshake
//! On start the client sends a `Hello` carrying its protocol version, player
//! id and display name. The server answers with `Welcome`, or with
//! `Disconnected` when the versions differ or the server is full.
//!
//! ### Phase Tracking
//! Every `PhaseStarted` announcement updates the client's view of the
//! current phase and the living players. A `/pick` is stamped with that
//! phase, so a pick typed just as the phase changes is rejected by the
//! server instead of counting in the wrong place.
//!
//! ## Module Organization
//!
//! ### Commands Module (`commands`)
//! Parses typed lines into commands and turns them into packets:
//! - `/start`, `/join` and `/cancel` for the group's game
//! - `/pick <id>` for night targets and votes
//! - `/help` and `/quit` handled locally
//!
//! ### Display Module (`display`)
//! Renders announcements as plain English lines, including private role
//! notices, night outcomes, vote breakdowns and the final roster.
//!
//! ### Network Module (`network`)
//! Owns the socket and the event loop:
//! - Waits on the socket, standard input and a heartbeat interval at once
//! - Ignores announcements addressed to other groups
//! - Says goodbye to the server on exit
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::new("127.0.0.1:8080", 7, "Ada", -1).await?;
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod commands;
pub mod display;
pub mod network;

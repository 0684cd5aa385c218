//! Minesweeper simulation and tabular Q-learning.
//!
//! The [`logic::Board`] owns the ground truth and the transition rules, the
//! [`agent::QAgent`] learns from the [`Observation`]s it exposes, and
//! [`training`] wires the two into episodes.
//!
//! ```rust,no_run
//! use minesweeper_rl_engine::{
//!     agent::QAgent,
//!     logic::Board,
//!     training::{PlayMode, run_episode},
//! };
//! use minesweeper_rl_common::models::{AgentParams, BoardParams, RewardParams};
//!
//! let mut board = Board::new(BoardParams::default(), RewardParams::default(), Some(42));
//! let mut agent = QAgent::new(AgentParams::default(), "models/qtable.json", Some(42));
//!
//! let outcome = run_episode(&mut board, &mut agent, PlayMode::TRAIN);
//! println!("won: {}, steps: {}", outcome.win, outcome.steps);
//! agent.save()?;
//! # Ok::<(), std::io::Error>(())
//! ```

pub mod agent;
pub mod config;
pub mod data;
pub mod logic;
pub mod training;

pub use minesweeper_rl_common::{models::*, protocol::*};

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

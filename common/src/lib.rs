//! Types shared between the minesweeper simulation, the learning agent and
//! anything driving them (training loops, renderers).

pub mod models;
pub mod protocol;

use std::{
    env,
    fmt::Display,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use minesweeper_rl_common::models::{AgentParams, BoardParams, RewardParams};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{Result, training::TrainingOptions};

pub const CONFIG_ENV: &str = "MINESWEEPER_CONFIG";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub board: BoardParams,
    pub rewards: RewardParams,
    pub agent: AgentParams,
    pub training: TrainingOptions,
    pub qtable_path: PathBuf,
    /// Seeds both the board and the agent. Drawn at random when unset.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            board: BoardParams::default(),
            rewards: RewardParams::default(),
            agent: AgentParams::default(),
            training: TrainingOptions::default(),
            qtable_path: PathBuf::from("models").join("qtable.json"),
            seed: None,
        }
    }
}

impl Config {
    /// Defaults, then the JSON file named by `MINESWEEPER_CONFIG`, then
    /// individual environment variables.
    pub fn load() -> Result<Self> {
        let mut config = match env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|err| format!("failed to read config {}: {}", path.display(), err))?;
        let config = serde_json::from_str(&content)
            .map_err(|err| format!("failed to parse config {}: {}", path.display(), err))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Applies `BOARD_ROWS`-style overrides. `lookup` returns the raw value
    /// for a variable name, if set.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        override_value(&lookup, "BOARD_ROWS", &mut self.board.rows);
        override_value(&lookup, "BOARD_COLS", &mut self.board.cols);
        override_value(&lookup, "BOARD_MINES", &mut self.board.mines);
        override_value(&lookup, "TRAIN_EPISODES", &mut self.training.episodes);
        override_value(&lookup, "REPORT_EVERY", &mut self.training.report_every);
        override_value(&lookup, "SAVE_EVERY", &mut self.training.save_every);
        override_value(&lookup, "EVAL_EPISODES", &mut self.training.eval_episodes);

        if let Some(path) = lookup("QTABLE_PATH") {
            self.qtable_path = PathBuf::from(path);
        }

        if let Some(raw) = lookup("SEED") {
            match raw.parse() {
                Ok(seed) => self.seed = Some(seed),
                Err(err) => warn!("Ignoring SEED={:?}: {}", raw, err),
            }
        }
    }
}

fn override_value<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    if let Some(raw) = lookup(key) {
        match raw.parse() {
            Ok(value) => *target = value,
            Err(err) => warn!("Ignoring {}={:?}: {}", key, raw, err),
        }
    }
}

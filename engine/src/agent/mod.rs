//! Tabular Q-learning over the local state encoding.

pub mod encoder;
pub mod table;

use std::{
    io,
    path::{Path, PathBuf},
};

use minesweeper_rl_common::models::{AgentParams, Observation};
use rand::{Rng, SeedableRng, seq::IndexedRandom};
use rand_chacha::ChaCha8Rng;
use tracing::{info, instrument, trace};

pub use encoder::{StateActionKey, StateKey, encode_state, state_action_key};
pub use table::QTable;

/// Epsilon-greedy agent that owns its Q-table for the lifetime of the
/// process. The table on disk is only touched by [`QAgent::new`] and
/// [`QAgent::save`].
#[derive(Debug)]
pub struct QAgent {
    params: AgentParams,
    table: QTable,
    path: PathBuf,
    eps: f64,
    rng: ChaCha8Rng,
}

impl QAgent {
    /// Creates an agent whose table is loaded from `path` if possible.
    pub fn new(params: AgentParams, path: impl Into<PathBuf>, seed: Option<u64>) -> Self {
        let path = path.into();
        let table = QTable::load_or_default(&path);
        Self::with_table(params, table, path, seed)
    }

    pub fn with_table(
        params: AgentParams,
        table: QTable,
        path: impl Into<PathBuf>,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::seed_from_u64(rand::random()),
        };

        Self {
            eps: params.eps_start,
            params,
            table,
            path: path.into(),
            rng,
        }
    }

    /// Current exploration rate.
    pub fn eps(&self) -> f64 {
        self.eps
    }

    pub fn params(&self) -> &AgentParams {
        &self.params
    }

    pub fn table(&self) -> &QTable {
        &self.table
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn value(&self, obs: &Observation, action: usize) -> f64 {
        self.table.get(&state_action_key(obs, action))
    }

    /// Picks an action from `legal`, or `None` when there is nothing to pick.
    ///
    /// Unless `greedy` is set, a uniformly random action is taken with
    /// probability [`QAgent::eps`]. Otherwise the highest-valued action wins,
    /// with ties going to the earliest entry of `legal`.
    pub fn select(&mut self, obs: &Observation, legal: &[usize], greedy: bool) -> Option<usize> {
        if !greedy && self.rng.random::<f64>() < self.eps {
            let action = legal.choose(&mut self.rng).copied();
            trace!("Exploring with action {:?}", action);
            return action;
        }

        let mut best: Option<(usize, f64)> = None;
        for &action in legal {
            let value = self.value(obs, action);
            match best {
                Some((_, best_value)) if value <= best_value => {}
                _ => best = Some((action, value)),
            }
        }

        best.map(|(action, _)| action)
    }

    /// One-step Q-learning update for the transition `obs --action--> next_obs`,
    /// followed by exploration decay.
    #[instrument(level = "trace", skip(self, obs, next_obs))]
    pub fn update(
        &mut self,
        obs: &Observation,
        action: usize,
        reward: f64,
        next_obs: &Observation,
        done: bool,
    ) {
        let key = state_action_key(obs, action);
        let current = self.table.get(&key);

        let target = if done {
            reward
        } else {
            next_obs
                .legal_actions()
                .into_iter()
                .map(|next| self.value(next_obs, next))
                .reduce(f64::max)
                .map_or(reward, |best_next| reward + self.params.gamma * best_next)
        };

        self.table
            .set(key, current + self.params.alpha * (target - current));
        self.eps = (self.eps * self.params.eps_decay).max(self.params.eps_end);
    }

    /// Persists the whole table to [`QAgent::path`].
    pub fn save(&self) -> io::Result<()> {
        self.table.save(&self.path)?;
        info!(
            "Saved {} Q entries to {}",
            self.table.len(),
            self.path.display()
        );
        Ok(())
    }
}

use std::{collections::VecDeque, io, time::Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::{agent::QAgent, logic::Board};

/// Episodes considered for the recent win rate.
pub const RECENT_WINDOW: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TrainingOptions {
    pub episodes: usize,
    /// Log a progress line every this many episodes; 0 disables reports.
    pub report_every: usize,
    /// Persist the table every this many episodes; 0 only saves at the end.
    pub save_every: usize,
    /// Greedy episodes played after training.
    pub eval_episodes: usize,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            episodes: 8000,
            report_every: 100,
            save_every: 500,
            eval_episodes: 0,
        }
    }
}

/// How an episode is played.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayMode {
    /// Feed every transition to [`QAgent::update`].
    pub train: bool,
    /// Never explore.
    pub greedy: bool,
    /// Run deterministic inference to a fixed point before each agent move.
    pub assist: bool,
}

impl PlayMode {
    pub const TRAIN: Self = Self {
        train: true,
        greedy: false,
        assist: false,
    };

    pub const EVALUATE: Self = Self {
        train: false,
        greedy: true,
        assist: false,
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeOutcome {
    pub win: bool,
    pub steps: usize,
    /// Sum of the rewards returned for the agent's own moves.
    pub reward: f64,
}

/// Plays one episode on a freshly reset board.
pub fn run_episode(board: &mut Board, agent: &mut QAgent, mode: PlayMode) -> EpisodeOutcome {
    board.reset();
    play(board, agent, mode)
}

/// Plays the current episode from wherever the board stands. Ends on a
/// terminal board or when no legal action is left.
pub fn play(board: &mut Board, agent: &mut QAgent, mode: PlayMode) -> EpisodeOutcome {
    let mut obs = board.observe();
    let mut total_reward = 0.0;

    while !board.done() {
        if mode.assist && board.deterministic_inference() > 0 {
            if board.done() {
                break;
            }
            obs = board.observe();
        }

        let legal = board.legal_actions();
        let Some(action) = agent.select(&obs, &legal, mode.greedy) else {
            debug!("No legal actions left after {} steps", board.steps());
            break;
        };

        let step = board.open_cell(action);
        total_reward += step.reward;
        let next_obs = board.observe();

        if mode.train {
            agent.update(&obs, action, step.reward, &next_obs, step.done);
        }
        obs = next_obs;
    }

    EpisodeOutcome {
        win: board.win(),
        steps: board.steps(),
        reward: total_reward,
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrainingStats {
    episodes: usize,
    wins: usize,
    total_reward: f64,
    recent: VecDeque<bool>,
}

impl TrainingStats {
    pub fn record(&mut self, outcome: &EpisodeOutcome) {
        self.episodes += 1;
        self.total_reward += outcome.reward;
        if outcome.win {
            self.wins += 1;
        }

        self.recent.push_back(outcome.win);
        if self.recent.len() > RECENT_WINDOW {
            self.recent.pop_front();
        }
    }

    pub fn episodes(&self) -> usize {
        self.episodes
    }

    pub fn wins(&self) -> usize {
        self.wins
    }

    pub fn win_rate(&self) -> f64 {
        if self.episodes == 0 {
            return 0.0;
        }
        self.wins as f64 / self.episodes as f64
    }

    pub fn recent_win_rate(&self) -> f64 {
        if self.recent.is_empty() {
            return 0.0;
        }
        self.recent.iter().filter(|win| **win).count() as f64 / self.recent.len() as f64
    }

    pub fn mean_reward(&self) -> f64 {
        if self.episodes == 0 {
            return 0.0;
        }
        self.total_reward / self.episodes as f64
    }
}

/// Runs `options.episodes` learning episodes, saving the table periodically
/// and once more at the end. A failed save aborts training.
#[instrument(level = "trace", skip(board, agent))]
pub fn train(
    board: &mut Board,
    agent: &mut QAgent,
    options: &TrainingOptions,
) -> io::Result<TrainingStats> {
    info!(
        "Training for {} episodes on {}x{} with {} mines",
        options.episodes,
        board.rows(),
        board.cols(),
        board.params().mines
    );

    let started = Instant::now();
    let mut stats = TrainingStats::default();

    for episode in 1..=options.episodes {
        let outcome = run_episode(board, agent, PlayMode::TRAIN);
        stats.record(&outcome);

        if options.report_every > 0 && episode % options.report_every == 0 {
            info!(
                "EP {:5} | recent win-rate={:.2} | overall={:.2} | eps={:.3} | time={:.1}s",
                episode,
                stats.recent_win_rate(),
                stats.win_rate(),
                agent.eps(),
                started.elapsed().as_secs_f64()
            );
        }

        if options.save_every > 0 && episode % options.save_every == 0 {
            agent.save()?;
        }
    }

    agent.save()?;
    info!(
        "Training finished: {} episodes, final win rate {:.2}",
        stats.episodes(),
        stats.win_rate()
    );

    Ok(stats)
}

/// Plays greedy episodes without learning.
pub fn evaluate(board: &mut Board, agent: &mut QAgent, episodes: usize) -> TrainingStats {
    let mut stats = TrainingStats::default();
    for _ in 0..episodes {
        let outcome = run_episode(board, agent, PlayMode::EVALUATE);
        stats.record(&outcome);
    }

    info!(
        "Evaluation: {} wins in {} greedy episodes ({:.2}), mean reward {:.3}",
        stats.wins(),
        stats.episodes(),
        stats.win_rate(),
        stats.mean_reward()
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(win: bool) -> EpisodeOutcome {
        EpisodeOutcome {
            win,
            steps: 1,
            reward: if win { 1.0 } else { -1.0 },
        }
    }

    #[test]
    fn empty_stats_report_zero() {
        let stats = TrainingStats::default();
        assert_eq!(stats.win_rate(), 0.0);
        assert_eq!(stats.recent_win_rate(), 0.0);
        assert_eq!(stats.mean_reward(), 0.0);
    }

    #[test]
    fn recent_window_forgets_old_episodes() {
        let mut stats = TrainingStats::default();
        for _ in 0..RECENT_WINDOW {
            stats.record(&outcome(false));
        }
        for _ in 0..RECENT_WINDOW / 2 {
            stats.record(&outcome(true));
        }

        assert_eq!(stats.episodes(), RECENT_WINDOW + RECENT_WINDOW / 2);
        assert!((stats.recent_win_rate() - 0.5).abs() < 1e-12);
        assert!((stats.win_rate() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn mean_reward_averages_episodes() {
        let mut stats = TrainingStats::default();
        stats.record(&outcome(true));
        stats.record(&outcome(true));
        stats.record(&outcome(false));
        assert!((stats.mean_reward() - 1.0 / 3.0).abs() < 1e-12);
    }
}

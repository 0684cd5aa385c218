use std::{collections::VecDeque, fmt};

use minesweeper_rl_common::{
    models::{self, BoardParams, Observation, RewardParams},
    protocol::{StepInfo, StepResult},
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, instrument, warn};

use crate::data::Cell;

fn validate_params(params: &mut BoardParams) {
    if params.rows == 0 || params.cols == 0 {
        warn!(
            "Board of {}x{} has no cells, using 1x1 instead",
            params.rows, params.cols
        );
        params.rows = params.rows.max(1);
        params.cols = params.cols.max(1);
    }
    params.mines = params.mines.min(params.cell_count());
}

/// Selection sampling: every allowed cell ends up mined with equal
/// probability and exactly `mines` of them are picked.
fn generate_mines<R: Rng>(rng: &mut R, allowed: &[bool], mines: usize) -> Vec<bool> {
    let mut layout = vec![false; allowed.len()];
    let mut mines_left = mines;
    let mut cells_left = allowed.iter().filter(|allowed| **allowed).count();

    for (index, allowed) in allowed.iter().enumerate() {
        if !allowed {
            continue;
        }

        if rng.random_ratio(mines_left as u32, cells_left as u32) {
            layout[index] = true;
            mines_left -= 1;
        }
        cells_left -= 1;
    }

    layout
}

fn count_adjacent_mines(layout: &[bool], rows: usize, cols: usize, index: usize) -> u8 {
    models::neighbors(rows, cols, index)
        .into_iter()
        .filter(|&neighbor| layout[neighbor])
        .count() as u8
}

/// Authoritative game state for one minesweeper board.
///
/// Mines are placed lazily on the first [`Board::open_cell`] of each episode,
/// away from the clicked cell and its neighbors.
#[derive(Debug)]
pub struct Board {
    params: BoardParams,
    rewards: RewardParams,
    cells: Vec<Cell>,
    /// Effective mine count; may be lower than configured after placement.
    mines: usize,
    /// Opened cells that are not mines.
    revealed: usize,
    placed: bool,
    done: bool,
    win: bool,
    steps: usize,
    rng: ChaCha8Rng,
}

impl Board {
    #[instrument(level = "trace", skip(rewards))]
    pub fn new(mut params: BoardParams, rewards: RewardParams, seed: Option<u64>) -> Self {
        validate_params(&mut params);
        let seed = seed.unwrap_or_else(rand::random);
        info!(
            "Creating board: {}x{} with {} mines, seed {}",
            params.rows, params.cols, params.mines, seed
        );

        let mut board = Self {
            params,
            rewards,
            cells: Vec::new(),
            mines: params.mines,
            revealed: 0,
            placed: false,
            done: false,
            win: false,
            steps: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        };
        board.reset();
        board
    }

    /// Board with mines already placed at `mines`, skipping first-click
    /// safety for the current episode. Out-of-range indices are ignored.
    /// The next [`Board::reset`] goes back to random placement.
    pub fn with_layout(params: BoardParams, rewards: RewardParams, mines: &[usize]) -> Self {
        let mut board = Self::new(params, rewards, Some(0));
        let mut layout = vec![false; board.n()];
        for &index in mines {
            if let Some(slot) = layout.get_mut(index) {
                *slot = true;
            } else {
                warn!("Ignoring mine outside the board at index {}", index);
            }
        }
        board.apply_layout(&layout);
        board
    }

    pub fn reset(&mut self) -> Observation {
        self.cells = vec![Cell::default(); self.n()];
        self.mines = self.params.mines;
        self.revealed = 0;
        self.placed = false;
        self.done = false;
        self.win = false;
        self.steps = 0;
        self.observe()
    }

    pub fn rows(&self) -> usize {
        self.params.rows
    }

    pub fn cols(&self) -> usize {
        self.params.cols
    }

    pub fn n(&self) -> usize {
        self.params.cell_count()
    }

    pub fn mines(&self) -> usize {
        self.mines
    }

    pub fn done(&self) -> bool {
        self.done
    }

    pub fn win(&self) -> bool {
        self.win
    }

    /// Accepted actions this episode, not counting illegal ones.
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn placed(&self) -> bool {
        self.placed
    }

    pub fn params(&self) -> &BoardParams {
        &self.params
    }

    pub fn rewards(&self) -> &RewardParams {
        &self.rewards
    }

    /// Ground truth for one cell. Meant for renderers and tests, never for
    /// the agent.
    pub fn cell(&self, index: usize) -> Option<Cell> {
        self.cells.get(index).copied()
    }

    pub fn rc_to_i(&self, row: usize, col: usize) -> usize {
        row * self.params.cols + col
    }

    pub fn i_to_rc(&self, index: usize) -> (usize, usize) {
        (index / self.params.cols, index % self.params.cols)
    }

    pub fn neighbors(&self, index: usize) -> Vec<usize> {
        models::neighbors(self.params.rows, self.params.cols, index)
    }

    pub fn legal_actions(&self) -> Vec<usize> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| !cell.opened && !cell.avoid)
            .map(|(index, _)| index)
            .collect()
    }

    /// Snapshot for the agent. Adjacency counts of covered cells are
    /// reported as 0.
    pub fn observe(&self) -> Observation {
        Observation {
            rows: self.params.rows,
            cols: self.params.cols,
            opened: self.cells.iter().map(|cell| cell.opened).collect(),
            adjacent: self
                .cells
                .iter()
                .map(|cell| if cell.opened { cell.adjacent } else { 0 })
                .collect(),
            avoid: self.cells.iter().map(|cell| cell.avoid).collect(),
        }
    }

    #[instrument(level = "trace", skip(self))]
    pub fn open_cell(&mut self, index: usize) -> StepResult {
        if self.done {
            debug!("Ignoring open on finished board at {}", index);
            return StepResult::new(0.0, true);
        }

        if index >= self.n() {
            warn!("Invalid open position: {} on a board of {}", index, self.n());
            return StepResult::illegal();
        }

        if !self.placed {
            self.place_mines(index);
        }

        let cell = self.cells[index];
        if cell.opened || cell.avoid {
            debug!(
                "Illegal open at {} (opened: {}, avoid: {})",
                index, cell.opened, cell.avoid
            );
            return StepResult::illegal();
        }

        self.steps += 1;

        if cell.mine {
            debug!("Mine hit at {} after {} steps", index, self.steps);
            self.reveal(index);
            self.done = true;
            self.win = false;
            return StepResult {
                reward: self.rewards.mine_penalty,
                done: true,
                info: StepInfo {
                    illegal: false,
                    mine: true,
                },
            };
        }

        let mut reward = self.rewards.safe + self.rewards.step_penalty;

        if cell.adjacent == 0 {
            let opened = self.flood(index);
            debug!("Flood from {} opened {} cells", index, opened);
            reward += self.rewards.zero;
        } else {
            self.reveal(index);
        }

        if self.has_won() {
            debug!("Board cleared in {} steps", self.steps);
            self.done = true;
            self.win = true;
            reward += self.rewards.win;
        }

        StepResult::new(reward, self.done)
    }

    /// One pass of the two counting rules over opened numbered cells, in
    /// ascending index order. Cells marked or opened earlier in the pass are
    /// already visible to later cells. Returns whether anything changed.
    #[instrument(level = "trace", skip(self))]
    pub fn deterministic_inference_once(&mut self) -> bool {
        let mut changed = false;

        for index in 0..self.n() {
            if self.done {
                break;
            }

            let cell = self.cells[index];
            if !cell.opened || cell.adjacent == 0 {
                continue;
            }

            let number = cell.adjacent as usize;
            let neighbors = self.neighbors(index);
            let covered: Vec<usize> = neighbors
                .iter()
                .copied()
                .filter(|&neighbor| !self.cells[neighbor].opened)
                .collect();

            if covered.is_empty() {
                continue;
            }

            // Every covered neighbor is a mine.
            if covered.len() == number {
                for &neighbor in &covered {
                    if !self.cells[neighbor].avoid {
                        self.cells[neighbor].avoid = true;
                        changed = true;
                    }
                }
            }

            // Every mine is already marked, so the rest is safe.
            let avoided = neighbors
                .iter()
                .filter(|&&neighbor| self.cells[neighbor].avoid)
                .count();
            if avoided == number {
                for &neighbor in &covered {
                    let target = self.cells[neighbor];
                    if target.avoid || target.opened {
                        continue;
                    }
                    self.open_cell(neighbor);
                    changed = true;
                    if self.done {
                        break;
                    }
                }
            }
        }

        changed
    }

    /// Repeats [`Board::deterministic_inference_once`] until a pass changes
    /// nothing. Returns the number of passes that made progress.
    pub fn deterministic_inference(&mut self) -> usize {
        let mut passes = 0;
        while self.deterministic_inference_once() {
            passes += 1;
        }
        if passes > 0 {
            debug!("Inference settled after {} passes", passes);
        }
        passes
    }

    fn place_mines(&mut self, safe: usize) {
        let mut allowed = vec![true; self.n()];
        allowed[safe] = false;
        for neighbor in self.neighbors(safe) {
            allowed[neighbor] = false;
        }

        let available = allowed.iter().filter(|allowed| **allowed).count();
        if self.params.mines > available {
            warn!(
                "Only {} cells can hold mines around first click {}, placing {} instead of {}",
                available, safe, available, self.params.mines
            );
        }
        self.mines = self.params.mines.min(available);

        let layout = generate_mines(&mut self.rng, &allowed, self.mines);
        self.apply_layout(&layout);
    }

    fn apply_layout(&mut self, layout: &[bool]) {
        let (rows, cols) = (self.params.rows, self.params.cols);
        for (index, cell) in self.cells.iter_mut().enumerate() {
            cell.mine = layout[index];
            cell.adjacent = count_adjacent_mines(layout, rows, cols, index);
        }
        self.mines = layout.iter().filter(|mine| **mine).count();
        self.placed = true;
    }

    fn reveal(&mut self, index: usize) -> bool {
        let cell = &mut self.cells[index];
        if cell.opened {
            return false;
        }

        cell.opened = true;
        if !cell.mine {
            self.revealed += 1;
        }
        true
    }

    /// Breadth-first opening from a zero cell. Returns the number of cells
    /// opened.
    fn flood(&mut self, start: usize) -> usize {
        let mut queue = VecDeque::from([start]);
        let mut seen = vec![false; self.n()];
        seen[start] = true;
        let mut opened = 0;

        while let Some(current) = queue.pop_front() {
            if self.reveal(current) {
                opened += 1;
            }

            if self.cells[current].adjacent != 0 {
                continue;
            }

            for neighbor in self.neighbors(current) {
                if !seen[neighbor] && !self.cells[neighbor].opened {
                    seen[neighbor] = true;
                    queue.push_back(neighbor);
                }
            }
        }

        opened
    }

    fn has_won(&self) -> bool {
        self.revealed == self.n() - self.mines
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks(self.params.cols) {
            let line: String = row
                .iter()
                .map(|cell| match (cell.opened, cell.avoid) {
                    (true, _) if cell.mine => '*',
                    (true, _) if cell.adjacent == 0 => '.',
                    (true, _) => char::from(b'0' + cell.adjacent),
                    (false, true) => 'x',
                    (false, false) => '#',
                })
                .collect();
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

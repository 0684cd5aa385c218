use serde::{Deserialize, Serialize};

/// Cells within Chebyshev distance 1 of `index` on a `rows × cols` grid,
/// clipped at the edges and returned in row-major order.
pub fn neighbors(rows: usize, cols: usize, index: usize) -> Vec<usize> {
    let row = index / cols;
    let col = index % cols;
    let mut out = Vec::with_capacity(8);

    for dr in -1..=1 {
        for dc in -1..=1 {
            if dr == 0 && dc == 0 {
                continue;
            }

            let new_row = row as isize + dr;
            let new_col = col as isize + dc;

            if new_row >= 0 && new_row < rows as isize && new_col >= 0 && new_col < cols as isize
            {
                out.push(new_row as usize * cols + new_col as usize);
            }
        }
    }

    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BoardParams {
    pub rows: usize,
    pub cols: usize,
    pub mines: usize,
}

impl BoardParams {
    pub fn cell_count(&self) -> usize {
        self.rows * self.cols
    }
}

impl Default for BoardParams {
    fn default() -> Self {
        Self {
            rows: 10,
            cols: 10,
            mines: 3,
        }
    }
}

/// Reward shaping applied by the board on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RewardParams {
    /// Opening any non-mine cell.
    pub safe: f64,
    /// Bonus when the opened cell triggers a flood fill.
    pub zero: f64,
    pub win: f64,
    pub mine_penalty: f64,
    /// Added to every safe open.
    pub step_penalty: f64,
}

impl Default for RewardParams {
    fn default() -> Self {
        Self {
            safe: 0.12,
            zero: 0.25,
            win: 4.0,
            mine_penalty: -2.0,
            step_penalty: -0.002,
        }
    }
}

/// Q-learning hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentParams {
    /// Learning rate.
    pub alpha: f64,
    /// Discount factor.
    pub gamma: f64,
    pub eps_start: f64,
    pub eps_end: f64,
    /// Multiplied into the exploration rate after every update.
    pub eps_decay: f64,
}

impl Default for AgentParams {
    fn default() -> Self {
        Self {
            alpha: 0.3,
            gamma: 0.95,
            eps_start: 0.6,
            eps_end: 0.02,
            eps_decay: 0.9992,
        }
    }
}

/// Everything a player may see of a board. Mines are never part of it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Observation {
    pub rows: usize,
    pub cols: usize,
    pub opened: Vec<bool>,
    pub adjacent: Vec<u8>,
    pub avoid: Vec<bool>,
}

impl Observation {
    pub fn cell_count(&self) -> usize {
        self.rows * self.cols
    }

    pub fn neighbors(&self, index: usize) -> Vec<usize> {
        neighbors(self.rows, self.cols, index)
    }

    /// Cells that are neither opened nor avoid-marked, in ascending order.
    pub fn legal_actions(&self) -> Vec<usize> {
        (0..self.cell_count())
            .filter(|&i| !self.opened[i] && !self.avoid[i])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corner_has_three_neighbors() {
        assert_eq!(neighbors(4, 4, 0), vec![1, 4, 5]);
        assert_eq!(neighbors(4, 4, 15), vec![10, 11, 14]);
    }

    #[test]
    fn interior_has_eight_neighbors() {
        assert_eq!(neighbors(4, 4, 5), vec![0, 1, 2, 4, 6, 8, 9, 10]);
    }

    #[test]
    fn edges_do_not_wrap() {
        // Index 3 is the last column of row 0; index 4 starts row 1.
        let n = neighbors(4, 4, 3);
        assert_eq!(n, vec![2, 6, 7]);
        assert!(!n.contains(&4));
    }

    #[test]
    fn single_row_board() {
        assert_eq!(neighbors(1, 5, 2), vec![1, 3]);
    }

    #[test]
    fn legal_actions_skip_opened_and_avoided() {
        let obs = Observation {
            rows: 1,
            cols: 4,
            opened: vec![true, false, false, false],
            adjacent: vec![0, 1, 0, 0],
            avoid: vec![false, false, true, false],
        };
        assert_eq!(obs.legal_actions(), vec![1, 3]);
    }
}

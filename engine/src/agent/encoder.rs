use std::{fmt, num::ParseIntError, str::FromStr};

use minesweeper_rl_common::models::Observation;

/// Local view around a candidate cell: how many of its neighbors are still
/// covered and how many are opened numbered cells, each bucketed to 0..=3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateKey {
    pub covered: u8,
    pub numbered: u8,
}

/// Table key: the local state together with the cell it was computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateActionKey {
    pub state: StateKey,
    pub action: usize,
}

fn bucket(count: usize) -> u8 {
    count.min(3) as u8
}

pub fn encode_state(obs: &Observation, candidate: usize) -> StateKey {
    let neighbors = obs.neighbors(candidate);
    let covered = neighbors.iter().filter(|&&n| !obs.opened[n]).count();
    let numbered = neighbors
        .iter()
        .filter(|&&n| obs.opened[n] && obs.adjacent[n] > 0)
        .count();

    StateKey {
        covered: bucket(covered),
        numbered: bucket(numbered),
    }
}

pub fn state_action_key(obs: &Observation, action: usize) -> StateActionKey {
    StateActionKey {
        state: encode_state(obs, action),
        action,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseKeyError {
    Format(String),
    Number(ParseIntError),
}

impl fmt::Display for ParseKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Format(key) => write!(f, "expected \"(covered, numbered)|action\", got {key:?}"),
            Self::Number(err) => write!(f, "invalid number in key: {err}"),
        }
    }
}

impl std::error::Error for ParseKeyError {}

impl From<ParseIntError> for ParseKeyError {
    fn from(err: ParseIntError) -> Self {
        Self::Number(err)
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.covered, self.numbered)
    }
}

impl FromStr for StateKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| ParseKeyError::Format(s.to_string()))?;
        let (covered, numbered) = inner
            .split_once(',')
            .ok_or_else(|| ParseKeyError::Format(s.to_string()))?;

        Ok(Self {
            covered: covered.trim().parse()?,
            numbered: numbered.trim().parse()?,
        })
    }
}

/// Persisted as `"(covered, numbered)|action"`.
impl fmt::Display for StateActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.state, self.action)
    }
}

impl FromStr for StateActionKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (state, action) = s
            .rsplit_once('|')
            .ok_or_else(|| ParseKeyError::Format(s.to_string()))?;

        Ok(Self {
            state: state.parse()?,
            action: action.trim().parse()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(rows: usize, cols: usize) -> Observation {
        let n = rows * cols;
        Observation {
            rows,
            cols,
            opened: vec![false; n],
            adjacent: vec![0; n],
            avoid: vec![false; n],
        }
    }

    #[test]
    fn buckets_saturate_at_three() {
        assert_eq!(bucket(0), 0);
        assert_eq!(bucket(1), 1);
        assert_eq!(bucket(2), 2);
        assert_eq!(bucket(3), 3);
        assert_eq!(bucket(8), 3);
    }

    #[test]
    fn fresh_board_counts_only_covered() {
        let obs = observation(3, 3);
        assert_eq!(encode_state(&obs, 0), StateKey { covered: 3, numbered: 0 });
        assert_eq!(encode_state(&obs, 4), StateKey { covered: 3, numbered: 0 });

        let strip = observation(1, 3);
        assert_eq!(encode_state(&strip, 0), StateKey { covered: 1, numbered: 0 });
        assert_eq!(encode_state(&strip, 1), StateKey { covered: 2, numbered: 0 });
    }

    #[test]
    fn opened_zero_cells_are_not_numbered() {
        // 0 1 2
        // 3 4 5
        let mut obs = observation(2, 3);
        obs.opened[0] = true;
        obs.opened[1] = true;
        obs.adjacent[1] = 2;

        let key = encode_state(&obs, 4);
        // Neighbors of 4: 0 1 2 3 5. Covered: 2 3 5. Numbered: 1.
        assert_eq!(key, StateKey { covered: 3, numbered: 1 });

        obs.opened[2] = true;
        obs.adjacent[2] = 1;
        assert_eq!(encode_state(&obs, 4), StateKey { covered: 2, numbered: 2 });
    }

    #[test]
    fn avoided_cells_still_count_as_covered() {
        let mut obs = observation(1, 3);
        obs.avoid[0] = true;
        assert_eq!(encode_state(&obs, 1), StateKey { covered: 2, numbered: 0 });
    }

    #[test]
    fn encoding_is_deterministic() {
        let mut obs = observation(4, 4);
        obs.opened[5] = true;
        obs.adjacent[5] = 3;
        assert_eq!(state_action_key(&obs, 6), state_action_key(&obs.clone(), 6));
    }

    #[test]
    fn same_neighborhood_shares_state_not_key() {
        let obs = observation(3, 3);
        let a = state_action_key(&obs, 0);
        let b = state_action_key(&obs, 2);
        assert_eq!(a.state, b.state);
        assert_ne!(a, b);
    }

    #[test]
    fn key_text_form() {
        let key = StateActionKey {
            state: StateKey { covered: 3, numbered: 1 },
            action: 42,
        };
        assert_eq!(key.to_string(), "(3, 1)|42");
        assert_eq!("(3, 1)|42".parse::<StateActionKey>(), Ok(key));
        assert_eq!("(3,1)|42".parse::<StateActionKey>(), Ok(key));
    }

    #[test]
    fn malformed_keys_are_rejected() {
        assert!("3, 1|42".parse::<StateActionKey>().is_err());
        assert!("(3, 1)".parse::<StateActionKey>().is_err());
        assert!("(3, x)|42".parse::<StateActionKey>().is_err());
        assert!("(3, 1)|-1".parse::<StateActionKey>().is_err());
    }
}

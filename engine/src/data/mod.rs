#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cell {
    pub mine: bool,
    pub adjacent: u8,
    pub opened: bool,
    /// Proven to be a mine by inference. Excluded from legal actions.
    pub avoid: bool,
}

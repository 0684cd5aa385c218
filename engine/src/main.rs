use minesweeper_rl_engine::{
    Result,
    agent::QAgent,
    config::Config,
    logic::Board,
    training::{evaluate, train},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    info!("Starting minesweeper Q-learning");

    let config = Config::load()?;
    info!(
        "Board {}x{} with {} mines, Q-table at {}",
        config.board.rows,
        config.board.cols,
        config.board.mines,
        config.qtable_path.display()
    );

    let mut board = Board::new(config.board, config.rewards, config.seed);
    let mut agent = QAgent::new(
        config.agent,
        &config.qtable_path,
        config.seed.map(|seed| seed.wrapping_add(1)),
    );

    let stats = train(&mut board, &mut agent, &config.training)?;
    info!(
        "Total episodes: {}, wins: {}, final win rate: {:.2}",
        stats.episodes(),
        stats.wins(),
        stats.win_rate()
    );

    if config.training.eval_episodes > 0 {
        evaluate(&mut board, &mut agent, config.training.eval_episodes);
    }

    Ok(())
}

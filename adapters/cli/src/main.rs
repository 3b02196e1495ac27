#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that generates a keyed maze and runs one
//! solver strategy over it.

mod report;

use anyhow::{ensure, Result};
use clap::{Parser, ValueEnum};
use keymaze_core::{SearchResult, Solver};
use keymaze_system_belief::BeliefSolver;
use keymaze_system_csp::CspSolver;
use keymaze_system_qlearning::QLearningSolver;
use keymaze_system_search::{AStarSolver, BfsSolver, GreedySolver};
use keymaze_system_stochastic::{AnnealingSolver, BeamSolver};
use keymaze_world::{GridConfig, TerrainGrid, DEFAULT_LOOP_CHANCE};

use crate::report::RunReport;

/// Generates a maze and solves it with the chosen strategy.
#[derive(Debug, Parser)]
#[command(name = "keymaze", version, about)]
struct Args {
    /// Grid width in cells, outer wall included.
    #[arg(long, default_value_t = 21)]
    width: i32,

    /// Grid height in cells, outer wall included.
    #[arg(long, default_value_t = 15)]
    height: i32,

    /// Number of keys to place.
    #[arg(long, default_value_t = 2)]
    keys: usize,

    /// Probability of opening an extra wall per carved lattice cell.
    #[arg(long, default_value_t = DEFAULT_LOOP_CHANCE)]
    loop_chance: f64,

    /// Seed shared by generation and the randomized strategies.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Solver strategy to run.
    #[arg(long, value_enum, default_value_t = Strategy::AStar)]
    strategy: Strategy,

    /// Drive the solver one visualize step at a time.
    #[arg(long)]
    stepped: bool,

    /// Emit the run summary as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Include the grid with the result path overlaid.
    #[arg(long)]
    map: bool,
}

/// Solver strategies selectable from the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Strategy {
    /// Breadth-first search over effective moves.
    Bfs,
    /// Greedy best-first search on the Manhattan heuristic.
    Greedy,
    /// A* with Manhattan heuristic and terrain-aware costs.
    AStar,
    /// Simulated annealing random walk per stage.
    Annealing,
    /// Local beam search with a fixed beam width.
    Beam,
    /// Depth-first backtracking with heuristic value ordering.
    Csp,
    /// Tabular Q-learning trained per grid.
    QLearning,
    /// Partial-observability agent planning over a belief map.
    Belief,
}

impl Strategy {
    fn label(self) -> &'static str {
        match self {
            Strategy::Bfs => "bfs",
            Strategy::Greedy => "greedy",
            Strategy::AStar => "a-star",
            Strategy::Annealing => "annealing",
            Strategy::Beam => "beam",
            Strategy::Csp => "csp",
            Strategy::QLearning => "q-learning",
            Strategy::Belief => "belief",
        }
    }
}

fn drive<S: Solver>(mut solver: S, stepped: bool) -> (SearchResult, Option<u64>) {
    if stepped {
        let mut cycles: u64 = 1;
        while !solver.solve_step_visualize() {
            cycles += 1;
        }
        (solver.result(), Some(cycles))
    } else {
        (solver.solve_all_stages(), None)
    }
}

fn run_strategy(
    grid: &TerrainGrid,
    strategy: Strategy,
    seed: u64,
    stepped: bool,
) -> (SearchResult, Option<u64>) {
    match strategy {
        Strategy::Bfs => drive(BfsSolver::new(grid), stepped),
        Strategy::Greedy => drive(GreedySolver::new(grid), stepped),
        Strategy::AStar => drive(AStarSolver::new(grid), stepped),
        Strategy::Annealing => drive(AnnealingSolver::new(grid, seed), stepped),
        Strategy::Beam => drive(BeamSolver::new(grid), stepped),
        Strategy::Csp => drive(CspSolver::new(grid), stepped),
        Strategy::QLearning => drive(QLearningSolver::new(grid, seed), stepped),
        Strategy::Belief => drive(BeliefSolver::new(grid, seed), stepped),
    }
}

fn validate(args: &Args) -> Result<()> {
    ensure!(
        args.width >= 3 && args.height >= 3,
        "grid dimensions must be at least 3"
    );
    ensure!(
        (0.0..=1.0).contains(&args.loop_chance),
        "loop chance must be within 0..=1"
    );
    Ok(())
}

/// Entry point for the keymaze command-line interface.
fn main() -> Result<()> {
    let args = Args::parse();
    validate(&args)?;

    let config = GridConfig::derived(args.width, args.height, args.keys, args.loop_chance);
    let grid = TerrainGrid::generate(&config, args.seed);
    let (result, visualize_steps) = run_strategy(&grid, args.strategy, args.seed, args.stepped);

    let report = RunReport {
        strategy: args.strategy.label(),
        seed: args.seed,
        width: grid.width(),
        height: grid.height(),
        keys_placed: grid.total_keys_placed(),
        found: result.found,
        steps: result.steps(),
        total_cost: result.total_cost,
        nodes_expanded: result.nodes_expanded,
        visualize_steps,
        map: args.map.then(|| report::render_map(&grid, &result.path)),
        path: &result.path,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.to_text());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(width: i32, height: i32, loop_chance: f64) -> Args {
        Args {
            width,
            height,
            keys: 1,
            loop_chance,
            seed: 0,
            strategy: Strategy::AStar,
            stepped: false,
            json: false,
            map: false,
        }
    }

    #[test]
    fn degenerate_dimensions_are_rejected() {
        assert!(validate(&args(2, 9, 0.1)).is_err());
        assert!(validate(&args(9, 2, 0.1)).is_err());
        assert!(validate(&args(3, 3, 0.1)).is_ok());
    }

    #[test]
    fn loop_chance_must_be_a_probability() {
        assert!(validate(&args(9, 9, 1.5)).is_err());
        assert!(validate(&args(9, 9, -0.1)).is_err());
        assert!(validate(&args(9, 9, 0.0)).is_ok());
    }
}

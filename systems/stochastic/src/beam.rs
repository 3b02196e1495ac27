//! Local beam search over effective moves.

use keymaze_core::{Cell, RoundOutcome, SearchResult, Solver, StagePlanner, StageSearch, StepPhase};
use keymaze_world::TerrainGrid;

/// Beam width and iteration budget for one stage search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeamConfig {
    /// Beams kept after each expansion round.
    pub beam_width: usize,
    /// Hard bound on expansion rounds per stage.
    pub max_iterations: u64,
}

impl Default for BeamConfig {
    fn default() -> Self {
        Self {
            beam_width: 1000,
            max_iterations: 100_000,
        }
    }
}

struct Beam {
    heuristic: u32,
    position: Cell,
    path: Vec<Cell>,
}

/// Local beam search solver.
///
/// Every expansion round grows each kept beam by one effective move,
/// bans stepping back onto either of the beam's last two cells, ranks
/// all candidates by Manhattan distance to the stage target, and keeps
/// the best `beam_width`. Ties keep their generation order, so runs
/// are deterministic.
pub struct BeamSolver<'g> {
    grid: &'g TerrainGrid,
    config: BeamConfig,
    planner: StagePlanner,
    max_path_len: usize,
    phase: StepPhase,
}

impl<'g> BeamSolver<'g> {
    /// Creates a solver with the default beam width.
    #[must_use]
    pub fn new(grid: &'g TerrainGrid) -> Self {
        Self::with_config(grid, BeamConfig::default())
    }

    /// Creates a solver with an explicit beam configuration.
    #[must_use]
    pub fn with_config(grid: &'g TerrainGrid, config: BeamConfig) -> Self {
        let area = (grid.width().max(0) as usize) * (grid.height().max(0) as usize);
        Self {
            grid,
            config,
            planner: StagePlanner::new(grid.start(), grid.keys(), grid.exit()),
            max_path_len: area * 2,
            phase: StepPhase::NotStarted,
        }
    }

    /// Current stepping phase.
    #[must_use]
    pub fn phase(&self) -> StepPhase {
        self.phase
    }

    fn advance_round(&mut self) -> RoundOutcome {
        let grid = self.grid;
        let config = self.config;
        let max_path_len = self.max_path_len;
        self.planner
            .advance_round(|from, to| beam_segment(grid, &config, max_path_len, from, to))
    }
}

impl Solver for BeamSolver<'_> {
    fn solve_all_stages(&mut self) -> SearchResult {
        while !self.solve_step_visualize() {}
        self.planner.result()
    }

    fn solve_step_visualize(&mut self) -> bool {
        if self.planner.is_finished() {
            self.phase = StepPhase::Done;
            return true;
        }
        self.phase = StepPhase::InProgress;
        match self.advance_round() {
            RoundOutcome::InProgress => false,
            RoundOutcome::Complete | RoundOutcome::Failed => {
                self.phase = StepPhase::Done;
                true
            }
        }
    }

    fn result(&self) -> SearchResult {
        self.planner.result()
    }
}

fn beam_segment(
    grid: &TerrainGrid,
    config: &BeamConfig,
    max_path_len: usize,
    from: Cell,
    to: Cell,
) -> StageSearch {
    let mut beams = vec![Beam {
        heuristic: from.manhattan_distance(to),
        position: from,
        path: vec![from],
    }];
    let mut iterations: u64 = 0;

    while iterations < config.max_iterations {
        iterations += 1;

        if let Some(winner) = beams.iter().find(|beam| beam.position == to) {
            return StageSearch {
                cost: grid.mud_aware_cost(&winner.path),
                expanded: iterations,
                path: winner.path.clone(),
                found: true,
            };
        }

        let mut candidates = Vec::new();
        for beam in &beams {
            if beam.path.len() > max_path_len {
                continue;
            }
            let recent = &beam.path[beam.path.len().saturating_sub(2)..];
            for step in grid.effective_moves(beam.position) {
                if recent.contains(&step.destination) {
                    continue;
                }
                let mut path = beam.path.clone();
                path.push(step.destination);
                candidates.push(Beam {
                    heuristic: step.destination.manhattan_distance(to),
                    position: step.destination,
                    path,
                });
            }
        }

        if candidates.is_empty() {
            return StageSearch::failure(iterations);
        }
        candidates.sort_by_key(|beam| beam.heuristic);
        candidates.truncate(config.beam_width);
        beams = candidates;
    }

    StageSearch::failure(iterations)
}

//! Simulated annealing over raw grid adjacency.

use keymaze_core::{Cell, RoundOutcome, SearchResult, Solver, StagePlanner, StageSearch, StepPhase};
use keymaze_world::TerrainGrid;
use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Annealing schedule and iteration budget for one stage search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnealingConfig {
    /// Temperature at the start of every stage.
    pub initial_temp: f64,
    /// Multiplicative cooling applied once per iteration.
    pub cooling_rate: f64,
    /// Temperature at which a stage gives up.
    pub min_temp: f64,
    /// Hard iteration budget per stage.
    pub max_iterations: u64,
}

impl Default for AnnealingConfig {
    fn default() -> Self {
        Self {
            initial_temp: 5_000_000.0,
            cooling_rate: 0.9999,
            min_temp: 1e-5,
            max_iterations: 150_000,
        }
    }
}

/// Simulated annealing solver.
///
/// The walk moves over raw adjacency (water and portals are crossed
/// like plain floor) with Manhattan distance to the stage target as
/// the energy; worse moves are accepted with probability
/// `exp(-delta / temperature)`. A found stage is priced by the
/// mud-aware cost of the walk actually taken.
pub struct AnnealingSolver<'g> {
    grid: &'g TerrainGrid,
    config: AnnealingConfig,
    rng: ChaCha8Rng,
    planner: StagePlanner,
    max_segment_steps: usize,
    phase: StepPhase,
}

impl<'g> AnnealingSolver<'g> {
    /// Creates a solver with the default schedule, seeded for
    /// reproducible runs.
    #[must_use]
    pub fn new(grid: &'g TerrainGrid, seed: u64) -> Self {
        Self::with_config(grid, seed, AnnealingConfig::default())
    }

    /// Creates a solver with an explicit schedule.
    #[must_use]
    pub fn with_config(grid: &'g TerrainGrid, seed: u64, config: AnnealingConfig) -> Self {
        let area = (grid.width().max(0) as usize) * (grid.height().max(0) as usize);
        Self {
            grid,
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
            planner: StagePlanner::new(grid.start(), grid.keys(), grid.exit()),
            max_segment_steps: area * 100,
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
        let cap = self.max_segment_steps;
        let rng = &mut self.rng;
        self.planner
            .advance_round(|from, to| anneal_segment(grid, &config, cap, rng, from, to))
    }
}

impl Solver for AnnealingSolver<'_> {
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

/// Raw non-wall neighbors in the fixed sampling order of the walk.
fn walkable_neighbors(grid: &TerrainGrid, cell: Cell) -> Vec<Cell> {
    [(0, 1), (0, -1), (1, 0), (-1, 0)]
        .iter()
        .map(|&(dx, dy)| Cell::new(cell.x() + dx, cell.y() + dy))
        .filter(|&neighbor| !grid.is_wall(neighbor))
        .collect()
}

fn anneal_segment(
    grid: &TerrainGrid,
    config: &AnnealingConfig,
    max_segment_steps: usize,
    rng: &mut ChaCha8Rng,
    from: Cell,
    to: Cell,
) -> StageSearch {
    let mut current = from;
    let mut energy = f64::from(current.manhattan_distance(to));
    let mut path = vec![from];
    let mut temp = config.initial_temp;
    let mut iterations: u64 = 0;

    while temp > config.min_temp && iterations < config.max_iterations {
        if current == to {
            break;
        }
        if path.len() > max_segment_steps {
            break;
        }

        let neighbors = walkable_neighbors(grid, current);
        if neighbors.is_empty() {
            break;
        }
        let candidate = neighbors[rng.gen_range(0..neighbors.len())];
        let candidate_energy = f64::from(candidate.manhattan_distance(to));
        let delta = candidate_energy - energy;

        let accepted = if delta < 0.0 {
            true
        } else {
            temp > 1e-9 && rng.gen::<f64>() < (-delta / temp).exp()
        };
        if accepted {
            current = candidate;
            energy = candidate_energy;
            path.push(current);
        }

        temp *= config.cooling_rate;
        iterations += 1;
    }

    if current == to {
        StageSearch {
            cost: grid.mud_aware_cost(&path),
            expanded: iterations,
            path,
            found: true,
        }
    } else {
        StageSearch::failure(iterations)
    }
}

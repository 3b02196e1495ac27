#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic single-pair search strategies: breadth-first, greedy
//! best-first, and A*.
//!
//! Each strategy is a [`SegmentEngine`], a search machine over one
//! start/target pair that expands exactly one frontier node per
//! [`SegmentEngine::pop`]. The shared [`StagedSolver`] lifts any engine
//! into the full multi-goal contract: batch solving runs the same
//! machine to exhaustion, so stepped and batch runs of a deterministic
//! engine terminate in identical results.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use keymaze_core::{
    Cell, SearchResult, Solver, StagePlanner, StageSearch, StepPhase,
};
use keymaze_world::TerrainGrid;

/// A single-pair search machine advanced one frontier pop at a time.
pub trait SegmentEngine {
    /// Prepares a fresh machine for a search from `from` to `to`.
    fn new(grid: &TerrainGrid, from: Cell, to: Cell) -> Self;

    /// Expands at most one frontier node. Returns `Some` once the
    /// search is terminal: a found stage, or a failure when the
    /// frontier ran dry.
    fn pop(&mut self, grid: &TerrainGrid) -> Option<StageSearch>;
}

/// Walks a predecessor map back from `target` to `from`.
fn reconstruct(came_from: &HashMap<Cell, Cell>, from: Cell, target: Cell) -> Vec<Cell> {
    let mut path = vec![target];
    let mut cursor = target;
    while cursor != from {
        match came_from.get(&cursor) {
            Some(&previous) => {
                path.push(previous);
                cursor = previous;
            }
            None => return Vec::new(),
        }
    }
    path.reverse();
    path
}

/// Breadth-first search over effective moves.
///
/// Frontier order ignores terrain costs, so the stage path is shortest
/// in hops; the reported cost is the realized terrain cost of that
/// path, which a cost-optimal search may beat.
pub struct BreadthFirstEngine {
    from: Cell,
    target: Cell,
    frontier: VecDeque<Cell>,
    came_from: HashMap<Cell, Cell>,
    cost_to: HashMap<Cell, u64>,
    expanded: u64,
}

impl SegmentEngine for BreadthFirstEngine {
    fn new(_grid: &TerrainGrid, from: Cell, to: Cell) -> Self {
        let mut cost_to = HashMap::new();
        let _ = cost_to.insert(from, 0);
        Self {
            from,
            target: to,
            frontier: VecDeque::from([from]),
            came_from: HashMap::new(),
            cost_to,
            expanded: 0,
        }
    }

    fn pop(&mut self, grid: &TerrainGrid) -> Option<StageSearch> {
        let Some(current) = self.frontier.pop_front() else {
            return Some(StageSearch::failure(self.expanded));
        };
        self.expanded += 1;

        if current == self.target {
            return Some(StageSearch {
                path: reconstruct(&self.came_from, self.from, current),
                cost: self.cost_to.get(&current).copied().unwrap_or(0),
                expanded: self.expanded,
                found: true,
            });
        }

        let reached = self.cost_to.get(&current).copied().unwrap_or(0);
        for step in grid.effective_moves(current) {
            if !self.cost_to.contains_key(&step.destination) {
                let _ = self.came_from.insert(step.destination, current);
                let _ = self
                    .cost_to
                    .insert(step.destination, reached + u64::from(step.cost));
                self.frontier.push_back(step.destination);
            }
        }
        None
    }
}

/// Greedy best-first search ordering the frontier by Manhattan
/// distance to the target alone.
pub struct GreedyEngine {
    from: Cell,
    target: Cell,
    frontier: BinaryHeap<Reverse<(u32, u64, Cell)>>,
    processed: HashSet<Cell>,
    came_from: HashMap<Cell, Cell>,
    cost_to: HashMap<Cell, u64>,
    pushes: u64,
    expanded: u64,
}

impl SegmentEngine for GreedyEngine {
    fn new(_grid: &TerrainGrid, from: Cell, to: Cell) -> Self {
        let mut frontier = BinaryHeap::new();
        frontier.push(Reverse((from.manhattan_distance(to), 0, from)));
        let mut cost_to = HashMap::new();
        let _ = cost_to.insert(from, 0);
        Self {
            from,
            target: to,
            frontier,
            processed: HashSet::new(),
            came_from: HashMap::new(),
            cost_to,
            pushes: 0,
            expanded: 0,
        }
    }

    fn pop(&mut self, grid: &TerrainGrid) -> Option<StageSearch> {
        let Some(Reverse((_, _, current))) = self.frontier.pop() else {
            return Some(StageSearch::failure(self.expanded));
        };
        if !self.processed.insert(current) {
            // Stale heap entry; nothing was expanded.
            return if self.frontier.is_empty() {
                Some(StageSearch::failure(self.expanded))
            } else {
                None
            };
        }
        self.expanded += 1;

        if current == self.target {
            return Some(StageSearch {
                path: reconstruct(&self.came_from, self.from, current),
                cost: self.cost_to.get(&current).copied().unwrap_or(0),
                expanded: self.expanded,
                found: true,
            });
        }

        let reached = self.cost_to.get(&current).copied().unwrap_or(0);
        for step in grid.effective_moves(current) {
            if self.processed.contains(&step.destination) {
                continue;
            }
            // The first discovery fixes the predecessor; later pushes
            // only reorder the frontier.
            if !self.came_from.contains_key(&step.destination) && step.destination != self.from {
                let _ = self.came_from.insert(step.destination, current);
                let _ = self
                    .cost_to
                    .insert(step.destination, reached + u64::from(step.cost));
            }
            self.pushes += 1;
            let priority = step.destination.manhattan_distance(self.target);
            self.frontier
                .push(Reverse((priority, self.pushes, step.destination)));
        }
        None
    }
}

/// A* with the Manhattan heuristic over realized terrain costs.
pub struct AStarEngine {
    from: Cell,
    target: Cell,
    frontier: BinaryHeap<Reverse<(u64, u64, Cell)>>,
    came_from: HashMap<Cell, Cell>,
    g_cost: HashMap<Cell, u64>,
    pushes: u64,
    expanded: u64,
}

impl SegmentEngine for AStarEngine {
    fn new(_grid: &TerrainGrid, from: Cell, to: Cell) -> Self {
        let mut frontier = BinaryHeap::new();
        frontier.push(Reverse((u64::from(from.manhattan_distance(to)), 0, from)));
        let mut g_cost = HashMap::new();
        let _ = g_cost.insert(from, 0);
        Self {
            from,
            target: to,
            frontier,
            came_from: HashMap::new(),
            g_cost,
            pushes: 0,
            expanded: 0,
        }
    }

    fn pop(&mut self, grid: &TerrainGrid) -> Option<StageSearch> {
        let Some(Reverse((_, _, current))) = self.frontier.pop() else {
            return Some(StageSearch::failure(self.expanded));
        };
        self.expanded += 1;

        if current == self.target {
            return Some(StageSearch {
                path: reconstruct(&self.came_from, self.from, current),
                cost: self.g_cost.get(&current).copied().unwrap_or(0),
                expanded: self.expanded,
                found: true,
            });
        }

        let reached = self.g_cost.get(&current).copied().unwrap_or(u64::MAX);
        for step in grid.effective_moves(current) {
            let tentative = reached.saturating_add(u64::from(step.cost));
            let known = self
                .g_cost
                .get(&step.destination)
                .copied()
                .unwrap_or(u64::MAX);
            if tentative < known {
                let _ = self.g_cost.insert(step.destination, tentative);
                let _ = self.came_from.insert(step.destination, current);
                self.pushes += 1;
                let priority =
                    tentative + u64::from(step.destination.manhattan_distance(self.target));
                self.frontier
                    .push(Reverse((priority, self.pushes, step.destination)));
            }
        }
        None
    }
}

struct RoundEval<E> {
    targets: Vec<Cell>,
    staged: Vec<StageSearch>,
    engine: Option<E>,
}

impl<E> RoundEval<E> {
    fn idle() -> Self {
        Self {
            targets: Vec::new(),
            staged: Vec::new(),
            engine: None,
        }
    }
}

/// Multi-goal solver over any [`SegmentEngine`].
///
/// The planner round protocol evaluates every pending key with the
/// engine, commits the cheapest reachable one, and finishes with the
/// exit leg. One visualize step performs exactly one engine pop.
pub struct StagedSolver<'g, E> {
    grid: &'g TerrainGrid,
    planner: StagePlanner,
    round: RoundEval<E>,
    phase: StepPhase,
}

impl<'g, E: SegmentEngine> StagedSolver<'g, E> {
    /// Creates a solver for the grid's start, keys, and exit.
    #[must_use]
    pub fn new(grid: &'g TerrainGrid) -> Self {
        Self {
            grid,
            planner: StagePlanner::new(grid.start(), grid.keys(), grid.exit()),
            round: RoundEval::idle(),
            phase: StepPhase::NotStarted,
        }
    }

    /// Current stepping phase.
    #[must_use]
    pub fn phase(&self) -> StepPhase {
        self.phase
    }

    fn advance(&mut self) -> bool {
        if self.planner.is_finished() {
            self.phase = StepPhase::Done;
            return true;
        }
        self.phase = StepPhase::InProgress;

        if self.round.targets.is_empty() {
            self.round.targets = if self.planner.pending_keys().is_empty() {
                vec![self.planner.exit()]
            } else {
                self.planner.pending_keys().to_vec()
            };
        }
        if self.round.engine.is_none() {
            let target = self.round.targets[self.round.staged.len()];
            self.round.engine = Some(E::new(self.grid, self.planner.current(), target));
        }

        let terminal = match self.round.engine.as_mut() {
            Some(engine) => engine.pop(self.grid),
            None => None,
        };
        if let Some(stage) = terminal {
            self.round.staged.push(stage);
            self.round.engine = None;
            if self.round.staged.len() == self.round.targets.len() {
                let mut replay = std::mem::take(&mut self.round.staged).into_iter();
                let _ = self
                    .planner
                    .advance_round(|_, _| replay.next().unwrap_or_else(|| StageSearch::failure(0)));
                self.round.targets.clear();
            }
        }

        if self.planner.is_finished() {
            self.phase = StepPhase::Done;
            true
        } else {
            false
        }
    }
}

impl<E: SegmentEngine> Solver for StagedSolver<'_, E> {
    fn solve_all_stages(&mut self) -> SearchResult {
        while !self.advance() {}
        self.planner.result()
    }

    fn solve_step_visualize(&mut self) -> bool {
        self.advance()
    }

    fn result(&self) -> SearchResult {
        self.planner.result()
    }
}

/// Breadth-first multi-goal solver.
pub type BfsSolver<'g> = StagedSolver<'g, BreadthFirstEngine>;
/// Greedy best-first multi-goal solver.
pub type GreedySolver<'g> = StagedSolver<'g, GreedyEngine>;
/// A* multi-goal solver.
pub type AStarSolver<'g> = StagedSolver<'g, AStarEngine>;

#[cfg(test)]
mod tests {
    use super::*;

    fn open_corridor() -> TerrainGrid {
        TerrainGrid::from_layout(&[
            "#######", //
            "#S...E#", //
            "#######",
        ])
        .expect("layout parses")
    }

    #[test]
    fn bfs_walks_a_straight_corridor() {
        let grid = open_corridor();
        let mut solver = BfsSolver::new(&grid);
        let result = solver.solve_all_stages();

        assert!(result.found);
        assert_eq!(result.total_cost, 4.0);
        assert_eq!(result.steps(), 4);
        assert_eq!(result.path.first(), Some(&grid.start()));
        assert_eq!(result.path.last(), Some(&grid.exit()));
    }

    #[test]
    fn astar_avoids_mud_when_a_longer_dry_detour_is_cheaper() {
        // Straight through the mud costs 2 + 3 * 5 = hops with mud;
        // the detour row is all dry.
        let grid = TerrainGrid::from_layout(&[
            "#######", //
            "#SMMME#", //
            "#.....#", //
            "#######",
        ])
        .expect("layout parses");

        let mut solver = AStarSolver::new(&grid);
        let result = solver.solve_all_stages();

        assert!(result.found);
        // Down, four east, up: six dry steps.
        assert_eq!(result.total_cost, 6.0);
        assert!(result.path.iter().all(|&cell| !grid.is_mud(cell)));
    }

    #[test]
    fn bfs_prefers_fewer_hops_even_through_mud() {
        let grid = TerrainGrid::from_layout(&[
            "#######", //
            "#SMMME#", //
            "#.....#", //
            "#######",
        ])
        .expect("layout parses");

        let mut solver = BfsSolver::new(&grid);
        let result = solver.solve_all_stages();

        assert!(result.found);
        // Four hops straight through the mud, priced at terrain cost.
        assert_eq!(result.steps(), 4);
        assert_eq!(result.total_cost, (3 * 5 + 1) as f64);
    }

    #[test]
    fn engines_agree_on_reachability() {
        let grid = TerrainGrid::from_layout(&[
            "#########", //
            "#S.#..K.#", //
            "#..#....#", //
            "#..#.##.#", //
            "#......E#", //
            "#########",
        ])
        .expect("layout parses");

        let bfs = BfsSolver::new(&grid).solve_all_stages();
        let greedy = GreedySolver::new(&grid).solve_all_stages();
        let astar = AStarSolver::new(&grid).solve_all_stages();

        assert!(bfs.found && greedy.found && astar.found);
        assert_eq!(bfs.path.last(), Some(&grid.exit()));
        assert_eq!(greedy.path.last(), Some(&grid.exit()));
        assert_eq!(astar.path.last(), Some(&grid.exit()));
        // A* is cost-optimal per stage; nobody beats it.
        assert!(astar.total_cost <= bfs.total_cost);
        assert!(astar.total_cost <= greedy.total_cost);
    }

    #[test]
    fn corridor_costs_equal_manhattan_distance_for_every_deterministic_strategy() {
        use keymaze_system_csp::CspSolver;
        use keymaze_system_stochastic::BeamSolver;

        let grid = open_corridor();
        let distance = f64::from(grid.start().manhattan_distance(grid.exit()));

        for result in [
            BfsSolver::new(&grid).solve_all_stages(),
            GreedySolver::new(&grid).solve_all_stages(),
            AStarSolver::new(&grid).solve_all_stages(),
            CspSolver::new(&grid).solve_all_stages(),
            BeamSolver::new(&grid).solve_all_stages(),
        ] {
            assert!(result.found);
            assert_eq!(result.total_cost, distance);
            assert_eq!(result.path.first(), Some(&grid.start()));
            assert_eq!(result.path.last(), Some(&grid.exit()));
        }
    }

    #[test]
    fn zero_key_costs_reprice_exactly_along_the_reported_path() {
        let grid = TerrainGrid::from_layout(&[
            "#######", //
            "#S.M..#", //
            "#..#.E#", //
            "#######",
        ])
        .expect("layout parses");

        for result in [
            BfsSolver::new(&grid).solve_all_stages(),
            GreedySolver::new(&grid).solve_all_stages(),
            AStarSolver::new(&grid).solve_all_stages(),
        ] {
            assert!(result.found);
            assert_eq!(grid.path_cost(&result.path), Some(result.total_cost as u64));
        }
    }

    #[test]
    fn walled_off_exit_fails_without_partial_paths() {
        let grid = TerrainGrid::from_layout(&[
            "#####", //
            "#S#E#", //
            "#####",
        ])
        .expect("layout parses");

        for result in [
            BfsSolver::new(&grid).solve_all_stages(),
            GreedySolver::new(&grid).solve_all_stages(),
            AStarSolver::new(&grid).solve_all_stages(),
        ] {
            assert!(!result.found);
            assert!(result.path.is_empty());
            assert!(result.total_cost.is_infinite());
            assert!(result.nodes_expanded > 0);
        }
    }

    #[test]
    fn stepping_reaches_the_same_terminal_result_as_batch() {
        let grid = TerrainGrid::from_layout(&[
            "#########", //
            "#S..#...#", //
            "#.#.#.#.#", //
            "#.#...#K#", //
            "#.#####.#", //
            "#......E#", //
            "#########",
        ])
        .expect("layout parses");

        let batch = AStarSolver::new(&grid).solve_all_stages();

        let mut stepped = AStarSolver::new(&grid);
        assert_eq!(stepped.phase(), StepPhase::NotStarted);
        let mut guard = 0;
        while !stepped.solve_step_visualize() {
            guard += 1;
            assert!(guard < 100_000, "stepping failed to terminate");
        }
        assert_eq!(stepped.phase(), StepPhase::Done);
        assert_eq!(stepped.result(), batch);

        // Terminal steps are idempotent.
        assert!(stepped.solve_step_visualize());
        assert_eq!(stepped.result(), batch);
    }
}

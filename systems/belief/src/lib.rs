#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Partial-observability agent planning over a belief map.
//!
//! The agent only knows what it has observed within a square radius of
//! the cells it has stood on. Each decision cycle it picks a target
//! (nearest believed key, then the exit, then the nearest unexplored
//! frontier cell), plans a breadth-first route over the belief map
//! with unknown cells treated as impassable, executes only the first
//! step of that route on the real grid, observes, and replans. One
//! visualize step is one decision cycle.

use std::collections::{HashMap, HashSet, VecDeque};

use keymaze_core::{Cell, Direction, SearchResult, Solver, StepPhase};
use keymaze_world::{TerrainGrid, MUD_COST, PORTAL_COST, SLIDE_CELL_COST};
use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Observation range and planning budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeliefConfig {
    /// Chebyshev radius of each observation.
    pub observation_radius: i32,
    /// Node budget per belief-map plan.
    pub max_planning_steps: u64,
}

impl Default for BeliefConfig {
    fn default() -> Self {
        Self {
            observation_radius: 20,
            max_planning_steps: 500_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BeliefCell {
    Unknown,
    Wall,
    Path,
}

/// Belief-state solver with partial observability.
///
/// The agent's knowledge of the grid grows only through observations;
/// portal destinations are learned by stepping through them. The run
/// succeeds when the agent stands on the exit holding every key the
/// grid placed, and fails when it runs out of targets, gets stuck, or
/// exceeds the cycle budget.
pub struct BeliefSolver<'g> {
    grid: &'g TerrainGrid,
    config: BeliefConfig,
    rng: ChaCha8Rng,
    belief: Vec<BeliefCell>,
    believed_keys: HashSet<Cell>,
    believed_exit: Option<Cell>,
    believed_mud: HashSet<Cell>,
    believed_water: HashSet<Cell>,
    believed_portals: HashMap<Cell, Option<Cell>>,
    position: Cell,
    collected: HashSet<Cell>,
    walk: Vec<Cell>,
    cost: u64,
    cycles: u64,
    max_cycles: u64,
    outcome: Option<SearchResult>,
    phase: StepPhase,
}

enum Target {
    Key(Cell),
    Exit(Cell),
    Explore(Cell),
}

impl<'g> BeliefSolver<'g> {
    /// Creates a solver with the default observation radius, seeded
    /// for the rare randomized fallback move.
    #[must_use]
    pub fn new(grid: &'g TerrainGrid, seed: u64) -> Self {
        Self::with_config(grid, seed, BeliefConfig::default())
    }

    /// Creates a solver with an explicit configuration.
    #[must_use]
    pub fn with_config(grid: &'g TerrainGrid, seed: u64, config: BeliefConfig) -> Self {
        let cell_count = (grid.width().max(0) as usize) * (grid.height().max(0) as usize);
        let mut solver = Self {
            grid,
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
            belief: vec![BeliefCell::Unknown; cell_count],
            believed_keys: HashSet::new(),
            believed_exit: None,
            believed_mud: HashSet::new(),
            believed_water: HashSet::new(),
            believed_portals: HashMap::new(),
            position: grid.start(),
            collected: HashSet::new(),
            walk: vec![grid.start()],
            cost: 0,
            cycles: 0,
            max_cycles: cell_count as u64 * 5,
            outcome: None,
            phase: StepPhase::NotStarted,
        };
        solver.observe();
        solver
    }

    /// Current stepping phase.
    #[must_use]
    pub fn phase(&self) -> StepPhase {
        self.phase
    }

    /// Whether the agent has observed `cell` yet.
    #[must_use]
    pub fn observed(&self, cell: Cell) -> bool {
        self.belief_at(cell) != BeliefCell::Unknown
    }

    /// Exit cell the agent has seen, if any.
    #[must_use]
    pub fn believed_exit(&self) -> Option<Cell> {
        self.believed_exit
    }

    /// Keys the agent believes it has collected.
    #[must_use]
    pub fn collected_keys(&self) -> usize {
        self.collected.len()
    }

    /// Whether the agent has learned that `cell` is mud.
    #[must_use]
    pub fn believes_mud(&self, cell: Cell) -> bool {
        self.believed_mud.contains(&cell)
    }

    /// Whether the agent has learned that `cell` is water.
    #[must_use]
    pub fn believes_water(&self, cell: Cell) -> bool {
        self.believed_water.contains(&cell)
    }

    fn belief_index(&self, cell: Cell) -> Option<usize> {
        if cell.x() < 0
            || cell.y() < 0
            || cell.x() >= self.grid.width()
            || cell.y() >= self.grid.height()
        {
            return None;
        }
        Some((cell.y() * self.grid.width() + cell.x()) as usize)
    }

    fn belief_at(&self, cell: Cell) -> BeliefCell {
        match self.belief_index(cell) {
            Some(index) => self.belief[index],
            None => BeliefCell::Wall,
        }
    }

    fn record(&mut self, cell: Cell) {
        let Some(index) = self.belief_index(cell) else {
            return;
        };
        if self.belief[index] != BeliefCell::Unknown {
            return;
        }
        if self.grid.is_wall(cell) {
            self.belief[index] = BeliefCell::Wall;
            return;
        }
        self.belief[index] = BeliefCell::Path;
        if self.grid.is_key(cell) {
            let _ = self.believed_keys.insert(cell);
        }
        if self.grid.is_mud(cell) {
            let _ = self.believed_mud.insert(cell);
        }
        if self.grid.is_water(cell) {
            let _ = self.believed_water.insert(cell);
        }
        if self.grid.is_portal(cell) && !self.believed_portals.contains_key(&cell) {
            let _ = self.believed_portals.insert(cell, None);
        }
        if cell == self.grid.exit() {
            self.believed_exit = Some(cell);
        }
    }

    /// Observes the square neighborhood of the agent's cell.
    fn observe(&mut self) {
        let radius = self.config.observation_radius;
        let center = self.position;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                self.record(Cell::new(center.x() + dx, center.y() + dy));
            }
        }
    }

    /// Neighbors of `cell` on the belief map. Unknown cells are
    /// impassable; portals with a learned destination jump there;
    /// water the agent has not slid on yet reads as plain floor.
    fn belief_neighbors(&self, cell: Cell) -> Vec<Cell> {
        let mut neighbors = Vec::with_capacity(4);
        for direction in Direction::ALL {
            let next = cell.step(direction);
            match self.belief_at(next) {
                BeliefCell::Wall | BeliefCell::Unknown => continue,
                BeliefCell::Path => {}
            }
            let destination = match self.believed_portals.get(&next) {
                Some(Some(target)) => *target,
                _ => next,
            };
            neighbors.push(destination);
        }
        neighbors
    }

    fn choose_target(&self) -> Option<Target> {
        let mut pending: Vec<Cell> = self
            .believed_keys
            .difference(&self.collected)
            .copied()
            .collect();
        if !pending.is_empty() {
            pending.sort();
            pending.sort_by_key(|key| self.position.manhattan_distance(*key));
            return Some(Target::Key(pending[0]));
        }

        if let Some(exit) = self.believed_exit {
            if self.believed_keys.is_empty() || self.collected.len() >= self.believed_keys.len() {
                return Some(Target::Exit(exit));
            }
        }

        let mut frontier: Vec<Cell> = Vec::new();
        for y in 0..self.grid.height() {
            for x in 0..self.grid.width() {
                let cell = Cell::new(x, y);
                if self.belief_at(cell) != BeliefCell::Unknown {
                    continue;
                }
                let touches_known_path = Direction::ALL
                    .iter()
                    .any(|&direction| self.belief_at(cell.step(direction)) == BeliefCell::Path);
                if touches_known_path {
                    frontier.push(cell);
                }
            }
        }
        if frontier.is_empty() {
            return None;
        }
        frontier.sort_by_key(|cell| self.position.manhattan_distance(*cell));
        Some(Target::Explore(frontier[0]))
    }

    /// Breadth-first plan over the belief map, bounded by the planning
    /// budget.
    fn plan(&self, from: Cell, to: Cell) -> Option<Vec<Cell>> {
        let mut queue = VecDeque::from([from]);
        let mut came_from: HashMap<Cell, Cell> = HashMap::new();
        let mut seen: HashSet<Cell> = HashSet::from([from]);
        let mut popped: u64 = 0;

        while let Some(current) = queue.pop_front() {
            popped += 1;
            if popped > self.config.max_planning_steps {
                return None;
            }
            if current == to {
                let mut path = vec![current];
                let mut cursor = current;
                while cursor != from {
                    cursor = *came_from.get(&cursor)?;
                    path.push(cursor);
                }
                path.reverse();
                return Some(path);
            }
            for neighbor in self.belief_neighbors(current) {
                if seen.insert(neighbor) {
                    let _ = came_from.insert(neighbor, current);
                    queue.push_back(neighbor);
                }
            }
        }
        None
    }

    /// Executes one intended step on the real grid, returning the cost
    /// paid. A step that turns out to hit a wall (or an unjustified
    /// jump) costs nothing and leaves the agent in place, but the wall
    /// is recorded.
    fn execute(&mut self, intended: Cell) -> u64 {
        let dx = intended.x() - self.position.x();
        let dy = intended.y() - self.position.y();
        let adjacent = (dx.abs() + dy.abs()) == 1;

        let (stepped_on, direction) = if adjacent {
            let direction = match (dx, dy) {
                (0, -1) => Direction::North,
                (0, 1) => Direction::South,
                (-1, 0) => Direction::West,
                _ => Direction::East,
            };
            (intended, direction)
        } else {
            // A jump in the plan is only physical through an adjacent
            // portal whose learned destination matches.
            let mut entry = None;
            for direction in Direction::ALL {
                let probe = self.position.step(direction);
                if self.grid.portal_target(probe) == Some(intended) {
                    entry = Some((probe, direction));
                    break;
                }
            }
            match entry {
                Some(found) => found,
                None => return 0,
            }
        };

        if self.grid.is_wall(stepped_on) {
            if let Some(index) = self.belief_index(stepped_on) {
                self.belief[index] = BeliefCell::Wall;
            }
            return 0;
        }

        let mut cost = if self.grid.is_mud(stepped_on) {
            let _ = self.believed_mud.insert(stepped_on);
            u64::from(MUD_COST)
        } else {
            1
        };
        let mut landing = stepped_on;

        if self.grid.is_water(stepped_on) {
            let (slid_to, cells_slid) = self.grid.slide_endpoint(stepped_on, direction);
            landing = slid_to;
            cost += u64::from(cells_slid) * u64::from(SLIDE_CELL_COST);
        } else if let Some(target) = self.grid.portal_target(stepped_on) {
            landing = target;
            cost += u64::from(PORTAL_COST);
            let _ = self.believed_portals.insert(stepped_on, Some(target));
        }

        self.position = landing;
        self.walk.push(landing);
        if self.grid.is_key(landing) {
            let _ = self.believed_keys.insert(landing);
            let _ = self.collected.insert(landing);
        }
        cost
    }

    /// One decision cycle: choose, plan, step, observe, check.
    fn cycle(&mut self) {
        self.cycles += 1;
        if self.cycles > self.max_cycles {
            self.outcome = Some(SearchResult::failure(self.cycles));
            return;
        }

        let target = match self.choose_target() {
            Some(Target::Key(cell)) | Some(Target::Exit(cell)) | Some(Target::Explore(cell)) => {
                cell
            }
            None => {
                self.outcome = Some(SearchResult::failure(self.cycles));
                return;
            }
        };

        let planned_step = self
            .plan(self.position, target)
            .filter(|path| path.len() >= 2)
            .map(|path| path[1]);
        let next = match planned_step {
            Some(step) => step,
            None => {
                // Belief map has no route; shuffle to a known open
                // neighbor and hope the next observation helps.
                let open: Vec<Cell> = Direction::ALL
                    .iter()
                    .map(|&direction| self.position.step(direction))
                    .filter(|&cell| self.belief_at(cell) == BeliefCell::Path)
                    .collect();
                if open.is_empty() {
                    self.outcome = Some(SearchResult::failure(self.cycles));
                    return;
                }
                open[self.rng.gen_range(0..open.len())]
            }
        };

        self.cost += self.execute(next);
        self.observe();

        if self.position == self.grid.exit() && self.collected.len() >= self.grid.total_keys_placed()
        {
            self.outcome = Some(SearchResult::success(
                self.walk.clone(),
                self.cost,
                self.cycles,
            ));
        }
    }
}

impl Solver for BeliefSolver<'_> {
    fn solve_all_stages(&mut self) -> SearchResult {
        while !self.solve_step_visualize() {}
        self.result()
    }

    fn solve_step_visualize(&mut self) -> bool {
        if self.outcome.is_some() {
            self.phase = StepPhase::Done;
            return true;
        }
        self.phase = StepPhase::InProgress;
        self.cycle();
        if self.outcome.is_some() {
            self.phase = StepPhase::Done;
            true
        } else {
            false
        }
    }

    fn result(&self) -> SearchResult {
        match &self.outcome {
            Some(outcome) => outcome.clone(),
            None => SearchResult::failure(self.cycles),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_a_fully_visible_corridor() {
        let grid = TerrainGrid::from_layout(&[
            "######", //
            "#S..E#", //
            "######",
        ])
        .expect("layout parses");

        let mut solver = BeliefSolver::new(&grid, 1);
        let result = solver.solve_all_stages();

        assert!(result.found);
        assert_eq!(result.path.first(), Some(&grid.start()));
        assert_eq!(result.path.last(), Some(&grid.exit()));
        assert_eq!(result.total_cost, 3.0);
    }

    #[test]
    fn collects_seen_keys_before_heading_for_the_exit() {
        let grid = TerrainGrid::from_layout(&[
            "########", //
            "#S..K..#", //
            "#......#", //
            "#..K..E#", //
            "########",
        ])
        .expect("layout parses");

        let mut solver = BeliefSolver::new(&grid, 2);
        let result = solver.solve_all_stages();

        assert!(result.found);
        for key in grid.keys() {
            assert!(result.path.contains(key));
        }
        assert_eq!(solver.collected_keys(), 2);
    }

    #[test]
    fn narrow_vision_explores_before_finding_the_exit() {
        let grid = TerrainGrid::from_layout(&[
            "######", //
            "#S...#", //
            "#.##.#", //
            "#..E.#", //
            "######",
        ])
        .expect("layout parses");

        let config = BeliefConfig {
            observation_radius: 1,
            ..BeliefConfig::default()
        };
        let mut solver = BeliefSolver::with_config(&grid, 9, config);

        // Nothing beyond the initial neighborhood is known yet.
        assert!(!solver.observed(grid.exit()));
        assert_eq!(solver.believed_exit(), None);

        let result = solver.solve_all_stages();
        assert!(result.found);
        assert!(solver.observed(grid.exit()));

        // Everything the agent knows must have been in sight of some
        // cell it actually stood on.
        let radius = config.observation_radius;
        for y in 0..grid.height() {
            for x in 0..grid.width() {
                let cell = Cell::new(x, y);
                if !solver.observed(cell) {
                    continue;
                }
                let in_sight = result.path.iter().any(|visited| {
                    (visited.x() - cell.x())
                        .abs()
                        .max((visited.y() - cell.y()).abs())
                        <= radius
                });
                assert!(
                    in_sight,
                    "({}, {}) observed from nowhere the agent stood",
                    cell.x(),
                    cell.y()
                );
            }
        }
    }

    #[test]
    fn stepped_cycles_match_a_batch_run_on_the_same_seed() {
        let grid = TerrainGrid::from_layout(&[
            "#########", //
            "#S......#", //
            "#.#####.#", //
            "#.....#E#", //
            "#########",
        ])
        .expect("layout parses");

        let config = BeliefConfig {
            observation_radius: 2,
            ..BeliefConfig::default()
        };
        let batch = BeliefSolver::with_config(&grid, 4, config).solve_all_stages();

        let mut stepped = BeliefSolver::with_config(&grid, 4, config);
        let mut guard = 0;
        while !stepped.solve_step_visualize() {
            guard += 1;
            assert!(guard < 10_000, "cycling failed to terminate");
        }
        assert_eq!(stepped.phase(), StepPhase::Done);
        assert_eq!(stepped.result(), batch);
    }

    #[test]
    fn stuck_agent_fails_without_a_partial_path() {
        let grid = TerrainGrid::from_layout(&[
            "#####", //
            "#S#E#", //
            "#####",
        ])
        .expect("layout parses");

        let mut solver = BeliefSolver::new(&grid, 6);
        let result = solver.solve_all_stages();

        assert!(!result.found);
        assert!(result.path.is_empty());
        assert!(result.total_cost.is_infinite());
    }
}

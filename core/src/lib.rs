#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the keymaze workspace.
//!
//! This crate defines the vocabulary that connects the terrain world,
//! the solver systems, and the adapters. Solvers implement the
//! [`Solver`] contract against an immutable terrain grid, report a
//! uniform [`SearchResult`], and drive multi-goal runs through the
//! shared [`StagePlanner`], which turns any single-pair search
//! primitive into a collect-all-keys-then-exit itinerary.

use serde::{Deserialize, Serialize};

/// Location of a single grid cell expressed as `x`/`y` coordinates.
///
/// Coordinates are signed so that out-of-range probes (one step past a
/// border) stay representable; the terrain grid treats every
/// out-of-range cell as a wall.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    x: i32,
    y: i32,
}

impl Cell {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Horizontal coordinate of the cell.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Vertical coordinate of the cell.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Computes the Manhattan distance between two cells.
    #[must_use]
    pub fn manhattan_distance(self, other: Cell) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Returns the cell one step away in the provided direction.
    #[must_use]
    pub const fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Cardinal movement directions available to every agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Movement toward decreasing `y`.
    North,
    /// Movement toward increasing `x`.
    East,
    /// Movement toward increasing `y`.
    South,
    /// Movement toward decreasing `x`.
    West,
}

impl Direction {
    /// All four directions in the fixed expansion order shared by
    /// every solver, keeping deterministic runs reproducible.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::West,
        Direction::East,
    ];

    /// Unit offset carried by the direction.
    #[must_use]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    /// Direction pointing the opposite way.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }
}

/// Resolved outcome of attempting one orthogonal step: the destination
/// after mud/slide/portal effects and the cost of entering it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveMove {
    /// Cell the mover occupies after the step resolves.
    pub destination: Cell,
    /// Cost charged for the resolved step.
    pub cost: u32,
}

/// Uniform result record produced by every solver run.
///
/// A failed run carries an empty path and an infinite cost; partial
/// progress is never reported.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchResult {
    /// Whether a complete run (all keys, then the exit) was found.
    pub found: bool,
    /// Ordered cells of the full run, starting at the grid's start.
    pub path: Vec<Cell>,
    /// Total cost of the run, or `f64::INFINITY` when not found.
    pub total_cost: f64,
    /// Nodes expanded (or work units consumed) across the whole run.
    pub nodes_expanded: u64,
}

impl SearchResult {
    /// Builds a successful result over the provided path.
    #[must_use]
    pub fn success(path: Vec<Cell>, total_cost: u64, nodes_expanded: u64) -> Self {
        Self {
            found: true,
            path,
            total_cost: total_cost as f64,
            nodes_expanded,
        }
    }

    /// Builds the canonical failure record: no path, infinite cost.
    #[must_use]
    pub fn failure(nodes_expanded: u64) -> Self {
        Self {
            found: false,
            path: Vec::new(),
            total_cost: f64::INFINITY,
            nodes_expanded,
        }
    }

    /// Number of moves along the reported path.
    #[must_use]
    pub fn steps(&self) -> usize {
        if self.found {
            self.path.len().saturating_sub(1)
        } else {
            0
        }
    }
}

/// Lifecycle of the incremental-step protocol for one solver instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StepPhase {
    /// No visualize step has been performed yet.
    #[default]
    NotStarted,
    /// Work is in flight; further step calls are required.
    InProgress,
    /// The run is terminal and [`Solver::result`] is final.
    Done,
}

/// Contract implemented by every solving strategy.
///
/// A solver is constructed against one terrain grid and executed once,
/// either synchronously through [`Solver::solve_all_stages`] or
/// cooperatively through repeated [`Solver::solve_step_visualize`]
/// calls; both converge to an equivalent terminal result for
/// deterministic strategies.
pub trait Solver {
    /// Runs the full search synchronously and returns the result.
    fn solve_all_stages(&mut self) -> SearchResult;

    /// Performs one bounded unit of work, returning `true` once the
    /// run is terminal. Algorithmic non-convergence is reported as a
    /// not-found result, never as a panic.
    fn solve_step_visualize(&mut self) -> bool;

    /// Result of the most recent run; a failure record until one
    /// completes.
    fn result(&self) -> SearchResult;
}

/// Outcome of a single-pair search between two cells.
#[derive(Clone, Debug, PartialEq)]
pub struct StageSearch {
    /// Cells from the stage start to the stage target, inclusive.
    pub path: Vec<Cell>,
    /// Cost of the stage path.
    pub cost: u64,
    /// Nodes expanded while searching the stage.
    pub expanded: u64,
    /// Whether the target was reached.
    pub found: bool,
}

impl StageSearch {
    /// Canonical failed stage.
    #[must_use]
    pub fn failure(expanded: u64) -> Self {
        Self {
            path: Vec::new(),
            cost: 0,
            expanded,
            found: false,
        }
    }
}

/// Progress reported by one planner round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Keys remain (or the exit leg is still pending).
    InProgress,
    /// The run reached the exit with every key collected.
    Complete,
    /// A stage search failed; the whole run fails with it.
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PlanState {
    Collecting,
    FinalLeg,
    Finished { found: bool },
}

/// Sequential multi-goal planner shared by the single-pair strategies.
///
/// Each round evaluates every uncollected key with the strategy's own
/// search primitive, commits the cheapest reachable one, and advances;
/// once no keys remain a final leg targets the exit. Any failed stage
/// fails the entire run and discards the accumulated path.
#[derive(Clone, Debug)]
pub struct StagePlanner {
    current: Cell,
    exit: Cell,
    pending: Vec<Cell>,
    path: Vec<Cell>,
    total_cost: u64,
    nodes_expanded: u64,
    state: PlanState,
}

impl StagePlanner {
    /// Creates a planner for a run from `start` over `keys` to `exit`.
    #[must_use]
    pub fn new(start: Cell, keys: &[Cell], exit: Cell) -> Self {
        let state = if keys.is_empty() {
            PlanState::FinalLeg
        } else {
            PlanState::Collecting
        };
        Self {
            current: start,
            exit,
            pending: keys.to_vec(),
            path: vec![start],
            total_cost: 0,
            nodes_expanded: 0,
            state,
        }
    }

    /// Whether the run reached a terminal state.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self.state, PlanState::Finished { .. })
    }

    /// Cell the planner currently stands on.
    #[must_use]
    pub fn current(&self) -> Cell {
        self.current
    }

    /// Keys not yet committed to the itinerary.
    #[must_use]
    pub fn pending_keys(&self) -> &[Cell] {
        &self.pending
    }

    /// Exit cell targeted by the final leg.
    #[must_use]
    pub fn exit(&self) -> Cell {
        self.exit
    }

    /// Executes one planner round with the provided search primitive.
    ///
    /// During collection a round evaluates all pending keys; the final
    /// round searches the exit leg. Calling after completion returns
    /// the terminal outcome without invoking the primitive.
    pub fn advance_round<F>(&mut self, mut search: F) -> RoundOutcome
    where
        F: FnMut(Cell, Cell) -> StageSearch,
    {
        match self.state {
            PlanState::Finished { found } => {
                if found {
                    RoundOutcome::Complete
                } else {
                    RoundOutcome::Failed
                }
            }
            PlanState::Collecting => {
                let mut best: Option<(usize, StageSearch)> = None;
                for (index, key) in self.pending.iter().enumerate() {
                    let outcome = search(self.current, *key);
                    self.nodes_expanded += outcome.expanded;
                    if outcome.found {
                        let better = match &best {
                            None => true,
                            Some((_, held)) => outcome.cost < held.cost,
                        };
                        if better {
                            best = Some((index, outcome));
                        }
                    }
                }
                match best {
                    None => {
                        self.fail();
                        RoundOutcome::Failed
                    }
                    Some((index, stage)) => {
                        self.commit_stage(&stage);
                        self.current = self.pending.remove(index);
                        if self.pending.is_empty() {
                            self.state = PlanState::FinalLeg;
                        }
                        RoundOutcome::InProgress
                    }
                }
            }
            PlanState::FinalLeg => {
                let outcome = search(self.current, self.exit);
                self.nodes_expanded += outcome.expanded;
                if outcome.found {
                    self.commit_stage(&outcome);
                    self.current = self.exit;
                    self.state = PlanState::Finished { found: true };
                    RoundOutcome::Complete
                } else {
                    self.fail();
                    RoundOutcome::Failed
                }
            }
        }
    }

    /// Result snapshot; a failure record until the run completes.
    #[must_use]
    pub fn result(&self) -> SearchResult {
        match self.state {
            PlanState::Finished { found: true } => {
                SearchResult::success(self.path.clone(), self.total_cost, self.nodes_expanded)
            }
            _ => SearchResult::failure(self.nodes_expanded),
        }
    }

    fn commit_stage(&mut self, stage: &StageSearch) {
        // Stage paths start at the planner's current cell; drop the
        // duplicated head before appending.
        self.path.extend(stage.path.iter().skip(1).copied());
        self.total_cost += stage.cost;
    }

    fn fail(&mut self) {
        self.path.clear();
        self.total_cost = 0;
        self.state = PlanState::Finished { found: false };
    }
}

/// Runs a [`StagePlanner`] to completion with the provided primitive.
#[must_use]
pub fn plan_stages<F>(start: Cell, keys: &[Cell], exit: Cell, mut search: F) -> SearchResult
where
    F: FnMut(Cell, Cell) -> StageSearch,
{
    let mut planner = StagePlanner::new(start, keys, exit);
    while !planner.is_finished() {
        match planner.advance_round(&mut search) {
            RoundOutcome::InProgress => {}
            RoundOutcome::Complete | RoundOutcome::Failed => break,
        }
    }
    planner.result()
}

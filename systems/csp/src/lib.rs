#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Constraint-style depth-first search with forward pruning.
//!
//! Each stage is solved by an iterative depth-first walk over
//! effective moves, expanding neighbors closest to the target first.
//! The walk never revisits a cell already on the current path, never
//! reverses its last step, caps the path at twice the cell count, and
//! memoizes failed `(cell, predecessor)` probes so re-entering a dead
//! region from the same edge is pruned immediately.

use std::collections::HashSet;

use keymaze_core::{
    plan_stages, Cell, SearchResult, Solver, StageSearch, StepPhase,
};
use keymaze_world::TerrainGrid;

/// Depth-first constraint solver.
///
/// Stepped execution is batch-on-first-step: the first visualize call
/// runs the whole search and every call afterwards reports completion.
pub struct CspSolver<'g> {
    grid: &'g TerrainGrid,
    outcome: Option<SearchResult>,
    phase: StepPhase,
}

impl<'g> CspSolver<'g> {
    /// Creates a solver for the grid's start, keys, and exit.
    #[must_use]
    pub fn new(grid: &'g TerrainGrid) -> Self {
        Self {
            grid,
            outcome: None,
            phase: StepPhase::NotStarted,
        }
    }

    /// Current stepping phase.
    #[must_use]
    pub fn phase(&self) -> StepPhase {
        self.phase
    }
}

impl Solver for CspSolver<'_> {
    fn solve_all_stages(&mut self) -> SearchResult {
        let grid = self.grid;
        let max_path_len = (grid.width().max(0) as usize) * (grid.height().max(0) as usize) * 2;
        let result = plan_stages(grid.start(), grid.keys(), grid.exit(), |from, to| {
            dfs_segment(grid, from, to, grid.is_key(to), max_path_len)
        });
        self.outcome = Some(result.clone());
        self.phase = StepPhase::Done;
        result
    }

    fn solve_step_visualize(&mut self) -> bool {
        if self.outcome.is_none() {
            let _ = self.solve_all_stages();
        }
        true
    }

    fn result(&self) -> SearchResult {
        match &self.outcome {
            Some(result) => result.clone(),
            None => SearchResult::failure(0),
        }
    }
}

struct Frame {
    cell: Cell,
    neighbors: Vec<Cell>,
    cursor: usize,
}

impl Frame {
    fn open(grid: &TerrainGrid, cell: Cell, target: Cell) -> Self {
        let mut neighbors: Vec<Cell> = grid
            .effective_moves(cell)
            .into_iter()
            .map(|step| step.destination)
            .collect();
        // Stable sort keeps the fixed expansion order among ties.
        neighbors.sort_by_key(|neighbor| neighbor.manhattan_distance(target));
        Self {
            cell,
            neighbors,
            cursor: 0,
        }
    }
}

fn dfs_segment(
    grid: &TerrainGrid,
    from: Cell,
    to: Cell,
    target_is_key: bool,
    max_path_len: usize,
) -> StageSearch {
    let mut evaluated: u64 = 1;

    if from == to {
        // A key target must be stepped onto to count as collected.
        if target_is_key {
            return StageSearch::failure(evaluated);
        }
        return StageSearch {
            path: vec![from],
            cost: 0,
            expanded: evaluated,
            found: true,
        };
    }

    let mut path = vec![from];
    let mut on_path: HashSet<Cell> = HashSet::from([from]);
    let mut frames = vec![Frame::open(grid, from, to)];
    let mut dead: HashSet<(Cell, Option<Cell>)> = HashSet::new();

    loop {
        let descend = {
            let Some(frame) = frames.last_mut() else {
                break;
            };
            let previous = if path.len() > 1 {
                Some(path[path.len() - 2])
            } else {
                None
            };

            let mut chosen = None;
            while frame.cursor < frame.neighbors.len() {
                let candidate = frame.neighbors[frame.cursor];
                frame.cursor += 1;

                if Some(candidate) == previous {
                    continue;
                }
                if candidate == to {
                    evaluated += 1;
                    path.push(candidate);
                    return StageSearch {
                        cost: grid.mud_aware_cost(&path),
                        expanded: evaluated,
                        path,
                        found: true,
                    };
                }
                if on_path.contains(&candidate) {
                    continue;
                }

                evaluated += 1;
                if dead.contains(&(candidate, Some(frame.cell))) {
                    continue;
                }
                if path.len() + 1 >= max_path_len {
                    let _ = dead.insert((candidate, Some(frame.cell)));
                    continue;
                }

                chosen = Some(candidate);
                break;
            }
            chosen
        };

        match descend {
            Some(next) => {
                path.push(next);
                let _ = on_path.insert(next);
                frames.push(Frame::open(grid, next, to));
            }
            None => {
                // Every branch from this cell failed; remember the
                // edge it was entered through.
                if let Some(spent) = frames.pop() {
                    let entered_from = path.len().checked_sub(2).map(|i| path[i]);
                    let _ = dead.insert((spent.cell, entered_from));
                }
                if let Some(left) = path.pop() {
                    let _ = on_path.remove(&left);
                }
            }
        }
    }

    StageSearch::failure(evaluated)
}

#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Local-search strategies: simulated annealing and local beam search.
//!
//! Both strategies plan stage by stage through the shared planner, one
//! round per visualize step, so a stepped run consumes the same RNG
//! stream as a batch run with the same seed and terminates in the same
//! result. Stage paths are priced with the mud-aware realized cost of
//! the walk actually taken, not an optimal re-pricing.

mod annealing;
mod beam;

pub use annealing::{AnnealingConfig, AnnealingSolver};
pub use beam::{BeamConfig, BeamSolver};

#[cfg(test)]
mod tests {
    use super::*;
    use keymaze_core::Solver;
    use keymaze_world::TerrainGrid;

    fn corridor() -> TerrainGrid {
        TerrainGrid::from_layout(&[
            "######", //
            "#S..E#", //
            "######",
        ])
        .expect("layout parses")
    }

    #[test]
    fn annealing_reaches_the_exit_on_a_short_corridor() {
        let grid = corridor();
        let mut solver = AnnealingSolver::new(&grid, 11);
        let result = solver.solve_all_stages();

        assert!(result.found);
        assert_eq!(result.path.first(), Some(&grid.start()));
        assert_eq!(result.path.last(), Some(&grid.exit()));
        // The walk may wander; the realized cost covers each step.
        assert!(result.total_cost >= 3.0);
    }

    #[test]
    fn annealing_stepped_run_matches_batch_on_the_same_seed() {
        let grid = TerrainGrid::from_layout(&[
            "########", //
            "#S..K..#", //
            "#......#", //
            "#..K..E#", //
            "########",
        ])
        .expect("layout parses");

        let batch = AnnealingSolver::new(&grid, 5).solve_all_stages();

        let mut stepped = AnnealingSolver::new(&grid, 5);
        let mut rounds = 0;
        while !stepped.solve_step_visualize() {
            rounds += 1;
            assert!(rounds < 16, "one round per step over three stages");
        }
        assert_eq!(stepped.result(), batch);
    }

    #[test]
    fn beam_search_walks_a_corridor_at_minimum_cost() {
        let grid = corridor();
        let mut solver = BeamSolver::new(&grid);
        let result = solver.solve_all_stages();

        assert!(result.found);
        assert_eq!(result.steps(), 3);
        assert_eq!(result.total_cost, 3.0);
    }

    #[test]
    fn beam_search_follows_the_heuristic_straight_through_mud() {
        // Manhattan distance alone steers the beam; the mud row is the
        // direct line and wins despite its cost.
        let grid = TerrainGrid::from_layout(&[
            "#######", //
            "#SMMME#", //
            "#.....#", //
            "#######",
        ])
        .expect("layout parses");

        let result = BeamSolver::new(&grid).solve_all_stages();
        assert!(result.found);
        assert_eq!(result.steps(), 4);
        assert_eq!(result.total_cost, 16.0);
    }

    #[test]
    fn both_strategies_fail_cleanly_when_walled_off() {
        let grid = TerrainGrid::from_layout(&[
            "#####", //
            "#S#E#", //
            "#####",
        ])
        .expect("layout parses");

        let annealed = AnnealingSolver::new(&grid, 3).solve_all_stages();
        assert!(!annealed.found);
        assert!(annealed.path.is_empty());
        assert!(annealed.total_cost.is_infinite());

        let beamed = BeamSolver::new(&grid).solve_all_stages();
        assert!(!beamed.found);
        assert!(beamed.path.is_empty());
        assert!(beamed.total_cost.is_infinite());
    }

    #[test]
    fn beam_collects_the_cheaper_key_first() {
        let grid = TerrainGrid::from_layout(&[
            "#########", //
            "#S.K...K#", //
            "#.......#", //
            "#......E#", //
            "#########",
        ])
        .expect("layout parses");

        let result = BeamSolver::new(&grid).solve_all_stages();
        assert!(result.found);

        let near = grid.keys()[0];
        let far = grid.keys()[1];
        let near_at = result.path.iter().position(|&c| c == near);
        let far_at = result.path.iter().position(|&c| c == far);
        assert!(near_at.expect("near key on path") < far_at.expect("far key on path"));
    }
}

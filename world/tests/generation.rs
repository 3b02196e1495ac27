//! Invariants of generated grids across seeds.

use std::collections::{HashSet, VecDeque};

use keymaze_core::{Cell, Direction};
use keymaze_world::{GridConfig, TerrainGrid, DEFAULT_LOOP_CHANCE};

fn reachable_from_start(grid: &TerrainGrid) -> HashSet<Cell> {
    let mut seen = HashSet::new();
    let mut frontier = VecDeque::new();
    if !grid.is_wall(grid.start()) {
        let _ = seen.insert(grid.start());
        frontier.push_back(grid.start());
    }
    while let Some(cell) = frontier.pop_front() {
        for direction in Direction::ALL {
            let neighbor = cell.step(direction);
            if !grid.is_wall(neighbor) && seen.insert(neighbor) {
                frontier.push_back(neighbor);
            }
        }
    }
    seen
}

#[test]
fn exit_is_reachable_over_raw_adjacency() {
    // Odd dimensions put the exit on the carved lattice.
    let config = GridConfig::derived(21, 15, 3, DEFAULT_LOOP_CHANCE);
    for seed in 0..8 {
        let grid = TerrainGrid::generate(&config, seed);
        let reachable = reachable_from_start(&grid);
        assert!(
            reachable.contains(&grid.exit()),
            "seed {seed}: exit {:?} unreachable",
            grid.exit()
        );
    }
}

#[test]
fn start_and_exit_are_open_and_feature_free() {
    let config = GridConfig::derived(21, 15, 5, DEFAULT_LOOP_CHANCE);
    for seed in 0..8 {
        let grid = TerrainGrid::generate(&config, seed);
        for cell in [grid.start(), grid.exit()] {
            assert!(!grid.is_wall(cell));
            assert!(!grid.is_key(cell));
            assert!(!grid.is_mud(cell));
            assert!(!grid.is_water(cell));
            assert!(!grid.is_portal(cell));
        }
    }
}

#[test]
fn features_land_on_open_cells_and_never_overlap() {
    let config = GridConfig::derived(21, 15, 5, DEFAULT_LOOP_CHANCE);
    for seed in 0..8 {
        let grid = TerrainGrid::generate(&config, seed);
        for y in 0..15 {
            for x in 0..21 {
                let cell = Cell::new(x, y);
                if grid.is_wall(cell) {
                    assert!(!grid.is_key(cell));
                    assert!(!grid.is_mud(cell));
                    assert!(!grid.is_water(cell));
                    assert!(!grid.is_portal(cell));
                    continue;
                }
                // Keys, water, and portals are mutually exclusive; mud
                // additionally never shares a cell with any of them.
                let claims = [
                    grid.is_key(cell),
                    grid.is_water(cell),
                    grid.is_portal(cell),
                    grid.is_mud(cell),
                ];
                assert!(
                    claims.iter().filter(|&&claimed| claimed).count() <= 1,
                    "seed {seed}: overlapping features at {cell:?}"
                );
            }
        }
    }
}

#[test]
fn portals_come_in_mutual_pairs_kept_apart() {
    let config = GridConfig::derived(21, 15, 4, DEFAULT_LOOP_CHANCE);
    for seed in 0..8 {
        let grid = TerrainGrid::generate(&config, seed);
        for y in 0..15 {
            for x in 0..21 {
                let cell = Cell::new(x, y);
                let Some(target) = grid.portal_target(cell) else {
                    continue;
                };
                assert_eq!(grid.portal_target(target), Some(cell));
                assert_eq!(grid.portal_pair(cell), grid.portal_pair(target));
                assert!(cell.manhattan_distance(target) > 2);
            }
        }
    }
}

#[test]
fn key_count_never_exceeds_the_request() {
    for requested in [0usize, 1, 3, 5] {
        let config = GridConfig::derived(21, 15, requested, DEFAULT_LOOP_CHANCE);
        let grid = TerrainGrid::generate(&config, 99);
        assert!(grid.keys().len() <= requested);
        assert_eq!(grid.total_keys_placed(), grid.keys().len());
    }
}

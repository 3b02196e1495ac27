//! Seeded maze generation: backtracking carve, loop pass, and terrain
//! feature placement.

use keymaze_core::Cell;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::{CellKind, TerrainGrid};

/// Shortest slide chain a placement may produce.
pub const MIN_SLIDE_LENGTH: i32 = 3;
/// Longest slide chain a placement may produce.
pub const MAX_SLIDE_LENGTH: i32 = 5;
/// Hard cap on linked portal pairs per grid.
pub const MAX_PORTAL_PAIRS: usize = 2;
/// Default probability of breaking a wall per candidate loop cell.
pub const DEFAULT_LOOP_CHANCE: f64 = 0.15;

const BASE_PUDDLES: usize = 2;
const PUDDLES_PER_KEY: usize = 1;
const MAX_PUDDLE_DENSITY: f64 = 0.08;
const BASE_SLIDES: usize = 1;
const SLIDES_PER_KEY: usize = 1;
const MAX_SLIDE_DENSITY: f64 = 0.05;
// Rough share of interior cells that end up carved; used only to cap
// feature counts on small grids.
const PATH_AREA_RATIO: f64 = 0.45;

/// Terrain feature counts derived from the requested key count and the
/// grid dimensions.
///
/// Each count grows linearly with the key count from a fixed base and
/// is capped by a density ceiling over the estimated carved area, so
/// small grids never drown in terrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureCounts {
    /// Mud puddles to place.
    pub puddles: usize,
    /// Water slide chains to place.
    pub slides: usize,
    /// Portal pairs to link.
    pub portal_pairs: usize,
}

impl FeatureCounts {
    /// Derives feature counts for a grid of the given dimensions with
    /// `keys` requested keys.
    #[must_use]
    pub fn derive(keys: usize, width: i32, height: i32) -> Self {
        let area = f64::from((width - 2).max(0)) * f64::from((height - 2).max(0)) * PATH_AREA_RATIO;
        let capped = |base: usize, per_key: usize, density: f64| {
            let count = (base + per_key * keys).max(base);
            count.min((area * density) as usize)
        };
        let portal_pairs = if keys > 0 {
            (keys / 2).min(MAX_PORTAL_PAIRS)
        } else {
            0
        };
        Self {
            puddles: capped(BASE_PUDDLES, PUDDLES_PER_KEY, MAX_PUDDLE_DENSITY),
            slides: capped(BASE_SLIDES, SLIDES_PER_KEY, MAX_SLIDE_DENSITY),
            portal_pairs,
        }
    }
}

/// Full parameter set for one grid generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridConfig {
    /// Grid width in cells, border included.
    pub width: i32,
    /// Grid height in cells, border included.
    pub height: i32,
    /// Keys to place.
    pub keys: usize,
    /// Mud puddles to place.
    pub puddles: usize,
    /// Water slide chains to place.
    pub slides: usize,
    /// Portal pairs to link.
    pub portal_pairs: usize,
    /// Probability of breaking a wall per candidate loop cell.
    pub loop_chance: f64,
}

impl GridConfig {
    /// Builds a config whose terrain counts follow
    /// [`FeatureCounts::derive`] for the requested key count.
    #[must_use]
    pub fn derived(width: i32, height: i32, keys: usize, loop_chance: f64) -> Self {
        let counts = FeatureCounts::derive(keys, width, height);
        Self {
            width,
            height,
            keys,
            puddles: counts.puddles,
            slides: counts.slides,
            portal_pairs: counts.portal_pairs,
            loop_chance,
        }
    }
}

/// Places the exit in the far corner of the interior, nudged off the
/// start when the two would coincide on a grid large enough to allow
/// it.
fn exit_position(width: i32, height: i32, start: Cell) -> Cell {
    let exit_x = if width > 1 { width - 2 } else { 1 };
    let exit_y = if height > 1 { height - 2 } else { 1 };
    let mut exit = Cell::new(exit_x.max(1), exit_y.max(1));
    if exit == start && (width > 3 || height > 3) {
        let nudged_x = if exit_x - 2 > 0 {
            exit_x - 2
        } else if exit_x > 1 {
            exit_x
        } else {
            exit_x + 1
        };
        exit = Cell::new(nudged_x.max(1), exit.y());
        if exit == start {
            let nudged_y = if exit_y - 2 > 0 {
                exit_y - 2
            } else if exit_y > 1 {
                exit_y
            } else {
                exit_y + 1
            };
            exit = Cell::new(exit.x(), nudged_y.max(1));
        }
    }
    exit
}

fn in_carve_bounds(grid: &TerrainGrid, cell: Cell) -> bool {
    cell.x() >= 1 && cell.x() < grid.width() - 1 && cell.y() >= 1 && cell.y() < grid.height() - 1
}

/// Depth-first carve on the odd lattice with an explicit stack,
/// jumping two cells and opening the wall in between.
fn carve_passages(grid: &mut TerrainGrid, start: Cell, rng: &mut ChaCha8Rng) {
    const JUMPS: [(i32, i32); 4] = [(0, 2), (2, 0), (0, -2), (-2, 0)];

    grid.carve(start);
    let mut stack = vec![start];
    while let Some(&current) = stack.last() {
        let candidates: Vec<Cell> = JUMPS
            .iter()
            .map(|&(dx, dy)| Cell::new(current.x() + dx, current.y() + dy))
            .filter(|&next| in_carve_bounds(grid, next) && grid.is_wall(next))
            .collect();
        match candidates.choose(rng) {
            Some(&next) => {
                let between = Cell::new(
                    (current.x() + next.x()) / 2,
                    (current.y() + next.y()) / 2,
                );
                grid.carve(between);
                grid.carve(next);
                stack.push(next);
            }
            None => {
                let _ = stack.pop();
            }
        }
    }
}

fn kind_at(grid: &TerrainGrid, x: i32, y: i32) -> CellKind {
    if grid.is_wall(Cell::new(x, y)) {
        CellKind::Wall
    } else {
        CellKind::Path
    }
}

/// Breaks a sampling of walls between already-carved corridors so the
/// maze is no longer a perfect tree.
fn add_loops(grid: &mut TerrainGrid, loop_chance: f64, rng: &mut ChaCha8Rng) {
    let (width, height) = (grid.width(), grid.height());
    for y in (1..height - 1).step_by(2) {
        for x in (1..width - 1).step_by(2) {
            if kind_at(grid, x, y) != CellKind::Path || rng.gen::<f64>() >= loop_chance {
                continue;
            }
            let mut breakable = Vec::new();
            if y > 1 && kind_at(grid, x, y - 1) == CellKind::Wall && kind_at(grid, x, y - 2) == CellKind::Path {
                breakable.push(Cell::new(x, y - 1));
            }
            if y < height - 2
                && kind_at(grid, x, y + 1) == CellKind::Wall
                && y + 2 < height - 1
                && kind_at(grid, x, y + 2) == CellKind::Path
            {
                breakable.push(Cell::new(x, y + 1));
            }
            if x > 1 && kind_at(grid, x - 1, y) == CellKind::Wall && kind_at(grid, x - 2, y) == CellKind::Path {
                breakable.push(Cell::new(x - 1, y));
            }
            if x < width - 2
                && kind_at(grid, x + 1, y) == CellKind::Wall
                && x + 2 < width - 1
                && kind_at(grid, x + 2, y) == CellKind::Path
            {
                breakable.push(Cell::new(x + 1, y));
            }
            if let Some(&wall) = breakable.choose(rng) {
                grid.carve(wall);
            }
        }
    }
}

/// Forces the exit onto a path cell and, when the carve never reached
/// it, opens one adjacent interior wall so it is not sealed off.
fn repair_exit(grid: &mut TerrainGrid, rng: &mut ChaCha8Rng) {
    let exit = grid.exit();
    grid.carve(exit);

    let mut sealed = true;
    let mut openable = Vec::new();
    for (dx, dy) in [(0, -1), (0, 1), (-1, 0), (1, 0)] {
        let neighbor = Cell::new(exit.x() + dx, exit.y() + dy);
        if !in_carve_bounds(grid, neighbor) {
            continue;
        }
        if grid.is_wall(neighbor) {
            openable.push(neighbor);
        } else {
            sealed = false;
            break;
        }
    }
    if sealed {
        // An exit hugging the border with no interior neighbor stays
        // sealed; solvers report failure on such grids.
        if let Some(&wall) = openable.choose(rng) {
            grid.carve(wall);
        }
    }
}

/// Interior path cells available for placement, shuffled, with the
/// start, the exit, and every cell matching `taken` removed.
fn placement_spots<F>(grid: &TerrainGrid, taken: F, rng: &mut ChaCha8Rng) -> Vec<Cell>
where
    F: Fn(Cell) -> bool,
{
    let mut spots = Vec::new();
    for y in 1..grid.height() - 1 {
        for x in 1..grid.width() - 1 {
            let cell = Cell::new(x, y);
            if grid.is_wall(cell) || cell == grid.start() || cell == grid.exit() || taken(cell) {
                continue;
            }
            spots.push(cell);
        }
    }
    spots.shuffle(rng);
    spots
}

/// Lays straight water chains of random length and orientation,
/// retrying from fresh spots until the target or the attempt budget is
/// exhausted.
fn place_slides(grid: &mut TerrainGrid, target: usize, rng: &mut ChaCha8Rng) {
    const ORIENTATIONS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

    let mut placed = 0;
    let max_attempts = 50 * target + 30;
    for _ in 0..max_attempts {
        if placed >= target {
            break;
        }
        let view: &TerrainGrid = grid;
        let spots = placement_spots(view, |cell| view.is_water(cell) || view.is_portal(cell), rng);
        let Some(&head) = spots.choose(rng) else {
            break;
        };
        let (dx, dy) = ORIENTATIONS[rng.gen_range(0..ORIENTATIONS.len())];
        let length = rng.gen_range(MIN_SLIDE_LENGTH..=MAX_SLIDE_LENGTH);

        let mut chain = Vec::with_capacity(length as usize);
        let mut fits = true;
        for step in 0..length {
            let cell = Cell::new(head.x() + dx * step, head.y() + dy * step);
            if !in_carve_bounds(grid, cell)
                || grid.is_wall(cell)
                || grid.is_water(cell)
                || grid.is_portal(cell)
                || cell == grid.start()
                || cell == grid.exit()
            {
                fits = false;
                break;
            }
            chain.push(cell);
        }
        if fits {
            for cell in chain {
                grid.add_water(cell);
            }
            placed += 1;
        }
    }
}

/// Links portal pairs on dry path cells, requiring each pair's ends to
/// sit more than two Manhattan steps apart.
fn place_portals(grid: &mut TerrainGrid, target_pairs: usize, rng: &mut ChaCha8Rng) {
    for pair in 0..target_pairs {
        for _ in 0..30 {
            let view: &TerrainGrid = grid;
            let spots =
                placement_spots(view, |cell| view.is_water(cell) || view.is_portal(cell), rng);
            if spots.len() < 2 {
                break;
            }
            let (first, second) = (spots[0], spots[1]);
            if first.manhattan_distance(second) > 2 {
                grid.link_portals(pair as u32, first, second);
                break;
            }
        }
    }
}

fn place_keys(grid: &mut TerrainGrid, target: usize, rng: &mut ChaCha8Rng) {
    let view: &TerrainGrid = grid;
    let spots = placement_spots(view, |cell| view.is_water(cell) || view.is_portal(cell), rng);
    for &cell in spots.iter().take(target) {
        grid.add_key(cell);
    }
}

fn place_puddles(grid: &mut TerrainGrid, target: usize, rng: &mut ChaCha8Rng) {
    let view: &TerrainGrid = grid;
    let spots = placement_spots(
        view,
        |cell| view.is_key(cell) || view.is_water(cell) || view.is_portal(cell),
        rng,
    );
    for &cell in spots.iter().take(target) {
        grid.add_mud(cell);
    }
}

impl TerrainGrid {
    /// Generates a grid from `config`, fully determined by `seed`.
    ///
    /// Generation never fails: grids too small to carve (either
    /// dimension at most 2) come back all wall, and feature placement
    /// degrades to fewer features when the attempt budgets run out.
    /// Placement order is slides, portals, keys, then mud, each round
    /// excluding the cells the earlier rounds claimed.
    #[must_use]
    pub fn generate(config: &GridConfig, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let start = Cell::new(1, 1);
        let exit = exit_position(config.width, config.height, start);
        let mut grid = Self::new_walled(config.width, config.height, start, exit);

        if config.width <= 2 || config.height <= 2 {
            grid.finish_placement();
            return grid;
        }

        carve_passages(&mut grid, start, &mut rng);
        add_loops(&mut grid, config.loop_chance, &mut rng);
        repair_exit(&mut grid, &mut rng);

        place_slides(&mut grid, config.slides, &mut rng);
        place_portals(&mut grid, config.portal_pairs.min(MAX_PORTAL_PAIRS), &mut rng);
        place_keys(&mut grid, config.keys, &mut rng);
        place_puddles(&mut grid, config.puddles, &mut rng);
        grid.finish_placement();
        grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_counts_grow_with_keys_and_respect_density_caps() {
        let none = FeatureCounts::derive(0, 35, 21);
        assert_eq!(none.puddles, BASE_PUDDLES);
        assert_eq!(none.slides, BASE_SLIDES);
        assert_eq!(none.portal_pairs, 0);

        let five = FeatureCounts::derive(5, 35, 21);
        assert_eq!(five.puddles, BASE_PUDDLES + 5);
        assert_eq!(five.slides, BASE_SLIDES + 5);
        assert_eq!(five.portal_pairs, MAX_PORTAL_PAIRS);

        // A cramped interior caps everything down.
        let cramped = FeatureCounts::derive(5, 5, 5);
        let area = 3.0 * 3.0 * PATH_AREA_RATIO;
        assert_eq!(cramped.puddles, (area * MAX_PUDDLE_DENSITY) as usize);
        assert_eq!(cramped.slides, (area * MAX_SLIDE_DENSITY) as usize);
    }

    #[test]
    fn exit_is_nudged_off_the_start_when_they_collide() {
        let start = Cell::new(1, 1);
        assert_eq!(exit_position(35, 21, start), Cell::new(33, 19));
        // 3x5: exit would land on (1, 3); no collision, no nudge.
        assert_eq!(exit_position(3, 5, start), Cell::new(1, 3));
        // 3x3 collides and the grid is too small to nudge.
        assert_eq!(exit_position(3, 3, start), start);
        assert_eq!(exit_position(3, 4, start), Cell::new(1, 2));
    }

    #[test]
    fn generation_is_deterministic_per_seed() {
        let config = GridConfig::derived(21, 15, 3, DEFAULT_LOOP_CHANCE);
        let a = TerrainGrid::generate(&config, 42);
        let b = TerrainGrid::generate(&config, 42);
        for y in 0..15 {
            for x in 0..21 {
                let cell = Cell::new(x, y);
                assert_eq!(a.is_wall(cell), b.is_wall(cell));
                assert_eq!(a.is_water(cell), b.is_water(cell));
                assert_eq!(a.is_mud(cell), b.is_mud(cell));
                assert_eq!(a.is_portal(cell), b.is_portal(cell));
            }
        }
        assert_eq!(a.keys(), b.keys());
    }

    #[test]
    fn tiny_grids_stay_walled_without_panicking() {
        let config = GridConfig::derived(2, 2, 3, DEFAULT_LOOP_CHANCE);
        let grid = TerrainGrid::generate(&config, 7);
        assert!(grid.is_wall(grid.start()));
        assert!(grid.is_wall(grid.exit()));
        assert!(grid.keys().is_empty());
    }
}

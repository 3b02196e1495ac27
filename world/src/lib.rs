#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Terrain world for keymaze: maze topology, terrain overlays, and the
//! cost-resolving neighbor function consumed by every solver.
//!
//! A [`TerrainGrid`] is built once per regeneration and is immutable
//! for solving purposes afterwards; only interactive play consumes
//! keys through [`TerrainGrid::remove_key`]. Solvers read the query
//! surface and [`TerrainGrid::effective_moves`], which resolves raw
//! orthogonal steps through mud, water-slide chains, and portal pairs.

mod cost;
mod generator;

use std::collections::{HashMap, HashSet};

use keymaze_core::Cell;
use thiserror::Error;

pub use generator::{
    FeatureCounts, GridConfig, DEFAULT_LOOP_CHANCE, MAX_PORTAL_PAIRS, MAX_SLIDE_LENGTH,
    MIN_SLIDE_LENGTH,
};

/// Cost charged for stepping onto a mud cell.
pub const MUD_COST: u32 = 5;
/// Cost charged on top of the base step for traversing a portal.
pub const PORTAL_COST: u32 = 1;
/// Cost charged per cell travelled along a water-slide chain.
pub const SLIDE_CELL_COST: u32 = 1;

/// Classification of a single grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellKind {
    /// Impassable cell.
    Wall,
    /// Traversable cell; may carry a terrain overlay.
    Path,
}

/// One end of a symmetric portal pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PortalLink {
    /// Identifier shared by both ends of the pair.
    pub pair: u32,
    /// Cell the portal teleports to.
    pub target: Cell,
}

/// Errors raised while parsing an ASCII terrain layout.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    /// The layout contained no rows or no columns.
    #[error("layout must contain at least one row and one column")]
    Empty,
    /// A row's width differed from the first row's.
    #[error("row {row} has width {found}, expected {expected}")]
    RaggedRow {
        /// Zero-based index of the offending row.
        row: usize,
        /// Width found on the offending row.
        found: usize,
        /// Width of the first row.
        expected: usize,
    },
    /// The layout used a symbol outside the supported alphabet.
    #[error("unknown layout symbol {symbol:?} at ({x}, {y})")]
    UnknownSymbol {
        /// Offending character.
        symbol: char,
        /// Column of the symbol.
        x: i32,
        /// Row of the symbol.
        y: i32,
    },
    /// No `S` start marker was present.
    #[error("layout is missing a start marker")]
    MissingStart,
    /// No `E` exit marker was present.
    #[error("layout is missing an exit marker")]
    MissingExit,
    /// A portal digit appeared a number of times other than two.
    #[error("portal pair {pair} has {count} endpoints, expected 2")]
    UnpairedPortal {
        /// Digit used in the layout.
        pair: u32,
        /// Number of occurrences found.
        count: usize,
    },
}

/// Maze topology plus terrain overlays and the embedded cost model.
#[derive(Clone, Debug)]
pub struct TerrainGrid {
    width: i32,
    height: i32,
    cells: Vec<CellKind>,
    start: Cell,
    exit: Cell,
    keys: Vec<Cell>,
    total_keys_placed: usize,
    mud: HashSet<Cell>,
    water: HashSet<Cell>,
    portals: HashMap<Cell, PortalLink>,
}

impl TerrainGrid {
    /// Width of the grid in cells.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Height of the grid in cells.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    /// Cell every run begins on.
    #[must_use]
    pub const fn start(&self) -> Cell {
        self.start
    }

    /// Cell every run must end on.
    #[must_use]
    pub const fn exit(&self) -> Cell {
        self.exit
    }

    /// Keys still present on the grid, in placement order.
    #[must_use]
    pub fn keys(&self) -> &[Cell] {
        &self.keys
    }

    /// Number of keys the grid was generated with, regardless of how
    /// many interactive play has consumed since.
    #[must_use]
    pub const fn total_keys_placed(&self) -> usize {
        self.total_keys_placed
    }

    /// Reports whether the cell is a wall. Out-of-range cells are
    /// walls.
    #[must_use]
    pub fn is_wall(&self, cell: Cell) -> bool {
        match self.index(cell) {
            Some(index) => self.cells[index] == CellKind::Wall,
            None => true,
        }
    }

    /// Reports whether an uncollected key lies on the cell.
    #[must_use]
    pub fn is_key(&self, cell: Cell) -> bool {
        self.keys.contains(&cell)
    }

    /// Reports whether the cell is a mud puddle.
    #[must_use]
    pub fn is_mud(&self, cell: Cell) -> bool {
        self.mud.contains(&cell)
    }

    /// Reports whether the cell is part of a water slide.
    #[must_use]
    pub fn is_water(&self, cell: Cell) -> bool {
        self.water.contains(&cell)
    }

    /// Reports whether the cell is a portal endpoint.
    #[must_use]
    pub fn is_portal(&self, cell: Cell) -> bool {
        self.portals.contains_key(&cell)
    }

    /// Paired cell of the portal at `cell`, if one exists.
    #[must_use]
    pub fn portal_target(&self, cell: Cell) -> Option<Cell> {
        self.portals.get(&cell).map(|link| link.target)
    }

    /// Portal pair identifier at `cell`, if one exists.
    #[must_use]
    pub fn portal_pair(&self, cell: Cell) -> Option<u32> {
        self.portals.get(&cell).map(|link| link.pair)
    }

    /// Removes the key at `cell`, reporting whether one was present.
    ///
    /// Used only by interactive play; solvers never mutate the grid.
    pub fn remove_key(&mut self, cell: Cell) -> bool {
        match self.keys.iter().position(|key| *key == cell) {
            Some(index) => {
                let _ = self.keys.remove(index);
                true
            }
            None => false,
        }
    }

    /// Parses an ASCII layout into a grid, for fixtures and tooling.
    ///
    /// Alphabet: `#` wall, `.` path, `S` start, `E` exit, `K` key,
    /// `M` mud, `~` water, and digits `1`–`4` for portal pair ends.
    pub fn from_layout(rows: &[&str]) -> Result<Self, LayoutError> {
        let height = rows.len();
        let width = rows.first().map_or(0, |row| row.chars().count());
        if height == 0 || width == 0 {
            return Err(LayoutError::Empty);
        }

        let mut grid = Self {
            width: width as i32,
            height: height as i32,
            cells: vec![CellKind::Path; width * height],
            start: Cell::new(0, 0),
            exit: Cell::new(0, 0),
            keys: Vec::new(),
            total_keys_placed: 0,
            mud: HashSet::new(),
            water: HashSet::new(),
            portals: HashMap::new(),
        };

        let mut start = None;
        let mut exit = None;
        let mut portal_ends: HashMap<u32, Vec<Cell>> = HashMap::new();

        for (y, row) in rows.iter().enumerate() {
            let found = row.chars().count();
            if found != width {
                return Err(LayoutError::RaggedRow {
                    row: y,
                    found,
                    expected: width,
                });
            }
            for (x, symbol) in row.chars().enumerate() {
                let cell = Cell::new(x as i32, y as i32);
                match symbol {
                    '#' => grid.cells[y * width + x] = CellKind::Wall,
                    '.' => {}
                    'S' => start = Some(cell),
                    'E' => exit = Some(cell),
                    'K' => grid.keys.push(cell),
                    'M' => {
                        let _ = grid.mud.insert(cell);
                    }
                    '~' => {
                        let _ = grid.water.insert(cell);
                    }
                    '1'..='4' => {
                        let pair = symbol.to_digit(10).unwrap_or(0);
                        portal_ends.entry(pair).or_default().push(cell);
                    }
                    other => {
                        return Err(LayoutError::UnknownSymbol {
                            symbol: other,
                            x: cell.x(),
                            y: cell.y(),
                        })
                    }
                }
            }
        }

        grid.start = start.ok_or(LayoutError::MissingStart)?;
        grid.exit = exit.ok_or(LayoutError::MissingExit)?;

        let mut pairs: Vec<_> = portal_ends.into_iter().collect();
        pairs.sort_by_key(|(pair, _)| *pair);
        for (pair, ends) in pairs {
            if ends.len() != 2 {
                return Err(LayoutError::UnpairedPortal {
                    pair,
                    count: ends.len(),
                });
            }
            grid.link_portals(pair, ends[0], ends[1]);
        }

        grid.total_keys_placed = grid.keys.len();
        Ok(grid)
    }

    pub(crate) fn index(&self, cell: Cell) -> Option<usize> {
        if cell.x() < 0 || cell.y() < 0 || cell.x() >= self.width || cell.y() >= self.height {
            return None;
        }
        Some(cell.y() as usize * self.width as usize + cell.x() as usize)
    }

    pub(crate) fn new_walled(width: i32, height: i32, start: Cell, exit: Cell) -> Self {
        let cell_count = (width.max(0) as usize) * (height.max(0) as usize);
        Self {
            width,
            height,
            cells: vec![CellKind::Wall; cell_count],
            start,
            exit,
            keys: Vec::new(),
            total_keys_placed: 0,
            mud: HashSet::new(),
            water: HashSet::new(),
            portals: HashMap::new(),
        }
    }

    pub(crate) fn carve(&mut self, cell: Cell) {
        if let Some(index) = self.index(cell) {
            self.cells[index] = CellKind::Path;
        }
    }

    pub(crate) fn link_portals(&mut self, pair: u32, first: Cell, second: Cell) {
        let _ = self.portals.insert(
            first,
            PortalLink {
                pair,
                target: second,
            },
        );
        let _ = self.portals.insert(
            second,
            PortalLink {
                pair,
                target: first,
            },
        );
    }

    pub(crate) fn add_water(&mut self, cell: Cell) {
        let _ = self.water.insert(cell);
    }

    pub(crate) fn add_mud(&mut self, cell: Cell) {
        let _ = self.mud.insert(cell);
    }

    pub(crate) fn add_key(&mut self, cell: Cell) {
        self.keys.push(cell);
    }

    pub(crate) fn finish_placement(&mut self) {
        self.total_keys_placed = self.keys.len();
    }
}

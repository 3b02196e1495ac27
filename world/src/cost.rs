//! Cost model: resolves raw orthogonal steps into effective moves.

use keymaze_core::{Cell, Direction, EffectiveMove};

use crate::{TerrainGrid, MUD_COST, PORTAL_COST, SLIDE_CELL_COST};

impl TerrainGrid {
    /// Resolves the four raw orthogonal steps from `cell` into their
    /// effective destinations and costs.
    ///
    /// Base cost is 1 per step; mud replaces it with [`MUD_COST`].
    /// Stepping onto water slides along the entry direction through
    /// contiguous water until a wall or dry cell terminates the chain,
    /// charging [`SLIDE_CELL_COST`] per cell slid. Stepping onto a dry
    /// portal teleports to its paired cell for [`PORTAL_COST`] extra.
    /// Effects never cascade: a slide landing on a portal, or a portal
    /// exit on water, resolves no further.
    ///
    /// The resolution is pure with respect to collected keys.
    #[must_use]
    pub fn effective_moves(&self, cell: Cell) -> Vec<EffectiveMove> {
        let mut moves = Vec::with_capacity(4);
        for direction in Direction::ALL {
            let neighbor = cell.step(direction);
            if self.is_wall(neighbor) {
                continue;
            }

            let entry_cost = if self.is_mud(neighbor) { MUD_COST } else { 1 };

            if self.is_water(neighbor) {
                let (landing, cells_slid) = self.slide_endpoint(neighbor, direction);
                moves.push(EffectiveMove {
                    destination: landing,
                    cost: entry_cost + cells_slid * SLIDE_CELL_COST,
                });
            } else if let Some(target) = self.portal_target(neighbor) {
                moves.push(EffectiveMove {
                    destination: target,
                    cost: entry_cost + PORTAL_COST,
                });
            } else {
                moves.push(EffectiveMove {
                    destination: neighbor,
                    cost: entry_cost,
                });
            }
        }
        moves
    }

    /// Walks a slide chain entered at `entry` travelling `direction`,
    /// returning the landing cell and the number of cells slid.
    ///
    /// The chain ends on the last water cell when a wall blocks the
    /// way, or on the first dry cell past the water otherwise.
    #[must_use]
    pub fn slide_endpoint(&self, entry: Cell, direction: Direction) -> (Cell, u32) {
        let mut current = entry;
        let mut cells_slid = 0;
        loop {
            let ahead = current.step(direction);
            if self.is_wall(ahead) {
                return (current, cells_slid);
            }
            if !self.is_water(ahead) {
                return (ahead, cells_slid + 1);
            }
            current = ahead;
            cells_slid += 1;
        }
    }

    /// Re-prices a realized path by resolving every consecutive hop
    /// through [`TerrainGrid::effective_moves`], taking the cheapest
    /// resolution when several moves share a destination.
    ///
    /// Returns `None` when some hop is not a resolvable move.
    #[must_use]
    pub fn path_cost(&self, path: &[Cell]) -> Option<u64> {
        let mut total = 0u64;
        for pair in path.windows(2) {
            let cost = self
                .effective_moves(pair[0])
                .into_iter()
                .filter(|step| step.destination == pair[1])
                .map(|step| step.cost)
                .min()?;
            total += u64::from(cost);
        }
        Some(total)
    }

    /// Prices an accumulated-move path counting only mud: 1 per hop,
    /// [`MUD_COST`] when the hop enters mud. Slides and portals are
    /// not re-priced here; this matches the realized-path semantics of
    /// the annealing and beam strategies.
    #[must_use]
    pub fn mud_aware_cost(&self, path: &[Cell]) -> u64 {
        path.iter()
            .skip(1)
            .map(|cell| {
                if self.is_mud(*cell) {
                    u64::from(MUD_COST)
                } else {
                    1
                }
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corridor_with_slide() -> TerrainGrid {
        TerrainGrid::from_layout(&[
            "########", //
            "#S~~~.E#", //
            "########",
        ])
        .expect("layout parses")
    }

    #[test]
    fn slide_chain_carries_to_first_dry_cell() {
        let grid = corridor_with_slide();
        let moves = grid.effective_moves(grid.start());

        // East enters the chain at (2,1) and slides to the dry (5,1).
        assert_eq!(
            moves,
            vec![EffectiveMove {
                destination: Cell::new(5, 1),
                cost: 1 + 3 * SLIDE_CELL_COST,
            }]
        );
    }

    #[test]
    fn slide_chain_stops_on_last_water_cell_before_a_wall() {
        let grid = TerrainGrid::from_layout(&[
            "######", //
            "#S~~~#", //
            "#...E#", //
            "######",
        ])
        .expect("layout parses");

        let moves = grid.effective_moves(grid.start());
        let east = moves
            .iter()
            .find(|step| step.destination == Cell::new(4, 1))
            .expect("east slide resolves");
        assert_eq!(east.cost, 1 + 2 * SLIDE_CELL_COST);
    }

    #[test]
    fn portal_step_lands_on_paired_cell() {
        let grid = TerrainGrid::from_layout(&[
            "#######", //
            "#S1..E#", //
            "#...1.#", //
            "#######",
        ])
        .expect("layout parses");

        let moves = grid.effective_moves(grid.start());
        let teleport = moves
            .iter()
            .find(|step| step.destination == Cell::new(4, 2))
            .expect("portal resolves to its pair");
        assert_eq!(teleport.cost, 1 + PORTAL_COST);
    }

    #[test]
    fn mud_replaces_the_base_step_cost() {
        let grid = TerrainGrid::from_layout(&[
            "#####", //
            "#SME#", //
            "#####",
        ])
        .expect("layout parses");

        let moves = grid.effective_moves(grid.start());
        assert_eq!(
            moves,
            vec![EffectiveMove {
                destination: Cell::new(2, 1),
                cost: MUD_COST,
            }]
        );
    }

    #[test]
    fn effects_do_not_cascade_past_a_slide_landing() {
        // The slide lands on a portal cell; the landing must not
        // teleport again.
        let grid = TerrainGrid::from_layout(&[
            "########", //
            "#S~~1.E#", //
            "#..1...#", //
            "########",
        ])
        .expect("layout parses");

        let moves = grid.effective_moves(grid.start());
        let east = moves
            .iter()
            .find(|step| step.destination == Cell::new(4, 1))
            .expect("slide lands on the portal cell itself");
        assert_eq!(east.cost, 1 + 2 * SLIDE_CELL_COST);
    }

    #[test]
    fn path_cost_reprices_resolved_hops() {
        let grid = TerrainGrid::from_layout(&[
            "#####", //
            "#SME#", //
            "#####",
        ])
        .expect("layout parses");

        let path = [Cell::new(1, 1), Cell::new(2, 1), Cell::new(3, 1)];
        assert_eq!(grid.path_cost(&path), Some(u64::from(MUD_COST) + 1));
        assert_eq!(grid.mud_aware_cost(&path), u64::from(MUD_COST) + 1);

        let broken = [Cell::new(1, 1), Cell::new(3, 1)];
        assert_eq!(grid.path_cost(&broken), None);
    }
}

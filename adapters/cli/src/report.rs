use keymaze_core::Cell;
use keymaze_world::TerrainGrid;
use serde::Serialize;

/// Summary of one solve run, printable as text or JSON.
#[derive(Debug, Serialize)]
pub(crate) struct RunReport<'a> {
    /// Strategy that produced the run.
    pub strategy: &'static str,
    /// Seed shared by generation and the randomized strategies.
    pub seed: u64,
    /// Grid width in cells.
    pub width: i32,
    /// Grid height in cells.
    pub height: i32,
    /// Keys the generator placed.
    pub keys_placed: usize,
    /// Whether a complete run was found.
    pub found: bool,
    /// Hops along the winning path, zero on failure.
    pub steps: usize,
    /// Realized terrain cost of the run.
    pub total_cost: f64,
    /// Search effort in the strategy's own units.
    pub nodes_expanded: u64,
    /// Visualize calls consumed, present only for stepped runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visualize_steps: Option<u64>,
    /// Rendered grid, present only when a map was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,
    /// Cells of the winning path, start and exit inclusive.
    pub path: &'a [Cell],
}

impl RunReport<'_> {
    /// Formats the report as the human-readable summary block.
    pub(crate) fn to_text(&self) -> String {
        let mut lines = vec![
            format!("strategy: {}", self.strategy),
            format!(
                "grid: {}x{}, {} keys, seed {}",
                self.width, self.height, self.keys_placed, self.seed
            ),
        ];
        if self.found {
            lines.push(format!(
                "result: found, {} steps, cost {}, {} nodes expanded",
                self.steps, self.total_cost, self.nodes_expanded
            ));
        } else {
            lines.push(format!(
                "result: no path found, {} nodes expanded",
                self.nodes_expanded
            ));
        }
        if let Some(cycles) = self.visualize_steps {
            lines.push(format!("stepped: {cycles} visualize calls"));
        }
        if let Some(map) = &self.map {
            lines.push(map.clone());
        }
        lines.join("\n")
    }
}

/// Renders the grid as ASCII with the result path overlaid as `*`.
///
/// Uses the same alphabet `TerrainGrid::from_layout` accepts, so a
/// rendered grid without a path overlay parses back.
pub(crate) fn render_map(grid: &TerrainGrid, path: &[Cell]) -> String {
    let mut out = String::new();
    for y in 0..grid.height() {
        for x in 0..grid.width() {
            let cell = Cell::new(x, y);
            let symbol = if grid.is_wall(cell) {
                '#'
            } else if cell == grid.start() {
                'S'
            } else if cell == grid.exit() {
                'E'
            } else if path.contains(&cell) {
                '*'
            } else if grid.is_key(cell) {
                'K'
            } else if let Some(pair) = grid.portal_pair(cell) {
                char::from_digit(pair + 1, 10).unwrap_or('?')
            } else if grid.is_mud(cell) {
                'M'
            } else if grid.is_water(cell) {
                '~'
            } else {
                '.'
            };
            out.push(symbol);
        }
        if y + 1 < grid.height() {
            out.push('\n');
        }
    }
    out
}

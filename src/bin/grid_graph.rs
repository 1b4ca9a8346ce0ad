//! Writes a rectangular street grid in the graph JSON format.
//!
//! Usage: `grid_graph <cols> <rows> [spacing] [output]`. Neighbouring
//! intersections are joined by a street in each direction.

use anyhow::{bail, Context};
use streetsim::domains::streets::GraphData;

fn grid(cols: i64, rows: i64, spacing: f64) -> GraphData {
    let mut data = GraphData::default();
    let id = |col: i64, row: i64| row * cols + col;
    for row in 0..rows {
        for col in 0..cols {
            data.vertex(id(col, row), col as f64 * spacing, row as f64 * spacing);
        }
    }
    for row in 0..rows {
        for col in 0..cols {
            if col + 1 < cols {
                data.edge(id(col, row), id(col + 1, row), spacing)
                    .edge(id(col + 1, row), id(col, row), spacing);
            }
            if row + 1 < rows {
                data.edge(id(col, row), id(col, row + 1), spacing)
                    .edge(id(col, row + 1), id(col, row), spacing);
            }
        }
    }
    data
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 {
        bail!("usage: grid_graph <cols> <rows> [spacing] [output]");
    }
    let cols: i64 = args[0].parse().context("cols must be an integer")?;
    let rows: i64 = args[1].parse().context("rows must be an integer")?;
    let spacing: f64 = match args.get(2) {
        Some(s) => s.parse().context("spacing must be a number")?,
        None => 10.0,
    };
    if cols < 1 || rows < 1 || !(spacing > 0.0) {
        bail!("grid needs at least one column and row and a positive spacing");
    }

    let json = serde_json::to_string_pretty(&grid(cols, rows, spacing))?;
    match args.get(3) {
        Some(path) => std::fs::write(path, json).with_context(|| format!("writing {}", path))?,
        None => println!("{}", json),
    }
    Ok(())
}

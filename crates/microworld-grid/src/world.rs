use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Token for a cell with nothing in it.
pub const EMPTY_CELL: &str = ".";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldError {
    #[error("grid must be non-empty")]
    EmptyGrid,
    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        found: usize,
        expected: usize,
    },
    #[error("declared size {declared_w}x{declared_h} does not match grid {actual_w}x{actual_h}")]
    SizeMismatch {
        declared_w: usize,
        declared_h: usize,
        actual_w: usize,
        actual_h: usize,
    },
    #[error("agent position {0} is outside the grid")]
    AgentOutOfBounds(Position),
}

/// Grid coordinate. `x` is the column, `y` the row; north is `y - 1`.
///
/// Serialized as a `[x, y]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i64; 2]", into = "[i64; 2]")]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

impl Position {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

impl From<[i64; 2]> for Position {
    fn from([x, y]: [i64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Position> for [i64; 2] {
    fn from(p: Position) -> Self {
        [p.x, p.y]
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "north" => Some(Self::North),
            "south" => Some(Self::South),
            "east" => Some(Self::East),
            "west" => Some(Self::West),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::North => "north",
            Self::South => "south",
            Self::East => "east",
            Self::West => "west",
        }
    }

    pub fn unit(self) -> (i64, i64) {
        match self {
            Self::North => (0, -1),
            Self::South => (0, 1),
            Self::East => (1, 0),
            Self::West => (-1, 0),
        }
    }
}

/// Mutable state of one grid microworld.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    pub grid: Vec<Vec<String>>,
    pub agent_position: Position,
    pub width: usize,
    pub height: usize,
    #[serde(default)]
    pub inventory: Vec<String>,
}

impl WorldState {
    /// Build from a grid, deriving width and height from it.
    pub fn new(grid: Vec<Vec<String>>, agent_position: Position) -> Result<Self, WorldError> {
        let height = grid.len();
        let width = grid.first().map_or(0, Vec::len);
        Self::from_parts(grid, agent_position, width, height)
    }

    /// An all-empty `width` x `height` grid.
    pub fn open(width: usize, height: usize, agent_position: Position) -> Result<Self, WorldError> {
        let grid = vec![vec![EMPTY_CELL.to_string(); width]; height];
        Self::new(grid, agent_position)
    }

    pub fn from_parts(
        grid: Vec<Vec<String>>,
        agent_position: Position,
        width: usize,
        height: usize,
    ) -> Result<Self, WorldError> {
        let actual_h = grid.len();
        let actual_w = grid.first().map_or(0, Vec::len);
        if actual_h == 0 || actual_w == 0 {
            return Err(WorldError::EmptyGrid);
        }
        if let Some((row, cells)) = grid.iter().enumerate().find(|(_, r)| r.len() != actual_w) {
            return Err(WorldError::RaggedRow {
                row,
                found: cells.len(),
                expected: actual_w,
            });
        }
        if (width, height) != (actual_w, actual_h) {
            return Err(WorldError::SizeMismatch {
                declared_w: width,
                declared_h: height,
                actual_w,
                actual_h,
            });
        }
        let state = Self {
            grid,
            agent_position,
            width,
            height,
            inventory: Vec::new(),
        };
        if !state.in_bounds(agent_position) {
            return Err(WorldError::AgentOutOfBounds(agent_position));
        }
        Ok(state)
    }

    pub fn in_bounds(&self, p: Position) -> bool {
        p.x >= 0 && p.y >= 0 && (p.x as usize) < self.width && (p.y as usize) < self.height
    }

    /// Clamp a coordinate into `[0, width-1] x [0, height-1]`.
    pub fn clamp(&self, p: Position) -> Position {
        Position {
            x: p.x.clamp(0, self.width as i64 - 1),
            y: p.y.clamp(0, self.height as i64 - 1),
        }
    }

    pub fn cell(&self, p: Position) -> Option<&str> {
        if !self.in_bounds(p) {
            return None;
        }
        self.grid
            .get(p.y as usize)?
            .get(p.x as usize)
            .map(String::as_str)
    }

    pub fn cell_mut(&mut self, p: Position) -> Option<&mut String> {
        if !self.in_bounds(p) {
            return None;
        }
        self.grid.get_mut(p.y as usize)?.get_mut(p.x as usize)
    }

    /// Text rendering with `A` on the agent's cell, one row per line.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity((self.width * 2 + 1) * self.height);
        for (y, row) in self.grid.iter().enumerate() {
            let line: Vec<&str> = row
                .iter()
                .enumerate()
                .map(|(x, cell)| {
                    if Position::new(x as i64, y as i64) == self.agent_position {
                        "A"
                    } else {
                        cell.as_str()
                    }
                })
                .collect();
            out.push_str(&line.join(" "));
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_serializes_as_pair() {
        let json = serde_json::to_string(&Position::new(2, 1)).unwrap();
        assert_eq!(json, "[2,1]");
        let back: Position = serde_json::from_str("[0,3]").unwrap();
        assert_eq!(back, Position::new(0, 3));
    }

    #[test]
    fn rejects_ragged_rows_and_bad_positions() {
        let grid = vec![vec![".".to_string(); 3], vec![".".to_string(); 2]];
        assert!(matches!(
            WorldState::new(grid, Position::new(0, 0)),
            Err(WorldError::RaggedRow { row: 1, .. })
        ));
        assert!(matches!(
            WorldState::open(3, 3, Position::new(3, 0)),
            Err(WorldError::AgentOutOfBounds(_))
        ));
    }

    #[test]
    fn render_marks_agent() {
        let world = WorldState::open(3, 2, Position::new(1, 0)).unwrap();
        assert_eq!(world.render(), ". A .\n. . .\n");
    }
}

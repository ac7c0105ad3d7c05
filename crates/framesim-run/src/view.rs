//! ASCII plot of the `root` topic.
//!
//! Records routed to `root` that carry `longitude`, `latitude` (f64) and
//! `ForceSideID` (u16) are drawn; anything else is skipped. The plot keeps
//! growing its bounds across draws so positions stay comparable.

use std::fmt::Write as _;

use framesim_runtime::{Record, Value};

/// Widest plot, in columns.
pub const MAX_COLUMNS: usize = 150;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    /// Halted or destroyed
    pub down: bool,
    pub side: u16,
    pub longitude: f64,
    pub latitude: f64,
}

impl Marker {
    pub fn from_record(record: &Record) -> Option<Self> {
        let longitude = record.get("longitude")?.extract().ok()?;
        let latitude = record.get("latitude")?.extract().ok()?;
        let side = record.get("ForceSideID")?.extract().ok()?;
        let down = match record.get("State") {
            Some(Value::U16(state)) => *state == 3,
            Some(Value::String(state)) => state == "halted" || state == "destroyed",
            _ => false,
        };
        Some(Self {
            down,
            side,
            longitude,
            latitude,
        })
    }

    fn glyph(&self) -> char {
        if self.down {
            'x'
        } else if self.side == 1 {
            '*'
        } else {
            'o'
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Bounds {
    x_lower: f64,
    x_upper: f64,
    y_lower: f64,
    y_upper: f64,
}

#[derive(Debug, Default)]
pub struct Plot {
    bounds: Option<Bounds>,
    markers: Vec<Marker>,
}

impl Plot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, marker: Marker) {
        let (lon, lat) = (marker.longitude, marker.latitude);
        let b = self.bounds.get_or_insert(Bounds {
            x_lower: lon,
            x_upper: lon,
            y_lower: lat,
            y_upper: lat,
        });
        let x_edge = 0.2 * (b.x_upper - b.x_lower) + 0.0001;
        let y_edge = 0.2 * (b.y_upper - b.y_lower) + 0.0001;
        b.x_lower = b.x_lower.min(lon - x_edge);
        b.x_upper = b.x_upper.max(lon + x_edge);
        b.y_lower = b.y_lower.min(lat - y_edge);
        b.y_upper = b.y_upper.max(lat + y_edge);
        self.markers.push(marker);
    }

    /// Add every drawable record; returns how many were drawable.
    pub fn add_records<'a>(&mut self, records: impl IntoIterator<Item = &'a Record>) -> usize {
        let mut added = 0;
        for marker in records.into_iter().filter_map(Marker::from_record) {
            self.add(marker);
            added += 1;
        }
        added
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Render `lines` rows and forget the markers. Empty before the first marker.
    pub fn render(&mut self, lines: usize) -> String {
        let Some(b) = self.bounds else {
            return String::new();
        };
        let lines = lines.max(1);
        let width = b.x_upper - b.x_lower;
        let height = b.y_upper - b.y_lower;
        let columns = ((width / height * lines as f64 / 2.0).ceil() as usize).clamp(1, MAX_COLUMNS);
        let x_step = width / columns as f64;
        let y_step = height / lines as f64;

        let mut grid = vec![vec![' '; columns]; lines];
        for marker in self.markers.drain(..) {
            let row = ((b.y_upper - marker.latitude) / y_step).floor();
            let col = ((marker.longitude - b.x_lower) / x_step).floor();
            if row < 0.0 || col < 0.0 {
                continue;
            }
            let (row, col) = ((row as usize).min(lines - 1), (col as usize).min(columns - 1));
            grid[row][col] = marker.glyph();
        }

        let border = "-".repeat(columns + 2);
        let mut out = String::new();
        let _ = writeln!(out, "{border}");
        for row in grid {
            let _ = writeln!(out, "|{}|", row.into_iter().collect::<String>());
        }
        let _ = writeln!(out, "{border}");
        out
    }
}

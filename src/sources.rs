// src/sources.rs
//! Host data the evaluator reads: spreadsheet-like tables, global
//! parameters, and the clock.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, FixedOffset, Local, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::context::Language;
use crate::errors::Result;
use crate::sestring::SeString;

/// One cell of a data table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "CellRepr")]
pub enum Cell {
    Bool(bool),
    SeString(SeString),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::SeString(s) => write!(f, "{s}"),
            Cell::Int(v) => write!(f, "{v}"),
            Cell::UInt(v) => write!(f, "{v}"),
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

// JSON shape of a cell: strings are styled strings holding plain text,
// `{"hex": ".."}` is an encoded styled string.
#[derive(Deserialize)]
#[serde(untagged)]
enum CellRepr {
    Bool(bool),
    UInt(u64),
    Int(i64),
    Float(f64),
    Text(String),
    Encoded { hex: String },
}

impl TryFrom<CellRepr> for Cell {
    type Error = String;

    fn try_from(repr: CellRepr) -> std::result::Result<Self, Self::Error> {
        Ok(match repr {
            CellRepr::Bool(b) => Cell::Bool(b),
            CellRepr::UInt(v) => Cell::UInt(v),
            CellRepr::Int(v) => Cell::Int(v),
            CellRepr::Float(v) => Cell::Float(v),
            CellRepr::Text(s) => Cell::SeString(SeString::text(&s)),
            CellRepr::Encoded { hex } => {
                Cell::SeString(SeString::from_hex(&hex).map_err(|e| e.to_string())?)
            }
        })
    }
}

/// Foreground and glow colors of a UI color row, packed RGBA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct UiColor {
    pub foreground: u32,
    pub glow: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MapInfo {
    pub size_factor: u16,
    pub offset_x: i16,
    pub offset_y: i16,
}

/// A placed object: world position, owning map and the map's place name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Level {
    pub x: f32,
    pub z: f32,
    pub map: MapInfo,
    pub place_name: SeString,
}

pub trait SheetSource: Send + Sync {
    fn get_cell(&self, sheet: &str, language: Language, row_id: u32, column: u32) -> Option<Cell>;

    fn ui_color(&self, _row_id: u32) -> Option<UiColor> {
        None
    }

    fn level(&self, _language: Language, _row_id: u32) -> Option<Level> {
        None
    }
}

type Table = HashMap<String, HashMap<u32, Vec<Cell>>>;

/// In-memory tables, loadable from JSON.
///
/// ```json
/// {
///   "sheets": { "Item": { "1": ["Potion", 10, true] } },
///   "languages": { "german": { "Item": { "1": ["Trank"] } } },
///   "ui_colors": { "3": { "foreground": 4278190335, "glow": 255 } }
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MemorySheets {
    sheets: Table,
    languages: HashMap<Language, Table>,
    ui_colors: HashMap<u32, UiColor>,
    levels: HashMap<u32, Level>,
}

impl MemorySheets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn insert_row(&mut self, sheet: &str, row_id: u32, cells: Vec<Cell>) -> &mut Self {
        self.sheets
            .entry(sheet.to_string())
            .or_default()
            .insert(row_id, cells);
        self
    }

    pub fn insert_localized_row(
        &mut self,
        language: Language,
        sheet: &str,
        row_id: u32,
        cells: Vec<Cell>,
    ) -> &mut Self {
        self.languages
            .entry(language)
            .or_default()
            .entry(sheet.to_string())
            .or_default()
            .insert(row_id, cells);
        self
    }

    pub fn insert_ui_color(&mut self, row_id: u32, color: UiColor) -> &mut Self {
        self.ui_colors.insert(row_id, color);
        self
    }

    pub fn insert_level(&mut self, row_id: u32, level: Level) -> &mut Self {
        self.levels.insert(row_id, level);
        self
    }

    fn lookup<'t>(table: &'t Table, sheet: &str, row_id: u32, column: u32) -> Option<&'t Cell> {
        table.get(sheet)?.get(&row_id)?.get(column as usize)
    }
}

impl SheetSource for MemorySheets {
    fn get_cell(&self, sheet: &str, language: Language, row_id: u32, column: u32) -> Option<Cell> {
        self.languages
            .get(&language)
            .and_then(|t| Self::lookup(t, sheet, row_id, column))
            .or_else(|| Self::lookup(&self.sheets, sheet, row_id, column))
            .cloned()
    }

    fn ui_color(&self, row_id: u32) -> Option<UiColor> {
        self.ui_colors.get(&row_id).copied()
    }

    fn level(&self, _language: Language, row_id: u32) -> Option<Level> {
        let level = self.levels.get(&row_id)?;
        if level.map.size_factor == 0 {
            warn!(row_id, "level row references a map with zero size factor");
            return None;
        }
        Some(level.clone())
    }
}

/// A global parameter slot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum GlobalParam {
    Integer(i32),
    WideString(String),
    #[serde(skip)]
    NarrowString(SeString),
    Uninitialized,
}

pub trait GlobalParameters: Send + Sync {
    /// `None` when `index` is out of range.
    fn get(&self, index: u32) -> Option<GlobalParam>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Global parameters as a JSON array: numbers, strings or `null`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct MemoryGlobals(Vec<GlobalParam>);

impl MemoryGlobals {
    pub fn new(values: Vec<GlobalParam>) -> Self {
        Self(values)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl GlobalParameters for MemoryGlobals {
    fn get(&self, index: u32) -> Option<GlobalParam> {
        self.0.get(index as usize).cloned()
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}

pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;

    fn to_local(&self, utc: DateTime<Utc>) -> DateTime<FixedOffset>;

    fn now_local(&self) -> DateTime<FixedOffset> {
        self.to_local(self.now_utc())
    }
}

/// Wall clock in the machine's time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn to_local(&self, utc: DateTime<Utc>) -> DateTime<FixedOffset> {
        utc.with_timezone(&Local).fixed_offset()
    }
}

/// A frozen instant at a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    pub now: DateTime<Utc>,
    pub offset: FixedOffset,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self { now, offset }
    }
}

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.now
    }

    fn to_local(&self, utc: DateTime<Utc>) -> DateTime<FixedOffset> {
        utc.with_timezone(&self.offset)
    }
}

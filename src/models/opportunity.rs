use serde::{Deserialize, Serialize};

/// A located occurrence of a known inefficiency pattern. Owned by the run
/// that discovered it; immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Opportunity {
    pub id: String,
    pub run_id: String,
    pub pattern_kind: PatternKind,
    pub file_path: String,
    pub start_line: i64,
    pub start_col: i64,
    pub end_line: i64,
    pub end_col: i64,
    pub confidence: f64,
    pub snippet: String,
}

/// Source location, 1-based lines and columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Span {
    pub fn line(line: u32, start_col: u32, end_col: u32) -> Self {
        Self {
            start_line: line,
            start_col,
            end_line: line,
            end_col,
        }
    }
}

/// Catalog of detectable inefficiency patterns. The registry is open for
/// extension; a new kind needs a matcher registration but no scanner change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    SetMembership,
    JsonParseCache,
    LoopStringConcat,
    LoopArrayFind,
    LoopSpread,
    LoopRegexConstruction,
    SyncIoInHandler,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SetMembership => "set_membership",
            Self::JsonParseCache => "json_parse_cache",
            Self::LoopStringConcat => "loop_string_concat",
            Self::LoopArrayFind => "loop_array_find",
            Self::LoopSpread => "loop_spread",
            Self::LoopRegexConstruction => "loop_regex_construction",
            Self::SyncIoInHandler => "sync_io_in_handler",
        }
    }
}

use polars::prelude::DataFrame;

pub const DEFAULT_KEY: &str = "person_id";
pub const DEFAULT_SCORES_COLUMN: &str = "scores";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinMode {
    #[default]
    Inner,
    Left,
}

impl JoinMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinMode::Inner => "inner",
            JoinMode::Left => "left",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delimiter {
    #[default]
    Auto,
    Comma,
    Tab,
    Space,
}

impl Delimiter {
    pub fn byte(&self) -> Option<u8> {
        match self {
            Delimiter::Auto => None,
            Delimiter::Comma => Some(b','),
            Delimiter::Tab => Some(b'\t'),
            Delimiter::Space => Some(b' '),
        }
    }
}

/// How a single delimited input file is laid out.
#[derive(Debug, Clone, Default)]
pub struct TableFormat {
    pub delimiter: Delimiter,
    pub has_header: bool,
    pub names: Option<Vec<String>>,
}

impl TableFormat {
    pub fn with_header() -> Self {
        Self {
            delimiter: Delimiter::Auto,
            has_header: true,
            names: None,
        }
    }
}

/// A participant-indexed table. Every column holds raw strings; `name` is
/// only used to label diagnostics.
#[derive(Debug, Clone)]
pub struct ParticipantTable {
    pub name: String,
    pub df: DataFrame,
}

impl ParticipantTable {
    pub fn new(name: impl Into<String>, df: DataFrame) -> Self {
        Self {
            name: name.into(),
            df,
        }
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.df.column(name).is_ok()
    }
}

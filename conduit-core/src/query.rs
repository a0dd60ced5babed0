use crate::{CommandKind, Error, NameComparison, Result, Value};
use std::sync::Arc;

/// Metadata about modify operations (INSERT/UPDATE/DELETE).
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowsAffected {
    pub rows_affected: u64,
    pub last_affected_id: Option<i64>,
}

/// Shared reference-counted column name list.
pub type RowNames = Arc<[String]>;
/// Owned row value slice matching `RowNames` positions.
pub type Row = Box<[Value]>;

/// Row with column labels.
#[derive(Debug, Clone, PartialEq)]
pub struct RowLabeled {
    /// Column names
    pub labels: RowNames,
    /// Values aligned with labels
    pub values: Row,
}

impl RowLabeled {
    pub fn new(labels: RowNames, values: Row) -> Self {
        Self { labels, values }
    }

    pub fn names(&self) -> &[String] {
        &self.labels
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Position of the column named `name`, compared case insensitively.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.labels
            .iter()
            .position(|v| NameComparison::CaseInsensitive.eq(v, name))
    }

    /// Value of the column named `name`, compared case insensitively.
    pub fn get_column(&self, name: &str) -> Option<&Value> {
        self.position(name).and_then(|i| self.values.get(i))
    }

    pub fn into_values(self) -> Row {
        self.values
    }
}

/// Fully read result of a reader command, rows in source order.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct RowSet {
    pub labels: RowNames,
    pub rows: Vec<Row>,
}

impl RowSet {
    pub fn new(labels: RowNames) -> Self {
        Self {
            labels,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn labeled(&self) -> impl Iterator<Item = RowLabeled> + '_ {
        self.rows
            .iter()
            .map(|r| RowLabeled::new(self.labels.clone(), r.clone()))
    }

    pub fn into_labeled(self) -> impl Iterator<Item = RowLabeled> {
        let labels = self.labels;
        self.rows
            .into_iter()
            .map(move |r| RowLabeled::new(labels.clone(), r))
    }
}

/// What an execution token hands to the materializer.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResult {
    Affected(RowsAffected),
    Rows(RowSet),
}

impl RawResult {
    pub fn row_count(&self) -> usize {
        match self {
            RawResult::Affected(..) => 0,
            RawResult::Rows(rows) => rows.len(),
        }
    }
}

impl From<RowsAffected> for RawResult {
    fn from(value: RowsAffected) -> Self {
        RawResult::Affected(value)
    }
}

impl From<RowSet> for RawResult {
    fn from(value: RowSet) -> Self {
        RawResult::Rows(value)
    }
}

/// Named parameter with the marker the dialect wrote for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Name used to bind (column name, procedure argument or raw SQL key).
    pub name: String,
    /// Marker as it appears in the command text (`@name`, `$1`, `?`).
    pub marker: String,
    pub value: Value,
}

/// Command text plus parameters in binding order, ready for an execution token.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledCommand {
    pub text: String,
    pub parameters: Vec<Parameter>,
    pub kind: CommandKind,
}

impl CompiledCommand {
    pub fn parameter(&self, name: &str) -> Result<&Parameter> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::InvalidOperation(format!("No parameter named `{}`", name)))
    }
}

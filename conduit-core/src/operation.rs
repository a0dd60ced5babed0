use crate::{ObjectName, Shape, Value};
use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Query,
    Insert,
    Update,
    Delete,
    StoredProcedure,
    RawSql,
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationKind::Query => "Query",
            OperationKind::Insert => "Insert",
            OperationKind::Update => "Update",
            OperationKind::Delete => "Delete",
            OperationKind::StoredProcedure => "Procedure",
            OperationKind::RawSql => "Sql",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OperationTarget {
    Object(ObjectName),
    Sql(String),
}

/// Row limiting requested for a query.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Limit {
    #[default]
    None,
    /// Deterministic window: skip `skip` rows then return at most `take`.
    Rows { skip: Option<u64>, take: u64 },
    /// At most `n` rows chosen by the backend's random ordering. Which rows are returned is
    /// not reproducible and carries no ordering guarantee.
    RandomSampleRows(u64),
}

impl Limit {
    pub fn rows(take: u64) -> Self {
        Limit::Rows { skip: None, take }
    }

    pub fn page(skip: u64, take: u64) -> Self {
        Limit::Rows {
            skip: Some(skip),
            take,
        }
    }

    pub fn sample(rows: u64) -> Self {
        Limit::RandomSampleRows(rows)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortExpression {
    pub column: String,
    pub descending: bool,
}

impl SortExpression {
    pub fn ascending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn descending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

/// Logical database operation, before it is resolved against metadata.
///
/// Built once through the `with_*` methods, then consumed by the dialect that compiles it.
/// Parameters are keyed by name: the order in which they were supplied is irrelevant.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDescriptor {
    kind: OperationKind,
    target: OperationTarget,
    parameters: BTreeMap<String, Value>,
    columns: Vec<String>,
    sort: Vec<SortExpression>,
    limit: Limit,
    shape: Shape,
    cacheable: bool,
    strict: Option<bool>,
}

impl OperationDescriptor {
    fn new(kind: OperationKind, target: OperationTarget) -> Self {
        Self {
            kind,
            target,
            parameters: Default::default(),
            columns: Default::default(),
            sort: Default::default(),
            limit: Limit::None,
            shape: match kind {
                OperationKind::Query | OperationKind::StoredProcedure | OperationKind::RawSql => {
                    Shape::Collection
                }
                _ => Shape::RowsAffected,
            },
            cacheable: false,
            strict: None,
        }
    }

    pub fn query(object: impl Into<ObjectName>) -> Self {
        Self::new(OperationKind::Query, OperationTarget::Object(object.into()))
    }

    pub fn insert(object: impl Into<ObjectName>) -> Self {
        Self::new(OperationKind::Insert, OperationTarget::Object(object.into()))
    }

    pub fn update(object: impl Into<ObjectName>) -> Self {
        Self::new(OperationKind::Update, OperationTarget::Object(object.into()))
    }

    pub fn delete(object: impl Into<ObjectName>) -> Self {
        Self::new(OperationKind::Delete, OperationTarget::Object(object.into()))
    }

    pub fn procedure(object: impl Into<ObjectName>) -> Self {
        Self::new(
            OperationKind::StoredProcedure,
            OperationTarget::Object(object.into()),
        )
    }

    pub fn raw_sql(text: impl Into<String>) -> Self {
        Self::new(OperationKind::RawSql, OperationTarget::Sql(text.into()))
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_parameters<K, V>(mut self, parameters: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.parameters
            .extend(parameters.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn with_sort(mut self, sort: SortExpression) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn with_limit(mut self, limit: Limit) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_cacheable(mut self, cacheable: bool) -> Self {
        self.cacheable = cacheable;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn target(&self) -> &OperationTarget {
        &self.target
    }

    /// Target object, `None` for raw SQL.
    pub fn object(&self) -> Option<&ObjectName> {
        match &self.target {
            OperationTarget::Object(v) => Some(v),
            OperationTarget::Sql(..) => None,
        }
    }

    pub fn parameters(&self) -> &BTreeMap<String, Value> {
        &self.parameters
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn sort(&self) -> &[SortExpression] {
        &self.sort
    }

    pub fn limit(&self) -> Limit {
        self.limit
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn cacheable(&self) -> bool {
        self.cacheable
    }

    /// Strict mapping override, `None` defers to the data source configuration.
    pub fn strict(&self) -> Option<bool> {
        self.strict
    }

    /// Diagnostic name, for example `Query Employee` or `Sql`.
    pub fn name(&self) -> String {
        match &self.target {
            OperationTarget::Object(object) => format!("{} {}", self.kind, object),
            OperationTarget::Sql(..) => self.kind.to_string(),
        }
    }
}

use crate::{NameComparison, ObjectName};

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyRole {
    PrimaryKey,
    #[default]
    None,
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    #[default]
    Table,
    View,
    /// The columns of a stored procedure describe its parameters.
    StoredProcedure,
}

/// One column as reported by metadata discovery.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    pub name: String,
    /// Type name as declared in the database.
    pub data_type: String,
    pub nullable: bool,
    pub max_length: Option<u32>,
    pub key: KeyRole,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            max_length: None,
            key: KeyRole::None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.key = KeyRole::PrimaryKey;
        self.nullable = false;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn is_primary_key(&self) -> bool {
        self.key == KeyRole::PrimaryKey
    }
}

/// Structural description of a database object. Immutable once built: the schema cache
/// hands out shared references and replaces entries only on reset.
#[derive(Debug, Clone, PartialEq)]
pub struct TableOrViewMetadata {
    name: ObjectName,
    kind: ObjectKind,
    columns: Box<[ColumnMetadata]>,
}

impl TableOrViewMetadata {
    pub fn new(
        name: impl Into<ObjectName>,
        kind: ObjectKind,
        columns: impl IntoIterator<Item = ColumnMetadata>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            columns: columns.into_iter().collect(),
        }
    }

    pub fn name(&self) -> &ObjectName {
        &self.name
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn is_view(&self) -> bool {
        self.kind == ObjectKind::View
    }

    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    pub fn column(&self, name: &str, comparison: NameComparison) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|c| comparison.eq(&c.name, name))
    }

    pub fn primary_keys(&self) -> impl Iterator<Item = &ColumnMetadata> {
        self.columns.iter().filter(|c| c.is_primary_key())
    }
}

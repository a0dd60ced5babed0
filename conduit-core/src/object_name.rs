use std::{
    borrow::Cow,
    fmt::{self, Display},
    hash::{Hash, Hasher},
};

/// String comparison policy applied to object and column names.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameComparison {
    #[default]
    CaseInsensitive,
    Ordinal,
}

impl NameComparison {
    pub fn eq(&self, a: &str, b: &str) -> bool {
        match self {
            NameComparison::CaseInsensitive => a.eq_ignore_ascii_case(b),
            NameComparison::Ordinal => a == b,
        }
    }

    /// Normalized form of `value`: equal keys under this policy mean equal names.
    pub fn key(&self, value: &str) -> String {
        match self {
            NameComparison::CaseInsensitive => value.to_ascii_lowercase(),
            NameComparison::Ordinal => value.to_owned(),
        }
    }
}

/// Schema qualified name of a table, view or stored procedure.
///
/// Equality and hashing ignore ASCII case. Use [`ObjectName::key`] when a different
/// [`NameComparison`] is configured.
#[derive(Default, Debug, Clone, Eq)]
pub struct ObjectName {
    schema: Cow<'static, str>,
    name: Cow<'static, str>,
}

impl ObjectName {
    pub fn new(
        schema: impl Into<Cow<'static, str>>,
        name: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Parses `name`, `schema.name` and the quoted forms `[schema].[name]`,
    /// `"schema"."name"` and `` `schema`.`name` ``.
    ///
    /// A dot inside a quoted part belongs to the identifier.
    pub fn parse(value: &str) -> Self {
        let mut parts = Vec::new();
        let mut current = String::new();
        let mut closing: Option<char> = None;
        let mut chars = value.trim().chars().peekable();
        while let Some(c) = chars.next() {
            match closing {
                Some(end) if c == end => {
                    // Doubled closing quote is an escaped quote
                    if chars.peek() == Some(&end) {
                        current.push(end);
                        chars.next();
                    } else {
                        closing = None;
                    }
                }
                Some(..) => current.push(c),
                None => match c {
                    '[' => closing = Some(']'),
                    '"' => closing = Some('"'),
                    '`' => closing = Some('`'),
                    '.' => parts.push(std::mem::take(&mut current)),
                    c if c.is_whitespace() => {}
                    c => current.push(c),
                },
            }
        }
        parts.push(current);
        let name = parts.pop().unwrap_or_default();
        let schema = parts.pop().unwrap_or_default();
        Self::new(schema, name)
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Copy with `schema` applied when this name has none.
    pub fn or_schema(&self, schema: &str) -> Self {
        if self.schema.is_empty() && !schema.is_empty() {
            Self::new(schema.to_owned(), self.name.clone())
        } else {
            self.clone()
        }
    }

    /// Cache key under `comparison`.
    pub fn key(&self, comparison: NameComparison) -> String {
        if self.schema.is_empty() {
            comparison.key(&self.name)
        } else {
            format!(
                "{}\u{1f}{}",
                comparison.key(&self.schema),
                comparison.key(&self.name)
            )
        }
    }
}

impl PartialEq for ObjectName {
    fn eq(&self, other: &Self) -> bool {
        self.schema.eq_ignore_ascii_case(&other.schema) && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Hash for ObjectName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key(NameComparison::CaseInsensitive).hash(state);
    }
}

impl Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.schema.is_empty() {
            write!(f, "{}.", self.schema)?;
        }
        f.write_str(&self.name)
    }
}

impl From<&str> for ObjectName {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<String> for ObjectName {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<&ObjectName> for ObjectName {
    fn from(value: &ObjectName) -> Self {
        value.clone()
    }
}

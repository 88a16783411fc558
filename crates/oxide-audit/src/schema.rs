//! Column metadata types.
//!
//! A [`Column`] describes one column exactly as the database reports it, and a
//! [`ColumnSet`] keeps those columns in the order the database lists them.
//! Column order matters: it drives the `AFTER` placement of added audit
//! columns.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where the value of an audit column comes from inside a trigger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueBinding {
    /// The trigger's statement type (`'INSERT'`, `'UPDATE'`, `'DELETE'`).
    Action,
    /// The row state being recorded (`'NEW'` or `'OLD'`).
    State,
    /// A raw SQL expression, inserted verbatim.
    Expression {
        /// The SQL expression.
        sql: String,
    },
}

/// Where a column should be placed when added to an existing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnPosition {
    /// The column becomes the first column.
    First,
    /// The column follows the named column.
    After(String),
}

impl fmt::Display for ColumnPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => f.write_str("FIRST"),
            Self::After(name) => write!(f, "AFTER {name}"),
        }
    }
}

/// Column attributes that can be excluded from a [`ColumnSet::type_diff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnAttribute {
    /// The canonical type string.
    Type,
    /// NULL / NOT NULL.
    Nullable,
    /// Character set.
    CharacterSet,
    /// Collation.
    Collation,
}

/// Metadata of a single column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Canonical type as reported by the engine (e.g. `int(11) unsigned`).
    #[serde(rename = "type")]
    pub column_type: String,
    /// Whether the column allows NULL values.
    pub nullable: bool,
    /// Character set (character types only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_set: Option<String>,
    /// Collation (character types only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
    /// Trigger value binding (audit columns only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ValueBinding>,
}

impl Column {
    /// Creates a nullable column without character set information.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            nullable: true,
            character_set: None,
            collation: None,
            value: None,
        }
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the character set and collation.
    #[must_use]
    pub fn charset(
        mut self,
        character_set: impl Into<String>,
        collation: impl Into<String>,
    ) -> Self {
        self.character_set = Some(character_set.into());
        self.collation = Some(collation.into());
        self
    }

    /// Sets the trigger value binding.
    #[must_use]
    pub fn bind(mut self, value: ValueBinding) -> Self {
        self.value = Some(value);
        self
    }

    /// Returns `true` if the two columns differ in any attribute not listed
    /// in `ignore`. Names and value bindings are never compared.
    #[must_use]
    pub fn differs_from(&self, other: &Self, ignore: &[ColumnAttribute]) -> bool {
        let compare = |attr: ColumnAttribute| !ignore.contains(&attr);

        (compare(ColumnAttribute::Type) && self.column_type != other.column_type)
            || (compare(ColumnAttribute::Nullable) && self.nullable != other.nullable)
            || (compare(ColumnAttribute::CharacterSet) && self.character_set != other.character_set)
            || (compare(ColumnAttribute::Collation) && self.collation != other.collation)
    }
}

/// Ordered, name-unique collection of columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Column>", into = "Vec<Column>")]
pub struct ColumnSet {
    columns: Vec<Column>,
}

impl ColumnSet {
    /// Creates an empty column set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a column at the end, or replaces an existing column with the
    /// same name in place.
    pub fn insert(&mut self, column: Column) {
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
    }

    /// Adds a column (builder style).
    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.insert(column);
        self
    }

    /// Gets a column by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns whether a column with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the set has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Iterates columns in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Column> {
        self.columns.iter()
    }

    /// Returns column names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Columns of `self` whose names are absent from `other`, in `self` order.
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        self.columns
            .iter()
            .filter(|c| !other.contains(&c.name))
            .cloned()
            .collect()
    }

    /// All columns of `self`, followed by the columns of `other` whose names
    /// are not already present. On a name clash `self` wins.
    #[must_use]
    pub fn combine(&self, other: &Self) -> Self {
        let mut combined = self.clone();
        for column in &other.columns {
            if !combined.contains(&column.name) {
                combined.columns.push(column.clone());
            }
        }
        combined
    }

    /// Columns present in both sets whose attributes differ, ignoring the
    /// listed attributes. The returned columns are `self`'s versions.
    #[must_use]
    pub fn type_diff(&self, other: &Self, ignore: &[ColumnAttribute]) -> Self {
        self.columns
            .iter()
            .filter(|c| {
                other
                    .get(&c.name)
                    .is_some_and(|previous| c.differs_from(previous, ignore))
            })
            .cloned()
            .collect()
    }

    /// Marks every column as nullable.
    pub fn make_all_nullable(&mut self) {
        for column in &mut self.columns {
            column.nullable = true;
        }
    }

    /// Returns the column immediately preceding `name`, if any.
    #[must_use]
    pub fn predecessor(&self, name: &str) -> Option<&Column> {
        let idx = self.columns.iter().position(|c| c.name == name)?;
        idx.checked_sub(1).map(|prev| &self.columns[prev])
    }

    /// Returns the placement of `name` relative to its predecessor, or `None`
    /// if the column is not part of this set.
    #[must_use]
    pub fn position_of(&self, name: &str) -> Option<ColumnPosition> {
        if !self.contains(name) {
            return None;
        }
        Some(match self.predecessor(name) {
            Some(prev) => ColumnPosition::After(prev.name.clone()),
            None => ColumnPosition::First,
        })
    }
}

impl FromIterator<Column> for ColumnSet {
    fn from_iter<I: IntoIterator<Item = Column>>(iter: I) -> Self {
        let mut set = Self::new();
        for column in iter {
            set.insert(column);
        }
        set
    }
}

impl From<Vec<Column>> for ColumnSet {
    fn from(columns: Vec<Column>) -> Self {
        columns.into_iter().collect()
    }
}

impl From<ColumnSet> for Vec<Column> {
    fn from(set: ColumnSet) -> Self {
        set.columns
    }
}

impl IntoIterator for ColumnSet {
    type Item = Column;
    type IntoIter = std::vec::IntoIter<Column>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

impl<'a> IntoIterator for &'a ColumnSet {
    type Item = &'a Column;
    type IntoIter = std::slice::Iter<'a, Column>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}

/// Table-level options reported by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableOptions {
    /// Storage engine (e.g. `InnoDB`).
    pub engine: Option<String>,
    /// Default character set.
    pub character_set: Option<String>,
    /// Default collation.
    pub collation: Option<String>,
}

//! Filter and ordering requests handed to the predicate builder.

use std::fmt;
use std::ops::{Range, RangeInclusive};
use std::str::FromStr;

use crate::error::DocFieldsError;
use crate::types::TypedValue;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl From<SortOrder> for sea_orm::Order {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Asc => sea_orm::Order::Asc,
            SortOrder::Desc => sea_orm::Order::Desc,
        }
    }
}

impl FromStr for SortOrder {
    type Err = DocFieldsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("asc") {
            Ok(Self::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Ok(Self::Desc)
        } else {
            Err(DocFieldsError::InvalidDirection {
                direction: s.to_string(),
            })
        }
    }
}

/// A direction as given by the caller, validated when the order is built
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Sort(SortOrder),
    Text(String),
}

impl Direction {
    pub fn resolve(&self) -> Result<SortOrder, DocFieldsError> {
        match self {
            Self::Sort(order) => Ok(*order),
            Self::Text(text) => text.parse(),
        }
    }
}

impl From<SortOrder> for Direction {
    fn from(order: SortOrder) -> Self {
        Self::Sort(order)
    }
}

impl From<&str> for Direction {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Direction {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// `start..end` or `start..=end` over typed bounds
#[derive(Clone, Debug, PartialEq)]
pub struct RangeLiteral {
    pub start: TypedValue,
    pub end: TypedValue,
    pub inclusive: bool,
}

impl fmt::Display for RangeLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dots = if self.inclusive { "..=" } else { ".." };
        write!(f, "{}{}{}", self.start, dots, self.end)
    }
}

impl<T: Into<TypedValue>> From<Range<T>> for RangeLiteral {
    fn from(range: Range<T>) -> Self {
        Self {
            start: range.start.into(),
            end: range.end.into(),
            inclusive: false,
        }
    }
}

impl<T: Into<TypedValue>> From<RangeInclusive<T>> for RangeLiteral {
    fn from(range: RangeInclusive<T>) -> Self {
        let (start, end) = range.into_inner();
        Self {
            start: start.into(),
            end: end.into(),
            inclusive: true,
        }
    }
}

/// Right-hand side of one filter entry
#[derive(Clone, Debug, PartialEq)]
pub enum QueryValue {
    Value(TypedValue),
    /// Comparator map such as `{gt: 3, lt: 7}` or `{before: t}`
    Operators(Vec<(String, TypedValue)>),
    Range(RangeLiteral),
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => write!(f, "{}", value),
            Self::Range(range) => write!(f, "{}", range),
            Self::Operators(ops) => {
                f.write_str("{")?;
                for (i, (token, value)) in ops.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", token, value)?;
                }
                f.write_str("}")
            }
        }
    }
}

/// Ordered filter entries keyed by field name
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WhereArgs {
    entries: Vec<(String, QueryValue)>,
}

impl WhereArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<TypedValue>) -> Self {
        self.entries
            .push((field.into(), QueryValue::Value(value.into())));
        self
    }

    pub fn ops<I, K, V>(mut self, field: impl Into<String>, operators: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<TypedValue>,
    {
        let operators = operators
            .into_iter()
            .map(|(token, value)| (token.into(), value.into()))
            .collect();
        self.entries
            .push((field.into(), QueryValue::Operators(operators)));
        self
    }

    pub fn range(mut self, field: impl Into<String>, range: impl Into<RangeLiteral>) -> Self {
        self.entries
            .push((field.into(), QueryValue::Range(range.into())));
        self
    }

    pub fn push(mut self, field: impl Into<String>, value: QueryValue) -> Self {
        self.entries.push((field.into(), value));
        self
    }

    pub fn entries(&self) -> &[(String, QueryValue)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Multi-key ordering: bare fields sort ascending, explicit entries set a
/// direction. A field given both ways keeps its bare position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderArgs {
    bare: Vec<String>,
    explicit: Vec<(String, Direction)>,
}

impl OrderArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.bare.push(field.into());
        self
    }

    pub fn direction(mut self, field: impl Into<String>, direction: impl Into<Direction>) -> Self {
        self.explicit.push((field.into(), direction.into()));
        self
    }

    /// Sort keys in application order
    pub fn keys(&self) -> Vec<(String, Direction)> {
        let mut keys: Vec<(String, Direction)> = self
            .bare
            .iter()
            .map(|field| (field.clone(), Direction::Sort(SortOrder::Asc)))
            .collect();
        for (field, direction) in &self.explicit {
            match keys.iter_mut().find(|(f, _)| f == field) {
                Some(entry) => entry.1 = direction.clone(),
                None => keys.push((field.clone(), direction.clone())),
            }
        }
        keys
    }
}

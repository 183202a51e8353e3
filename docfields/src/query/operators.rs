//! Comparator tokens accepted in filter maps.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::types::TypedValue;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Comparison {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    pub fn sql(self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }

    pub fn from_number_token(token: &str) -> Option<Self> {
        NUMBER_OPERATORS.get(token).copied()
    }

    pub fn from_time_token(token: &str) -> Option<Self> {
        TIME_OPERATORS.get(token).copied()
    }
}

static NUMBER_OPERATORS: Lazy<HashMap<&'static str, Comparison>> = Lazy::new(|| {
    HashMap::from([
        (">", Comparison::Gt),
        ("greater_than", Comparison::Gt),
        ("gt", Comparison::Gt),
        (">=", Comparison::Gte),
        ("greater_than_or_equal_to", Comparison::Gte),
        ("gte", Comparison::Gte),
        ("<", Comparison::Lt),
        ("less_than", Comparison::Lt),
        ("lt", Comparison::Lt),
        ("<=", Comparison::Lte),
        ("less_than_or_equal_to", Comparison::Lte),
        ("lte", Comparison::Lte),
    ])
});

static TIME_OPERATORS: Lazy<HashMap<&'static str, Comparison>> = Lazy::new(|| {
    HashMap::from([("after", Comparison::Gt), ("before", Comparison::Lt)])
});

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OperatorClass {
    Number,
    Time,
}

/// Class of a comparator map: every key a number token, or every key a time
/// token. Anything else is matched by containment.
pub fn classify(operators: &[(String, TypedValue)]) -> Option<OperatorClass> {
    if operators
        .iter()
        .all(|(token, _)| NUMBER_OPERATORS.contains_key(token.as_str()))
    {
        Some(OperatorClass::Number)
    } else if operators
        .iter()
        .all(|(token, _)| TIME_OPERATORS.contains_key(token.as_str()))
    {
        Some(OperatorClass::Time)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ops(tokens: &[&str]) -> Vec<(String, TypedValue)> {
        tokens
            .iter()
            .map(|t| (t.to_string(), TypedValue::Integer(1)))
            .collect()
    }

    #[test]
    fn test_token_maps() {
        assert_eq!(Comparison::from_number_token("gte"), Some(Comparison::Gte));
        assert_eq!(
            Comparison::from_number_token("less_than_or_equal_to").map(Comparison::sql),
            Some("<=")
        );
        assert_eq!(Comparison::from_time_token("before"), Some(Comparison::Lt));
        assert_eq!(Comparison::from_number_token("before"), None);
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(&ops(&["gt", "<"])), Some(OperatorClass::Number));
        assert_eq!(classify(&ops(&["before", "after"])), Some(OperatorClass::Time));
        assert_eq!(classify(&ops(&["gt", "before"])), None);
        assert_eq!(classify(&ops(&["color"])), None);
    }
}

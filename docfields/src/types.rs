//! Type registry: symbolic type names, typed runtime values and the casters
//! that move values between caller input, runtime form and document form.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, SubsecRound,
    TimeZone, Utc,
};
use once_cell::sync::Lazy;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde_json::{Number, Value as JsonValue};

use crate::config::DocFieldsConfig;
use crate::error::{DocFieldsError, DocResult};

/// A declared enumeration: labels at runtime, integer codes in documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType {
    name: String,
    variants: Vec<(String, i64)>,
}

impl EnumType {
    pub fn new<I, L>(name: impl Into<String>, variants: I) -> DocResult<Self>
    where
        I: IntoIterator<Item = (L, i64)>,
        L: Into<String>,
    {
        let name = name.into();
        let mut seen: Vec<(String, i64)> = Vec::new();
        for (label, code) in variants {
            let label = label.into();
            if seen.iter().any(|(l, c)| *l == label || *c == code) {
                return Err(DocFieldsError::invalid_configuration(
                    format!("enum {}", name),
                    format!("label `{}` or code {} is declared twice", label, code),
                ));
            }
            seen.push((label, code));
        }
        if seen.is_empty() {
            return Err(DocFieldsError::invalid_configuration(
                format!("enum {}", name),
                "an enumeration needs at least one variant",
            ));
        }
        Ok(Self {
            name,
            variants: seen,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variants(&self) -> &[(String, i64)] {
        &self.variants
    }

    pub fn code_for(&self, label: &str) -> Option<i64> {
        self.variants
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, code)| *code)
    }

    pub fn label_for(&self, code: i64) -> Option<&str> {
        self.variants
            .iter()
            .find(|(_, c)| *c == code)
            .map(|(label, _)| label.as_str())
    }
}

/// Canonical type of a declared field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeTag {
    /// Opaque JSON passthrough
    Value,
    String,
    Integer,
    Boolean,
    Date,
    DateTime,
    Decimal,
    Float,
    Array(Box<TypeTag>),
    Enum(Arc<EnumType>),
}

static TYPE_TABLE: Lazy<HashMap<&'static str, TypeTag>> = Lazy::new(|| {
    let scalars = [
        ("string", TypeTag::String),
        ("integer", TypeTag::Integer),
        ("boolean", TypeTag::Boolean),
        ("date", TypeTag::Date),
        ("datetime", TypeTag::DateTime),
        ("decimal", TypeTag::Decimal),
        ("float", TypeTag::Float),
    ];
    let array_names = [
        "string_array",
        "integer_array",
        "boolean_array",
        "date_array",
        "datetime_array",
        "decimal_array",
        "float_array",
    ];

    let mut table = HashMap::new();
    table.insert("value", TypeTag::Value);
    table.insert("array", TypeTag::Array(Box::new(TypeTag::Value)));
    for ((name, tag), array_name) in scalars.into_iter().zip(array_names) {
        table.insert(array_name, TypeTag::Array(Box::new(tag.clone())));
        table.insert(name, tag);
    }
    table
});

impl TypeTag {
    /// Resolve a symbolic type name against the closed type table
    pub fn lookup(name: &str) -> DocResult<TypeTag> {
        TYPE_TABLE
            .get(name)
            .cloned()
            .ok_or_else(|| DocFieldsError::unknown_type(name))
    }

    pub fn array_of(inner: TypeTag) -> TypeTag {
        TypeTag::Array(Box::new(inner))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float | Self::Decimal)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::Date | Self::DateTime)
    }

    pub fn name(&self) -> String {
        match self {
            Self::Value => "value".to_string(),
            Self::String => "string".to_string(),
            Self::Integer => "integer".to_string(),
            Self::Boolean => "boolean".to_string(),
            Self::Date => "date".to_string(),
            Self::DateTime => "datetime".to_string(),
            Self::Decimal => "decimal".to_string(),
            Self::Float => "float".to_string(),
            Self::Array(inner) if **inner == Self::Value => "array".to_string(),
            Self::Array(inner) => format!("{}_array", inner.name()),
            Self::Enum(e) => format!("enum {}", e.name()),
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Runtime value of a virtual field
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TypedValue {
    #[default]
    Null,
    String(String),
    Integer(i64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Decimal(Decimal),
    Float(f64),
    Array(Vec<TypedValue>),
    /// Raw JSON; the runtime form of `value` fields and of unconverted input
    Value(JsonValue),
}

impl TypedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            Self::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[TypedValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&JsonValue> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Plain JSON rendering with datetimes written in `offset`
    pub fn to_json(&self, offset: &FixedOffset) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::String(s) => JsonValue::String(s.clone()),
            Self::Integer(i) => JsonValue::from(*i),
            Self::Boolean(b) => JsonValue::Bool(*b),
            Self::Date(d) => JsonValue::String(format_date(d)),
            Self::DateTime(dt) => JsonValue::String(format_datetime(dt, offset)),
            Self::Decimal(d) => JsonValue::String(d.to_string()),
            Self::Float(f) => Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number),
            Self::Array(items) => {
                JsonValue::Array(items.iter().map(|item| item.to_json(offset)).collect())
            }
            Self::Value(v) => v.clone(),
        }
    }

    /// Lift raw JSON into plain variants; objects stay wrapped
    pub fn from_json(value: JsonValue) -> TypedValue {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Boolean(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => n.as_f64().map_or(Self::Null, Self::Float),
            },
            JsonValue::String(s) => Self::String(s),
            JsonValue::Array(items) => {
                Self::Array(items.into_iter().map(Self::from_json).collect())
            }
            object @ JsonValue::Object(_) => Self::Value(object),
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::String(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Date(d) => f.write_str(&format_date(d)),
            Self::DateTime(dt) => f.write_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Self::Decimal(d) => write!(f, "{}", d),
            Self::Float(x) => write!(f, "{}", x),
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Self::Value(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for TypedValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for TypedValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for TypedValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<bool> for TypedValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<f64> for TypedValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<NaiveDate> for TypedValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<DateTime<Utc>> for TypedValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value)
    }
}

impl From<DateTime<FixedOffset>> for TypedValue {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Self::DateTime(value.with_timezone(&Utc))
    }
}

impl From<Decimal> for TypedValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<JsonValue> for TypedValue {
    fn from(value: JsonValue) -> Self {
        Self::Value(value)
    }
}

impl<T: Into<TypedValue>> From<Vec<T>> for TypedValue {
    fn from(values: Vec<T>) -> Self {
        Self::Array(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<TypedValue>> From<Option<T>> for TypedValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Cast caller input into the canonical runtime value for `tag`
pub fn cast_for_runtime(
    tag: &TypeTag,
    raw: TypedValue,
    config: &DocFieldsConfig,
) -> DocResult<TypedValue> {
    if let TypeTag::Value = tag {
        return Ok(match raw {
            TypedValue::Null | TypedValue::Value(JsonValue::Null) => TypedValue::Null,
            TypedValue::Value(json) => TypedValue::Value(json),
            other => TypedValue::Value(other.to_json(&config.storage_offset)),
        });
    }

    let raw = match raw {
        TypedValue::Value(json) => TypedValue::from_json(json),
        other => other,
    };
    if raw.is_null() {
        return Ok(TypedValue::Null);
    }
    if is_blank_for(tag, &raw) {
        return Ok(TypedValue::Null);
    }

    let offset = &config.storage_offset;
    match tag {
        TypeTag::Value => Ok(raw),
        TypeTag::String => cast_string(raw, offset),
        TypeTag::Integer => cast_integer(raw),
        TypeTag::Boolean => cast_boolean(raw),
        TypeTag::Float => cast_float(raw),
        TypeTag::Decimal => cast_decimal(raw),
        TypeTag::Date => cast_date(raw, offset),
        TypeTag::DateTime => cast_datetime(raw, offset),
        TypeTag::Enum(enum_type) => cast_enum(enum_type, raw),
        TypeTag::Array(inner) => match raw {
            TypedValue::Array(items) => items
                .into_iter()
                .map(|item| cast_for_runtime(inner, item, config))
                .collect::<DocResult<Vec<_>>>()
                .map(TypedValue::Array),
            other => Err(DocFieldsError::cast(tag.name(), other)),
        },
    }
}

/// Cast input and render it in the form written into a document
pub fn cast_for_storage(
    tag: &TypeTag,
    typed: TypedValue,
    config: &DocFieldsConfig,
) -> DocResult<JsonValue> {
    let canonical = cast_for_runtime(tag, typed, config)?;
    Ok(storable(tag, &canonical, config))
}

/// Render an already canonical runtime value for storage
pub(crate) fn storable(
    tag: &TypeTag,
    canonical: &TypedValue,
    config: &DocFieldsConfig,
) -> JsonValue {
    match (tag, canonical) {
        (_, TypedValue::Null) => JsonValue::Null,
        (TypeTag::Enum(enum_type), TypedValue::String(label)) => enum_type
            .code_for(label)
            .map_or(JsonValue::Null, JsonValue::from),
        (TypeTag::Array(inner), TypedValue::Array(items)) => JsonValue::Array(
            items
                .iter()
                .map(|item| storable(inner, item, config))
                .collect(),
        ),
        (_, value) => value.to_json(&config.storage_offset),
    }
}

fn is_blank_for(tag: &TypeTag, raw: &TypedValue) -> bool {
    match (tag, raw) {
        (TypeTag::String | TypeTag::Array(_), _) => false,
        (_, TypedValue::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

fn cast_string(raw: TypedValue, offset: &FixedOffset) -> DocResult<TypedValue> {
    let s = match raw {
        TypedValue::String(s) => s,
        TypedValue::Integer(i) => i.to_string(),
        TypedValue::Float(f) => f.to_string(),
        TypedValue::Boolean(b) => b.to_string(),
        TypedValue::Decimal(d) => d.to_string(),
        TypedValue::Date(d) => format_date(&d),
        TypedValue::DateTime(dt) => format_datetime(&dt, offset),
        other => return Err(DocFieldsError::cast("string", other)),
    };
    Ok(TypedValue::String(s))
}

fn cast_integer(raw: TypedValue) -> DocResult<TypedValue> {
    let fail = |v: &TypedValue| DocFieldsError::cast("integer", v);
    match raw {
        TypedValue::Integer(i) => Ok(TypedValue::Integer(i)),
        TypedValue::Boolean(b) => Ok(TypedValue::Integer(i64::from(b))),
        TypedValue::Float(f) => truncate_float(f).ok_or_else(|| fail(&TypedValue::Float(f))),
        TypedValue::Decimal(d) => d
            .trunc()
            .to_i64()
            .map(TypedValue::Integer)
            .ok_or_else(|| fail(&TypedValue::Decimal(d))),
        TypedValue::String(s) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                return Ok(TypedValue::Integer(i));
            }
            trimmed
                .parse::<f64>()
                .ok()
                .and_then(truncate_float)
                .ok_or_else(|| fail(&TypedValue::String(s.clone())))
        }
        other => Err(fail(&other)),
    }
}

fn truncate_float(f: f64) -> Option<TypedValue> {
    if !f.is_finite() || f.trunc() > i64::MAX as f64 || f.trunc() < i64::MIN as f64 {
        return None;
    }
    Some(TypedValue::Integer(f.trunc() as i64))
}

fn cast_boolean(raw: TypedValue) -> DocResult<TypedValue> {
    match raw {
        TypedValue::Boolean(b) => Ok(TypedValue::Boolean(b)),
        TypedValue::Integer(1) => Ok(TypedValue::Boolean(true)),
        TypedValue::Integer(0) => Ok(TypedValue::Boolean(false)),
        TypedValue::String(ref s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" | "yes" | "y" | "on" => Ok(TypedValue::Boolean(true)),
            "false" | "f" | "0" | "no" | "n" | "off" => Ok(TypedValue::Boolean(false)),
            _ => Err(DocFieldsError::cast("boolean", &raw)),
        },
        other => Err(DocFieldsError::cast("boolean", other)),
    }
}

fn cast_float(raw: TypedValue) -> DocResult<TypedValue> {
    let value = match &raw {
        TypedValue::Float(f) => Some(*f),
        TypedValue::Integer(i) => Some(*i as f64),
        TypedValue::Decimal(d) => d.to_f64(),
        TypedValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match value {
        Some(f) if f.is_finite() => Ok(TypedValue::Float(f)),
        _ => Err(DocFieldsError::cast("float", raw)),
    }
}

fn cast_decimal(raw: TypedValue) -> DocResult<TypedValue> {
    let value = match &raw {
        TypedValue::Decimal(d) => Some(*d),
        TypedValue::Integer(i) => Some(Decimal::from(*i)),
        TypedValue::Float(f) => Decimal::from_f64(*f),
        TypedValue::String(s) => {
            let trimmed = s.trim();
            Decimal::from_str(trimmed)
                .or_else(|_| Decimal::from_scientific(trimmed))
                .ok()
        }
        _ => None,
    };
    value
        .map(TypedValue::Decimal)
        .ok_or_else(|| DocFieldsError::cast("decimal", raw))
}

fn cast_date(raw: TypedValue, offset: &FixedOffset) -> DocResult<TypedValue> {
    match raw {
        TypedValue::Date(d) => Ok(TypedValue::Date(d)),
        TypedValue::DateTime(dt) => Ok(TypedValue::Date(dt.with_timezone(offset).date_naive())),
        TypedValue::String(ref s) => {
            let trimmed = s.trim();
            if let Some(d) = parse_date(trimmed) {
                return Ok(TypedValue::Date(d));
            }
            parse_datetime(trimmed, offset)
                .map(|dt| TypedValue::Date(dt.with_timezone(offset).date_naive()))
                .ok_or_else(|| DocFieldsError::cast("date", &raw))
        }
        other => Err(DocFieldsError::cast("date", other)),
    }
}

fn cast_datetime(raw: TypedValue, offset: &FixedOffset) -> DocResult<TypedValue> {
    let parsed = match &raw {
        TypedValue::DateTime(dt) => Some(*dt),
        TypedValue::Date(d) => offset
            .from_local_datetime(&d.and_time(chrono::NaiveTime::MIN))
            .single()
            .map(|dt| dt.with_timezone(&Utc)),
        TypedValue::String(s) => parse_datetime(s.trim(), offset),
        TypedValue::Integer(secs) => Utc.timestamp_opt(*secs, 0).single(),
        _ => None,
    };
    parsed
        .map(|dt| TypedValue::DateTime(dt.trunc_subsecs(3)))
        .ok_or_else(|| DocFieldsError::cast("datetime", raw))
}

fn cast_enum(enum_type: &EnumType, raw: TypedValue) -> DocResult<TypedValue> {
    let label = match &raw {
        TypedValue::String(s) => {
            if enum_type.code_for(s).is_some() {
                Some(s.clone())
            } else {
                s.trim()
                    .parse::<i64>()
                    .ok()
                    .and_then(|code| enum_type.label_for(code))
                    .map(str::to_string)
            }
        }
        TypedValue::Integer(code) => enum_type.label_for(*code).map(str::to_string),
        _ => None,
    };
    label
        .map(TypedValue::String)
        .ok_or_else(|| DocFieldsError::cast(format!("enum {}", enum_type.name()), raw))
}

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff]±HH[:MM]`, a naive datetime in
/// `offset`, or a bare date at midnight in `offset`.
pub(crate) fn parse_datetime(s: &str, offset: &FixedOffset) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(dt) = parse_extended_year(s, |t| DateTime::parse_from_rfc3339(t).ok()) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .or_else(|| parse_date(s).map(|d| d.and_time(chrono::NaiveTime::MIN)))?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_extended_year(s, |t| NaiveDate::parse_from_str(t, "%Y-%m-%d").ok()))
}

/// Signed years outside 0000-9999, as chrono writes them (`+12000-01-01...`)
fn parse_extended_year<T, F>(s: &str, parse: F) -> Option<T>
where
    T: Datelike,
    F: Fn(&str) -> Option<T>,
{
    let negative = match s.as_bytes().first()? {
        b'+' => false,
        b'-' => true,
        _ => return None,
    };
    let year_end = s[1..].find('-')? + 1;
    let digits = &s[1..year_end];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = digits.parse().ok()?;
    // 2000 is a leap year, so Feb 29 parses and `with_year` rejects it if needed
    let parsed = parse(&format!("2000{}", &s[year_end..]))?;
    parsed.with_year(if negative { -year } else { year })
}

fn format_date(d: &NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

fn format_datetime(dt: &DateTime<Utc>, offset: &FixedOffset) -> String {
    dt.with_timezone(offset)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> DocFieldsConfig {
        DocFieldsConfig::default()
    }

    fn runtime(name: &str, raw: impl Into<TypedValue>) -> DocResult<TypedValue> {
        cast_for_runtime(&TypeTag::lookup(name).unwrap(), raw.into(), &config())
    }

    #[test]
    fn test_lookup_closed_table() {
        assert_eq!(TypeTag::lookup("integer").unwrap(), TypeTag::Integer);
        assert_eq!(
            TypeTag::lookup("array").unwrap(),
            TypeTag::Array(Box::new(TypeTag::Value))
        );
        assert_eq!(
            TypeTag::lookup("datetime_array").unwrap().name(),
            "datetime_array"
        );
        assert!(matches!(
            TypeTag::lookup("money"),
            Err(DocFieldsError::UnknownType { .. })
        ));
    }

    #[test]
    fn test_blank_strings_become_null() {
        assert_eq!(runtime("integer", "").unwrap(), TypedValue::Null);
        assert_eq!(runtime("date", "  ").unwrap(), TypedValue::Null);
        assert_eq!(
            runtime("string", "").unwrap(),
            TypedValue::String(String::new())
        );
    }

    #[test]
    fn test_integer_casts() {
        assert_eq!(runtime("integer", "42").unwrap(), TypedValue::Integer(42));
        assert_eq!(runtime("integer", "4.9").unwrap(), TypedValue::Integer(4));
        assert_eq!(runtime("integer", 7.8).unwrap(), TypedValue::Integer(7));
        assert_eq!(runtime("integer", true).unwrap(), TypedValue::Integer(1));
        assert!(matches!(
            runtime("integer", "abc"),
            Err(DocFieldsError::Cast { .. })
        ));
    }

    #[test]
    fn test_boolean_tokens() {
        for token in ["true", "T", "1", "yes", "Y", "on"] {
            assert_eq!(runtime("boolean", token).unwrap(), TypedValue::Boolean(true));
        }
        for token in ["false", "f", "0", "NO", "n", "off"] {
            assert_eq!(runtime("boolean", token).unwrap(), TypedValue::Boolean(false));
        }
        assert_eq!(runtime("boolean", 1i64).unwrap(), TypedValue::Boolean(true));
        assert!(runtime("boolean", "maybe").is_err());
        assert!(runtime("boolean", 2i64).is_err());
    }

    #[test]
    fn test_float_rejects_non_finite() {
        assert_eq!(runtime("float", "1.5").unwrap(), TypedValue::Float(1.5));
        assert!(runtime("float", "NaN").is_err());
    }

    #[test]
    fn test_decimal_stored_as_string() {
        let tag = TypeTag::Decimal;
        let stored = cast_for_storage(&tag, "10.50".into(), &config()).unwrap();
        assert_eq!(stored, json!("10.50"));
        let back = cast_for_runtime(&tag, stored.into(), &config()).unwrap();
        assert_eq!(back, TypedValue::Decimal(Decimal::new(1050, 2)));
    }

    #[test]
    fn test_datetime_truncated_and_written_in_storage_offset() {
        let tag = TypeTag::DateTime;
        let input = Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap()
            + chrono::Duration::microseconds(123_456);
        let typed = cast_for_runtime(&tag, input.into(), &config()).unwrap();
        assert_eq!(
            typed.as_datetime().unwrap().timestamp_subsec_millis(),
            123
        );
        assert_eq!(
            typed.as_datetime().unwrap().timestamp_subsec_nanos(),
            123_000_000
        );

        let berlin = config().with_storage_offset(FixedOffset::east_opt(3600).unwrap());
        let stored = cast_for_storage(&tag, typed.clone(), &berlin).unwrap();
        assert_eq!(stored, json!("2021-03-04T06:06:07.123+01:00"));
        assert_eq!(cast_for_runtime(&tag, stored.into(), &berlin).unwrap(), typed);
    }

    #[test]
    fn test_naive_datetime_uses_storage_offset() {
        let plus_two = config().with_storage_offset(FixedOffset::east_opt(7200).unwrap());
        let typed =
            cast_for_runtime(&TypeTag::DateTime, "2020-01-01 12:00:00".into(), &plus_two).unwrap();
        assert_eq!(
            typed,
            TypedValue::DateTime(Utc.with_ymd_and_hms(2020, 1, 1, 10, 0, 0).unwrap())
        );
        let from_epoch = runtime("datetime", 0i64).unwrap();
        assert_eq!(from_epoch, TypedValue::DateTime(Utc.timestamp_opt(0, 0).unwrap()));
    }

    #[test]
    fn test_date_from_datetime_string() {
        assert_eq!(
            runtime("date", "2022-02-03T23:30:00Z").unwrap(),
            TypedValue::Date(NaiveDate::from_ymd_opt(2022, 2, 3).unwrap())
        );
    }

    #[test]
    fn test_arrays_cast_element_wise() {
        assert_eq!(
            runtime("integer_array", json!(["1", 2, 3.5])).unwrap(),
            TypedValue::Array(vec![
                TypedValue::Integer(1),
                TypedValue::Integer(2),
                TypedValue::Integer(3)
            ])
        );
        assert!(runtime("integer_array", "1,2").is_err());
        assert_eq!(
            runtime("array", json!([1, "a"])).unwrap(),
            TypedValue::Array(vec![
                TypedValue::Value(json!(1)),
                TypedValue::Value(json!("a"))
            ])
        );
    }

    #[test]
    fn test_enum_labels_and_codes() {
        let tag = TypeTag::Enum(Arc::new(
            EnumType::new("Status", [("draft", 0), ("published", 1)]).unwrap(),
        ));
        assert_eq!(
            cast_for_runtime(&tag, 1i64.into(), &config()).unwrap(),
            TypedValue::String("published".to_string())
        );
        assert_eq!(
            cast_for_storage(&tag, "draft".into(), &config()).unwrap(),
            json!(0)
        );
        assert!(cast_for_runtime(&tag, "archived".into(), &config()).is_err());
        assert!(EnumType::new("Dup", [("a", 0), ("a", 1)]).is_err());
    }

    #[test]
    fn test_storage_then_runtime_is_idempotent() {
        let far_future = Utc.with_ymd_and_hms(12000, 1, 1, 0, 0, 0).unwrap();
        let named = |name: &str| TypeTag::lookup(name).unwrap();
        let cases: Vec<(TypeTag, TypedValue)> = vec![
            (named("string"), "hello".into()),
            (named("string"), "".into()),
            (named("string"), "héllo wörld ✓ 日本語".into()),
            (named("integer"), "12".into()),
            (named("integer"), 0i64.into()),
            (named("integer"), (-42i64).into()),
            (named("boolean"), "yes".into()),
            (named("float"), 2.0.into()),
            (named("float"), 0.0.into()),
            (named("float"), (-0.125).into()),
            (named("decimal"), Decimal::new(314, 2).into()),
            (named("decimal"), Decimal::ZERO.into()),
            (named("decimal"), Decimal::new(-1050, 2).into()),
            (named("date"), "2020-02-29".into()),
            (named("date"), NaiveDate::from_ymd_opt(12000, 2, 29).unwrap().into()),
            (named("datetime"), "2020-02-29T10:11:12.345678Z".into()),
            (named("datetime"), far_future.into()),
            (named("value"), json!({"nested": [1, 2]}).into()),
            (named("string_array"), vec!["a", "b"].into()),
            (named("integer_array"), json!([1, null, "3"]).into()),
            (
                TypeTag::array_of(named("integer_array")),
                json!([[1, "2"], [], [null]]).into(),
            ),
        ];
        for (tag, input) in cases {
            let direct = cast_for_runtime(&tag, input.clone(), &config()).unwrap();
            let stored = cast_for_storage(&tag, input, &config()).unwrap();
            let again = cast_for_runtime(&tag, stored.into(), &config()).unwrap();
            assert_eq!(direct, again, "type {}", tag);
        }
    }

    #[test]
    fn test_extended_years_read_back() {
        let tag = TypeTag::DateTime;
        let far_future = Utc.with_ymd_and_hms(12000, 1, 1, 0, 0, 0).unwrap();
        let stored = cast_for_storage(&tag, far_future.into(), &config()).unwrap();
        assert_eq!(stored, json!("+12000-01-01T00:00:00.000Z"));
        assert_eq!(
            cast_for_runtime(&tag, stored.into(), &config()).unwrap(),
            TypedValue::DateTime(far_future)
        );

        assert_eq!(
            runtime("datetime", "-0044-03-15T12:00:00+01:00").unwrap(),
            TypedValue::DateTime(Utc.with_ymd_and_hms(-44, 3, 15, 11, 0, 0).unwrap())
        );
        assert_eq!(
            runtime("date", "+12000-02-29").unwrap(),
            TypedValue::Date(NaiveDate::from_ymd_opt(12000, 2, 29).unwrap())
        );
        assert!(runtime("date", "+12001-02-29").is_err());
        assert!(runtime("datetime", "+-01-01T00:00:00Z").is_err());
    }
}

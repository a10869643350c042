//! Coercion, validation and serialization of scalar attribute values.
//!
//! # Responsibility
//! - `clean`: best-effort coercion of loosely-typed input into the kind's
//!   canonical `Value` variant.
//! - `validate_value`: constraint checks on an already-clean value.
//! - `serialize_value` / `deserialize_value`: the cell representation.
//!
//! # Invariants
//! - Data problems are returned as `InvalidAttribute`, never raised.
//! - Relationship kinds pass through untouched; the store handles them.

use crate::attribute::epoch::{
    date_to_serial, datetime_to_serial, fraction_to_time, is_midnight, parse_datetime,
    parse_time, serial_to_date, serial_to_datetime, time_to_fraction,
};
use crate::attribute::{
    Attribute, AttributeKind, EnumDomain, TextRules, Value, SLUG_PATTERN, URL_CORE_PATTERN,
};
use crate::invalid::InvalidAttribute;
use crate::workbook::Cell;
use chrono::{Datelike, NaiveDate, Timelike};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

pub(crate) static SLUG_RE: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(SLUG_PATTERN)
        .case_insensitive(true)
        .build()
        .expect("valid slug regex")
});
pub(crate) static URL_RE: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(&url_pattern_source(false))
        .case_insensitive(true)
        .build()
        .expect("valid url regex")
});
pub(crate) static URL_OR_EMPTY_RE: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(&url_pattern_source(true))
        .case_insensitive(true)
        .build()
        .expect("valid url regex")
});
static TIME_TEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}:\d{1,2}(:\d{1,2})*$").expect("valid time regex"));

pub(crate) fn url_pattern_source(allow_empty: bool) -> String {
    if allow_empty {
        format!("^(|{URL_CORE_PATTERN})$")
    } else {
        format!("^{URL_CORE_PATTERN}$")
    }
}

const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 9999;
const FLOAT_TOLERANCE: f64 = 1e-10;

/// Float equality: identical, both NaN, or within a relative tolerance of
/// `1e-10` measured against `left`.
///
/// When `left` is exactly zero the relative form is undefined, so the
/// tolerance is applied to `right` as an absolute bound instead. The check
/// stays asymmetric for non-zero operands.
pub fn float_equal(left: f64, right: f64) -> bool {
    if left == right || (left.is_nan() && right.is_nan()) {
        return true;
    }
    if left == 0.0 {
        return right.abs() < FLOAT_TOLERANCE;
    }
    ((left - right) / left).abs() < FLOAT_TOLERANCE
}

/// Renders a number as text without a trailing `.0` for whole values.
pub fn number_to_text(value: f64) -> String {
    format!("{value}")
}

fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

fn whole_number(value: f64) -> Option<i64> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15 {
        Some(value as i64)
    } else {
        None
    }
}

impl Attribute {
    /// Value an instance starts with when no keyword is supplied.
    pub fn initial_value(&self) -> Value {
        if let Some(default) = &self.default {
            return default.produce();
        }
        match &self.kind {
            AttributeKind::Float { .. } => Value::Float(f64::NAN),
            AttributeKind::Text(_) => Value::String(String::new()),
            AttributeKind::Boolean => Value::Bool(false),
            _ => Value::None,
        }
    }

    /// Coerces `raw` into the canonical value of this attribute's kind.
    pub fn clean(&self, raw: &Value) -> Result<Value, InvalidAttribute> {
        let outcome = match &self.kind {
            AttributeKind::Boolean => clean_boolean(raw),
            AttributeKind::Enum(domain) => clean_enum(domain, raw),
            AttributeKind::Integer { .. } | AttributeKind::PositiveInteger { .. } => {
                clean_integer(raw)
            }
            AttributeKind::Float { .. } => clean_float(raw),
            AttributeKind::Text(_) => Ok(clean_text(raw)),
            AttributeKind::Date { .. } => clean_date(raw),
            AttributeKind::Time { .. } => clean_time(raw),
            AttributeKind::DateTime { .. } => clean_datetime(raw),
            AttributeKind::Related(_) => Ok(raw.clone()),
        };
        outcome.map_err(|message| self.invalid(vec![message]))
    }

    /// Checks constraints on an already-clean value.
    pub fn validate_value(&self, value: &Value) -> Option<InvalidAttribute> {
        let errors = match &self.kind {
            AttributeKind::Boolean => match value {
                Value::None | Value::Bool(_) => Vec::new(),
                _ => vec!["Value must be an instance of `bool` or `None`".to_string()],
            },
            AttributeKind::Enum(domain) => validate_enum(domain, value),
            AttributeKind::Integer { min, max } => validate_integer(value, *min, *max),
            AttributeKind::PositiveInteger { max } => {
                let mut errors = validate_integer(value, None, *max);
                if let Value::Integer(number) = value {
                    if *number <= 0 {
                        errors.push("Value must be positive".to_string());
                    }
                }
                errors
            }
            AttributeKind::Float { min, max, nan } => validate_float(value, *min, *max, *nan),
            AttributeKind::Text(rules) => validate_text(rules, self.primary, value),
            AttributeKind::Date { none } => match value {
                Value::None => none_error(*none),
                Value::Date(date) => year_error(date.year()),
                _ => vec!["Value must be an instance of `date`".to_string()],
            },
            AttributeKind::Time { none } => match value {
                Value::None => none_error(*none),
                Value::Time(time) => {
                    if time.nanosecond() != 0 {
                        vec!["Microsecond must be 0".to_string()]
                    } else {
                        Vec::new()
                    }
                }
                _ => vec!["Value must be an instance of `time`".to_string()],
            },
            AttributeKind::DateTime { none } => match value {
                Value::None => none_error(*none),
                Value::DateTime(datetime) => {
                    let mut errors = year_error(datetime.year());
                    if datetime.nanosecond() != 0 {
                        errors.push("Microsecond must be 0".to_string());
                    }
                    errors
                }
                _ => vec!["Value must be an instance of `datetime`".to_string()],
            },
            AttributeKind::Related(_) => Vec::new(),
        };

        if errors.is_empty() {
            None
        } else {
            Some(self.invalid(errors))
        }
    }

    /// Canonical cell representation of a clean value.
    pub fn serialize_value(&self, value: &Value) -> Cell {
        match (&self.kind, value) {
            (_, Value::None) => Cell::Empty,
            (AttributeKind::Float { .. }, Value::Float(number)) if number.is_nan() => Cell::Empty,
            (_, Value::Bool(flag)) => Cell::Bool(*flag),
            (_, Value::Integer(number)) => Cell::Number(*number as f64),
            (_, Value::Float(number)) => Cell::Number(*number),
            (_, Value::String(text)) | (_, Value::Enum(text)) => Cell::Text(text.clone()),
            (_, Value::Date(date)) => Cell::Number(date_to_serial(*date)),
            (_, Value::Time(time)) => Cell::Number(time_to_fraction(*time)),
            (_, Value::DateTime(datetime)) => Cell::Number(datetime_to_serial(*datetime)),
        }
    }

    /// Parses a cell back into a clean value.
    pub fn deserialize_value(&self, cell: &Cell) -> Result<Value, InvalidAttribute> {
        self.clean(&Value::from(cell.clone()))
    }

    /// Semantic equality under this attribute's kind.
    pub fn value_equal(&self, left: &Value, right: &Value) -> bool {
        match (left, right) {
            (Value::Float(a), Value::Float(b)) => float_equal(*a, *b),
            _ => left == right,
        }
    }

    /// Key used to detect repeated values of a `unique` attribute.
    pub fn unique_key(&self, value: &Value) -> Option<String> {
        match value {
            Value::None => None,
            Value::Float(number) if number.is_nan() => None,
            other => {
                let key = match self.serialize_value(other) {
                    Cell::Text(text) => text,
                    Cell::Number(number) => number_to_text(number),
                    cell => cell.to_string(),
                };
                if self.unique_case_insensitive {
                    Some(key.to_lowercase())
                } else {
                    Some(key)
                }
            }
        }
    }
}

fn none_error(allowed: bool) -> Vec<String> {
    if allowed {
        Vec::new()
    } else {
        vec!["Value cannot be `None`".to_string()]
    }
}

fn year_error(year: i32) -> Vec<String> {
    if (MIN_YEAR..=MAX_YEAR).contains(&year) {
        Vec::new()
    } else {
        vec![format!("Year must be between {MIN_YEAR} and {MAX_YEAR}")]
    }
}

fn clean_boolean(raw: &Value) -> Result<Value, String> {
    let cleaned = match raw {
        Value::None => Some(Value::None),
        Value::Bool(flag) => Some(Value::Bool(*flag)),
        Value::String(text) => match text.as_str() {
            "" => Some(Value::None),
            "true" | "True" | "TRUE" | "1" => Some(Value::Bool(true)),
            "false" | "False" | "FALSE" | "0" => Some(Value::Bool(false)),
            other => match parse_number(other) {
                Some(number) if number.is_nan() => Some(Value::None),
                Some(number) if number == 0.0 => Some(Value::Bool(false)),
                Some(number) if number == 1.0 => Some(Value::Bool(true)),
                _ => None,
            },
        },
        Value::Integer(0) => Some(Value::Bool(false)),
        Value::Integer(1) => Some(Value::Bool(true)),
        Value::Float(number) if number.is_nan() => Some(Value::None),
        Value::Float(number) if *number == 0.0 => Some(Value::Bool(false)),
        Value::Float(number) if *number == 1.0 => Some(Value::Bool(true)),
        _ => None,
    };
    cleaned.ok_or_else(|| "Value must be a `bool` or `None`".to_string())
}

fn clean_enum(domain: &EnumDomain, raw: &Value) -> Result<Value, String> {
    let not_convertible = |shown: &dyn std::fmt::Display| {
        format!(
            "Value \"{shown}\" is not convertible to an instance of {} which contains {}",
            domain.name,
            domain.member_names()
        )
    };
    match raw {
        Value::None => Ok(Value::None),
        Value::Enum(member) | Value::String(member) => {
            if domain.contains(member) {
                return Ok(Value::Enum(member.clone()));
            }
            match parse_number(member).and_then(whole_number) {
                Some(ordinal) => domain
                    .by_ordinal(ordinal)
                    .map(|name| Value::Enum(name.to_string()))
                    .ok_or_else(|| not_convertible(member)),
                None => Err(not_convertible(member)),
            }
        }
        Value::Integer(ordinal) => domain
            .by_ordinal(*ordinal)
            .map(|name| Value::Enum(name.to_string()))
            .ok_or_else(|| not_convertible(ordinal)),
        Value::Float(number) => whole_number(*number)
            .and_then(|ordinal| domain.by_ordinal(ordinal))
            .map(|name| Value::Enum(name.to_string()))
            .ok_or_else(|| not_convertible(number)),
        other => Err(not_convertible(other)),
    }
}

fn validate_enum(domain: &EnumDomain, value: &Value) -> Vec<String> {
    match value {
        Value::None => Vec::new(),
        Value::Enum(member) if domain.contains(member) => Vec::new(),
        other => vec![format!(
            "Value '{other}' must be an instance of `{}` which contains {}",
            domain.name,
            domain.member_names()
        )],
    }
}

fn clean_integer(raw: &Value) -> Result<Value, String> {
    let number = match raw {
        Value::None => return Ok(Value::None),
        Value::String(text) if text.is_empty() => return Ok(Value::None),
        Value::Integer(number) => return Ok(Value::Integer(*number)),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        Value::Float(number) => Some(*number),
        Value::String(text) => parse_number(text),
        _ => None,
    };
    number
        .and_then(whole_number)
        .map(Value::Integer)
        .ok_or_else(|| "Value must be an integer".to_string())
}

fn validate_integer(value: &Value, min: Option<i64>, max: Option<i64>) -> Vec<String> {
    let mut errors = Vec::new();
    match value {
        Value::None => {
            if min.is_some() || max.is_some() {
                errors.push("Value cannot be None".to_string());
            }
        }
        Value::Integer(number) => {
            if let Some(min) = min {
                if *number < min {
                    errors.push(format!("Value must be at least {min}"));
                }
            }
            if let Some(max) = max {
                if *number > max {
                    errors.push(format!("Value must be at most {max}"));
                }
            }
        }
        _ => errors.push("Value must be an instance of `int` or `None`".to_string()),
    }
    errors
}

fn clean_float(raw: &Value) -> Result<Value, String> {
    match raw {
        Value::None => Ok(Value::Float(f64::NAN)),
        Value::String(text) if text.is_empty() => Ok(Value::Float(f64::NAN)),
        Value::Float(number) => Ok(Value::Float(*number)),
        Value::Integer(number) => Ok(Value::Float(*number as f64)),
        Value::Bool(flag) => Ok(Value::Float(if *flag { 1.0 } else { 0.0 })),
        Value::String(text) => parse_number(text)
            .map(Value::Float)
            .ok_or_else(|| "Value must be a `float`".to_string()),
        _ => Err("Value must be a `float`".to_string()),
    }
}

fn validate_float(value: &Value, min: f64, max: f64, nan: bool) -> Vec<String> {
    let mut errors = Vec::new();
    match value {
        Value::Float(number) => {
            if !nan && number.is_nan() {
                errors.push("Value cannot be `nan`".to_string());
            }
            if !min.is_nan() && !number.is_nan() && *number < min {
                errors.push(format!("Value must be at least {min}"));
            }
            if !max.is_nan() && !number.is_nan() && *number > max {
                errors.push(format!("Value must be at most {max}"));
            }
        }
        _ => errors.push("Value must be an instance of `float`".to_string()),
    }
    errors
}

fn clean_text(raw: &Value) -> Value {
    match raw {
        Value::None => Value::String(String::new()),
        Value::String(text) => Value::String(text.clone()),
        Value::Float(number) => Value::String(number_to_text(*number)),
        other => Value::String(other.to_string()),
    }
}

fn validate_text(rules: &TextRules, primary: bool, value: &Value) -> Vec<String> {
    let mut errors = Vec::new();
    let Value::String(text) = value else {
        errors.push("Value must be an instance of `str`".to_string());
        return errors;
    };

    let length = text.chars().count();
    if rules.min_length > 0 && length < rules.min_length {
        errors.push(format!(
            "Value must be at least {} characters",
            rules.min_length
        ));
    }
    if let Some(max_length) = rules.max_length {
        if max_length > 0 && length > max_length {
            errors.push(format!("Value must be less than {max_length} characters"));
        }
    }
    if primary && text.is_empty() {
        errors.push(format!(
            "{} value for primary attribute cannot be empty",
            rules.flavor.class_name()
        ));
    }
    if let Some(pattern) = &rules.pattern {
        if !pattern.regex.is_match(text) {
            errors.push(format!(
                "Value '{text}' does not match pattern: {}",
                pattern.source
            ));
        }
    }
    errors
}

fn clean_date(raw: &Value) -> Result<Value, String> {
    match raw {
        Value::None => Ok(Value::None),
        Value::String(text) if text.trim().is_empty() => Ok(Value::None),
        Value::Date(date) => Ok(Value::Date(*date)),
        Value::DateTime(datetime) => {
            if is_midnight(datetime.time()) {
                Ok(Value::Date(datetime.date()))
            } else {
                Err("Time must be 0:0:0.0".to_string())
            }
        }
        Value::String(text) => match parse_datetime(text) {
            Some(datetime) if is_midnight(datetime.time()) => Ok(Value::Date(datetime.date())),
            Some(_) => Err("Time must be 0:0:0.0".to_string()),
            None => Err("String must be a valid date".to_string()),
        },
        Value::Integer(days) => serial_date(*days),
        Value::Float(number) => match whole_number(*number) {
            Some(days) => serial_date(days),
            None => Err("Value must be an instance of `date`".to_string()),
        },
        _ => Err("Value must be an instance of `date`".to_string()),
    }
}

fn serial_date(days: i64) -> Result<Value, String> {
    serial_to_date(days)
        .map(Value::Date)
        .ok_or_else(|| "Value must be an instance of `date`".to_string())
}

fn clean_time(raw: &Value) -> Result<Value, String> {
    match raw {
        Value::None => Ok(Value::None),
        Value::String(text) if text.trim().is_empty() => Ok(Value::None),
        Value::Time(time) => Ok(Value::Time(*time)),
        Value::String(text) => {
            if !TIME_TEXT_RE.is_match(text.trim()) {
                return Err("String must be a valid time".to_string());
            }
            parse_time(text)
                .map(Value::Time)
                .ok_or_else(|| "String must be a valid time".to_string())
        }
        Value::Float(number) => fraction_to_time(*number)
            .map(Value::Time)
            .ok_or_else(|| "Number must be a valid time".to_string()),
        Value::Integer(number) => fraction_to_time(*number as f64)
            .map(Value::Time)
            .ok_or_else(|| "Number must be a valid time".to_string()),
        _ => Err("Value must be an instance of `time`".to_string()),
    }
}

fn clean_datetime(raw: &Value) -> Result<Value, String> {
    match raw {
        Value::None => Ok(Value::None),
        Value::String(text) if text.trim().is_empty() => Ok(Value::None),
        Value::DateTime(datetime) => Ok(Value::DateTime(*datetime)),
        Value::Date(date) => date
            .and_hms_opt(0, 0, 0)
            .map(Value::DateTime)
            .ok_or_else(|| "Value must be an instance of `datetime`".to_string()),
        Value::String(text) => parse_datetime(text)
            .map(Value::DateTime)
            .ok_or_else(|| "String must be a valid datetime".to_string()),
        Value::Float(number) => serial_to_datetime(*number)
            .map(Value::DateTime)
            .ok_or_else(|| "Number must be a valid datetime".to_string()),
        Value::Integer(number) => serial_to_datetime(*number as f64)
            .map(Value::DateTime)
            .ok_or_else(|| "Number must be a valid datetime".to_string()),
        _ => Err("Value must be an instance of `datetime`".to_string()),
    }
}

/// Earliest date accepted by date attributes.
pub fn min_date() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(MIN_YEAR, 1, 1)
}

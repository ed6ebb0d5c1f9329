// String-to-typed conversion for column values. Failures are reported, never thrown.
use base64::{Engine, engine::general_purpose};
use serde_json::{Number, Value as JsonValue};
use time::format_description::OwnedFormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};
use uuid::Uuid;

use crate::core::column::{Column, ColumnKind, DateStyle, Locale, NumberStyle};

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    DateTime(OffsetDateTime),
    Uuid(Uuid),
    Binary(Vec<u8>),
}

impl Value {
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Text(text) => JsonValue::String(text.clone()),
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(n) => JsonValue::from(*n),
            Value::UInt(n) => JsonValue::from(*n),
            Value::Float(f) => Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::DateTime(dt) => JsonValue::String(
                dt.format(&Rfc3339)
                    .unwrap_or_else(|_| dt.to_string()),
            ),
            Value::Uuid(id) => JsonValue::String(id.to_string()),
            Value::Binary(bytes) => JsonValue::String(general_purpose::STANDARD.encode(bytes)),
        }
    }
}

/// Outcome of a conversion. On failure `value` holds the raw text and `ok` is false.
#[derive(Clone, Debug, PartialEq)]
pub struct Converted {
    pub value: Value,
    pub ok: bool,
}

impl Converted {
    pub fn ok(value: Value) -> Self {
        Self { value, ok: true }
    }

    pub fn failed(raw: &str) -> Self {
        Self {
            value: Value::Text(raw.to_string()),
            ok: false,
        }
    }
}

/// `format` is the column's compiled exact date format, if any.
pub fn convert(column: &Column, format: Option<&OwnedFormatItem>, raw: &str) -> Converted {
    let value = match column.kind {
        ColumnKind::Text => Some(Value::Text(raw.to_string())),
        ColumnKind::Boolean => parse_bool(raw, column),
        ColumnKind::Int8 => parse_signed(raw, column, i8::MIN.into(), i8::MAX.into()),
        ColumnKind::Int16 => parse_signed(raw, column, i16::MIN.into(), i16::MAX.into()),
        ColumnKind::Int32 => parse_signed(raw, column, i32::MIN.into(), i32::MAX.into()),
        ColumnKind::Int64 => parse_signed(raw, column, i64::MIN.into(), i64::MAX.into()),
        ColumnKind::UInt8 => parse_unsigned(raw, column, u8::MAX.into()),
        ColumnKind::UInt16 => parse_unsigned(raw, column, u16::MAX.into()),
        ColumnKind::UInt32 => parse_unsigned(raw, column, u32::MAX.into()),
        ColumnKind::UInt64 => parse_unsigned(raw, column, u64::MAX.into()),
        ColumnKind::Float32 => parse_float(raw, column)
            .filter(|f| !f.is_finite() || f.abs() <= f64::from(f32::MAX))
            .map(|f| Value::Float(f64::from(f as f32))),
        ColumnKind::Float64 => parse_float(raw, column).map(Value::Float),
        ColumnKind::DateTime => parse_date_time(raw, column.date_style, format).map(Value::DateTime),
        ColumnKind::Uuid => Uuid::parse_str(raw.trim()).ok().map(Value::Uuid),
        ColumnKind::Binary => general_purpose::STANDARD
            .decode(raw.trim())
            .ok()
            .map(Value::Binary),
        ColumnKind::Unknown => None,
    };
    match value {
        Some(value) => Converted::ok(value),
        None => Converted::failed(raw),
    }
}

fn parse_bool(raw: &str, column: &Column) -> Option<Value> {
    if let Some(n) = parse_integer(raw, &column.locale, column.effective_number_style()) {
        return Some(Value::Bool(n != 0));
    }
    let text = raw.trim();
    if text.eq_ignore_ascii_case("true") {
        Some(Value::Bool(true))
    } else if text.eq_ignore_ascii_case("false") {
        Some(Value::Bool(false))
    } else {
        None
    }
}

fn parse_signed(raw: &str, column: &Column, min: i128, max: i128) -> Option<Value> {
    let n = parse_integer(raw, &column.locale, column.effective_number_style())?;
    if n < min || n > max {
        return None;
    }
    i64::try_from(n).ok().map(Value::Int)
}

fn parse_unsigned(raw: &str, column: &Column, max: u128) -> Option<Value> {
    let n = parse_integer(raw, &column.locale, column.effective_number_style())?;
    let n = u128::try_from(n).ok()?;
    if n > max {
        return None;
    }
    u64::try_from(n).ok().map(Value::UInt)
}

fn parse_integer(raw: &str, locale: &Locale, style: NumberStyle) -> Option<i128> {
    if style.hex {
        let text = strip_white(raw, style)?;
        return u64::from_str_radix(text, 16).ok().map(i128::from);
    }
    let normalized = normalize_number(raw, locale, style)?;
    if normalized.contains(['.', 'e']) {
        let f: f64 = normalized.parse().ok()?;
        if !f.is_finite() || f.fract() != 0.0 || f.abs() > 1e38 {
            return None;
        }
        return Some(f as i128);
    }
    normalized.parse::<i128>().ok()
}

fn parse_float(raw: &str, column: &Column) -> Option<f64> {
    let style = column.effective_number_style();
    let text = strip_white(raw, style)?;
    match text {
        "NaN" => return Some(f64::NAN),
        "Infinity" => return Some(f64::INFINITY),
        "-Infinity" => return Some(f64::NEG_INFINITY),
        _ => {}
    }
    normalize_number(raw, &column.locale, style)?.parse().ok()
}

fn strip_white(raw: &str, style: NumberStyle) -> Option<&str> {
    let start = raw.trim_start();
    if start.len() != raw.len() && !style.leading_white {
        return None;
    }
    let text = start.trim_end();
    if text.len() != start.len() && !style.trailing_white {
        return None;
    }
    Some(text)
}

/// Rewrites locale-formatted digits into the syntax Rust's number parsers accept.
fn normalize_number(raw: &str, locale: &Locale, style: NumberStyle) -> Option<String> {
    let text = strip_white(raw, style)?;
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    if let Some(&sign) = chars.peek() {
        if sign == '+' || sign == '-' {
            if !style.leading_sign {
                return None;
            }
            if sign == '-' {
                out.push('-');
            }
            chars.next();
        }
    }

    let mut digits = 0usize;
    let mut seen_decimal = false;
    let mut seen_exponent = false;
    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            out.push(c);
            digits += 1;
        } else if c == locale.decimal_separator
            && style.decimal_point
            && !seen_decimal
            && !seen_exponent
        {
            out.push('.');
            seen_decimal = true;
        } else if c == locale.group_separator
            && style.thousands
            && !seen_decimal
            && !seen_exponent
            && digits > 0
        {
            continue;
        } else if (c == 'e' || c == 'E') && style.exponent && !seen_exponent && digits > 0 {
            out.push('e');
            seen_exponent = true;
            if let Some(&sign) = chars.peek() {
                if sign == '+' || sign == '-' {
                    out.push(sign);
                    chars.next();
                }
            }
        } else {
            return None;
        }
    }
    if digits == 0 {
        return None;
    }
    Some(out)
}

fn parse_date_time(
    raw: &str,
    style: DateStyle,
    format: Option<&OwnedFormatItem>,
) -> Option<OffsetDateTime> {
    let text = if style.allow_white { raw.trim() } else { raw };
    if text.is_empty() {
        return None;
    }
    let parsed = match format {
        Some(format) => parse_exact(text, format),
        None => parse_general(text),
    }?;
    if style.adjust_to_utc {
        Some(parsed.to_offset(UtcOffset::UTC))
    } else {
        Some(parsed)
    }
}

fn parse_exact(text: &str, format: &OwnedFormatItem) -> Option<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(text, format) {
        return Some(value);
    }
    if let Ok(value) = PrimitiveDateTime::parse(text, format) {
        return Some(value.assume_utc());
    }
    Date::parse(text, format)
        .ok()
        .map(|date| date.midnight().assume_utc())
}

fn parse_general(text: &str) -> Option<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(text, &Rfc3339) {
        return Some(value);
    }
    let date_times = [
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        format_description!("[year]-[month]-[day] [hour]:[minute]"),
        format_description!("[month]/[day]/[year] [hour]:[minute]:[second]"),
    ];
    for format in date_times {
        if let Ok(value) = PrimitiveDateTime::parse(text, format) {
            return Some(value.assume_utc());
        }
    }
    let dates = [
        format_description!("[year]-[month]-[day]"),
        format_description!("[year]/[month]/[day]"),
        format_description!("[month]/[day]/[year]"),
    ];
    for format in dates {
        if let Ok(date) = Date::parse(text, format) {
            return Some(date.midnight().assume_utc());
        }
    }
    None
}

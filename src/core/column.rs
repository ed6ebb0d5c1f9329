// Per-field metadata and the registry that converts field text into typed values.
use serde::{Deserialize, Serialize};
use time::format_description::{self, OwnedFormatItem};

use crate::core::convert::{self, Converted, Value};
use crate::core::error::{Error, invalid_config};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    #[default]
    Text,
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    #[serde(rename = "uint8")]
    UInt8,
    #[serde(rename = "uint16")]
    UInt16,
    #[serde(rename = "uint32")]
    UInt32,
    #[serde(rename = "uint64")]
    UInt64,
    Float32,
    Float64,
    DateTime,
    Uuid,
    Binary,
    /// Any type name the engine cannot convert to.
    #[serde(other)]
    Unknown,
}

impl ColumnKind {
    pub fn is_float(self) -> bool {
        matches!(self, ColumnKind::Float32 | ColumnKind::Float64)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Locale {
    pub decimal_separator: char,
    pub group_separator: char,
}

impl Locale {
    pub const INVARIANT: Locale = Locale {
        decimal_separator: '.',
        group_separator: ',',
    };

    pub fn new(decimal_separator: char, group_separator: char) -> Self {
        Self {
            decimal_separator,
            group_separator,
        }
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self::INVARIANT
    }
}

/// Syntax accepted when parsing numbers.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NumberStyle {
    pub leading_white: bool,
    pub trailing_white: bool,
    pub leading_sign: bool,
    pub decimal_point: bool,
    pub thousands: bool,
    pub exponent: bool,
    pub hex: bool,
}

impl NumberStyle {
    pub const NONE: NumberStyle = NumberStyle {
        leading_white: false,
        trailing_white: false,
        leading_sign: false,
        decimal_point: false,
        thousands: false,
        exponent: false,
        hex: false,
    };

    pub const INTEGER: NumberStyle = NumberStyle {
        leading_white: true,
        trailing_white: true,
        leading_sign: true,
        ..NumberStyle::NONE
    };

    pub const FLOAT: NumberStyle = NumberStyle {
        decimal_point: true,
        thousands: true,
        exponent: true,
        ..NumberStyle::INTEGER
    };

    pub const HEX: NumberStyle = NumberStyle {
        leading_white: true,
        trailing_white: true,
        hex: true,
        ..NumberStyle::NONE
    };
}

impl Default for NumberStyle {
    fn default() -> Self {
        Self::INTEGER
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DateStyle {
    pub allow_white: bool,
    /// Convert offset-bearing values to UTC. Values without an offset are read as UTC.
    pub adjust_to_utc: bool,
}

impl Default for DateStyle {
    fn default() -> Self {
        Self {
            allow_white: true,
            adjust_to_utc: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub locale: Locale,
    /// Falls back to a per-kind style when unset.
    pub number_style: Option<NumberStyle>,
    pub date_style: DateStyle,
    /// Exact date format in `time` format-description syntax.
    pub format: Option<String>,
    #[serde(skip)]
    pub default_value: Option<Value>,
    #[serde(skip)]
    pub override_value: Option<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
            ..Self::default()
        }
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    pub fn with_number_style(mut self, style: NumberStyle) -> Self {
        self.number_style = Some(style);
        self
    }

    pub fn with_date_style(mut self, style: DateStyle) -> Self {
        self.date_style = style;
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Result<Self, Error> {
        let format = format.into();
        compile_format(&format)?;
        self.format = Some(format);
        Ok(self)
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_override(mut self, value: Value) -> Self {
        self.override_value = Some(value);
        self
    }

    pub fn effective_number_style(&self) -> NumberStyle {
        match self.number_style {
            Some(style) => style,
            None if self.kind.is_float() => NumberStyle::FLOAT,
            None => NumberStyle::INTEGER,
        }
    }
}

/// Tabular metadata row exported for adapters.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ColumnSchema {
    pub name: String,
    pub ordinal: usize,
    pub kind: ColumnKind,
}

/// Ordered columns plus their compiled date formats, scoped to one reader.
#[derive(Debug, Default)]
pub struct ColumnRegistry {
    columns: Vec<Column>,
    formats: Vec<Option<OwnedFormatItem>>,
}

impl ColumnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_columns(columns: Vec<Column>) -> Result<Self, Error> {
        let mut registry = Self::new();
        for column in columns {
            registry.push(column)?;
        }
        Ok(registry)
    }

    pub fn push(&mut self, column: Column) -> Result<(), Error> {
        let format = column.format.as_deref().map(compile_format).transpose()?;
        self.columns.push(column);
        self.formats.push(format);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub(crate) fn rename(&mut self, index: usize, name: String) -> Result<(), Error> {
        self.column_mut(index)?.name = name;
        Ok(())
    }

    pub fn set_default(&mut self, index: usize, value: Option<Value>) -> Result<(), Error> {
        self.column_mut(index)?.default_value = value;
        Ok(())
    }

    pub fn set_override(&mut self, index: usize, value: Option<Value>) -> Result<(), Error> {
        self.column_mut(index)?.override_value = value;
        Ok(())
    }

    pub fn convert(&self, index: usize, raw: &str) -> Result<Converted, Error> {
        let column = self.columns.get(index).ok_or_else(|| column_out_of_range(index))?;
        let format = self.formats.get(index).and_then(Option::as_ref);
        Ok(convert::convert(column, format, raw))
    }

    pub fn schema(&self) -> Vec<ColumnSchema> {
        self.columns
            .iter()
            .enumerate()
            .map(|(ordinal, column)| ColumnSchema {
                name: column.name.clone(),
                ordinal,
                kind: column.kind,
            })
            .collect()
    }

    fn column_mut(&mut self, index: usize) -> Result<&mut Column, Error> {
        self.columns
            .get_mut(index)
            .ok_or_else(|| column_out_of_range(index))
    }
}

fn column_out_of_range(index: usize) -> Error {
    invalid_config(format!("column index {index} is out of range"))
}

fn compile_format(format: &str) -> Result<OwnedFormatItem, Error> {
    format_description::parse_owned::<1>(format).map_err(|err| {
        invalid_config(format!("invalid date format `{format}`"))
            .with_hint("Use time format descriptions such as [year]-[month]-[day].")
            .with_source(err)
    })
}

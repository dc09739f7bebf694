//! Conversion between the wire form of field values and their plain form.
//!
//! The API represents select values as `{"id", "value"}` objects and links as
//! lists of `{"id", ...}` objects. Calling code works with the plain form:
//! the option's display value (or, when writing, its ID) and lists of row IDs.

use std::fmt;

use serde_json::Value;

use crate::field::{Field, FieldKind, SelectOption};

/// A row, keyed by field name.
pub type Row = serde_json::Map<String, Value>;

/// An error converting a field value.
#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    /// A value doesn't have the shape its field type requires.
    #[error("Malformed {kind} value for field {field:?}: {value}")]
    Malformed {
        /// The field name.
        field: String,
        /// The field type.
        kind: &'static str,
        /// The offending value.
        value: Value,
    },
    /// A select value matches none of the field's options.
    #[error("Could not convert {value} to any of {options} for field {field:?}")]
    UnknownOption {
        /// The field name.
        field: String,
        /// The offending value.
        value: Value,
        /// The options that were available.
        options: OptionList,
    },
}

/// The option set of a select field, as reported in errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionList(pub Vec<SelectOption>);

impl fmt::Display for OptionList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, opt) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} ({:?})", opt.id, opt.value)?;
        }
        f.write_str("]")
    }
}

/// Convert a value read from the API into its plain form.
pub fn format_value(raw: Value, field: &Field) -> Result<Value, ValueError> {
    let malformed = |kind, value| ValueError::Malformed {
        field: field.name.clone(),
        kind,
        value,
    };

    match &field.kind {
        FieldKind::SingleSelect { .. } => match raw {
            Value::Null => Ok(Value::Null),
            Value::Object(mut obj) => match obj.remove("value") {
                Some(v) => Ok(v),
                None => Err(malformed("single_select", Value::Object(obj))),
            },
            other => Err(malformed("single_select", other)),
        },
        FieldKind::MultipleSelect { .. } => {
            pluck_all(raw, "value").map_err(|v| malformed("multiple_select", v))
        }
        FieldKind::LinkRow { .. } => pluck_all(raw, "id").map_err(|v| malformed("link_row", v)),
        FieldKind::Other(_) => Ok(raw),
    }
}

/// Takes `key` out of every object in a list. On failure, the input
/// value is handed back.
fn pluck_all(raw: Value, key: &str) -> Result<Value, Value> {
    let Value::Array(items) = raw else {
        return Err(raw);
    };

    if !items
        .iter()
        .all(|item| item.as_object().is_some_and(|o| o.contains_key(key)))
    {
        return Err(Value::Array(items));
    }

    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(mut obj) => obj.remove(key),
            _ => None,
        })
        .collect())
}

/// Convert a row read from the API into its plain form. Keys that don't name
/// one of `fields` are dropped.
pub fn format_row(row: Row, fields: &[Field]) -> Result<Row, ValueError> {
    row.into_iter()
        .filter_map(|(name, raw)| {
            let field = fields.iter().find(|f| f.name == name)?;
            Some(format_value(raw, field).map(|v| (name, v)))
        })
        .collect()
}

/// Convert the select values in `row` from their display value into the
/// option IDs the API accepts when writing, returning a converted copy.
///
/// Integers are assumed to be option IDs already. Null and empty lists are
/// left alone, so that they can clear a field. A multiple select value must
/// otherwise be a list. Read-only fields, and fields of other types, are
/// passed through untouched.
pub fn convert_selects(row: &Row, fields: &[Field]) -> Result<Row, ValueError> {
    let mut converted = row.clone();

    for field in fields.iter().filter(|f| !f.read_only) {
        let Some(current) = converted.get_mut(&field.name) else {
            continue;
        };

        if is_clear(current) {
            continue;
        }

        match &field.kind {
            FieldKind::SingleSelect { options } => {
                *current = convert_option(current, options, field)?;
            }
            FieldKind::MultipleSelect { options } => {
                let Value::Array(values) = &*current else {
                    return Err(ValueError::Malformed {
                        field: field.name.clone(),
                        kind: "multiple_select",
                        value: current.clone(),
                    });
                };

                let ids = values
                    .iter()
                    .map(|v| convert_option(v, options, field))
                    .collect::<Result<Vec<_>, _>>()?;
                *current = Value::Array(ids);
            }
            _ => (),
        }
    }

    Ok(converted)
}

fn is_clear(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(v) => v.is_empty(),
        _ => false,
    }
}

fn convert_option(
    value: &Value,
    options: &[SelectOption],
    field: &Field,
) -> Result<Value, ValueError> {
    if value.is_i64() || value.is_u64() {
        return Ok(value.clone());
    }

    options
        .iter()
        .find(|opt| value.as_str() == Some(opt.value.as_str()))
        .map(|opt| Value::from(opt.id))
        .ok_or_else(|| ValueError::UnknownOption {
            field: field.name.clone(),
            value: value.clone(),
            options: OptionList(options.to_vec()),
        })
}

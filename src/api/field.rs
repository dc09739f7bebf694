//! API operations concerning table fields (the schema).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::api::{ApiRequest, JsonResponse};

/// List all fields of a table.
#[derive(Debug, Clone, Copy)]
pub struct GetFields {
    /// The table to fetch the fields for.
    pub table_id: u64,
}

impl ApiRequest for GetFields {
    type Response = Vec<Field>;

    fn path(&self) -> String {
        format!("/api/database/fields/table/{}/", self.table_id)
    }
}

impl JsonResponse for Vec<Field> {}

/// One option of a select field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SelectOption {
    /// The option ID. This is what the API expects when writing.
    pub id: u64,
    /// The display value.
    pub value: String,
    /// The display color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// The type of a field, with the data relevant to that type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// `single_select`: one of a set of options.
    SingleSelect {
        /// The available options.
        options: Vec<SelectOption>,
    },
    /// `multiple_select`: any number of a set of options.
    MultipleSelect {
        /// The available options.
        options: Vec<SelectOption>,
    },
    /// `link_row`: references to rows in another table.
    LinkRow {
        /// The table the linked rows live in.
        table_id: u64,
    },
    /// Any other field type, with values passed through as-is.
    Other(String),
}

impl FieldKind {
    /// The type tag used by the API.
    pub fn type_name(&self) -> &str {
        match self {
            FieldKind::SingleSelect { .. } => "single_select",
            FieldKind::MultipleSelect { .. } => "multiple_select",
            FieldKind::LinkRow { .. } => "link_row",
            FieldKind::Other(name) => name,
        }
    }

    /// The select options, for select fields.
    pub fn select_options(&self) -> Option<&[SelectOption]> {
        match self {
            FieldKind::SingleSelect { options } | FieldKind::MultipleSelect { options } => {
                Some(options)
            }
            _ => None,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A field (column) of a table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "RawField", into = "RawField")]
pub struct Field {
    /// The field ID.
    pub id: u64,
    /// The field name, unique within the table.
    pub name: String,
    /// Whether the field is computed by the service and can't be written.
    pub read_only: bool,
    /// Whether this is the primary field of the table.
    pub primary: bool,
    /// The field type.
    pub kind: FieldKind,
}

/// The wire shape of a field.
#[derive(Debug, Clone, Deserialize, Serialize)]
struct RawField {
    id: u64,
    name: String,
    r#type: String,
    #[serde(default)]
    read_only: bool,
    #[serde(default)]
    primary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    select_options: Option<Vec<SelectOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    link_row_table_id: Option<u64>,
}

impl TryFrom<RawField> for Field {
    type Error = String;

    fn try_from(raw: RawField) -> Result<Self, Self::Error> {
        let RawField {
            id,
            name,
            r#type,
            read_only,
            primary,
            select_options,
            link_row_table_id,
        } = raw;

        let kind = match r#type.as_str() {
            "single_select" => FieldKind::SingleSelect {
                options: select_options.unwrap_or_default(),
            },
            "multiple_select" => FieldKind::MultipleSelect {
                options: select_options.unwrap_or_default(),
            },
            "link_row" => FieldKind::LinkRow {
                table_id: link_row_table_id
                    .ok_or_else(|| format!("link_row field {name:?} has no link_row_table_id"))?,
            },
            _ => FieldKind::Other(r#type),
        };

        Ok(Field {
            id,
            name,
            read_only,
            primary,
            kind,
        })
    }
}

impl From<Field> for RawField {
    fn from(field: Field) -> Self {
        let Field {
            id,
            name,
            read_only,
            primary,
            kind,
        } = field;

        let r#type = kind.type_name().to_owned();
        let (select_options, link_row_table_id) = match kind {
            FieldKind::SingleSelect { options } | FieldKind::MultipleSelect { options } => {
                (Some(options), None)
            }
            FieldKind::LinkRow { table_id } => (None, Some(table_id)),
            FieldKind::Other(_) => (None, None),
        };

        RawField {
            id,
            name,
            r#type,
            read_only,
            primary,
            select_options,
            link_row_table_id,
        }
    }
}

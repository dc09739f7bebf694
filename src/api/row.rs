//! API operations concerning table rows.
//!
//! All row requests ask for field-name keyed rows (`user_field_names=true`).

use serde::{Deserialize, Serialize};

use crate::{
    Page, Row,
    api::{ApiRequest, JsonResponse, NoContent, UserFieldNames},
};

/// A row as returned by the API, in wire form.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WireRow {
    /// The row ID.
    pub id: u64,
    /// The remaining values, keyed by field name. Besides the table's
    /// fields, this includes bookkeeping keys like `order`.
    #[serde(flatten)]
    pub values: Row,
}

impl JsonResponse for WireRow {}

/// Just the ID of a created or updated row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RowId {
    /// The row ID.
    pub id: u64,
}

impl JsonResponse for RowId {}

/// The response to a batch create or update.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchRows {
    /// The affected rows, in request order.
    pub items: Vec<RowId>,
}

impl JsonResponse for BatchRows {}

/// List the rows of a table, one page at a time. Use with
/// [paginate](crate::paginate) to fetch all of them.
#[derive(Debug, Clone, Copy)]
pub struct ListRows {
    /// The table to list.
    pub table_id: u64,
}

impl ApiRequest for ListRows {
    type Response = Page<WireRow>;

    fn path(&self) -> String {
        format!("/api/database/rows/table/{}/", self.table_id)
    }

    fn query(&self) -> Option<impl Serialize> {
        Some(UserFieldNames::ON)
    }
}

/// Fetch a single row.
#[derive(Debug, Clone, Copy)]
pub struct GetRow {
    /// The table the row is in.
    pub table_id: u64,
    /// The row to fetch.
    pub row_id: u64,
}

impl ApiRequest for GetRow {
    type Response = WireRow;

    fn path(&self) -> String {
        format!("/api/database/rows/table/{}/{}/", self.table_id, self.row_id)
    }

    fn query(&self) -> Option<impl Serialize> {
        Some(UserFieldNames::ON)
    }
}

/// Create a row.
#[derive(Debug, Clone, Copy)]
pub struct CreateRow<'a> {
    /// The table to create the row in.
    pub table_id: u64,
    /// The values of the new row, keyed by field name.
    pub values: &'a Row,
}

impl ApiRequest for CreateRow<'_> {
    type Response = RowId;

    fn method(&self) -> http::Method {
        http::Method::POST
    }

    fn path(&self) -> String {
        format!("/api/database/rows/table/{}/", self.table_id)
    }

    fn body(&self) -> Option<impl Serialize> {
        Some(self.values)
    }

    fn query(&self) -> Option<impl Serialize> {
        Some(UserFieldNames::ON)
    }
}

/// Update an existing row. Only the given fields are changed.
#[derive(Debug, Clone, Copy)]
pub struct UpdateRow<'a> {
    /// The table the row is in.
    pub table_id: u64,
    /// The row to update.
    pub row_id: u64,
    /// The values to set, keyed by field name.
    pub values: &'a Row,
}

impl ApiRequest for UpdateRow<'_> {
    type Response = NoContent;

    fn method(&self) -> http::Method {
        http::Method::PATCH
    }

    fn path(&self) -> String {
        format!("/api/database/rows/table/{}/{}/", self.table_id, self.row_id)
    }

    fn body(&self) -> Option<impl Serialize> {
        Some(self.values)
    }

    fn query(&self) -> Option<impl Serialize> {
        Some(UserFieldNames::ON)
    }
}

#[derive(Debug, Serialize)]
struct BatchBody<'a> {
    items: &'a [Row],
}

/// Create many rows in one request.
#[derive(Debug, Clone, Copy)]
pub struct BatchCreateRows<'a> {
    /// The table to create the rows in.
    pub table_id: u64,
    /// The new rows.
    pub items: &'a [Row],
}

impl ApiRequest for BatchCreateRows<'_> {
    type Response = BatchRows;

    fn method(&self) -> http::Method {
        http::Method::POST
    }

    fn path(&self) -> String {
        format!("/api/database/rows/table/{}/batch/", self.table_id)
    }

    fn body(&self) -> Option<impl Serialize> {
        Some(BatchBody { items: self.items })
    }

    fn query(&self) -> Option<impl Serialize> {
        Some(UserFieldNames::ON)
    }
}

/// Update many rows in one request. Every item must carry an `id`.
#[derive(Debug, Clone, Copy)]
pub struct BatchUpdateRows<'a> {
    /// The table the rows are in.
    pub table_id: u64,
    /// The rows to update.
    pub items: &'a [Row],
}

impl ApiRequest for BatchUpdateRows<'_> {
    type Response = BatchRows;

    fn method(&self) -> http::Method {
        http::Method::PATCH
    }

    fn path(&self) -> String {
        format!("/api/database/rows/table/{}/batch/", self.table_id)
    }

    fn body(&self) -> Option<impl Serialize> {
        Some(BatchBody { items: self.items })
    }

    fn query(&self) -> Option<impl Serialize> {
        Some(UserFieldNames::ON)
    }
}

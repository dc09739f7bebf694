//! A blocking client for one Baserow database.

use std::{
    cell::RefCell,
    collections::{BTreeSet, HashMap},
    io::Read,
    rc::Rc,
};

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, trace};

use crate::{
    ApiError, ApiRequest, ApiResponse, Profile, Row, ValueError,
    field::{Field, FieldKind, GetFields},
    paginate,
    row::{BatchCreateRows, BatchRows, BatchUpdateRows, CreateRow, GetRow, ListRows, UpdateRow},
    value::{convert_selects, format_row},
};

/// An error returned by a transport.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// Something that can execute HTTP requests. Timeouts, retries and TLS are
/// the transport's concern.
///
/// Implementations must return non-2xx responses as responses rather than
/// errors, so that the API error body can be read.
pub trait Transport {
    /// Execute a request.
    fn run(&self, req: http::Request<String>)
    -> Result<http::Response<Box<dyn Read>>, TransportError>;
}

impl Transport for ureq::Agent {
    fn run(
        &self,
        req: http::Request<String>,
    ) -> Result<http::Response<Box<dyn Read>>, TransportError> {
        let resp = ureq::Agent::run(self, req)?;
        Ok(resp.map(|body| {
            let reader: Box<dyn Read> = Box::new(body.into_reader());
            reader
        }))
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn run(
        &self,
        req: http::Request<String>,
    ) -> Result<http::Response<Box<dyn Read>>, TransportError> {
        (**self).run(req)
    }
}

/// An error returned by [TableClient].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The API returned an error, or an invalid response.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// A field value couldn't be converted.
    #[error(transparent)]
    Value(#[from] ValueError),
    /// The request couldn't be sent.
    #[error("HTTP transport error")]
    Transport(#[source] TransportError),
    /// The request couldn't be built.
    #[error("Invalid request")]
    Request(#[from] http::Error),
}

/// A client for the tables of one Baserow database.
///
/// Field metadata is fetched once per table and cached for the life of the
/// client; create a new client to pick up schema changes. The cache is not
/// synchronized, so a client can't be shared between threads.
pub struct TableClient<T = ureq::Agent> {
    profile: Profile,
    transport: T,
    fields: RefCell<HashMap<u64, Rc<[Field]>>>,
}

impl<T> std::fmt::Debug for TableClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableClient")
            .field("profile", &self.profile)
            .field("cached_tables", &self.fields.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TableClient {
    /// Create a client using a default [ureq::Agent].
    pub fn new(profile: Profile) -> Self {
        // Allows error responses to be parsed.
        let cfg = ureq::config::Config::builder()
            .http_status_as_error(false)
            .build();

        Self::with_transport(profile, ureq::Agent::new_with_config(cfg))
    }
}

impl<T: Transport> TableClient<T> {
    /// Create a client that sends requests through the given transport.
    pub fn with_transport(profile: Profile, transport: T) -> Self {
        Self {
            profile,
            transport,
            fields: RefCell::new(HashMap::new()),
        }
    }

    /// The profile the client was created with.
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Send a request and read the response.
    pub fn roundtrip<R: ApiRequest>(&self, req: R) -> Result<R::Response, Error> {
        let req = req.into_request(&self.profile)?;
        debug!(method = %req.method(), uri = %req.uri(), "sending request");

        let resp = self.transport.run(req).map_err(Error::Transport)?;
        Ok(<R::Response as ApiResponse>::from_response(resp)?)
    }

    /// All fields of a table. Fetched on first use, then served from the
    /// cache.
    pub fn get_fields(&self, table_id: u64) -> Result<Rc<[Field]>, Error> {
        if let Some(fields) = self.fields.borrow().get(&table_id) {
            trace!(table_id, "field cache hit");
            return Ok(fields.clone());
        }

        trace!(table_id, "field cache miss");
        let fields: Rc<[Field]> = self.roundtrip(GetFields { table_id })?.into();
        self.fields.borrow_mut().insert(table_id, fields.clone());
        Ok(fields)
    }

    /// The fields of a table that aren't read-only.
    pub fn writable_fields(&self, table_id: u64) -> Result<Vec<Field>, Error> {
        Ok(self
            .get_fields(table_id)?
            .iter()
            .filter(|f| !f.read_only)
            .cloned()
            .collect())
    }

    /// Read every row of a table, following pagination, keyed by row ID.
    ///
    /// With `writable_only`, read-only fields are left out of the rows.
    pub fn get_data(&self, table_id: u64, writable_only: bool) -> Result<IndexMap<u64, Row>, Error> {
        let fields: Rc<[Field]> = if writable_only {
            self.writable_fields(table_id)?.into()
        } else {
            self.get_fields(table_id)?
        };

        let mut data = IndexMap::new();
        for row in paginate(ListRows { table_id }, |req| self.roundtrip(req))? {
            let row = row?;
            data.insert(row.id, format_row(row.values, &fields)?);
        }

        debug!(table_id, rows = data.len(), "read table");
        Ok(data)
    }

    /// Read a single row. With `linked`, the IDs in link fields are replaced
    /// with the linked rows themselves, one level deep.
    pub fn get_entry(&self, table_id: u64, entry_id: u64, linked: bool) -> Result<Row, Error> {
        self.get_entry_with_seen(table_id, entry_id, linked, BTreeSet::new())
    }

    /// Like [get_entry](Self::get_entry), but link fields pointing into any
    /// table in `seen_tables` are left as IDs.
    pub fn get_entry_with_seen(
        &self,
        table_id: u64,
        entry_id: u64,
        linked: bool,
        mut seen_tables: BTreeSet<u64>,
    ) -> Result<Row, Error> {
        let fields = self.get_fields(table_id)?;
        let mut entry = self.fetch_entry(table_id, entry_id, &fields)?;
        if !linked {
            return Ok(entry);
        }

        seen_tables.insert(table_id);
        for field in fields.iter() {
            let &FieldKind::LinkRow { table_id: target } = &field.kind else {
                continue;
            };

            if seen_tables.contains(&target) {
                continue;
            }

            let Some(Value::Array(ids)) = entry.get(&field.name) else {
                continue;
            };

            if ids.is_empty() {
                continue;
            }

            let target_fields = self.get_fields(target)?;
            let linked_rows = ids
                .iter()
                .map(|id| -> Result<Value, Error> {
                    let id = id.as_u64().ok_or_else(|| ValueError::Malformed {
                        field: field.name.clone(),
                        kind: "link_row",
                        value: id.clone(),
                    })?;

                    // Linked rows are never expanded further.
                    Ok(Value::Object(self.fetch_entry(target, id, &target_fields)?))
                })
                .collect::<Result<Vec<_>, _>>()?;

            trace!(field = %field.name, target, rows = linked_rows.len(), "hydrated link");
            entry.insert(field.name.clone(), Value::Array(linked_rows));
        }

        Ok(entry)
    }

    fn fetch_entry(&self, table_id: u64, entry_id: u64, fields: &[Field]) -> Result<Row, Error> {
        let row = self.roundtrip(GetRow {
            table_id,
            row_id: entry_id,
        })?;

        Ok(format_row(row.values, fields)?)
    }

    /// Write one row, converting select values from display values to option
    /// IDs. Read-only fields are never sent.
    ///
    /// With `row_id`, the existing row is updated. Otherwise a new row is
    /// created. Returns the ID of the row written.
    pub fn add_data(&self, table_id: u64, data: &Row, row_id: Option<u64>) -> Result<u64, Error> {
        let fields = self.get_fields(table_id)?;
        let mut values = convert_selects(data, &fields)?;
        for field in fields.iter().filter(|f| f.read_only) {
            values.remove(&field.name);
        }

        match row_id {
            Some(row_id) => {
                self.roundtrip(UpdateRow {
                    table_id,
                    row_id,
                    values: &values,
                })?;
                Ok(row_id)
            }
            None => {
                let created = self.roundtrip(CreateRow {
                    table_id,
                    values: &values,
                })?;
                Ok(created.id)
            }
        }
    }

    /// Write many rows: entries with an `id` are updated in one request, and
    /// the rest created in another. Entries are sent as given, without select
    /// conversion.
    ///
    /// An HTTP error on one of the two requests doesn't stop the other.
    /// Returns the bodies of the error responses, which is empty if
    /// everything was written.
    pub fn add_data_batch(&self, table_id: u64, entries: Vec<Row>) -> Result<Vec<String>, Error> {
        let (updates, creates): (Vec<Row>, Vec<Row>) = entries
            .into_iter()
            .partition(|entry| entry.get("id").is_some_and(|id| !id.is_null()));

        let mut errors = Vec::new();
        if !creates.is_empty() {
            let res = self.roundtrip(BatchCreateRows {
                table_id,
                items: &creates,
            });
            collect_batch(res, "created", &mut errors)?;
        }

        if !updates.is_empty() {
            let res = self.roundtrip(BatchUpdateRows {
                table_id,
                items: &updates,
            });
            collect_batch(res, "updated", &mut errors)?;
        }

        Ok(errors)
    }
}

fn collect_batch(
    res: Result<BatchRows, Error>,
    op: &'static str,
    errors: &mut Vec<String>,
) -> Result<(), Error> {
    match res {
        Ok(BatchRows { items }) => {
            debug!(rows = items.len(), "batch {op}");
            Ok(())
        }
        Err(Error::Api(e)) => {
            let body = e.into_status_body()?;
            debug!(%body, "batch not {op}");
            errors.push(body);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod test {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::{ApiErrorKind, testutil::MockTransport};

    const FIELDS_A: &str = "/api/database/fields/table/1/";
    const ROWS_A: &str = "/api/database/rows/table/1/?user_field_names=true";
    const BATCH_A: &str = "/api/database/rows/table/1/batch/?user_field_names=true";

    fn fields_a() -> Value {
        json!([
            {"id": 1, "name": "Name", "type": "text", "primary": true},
            {"id": 2, "name": "Answer", "type": "single_select", "read_only": false,
             "select_options": [{"id": 3, "value": "Yes"}, {"id": 4, "value": "No"}]},
            {"id": 3, "name": "Tags", "type": "multiple_select", "read_only": false,
             "select_options": [{"id": 5, "value": "red"}, {"id": 6, "value": "green"}]},
            {"id": 4, "name": "Total", "type": "formula", "read_only": true},
            {"id": 5, "name": "Other", "type": "link_row", "link_row_table_id": 2},
        ])
    }

    fn fields_b() -> Value {
        json!([
            {"id": 10, "name": "Title", "type": "text", "primary": true},
            {"id": 11, "name": "Back", "type": "link_row", "link_row_table_id": 1},
        ])
    }

    fn client(mock: &MockTransport) -> TableClient<&MockTransport> {
        let profile =
            Profile::new("http://baserow.test", Some("secret".to_owned()), None).unwrap();
        TableClient::with_transport(profile, mock)
    }

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn fields_are_cached() -> anyhow::Result<()> {
        let mock = MockTransport::new();
        mock.on(http::Method::GET, FIELDS_A, 200, fields_a());
        let client = client(&mock);

        let first = client.get_fields(1)?;
        let second = client.get_fields(1)?;
        assert_eq!(first.len(), 5);
        assert!(Rc::ptr_eq(&first, &second));

        let writable = client.writable_fields(1)?;
        assert_eq!(writable.len(), 4);
        assert!(writable.iter().all(|f| f.name != "Total"));

        assert_eq!(mock.requests().len(), 1);
        assert_eq!(mock.requests()[0].header("authorization"), Some("Token secret"));
        Ok(())
    }

    #[test]
    fn failed_field_fetch_not_cached() -> anyhow::Result<()> {
        let mock = MockTransport::new();
        mock.on(
            http::Method::GET,
            FIELDS_A,
            404,
            json!({"error": "ERROR_TABLE_DOES_NOT_EXIST", "detail": "gone"}),
        );
        mock.on(http::Method::GET, FIELDS_A, 200, fields_a());
        let client = client(&mock);

        let err = client.get_fields(1).unwrap_err();
        assert_matches!(
            err,
            Error::Api(ref e) if e.kind() == Some(&ApiErrorKind::TableDoesNotExist)
        );

        assert_eq!(client.get_fields(1)?.len(), 5);
        assert_eq!(mock.requests().len(), 2);
        Ok(())
    }

    #[test]
    fn get_data_follows_pages() -> anyhow::Result<()> {
        let mock = MockTransport::new();
        mock.on(http::Method::GET, FIELDS_A, 200, fields_a());
        mock.on(
            http::Method::GET,
            ROWS_A,
            200,
            json!({
                "count": 3,
                "next": "http://baserow.test/api/database/rows/table/1/?page=2&user_field_names=true",
                "previous": null,
                "results": [
                    {"id": 1, "order": "1.0", "Name": "a", "Answer": {"id": 3, "value": "Yes"},
                     "Tags": [], "Total": 1, "Other": [{"id": 7, "value": "x"}]},
                    {"id": 2, "order": "2.0", "Name": "b", "Answer": null,
                     "Tags": [{"id": 5, "value": "red"}], "Total": 2, "Other": []},
                ],
            }),
        );
        mock.on(
            http::Method::GET,
            "/api/database/rows/table/1/?page=2&user_field_names=true",
            200,
            json!({
                "count": 3,
                "next": null,
                "previous": "http://baserow.test/api/database/rows/table/1/?user_field_names=true",
                "results": [
                    {"id": 5, "order": "3.0", "Name": "c", "Answer": {"id": 4, "value": "No"},
                     "Tags": [], "Total": 3, "Other": []},
                ],
            }),
        );
        let client = client(&mock);

        let data = client.get_data(1, true)?;
        assert_eq!(data.keys().copied().collect::<Vec<_>>(), vec![1, 2, 5]);
        assert_eq!(
            Value::Object(data[&1_u64].clone()),
            json!({"Name": "a", "Answer": "Yes", "Tags": [], "Other": [7]})
        );
        assert_eq!(data[&2_u64]["Tags"], json!(["red"]));
        assert_eq!(data[&5_u64]["Answer"], json!("No"));
        assert!(!data[&5_u64].contains_key("Total"));
        Ok(())
    }

    #[test]
    fn get_data_all_fields() -> anyhow::Result<()> {
        let mock = MockTransport::new();
        mock.on(http::Method::GET, FIELDS_A, 200, fields_a());
        mock.on(
            http::Method::GET,
            ROWS_A,
            200,
            json!({"next": null, "results": [
                {"id": 1, "Name": "a", "Answer": null, "Tags": [], "Total": 42, "Other": []},
            ]}),
        );
        let client = client(&mock);

        let data = client.get_data(1, false)?;
        assert_eq!(data[&1_u64]["Total"], json!(42));
        Ok(())
    }

    #[test]
    fn get_data_missing_results() {
        let mock = MockTransport::new();
        mock.on(http::Method::GET, FIELDS_A, 200, fields_a());
        mock.on(http::Method::GET, ROWS_A, 200, json!({"detail": "nope"}));
        let client = client(&mock);

        assert_matches!(
            client.get_data(1, true),
            Err(Error::Api(ApiError::InvalidResponse(..)))
        );
    }

    #[test]
    fn get_data_malformed_value() {
        let mock = MockTransport::new();
        mock.on(http::Method::GET, FIELDS_A, 200, fields_a());
        mock.on(
            http::Method::GET,
            ROWS_A,
            200,
            json!({"next": null, "results": [{"id": 1, "Answer": "Yes"}]}),
        );
        let client = client(&mock);

        assert_matches!(
            client.get_data(1, true),
            Err(Error::Value(ValueError::Malformed { .. }))
        );
    }

    fn mount_linked_tables(mock: &MockTransport) {
        mock.on(http::Method::GET, FIELDS_A, 200, fields_a());
        mock.on(
            http::Method::GET,
            "/api/database/fields/table/2/",
            200,
            fields_b(),
        );
        mock.on(
            http::Method::GET,
            "/api/database/rows/table/1/1/?user_field_names=true",
            200,
            json!({"id": 1, "order": "1.0", "Name": "a", "Answer": null, "Tags": [], "Total": 0,
                   "Other": [{"id": 7, "value": "seven"}, {"id": 8, "value": "eight"}]}),
        );
        for id in [7, 8] {
            mock.on(
                http::Method::GET,
                &format!("/api/database/rows/table/2/{id}/?user_field_names=true"),
                200,
                json!({"id": id, "order": "1.0", "Title": format!("row {id}"),
                       "Back": [{"id": 1, "value": "a"}]}),
            );
        }
    }

    #[test]
    fn get_entry_unlinked() -> anyhow::Result<()> {
        let mock = MockTransport::new();
        mount_linked_tables(&mock);
        let client = client(&mock);

        let entry = client.get_entry(1, 1, false)?;
        assert_eq!(entry["Other"], json!([7, 8]));
        // Read-only fields are included when reading a single entry.
        assert_eq!(entry["Total"], json!(0));
        assert!(!entry.contains_key("order"));
        Ok(())
    }

    #[test]
    fn get_entry_hydrates_one_level() -> anyhow::Result<()> {
        let mock = MockTransport::new();
        mount_linked_tables(&mock);
        let client = client(&mock);

        let entry = client.get_entry(1, 1, true)?;
        assert_eq!(
            entry["Other"],
            json!([
                {"Title": "row 7", "Back": [1]},
                {"Title": "row 8", "Back": [1]},
            ])
        );

        // The link back from table 2 to table 1 was not followed.
        assert_eq!(mock.count(http::Method::GET, "/api/database/rows/table/1/1/?user_field_names=true"), 1);
        Ok(())
    }

    #[test]
    fn get_entry_respects_seen_tables() -> anyhow::Result<()> {
        let mock = MockTransport::new();
        mount_linked_tables(&mock);
        let client = client(&mock);

        let entry = client.get_entry_with_seen(1, 1, true, BTreeSet::from([2]))?;
        assert_eq!(entry["Other"], json!([7, 8]));
        assert_eq!(mock.count(http::Method::GET, "/api/database/fields/table/2/"), 0);
        Ok(())
    }

    #[test]
    fn create_row_converts_and_strips() -> anyhow::Result<()> {
        let mock = MockTransport::new();
        mock.on(http::Method::GET, FIELDS_A, 200, fields_a());
        mock.on(http::Method::POST, ROWS_A, 200, json!({"id": 17, "Name": "n"}));
        let client = client(&mock);

        let id = client.add_data(
            1,
            &row(json!({"Name": "n", "Answer": "No", "Tags": ["green", 5], "Total": 99})),
            None,
        )?;
        assert_eq!(id, 17);

        let req = mock.last_request();
        assert_eq!(req.method, http::Method::POST);
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(
            req.json()?,
            json!({"Name": "n", "Answer": 4, "Tags": [6, 5]})
        );
        Ok(())
    }

    #[test]
    fn update_row() -> anyhow::Result<()> {
        let mock = MockTransport::new();
        mock.on(http::Method::GET, FIELDS_A, 200, fields_a());
        mock.on(
            http::Method::PATCH,
            "/api/database/rows/table/1/9/?user_field_names=true",
            200,
            Value::Null,
        );
        let client = client(&mock);

        let id = client.add_data(1, &row(json!({"Answer": 3, "Tags": null})), Some(9))?;
        assert_eq!(id, 9);
        assert_eq!(mock.last_request().json()?, json!({"Answer": 3, "Tags": null}));
        Ok(())
    }

    #[test]
    fn create_row_unknown_option() {
        let mock = MockTransport::new();
        mock.on(http::Method::GET, FIELDS_A, 200, fields_a());
        let client = client(&mock);

        let res = client.add_data(1, &row(json!({"Answer": "Maybe"})), None);
        assert_matches!(
            res,
            Err(Error::Value(ValueError::UnknownOption { value, .. })) if value == "Maybe"
        );
        // Nothing was written.
        assert_eq!(mock.count(http::Method::POST, ROWS_A), 0);
    }

    #[test]
    fn create_row_missing_id() {
        let mock = MockTransport::new();
        mock.on(http::Method::GET, FIELDS_A, 200, fields_a());
        mock.on(http::Method::POST, ROWS_A, 200, json!({"Name": "n"}));
        let client = client(&mock);

        assert_matches!(
            client.add_data(1, &row(json!({"Name": "n"})), None),
            Err(Error::Api(ApiError::InvalidResponse(..)))
        );
    }

    #[test]
    fn batch_partial_failure() -> anyhow::Result<()> {
        let mock = MockTransport::new();
        mock.on(
            http::Method::POST,
            BATCH_A,
            200,
            json!({"items": [{"id": 21}, {"id": 22}, {"id": 23}]}),
        );
        mock.on(
            http::Method::PATCH,
            BATCH_A,
            400,
            json!({"error": "ERROR_REQUEST_BODY_VALIDATION", "detail": {"items": "bad"}}),
        );
        let client = client(&mock);

        let entries = vec![
            row(json!({"Name": "a"})),
            row(json!({"id": 1, "Name": "b"})),
            row(json!({"Name": "c", "id": null})),
            row(json!({"id": 2, "Name": "d"})),
            row(json!({"Name": "e", "Answer": "Yes"})),
        ];

        let errors = client.add_data_batch(1, entries)?;
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("ERROR_REQUEST_BODY_VALIDATION"));

        let creates = mock.find(http::Method::POST, BATCH_A);
        assert_eq!(creates.len(), 1);
        assert_eq!(
            creates[0].json()?,
            json!({"items": [
                {"Name": "a"},
                {"Name": "c", "id": null},
                // Batches are sent without select conversion.
                {"Name": "e", "Answer": "Yes"},
            ]})
        );

        let updates = mock.find(http::Method::PATCH, BATCH_A);
        assert_eq!(updates.len(), 1);
        assert_eq!(
            updates[0].json()?,
            json!({"items": [{"id": 1, "Name": "b"}, {"id": 2, "Name": "d"}]})
        );

        // Batches don't need the schema.
        assert_eq!(mock.count(http::Method::GET, FIELDS_A), 0);
        Ok(())
    }

    #[test]
    fn batch_both_fail() -> anyhow::Result<()> {
        let mock = MockTransport::new();
        mock.on_text(http::Method::POST, BATCH_A, 500, "create failed");
        mock.on_text(http::Method::PATCH, BATCH_A, 502, "update failed");
        let client = client(&mock);

        let errors = client.add_data_batch(
            1,
            vec![row(json!({"Name": "a"})), row(json!({"id": 1, "Name": "b"}))],
        )?;
        assert_eq!(errors, vec!["create failed", "update failed"]);
        Ok(())
    }

    #[test]
    fn batch_only_creates() -> anyhow::Result<()> {
        let mock = MockTransport::new();
        mock.on(http::Method::POST, BATCH_A, 200, json!({"items": [{"id": 1}]}));
        let client = client(&mock);

        let errors = client.add_data_batch(1, vec![row(json!({"Name": "a"}))])?;
        assert!(errors.is_empty());
        assert_eq!(mock.requests().len(), 1);
        Ok(())
    }

    #[test]
    fn batch_malformed_success_raises() {
        let mock = MockTransport::new();
        mock.on(http::Method::POST, BATCH_A, 200, json!({"rows": []}));
        let client = client(&mock);

        assert_matches!(
            client.add_data_batch(1, vec![row(json!({"Name": "a"}))]),
            Err(Error::Api(ApiError::InvalidResponse(..)))
        );
    }

    #[test]
    fn batch_empty_sends_nothing() -> anyhow::Result<()> {
        let mock = MockTransport::new();
        let client = client(&mock);

        assert!(client.add_data_batch(1, Vec::new())?.is_empty());
        assert!(mock.requests().is_empty());
        Ok(())
    }
}

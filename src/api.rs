use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::Profile;

mod error;
pub mod field;
mod paginate;
pub mod row;

pub use error::*;
pub use paginate::*;

/// The query string attached to row endpoints, so that rows are keyed by
/// field name rather than `field_{id}`.
#[derive(Debug, Clone, Copy, Serialize)]
pub(crate) struct UserFieldNames {
    user_field_names: bool,
}

impl UserFieldNames {
    pub(crate) const ON: Self = Self {
        user_field_names: true,
    };
}

/// Implemented by types that can be sent as requests to the Baserow API.
pub trait ApiRequest: Sized {
    /// The corresponding response type.
    type Response: ApiResponse;

    /// The path that the request should take, relative to the database URL.
    fn path(&self) -> String;

    /// The method to use.
    fn method(&self) -> http::Method {
        http::Method::GET
    }

    /// The serializable request body.
    fn body(&self) -> Option<impl Serialize> {
        None::<&()>
    }

    /// The serializable query string.
    fn query(&self) -> Option<impl Serialize> {
        None::<&()>
    }

    /// The full URI of the request. By default, this is the path and query
    /// appended to `base`, keeping any path prefix `base` has.
    fn uri(&self, base: &http::Uri) -> Result<http::Uri, http::Error> {
        let mut path = base.path().trim_end_matches('/').to_owned();
        path.push_str(&self.path());

        if let Some(qs) = self.query() {
            let qs = serde_qs::to_string(&qs)
                .expect("query string serialization should be infallible");
            path.push('?');
            path.push_str(&qs);
        }

        let mut parts = base.clone().into_parts();
        parts.path_and_query = Some(path.parse()?);
        Ok(http::Uri::from_parts(parts)?)
    }

    /// Consume the request and return an [http::Request] suitable for passing
    /// to your favorite HTTP client.
    fn into_request(self, profile: &Profile) -> Result<http::Request<String>, http::Error> {
        let mut req = http::Request::builder()
            .method(self.method())
            .uri(self.uri(&profile.database_url)?)
            .header(http::header::USER_AGENT, &profile.user_agent);

        if let Some(token) = &profile.token {
            req = req.header(http::header::AUTHORIZATION, format!("Token {token}"));
        }

        if let Some(body) = self.body() {
            let body_str =
                serde_json::to_string(&body).expect("JSON serialization should be infallible");
            req.header(http::header::CONTENT_TYPE, "application/json")
                .header(http::header::CONTENT_LENGTH, body_str.len())
                .body(body_str)
        } else {
            req.body("".to_string())
        }
    }
}

/// Implemented by types that can be read as responses from the Baserow API.
pub trait ApiResponse: Sized {
    /// Read the response from an [http::Response] object.
    fn from_response(resp: http::Response<impl Read>) -> Result<Self, ApiError> {
        let (parts, body) = resp.into_parts();
        Self::from_response_parts(parts, body)
    }

    /// Read the response from pre-parsed parts. Useful for async HTTP clients
    /// where the body must be collected before parsing.
    fn from_response_parts(parts: http::response::Parts, body: impl Read)
    -> Result<Self, ApiError>;
}

/// A private trait for types that deserialize directly from a successful
/// JSON response body.
pub(crate) trait JsonResponse: for<'de> Deserialize<'de> {}

impl<T: JsonResponse> ApiResponse for T {
    fn from_response_parts(
        parts: http::response::Parts,
        body: impl Read,
    ) -> Result<Self, ApiError> {
        let body = read_success(&parts, body)?;
        parse_json(parts.status, &body)
    }
}

/// A response whose body carries nothing of interest, only the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoContent;

impl ApiResponse for NoContent {
    fn from_response_parts(
        parts: http::response::Parts,
        body: impl Read,
    ) -> Result<Self, ApiError> {
        read_success(&parts, body)?;
        Ok(NoContent)
    }
}

/// Reads the whole body, turning any non-2xx status into an error.
pub(crate) fn read_success(
    parts: &http::response::Parts,
    mut body: impl Read,
) -> Result<Vec<u8>, ApiError> {
    let mut buf = Vec::new();
    body.read_to_end(&mut buf).map_err(ApiError::Read)?;

    if parts.status.is_success() {
        Ok(buf)
    } else {
        Err(ApiError::from_body(
            parts.status,
            String::from_utf8_lossy(&buf).into_owned(),
        ))
    }
}

pub(crate) fn parse_json<T>(status: http::StatusCode, body: &[u8]) -> Result<T, ApiError>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_slice(body).map_err(|e| {
        tracing::error!("Failed to parse API response: {e:#?}");
        ApiError::InvalidResponse(status, e)
    })
}

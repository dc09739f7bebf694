use std::{io, str::FromStr as _};

use serde::Deserialize;

/// An error response from the API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The API responded with an application-level error code.
    ErrorResponse {
        /// The HTTP status on the overall response.
        status: http::StatusCode,
        /// The error code from the API.
        kind: ApiErrorKind,
        /// A longer description of the error encountered. Usually a string,
        /// but request validation errors carry an object keyed by field.
        detail: Option<serde_json::Value>,
        /// The raw response body.
        body: String,
    },
    /// The API response did not contain a code, but the HTTP status was non-2xx.
    Other {
        /// The HTTP status on the overall response.
        status: http::StatusCode,
        /// The raw response body.
        body: String,
    },
    /// The API responded successfully, but the body was invalid.
    InvalidResponse(http::StatusCode, #[source] serde_json::Error),
    /// The response body couldn't be read.
    Read(#[source] io::Error),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::ErrorResponse { kind, detail, .. } => {
                write!(f, "{kind}")?;
                match detail {
                    Some(serde_json::Value::String(s)) => write!(f, ": {s}")?,
                    Some(v) => write!(f, ": {v}")?,
                    None => (),
                }
            }
            ApiError::Other { status, body } => {
                write!(f, "{status}")?;
                if !body.is_empty() {
                    write!(f, ": {body}")?;
                }
            }
            ApiError::InvalidResponse(status, e) => {
                write!(f, "Invalid response ({status}): {e}")?;
            }
            ApiError::Read(_) => {
                write!(f, "Failed to read response body")?;
            }
        }

        Ok(())
    }
}

impl ApiError {
    /// The error code from the API, if there was one.
    pub fn kind(&self) -> Option<&ApiErrorKind> {
        match self {
            ApiError::ErrorResponse { kind, .. } => Some(kind),
            _ => None,
        }
    }

    /// The HTTP status of the response. Read errors report
    /// `500 Internal Server Error`, since no status is associated with them.
    pub fn status(&self) -> http::StatusCode {
        match self {
            ApiError::ErrorResponse { status, .. }
            | ApiError::Other { status, .. }
            | ApiError::InvalidResponse(status, _) => *status,
            ApiError::Read(_) => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// For an HTTP error status, returns the raw response body. Errors that
    /// aren't caused by the status (e.g. an undecodable success response)
    /// are handed back.
    pub fn into_status_body(self) -> Result<String, Self> {
        match self {
            ApiError::ErrorResponse { body, .. } | ApiError::Other { body, .. } => Ok(body),
            e => Err(e),
        }
    }

    pub(crate) fn from_body(status: http::StatusCode, body: String) -> Self {
        let Ok(raw) = serde_json::from_str::<RawApiError>(&body) else {
            return ApiError::Other { status, body };
        };

        let kind = ApiErrorKind::from_str(&raw.error).unwrap_or(ApiErrorKind::Unknown(raw.error));
        ApiError::ErrorResponse {
            status,
            kind,
            detail: raw.detail,
            body,
        }
    }
}

/// Indicates that the error code was unrecognized.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Invalid error kind: {0}")]
pub struct InvalidErrorKind(String);

macro_rules! api_error_kinds {
    ($($code:literal => $variant:ident),* $(,)?) => {
        /// An error code from the API.
        #[derive(Debug, Clone, PartialEq, Eq)]
        #[non_exhaustive]
        pub enum ApiErrorKind {
            $(
                #[doc = $code]
                $variant,
            )*
            /// An unknown error code.
            Unknown(String),
        }

        impl std::fmt::Display for ApiErrorKind {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(match self {
                    $(ApiErrorKind::$variant => $code,)*
                    ApiErrorKind::Unknown(kind) => kind,
                })
            }
        }

        impl std::str::FromStr for ApiErrorKind {
            type Err = InvalidErrorKind;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(match s {
                    $($code => ApiErrorKind::$variant,)*
                    _ => return Err(InvalidErrorKind(s.to_string())),
                })
            }
        }
    };
}

api_error_kinds! {
    "ERROR_DATABASE_DOES_NOT_EXIST" => DatabaseDoesNotExist,
    "ERROR_FIELD_DOES_NOT_EXIST" => FieldDoesNotExist,
    "ERROR_NO_PERMISSION_TO_TABLE" => NoPermissionToTable,
    "ERROR_REQUEST_BODY_VALIDATION" => RequestBodyValidation,
    "ERROR_ROW_DOES_NOT_EXIST" => RowDoesNotExist,
    "ERROR_ROW_IDS_NOT_UNIQUE" => RowIdsNotUnique,
    "ERROR_TABLE_DOES_NOT_EXIST" => TableDoesNotExist,
    "ERROR_TOKEN_DOES_NOT_EXIST" => TokenDoesNotExist,
    "ERROR_USER_NOT_IN_GROUP" => UserNotInGroup,
}

#[derive(Debug, Deserialize)]
struct RawApiError {
    error: String,
    detail: Option<serde_json::Value>,
}

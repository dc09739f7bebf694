//! A client for the [Baserow](https://baserow.io) database API.
//!
//! [TableClient] reads and writes the rows of Baserow tables, translating
//! between the API's verbose representation of select and link fields and a
//! plain one: select fields are read as their display value and can be
//! written by display value or option ID, and link fields are read as lists
//! of row IDs.
//!
//! # Example
//!
//! ```no_run
//! use baserow::{Profile, TableClient};
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let profile = Profile::new(
//!     "https://baserow.example.com",
//!     None,
//!     Some(std::path::Path::new("token.txt")),
//! )?;
//! let client = TableClient::new(profile);
//!
//! for (id, row) in client.get_data(1234, true)? {
//!     println!("{id}: {}", serde_json::Value::Object(row));
//! }
//!
//! let row = json!({"Name": "Alice", "Status": "Active"});
//! let id = client.add_data(1234, row.as_object().unwrap(), None)?;
//! println!("created row {id}");
//! # Ok(())
//! # }
//! ```
//!
//! # HTTP Requests and Responses
//!
//! The request types in [field] and [row] can also be used on their own,
//! with any HTTP client that uses the [`http`] crate. Use
//! [`ApiRequest::into_request`] to create a request, and
//! [`ApiResponse::from_response`] to parse the response.

#![warn(
    anonymous_parameters,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    single_use_lifetimes,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_extern_crates,
    unused_qualifications,
    variant_size_differences
)]

mod api;
mod client;
mod config;
pub mod value;

#[cfg(test)]
mod testutil;

pub use api::*;
pub use client::{Error, TableClient, Transport, TransportError};
pub use config::{Error as ConfigError, Profile, load_token};
pub use value::{Row, ValueError};

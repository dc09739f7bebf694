//! Test utilities for exercising the client without a server.

use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    io::{Cursor, Read},
};

use crate::client::{Transport, TransportError};

/// A request seen by [MockTransport].
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: http::Method,
    pub uri: http::Uri,
    pub headers: http::HeaderMap,
    pub body: String,
}

impl RecordedRequest {
    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub(crate) fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.body)
    }

    fn route(&self) -> String {
        path_and_query(&self.uri)
    }
}

type Route = (http::Method, String);

/// Serves canned responses by method and path (with query). Responses
/// registered for the same route are served in order; the last one is
/// repeated once the others are used up. Unknown routes get a 404.
#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    routes: RefCell<HashMap<Route, VecDeque<(http::StatusCode, String)>>>,
    requests: RefCell<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Respond to `method path` with a JSON body.
    pub(crate) fn on(&self, method: http::Method, path: &str, status: u16, body: serde_json::Value) {
        self.on_text(method, path, status, &body.to_string());
    }

    /// Respond to `method path` with a plain body.
    pub(crate) fn on_text(&self, method: http::Method, path: &str, status: u16, body: &str) {
        let status = http::StatusCode::from_u16(status).expect("invalid status");
        self.routes
            .borrow_mut()
            .entry((method, path.to_owned()))
            .or_default()
            .push_back((status, body.to_owned()));
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.borrow().clone()
    }

    pub(crate) fn last_request(&self) -> RecordedRequest {
        self.requests
            .borrow()
            .last()
            .cloned()
            .expect("no requests were made")
    }

    /// All requests made to `method path`.
    pub(crate) fn find(&self, method: http::Method, path: &str) -> Vec<RecordedRequest> {
        self.requests
            .borrow()
            .iter()
            .filter(|r| r.method == method && r.route() == path)
            .cloned()
            .collect()
    }

    pub(crate) fn count(&self, method: http::Method, path: &str) -> usize {
        self.find(method, path).len()
    }
}

impl Transport for MockTransport {
    fn run(
        &self,
        req: http::Request<String>,
    ) -> Result<http::Response<Box<dyn Read>>, TransportError> {
        let (parts, body) = req.into_parts();
        let recorded = RecordedRequest {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
        };

        let route = (recorded.method.clone(), recorded.route());
        self.requests.borrow_mut().push(recorded);

        let (status, body) = {
            let mut routes = self.routes.borrow_mut();
            match routes.get_mut(&route) {
                Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
                Some(queue) if !queue.is_empty() => queue[0].clone(),
                _ => (
                    http::StatusCode::NOT_FOUND,
                    format!("no mock for {} {}", route.0, route.1),
                ),
            }
        };

        let body: Box<dyn Read> = Box::new(Cursor::new(body.into_bytes()));
        let resp = http::Response::builder().status(status).body(body)?;
        Ok(resp)
    }
}

fn path_and_query(uri: &http::Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_else(|| "/".to_owned())
}

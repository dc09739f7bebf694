use std::{fmt, io::Read, marker::PhantomData};

use serde::Deserialize;

use crate::ApiRequest;

use super::{ApiError, ApiResponse, parse_json, read_success};

/// One page of a listing. `next` is the absolute URL of the following page,
/// or unset on the last page.
#[derive(Deserialize)]
pub struct Page<T> {
    /// The total number of results across all pages, if reported.
    #[serde(default)]
    pub count: Option<u64>,
    /// The URL of the next page.
    pub next: Option<String>,
    /// One page of results.
    pub results: Vec<T>,
}

impl<T> fmt::Debug for Page<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("count", &self.count)
            .field("next", &self.next)
            .field("results", &self.results)
            .finish()
    }
}

impl<T> ApiResponse for Page<T>
where
    T: for<'de> Deserialize<'de>,
{
    fn from_response_parts(
        parts: http::response::Parts,
        body: impl Read,
    ) -> Result<Self, ApiError> {
        let body = read_success(&parts, body)?;
        parse_json(parts.status, &body)
    }
}

/// Either the first page of a listing, or a follow-up page by URL.
#[derive(Debug, Clone)]
pub enum PageRequest<R> {
    /// The initial request.
    First(R),
    /// The `next` URL from the previous page.
    Next(String),
}

impl<R, T> ApiRequest for PageRequest<R>
where
    R: ApiRequest<Response = Page<T>>,
    T: for<'de> Deserialize<'de>,
{
    type Response = Page<T>;

    fn path(&self) -> String {
        match self {
            PageRequest::First(req) => req.path(),
            PageRequest::Next(url) => url.clone(),
        }
    }

    fn method(&self) -> http::Method {
        match self {
            PageRequest::First(req) => req.method(),
            PageRequest::Next(_) => http::Method::GET,
        }
    }

    fn uri(&self, base: &http::Uri) -> Result<http::Uri, http::Error> {
        match self {
            PageRequest::First(req) => req.uri(base),
            // The service hands out absolute URLs, already carrying the query.
            PageRequest::Next(url) => Ok(url.parse()?),
        }
    }
}

struct Paginator<F, E, R, T> {
    fetch_page: F,
    batch: <Vec<T> as IntoIterator>::IntoIter,
    next: Option<String>,
    _marker: PhantomData<fn(R) -> E>,
}

impl<F, E, R, T> Iterator for Paginator<F, E, R, T>
where
    F: Fn(PageRequest<R>) -> Result<Page<T>, E>,
    E: From<ApiError>,
    R: ApiRequest<Response = Page<T>>,
    T: for<'de> Deserialize<'de>,
{
    type Item = Result<T, E>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(v) = self.batch.next() {
                return Some(Ok(v));
            }

            let url = self.next.take()?;
            tracing::trace!(%url, "following next page");

            let Page { results, next, .. } = match (self.fetch_page)(PageRequest::Next(url)) {
                Ok(v) => v,
                Err(e) => return Some(Err(e)),
            };

            self.batch = results.into_iter();
            self.next = next;
        }
    }
}

/// Make a listing request, and keep following `next` links by calling
/// `fetch_page` until a page without one. Results are yielded in page order.
pub fn paginate<F, E, R, T>(
    base_req: R,
    fetch_page: F,
) -> Result<impl Iterator<Item = Result<T, E>>, E>
where
    F: Fn(PageRequest<R>) -> Result<Page<T>, E>,
    E: From<ApiError>,
    R: ApiRequest<Response = Page<T>>,
    T: for<'de> Deserialize<'de>,
{
    let Page { results, next, .. } = fetch_page(PageRequest::First(base_req))?;

    Ok(Paginator {
        fetch_page,
        batch: results.into_iter(),
        next,
        _marker: PhantomData,
    })
}

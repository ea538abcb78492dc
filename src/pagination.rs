//! Lazy, restartable traversal of cursor-paginated collections.
//!
//! A [`PagedCollection`] wraps a [`PageFetcher`]. Every traversal starts from
//! [`PagedCollection::cursor`] (or [`PagedCollection::stream`]) and owns its own buffer and
//! next-page pointer, so concurrent traversals never interfere. Pages are chained through the
//! `Link: <url>; rel="next"` response header.

mod cursor;
mod link;

pub use cursor::*;
pub use link::*;

// self
use crate::_prelude::*;

/// One fetched page.
#[derive(Clone, Debug)]
pub struct Page<T> {
	/// Items in server order.
	pub items: Vec<T>,
	/// Response headers, consulted for the `Link` header.
	pub headers: HeaderMap,
}
impl<T> Page<T> {
	/// Creates a page from its items and response headers.
	pub fn new(items: Vec<T>, headers: HeaderMap) -> Self {
		Self { items, headers }
	}
}

/// Boxed future returned by [`PageFetcher::fetch_page`].
pub type PageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<Page<T>>> + 'a + Send>>;

/// Fetches one page: the first page when `next` is `None`, otherwise the page behind the
/// server-supplied next link.
pub trait PageFetcher<T>
where
	Self: Send + Sync,
{
	/// Fetches the page addressed by `next`.
	fn fetch_page<'a>(&'a self, next: Option<&'a str>) -> PageFuture<'a, T>;
}
impl<T, F, Fut> PageFetcher<T> for F
where
	F: Send + Sync + Fn(Option<String>) -> Fut,
	Fut: 'static + Send + Future<Output = Result<Page<T>>>,
{
	fn fetch_page<'a>(&'a self, next: Option<&'a str>) -> PageFuture<'a, T> {
		Box::pin(self(next.map(ToOwned::to_owned)))
	}
}

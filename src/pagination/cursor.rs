// std
use std::marker::PhantomData;
// crates.io
use futures::stream::{self, Stream};
// self
use crate::{
	_prelude::*,
	error::PaginationError,
	pagination::{PageFetcher, next_link},
};

/// Restartable handle over a paginated collection.
pub struct PagedCollection<T, F>
where
	F: PageFetcher<T>,
{
	fetcher: Arc<F>,
	_item: PhantomData<fn() -> T>,
}
impl<T, F> PagedCollection<T, F>
where
	F: PageFetcher<T>,
{
	/// Wraps a page fetcher.
	pub fn new(fetcher: F) -> Self {
		Self { fetcher: Arc::new(fetcher), _item: PhantomData }
	}

	/// Starts a new traversal from the first page.
	pub fn cursor(&self) -> PageCursor<T, F> {
		PageCursor::new(self.fetcher.clone())
	}

	/// Starts a new traversal exposed as a [`Stream`].
	pub fn stream(&self) -> impl Stream<Item = Result<T>> + Send + use<T, F>
	where
		T: 'static + Send,
		F: 'static,
	{
		self.cursor().into_stream()
	}
}
impl<T, F> Clone for PagedCollection<T, F>
where
	F: PageFetcher<T>,
{
	fn clone(&self) -> Self {
		Self { fetcher: self.fetcher.clone(), _item: PhantomData }
	}
}
impl<T, F> Debug for PagedCollection<T, F>
where
	F: PageFetcher<T>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PagedCollection").finish_non_exhaustive()
	}
}

#[derive(Debug)]
enum NextPage {
	Unfetched,
	Url(String),
	Invalid(PaginationError),
	Exhausted,
}

/// One forward-only traversal: FIFO item buffer plus the next-page pointer.
pub struct PageCursor<T, F>
where
	F: PageFetcher<T>,
{
	fetcher: Arc<F>,
	buffer: VecDeque<T>,
	next: NextPage,
	pages_fetched: usize,
}
impl<T, F> PageCursor<T, F>
where
	F: PageFetcher<T>,
{
	fn new(fetcher: Arc<F>) -> Self {
		Self { fetcher, buffer: VecDeque::new(), next: NextPage::Unfetched, pages_fetched: 0 }
	}

	/// Next item, fetching the next page only once the buffer is drained.
	///
	/// `Ok(None)` marks the end of the collection. A failed fetch leaves the pointer in place, so
	/// calling again retries the same page. A malformed `Link` header surfaces once, after the
	/// items of its page, and ends the traversal.
	pub async fn next_item(&mut self) -> Result<Option<T>> {
		loop {
			if let Some(item) = self.buffer.pop_front() {
				return Ok(Some(item));
			}

			let target = match std::mem::replace(&mut self.next, NextPage::Exhausted) {
				NextPage::Unfetched => None,
				NextPage::Url(url) => Some(url),
				NextPage::Invalid(err) => return Err(err.into()),
				NextPage::Exhausted => return Ok(None),
			};

			match self.fetcher.fetch_page(target.as_deref()).await {
				Ok(page) => {
					self.pages_fetched += 1;
					self.next = match next_link(&page.headers) {
						Ok(Some(url)) => NextPage::Url(url),
						Ok(None) => NextPage::Exhausted,
						Err(err) => NextPage::Invalid(err),
					};

					self.buffer.extend(page.items);
				},
				Err(err) => {
					self.next = match target {
						Some(url) => NextPage::Url(url),
						None => NextPage::Unfetched,
					};

					return Err(err);
				},
			}
		}
	}

	/// Pages fetched so far by this traversal.
	pub fn pages_fetched(&self) -> usize {
		self.pages_fetched
	}

	/// Whether no further item will be produced.
	pub fn is_exhausted(&self) -> bool {
		self.buffer.is_empty() && matches!(self.next, NextPage::Exhausted)
	}

	/// Converts the traversal into a [`Stream`] that ends after the first error.
	pub fn into_stream(self) -> impl Stream<Item = Result<T>> + Send
	where
		T: 'static + Send,
		F: 'static,
	{
		stream::unfold(Some(self), |cursor| async move {
			let mut cursor = cursor?;

			match cursor.next_item().await {
				Ok(Some(item)) => Some((Ok(item), Some(cursor))),
				Ok(None) => None,
				Err(err) => Some((Err(err), None)),
			}
		})
	}
}
impl<T, F> Debug for PageCursor<T, F>
where
	F: PageFetcher<T>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PageCursor")
			.field("buffered", &self.buffer.len())
			.field("next", &self.next)
			.field("pages_fetched", &self.pages_fetched)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use futures::StreamExt;
	// self
	use super::*;
	use crate::pagination::{Page, PageFuture};

	struct ScriptedPages {
		pages: Vec<(Vec<u32>, Option<&'static str>)>,
		calls: AtomicUsize,
		seen: Mutex<Vec<Option<String>>>,
	}
	impl ScriptedPages {
		fn new(pages: Vec<(Vec<u32>, Option<&'static str>)>) -> Self {
			Self { pages, calls: AtomicUsize::new(0), seen: Mutex::new(Vec::new()) }
		}
	}
	impl PageFetcher<u32> for ScriptedPages {
		fn fetch_page<'a>(&'a self, next: Option<&'a str>) -> PageFuture<'a, u32> {
			Box::pin(async move {
				self.seen.lock().push(next.map(ToOwned::to_owned));

				let index = match next {
					None => 0,
					Some(url) => url
						.rsplit('=')
						.next()
						.and_then(|page| page.parse().ok())
						.expect("Scripted next links should end with a page index."),
				};
				let (items, link) = self.pages[index].clone();
				let mut headers = HeaderMap::new();

				self.calls.fetch_add(1, Ordering::SeqCst);

				if let Some(link) = link {
					headers.insert(LINK, HeaderValue::from_static(link));
				}

				Ok(Page::new(items, headers))
			})
		}
	}

	async fn drain(cursor: &mut PageCursor<u32, ScriptedPages>) -> Vec<u32> {
		let mut items = Vec::new();

		while let Some(item) = cursor.next_item().await.expect("Traversal should succeed.") {
			items.push(item);
		}

		items
	}

	#[tokio::test]
	async fn two_pages_yield_all_items_with_one_fetch_per_page() {
		let collection = PagedCollection::new(ScriptedPages::new(vec![
			(vec![1, 2], Some(r#"<https://acme.okta.com/api/v1/users?page=1>; rel="next""#)),
			(vec![3], None),
		]));
		let mut cursor = collection.cursor();

		assert_eq!(cursor.pages_fetched(), 0);
		assert_eq!(drain(&mut cursor).await, vec![1, 2, 3]);
		assert_eq!(cursor.pages_fetched(), 2);
		assert!(cursor.is_exhausted());
		assert_eq!(cursor.next_item().await.expect("Exhausted cursor should stay quiet."), None);
		assert_eq!(collection.fetcher.calls.load(Ordering::SeqCst), 2);
		assert_eq!(
			*collection.fetcher.seen.lock(),
			vec![None, Some("https://acme.okta.com/api/v1/users?page=1".into())]
		);
	}

	#[tokio::test]
	async fn empty_pages_with_next_link_keep_going() {
		let collection = PagedCollection::new(ScriptedPages::new(vec![
			(vec![], Some(r#"</api/v1/users?page=1>; rel="next""#)),
			(vec![], Some(r#"</api/v1/users?page=2>; rel="next""#)),
			(vec![7], None),
		]));
		let mut cursor = collection.cursor();

		assert_eq!(drain(&mut cursor).await, vec![7]);
		assert_eq!(cursor.pages_fetched(), 3);
	}

	#[tokio::test]
	async fn traversals_are_independent() {
		let collection = PagedCollection::new(ScriptedPages::new(vec![
			(vec![1, 2], Some(r#"</api/v1/users?page=1>; rel="next""#)),
			(vec![3], None),
		]));
		let mut first = collection.cursor();
		let mut second = collection.cursor();

		assert_eq!(first.next_item().await.expect("First item should load."), Some(1));
		assert_eq!(drain(&mut second).await, vec![1, 2, 3]);
		assert_eq!(drain(&mut first).await, vec![2, 3]);
	}

	#[tokio::test]
	async fn malformed_link_fails_the_fetch_that_needs_it() {
		let collection = PagedCollection::new(ScriptedPages::new(vec![(
			vec![1, 2],
			Some("<https://acme.okta.com/api/v1/users?page=1>"),
		)]));
		let mut cursor = collection.cursor();

		assert_eq!(cursor.next_item().await.expect("Buffered item should load."), Some(1));
		assert_eq!(cursor.next_item().await.expect("Buffered item should load."), Some(2));
		assert!(matches!(
			cursor.next_item().await,
			Err(Error::Pagination(PaginationError::MalformedLink { .. }))
		));
		assert_eq!(cursor.next_item().await.expect("Cursor should be fused."), None);
	}

	#[tokio::test]
	async fn failed_fetch_can_be_retried() {
		let attempts = Arc::new(AtomicUsize::new(0));
		let counter = attempts.clone();
		let collection = PagedCollection::new(move |next: Option<String>| {
			let attempt = counter.fetch_add(1, Ordering::SeqCst);

			async move {
				assert!(next.is_none());

				if attempt == 0 {
					Err(Error::Cancelled)
				} else {
					Ok(Page::new(vec![10_u32], HeaderMap::new()))
				}
			}
		});
		let mut cursor = collection.cursor();

		assert!(matches!(cursor.next_item().await, Err(Error::Cancelled)));
		assert_eq!(cursor.next_item().await.expect("Retry should succeed."), Some(10));
		assert_eq!(attempts.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn stream_yields_items_in_order() {
		let collection = PagedCollection::new(ScriptedPages::new(vec![
			(vec![1], Some(r#"</api/v1/users?page=1>; rel="next""#)),
			(vec![2, 3], None),
		]));
		let items = collection
			.stream()
			.map(|item| item.expect("Stream items should load."))
			.collect::<Vec<_>>()
			.await;

		assert_eq!(items, vec![1, 2, 3]);
	}
}

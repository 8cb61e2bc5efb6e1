//! Incremental list loading
//!
//! A [`Paginator`] accumulates pages from a [`PageSource`] in server order.
//! Loads on one paginator are serialized: a `load_more` or `refresh`
//! attempted while another load is running is skipped, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use tidewire_domain::{Page, PageCursor};
use tracing::{debug, instrument};

use super::client::ApiClient;
use super::errors::ApiError;
use super::request::ApiRequest;

/// Fetches one page of a listing.
#[async_trait]
pub trait PageSource<T>: Send + Sync {
    async fn fetch_page(&self, page: u32, limit: u32) -> Result<Page<T>, ApiError>;
}

/// List endpoint taking `page`/`limit` query parameters.
pub struct EndpointSource {
    client: Arc<ApiClient>,
    path: String,
    query: Vec<(String, String)>,
}

impl EndpointSource {
    pub fn new(client: Arc<ApiClient>, path: impl Into<String>) -> Self {
        Self { client, path: path.into(), query: Vec::new() }
    }

    /// Extra filter parameter sent with every page request.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

#[async_trait]
impl<T> PageSource<T> for EndpointSource
where
    T: DeserializeOwned + Send + 'static,
{
    async fn fetch_page(&self, page: u32, limit: u32) -> Result<Page<T>, ApiError> {
        let mut request = ApiRequest::get(self.path.as_str());
        for (key, value) in &self.query {
            request = request.query(key.as_str(), value);
        }
        let request = request.query("page", page).query("limit", limit);
        self.client.send(&request).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The last page has been loaded.
    NoMorePages,
    /// Another load on this paginator has not settled yet.
    InFlight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { page: u32, received: usize },
    Skipped(SkipReason),
}

struct PageState<T> {
    cursor: PageCursor,
    items: Vec<T>,
}

/// Releases the loading flag when the load settles or is dropped.
struct LoadGuard<'a>(&'a AtomicBool);

impl<'a> LoadGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Paginator<T, S = EndpointSource> {
    source: S,
    state: Mutex<PageState<T>>,
    loading: AtomicBool,
}

impl<T> Paginator<T, EndpointSource>
where
    T: DeserializeOwned + Clone + Send + 'static,
{
    /// Paginator over `path` using the client's configured page size.
    pub fn for_endpoint(client: Arc<ApiClient>, path: impl Into<String>) -> Self {
        let limit = client.config().page_limit;
        Self::new(EndpointSource::new(client, path), limit)
    }
}

impl<T, S> Paginator<T, S>
where
    T: Clone + Send,
    S: PageSource<T>,
{
    pub fn new(source: S, limit: u32) -> Self {
        Self {
            source,
            state: Mutex::new(PageState { cursor: PageCursor::new(limit), items: Vec::new() }),
            loading: AtomicBool::new(false),
        }
    }

    /// Drop everything loaded and fetch page 1.
    ///
    /// # Errors
    /// The fetch error; the paginator is left empty at page 0 so
    /// `load_more` or another `refresh` starts over.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<LoadOutcome, ApiError> {
        let Some(_guard) = LoadGuard::acquire(&self.loading) else {
            debug!("refresh skipped, load in flight");
            return Ok(LoadOutcome::Skipped(SkipReason::InFlight));
        };

        let limit = {
            let mut state = self.state.lock();
            state.cursor.reset();
            state.items.clear();
            state.cursor.limit
        };

        let page = self.source.fetch_page(1, limit).await?;
        let received = page.data.len();

        let mut state = self.state.lock();
        state.items = page.data;
        state.cursor.advance(1, received, page.pagination.as_ref());
        debug!(received, has_more = state.cursor.has_more, "first page loaded");
        Ok(LoadOutcome::Loaded { page: 1, received })
    }

    /// Fetch the next page and append it.
    ///
    /// No request is made when there are no more pages or a load is in
    /// flight.
    ///
    /// # Errors
    /// The fetch error; page and items are unchanged so the same page can
    /// be retried.
    #[instrument(skip(self))]
    pub async fn load_more(&self) -> Result<LoadOutcome, ApiError> {
        let Some(_guard) = LoadGuard::acquire(&self.loading) else {
            debug!("load_more skipped, load in flight");
            return Ok(LoadOutcome::Skipped(SkipReason::InFlight));
        };

        let (next, limit) = {
            let state = self.state.lock();
            if !state.cursor.has_more {
                return Ok(LoadOutcome::Skipped(SkipReason::NoMorePages));
            }
            (state.cursor.next_page(), state.cursor.limit)
        };

        let page = self.source.fetch_page(next, limit).await?;
        let received = page.data.len();

        let mut state = self.state.lock();
        state.items.extend(page.data);
        state.cursor.advance(next, received, page.pagination.as_ref());
        debug!(page = next, received, has_more = state.cursor.has_more, "page appended");
        Ok(LoadOutcome::Loaded { page: next, received })
    }

    /// Everything loaded so far, in server order.
    pub fn items(&self) -> Vec<T> {
        self.state.lock().items.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cursor(&self) -> PageCursor {
        self.state.lock().cursor.clone()
    }

    pub fn has_more(&self) -> bool {
        self.state.lock().cursor.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }
}

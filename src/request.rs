//! # Request Module
//!
//! First-class handles to in-flight fetches.
//!
//! ## Overview
//!
//! A `RequestHandle` is created by spawning a task that performs the GET
//! and, on 200, runs the supplied parse callback against the response.
//! The handle is owned by whoever created it, the engine for top-level
//! seed requests or a parse callback for nested sub-requests, and only
//! that owner can await it, because awaiting consumes the handle.
//!
//! Nested sub-requests are deliberately *not* tied to the engine: a
//! callback running on one request task can spawn and synchronously await
//! further requests through its `RequestContext` without the engine ever
//! learning about them. They become visible only through the records the
//! parent completion eventually merges.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::trace;
use url::Url;
use uuid::Uuid;

use crate::error::ScrapexError;
use crate::fetcher::Fetcher;
use crate::response::Response;
use crate::spider::ParseValue;

/// Default budget for `RequestHandle::await_result`.
pub const DEFAULT_AWAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// The capability handed to parse callbacks for spawning further
/// requests. Cloning is cheap; all clones share one fetcher.
#[derive(Clone)]
pub struct RequestContext {
    fetcher: Arc<dyn Fetcher>,
}

impl RequestContext {
    pub(crate) fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        RequestContext { fetcher }
    }

    /// Spawns a fetch-then-parse task for `url` and returns its handle.
    ///
    /// The callback runs only on a successful fetch; fetch errors become
    /// the task's result directly. The caller owns the returned handle.
    pub fn request<F, Fut>(&self, url: Url, callback: F) -> RequestHandle
    where
        F: FnOnce(Response, RequestContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<ParseValue, ScrapexError>> + Send + 'static,
    {
        let id = Uuid::new_v4();
        let fetcher = Arc::clone(&self.fetcher);
        let ctx = self.clone();
        let task_url = url.clone();
        let task = tokio::spawn(async move {
            trace!(request = %id, url = %task_url, "request task started");
            let response = fetcher.fetch(&task_url).await?;
            callback(response, ctx).await
        });
        RequestHandle { id, url, task }
    }
}

/// A handle to one asynchronous single-URL fetch plus its parse callback.
pub struct RequestHandle {
    id: Uuid,
    url: Url,
    task: JoinHandle<Result<ParseValue, ScrapexError>>,
}

impl RequestHandle {
    /// The unique id of this request, for logs and diagnostics.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The URL this request was issued for.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Awaits the callback's value with the default 5 s budget.
    pub async fn await_result(self) -> Result<ParseValue, ScrapexError> {
        self.await_within(Some(DEFAULT_AWAIT_TIMEOUT)).await
    }

    /// Awaits the callback's value within `timeout`; `None` waits
    /// indefinitely.
    ///
    /// If the task died, the join error (panic or abort reason) is
    /// surfaced as `TaskCrash`. On timeout the task is aborted and
    /// `AwaitTimeout` is returned.
    pub async fn await_within(
        self,
        timeout: Option<Duration>,
    ) -> Result<ParseValue, ScrapexError> {
        let RequestHandle { id, url, mut task } = self;
        let joined = match timeout {
            Some(budget) => match tokio::time::timeout(budget, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    trace!(request = %id, %url, "await budget exceeded, aborting task");
                    task.abort();
                    return Err(ScrapexError::AwaitTimeout(url));
                }
            },
            None => task.await,
        };
        match joined {
            Ok(outcome) => outcome,
            Err(join_err) => Err(ScrapexError::TaskCrash(join_err.to_string())),
        }
    }
}

impl std::fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHandle")
            .field("id", &self.id)
            .field("url", &self.url.as_str())
            .finish()
    }
}

//! Request context store.
//!
//! Each in-flight request runs inside a task-local scope holding its
//! [`RequestContext`]. The scope travels with the future across every
//! `.await`, so interleaved requests on the same worker thread never see
//! each other's context. Outside any scope [`current`] returns `None`.
//!
//! Task-locals do not follow `tokio::spawn`; use [`spawn`] (or
//! [`propagate`]) to carry the current context into a new task.

use crate::logger::Logger;
use std::future::Future;
use std::sync::Arc;
use tokio::task::futures::TaskLocalFuture;
use tokio::task::JoinHandle;

tokio::task_local! {
    static CURRENT: Arc<RequestContext>;
}

/// Per-request bundle: the request id and the child logger bound to it.
#[derive(Debug)]
pub struct RequestContext {
    request_id: String,
    logger: Logger,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>, logger: Logger) -> Self {
        Self {
            request_id: request_id.into(),
            logger,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }
}

/// Run `fut` with `context` as the current context. The context is
/// released when the future completes or is dropped.
pub fn scope<F: Future>(
    context: Arc<RequestContext>,
    fut: F,
) -> TaskLocalFuture<Arc<RequestContext>, F> {
    CURRENT.scope(context, fut)
}

/// Synchronous counterpart of [`scope`].
pub fn sync_scope<R>(context: Arc<RequestContext>, f: impl FnOnce() -> R) -> R {
    CURRENT.sync_scope(context, f)
}

/// The context of the innermost enclosing scope, if any. Never panics.
pub fn current() -> Option<Arc<RequestContext>> {
    CURRENT.try_with(Arc::clone).ok()
}

/// Request id of the current context, if any.
pub fn request_id() -> Option<String> {
    CURRENT.try_with(|ctx| ctx.request_id.clone()).ok()
}

/// Wrap `fut` so it runs under the context that is current right now.
pub fn propagate<F: Future>(fut: F) -> impl Future<Output = F::Output> {
    let context = current();
    async move {
        match context {
            Some(context) => CURRENT.scope(context, fut).await,
            None => fut.await,
        }
    }
}

/// `tokio::spawn` that inherits the current context.
pub fn spawn<F>(fut: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(propagate(fut))
}

pub trait FutureExt: Future + Sized {
    /// Run this future under `context`.
    fn with_context(self, context: Arc<RequestContext>) -> TaskLocalFuture<Arc<RequestContext>, Self>;
}

impl<F: Future> FutureExt for F {
    fn with_context(self, context: Arc<RequestContext>) -> TaskLocalFuture<Arc<RequestContext>, Self> {
        scope(context, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::logger::Logger;
    use std::sync::Arc;
    use tokio::task::yield_now;

    fn context(id: &str) -> Arc<RequestContext> {
        let base = Logger::new(Arc::new(Config::default()), Vec::new());
        Arc::new(RequestContext::new(id, base))
    }

    #[test]
    fn no_context_outside_a_scope() {
        assert!(current().is_none());
        assert!(request_id().is_none());
    }

    #[tokio::test]
    async fn scope_is_visible_across_awaits() {
        let seen = scope(context("a"), async {
            yield_now().await;
            let first = request_id();
            yield_now().await;
            (first, request_id())
        })
        .await;
        assert_eq!(seen, (Some("a".into()), Some("a".into())));
        assert!(current().is_none());
    }

    #[tokio::test]
    async fn interleaved_scopes_stay_isolated() {
        let a = scope(context("a"), async {
            let mut ids = Vec::new();
            for _ in 0..5 {
                yield_now().await;
                ids.push(request_id());
            }
            ids
        });
        let b = scope(context("b"), async {
            let mut ids = Vec::new();
            for _ in 0..5 {
                ids.push(request_id());
                yield_now().await;
            }
            ids
        });
        let (a, b) = tokio::join!(a, b);
        assert!(a.iter().all(|id| id.as_deref() == Some("a")));
        assert!(b.iter().all(|id| id.as_deref() == Some("b")));
    }

    #[tokio::test]
    async fn inner_scope_wins_within_its_branch() {
        let seen = scope(context("outer"), async {
            let inner = scope(context("inner"), async { request_id() }).await;
            (inner, request_id())
        })
        .await;
        assert_eq!(seen, (Some("inner".into()), Some("outer".into())));
    }

    #[tokio::test]
    async fn spawned_tasks_inherit_the_context() {
        let id = scope(context("parent"), async {
            spawn(async {
                yield_now().await;
                request_id()
            })
            .await
            .unwrap()
        })
        .await;
        assert_eq!(id.as_deref(), Some("parent"));
    }

    #[tokio::test]
    async fn context_is_released_after_the_scope() {
        let ctx = context("released");
        scope(Arc::clone(&ctx), async { yield_now().await }).await;
        assert_eq!(Arc::strong_count(&ctx), 1);
    }

    #[test]
    fn sync_scope_sets_and_clears() {
        let id = sync_scope(context("sync"), request_id);
        assert_eq!(id.as_deref(), Some("sync"));
        assert!(current().is_none());
    }

    #[tokio::test]
    async fn future_ext_attaches_a_context() {
        let id = async { request_id() }.with_context(context("ext")).await;
        assert_eq!(id.as_deref(), Some("ext"));
    }
}

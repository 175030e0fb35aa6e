//! Fetch-and-replace cache
//!
//! A [`LiveCollection`] never patches itself from event payloads. Every
//! matching change triggers a full refetch that replaces the snapshot.

use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;

use super::feed::{ChangeFeed, Subscription};
use crate::db::RepoResult;
use shared::message::{EventMask, StoreTable};

type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, RepoResult<Vec<T>>> + Send + Sync>;

pub struct LiveCollection<T> {
    name: &'static str,
    items: RwLock<Arc<Vec<T>>>,
    fetch: Fetcher<T>,
}

impl<T> std::fmt::Debug for LiveCollection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveCollection")
            .field("name", &self.name)
            .field("len", &self.items.read().len())
            .finish()
    }
}

impl<T> LiveCollection<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F>(name: &'static str, fetch: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, RepoResult<Vec<T>>> + Send + Sync + 'static,
    {
        Self {
            name,
            items: RwLock::new(Arc::new(Vec::new())),
            fetch: Arc::new(fetch),
        }
    }

    /// Refetch and replace the snapshot; the old one survives on error.
    pub async fn refresh(&self) -> RepoResult<usize> {
        let fresh = (self.fetch)().await?;
        let len = fresh.len();
        *self.items.write() = Arc::new(fresh);
        tracing::debug!(collection = self.name, len, "live collection refreshed");
        Ok(len)
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<Vec<T>> {
        self.items.read().clone()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Refetch on every matching change of `table`.
    ///
    /// The collection stays alive as long as the returned handle does.
    pub fn bind(self: &Arc<Self>, feed: &ChangeFeed, table: StoreTable, mask: EventMask) -> Subscription {
        let collection = Arc::clone(self);
        feed.subscribe(table, mask, move |event| {
            let collection = Arc::clone(&collection);
            Box::pin(async move {
                if let Err(e) = collection.refresh().await {
                    tracing::warn!(
                        collection = collection.name,
                        table = %event.table,
                        error = %e,
                        "live collection refresh failed"
                    );
                }
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::RepoError;
    use shared::message::ChangeKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_collection(calls: Arc<AtomicUsize>) -> Arc<LiveCollection<usize>> {
        Arc::new(LiveCollection::new("counter", move || {
            let calls = Arc::clone(&calls);
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Ok((0..n).collect())
            })
        }))
    }

    #[tokio::test]
    async fn test_refresh_replaces_snapshot() {
        let calls = Arc::new(AtomicUsize::new(0));
        let collection = counting_collection(calls.clone());
        assert!(collection.is_empty());

        collection.refresh().await.unwrap();
        assert_eq!(collection.len(), 1);
        collection.refresh().await.unwrap();
        assert_eq!(*collection.snapshot(), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_bound_collection_refetches_on_change() {
        let feed = ChangeFeed::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let collection = counting_collection(calls.clone());
        let sub = collection.bind(&feed, StoreTable::MenuItems, EventMask::ALL);

        feed.publish(StoreTable::Orders, ChangeKind::Insert, 1);
        feed.publish(StoreTable::MenuItems, ChangeKind::Update, 7);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(collection.len(), 1);

        drop(sub);
        tokio::time::sleep(Duration::from_millis(20)).await;
        feed.publish(StoreTable::MenuItems, ChangeKind::Update, 7);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let fail = Arc::new(AtomicUsize::new(0));
        let flag = fail.clone();
        let collection = LiveCollection::new("flaky", move || {
            let flag = flag.clone();
            Box::pin(async move {
                if flag.load(Ordering::SeqCst) > 0 {
                    Err(RepoError::Database("offline".into()))
                } else {
                    Ok(vec!["a".to_string()])
                }
            })
        });
        collection.refresh().await.unwrap();
        fail.store(1, Ordering::SeqCst);
        assert!(collection.refresh().await.is_err());
        assert_eq!(*collection.snapshot(), vec!["a".to_string()]);
    }
}

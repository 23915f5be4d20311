//! Concurrent builds sharing one `PersistCache`.

use async_trait::async_trait;
use ctesql::{
    BuildOptions, CacheKey, Cacher, CteError, CteResult, PersistCache, Query, RenderedStatement, q,
};
use futures_util::future::join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Barrier, Notify};

#[derive(Default)]
struct SlowCacher {
    saves: AtomicUsize,
    fail: AtomicBool,
}

#[async_trait]
impl Cacher for SlowCacher {
    async fn persist(
        &self,
        _statement: &RenderedStatement,
        key: &CacheKey,
        _tag: Option<&str>,
    ) -> CteResult<Query> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(CteError::Other("warehouse unavailable".into()));
        }
        Ok(Query::from_sql(format!("select * from saved_{}", key.short())))
    }
}

/// A report over an expensive upstream, built from scratch each time.
fn report(cacher: &Arc<SlowCacher>, n: usize) -> Query {
    let upstream = Query::from_sql("select customer, sum(amount) from orders group by 1")
        .persist(cacher.clone(), Some("totals"));
    q(format!("select {n} as report, * from "))
        .push_query(&upstream)
        .finish()
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_builds_save_each_key_once() {
    const TASKS: usize = 16;
    let cacher = Arc::new(SlowCacher::default());
    let cache = Arc::new(PersistCache::new());
    let barrier = Arc::new(Barrier::new(TASKS));

    let mut handles = Vec::new();
    for n in 0..TASKS {
        let query = report(&cacher, n);
        let cache = cache.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            query.build_cached(&cache, &BuildOptions::new()).await
        }));
    }

    let retrievals: Vec<String> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| {
            let rendered = joined.unwrap().unwrap();
            // Line 2 is the body of the persisted CTE.
            rendered.sql().lines().nth(2).unwrap().to_string()
        })
        .collect();

    assert_eq!(cacher.saves.load(Ordering::SeqCst), 1);
    assert_eq!(cache.len(), 1);
    assert!(retrievals[0].contains("select * from saved_"));
    assert!(retrievals.iter().all(|r| r == &retrievals[0]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn a_failed_save_reaches_every_waiter() {
    const TASKS: usize = 8;
    let cacher = Arc::new(SlowCacher::default());
    cacher.fail.store(true, Ordering::SeqCst);
    let cache = Arc::new(PersistCache::new());
    let barrier = Arc::new(Barrier::new(TASKS));

    let mut handles = Vec::new();
    for n in 0..TASKS {
        let query = report(&cacher, n);
        let cache = cache.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            query.build_cached(&cache, &BuildOptions::new()).await
        }));
    }

    for handle in handles {
        let result = tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .expect("waiter hung")
            .unwrap();
        let err = result.unwrap_err();
        assert!(err.is_cache_save(), "unexpected error: {err}");
        assert!(err.to_string().contains("warehouse unavailable"));
    }

    // The key is left unresolved, so a later build tries again.
    cacher.fail.store(false, Ordering::SeqCst);
    let before = cacher.saves.load(Ordering::SeqCst);
    report(&cacher, 0)
        .build_cached(&cache, &BuildOptions::new())
        .await
        .unwrap();
    assert_eq!(cacher.saves.load(Ordering::SeqCst), before + 1);
}

/// Saves for "first" only finish once the save for "second" has started.
#[derive(Default)]
struct GatedCacher {
    second_started: Notify,
}

#[async_trait]
impl Cacher for GatedCacher {
    async fn persist(
        &self,
        _statement: &RenderedStatement,
        key: &CacheKey,
        tag: Option<&str>,
    ) -> CteResult<Query> {
        match tag {
            Some("first") => self.second_started.notified().await,
            _ => self.second_started.notify_one(),
        }
        Ok(Query::from_sql(format!("select * from gated_{}", key.short())))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unrelated_keys_save_in_parallel() {
    let cacher = Arc::new(GatedCacher::default());
    let cache = Arc::new(PersistCache::new());

    let first = Query::from_sql("select 1").persist(cacher.clone(), Some("first"));
    let second = Query::from_sql("select 2").persist(cacher.clone(), Some("second"));

    let first_task = {
        let cache = cache.clone();
        tokio::spawn(async move { first.build_cached(&cache, &BuildOptions::new()).await })
    };
    // Give the first save a head start so it is holding its key's lock.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second_task = {
        let cache = cache.clone();
        tokio::spawn(async move { second.build_cached(&cache, &BuildOptions::new()).await })
    };

    let (a, b) = tokio::time::timeout(Duration::from_secs(10), async {
        (first_task.await.unwrap(), second_task.await.unwrap())
    })
    .await
    .expect("saves of unrelated keys were serialized");
    assert!(a.unwrap().sql().starts_with("select * from gated_"));
    assert!(b.unwrap().sql().starts_with("select * from gated_"));
    assert_eq!(cache.len(), 2);
}

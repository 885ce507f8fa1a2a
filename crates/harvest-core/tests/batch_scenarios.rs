//! Integration tests: window ordering and done-item filtering through the public API.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use harvest_core::batch::{BatchCoordinator, BatchJob, ResultStore, WorkResult};
use harvest_core::circuit::CircuitRegistry;
use harvest_core::retry::{RetryEngine, RetryPolicy};
use tokio::time::Instant;

/// Job that records when each item starts and finishes. Durations vary per item
/// so windows settle out of order internally.
#[derive(Default)]
struct TimedJob {
    calls: AtomicUsize,
    spans: Mutex<Vec<(u32, Instant, Instant)>>,
}

#[async_trait]
impl BatchJob for TimedJob {
    type Item = u32;
    type Output = u32;

    fn key(&self, item: &u32) -> String {
        format!("host{}.example", item % 3)
    }

    async fn process(&self, item: &u32) -> anyhow::Result<u32> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let start = Instant::now();
        tokio::time::sleep(Duration::from_millis(50 + u64::from(*item % 4) * 100)).await;
        self.spans.lock().unwrap().push((*item, start, Instant::now()));
        Ok(item * 10)
    }
}

#[derive(Default)]
struct RecordingStore {
    done: HashSet<u32>,
    persisted_at: Mutex<Vec<(u32, Instant)>>,
}

#[async_trait]
impl ResultStore<u32, u32> for RecordingStore {
    async fn is_done(&self, item: &u32) -> anyhow::Result<bool> {
        Ok(self.done.contains(item))
    }

    async fn persist(&self, result: &WorkResult<u32, u32>) -> anyhow::Result<i64> {
        let mut persisted = self.persisted_at.lock().unwrap();
        persisted.push((result.item, Instant::now()));
        Ok(persisted.len() as i64)
    }
}

fn coordinator(concurrency: usize, pause: Duration) -> BatchCoordinator {
    let engine = RetryEngine::new(
        RetryPolicy::default(),
        CircuitRegistry::new(5, Duration::from_secs(60)),
    );
    BatchCoordinator::new(Arc::new(engine), concurrency, pause)
}

#[tokio::test(start_paused = true)]
async fn twenty_items_run_in_seven_sequential_windows() {
    let job = Arc::new(TimedJob::default());
    let store = Arc::new(RecordingStore::default());
    let pause = Duration::from_millis(500);
    let items: Vec<u32> = (0..20).collect();

    let report = coordinator(3, pause)
        .run(Arc::clone(&job), Arc::clone(&store), items.clone())
        .await;

    assert_eq!(report.results.len(), 20);
    assert_eq!(report.succeeded(), 20);
    assert_eq!(job.calls.load(Ordering::SeqCst), 20);

    // Results come back window by window.
    let windows: Vec<Vec<u32>> = items.chunks(3).map(|w| w.to_vec()).collect();
    assert_eq!(windows.len(), 7);
    let returned: Vec<u32> = report.results.iter().map(|r| r.item).collect();
    for (w, chunk) in windows.iter().zip(returned.chunks(3)) {
        let mut got = chunk.to_vec();
        got.sort_unstable();
        assert_eq!(&got, w);
    }

    let spans = job.spans.lock().unwrap().clone();
    let persisted = store.persisted_at.lock().unwrap().clone();
    let span_of = |item: u32| spans.iter().find(|s| s.0 == item).copied().unwrap();
    let persisted_of = |item: u32| persisted.iter().find(|p| p.0 == item).unwrap().1;

    for pair in windows.windows(2) {
        let (current, next) = (&pair[0], &pair[1]);
        let settled = current.iter().map(|&i| persisted_of(i)).max().unwrap();
        let next_start = next.iter().map(|&i| span_of(i).1).min().unwrap();
        assert!(
            next_start >= settled + pause,
            "window starting with {} began before the previous window settled",
            next[0]
        );
    }

    // Each success is persisted as it lands, not when its window settles.
    for w in &windows {
        let fastest = w.iter().copied().min_by_key(|&i| span_of(i).2).unwrap();
        let slowest = w.iter().copied().max_by_key(|&i| span_of(i).2).unwrap();
        assert!(
            persisted_of(fastest) < span_of(slowest).2,
            "item {fastest} was persisted only after item {slowest} finished"
        );
    }

    // Within a window every item starts together.
    for w in &windows {
        let starts: HashSet<Instant> = w.iter().map(|&i| span_of(i).1).collect();
        assert_eq!(starts.len(), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn done_items_are_skipped_entirely() {
    let job = Arc::new(TimedJob::default());
    let done: HashSet<u32> = [0, 4, 9, 13, 19].into_iter().collect();
    let store = Arc::new(RecordingStore {
        done: done.clone(),
        ..RecordingStore::default()
    });

    let report = coordinator(3, Duration::ZERO)
        .run(Arc::clone(&job), Arc::clone(&store), (0..20).collect())
        .await;

    assert_eq!(job.calls.load(Ordering::SeqCst), 15);
    assert_eq!(report.results.len(), 15);
    assert_eq!(report.skipped_done, 5);
    assert!(report.results.iter().all(|r| !done.contains(&r.item)));
    assert!(report
        .results
        .iter()
        .all(|r| r.data() == Some(&(r.item * 10))));
    assert_eq!(store.persisted_at.lock().unwrap().len(), 15);
}

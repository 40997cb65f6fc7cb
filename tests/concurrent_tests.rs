//! Work distribution under concurrency.

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use common::Project;
use static_prerender::factory::mock::MockBrowserFactory;
use static_prerender::prelude::*;
use static_prerender::{TargetQueue, run_build_with};

fn targets(n: usize) -> Vec<TargetIdentifier> {
    (0..n)
        .map(|i| TargetIdentifier::from_url(&format!("https://site{}.example/", i)).unwrap())
        .collect()
}

/// Verifies concurrent pops hand out every target exactly once.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_queue_exactly_once_under_contention() {
    let queue = Arc::new(TargetQueue::new(targets(500)));
    let mut tasks = tokio::task::JoinSet::new();

    for _ in 0..16 {
        let queue = Arc::clone(&queue);
        tasks.spawn(async move {
            let mut taken = Vec::new();
            while let Some((position, target)) = queue.pop() {
                taken.push((position, target));
                tokio::task::yield_now().await;
            }
            taken
        });
    }

    let mut positions = HashSet::new();
    let mut seen = HashSet::new();
    while let Some(result) = tasks.join_next().await {
        for (position, target) in result.unwrap() {
            assert!(positions.insert(position), "position {} handed out twice", position);
            assert!(seen.insert(target), "target handed out twice");
        }
    }

    assert_eq!(seen.len(), 500);
    assert_eq!(positions, (1..=500).collect::<HashSet<_>>());
    assert_eq!(queue.remaining(), 0);
}

/// Verifies a multi-worker build spreads work and renders each target once.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pipeline_spreads_work_across_workers() {
    let urls: Vec<String> = (0..24).map(|i| format!("https://site{}.example/", i)).collect();
    let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();
    let project = Project::with_targets(&url_refs);
    let config = project.config(4);

    let factory = MockBrowserFactory::new().with_delay(Duration::from_millis(10));
    let log = factory.render_log();
    let counter = factory.counter();

    let report = run_build_with(&config, &TargetSelection::All, |_| factory)
        .await
        .unwrap();

    assert_eq!(report.succeeded(), 24);
    assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 4);

    let renders = log.lock().unwrap().clone();
    assert_eq!(renders.len(), 24);
    let unique: HashSet<_> = renders.iter().map(|(_, target)| target.clone()).collect();
    assert_eq!(unique.len(), 24);
    let workers: HashSet<_> = renders.iter().map(|(worker, _)| *worker).collect();
    assert!(workers.len() > 1, "expected work on several workers, got {:?}", workers);

    assert_eq!(project.output_keys().len(), 24);
}

//! End-to-end pipeline runs against a scripted browser

use mida::error::{NavigationError, PipelineError};
use mida::task::{CompletionCondition, RawTask};
use mida::{Pipeline, PipelineConfig, PipelineReport, StorageBackend, VecDispatcher};
use proptest::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::time::Instant;

mod common;

use common::{RecordingMonitor, RecordingStorage, Script, ScriptedTransport, raw_task, sanitizer};

fn config(root: &Path, crawlers: usize, storers: usize) -> PipelineConfig {
    PipelineConfig::builder()
        .crawlers(crawlers)
        .storers(storers)
        .temp_root(root)
        .shutdown_grace(Duration::from_secs(1))
        .storage_backoff(Duration::from_secs(1), 5, Duration::from_secs(10))
        .cleanup_retry_delay(Duration::from_millis(100))
        .build()
        .expect("valid config")
}

fn unreachable() -> Script {
    Script {
        nav_error: Some(NavigationError::PageError("net::ERR_CONNECTION_REFUSED".into())),
        ..Script::default()
    }
}

fn load_task(url: &str, max_attempts: u32) -> RawTask {
    let mut raw = raw_task(url, CompletionCondition::LoadEvent, 10, 0);
    raw.max_attempts = Some(max_attempts);
    raw
}

/// Working directories left under the temp root
fn leftover_dirs(root: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(root)
        .expect("read temp root")
        .map(|e| e.expect("dir entry").path())
        .filter(|p| p.file_name().is_some_and(|n| n != "results"))
        .collect()
}

struct Harness {
    transport: Arc<ScriptedTransport>,
    storage: Arc<RecordingStorage>,
    monitor: Arc<RecordingMonitor>,
}

impl Harness {
    fn new(script: Script, storage: RecordingStorage) -> Self {
        Self {
            transport: Arc::new(ScriptedTransport::new(script)),
            storage: Arc::new(storage),
            monitor: Arc::new(RecordingMonitor::default()),
        }
    }

    fn pipeline(&self, config: PipelineConfig) -> Pipeline {
        Pipeline::new(config, self.transport.clone())
            .with_storage(vec![self.storage.clone() as Arc<dyn StorageBackend>])
            .with_monitor(self.monitor.clone())
    }

    async fn run(&self, root: &Path, config: PipelineConfig, tasks: Vec<RawTask>) -> PipelineReport {
        self.pipeline(config)
            .run(VecDispatcher::new(tasks), sanitizer(root))
            .await
            .expect("pipeline run")
    }
}

#[tokio::test(start_paused = true)]
async fn failing_task_is_crawled_max_attempts_times_then_abandoned() {
    common::init_logging();
    let root = tempfile::tempdir().expect("tempdir");
    let harness = Harness::new(unreachable(), RecordingStorage::default());

    let report = harness
        .run(
            root.path(),
            config(root.path(), 1, 1),
            vec![load_task("https://unreachable.example/", 2)],
        )
        .await;

    assert_eq!(harness.transport.calls.navigations(), 2);
    assert_eq!(
        report,
        PipelineReport {
            admitted: 1,
            invalid: 0,
            crawl_passes: 2,
            stored: 0,
            retried: 1,
            abandoned: 1,
        }
    );
    assert!(harness.storage.stored().is_empty(), "failed tasks are not stored");

    let summaries = harness.monitor.summaries();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].attempt, 1);
    assert_eq!(summaries[1].attempt, 2);
    assert!(summaries.iter().all(|s| !s.success));
    assert!(leftover_dirs(root.path()).is_empty());
}

#[tokio::test(start_paused = true)]
async fn retried_task_carries_its_failure_history() {
    let root = tempfile::tempdir().expect("tempdir");
    let harness = Harness::new(
        Script {
            failing_navigations: Some(1),
            load_after: Some(Duration::from_secs(1)),
            ..unreachable()
        },
        RecordingStorage::default(),
    );

    let report = harness
        .run(
            root.path(),
            config(root.path(), 1, 1),
            vec![load_task("https://flaky.example/", 3)],
        )
        .await;

    assert_eq!(report.crawl_passes, 2);
    assert_eq!(report.retried, 1);
    assert_eq!(report.stored, 1);
    assert_eq!(report.abandoned, 0);

    let stored = harness.storage.stored();
    assert_eq!(stored.len(), 1);
    let task = &stored[0].task;
    assert_eq!(task.current_attempt, 2);
    assert!(!task.task_failed);
    assert_eq!(task.failure_code, "");
    assert_eq!(
        task.past_failure_codes,
        vec!["failed to navigate to site: net::ERR_CONNECTION_REFUSED".to_string()]
    );
    assert!(stored[0].summary.success);
    assert!(leftover_dirs(root.path()).is_empty());
}

#[tokio::test(start_paused = true)]
async fn successful_results_are_stored_with_timing() {
    let root = tempfile::tempdir().expect("tempdir");
    let harness = Harness::new(
        Script {
            load_after: Some(Duration::from_secs(1)),
            events: vec![
                common::request("r1", "https://example.com/"),
                common::response("r1", "https://example.com/"),
                common::request("r2", "https://example.com/never-answered"),
            ],
            ..Script::default()
        },
        RecordingStorage::default(),
    );

    let report = harness
        .run(
            root.path(),
            config(root.path(), 1, 1),
            vec![load_task("https://example.com/", 1)],
        )
        .await;

    assert_eq!(report.stored, 1);
    let stored = harness.storage.stored();
    assert_eq!(stored.len(), 1);
    let result = &stored[0];
    assert_eq!(result.resources.len(), 1);
    assert!(result.resources.contains_key("r1"));

    let timing = &harness.monitor.summaries()[0].timing;
    assert!(timing.begin_storage.is_some());
    assert!(timing.end_storage.is_some());
    assert!(timing.end_postprocess.is_some());
    assert!(timing.marks().windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(
        harness.monitor.summaries()[0].output_path.as_deref(),
        Some(format!("memory://{}", result.summary.uuid).as_str())
    );
}

#[tokio::test(start_paused = true)]
async fn storage_outage_is_retried_with_backoff() {
    let root = tempfile::tempdir().expect("tempdir");
    let harness = Harness::new(
        Script {
            load_after: Some(Duration::from_secs(1)),
            ..Script::default()
        },
        RecordingStorage::failing(2),
    );

    let start = Instant::now();
    let report = harness
        .run(
            root.path(),
            config(root.path(), 1, 1),
            vec![load_task("https://example.com/", 1)],
        )
        .await;

    assert_eq!(report.stored, 1);
    assert_eq!(harness.storage.attempts.load(Ordering::SeqCst), 3);
    // 1s visit, then 1s and 5s of backoff
    assert!(start.elapsed() >= Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn invalid_tasks_are_dropped_and_counted() {
    let root = tempfile::tempdir().expect("tempdir");
    let harness = Harness::new(
        Script {
            load_after: Some(Duration::from_millis(200)),
            ..Script::default()
        },
        RecordingStorage::default(),
    );

    let mut zero_attempts = load_task("https://example.com/a", 1);
    zero_attempts.max_attempts = Some(0);
    let tasks = vec![
        RawTask::default(),
        raw_task("https://example.com/b", CompletionCondition::TimeAfterLoad, 5, 10),
        zero_attempts,
        load_task("https://example.com/c", 1),
    ];

    let report = harness
        .run(root.path(), config(root.path(), 2, 1), tasks)
        .await;

    assert_eq!(report.invalid, 3);
    assert_eq!(report.admitted, 1);
    assert_eq!(report.stored, 1);
    assert_eq!(harness.transport.calls.launches(), 1);
}

#[tokio::test(start_paused = true)]
async fn many_tasks_across_workers_all_reach_a_disposition() {
    let root = tempfile::tempdir().expect("tempdir");
    let harness = Harness::new(
        Script {
            load_after: Some(Duration::from_millis(500)),
            ..Script::default()
        },
        RecordingStorage::default(),
    );

    let tasks = (0..8)
        .map(|i| load_task(&format!("https://site{i}.example/"), 2))
        .collect();
    let report = harness
        .run(root.path(), config(root.path(), 3, 2), tasks)
        .await;

    assert_eq!(report.admitted, 8);
    assert_eq!(report.crawl_passes, 8);
    assert_eq!(report.stored, 8);
    assert_eq!(harness.monitor.summaries().len(), 8);
    assert!(leftover_dirs(root.path()).is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_the_run() {
    let root = tempfile::tempdir().expect("tempdir");
    let harness = Harness::new(Script::default(), RecordingStorage::default());
    let tasks = (0..3)
        .map(|i| raw_task(&format!("https://slow{i}.example/"), CompletionCondition::TimeoutOnly, 60, 0))
        .collect::<Vec<_>>();

    let pipeline = harness.pipeline(config(root.path(), 1, 1));
    let cancel = pipeline.cancel_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        cancel.cancel();
    });

    let start = Instant::now();
    let report = pipeline
        .run(VecDispatcher::new(tasks), sanitizer(root.path()))
        .await
        .expect("cancelled run still reports");

    assert!(start.elapsed() < Duration::from_secs(60));
    assert_eq!(report.crawl_passes, 1);
    assert_eq!(harness.transport.calls.launches(), 1);
}

#[tokio::test(start_paused = true)]
async fn unusable_temp_root_is_a_pipeline_error() {
    let root = tempfile::tempdir().expect("tempdir");
    let blocker = root.path().join("not-a-dir");
    std::fs::write(&blocker, b"occupied").expect("write blocker");

    let harness = Harness::new(Script::default(), RecordingStorage::default());
    let result = harness
        .pipeline(config(root.path(), 1, 1))
        .run(
            VecDispatcher::new(vec![load_task("https://example.com/", 1)]),
            sanitizer(&blocker),
        )
        .await;

    assert!(matches!(result, Err(PipelineError::Environment(_))));
    assert_eq!(harness.transport.calls.launches(), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn crawl_count_respects_the_attempt_budget(max_attempts in 1u32..=4, failures in 0usize..=4) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .expect("runtime");

        let report = runtime.block_on(async {
            let root = tempfile::tempdir().expect("tempdir");
            let harness = Harness::new(
                Script {
                    failing_navigations: Some(failures),
                    load_after: Some(Duration::from_millis(100)),
                    ..unreachable()
                },
                RecordingStorage::default(),
            );
            harness
                .run(
                    root.path(),
                    config(root.path(), 1, 1),
                    vec![load_task("https://example.com/", max_attempts)],
                )
                .await
        });

        let budget = max_attempts as usize;
        if failures < budget {
            prop_assert_eq!(report.crawl_passes, failures + 1);
            prop_assert_eq!(report.stored, 1);
            prop_assert_eq!(report.abandoned, 0);
        } else {
            prop_assert_eq!(report.crawl_passes, budget);
            prop_assert_eq!(report.stored, 0);
            prop_assert_eq!(report.abandoned, 1);
        }
        prop_assert_eq!(report.retried, report.crawl_passes - 1);
    }
}

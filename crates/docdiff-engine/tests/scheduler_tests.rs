#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex};

use docdiff_core::config::{DiffLimits, SchedulerConfig};
use docdiff_core::diff::{DiffEngine, DocumentPair};
use docdiff_core::errors::DiffError;
use docdiff_core::guard::FixedTelemetry;
use docdiff_core_types::RunId;
use docdiff_engine::progress::{ProgressEvent, ProgressSink, Stage};
use docdiff_engine::scheduler::ChunkScheduler;
use tokio_util::sync::CancellationToken;

fn chunked(unit_budget: usize) -> ChunkScheduler {
    ChunkScheduler::new(
        SchedulerConfig {
            chunk_threshold_chars: 0,
            unit_budget,
            critical_memory_floor_bytes: None,
        },
        DiffLimits::default(),
    )
}

fn recording_sink(events: Arc<Mutex<Vec<ProgressEvent>>>) -> ProgressSink<'static> {
    ProgressSink::detached(RunId::new(1), move |event| {
        events.lock().unwrap().push(event);
    })
}

fn distinct_lines(prefix: &str, min_chars: usize) -> String {
    let mut text = String::with_capacity(min_chars + 32);
    let mut i = 0u64;
    while text.len() < min_chars {
        text.push_str(&format!("{prefix} line number {i}\n"));
        i += 1;
    }
    text
}

#[tokio::test]
async fn test_chunked_result_matches_direct_engine() {
    let pairs = [
        ("The cat sat.", "The cat sat on the mat."),
        ("", "Hello"),
        ("alpha beta gamma delta", "beta alpha delta gamma epsilon"),
        (
            "one\ntwo\nthree\nfour\nfive\n",
            "zero\none\nthree\nfour\n4.5\nfive\n",
        ),
    ];

    for (original, revised) in pairs {
        let pair = DocumentPair::new(original, revised);
        let direct = DiffEngine::default()
            .diff(&pair, &CancellationToken::new())
            .unwrap();

        for budget in [1, 3, 64] {
            let events = Arc::new(Mutex::new(Vec::new()));
            let mut sink = recording_sink(events.clone());
            let scheduled = chunked(budget)
                .run(&pair, &CancellationToken::new(), &mut sink)
                .await
                .unwrap();
            assert_eq!(scheduled, direct, "budget {budget} changed the output");
        }
    }
}

#[tokio::test]
async fn test_chunked_progress_is_monotone_and_ends_at_100() {
    let original = distinct_lines("a", 4_000);
    let revised = original.replace("line number 1", "row number 1");
    let pair = DocumentPair::new(original, revised);

    let events = Arc::new(Mutex::new(Vec::new()));
    let mut sink = recording_sink(events.clone());
    chunked(16)
        .run(&pair, &CancellationToken::new(), &mut sink)
        .await
        .unwrap();

    let events = events.lock().unwrap();
    assert!(events.len() > 3, "expected several unit reports");
    assert!(events.windows(2).all(|w| w[0].percent <= w[1].percent));
    assert_eq!(events.first().unwrap().stage, Stage::Tokenizing);
    assert_eq!(events.last().unwrap().percent, 100);
    assert_eq!(events.last().unwrap().stage, Stage::Finalizing);
}

#[tokio::test]
async fn test_small_input_reports_single_diffing_event() {
    let scheduler = ChunkScheduler::new(SchedulerConfig::default(), DiffLimits::default());
    let pair = DocumentPair::new("short text", "short texts");

    let events = Arc::new(Mutex::new(Vec::new()));
    let mut sink = recording_sink(events.clone());
    scheduler
        .run(&pair, &CancellationToken::new(), &mut sink)
        .await
        .unwrap();

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].percent, 100);
    assert_eq!(events[0].stage, Stage::Diffing);
}

#[tokio::test]
async fn test_cancellation_stops_large_run_at_next_unit() {
    // GIVEN two fully distinct documents of about 2,000,000 characters each
    let pair = DocumentPair::new(
        distinct_lines("original", 2_000_000),
        distinct_lines("revised", 2_000_000),
    );
    let scheduler = ChunkScheduler::new(SchedulerConfig::default(), DiffLimits::default());
    assert!(scheduler.is_chunked(&pair));

    // WHEN cancellation is requested right after the first diffing unit
    let cancel = CancellationToken::new();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink_events = events.clone();
    let sink_cancel = cancel.clone();
    let mut sink = ProgressSink::detached(RunId::new(9), move |event: ProgressEvent| {
        if event.stage == Stage::Diffing {
            sink_cancel.cancel();
        }
        sink_events.lock().unwrap().push(event);
    });
    let outcome = scheduler.run(&pair, &cancel, &mut sink).await;

    // THEN the run ends cancelled with no result, one unit later
    assert_eq!(outcome.unwrap_err(), DiffError::Cancelled);
    let events = events.lock().unwrap();
    let diffing = events.iter().filter(|e| e.stage == Stage::Diffing).count();
    assert_eq!(diffing, 1);
    assert!(events.iter().all(|e| e.percent < 100));
}

#[tokio::test]
async fn test_pre_cancelled_run_does_no_work() {
    let cancel = CancellationToken::new();
    cancel.cancel();

    let events = Arc::new(Mutex::new(Vec::new()));
    let mut sink = recording_sink(events.clone());
    let outcome = chunked(8)
        .run(&DocumentPair::new("a b", "a c"), &cancel, &mut sink)
        .await;

    assert_eq!(outcome.unwrap_err(), DiffError::Cancelled);
    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_memory_floor_fails_chunked_run() {
    let scheduler = ChunkScheduler::new(
        SchedulerConfig {
            chunk_threshold_chars: 0,
            unit_budget: 8,
            critical_memory_floor_bytes: Some(64 * 1024 * 1024),
        },
        DiffLimits::default(),
    )
    .with_telemetry(Arc::new(FixedTelemetry::available(1024)));

    let events = Arc::new(Mutex::new(Vec::new()));
    let mut sink = recording_sink(events.clone());
    let outcome = scheduler
        .run(
            &DocumentPair::new("some text", "other text"),
            &CancellationToken::new(),
            &mut sink,
        )
        .await;

    assert!(matches!(
        outcome,
        Err(DiffError::MemoryExhausted {
            available: 1024,
            ..
        })
    ));
}

#[tokio::test]
async fn test_edit_distance_ceiling_surfaces_from_chunked_run() {
    let scheduler = ChunkScheduler::new(
        SchedulerConfig {
            chunk_threshold_chars: 0,
            unit_budget: 2,
            critical_memory_floor_bytes: None,
        },
        DiffLimits {
            trace_cells_per_token: 1,
            min_trace_cells: 3,
            max_trace_cells: 3,
            ..DiffLimits::default()
        },
    );

    let events = Arc::new(Mutex::new(Vec::new()));
    let mut sink = recording_sink(events.clone());
    let outcome = scheduler
        .run(
            &DocumentPair::new("a b c", "x y z"),
            &CancellationToken::new(),
            &mut sink,
        )
        .await;

    assert!(matches!(outcome, Err(DiffError::EditDistanceLimit { .. })));
}

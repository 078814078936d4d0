#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use docdiff_core::config::{ComparisonConfig, DiffLimits, GuardLimits, SchedulerConfig};
use docdiff_core::diff::DocumentPair;
use docdiff_core::errors::ExErrorKind;
use docdiff_core::guard::FixedTelemetry;
use docdiff_engine::progress::Stage;
use docdiff_engine::{ComparisonOrchestrator, RequestOptions, RequestOutcome};

fn orchestrator(config: ComparisonConfig) -> ComparisonOrchestrator {
    ComparisonOrchestrator::new(config, Arc::new(FixedTelemetry::unknown())).unwrap()
}

fn pair(original: &str, revised: &str) -> DocumentPair {
    DocumentPair::new(original, revised)
}

fn revised_text(state: &docdiff_engine::OrchestratorState) -> String {
    state.result.as_ref().unwrap().reconstruct_revised()
}

#[tokio::test(start_paused = true)]
async fn test_manual_request_publishes_result() {
    let orch = orchestrator(ComparisonConfig::default());

    let outcome = orch.request_comparison(
        pair("The cat sat.", "The cat sat on the mat."),
        RequestOptions::MANUAL,
    );
    assert!(matches!(outcome, RequestOutcome::Started(_)));
    assert!(orch.state().is_processing);

    let state = orch.wait_idle().await;
    assert!(state.error.is_none());
    assert_eq!(revised_text(&state), "The cat sat on the mat.");
    assert_eq!(state.progress.percent, 100);
    assert!(!state.progress.is_active);
    assert!(state.active_run.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_auto_requests_coalesce_within_debounce_window() {
    // GIVEN a 200ms debounce window
    let orch = orchestrator(ComparisonConfig::default());

    // WHEN three edits arrive 150ms apart
    assert_eq!(
        orch.request_comparison(pair("draft", "draft one"), RequestOptions::AUTO),
        RequestOutcome::Debounced
    );
    assert!(orch.state().is_debouncing);
    tokio::time::advance(Duration::from_millis(150)).await;

    assert_eq!(
        orch.request_comparison(pair("draft", "draft two"), RequestOptions::AUTO),
        RequestOutcome::Debounced
    );
    tokio::time::advance(Duration::from_millis(150)).await;

    let waiting = orch.state();
    assert!(!waiting.is_processing, "an earlier edit escaped the debounce");
    assert!(waiting.is_debouncing);

    assert_eq!(
        orch.request_comparison(pair("draft", "draft three"), RequestOptions::AUTO),
        RequestOutcome::Debounced
    );

    // THEN only the latest pair is compared
    let state = orch.wait_idle().await;
    assert_eq!(revised_text(&state), "draft three");
    assert!(!state.is_debouncing);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_active_drops_pending_debounce() {
    let orch = orchestrator(ComparisonConfig::default());

    orch.request_comparison(pair("a", "b"), RequestOptions::AUTO);
    orch.cancel_active();

    let state = orch.state();
    assert!(!state.is_debouncing);
    assert!(!state.is_cancelling);

    tokio::time::sleep(Duration::from_millis(500)).await;
    let state = orch.state();
    assert!(state.result.is_none());
    assert!(!state.is_processing);
}

#[tokio::test(start_paused = true)]
async fn test_manual_run_locks_out_auto_requests() {
    // GIVEN a manual comparison in flight
    let orch = orchestrator(ComparisonConfig::default());
    let outcome = orch.request_comparison(pair("left", "right"), RequestOptions::MANUAL);
    assert!(matches!(outcome, RequestOutcome::Started(_)));

    // WHEN automatic requests arrive, blank ones included
    let auto = orch.request_comparison(pair("x", "y"), RequestOptions::AUTO);
    let blank = orch.request_comparison(pair("", "y"), RequestOptions::AUTO);

    // THEN they are rejected and the manual run finishes undisturbed
    match auto {
        RequestOutcome::Rejected { reason } => assert!(reason.contains("manual")),
        other => panic!("expected rejection, got {:?}", other),
    }
    assert!(matches!(blank, RequestOutcome::Rejected { .. }));

    let state = orch.wait_idle().await;
    assert_eq!(revised_text(&state), "right");

    // AND the lock is released once the manual run is done
    assert_eq!(
        orch.request_comparison(pair("x", "y"), RequestOptions::AUTO),
        RequestOutcome::Debounced
    );
    let state = orch.wait_idle().await;
    assert_eq!(revised_text(&state), "y");
}

#[tokio::test(start_paused = true)]
async fn test_cancel_keeps_previous_result() {
    let orch = orchestrator(ComparisonConfig::default());
    orch.request_comparison(pair("first", "first result"), RequestOptions::MANUAL);
    let first = orch.wait_idle().await;
    assert_eq!(revised_text(&first), "first result");

    let outcome = orch.request_comparison(pair("second", "second result"), RequestOptions::MANUAL);
    let RequestOutcome::Started(run_id) = outcome else {
        panic!("expected a started run, got {:?}", outcome);
    };
    orch.cancel_active();
    assert!(orch.state().is_cancelling);

    let state = orch.wait_idle().await;
    let error = state.error.as_ref().unwrap();
    assert_eq!(error.kind, ExErrorKind::Cancelled);
    assert!(error.is_cancellation());
    assert!(error.retry.is_none());
    assert_eq!(error.run_id, Some(run_id));
    assert_eq!(revised_text(&state), "first result");
    assert_eq!(state.progress.stage, Stage::Cancelled);
    assert!(!state.is_processing);
    assert!(!state.is_cancelling);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_when_idle_is_noop() {
    let orch = orchestrator(ComparisonConfig::default());
    orch.cancel_active();
    orch.cancel_active();

    let state = orch.state();
    assert!(state.is_idle());
    assert!(state.error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_newer_manual_request_supersedes_active_run() {
    let orch = orchestrator(ComparisonConfig::default());

    let first = orch.request_comparison(pair("base", "base one"), RequestOptions::MANUAL);
    let second = orch.request_comparison(pair("base", "base two"), RequestOptions::MANUAL);
    let (RequestOutcome::Started(a), RequestOutcome::Started(b)) = (first, second) else {
        panic!("both manual requests should start");
    };
    assert!(b > a);
    assert_eq!(orch.state().active_run, Some(b));

    let state = orch.wait_idle().await;
    assert!(state.error.is_none(), "superseded run leaked {:?}", state.error);
    assert_eq!(revised_text(&state), "base two");
}

#[tokio::test(start_paused = true)]
async fn test_blank_side_clears_result_without_running() {
    let orch = orchestrator(ComparisonConfig::default());
    orch.request_comparison(pair("some", "some text"), RequestOptions::MANUAL);
    assert!(orch.wait_idle().await.result.is_some());

    let outcome = orch.request_comparison(pair("   ", "some text"), RequestOptions::MANUAL);
    assert_eq!(outcome, RequestOutcome::ShortCircuited);

    let state = orch.state();
    assert!(state.result.is_none());
    assert!(state.error.is_none());
    assert!(state.is_idle());
}

#[tokio::test(start_paused = true)]
async fn test_blank_side_supersedes_active_run() {
    let orch = orchestrator(ComparisonConfig::default());
    orch.request_comparison(pair("one", "two"), RequestOptions::MANUAL);

    let outcome = orch.request_comparison(pair("", "two"), RequestOptions::MANUAL);
    assert_eq!(outcome, RequestOutcome::ShortCircuited);
    assert!(orch.state().is_idle());

    tokio::time::sleep(Duration::from_millis(500)).await;
    let state = orch.state();
    assert!(state.result.is_none());
    assert!(state.error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_admission_rejection_is_reported_in_state() {
    let config = ComparisonConfig {
        guard: GuardLimits {
            max_combined_length: 10,
            ..GuardLimits::default()
        },
        ..ComparisonConfig::default()
    };
    let orch = orchestrator(config);

    let outcome = orch.request_comparison(pair("hello world", "hello there"), RequestOptions::MANUAL);
    let RequestOutcome::Rejected { reason } = outcome else {
        panic!("expected rejection, got {:?}", outcome);
    };

    let state = orch.state();
    let error = state.error.as_ref().unwrap();
    assert_eq!(error.kind, ExErrorKind::AdmissionRejected);
    assert_eq!(error.display_text(), reason);
    assert!(error.retry.is_none());
    assert!(state.is_idle());

    // Automatic requests are admitted when the debounce fires
    orch.request_comparison(pair("hello world", "hello again"), RequestOptions::AUTO);
    let state = orch.wait_idle().await;
    assert_eq!(
        state.error.as_ref().unwrap().kind,
        ExErrorKind::AdmissionRejected
    );
}

#[tokio::test(start_paused = true)]
async fn test_algorithm_failure_offers_retry() {
    // GIVEN an engine whose trace ceiling cannot fit any real edit
    let config = ComparisonConfig {
        diff: DiffLimits {
            trace_cells_per_token: 1,
            min_trace_cells: 3,
            max_trace_cells: 3,
            ..DiffLimits::default()
        },
        ..ComparisonConfig::default()
    };
    let orch = orchestrator(config);

    // WHEN a comparison fails in the engine
    orch.request_comparison(pair("a b c", "x y z"), RequestOptions::MANUAL);
    let state = orch.wait_idle().await;

    // THEN the error carries a retry handle for the same pair
    let error = state.error.clone().unwrap();
    assert_eq!(error.kind, ExErrorKind::AlgorithmError);
    let retry = error.retry.clone().unwrap();
    assert_eq!(retry.pair().revised(), "x y z");
    assert!(state.result.is_none());

    let outcome = retry.retry();
    let RequestOutcome::Started(retry_run) = outcome else {
        panic!("retry should start a run, got {:?}", outcome);
    };
    let state = orch.wait_idle().await;
    let error = state.error.as_ref().unwrap();
    assert_eq!(error.kind, ExErrorKind::AlgorithmError);
    assert_eq!(error.run_id, Some(retry_run));
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_engine_dropped_is_rejected() {
    let config = ComparisonConfig {
        diff: DiffLimits {
            trace_cells_per_token: 1,
            min_trace_cells: 3,
            max_trace_cells: 3,
            ..DiffLimits::default()
        },
        ..ComparisonConfig::default()
    };
    let orch = orchestrator(config);
    orch.request_comparison(pair("a b c", "x y z"), RequestOptions::MANUAL);
    let retry = orch.wait_idle().await.error.unwrap().retry.unwrap();

    drop(orch);
    assert!(matches!(retry.retry(), RequestOutcome::Rejected { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_observed_progress_is_monotone() {
    let config = ComparisonConfig {
        scheduler: SchedulerConfig {
            chunk_threshold_chars: 0,
            unit_budget: 4,
            critical_memory_floor_bytes: None,
        },
        ..ComparisonConfig::default()
    };
    let orch = orchestrator(config);
    let mut rx = orch.subscribe();
    let collector = tokio::spawn(async move {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let state = rx.borrow_and_update().clone();
            seen.push((state.progress.percent, state.progress.stage));
            if state.result.is_some() && state.is_idle() {
                break;
            }
        }
        seen
    });

    orch.request_comparison(
        pair(
            "alpha beta gamma delta epsilon",
            "alpha gamma delta zeta epsilon eta",
        ),
        RequestOptions::MANUAL,
    );
    let state = orch.wait_idle().await;
    let seen = collector.await.unwrap();

    assert!(state.error.is_none());
    assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0), "{:?}", seen);
    assert_eq!(seen.last().unwrap().0, 100);
    assert_eq!(state.progress.stage, Stage::Finalizing);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let config = ComparisonConfig {
        scheduler: SchedulerConfig {
            unit_budget: 0,
            ..SchedulerConfig::default()
        },
        ..ComparisonConfig::default()
    };
    let err = ComparisonOrchestrator::new(config, Arc::new(FixedTelemetry::unknown())).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::InvalidConfig);
}

#[test]
fn test_requires_tokio_runtime() {
    let err = ComparisonOrchestrator::new(
        ComparisonConfig::default(),
        Arc::new(FixedTelemetry::unknown()),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::SystemError);
}

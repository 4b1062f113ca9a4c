//! Test: Status tracking and progress notifications

use crate::helpers::*;
use serde_json::json;
use storyloom::core::Step;
use storyloom::execution::SchedulingStrategy;
use storyloom::status::{LifecycleState, ProgressEventType, StatusError};

#[tokio::test]
async fn test_progress_events_are_monotonic() {
    for strategy in [SchedulingStrategy::Sequential, SchedulingStrategy::Parallel] {
        let (engine, mut rx) = engine_with_events(strategy);
        let p = pipeline(vec![
            Step::new("a", MockOperation::new("a").arc()),
            Step::new("b", MockOperation::new("b").sleeping(10).arc()).depends_on(["a"]),
            Step::new("c", MockOperation::new("c").arc()).depends_on(["a"]),
            Step::new("d", MockOperation::new("d").arc()).depends_on(["b", "c"]),
        ]);
        let mut ctx = context("req-progress");

        let result = engine.execute(&p, json!({}), &mut ctx).await;
        assert_pipeline_completed(&result);

        let events = collect_until_terminal(&mut rx).await;
        assert_eq!(events.first().unwrap().event_type, ProgressEventType::Started);
        let last = events.last().unwrap();
        assert_eq!(last.event_type, ProgressEventType::Completed);
        assert_eq!(last.progress(), 100);

        let progress: Vec<u8> = events.iter().map(|e| e.progress()).collect();
        assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{:?}", progress);
        assert!(progress.contains(&25));
        assert!(progress.contains(&75));
        assert!(events.iter().all(|e| e.request_id() == "req-progress" && e.project_id == "novel" && e.user_id == "writer"));
    }
}

#[tokio::test]
async fn test_final_status_after_success() {
    let (engine, _rx) = engine_with_events(SchedulingStrategy::Parallel);
    let p = pipeline(vec![
        Step::new("a", MockOperation::new("a").returning(json!("one")).costing(1.0).arc()),
        Step::new("b", MockOperation::new("b").costing(2.0).arc()).when(storyloom::core::StepCondition::Ran(
            "missing".into(),
        )),
    ]);
    let mut ctx = context("req-final");

    engine.execute(&p, json!({}), &mut ctx).await;
    let status = engine.get_status("req-final").await.unwrap();

    assert_eq!(status.state, LifecycleState::Completed);
    assert_eq!(status.progress, 100);
    assert_eq!(status.pipeline_id.as_deref(), Some("scenario"));
    assert_eq!(status.total_steps, 2);
    assert_eq!(status.completed_steps.len(), 2);
    assert!(status.active_steps.is_empty());
    assert!(status.completed_at.is_some());

    let a = status.completed_steps.iter().find(|r| r.step_id == "a").unwrap();
    assert_eq!(a.content, Some(json!("one")));
    let b = status.completed_steps.iter().find(|r| r.step_id == "b").unwrap();
    assert!(b.skipped);
    assert_eq!(status.total_cost(), 1.0);
}

#[tokio::test]
async fn test_failed_run_reports_error() {
    let (engine, mut rx) = engine_with_events(SchedulingStrategy::Sequential);
    let p = pipeline(vec![
        Step::new("a", MockOperation::new("a").arc()),
        Step::new("b", MockOperation::new("b").failing("rejected").arc()).depends_on(["a"]),
    ]);
    let mut ctx = context("req-failed");

    engine.execute(&p, json!({}), &mut ctx).await;

    let events = collect_until_terminal(&mut rx).await;
    let last = events.last().unwrap();
    assert_eq!(last.event_type, ProgressEventType::Error);
    assert_eq!(last.payload.state, LifecycleState::Failed);
    assert_eq!(
        last.payload.error.as_deref(),
        Some("Step b failed: Provider error: rejected")
    );
    assert_eq!(last.progress(), 50);
    assert_eq!(last.last_completed().unwrap().step_id, "b");

    let status = engine.get_status("req-failed").await.unwrap();
    assert_eq!(status.state, LifecycleState::Failed);
    let b = status.completed_steps.iter().find(|r| r.step_id == "b").unwrap();
    assert!(!b.success);
    assert_eq!(b.explanation.as_deref(), Some("Provider error: rejected"));
}

#[tokio::test]
async fn test_validation_failure_is_tracked() {
    let (engine, mut rx) = engine_with_events(SchedulingStrategy::Parallel);
    let p = pipeline(vec![Step::new("a", MockOperation::new("a").arc()).depends_on(["ghost"])]);
    let mut ctx = context("req-invalid");

    engine.execute(&p, json!({}), &mut ctx).await;

    let events = collect_until_terminal(&mut rx).await;
    assert_eq!(events.last().unwrap().event_type, ProgressEventType::Error);
    let status = engine.get_status("req-invalid").await.unwrap();
    assert!(status.error.unwrap().contains("non-existent step 'ghost'"));
}

#[tokio::test]
async fn test_unknown_request_is_not_found() {
    let (engine, _rx) = engine_with_events(SchedulingStrategy::Sequential);
    assert!(matches!(
        engine.get_status("never-ran").await,
        Err(StatusError::NotFound(id)) if id == "never-ran"
    ));
}

#[tokio::test]
async fn test_concurrent_runs_are_tracked_separately() {
    let (engine, _rx) = engine_with_events(SchedulingStrategy::Parallel);
    let p = pipeline(vec![
        Step::new("a", MockOperation::new("a").sleeping(20).arc()),
        Step::new("b", MockOperation::new("b").arc()).depends_on(["a"]),
    ]);
    let mut first = context("req-a");
    let mut second = context("req-b");

    let (r1, r2) = tokio::join!(
        engine.execute(&p, json!({}), &mut first),
        engine.execute(&p, json!({}), &mut second)
    );

    assert_pipeline_completed(&r1);
    assert_pipeline_completed(&r2);
    for id in ["req-a", "req-b"] {
        let status = engine.get_status(id).await.unwrap();
        assert_eq!(status.state, LifecycleState::Completed);
        assert_eq!(status.completed_steps.len(), 2);
    }
}

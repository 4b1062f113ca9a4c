//! Test: Conditional steps and input transforms

use crate::helpers::*;
use serde_json::json;
use storyloom::core::{ConditionPattern, ExecutionContext, InputTransform, NamedCondition, Step, StepCondition};
use storyloom::execution::SchedulingStrategy;

#[tokio::test]
async fn test_false_condition_skips_step() {
    let log = StartLog::default();
    let p = pipeline(vec![
        Step::new("draft", MockOperation::new("draft").returning(json!({"status": "rough"})).arc()),
        Step::new("publish", MockOperation::new("publish").logging(&log).arc())
            .depends_on(["draft"])
            .when(StepCondition::OutputMatches {
                step: "draft".into(),
                pointer: Some("/status".into()),
                pattern: ConditionPattern::Simple("final".into()),
            }),
    ]);

    for strategy in [SchedulingStrategy::Sequential, SchedulingStrategy::Parallel] {
        let (result, ctx) = run(strategy, &p, json!({})).await;

        assert_pipeline_completed(&result);
        assert_eq!(result.skipped, vec!["publish"]);
        assert!(result.step("publish").is_none());
        assert!(ctx.prior_result("publish").is_none());
        assert!(result.execution_order.contains(&"publish".to_string()));
    }
    assert!(log.entries().is_empty());
}

#[tokio::test]
async fn test_dependents_of_skipped_step_still_run() {
    let p = pipeline(vec![
        Step::new("review", MockOperation::new("review").arc()).when(StepCondition::StoreHas("editor".into())),
        Step::new("print", MockOperation::new("print").costing(2.0).arc()).depends_on(["review"]),
    ]);

    let (result, _ctx) = run(SchedulingStrategy::Parallel, &p, json!({})).await;

    assert_pipeline_completed(&result);
    assert_eq!(result.skipped, vec!["review"]);
    assert!(result.step("print").unwrap().success);
    assert_eq!(result.total_cost, 2.0);
}

#[tokio::test]
async fn test_condition_on_failed_branch() {
    let log = StartLog::default();
    let p = pipeline(vec![
        Step::new("outline", MockOperation::new("outline").arc()),
        Step::new("fallback", MockOperation::new("fallback").logging(&log).arc())
            .depends_on(["outline"])
            .when(StepCondition::Not(Box::new(StepCondition::Succeeded("outline".into())))),
        Step::new("expand", MockOperation::new("expand").logging(&log).arc())
            .depends_on(["outline"])
            .when(StepCondition::All(vec![
                StepCondition::Ran("outline".into()),
                StepCondition::Succeeded("outline".into()),
            ])),
    ]);

    let (result, _ctx) = run(SchedulingStrategy::Sequential, &p, json!({})).await;

    assert_pipeline_completed(&result);
    assert_eq!(log.entries(), vec!["expand"]);
    assert_eq!(result.skipped, vec!["fallback"]);
}

fn is_long_form(ctx: &ExecutionContext) -> bool {
    ctx.get_metadata("format").is_some_and(|f| f == "novel")
}

#[tokio::test]
async fn test_named_condition_reads_run_metadata() {
    let p = pipeline(vec![Step::new("chapters", MockOperation::new("chapters").arc()).when(
        StepCondition::Named(NamedCondition {
            name: "long_form",
            func: is_long_form,
        }),
    )]);
    let (engine, _events) = engine_with_events(SchedulingStrategy::Sequential);

    let mut short = context("req-short");
    short.set_metadata("format", "short_story");
    let result = engine.execute(&p, json!({}), &mut short).await;
    assert_eq!(result.skipped, vec!["chapters"]);

    let mut long = context("req-long");
    long.set_metadata("format", "novel");
    let result = engine.execute(&p, json!({}), &mut long).await;
    assert!(result.step("chapters").is_some());
}

#[tokio::test]
async fn test_merge_and_pointer_transforms() {
    let p = pipeline(vec![
        Step::new("hero", MockOperation::new("hero").returning(json!("Mara")).arc()),
        Step::new("villain", MockOperation::new("villain").returning(json!("Oren")).arc()),
        Step::new("cast", MockOperation::new("cast").echoing().arc())
            .depends_on(["hero", "villain"])
            .with_input(InputTransform::Merge {
                include_input: true,
                steps: vec!["hero".into(), "villain".into()],
            }),
        Step::new("genre", MockOperation::new("genre").echoing().arc())
            .with_input(InputTransform::Pointer("/meta/genre".into())),
    ]);

    let (result, _ctx) = run(
        SchedulingStrategy::Parallel,
        &p,
        json!({"meta": {"genre": "noir"}}),
    )
    .await;

    assert_pipeline_completed(&result);
    assert_eq!(
        result.step("cast").unwrap().data,
        Some(json!({
            "input": {"meta": {"genre": "noir"}},
            "hero": "Mara",
            "villain": "Oren"
        }))
    );
    assert_eq!(result.step("genre").unwrap().data, Some(json!("noir")));
}

//! Test: Parallel strategy - ready steps run together, wavefront by wavefront

use crate::helpers::*;
use serde_json::json;
use std::time::Instant;
use storyloom::core::{ExecutionContext, InputTransform, NamedCondition, Step, StepCondition};
use storyloom::execution::SchedulingStrategy;

fn diamond(gauge: &ConcurrencyGauge) -> storyloom::core::Pipeline {
    pipeline(vec![
        Step::new("outline", MockOperation::new("outline").sleeping(20).gauged(gauge).arc()),
        Step::new("characters", MockOperation::new("characters").sleeping(150).gauged(gauge).arc())
            .depends_on(["outline"]),
        Step::new("places", MockOperation::new("places").sleeping(150).gauged(gauge).arc())
            .depends_on(["outline"]),
        Step::new("factions", MockOperation::new("factions").sleeping(150).gauged(gauge).arc())
            .depends_on(["outline"]),
        Step::new("bible", MockOperation::new("bible").gauged(gauge).arc())
            .depends_on(["characters", "places", "factions"]),
    ])
}

#[tokio::test]
async fn test_wavefronts_follow_dependency_levels() {
    let gauge = ConcurrencyGauge::default();
    let p = diamond(&gauge);

    let (result, _ctx) = run(SchedulingStrategy::Parallel, &p, json!({})).await;

    assert_pipeline_completed(&result);
    assert_eq!(
        result.wavefronts,
        vec![
            vec!["outline".to_string()],
            vec!["characters".to_string(), "places".to_string(), "factions".to_string()],
            vec!["bible".to_string()],
        ]
    );
    assert_eq!(result.steps.len(), 5);
}

#[tokio::test]
async fn test_independent_steps_overlap() {
    let gauge = ConcurrencyGauge::default();
    let p = diamond(&gauge);

    let started = Instant::now();
    let (result, _ctx) = run(SchedulingStrategy::Parallel, &p, json!({})).await;
    let elapsed = started.elapsed();

    assert_pipeline_completed(&result);
    assert_eq!(gauge.peak(), 3);
    // Serially the middle wavefront alone would take 450ms
    assert!(elapsed.as_millis() < 400, "took {:?}", elapsed);
}

#[tokio::test]
async fn test_sequential_never_overlaps() {
    let gauge = ConcurrencyGauge::default();
    let p = diamond(&gauge);

    let (result, _ctx) = run(SchedulingStrategy::Sequential, &p, json!({})).await;

    assert_pipeline_completed(&result);
    assert_eq!(gauge.peak(), 1);
}

#[tokio::test]
async fn test_siblings_do_not_see_each_other() {
    let p = pipeline(vec![
        Step::new("root", MockOperation::new("root").arc()),
        Step::new("fast", MockOperation::new("fast").returning(json!("fast-out")).arc()).depends_on(["root"]),
        Step::new("peek", MockOperation::new("peek").sleeping(50).echoing().arc())
            .depends_on(["root"])
            .with_input(InputTransform::StepOutput("fast".into())),
        Step::new("after", MockOperation::new("after").echoing().arc())
            .depends_on(["fast", "peek"])
            .with_input(InputTransform::StepOutput("fast".into())),
    ]);

    let (result, _ctx) = run(SchedulingStrategy::Parallel, &p, json!({})).await;

    assert_pipeline_completed(&result);
    assert_eq!(result.step("peek").unwrap().data, Some(json!(null)));
    assert_eq!(result.step("after").unwrap().data, Some(json!("fast-out")));
}

#[tokio::test]
async fn test_shared_store_carries_outputs_forward() {
    let p = pipeline(vec![
        Step::new("tone", MockOperation::new("tone").returning(json!("bleak")).arc()).store_as("tone"),
        Step::new("setting", MockOperation::new("setting").returning(json!("harbor")).arc()).store_as("setting"),
        Step::new("scene", MockOperation::new("scene").echoing().arc())
            .depends_on(["tone", "setting"])
            .with_input(InputTransform::FromStore("tone".into())),
    ]);

    let (result, ctx) = run(SchedulingStrategy::Parallel, &p, json!({})).await;

    assert_pipeline_completed(&result);
    assert_eq!(result.wavefronts.len(), 2);
    assert_eq!(result.step("scene").unwrap().data, Some(json!("bleak")));
    assert_eq!(ctx.shared().get("setting"), Some(json!("harbor")));
}

#[tokio::test]
async fn test_strategies_agree_on_results() {
    let build = || {
        pipeline(vec![
            Step::new("a", MockOperation::new("a").returning(json!(1)).costing(1.0).arc()),
            Step::new("b", MockOperation::new("b").returning(json!(2)).costing(2.0).arc()).depends_on(["a"]),
            Step::new("c", MockOperation::new("c").returning(json!(3)).costing(3.0).arc()).depends_on(["a"]),
        ])
    };

    let (sequential, _) = run(SchedulingStrategy::Sequential, &build(), json!({})).await;
    let (parallel, _) = run(SchedulingStrategy::Parallel, &build(), json!({})).await;

    assert_pipeline_completed(&sequential);
    assert_pipeline_completed(&parallel);
    assert_eq!(sequential.total_cost, parallel.total_cost);
    for id in ["a", "b", "c"] {
        assert_eq!(sequential.step(id).unwrap().data, parallel.step(id).unwrap().data);
    }
}

fn outline_succeeded(ctx: &ExecutionContext) -> bool {
    ctx.prior_result("a").is_some_and(|r| r.success && r.data.is_some())
}

#[tokio::test]
async fn test_fan_out_siblings_both_see_root_output() {
    let p = pipeline(vec![
        Step::new("a", MockOperation::new("a").returning(json!({"acts": 3})).arc()),
        Step::new("b", MockOperation::new("b").echoing().arc())
            .depends_on(["a"])
            .with_input(InputTransform::StepOutput("a".into()))
            .when(StepCondition::Named(NamedCondition {
                name: "outline_succeeded",
                func: outline_succeeded,
            })),
        Step::new("c", MockOperation::new("c").echoing().arc())
            .depends_on(["a"])
            .with_input(InputTransform::StepOutput("a".into())),
    ]);

    let (result, _ctx) = run(SchedulingStrategy::Parallel, &p, json!({"title": "Ashfall"})).await;

    assert_pipeline_completed(&result);
    assert_eq!(
        result.wavefronts,
        vec![vec!["a".to_string()], vec!["b".to_string(), "c".to_string()]]
    );
    assert!(result.skipped.is_empty());
    assert_eq!(result.execution_order, vec!["a", "b", "c"]);
    assert_eq!(result.step("b").unwrap().data, Some(json!({"acts": 3})));
    assert_eq!(result.step("c").unwrap().data, Some(json!({"acts": 3})));
}

//! Test: Sequential strategy - one step at a time in dependency order

use crate::helpers::*;
use serde_json::json;
use storyloom::core::{Complexity, InputTransform, Step};
use storyloom::execution::SchedulingStrategy;

#[tokio::test]
async fn test_chain_runs_in_declaration_order() {
    let log = StartLog::default();
    let p = pipeline(vec![
        Step::new("premise", MockOperation::new("premise").logging(&log).arc()),
        Step::new("outline", MockOperation::new("outline").logging(&log).arc()).depends_on(["premise"]),
        Step::new("draft", MockOperation::new("draft").logging(&log).arc()).depends_on(["outline"]),
    ]);

    let (result, _ctx) = run(SchedulingStrategy::Sequential, &p, json!({})).await;

    assert_pipeline_completed(&result);
    assert_eq!(log.entries(), vec!["premise", "outline", "draft"]);
    assert_eq!(result.execution_order, vec!["premise", "outline", "draft"]);
    assert_eq!(result.wavefronts.len(), 3);
}

#[tokio::test]
async fn test_dependencies_run_first_regardless_of_declaration() {
    let log = StartLog::default();
    let p = pipeline(vec![
        Step::new("bible", MockOperation::new("bible").logging(&log).arc()).depends_on(["characters", "places"]),
        Step::new("places", MockOperation::new("places").logging(&log).arc()).depends_on(["outline"]),
        Step::new("characters", MockOperation::new("characters").logging(&log).arc()).depends_on(["outline"]),
        Step::new("outline", MockOperation::new("outline").logging(&log).arc()),
    ]);

    let (result, _ctx) = run(SchedulingStrategy::Sequential, &p, json!({})).await;

    assert_pipeline_completed(&result);
    assert_steps_succeeded(&result, &["outline", "characters", "places", "bible"]);
    for step in p.steps() {
        for dep in step.dependencies() {
            assert!(position(&result, dep) < position(&result, step.id()));
        }
    }
    assert_eq!(log.entries().len(), 4, "every step runs exactly once");
}

#[tokio::test]
async fn test_costs_are_summed() {
    let p = pipeline(vec![
        Step::new("a", MockOperation::new("a").costing(1.5).arc()),
        Step::new("b", MockOperation::new("b").costing(2.0).arc()).depends_on(["a"]),
        Step::new("c", MockOperation::new("c").costing(0.25).arc()).depends_on(["b"]),
    ]);

    let (result, _ctx) = run(SchedulingStrategy::Sequential, &p, json!({})).await;

    assert_pipeline_completed(&result);
    assert_eq!(result.total_cost, 3.75);
}

#[tokio::test]
async fn test_five_step_chain_costs_come_from_complexity() {
    let levels = [
        ("premise", Complexity::Low),
        ("outline", Complexity::High),
        ("characters", Complexity::Medium),
        ("draft", Complexity::High),
        ("polish", Complexity::Low),
    ];
    let log = StartLog::default();
    let mut steps = Vec::new();
    for (i, (id, complexity)) in levels.iter().enumerate() {
        let mut step = Step::new(*id, MockOperation::new(id).complexity(*complexity).logging(&log).arc());
        if i > 0 {
            step = step.depends_on([levels[i - 1].0]);
        }
        steps.push(step);
    }
    let p = pipeline(steps);

    let (result, _ctx) = run(SchedulingStrategy::Sequential, &p, json!({})).await;

    assert_pipeline_completed(&result);
    let declared: Vec<&str> = levels.iter().map(|(id, _)| *id).collect();
    assert_eq!(result.execution_order, declared);
    assert_eq!(log.entries(), declared);
    let expected: f64 = levels.iter().map(|(_, c)| c.base_cost()).sum();
    assert_eq!(expected, 14.5);
    assert_eq!(result.total_cost, expected);
}

#[tokio::test]
async fn test_later_steps_see_earlier_outputs() {
    let p = pipeline(vec![
        Step::new("outline", MockOperation::new("outline").returning(json!({"acts": 3})).arc()),
        Step::new("expand", MockOperation::new("expand").echoing().arc())
            .depends_on(["outline"])
            .with_input(InputTransform::StepOutput("outline".into())),
    ]);

    let (result, ctx) = run(SchedulingStrategy::Sequential, &p, json!({"title": "Ashfall"})).await;

    assert_pipeline_completed(&result);
    assert_eq!(result.step("expand").unwrap().data, Some(json!({"acts": 3})));
    assert_eq!(ctx.step_output("expand"), Some(&json!({"acts": 3})));
}

#[tokio::test]
async fn test_engine_is_reusable_across_runs() {
    let p = pipeline(vec![
        Step::new("a", MockOperation::new("a").arc()),
        Step::new("b", MockOperation::new("b").arc()).depends_on(["a"]),
    ]);
    let (engine, _events) = engine_with_events(SchedulingStrategy::Sequential);

    let mut first = context("req-1");
    let mut second = context("req-2");
    let r1 = engine.execute(&p, json!({}), &mut first).await;
    let r2 = engine.execute(&p, json!({}), &mut second).await;

    assert_pipeline_completed(&r1);
    assert_pipeline_completed(&r2);
    assert_eq!(r1.execution_order, r2.execution_order);
}

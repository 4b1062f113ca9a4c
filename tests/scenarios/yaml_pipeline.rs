//! Test: Pipelines loaded from YAML with the built-in operations

use crate::helpers::*;
use serde_json::json;
use storyloom::core::config::PipelineConfig;
use storyloom::operations::builtin_registry;

const STORY_BIBLE: &str = r#"
name: "Story Bible"
description: "Premise, then cast and places in parallel, then the bible"
engine:
  strategy: parallel
steps:
  - id: "premise"
    operation: template
    params:
      template: "A {{ input.genre }} story about {{ input.hero }}"
    store_as: premise

  - id: "cast"
    operation: template
    depends_on: ["premise"]
    params:
      template: "Cast for: {{ store.premise }}"

  - id: "places"
    operation: constant
    depends_on: ["premise"]
    params:
      value: ["harbor", "lighthouse"]

  - id: "maps"
    operation: fail
    depends_on: ["places"]
    when:
      store_has: "cartographer"
    params:
      message: "no cartographer"

  - id: "bible"
    operation: echo
    depends_on: ["cast", "places", "maps"]
    input:
      merge:
        steps: ["cast", "places"]
"#;

#[tokio::test]
async fn test_story_bible_pipeline() {
    let config = PipelineConfig::from_yaml(STORY_BIBLE).unwrap();
    let p = config.to_pipeline(&builtin_registry()).unwrap();
    assert!(p.validate().is_valid);

    let (result, ctx) = run(
        config.engine.strategy,
        &p,
        json!({"genre": "noir", "hero": "Mara"}),
    )
    .await;

    assert_pipeline_completed(&result);
    assert_eq!(result.skipped, vec!["maps"]);
    assert_eq!(
        ctx.shared().get("premise"),
        Some(json!("A noir story about Mara"))
    );
    assert_eq!(
        result.step("bible").unwrap().data,
        Some(json!({
            "cast": "Cast for: A noir story about Mara",
            "places": ["harbor", "lighthouse"]
        }))
    );
    assert_eq!(
        result.wavefronts,
        vec![
            vec!["premise".to_string()],
            vec!["cast".to_string(), "places".to_string()],
            vec!["maps".to_string()],
            vec!["bible".to_string()],
        ]
    );
}

#[tokio::test]
async fn test_unknown_operation_is_a_build_error() {
    let yaml = r#"
name: "Broken"
steps:
  - id: "a"
    operation: summon_muse
"#;
    let config = PipelineConfig::from_yaml(yaml).unwrap();
    let err = config.to_pipeline(&builtin_registry()).unwrap_err();
    assert!(format!("{:#}", err).contains("Unknown operation 'summon_muse'"));
}

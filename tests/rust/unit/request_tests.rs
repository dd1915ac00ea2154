use tracegraph::sql_generator::DialectKind;
use tracegraph::trace_catalog::FilterFunction;
use tracegraph::trace_engine::{TraceEngine, TraceRequest};

use super::fixtures::{config, line_catalog, ts};

const REQUEST_YAML: &str = r#"
start_process_id: 1
end_processes:
  - { process_id: 2, column_ids: [24] }
  - { process_id: 4 }
condition_processes:
  - process_id: 3
    filters:
      - { column_id: 31, function: STARTS_WITH, values: ["L-2024"] }
start_tm: "2024-03-01T00:00:00"
end_tm: "2024-03-08T00:00:00"
duplicate_policy: show_last
"#;

#[test]
fn test_request_from_yaml() {
    let request: TraceRequest = serde_yaml::from_str(REQUEST_YAML).unwrap();
    assert_eq!(request.start_process_id, 1);
    assert_eq!(request.target_processes(), vec![2, 4, 3]);
    assert!(request.end_processes[1].column_ids.is_empty());
    assert_eq!(
        request.condition_processes[0].filters[0].function,
        FilterFunction::StartsWith
    );
    assert_eq!(request.start_tm, ts(1, 0));
}

#[test]
fn test_request_from_json_defaults_policy() {
    let json = r#"{
        "start_process_id": 3,
        "end_processes": [{"process_id": 1}],
        "start_tm": "2024-03-01T00:00:00",
        "end_tm": "2024-03-02T00:00:00"
    }"#;
    let request: TraceRequest = serde_json::from_str(json).unwrap();
    assert_eq!(request.duplicate_policy, "SHOW_BOTH");
    assert!(request.condition_processes.is_empty());
}

#[test]
fn test_inline_filter_is_bound_as_escaped_pattern() {
    let catalog = line_catalog();
    let engine = TraceEngine::new(&catalog, config(DialectKind::Postgres));
    let mut request: TraceRequest = serde_yaml::from_str(REQUEST_YAML).unwrap();
    request.condition_processes[0].filters[0].values = vec!["L_50%".to_string()];

    let compiled = engine.compile(&request).unwrap();
    let with_condition = compiled
        .paths
        .iter()
        .find(|p| p.covering.path.processes.contains(&3))
        .unwrap();
    assert!(with_condition
        .statement
        .params
        .contains(&serde_json::json!("L\\_50\\%%")));
    assert!(with_condition.statement.sql.contains("LIKE $"));
}

#[test]
fn test_compiled_plan_set_serializes() {
    let catalog = line_catalog();
    let engine = TraceEngine::new(&catalog, config(DialectKind::Postgres));
    let request: TraceRequest = serde_yaml::from_str(REQUEST_YAML).unwrap();

    let compiled = engine.compile(&request).unwrap();
    let value = serde_json::to_value(&compiled).unwrap();
    assert_eq!(value["policy"], "SHOW_LAST");
    assert_eq!(value["dialect"], "postgres");
    assert_eq!(value["paths"].as_array().unwrap().len(), compiled.paths.len());
}

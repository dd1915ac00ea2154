use tracegraph::render_plan::{DedupStrategy, SortOrder};
use tracegraph::sql_generator::DialectKind;
use tracegraph::trace_catalog::{TraceCatalog, TraceCatalogError};
use tracegraph::trace_engine::{TraceEngine, TraceError};

use super::fixtures::{config, line_catalog, request, with_ng_condition, LINE_CATALOG};

#[test]
fn test_middle_end_shares_one_covering_path() {
    let catalog = line_catalog();
    let engine = TraceEngine::new(&catalog, config(DialectKind::Postgres));
    let compiled = engine
        .compile(&request(1, &[(2, &[24]), (3, &[33])], "SHOW_BOTH"))
        .unwrap();

    assert_eq!(compiled.paths.len(), 1);
    let path = &compiled.paths[0];
    assert_eq!(path.covering.path.processes, vec![1, 2, 3]);
    assert!(path.covering.is_forward());
    assert_eq!(compiled.time_labels, vec!["time__1", "time__2", "time__3"]);
    assert_eq!(compiled.dup_key_labels, vec!["serial__1"]);
    assert_eq!(compiled.strategy, DedupStrategy::KeepAll);
}

#[test]
fn test_branches_compile_separately() {
    let catalog = line_catalog();
    let engine = TraceEngine::new(&catalog, config(DialectKind::Postgres));
    let compiled = engine
        .compile(&request(1, &[(3, &[]), (4, &[43])], "SHOW_BOTH"))
        .unwrap();

    let routes: Vec<Vec<i64>> = compiled
        .paths
        .iter()
        .map(|p| p.covering.path.processes.clone())
        .collect();
    assert_eq!(routes, vec![vec![1, 2, 3], vec![1, 2, 4]]);
    // middle process is not requested, so only its join columns are used
    assert!(!compiled.time_labels.contains(&"time__2".to_string()));
}

#[test]
fn test_backward_trace_from_downstream_process() {
    let catalog = line_catalog();
    let engine = TraceEngine::new(&catalog, config(DialectKind::Postgres));
    let compiled = engine
        .compile(&request(3, &[(1, &[13])], "SHOW_BOTH"))
        .unwrap();

    assert_eq!(compiled.paths.len(), 1);
    let path = &compiled.paths[0];
    assert_eq!(path.covering.path.processes, vec![3, 2, 1]);
    assert!(!path.covering.is_forward());
    // inspection has no serial column: duplicates are keyed by row id
    assert_eq!(compiled.dup_key_labels, vec!["row_id__3"]);
    assert!(path.statement.sql.contains("\"judge\" AS \"judge__1\""));
}

#[test]
fn test_unlinked_end_compiles_to_nothing() {
    let catalog = line_catalog().without_process(2);
    let engine = TraceEngine::new(&catalog, config(DialectKind::Postgres));
    let compiled = engine
        .compile(&request(1, &[(3, &[])], "SHOW_BOTH"))
        .unwrap();
    assert!(compiled.is_empty());
}

#[test]
fn test_condition_with_show_first_uses_window_function() {
    let catalog = line_catalog();
    let engine = TraceEngine::new(&catalog, config(DialectKind::Postgres));
    let compiled = engine
        .compile(&with_ng_condition(request(1, &[(2, &[24])], "SHOW_FIRST")))
        .unwrap();

    assert_eq!(
        compiled.strategy,
        DedupStrategy::WindowFunction {
            order: SortOrder::Asc
        }
    );
    let statement = &compiled.paths[0].statement;
    assert!(statement.sql.contains("ROW_NUMBER() OVER (PARTITION BY"));
    assert!(statement.sql.contains("\"__row_number__\" = 1"));
    assert!(statement.params.contains(&serde_json::json!("NG")));
    assert_eq!(statement.pre_statements, vec!["SET enable_nestloop = false"]);
    assert_eq!(statement.post_statements, vec!["RESET enable_nestloop"]);
    assert!(compiled.paths[0].count_statement.is_none());
}

#[test]
fn test_condition_with_show_both_has_no_window() {
    let catalog = line_catalog();
    let engine = TraceEngine::new(&catalog, config(DialectKind::Postgres));
    let compiled = engine
        .compile(&with_ng_condition(request(1, &[(2, &[24])], "SHOW_BOTH")))
        .unwrap();

    let statement = &compiled.paths[0].statement;
    assert!(!statement.sql.contains("ROW_NUMBER"));
    assert!(statement.sql.contains("\"result\" IN ("));
}

#[test]
fn test_show_last_without_condition_adds_count_statement() {
    let catalog = line_catalog();
    let engine = TraceEngine::new(&catalog, config(DialectKind::Postgres));
    let compiled = engine
        .compile(&request(1, &[(2, &[24])], "SHOW_LAST"))
        .unwrap();

    assert_eq!(
        compiled.strategy,
        DedupStrategy::PostHoc {
            order: SortOrder::Desc
        }
    );
    let path = &compiled.paths[0];
    assert!(!path.statement.sql.contains("ROW_NUMBER"));
    let count = path.count_statement.as_ref().unwrap();
    assert!(count.sql.contains("SELECT DISTINCT"));
    // no filters and no window: nested loops stay enabled
    assert!(path.statement.pre_statements.is_empty());
}

#[test]
fn test_delta_time_key_renders_rolling_window() {
    let catalog = line_catalog();
    let engine = TraceEngine::new(&catalog, config(DialectKind::Postgres));
    let compiled = engine
        .compile(&request(1, &[(4, &[43])], "SHOW_BOTH"))
        .unwrap();

    let sql = &compiled.paths[0].statement.sql;
    assert!(sql.contains("\"proc_4_cte_2\".\"packed_at\" >= \"proc_2_cte_1\".\"assembled_at\""));
    assert!(sql.contains(
        "\"proc_4_cte_2\".\"packed_at\" < (\"proc_2_cte_1\".\"assembled_at\" + 60 * INTERVAL '1 minute')"
    ));
    // the serial key still joins on equality next to the band
    assert!(sql.contains("\"proc_4_cte_2\".\"serial\" = \"proc_2_cte_1\".\"serial_no\""));
}

#[test]
fn test_request_window_end_is_inclusive() {
    let catalog = line_catalog();
    let engine = TraceEngine::new(&catalog, config(DialectKind::Postgres));
    let compiled = engine
        .compile(&request(1, &[(2, &[24])], "SHOW_BOTH"))
        .unwrap();

    let statement = &compiled.paths[0].statement;
    assert!(statement
        .sql
        .contains("\"machined_at\" >= $1 AND \"machined_at\" <= $2"));
    assert_eq!(statement.params[1], serde_json::json!("2024-03-08 00:00:00"));
}

#[test]
fn test_condition_across_branches_dedups_after_merge() {
    let catalog = line_catalog();
    let engine = TraceEngine::new(&catalog, config(DialectKind::Postgres));
    let compiled = engine
        .compile(&with_ng_condition(request(1, &[(3, &[33]), (4, &[43])], "SHOW_FIRST")))
        .unwrap();

    assert_eq!(compiled.paths.len(), 2);
    assert_eq!(
        compiled.strategy,
        DedupStrategy::PostHoc {
            order: SortOrder::Asc
        }
    );
    for path in &compiled.paths {
        assert!(!path.statement.sql.contains("ROW_NUMBER"));
    }
    // only the path through the condition process is counted
    assert!(compiled.paths[0].count_statement.is_some());
    assert!(compiled.paths[1].count_statement.is_none());
}

#[test]
fn test_delta_key_on_non_temporal_column_rejected_at_load() {
    let yaml = LINE_CATALOG.replace(
        "{ self_column_id: 21, target_column_id: 41 }",
        "{ self_column_id: 21, target_column_id: 41, delta_time: 5 }",
    );
    assert!(matches!(
        TraceCatalog::from_yaml_str(&yaml),
        Err(TraceCatalogError::InvalidDeltaKey {
            process_id: 2,
            column_id: 21,
            ..
        })
    ));
}

#[test]
fn test_request_errors() {
    let catalog = line_catalog();
    let engine = TraceEngine::new(&catalog, config(DialectKind::Postgres));

    let mut reversed = request(1, &[(2, &[])], "SHOW_BOTH");
    std::mem::swap(&mut reversed.start_tm, &mut reversed.end_tm);
    assert!(matches!(
        engine.compile(&reversed),
        Err(TraceError::InvalidRequest(_))
    ));

    assert!(matches!(
        engine.compile(&request(1, &[(2, &[])], "SHOW_ALL")),
        Err(TraceError::Policy(_))
    ));
}

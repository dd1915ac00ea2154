use serde_json::json;
use tracegraph::render_plan::{DedupStrategy, SortOrder};
use tracegraph::sql_generator::DialectKind;
use tracegraph::trace_engine::{TraceEngine, TraceError};

use super::fixtures::{config, line_catalog, request, table, with_ng_condition, ScriptedExecutor};

const ROW_COLUMNS: [&str; 5] = ["row_id__1", "time__1", "serial__1", "row_id__2", "time__2"];

fn duplicate_rows() -> tracegraph::trace_engine::QueryResult {
    table(
        &ROW_COLUMNS,
        vec![
            vec![json!(2), json!("2024-03-01 11:00:00"), json!("X"), json!(20), json!("2024-03-01 12:00:00")],
            vec![json!(1), json!("2024-03-01 09:00:00"), json!("X"), json!(10), json!("2024-03-01 10:00:00")],
            vec![json!(3), json!("2024-03-02 09:00:00"), json!("Y"), json!(30), json!("2024-03-02 10:00:00")],
        ],
    )
}

fn duplicate_counts() -> tracegraph::trace_engine::QueryResult {
    table(
        &["row_id__1", "serial__1"],
        vec![
            vec![json!(1), json!("X")],
            vec![json!(2), json!("X")],
            vec![json!(3), json!("Y")],
        ],
    )
}

#[tokio::test]
async fn test_show_first_keeps_earliest_of_each_serial() {
    let catalog = line_catalog();
    let engine = TraceEngine::new(&catalog, config(DialectKind::Postgres));
    let executor = ScriptedExecutor::new(vec![Ok(duplicate_rows()), Ok(duplicate_counts())]);

    let result = engine
        .run(&request(1, &[(2, &[])], "SHOW_FIRST"), &executor)
        .await
        .unwrap();

    assert_eq!(
        result.table.column_values("row_id__1").unwrap(),
        vec![&json!(1), &json!(3)]
    );
    assert_eq!(result.actual_record_number, 3);
    assert_eq!(result.unique_record_number, 2);
    assert_eq!(result.unique_record_number, result.table.len());

    let statements = executor.statements();
    assert_eq!(statements.len(), 2);
    assert!(statements[1].sql.contains("SELECT DISTINCT"));
}

#[tokio::test]
async fn test_show_last_keeps_latest_of_each_serial() {
    let catalog = line_catalog();
    let engine = TraceEngine::new(&catalog, config(DialectKind::Postgres));
    let executor = ScriptedExecutor::new(vec![Ok(duplicate_rows()), Ok(duplicate_counts())]);

    let result = engine
        .run(&request(1, &[(2, &[])], "SHOW_LAST"), &executor)
        .await
        .unwrap();

    assert_eq!(
        result.table.column_values("row_id__1").unwrap(),
        vec![&json!(2), &json!(3)]
    );
    assert_eq!(result.unique_record_number, 2);
}

#[tokio::test]
async fn test_unique_count_unions_start_rows_across_paths() {
    let catalog = line_catalog();
    let engine = TraceEngine::new(&catalog, config(DialectKind::Postgres));
    let path_rows = |extra: &str| {
        table(
            &["row_id__1", "time__1", "serial__1", extra],
            vec![
                vec![json!(1), json!("2024-03-01 09:00:00"), json!("X"), json!("a")],
                vec![json!(2), json!("2024-03-01 11:00:00"), json!("X"), json!("b")],
            ],
        )
    };
    let counts = || {
        table(
            &["row_id__1", "serial__1"],
            vec![vec![json!(1), json!("X")], vec![json!(2), json!("X")]],
        )
    };
    let executor = ScriptedExecutor::new(vec![
        Ok(path_rows("result__3")),
        Ok(path_rows("box_id__4")),
        Ok(counts()),
        Ok(counts()),
    ]);

    let result = engine
        .run(&request(1, &[(3, &[33]), (4, &[43])], "SHOW_FIRST"), &executor)
        .await
        .unwrap();

    // no condition process: every path is counted, rows seen twice count once
    assert_eq!(executor.statements().len(), 4);
    assert_eq!(result.actual_record_number, 2);
    assert_eq!(result.unique_record_number, 1);
    assert_eq!(result.table.len(), 1);
    assert_eq!(result.table.rows[0][0], json!(1));
}

#[tokio::test]
async fn test_condition_over_two_paths_dedups_after_merge() {
    let catalog = line_catalog();
    let engine = TraceEngine::new(&catalog, config(DialectKind::Postgres));
    // serial X starts twice: row 1 on lot LA, row 2 on lot LB; only LB is NG
    let inspection = table(
        &["row_id__1", "time__1", "serial__1", "row_id__3", "result__3"],
        vec![vec![json!(2), json!("2024-03-01 11:00:00"), json!("X"), json!(300), json!("NG")]],
    );
    let packing = table(
        &["row_id__1", "time__1", "serial__1", "row_id__4", "box_id__4"],
        vec![
            vec![json!(1), json!("2024-03-01 09:00:00"), json!("X"), json!(400), json!("B1")],
            vec![json!(2), json!("2024-03-01 11:00:00"), json!("X"), json!(401), json!("B2")],
        ],
    );
    let executor = ScriptedExecutor::new(vec![
        Ok(inspection),
        Ok(packing),
        Ok(table(&["row_id__1", "serial__1"], vec![vec![json!(2), json!("X")]])),
    ]);

    let result = engine
        .run(
            &with_ng_condition(request(1, &[(3, &[33]), (4, &[43])], "SHOW_FIRST")),
            &executor,
        )
        .await
        .unwrap();

    assert_eq!(
        result.compiled.strategy,
        DedupStrategy::PostHoc {
            order: SortOrder::Asc
        }
    );
    assert_eq!(result.table.len(), 1);
    assert_eq!(result.table.column_values("row_id__1").unwrap(), vec![&json!(2)]);
    assert_eq!(result.table.column_values("box_id__4").unwrap(), vec![&json!("B2")]);
    assert_eq!(result.actual_record_number, 1);
    assert_eq!(result.unique_record_number, 1);

    // both row statements plus one count for the inspection path only
    let statements = executor.statements();
    assert_eq!(statements.len(), 3);
    assert!(statements.iter().all(|s| !s.sql.contains("ROW_NUMBER")));
    assert!(statements[2].sql.contains("SELECT DISTINCT"));
    assert!(statements[2].sql.contains("t_inspection"));
}

#[tokio::test]
async fn test_window_strategy_reads_pre_collapse_count() {
    let catalog = line_catalog();
    let engine = TraceEngine::new(&catalog, config(DialectKind::ClickHouse));
    let executor = ScriptedExecutor::new(vec![Ok(table(
        &["row_id__1", "time__1", "serial__1", "__actual_count__"],
        vec![
            vec![json!(3), json!("2024-03-02 09:00:00"), json!("Y"), json!("4")],
            vec![json!(1), json!("2024-03-01 09:00:00"), json!("X"), json!("4")],
        ],
    ))]);

    let result = engine
        .run(&with_ng_condition(request(1, &[(2, &[])], "SHOW_FIRST")), &executor)
        .await
        .unwrap();

    assert_eq!(result.actual_record_number, 4);
    assert_eq!(result.unique_record_number, 2);
    assert!(result.table.column_index("__actual_count__").is_none());
    assert_eq!(
        result.table.column_values("row_id__1").unwrap(),
        vec![&json!(1), &json!(3)]
    );

    let statements = executor.statements();
    assert_eq!(statements.len(), 1);
    assert!(statements[0].sql.contains("ROW_NUMBER() OVER"));
}

#[tokio::test]
async fn test_show_both_unique_never_exceeds_actual() {
    let catalog = line_catalog();
    let engine = TraceEngine::new(&catalog, config(DialectKind::Postgres));
    let executor = ScriptedExecutor::new(vec![Ok(duplicate_rows())]);

    let result = engine
        .run(&request(1, &[(2, &[])], "SHOW_BOTH"), &executor)
        .await
        .unwrap();

    assert_eq!(result.table.len(), 3);
    assert!(result.unique_record_number <= result.actual_record_number);
    assert_eq!(result.unique_record_number, 2);
}

#[tokio::test]
async fn test_unknown_policy_fails_before_execution() {
    let catalog = line_catalog();
    let engine = TraceEngine::new(&catalog, config(DialectKind::Postgres));
    let executor = ScriptedExecutor::default();

    let err = engine
        .run(&request(1, &[(2, &[])], "SHOW_NEWEST"), &executor)
        .await
        .unwrap_err();
    assert!(matches!(err, TraceError::Policy(_)));
    assert!(executor.statements().is_empty());
}

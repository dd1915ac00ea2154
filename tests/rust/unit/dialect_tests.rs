use test_case::test_case;
use tracegraph::sql_generator::DialectKind;
use tracegraph::trace_engine::TraceEngine;

use super::fixtures::{config, line_catalog, request, with_ng_condition};

#[test_case(DialectKind::Postgres, "\"t_assembly\"", "$1" ; "postgres")]
#[test_case(DialectKind::ClickHouse, "`t_assembly`", "$p1" ; "clickhouse")]
#[test_case(DialectKind::Sqlite, "\"t_assembly\"", "?" ; "sqlite")]
fn test_quoting_and_placeholders(dialect: DialectKind, table: &str, placeholder: &str) {
    let catalog = line_catalog();
    let engine = TraceEngine::new(&catalog, config(dialect));
    let compiled = engine
        .compile(&request(1, &[(2, &[24])], "SHOW_BOTH"))
        .unwrap();

    let statement = &compiled.paths[0].statement;
    assert!(statement.sql.contains(table), "{}", statement.sql);
    assert!(statement.sql.contains(placeholder), "{}", statement.sql);
    // one window per hop
    assert_eq!(statement.params.len(), 4);
    assert_eq!(statement.params[0], serde_json::json!("2024-03-01 00:00:00"));
}

#[test_case(DialectKind::Postgres, 1 ; "postgres disables nested loops")]
#[test_case(DialectKind::ClickHouse, 0 ; "clickhouse has no equivalent")]
#[test_case(DialectKind::Sqlite, 0 ; "sqlite has no equivalent")]
fn test_planner_hint_per_dialect(dialect: DialectKind, expected: usize) {
    let catalog = line_catalog();
    let engine = TraceEngine::new(&catalog, config(dialect));
    let compiled = engine
        .compile(&with_ng_condition(request(1, &[(2, &[])], "SHOW_BOTH")))
        .unwrap();
    let statement = &compiled.paths[0].statement;
    assert_eq!(statement.pre_statements.len(), expected);
    // every session setting is undone after the statement
    assert_eq!(statement.post_statements.len(), expected);
}

#[test]
fn test_planner_hint_respects_config() {
    let catalog = line_catalog();
    let mut engine_config = config(DialectKind::Postgres);
    engine_config.disable_nested_loop = false;
    let engine = TraceEngine::new(&catalog, engine_config);
    let compiled = engine
        .compile(&with_ng_condition(request(1, &[(2, &[])], "SHOW_FIRST")))
        .unwrap();
    assert!(compiled.paths[0].statement.pre_statements.is_empty());
}

#[test]
fn test_clickhouse_statement_inlines_literals() {
    let catalog = line_catalog();
    let engine = TraceEngine::new(&catalog, config(DialectKind::ClickHouse));
    let compiled = engine
        .compile(&with_ng_condition(request(1, &[(2, &[])], "SHOW_BOTH")))
        .unwrap();

    let inlined = compiled.paths[0].statement.inlined().unwrap();
    assert!(!inlined.contains("$p"));
    assert!(inlined.contains("'2024-03-01 00:00:00'"));
    assert!(inlined.contains("`result` IN ('NG')"));
}

#[test]
fn test_sqlite_delta_window_uses_datetime_modifier() {
    let catalog = line_catalog();
    let engine = TraceEngine::new(&catalog, config(DialectKind::Sqlite));
    let compiled = engine
        .compile(&request(1, &[(4, &[])], "SHOW_BOTH"))
        .unwrap();
    assert!(compiled.paths[0]
        .statement
        .sql
        .contains("datetime(\"proc_2_cte_1\".\"assembled_at\", '+60 minutes')"));
}

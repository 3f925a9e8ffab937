//! Tests for tendril-core: expressions, errors, configuration

use serde_json::json;
use tendril_core::*;

// ===========================================================================
// Expr
// ===========================================================================

#[test]
fn expr_deserializes_from_plain_json() {
    let expr: Expr = serde_json::from_value(json!(["std.seq", ["std.let", "x", 1], {"a": true}]))
        .unwrap();
    let (name, args) = expr.as_call().unwrap();
    assert_eq!(name, "std.seq");
    assert_eq!(args.len(), 2);
    assert!(matches!(args[1], Expr::Object(_)));
}

#[test]
fn expr_serializes_back_to_same_json() {
    let source = json!(["math.add", 1, 2.5, "s", null, [true, false]]);
    let expr = Expr::from(source.clone());
    assert_eq!(serde_json::to_value(&expr).unwrap(), source);
}

#[test]
fn expr_call_builder() {
    let expr = Expr::call("bool.not", [Expr::Bool(true)]);
    assert_eq!(serde_json::Value::from(&expr), json!(["bool.not", true]));
}

#[test]
fn expr_parse_rejects_invalid_json() {
    assert!(Expr::parse("[\"std.seq\",").is_err());
    assert!(Expr::parse("42").is_ok());
}

#[test]
fn expr_node_count_includes_literals() {
    let expr = Expr::from(json!(["math.add", 1, ["math.mul", 2, 3]]));
    assert_eq!(expr.node_count(), 7);
}

// ===========================================================================
// ScriptError
// ===========================================================================

#[test]
fn error_kinds_group_scope_failures() {
    assert_eq!(ScriptError::UnboundVariable("x".into()).kind(), ErrorKind::Scope);
    assert_eq!(ScriptError::UndefinedAssignment("x".into()).kind(), ErrorKind::Scope);
}

#[test]
fn error_kinds_group_argument_failures() {
    let arity = ScriptError::Arity { opcode: "std.if".into(), expected: "2..=3".into(), got: 1 };
    assert_eq!(arity.kind(), ErrorKind::Argument);
    assert_eq!(ScriptError::type_error("math.add", "expected number").kind(), ErrorKind::Argument);
}

#[test]
fn error_kinds_group_limits() {
    assert_eq!(ScriptError::DepthLimit(64).kind(), ErrorKind::Limit);
    assert_eq!(ScriptError::NestingLimit(512).kind(), ErrorKind::Limit);
    assert_eq!(ScriptError::resource("string too long").kind(), ErrorKind::Limit);
}

#[test]
fn misplaced_escape_reads_as_argument_failure() {
    let err = ScriptError::Escape(Escape::Break);
    assert_eq!(err.kind(), ErrorKind::Argument);
    assert_eq!(err.to_string(), "std.break outside of a loop or function");
}

#[test]
fn error_display_messages() {
    assert_eq!(ScriptError::GasExhausted { budget: 10 }.to_string(), "gas exhausted (budget 10)");
    assert_eq!(
        ScriptError::external("fs", "disk full").to_string(),
        "external error: fs - disk full"
    );
    assert_eq!(ScriptError::UnknownOpcode("nope".into()).to_string(), "unknown opcode: nope");
}

// ===========================================================================
// Strategy
// ===========================================================================

#[test]
fn strategy_parses_from_str() {
    assert_eq!("compile".parse::<Strategy>().unwrap(), Strategy::Compile);
    assert_eq!("interpreter".parse::<Strategy>().unwrap(), Strategy::Interpret);
    assert!("jit".parse::<Strategy>().is_err());
    assert_eq!(Strategy::default(), Strategy::Interpret);
}

// ===========================================================================
// TendrilConfig
// ===========================================================================

#[test]
fn config_defaults() {
    let config = TendrilConfig::default();
    assert_eq!(config.engine.gas_limit, 100_000);
    assert_eq!(config.engine.strategy, Strategy::Interpret);
    assert_eq!(config.engine.max_nesting, 256);
    assert_eq!(config.scheduler.tick_ms, 100);
    assert_eq!(config.log.filter, "tendril=info");
    assert!(config.log.file.is_none());
}

#[test]
fn config_partial_toml_keeps_defaults() {
    let config = TendrilConfig::from_toml(
        r#"
        [engine]
        strategy = "compile"

        [scheduler]
        tick_ms = 250
        "#,
    )
    .unwrap();
    assert_eq!(config.engine.strategy, Strategy::Compile);
    assert_eq!(config.engine.gas_limit, 100_000);
    assert_eq!(config.scheduler.tick_ms, 250);
}

#[test]
fn config_toml_roundtrip() {
    let mut config = TendrilConfig::default();
    config.engine.gas_limit = 42;
    let parsed = TendrilConfig::from_toml(&config.to_toml()).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn config_load_missing_file_uses_defaults() {
    let path = std::env::temp_dir().join(format!("tendril-missing-{}.toml", std::process::id()));
    assert_eq!(TendrilConfig::load(&path), TendrilConfig::default());
}

#[test]
fn config_load_invalid_file_uses_defaults() {
    let path = std::env::temp_dir().join(format!("tendril-invalid-{}.toml", std::process::id()));
    std::fs::write(&path, "engine = [not toml").unwrap();
    assert_eq!(TendrilConfig::load(&path), TendrilConfig::default());
    let _ = std::fs::remove_file(&path);
}

//! Interpreter / compiler parity
//!
//! Every expression here runs under both strategies from identical starting
//! contexts. The outcomes (result or failure kind, final scope contents and
//! remaining gas) must match exactly.

use serde_json::{json, Value as Json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tendril_core::{ErrorKind, Expr, Strategy};
use tendril_engine::kernel::run;
use tendril_engine::*;

const GAS: u64 = 10_000;

#[derive(Debug, PartialEq)]
struct Outcome {
    result: Result<(String, Json), ErrorKind>,
    scope: BTreeMap<String, (String, Json)>,
    gas_left: u64,
}

fn view(value: &Value) -> (String, Json) {
    (value.type_name().to_string(), value.to_json().unwrap_or(Json::Null))
}

async fn outcome(expr: &Expr, strategy: Strategy, gas: u64) -> Outcome {
    let registry = Arc::new(create_default_registry());
    let mut ctx = ExecContext::new(registry)
        .with_this(1)
        .with_caller(2)
        .with_args(vec![Value::Number(7.0), Value::string("seven")])
        .with_gas(gas);
    let result = run(expr, strategy, &mut ctx).await;
    Outcome {
        result: result.as_ref().map(view).map_err(|e| e.kind()),
        scope: ctx.scope.snapshot().iter().map(|(k, v)| (k.clone(), view(v))).collect(),
        gas_left: ctx.gas(),
    }
}

async fn parity_with_gas(source: Json, gas: u64) -> Outcome {
    let expr = Expr::from(source.clone());
    let interpreted = outcome(&expr, Strategy::Interpret, gas).await;
    let compiled = outcome(&expr, Strategy::Compile, gas).await;
    assert_eq!(interpreted, compiled, "strategies disagree on {}", source);
    interpreted
}

async fn parity(source: Json) -> Outcome {
    parity_with_gas(source, GAS).await
}

async fn value_of(source: Json) -> Json {
    match parity(source.clone()).await.result {
        Ok((_, value)) => value,
        Err(kind) => panic!("{} failed with {:?}", source, kind),
    }
}

async fn failure_of(source: Json) -> ErrorKind {
    match parity(source.clone()).await.result {
        Ok(value) => panic!("{} succeeded with {:?}", source, value),
        Err(kind) => kind,
    }
}

fn var(name: &str) -> Json {
    json!(["std.var", name])
}

/// `[op, 0, [op, 0, ... inner]]`, `depth` levels deep.
fn wrapped(depth: usize, inner: Json) -> Json {
    (0..depth).fold(inner, |expr, _| json!(["+", 0, expr]))
}

/// Runs `step` `times` times with `i` counting up from zero.
fn repeat(times: u32, setup: Json, step: Json, result: Json) -> Json {
    json!(["std.seq",
        setup,
        ["std.let", "i", 0],
        ["std.while", ["<", var("i"), times],
            ["std.seq", step, ["std.set", "i", ["+", var("i"), 1]]]],
        result])
}

fn factorial(n: u32) -> Json {
    json!(["std.seq",
        ["std.let", "fact", ["std.lambda", ["n"],
            ["std.if", ["<=", ["std.var", "n"], 1],
                1,
                ["*", ["std.var", "n"], ["std.apply", ["std.var", "fact"], ["-", ["std.var", "n"], 1]]]]]],
        ["std.apply", ["std.var", "fact"], n]])
}

// ============================================================================
// Literals
// ============================================================================

#[tokio::test]
async fn literals() {
    assert_eq!(value_of(json!(42)).await, json!(42));
    assert_eq!(value_of(json!("hi")).await, json!("hi"));
    assert_eq!(value_of(json!(null)).await, json!(null));
    assert_eq!(value_of(json!([])).await, json!([]));
    assert_eq!(value_of(json!([1, ["+", 1, 1], 3])).await, json!([1, 2, 3]));
    assert_eq!(value_of(json!({"a": ["+", 1, 2], "b": [true]})).await, json!({"a": 3, "b": [true]}));
}

// ============================================================================
// Arithmetic and comparison
// ============================================================================

#[tokio::test]
async fn arithmetic() {
    assert_eq!(value_of(json!(["+", 1, 2, 3])).await, json!(6));
    assert_eq!(value_of(json!(["-", 10, 3, 2])).await, json!(5));
    assert_eq!(value_of(json!(["-", 4])).await, json!(-4));
    assert_eq!(value_of(json!(["*", 2, 3, 4])).await, json!(24));
    assert_eq!(value_of(json!(["/", 9, 2])).await, json!(4.5));
    assert_eq!(value_of(json!(["%", -7, 3])).await, json!(2));
    assert_eq!(value_of(json!(["math.pow", 2, 10])).await, json!(1024));
    assert_eq!(value_of(json!(["math.sqrt", 16])).await, json!(4));
    assert_eq!(value_of(json!(["math.min", 3, 1, 2])).await, json!(1));
    assert_eq!(value_of(json!(["math.clamp", 15, 0, 10])).await, json!(10));
    assert_eq!(value_of(json!(["math.floor", -1.5])).await, json!(-2));
}

#[tokio::test]
async fn relational_chains() {
    assert_eq!(value_of(json!(["<", 1, 3, 2])).await, json!(false));
    assert_eq!(value_of(json!(["<=", 1, 2, 2, 3])).await, json!(true));
    assert_eq!(value_of(json!([">", 3, 2, 1])).await, json!(true));
    assert_eq!(value_of(json!([">=", 3, 3, 4])).await, json!(false));
    assert_eq!(value_of(json!(["<", "a", "b"])).await, json!(true));
    assert_eq!(value_of(json!(["==", ["list.new", 1, 2], ["list.new", 1, 2]])).await, json!(true));
    assert_eq!(value_of(json!(["!=", 1, "1"])).await, json!(true));
}

// ============================================================================
// Control flow
// ============================================================================

#[tokio::test]
async fn conditionals_and_sequences() {
    assert_eq!(value_of(json!(["std.if", true, 1, 2])).await, json!(1));
    assert_eq!(value_of(json!(["std.if", 0, 1, 2])).await, json!(1));
    assert_eq!(value_of(json!(["std.if", null, 1, 2])).await, json!(2));
    assert_eq!(value_of(json!(["std.if", false, 1])).await, json!(null));
    assert_eq!(value_of(json!(["std.seq"])).await, json!(null));
    assert_eq!(value_of(json!(["std.seq", 1, 2, 3])).await, json!(3));
}

#[tokio::test]
async fn while_loop_accumulates() {
    let out = parity(json!(["std.seq",
        ["std.let", "i", 0],
        ["std.let", "sum", 0],
        ["std.while", ["<", ["std.var", "i"], 10],
            ["std.seq",
                ["std.set", "sum", ["+", ["std.var", "sum"], ["std.var", "i"]]],
                ["std.set", "i", ["+", ["std.var", "i"], 1]]]],
        ["std.var", "sum"]]))
    .await;
    assert_eq!(out.result, Ok(("number".into(), json!(45))));
    assert_eq!(out.scope["i"], ("number".into(), json!(10)));
}

#[tokio::test]
async fn for_loop_frames_do_not_leak() {
    let out = parity(json!(["std.seq",
        ["std.let", "total", 0],
        ["std.for", "x", ["list.new", 1, 2, 3],
            ["std.seq",
                ["std.let", "doubled", ["*", ["std.var", "x"], 2]],
                ["std.set", "total", ["+", ["std.var", "total"], ["std.var", "doubled"]]]]],
        ["std.var", "total"]]))
    .await;
    assert_eq!(out.result, Ok(("number".into(), json!(12))));
    assert!(!out.scope.contains_key("x"));
    assert!(!out.scope.contains_key("doubled"));
}

#[tokio::test]
async fn break_and_continue_affect_the_innermost_loop() {
    let until_five = json!(["std.seq",
        ["std.let", "i", 0],
        ["std.while", true,
            ["std.seq",
                ["std.if", [">=", var("i"), 5], ["std.break"]],
                ["std.set", "i", ["+", var("i"), 1]]]],
        var("i")]);
    assert_eq!(value_of(until_five).await, json!(5));

    let odd_sum = parity(json!(["std.seq",
        ["std.let", "sum", 0],
        ["std.for", "x", ["list.new", 1, 2, 3, 4, 5],
            ["std.seq",
                ["std.if", ["==", ["%", var("x"), 2], 0], ["std.continue"]],
                ["std.set", "sum", ["+", var("sum"), var("x")]]]],
        var("sum")]))
    .await;
    assert_eq!(odd_sum.result, Ok(("number".into(), json!(9))));
    assert!(!odd_sum.scope.contains_key("x"));

    let pairs = json!(["std.seq",
        ["std.let", "seen", ["list.new"]],
        ["std.for", "a", ["list.new", 1, 2, 3],
            ["std.for", "b", ["list.new", 1, 2, 3],
                ["std.if", [">", var("b"), var("a")],
                    ["std.break"],
                    ["list.push", var("seen"), ["list.new", var("a"), var("b")]]]]],
        ["list.len", var("seen")]]);
    assert_eq!(value_of(pairs).await, json!(6));
}

#[tokio::test]
async fn return_leaves_the_innermost_function() {
    let sign = json!(["std.lambda", ["n"],
        ["std.seq",
            ["std.if", [">", var("n"), 0], ["std.return", "positive"]],
            ["std.if", ["<", var("n"), 0], ["std.return"]],
            "zero"]]);
    assert_eq!(value_of(json!(["list.map", ["list.new", 3, -1, 0], sign])).await, json!(["positive", null, "zero"]));

    let first_big = json!(["std.apply",
        ["std.lambda", ["items"],
            ["std.seq",
                ["std.for", "x", var("items"),
                    ["std.if", [">", var("x"), 2], ["std.return", var("x")]]],
                -1]],
        ["list.new", 1, 3, 5]]);
    assert_eq!(value_of(first_big).await, json!(3));

    assert_eq!(value_of(json!(["std.seq", ["std.return", 7], ["std.throw", "unreached"]])).await, json!(7));
}

#[tokio::test]
async fn misplaced_escapes_fail() {
    assert_eq!(failure_of(json!(["std.break"])).await, ErrorKind::Argument);
    assert_eq!(failure_of(json!(["std.seq", 1, ["std.continue"]])).await, ErrorKind::Argument);
    // a loop does not catch a break raised inside a function it calls
    let through_call = json!(["std.while", true, ["std.apply", ["std.lambda", [], ["std.break"]]]]);
    assert_eq!(failure_of(through_call).await, ErrorKind::Argument);
    assert_eq!(failure_of(json!(["std.return", 1, 2])).await, ErrorKind::Argument);
}

#[tokio::test]
async fn short_circuit_operators() {
    assert_eq!(value_of(json!(["bool.and", true, false, ["std.throw", "x"]])).await, json!(false));
    assert_eq!(value_of(json!(["bool.and", 1, "a"])).await, json!(true));
    assert_eq!(value_of(json!(["bool.or", false, true, ["std.throw", "x"]])).await, json!(true));
    assert_eq!(value_of(json!(["bool.or", null, false])).await, json!(false));
    assert_eq!(value_of(json!(["bool.nullish", null, 3, ["std.throw", "x"]])).await, json!(3));
    assert_eq!(value_of(json!(["<", 3, 1, ["std.throw", "never"]])).await, json!(false));
    assert_eq!(value_of(json!(["bool.not", null])).await, json!(true));
}

// ============================================================================
// Functions
// ============================================================================

#[tokio::test]
async fn closures_and_recursion() {
    assert_eq!(value_of(factorial(5)).await, json!(120));

    let late_write = json!(["std.seq",
        ["std.let", "x", 1],
        ["std.let", "f", ["std.lambda", [], ["std.var", "x"]]],
        ["std.set", "x", 2],
        ["std.apply", ["std.var", "f"]]]);
    assert_eq!(value_of(late_write).await, json!(2));

    let missing_params = json!(["std.apply", ["std.lambda", ["a", "b"], ["list.new", ["std.var", "a"], ["std.var", "b"]]], 1]);
    assert_eq!(value_of(missing_params).await, json!([1, null]));
}

#[tokio::test]
async fn higher_order_lists() {
    let double = json!(["std.lambda", ["x"], ["*", ["std.var", "x"], 2]]);
    assert_eq!(value_of(json!(["list.map", ["list.new", 1, 2, 3], double])).await, json!([2, 4, 6]));

    let odd = json!(["std.lambda", ["x"], ["==", ["%", ["std.var", "x"], 2], 1]]);
    assert_eq!(value_of(json!(["list.filter", ["list.new", 1, 2, 3, 4, 5], odd.clone()])).await, json!([1, 3, 5]));
    assert_eq!(value_of(json!(["list.find", ["list.new", 2, 4, 5, 7], odd])).await, json!(5));

    let sum = json!(["std.lambda", ["acc", "x"], ["+", ["std.var", "acc"], ["std.var", "x"]]]);
    assert_eq!(value_of(json!(["list.reduce", ["list.new", 1, 2, 3, 4], sum, 0])).await, json!(10));
}

#[tokio::test]
async fn method_calls_keep_receiver() {
    let counter = json!(["std.seq",
        ["std.let", "o", ["obj.new",
            "n", 5,
            "bump", ["std.lambda", ["by"],
                ["obj.set", ["std.self"], "n", ["+", ["obj.get", ["std.self"], "n"], ["std.var", "by"]]]]]],
        ["std.call_method", ["std.var", "o"], "bump", 3],
        ["std.let", "bound", ["std.method", ["std.var", "o"], "bump"]],
        ["std.apply", ["std.var", "bound"], 2],
        ["list.new", ["obj.get", ["std.var", "o"], "n"], ["std.this"]]]);
    assert_eq!(value_of(counter).await, json!([10, 1]));
}

#[tokio::test]
async fn quote_returns_data() {
    assert_eq!(value_of(json!(["std.quote", ["+", 1, 2]])).await, json!(["+", 1, 2]));
}

// ============================================================================
// Data libraries
// ============================================================================

#[tokio::test]
async fn lists_objects_strings_json() {
    let pushed = json!(["std.seq",
        ["std.let", "l", ["list.new", 3, 1, 2]],
        ["list.push", ["std.var", "l"], 0],
        ["list.sort", ["std.var", "l"]],
        ["std.var", "l"]]);
    assert_eq!(value_of(pushed).await, json!([0, 1, 2, 3]));
    assert_eq!(value_of(json!(["list.slice", ["list.new", 1, 2, 3, 4], 1, -1])).await, json!([2, 3]));
    assert_eq!(value_of(json!(["list.get", ["list.new", 1], 5, "none"])).await, json!("none"));
    assert_eq!(value_of(json!(["list.join", ["list.new", 1, "a", true], "-"])).await, json!("1-a-true"));

    assert_eq!(value_of(json!(["obj.keys", ["obj.merge", {"b": 1}, {"a": 2}]])).await, json!(["a", "b"]));
    assert_eq!(value_of(json!(["obj.get", {"a": 1}, "zz"])).await, json!(null));
    assert_eq!(value_of(json!(["obj.has", {"a": null}, "a"])).await, json!(true));

    assert_eq!(value_of(json!(["str.concat", "n=", 3])).await, json!("n=3"));
    assert_eq!(value_of(json!(["str.split", "a,b,c", ","])).await, json!(["a", "b", "c"]));
    assert_eq!(value_of(json!(["str.upper", "abc"])).await, json!("ABC"));
    assert_eq!(value_of(json!(["str.match", "x=12", "(\\d+)"])).await, json!(["12", "12"]));

    assert_eq!(value_of(json!(["json.parse", ["json.stringify", {"a": [1, 2]}]])).await, json!({"a": [1, 2]}));
}

#[tokio::test]
async fn searching_and_splicing() {
    assert_eq!(value_of(json!(["list.indexOf", ["list.new", 1, ["list.new", 2], 3], ["list.new", 2]])).await, json!(1));
    assert_eq!(value_of(json!(["list.indexOf", ["list.new", 1], 9])).await, json!(-1));

    let spliced = json!(["std.seq",
        ["std.let", "l", ["list.new", 1, 2, 3, 4]],
        ["std.let", "removed", ["list.splice", var("l"), 1, 2, "a", "b", "c"]],
        ["list.new", var("l"), var("removed")]]);
    assert_eq!(value_of(spliced).await, json!([[1, "a", "b", "c", 4], [2, 3]]));

    assert_eq!(value_of(json!(["str.indexOf", "hello", "l"])).await, json!(2));
    assert_eq!(value_of(json!(["str.indexOf", "hello", "z"])).await, json!(-1));
    assert_eq!(value_of(json!(["str.startsWith", "hello", "he"])).await, json!(true));
    assert_eq!(value_of(json!(["str.endsWith", "hello", "he"])).await, json!(false));

    assert_eq!(value_of(json!(["bool.guard", null, 2])).await, json!(2));
    assert_eq!(value_of(json!(["bool.guard", false, 2])).await, json!(false));
}

#[tokio::test]
async fn flat_maps_and_object_traversal() {
    let twice = json!(["std.lambda", ["x"], ["list.new", var("x"), var("x")]]);
    assert_eq!(value_of(json!(["list.flatMap", ["list.new", 1, 2], twice])).await, json!([1, 1, 2, 2]));
    let same = json!(["std.lambda", ["x"], var("x")]);
    assert_eq!(value_of(json!(["list.flatMap", ["list.new", 1, 2], same])).await, json!([1, 2]));

    let tagged = json!(["std.lambda", ["v", "k"], ["str.concat", var("k"), var("v")]]);
    assert_eq!(value_of(json!(["obj.map", {"a": 1, "b": 2}, tagged])).await, json!({"a": "a1", "b": "b2"}));
    let big = json!(["std.lambda", ["v"], [">", var("v"), 1]]);
    assert_eq!(value_of(json!(["obj.filter", {"a": 1, "b": 2}, big])).await, json!({"b": 2}));
    let keys = json!(["std.lambda", ["acc", "v", "k"], ["str.concat", var("acc"), var("k")]]);
    assert_eq!(value_of(json!(["obj.reduce", {"b": 2, "a": 1}, keys, ""])).await, json!("ab"));
    let renamed = json!(["std.lambda", ["v", "k"],
        ["std.if", [">", var("v"), 1], ["obj.new", ["str.concat", var("k"), "_x"], var("v")], "dropped"]]);
    assert_eq!(value_of(json!(["obj.flatMap", {"a": 1, "b": 2}, renamed])).await, json!({"b_x": 2}));
}

#[tokio::test]
async fn invocation_data() {
    assert_eq!(value_of(json!(["std.this"])).await, json!(1));
    assert_eq!(value_of(json!(["std.caller"])).await, json!(2));
    assert_eq!(value_of(json!(["std.arg", 0])).await, json!(7));
    assert_eq!(value_of(json!(["std.arg", 9])).await, json!(null));
    assert_eq!(value_of(json!(["std.args"])).await, json!([7, "seven"]));
    assert_eq!(value_of(json!(["std.typeof", ["std.this"]])).await, json!("entity"));
    assert_eq!(value_of(json!(["std.number", "2.5"])).await, json!(2.5));
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn failures_agree_on_kind() {
    assert_eq!(failure_of(json!(["nope.op", 1])).await, ErrorKind::UnknownOpcode);
    assert_eq!(failure_of(json!(["std.var", "zz"])).await, ErrorKind::Scope);
    assert_eq!(failure_of(json!(["std.set", "zz", 1])).await, ErrorKind::Scope);
    assert_eq!(failure_of(json!(["std.throw", "boom"])).await, ErrorKind::Thrown);
    assert_eq!(failure_of(json!(["bool.not"])).await, ErrorKind::Argument);
    assert_eq!(failure_of(json!(["+", 1, "a"])).await, ErrorKind::Argument);
    assert_eq!(failure_of(json!(["<", 1, "a"])).await, ErrorKind::Argument);
    // no world attached
    assert_eq!(failure_of(json!(["world.get", 1])).await, ErrorKind::External);
    assert_eq!(failure_of(json!(["world.create", {}])).await, ErrorKind::External);
}

#[tokio::test]
async fn unknown_opcode_only_fails_when_reached() {
    assert_eq!(value_of(json!(["std.if", false, ["nope.op"], 3])).await, json!(3));
    assert_eq!(value_of(json!(["bool.and", false, ["nope.op"]])).await, json!(false));
}

#[tokio::test]
async fn scope_before_failure_is_identical() {
    let out = parity(json!(["std.seq", ["std.let", "a", 1], ["std.let", "b", ["list.new"]], ["std.throw", "x"], ["std.let", "c", 3]])).await;
    assert_eq!(out.result, Err(ErrorKind::Thrown));
    assert_eq!(out.scope.keys().collect::<Vec<_>>(), vec!["a", "b"]);
}

// ============================================================================
// Resource limits
// ============================================================================

#[tokio::test]
async fn self_containing_values_fail_instead_of_recursing() {
    let cyclic = |name: &str| json!(["std.seq",
        ["std.let", name, ["list.new", 1]],
        ["list.push", var(name), var(name)]]);
    for render in [json!(["json.stringify", var("l")]), json!(["std.string", var("l")]), json!(["str.concat", "x", var("l")])] {
        let program = json!(["std.seq", cyclic("l"), render]);
        assert_eq!(failure_of(program).await, ErrorKind::Limit);
    }
    let compare = json!(["std.seq", cyclic("l"), cyclic("m"), ["==", var("l"), var("m")]]);
    assert_eq!(failure_of(compare).await, ErrorKind::Limit);
    let same = json!(["std.seq", cyclic("l"), ["==", var("l"), var("l")]]);
    assert_eq!(value_of(same).await, json!(true));
}

#[tokio::test]
async fn shared_subtrees_are_walked_within_budget() {
    // 40 doublings share 40 lists but unfold to 2^40 elements
    let doubling = repeat(40, json!(["std.let", "x", ["list.new"]]), json!(["std.set", "x", ["list.new", var("x"), var("x")]]), json!(null));
    for render in [json!(["json.stringify", var("x")]), json!(["list.join", ["list.new", var("x")]]), json!(["std.log", var("x")])] {
        let program = json!(["std.seq", doubling.clone(), render]);
        assert_eq!(failure_of(program).await, ErrorKind::Limit);
    }
}

#[tokio::test]
async fn growth_stops_at_size_limits() {
    let strings = repeat(30, json!(["std.let", "s", "ab"]), json!(["std.set", "s", ["str.concat", var("s"), var("s")]]), json!(null));
    assert_eq!(failure_of(strings).await, ErrorKind::Limit);

    let lists = repeat(30, json!(["std.let", "l", ["list.new", 0]]), json!(["std.set", "l", ["list.concat", var("l"), var("l")]]), json!(null));
    assert_eq!(failure_of(lists).await, ErrorKind::Limit);

    assert_eq!(failure_of(json!(["str.repeat", "abc", 1_000_000])).await, ErrorKind::Limit);
    assert_eq!(failure_of(json!(["str.split", ["str.repeat", ",", 100_000], ","])).await, ErrorKind::Limit);

    let within = repeat(10, json!(["std.let", "s", "ab"]), json!(["std.set", "s", ["str.concat", var("s"), var("s")]]), json!(["str.len", var("s")]));
    assert_eq!(value_of(within).await, json!(2048));
}

#[tokio::test]
async fn deep_expressions_hit_the_nesting_limit() {
    assert_eq!(value_of(wrapped(200, json!(1))).await, json!(1));
    assert_eq!(failure_of(wrapped(300, json!(1))).await, ErrorKind::Limit);
    assert_eq!(failure_of(json!(["std.if", true, wrapped(300, json!(1))])).await, ErrorKind::Limit);
}

#[tokio::test]
async fn recursion_depth_times_body_depth_is_bounded() {
    let recursive = |n: u32, body_depth: usize| json!(["std.seq",
        ["std.let", "f", ["std.lambda", ["n"],
            ["std.if", ["<=", var("n"), 0],
                0,
                wrapped(body_depth, json!(["std.apply", var("f"), ["-", var("n"), 1]]))]]],
        ["std.apply", var("f"), n]]);
    assert_eq!(failure_of(recursive(120, 40)).await, ErrorKind::Limit);
    assert_eq!(value_of(recursive(20, 3)).await, json!(0));
}

// ============================================================================
// Gas
// ============================================================================

#[tokio::test]
async fn infinite_loop_exhausts_gas() {
    let out = parity_with_gas(json!(["std.while", true, null]), 500).await;
    assert_eq!(out.result, Err(ErrorKind::GasExhausted));
    assert_eq!(out.gas_left, 0);
}

#[tokio::test]
async fn gas_is_charged_per_node() {
    // call node + two literals
    let out = parity(json!(["+", 1, 2])).await;
    assert_eq!(out.gas_left, GAS - 3);
    // literal list + three elements
    let out = parity(json!([1, 2, 3])).await;
    assert_eq!(out.gas_left, GAS - 4);
}

#[tokio::test]
async fn exhaustion_points_match_at_every_budget() {
    for gas in 0..120 {
        parity_with_gas(factorial(4), gas).await;
    }
}

#[tokio::test]
async fn exhaustion_points_match_around_escapes() {
    let program = json!(["std.apply",
        ["std.lambda", [],
            ["std.seq",
                ["std.let", "n", 0],
                ["std.while", true,
                    ["std.seq",
                        ["std.set", "n", ["+", var("n"), 1]],
                        ["std.if", ["<", var("n"), 3], ["std.continue"]],
                        ["std.if", [">", var("n"), 5], ["std.return", var("n")]]]]]]]);
    assert_eq!(value_of(program.clone()).await, json!(6));
    for gas in 0..150 {
        parity_with_gas(program.clone(), gas).await;
    }
}

// ABOUTME: End-to-end scenarios and the quantified language invariants

use braid::builtins::register_builtins;
use braid::env::Frame;
use braid::error::BraidError;
use braid::eval;
use braid::reader;
use braid::symbol::Symbol;
use braid::value::Value;
use std::rc::Rc;

fn setup() -> Rc<Frame> {
    let env = Frame::global();
    register_builtins(&env);
    env
}

fn run(src: &str) -> Value {
    eval::clear_stop();
    let env = setup();
    eval::eval_source(src, None, &env).expect("evaluation failed")
}

fn run_err(src: &str) -> BraidError {
    eval::clear_stop();
    let env = setup();
    eval::eval_source(src, None, &env).expect_err("expected an error")
}

// ===== end-to-end scenarios =====

#[test]
fn scenario_addition() {
    assert_eq!(run("(+ 1 2 3)"), Value::Int(6));
}

#[test]
fn scenario_lambda_in_let() {
    assert_eq!(
        run("(let [f (lambda [x y] (+ x y))] (f 10 32))"),
        Value::Int(42)
    );
}

#[test]
fn scenario_pattern_factorial() {
    let src = "(defn fact | 0 -> 1 | n -> (* n (fact (- n 1)))) (fact 5)";
    assert_eq!(run(src), Value::Int(120));
}

#[test]
fn scenario_recur_sum() {
    let src = "(defn sum | acc [] -> acc | acc x:xs -> (recur (+ acc x) xs)) \
               (sum 0 [1 2 3 4 5])";
    assert_eq!(run(src), Value::Int(15));
}

#[test]
fn scenario_recur_does_not_grow_stack() {
    // 10 000 recur iterations must not overflow the host stack.
    let src = "(defn sum | acc [] -> acc | acc x:xs -> (recur (+ acc x) xs)) \
               (sum 0 (range 10000))";
    assert_eq!(run(src), Value::Int(49_995_000));
}

#[test]
fn scenario_quasiquote_splice() {
    let v = run("`(a ~(+ 1 1) ~@[3 4] b)");
    assert_eq!(v.to_string(), "(a 2 3 4 b)");
}

#[test]
fn scenario_compound_let_destructuring() {
    let v = run("(let a:b:c [10 20 30]) [a b c]");
    assert_eq!(
        v,
        Value::vector(vec![Value::Int(10), Value::Int(20), Value::Int(30)])
    );
}

#[test]
fn scenario_dict_as_callable() {
    assert_eq!(run("({:a 1 :b 2} :b)"), Value::Int(2));

    // Two-argument application writes the key.
    let src = "(let d {:a 1 :b 2}) (d :c 99) (d :c)";
    assert_eq!(run(src), Value::Int(99));
}

// ===== invariants =====

#[test]
fn invariant_parse_print_round_trip() {
    let cases = [
        "42",
        "-17",
        "2.5",
        "123456789012345678901234567890i",
        "\"hello\\nworld\"",
        "true",
        "false",
        "\\a",
        "\\space",
        ":keyword",
        "some-symbol",
        "(1 2 3)",
        "(a (b c) d)",
        "(a . b)",
        "[1 [2 3] 4]",
        "{:a 1 :b [2 3]}",
        "#{1 2}",
    ];
    for src in cases {
        let forms = reader::read_program(src, None, None).expect("parse");
        let printed = forms[0].to_string();
        let reparsed = reader::read_program(&printed, None, None).expect("reparse");
        assert_eq!(forms[0], reparsed[0], "round trip failed for {}", src);
    }
}

#[test]
fn invariant_symbol_identity() {
    assert_eq!(Symbol::intern("alpha"), Symbol::intern("alpha"));
    assert_ne!(Symbol::intern("alpha"), Symbol::intern("beta"));
    assert_eq!(
        Value::sym("alpha"),
        Value::sym("alpha")
    );
}

#[test]
fn invariant_quote_idempotence() {
    for src in ["x", "(f 1 2)", "[1 2]", "{:a 1}", "(quote y)"] {
        let quoted = format!("'{}", src);
        let evaluated = run(&quoted);
        let parsed = reader::read_program(src, None, None).expect("parse")[0].clone();
        assert_eq!(evaluated, parsed, "quote was not inert for {}", src);
    }
}

#[test]
fn invariant_pattern_clause_order_deterministic() {
    let src = "(defn f | x :where (> x 0) -> :pos | x -> :any) (f 5)";
    assert_eq!(run(src), Value::keyword("pos"));
    // Both clauses match; the first in source order must keep winning.
    let env = setup();
    eval::eval_source(
        "(defn f | x :where (> x 0) -> :pos | x -> :any)",
        None,
        &env,
    )
    .unwrap();
    for _ in 0..50 {
        let v = eval::eval_source("(f 5)", None, &env).unwrap();
        assert_eq!(v, Value::keyword("pos"));
    }
}

#[test]
fn invariant_destructuring_binds_components() {
    assert_eq!(
        run("(let a:b [1 2]) [a b]"),
        Value::vector(vec![Value::Int(1), Value::Int(2)])
    );
    // Surplus elements bind the tail to the final name.
    assert_eq!(
        run("(let x:xs [1 2 3 4]) xs"),
        Value::vector(vec![Value::Int(2), Value::Int(3), Value::Int(4)])
    );
    // A trailing colon requests a scalar tail.
    assert_eq!(run("(let x:y: [1 2 3]) y"), Value::Int(2));
}

#[test]
fn invariant_lexical_closure() {
    // A lambda captures its construction frame; mutations flow both ways.
    let src = "(defn make-counter [] \
                 (do (let n 0) \
                     (lambda [] (set n (+ n 1))))) \
               (let c (make-counter)) \
               (c) (c) (c)";
    assert_eq!(run(src), Value::Int(3));

    // Independent closures get independent frames.
    let src = "(defn make-counter [] (do (let n 0) (lambda [] (set n (+ n 1))))) \
               (let a (make-counter)) (let b (make-counter)) \
               (a) (a) (b)";
    assert_eq!(run(src), Value::Int(1));

    // Later mutation of the captured frame is visible inside the lambda.
    let src = "(let base 10) \
               (let f (lambda [x] (+ x base))) \
               (set base 20) \
               (f 1)";
    assert_eq!(run(src), Value::Int(21));
}

#[test]
fn invariant_keyword_parameter_pass_through() {
    let src = "(defn f [x :k] [x k]) (f 1 -k: (+ 2 3))";
    assert_eq!(
        run(src),
        Value::vector(vec![Value::Int(1), Value::Int(5)])
    );

    // Without the switch the keyword binds nil.
    assert_eq!(
        run("(defn f [x :k] [x k]) (f 1)"),
        Value::vector(vec![Value::Int(1), Value::Nil])
    );

    // A switch the function does not declare raises.
    let err = run_err("(defn f [x] x) (f 1 -mystery)");
    assert!(err.to_string().contains("mystery"));
}

#[test]
fn invariant_splat_expansion() {
    assert_eq!(run("(let xs [1 2 3]) (+ @xs 4)"), Value::Int(10));
    // Splatting a dictionary interleaves keys and values.
    assert_eq!(
        run("(let d {:a 1}) (list @d)"),
        Value::list(vec![Value::keyword("a"), Value::Int(1)])
    );
}

#[test]
fn runaway_recursion_hits_depth_guard() {
    let err = run_err("(defn f [n] (f (+ n 1))) (f 0)");
    assert!(err.to_string().contains("too deep"));
}

// ===== language features =====

#[test]
fn test_if_truthiness() {
    assert_eq!(run("(if true 1 2)"), Value::Int(1));
    assert_eq!(run("(if false 1 2)"), Value::Int(2));
    assert_eq!(run("(if nil 1 2)"), Value::Int(2));
    assert_eq!(run("(if 0 1 2)"), Value::Int(1));
    assert_eq!(run("(if false 1)"), Value::Nil);
}

#[test]
fn test_while_with_break_value() {
    let src = "(let n 0) \
               (while true \
                 (set n (+ n 1)) \
                 (if (> n 4) (break n)))";
    assert_eq!(run(src), Value::Int(5));
}

#[test]
fn test_foreach_accumulates() {
    let src = "(let total 0) (foreach x [1 2 3 4] (set total (+ total x))) total";
    assert_eq!(run(src), Value::Int(10));
}

#[test]
fn test_foreach_destructures_pairs() {
    let src = "(let total 0) \
               (foreach k:v {:a 1 :b 2} (set total (+ total v))) \
               total";
    assert_eq!(run(src), Value::Int(3));
}

#[test]
fn test_pipeline_rewrite_and_execution() {
    let src = "(defn double [x] (* 2 x)) ([1 2 3] | map double | reduce + 0)";
    assert_eq!(run(src), Value::Int(12));
}

#[test]
fn test_string_interpolation() {
    assert_eq!(
        run("(let n 6) \"got ${(* n 7)} apples\""),
        Value::str("got 42 apples")
    );
    assert_eq!(run("@\"got ${n} apples\""), Value::str("got ${n} apples"));
}

#[test]
fn test_defmacro_expands_at_read_time() {
    let src = "(defmacro unless [test body] `(if ~test () ~body)) \
               (unless false 42)";
    assert_eq!(run(src), Value::Int(42));
    let src = "(defmacro unless [test body] `(if ~test () ~body)) \
               (unless true 42)";
    assert_eq!(run(src), Value::Nil);
}

#[test]
fn test_defspecial_sees_unevaluated_args() {
    let src = "(defspecial first-form [a b] a) (first-form (+ 1 2) (throw \"never\"))";
    assert_eq!(run(src).to_string(), "(+ 1 2)");
}

#[test]
fn test_fn_literal_shorthand() {
    assert_eq!(run("(map #(* %0 %0) [1 2 3])"), run("'[1 4 9]"));
    assert_eq!(run("(#(+ %0 %1) 3 4)"), Value::Int(7));
}

#[test]
fn test_member_access() {
    assert_eq!(run("(.name {:name \"ada\" :age 36})"), Value::str("ada"));
}

#[test]
fn test_deftype_constructor_and_fields() {
    let src = "(deftype Point x y) (let p (Point 3 4)) [(.x p) (.y p)]";
    assert_eq!(
        run(src),
        Value::vector(vec![Value::Int(3), Value::Int(4)])
    );
}

#[test]
fn test_try_catch_finally() {
    let src = "(let cleaned false) \
               (let r (try (throw \"boom\") \
                           (catch e (str \"caught \" e)) \
                           (finally (set cleaned true)))) \
               [r cleaned]";
    assert_eq!(
        run(src),
        Value::vector(vec![Value::str("caught boom"), Value::Bool(true)])
    );
}

#[test]
fn test_quit_bypasses_catch() {
    let err = run_err("(try (quit 3) (catch e e))");
    assert!(matches!(err, BraidError::Exit(3)));
}

#[test]
fn test_return_unwinds_function() {
    let src = "(defn f [x] (if (> x 0) (return :pos)) :neg) [(f 1) (f -1)]";
    assert_eq!(
        run(src),
        Value::vector(vec![Value::keyword("pos"), Value::keyword("neg")])
    );
}

#[test]
fn test_type_constrained_parameters() {
    assert_eq!(
        run("(defn f [(^int x)] (+ x 1)) (f \"41\")"),
        Value::Int(42)
    );
    let err = run_err("(defn f [(^int x)] x) (f \"nope\")");
    assert!(err.to_string().contains("do not match"));
}

#[test]
fn test_return_type_conversion() {
    assert_eq!(
        run("(defn f [x] ^string (+ x 1)) (f 41)"),
        Value::str("42")
    );
}

#[test]
fn test_default_parameter_values() {
    let src = "(defn f [a (b 10)] (+ a b)) [(f 1) (f 1 2)]";
    assert_eq!(
        run(src),
        Value::vector(vec![Value::Int(11), Value::Int(3)])
    );
}

#[test]
fn test_rest_parameter_binds_slice() {
    let src = "(defn f [a &rest] [a (length rest)]) (f 1 2 3 4)";
    assert_eq!(
        run(src),
        Value::vector(vec![Value::Int(1), Value::Int(3)])
    );
}

#[test]
fn test_bigint_arithmetic_promotes() {
    let v = run("(* 92233720368547758 10000)");
    assert_eq!(v.to_string(), "922337203685477580000i");
}

#[test]
fn test_unbound_symbol_suggestion() {
    let err = run_err("(let total 1) totall");
    assert!(err.to_string().contains("did you mean total"));
}

#[test]
fn test_load_missing_file_errors() {
    let err = run_err("(load \"no-such-file.tl\")");
    assert!(err.to_string().contains("no-such-file.tl"));
}

#[test]
fn test_json_bridge() {
    let src = r#"((json-parse "{\"a\": [1, 2]}") "a")"#;
    assert_eq!(
        run(src),
        Value::vector(vec![Value::Int(1), Value::Int(2)])
    );
    assert_eq!(
        run("(json-stringify {\"n\" 1})"),
        Value::str("{\"n\":1}")
    );
}

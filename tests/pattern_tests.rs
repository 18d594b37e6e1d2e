// ABOUTME: Pattern engine coverage: element kinds, clause control, dispatch

use braid::builtins::register_builtins;
use braid::env::Frame;
use braid::eval;
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

fn run_err(src: &str) -> braid::error::BraidError {
    eval::clear_stop();
    let env = setup();
    eval::eval_source(src, None, &env).expect_err("expected an error")
}

// ===== element kinds =====

#[test]
fn literal_elements_match_by_deep_equality() {
    let src = "(defn f | 0 -> :zero | \"hi\" -> :greeting | [1 2] -> :pair | _ -> :other) \
               [(f 0) (f \"hi\") (f [1 2]) (f 9)]";
    assert_eq!(
        run(src),
        Value::vector(vec![
            Value::keyword("zero"),
            Value::keyword("greeting"),
            Value::keyword("pair"),
            Value::keyword("other"),
        ])
    );
}

#[test]
fn type_elements_convert_and_bind() {
    let src = "(defn f | (^int n) -> (+ n 1) | (^string s) -> s) [(f 41) (f \"41\") (f \"abc\")]";
    // "41" converts to an int; "abc" does not, so the string clause wins.
    assert_eq!(
        run(src),
        Value::vector(vec![Value::Int(42), Value::Int(42), Value::str("abc")])
    );
}

#[test]
fn type_element_with_default() {
    let src = "(defn f | a (^int n 10) -> (+ a n)) [(f 1) (f 1 5)]";
    assert_eq!(
        run(src),
        Value::vector(vec![Value::Int(11), Value::Int(6)])
    );
}

#[test]
fn regex_elements_bind_group_vector() {
    let src = "(defn m | (#\"(\\d+)-(\\d+)\" g) -> g | _ -> :nope) \
               [(m \"10-20\") (m \"xyz\")]";
    assert_eq!(
        run(src),
        Value::vector(vec![
            Value::vector(vec![
                Value::str("10-20"),
                Value::str("10"),
                Value::str("20")
            ]),
            Value::keyword("nope"),
        ])
    );
}

#[test]
fn property_patterns_match_keys() {
    let src = "(defn p | {:x x :y y} -> (+ x y) | _ -> :nope) \
               [(p {:x 1 :y 2}) (p {:x 1})]";
    assert_eq!(
        run(src),
        Value::vector(vec![Value::Int(3), Value::keyword("nope")])
    );
}

#[test]
fn property_pattern_omitted_subvar_uses_key_name() {
    let src = "(defn q | {:x} -> x) (q {:x 7})";
    assert_eq!(run(src), Value::Int(7));
}

#[test]
fn property_patterns_match_records() {
    let src = "(deftype Point x y) \
               (defn p | {:x x :y y} -> (* x y)) \
               (p (Point 6 7))";
    assert_eq!(run(src), Value::Int(42));
}

#[test]
fn nested_vector_patterns_destructure() {
    let src = "(defn v | [a [b c]] -> (+ a (* b c))) (v [1 [2 3]])";
    assert_eq!(run(src), Value::Int(7));
}

#[test]
fn nested_vector_rest_consumes_tail() {
    let src = "(defn v | [a &more] -> [a (length more)]) (v [1 2 3 4])";
    assert_eq!(
        run(src),
        Value::vector(vec![Value::Int(1), Value::Int(3)])
    );
}

#[test]
fn pinned_variables_compare_against_scope() {
    let src = "(let target 5) \
               (defn f | %target -> :hit | _ -> :miss) \
               [(f 5) (f 6)]";
    assert_eq!(
        run(src),
        Value::vector(vec![Value::keyword("hit"), Value::keyword("miss")])
    );
}

#[test]
fn pinned_callable_applies_as_predicate() {
    let src = "(defn f | %number? -> :num | _ -> :other) [(f 3) (f \"x\")]";
    assert_eq!(
        run(src),
        Value::vector(vec![Value::keyword("num"), Value::keyword("other")])
    );
}

#[test]
fn pinned_regex_tests_strings() {
    let src = "(let digits #\"^\\d+$\") \
               (defn f | %digits -> :digits | _ -> :other) \
               [(f \"123\") (f \"12a\")]";
    assert_eq!(
        run(src),
        Value::vector(vec![Value::keyword("digits"), Value::keyword("other")])
    );
}

#[test]
fn pinned_type_tests_instances() {
    let src = "(let t ^string) \
               (defn f | %t -> :str | _ -> :other) \
               [(f \"x\") (f 3)]";
    assert_eq!(
        run(src),
        Value::vector(vec![Value::keyword("str"), Value::keyword("other")])
    );
}

#[test]
fn pinned_group_binds_subject() {
    let src = "(defn f | (v %number?) -> (+ v 1) | _ -> :other) (f 41)";
    assert_eq!(run(src), Value::Int(42));
}

#[test]
fn star_functions_consume_a_prefix() {
    let src = "(defn two | a b -> [a b]) \
               (defn g | (*two t) rest -> [t rest]) \
               (g 1 2 3)";
    assert_eq!(
        run(src),
        Value::vector(vec![
            Value::vector(vec![Value::Int(1), Value::Int(2)]),
            Value::Int(3),
        ])
    );
}

#[test]
fn ignore_element_consumes_without_binding() {
    let src = "(defn f | _ x -> x) (f 1 2)";
    assert_eq!(run(src), Value::Int(2));
}

#[test]
fn compound_vars_destructure_in_clauses() {
    let src = "(defn f | x:xs -> [x xs]) (f [1 2 3])";
    assert_eq!(
        run(src),
        Value::vector(vec![
            Value::Int(1),
            Value::vector(vec![Value::Int(2), Value::Int(3)]),
        ])
    );
}

// ===== clause control =====

#[test]
fn where_guards_reject_clauses() {
    let src = "(defn f | x :where (> x 10) -> :big | x -> :small) [(f 50) (f 5)]";
    assert_eq!(
        run(src),
        Value::vector(vec![Value::keyword("big"), Value::keyword("small")])
    );
}

#[test]
fn fail_in_actions_backtracks_to_next_clause() {
    let src = "(defn f | x -> (if (< x 0) (fail) :first) | x -> :second) \
               [(f 1) (f -1)]";
    assert_eq!(
        run(src),
        Value::vector(vec![Value::keyword("first"), Value::keyword("second")])
    );
}

#[test]
fn fail_stop_element_hardens_mismatch() {
    let src = "(defn f | 1 ! 2 -> :both | _ _ -> :fallback) (f 1 3)";
    let err = run_err(src);
    assert!(err.to_string().contains("match failed"));
}

#[test]
fn begin_end_and_default_clauses() {
    let src = "(let began false) (let ended false) \
               (defn f | ^ -> (set began true) \
                       | $ -> (set ended true) \
                       | 0 -> :zero \
                       | -> :default) \
               (let r1 (f 0)) (let r2 (f 99)) \
               [r1 r2 began ended]";
    assert_eq!(
        run(src),
        Value::vector(vec![
            Value::keyword("zero"),
            Value::keyword("default"),
            Value::Bool(true),
            Value::Bool(true),
        ])
    );
}

#[test]
fn no_matching_clause_raises() {
    let err = run_err("(defn f | 0 -> :zero) (f 1)");
    assert!(err.to_string().contains("no matching clause"));
}

#[test]
fn clause_bindings_are_scoped_to_the_clause() {
    // Bindings made while matching must not leak into the caller's frame.
    let src = "(defn f | bound-in-clause -> bound-in-clause) (f 1) ";
    assert_eq!(run(src), Value::Int(1));
    let err = run_err("(defn f | bound-in-clause -> bound-in-clause) (f 1) bound-in-clause");
    assert!(err.to_string().contains("undefined symbol"));
}

// ===== dispatch and recursion =====

#[test]
fn keyword_params_in_clauses_bind_from_switches() {
    let src = "(defn f | x :scale -> (* x (if scale scale 1))) \
               [(f 5) (f 5 -scale: 3)]";
    assert_eq!(
        run(src),
        Value::vector(vec![Value::Int(5), Value::Int(15)])
    );
}

#[test]
fn recur_restarts_dispatch_without_stack_growth() {
    let src = "(defn count-down | 0 -> :done | n -> (recur (- n 1))) (count-down 50000)";
    assert_eq!(run(src), Value::keyword("done"));
}

#[test]
fn recur_rebinds_against_all_clauses() {
    // recur re-enters dispatch, so a different clause can win next round.
    let src = "(defn collatz | steps 1 -> steps \
                            | steps n :where (== (% n 2) 0) -> (recur (+ steps 1) (/ n 2)) \
                            | steps n -> (recur (+ steps 1) (+ (* 3 n) 1))) \
               (collatz 0 6)";
    assert_eq!(run(src), Value::Int(8));
}

#[test]
fn inline_match_binds_in_current_frame() {
    let src = "(match 5 | 0 -> :zero | n :where (> n 3) -> :big | _ -> :small)";
    assert_eq!(run(src), Value::keyword("big"));

    // Inline match runs without a child frame, so bindings persist.
    let src = "(match [1 2] | [a b] -> :ok) (+ a b)";
    assert_eq!(run(src), Value::Int(3));
}

#[test]
fn match_falls_to_default_clause() {
    let src = "(match 42 | 0 -> :zero | -> :something-else)";
    assert_eq!(run(src), Value::keyword("something-else"));
}

#[test]
fn pattern_functions_are_first_class() {
    let src = "(defn classify | ^ -> () | 0 -> :zero | _ -> :other) \
               (map classify [0 1 0])";
    assert_eq!(
        run(src),
        Value::vector(vec![
            Value::keyword("zero"),
            Value::keyword("other"),
            Value::keyword("zero"),
        ])
    );
}

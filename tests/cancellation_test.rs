// ABOUTME: Stop-flag tests, isolated in their own binary because the flag
// is process-wide and would race with unrelated parallel tests

use braid::builtins::register_builtins;
use braid::env::Frame;
use braid::error::BraidError;
use braid::eval;
use braid::value::Value;
use serial_test::serial;
use std::rc::Rc;

fn setup() -> Rc<Frame> {
    let env = Frame::global();
    register_builtins(&env);
    env
}

#[test]
#[serial]
fn stop_terminates_at_the_next_checkpoint() {
    eval::clear_stop();
    let env = setup();
    eval::stop();
    let result = eval::eval_source("(while true 1)", None, &env);
    assert!(matches!(result, Err(BraidError::Stop)));
    eval::clear_stop();
}

#[test]
#[serial]
fn stop_interrupts_recur_loops() {
    eval::clear_stop();
    let env = setup();
    eval::eval_source("(defn spin | n -> (recur (+ n 1)))", None, &env).unwrap();
    eval::stop();
    let result = eval::eval_source("(spin 0)", None, &env);
    assert!(matches!(result, Err(BraidError::Stop)));
    eval::clear_stop();
}

#[test]
#[serial]
fn clearing_the_flag_resumes_evaluation() {
    eval::clear_stop();
    let env = setup();
    eval::stop();
    assert!(eval::eval_source("(+ 1 1)", None, &env).is_err());
    eval::clear_stop();
    assert_eq!(
        eval::eval_source("(+ 1 1)", None, &env).unwrap(),
        Value::Int(2)
    );
}

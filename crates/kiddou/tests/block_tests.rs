//! Block behavior: closure capture, invocation, attribute stores, and the
//! per-call restart semantics.

use kiddou::{CollectStringPrint, Kiddou};
use pretty_assertions::assert_eq;

fn run(source: &str) -> String {
    let mut kiddou = Kiddou::new();
    let mut output = CollectStringPrint::new();
    kiddou.run(source, &mut output);
    assert!(!kiddou.has_error(), "static errors: {:?}", kiddou.errors());
    assert!(!kiddou.had_runtime_error(), "unexpected runtime error");
    output.into_output()
}

fn run_expecting_runtime_error(source: &str) -> String {
    let mut kiddou = Kiddou::new();
    let mut output = CollectStringPrint::new();
    kiddou.run(source, &mut output);
    assert!(!kiddou.has_error(), "static errors: {:?}", kiddou.errors());
    assert!(kiddou.had_runtime_error(), "expected a runtime error");
    output.into_output()
}

#[test]
fn calling_a_block_runs_its_body() {
    assert_eq!(run("con f = { con n = 10 -> n * 2 }\nrun print(f())"), "20\n");
}

#[test]
fn a_tail_only_block_is_a_thunk() {
    assert_eq!(run("con f = { 1 + 2 }\nrun print(f())"), "3\n");
}

#[test]
fn an_arrow_only_block_works() {
    assert_eq!(run("con f = { -> 7 }\nrun print(f())"), "7\n");
}

#[test]
fn a_block_without_a_tail_yields_undef() {
    assert_eq!(run("con f = { run x = 1 }\nrun print(f())"), "undef\n");
    assert_eq!(run("con f = {}\nrun print(f())"), "undef\n");
}

#[test]
fn call_arguments_are_ignored_by_blocks() {
    assert_eq!(run("con f = { -> 1 }\nrun print(f(42))"), "1\n");
}

#[test]
fn blocks_capture_enclosing_bindings() {
    assert_eq!(run("con a = 10\ncon f = { -> a + 1 }\nrun print(f())"), "11\n");
}

#[test]
fn capture_is_by_reference() {
    let source = "run a = 1\ncon f = { -> a }\nrun a := 5\nrun print(f())";
    assert_eq!(run(source), "5\n");
}

#[test]
fn blocks_mutate_captured_cells_in_place() {
    let source = "run count = 0\n\
                  con inc = { run count := count + 1 -> count }\n\
                  run print(inc())\n\
                  run print(inc())\n\
                  run print(count)";
    assert_eq!(run(source), "1\n2\n2\n");
}

#[test]
fn each_call_restarts_from_the_captured_state() {
    let source = "con g = { run k = 0\nrun k := k + 1 -> k }\n\
                  run print(g())\n\
                  run print(g())\n\
                  run print(g.k)";
    assert_eq!(run(source), "1\n1\n1\n");
}

#[test]
fn block_locals_do_not_leak_into_the_enclosing_scope() {
    let mut kiddou = Kiddou::new();
    let mut output = CollectStringPrint::new();
    kiddou.run("con f = { con hidden = 1 -> hidden }\nrun f()\nrun print(hidden)", &mut output);
    assert!(kiddou.has_error());
    assert_eq!(kiddou.errors()[0].message, "undefined variable: hidden.");
}

#[test]
fn attributes_read_the_final_bindings_of_the_last_call() {
    assert_eq!(
        run("con f = { con inner = 42 -> inner }\nrun f()\nrun print(f.inner)"),
        "42\n"
    );
}

#[test]
fn attribute_access_before_any_call_is_a_runtime_error() {
    run_expecting_runtime_error("con f = { con x = 1 -> x }\nrun print(f.x)");
}

#[test]
fn attributes_can_be_reassigned() {
    let source = "con f = { run v = 1 -> v }\nrun f()\nrun f.v := 9\nrun print(f.v)";
    assert_eq!(run(source), "9\n");
}

#[test]
fn unknown_attributes_cannot_be_created_at_runtime() {
    run_expecting_runtime_error("con f = { run v = 1 -> v }\nrun f()\nrun f.w := 9");
}

#[test]
fn con_bindings_stay_immutable_as_attributes() {
    run_expecting_runtime_error("con f = { con v = 1 -> v }\nrun f()\nrun f.v := 2");
}

#[test]
fn nested_blocks_capture_through_the_chain() {
    let source = "con x = 1\ncon outer = { con inner = { -> x + 1 } -> inner() }\nrun print(outer())";
    assert_eq!(run(source), "2\n");
}

#[test]
fn blocks_returned_from_blocks_keep_their_closure() {
    let source = "con make = { con base = 100 -> { -> base + 1 } }\n\
                  con add = make()\n\
                  run print(add())";
    assert_eq!(run(source), "101\n");
}

#[test]
fn this_refers_to_the_block_itself() {
    let source = "con b = { run me = this -> 0 }\nrun b()\nrun print(b.me == b)";
    assert_eq!(run(source), "true\n");
}

#[test]
fn this_is_not_an_attribute() {
    run_expecting_runtime_error("con b = { -> 0 }\nrun b()\nrun print(b.this)");
}

#[test]
fn this_attribute_reads_see_earlier_bindings() {
    let source = "con b = { con first = 2\ncon second = this.first * 3 -> second }\nrun print(b())";
    assert_eq!(run(source), "6\n");
}

#[test]
fn the_attribute_store_survives_a_failing_call() {
    // the call fails mid-body; bindings made before the failure are still
    // readable as attributes afterwards
    let mut kiddou = Kiddou::new();
    let mut output = CollectStringPrint::new();
    kiddou.run("con f = { con v = 7\nrun print(1 // 0) -> v }\nrun f()", &mut output);
    assert!(kiddou.had_runtime_error());
    kiddou.flush_errors();

    kiddou.run("run print(f.v)", &mut output);
    assert!(!kiddou.had_runtime_error());
    assert_eq!(output.output(), "7\n");
}

#[test]
fn pervasives_are_reachable_inside_blocks() {
    assert_eq!(run("con f = { -> print(7) }\nrun f()"), "7\n");
}

#[test]
fn blocks_stringify_opaquely() {
    assert_eq!(run("con f = { -> 1 }\nrun print(f)"), "{Block}\n");
}

#[test]
fn a_block_is_equal_only_to_itself() {
    let source = "con f = { -> 1 }\ncon g = { -> 1 }\nrun print(f == f)\nrun print(f == g)";
    assert_eq!(run(source), "true\nfalse\n");
}

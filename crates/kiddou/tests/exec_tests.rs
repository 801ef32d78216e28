//! End-to-end execution tests: source text in, printed output out.

use kiddou::{CollectStringPrint, Kiddou};
use pretty_assertions::assert_eq;

/// Runs a program that is expected to complete without errors and returns
/// everything it printed.
fn run(source: &str) -> String {
    let mut kiddou = Kiddou::new();
    let mut output = CollectStringPrint::new();
    kiddou.run(source, &mut output);
    assert!(!kiddou.has_error(), "static errors: {:?}", kiddou.errors());
    assert!(!kiddou.had_runtime_error(), "unexpected runtime error");
    output.into_output()
}

/// Runs a program that is expected to fail at runtime and returns whatever
/// it printed before the error.
fn run_expecting_runtime_error(source: &str) -> String {
    let mut kiddou = Kiddou::new();
    let mut output = CollectStringPrint::new();
    kiddou.run(source, &mut output);
    assert!(!kiddou.has_error(), "static errors: {:?}", kiddou.errors());
    assert!(kiddou.had_runtime_error(), "expected a runtime error");
    output.into_output()
}

// === Printing ===

#[test]
fn print_addition() {
    assert_eq!(run("run print(1 + 2)"), "3\n");
}

#[test]
fn print_joins_arguments_with_spaces() {
    assert_eq!(run("run print(1, 2.5, \"x\")"), "1 2.5 x\n");
}

#[test]
fn print_with_no_arguments_emits_a_newline() {
    assert_eq!(run("run print()"), "\n");
}

#[test]
fn print_returns_undef() {
    assert_eq!(run("run print(print(1))"), "1\nundef\n");
}

#[test]
fn print_stringifies_functions_and_modules() {
    assert_eq!(run("run print(print)"), "{Func: print}\n");
    assert_eq!(run("run print(this)"), "{Module}\n");
}

// === Arithmetic ===

#[test]
fn integer_arithmetic_stays_integer() {
    assert_eq!(run("run print(7 * 6 - 2)"), "40\n");
}

#[test]
fn integers_do_not_overflow() {
    assert_eq!(
        run("run print(123456789012345678901234567890 + 1)"),
        "123456789012345678901234567891\n"
    );
    assert_eq!(run("run print(2 ^ 64)"), "18446744073709551616\n");
}

#[test]
fn mixed_arithmetic_produces_floats() {
    assert_eq!(run("run print(1 + 2.5)"), "3.5\n");
    assert_eq!(run("run print(2 * 0.5)"), "1.0\n");
}

#[test]
fn slash_is_always_float_division() {
    assert_eq!(run("run print(7 / 2)"), "3.5\n");
    assert_eq!(run("run print(6 / 2)"), "3.0\n");
}

#[test]
fn division_by_zero_is_not_an_error() {
    assert_eq!(run("run print(1 / 0)"), "inf\n");
    assert_eq!(run("run print(-1 / 0)"), "-inf\n");
    assert_eq!(run("run print(0 / 0)"), "nan\n");
}

#[test]
fn floor_division_rounds_toward_negative_infinity() {
    assert_eq!(run("run print(7 // 2)"), "3\n");
    assert_eq!(run("run print(-7 // 2)"), "-4\n");
    assert_eq!(run("run print(7.5 // 2)"), "3\n");
}

#[test]
fn floor_division_by_zero_is_a_runtime_error() {
    run_expecting_runtime_error("run print(1 // 0)");
}

#[test]
fn floor_division_of_infinity_is_a_runtime_error() {
    run_expecting_runtime_error("run print(inf // 2)");
}

#[test]
fn modulus_follows_the_divisor_sign() {
    assert_eq!(run("run print(7 % 3)"), "1\n");
    assert_eq!(run("run print(-7 % 3)"), "2\n");
    assert_eq!(run("run print(-7.0 % 3.0)"), "2.0\n");
}

#[test]
fn integer_modulus_by_zero_is_a_runtime_error() {
    run_expecting_runtime_error("run print(1 % 0)");
}

#[test]
fn float_modulus_by_zero_follows_the_division_channels() {
    assert_eq!(run("run print(2.0 % 0.0)"), "inf\n");
    assert_eq!(run("run print(0.0 % 0.0)"), "nan\n");
}

#[test]
fn power_handles_every_numeric_combination() {
    assert_eq!(run("run print(2 ^ 10)"), "1024\n");
    assert_eq!(run("run print(2 ^ -1)"), "0.5\n");
    assert_eq!(run("run print(2 ^ 0.5)"), "1.4142135623730951\n");
    // a complex result is NaN, not an error
    assert_eq!(run("run print((-2.0) ^ 0.5)"), "nan\n");
    // unary minus binds the whole power expression
    assert_eq!(run("run print(-2.0 ^ 2.0)"), "-4.0\n");
}

#[test]
fn power_is_right_associative() {
    assert_eq!(run("run print(2 ^ 3 ^ 2)"), "512\n");
}

#[test]
fn string_concatenation() {
    assert_eq!(run("run print(\"ab\" + \"cd\")"), "abcd\n");
}

#[test]
fn adding_a_string_and_a_number_is_a_runtime_error() {
    run_expecting_runtime_error("run print(\"ab\" + 1)");
}

#[test]
fn unary_operators() {
    assert_eq!(run("run print(-3)"), "-3\n");
    assert_eq!(run("run print(-2.5)"), "-2.5\n");
    assert_eq!(run("run print(!true)"), "false\n");
    assert_eq!(run("run print(!false)"), "true\n");
}

#[test]
fn negating_a_bool_is_a_runtime_error() {
    run_expecting_runtime_error("run print(-true)");
}

// === Undef propagation ===

#[test]
fn undef_propagates_through_strict_operators() {
    assert_eq!(run("run print(undef + 1)"), "undef\n");
    assert_eq!(run("run print(1 - undef)"), "undef\n");
    assert_eq!(run("run print(undef * undef)"), "undef\n");
    assert_eq!(run("run print(undef // 2)"), "undef\n");
    assert_eq!(run("run print(undef < 1)"), "undef\n");
    assert_eq!(run("run print(undef == undef)"), "undef\n");
    assert_eq!(run("run print(undef != 3)"), "undef\n");
    assert_eq!(run("run print(-undef)"), "undef\n");
    assert_eq!(run("run print(!undef)"), "undef\n");
}

// === Comparisons and equality ===

#[test]
fn comparisons_on_numbers() {
    assert_eq!(run("run print(1 < 2)"), "true\n");
    assert_eq!(run("run print(2 <= 1)"), "false\n");
    assert_eq!(run("run print(2.5 > 2)"), "true\n");
    assert_eq!(run("run print(3 >= 3)"), "true\n");
}

#[test]
fn comparing_strings_is_a_runtime_error() {
    run_expecting_runtime_error("run print(\"a\" < \"b\")");
}

#[test]
fn equality_compares_by_value_within_a_kind() {
    assert_eq!(run("run print(1 == 1)"), "true\n");
    assert_eq!(run("run print(\"a\" == \"a\")"), "true\n");
    assert_eq!(run("run print(true != false)"), "true\n");
}

#[test]
fn equality_across_kinds_is_false() {
    assert_eq!(run("run print(1 == 1.0)"), "false\n");
    assert_eq!(run("run print(1 != 1.0)"), "true\n");
    assert_eq!(run("run print(0 == false)"), "false\n");
}

// === Logical, piecewise, and domain operators ===

#[test]
fn logical_operators_return_an_operand() {
    assert_eq!(run("run print(false && 1)"), "false\n");
    assert_eq!(run("run print(0 && 2)"), "2\n");
    assert_eq!(run("run print(undef && 2)"), "undef\n");
    assert_eq!(run("run print(2 || 3)"), "2\n");
    assert_eq!(run("run print(false || 3)"), "3\n");
    assert_eq!(run("run print(undef || 3)"), "3\n");
}

#[test]
fn logical_operators_short_circuit() {
    // the divide-by-zero arm is never evaluated
    assert_eq!(run("run print(false && (1 // 0))"), "false\n");
    assert_eq!(run("run print(1 || (1 // 0))"), "1\n");
}

#[test]
fn piecewise_picks_the_defined_arm() {
    assert_eq!(run("con x = undef\nrun print(x + 1 ; 9)"), "9\n");
    assert_eq!(run("run print(5 ; 9)"), "5\n");
    // short-circuit: the right arm is untouched when the left is defined
    assert_eq!(run("run print(5 ; (1 // 0))"), "5\n");
}

#[test]
fn domain_guards_with_the_right_side() {
    assert_eq!(run("con y = 5 ? (1 < 0)\nrun print(y)"), "undef\n");
    assert_eq!(run("con y = 5 ? (0 < 1)\nrun print(y)"), "5\n");
    // the guard is evaluated first; a false guard skips the left entirely
    assert_eq!(run("run print((1 // 0) ? false)"), "undef\n");
}

// === Bindings ===

#[test]
fn con_binds_and_run_shadows() {
    assert_eq!(run("con x = 1\nrun print(x)\nrun x = 2\nrun print(x)"), "1\n2\n");
}

#[test]
fn reassignment_updates_a_mutable_binding() {
    assert_eq!(run("run x = 1\nrun x := x + 41\nrun print(x)"), "42\n");
}

#[test]
fn reassigning_a_con_binding_is_a_runtime_error() {
    run_expecting_runtime_error("con n = 1\nrun n := 2");
}

#[test]
fn a_bare_run_discards_its_value() {
    assert_eq!(run("run 1 + 2\nrun print(3)"), "3\n");
}

#[test]
fn runtime_error_aborts_remaining_statements() {
    let output = run_expecting_runtime_error("run print(1)\nrun print(1 // 0)\nrun print(2)");
    assert_eq!(output, "1\n");
}

// === Lists ===

#[test]
fn sequences_evaluate_eagerly_into_lists() {
    assert_eq!(run("run print([1, 2 + 3, \"x\"])"), "[1, 5, x]\n");
    assert_eq!(run("run print([])"), "[]\n");
}

#[test]
fn list_elements_can_be_rewritten_in_place() {
    assert_eq!(run("con xs = [1, 2, 3]\nrun xs[1] := 99\nrun print(xs[1])"), "99\n");
}

#[test]
fn list_reads_out_of_range_yield_undef() {
    assert_eq!(run("con xs = [1, 2]\nrun print(xs[5])"), "undef\n");
    assert_eq!(run("con xs = [1, 2]\nrun print(xs[-1])"), "undef\n");
}

#[test]
fn list_writes_out_of_range_are_runtime_errors() {
    run_expecting_runtime_error("con xs = [1, 2]\nrun xs[5] := 0");
    run_expecting_runtime_error("con xs = [1, 2]\nrun xs[-1] := 0");
}

#[test]
fn list_index_must_be_an_int() {
    run_expecting_runtime_error("con xs = [1]\nrun print(xs[0.5])");
}

#[test]
fn indexing_a_non_container_is_a_runtime_error() {
    run_expecting_runtime_error("run print(1[0])");
}

#[test]
fn lists_alias() {
    assert_eq!(
        run("con xs = [1, 2]\ncon ys = xs\nrun ys[0] := 9\nrun print(xs[0])"),
        "9\n"
    );
}

// === Pervasives ===

#[test]
fn inf_and_nan_are_bound() {
    assert_eq!(run("run print(inf)"), "inf\n");
    assert_eq!(run("run print(-inf)"), "-inf\n");
    assert_eq!(run("run print(nan)"), "nan\n");
}

#[test]
fn pervasives_can_be_shadowed() {
    assert_eq!(run("run inf = 1\nrun print(inf)"), "1\n");
}

#[test]
fn reassigning_a_pervasive_is_a_runtime_error() {
    run_expecting_runtime_error("run print := 1");
}

// === The top-level module ===

#[test]
fn this_exposes_top_level_bindings() {
    assert_eq!(run("con x = 5\nrun print(this.x)"), "5\n");
}

#[test]
fn this_attributes_write_through() {
    assert_eq!(run("run y = 1\nrun this.y := 7\nrun print(y)"), "7\n");
}

#[test]
fn this_does_not_expose_pervasives_as_attributes() {
    run_expecting_runtime_error("run print(this.print)");
}

#[test]
fn calling_a_non_function_is_a_runtime_error() {
    run_expecting_runtime_error("run this()");
}

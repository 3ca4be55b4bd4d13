use std::{collections::HashMap, io, sync::Arc};

use indoc::indoc;
use pretty_assertions::assert_eq;
use prolang::{
    compilation::{Compilation, EvaluationResult},
    diagnostic::Diagnostic,
    evaluator::RuntimeError,
    symbols::{Type, Variable},
    syntax_tree::SyntaxTree,
    value::Value,
};

fn script(text: &str) -> Compilation {
    Compilation::new_script(None, vec![SyntaxTree::parse_text(text)])
}

fn messages(diagnostics: &[Diagnostic]) -> Vec<String> {
    diagnostics.iter().map(ToString::to_string).collect()
}

/// Evaluates the compilation, returning its result and everything it printed.
fn evaluate_in(
    compilation: &Compilation,
    globals: &mut HashMap<Variable, Value>,
    input: &str,
) -> Result<(EvaluationResult, String), RuntimeError> {
    let mut output = Vec::new();
    let result = compilation.evaluate_with(globals, input.as_bytes(), &mut output)?;
    Ok((result, String::from_utf8(output).unwrap()))
}

/// Runs a script that must compile, returning its value and output.
#[track_caller]
fn run(text: &str) -> (Option<Value>, String) {
    let (result, output) = evaluate_in(&script(text), &mut HashMap::new(), "").unwrap();
    assert_eq!(messages(&result.diagnostics), Vec::<String>::new());
    (result.value, output)
}

#[track_caller]
fn output_of(text: &str) -> String {
    run(text).1
}

#[track_caller]
fn errors_of(compilation: &Compilation) -> Vec<String> {
    let (result, output) = evaluate_in(compilation, &mut HashMap::new(), "").unwrap();
    assert_eq!(result.value, None);
    assert_eq!(output, "");
    messages(&result.diagnostics)
}

#[track_caller]
fn runtime_error_of(text: &str) -> RuntimeError {
    match evaluate_in(&script(text), &mut HashMap::new(), "") {
        Ok((result, _)) => panic!("expected a runtime error, got {:?}", result),
        Err(error) => error,
    }
}

#[test]
fn test_arithmetic_declaration() {
    let compilation = script("let a = 1 + 2");
    let (result, _) = evaluate_in(&compilation, &mut HashMap::new(), "").unwrap();
    assert_eq!(result.value, Some(Value::Int(3)));
    let variables = &compilation.global_scope().variables;
    assert_eq!(variables.len(), 1);
    assert_eq!(variables[0].ty, Type::Int);
}

#[test]
fn test_if_else_output() {
    let output = output_of(r#"if (1 < 2) { print("yes") } else { print("no") }"#);
    assert_eq!(output, "yes\n");
}

#[test]
fn test_for_upper_bound_is_inclusive() {
    let output = output_of("for (i = 1 to 3) { print(string(i)) }");
    assert_eq!(output, "1\n2\n3\n");
}

#[test]
fn test_ill_typed_function_is_not_evaluated() {
    let compilation = script(r#"function f(): int { return 1 + "x" }"#);
    assert_eq!(
        errors_of(&compilation),
        ["binary operator '+' is not defined for types 'int' and 'string'"]
    );
}

#[test]
fn test_infinite_loop_with_break_terminates() {
    assert_eq!(run("while (true) { break }"), (None, String::new()));
    assert_eq!(run("let a = 5 while (true) { break }").0, Some(Value::Int(5)));
}

#[test]
fn test_redeclaration_stops_evaluation() {
    let compilation = script(r#"let a = 1; let a = 2; print("unreachable")"#);
    assert_eq!(errors_of(&compilation), ["variable 'a' is already declared"]);
}

#[test]
fn test_loop_shapes() {
    let cases = [
        ("let n = 0 while (false) { } n", Value::Int(0)),
        ("let n = 0 for (i = 5 to 1) n += 1 n", Value::Int(0)),
        ("let n = 0 for (i = 1 to 1) n += 1 n", Value::Int(1)),
        ("let n = 0 for (i = 1 to 10) n += i n", Value::Int(55)),
        ("let n = 0 while (n < 7) n += 2 n", Value::Int(8)),
    ];
    for (text, expected) in cases {
        assert_eq!(run(text).0, Some(expected), "{text}");
    }
}

#[test]
fn test_break_and_continue() {
    let output = output_of("for (i = 1 to 10) { if (i == 4) break print(string(i)) }");
    assert_eq!(output, "1\n2\n3\n");

    let output = output_of("for (i = 1 to 5) { if (i % 2 == 0) continue print(string(i)) }");
    assert_eq!(output, "1\n3\n5\n");

    let output = output_of(indoc! {"
        let i = 0
        while (i < 5) {
            i += 1
            if (i == 3) continue
            print(string(i))
        }
    "});
    assert_eq!(output, "1\n2\n4\n5\n");
}

#[test]
fn test_nested_loops() {
    let output = output_of(indoc! {"
        for (i = 1 to 3)
            for (j = 1 to 3) {
                if (j > i) break
                print(string(i) + string(j))
            }
    "});
    assert_eq!(output, "11\n21\n22\n31\n32\n33\n");
}

#[test]
fn test_elif_chain() {
    let output = output_of(indoc! {r#"
        function classify(n: int): string {
            if (n < 0) return "negative"
            elif (n == 0) return "zero"
            elif (n < 10) return "small"
            else return "large"
        }
        print(classify(-5))
        print(classify(0))
        print(classify(7))
        print(classify(100))
    "#});
    assert_eq!(output, "negative\nzero\nsmall\nlarge\n");
}

#[test]
fn test_shadowing_keeps_outer_binding() {
    let (value, output) = run(indoc! {r#"
        let x = 1
        {
            let x = "inner"
            print(x)
        }
        x
    "#});
    assert_eq!(output, "inner\n");
    assert_eq!(value, Some(Value::Int(1)));
}

#[test]
fn test_recursion_and_locals() {
    let (value, _) = run(indoc! {"
        function fib(n: int): int {
            if (n < 2) return n
            return fib(n - 1) + fib(n - 2)
        }
        fib(20)
    "});
    assert_eq!(value, Some(Value::Int(6765)));
}

#[test]
fn test_functions_share_globals() {
    let (value, _) = run(indoc! {"
        let counter = 0
        function bump() { counter += 1 }
        bump()
        bump()
        counter
    "});
    assert_eq!(value, Some(Value::Int(2)));
}

#[test]
fn test_script_return_sets_value() {
    assert_eq!(run("return 42 let a = 1").0, Some(Value::Int(42)));
}

#[test]
fn test_operators() {
    let cases = [
        ("7 % 3", Value::Int(1)),
        ("6 & 3", Value::Int(2)),
        ("6 | 3", Value::Int(7)),
        ("6 ^ 3", Value::Int(5)),
        ("~5", Value::Int(-6)),
        ("-(2 + 3) * +4", Value::Int(-20)),
        ("true ^ true", Value::Bool(false)),
        ("false || !false && true", Value::Bool(true)),
        (r#""a" + "b" == "ab""#, Value::Bool(true)),
        ("1 + 2 * 3 == 7 != false", Value::Bool(true)),
        ("let a = 1 a += 2 a *= 3 a -= 1 a /= 2 a", Value::Int(4)),
        ("let b = true b ^= true b", Value::Bool(false)),
    ];
    for (text, expected) in cases {
        assert_eq!(run(text).0, Some(expected), "{text}");
    }
}

#[test]
fn test_conversions() {
    let cases = [
        (r#"int("12") + 1"#, Value::Int(13)),
        (r#"bool("true")"#, Value::Bool(true)),
        ("string(true) + string(-3)", Value::from("true-3")),
        ("let a: any = 5 int(a) * 2", Value::Int(10)),
        (r#"let a: any = "x" string(a)"#, Value::from("x")),
    ];
    for (text, expected) in cases {
        assert_eq!(run(text).0, Some(expected), "{text}");
    }

    let error = runtime_error_of(r#"int("twelve")"#);
    assert_eq!(error.to_string(), "cannot convert 'twelve' to type 'int'");
    let error = runtime_error_of(r#"let a: any = "x" int(a)"#);
    assert!(matches!(error, RuntimeError::InvalidConversion { ty: Type::Int, .. }));
}

#[test]
fn test_division_by_zero_is_a_runtime_error() {
    let error = runtime_error_of("let a = 0 print(string(1 / a))");
    assert!(matches!(error, RuntimeError::DivisionByZero));
    assert!(matches!(runtime_error_of("5 % 0"), RuntimeError::DivisionByZero));
}

#[test]
fn test_uninitialized_global() {
    let error = runtime_error_of(indoc! {"
        function f(): int { return a }
        let b = f()
        let a = 1
    "});
    assert_eq!(error.to_string(), "variable 'a' is used before it is assigned");
}

#[test]
fn test_builtins() {
    let compilation = script(r#"print("hello, " + readInput()) readInput()"#);
    let (result, output) = evaluate_in(&compilation, &mut HashMap::new(), "Ada\r\nLovelace\n").unwrap();
    assert_eq!(output, "hello, Ada\n");
    assert_eq!(result.value, Some(Value::from("Lovelace")));

    assert_eq!(run("readInput()").0, Some(Value::from("")));
    assert_eq!(run("min(3, -2) + max(3, -2)").0, Some(Value::Int(1)));
    assert_eq!(run("let r = random(10) r >= 0 && r < 10").0, Some(Value::Bool(true)));
    assert_eq!(run("random(0)").0, Some(Value::Int(0)));
    assert!(matches!(
        runtime_error_of("random(-1)"),
        RuntimeError::InvalidArgument { function: "random", value: -1 }
    ));
}

#[test]
fn test_file_builtins() {
    let path = std::env::temp_dir().join(format!("prolang-test-{}.txt", std::process::id()));
    let path_literal = Value::from(path.to_string_lossy().into_owned()).to_literal();
    let text = format!(
        r#"
        let path = {path_literal}
        let before = fileExists(path)
        writeFile(path, "some ""data""")
        string(before) + " " + string(fileExists(path)) + " " + readFile(path)
        "#
    );
    let (value, _) = run(&text);
    _ = std::fs::remove_file(&path);
    assert_eq!(value, Some(Value::from(r#"false true some "data""#)));

    let error = runtime_error_of(r#"readFile("/this/path/does/not/exist")"#);
    assert!(matches!(error, RuntimeError::Io(_)));
}

#[test]
fn test_repl_chaining() {
    let mut globals = HashMap::new();
    let first = Arc::new(Compilation::new_script(
        None,
        vec![SyntaxTree::parse_text(
            "let x = 10 function double(n: int): int { return n * 2 }",
        )],
    ));
    let (result, _) = evaluate_in(&first, &mut globals, "").unwrap();
    assert_eq!(result.value, Some(Value::Int(10)));

    let second = Arc::new(first.continue_with(SyntaxTree::parse_text("x = double(x) + 1")));
    let (result, _) = evaluate_in(&second, &mut globals, "").unwrap();
    assert_eq!(result.value, Some(Value::Int(21)));

    let third = Arc::new(second.continue_with(SyntaxTree::parse_text("x")));
    let (result, _) = evaluate_in(&third, &mut globals, "").unwrap();
    assert_eq!(result.value, Some(Value::Int(21)));

    let redeclared = third.continue_with(SyntaxTree::parse_text("let x = 5"));
    let (result, _) = evaluate_in(&redeclared, &mut globals, "").unwrap();
    assert_eq!(messages(&result.diagnostics), ["variable 'x' is already declared"]);

    let redefined = third.continue_with(SyntaxTree::parse_text("function double() { }"));
    let (result, _) = evaluate_in(&redefined, &mut globals, "").unwrap();
    assert_eq!(messages(&result.diagnostics), ["'double' is already declared"]);
}

#[test]
fn test_main_function() {
    let compilation = Compilation::new(vec![SyntaxTree::parse_text(indoc! {r#"
        function main() {
            print(greet("world"))
        }
        function greet(name: string): string {
            return "hello " + name
        }
    "#})]);
    let (result, output) = evaluate_in(&compilation, &mut HashMap::new(), "").unwrap();
    assert_eq!(messages(&result.diagnostics), Vec::<String>::new());
    assert_eq!(output, "hello world\n");
}

#[test]
fn test_main_mode_rules() {
    let main = |text: &str| Compilation::new(vec![SyntaxTree::parse_text(text)]);

    assert_eq!(
        errors_of(&main(r#"print("x") function main() { }"#)),
        ["cannot declare main function when global statements are used"]
    );
    assert_eq!(
        errors_of(&main("function main(a: int): int { return a }")),
        ["main must not take arguments and not return anything"]
    );
    assert_eq!(
        errors_of(&main("1 + 2")),
        ["only assignment and call expressions can be used as a statement"]
    );
    assert_eq!(
        errors_of(&main("return")),
        ["the 'return' keyword can only be used inside of functions"]
    );

    let two_files = Compilation::new(vec![
        SyntaxTree::parse_text("let a = 1"),
        SyntaxTree::parse_text("function f() { }\nlet b = 2"),
    ]);
    let (result, _) = evaluate_in(&two_files, &mut HashMap::new(), "").unwrap();
    let locations: Vec<_> = result
        .diagnostics
        .iter()
        .map(|d| format!("{}: {d}", d.location().unwrap()))
        .collect();
    assert_eq!(
        locations,
        [
            "1:1: at most one file can have global statements",
            "2:1: at most one file can have global statements",
        ]
    );
}

#[test]
fn test_function_body_diagnostics() {
    let cases = [
        (
            "function f(a: bool): int { if (a) return 1 }",
            "not all code paths return a value",
        ),
        (
            "function g() { return 1 }",
            "since the function 'g' does not return a value the 'return' keyword cannot be followed by an expression",
        ),
        (
            "function h(): int { return }",
            "an expression of type 'int' expected",
        ),
        (
            "function k(a: int, a: int) { }",
            "a parameter with the name 'a' already exists",
        ),
        (
            "function m(a: int) { a = 2 }",
            "variable 'a' is read-only and cannot be assigned to",
        ),
        ("function n() { 1 }", "only assignment and call expressions can be used as a statement"),
        ("function p(): int { while (true) { } }", ""),
    ];
    for (text, expected) in cases {
        let expected: Vec<&str> = [expected].into_iter().filter(|e| !e.is_empty()).collect();
        assert_eq!(errors_of(&script(text)), expected, "{text}");
    }
}

#[test]
fn test_syntax_errors_are_reported_with_locations() {
    let compilation = script("let a = (1 +\nlet b = 2");
    let (result, _) = evaluate_in(&compilation, &mut HashMap::new(), "").unwrap();
    let rendered: Vec<_> = result
        .diagnostics
        .iter()
        .map(|d| format!("{}: {d:#}", d.location().unwrap()))
        .collect();
    assert_eq!(
        rendered,
        [
            "2:1: 13..16: unexpected token <Let>, expected <Identifier>",
            "2:1: 13..16: unexpected token <Let>, expected <RParen>",
        ]
    );
}

#[test]
fn test_demo_program() {
    let tree = SyntaxTree::load("demos/big.prl").unwrap();
    let compilation = Compilation::new(vec![tree]);
    let (result, output) = evaluate_in(&compilation, &mut HashMap::new(), "").unwrap();
    assert_eq!(messages(&result.diagnostics), Vec::<String>::new());
    assert_eq!(output, "primes: 36, fibs: 1596, collatz: 231/127, bits: 36 === true\n");
}

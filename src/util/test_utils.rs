use std::sync::Arc;

use crate::{
    compilation::Compilation,
    diagnostic::Diagnostic,
    parser,
    syntax_tree::SyntaxTree,
    text::SourceText,
    util::fmt::{bound, tree},
};

pub fn format_errors(errors: &[Diagnostic]) -> Vec<String> {
    errors.iter().map(|e| format!("{e:#}")).collect()
}

/// Each variant contains the input.
pub enum Test {
    ParserUnit(&'static str),
    ParserExpr(&'static str),
    BinderUnit(&'static str),
    LowererUnit(&'static str),
}

pub enum Assertion {
    TreeOk(&'static str),
    TreeError(&'static str),
    ExpectedErrors(&'static [&'static str]),
}

#[track_caller]
pub fn run_pipeline(test: Test) -> (String, Vec<String>) {
    match test {
        Test::ParserUnit(input) => {
            let source = Arc::new(SourceText::new(input));
            let parsed = parser::parse_unit(&source);
            let tree = tree::print_unit_string(&parsed.node);
            (tree, format_errors(&parsed.diagnostics.into_vec()))
        }
        Test::ParserExpr(input) => {
            let source = Arc::new(SourceText::new(input));
            let parsed = parser::parse_expr(&source);
            let tree = tree::print_expr_string(&parsed.node);
            (tree, format_errors(&parsed.diagnostics.into_vec()))
        }
        Test::BinderUnit(input) => {
            let compilation = script(input);
            let tree = bound::print_stmts_string(&compilation.global_scope().statements);
            (tree, format_errors(&compilation.diagnostics()))
        }
        Test::LowererUnit(input) => {
            let compilation = script(input);
            let program = compilation.program();
            let body = program
                .entry_point()
                .and_then(|entry| program.body(entry))
                .unwrap_or_default();
            let tree = bound::print_body_string(body);
            (tree, format_errors(&compilation.diagnostics()))
        }
    }
}

fn script(input: &str) -> Compilation {
    Compilation::new_script(None, vec![SyntaxTree::parse_text(input)])
}

#[track_caller]
pub fn run_assertion(
    assertion: Assertion,
    formatted_actual_tree: &str,
    formatted_actual_errors: &[String],
) {
    match assertion {
        Assertion::TreeOk(expected_tree) => {
            let expected_errors: &[&str] = &[];
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors);
            ::pretty_assertions::assert_eq!(formatted_actual_tree.trim(), expected_tree.trim());
        }
        Assertion::TreeError(expected_tree) => {
            ::pretty_assertions::assert_eq!(formatted_actual_tree.trim(), expected_tree.trim())
        }
        Assertion::ExpectedErrors(expected_errors) => {
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors)
        }
    }
}

macro_rules! tree_tests {
    (
        use $test_kind:ident;

        $(
            fn $test_name:ident() {
                let $source_kind:ident = $source:expr;
                $($assertions_tt:tt)*
            }
        )*
    ) => {
        $(
            #[test]
            fn $test_name() {
                let test: crate::util::test_utils::Test =
                    tree_tests!(@@get_test($test_kind, $source_kind), ::indoc::indoc! { $source });
                let (formatted_actual_tree, formatted_actual_errors) =
                    crate::util::test_utils::run_pipeline(test);
                let ctx = (&formatted_actual_tree, &formatted_actual_errors);
                tree_tests!(@@expand_assertions, ctx, [$($assertions_tt)*]);
            }
        )*
    };

    (@@expand_assertions, $ctx:expr, []) => {};
    (@@expand_assertions, $ctx:expr, [
        let $assertion:ident = $assertion_expected:expr;
        $($rest_assertions_tt:tt)*
    ]) => {
        crate::util::test_utils::run_assertion(
            tree_tests!(@@assertion, $assertion, $assertion_expected),
            $ctx.0,
            $ctx.1,
        );
        tree_tests!(@@expand_assertions, $ctx, [$($rest_assertions_tt)*]);
    };

    (@@assertion, tree_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeOk(::indoc::indoc! { $expected })
    };
    (@@assertion, tree_error, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeError(::indoc::indoc! { $expected })
    };
    (@@assertion, expected_errors, $expected:expr) => {
        crate::util::test_utils::Assertion::ExpectedErrors($expected)
    };

    (@@get_test(parser, unit), $source:expr) => {
        crate::util::test_utils::Test::ParserUnit($source)
    };
    (@@get_test(parser, expr), $source:expr) => {
        crate::util::test_utils::Test::ParserExpr($source)
    };
    (@@get_test(binder, unit), $source:expr) => {
        crate::util::test_utils::Test::BinderUnit($source)
    };
    (@@get_test(lowerer, unit), $source:expr) => {
        crate::util::test_utils::Test::LowererUnit($source)
    };
}
pub(crate) use tree_tests;

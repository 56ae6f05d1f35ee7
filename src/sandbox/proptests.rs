//! Property-based tests for the snippet language.

use super::check::DEFAULT_DENYLIST;
use super::parser::parse;
use super::{ExecutionResult, Executor};
use proptest::prelude::*;

proptest! {
    /// The parser must reject or accept, never panic, whatever bytes the
    /// model hands it.
    #[test]
    fn parse_never_panics(input in "\\PC*") {
        let _ = parse(&input);
    }

    /// Executing arbitrary single-line input never panics either; every
    /// failure is an `Error` result.
    #[test]
    fn execute_never_panics(input in "[ -~]{0,80}") {
        let mut executor = Executor::with_default_denylist();
        let _ = executor.execute(&input);
    }

    /// Integer addition matches ordinary arithmetic.
    #[test]
    fn addition_matches_reference(a in -10_000i64..10_000, b in -10_000i64..10_000) {
        let mut executor = Executor::with_default_denylist();
        let result = executor.execute(&format!("{a} + {b}"));
        prop_assert_eq!(result, ExecutionResult::Text((a + b).to_string()));
    }

    /// Every deny-listed name is rejected no matter the argument text.
    #[test]
    fn denylisted_calls_always_rejected(
        index in 0..DEFAULT_DENYLIST.len(),
        arg in "[a-z0-9 ]{0,20}",
    ) {
        let name = DEFAULT_DENYLIST[index];
        let mut executor = Executor::with_default_denylist();
        let result = executor.execute(&format!("{name}('{arg}')"));
        prop_assert!(matches!(result, ExecutionResult::Error(_)));
    }

    /// Assignments round-trip through the scratch scope.
    #[test]
    fn assignment_round_trips(value in -1_000_000i64..1_000_000) {
        let mut executor = Executor::with_default_denylist();
        executor.execute(&format!("v = {value}"));
        let result = executor.execute("v");
        prop_assert_eq!(result, ExecutionResult::Text(value.to_string()));
    }
}

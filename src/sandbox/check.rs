//! Pre-execution safety check for snippets.
//!
//! A syntactic filter over the parsed tree: any call expression whose
//! target — a bare name or an attribute — matches the deny list is
//! rejected before anything runs. It inspects call targets only, not
//! argument values or aliasing, and is NOT a full security boundary;
//! the sandbox's restricted bindings are the second line of defense.

use super::ast::{CallTarget, Expr, Program, Stmt};
use super::SandboxError;
use std::collections::HashSet;

/// Call-target names rejected by default.
pub const DEFAULT_DENYLIST: &[&str] = &["open", "file", "execfile", "eval", "exec", "__import__"];

/// Walk the whole program and reject deny-listed call targets.
pub fn check(program: &Program, denylist: &HashSet<String>) -> Result<(), SandboxError> {
    for stmt in &program.stmts {
        match stmt {
            Stmt::Assign { value, .. } => check_expr(value, denylist)?,
            Stmt::Expr(expr) => check_expr(expr, denylist)?,
        }
    }
    Ok(())
}

fn check_expr(expr: &Expr, denylist: &HashSet<String>) -> Result<(), SandboxError> {
    match expr {
        Expr::Number(_) | Expr::Str(_) | Expr::Ident(_) => Ok(()),
        Expr::List(items) => {
            for item in items {
                check_expr(item, denylist)?;
            }
            Ok(())
        }
        Expr::Unary { operand, .. } => check_expr(operand, denylist),
        Expr::Binary { lhs, rhs, .. } => {
            check_expr(lhs, denylist)?;
            check_expr(rhs, denylist)
        }
        Expr::Attr { object, .. } => check_expr(object, denylist),
        Expr::Call { target, args } => {
            match target {
                CallTarget::Name(name) => {
                    if denylist.contains(name) {
                        return Err(denied(name));
                    }
                }
                CallTarget::Attr { object, name } => {
                    if denylist.contains(name) {
                        return Err(denied(name));
                    }
                    check_expr(object, denylist)?;
                }
            }
            for arg in args {
                check_expr(arg, denylist)?;
            }
            Ok(())
        }
    }
}

fn denied(name: &str) -> SandboxError {
    SandboxError::Disallowed(format!(
        "call to {name:?} is not allowed for security reasons"
    ))
}

#[cfg(test)]
mod tests {
    use super::super::parser::parse;
    use super::*;

    fn default_denylist() -> HashSet<String> {
        DEFAULT_DENYLIST.iter().map(|s| (*s).to_string()).collect()
    }

    fn run_check(source: &str) -> Result<(), SandboxError> {
        check(&parse(source).unwrap(), &default_denylist())
    }

    #[test]
    fn test_plain_arithmetic_allowed() {
        assert!(run_check("2 + 2").is_ok());
    }

    #[test]
    fn test_open_blocked() {
        let err = run_check("open('secrets.txt')").unwrap_err();
        assert!(err.to_string().contains("not allowed"));
    }

    #[test]
    fn test_every_denylisted_name_blocked() {
        for name in DEFAULT_DENYLIST {
            let source = format!("{name}('x')");
            assert!(run_check(&source).is_err(), "{name} should be blocked");
        }
    }

    #[test]
    fn test_attribute_call_blocked() {
        let err = run_check("fs.open('secrets.txt')").unwrap_err();
        assert!(err.to_string().contains("open"));
    }

    #[test]
    fn test_nested_in_expression_blocked() {
        assert!(run_check("1 + len(open('f'))").is_err());
    }

    #[test]
    fn test_nested_in_assignment_blocked() {
        assert!(run_check("x = eval('1')").is_err());
    }

    #[test]
    fn test_nested_in_list_blocked() {
        assert!(run_check("[1, exec('x'), 3]").is_err());
    }

    #[test]
    fn test_nested_in_argument_blocked() {
        assert!(run_check("abs(__import__('os'))").is_err());
    }

    #[test]
    fn test_chained_receiver_blocked() {
        // Deny-listed name appears on the receiver side of another call.
        assert!(run_check("open('f').read()").is_err());
    }

    #[test]
    fn test_attribute_read_of_denied_name_allowed() {
        // Only *calls* are filtered; a bare attribute read is not a call.
        assert!(run_check("x = io.open_mode").is_ok());
    }

    #[test]
    fn test_known_gap_unlisted_attribute_passes() {
        // `system` is not on the deny list, so the syntactic filter lets it
        // through; it fails at evaluation because `os` is unbound.
        assert!(run_check("os.system('ls')").is_ok());
    }

    #[test]
    fn test_custom_denylist() {
        let denylist: HashSet<String> = ["panic".to_string()].into_iter().collect();
        let program = parse("panic('now')").unwrap();
        assert!(check(&program, &denylist).is_err());
        // The default names are no longer filtered with a custom list.
        let program = parse("open('f')").unwrap();
        assert!(check(&program, &denylist).is_ok());
    }
}

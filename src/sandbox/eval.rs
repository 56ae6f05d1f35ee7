//! Tree-walking evaluator for the snippet language.
//!
//! Evaluation happens against the fixed namespace bindings (`math`, `b64`,
//! `plot`), a handful of global builtins, and a mutable scratch scope. The
//! value of every bare expression statement is stored in the `_` slot; an
//! assignment updates its target only.

use super::ast::{BinaryOp, CallTarget, Expr, Program, Stmt, UnaryOp};
use super::plot::{Figure, SeriesKind};
use super::SandboxError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::collections::HashMap;
use std::fmt;

/// Upper bound on `range(…)` output, so a one-liner cannot exhaust memory.
const MAX_RANGE_LEN: usize = 100_000;

/// Namespace names that cannot be shadowed by assignment.
const RESERVED: &[&str] = &["math", "b64", "plot"];

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Num(f64),
    Str(String),
    List(Vec<Value>),
    /// Result of side-effecting calls like `plot.line(…)`.
    None,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(n) => write!(f, "{}", format_number(*n)),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match item {
                        Value::Str(s) => write!(f, "'{s}'")?,
                        other => write!(f, "{other}")?,
                    }
                }
                write!(f, "]")
            }
            Value::None => Ok(()),
        }
    }
}

/// Integral floats print without a trailing `.0` so `2+2` reads as `4`.
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Mutable scratch bindings, private to one executor.
#[derive(Debug, Default)]
pub struct Scope {
    vars: HashMap<String, Value>,
}

impl Scope {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    /// The `_` slot: value of the most recent expression statement.
    pub fn last_value(&self) -> Option<&Value> {
        self.vars.get("_")
    }
}

/// Run every statement of a checked program.
pub fn eval_program(
    program: &Program,
    scope: &mut Scope,
    figure: &mut Figure,
) -> Result<(), SandboxError> {
    for stmt in &program.stmts {
        match stmt {
            Stmt::Assign { name, value } => {
                if RESERVED.contains(&name.as_str()) {
                    return Err(runtime(format!("cannot assign to reserved name {name:?}")));
                }
                let value = eval_expr(value, scope, figure)?;
                scope.set(name.clone(), value);
            }
            Stmt::Expr(expr) => {
                let value = eval_expr(expr, scope, figure)?;
                scope.set("_", value);
            }
        }
    }
    Ok(())
}

fn eval_expr(expr: &Expr, scope: &mut Scope, figure: &mut Figure) -> Result<Value, SandboxError> {
    match expr {
        Expr::Number(n) => Ok(Value::Num(*n)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Ident(name) => scope
            .get(name)
            .cloned()
            .ok_or_else(|| runtime(format!("name {name:?} is not defined"))),
        Expr::List(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval_expr(item, scope, figure)?);
            }
            Ok(Value::List(values))
        }
        Expr::Unary { op, operand } => {
            let value = eval_expr(operand, scope, figure)?;
            match op {
                UnaryOp::Neg => Ok(Value::Num(-as_num(&value, "unary minus")?)),
            }
        }
        Expr::Binary { op, lhs, rhs } => {
            let lhs = eval_expr(lhs, scope, figure)?;
            let rhs = eval_expr(rhs, scope, figure)?;
            eval_binary(*op, lhs, rhs)
        }
        Expr::Attr { object, name } => match namespace_of(object) {
            Some("math") => math_constant(name),
            Some(ns) => Err(runtime(format!("{ns} has no attribute {name:?}"))),
            None => {
                // Evaluate the receiver so "name not defined" surfaces first.
                eval_expr(object, scope, figure)?;
                Err(runtime(format!("values have no attribute {name:?}")))
            }
        },
        Expr::Call { target, args } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_expr(arg, scope, figure)?);
            }
            match target {
                CallTarget::Name(name) => call_builtin(name, &values),
                CallTarget::Attr { object, name } => match namespace_of(object) {
                    Some("math") => call_math(name, &values),
                    Some("b64") => call_b64(name, &values),
                    Some("plot") => call_plot(name, &values, figure),
                    Some(ns) => Err(runtime(format!("{ns} has no function {name:?}"))),
                    None => {
                        eval_expr(object, scope, figure)?;
                        Err(runtime(format!("values have no method {name:?}")))
                    }
                },
            }
        }
    }
}

/// Reserved namespace name, if the expression is a bare reference to one.
fn namespace_of(object: &Expr) -> Option<&str> {
    match object {
        Expr::Ident(name) if RESERVED.contains(&name.as_str()) => Some(name.as_str()),
        _ => None,
    }
}

fn eval_binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, SandboxError> {
    if op == BinaryOp::Add {
        match (&lhs, &rhs) {
            (Value::Str(a), Value::Str(b)) => return Ok(Value::Str(format!("{a}{b}"))),
            (Value::List(a), Value::List(b)) => {
                let mut joined = a.clone();
                joined.extend(b.iter().cloned());
                return Ok(Value::List(joined));
            }
            _ => {}
        }
    }
    let a = as_num(&lhs, op.symbol())?;
    let b = as_num(&rhs, op.symbol())?;
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(runtime("division by zero"));
            }
            a / b
        }
        BinaryOp::Rem => {
            if b == 0.0 {
                return Err(runtime("modulo by zero"));
            }
            a % b
        }
        BinaryOp::Pow => a.powf(b),
    };
    Ok(Value::Num(result))
}

// ==================== Global builtins ====================

fn call_builtin(name: &str, args: &[Value]) -> Result<Value, SandboxError> {
    match name {
        "abs" => Ok(Value::Num(one_num(name, args)?.abs())),
        "min" => fold_extremum(name, args, f64::min),
        "max" => fold_extremum(name, args, f64::max),
        "len" => match args {
            [Value::Str(s)] => Ok(Value::Num(s.chars().count() as f64)),
            [Value::List(items)] => Ok(Value::Num(items.len() as f64)),
            _ => Err(runtime("len() expects one string or list")),
        },
        "str" => match args {
            [value] => Ok(Value::Str(value.to_string())),
            _ => Err(runtime("str() expects one argument")),
        },
        "sum" => match args {
            [Value::List(items)] => {
                let mut total = 0.0;
                for item in items {
                    total += as_num(item, "sum")?;
                }
                Ok(Value::Num(total))
            }
            _ => Err(runtime("sum() expects one list of numbers")),
        },
        "range" => call_range(args),
        other => Err(runtime(format!("unknown function {other:?}"))),
    }
}

fn fold_extremum(
    name: &str,
    args: &[Value],
    pick: fn(f64, f64) -> f64,
) -> Result<Value, SandboxError> {
    let nums: Vec<f64> = match args {
        [Value::List(items)] => items
            .iter()
            .map(|v| as_num(v, name))
            .collect::<Result<_, _>>()?,
        _ if args.len() >= 2 => args
            .iter()
            .map(|v| as_num(v, name))
            .collect::<Result<_, _>>()?,
        _ => return Err(runtime(format!("{name}() expects a list or two+ numbers"))),
    };
    let mut iter = nums.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| runtime(format!("{name}() of empty list")))?;
    Ok(Value::Num(iter.fold(first, pick)))
}

fn call_range(args: &[Value]) -> Result<Value, SandboxError> {
    let ints: Vec<i64> = args
        .iter()
        .map(|v| as_num(v, "range").map(|n| n as i64))
        .collect::<Result<_, _>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(runtime("range() expects one to three numbers")),
    };
    if step == 0 {
        return Err(runtime("range() step must not be zero"));
    }
    let mut items = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        if items.len() >= MAX_RANGE_LEN {
            return Err(runtime(format!(
                "range() output is limited to {MAX_RANGE_LEN} elements"
            )));
        }
        items.push(Value::Num(current as f64));
        current += step;
    }
    Ok(Value::List(items))
}

// ==================== math namespace ====================

fn math_constant(name: &str) -> Result<Value, SandboxError> {
    match name {
        "pi" => Ok(Value::Num(std::f64::consts::PI)),
        "e" => Ok(Value::Num(std::f64::consts::E)),
        "tau" => Ok(Value::Num(std::f64::consts::TAU)),
        other => Err(runtime(format!("math has no attribute {other:?}"))),
    }
}

fn call_math(name: &str, args: &[Value]) -> Result<Value, SandboxError> {
    let result = match name {
        "sin" => one_num(name, args)?.sin(),
        "cos" => one_num(name, args)?.cos(),
        "tan" => one_num(name, args)?.tan(),
        "exp" => one_num(name, args)?.exp(),
        "floor" => one_num(name, args)?.floor(),
        "ceil" => one_num(name, args)?.ceil(),
        "round" => one_num(name, args)?.round(),
        "sqrt" => {
            let n = one_num(name, args)?;
            if n < 0.0 {
                return Err(runtime("math.sqrt of a negative number"));
            }
            n.sqrt()
        }
        "log" => {
            let n = one_num(name, args)?;
            if n <= 0.0 {
                return Err(runtime("math.log of a non-positive number"));
            }
            n.ln()
        }
        "pow" => match args {
            [a, b] => as_num(a, name)?.powf(as_num(b, name)?),
            _ => return Err(runtime("math.pow expects two numbers")),
        },
        other => return Err(runtime(format!("math has no function {other:?}"))),
    };
    Ok(Value::Num(result))
}

// ==================== b64 namespace ====================

fn call_b64(name: &str, args: &[Value]) -> Result<Value, SandboxError> {
    match name {
        "encode" => match args {
            [Value::Str(s)] => Ok(Value::Str(BASE64.encode(s.as_bytes()))),
            _ => Err(runtime("b64.encode expects one string")),
        },
        "decode" => match args {
            [Value::Str(s)] => {
                let bytes = BASE64
                    .decode(s.as_bytes())
                    .map_err(|e| runtime(format!("b64.decode: {e}")))?;
                let text =
                    String::from_utf8(bytes).map_err(|_| runtime("b64.decode: not valid UTF-8"))?;
                Ok(Value::Str(text))
            }
            _ => Err(runtime("b64.decode expects one string")),
        },
        other => Err(runtime(format!("b64 has no function {other:?}"))),
    }
}

// ==================== plot namespace ====================

fn call_plot(name: &str, args: &[Value], figure: &mut Figure) -> Result<Value, SandboxError> {
    match name {
        "line" => {
            figure.push_series(SeriesKind::Line, paired_points(args)?);
            Ok(Value::None)
        }
        "scatter" => {
            figure.push_series(SeriesKind::Scatter, paired_points(args)?);
            Ok(Value::None)
        }
        "title" => match args {
            [Value::Str(s)] => {
                figure.set_title(s.clone());
                Ok(Value::None)
            }
            _ => Err(runtime("plot.title expects one string")),
        },
        "clear" => {
            if !args.is_empty() {
                return Err(runtime("plot.clear takes no arguments"));
            }
            figure.clear();
            Ok(Value::None)
        }
        other => Err(runtime(format!("plot has no function {other:?}"))),
    }
}

/// Zip `(xs, ys)` list arguments into points; lengths must match.
fn paired_points(args: &[Value]) -> Result<Vec<(f64, f64)>, SandboxError> {
    let [Value::List(xs), Value::List(ys)] = args else {
        return Err(runtime("expected two lists of numbers (xs, ys)"));
    };
    if xs.len() != ys.len() {
        return Err(runtime(format!(
            "xs has {} elements but ys has {}",
            xs.len(),
            ys.len()
        )));
    }
    if xs.is_empty() {
        return Err(runtime("cannot plot empty lists"));
    }
    xs.iter()
        .zip(ys.iter())
        .map(|(x, y)| Ok((as_num(x, "plot")?, as_num(y, "plot")?)))
        .collect()
}

// ==================== helpers ====================

fn as_num(value: &Value, context: &str) -> Result<f64, SandboxError> {
    match value {
        Value::Num(n) => Ok(*n),
        other => Err(runtime(format!("{context} expects a number, got {other:?}"))),
    }
}

fn one_num(name: &str, args: &[Value]) -> Result<f64, SandboxError> {
    match args {
        [value] => as_num(value, name),
        _ => Err(runtime(format!("{name} expects one number"))),
    }
}

fn runtime(message: impl Into<String>) -> SandboxError {
    SandboxError::Runtime(message.into())
}

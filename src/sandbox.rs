//! Sandboxed snippet execution.
//!
//! Snippets run in a small expression language against a fixed set of
//! bindings: `math` utilities, a `plot` figure surface, `b64` encoding
//! helpers, and a few global builtins. Before anything runs, the parsed
//! tree is screened against a deny list of call-target names. There is no
//! filesystem, process, or network access inside the sandbox.

mod ast;
mod check;
mod eval;
mod lexer;
mod parser;
pub mod plot;
#[cfg(test)]
mod proptests;

pub use check::DEFAULT_DENYLIST;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use eval::Scope;
use plot::Figure;
use std::collections::HashSet;
use thiserror::Error;

/// Marker every inline plot result starts with.
pub const INLINE_IMAGE_PREFIX: &str = "<img src='data:image/svg+xml;base64,";

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("{0}")]
    Disallowed(String),
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("failed to render plot: {0}")]
    Render(String),
}

/// Outcome of one snippet execution. Exactly one variant applies.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    /// Textual output: the stringified `_` slot, or an inline image tag.
    Text(String),
    /// A rendered figure as raw image bytes.
    Image { data: Vec<u8>, mime: &'static str },
    /// The snippet was rejected or failed; it carries a model-readable
    /// reason, never a panic.
    Error(String),
}

impl ExecutionResult {
    /// Collapse into the textual channel used for tool results: images
    /// become inline-renderable `<img>` markup.
    pub fn into_tool_text(self) -> Result<String, String> {
        match self {
            ExecutionResult::Text(text) => Ok(text),
            ExecutionResult::Image { data, mime } => Ok(format!(
                "<img src='data:{};base64,{}'>",
                mime,
                BASE64.encode(&data)
            )),
            ExecutionResult::Error(reason) => Err(reason),
        }
    }
}

/// One sandbox instance: deny list, scratch locals, and plot surface.
///
/// Scratch locals persist across `execute` calls, so a session gets a
/// stateful REPL. An executor must serve at most one call at a time;
/// callers that share one across tasks wrap it in a mutex.
pub struct Executor {
    denylist: HashSet<String>,
    scope: Scope,
    figure: Figure,
}

impl Executor {
    pub fn new(denylist: impl IntoIterator<Item = String>) -> Self {
        Self {
            denylist: denylist.into_iter().collect(),
            scope: Scope::default(),
            figure: Figure::new(),
        }
    }

    pub fn with_default_denylist() -> Self {
        Self::new(DEFAULT_DENYLIST.iter().map(|s| (*s).to_string()))
    }

    /// Run a snippet and return the result on the textual channel: plots
    /// arrive as inline `<img>` markup, everything else as the stringified
    /// last value. Never panics; every failure becomes `Error`.
    pub fn execute(&mut self, code: &str) -> ExecutionResult {
        match self.execute_raw(code) {
            // execute_raw only renders SVG, so the fixed prefix applies.
            ExecutionResult::Image { data, .. } => ExecutionResult::Text(format!(
                "{INLINE_IMAGE_PREFIX}{}'>",
                BASE64.encode(&data)
            )),
            other => other,
        }
    }

    /// Run a snippet, keeping a rendered figure as structured image bytes.
    pub fn execute_raw(&mut self, code: &str) -> ExecutionResult {
        let program = match parser::parse(code) {
            Ok(program) => program,
            Err(e) => return ExecutionResult::Error(e.to_string()),
        };

        // The deny-list screen runs before evaluation: rejected code must
        // leave no trace in the scratch scope.
        if let Err(e) = check::check(&program, &self.denylist) {
            return ExecutionResult::Error(e.to_string());
        }

        if let Err(e) = eval::eval_program(&program, &mut self.scope, &mut self.figure) {
            return ExecutionResult::Error(e.to_string());
        }

        if !self.figure.is_empty() {
            let rendered = plot::render_svg(&self.figure);
            self.figure.clear();
            return match rendered {
                Ok(svg) => ExecutionResult::Image {
                    data: svg.into_bytes(),
                    mime: "image/svg+xml",
                },
                Err(e) => ExecutionResult::Error(e.to_string()),
            };
        }

        let text = self
            .scope
            .last_value()
            .map(ToString::to_string)
            .unwrap_or_default();
        ExecutionResult::Text(text)
    }
}

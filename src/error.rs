use serde::Serialize;
use thiserror::Error;

use crate::ast::{NodePath, SourceLocation};

// Codegen error codes. Each code maps to the guarantee it protects.
pub const ERR_UNSUPPORTED_DIRECTIVE: &str = "E-CODEGEN-001";
pub const ERR_TARGET_UNSUPPORTED: &str = "E-CODEGEN-002";
pub const ERR_SLOT_COLLISION: &str = "E-CODEGEN-003";
pub const ERR_EMISSION_MODE: &str = "E-CODEGEN-004";
pub const ERR_DIRECTIVE_CONFLICT: &str = "E-CODEGEN-005";
pub const ERR_SLOT_EVENT: &str = "E-CODEGEN-006";

pub fn describe_code(code: &str) -> &'static str {
    match code {
        ERR_UNSUPPORTED_DIRECTIVE => {
            "Every directive in the template is understood by the backend; none are dropped."
        }
        ERR_TARGET_UNSUPPORTED => {
            "A construct the target cannot express is rejected rather than degraded."
        }
        ERR_SLOT_COLLISION => "Outlet identities are unique within one nesting domain.",
        ERR_EMISSION_MODE => "The emission mode matches what the platform family can execute.",
        ERR_DIRECTIVE_CONFLICT => "An element's content has exactly one source.",
        ERR_SLOT_EVENT => "Outlets forward props only; they do not own event listeners.",
        _ => "Unknown error code.",
    }
}

/// Lowering failure. Aborts the whole compile call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("{message} at {position}")]
pub struct ParseError {
    pub position: SourceLocation,
    pub message: String,
}

impl ParseError {
    pub fn new(position: SourceLocation, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Per-node codegen failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("[{code}] {reason} (node {node_path}, {location})")]
pub struct CodegenError {
    pub code: String,
    pub node_path: NodePath,
    pub reason: String,
    pub guarantee: String,
    pub location: SourceLocation,
}

impl CodegenError {
    pub fn new(
        code: &str,
        node_path: &NodePath,
        location: SourceLocation,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            code: code.to_string(),
            node_path: node_path.clone(),
            reason: reason.into(),
            guarantee: describe_code(code).to_string(),
            location,
        }
    }
}

/// Failure while evaluating a thunk against a rendering context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", content = "message", rename_all = "kebab-case")]
pub enum EvalError {
    #[error("unsupported in reference evaluation: {0}")]
    Unsupported(String),
    #[error("type error: {0}")]
    TypeError(String),
    #[error("unknown binding key `{0}`")]
    UnknownKey(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", content = "errors", rename_all = "kebab-case")]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("{}", summarize(.0))]
    Codegen(Vec<CodegenError>),
}

impl From<CodegenError> for CompileError {
    fn from(err: CodegenError) -> Self {
        CompileError::Codegen(vec![err])
    }
}

fn summarize(errors: &[CodegenError]) -> String {
    match errors {
        [] => "codegen failed".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{} (and {} more)", first, rest.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codegen_error_carries_guarantee() {
        let err = CodegenError::new(
            ERR_SLOT_COLLISION,
            &NodePath(vec![0, 2]),
            SourceLocation::default(),
            "slot `d` declared twice",
        );
        assert_eq!(err.guarantee, describe_code(ERR_SLOT_COLLISION));
        assert_eq!(
            err.to_string(),
            "[E-CODEGEN-003] slot `d` declared twice (node /0/2, 0:0)"
        );
    }

    #[test]
    fn compile_error_summarizes_many() {
        let e = |reason: &str| {
            CodegenError::new(
                ERR_UNSUPPORTED_DIRECTIVE,
                &NodePath::root(),
                SourceLocation::default(),
                reason,
            )
        };
        let err = CompileError::Codegen(vec![e("first"), e("second")]);
        assert!(err.to_string().ends_with("(and 1 more)"));
    }
}

//! Compile entry points.
//!
//! `source → lower → resolve slots → extract bindings → backend → adapter`.
//! Every call is independent: no state survives between calls, so
//! [`compile_many`] can fan out over rayon's pool.

#[cfg(feature = "napi")]
use napi_derive::napi;
use rayon::prelude::*;
use tracing::debug;

use crate::binding::extract_bindings;
use crate::codegen::FunctionCallBackend;
use crate::error::{CodegenError, CompileError};
use crate::markup::{MarkupBackend, MarkupDialect};
use crate::options::{BackendKind, CompileOptions};
use crate::parse::{parse_template, ParseOptions};
use crate::slots::resolve_slots;
use crate::target::{
    check_emission_mode, render_function_unit, CompileOutput, CompileResult, ComponentResolver,
    TableResolver,
};

pub fn compile(
    source: &str,
    options: &CompileOptions,
    resolver: &dyn ComponentResolver,
) -> Result<CompileResult, CompileError> {
    check_emission_mode(options)?;

    let parse_options = ParseOptions {
        whitespace: options.whitespace,
        platform: options.platform,
    };
    let mut nodes = parse_template(source, &parse_options)?;
    debug!(roots = nodes.len(), platform = ?options.platform, "template lowered");

    let capabilities = options.platform.capabilities();
    let report = resolve_slots(&mut nodes, capabilities);
    let mut errors: Vec<CodegenError> = report.errors;
    if !errors.is_empty() && !options.partial_output {
        return Err(CompileError::Codegen(errors));
    }

    let context = extract_bindings(&mut nodes, capabilities);
    debug!(backend = ?capabilities.backend, "backend selected");

    let (output, helpers) = match capabilities.backend {
        BackendKind::FunctionCall => {
            let (unit, backend_errors) =
                FunctionCallBackend::new(options.platform, &context, resolver)
                    .with_hoisting(options.hoist_static)
                    .with_partial_output(options.partial_output)
                    .generate(&nodes)?;
            errors.extend(backend_errors);
            let helpers = unit.helpers.iter().map(|h| h.name().to_string()).collect();
            let code = render_function_unit(&unit, options);
            (CompileOutput::FunctionWrapped { code }, helpers)
        }
        BackendKind::Markup => {
            let dialect =
                MarkupDialect::for_platform(options.platform).unwrap_or(MarkupDialect::Weixin);
            let (markup, backend_errors) =
                MarkupBackend::new(dialect, &context, capabilities.default_outlet)
                    .with_partial_output(options.partial_output)
                    .generate(&nodes)?;
            errors.extend(backend_errors);
            let helpers = context.helpers.iter().map(|h| h.name().to_string()).collect();
            (
                CompileOutput::StandalonePair {
                    markup,
                    binding_function_source: context
                        .binding_function_source(&options.runtime_module),
                },
                helpers,
            )
        }
    };

    Ok(CompileResult {
        output,
        helpers,
        outlets: report.outlets,
        errors,
    })
}

/// Compile with the static component table from `options.components`.
pub fn compile_with_table(
    source: &str,
    options: &CompileOptions,
) -> Result<CompileResult, CompileError> {
    let resolver = TableResolver::from_options(options);
    compile(source, options, &resolver)
}

/// Independent templates compiled in parallel; results keep input order.
pub fn compile_many(
    sources: &[&str],
    options: &CompileOptions,
    resolver: &dyn ComponentResolver,
) -> Vec<Result<CompileResult, CompileError>> {
    sources
        .par_iter()
        .map(|source| compile(source, options, resolver))
        .collect()
}

#[cfg(feature = "napi")]
#[napi]
pub fn compile_template_native(
    source: String,
    options_json: String,
) -> napi::Result<serde_json::Value> {
    let options = CompileOptions::from_json(&options_json)
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    let value = match compile_with_table(&source, &options) {
        Ok(result) => serde_json::to_value(result),
        Err(err) => serde_json::to_value(err),
    };
    value.map_err(|e| napi::Error::from_reason(e.to_string()))
}

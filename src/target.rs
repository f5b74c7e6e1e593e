//! Target Adapter
//!
//! Turns backend output into what the caller asked for: a named render
//! function (function-wrapped) or `{markup, bindingFunctionSource}`
//! (standalone-pair). Also owns component resolution, which is injected by
//! the caller through [`ComponentResolver`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::ast::NodePath;
use crate::error::{CodegenError, ERR_EMISSION_MODE};
use crate::helpers::{import_statement, Helper};
use crate::options::{BackendKind, CompileOptions, EmissionMode, PlatformFamily};
use crate::slots::OutletSummary;

// ═══════════════════════════════════════════════════════════════════════════════
// COMPONENT RESOLUTION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedComponent {
    pub identifier: String,
    pub source_module: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

/// Caller-supplied lookup for non-native tags.
pub trait ComponentResolver: Send + Sync {
    fn resolve(&self, tag: &str) -> Option<ResolvedComponent>;

    /// Path of an automatically registered local component.
    fn match_local(&self, _tag: &str) -> Option<String> {
        None
    }
}

/// Resolves nothing; every component goes through `resolveComponent`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopResolver;

impl ComponentResolver for NoopResolver {
    fn resolve(&self, _tag: &str) -> Option<ResolvedComponent> {
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TableEntry {
    Resolved(ResolvedComponent),
    Local { path: String },
}

/// Static tag table, usually taken from [`CompileOptions::components`].
#[derive(Debug, Clone, Default)]
pub struct TableResolver {
    entries: BTreeMap<String, TableEntry>,
}

impl TableResolver {
    pub fn new(entries: BTreeMap<String, TableEntry>) -> Self {
        Self { entries }
    }

    pub fn from_options(options: &CompileOptions) -> Self {
        Self::new(options.components.clone())
    }
}

impl ComponentResolver for TableResolver {
    fn resolve(&self, tag: &str) -> Option<ResolvedComponent> {
        match self.entries.get(tag)? {
            TableEntry::Resolved(component) => Some(component.clone()),
            TableEntry::Local { .. } => None,
        }
    }

    fn match_local(&self, tag: &str) -> Option<String> {
        match self.entries.get(tag)? {
            TableEntry::Local { path } => Some(path.clone()),
            TableEntry::Resolved(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentSource {
    Resolved(ResolvedComponent),
    Local(String),
    Runtime,
}

/// One `const _component_x = ...` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRef {
    pub tag: String,
    pub source: ComponentSource,
}

impl ComponentRef {
    pub fn lookup(tag: &str, resolver: &dyn ComponentResolver) -> Self {
        let source = if let Some(component) = resolver.resolve(tag) {
            ComponentSource::Resolved(component)
        } else if let Some(path) = resolver.match_local(tag) {
            ComponentSource::Local(path)
        } else {
            ComponentSource::Runtime
        };
        Self {
            tag: tag.to_string(),
            source,
        }
    }

    pub fn variable(&self) -> String {
        format!("_component_{}", sanitize_identifier(&self.tag))
    }

    fn easycom_variable(&self) -> String {
        format!("_easycom_{}", sanitize_identifier(&self.tag))
    }

    fn import_line(&self, platform: PlatformFamily) -> Option<String> {
        match &self.source {
            ComponentSource::Resolved(c) if c.namespace.is_none() || !platform.is_typed() => Some(
                format!("import {{ {} }} from '{}'", c.identifier, c.source_module),
            ),
            ComponentSource::Local(path) => {
                Some(format!("import {} from '{}'", self.easycom_variable(), path))
            }
            _ => None,
        }
    }

    fn declaration(&self, platform: PlatformFamily) -> String {
        let value = match &self.source {
            ComponentSource::Resolved(c) if platform.is_typed() => match &c.namespace {
                Some(ns) => format!("{}.{}.name", ns, c.identifier),
                None => format!("{}.name", c.identifier),
            },
            ComponentSource::Resolved(c) => c.identifier.clone(),
            ComponentSource::Local(_) => format!(
                "resolveEasyComponent(\"{}\",{})",
                self.tag,
                self.easycom_variable()
            ),
            ComponentSource::Runtime => format!("resolveComponent(\"{}\")", self.tag),
        };
        format!("const {} = {}", self.variable(), value)
    }
}

/// Replace every character that cannot appear in an identifier with `_`.
pub fn sanitize_identifier(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '$' { c } else { '_' })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum CompileOutput {
    #[serde(rename_all = "camelCase")]
    FunctionWrapped { code: String },
    #[serde(rename_all = "camelCase")]
    StandalonePair {
        markup: String,
        binding_function_source: String,
    },
}

impl CompileOutput {
    pub fn code(&self) -> Option<&str> {
        match self {
            CompileOutput::FunctionWrapped { code } => Some(code),
            CompileOutput::StandalonePair { .. } => None,
        }
    }

    pub fn markup(&self) -> Option<&str> {
        match self {
            CompileOutput::StandalonePair { markup, .. } => Some(markup),
            CompileOutput::FunctionWrapped { .. } => None,
        }
    }

    pub fn binding_function_source(&self) -> Option<&str> {
        match self {
            CompileOutput::StandalonePair {
                binding_function_source,
                ..
            } => Some(binding_function_source),
            CompileOutput::FunctionWrapped { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompileResult {
    pub output: CompileOutput,
    /// ABI names of the helpers the output references.
    pub helpers: Vec<String>,
    pub outlets: Vec<OutletSummary>,
    /// Only non-empty under partial-output tolerance.
    pub errors: Vec<CodegenError>,
}

/// What the function-call backend produced for one unit.
#[derive(Debug, Clone, Default)]
pub struct FunctionUnit {
    pub root: String,
    pub hoisted: Vec<String>,
    pub components: Vec<ComponentRef>,
    pub vnode_imports: BTreeSet<&'static str>,
    pub helpers: BTreeSet<Helper>,
}

/// Function-wrapped and markup families cannot swap emission modes.
pub fn check_emission_mode(options: &CompileOptions) -> Result<(), CodegenError> {
    let expected = match options.platform.backend() {
        BackendKind::FunctionCall => EmissionMode::FunctionWrapped,
        BackendKind::Markup => EmissionMode::StandalonePair,
    };
    if options.emission_mode == expected {
        return Ok(());
    }
    Err(CodegenError::new(
        ERR_EMISSION_MODE,
        &NodePath::root(),
        Default::default(),
        format!(
            "platform `{}` cannot be emitted as {:?}",
            serde_json::to_value(options.platform)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            options.emission_mode
        ),
    ))
}

pub fn render_function_unit(unit: &FunctionUnit, options: &CompileOptions) -> String {
    let platform = options.platform;
    let mut header: Vec<String> = Vec::new();

    if !platform.is_typed() && !unit.vnode_imports.is_empty() {
        let names: Vec<&str> = unit.vnode_imports.iter().copied().collect();
        header.push(format!(
            "import {{ {} }} from \"{}\";",
            names.join(", "),
            options.vnode_module
        ));
    }
    if let Some(helpers) = import_statement(&unit.helpers, &options.runtime_module) {
        header.push(helpers);
    }
    header.extend(unit.components.iter().filter_map(|c| c.import_line(platform)));

    let mut out = String::new();
    if !header.is_empty() {
        out.push_str(&header.join("\n"));
        out.push_str("\n\n");
    }
    for hoisted in &unit.hoisted {
        out.push_str(hoisted);
        out.push('\n');
    }
    if !unit.hoisted.is_empty() {
        out.push('\n');
    }

    if platform.is_typed() {
        out.push_str(&format!(
            "@Suppress(\"UNUSED_PARAMETER\") function {name}Render(_ctx: {name}): VNode | null {{\n",
            name = options.component_name
        ));
    } else {
        out.push_str("export function render(_ctx) {\n");
    }
    for component in &unit.components {
        out.push_str("  ");
        out.push_str(&component.declaration(platform));
        out.push('\n');
    }
    if !unit.components.is_empty() {
        out.push('\n');
    }
    out.push_str("  return ");
    out.push_str(&unit.root);
    out.push_str("\n}\n");
    out
}

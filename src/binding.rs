//! Binding Extractor
//!
//! Walks every dynamic expression in document order and assigns it a
//! [`BindingKey`] plus a thunk describing how to compute its value. The result
//! is one [`CodegenContext`] per compile call. Markup targets restart key
//! numbering inside every loop scope; function-call targets use one counter
//! for the whole unit.
//!
//! The context can be serialized into the standalone binding function the
//! markup family executes, and evaluated directly over a JSON rendering
//! context as the reference semantics for both families.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, trace};

use crate::ast::{
    path_var, Attribute, BindingDirective, BindingKind, ConditionalGroupNode, Directive,
    ElementNode, ForBlockNode, InterpolationNode, SlotNode, TemplateNode,
};
use crate::error::EvalError;
use crate::eval::{evaluate, Scope};
use crate::expression::Expression;
use crate::helpers::{
    display, for_each, import_statement, js_string, merge_branches, resolve_outlet,
    to_js_string, Helper,
};
use crate::options::{BackendKind, TargetCapabilities};
use crate::slots::OutletBase;
use crate::visitor::{walk_element, walk_slot, TemplateVisitor};

// ═══════════════════════════════════════════════════════════════════════════════
// KEYS
// ═══════════════════════════════════════════════════════════════════════════════

/// Keys that would read as JavaScript keywords.
const RESERVED_KEYS: &[&str] = &["do", "if", "in", "for", "let", "new", "try", "var"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BindingKey(String);

impl BindingKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bijective base-26: `a`..`z`, `aa`, `ab`, ...
#[derive(Debug, Default, Clone)]
pub struct KeyAllocator {
    next: usize,
}

impl KeyAllocator {
    pub fn next_key(&mut self) -> BindingKey {
        loop {
            let candidate = encode_key(self.next);
            self.next += 1;
            if !RESERVED_KEYS.contains(&candidate.as_str()) {
                return BindingKey(candidate);
            }
        }
    }
}

fn encode_key(index: usize) -> String {
    let mut n = index + 1;
    let mut chars = Vec::new();
    while n > 0 {
        n -= 1;
        chars.push(b'a' + (n % 26) as u8);
        n /= 26;
    }
    chars.reverse();
    String::from_utf8(chars).unwrap_or_default()
}

// ═══════════════════════════════════════════════════════════════════════════════
// THUNKS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Thunk {
    /// The expression value as is.
    Field { expression: Expression },
    /// The expression coerced to text.
    Display { expression: Expression },
    Loop(LoopThunk),
    Merge(MergeThunk),
    /// Per-iteration outlet identity.
    OutletName(OutletNameThunk),
    /// Outlet resolution with extra props.
    Outlet(OutletThunk),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopThunk {
    pub source: Expression,
    pub item: String,
    pub index: Option<String>,
    pub depth: usize,
    pub record: BindingRecord,
}

impl LoopThunk {
    fn params(&self) -> Vec<String> {
        vec![
            self.item.clone(),
            self.index.clone().unwrap_or_else(|| "_".to_string()),
            path_var(self.depth),
        ]
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeThunk {
    pub branches: Vec<MergeBranch>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeBranch {
    /// `None` for the else branch.
    pub condition: Option<Expression>,
    pub condition_key: Option<BindingKey>,
    pub record: BindingRecord,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutletNameThunk {
    pub base: OutletBase,
    pub loop_path: Vec<usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutletThunk {
    pub base: OutletBase,
    pub props: Vec<OutletProp>,
    pub loop_path: Vec<usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum OutletProp {
    Static { name: String, value: String },
    Bound { name: String, expression: Expression },
}

impl OutletProp {
    pub fn name(&self) -> &str {
        match self {
            OutletProp::Static { name, .. } | OutletProp::Bound { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingEntry {
    pub key: BindingKey,
    pub thunk: Thunk,
}

/// Ordered key → thunk mapping for one scope.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct BindingRecord {
    pub entries: Vec<BindingEntry>,
}

impl BindingRecord {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &BindingKey) -> Option<&Thunk> {
        self.entries.iter().find(|e| &e.key == key).map(|e| &e.thunk)
    }

    /// Search nested records too. Only meaningful when keys are unit-unique.
    fn find(&self, key: &BindingKey) -> Option<&Thunk> {
        for entry in &self.entries {
            if &entry.key == key {
                return Some(&entry.thunk);
            }
            let nested = match &entry.thunk {
                Thunk::Loop(l) => l.record.find(key),
                Thunk::Merge(m) => m.branches.iter().find_map(|b| b.record.find(key)),
                _ => None,
            };
            if nested.is_some() {
                return nested;
            }
        }
        None
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CODEGEN CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodegenContext {
    pub root: BindingRecord,
    pub helpers: BTreeSet<Helper>,
    pub scope_local_keys: bool,
}

impl CodegenContext {
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Thunk for a key, looking through nested scopes.
    pub fn thunk(&self, key: &BindingKey) -> Option<&Thunk> {
        if self.scope_local_keys {
            self.root.get(key)
        } else {
            self.root.find(key)
        }
    }

    /// Reference evaluation of the binding mapping.
    pub fn evaluate(&self, context: &Value) -> Result<Value, EvalError> {
        evaluate_record(&self.root, &Scope::new(context))
    }

    /// Value of one top-level entry.
    pub fn evaluate_key(&self, key: &BindingKey, context: &Value) -> Result<Value, EvalError> {
        let thunk = self
            .root
            .get(key)
            .ok_or_else(|| EvalError::UnknownKey(key.to_string()))?;
        evaluate_thunk(thunk, &Scope::new(context))
    }

    /// `export default function bindings(_ctx) { ... }` with helper imports.
    pub fn binding_function_source(&self, runtime_module: &str) -> String {
        let mut out = String::new();
        if let Some(imports) = import_statement(&self.helpers, runtime_module) {
            out.push_str(&imports);
            out.push('\n');
        }
        out.push_str("export default function bindings(_ctx) {\n  return ");
        out.push_str(&render_record(&self.root, &[], 1));
        out.push_str(";\n}\n");
        out
    }
}

pub fn extract_bindings(
    nodes: &mut Vec<TemplateNode>,
    capabilities: TargetCapabilities,
) -> CodegenContext {
    let mut extractor = BindingExtractor::new(capabilities);
    extractor.visit_children(nodes);
    let root = extractor.records.pop().unwrap_or_default();
    debug!(
        entries = root.entries.len(),
        helpers = extractor.helpers.len(),
        "bindings extracted"
    );
    CodegenContext {
        root,
        helpers: extractor.helpers,
        scope_local_keys: capabilities.scope_local_keys,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXTRACTOR
// ═══════════════════════════════════════════════════════════════════════════════

pub struct BindingExtractor {
    capabilities: TargetCapabilities,
    allocators: Vec<KeyAllocator>,
    records: Vec<BindingRecord>,
    helpers: BTreeSet<Helper>,
}

impl BindingExtractor {
    pub fn new(capabilities: TargetCapabilities) -> Self {
        Self {
            capabilities,
            allocators: vec![KeyAllocator::default()],
            records: vec![BindingRecord::default()],
            helpers: BTreeSet::new(),
        }
    }

    fn reserve(&mut self) -> BindingKey {
        let key = match self.allocators.last_mut() {
            Some(allocator) => allocator.next_key(),
            None => KeyAllocator::default().next_key(),
        };
        trace!(key = %key, "binding key assigned");
        key
    }

    fn push_entry(&mut self, key: BindingKey, thunk: Thunk) {
        if let Some(record) = self.records.last_mut() {
            record.entries.push(BindingEntry { key, thunk });
        }
    }

    fn assign(&mut self, thunk: Thunk) -> BindingKey {
        let key = self.reserve();
        self.push_entry(key.clone(), thunk);
        key
    }

    fn assign_bindings(&mut self, directives: &mut [Directive]) {
        for directive in directives {
            if let Directive::Binding(BindingDirective {
                kind,
                expression,
                key,
                ..
            }) = directive
            {
                // Handlers are wired by the backends, not through the mapping.
                if *kind == BindingKind::Event {
                    continue;
                }
                *key = Some(self.assign(Thunk::Field {
                    expression: expression.clone(),
                }));
            }
        }
    }

    fn outlet_props(attributes: &[Attribute], directives: &[Directive]) -> Vec<OutletProp> {
        let mut props: Vec<OutletProp> = attributes
            .iter()
            .map(|a| OutletProp::Static {
                name: a.name.clone(),
                value: a.value.clone().unwrap_or_default(),
            })
            .collect();
        props.extend(directives.iter().filter_map(|d| match d {
            Directive::Binding(b) => Some(OutletProp::Bound {
                name: b.name.clone(),
                expression: b.expression.clone(),
            }),
            _ => None,
        }));
        props
    }
}

impl TemplateVisitor for BindingExtractor {
    fn visit_element(&mut self, element: &mut ElementNode) {
        self.assign_bindings(&mut element.directives);
        walk_element(self, element);
    }

    fn visit_interpolation(&mut self, interpolation: &mut InterpolationNode) {
        self.helpers.insert(Helper::Display);
        interpolation.key = Some(self.assign(Thunk::Display {
            expression: interpolation.expression.clone(),
        }));
    }

    fn visit_slot(&mut self, slot: &mut SlotNode) {
        let Some(resolution) = slot.resolution.clone() else {
            walk_slot(self, slot);
            return;
        };
        let dynamic = matches!(resolution.base, OutletBase::Dynamic(_));
        let props = Self::outlet_props(&slot.attributes, &slot.directives);

        match self.capabilities.backend {
            BackendKind::Markup => {
                if resolution.is_iterated() {
                    if dynamic {
                        self.helpers.insert(Helper::Display);
                    }
                    slot.keys.name = Some(self.assign(Thunk::OutletName(OutletNameThunk {
                        base: resolution.base.clone(),
                        loop_path: resolution.loop_path.clone(),
                    })));
                } else if let OutletBase::Dynamic(expression) = &resolution.base {
                    self.helpers.insert(Helper::Display);
                    slot.keys.name = Some(self.assign(Thunk::Display {
                        expression: expression.clone(),
                    }));
                }
                if resolution.is_iterated() || !props.is_empty() {
                    self.helpers.insert(Helper::ResolveOutlet);
                    slot.keys.outlet = Some(self.assign(Thunk::Outlet(OutletThunk {
                        base: resolution.base.clone(),
                        props,
                        loop_path: resolution.loop_path.clone(),
                    })));
                }
            }
            BackendKind::FunctionCall => {
                self.helpers.insert(Helper::ResolveOutlet);
                slot.keys.outlet = Some(self.assign(Thunk::Outlet(OutletThunk {
                    base: resolution.base.clone(),
                    props,
                    loop_path: resolution.loop_path.clone(),
                })));
            }
        }

        walk_slot(self, slot);
    }

    fn visit_conditional_group(&mut self, group: &mut ConditionalGroupNode) {
        let key = self.reserve();
        let mut branches = Vec::with_capacity(group.branches.len());
        for branch in &mut group.branches {
            self.records.push(BindingRecord::default());
            let condition_key = branch.condition.clone().map(|expression| {
                self.assign(Thunk::Field { expression })
            });
            branch.key = condition_key.clone();
            self.visit_children(&mut branch.children);
            let record = self.records.pop().unwrap_or_default();
            branches.push(MergeBranch {
                condition: branch.condition.clone(),
                condition_key,
                record,
            });
        }
        self.helpers.insert(Helper::MergeBranches);
        group.key = Some(key.clone());
        self.push_entry(key, Thunk::Merge(MergeThunk { branches }));
    }

    fn visit_for_block(&mut self, block: &mut ForBlockNode) {
        let key = self.reserve();
        self.records.push(BindingRecord::default());
        if self.capabilities.scope_local_keys {
            self.allocators.push(KeyAllocator::default());
        }
        self.visit_children(&mut block.children);
        if self.capabilities.scope_local_keys {
            self.allocators.pop();
        }
        let record = self.records.pop().unwrap_or_default();
        self.helpers.insert(Helper::ForEach);
        block.key = Some(key.clone());
        self.push_entry(
            key,
            Thunk::Loop(LoopThunk {
                source: block.source.clone(),
                item: block.item.clone(),
                index: block.index.clone(),
                depth: block.depth,
                record,
            }),
        );
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// JAVASCRIPT RENDERING
// ═══════════════════════════════════════════════════════════════════════════════

fn indent(level: usize) -> String {
    "  ".repeat(level)
}

/// Object key: bare when it is an identifier, quoted otherwise.
pub fn js_key(name: &str) -> String {
    let mut chars = name.chars();
    let ident = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        .unwrap_or(false)
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if ident {
        name.to_string()
    } else {
        js_string(name)
    }
}

/// `i0`, `i0 + "-" + i1`, ... or `None` outside loops.
pub fn render_loop_path(loop_path: &[usize]) -> Option<String> {
    if loop_path.is_empty() {
        return None;
    }
    let vars: Vec<String> = loop_path.iter().map(|d| path_var(*d)).collect();
    Some(vars.join(" + \"-\" + "))
}

pub fn render_outlet_base(base: &OutletBase, locals: &[String]) -> String {
    match base {
        OutletBase::Static(name) => js_string(name),
        OutletBase::Dynamic(expr) => expr.render(locals),
    }
}

/// `{ key: index }`, or `null` without props.
pub fn render_outlet_props(props: &[OutletProp], locals: &[String]) -> String {
    if props.is_empty() {
        return "null".to_string();
    }
    let fields: Vec<String> = props
        .iter()
        .map(|p| match p {
            OutletProp::Static { name, value } => format!("{}: {}", js_key(name), js_string(value)),
            OutletProp::Bound { name, expression } => {
                format!("{}: {}", js_key(name), expression.render(locals))
            }
        })
        .collect();
    format!("{{ {} }}", fields.join(", "))
}

/// `_r(base, props, path)`
pub fn render_outlet_call(outlet: &OutletThunk, locals: &[String]) -> String {
    format!(
        "{}({}, {}, {})",
        Helper::ResolveOutlet.alias(),
        render_outlet_base(&outlet.base, locals),
        render_outlet_props(&outlet.props, locals),
        render_loop_path(&outlet.loop_path).unwrap_or_else(|| "null".to_string())
    )
}

fn render_outlet_name(thunk: &OutletNameThunk, locals: &[String]) -> String {
    let path = render_loop_path(&thunk.loop_path);
    match (&thunk.base, path) {
        (OutletBase::Static(name), Some(path)) => {
            format!("{} + {}", js_string(&format!("{}-", name)), path)
        }
        (OutletBase::Static(name), None) => js_string(name),
        (OutletBase::Dynamic(expr), Some(path)) => format!(
            "{}({}) + \"-\" + {}",
            Helper::Display.alias(),
            expr.render(locals),
            path
        ),
        (OutletBase::Dynamic(expr), None) => {
            format!("{}({})", Helper::Display.alias(), expr.render(locals))
        }
    }
}

fn render_record(record: &BindingRecord, locals: &[String], level: usize) -> String {
    if record.is_empty() {
        return "{}".to_string();
    }
    let fields: Vec<String> = record
        .entries
        .iter()
        .map(|e| {
            let value = render_thunk(&e.thunk, locals, level + 1);
            format!("{}{}: {}", indent(level + 1), e.key, value)
        })
        .collect();
    format!("{{\n{}\n{}}}", fields.join(",\n"), indent(level))
}

pub fn render_thunk(thunk: &Thunk, locals: &[String], level: usize) -> String {
    match thunk {
        Thunk::Field { expression } => expression.render(locals),
        Thunk::Display { expression } => {
            format!("{}({})", Helper::Display.alias(), expression.render(locals))
        }
        Thunk::Loop(l) => {
            let params = l.params();
            let mut inner = locals.to_vec();
            inner.extend(params.iter().cloned());
            format!(
                "{}({}, ({}) => {{\n{}return {};\n{}}})",
                Helper::ForEach.alias(),
                l.source.render(locals),
                params.join(", "),
                indent(level + 1),
                render_record(&l.record, &inner, level + 1),
                indent(level)
            )
        }
        Thunk::Merge(m) => {
            let args: Vec<String> = m
                .branches
                .iter()
                .map(|b| {
                    let condition = b
                        .condition
                        .as_ref()
                        .map(|c| c.render(locals))
                        .unwrap_or_else(|| "true".to_string());
                    let record = render_record(&b.record, locals, level);
                    format!("() => {}, () => ({})", condition, record)
                })
                .collect();
            format!("{}({})", Helper::MergeBranches.alias(), args.join(", "))
        }
        Thunk::OutletName(n) => render_outlet_name(n, locals),
        Thunk::Outlet(o) => render_outlet_call(o, locals),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REFERENCE EVALUATION
// ═══════════════════════════════════════════════════════════════════════════════

fn evaluate_record(record: &BindingRecord, scope: &Scope<'_>) -> Result<Value, EvalError> {
    let mut map = Map::new();
    for entry in &record.entries {
        map.insert(entry.key.to_string(), evaluate_thunk(&entry.thunk, scope)?);
    }
    Ok(Value::Object(map))
}

fn loop_path_value(loop_path: &[usize], scope: &Scope<'_>) -> Option<String> {
    if loop_path.is_empty() {
        return None;
    }
    let parts: Vec<String> = loop_path
        .iter()
        .map(|d| to_js_string(&scope.lookup(&path_var(*d))))
        .collect();
    Some(parts.join("-"))
}

fn outlet_base_value(base: &OutletBase, scope: &Scope<'_>) -> Result<String, EvalError> {
    match base {
        OutletBase::Static(name) => Ok(name.clone()),
        OutletBase::Dynamic(expr) => Ok(display(&evaluate(expr.ast(), scope)?)),
    }
}

pub fn evaluate_thunk(thunk: &Thunk, scope: &Scope<'_>) -> Result<Value, EvalError> {
    match thunk {
        Thunk::Field { expression } => evaluate(expression.ast(), scope),
        Thunk::Display { expression } => {
            Ok(Value::String(display(&evaluate(expression.ast(), scope)?)))
        }
        Thunk::Loop(l) => {
            let source = evaluate(l.source.ast(), scope)?;
            let items = for_each(&source, |item, index, flat| {
                let mut locals = vec![(l.item.clone(), item)];
                if let Some(alias) = &l.index {
                    locals.push((alias.clone(), index));
                }
                locals.push((path_var(l.depth), Value::from(flat)));
                evaluate_record(&l.record, &scope.with_locals(locals))
            })?;
            Ok(Value::Array(items))
        }
        Thunk::Merge(m) => merge_branches(m.branches.iter().map(move |b| {
            let condition = move || match &b.condition {
                Some(c) => evaluate(c.ast(), scope),
                None => Ok(Value::Bool(true)),
            };
            let record = move || evaluate_record(&b.record, scope);
            (condition, record)
        })),
        Thunk::OutletName(n) => {
            let base = outlet_base_value(&n.base, scope)?;
            Ok(Value::String(match loop_path_value(&n.loop_path, scope) {
                Some(path) => format!("{}-{}", base, path),
                None => base,
            }))
        }
        Thunk::Outlet(o) => {
            let base = outlet_base_value(&o.base, scope)?;
            let props = if o.props.is_empty() {
                Value::Null
            } else {
                let mut map = Map::new();
                for prop in &o.props {
                    let value = match prop {
                        OutletProp::Static { value, .. } => Value::String(value.clone()),
                        OutletProp::Bound { expression, .. } => evaluate(expression.ast(), scope)?,
                    };
                    map.insert(prop.name().to_string(), value);
                }
                Value::Object(map)
            };
            let slots = scope.context().get("$slots").cloned().unwrap_or(Value::Null);
            let path = loop_path_value(&o.loop_path, scope);
            Ok(resolve_outlet(&slots, &base, &props, path.as_deref()))
        }
    }
}

//! Template AST
//!
//! The canonical node tree produced by lowering. Every node kind is a variant
//! of the closed [`TemplateNode`] enum; passes and backends match on it
//! exhaustively. Slots carry a [`SlotResolution`] filled in by the slot
//! resolver and every dynamic expression carries an optional [`BindingKey`]
//! filled in by the binding extractor. Nothing else mutates the tree.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::binding::BindingKey;
use crate::expression::Expression;
use crate::slots::SlotResolution;

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE POSITIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// 1-based line/column plus the byte offset into the template source.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
    pub offset: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TemplateNode {
    Element(ElementNode),
    Text(TextNode),
    Interpolation(InterpolationNode),
    Slot(SlotNode),
    ConditionalGroup(ConditionalGroupNode),
    ForBlock(ForBlockNode),
    Comment(CommentNode),
}

impl TemplateNode {
    pub fn location(&self) -> SourceLocation {
        match self {
            TemplateNode::Element(n) => n.location,
            TemplateNode::Text(n) => n.location,
            TemplateNode::Interpolation(n) => n.location,
            TemplateNode::Slot(n) => n.location,
            TemplateNode::ConditionalGroup(n) => n.location,
            TemplateNode::ForBlock(n) => n.location,
            TemplateNode::Comment(n) => n.location,
        }
    }

    /// True when the node and everything below it renders without any
    /// dynamic value. Only an optimization hint.
    pub fn is_static(&self) -> bool {
        match self {
            TemplateNode::Element(n) => n.is_static,
            TemplateNode::Text(_) | TemplateNode::Comment(_) => true,
            _ => false,
        }
    }

    /// Text and interpolation render inline as character data.
    pub fn is_text_like(&self) -> bool {
        matches!(self, TemplateNode::Text(_) | TemplateNode::Interpolation(_))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ElementKind {
    /// Built into the host (`view`, `text`, `div`, ...)
    Native,
    /// Anything else; resolved through the component resolver.
    Component,
    /// `<template>`: groups its children without a host node.
    Fragment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementNode {
    pub tag: String,
    pub kind: ElementKind,
    pub attributes: Vec<Attribute>,
    pub directives: Vec<Directive>,
    pub children: Vec<TemplateNode>,
    #[serde(default)]
    pub self_closing: bool,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub location: SourceLocation,
}

impl ElementNode {
    pub fn bindings(&self) -> impl Iterator<Item = &BindingDirective> {
        self.directives.iter().filter_map(|d| match d {
            Directive::Binding(b) => Some(b),
            _ => None,
        })
    }

    pub fn binding_named(&self, name: &str) -> Option<&BindingDirective> {
        self.bindings()
            .find(|b| b.kind == BindingKind::Attribute && b.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextNode {
    pub value: String,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpolationNode {
    pub expression: Expression,
    #[serde(default)]
    pub key: Option<BindingKey>,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentNode {
    pub value: String,
    #[serde(default)]
    pub location: SourceLocation,
}

/// An outlet. `name="x"` lands in `static_name`, `:name="expr"` in
/// `dynamic_name`; every other binding directive is an outlet prop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotNode {
    pub static_name: Option<String>,
    pub dynamic_name: Option<Expression>,
    pub attributes: Vec<Attribute>,
    pub directives: Vec<Directive>,
    pub fallback: Vec<TemplateNode>,
    #[serde(default)]
    pub self_closing: bool,
    #[serde(default)]
    pub resolution: Option<SlotResolution>,
    #[serde(default)]
    pub keys: SlotKeys,
    #[serde(default)]
    pub location: SourceLocation,
}

impl SlotNode {
    /// Binding directives passed to the outlet as extra props.
    pub fn prop_bindings(&self) -> impl Iterator<Item = &BindingDirective> {
        self.directives.iter().filter_map(|d| match d {
            Directive::Binding(b) => Some(b),
            _ => None,
        })
    }

    pub fn has_props(&self) -> bool {
        !self.attributes.is_empty() || self.prop_bindings().next().is_some()
    }
}

/// Keys the binding extractor assigned to a slot's identity and outlet
/// thunks.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SlotKeys {
    pub name: Option<BindingKey>,
    pub outlet: Option<BindingKey>,
}

/// One if/else-if/else chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalGroupNode {
    pub branches: Vec<ConditionalBranch>,
    #[serde(default)]
    pub key: Option<BindingKey>,
    #[serde(default)]
    pub location: SourceLocation,
}

impl ConditionalGroupNode {
    pub fn has_else(&self) -> bool {
        self.branches
            .last()
            .map(|b| b.kind == BranchKind::Else)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum BranchKind {
    If,
    ElseIf,
    Else,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalBranch {
    pub kind: BranchKind,
    pub condition: Option<Expression>,
    /// Always exactly one node: the element that carried the directive.
    pub children: Vec<TemplateNode>,
    #[serde(default)]
    pub key: Option<BindingKey>,
    #[serde(default)]
    pub location: SourceLocation,
}

/// `v-for` wrapper around the element that carried the directive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForBlockNode {
    pub source: Expression,
    pub item: String,
    pub index: Option<String>,
    /// Nesting level among enclosing loops; names the `i<depth>` path var.
    pub depth: usize,
    pub children: Vec<TemplateNode>,
    #[serde(default)]
    pub key: Option<BindingKey>,
    #[serde(default)]
    pub location: SourceLocation,
}

impl ForBlockNode {
    pub fn path_var(&self) -> String {
        path_var(self.depth)
    }

    /// Names the producer binds, in call order.
    pub fn locals(&self) -> Vec<String> {
        let mut locals = vec![self.item.clone()];
        if let Some(index) = &self.index {
            locals.push(index.clone());
        }
        locals.push(self.path_var());
        locals
    }
}

/// Loop path variable for the given nesting level (`i0`, `i1`, ...).
pub fn path_var(depth: usize) -> String {
    format!("i{}", depth)
}

// ═══════════════════════════════════════════════════════════════════════════════
// ATTRIBUTES & DIRECTIVES
// ═══════════════════════════════════════════════════════════════════════════════

/// Static attribute. `value` is `None` for a bare attribute (`disabled`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub name: String,
    pub value: Option<String>,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "kebab-case")]
pub enum Directive {
    Structural(StructuralDirective),
    Binding(BindingDirective),
    /// Parsed but not understood by any backend; rejected at codegen.
    Unsupported(UnsupportedDirective),
}

impl Directive {
    pub fn location(&self) -> SourceLocation {
        match self {
            Directive::Structural(s) => s.location,
            Directive::Binding(b) => b.location,
            Directive::Unsupported(u) => u.location,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralDirective {
    pub kind: StructuralKind,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StructuralKind {
    If { condition: Expression },
    ElseIf { condition: Expression },
    Else,
    For {
        source: Expression,
        item: String,
        index: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum BindingKind {
    /// `:name` / `v-bind:name`
    Attribute,
    /// `@name` / `v-on:name`
    Event,
    /// `v-html`
    Html,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingDirective {
    pub kind: BindingKind,
    pub name: String,
    pub expression: Expression,
    #[serde(default)]
    pub key: Option<BindingKey>,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsupportedDirective {
    pub name: String,
    pub value: Option<String>,
    #[serde(default)]
    pub location: SourceLocation,
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODE PATHS
// ═══════════════════════════════════════════════════════════════════════════════

/// Child indices from the root. Conditional branches count as one level
/// (branch index) followed by the branch node (always `0`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodePath(pub Vec<usize>);

impl NodePath {
    pub fn root() -> Self {
        NodePath(Vec::new())
    }

    pub fn child(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(index);
        NodePath(segments)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        let parts: Vec<String> = self.0.iter().map(|i| i.to_string()).collect();
        write!(f, "/{}", parts.join("/"))
    }
}

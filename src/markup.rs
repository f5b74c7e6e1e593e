//! MarkupBackend
//!
//! Emits declarative markup for the mini-program families. Every dynamic
//! value is a `{{key}}` placeholder into the binding mapping produced by
//! [`CodegenContext::binding_function_source`]; structural directives become
//! the dialect's native `if`/`elif`/`else`/`for` attributes.
//!
//! References follow the shape of the mapping: inside a conditional chain
//! they go through the group key (`{{a.b}}`), inside a loop through the item
//! alias (`{{item.c}}`).

use std::mem;
use tracing::debug;

use crate::ast::{
    BindingKind, BranchKind, CommentNode, ConditionalGroupNode, ElementKind, ElementNode,
    ForBlockNode,
    InterpolationNode, NodePath, SlotNode, TemplateNode, TextNode,
};
use crate::binding::{js_key, BindingKey, CodegenContext};
use crate::codegen::{check_directives, event_prop_name};
use crate::error::{CodegenError, ERR_TARGET_UNSUPPORTED};
use crate::expression::Expr;
use crate::options::PlatformFamily;
use crate::slots::{FallbackPolicy, OutletBase};
use crate::visitor::{branch_node, emit_children, emit_node, CodegenVisitor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkupDialect {
    /// `wx:` directives, `bind<event>` handlers.
    Weixin,
    /// `a:` directives, `on<Event>` handlers.
    Alipay,
}

impl MarkupDialect {
    pub fn for_platform(platform: PlatformFamily) -> Option<Self> {
        match platform {
            PlatformFamily::Weixin => Some(MarkupDialect::Weixin),
            PlatformFamily::Alipay => Some(MarkupDialect::Alipay),
            _ => None,
        }
    }

    fn directive(self, name: &str) -> String {
        match self {
            MarkupDialect::Weixin => format!("wx:{}", name),
            MarkupDialect::Alipay => format!("a:{}", name),
        }
    }

    fn event_attr(self, event: &str) -> String {
        match self {
            MarkupDialect::Weixin => format!("bind{}", event.replace('-', "")),
            MarkupDialect::Alipay => event_prop_name(event),
        }
    }
}

type Attr = (String, Option<String>);

fn render_attr(name: &str, value: Option<&str>) -> String {
    match value {
        Some(v) => format!(" {}=\"{}\"", name, v.replace('"', "&quot;")),
        None => format!(" {}", name),
    }
}

fn render_attrs(attrs: &[Attr]) -> String {
    attrs
        .iter()
        .map(|(name, value)| render_attr(name, value.as_deref()))
        .collect()
}

/// Wrap in a `<block>` when pending attributes found no owner.
fn wrap_pending(pending: Vec<Attr>, markup: String) -> String {
    if pending.is_empty() {
        return markup;
    }
    format!("<block{}>{}</block>", render_attrs(&pending), markup)
}

fn placeholder(reference: &str) -> String {
    format!("{{{{{}}}}}", reference)
}

pub struct MarkupBackend<'a> {
    dialect: MarkupDialect,
    context: &'a CodegenContext,
    default_outlet: &'static str,
    partial: bool,
    /// Path from the mapping root to the current record.
    scope: Vec<String>,
    /// Structural attributes waiting for the node that owns them.
    pending: Vec<Attr>,
    /// The next element owns a `for`; its `:key` is carried by `wx:key`.
    loop_owner: bool,
    errors: Vec<CodegenError>,
}

impl<'a> MarkupBackend<'a> {
    pub fn new(
        dialect: MarkupDialect,
        context: &'a CodegenContext,
        default_outlet: &'static str,
    ) -> Self {
        Self {
            dialect,
            context,
            default_outlet,
            partial: false,
            scope: Vec::new(),
            pending: Vec::new(),
            loop_owner: false,
            errors: Vec::new(),
        }
    }

    pub fn with_partial_output(mut self, partial: bool) -> Self {
        self.partial = partial;
        self
    }

    pub fn generate(
        mut self,
        nodes: &[TemplateNode],
    ) -> Result<(String, Vec<CodegenError>), CodegenError> {
        let markup = emit_children(&mut self, nodes, &NodePath::root())?.concat();
        debug!(
            bytes = markup.len(),
            keys = self.context.root.entries.len(),
            "markup generated"
        );
        Ok((markup, self.errors))
    }

    fn reference(&self, key: Option<&BindingKey>) -> String {
        let mut parts = self.scope.clone();
        if let Some(key) = key {
            parts.push(key.to_string());
        }
        parts.join(".")
    }

    fn element_attrs(
        &self,
        element: &ElementNode,
        path: &NodePath,
        loop_owner: bool,
    ) -> Result<Vec<Attr>, CodegenError> {
        let mut attrs: Vec<(u32, Attr)> = element
            .attributes
            .iter()
            .map(|a| (a.location.offset, (a.name.clone(), a.value.clone())))
            .collect();

        for binding in element.bindings() {
            let attr = match binding.kind {
                // Loop keys are carried by the `for` attributes.
                BindingKind::Attribute if loop_owner && binding.name == "key" => continue,
                BindingKind::Attribute => (
                    binding.name.clone(),
                    Some(placeholder(&self.reference(binding.key.as_ref()))),
                ),
                BindingKind::Event => match binding.expression.ast() {
                    Expr::Ident(handler) => {
                        (self.dialect.event_attr(&binding.name), Some(handler.clone()))
                    }
                    _ => {
                        return Err(CodegenError::new(
                            ERR_TARGET_UNSUPPORTED,
                            path,
                            binding.location,
                            format!(
                                "handler for `@{}` must name a method on markup targets",
                                binding.name
                            ),
                        ))
                    }
                },
                BindingKind::Html => {
                    return Err(CodegenError::new(
                        ERR_TARGET_UNSUPPORTED,
                        path,
                        binding.location,
                        "v-html cannot be expressed in mini-program markup",
                    ))
                }
            };
            attrs.push((binding.location.offset, attr));
        }

        attrs.sort_by_key(|(offset, _)| *offset);
        Ok(attrs.into_iter().map(|(_, attr)| attr).collect())
    }

    fn slot_presence(&self, slot: &SlotNode, base: &OutletBase) -> String {
        if let Some(outlet) = &slot.keys.outlet {
            return self.reference(Some(outlet));
        }
        match (&slot.keys.name, base) {
            (Some(name), _) => format!("$slots[{}]", self.reference(Some(name))),
            (None, OutletBase::Static(name)) if js_key(name) == *name => format!("$slots.{}", name),
            (None, OutletBase::Static(name)) => format!("$slots['{}']", name),
            (None, OutletBase::Dynamic(expr)) => format!("$slots[{}]", expr.source()),
        }
    }
}

impl<'a> CodegenVisitor for MarkupBackend<'a> {
    type Output = String;

    fn element(&mut self, element: &ElementNode, path: &NodePath) -> Result<String, CodegenError> {
        check_directives(&element.directives, path)?;
        let loop_owner = mem::take(&mut self.loop_owner);
        let mut attrs = mem::take(&mut self.pending);
        attrs.extend(self.element_attrs(element, path, loop_owner)?);
        if element.kind == ElementKind::Component && !element.children.is_empty() {
            // Outlets this component is given content for.
            let provided = format!("{{{{['{}']}}}}", self.default_outlet);
            attrs.push(("u-s".to_string(), Some(provided)));
        }

        let tag = match element.kind {
            ElementKind::Fragment => "block",
            _ => element.tag.as_str(),
        };
        let open = format!("<{}{}", tag, render_attrs(&attrs));
        if element.children.is_empty() && element.self_closing {
            return Ok(format!("{}/>", open));
        }
        let children = emit_children(self, &element.children, path)?.concat();
        Ok(format!("{}>{}</{}>", open, children, tag))
    }

    fn text(&mut self, text: &TextNode, _path: &NodePath) -> Result<String, CodegenError> {
        let pending = mem::take(&mut self.pending);
        Ok(wrap_pending(pending, text.value.clone()))
    }

    fn interpolation(
        &mut self,
        interpolation: &InterpolationNode,
        _path: &NodePath,
    ) -> Result<String, CodegenError> {
        let pending = mem::take(&mut self.pending);
        let value = placeholder(&self.reference(interpolation.key.as_ref()));
        Ok(wrap_pending(pending, value))
    }

    fn slot(&mut self, slot: &SlotNode, path: &NodePath) -> Result<String, CodegenError> {
        check_directives(&slot.directives, path)?;
        let Some(resolution) = slot.resolution.as_ref() else {
            return Err(CodegenError::new(
                ERR_TARGET_UNSUPPORTED,
                path,
                slot.location,
                "slot outlet was not resolved",
            ));
        };
        let pending = mem::take(&mut self.pending);

        let mut attrs: Vec<Attr> = Vec::new();
        match (&slot.keys.name, &resolution.base) {
            (Some(key), _) => {
                let name = placeholder(&self.reference(Some(key)));
                attrs.push(("name".to_string(), Some(name)))
            }
            (None, OutletBase::Static(name)) if name != self.default_outlet => {
                attrs.push(("name".to_string(), Some(name.clone())))
            }
            _ => {}
        }
        if let (Some(outlet), true) = (&slot.keys.outlet, slot.has_props()) {
            let props = format!("{}.props", self.reference(Some(outlet)));
            attrs.push(("props".to_string(), Some(placeholder(&props))));
        }

        if resolution.fallback != FallbackPolicy::DualBranch {
            let mut all = pending;
            all.extend(attrs);
            return Ok(format!("<slot{}/>", render_attrs(&all)));
        }

        let presence = self.slot_presence(slot, &resolution.base);
        let fallback = emit_children(self, &slot.fallback, path)?.concat();
        let markup = format!(
            "<block{}><slot{}/></block><block{}>{}</block>",
            render_attr(&self.dialect.directive("if"), Some(&placeholder(&presence))),
            render_attrs(&attrs),
            render_attr(&self.dialect.directive("else"), None),
            fallback
        );
        Ok(wrap_pending(pending, markup))
    }

    fn conditional_group(
        &mut self,
        group: &ConditionalGroupNode,
        path: &NodePath,
    ) -> Result<String, CodegenError> {
        let outer = mem::take(&mut self.pending);
        let group_key = group.key.as_ref().map(|k| k.to_string()).unwrap_or_default();
        let mut out = String::new();

        for (index, branch) in group.branches.iter().enumerate() {
            let Some((node, node_path)) = branch_node(branch, path, index) else {
                continue;
            };
            self.scope.push(group_key.clone());
            let condition = placeholder(&self.reference(branch.key.as_ref()));
            self.pending = vec![match branch.kind {
                BranchKind::If => (self.dialect.directive("if"), Some(condition)),
                BranchKind::ElseIf => (self.dialect.directive("elif"), Some(condition)),
                BranchKind::Else => (self.dialect.directive("else"), None),
            }];
            let rendered = emit_node(self, node, &node_path);
            self.scope.pop();
            out.push_str(&rendered?);
        }
        Ok(wrap_pending(outer, out))
    }

    fn for_block(&mut self, block: &ForBlockNode, path: &NodePath) -> Result<String, CodegenError> {
        let outer = mem::take(&mut self.pending);
        let mut attrs = vec![
            (
                self.dialect.directive("for"),
                Some(placeholder(&self.reference(block.key.as_ref()))),
            ),
            (self.dialect.directive("for-item"), Some(block.item.clone())),
        ];
        if let Some(TemplateNode::Element(owner)) = block.children.first() {
            if let Some(key) = owner.binding_named("key").and_then(|b| b.key.as_ref()) {
                attrs.push((self.dialect.directive("key"), Some(key.to_string())));
            }
        }

        let saved = mem::replace(&mut self.scope, vec![block.item.clone()]);
        self.pending = attrs;
        self.loop_owner = matches!(block.children.first(), Some(TemplateNode::Element(_)));
        let child = match block.children.first() {
            Some(node) => emit_node(self, node, &path.child(0)),
            None => Ok(String::new()),
        };
        self.scope = saved;
        self.loop_owner = false;
        let leftover = mem::take(&mut self.pending);
        let child = wrap_pending(leftover, child?);
        Ok(wrap_pending(outer, child))
    }

    fn comment(&mut self, comment: &CommentNode, _path: &NodePath) -> Result<String, CodegenError> {
        Ok(format!("<!--{}-->", comment.value))
    }

    fn tolerant(&self) -> bool {
        self.partial
    }

    fn record_error(&mut self, error: CodegenError) {
        self.pending.clear();
        self.loop_owner = false;
        self.errors.push(error);
    }
}

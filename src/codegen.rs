//! FunctionCallBackend
//!
//! Emits one nested node-construction expression per template node for the
//! web, android and ios families. Output is the body of the render function;
//! wrapping it into a unit happens in [`crate::target`].

use tracing::debug;

use crate::ast::{
    BindingKind, CommentNode, ConditionalGroupNode, Directive, ElementKind, ElementNode,
    ForBlockNode, InterpolationNode, NodePath, SlotNode, TemplateNode, TextNode,
};
use crate::binding::{js_key, render_outlet_call, render_thunk, CodegenContext, Thunk};
use crate::error::{
    CodegenError, ERR_DIRECTIVE_CONFLICT, ERR_TARGET_UNSUPPORTED, ERR_UNSUPPORTED_DIRECTIVE,
};
use crate::helpers::{js_string, Helper};
use crate::options::PlatformFamily;
use crate::target::{ComponentRef, ComponentResolver, ComponentSource, FunctionUnit};
use crate::visitor::{branch_node, emit_children, emit_node, CodegenVisitor};

// ═══════════════════════════════════════════════════════════════════════════════
// PATCH FLAGS
// ═══════════════════════════════════════════════════════════════════════════════

pub mod patch_flags {
    pub const TEXT: i32 = 1;
    pub const CLASS: i32 = 1 << 1;
    pub const STYLE: i32 = 1 << 2;
    pub const PROPS: i32 = 1 << 3;
    pub const STABLE_FRAGMENT: i32 = 1 << 6;
    pub const KEYED_FRAGMENT: i32 = 1 << 7;
    pub const UNKEYED_FRAGMENT: i32 = 1 << 8;
    pub const HOISTED: i32 = -1;

    pub(crate) const NAMES: [(i32, &str); 7] = [
        (TEXT, "TEXT"),
        (CLASS, "CLASS"),
        (STYLE, "STYLE"),
        (PROPS, "PROPS"),
        (STABLE_FRAGMENT, "STABLE_FRAGMENT"),
        (KEYED_FRAGMENT, "KEYED_FRAGMENT"),
        (UNKEYED_FRAGMENT, "UNKEYED_FRAGMENT"),
    ];
}

/// `3 /* TEXT, CLASS */`
pub fn render_patch_flag(flag: i32) -> String {
    if flag == patch_flags::HOISTED {
        return "-1 /* HOISTED */".to_string();
    }
    let names: Vec<&str> = patch_flags::NAMES
        .iter()
        .filter(|(bit, _)| flag & bit != 0)
        .map(|(_, name)| *name)
        .collect();
    format!("{} /* {} */", flag, names.join(", "))
}

fn indent(level: usize) -> String {
    "  ".repeat(level)
}

/// `tap` → `onTap`, `long-press` → `onLongPress`
pub fn event_prop_name(event: &str) -> String {
    let mut out = String::from("on");
    for part in event.split('-').filter(|p| !p.is_empty()) {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

/// Reject directives no backend understands, before anything else is emitted.
pub(crate) fn check_directives(
    directives: &[Directive],
    path: &NodePath,
) -> Result<(), CodegenError> {
    for directive in directives {
        if let Directive::Unsupported(u) = directive {
            return Err(CodegenError::new(
                ERR_UNSUPPORTED_DIRECTIVE,
                path,
                u.location,
                format!("directive `{}` is not supported", u.name),
            ));
        }
    }
    Ok(())
}

struct Props {
    literal: Option<String>,
    flag: i32,
    dynamic: Vec<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// BACKEND
// ═══════════════════════════════════════════════════════════════════════════════

pub struct FunctionCallBackend<'a> {
    platform: PlatformFamily,
    context: &'a CodegenContext,
    resolver: &'a dyn ComponentResolver,
    hoist_static: bool,
    partial: bool,
    /// Loop aliases and handler params in scope.
    locals: Vec<String>,
    /// Indent level of the line the current expression starts on.
    level: usize,
    hoisting: bool,
    unit: FunctionUnit,
    errors: Vec<CodegenError>,
}

impl<'a> FunctionCallBackend<'a> {
    pub fn new(
        platform: PlatformFamily,
        context: &'a CodegenContext,
        resolver: &'a dyn ComponentResolver,
    ) -> Self {
        Self {
            platform,
            context,
            resolver,
            hoist_static: false,
            partial: false,
            locals: Vec::new(),
            level: 1,
            hoisting: false,
            unit: FunctionUnit::default(),
            errors: Vec::new(),
        }
    }

    pub fn with_hoisting(mut self, hoist_static: bool) -> Self {
        self.hoist_static = hoist_static;
        self
    }

    pub fn with_partial_output(mut self, partial: bool) -> Self {
        self.partial = partial;
        self
    }

    /// Errors swallowed under partial-output tolerance come back alongside
    /// the unit.
    pub fn generate(
        mut self,
        nodes: &[TemplateNode],
    ) -> Result<(FunctionUnit, Vec<CodegenError>), CodegenError> {
        let root_path = NodePath::root();
        let root = if nodes.len() > 1 {
            let children = self.nested(nodes, &root_path)?;
            let fragment = self.fragment();
            self.call(
                "createElementVNode",
                vec![
                    Some(fragment),
                    None,
                    Some(children),
                    Some(render_patch_flag(patch_flags::STABLE_FRAGMENT)),
                ],
            )
        } else {
            emit_children(&mut self, nodes, &root_path)?
                .pop()
                .unwrap_or_else(|| "null".to_string())
        };
        debug!(
            hoisted = self.unit.hoisted.len(),
            components = self.unit.components.len(),
            "function unit generated"
        );
        self.unit.root = root;
        Ok((self.unit, self.errors))
    }

    fn call(&mut self, callee: &'static str, mut args: Vec<Option<String>>) -> String {
        self.unit.vnode_imports.insert(callee);
        while matches!(args.last(), Some(None)) {
            args.pop();
        }
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.unwrap_or_else(|| "null".to_string()))
            .collect();
        format!("{}({})", callee, args.join(", "))
    }

    fn fragment(&mut self) -> String {
        self.unit.vnode_imports.insert("Fragment");
        "Fragment".to_string()
    }

    /// Children as a multi-line array literal one level deeper.
    fn nested(
        &mut self,
        children: &[TemplateNode],
        parent: &NodePath,
    ) -> Result<String, CodegenError> {
        self.level += 1;
        let items = emit_children(self, children, parent);
        self.level -= 1;
        let items = items?;
        if items.is_empty() {
            return Ok("[]".to_string());
        }
        let inner = indent(self.level + 1);
        let lines: Vec<String> = items.iter().map(|i| format!("{}{}", inner, i)).collect();
        Ok(format!("[\n{}\n{}]", lines.join(",\n"), indent(self.level)))
    }

    fn display(&mut self, interpolation: &InterpolationNode) -> String {
        self.unit.helpers.insert(Helper::Display);
        let context = self.context;
        match interpolation.key.as_ref().and_then(|k| context.thunk(k)) {
            Some(thunk) => render_thunk(thunk, &self.locals, self.level),
            None => format!(
                "{}({})",
                Helper::Display.alias(),
                interpolation.expression.render(&self.locals)
            ),
        }
    }

    fn component(&mut self, tag: &str) -> String {
        if let Some(existing) = self.unit.components.iter().find(|c| c.tag == tag) {
            return existing.variable();
        }
        let component = ComponentRef::lookup(tag, self.resolver);
        match component.source {
            ComponentSource::Runtime => {
                self.unit.vnode_imports.insert("resolveComponent");
            }
            ComponentSource::Local(_) => {
                self.unit.vnode_imports.insert("resolveEasyComponent");
            }
            ComponentSource::Resolved(_) => {}
        }
        let variable = component.variable();
        self.unit.components.push(component);
        variable
    }

    fn props(&mut self, element: &ElementNode) -> Props {
        let mut entries: Vec<(u32, String, String)> = element
            .attributes
            .iter()
            .map(|a| {
                let value = match &a.value {
                    Some(v) => js_string(v),
                    None => "true".to_string(),
                };
                (a.location.offset, a.name.clone(), value)
            })
            .collect();

        let mut flag = 0;
        let mut dynamic = Vec::new();
        for binding in element.bindings() {
            let (name, value) = match binding.kind {
                BindingKind::Attribute => {
                    match binding.name.as_str() {
                        "class" => flag |= patch_flags::CLASS,
                        "style" => flag |= patch_flags::STYLE,
                        "key" => {}
                        other => {
                            flag |= patch_flags::PROPS;
                            dynamic.push(other.to_string());
                        }
                    }
                    (binding.name.clone(), binding.expression.render(&self.locals))
                }
                BindingKind::Event => {
                    let handler = if binding.expression.is_handler_reference() {
                        binding.expression.render(&self.locals)
                    } else {
                        let mut locals = self.locals.clone();
                        locals.push("$event".to_string());
                        format!("$event => ({})", binding.expression.render(&locals))
                    };
                    (event_prop_name(&binding.name), handler)
                }
                BindingKind::Html => {
                    flag |= patch_flags::PROPS;
                    dynamic.push(binding.name.clone());
                    (binding.name.clone(), binding.expression.render(&self.locals))
                }
            };
            entries.push((binding.location.offset, name, value));
        }
        entries.sort_by_key(|(offset, _, _)| *offset);

        let literal = if entries.is_empty() {
            None
        } else if self.platform.is_typed() {
            let pairs: Vec<String> = entries
                .iter()
                .map(|(_, name, value)| format!("[{}, {}]", js_string(name), value))
                .collect();
            Some(format!("new Map<string, any | null>([{}])", pairs.join(", ")))
        } else {
            let fields: Vec<String> = entries
                .iter()
                .map(|(_, name, value)| format!("{}: {}", js_key(name), value))
                .collect();
            Some(format!("{{ {} }}", fields.join(", ")))
        };

        Props {
            literal,
            flag,
            dynamic,
        }
    }

    /// Text-only children collapse into one string expression.
    fn text_children(&mut self, children: &[TemplateNode]) -> Option<(String, bool)> {
        if children.is_empty() || !children.iter().all(TemplateNode::is_text_like) {
            return None;
        }
        let mut dynamic = false;
        let parts: Vec<String> = children
            .iter()
            .map(|child| match child {
                TemplateNode::Interpolation(i) => {
                    dynamic = true;
                    self.display(i)
                }
                TemplateNode::Text(t) => js_string(&t.value),
                _ => String::new(),
            })
            .collect();
        Some((parts.join(" + "), dynamic))
    }

    fn element_call(
        &mut self,
        element: &ElementNode,
        path: &NodePath,
        hoisted: bool,
    ) -> Result<String, CodegenError> {
        let has_html = element.bindings().any(|b| b.kind == BindingKind::Html);
        if has_html && !element.children.is_empty() {
            return Err(CodegenError::new(
                ERR_DIRECTIVE_CONFLICT,
                path,
                element.location,
                format!("<{}> has both v-html and child content", element.tag),
            ));
        }

        let props = self.props(element);
        let mut flag = props.flag;

        let children = match element.kind {
            ElementKind::Native => match self.text_children(&element.children) {
                Some((text, dynamic)) => {
                    if dynamic {
                        flag |= patch_flags::TEXT;
                    }
                    Some(text)
                }
                None if element.children.is_empty() => None,
                None => Some(self.nested(&element.children, path)?),
            },
            ElementKind::Component if element.children.is_empty() => None,
            ElementKind::Component => {
                let children = self.nested(&element.children, path)?;
                Some(format!("{{ default: () => {} }}", children))
            }
            ElementKind::Fragment => {
                flag |= patch_flags::STABLE_FRAGMENT;
                Some(self.nested(&element.children, path)?)
            }
        };

        let (callee, tag) = match element.kind {
            ElementKind::Native => ("createElementVNode", js_string(&element.tag)),
            ElementKind::Component => ("createVNode", self.component(&element.tag)),
            ElementKind::Fragment => ("createElementVNode", self.fragment()),
        };

        let flag_arg = if hoisted {
            Some(render_patch_flag(patch_flags::HOISTED))
        } else if flag != 0 {
            Some(render_patch_flag(flag))
        } else {
            None
        };
        let dynamic_arg = if !hoisted && !props.dynamic.is_empty() {
            let names: Vec<String> = props.dynamic.iter().map(|n| js_string(n)).collect();
            Some(format!("[{}]", names.join(", ")))
        } else {
            None
        };

        Ok(self.call(
            callee,
            vec![Some(tag), props.literal, children, flag_arg, dynamic_arg],
        ))
    }

    fn hoist(&mut self, element: &ElementNode, path: &NodePath) -> Result<String, CodegenError> {
        let saved = self.level;
        self.level = 0;
        self.hoisting = true;
        let result = self.element_call(element, path, true);
        self.level = saved;
        self.hoisting = false;
        let expression = result?;
        let name = format!("_hoisted_{}", self.unit.hoisted.len() + 1);
        self.unit.hoisted.push(format!("const {} = {}", name, expression));
        Ok(name)
    }
}

impl<'a> CodegenVisitor for FunctionCallBackend<'a> {
    type Output = String;

    fn element(&mut self, element: &ElementNode, path: &NodePath) -> Result<String, CodegenError> {
        check_directives(&element.directives, path)?;
        let nested = path.0.len() > 1;
        if self.hoist_static && !self.hoisting && element.is_static && nested {
            return self.hoist(element, path);
        }
        self.element_call(element, path, false)
    }

    fn text(&mut self, text: &TextNode, _path: &NodePath) -> Result<String, CodegenError> {
        Ok(self.call("createTextVNode", vec![Some(js_string(&text.value))]))
    }

    fn interpolation(
        &mut self,
        interpolation: &InterpolationNode,
        _path: &NodePath,
    ) -> Result<String, CodegenError> {
        let value = self.display(interpolation);
        Ok(self.call(
            "createTextVNode",
            vec![Some(value), Some(render_patch_flag(patch_flags::TEXT))],
        ))
    }

    fn slot(&mut self, slot: &SlotNode, path: &NodePath) -> Result<String, CodegenError> {
        check_directives(&slot.directives, path)?;
        let context = self.context;
        let outlet = match slot.keys.outlet.as_ref().and_then(|k| context.thunk(k)) {
            Some(Thunk::Outlet(outlet)) => outlet,
            _ => {
                return Err(CodegenError::new(
                    ERR_TARGET_UNSUPPORTED,
                    path,
                    slot.location,
                    "slot outlet was not resolved",
                ))
            }
        };
        self.unit.helpers.insert(Helper::ResolveOutlet);
        let call = render_outlet_call(outlet, &self.locals);

        let fallback = match slot.fallback.len() {
            0 => return Ok(call),
            1 => emit_node(self, &slot.fallback[0], &path.child(0))?,
            _ => {
                let children = self.nested(&slot.fallback, path)?;
                let fragment = self.fragment();
                self.call(
                    "createElementVNode",
                    vec![
                        Some(fragment),
                        None,
                        Some(children),
                        Some(render_patch_flag(patch_flags::STABLE_FRAGMENT)),
                    ],
                )
            }
        };
        Ok(format!("{} ?? {}", call, fallback))
    }

    fn conditional_group(
        &mut self,
        group: &ConditionalGroupNode,
        path: &NodePath,
    ) -> Result<String, CodegenError> {
        let mut out = String::new();
        let mut alternate = None;
        for (index, branch) in group.branches.iter().enumerate() {
            let Some((node, node_path)) = branch_node(branch, path, index) else {
                continue;
            };
            let rendered = emit_node(self, node, &node_path)?;
            match &branch.condition {
                Some(condition) => {
                    out.push_str(&condition.render_operand(&self.locals));
                    out.push_str(" ? ");
                    out.push_str(&rendered);
                    out.push_str(" : ");
                }
                None => alternate = Some(rendered),
            }
        }
        let alternate = match alternate {
            Some(node) => node,
            None => self.call(
                "createCommentVNode",
                vec![Some("\"v-if\"".to_string()), Some("true".to_string())],
            ),
        };
        out.push_str(&alternate);
        Ok(out)
    }

    fn for_block(&mut self, block: &ForBlockNode, path: &NodePath) -> Result<String, CodegenError> {
        let keyed = matches!(
            block.children.first(),
            Some(TemplateNode::Element(el)) if el.binding_named("key").is_some()
        );
        let source = block.source.render(&self.locals);
        let params = vec![
            block.item.clone(),
            block.index.clone().unwrap_or_else(|| "_".to_string()),
            block.path_var(),
        ];

        let scope = self.locals.len();
        self.locals.extend(block.locals());
        let child = match block.children.first() {
            Some(node) => emit_node(self, node, &path.child(0)),
            None => Ok("null".to_string()),
        };
        self.locals.truncate(scope);
        let child = child?;

        self.unit.helpers.insert(Helper::ForEach);
        let items = format!(
            "{}({}, ({}) => {})",
            Helper::ForEach.alias(),
            source,
            params.join(", "),
            child
        );
        let flag = if keyed {
            patch_flags::KEYED_FRAGMENT
        } else {
            patch_flags::UNKEYED_FRAGMENT
        };
        let fragment = self.fragment();
        Ok(self.call(
            "createElementVNode",
            vec![Some(fragment), None, Some(items), Some(render_patch_flag(flag))],
        ))
    }

    fn comment(&mut self, comment: &CommentNode, _path: &NodePath) -> Result<String, CodegenError> {
        Ok(self.call("createCommentVNode", vec![Some(js_string(&comment.value))]))
    }

    fn tolerant(&self) -> bool {
        self.partial
    }

    fn record_error(&mut self, error: CodegenError) {
        self.errors.push(error);
    }
}

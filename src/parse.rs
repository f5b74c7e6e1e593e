//! AST Lowering
//!
//! Turns template source into the canonical [`TemplateNode`] tree in two steps:
//! a position-tracking scanner produces raw elements, text, interpolations and
//! comments; lowering then classifies attributes into directives, groups
//! `v-if`/`v-else-if`/`v-else` runs, wraps `v-for` owners and computes the
//! static hint. Any failure is a [`ParseError`] and aborts the compile.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use tracing::trace;

use crate::ast::{
    Attribute, BindingDirective, BindingKind, BranchKind, CommentNode, ConditionalBranch,
    ConditionalGroupNode, Directive, ElementKind, ElementNode, ForBlockNode, InterpolationNode,
    SlotKeys, SlotNode, SourceLocation, StructuralDirective, StructuralKind, TemplateNode,
    TextNode, UnsupportedDirective,
};
use crate::error::ParseError;
use crate::expression::Expression;
use crate::options::{PlatformFamily, WhitespaceMode};

lazy_static! {
    static ref TAG_NAME_RE: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9_.:-]*").unwrap();
    static ref CLOSE_TAG_RE: Regex = Regex::new(r"^</([A-Za-z][A-Za-z0-9_.:-]*)\s*>").unwrap();
    static ref ATTR_NAME_RE: Regex = Regex::new(r#"^[^\s"'<>/=]+"#).unwrap();
    static ref UNQUOTED_VALUE_RE: Regex = Regex::new(r#"^[^\s"'=<>`]+"#).unwrap();
    static ref WHITESPACE_RUN_RE: Regex = Regex::new(r"\s+").unwrap();
    static ref FOR_RE: Regex = Regex::new(
        r"^\s*(?:\(\s*([A-Za-z_$][\w$]*)\s*(?:,\s*([A-Za-z_$][\w$]*)\s*)?\)|([A-Za-z_$][\w$]*))\s+(?:in|of)\s+(.+?)\s*$"
    )
    .unwrap();

    /// Built-in components of the uni runtime, native on every platform.
    static ref NATIVE_TAGS: HashSet<&'static str> = [
        "view", "text", "image", "button", "input", "textarea", "scroll-view", "swiper",
        "swiper-item", "navigator", "icon", "progress", "checkbox", "checkbox-group", "radio",
        "radio-group", "switch", "slider", "picker", "picker-view", "picker-view-column",
        "label", "form", "video", "map", "canvas", "web-view", "rich-text", "block",
        "list-view", "list-item", "sticky-header", "sticky-section", "movable-area",
        "movable-view", "cover-view", "cover-image",
    ]
    .into_iter()
    .collect();

    static ref HTML_TAGS: HashSet<&'static str> = [
        "div", "span", "p", "a", "ul", "ol", "li", "img", "br", "hr", "h1", "h2", "h3", "h4",
        "h5", "h6", "section", "header", "footer", "main", "nav", "article", "aside", "table",
        "thead", "tbody", "tr", "td", "th", "em", "strong", "b", "i", "small", "pre", "code",
        "select", "option", "svg", "path",
    ]
    .into_iter()
    .collect();

    static ref VOID_TAGS: HashSet<&'static str> = [
        "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
        "track", "wbr",
    ]
    .into_iter()
    .collect();
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    pub whitespace: WhitespaceMode,
    pub platform: PlatformFamily,
}

pub fn parse_template(
    source: &str,
    options: &ParseOptions,
) -> Result<Vec<TemplateNode>, ParseError> {
    let lines = LineIndex::new(source);
    let mut scanner = Scanner {
        src: source,
        pos: 0,
        lines: &lines,
    };
    let raw = scanner.parse_nodes(None)?;
    let lowerer = Lowerer {
        options,
        src: source,
        lines: &lines,
    };
    lowerer.lower_children(raw, 0)
}

pub fn is_native_tag(tag: &str, platform: PlatformFamily) -> bool {
    NATIVE_TAGS.contains(tag) || (platform == PlatformFamily::Web && HTML_TAGS.contains(tag))
}

// ═══════════════════════════════════════════════════════════════════════════════
// POSITIONS
// ═══════════════════════════════════════════════════════════════════════════════

struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(src: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(src.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    fn locate(&self, src: &str, offset: usize) -> SourceLocation {
        let offset = offset.min(src.len());
        let line = self.starts.partition_point(|&s| s <= offset);
        let line_start = self.starts[line.saturating_sub(1)];
        let column = src
            .get(line_start..offset)
            .map(|s| s.chars().count())
            .unwrap_or(0)
            + 1;
        SourceLocation {
            line: line as u32,
            column: column as u32,
            offset: offset as u32,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCANNER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
enum RawNode {
    Element(RawElement),
    Text { value: String, start: usize },
    Interpolation { source: String, start: usize },
    Comment { value: String, start: usize },
}

#[derive(Debug)]
struct RawElement {
    tag: String,
    attrs: Vec<RawAttr>,
    children: Vec<RawNode>,
    self_closing: bool,
    start: usize,
}

#[derive(Debug)]
struct RawAttr {
    name: String,
    value: Option<String>,
    start: usize,
    value_start: usize,
}

struct Scanner<'s> {
    src: &'s str,
    pos: usize,
    lines: &'s LineIndex,
}

impl<'s> Scanner<'s> {
    fn error(&self, offset: usize, message: impl Into<String>) -> ParseError {
        ParseError::new(self.lines.locate(self.src, offset), message)
    }

    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn at_markup(&self) -> bool {
        let rest = self.rest();
        rest.starts_with("<!--")
            || rest.starts_with("</")
            || (rest.starts_with('<')
                && rest[1..].chars().next().map(|c| c.is_ascii_alphabetic()).unwrap_or(false))
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn parse_nodes(&mut self, parent: Option<(&str, usize)>) -> Result<Vec<RawNode>, ParseError> {
        let mut nodes = Vec::new();
        loop {
            if self.pos >= self.src.len() {
                return match parent {
                    Some((tag, start)) => {
                        Err(self.error(start, format!("element <{}> is not closed", tag)))
                    }
                    None => Ok(nodes),
                };
            }

            let rest = self.rest();
            if rest.starts_with("<!--") {
                let start = self.pos;
                let Some(end) = rest[4..].find("-->") else {
                    return Err(self.error(start, "unterminated comment"));
                };
                nodes.push(RawNode::Comment {
                    value: rest[4..4 + end].to_string(),
                    start,
                });
                self.pos += 4 + end + 3;
            } else if rest.starts_with("</") {
                let start = self.pos;
                let Some(caps) = CLOSE_TAG_RE.captures(rest) else {
                    return Err(self.error(start, "malformed closing tag"));
                };
                let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                return match parent {
                    Some((tag, _)) if tag == name => {
                        self.pos += caps.get(0).map(|m| m.len()).unwrap_or(0);
                        Ok(nodes)
                    }
                    Some((tag, _)) => Err(self.error(
                        start,
                        format!("expected </{}> but found </{}>", tag, name),
                    )),
                    None => Err(self.error(start, format!("unexpected closing tag </{}>", name))),
                };
            } else if self.at_markup() {
                let element = self.parse_element()?;
                nodes.push(RawNode::Element(element));
            } else {
                self.scan_text(&mut nodes)?;
            }
        }
    }

    fn scan_text(&mut self, nodes: &mut Vec<RawNode>) -> Result<(), ParseError> {
        let mut run_start = self.pos;
        while self.pos < self.src.len() && !self.at_markup() {
            if self.rest().starts_with("{{") {
                if self.pos > run_start {
                    nodes.push(RawNode::Text {
                        value: self.src[run_start..self.pos].to_string(),
                        start: run_start,
                    });
                }
                let open = self.pos;
                let Some(close) = self.src[open + 2..].find("}}") else {
                    return Err(self.error(open, "unterminated interpolation"));
                };
                nodes.push(RawNode::Interpolation {
                    source: self.src[open + 2..open + 2 + close].to_string(),
                    start: open + 2,
                });
                self.pos = open + 2 + close + 2;
                run_start = self.pos;
                continue;
            }
            let step = self.rest().chars().next().map(char::len_utf8).unwrap_or(1);
            self.pos += step;
        }
        if self.pos > run_start {
            nodes.push(RawNode::Text {
                value: self.src[run_start..self.pos].to_string(),
                start: run_start,
            });
        }
        Ok(())
    }

    fn parse_element(&mut self) -> Result<RawElement, ParseError> {
        let start = self.pos;
        self.pos += 1;
        let tag = match TAG_NAME_RE.find(self.rest()) {
            Some(m) => m.as_str().to_string(),
            None => return Err(self.error(start, "malformed tag")),
        };
        self.pos += tag.len();

        let mut attrs = Vec::new();
        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                return Err(self.error(start, format!("unterminated start tag <{}>", tag)));
            }
            if rest.starts_with("/>") {
                self.pos += 2;
                return Ok(RawElement {
                    tag,
                    attrs,
                    children: Vec::new(),
                    self_closing: true,
                    start,
                });
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break;
            }
            attrs.push(self.parse_attribute()?);
        }

        if VOID_TAGS.contains(tag.as_str()) {
            return Ok(RawElement {
                tag,
                attrs,
                children: Vec::new(),
                self_closing: true,
                start,
            });
        }

        let children = self.parse_nodes(Some((&tag, start)))?;
        Ok(RawElement {
            tag,
            attrs,
            children,
            self_closing: false,
            start,
        })
    }

    fn parse_attribute(&mut self) -> Result<RawAttr, ParseError> {
        let start = self.pos;
        let name = match ATTR_NAME_RE.find(self.rest()) {
            Some(m) => m.as_str().to_string(),
            None => return Err(self.error(start, "malformed attribute")),
        };
        self.pos += name.len();

        let after_name = self.pos;
        self.skip_whitespace();
        if !self.rest().starts_with('=') {
            self.pos = after_name;
            return Ok(RawAttr {
                name,
                value: None,
                start,
                value_start: after_name,
            });
        }
        self.pos += 1;
        self.skip_whitespace();

        let rest = self.rest();
        let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'');
        if let Some(q) = quote {
            let value_start = self.pos + 1;
            let Some(len) = rest[1..].find(q) else {
                return Err(self.error(
                    self.pos,
                    format!("unterminated value for attribute `{}`", name),
                ));
            };
            self.pos = value_start + len + 1;
            return Ok(RawAttr {
                name,
                value: Some(self.src[value_start..value_start + len].to_string()),
                start,
                value_start,
            });
        }

        match UNQUOTED_VALUE_RE.find(rest) {
            Some(m) => {
                let value_start = self.pos;
                self.pos += m.len();
                Ok(RawAttr {
                    name,
                    value: Some(m.as_str().to_string()),
                    start,
                    value_start,
                })
            }
            None => Err(self.error(self.pos, format!("missing value for attribute `{}`", name))),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOWERING
// ═══════════════════════════════════════════════════════════════════════════════

/// Structural role an element plays among its siblings.
enum Chain {
    If(Expression),
    ElseIf(Expression),
    Else,
}

struct LoopSpec {
    source: Expression,
    item: String,
    index: Option<String>,
}

struct Lowered {
    node: TemplateNode,
    chain: Option<Chain>,
    location: SourceLocation,
}

struct Lowerer<'a> {
    options: &'a ParseOptions,
    src: &'a str,
    lines: &'a LineIndex,
}

impl<'a> Lowerer<'a> {
    fn locate(&self, offset: usize) -> SourceLocation {
        self.lines.locate(self.src, offset)
    }

    fn attr_expression(
        &self,
        attr: &RawAttr,
        location: SourceLocation,
    ) -> Result<Expression, ParseError> {
        self.expression(required_value(attr, location)?, attr.value_start)
    }

    fn expression(&self, value: &str, value_start: usize) -> Result<Expression, ParseError> {
        let leading = value.len() - value.trim_start().len();
        Expression::parse(value).map_err(|err| {
            ParseError::new(
                self.locate(value_start + leading + err.offset as usize),
                err.message,
            )
        })
    }

    fn lower_children(
        &self,
        raw: Vec<RawNode>,
        depth: usize,
    ) -> Result<Vec<TemplateNode>, ParseError> {
        let raw = self.apply_whitespace(raw);

        let mut out: Vec<TemplateNode> = Vec::new();
        // Index into `out` of the chain that may still take else-if/else.
        let mut open_group: Option<usize> = None;
        let mut skipped: Vec<TemplateNode> = Vec::new();

        for node in raw {
            let lowered = self.lower_node(node, depth)?;
            let skippable = match &lowered.node {
                TemplateNode::Comment(_) => true,
                TemplateNode::Text(t) => t.value.trim().is_empty(),
                _ => false,
            };

            match lowered.chain {
                Some(Chain::If(condition)) => {
                    out.append(&mut skipped);
                    out.push(TemplateNode::ConditionalGroup(ConditionalGroupNode {
                        branches: vec![ConditionalBranch {
                            kind: BranchKind::If,
                            condition: Some(condition),
                            children: vec![lowered.node],
                            key: None,
                            location: lowered.location,
                        }],
                        key: None,
                        location: lowered.location,
                    }));
                    open_group = Some(out.len() - 1);
                }
                Some(chain @ (Chain::ElseIf(_) | Chain::Else)) => {
                    let (kind, condition, directive) = match chain {
                        Chain::ElseIf(c) => (BranchKind::ElseIf, Some(c), "v-else-if"),
                        _ => (BranchKind::Else, None, "v-else"),
                    };
                    let group = match open_group {
                        Some(i) => match out.get_mut(i) {
                            Some(TemplateNode::ConditionalGroup(g)) => Some(g),
                            _ => None,
                        },
                        None => None,
                    };
                    let Some(group) = group else {
                        return Err(ParseError::new(
                            lowered.location,
                            format!("{} has no adjacent v-if or v-else-if", directive),
                        ));
                    };
                    // Comments and blank text between branches are dropped.
                    skipped.clear();
                    group.branches.push(ConditionalBranch {
                        kind,
                        condition,
                        children: vec![lowered.node],
                        key: None,
                        location: lowered.location,
                    });
                    if kind == BranchKind::Else {
                        open_group = None;
                    }
                }
                None if skippable && open_group.is_some() => skipped.push(lowered.node),
                None => {
                    out.append(&mut skipped);
                    open_group = None;
                    out.push(lowered.node);
                }
            }
        }
        out.append(&mut skipped);
        Ok(out)
    }

    fn apply_whitespace(&self, raw: Vec<RawNode>) -> Vec<RawNode> {
        if self.options.whitespace == WhitespaceMode::Preserve {
            return raw;
        }

        let is_element = |n: Option<&RawNode>| matches!(n, Some(RawNode::Element(_)));
        let is_comment = |n: Option<&RawNode>| matches!(n, Some(RawNode::Comment { .. }));

        let mut keep = Vec::with_capacity(raw.len());
        for i in 0..raw.len() {
            let condensed = match &raw[i] {
                RawNode::Text { value, .. } if value.trim().is_empty() => {
                    let prev = if i == 0 { None } else { raw.get(i - 1) };
                    let next = raw.get(i + 1);
                    let drop = prev.is_none()
                        || next.is_none()
                        || is_comment(prev)
                        || is_comment(next)
                        || (is_element(prev) && is_element(next) && value.contains('\n'));
                    if drop {
                        None
                    } else {
                        Some(" ".to_string())
                    }
                }
                RawNode::Text { value, .. } => {
                    Some(WHITESPACE_RUN_RE.replace_all(value, " ").into_owned())
                }
                _ => Some(String::new()),
            };
            keep.push(condensed);
        }

        raw.into_iter()
            .zip(keep)
            .filter_map(|(node, condensed)| match (node, condensed) {
                (_, None) => None,
                (RawNode::Text { start, .. }, Some(value)) => Some(RawNode::Text { value, start }),
                (node, Some(_)) => Some(node),
            })
            .collect()
    }

    fn lower_node(&self, node: RawNode, depth: usize) -> Result<Lowered, ParseError> {
        match node {
            RawNode::Text { value, start } => {
                let location = self.locate(start);
                Ok(Lowered {
                    node: TemplateNode::Text(TextNode { value, location }),
                    chain: None,
                    location,
                })
            }
            RawNode::Interpolation { source, start } => {
                let location = self.locate(start);
                let expression = self.expression(&source, start)?;
                Ok(Lowered {
                    node: TemplateNode::Interpolation(InterpolationNode {
                        expression,
                        key: None,
                        location,
                    }),
                    chain: None,
                    location,
                })
            }
            RawNode::Comment { value, start } => {
                let location = self.locate(start);
                Ok(Lowered {
                    node: TemplateNode::Comment(CommentNode { value, location }),
                    chain: None,
                    location,
                })
            }
            RawNode::Element(element) => self.lower_element(element, depth),
        }
    }

    fn lower_element(&self, raw: RawElement, depth: usize) -> Result<Lowered, ParseError> {
        let location = self.locate(raw.start);
        let mut attributes = Vec::new();
        let mut directives = Vec::new();
        let mut chain: Option<Chain> = None;
        let mut looped: Option<LoopSpec> = None;

        for attr in raw.attrs {
            let attr_location = self.locate(attr.start);
            let name = attr.name.as_str();

            match name {
                "v-if" | "v-else-if" | "v-else" => {
                    if chain.is_some() {
                        return Err(duplicate_structural(attr_location));
                    }
                    let (kind, c) = match name {
                        "v-if" => {
                            let e = self.attr_expression(&attr, attr_location)?;
                            (StructuralKind::If { condition: e.clone() }, Chain::If(e))
                        }
                        "v-else-if" => {
                            let e = self.attr_expression(&attr, attr_location)?;
                            (StructuralKind::ElseIf { condition: e.clone() }, Chain::ElseIf(e))
                        }
                        _ => {
                            if attr.value.as_deref().is_some_and(|v| !v.trim().is_empty()) {
                                return Err(ParseError::new(
                                    attr_location,
                                    "v-else does not take a value",
                                ));
                            }
                            (StructuralKind::Else, Chain::Else)
                        }
                    };
                    chain = Some(c);
                    directives.push(Directive::Structural(StructuralDirective {
                        kind,
                        location: attr_location,
                    }));
                }
                "v-for" => {
                    if looped.is_some() {
                        return Err(duplicate_structural(attr_location));
                    }
                    let value = required_value(&attr, attr_location)?;
                    let spec = self.parse_for(value, attr.value_start, attr_location)?;
                    directives.push(Directive::Structural(StructuralDirective {
                        kind: StructuralKind::For {
                            source: spec.source.clone(),
                            item: spec.item.clone(),
                            index: spec.index.clone(),
                        },
                        location: attr_location,
                    }));
                    looped = Some(spec);
                }
                "v-html" => {
                    let expression = self.attr_expression(&attr, attr_location)?;
                    directives.push(Directive::Binding(BindingDirective {
                        kind: BindingKind::Html,
                        name: "innerHTML".to_string(),
                        expression,
                        key: None,
                        location: attr_location,
                    }));
                }
                _ => {
                    let bound = name.strip_prefix(':').or_else(|| name.strip_prefix("v-bind:"));
                    let listened = name.strip_prefix('@').or_else(|| name.strip_prefix("v-on:"));
                    let binding = match (bound, listened) {
                        (Some(arg), _) => Some((BindingKind::Attribute, arg)),
                        (None, Some(arg)) => Some((BindingKind::Event, arg)),
                        (None, None) => None,
                    };

                    match binding {
                        Some((kind, arg)) if !arg.is_empty() && !arg.contains('.') => {
                            let expression = self.attr_expression(&attr, attr_location)?;
                            directives.push(Directive::Binding(BindingDirective {
                                kind,
                                name: arg.to_string(),
                                expression,
                                key: None,
                                location: attr_location,
                            }));
                        }
                        Some(_) => directives.push(unsupported(&attr, attr_location)),
                        None if name.starts_with("v-") || name.starts_with('#') => {
                            directives.push(unsupported(&attr, attr_location))
                        }
                        None => attributes.push(Attribute {
                            name: attr.name.clone(),
                            value: attr.value.clone(),
                            location: attr_location,
                        }),
                    }
                }
            }
        }

        let child_depth = if looped.is_some() { depth + 1 } else { depth };
        let children = self.lower_children(raw.children, child_depth)?;

        let node = if raw.tag == "slot" {
            self.lower_slot(attributes, directives, children, raw.self_closing, location)?
        } else {
            let kind = if raw.tag == "template" {
                ElementKind::Fragment
            } else if is_native_tag(&raw.tag, self.options.platform) {
                ElementKind::Native
            } else {
                ElementKind::Component
            };
            let is_static = kind == ElementKind::Native
                && directives.is_empty()
                && children.iter().all(TemplateNode::is_static);
            TemplateNode::Element(ElementNode {
                tag: raw.tag,
                kind,
                attributes,
                directives,
                children,
                self_closing: raw.self_closing,
                is_static,
                location,
            })
        };

        let node = match looped {
            Some(spec) => {
                trace!(item = %spec.item, depth, "wrapping v-for owner");
                TemplateNode::ForBlock(ForBlockNode {
                    source: spec.source,
                    item: spec.item,
                    index: spec.index,
                    depth,
                    children: vec![node],
                    key: None,
                    location,
                })
            }
            None => node,
        };

        Ok(Lowered {
            node,
            chain,
            location,
        })
    }

    fn lower_slot(
        &self,
        attributes: Vec<Attribute>,
        directives: Vec<Directive>,
        fallback: Vec<TemplateNode>,
        self_closing: bool,
        location: SourceLocation,
    ) -> Result<TemplateNode, ParseError> {
        let mut static_name = None;
        let mut rest_attrs = Vec::new();
        for attr in attributes {
            if attr.name == "name" {
                static_name = Some(attr.value.unwrap_or_default());
            } else {
                rest_attrs.push(attr);
            }
        }

        let mut dynamic_name = None;
        let mut rest_directives = Vec::new();
        for directive in directives {
            match directive {
                Directive::Binding(b) if b.kind == BindingKind::Attribute && b.name == "name" => {
                    dynamic_name = Some(b.expression)
                }
                other => rest_directives.push(other),
            }
        }

        if static_name.is_some() && dynamic_name.is_some() {
            return Err(ParseError::new(location, "slot has both a static and a dynamic name"));
        }

        Ok(TemplateNode::Slot(SlotNode {
            static_name,
            dynamic_name,
            attributes: rest_attrs,
            directives: rest_directives,
            fallback,
            self_closing,
            resolution: None,
            keys: SlotKeys::default(),
            location,
        }))
    }

    fn parse_for(
        &self,
        value: &str,
        value_start: usize,
        location: SourceLocation,
    ) -> Result<LoopSpec, ParseError> {
        let Some(caps) = FOR_RE.captures(value) else {
            return Err(ParseError::new(location, format!("invalid v-for expression `{}`", value)));
        };
        let item = caps
            .get(1)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        let index = caps.get(2).map(|m| m.as_str().to_string());
        let Some(source) = caps.get(4) else {
            return Err(ParseError::new(location, format!("invalid v-for expression `{}`", value)));
        };
        let source_expr = self.expression(source.as_str(), value_start + source.start())?;
        Ok(LoopSpec {
            source: source_expr,
            item,
            index,
        })
    }
}

fn duplicate_structural(location: SourceLocation) -> ParseError {
    ParseError::new(location, "duplicate structural directive")
}

fn required_value(attr: &RawAttr, location: SourceLocation) -> Result<&str, ParseError> {
    match attr.value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ParseError::new(
            location,
            format!("{} requires an expression", attr.name),
        )),
    }
}

fn unsupported(attr: &RawAttr, location: SourceLocation) -> Directive {
    Directive::Unsupported(UnsupportedDirective {
        name: attr.name.clone(),
        value: attr.value.clone(),
        location,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Vec<TemplateNode> {
        parse_template(src, &ParseOptions::default()).unwrap()
    }

    fn parse_err(src: &str) -> ParseError {
        parse_template(src, &ParseOptions::default()).unwrap_err()
    }

    #[test]
    fn test_parse_element_and_text() {
        let nodes = parse("<view class=\"box\">Hello</view>");
        assert_eq!(nodes.len(), 1);
        let TemplateNode::Element(el) = &nodes[0] else { panic!("expected element") };
        assert_eq!(el.tag, "view");
        assert_eq!(el.attributes[0].name, "class");
        assert_eq!(el.attributes[0].value.as_deref(), Some("box"));
        assert!(el.is_static);
        assert!(matches!(&el.children[0], TemplateNode::Text(t) if t.value == "Hello"));
    }

    #[test]
    fn test_self_closing_and_void() {
        let nodes = parse("<view/><input type=\"text\">");
        assert_eq!(nodes.len(), 2);
        assert!(matches!(&nodes[0], TemplateNode::Element(e) if e.self_closing));
        assert!(matches!(
            &nodes[1],
            TemplateNode::Element(e) if e.tag == "input" && e.self_closing
        ));
    }

    #[test]
    fn test_mixed_text_and_interpolation() {
        let nodes = parse("<text>Hi {{ name }}!</text>");
        let TemplateNode::Element(el) = &nodes[0] else { panic!() };
        assert_eq!(el.children.len(), 3);
        assert!(matches!(
            &el.children[1],
            TemplateNode::Interpolation(i) if i.expression.source() == "name"
        ));
        assert!(!el.is_static);
    }

    #[test]
    fn test_bindings_and_events() {
        let nodes =
            parse("<view :title=\"t\" @tap=\"onTap\" v-bind:id=\"i\" v-on:long-press=\"lp\"/>");
        let TemplateNode::Element(el) = &nodes[0] else { panic!() };
        let kinds: Vec<(BindingKind, &str)> =
            el.bindings().map(|b| (b.kind, b.name.as_str())).collect();
        assert_eq!(
            kinds,
            vec![
                (BindingKind::Attribute, "title"),
                (BindingKind::Event, "tap"),
                (BindingKind::Attribute, "id"),
                (BindingKind::Event, "long-press"),
            ]
        );
    }

    #[test]
    fn test_unknown_directive_is_kept() {
        let nodes = parse("<input v-model=\"value\"/>");
        let TemplateNode::Element(el) = &nodes[0] else { panic!() };
        assert!(matches!(&el.directives[0], Directive::Unsupported(u) if u.name == "v-model"));
    }

    #[test]
    fn test_conditional_chain_groups_siblings() {
        let nodes = parse(
            "<view v-if=\"a\"/>\n<!-- note -->\n<view v-else-if=\"b\"/>\n<view v-else/>\n<text/>",
        );
        assert_eq!(nodes.len(), 2);
        let TemplateNode::ConditionalGroup(group) = &nodes[0] else { panic!() };
        let kinds: Vec<BranchKind> = group.branches.iter().map(|b| b.kind).collect();
        assert_eq!(kinds, vec![BranchKind::If, BranchKind::ElseIf, BranchKind::Else]);
        assert!(group.has_else());
    }

    #[test]
    fn test_for_wraps_owner_and_if_wraps_for() {
        let nodes = parse("<view v-if=\"show\" v-for=\"(item, i) of list\" :key=\"i\"/>");
        let TemplateNode::ConditionalGroup(group) = &nodes[0] else { panic!() };
        let TemplateNode::ForBlock(block) = &group.branches[0].children[0] else { panic!() };
        assert_eq!(block.item, "item");
        assert_eq!(block.index.as_deref(), Some("i"));
        assert_eq!(block.source.source(), "list");
        assert_eq!(block.depth, 0);
    }

    #[test]
    fn test_nested_for_depth() {
        let nodes =
            parse("<view v-for=\"row in rows\"><text v-for=\"cell in row\">{{cell}}</text></view>");
        let TemplateNode::ForBlock(outer) = &nodes[0] else { panic!() };
        let TemplateNode::Element(view) = &outer.children[0] else { panic!() };
        let TemplateNode::ForBlock(inner) = &view.children[0] else { panic!() };
        assert_eq!(inner.depth, 1);
        assert_eq!(inner.path_var(), "i1");
    }

    #[test]
    fn test_slot_names_and_fallback() {
        let nodes = parse("<slot name=\"header\">Title</slot><slot :name=\"n\" :item=\"x\"/>");
        let TemplateNode::Slot(a) = &nodes[0] else { panic!() };
        assert_eq!(a.static_name.as_deref(), Some("header"));
        assert_eq!(a.fallback.len(), 1);
        let TemplateNode::Slot(b) = &nodes[1] else { panic!() };
        assert_eq!(b.dynamic_name.as_ref().map(|e| e.source()), Some("n"));
        assert_eq!(b.prop_bindings().count(), 1);
    }

    #[test]
    fn test_condense_whitespace() {
        let nodes = parse("<view>\n  <text>a   b</text>\n  <text>c</text>\n</view>");
        let TemplateNode::Element(el) = &nodes[0] else { panic!() };
        assert_eq!(el.children.len(), 2);
        let TemplateNode::Element(t) = &el.children[0] else { panic!() };
        assert!(matches!(&t.children[0], TemplateNode::Text(t) if t.value == "a b"));
    }

    #[test]
    fn test_preserve_whitespace() {
        let opts = ParseOptions {
            whitespace: WhitespaceMode::Preserve,
            ..ParseOptions::default()
        };
        let nodes = parse_template("<view>\n  <text>a   b</text>\n</view>", &opts).unwrap();
        let TemplateNode::Element(el) = &nodes[0] else { panic!() };
        assert_eq!(el.children.len(), 3);
    }

    #[test]
    fn test_component_kind() {
        let nodes = parse("<view/><uts-hello/><div/><template><text/></template>");
        let kinds: Vec<ElementKind> = nodes
            .iter()
            .map(|n| match n {
                TemplateNode::Element(e) => e.kind,
                _ => panic!(),
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                ElementKind::Native,
                ElementKind::Component,
                ElementKind::Native,
                ElementKind::Fragment
            ]
        );
    }

    #[test]
    fn test_errors_carry_positions() {
        let err = parse_err("<view>\n  <text>");
        assert_eq!(err.position.line, 2);
        assert_eq!(err.position.column, 3);

        let err = parse_err("<view></text>");
        assert!(err.message.contains("expected </view>"));

        let err = parse_err("<text>{{ a </text>");
        assert_eq!(err.message, "unterminated interpolation");

        let err = parse_err("<view :a=\"x +\"/>");
        assert_eq!(err.position.column, 11);
    }

    #[test]
    fn test_orphan_else_and_valued_else() {
        assert!(parse_err("<view v-else/>").message.contains("no adjacent v-if"));
        assert!(parse_err("<view v-if=\"a\"/><text/><view v-else/>")
            .message
            .contains("no adjacent"));
        assert!(parse_err("<view v-if=\"a\"/><view v-else=\"b\"/>")
            .message
            .contains("does not take a value"));
    }

    #[test]
    fn test_invalid_for_and_duplicates() {
        assert!(parse_err("<view v-for=\"{a} in list\"/>").message.contains("invalid v-for"));
        assert!(parse_err("<view v-if=\"a\" v-else/>").message.contains("duplicate"));
        assert!(parse_err("</view>").message.contains("unexpected closing tag"));
        assert!(parse_err("<view title=\"x/>").message.contains("unterminated value"));
        assert!(parse_err("<!-- open").message.contains("unterminated comment"));
    }
}

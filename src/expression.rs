//! Template expressions.
//!
//! Every `{{ }}` body and directive value is parsed with oxc and lowered into
//! an owned [`Expr`] tree so it outlives the arena. The free identifier
//! references found along the way keep their source spans; rendering rewrites
//! them to `_ctx.<name>` unless they are loop locals or whitelisted globals.

use oxc_allocator::Allocator;
use oxc_ast::ast::{self as js, Statement};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::helpers::number_to_string;

pub const CONTEXT_IDENT: &str = "_ctx";

lazy_static::lazy_static! {
    /// Identifiers that resolve globally and are never read off the context.
    pub static ref TEMPLATE_GLOBALS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert("Math");
        s.insert("JSON");
        s.insert("Date");
        s.insert("String");
        s.insert("Number");
        s.insert("Boolean");
        s.insert("Array");
        s.insert("Object");
        s.insert("Map");
        s.insert("Set");
        s.insert("RegExp");
        s.insert("undefined");
        s.insert("NaN");
        s.insert("Infinity");
        s.insert("parseInt");
        s.insert("parseFloat");
        s.insert("isNaN");
        s.insert("isFinite");
        s.insert("encodeURIComponent");
        s.insert("decodeURIComponent");
        s.insert("console");
        s.insert("_ctx");
        s
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ExpressionError {
    pub message: String,
    /// Byte offset into the trimmed expression source.
    pub offset: u32,
}

impl ExpressionError {
    fn new(message: impl Into<String>, offset: u32) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OWNED EXPRESSION TREE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    TypeOf,
    Void,
    Other(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Other(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Coalesce,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Template {
        quasis: Vec<String>,
        expressions: Vec<Expr>,
    },
    Ident(String),
    Member {
        object: Box<Expr>,
        property: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        argument: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
    },
    Arrow {
        params: Vec<String>,
        body: Vec<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Option<Box<Expr>>,
    },
    Sequence(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct IdentRef {
    name: String,
    start: u32,
    end: u32,
    /// `{ name }` shorthand property; rewritten to `name: _ctx.name`.
    shorthand: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPRESSION
// ═══════════════════════════════════════════════════════════════════════════════

/// A parsed template expression. Serializes as its source text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Expression {
    source: String,
    ast: Expr,
    refs: Vec<IdentRef>,
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl TryFrom<String> for Expression {
    type Error = ExpressionError;

    fn try_from(source: String) -> Result<Self, Self::Error> {
        Expression::parse(&source)
    }
}

impl From<Expression> for String {
    fn from(expr: Expression) -> Self {
        expr.source
    }
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(ExpressionError::new("empty expression", 0));
        }

        // Parenthesize so object literals and sequences parse as expressions.
        let wrapped = format!("({})", trimmed);
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, &wrapped, SourceType::default()).parse();
        if let Some(err) = ret.errors.first() {
            return Err(ExpressionError::new(
                format!("invalid expression `{}`: {}", trimmed, err),
                0,
            ));
        }

        let program = ret.program;
        let expression = match (program.body.len(), program.body.first()) {
            (1, Some(Statement::ExpressionStatement(stmt))) => &stmt.expression,
            _ => {
                return Err(ExpressionError::new(
                    format!("`{}` is not a single expression", trimmed),
                    0,
                ))
            }
        };

        let mut lowering = Lowering::default();
        let ast = lowering.lower(expression)?;
        let mut refs = lowering.refs;
        // Spans are relative to `wrapped`; shift past the opening paren.
        for r in &mut refs {
            r.start -= 1;
            r.end -= 1;
        }

        Ok(Self {
            source: trimmed.to_string(),
            ast,
            refs,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    /// Render as JavaScript reading free identifiers off `_ctx`.
    pub fn render(&self, locals: &[String]) -> String {
        let mut replacements: Vec<(u32, u32, String)> = self
            .refs
            .iter()
            .filter(|r| {
                !TEMPLATE_GLOBALS.contains(r.name.as_str()) && !locals.iter().any(|l| *l == r.name)
            })
            .map(|r| {
                let qualified = format!("{}.{}", CONTEXT_IDENT, r.name);
                let text = if r.shorthand {
                    format!("{}: {}", r.name, qualified)
                } else {
                    qualified
                };
                (r.start, r.end, text)
            })
            .collect();

        replacements.sort_by(|a, b| b.0.cmp(&a.0));

        let mut result = self.source.clone();
        for (start, end, text) in replacements {
            result.replace_range((start as usize)..(end as usize), &text);
        }
        result
    }

    /// Render wrapped in parentheses when it would not bind tightly as an
    /// operand.
    pub fn render_operand(&self, locals: &[String]) -> String {
        let rendered = self.render(locals);
        if self.is_atomic() {
            rendered
        } else {
            format!("({})", rendered)
        }
    }

    pub fn is_atomic(&self) -> bool {
        matches!(
            self.ast,
            Expr::Null
                | Expr::Bool(_)
                | Expr::Number(_)
                | Expr::Str(_)
                | Expr::Template { .. }
                | Expr::Ident(_)
                | Expr::Member { .. }
                | Expr::Call { .. }
                | Expr::Array(_)
        )
    }

    /// Identifiers, member chains and arrows can be passed as handlers
    /// directly; anything else is an inline statement.
    pub fn is_handler_reference(&self) -> bool {
        matches!(
            self.ast,
            Expr::Ident(_) | Expr::Member { .. } | Expr::Arrow { .. }
        )
    }

    /// The string value when the expression is a constant string.
    pub fn as_constant_string(&self) -> Option<String> {
        match &self.ast {
            Expr::Str(s) => Some(s.clone()),
            Expr::Template {
                quasis,
                expressions,
            } if expressions.is_empty() => Some(quasis.concat()),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOWERING FROM OXC
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct Lowering {
    refs: Vec<IdentRef>,
    /// Arrow parameters in scope.
    bound: Vec<String>,
}

impl Lowering {
    fn reference(&mut self, name: &str, start: u32, end: u32) {
        if self.bound.iter().any(|b| b == name) {
            return;
        }
        self.refs.push(IdentRef {
            name: name.to_string(),
            start,
            end,
            shorthand: false,
        });
    }

    fn unsupported(&self, what: &str, expr: &js::Expression<'_>) -> ExpressionError {
        let offset = expr.span().start.saturating_sub(1);
        ExpressionError::new(format!("{} is not supported in templates", what), offset)
    }

    fn lower(&mut self, expr: &js::Expression<'_>) -> Result<Expr, ExpressionError> {
        match expr {
            js::Expression::NullLiteral(_) => Ok(Expr::Null),
            js::Expression::BooleanLiteral(lit) => Ok(Expr::Bool(lit.value)),
            js::Expression::NumericLiteral(lit) => Ok(Expr::Number(lit.value)),
            js::Expression::StringLiteral(lit) => Ok(Expr::Str(lit.value.to_string())),
            js::Expression::TemplateLiteral(tpl) => {
                let quasis = tpl
                    .quasis
                    .iter()
                    .map(|q| match &q.value.cooked {
                        Some(cooked) => cooked.to_string(),
                        None => q.value.raw.to_string(),
                    })
                    .collect();
                let mut expressions = Vec::new();
                for e in &tpl.expressions {
                    expressions.push(self.lower(e)?);
                }
                Ok(Expr::Template {
                    quasis,
                    expressions,
                })
            }
            js::Expression::Identifier(id) => {
                let name = id.name.to_string();
                self.reference(&name, id.span.start, id.span.end);
                Ok(Expr::Ident(name))
            }
            js::Expression::StaticMemberExpression(member) => Ok(Expr::Member {
                object: Box::new(self.lower(&member.object)?),
                property: Box::new(Expr::Str(member.property.name.to_string())),
            }),
            js::Expression::ComputedMemberExpression(member) => Ok(Expr::Member {
                object: Box::new(self.lower(&member.object)?),
                property: Box::new(self.lower(&member.expression)?),
            }),
            js::Expression::UnaryExpression(unary) => {
                let op = match unary.operator.as_str() {
                    "!" => UnaryOp::Not,
                    "-" => UnaryOp::Neg,
                    "+" => UnaryOp::Plus,
                    "typeof" => UnaryOp::TypeOf,
                    "void" => UnaryOp::Void,
                    other => UnaryOp::Other(other),
                };
                Ok(Expr::Unary {
                    op,
                    argument: Box::new(self.lower(&unary.argument)?),
                })
            }
            js::Expression::BinaryExpression(bin) => {
                let op = match bin.operator.as_str() {
                    "+" => BinaryOp::Add,
                    "-" => BinaryOp::Sub,
                    "*" => BinaryOp::Mul,
                    "/" => BinaryOp::Div,
                    "%" => BinaryOp::Rem,
                    "**" => BinaryOp::Pow,
                    "==" => BinaryOp::Eq,
                    "!=" => BinaryOp::NotEq,
                    "===" => BinaryOp::StrictEq,
                    "!==" => BinaryOp::StrictNotEq,
                    "<" => BinaryOp::Lt,
                    "<=" => BinaryOp::LtEq,
                    ">" => BinaryOp::Gt,
                    ">=" => BinaryOp::GtEq,
                    other => BinaryOp::Other(other),
                };
                Ok(Expr::Binary {
                    op,
                    left: Box::new(self.lower(&bin.left)?),
                    right: Box::new(self.lower(&bin.right)?),
                })
            }
            js::Expression::LogicalExpression(logical) => {
                let op = match logical.operator.as_str() {
                    "&&" => LogicalOp::And,
                    "||" => LogicalOp::Or,
                    _ => LogicalOp::Coalesce,
                };
                Ok(Expr::Logical {
                    op,
                    left: Box::new(self.lower(&logical.left)?),
                    right: Box::new(self.lower(&logical.right)?),
                })
            }
            js::Expression::ConditionalExpression(cond) => Ok(Expr::Conditional {
                test: Box::new(self.lower(&cond.test)?),
                consequent: Box::new(self.lower(&cond.consequent)?),
                alternate: Box::new(self.lower(&cond.alternate)?),
            }),
            js::Expression::ParenthesizedExpression(paren) => self.lower(&paren.expression),
            js::Expression::SequenceExpression(seq) => {
                let mut expressions = Vec::new();
                for e in &seq.expressions {
                    expressions.push(self.lower(e)?);
                }
                Ok(Expr::Sequence(expressions))
            }
            js::Expression::ArrayExpression(array) => {
                let mut elements = Vec::new();
                for element in &array.elements {
                    match element.as_expression() {
                        Some(e) => elements.push(self.lower(e)?),
                        None => return Err(self.unsupported("array spread or hole", expr)),
                    }
                }
                Ok(Expr::Array(elements))
            }
            js::Expression::ObjectExpression(object) => {
                let mut properties = Vec::new();
                for property in &object.properties {
                    let js::ObjectPropertyKind::ObjectProperty(p) = property else {
                        return Err(self.unsupported("object spread", expr));
                    };
                    if p.computed || p.method {
                        return Err(self.unsupported("computed or method property", expr));
                    }
                    let key = match &p.key {
                        js::PropertyKey::StaticIdentifier(id) => id.name.to_string(),
                        js::PropertyKey::StringLiteral(s) => s.value.to_string(),
                        js::PropertyKey::NumericLiteral(n) => number_to_string(n.value),
                        _ => return Err(self.unsupported("property key", expr)),
                    };
                    let before = self.refs.len();
                    let value = self.lower(&p.value)?;
                    if p.shorthand && self.refs.len() == before + 1 {
                        if let Some(last) = self.refs.last_mut() {
                            last.shorthand = true;
                        }
                    }
                    properties.push((key, value));
                }
                Ok(Expr::Object(properties))
            }
            js::Expression::CallExpression(call) => {
                let callee = self.lower(&call.callee)?;
                let mut arguments = Vec::new();
                for argument in &call.arguments {
                    match argument.as_expression() {
                        Some(e) => arguments.push(self.lower(e)?),
                        None => return Err(self.unsupported("spread argument", expr)),
                    }
                }
                Ok(Expr::Call {
                    callee: Box::new(callee),
                    arguments,
                })
            }
            js::Expression::ArrowFunctionExpression(arrow) => {
                let mut params = Vec::new();
                for param in &arrow.params.items {
                    match &param.pattern {
                        js::BindingPattern::BindingIdentifier(id) => {
                            params.push(id.name.to_string())
                        }
                        _ => return Err(self.unsupported("destructured parameter", expr)),
                    }
                }
                let depth = self.bound.len();
                self.bound.extend(params.iter().cloned());
                let mut body = Vec::new();
                for stmt in &arrow.body.statements {
                    let lowered = match stmt {
                        Statement::ExpressionStatement(s) => self.lower(&s.expression),
                        Statement::ReturnStatement(ret) => match &ret.argument {
                            Some(argument) => self.lower(argument),
                            None => Ok(Expr::Ident("undefined".to_string())),
                        },
                        _ => Err(self.unsupported("statement in arrow body", expr)),
                    };
                    match lowered {
                        Ok(e) => body.push(e),
                        Err(err) => {
                            self.bound.truncate(depth);
                            return Err(err);
                        }
                    }
                }
                self.bound.truncate(depth);
                Ok(Expr::Arrow { params, body })
            }
            js::Expression::AssignmentExpression(assign) => {
                let target = match &assign.left {
                    js::AssignmentTarget::AssignmentTargetIdentifier(id) => {
                        let name = id.name.to_string();
                        self.reference(&name, id.span.start, id.span.end);
                        Expr::Ident(name)
                    }
                    js::AssignmentTarget::StaticMemberExpression(st) => Expr::Member {
                        object: Box::new(self.lower(&st.object)?),
                        property: Box::new(Expr::Str(st.property.name.to_string())),
                    },
                    js::AssignmentTarget::ComputedMemberExpression(comp) => Expr::Member {
                        object: Box::new(self.lower(&comp.object)?),
                        property: Box::new(self.lower(&comp.expression)?),
                    },
                    _ => return Err(self.unsupported("destructuring assignment", expr)),
                };
                Ok(Expr::Assign {
                    target: Box::new(target),
                    value: Some(Box::new(self.lower(&assign.right)?)),
                })
            }
            js::Expression::UpdateExpression(update) => {
                let target = match &update.argument {
                    js::SimpleAssignmentTarget::AssignmentTargetIdentifier(id) => {
                        let name = id.name.to_string();
                        self.reference(&name, id.span.start, id.span.end);
                        Expr::Ident(name)
                    }
                    js::SimpleAssignmentTarget::StaticMemberExpression(st) => Expr::Member {
                        object: Box::new(self.lower(&st.object)?),
                        property: Box::new(Expr::Str(st.property.name.to_string())),
                    },
                    js::SimpleAssignmentTarget::ComputedMemberExpression(comp) => Expr::Member {
                        object: Box::new(self.lower(&comp.object)?),
                        property: Box::new(self.lower(&comp.expression)?),
                    },
                    _ => return Err(self.unsupported("update target", expr)),
                };
                Ok(Expr::Assign {
                    target: Box::new(target),
                    value: None,
                })
            }
            js::Expression::ChainExpression(_) => Err(self.unsupported("optional chaining", expr)),
            js::Expression::ThisExpression(_) => Err(self.unsupported("`this`", expr)),
            js::Expression::NewExpression(_) => Err(self.unsupported("`new`", expr)),
            js::Expression::FunctionExpression(_) => {
                Err(self.unsupported("function expression", expr))
            }
            _ => Err(self.unsupported("this expression form", expr)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(src: &str, locals: &[&str]) -> String {
        let locals: Vec<String> = locals.iter().map(|s| s.to_string()).collect();
        Expression::parse(src).unwrap().render(&locals)
    }

    #[test]
    fn test_prefixes_free_identifiers() {
        assert_eq!(render("msg", &[]), "_ctx.msg");
        assert_eq!(render("a + b.c", &[]), "_ctx.a + _ctx.b.c");
        assert_eq!(render("list[index]", &["index"]), "_ctx.list[index]");
    }

    #[test]
    fn test_member_property_not_prefixed() {
        assert_eq!(render("user.name.length", &[]), "_ctx.user.name.length");
    }

    #[test]
    fn test_globals_and_loop_locals_untouched() {
        assert_eq!(render("Math.max(item, limit)", &["item"]), "Math.max(item, _ctx.limit)");
        assert_eq!(render("undefined", &[]), "undefined");
    }

    #[test]
    fn test_arrow_params_are_bound() {
        assert_eq!(
            render("list.map(x => x + offset)", &[]),
            "_ctx.list.map(x => x + _ctx.offset)"
        );
    }

    #[test]
    fn test_shorthand_property_expands() {
        assert_eq!(render("{ key, id: 1 }", &[]), "{ key: _ctx.key, id: 1 }");
        assert_eq!(render("{ item }", &["item"]), "{ item }");
    }

    #[test]
    fn test_template_literal() {
        assert_eq!(render("`${a}-x`", &[]), "`${_ctx.a}-x`");
    }

    #[test]
    fn test_trims_source() {
        let e = Expression::parse("  count  ").unwrap();
        assert_eq!(e.source(), "count");
        assert_eq!(e.render(&[]), "_ctx.count");
    }

    #[test]
    fn test_rejects_empty_and_invalid() {
        assert!(Expression::parse("   ").is_err());
        assert!(Expression::parse("a +").is_err());
        assert!(Expression::parse("a; b").is_err());
    }

    #[test]
    fn test_rejects_unsupported_forms() {
        let err = Expression::parse("a?.b").unwrap_err();
        assert!(err.message.contains("optional chaining"));
    }

    #[test]
    fn test_constant_string() {
        assert_eq!(
            Expression::parse("'header'").unwrap().as_constant_string(),
            Some("header".to_string())
        );
        assert_eq!(Expression::parse("name").unwrap().as_constant_string(), None);
    }

    #[test]
    fn test_operand_parenthesized() {
        assert_eq!(
            Expression::parse("a || b").unwrap().render_operand(&[]),
            "(_ctx.a || _ctx.b)"
        );
        assert_eq!(Expression::parse("a.b").unwrap().render_operand(&[]), "_ctx.a.b");
    }

    #[test]
    fn test_serde_as_source_text() {
        let e = Expression::parse("a.b").unwrap();
        assert_eq!(serde_json::to_string(&e).unwrap(), "\"a.b\"");
        let back: Expression = serde_json::from_str("\"a.b\"").unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn test_assignment_handler() {
        assert_eq!(render("count++", &[]), "_ctx.count++");
        assert_eq!(render("open = !open", &[]), "_ctx.open = !_ctx.open");
    }
}

//! Slot Resolver
//!
//! A transform pass over the lowered tree. For every `<slot>` it settles:
//!
//! - **identity**: the static name (the target's default outlet when absent),
//!   or the dynamic name expression; a constant-string expression folds to a
//!   static name,
//! - **fallback policy**: inline into the resolve call when the runtime can
//!   ask whether an outlet was provided, otherwise the dual-branch wrapper,
//! - **loop path**: one entry per enclosing `v-for`, innermost last; at run
//!   time the identity becomes `base-i0-i1...`,
//! - **conditional index**: the innermost enclosing branch.
//!
//! Two outlets that can produce the same runtime identity are a
//! [`CodegenError`]: the same name at the same loop depth, or a static name
//! that spells an iterated identity (`d-0` next to `<slot/>` in one loop).
//! Outlets in different branches of one conditional chain never render
//! together and are exempt.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ast::{
    BindingKind, ConditionalBranch, ForBlockNode, NodePath, SlotNode, TemplateNode,
};
use crate::error::{CodegenError, ERR_SLOT_COLLISION, ERR_SLOT_EVENT};
use crate::expression::Expression;
use crate::helpers::outlet_identity;
use crate::options::TargetCapabilities;
use crate::visitor::{walk_for_block, walk_slot, TemplateVisitor};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum OutletBase {
    Static(String),
    Dynamic(Expression),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackPolicy {
    /// No fallback children.
    None,
    /// `outlet present ? outlet : fallback` as two sibling markup branches.
    DualBranch,
    /// Fallback passed inline with the resolve call.
    Inline,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SlotResolution {
    pub base: OutletBase,
    /// Depths of the enclosing loops, outermost first.
    pub loop_path: Vec<usize>,
    pub enclosing_conditional_index: Option<usize>,
    pub fallback: FallbackPolicy,
}

impl SlotResolution {
    pub fn is_iterated(&self) -> bool {
        !self.loop_path.is_empty()
    }

    /// Identity for concrete loop indices; `None` for dynamic names.
    pub fn identity_at(&self, indices: &[usize]) -> Option<String> {
        match &self.base {
            OutletBase::Static(name) => Some(outlet_identity(name, indices)),
            OutletBase::Dynamic(_) => None,
        }
    }
}

/// Read-only view of a resolved slot.
#[derive(Debug, Clone, Copy)]
pub struct SlotUsage<'a> {
    pub static_name: Option<&'a str>,
    pub dynamic_name_expr: Option<&'a Expression>,
    pub fallback_children: &'a [TemplateNode],
    pub enclosing_conditional_index: Option<usize>,
    pub enclosing_for_path: &'a [usize],
    pub fallback: FallbackPolicy,
}

impl SlotNode {
    pub fn usage(&self) -> Option<SlotUsage<'_>> {
        let resolution = self.resolution.as_ref()?;
        let (static_name, dynamic_name_expr) = match &resolution.base {
            OutletBase::Static(name) => (Some(name.as_str()), None),
            OutletBase::Dynamic(expr) => (None, Some(expr)),
        };
        Some(SlotUsage {
            static_name,
            dynamic_name_expr,
            fallback_children: &self.fallback,
            enclosing_conditional_index: resolution.enclosing_conditional_index,
            enclosing_for_path: &resolution.loop_path,
            fallback: resolution.fallback,
        })
    }
}

/// One resolved outlet, in document order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutletSummary {
    pub path: NodePath,
    pub base: OutletBase,
    pub iterated: bool,
    pub fallback: FallbackPolicy,
}

#[derive(Debug, Default)]
pub struct SlotReport {
    pub outlets: Vec<OutletSummary>,
    pub errors: Vec<CodegenError>,
}

pub fn resolve_slots(
    nodes: &mut Vec<TemplateNode>,
    capabilities: TargetCapabilities,
) -> SlotReport {
    let mut resolver = SlotResolver::new(capabilities);
    resolver.visit_children(nodes);
    debug!(
        outlets = resolver.report.outlets.len(),
        errors = resolver.report.errors.len(),
        "slots resolved"
    );
    resolver.report
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESOLVER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
enum IdentityKey {
    Name(String),
    Expr(String),
}

/// `name` at loop depth `depth` renders as `name-i0-...`, one numeric
/// segment per enclosing loop.
fn names_overlap(a: &str, a_depth: usize, b: &str, b_depth: usize) -> bool {
    if a_depth > b_depth {
        return names_overlap(b, b_depth, a, a_depth);
    }
    // `a` has fewer segments: it must spell `b` plus the missing indices.
    let Some(rest) = a.strip_prefix(b) else {
        return false;
    };
    let missing = b_depth - a_depth;
    if missing == 0 {
        return rest.is_empty();
    }
    let mut segments = rest.split('-');
    segments.next() == Some("")
        && segments.clone().count() == missing
        && segments.all(|s| !s.is_empty() && s.bytes().all(|c| c.is_ascii_digit()))
}

#[derive(Debug)]
struct SeenOutlet {
    identity: IdentityKey,
    depth: usize,
    branches: Vec<(NodePath, usize)>,
    path: NodePath,
}

impl SeenOutlet {
    /// Different branches of one chain never render together.
    fn exclusive_with(&self, branches: &[(NodePath, usize)]) -> bool {
        self.branches.iter().any(|(group, branch)| {
            branches
                .iter()
                .any(|(other_group, other_branch)| group == other_group && branch != other_branch)
        })
    }

    /// Whether some runtime identity of this outlet can equal one of the
    /// other's.
    fn clashes_with(&self, identity: &IdentityKey, depth: usize) -> bool {
        match (&self.identity, identity) {
            (IdentityKey::Name(a), IdentityKey::Name(b)) => names_overlap(a, self.depth, b, depth),
            (IdentityKey::Expr(a), IdentityKey::Expr(b)) => a == b && self.depth == depth,
            _ => false,
        }
    }
}

pub struct SlotResolver {
    capabilities: TargetCapabilities,
    path: Vec<usize>,
    /// Depths of the enclosing loops.
    loops: Vec<usize>,
    /// Enclosing branches: group path and branch index.
    branches: Vec<(NodePath, usize)>,
    seen: Vec<SeenOutlet>,
    report: SlotReport,
}

impl SlotResolver {
    pub fn new(capabilities: TargetCapabilities) -> Self {
        Self {
            capabilities,
            path: Vec::new(),
            loops: Vec::new(),
            branches: Vec::new(),
            seen: Vec::new(),
            report: SlotReport::default(),
        }
    }

    fn current_path(&self) -> NodePath {
        NodePath(self.path.clone())
    }

    fn base_for(&self, slot: &SlotNode) -> OutletBase {
        if let Some(expr) = &slot.dynamic_name {
            return match expr.as_constant_string() {
                Some(name) => OutletBase::Static(self.normalize(&name)),
                None => OutletBase::Dynamic(expr.clone()),
            };
        }
        OutletBase::Static(self.normalize(slot.static_name.as_deref().unwrap_or("default")))
    }

    fn normalize(&self, name: &str) -> String {
        if name.is_empty() || name == "default" {
            self.capabilities.default_outlet.to_string()
        } else {
            name.to_string()
        }
    }

    fn check_collision(&mut self, identity: IdentityKey, slot: &SlotNode) {
        let path = self.current_path();
        let depth = self.loops.len();

        let clash = self.seen.iter().find(|seen| {
            seen.clashes_with(&identity, depth) && !seen.exclusive_with(&self.branches)
        });
        if let Some(previous) = clash {
            let shown = match &identity {
                IdentityKey::Name(n) | IdentityKey::Expr(n) => n.clone(),
            };
            self.report.errors.push(CodegenError::new(
                ERR_SLOT_COLLISION,
                &path,
                slot.location,
                format!(
                    "outlet `{}` collides with the outlet at {} in the same scope",
                    shown, previous.path
                ),
            ));
            return;
        }

        self.seen.push(SeenOutlet {
            identity,
            depth,
            branches: self.branches.clone(),
            path,
        });
    }
}

impl TemplateVisitor for SlotResolver {
    fn enter_child(&mut self, index: usize) {
        self.path.push(index);
    }

    fn exit_child(&mut self, _index: usize) {
        self.path.pop();
    }

    fn visit_branch(&mut self, index: usize, branch: &mut ConditionalBranch) {
        let group_path = NodePath(self.path[..self.path.len().saturating_sub(1)].to_vec());
        self.branches.push((group_path, index));
        self.visit_children(&mut branch.children);
        self.branches.pop();
    }

    fn visit_for_block(&mut self, block: &mut ForBlockNode) {
        self.loops.push(block.depth);
        walk_for_block(self, block);
        self.loops.pop();
    }

    fn visit_slot(&mut self, slot: &mut SlotNode) {
        if let Some(event) = slot.prop_bindings().find(|b| b.kind == BindingKind::Event) {
            self.report.errors.push(CodegenError::new(
                ERR_SLOT_EVENT,
                &self.current_path(),
                event.location,
                format!("event `@{}` cannot be bound on <slot>", event.name),
            ));
        }

        let base = self.base_for(slot);
        let identity = match &base {
            OutletBase::Static(name) => IdentityKey::Name(name.clone()),
            OutletBase::Dynamic(expr) => IdentityKey::Expr(expr.source().to_string()),
        };
        self.check_collision(identity, slot);

        let fallback = if slot.fallback.is_empty() {
            FallbackPolicy::None
        } else if self.capabilities.introspects_outlets {
            FallbackPolicy::Inline
        } else {
            FallbackPolicy::DualBranch
        };

        let resolution = SlotResolution {
            base: base.clone(),
            loop_path: self.loops.clone(),
            enclosing_conditional_index: self.branches.last().map(|(_, index)| *index),
            fallback,
        };
        self.report.outlets.push(OutletSummary {
            path: self.current_path(),
            base,
            iterated: resolution.is_iterated(),
            fallback,
        });
        slot.resolution = Some(resolution);

        walk_slot(self, slot);
    }
}

#[cfg(test)]
mod tests {
    use super::names_overlap;

    #[test]
    fn test_names_overlap_by_depth() {
        assert!(names_overlap("d", 1, "d", 1));
        assert!(!names_overlap("d", 0, "d", 1));
        assert!(names_overlap("d-0", 0, "d", 1));
        assert!(names_overlap("d", 2, "d-3-4", 0));
        assert!(names_overlap("d-3", 1, "d", 2));
        assert!(!names_overlap("d-x", 0, "d", 1));
        assert!(!names_overlap("default", 0, "d", 1));
        assert!(!names_overlap("d-1-2", 0, "d", 1));
    }
}

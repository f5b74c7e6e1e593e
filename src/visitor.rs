use tracing::warn;

use crate::ast::{
    CommentNode, ConditionalBranch, ConditionalGroupNode, ElementNode, ForBlockNode,
    InterpolationNode, NodePath, SlotNode, TemplateNode, TextNode,
};
use crate::error::CodegenError;

/// Mutable traversal used by the transform passes.
///
/// Rules:
/// 1. Traversal order is document order and fixed.
/// 2. Implementers override `visit_*` methods to add behavior.
/// 3. Implementers call the matching `walk_*` function to continue into
///    children unless pruning is intended.
/// 4. `enter_child`/`exit_child` bracket every child visit with its index,
///    so passes can track node paths without recursing by hand.
pub trait TemplateVisitor {
    fn visit_children(&mut self, children: &mut Vec<TemplateNode>) {
        walk_children(self, children);
    }

    fn enter_child(&mut self, _index: usize) {}

    fn exit_child(&mut self, _index: usize) {}

    fn visit_node(&mut self, node: &mut TemplateNode) {
        walk_node(self, node);
    }

    fn visit_element(&mut self, element: &mut ElementNode) {
        walk_element(self, element);
    }

    fn visit_text(&mut self, _text: &mut TextNode) {}

    fn visit_interpolation(&mut self, _interpolation: &mut InterpolationNode) {}

    fn visit_slot(&mut self, slot: &mut SlotNode) {
        walk_slot(self, slot);
    }

    fn visit_conditional_group(&mut self, group: &mut ConditionalGroupNode) {
        walk_conditional_group(self, group);
    }

    fn visit_branch(&mut self, _index: usize, branch: &mut ConditionalBranch) {
        self.visit_children(&mut branch.children);
    }

    fn visit_for_block(&mut self, block: &mut ForBlockNode) {
        walk_for_block(self, block);
    }

    fn visit_comment(&mut self, _comment: &mut CommentNode) {}
}

pub fn walk_children<V: TemplateVisitor + ?Sized>(
    visitor: &mut V,
    children: &mut Vec<TemplateNode>,
) {
    for (index, node) in children.iter_mut().enumerate() {
        visitor.enter_child(index);
        visitor.visit_node(node);
        visitor.exit_child(index);
    }
}

pub fn walk_node<V: TemplateVisitor + ?Sized>(visitor: &mut V, node: &mut TemplateNode) {
    match node {
        TemplateNode::Element(el) => visitor.visit_element(el),
        TemplateNode::Text(t) => visitor.visit_text(t),
        TemplateNode::Interpolation(i) => visitor.visit_interpolation(i),
        TemplateNode::Slot(s) => visitor.visit_slot(s),
        TemplateNode::ConditionalGroup(g) => visitor.visit_conditional_group(g),
        TemplateNode::ForBlock(f) => visitor.visit_for_block(f),
        TemplateNode::Comment(c) => visitor.visit_comment(c),
    }
}

pub fn walk_element<V: TemplateVisitor + ?Sized>(visitor: &mut V, element: &mut ElementNode) {
    visitor.visit_children(&mut element.children);
}

pub fn walk_slot<V: TemplateVisitor + ?Sized>(visitor: &mut V, slot: &mut SlotNode) {
    visitor.visit_children(&mut slot.fallback);
}

pub fn walk_conditional_group<V: TemplateVisitor + ?Sized>(
    visitor: &mut V,
    group: &mut ConditionalGroupNode,
) {
    for (index, branch) in group.branches.iter_mut().enumerate() {
        visitor.enter_child(index);
        visitor.visit_branch(index, branch);
        visitor.exit_child(index);
    }
}

pub fn walk_for_block<V: TemplateVisitor + ?Sized>(visitor: &mut V, block: &mut ForBlockNode) {
    visitor.visit_children(&mut block.children);
}

// ═══════════════════════════════════════════════════════════════════════════════
// CODEGEN TRAVERSAL
// ═══════════════════════════════════════════════════════════════════════════════

/// One method per node kind. Both backends implement this over the frozen
/// tree and share [`emit_node`] / [`emit_children`] as the driver.
pub trait CodegenVisitor {
    type Output;

    fn element(
        &mut self,
        element: &ElementNode,
        path: &NodePath,
    ) -> Result<Self::Output, CodegenError>;
    fn text(&mut self, text: &TextNode, path: &NodePath) -> Result<Self::Output, CodegenError>;
    fn interpolation(
        &mut self,
        interpolation: &InterpolationNode,
        path: &NodePath,
    ) -> Result<Self::Output, CodegenError>;
    fn slot(&mut self, slot: &SlotNode, path: &NodePath) -> Result<Self::Output, CodegenError>;
    fn conditional_group(
        &mut self,
        group: &ConditionalGroupNode,
        path: &NodePath,
    ) -> Result<Self::Output, CodegenError>;
    fn for_block(
        &mut self,
        block: &ForBlockNode,
        path: &NodePath,
    ) -> Result<Self::Output, CodegenError>;
    fn comment(
        &mut self,
        comment: &CommentNode,
        path: &NodePath,
    ) -> Result<Self::Output, CodegenError>;

    /// Collect errors instead of failing on the first one.
    fn tolerant(&self) -> bool {
        false
    }

    fn record_error(&mut self, _error: CodegenError) {}
}

pub fn emit_node<V: CodegenVisitor + ?Sized>(
    visitor: &mut V,
    node: &TemplateNode,
    path: &NodePath,
) -> Result<V::Output, CodegenError> {
    match node {
        TemplateNode::Element(el) => visitor.element(el, path),
        TemplateNode::Text(t) => visitor.text(t, path),
        TemplateNode::Interpolation(i) => visitor.interpolation(i, path),
        TemplateNode::Slot(s) => visitor.slot(s, path),
        TemplateNode::ConditionalGroup(g) => visitor.conditional_group(g, path),
        TemplateNode::ForBlock(f) => visitor.for_block(f, path),
        TemplateNode::Comment(c) => visitor.comment(c, path),
    }
}

/// Emit every child in order. A tolerant visitor records a failing child and
/// skips it; otherwise the first error aborts.
pub fn emit_children<V: CodegenVisitor + ?Sized>(
    visitor: &mut V,
    children: &[TemplateNode],
    parent: &NodePath,
) -> Result<Vec<V::Output>, CodegenError> {
    let mut out = Vec::with_capacity(children.len());
    for (index, child) in children.iter().enumerate() {
        match emit_node(visitor, child, &parent.child(index)) {
            Ok(output) => out.push(output),
            Err(err) if visitor.tolerant() => {
                warn!(code = %err.code, path = %err.node_path, "skipping node: {}", err.reason);
                visitor.record_error(err);
            }
            Err(err) => return Err(err),
        }
    }
    Ok(out)
}

/// The node a conditional branch owns, at `<group>/<branch>/0`.
pub fn branch_node<'a>(
    branch: &'a ConditionalBranch,
    group_path: &NodePath,
    index: usize,
) -> Option<(&'a TemplateNode, NodePath)> {
    branch
        .children
        .first()
        .map(|node| (node, group_path.child(index).child(0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{parse_template, ParseOptions};

    #[derive(Default)]
    struct PathRecorder {
        stack: Vec<usize>,
        slots: Vec<String>,
    }

    impl TemplateVisitor for PathRecorder {
        fn enter_child(&mut self, index: usize) {
            self.stack.push(index);
        }

        fn exit_child(&mut self, _index: usize) {
            self.stack.pop();
        }

        fn visit_slot(&mut self, slot: &mut SlotNode) {
            self.slots.push(NodePath(self.stack.clone()).to_string());
            walk_slot(self, slot);
        }
    }

    #[test]
    fn test_paths_follow_document_order() {
        let mut nodes = parse_template(
            "<view><slot/><view v-if=\"a\"/><view v-else><slot name=\"x\"/></view></view>",
            &ParseOptions::default(),
        )
        .unwrap();
        let mut recorder = PathRecorder::default();
        recorder.visit_children(&mut nodes);
        assert_eq!(recorder.slots, vec!["/0/0", "/0/1/1/0/0"]);
    }
}

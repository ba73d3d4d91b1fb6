//! Precedence-aware rendering of (partly rewritten) trees back to source.

use crate::ast::{AstView, NodeId, NodeKind};
use crate::syntax::UpdateOp;

pub const LAMBDA: u8 = 1;
pub const CONDITIONAL: u8 = 2;
pub const LOGICAL_OR: u8 = 3;
pub const UNARY: u8 = 9;
pub const POSTFIX: u8 = 10;
pub const PRIMARY: u8 = 11;

/// Binding strength of an expression node.
pub fn precedence(kind: &NodeKind) -> u8 {
    match kind {
        NodeKind::Lambda => LAMBDA,
        NodeKind::Conditional => CONDITIONAL,
        NodeKind::Binary(op) => op.precedence(),
        NodeKind::Unary(_) => UNARY,
        NodeKind::FieldAccess(_) | NodeKind::MethodCall { .. } | NodeKind::MethodRef(_) => POSTFIX,
        _ => PRIMARY,
    }
}

/// Minimum precedence the child at `index` of `parent` must have to be
/// printed without parentheses.
pub fn required_precedence(parent: &NodeKind, index: usize) -> u8 {
    match parent {
        NodeKind::FieldAccess(_) | NodeKind::MethodRef(_) => POSTFIX,
        NodeKind::MethodCall {
            has_receiver: true,
            ..
        } if index == 0 => POSTFIX,
        NodeKind::Unary(_) => UNARY,
        NodeKind::Binary(op) if index == 0 => op.precedence(),
        NodeKind::Binary(op) => op.precedence() + 1,
        NodeKind::Conditional if index == 0 => LOGICAL_OR,
        NodeKind::Conditional => CONDITIONAL,
        _ => 0,
    }
}

/// Renders `node` for a position requiring at least `min` precedence.
pub fn print_in<V: AstView + ?Sized>(view: &V, node: NodeId, min: u8) -> String {
    let text = print(view, node);
    let kind = view.kind(node);
    if kind.is_expression() && !matches!(kind, NodeKind::Parens) && precedence(kind) < min {
        format!("({text})")
    } else {
        text
    }
}

/// Renders `node`, reusing original text for untouched subtrees.
pub fn print<V: AstView + ?Sized>(view: &V, node: NodeId) -> String {
    if let Some(text) = view.source_text(node) {
        return text.to_string();
    }
    let kind = view.kind(node);
    let children = view.children(node);
    let child = |idx: usize| print_in(view, children[idx], required_precedence(kind, idx));
    let list = |items: &[NodeId]| {
        items
            .iter()
            .map(|&item| print_in(view, item, 0))
            .collect::<Vec<_>>()
            .join(", ")
    };
    match kind {
        NodeKind::Unit => children
            .iter()
            .map(|&stmt| print(view, stmt))
            .collect::<Vec<_>>()
            .join("\n"),
        NodeKind::Import(import) => import.to_string(),
        NodeKind::Block => {
            let body: Vec<String> = children.iter().map(|&stmt| print(view, stmt)).collect();
            format!("{{ {} }}", body.join(" "))
        }
        NodeKind::ExprStmt => format!("{};", child(0)),
        NodeKind::Return => format!("return {};", child(0)),
        NodeKind::LocalDecl { name, ty } => match children.first() {
            Some(&init) => format!("{ty} {name} = {};", print_in(view, init, 0)),
            None => format!("{ty} {name};"),
        },
        NodeKind::Assign(op) => format!("{} {} {};", child(0), op.symbol(), child(1)),
        NodeKind::Update(op) => match op {
            UpdateOp::Increment => format!("{}++;", child(0)),
            UpdateOp::Decrement => format!("{}--;", child(0)),
        },
        NodeKind::If => {
            let mut out = format!("if ({}) {}", child(0), print(view, children[1]));
            if let Some(&otherwise) = children.get(2) {
                out.push_str(" else ");
                out.push_str(&print(view, otherwise));
            }
            out
        }
        NodeKind::Literal(literal) => literal.spelling(),
        NodeKind::Name(name) | NodeKind::Param(name) => name.clone(),
        NodeKind::FieldAccess(name) => format!("{}.{name}", child(0)),
        NodeKind::MethodCall {
            name,
            has_receiver,
            type_args,
        } => {
            let type_args = if type_args.is_empty() {
                String::new()
            } else {
                let args: Vec<String> = type_args.iter().map(ToString::to_string).collect();
                format!("<{}>", args.join(", "))
            };
            if *has_receiver {
                format!("{}.{type_args}{name}({})", child(0), list(&children[1..]))
            } else {
                format!("{name}({})", list(children))
            }
        }
        NodeKind::MethodRef(name) => format!("{}::{name}", child(0)),
        NodeKind::Lambda => {
            let (body, params) = match children.split_last() {
                Some((&body, params)) => (body, params),
                None => return "() -> {}".to_string(),
            };
            let names: Vec<String> = params.iter().map(|&param| print(view, param)).collect();
            let head = if names.len() == 1 {
                names[0].clone()
            } else {
                format!("({})", names.join(", "))
            };
            format!("{head} -> {}", print_in(view, body, 0))
        }
        NodeKind::Unary(op) => format!("{}{}", op.symbol(), child(0)),
        NodeKind::Binary(op) => format!("{} {} {}", child(0), op.symbol(), child(1)),
        NodeKind::Conditional => format!("{} ? {} : {}", child(0), child(1), child(2)),
        NodeKind::Parens => format!("({})", print_in(view, children[0], 0)),
        NodeKind::ArrayInit => format!("{{{}}}", list(children)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{SyntaxTree, TypeHierarchy};
    use crate::syntax::{BinaryOp, Literal, UnaryOp};
    use std::sync::Arc;

    fn name(tree: &mut SyntaxTree, text: &str) -> NodeId {
        tree.alloc(NodeKind::Name(text.into()), None)
    }

    fn node(tree: &mut SyntaxTree, kind: NodeKind, children: &[NodeId]) -> NodeId {
        let id = tree.alloc(kind, None);
        for &child in children {
            tree.push_child(id, child);
        }
        id
    }

    #[test]
    fn parenthesizes_by_precedence() {
        let mut tree = SyntaxTree::new("t.sketch", "", Arc::new(TypeHierarchy::new()));
        let a = name(&mut tree, "a");
        let b = name(&mut tree, "b");
        let c = name(&mut tree, "c");
        let sum = node(&mut tree, NodeKind::Binary(BinaryOp::Add), &[a, b]);
        let product = node(&mut tree, NodeKind::Binary(BinaryOp::Mul), &[sum, c]);
        assert_eq!(print(&tree, product), "(a + b) * c");

        let d = name(&mut tree, "d");
        let e = name(&mut tree, "e");
        let diff = node(&mut tree, NodeKind::Binary(BinaryOp::Sub), &[d, e]);
        let f = name(&mut tree, "f");
        let outer = node(&mut tree, NodeKind::Binary(BinaryOp::Sub), &[f, diff]);
        assert_eq!(print(&tree, outer), "f - (d - e)");
    }

    #[test]
    fn negated_call_needs_no_parens() {
        let mut tree = SyntaxTree::new("t.sketch", "", Arc::new(TypeHierarchy::new()));
        let a = name(&mut tree, "a");
        let b = name(&mut tree, "b");
        let call = node(
            &mut tree,
            NodeKind::MethodCall {
                name: "isBefore".into(),
                has_receiver: true,
                type_args: Vec::new(),
            },
            &[a, b],
        );
        let not = node(&mut tree, NodeKind::Unary(UnaryOp::Not), &[call]);
        assert_eq!(print(&tree, not), "!a.isBefore(b)");
    }

    #[test]
    fn lambda_receiver_and_literals() {
        let mut tree = SyntaxTree::new("t.sketch", "", Arc::new(TypeHierarchy::new()));
        let v = tree.alloc(NodeKind::Param("v".into()), None);
        let v_ref = name(&mut tree, "v");
        let zero = tree.alloc(
            NodeKind::Literal(Literal::Int {
                value: 0,
                long: false,
                raw: "0".into(),
            }),
            None,
        );
        let test = node(&mut tree, NodeKind::Binary(BinaryOp::Gt), &[v_ref, zero]);
        let lambda = node(&mut tree, NodeKind::Lambda, &[v, test]);
        assert_eq!(print(&tree, lambda), "v -> v > 0");
        let call = node(
            &mut tree,
            NodeKind::MethodCall {
                name: "apply".into(),
                has_receiver: true,
                type_args: Vec::new(),
            },
            &[lambda],
        );
        assert_eq!(print(&tree, call), "(v -> v > 0).apply()");
    }
}

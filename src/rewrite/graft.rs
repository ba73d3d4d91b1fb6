use crate::ast::{NodeId, NodeKind, RewriteMark, SymbolId, SymbolKind, SyntaxTree};
use crate::rewrite::fragment::{Fragment, Replacement, SymbolRef};
use std::collections::BTreeMap;

/// Materializes `replacement` in `tree` and puts it in place of its slot.
/// Returns the new subtree root, which carries the rewrite mark and has been
/// typed by the host.
pub fn graft(tree: &mut SyntaxTree, replacement: &Replacement) -> NodeId {
    let mut fresh = BTreeMap::new();
    let root = build(tree, &replacement.fragment, &mut fresh);
    tree.replace(replacement.slot, root);
    tree.node_mut(root).mark = Some(RewriteMark {
        rule: replacement.rule.clone(),
        comments: replacement.comments.clone(),
        imports: replacement.imports.clone(),
    });
    for import in &replacement.imports {
        tree.note_import(import.clone());
    }
    tree.retype(root);
    root
}

fn build(
    tree: &mut SyntaxTree,
    fragment: &Fragment,
    fresh: &mut BTreeMap<usize, SymbolId>,
) -> NodeId {
    match fragment {
        Fragment::Existing(node) => tree.copy_subtree(*node),
        Fragment::Node {
            kind,
            children,
            symbol,
            ty,
        } => {
            let id = tree.alloc(kind.clone(), None);
            tree.set_type(id, ty.clone());
            if let Some(symbol) = symbol {
                let symbol = match symbol {
                    SymbolRef::Existing(existing) => *existing,
                    SymbolRef::Class { simple, qualified } => tree.class_symbol(simple, qualified),
                    SymbolRef::Fresh(idx) => match fresh.get(idx) {
                        Some(existing) => *existing,
                        None => {
                            let name = match kind {
                                NodeKind::Param(name) | NodeKind::Name(name) => name.clone(),
                                _ => format!("v{idx}"),
                            };
                            let created = tree.add_symbol(name, SymbolKind::Param, None, None);
                            fresh.insert(*idx, created);
                            created
                        }
                    },
                };
                tree.set_symbol(id, symbol);
            }
            for child in children {
                let child = build(tree, child, fresh);
                tree.push_child(id, child);
            }
            id
        }
    }
}

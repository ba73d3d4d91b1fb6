use crate::ast::{AstView, Import, NodeId, SyntaxTree};
use crate::edit::Edit;
use crate::rewrite::{print_in, required_precedence};

/// Edits turning the unit's source into the current state of `tree`.
///
/// Each outermost replacement becomes one edit over the source range it
/// stands in for, in source order.
pub fn emit_edits(tree: &SyntaxTree) -> Vec<Edit> {
    let mut edits = Vec::new();
    collect(tree, tree.root(), &mut edits);
    edits
}

fn collect(tree: &SyntaxTree, node: NodeId, edits: &mut Vec<Edit>) {
    let data = tree.node(node);
    if data.pristine {
        return;
    }
    let Some(anchor) = data.anchor else {
        for &child in tree.children(node) {
            collect(tree, child, edits);
        }
        return;
    };
    let min = tree
        .parent(node)
        .map(|parent| {
            let index = tree
                .children(parent)
                .iter()
                .position(|&child| child == node)
                .unwrap_or(0);
            required_precedence(tree.kind(parent), index)
        })
        .unwrap_or(0);
    let new_text = print_in(tree, node, min);
    let expected = tree.source().get(anchor.start..anchor.end).unwrap_or("");

    let mut rule = None;
    let mut imports: Vec<Import> = Vec::new();
    let mut comments: Vec<String> = Vec::new();
    for id in tree.pre_order(node) {
        let Some(mark) = &tree.node(id).mark else {
            continue;
        };
        rule.get_or_insert_with(|| mark.rule.clone());
        for import in &mark.imports {
            if !imports.contains(import) {
                imports.push(import.clone());
            }
        }
        for comment in &mark.comments {
            if !comments.contains(comment) {
                comments.push(comment.clone());
            }
        }
    }
    edits.push(
        Edit::new(
            tree.path().to_path_buf(),
            anchor.start,
            anchor.end,
            new_text,
            expected,
        )
        .with_rule(rule.unwrap_or_default())
        .with_imports(imports)
        .with_comments(comments),
    );
}

//! Pruning of the query graph down to the links a statement needs.

use crate::graph_view::GraphView;
use querygraph_api::{Link, NodeId};
use std::collections::BTreeSet;

/// Links needed to express every constraint of the graph when compiling for
/// `target`.
///
/// A link is directly relevant when its target node has selected values, is
/// negative, or is `target`. Each directly relevant link pulls in the chain
/// of links connecting it back to the root. The result is ordered
/// parent-before-child (by depth, then by position in the snapshot).
pub fn select_relevant<'g>(view: &GraphView<'g>, target: NodeId) -> Vec<&'g Link> {
    let root = view.root().id;
    let mut selected = BTreeSet::new();

    for (idx, link) in view.relation_links() {
        let Ok(node) = view.node(link.target) else {
            continue;
        };
        if !(node.has_value() || node.is_negative || node.id == target) {
            continue;
        }
        selected.insert(idx);

        let mut current = link.source;
        while current != root {
            let Some(parent_idx) = view.incoming_index(current) else {
                break;
            };
            if !selected.insert(parent_idx) {
                // The rest of the chain is already in.
                break;
            }
            current = view.graph().links[parent_idx].source;
        }
    }

    let links = ordered(view, selected);
    tracing::trace!(node = %target, count = links.len(), "selected relevant links");
    links
}

/// The chain of links from the root down to `node`, parent-before-child.
pub fn links_to_root<'g>(view: &GraphView<'g>, node: NodeId) -> Vec<&'g Link> {
    let root = view.root().id;
    let mut chain = Vec::new();
    let mut current = node;
    while current != root {
        let Some(link) = view.incoming_link(current) else {
            break;
        };
        chain.push(link);
        current = link.source;
    }
    chain.reverse();
    chain
}

fn ordered<'g>(view: &GraphView<'g>, selected: BTreeSet<usize>) -> Vec<&'g Link> {
    let links = &view.graph().links;
    let mut keyed: Vec<(usize, usize)> = selected
        .into_iter()
        .map(|idx| (view.depth(links[idx].target), idx))
        .collect();
    keyed.sort_unstable();
    keyed.into_iter().map(|(_, idx)| &links[idx]).collect()
}

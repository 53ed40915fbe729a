//! Validated, indexed view over a graph snapshot.

use crate::error::{Error, Result};
use querygraph_api::{Graph, Link, LinkType, Node, NodeId, NodeType};
use std::collections::BTreeMap;

/// Read-only view of a [`Graph`] used for one compilation call.
///
/// Building the view checks the tree invariants and indexes each node's
/// incoming relation link, so upward walks do not rescan the link list.
#[derive(Debug)]
pub struct GraphView<'g> {
    graph: &'g Graph,
    root: &'g Node,
    nodes: BTreeMap<NodeId, &'g Node>,
    /// Node -> position of its incoming relation link in `graph.links`.
    incoming: BTreeMap<NodeId, usize>,
}

impl<'g> GraphView<'g> {
    pub fn new(graph: &'g Graph) -> Result<Self> {
        let mut nodes = BTreeMap::new();
        let mut root = None;
        for node in &graph.nodes {
            if nodes.insert(node.id, node).is_some() {
                return Err(Error::InvalidGraph(format!("duplicate node id {}", node.id)));
            }
            if node.node_type == NodeType::Root {
                if root.is_some() {
                    return Err(Error::InvalidGraph("more than one root node".into()));
                }
                root = Some(node);
            }
        }
        let root = root.ok_or_else(|| Error::InvalidGraph("graph has no root node".into()))?;

        let mut incoming = BTreeMap::new();
        for (idx, link) in graph.links.iter().enumerate() {
            if link.link_type != LinkType::Relation {
                continue;
            }
            for end in [link.source, link.target] {
                if !nodes.contains_key(&end) {
                    return Err(Error::InvalidGraph(format!(
                        "link `{}` references unknown node {end}",
                        link.label
                    )));
                }
            }
            if link.target == root.id {
                return Err(Error::InvalidGraph("root node has an incoming relation".into()));
            }
            if incoming.insert(link.target, idx).is_some() {
                return Err(Error::InvalidGraph(format!(
                    "node {} has more than one incoming relation",
                    link.target
                )));
            }
        }

        let view = Self {
            graph,
            root,
            nodes,
            incoming,
        };
        view.check_rooted()?;
        Ok(view)
    }

    /// Every chain of relation links must be acyclic and start at the root.
    fn check_rooted(&self) -> Result<()> {
        let limit = self.nodes.len();
        for &id in self.incoming.keys() {
            let mut current = id;
            let mut steps = 0;
            while let Some(link) = self.incoming_link(current) {
                steps += 1;
                if steps > limit {
                    return Err(Error::InvalidGraph(format!(
                        "relation cycle through node {id}"
                    )));
                }
                current = link.source;
            }
            if current != self.root.id {
                return Err(Error::InvalidGraph(format!(
                    "node {id} is not reachable from the root"
                )));
            }
        }
        Ok(())
    }

    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    pub fn root(&self) -> &'g Node {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Result<&'g Node> {
        self.nodes.get(&id).copied().ok_or(Error::UnknownNode(id))
    }

    /// The relation link pointing at `id`, if any.
    pub fn incoming_link(&self, id: NodeId) -> Option<&'g Link> {
        self.incoming.get(&id).map(|&idx| &self.graph.links[idx])
    }

    pub(crate) fn incoming_index(&self, id: NodeId) -> Option<usize> {
        self.incoming.get(&id).copied()
    }

    /// Relation links with their position in the snapshot.
    pub fn relation_links(&self) -> impl Iterator<Item = (usize, &'g Link)> + '_ {
        self.graph
            .links
            .iter()
            .enumerate()
            .filter(|(_, l)| l.link_type == LinkType::Relation)
    }

    /// Number of relation hops between `id` and the top of its chain.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = id;
        while let Some(link) = self.incoming_link(current) {
            depth += 1;
            current = link.source;
        }
        depth
    }

    /// `id` and all its ancestors, ending at the root.
    pub fn ancestors_and_self(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = vec![id];
        let mut current = id;
        while let Some(link) = self.incoming_link(current) {
            out.push(link.source);
            current = link.source;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u64, node_type: NodeType) -> Node {
        Node::new(id, "Thing", format!("thing{id}"), node_type)
    }

    fn graph(nodes: Vec<Node>, links: Vec<(u64, u64)>) -> Graph {
        Graph {
            nodes,
            links: links
                .into_iter()
                .map(|(s, t)| Link::relation(NodeId(s), NodeId(t), "REL"))
                .collect(),
        }
    }

    #[test]
    fn indexes_incoming_links() {
        let g = graph(
            vec![node(1, NodeType::Root), node(2, NodeType::Choose), node(3, NodeType::Choose)],
            vec![(1, 2), (2, 3)],
        );
        let view = GraphView::new(&g).unwrap();
        assert_eq!(view.root().id, NodeId(1));
        assert_eq!(view.incoming_link(NodeId(3)).unwrap().source, NodeId(2));
        assert!(view.incoming_link(NodeId(1)).is_none());
        assert_eq!(view.depth(NodeId(3)), 2);
        assert_eq!(
            view.ancestors_and_self(NodeId(3)),
            vec![NodeId(3), NodeId(2), NodeId(1)]
        );
    }

    #[test]
    fn rejects_missing_or_duplicate_root() {
        let g = graph(vec![node(1, NodeType::Choose)], vec![]);
        assert!(matches!(GraphView::new(&g), Err(Error::InvalidGraph(_))));
        let g = graph(vec![node(1, NodeType::Root), node(2, NodeType::Root)], vec![]);
        assert!(matches!(GraphView::new(&g), Err(Error::InvalidGraph(_))));
    }

    #[test]
    fn rejects_two_parents_and_cycles() {
        let g = graph(
            vec![node(1, NodeType::Root), node(2, NodeType::Choose), node(3, NodeType::Choose)],
            vec![(1, 3), (2, 3)],
        );
        assert!(matches!(GraphView::new(&g), Err(Error::InvalidGraph(_))));

        let g = graph(
            vec![node(1, NodeType::Root), node(2, NodeType::Choose), node(3, NodeType::Choose)],
            vec![(2, 3), (3, 2)],
        );
        assert!(matches!(GraphView::new(&g), Err(Error::InvalidGraph(_))));
    }

    #[test]
    fn rejects_chains_detached_from_root() {
        let g = graph(
            vec![node(1, NodeType::Root), node(2, NodeType::Choose), node(3, NodeType::Choose)],
            vec![(2, 3)],
        );
        let err = GraphView::new(&g).unwrap_err();
        assert!(matches!(err, Error::InvalidGraph(msg) if msg.contains("not reachable")));

        // A node with no relation at all is not part of any chain.
        let g = graph(
            vec![node(1, NodeType::Root), node(2, NodeType::Choose), node(3, NodeType::Choose)],
            vec![(1, 2)],
        );
        assert!(GraphView::new(&g).is_ok());
    }

    #[test]
    fn ignores_value_and_segment_links() {
        let mut g = graph(
            vec![node(1, NodeType::Root), node(2, NodeType::Value)],
            vec![],
        );
        g.links.push(Link {
            source: NodeId(1),
            target: NodeId(2),
            label: "VALUE".into(),
            link_type: LinkType::Value,
        });
        g.links.push(Link {
            source: NodeId(1),
            target: NodeId(99),
            label: "SEGMENT".into(),
            link_type: LinkType::Segment,
        });
        let view = GraphView::new(&g).unwrap();
        assert_eq!(view.relation_links().count(), 0);
        assert!(view.incoming_link(NodeId(2)).is_none());
    }

    #[test]
    fn unknown_node_lookup() {
        let g = graph(vec![node(1, NodeType::Root)], vec![]);
        let view = GraphView::new(&g).unwrap();
        assert!(matches!(view.node(NodeId(5)), Err(Error::UnknownNode(NodeId(5)))));
    }
}

//! Translation of the pruned link set into MATCH/WHERE/RETURN fragments.

use crate::config::QueryConfig;
use crate::constraint::{
    ConstraintElements, constraint_value, generate_value_constraints, indexed_parameter_name,
    parameter_name,
};
use crate::error::Result;
use crate::graph_view::GraphView;
use crate::params::Params;
use crate::provider::ProviderRegistry;
use querygraph_api::{Attribute, Link, Node, NodeId, escape_name};
use std::collections::BTreeSet;

/// Alias of the collected incoming relation ids of a value query target.
pub const INCOMING_RELATIONS_ALIAS: &str = "incomingRels";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryElements {
    pub match_elements: Vec<String>,
    pub where_elements: Vec<String>,
    /// Identifiers of the relationships bound by `match_elements`.
    pub relation_elements: Vec<String>,
    pub return_elements: Vec<String>,
    pub parameters: Params,
}

impl QueryElements {
    fn absorb(&mut self, constraints: ConstraintElements) -> Result<()> {
        self.where_elements.extend(constraints.where_elements);
        self.parameters.merge(constraints.parameters)
    }
}

/// Backtick-quotes a label or relationship type.
pub fn quote(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// `(identifier:`Label`)`
pub fn node_pattern(node: &Node) -> String {
    format!("({}:{})", node.internal_label, quote(&node.label))
}

pub struct ElementCompiler<'a, 'g> {
    view: &'a GraphView<'g>,
    registry: &'a ProviderRegistry,
    config: &'a QueryConfig,
}

impl<'a, 'g> ElementCompiler<'a, 'g> {
    pub fn new(view: &'a GraphView<'g>, registry: &'a ProviderRegistry, config: &'a QueryConfig) -> Self {
        Self {
            view,
            registry,
            config,
        }
    }

    /// Compiles the root and `links` (parent-before-child) for `target`.
    ///
    /// Value constraints are emitted for the root when `is_constraint_needed`
    /// or the root is immutable, and for any other node except `target` when
    /// `is_constraint_needed` or the node is immutable.
    ///
    /// A negative node that is not `target` nor one of its ancestors is not
    /// matched: it becomes a negative existence clause on its parent, and the
    /// links below it are dropped.
    pub fn compile(
        &self,
        target: NodeId,
        links: &[&'g Link],
        is_constraint_needed: bool,
        use_custom_constraints: bool,
    ) -> Result<QueryElements> {
        let root = self.view.root();
        let mut out = QueryElements::default();

        out.match_elements.push(node_pattern(root));
        out.where_elements.extend(
            self.registry
                .predefined_constraints_for(&root.label, &root.internal_label)?,
        );
        if is_constraint_needed || root.immutable {
            out.absorb(generate_value_constraints(
                root,
                use_custom_constraints,
                self.registry,
            )?)?;
        }

        let target_path: BTreeSet<NodeId> =
            self.view.ancestors_and_self(target).into_iter().collect();
        let mut excluded = BTreeSet::new();
        let arrow = self.config.arrow();

        for (i, link) in links.iter().enumerate() {
            let source = self.view.node(link.source)?;
            let node = self.view.node(link.target)?;
            if excluded.contains(&source.id) {
                excluded.insert(node.id);
                continue;
            }
            let relation = format!("r{i}");

            if node.is_negative && !target_path.contains(&node.id) {
                let clause = self.negative_clause(source, link, node, &mut out.parameters)?;
                out.where_elements.push(clause);
                excluded.insert(node.id);
            } else {
                out.match_elements.push(format!(
                    "({})-[{relation}:{}]{arrow}{}",
                    source.internal_label,
                    quote(&link.label),
                    node_pattern(node)
                ));
                out.where_elements.extend(
                    self.registry
                        .predefined_constraints_for(&node.label, &node.internal_label)?,
                );
                if self.config.collect_relations_with_values && node.id == target {
                    out.return_elements.push(format!(
                        "collect(DISTINCT ID({relation})) AS {INCOMING_RELATIONS_ALIAS}"
                    ));
                }
                out.relation_elements.push(relation);
            }

            if node.id != target && (is_constraint_needed || node.immutable) {
                out.absorb(generate_value_constraints(
                    node,
                    use_custom_constraints,
                    self.registry,
                )?)?;
            }
        }

        Ok(out)
    }

    /// `NOT (source)-[:REL]->(:Label ...)`, one per selected value.
    fn negative_clause(
        &self,
        source: &Node,
        link: &Link,
        node: &Node,
        parameters: &mut Params,
    ) -> Result<String> {
        let path = format!(
            "({})-[:{}]{}",
            source.internal_label,
            quote(&link.label),
            self.config.arrow()
        );
        let label = quote(&node.label);
        if node.value.is_empty() {
            return Ok(format!("NOT {path}(:{label})"));
        }

        let attribute = self.registry.constraint_attribute(&node.label)?;
        let base = parameter_name(node, &attribute);
        let mut clauses = Vec::with_capacity(node.value.len());
        for (i, value) in node.value.iter().enumerate() {
            let param = indexed_parameter_name(&base, i);
            parameters.bind(param.clone(), constraint_value(node, value, &attribute)?)?;
            clauses.push(match &attribute {
                // The excluded node is never matched, so its identifier is free
                // inside the subquery.
                Attribute::InternalId => format!(
                    "NOT EXISTS {{ MATCH {path}({id}:{label}) WHERE ID({id}) = ${param} }}",
                    id = node.internal_label
                ),
                Attribute::Named(name) => format!(
                    "NOT {path}(:{label}{{{}:${param}}})",
                    escape_name(name)
                ),
            });
        }

        Ok(if clauses.len() == 1 {
            clauses.remove(0)
        } else {
            format!("({})", clauses.join(" AND "))
        })
    }
}

//! The statement shapes requested by the query graph UI.

use crate::config::QueryConfig;
use crate::elements::{ElementCompiler, QueryElements, quote};
use crate::error::{Error, Result};
use crate::graph_view::GraphView;
use crate::params::{CompiledQuery, Params};
use crate::provider::{IDENTIFIER_PLACEHOLDER, ProviderRegistry};
use crate::relevance::{links_to_root, select_relevant};
use querygraph_api::{Attribute, COUNT_ALIAS, Graph, Node, NodeId, NodeType, escape_name};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Alias of the relation id list returned by graph-shaped result queries.
pub const RELATIONS_ALIAS: &str = "relations";

/// Identifier used by taxonomy count queries.
const TAXONOMY_IDENTIFIER: &str = "n";
const DISCOVERED_RELATION: &str = "rel";
const DISCOVERED_NODE: &str = "other";

/// What a result query returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultMode {
    /// The root's return attributes, one column per attribute.
    #[default]
    Table,
    /// The root node and the ids of every matched relationship.
    Graph,
}

/// One row of a relation discovery query, as returned by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationRow {
    pub label: String,
    pub target: String,
    pub count: i64,
}

/// Predicate deciding which discovered relations are offered to the user.
pub trait RelationFilter: Send + Sync {
    fn keep(&self, row: &RelationRow) -> bool;
}

impl<F> RelationFilter for F
where
    F: Fn(&RelationRow) -> bool + Send + Sync,
{
    fn keep(&self, row: &RelationRow) -> bool {
        self(row)
    }
}

/// Compiles graph snapshots into statements.
///
/// Holds configuration only: every call reads the snapshot it is given, so
/// compiling the same snapshot twice yields the same query.
pub struct QueryCompiler {
    registry: ProviderRegistry,
    config: QueryConfig,
    relation_filter: Option<Arc<dyn RelationFilter>>,
}

impl fmt::Debug for QueryCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCompiler")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("relation_filter", &self.relation_filter.is_some())
            .finish()
    }
}

impl QueryCompiler {
    pub fn new(registry: ProviderRegistry, config: QueryConfig) -> Self {
        Self {
            registry,
            config,
            relation_filter: None,
        }
    }

    pub fn with_relation_filter(mut self, filter: impl RelationFilter + 'static) -> Self {
        self.relation_filter = Some(Arc::new(filter));
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ProviderRegistry {
        &mut self.registry
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Sets the text prepended to every statement.
    pub fn set_prefix(&mut self, prefix: impl Into<String>) {
        self.config.prefix = prefix.into();
    }

    /// Lists the values of `node` matching the rest of the graph, with the
    /// number of root results each value leads to.
    pub fn node_value_query(&self, graph: &Graph, node: NodeId) -> Result<CompiledQuery> {
        let view = GraphView::new(graph)?;
        let target = countable(view.node(node)?)?;
        let root = view.root();
        let links = select_relevant(&view, target.id);
        let elements = self.elements(&view).compile(target.id, &links, true, true)?;

        let mut returns = self.projections(target)?;
        returns.push(format!("count({}) AS {COUNT_ALIAS}", root.internal_label));
        returns.extend(elements.return_elements.iter().cloned());

        let order = self.registry.value_order_by_attribute(&target.label)?;
        let ascending = self.registry.is_value_order_ascending(&target.label)?;
        let tail = [
            format!("ORDER BY {} {}", escape_name(&order), direction(ascending)),
            format!("LIMIT {}", self.config.value_query_limit),
        ];

        let query = render(&elements, &returns, &tail);
        let query = self.registry.filter_node_value_query(target, query)?;
        Ok(self.finish("node value", query))
    }

    /// Counts the distinct values of `node` matching the rest of the graph.
    pub fn node_count_query(&self, graph: &Graph, node: NodeId) -> Result<CompiledQuery> {
        let view = GraphView::new(graph)?;
        let target = countable(view.node(node)?)?;
        let links = select_relevant(&view, target.id);
        let elements = self.elements(&view).compile(target.id, &links, true, true)?;

        let attribute = self.registry.constraint_attribute(&target.label)?;
        let returns = [format!(
            "count(DISTINCT {}) AS {COUNT_ALIAS}",
            attribute.accessor(&target.internal_label)
        )];

        let query = render(&elements, &returns, &[]);
        let query = self.registry.filter_node_count_query(target, query)?;
        Ok(self.finish("node count", query))
    }

    /// Counts the relationship types (and neighbour labels) leaving `node`.
    ///
    /// Only the chain from the root down to `node` is matched; selected values
    /// elsewhere in the graph are ignored.
    pub fn node_relation_query(&self, graph: &Graph, node: NodeId) -> Result<CompiledQuery> {
        let view = GraphView::new(graph)?;
        let target = view.node(node)?;
        if target.node_type == NodeType::Value {
            return Err(Error::InvalidTarget(target.internal_label.clone()));
        }
        let links = links_to_root(&view, target.id);
        let mut elements = self.elements(&view).compile(target.id, &links, false, false)?;

        let arrow = self.config.arrow();
        let hop = if self.config.use_parent_relation {
            format!(
                "({DISCOVERED_NODE})-[{DISCOVERED_RELATION}]{arrow}({})",
                target.internal_label
            )
        } else {
            format!(
                "({})-[{DISCOVERED_RELATION}]{arrow}({DISCOVERED_NODE})",
                target.internal_label
            )
        };
        elements.match_elements.push(hop);

        let returns = [
            format!("type({DISCOVERED_RELATION}) AS label"),
            format!("head(labels({DISCOVERED_NODE})) AS target"),
            format!("count({DISCOVERED_RELATION}) AS {COUNT_ALIAS}"),
        ];
        let tail = [format!("ORDER BY {COUNT_ALIAS} DESC")];

        let query = render(&elements, &returns, &tail);
        let query = self.registry.filter_node_relation_query(target, query)?;
        Ok(self.finish("node relation", query))
    }

    /// Retrieves the root results matching every constraint of the graph.
    pub fn result_query(&self, graph: &Graph, mode: ResultMode) -> Result<CompiledQuery> {
        let view = GraphView::new(graph)?;
        let root = view.root();
        let links = select_relevant(&view, root.id);
        let elements = self.elements(&view).compile(root.id, &links, true, true)?;

        let mut tail = Vec::new();
        let returns = match mode {
            ResultMode::Table => {
                if let Some(order) = self.result_ordering(root)? {
                    tail.push(order);
                }
                self.projections(root)?
            }
            ResultMode::Graph => vec![
                root.internal_label.clone(),
                format!(
                    "[{}] AS {RELATIONS_ALIAS}",
                    elements.relation_elements.join(", ")
                ),
            ],
        };
        tail.push(format!("LIMIT {}", self.config.result_limit));

        let query = render(&elements, &returns, &tail);
        let query = self.registry.filter_result_query(root, query)?;
        Ok(self.finish("result", query))
    }

    /// Counts every node carrying `label`, independently of any query graph.
    pub fn taxonomy_count_query(&self, label: &str) -> Result<CompiledQuery> {
        let attribute = self.registry.constraint_attribute(label)?;
        let where_elements: Vec<String> = self
            .registry
            .predefined_constraints(label)?
            .into_iter()
            .map(|c| c.replace(IDENTIFIER_PLACEHOLDER, TAXONOMY_IDENTIFIER))
            .collect();

        let mut statement = format!("MATCH ({TAXONOMY_IDENTIFIER}:{})", quote(label));
        if !where_elements.is_empty() {
            statement.push_str(" WHERE ");
            statement.push_str(&where_elements.join(" AND "));
        }
        statement.push_str(&format!(
            " RETURN count(DISTINCT {}) AS {COUNT_ALIAS}",
            attribute.accessor(TAXONOMY_IDENTIFIER)
        ));

        Ok(self.finish("taxonomy count", CompiledQuery::new(statement, Params::new())))
    }

    /// Drops the relation discovery rows rejected by the configured filter.
    pub fn filter_relations(&self, rows: Vec<RelationRow>) -> Vec<RelationRow> {
        match &self.relation_filter {
            Some(filter) => rows.into_iter().filter(|row| filter.keep(row)).collect(),
            None => rows,
        }
    }

    fn elements<'a, 'g>(&'a self, view: &'a GraphView<'g>) -> ElementCompiler<'a, 'g> {
        ElementCompiler::new(view, &self.registry, &self.config)
    }

    /// `<accessor> AS <alias>` for each return attribute of `node`.
    fn projections(&self, node: &Node) -> Result<Vec<String>> {
        Ok(self
            .registry
            .return_attributes(&node.label)?
            .iter()
            .map(|attr| projection(attr, &node.internal_label))
            .collect())
    }

    fn result_ordering(&self, root: &Node) -> Result<Option<String>> {
        let attributes = self.registry.result_order_by_attributes(&root.label)?;
        if attributes.is_empty() {
            return Ok(None);
        }
        let flags = self.registry.result_order_ascending_flags(&root.label)?;
        let items: Vec<String> = attributes
            .iter()
            .enumerate()
            .map(|(i, attr)| {
                let ascending = flags.get(i).or(flags.last()).copied().unwrap_or(true);
                format!("{} {}", escape_name(attr), direction(ascending))
            })
            .collect();
        Ok(Some(format!("ORDER BY {}", items.join(", "))))
    }

    fn finish(&self, kind: &str, mut query: CompiledQuery) -> CompiledQuery {
        if !self.config.prefix.is_empty() {
            query.statement = format!("{}{}", self.config.prefix, query.statement);
        }
        tracing::debug!(
            kind,
            statement = %query.statement,
            parameters = query.parameters.len(),
            "compiled query"
        );
        query
    }
}

/// Rejects nodes that are never constrained nor counted.
fn countable(node: &Node) -> Result<&Node> {
    match node.node_type {
        NodeType::Root | NodeType::Choose => Ok(node),
        NodeType::Value | NodeType::Group => Err(Error::InvalidTarget(node.internal_label.clone())),
    }
}

fn projection(attribute: &Attribute, identifier: &str) -> String {
    format!(
        "{} AS {}",
        attribute.accessor(identifier),
        escape_name(attribute.alias())
    )
}

fn direction(ascending: bool) -> &'static str {
    if ascending { "ASC" } else { "DESC" }
}

fn render(elements: &QueryElements, returns: &[String], tail: &[String]) -> CompiledQuery {
    let mut statement = format!("MATCH {}", elements.match_elements.join(", "));
    if !elements.where_elements.is_empty() {
        statement.push_str(" WHERE ");
        statement.push_str(&elements.where_elements.join(" AND "));
    }
    statement.push_str(" RETURN ");
    statement.push_str(&returns.join(", "));
    for part in tail {
        statement.push(' ');
        statement.push_str(part);
    }
    CompiledQuery::new(statement, elements.parameters.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::node_pattern;
    use crate::provider::LabelProvider;

    #[test]
    fn render_joins_clauses() {
        let elements = QueryElements {
            match_elements: vec!["(a:`A`)".into(), "(a)-[r0:`R`]->(b:`B`)".into()],
            where_elements: vec!["a.x = $a_x".into(), "b.y > 1".into()],
            ..QueryElements::default()
        };
        let q = render(&elements, &["a.x AS x".into()], &["LIMIT 5".into()]);
        assert_eq!(
            q.statement,
            "MATCH (a:`A`), (a)-[r0:`R`]->(b:`B`) WHERE a.x = $a_x AND b.y > 1 RETURN a.x AS x LIMIT 5"
        );
    }

    #[test]
    fn trailing_order_flag_is_reused() {
        let mut registry = ProviderRegistry::new();
        registry.register(
            "Movie",
            LabelProvider::new()
                .with_constraint_attribute(Attribute::named("title"))
                .with_result_order(vec!["title".into(), "released".into()], vec![false]),
        );
        let compiler = QueryCompiler::new(registry, QueryConfig::default());
        let root = Node::new(1, "Movie", "movie", NodeType::Root);
        assert_eq!(
            compiler.result_ordering(&root).unwrap().as_deref(),
            Some("ORDER BY title DESC, released DESC")
        );
    }

    #[test]
    fn value_and_group_nodes_are_not_countable() {
        assert!(countable(&Node::new(1, "A", "a", NodeType::Group)).is_err());
        assert!(countable(&Node::new(1, "A", "a", NodeType::Value)).is_err());
        assert!(countable(&Node::new(1, "A", "a", NodeType::Choose)).is_ok());
    }

    #[test]
    fn node_pattern_quotes_label() {
        let node = Node::new(1, "Production Company", "productioncompany", NodeType::Root);
        assert_eq!(node_pattern(&node), "(productioncompany:`Production Company`)");
    }
}

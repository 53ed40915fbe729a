//! Per-label configuration consumed by the compiler.
//!
//! Every label used in a query graph must be registered. Properties a label
//! leaves unset are looked up along an explicit chain: the label itself, then
//! its parent (named with `parent`, or found through another provider's
//! `children` list), then the parent's parent, and finally the registry's
//! default provider.

use crate::constraint::ConstraintElements;
use crate::error::{Error, Result};
use crate::params::CompiledQuery;
use querygraph_api::{Attribute, COUNT_ALIAS, Node};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Placeholder replaced by the node identifier in predefined constraints,
/// e.g. `$identifier.born > 1970`.
pub const IDENTIFIER_PLACEHOLDER: &str = "$identifier";

/// A single value or a list of values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: Clone> OneOrMany<T> {
    pub fn to_vec(&self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v.clone()],
            OneOrMany::Many(vs) => vs.clone(),
        }
    }
}

/// Configuration of one label. Unset properties are inherited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelProvider {
    pub parent: Option<String>,
    /// Labels inheriting from this provider.
    pub children: Vec<String>,
    pub return_attributes: Option<Vec<Attribute>>,
    pub constraint_attribute: Option<Attribute>,
    pub predefined_constraints: Option<Vec<String>>,
    /// Column alias node values are ordered by.
    pub value_order_by_attribute: Option<String>,
    pub is_value_order_ascending: Option<bool>,
    /// Column alias(es) results are ordered by.
    pub result_order_by_attribute: Option<OneOrMany<String>>,
    /// Direction per result ordering column; the last flag covers the rest.
    pub is_result_order_ascending: Option<OneOrMany<bool>>,
}

impl LabelProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_constraint_attribute(mut self, attribute: Attribute) -> Self {
        self.constraint_attribute = Some(attribute);
        self
    }

    pub fn with_return_attributes(mut self, attributes: Vec<Attribute>) -> Self {
        self.return_attributes = Some(attributes);
        self
    }

    pub fn with_predefined_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.predefined_constraints
            .get_or_insert_with(Vec::new)
            .push(constraint.into());
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_value_order(mut self, alias: impl Into<String>, ascending: bool) -> Self {
        self.value_order_by_attribute = Some(alias.into());
        self.is_value_order_ascending = Some(ascending);
        self
    }

    pub fn with_result_order(mut self, aliases: Vec<String>, ascending: Vec<bool>) -> Self {
        self.result_order_by_attribute = Some(OneOrMany::Many(aliases));
        self.is_result_order_ascending = Some(OneOrMany::Many(ascending));
        self
    }
}

/// Label-specific constraint logic replacing the built-in generator.
///
/// Its output is used verbatim.
pub trait ConstraintGenerator: Send + Sync {
    fn generate(&self, node: &Node) -> Result<ConstraintElements>;
}

impl<F> ConstraintGenerator for F
where
    F: Fn(&Node) -> Result<ConstraintElements> + Send + Sync,
{
    fn generate(&self, node: &Node) -> Result<ConstraintElements> {
        self(node)
    }
}

/// Rewrite hooks run on a finished query before the statement prefix is added.
///
/// Every hook defaults to returning the query unchanged.
pub trait QueryFilter: Send + Sync {
    fn filter_node_value_query(&self, _node: &Node, query: CompiledQuery) -> CompiledQuery {
        query
    }

    fn filter_node_count_query(&self, _node: &Node, query: CompiledQuery) -> CompiledQuery {
        query
    }

    fn filter_node_relation_query(&self, _node: &Node, query: CompiledQuery) -> CompiledQuery {
        query
    }

    fn filter_result_query(&self, _node: &Node, query: CompiledQuery) -> CompiledQuery {
        query
    }
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    default: LabelProvider,
    #[serde(default)]
    labels: BTreeMap<String, LabelProvider>,
}

#[derive(Default)]
pub struct ProviderRegistry {
    default: LabelProvider,
    providers: BTreeMap<String, LabelProvider>,
    generators: BTreeMap<String, Arc<dyn ConstraintGenerator>>,
    filters: BTreeMap<String, Arc<dyn QueryFilter>>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("default", &self.default)
            .field("providers", &self.providers)
            .field("generators", &self.generators.keys().collect::<Vec<_>>())
            .field("filters", &self.filters.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `{"default": {...}, "labels": {"Person": {...}}}`.
    pub fn from_json(raw: &str) -> Result<Self> {
        let file: RegistryFile = serde_json::from_str(raw)?;
        let mut registry = Self::new();
        registry.default = file.default;
        for (label, provider) in file.labels {
            registry.register(label, provider);
        }
        Ok(registry)
    }

    pub fn register(&mut self, label: impl Into<String>, provider: LabelProvider) {
        self.providers.insert(label.into(), provider);
    }

    pub fn set_default(&mut self, provider: LabelProvider) {
        self.default = provider;
    }

    pub fn register_constraint_generator(
        &mut self,
        label: impl Into<String>,
        generator: impl ConstraintGenerator + 'static,
    ) {
        self.generators.insert(label.into(), Arc::new(generator));
    }

    pub fn register_filter(&mut self, label: impl Into<String>, filter: impl QueryFilter + 'static) {
        self.filters.insert(label.into(), Arc::new(filter));
    }

    pub fn contains(&self, label: &str) -> bool {
        self.providers.contains_key(label)
    }

    /// Labels consulted for `label`, most specific first. The default provider
    /// is implied after the last one.
    pub fn lookup_chain<'a>(&'a self, label: &'a str) -> Result<Vec<&'a str>> {
        if !self.providers.contains_key(label) {
            return Err(Error::UnknownLabel(label.to_string()));
        }

        let mut chain = vec![label];
        let mut seen = BTreeSet::from([label]);
        let mut current = label;
        while let Some(next) = self.parent_of(current) {
            if !self.providers.contains_key(next) {
                return Err(Error::Config(format!(
                    "parent `{next}` of label `{current}` is not registered"
                )));
            }
            if !seen.insert(next) {
                return Err(Error::Config(format!(
                    "label `{label}` has a cyclic parent chain"
                )));
            }
            chain.push(next);
            current = next;
        }
        tracing::trace!(label, ?chain, "resolved provider chain");
        Ok(chain)
    }

    fn parent_of<'a>(&'a self, label: &str) -> Option<&'a str> {
        let provider = self.providers.get(label)?;
        if let Some(parent) = &provider.parent {
            return Some(parent.as_str());
        }
        self.providers
            .iter()
            .find(|(_, p)| p.children.iter().any(|c| c == label))
            .map(|(name, _)| name.as_str())
    }

    fn resolve<T>(&self, label: &str, get: impl Fn(&LabelProvider) -> Option<T>) -> Result<Option<T>> {
        for name in self.lookup_chain(label)? {
            if let Some(found) = self.providers.get(name).and_then(&get) {
                return Ok(Some(found));
            }
        }
        Ok(get(&self.default))
    }

    fn resolve_keyed<T: ?Sized>(
        &self,
        label: &str,
        map: &BTreeMap<String, Arc<T>>,
    ) -> Result<Option<Arc<T>>> {
        for name in self.lookup_chain(label)? {
            if let Some(found) = map.get(name) {
                return Ok(Some(Arc::clone(found)));
            }
        }
        Ok(None)
    }

    pub fn constraint_attribute(&self, label: &str) -> Result<Attribute> {
        self.resolve(label, |p| p.constraint_attribute.clone())?
            .ok_or_else(|| Error::MissingConstraintAttribute(label.to_string()))
    }

    /// Attributes projected for a label; the constraint attribute when none
    /// are configured.
    pub fn return_attributes(&self, label: &str) -> Result<Vec<Attribute>> {
        match self.resolve(label, |p| p.return_attributes.clone())? {
            Some(attrs) if !attrs.is_empty() => Ok(attrs),
            _ => Ok(vec![self.constraint_attribute(label)?]),
        }
    }

    pub fn predefined_constraints(&self, label: &str) -> Result<Vec<String>> {
        Ok(self
            .resolve(label, |p| p.predefined_constraints.clone())?
            .unwrap_or_default())
    }

    /// Predefined constraints with the placeholder replaced by `identifier`.
    pub fn predefined_constraints_for(&self, label: &str, identifier: &str) -> Result<Vec<String>> {
        Ok(self
            .predefined_constraints(label)?
            .into_iter()
            .map(|c| c.replace(IDENTIFIER_PLACEHOLDER, identifier))
            .collect())
    }

    pub fn value_order_by_attribute(&self, label: &str) -> Result<String> {
        Ok(self
            .resolve(label, |p| p.value_order_by_attribute.clone())?
            .unwrap_or_else(|| COUNT_ALIAS.to_string()))
    }

    pub fn is_value_order_ascending(&self, label: &str) -> Result<bool> {
        Ok(self
            .resolve(label, |p| p.is_value_order_ascending)?
            .unwrap_or(false))
    }

    pub fn result_order_by_attributes(&self, label: &str) -> Result<Vec<String>> {
        Ok(self
            .resolve(label, |p| p.result_order_by_attribute.as_ref().map(OneOrMany::to_vec))?
            .unwrap_or_default())
    }

    pub fn result_order_ascending_flags(&self, label: &str) -> Result<Vec<bool>> {
        Ok(self
            .resolve(label, |p| p.is_result_order_ascending.as_ref().map(OneOrMany::to_vec))?
            .filter(|flags| !flags.is_empty())
            .unwrap_or_else(|| vec![true]))
    }

    pub fn constraint_generator(&self, label: &str) -> Result<Option<Arc<dyn ConstraintGenerator>>> {
        self.resolve_keyed(label, &self.generators)
    }

    pub fn query_filter(&self, label: &str) -> Result<Option<Arc<dyn QueryFilter>>> {
        self.resolve_keyed(label, &self.filters)
    }

    pub fn filter_node_value_query(&self, node: &Node, query: CompiledQuery) -> Result<CompiledQuery> {
        Ok(match self.query_filter(&node.label)? {
            Some(filter) => filter.filter_node_value_query(node, query),
            None => query,
        })
    }

    pub fn filter_node_count_query(&self, node: &Node, query: CompiledQuery) -> Result<CompiledQuery> {
        Ok(match self.query_filter(&node.label)? {
            Some(filter) => filter.filter_node_count_query(node, query),
            None => query,
        })
    }

    pub fn filter_node_relation_query(
        &self,
        node: &Node,
        query: CompiledQuery,
    ) -> Result<CompiledQuery> {
        Ok(match self.query_filter(&node.label)? {
            Some(filter) => filter.filter_node_relation_query(node, query),
            None => query,
        })
    }

    pub fn filter_result_query(&self, node: &Node, query: CompiledQuery) -> Result<CompiledQuery> {
        Ok(match self.query_filter(&node.label)? {
            Some(filter) => filter.filter_result_query(node, query),
            None => query,
        })
    }
}

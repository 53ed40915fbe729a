use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// Column alias and parameter suffix used whenever a label is constrained by the
/// database's native identity instead of a named attribute.
pub const INTERNAL_ID_ALIAS: &str = "NEO4JID";

/// Column alias of every count aggregate. Result parsing depends on it.
pub const COUNT_ALIAS: &str = "count";

/// Opaque node identifier, assigned by the graph-editing layer.
///
/// Never reused while the node is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of a node in the query tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// The query target. Exactly one per graph.
    Root,
    /// A constrainable node, with or without selected values.
    Choose,
    /// An expanded concrete value shown under a `Choose`/`Root` node.
    Value,
    /// Structural grouping node. Never constrained and never counted.
    Group,
}

/// Kind of edge between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    /// Structural relationship between two typed nodes.
    Relation,
    /// Edge to an expanded value child. Ignored by the compiler.
    Value,
    /// Display-only edge. Ignored by the compiler.
    Segment,
}

/// The attribute a label is constrained or projected by.
///
/// `InternalId` is the native-identity sentinel. It is a distinct variant so
/// an attribute that happens to be named `NEO4JID` stays a plain
/// [`Attribute::Named`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    InternalId,
    Named(String),
}

impl Attribute {
    pub fn named(name: impl Into<String>) -> Self {
        Attribute::Named(name.into())
    }

    pub fn is_internal_id(&self) -> bool {
        matches!(self, Attribute::InternalId)
    }

    /// Name used for the return alias and as the parameter-name suffix.
    pub fn alias(&self) -> &str {
        match self {
            Attribute::InternalId => INTERNAL_ID_ALIAS,
            Attribute::Named(name) => name,
        }
    }

    /// Accessor expression for this attribute on `identifier`, e.g. `movie.title`,
    /// ``movie.`release date` `` or `ID(movie)`.
    pub fn accessor(&self, identifier: &str) -> String {
        match self {
            Attribute::InternalId => format!("ID({identifier})"),
            Attribute::Named(name) => format!("{identifier}.{}", escape_name(name)),
        }
    }
}

/// Backtick-quotes `name` unless it is a plain identifier (`title`, `born_at`).
pub fn escape_name(name: &str) -> Cow<'_, str> {
    let mut chars = name.chars();
    let plain = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_');
    if plain {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("`{}`", name.replace('`', "``")))
    }
}

/// Scalar or list value bound to a statement parameter.
///
/// Serializes untagged so a parameter map is plain JSON for the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// A value selected by the user on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRecord {
    pub label: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
    /// Database-internal identity of the selected record, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_id: Option<i64>,
}

impl ValueRecord {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            attributes: BTreeMap::new(),
            internal_id: None,
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_internal_id(mut self, id: i64) -> Self {
        self.internal_id = Some(id);
        self
    }

    /// Value of `attribute` on this record, native identity included.
    pub fn get(&self, attribute: &Attribute) -> Option<Value> {
        match attribute {
            Attribute::InternalId => self.internal_id.map(Value::Int),
            Attribute::Named(name) => self.attributes.get(name).cloned(),
        }
    }
}

/// A vertex of the query graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Schema label naming the entity type.
    pub label: String,
    /// Identifier used for this node in generated statements.
    ///
    /// Unique within the graph and immutable once assigned.
    pub internal_label: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Selected values in selection order. Empty means unconstrained.
    #[serde(default)]
    pub value: Vec<ValueRecord>,
    #[serde(default)]
    pub is_negative: bool,
    #[serde(default)]
    pub immutable: bool,
}

impl Node {
    pub fn new(
        id: u64,
        label: impl Into<String>,
        internal_label: impl Into<String>,
        node_type: NodeType,
    ) -> Self {
        Self {
            id: NodeId(id),
            label: label.into(),
            internal_label: internal_label.into(),
            node_type,
            value: Vec::new(),
            is_negative: false,
            immutable: false,
        }
    }

    pub fn with_value(mut self, value: ValueRecord) -> Self {
        self.value.push(value);
        self
    }

    pub fn negative(mut self) -> Self {
        self.is_negative = true;
        self
    }

    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    pub fn has_value(&self) -> bool {
        !self.value.is_empty()
    }
}

/// A directed edge between two nodes of the same graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub source: NodeId,
    pub target: NodeId,
    /// Relationship type name.
    pub label: String,
    #[serde(rename = "type")]
    pub link_type: LinkType,
}

impl Link {
    pub fn relation(source: NodeId, target: NodeId, label: impl Into<String>) -> Self {
        Self {
            source,
            target,
            label: label.into(),
            link_type: LinkType::Relation,
        }
    }
}

/// A snapshot of the query graph: the graph owns every node and link.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id;
        self.nodes.push(node);
        id
    }

    pub fn add_link(&mut self, link: Link) {
        self.links.push(link);
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// The first node typed `Root`, if any.
    pub fn root(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.node_type == NodeType::Root)
    }
}

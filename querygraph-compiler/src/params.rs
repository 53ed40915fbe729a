use crate::error::{Error, Result};
use querygraph_api::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named parameters referenced from a statement with `$name`.
///
/// Backed by a `BTreeMap` so a compiled query always serializes in the same
/// order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params {
    inner: BTreeMap<String, Value>,
}

impl Params {
    /// Creates a new empty parameters map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name`, failing if it is already bound to a different value.
    ///
    /// Binding the same value twice is accepted: a negative node's values are
    /// bound both by its exclusion clause and by its own constraints.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) -> Result<()> {
        let name = name.into();
        match self.inner.get(&name) {
            Some(existing) if *existing != value => Err(Error::ParameterCollision(name)),
            Some(_) => Ok(()),
            None => {
                self.inner.insert(name, value);
                Ok(())
            }
        }
    }

    /// Inserts a parameter value, replacing any previous binding.
    ///
    /// Meant for filter hooks rewriting a finished query.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.inner.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.inner.get(name)
    }

    pub fn merge(&mut self, other: Params) -> Result<()> {
        for (name, value) in other.inner {
            self.bind(name, value)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// A generated statement and the parameters it references.
///
/// This is what the transport layer executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledQuery {
    pub statement: String,
    pub parameters: Params,
}

impl CompiledQuery {
    pub fn new(statement: impl Into<String>, parameters: Params) -> Self {
        Self {
            statement: statement.into(),
            parameters,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

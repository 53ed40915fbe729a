//! WHERE fragments and parameters for the values selected on a node.

use crate::error::{Error, Result};
use crate::params::Params;
use crate::provider::ProviderRegistry;
use querygraph_api::{Attribute, Node, NodeType, Value, ValueRecord};

/// WHERE elements (joined with `AND` by the caller) and the parameters they bind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintElements {
    pub where_elements: Vec<String>,
    pub parameters: Params,
}

/// Name of the parameter carrying `node`'s constraint value.
///
/// Characters not allowed in a bare parameter name become `_`
/// (`movie_release date` -> `movie_release_date`).
pub fn parameter_name(node: &Node, attribute: &Attribute) -> String {
    format!("{}_{}", node.internal_label, attribute.alias())
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Name of the parameter for the `index`-th (0-based) value of a negative node:
/// `p`, `p2`, `p3`, ...
pub fn indexed_parameter_name(base: &str, index: usize) -> String {
    if index == 0 {
        base.to_string()
    } else {
        format!("{base}{}", index + 1)
    }
}

pub(crate) fn constraint_value(node: &Node, value: &ValueRecord, attribute: &Attribute) -> Result<Value> {
    value.get(attribute).ok_or_else(|| Error::MissingValueAttribute {
        node: node.internal_label.clone(),
        attribute: attribute.alias().to_string(),
    })
}

/// Builds the constraints expressing the values selected on `node`.
///
/// Negative nodes only get their parameters bound here; the exclusion itself
/// is written on the link leading to the node.
pub fn generate_value_constraints(
    node: &Node,
    use_custom_constraints: bool,
    registry: &ProviderRegistry,
) -> Result<ConstraintElements> {
    if use_custom_constraints
        && let Some(generator) = registry.constraint_generator(&node.label)?
    {
        return generator.generate(node);
    }

    let mut out = ConstraintElements::default();
    if node.value.is_empty() || node.node_type == NodeType::Group {
        return Ok(out);
    }

    let attribute = registry.constraint_attribute(&node.label)?;
    let param = parameter_name(node, &attribute);
    let accessor = attribute.accessor(&node.internal_label);

    match node.value.as_slice() {
        [single] => {
            out.parameters
                .bind(param.clone(), constraint_value(node, single, &attribute)?)?;
            if !node.is_negative {
                out.where_elements.push(format!("{accessor} = ${param}"));
            }
        }
        values if node.is_negative => {
            for (i, value) in values.iter().enumerate() {
                out.parameters.bind(
                    indexed_parameter_name(&param, i),
                    constraint_value(node, value, &attribute)?,
                )?;
            }
        }
        values => {
            let list = values
                .iter()
                .map(|v| constraint_value(node, v, &attribute))
                .collect::<Result<Vec<_>>>()?;
            out.parameters.bind(param.clone(), Value::List(list))?;
            out.where_elements.push(format!("{accessor} IN ${param}"));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::LabelProvider;

    fn registry() -> ProviderRegistry {
        let mut r = ProviderRegistry::new();
        r.register(
            "Movie",
            LabelProvider::new().with_constraint_attribute(Attribute::named("title")),
        );
        r.register(
            "Person",
            LabelProvider::new().with_constraint_attribute(Attribute::InternalId),
        );
        r
    }

    fn movie(titles: &[&str]) -> Node {
        let mut node = Node::new(2, "Movie", "movie", NodeType::Choose);
        for t in titles {
            node = node.with_value(ValueRecord::new("Movie").with_attribute("title", *t));
        }
        node
    }

    #[test]
    fn no_value_no_constraint() {
        let out = generate_value_constraints(&movie(&[]), true, &registry()).unwrap();
        assert!(out.where_elements.is_empty());
        assert!(out.parameters.is_empty());
    }

    #[test]
    fn single_value_equality() {
        let out = generate_value_constraints(&movie(&["Alien"]), false, &registry()).unwrap();
        assert_eq!(out.where_elements, vec!["movie.title = $movie_title"]);
        assert_eq!(out.parameters.get("movie_title"), Some(&Value::from("Alien")));
    }

    #[test]
    fn spaced_attribute_is_quoted_and_param_sanitized() {
        let mut r = ProviderRegistry::new();
        r.register(
            "Movie",
            LabelProvider::new().with_constraint_attribute(Attribute::named("release date")),
        );
        let node = Node::new(2, "Movie", "movie", NodeType::Choose)
            .with_value(ValueRecord::new("Movie").with_attribute("release date", 1979_i64));
        let out = generate_value_constraints(&node, false, &r).unwrap();
        assert_eq!(
            out.where_elements,
            vec!["movie.`release date` = $movie_release_date"]
        );
        assert_eq!(out.parameters.get("movie_release_date"), Some(&Value::Int(1979)));
    }

    #[test]
    fn single_negative_value_binds_without_clause() {
        let node = movie(&["Alien"]).negative();
        let out = generate_value_constraints(&node, false, &registry()).unwrap();
        assert!(out.where_elements.is_empty());
        assert_eq!(out.parameters.get("movie_title"), Some(&Value::from("Alien")));
    }

    #[test]
    fn multiple_values_use_in_list() {
        let out = generate_value_constraints(&movie(&["Alien", "Heat"]), false, &registry()).unwrap();
        assert_eq!(out.where_elements, vec!["movie.title IN $movie_title"]);
        assert_eq!(
            out.parameters.get("movie_title"),
            Some(&Value::List(vec![Value::from("Alien"), Value::from("Heat")]))
        );
    }

    #[test]
    fn multiple_negative_values_get_numbered_params() {
        let node = movie(&["Alien", "Heat", "Ran"]).negative();
        let out = generate_value_constraints(&node, false, &registry()).unwrap();
        assert!(out.where_elements.is_empty());
        assert_eq!(out.parameters.get("movie_title"), Some(&Value::from("Alien")));
        assert_eq!(out.parameters.get("movie_title2"), Some(&Value::from("Heat")));
        assert_eq!(out.parameters.get("movie_title3"), Some(&Value::from("Ran")));
    }

    #[test]
    fn internal_id_mode() {
        let node = Node::new(1, "Person", "person", NodeType::Root)
            .with_value(ValueRecord::new("Person").with_internal_id(42));
        let out = generate_value_constraints(&node, false, &registry()).unwrap();
        assert_eq!(out.where_elements, vec!["ID(person) = $person_NEO4JID"]);
        assert_eq!(out.parameters.get("person_NEO4JID"), Some(&Value::Int(42)));
    }

    #[test]
    fn missing_attribute_is_an_error() {
        let node = Node::new(2, "Movie", "movie", NodeType::Choose)
            .with_value(ValueRecord::new("Movie").with_attribute("year", 1979i64));
        assert!(matches!(
            generate_value_constraints(&node, false, &registry()),
            Err(Error::MissingValueAttribute { .. })
        ));
    }

    #[test]
    fn custom_generator_only_when_requested() {
        let mut r = registry();
        r.register_constraint_generator("Movie", |node: &Node| {
            let mut parameters = Params::new();
            parameters.bind("custom", Value::Int(1))?;
            Ok(ConstraintElements {
                where_elements: vec![format!("{}.rating > $custom", node.internal_label)],
                parameters,
            })
        });
        let node = movie(&["Alien"]);
        let custom = generate_value_constraints(&node, true, &r).unwrap();
        assert_eq!(custom.where_elements, vec!["movie.rating > $custom"]);
        let builtin = generate_value_constraints(&node, false, &r).unwrap();
        assert_eq!(builtin.where_elements, vec!["movie.title = $movie_title"]);
    }
}

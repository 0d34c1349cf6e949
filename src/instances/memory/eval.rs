//! Filter evaluation and value comparison for the in-memory backend

use serde_json::Value;
use std::cmp::Ordering;

use crate::filter::{reference_value, Filter, SourceRef};
use crate::instances::types::{Instance, Properties, Sort, SortDirection};

/// Resolve a property path against an instance
pub fn resolve(instance: &Instance, path: &[String]) -> Option<Value> {
    match path {
        [scope, attr] if scope == "node" || scope == "edge" => match (instance, attr.as_str()) {
            (_, "space") => Some(Value::from(instance_space(instance))),
            (_, "externalId") => Some(Value::from(instance_external_id(instance))),
            (Instance::Node(node), "type") => node.node_type.as_ref().map(reference_value),
            (Instance::Edge(edge), "type") => Some(reference_value(&edge.edge_type)),
            (Instance::Edge(edge), "startNode") => Some(reference_value(&edge.start_node)),
            (Instance::Edge(edge), "endNode") => Some(reference_value(&edge.end_node)),
            (_, "version") => Some(Value::from(instance.meta().version)),
            (_, "createdTime") => Some(Value::from(instance.meta().created_time)),
            (_, "lastUpdatedTime") => Some(Value::from(instance.meta().last_updated_time)),
            _ => None,
        },
        [space, view_key, property] => view_property(instance.properties(), space, view_key, property),
        _ => None,
    }
}

fn view_property(properties: &Properties, space: &str, view_key: &str, property: &str) -> Option<Value> {
    properties
        .get(space)
        .and_then(|views| views.get(view_key))
        .and_then(|props| props.get(property))
        .cloned()
}

fn instance_space(instance: &Instance) -> &str {
    match instance {
        Instance::Node(node) => &node.space,
        Instance::Edge(edge) => &edge.space,
    }
}

fn instance_external_id(instance: &Instance) -> &str {
    match instance {
        Instance::Node(node) => &node.external_id,
        Instance::Edge(edge) => &edge.external_id,
    }
}

/// Whether the instance stores data through any of the sources
pub fn has_data(instance: &Instance, sources: &[SourceRef]) -> bool {
    sources.iter().any(|SourceRef::View(view)| {
        instance
            .properties()
            .get(&view.space)
            .map_or(false, |views| views.contains_key(&view.property_key()))
    })
}

/// Evaluate an optional filter; absent filters match everything
pub fn matches(instance: &Instance, filter: Option<&Filter>) -> bool {
    filter.map_or(true, |filter| evaluate(instance, filter))
}

/// Evaluate a filter tree against an instance
pub fn evaluate(instance: &Instance, filter: &Filter) -> bool {
    match filter {
        Filter::And(parts) => parts.iter().all(|f| evaluate(instance, f)),
        Filter::Or(parts) => parts.iter().any(|f| evaluate(instance, f)),
        Filter::Not(inner) => !evaluate(instance, inner),
        Filter::Equals { property, value } => {
            resolve(instance, property).map_or(false, |actual| values_equal(&actual, value))
        }
        Filter::In { property, values } => resolve(instance, property)
            .map_or(false, |actual| values.iter().any(|v| values_equal(&actual, v))),
        Filter::Prefix { property, value } => match (resolve(instance, property), value) {
            (Some(Value::String(actual)), Value::String(prefix)) => actual.starts_with(prefix.as_str()),
            _ => false,
        },
        Filter::Range {
            property,
            gt,
            gte,
            lt,
            lte,
        } => {
            let Some(actual) = resolve(instance, property) else {
                return false;
            };
            let check = |bound: &Option<Value>, accept: fn(Ordering) -> bool| {
                bound.as_ref().map_or(true, |b| {
                    compare_values(&actual, b).map_or(false, accept)
                })
            };
            check(gt, |o| o == Ordering::Greater)
                && check(gte, |o| o != Ordering::Less)
                && check(lt, |o| o == Ordering::Less)
                && check(lte, |o| o != Ordering::Greater)
        }
        Filter::Exists { property } => {
            resolve(instance, property).map_or(false, |actual| !actual.is_null())
        }
        Filter::ContainsAny { property, values } => match resolve(instance, property) {
            Some(Value::Array(items)) => values
                .iter()
                .any(|v| items.iter().any(|item| values_equal(item, v))),
            _ => false,
        },
        Filter::ContainsAll { property, values } => match resolve(instance, property) {
            Some(Value::Array(items)) => values
                .iter()
                .all(|v| items.iter().any(|item| values_equal(item, v))),
            _ => false,
        },
        Filter::HasData(sources) => has_data(instance, sources),
        Filter::MatchAll {} => true,
    }
}

/// Equality that treats `1` and `1.0` as the same number
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Order numbers numerically, strings lexicographically and booleans false-first
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Sort instances in place by the given specifications
pub fn sort_instances(items: &mut [Instance], sort: &[Sort]) {
    if sort.is_empty() {
        return;
    }
    items.sort_by(|a, b| {
        for spec in sort {
            let left = resolve(a, &spec.property).filter(|v| !v.is_null());
            let right = resolve(b, &spec.property).filter(|v| !v.is_null());
            let ordering = match (&left, &right) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) if spec.nulls_first => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) if spec.nulls_first => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(l), Some(r)) => {
                    let ord = compare_values(l, r).unwrap_or(Ordering::Equal);
                    match spec.direction {
                        SortDirection::Ascending => ord,
                        SortDirection::Descending => ord.reverse(),
                    }
                }
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{NodeId, NodeMeta, ViewId};
    use crate::filter::FilterBuilder;
    use crate::instances::types::{Node, PropertyMap};
    use serde_json::json;

    fn person(name: &str, birth_year: i64) -> Instance {
        let view = ViewId::new("movies", "Person", "2");
        let mut props = PropertyMap::new();
        props.insert("name".into(), json!(name));
        props.insert("birthYear".into(), json!(birth_year));
        let mut properties = Properties::new();
        properties
            .entry(view.space.clone())
            .or_default()
            .insert(view.property_key(), props);
        Instance::Node(Node {
            space: "movies".into(),
            external_id: format!("person:{}", name.to_lowercase()),
            meta: NodeMeta::default(),
            node_type: None,
            properties,
        })
    }

    #[test]
    fn test_builder_filters_evaluate() {
        let view = ViewId::new("movies", "Person", "2");
        let quentin = person("Quentin", 1963);

        let filter = FilterBuilder::new(&view)
            .range("birthYear", Some(1960), Some(1970))
            .prefix("name", Some("Qu"))
            .build();
        assert!(matches(&quentin, filter.as_ref()));

        let filter = FilterBuilder::new(&view).range("birthYear", Some(1970), None).build();
        assert!(!matches(&quentin, filter.as_ref()));
    }

    #[test]
    fn test_node_attributes_and_has_data() {
        let quentin = person("Quentin", 1963);
        let view = ViewId::new("movies", "Person", "2");
        assert!(evaluate(&quentin, &Filter::has_data(&view)));
        assert!(!evaluate(&quentin, &Filter::has_data(&ViewId::new("movies", "Actor", "2"))));
        assert!(evaluate(
            &quentin,
            &Filter::equals(crate::filter::node_external_id(), "person:quentin")
        ));
        assert_eq!(
            resolve(&quentin, &["node".into(), "space".into()]),
            Some(json!("movies"))
        );
    }

    #[test]
    fn test_numbers_compare_across_representations() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert_eq!(compare_values(&json!(2), &json!(1.5)), Some(Ordering::Greater));
        assert_eq!(compare_values(&json!("a"), &json!(1)), None);
    }

    #[test]
    fn test_sort_descending_nulls_last() {
        let mut items = vec![person("A", 1990), person("B", 1950), person("C", 1970)];
        if let Instance::Node(node) = &mut items[2] {
            let view = ViewId::new("movies", "Person", "2");
            if let Some(props) = node
                .properties
                .get_mut(&view.space)
                .and_then(|v| v.get_mut(&view.property_key()))
            {
                props.remove("birthYear");
            }
        }
        let sort = vec![Sort {
            property: ViewId::new("movies", "Person", "2").property_ref("birthYear"),
            direction: SortDirection::Descending,
            nulls_first: false,
        }];
        sort_instances(&mut items, &sort);
        let order: Vec<NodeId> = items.iter().map(Instance::id).collect();
        assert_eq!(order[0].external_id, "person:a");
        assert_eq!(order[1].external_id, "person:b");
        assert_eq!(order[2].external_id, "person:c");
    }
}

//! Aggregations for the in-memory backend

use serde_json::Value;
use std::collections::BTreeMap;

use crate::core::error::{ApiError, Error, Result};
use crate::instances::types::{
    AggregateGroup, AggregateRequest, AggregateResponse, AggregatedValue, Aggregation,
    HistogramBucket, Instance, PropertyMap,
};

fn property<'a>(instance: &'a Instance, request: &AggregateRequest, name: &str) -> Option<&'a Value> {
    instance
        .properties()
        .get(&request.view.space)
        .and_then(|views| views.get(&request.view.property_key()))
        .and_then(|props| props.get(name))
        .filter(|value| !value.is_null())
}

fn numbers(instances: &[&Instance], request: &AggregateRequest, name: &str) -> Vec<f64> {
    instances
        .iter()
        .filter_map(|instance| property(instance, request, name))
        .filter_map(Value::as_f64)
        .collect()
}

fn histogram(values: &[f64], interval: f64) -> Vec<HistogramBucket> {
    let mut buckets: BTreeMap<i64, i64> = BTreeMap::new();
    for value in values {
        *buckets.entry((value / interval).floor() as i64).or_default() += 1;
    }
    buckets
        .into_iter()
        .map(|(index, count)| HistogramBucket {
            start: index as f64 * interval,
            count,
        })
        .collect()
}

fn evaluate(aggregation: &Aggregation, instances: &[&Instance], request: &AggregateRequest) -> AggregatedValue {
    let name = aggregation.property().to_string();
    let values = numbers(instances, request, &name);
    match aggregation {
        Aggregation::Count { .. } => AggregatedValue::Count {
            value: instances
                .iter()
                .filter(|instance| property(instance, request, &name).is_some())
                .count() as i64,
            property: name,
        },
        Aggregation::Sum { .. } => AggregatedValue::Sum {
            value: (!values.is_empty()).then(|| values.iter().sum()),
            property: name,
        },
        Aggregation::Avg { .. } => AggregatedValue::Avg {
            value: (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64),
            property: name,
        },
        Aggregation::Min { .. } => AggregatedValue::Min {
            value: values.iter().copied().reduce(f64::min),
            property: name,
        },
        Aggregation::Max { .. } => AggregatedValue::Max {
            value: values.iter().copied().reduce(f64::max),
            property: name,
        },
        Aggregation::Histogram { interval, .. } => AggregatedValue::Histogram {
            buckets: histogram(&values, *interval),
            interval: *interval,
            property: name,
        },
    }
}

/// Compute the requested aggregates over the candidate instances
pub(super) fn compute(request: &AggregateRequest, candidates: &[Instance]) -> Result<AggregateResponse> {
    for aggregation in &request.aggregates {
        if let Aggregation::Histogram { interval, property } = aggregation {
            if *interval <= 0.0 {
                return Err(Error::Api(ApiError::new(
                    400,
                    format!("Histogram interval for '{}' must be positive", property),
                )));
            }
        }
    }

    if request.group_by.is_empty() {
        let all: Vec<&Instance> = candidates.iter().collect();
        return Ok(AggregateResponse {
            items: vec![AggregateGroup {
                instance_type: request.instance_type,
                group: None,
                aggregates: request
                    .aggregates
                    .iter()
                    .map(|aggregation| evaluate(aggregation, &all, request))
                    .collect(),
            }],
        });
    }

    // Groups are keyed by their serialized values to get a stable order.
    let mut groups: BTreeMap<String, (PropertyMap, Vec<&Instance>)> = BTreeMap::new();
    for instance in candidates {
        let group: PropertyMap = request
            .group_by
            .iter()
            .map(|name| {
                let value = property(instance, request, name).cloned().unwrap_or(Value::Null);
                (name.clone(), value)
            })
            .collect();
        let key = Value::Object(group.clone()).to_string();
        groups
            .entry(key)
            .or_insert_with(|| (group, Vec::new()))
            .1
            .push(instance);
    }

    let items = groups
        .into_values()
        .take(request.limit.unwrap_or(usize::MAX))
        .map(|(group, members)| AggregateGroup {
            instance_type: request.instance_type,
            group: Some(group),
            aggregates: request
                .aggregates
                .iter()
                .map(|aggregation| evaluate(aggregation, &members, request))
                .collect(),
        })
        .collect();
    Ok(AggregateResponse { items })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{InstanceType, NodeMeta, ViewId};
    use crate::instances::types::{Node, Properties};
    use serde_json::json;

    fn movie(id: &str, year: i64, rating: Option<f64>) -> Instance {
        let view = ViewId::new("movies", "Movie", "2");
        let mut props = PropertyMap::new();
        props.insert("releaseYear".into(), json!(year));
        if let Some(rating) = rating {
            props.insert("score".into(), json!(rating));
        }
        let mut properties = Properties::new();
        properties.entry(view.space.clone()).or_default().insert(view.property_key(), props);
        Instance::Node(Node {
            space: "movies".into(),
            external_id: id.into(),
            meta: NodeMeta::default(),
            node_type: None,
            properties,
        })
    }

    fn request(aggregates: Vec<Aggregation>, group_by: Vec<String>) -> AggregateRequest {
        AggregateRequest {
            view: ViewId::new("movies", "Movie", "2"),
            aggregates,
            group_by,
            query: None,
            properties: None,
            instance_type: InstanceType::Node,
            filter: None,
            limit: None,
        }
    }

    #[test]
    fn test_basic_aggregates() {
        let movies = vec![movie("m1", 1994, Some(8.9)), movie("m2", 2003, Some(8.1)), movie("m3", 2009, None)];
        let req = request(
            vec![
                Aggregation::Count { property: "score".into() },
                Aggregation::Max { property: "score".into() },
                Aggregation::Avg { property: "releaseYear".into() },
            ],
            vec![],
        );
        let response = compute(&req, &movies).unwrap();
        let aggregates = &response.items[0].aggregates;
        assert_eq!(aggregates[0], AggregatedValue::Count { property: "score".into(), value: 2 });
        assert_eq!(aggregates[1], AggregatedValue::Max { property: "score".into(), value: Some(8.9) });
        assert_eq!(aggregates[2], AggregatedValue::Avg { property: "releaseYear".into(), value: Some(2002.0) });
    }

    #[test]
    fn test_histogram_and_grouping() {
        let movies = vec![movie("m1", 1994, None), movie("m2", 2003, None), movie("m3", 2009, None)];
        let req = request(vec![Aggregation::Histogram { property: "releaseYear".into(), interval: 10.0 }], vec![]);
        let response = compute(&req, &movies).unwrap();
        let AggregatedValue::Histogram { buckets, .. } = &response.items[0].aggregates[0] else {
            panic!("histogram expected")
        };
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0], HistogramBucket { start: 1990.0, count: 1 });
        assert_eq!(buckets[1], HistogramBucket { start: 2000.0, count: 2 });

        let grouped = compute(
            &request(vec![Aggregation::Count { property: "releaseYear".into() }], vec!["releaseYear".into()]),
            &movies,
        )
        .unwrap();
        assert_eq!(grouped.items.len(), 3);
    }

    #[test]
    fn test_non_positive_interval_is_rejected() {
        let req = request(vec![Aggregation::Histogram { property: "releaseYear".into(), interval: 0.0 }], vec![]);
        assert_eq!(compute(&req, &[]).unwrap_err().api_code(), Some(400));
    }
}

//! Monthly cost estimate from node labels

use nebula_graph::Node;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Keyword table; the first row whose keyword appears in a label wins
const PRICING: &[(&[&str], f64)] = &[
    (&["instance", "server", "ec2"], 18.0),
    (&["bucket", "storage", "s3"], 2.5),
    (&["database", "rds", "db"], 35.0),
    (&["cluster"], 40.0),
    (&["lambda", "function"], 0.0),
    (&["load balancer"], 20.0),
    (&["vpc", "subnet", "gateway"], 0.0),
    (&["cloudfront"], 5.0),
];

/// Estimated monthly cost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    /// Sum, rounded to cents
    pub total: f64,
    /// Always `USD`
    pub currency: String,
    /// Cost per label, free resources omitted
    pub breakdown: BTreeMap<String, f64>,
}

/// Price of one resource label (zero when unknown)
#[must_use]
pub fn unit_price(label: &str) -> f64 {
    let label = label.to_lowercase();
    PRICING
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| label.contains(k)))
        .map_or(0.0, |(_, price)| *price)
}

/// Estimate resource nodes; fixed nodes are ignored
///
/// Nodes sharing a label share one breakdown entry holding their sum.
/// Zero-cost resources count toward nothing and are left out.
#[must_use]
pub fn estimate<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> CostEstimate {
    let mut breakdown = BTreeMap::new();
    let mut total = 0.0;

    for node in nodes {
        let Some(resource) = node.as_resource() else {
            continue;
        };
        let price = unit_price(&resource.label);
        if price <= 0.0 {
            continue;
        }
        total += price;
        *breakdown.entry(resource.label.clone()).or_insert(0.0) += price;
    }

    CostEstimate {
        total: (total * 100.0_f64).round() / 100.0,
        currency: "USD".to_string(),
        breakdown,
    }
}

//! Finding attribution
//!
//! Findings are free text, so attributing one to a node is a guess. The
//! guess lives behind [`FindingAttributor`] so an exact-id scheme can
//! replace it without touching the engine.

use nebula_graph::{Finding, Node, NodeStatus};

/// Label words too generic to identify a resource on their own
///
/// Includes the words auditors use as message prefixes ("Security Risk:",
/// "Cost Risk:") and resource-class nouns shared by many services.
const GENERIC_WORDS: [&str; 16] = [
    "public", "private", "main", "primary", "secondary", "resource", "node", "the", "and",
    "security", "group", "instance", "risk", "access", "cost", "reliability",
];

/// Maps findings onto nodes
pub trait FindingAttributor: Send + Sync {
    /// The first finding attributed to a node labelled `label`, if any
    fn attribute<'f>(&self, label: &str, findings: &'f [Finding]) -> Option<&'f Finding>;
}

/// Case-insensitive label/message overlap with two domain synonyms
///
/// A finding matches a node when its message contains:
/// - the whole label, or
/// - any label word of three or more letters that is not generic, or
/// - "bucket" and the label contains "s3", or
/// - "database" and the label contains "db".
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelMatchAttributor;

impl LabelMatchAttributor {
    fn matches(label: &str, message: &str) -> bool {
        if label.is_empty() {
            return false;
        }
        if message.contains(label) {
            return true;
        }
        if label.contains("s3") && message.contains("bucket") {
            return true;
        }
        if label.contains("db") && message.contains("database") {
            return true;
        }
        label
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() >= 3 && !GENERIC_WORDS.contains(w))
            .any(|w| message.contains(w))
    }
}

impl FindingAttributor for LabelMatchAttributor {
    fn attribute<'f>(&self, label: &str, findings: &'f [Finding]) -> Option<&'f Finding> {
        let label = label.trim().to_lowercase();
        findings
            .iter()
            .find(|f| Self::matches(&label, &f.message.to_lowercase()))
    }
}

/// Set status on every resource node from `findings`
///
/// Nodes without a match become `Active`; any earlier annotation is
/// replaced. Returns the number of nodes marked `Error`.
pub fn annotate(
    nodes: &mut [Node],
    findings: &[Finding],
    attributor: &dyn FindingAttributor,
) -> usize {
    let mut flagged = 0;
    for node in nodes.iter_mut() {
        let Some(resource) = node.as_resource_mut() else {
            continue;
        };
        match attributor.attribute(&resource.label, findings) {
            Some(finding) => {
                resource.status = NodeStatus::Error;
                resource.error_message = Some(finding.message.clone());
                flagged += 1;
            }
            None => resource.clear_annotation(),
        }
    }
    flagged
}

//! Inbound workflow model.
//!
//! These types mirror what the graph editor and the real execution engine
//! hand over. They are read-only from the simulator's point of view; a twin
//! keeps its own deep copy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A directed workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// Workflow identifier.
    pub id: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Nodes in declaration order.
    pub nodes: Vec<Node>,
    /// Directed edges (`source -> target`).
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Workflow {
    /// Creates an empty workflow.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Adds a node.
    #[must_use]
    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Adds an edge between two node ids.
    #[must_use]
    pub fn with_edge(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.edges.push(Edge::new(source, target));
        self
    }

    /// Looks up a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Returns the ids of all non-trigger nodes.
    ///
    /// These are the nodes fault scenarios are usually attached to.
    #[must_use]
    pub fn action_node_ids(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| !n.is_trigger())
            .map(|n| n.id.clone())
            .collect()
    }
}

/// A node in the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Node identifier, unique within the workflow.
    pub id: String,
    /// Node type (`trigger`, `httpRequest`, `transform`, ...).
    #[serde(rename = "type")]
    pub node_type: String,
    /// Editor payload; only `config` matters to the simulator.
    #[serde(default)]
    pub data: NodeData,
}

impl Node {
    /// Creates a node with an empty config.
    #[must_use]
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            data: NodeData::default(),
        }
    }

    /// Sets a config entry.
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.config.insert(key.into(), value);
        self
    }

    /// Returns true if the node is explicitly typed as a trigger.
    #[must_use]
    pub fn is_trigger(&self) -> bool {
        self.node_type == "trigger" || self.node_type.ends_with("Trigger")
    }

    /// Returns true if execution should proceed past an error on this node.
    #[must_use]
    pub fn continue_on_error(&self) -> bool {
        self.data
            .config
            .get("continueOnError")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Node payload as produced by the graph editor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    /// Display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Node configuration bag.
    #[serde(default)]
    pub config: Map<String, Value>,
}

/// A directed edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Source node id.
    pub source: String,
    /// Target node id.
    pub target: String,
}

impl Edge {
    /// Creates an edge.
    #[must_use]
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// A record of a real execution, supplied by the production engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecution {
    /// Execution identifier.
    pub id: String,
    /// Workflow that was executed.
    pub workflow_id: String,
    /// Final output.
    #[serde(default)]
    pub output: Value,
    /// Error message, if the execution failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the execution started.
    pub start_time: DateTime<Utc>,
    /// When the execution finished.
    pub end_time: DateTime<Utc>,
}

impl WorkflowExecution {
    /// Returns the wall-clock duration in milliseconds (never negative).
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        let ms = (self.end_time - self.start_time).num_milliseconds();
        u64::try_from(ms).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn workflow_deserializes_editor_shape() {
        let raw = json!({
            "id": "wf-1",
            "nodes": [
                {"id": "a", "type": "webhookTrigger", "data": {"config": {}}},
                {"id": "b", "type": "httpRequest", "data": {"config": {"continueOnError": true}}}
            ],
            "edges": [{"source": "a", "target": "b"}]
        });

        let workflow: Workflow = serde_json::from_value(raw).unwrap();
        assert_eq!(workflow.nodes.len(), 2);
        assert!(workflow.nodes[0].is_trigger());
        assert!(workflow.nodes[1].continue_on_error());
        assert_eq!(workflow.action_node_ids(), vec!["b".to_string()]);
    }

    #[test]
    fn execution_duration_is_clamped() {
        let start = Utc::now();
        let exec = WorkflowExecution {
            id: "e".into(),
            workflow_id: "wf".into(),
            output: Value::Null,
            error: None,
            start_time: start,
            end_time: start - chrono::Duration::milliseconds(10),
        };
        assert_eq!(exec.duration_ms(), 0);
    }
}

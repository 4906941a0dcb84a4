//! Execution ordering over a workflow graph.
//!
//! Order is a depth-first post-order from every start node, reversed, so a
//! node always follows every node that feeds it. Start nodes are nodes with
//! no incoming edge plus nodes explicitly typed as triggers. Traversal uses
//! an explicit stack over node indices; cycles are rejected.

use crate::error::{Error, Result};
use crate::workflow::Workflow;
use std::collections::HashMap;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Precomputed execution order and adjacency for a workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    order: Vec<usize>,
    predecessors: Vec<Vec<usize>>,
    starts: Vec<usize>,
}

impl ExecutionPlan {
    /// Builds the execution plan for a workflow.
    ///
    /// # Errors
    ///
    /// - `InvalidGraph` on duplicate node ids or edges naming unknown nodes
    /// - `NoStartNode` if no node qualifies as a start node
    /// - `CyclicGraph` if any node lies on or behind a cycle
    pub fn build(workflow: &Workflow) -> Result<Self> {
        let n = workflow.nodes.len();
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(n);
        for (i, node) in workflow.nodes.iter().enumerate() {
            if index.insert(node.id.as_str(), i).is_some() {
                return Err(Error::InvalidGraph(format!(
                    "duplicate node id '{}'",
                    node.id
                )));
            }
        }

        let mut successors = vec![Vec::new(); n];
        let mut predecessors = vec![Vec::new(); n];
        for edge in &workflow.edges {
            let (Some(&s), Some(&t)) = (
                index.get(edge.source.as_str()),
                index.get(edge.target.as_str()),
            ) else {
                return Err(Error::InvalidGraph(format!(
                    "edge '{}' -> '{}' references an unknown node",
                    edge.source, edge.target
                )));
            };
            successors[s].push(t);
            predecessors[t].push(s);
        }

        let starts: Vec<usize> = (0..n)
            .filter(|&i| predecessors[i].is_empty() || workflow.nodes[i].is_trigger())
            .collect();
        if starts.is_empty() {
            return Err(Error::NoStartNode(workflow.id.clone()));
        }

        let mut marks = vec![Mark::Unvisited; n];
        let mut post = Vec::with_capacity(n);
        // (node, index of the next successor to visit)
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for &start in &starts {
            if marks[start] != Mark::Unvisited {
                continue;
            }
            marks[start] = Mark::InProgress;
            stack.push((start, 0));

            while let Some(top) = stack.last_mut() {
                let (node, next) = *top;
                if let Some(&child) = successors[node].get(next) {
                    top.1 += 1;
                    match marks[child] {
                        Mark::Unvisited => {
                            marks[child] = Mark::InProgress;
                            stack.push((child, 0));
                        }
                        Mark::InProgress => {
                            return Err(Error::CyclicGraph {
                                node_id: workflow.nodes[child].id.clone(),
                            });
                        }
                        Mark::Done => {}
                    }
                } else {
                    marks[node] = Mark::Done;
                    post.push(node);
                    stack.pop();
                }
            }
        }

        // Anything left unvisited can only be reached through a cycle.
        if let Some(stuck) = marks.iter().position(|m| *m == Mark::Unvisited) {
            return Err(Error::CyclicGraph {
                node_id: workflow.nodes[stuck].id.clone(),
            });
        }

        post.reverse();
        Ok(Self {
            order: post,
            predecessors,
            starts,
        })
    }

    /// Node indices in execution order.
    #[must_use]
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Indices of the nodes feeding `node`, in edge declaration order.
    #[must_use]
    pub fn predecessors(&self, node: usize) -> &[usize] {
        self.predecessors.get(node).map_or(&[], Vec::as_slice)
    }

    /// Indices of the start nodes.
    #[must_use]
    pub fn starts(&self) -> &[usize] {
        &self.starts
    }

    /// Node ids in execution order.
    #[must_use]
    pub fn order_ids<'a>(&self, workflow: &'a Workflow) -> Vec<&'a str> {
        self.order
            .iter()
            .map(|&i| workflow.nodes[i].id.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::Node;
    use proptest::prelude::*;

    fn chain() -> Workflow {
        Workflow::new("wf", "chain")
            .with_node(Node::new("t", "trigger"))
            .with_node(Node::new("h", "httpRequest"))
            .with_node(Node::new("x", "transform"))
            .with_edge("t", "h")
            .with_edge("h", "x")
    }

    #[test]
    fn chain_orders_front_to_back() {
        let wf = chain();
        let plan = ExecutionPlan::build(&wf).unwrap();
        assert_eq!(plan.order_ids(&wf), vec!["t", "h", "x"]);
        assert_eq!(plan.starts(), &[0]);
    }

    #[test]
    fn diamond_puts_join_last() {
        let wf = Workflow::new("wf", "diamond")
            .with_node(Node::new("join", "merge"))
            .with_node(Node::new("left", "transform"))
            .with_node(Node::new("right", "filter"))
            .with_node(Node::new("start", "trigger"))
            .with_edge("start", "left")
            .with_edge("start", "right")
            .with_edge("left", "join")
            .with_edge("right", "join");

        let plan = ExecutionPlan::build(&wf).unwrap();
        let order = plan.order_ids(&wf);
        assert_eq!(order.first(), Some(&"start"));
        assert_eq!(order.last(), Some(&"join"));
        assert_eq!(plan.predecessors(0).len(), 2);
    }

    #[test]
    fn cycle_is_rejected() {
        let wf = chain().with_edge("x", "h");
        let err = ExecutionPlan::build(&wf).unwrap_err();
        assert!(matches!(err, Error::CyclicGraph { .. }));
    }

    #[test]
    fn unreachable_cycle_is_rejected() {
        let wf = chain()
            .with_node(Node::new("p", "transform"))
            .with_node(Node::new("q", "transform"))
            .with_edge("p", "q")
            .with_edge("q", "p");
        let err = ExecutionPlan::build(&wf).unwrap_err();
        assert!(matches!(err, Error::CyclicGraph { .. }));
    }

    #[test]
    fn fully_cyclic_graph_has_no_start() {
        let wf = Workflow::new("wf", "loop")
            .with_node(Node::new("a", "transform"))
            .with_node(Node::new("b", "transform"))
            .with_edge("a", "b")
            .with_edge("b", "a");
        assert_eq!(
            ExecutionPlan::build(&wf).unwrap_err(),
            Error::NoStartNode("wf".into())
        );
    }

    #[test]
    fn dangling_edge_is_invalid() {
        let wf = chain().with_edge("x", "ghost");
        assert!(matches!(
            ExecutionPlan::build(&wf).unwrap_err(),
            Error::InvalidGraph(_)
        ));
    }

    #[test]
    fn duplicate_ids_are_invalid() {
        let wf = chain().with_node(Node::new("h", "transform"));
        assert!(matches!(
            ExecutionPlan::build(&wf).unwrap_err(),
            Error::InvalidGraph(_)
        ));
    }

    /// Random DAG: edges only go from lower to higher index.
    fn dag() -> impl Strategy<Value = Workflow> {
        (2usize..24).prop_flat_map(|n| {
            proptest::collection::vec((0..n, 0..n), 0..n * 2).prop_map(move |pairs| {
                let mut wf = Workflow::new("wf", "random");
                for i in 0..n {
                    wf = wf.with_node(Node::new(format!("n{i}"), "transform"));
                }
                for (a, b) in pairs {
                    if a < b {
                        wf = wf.with_edge(format!("n{a}"), format!("n{b}"));
                    }
                }
                wf
            })
        })
    }

    proptest! {
        #[test]
        fn every_edge_points_forward(wf in dag()) {
            let plan = ExecutionPlan::build(&wf).unwrap();
            prop_assert_eq!(plan.order().len(), wf.nodes.len());

            let mut position = vec![0; wf.nodes.len()];
            for (pos, &node) in plan.order().iter().enumerate() {
                position[node] = pos;
            }
            for edge in &wf.edges {
                let s: usize = edge.source[1..].parse().unwrap();
                let t: usize = edge.target[1..].parse().unwrap();
                prop_assert!(position[s] < position[t]);
            }
        }
    }
}

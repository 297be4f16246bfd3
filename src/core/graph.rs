//! Pipeline graph: job nodes, the aggregation node, and their join policies

use crate::core::job::{JobSpec, Stage};
use crate::core::state::{NodeState, RunState};
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

/// Id of the node that computes the run's final status
pub const FINAL_STATUS_NODE: &str = "final_status";

/// How a node reacts to the outcome of its dependencies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinPolicy {
    /// Run only if every dependency succeeded
    RequireAllSuccess,
    /// Run once every dependency is terminal, whatever the outcome
    Unconditional,
}

/// What a node does when it runs
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Submit a job to the cluster
    Job(JobSpec),
    /// Inspect every other node and fail unless all succeeded
    Aggregate,
}

/// A node in the pipeline graph
#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub dependencies: Vec<String>,
    pub join: JoinPolicy,
    pub state: NodeState,
}

impl Node {
    pub fn job(spec: JobSpec) -> Self {
        Self {
            id: spec.task_id.clone(),
            kind: NodeKind::Job(spec),
            dependencies: Vec::new(),
            join: JoinPolicy::RequireAllSuccess,
            state: NodeState::Queued,
        }
    }

    pub fn aggregate(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::Aggregate,
            dependencies: Vec::new(),
            join: JoinPolicy::Unconditional,
            state: NodeState::Queued,
        }
    }

    pub fn after<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(dependencies.into_iter().map(Into::into));
        self
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self.kind, NodeKind::Aggregate)
    }
}

/// Outcome of checking a node's dependencies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    /// The node may run
    Open,
    /// A strict dependency failed; the node never runs
    UpstreamFailed(String),
    /// A strict dependency was skipped; the node never runs
    Skipped(String),
    /// Some dependency is not terminal yet
    Waiting,
}

/// Structural problems in a graph
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Duplicate node ID: {0}")]
    DuplicateNode(String),

    #[error("Node '{node}' depends on non-existent node '{dependency}'")]
    UnknownDependency { node: String, dependency: String },

    #[error("Cycle detected in dependency graph involving node '{0}'")]
    Cycle(String),

    #[error("Graph must contain exactly one aggregation node, found {0}")]
    AggregatorCount(usize),

    #[error("Aggregation node '{0}' must use the unconditional join policy")]
    AggregatorPolicy(String),

    #[error("Aggregation node '{aggregator}' does not depend on '{node}'")]
    AggregatorCoverage { aggregator: String, node: String },
}

/// A validated pipeline graph and its run state
#[derive(Debug, Clone)]
pub struct PipelineGraph {
    /// Pipeline name (the DAG id)
    pub name: String,

    /// Run state
    pub state: RunState,

    /// Nodes in declaration order
    nodes: Vec<Node>,

    /// Node execution order (topological sort)
    execution_order: Vec<String>,
}

impl PipelineGraph {
    /// Validate nodes and build a graph
    pub fn new(name: impl Into<String>, run_id: Uuid, nodes: Vec<Node>) -> Result<Self, GraphError> {
        Self::validate(&nodes)?;
        let execution_order = Self::topological_sort(&nodes);

        Ok(Self {
            name: name.into(),
            state: RunState::new(run_id),
            nodes,
            execution_order,
        })
    }

    /// The conformance chain: stage 1, stage 2 gated on stage 1, then the
    /// unconditional final status node after both
    pub fn conformance(
        name: impl Into<String>,
        run_id: Uuid,
        stage_one: JobSpec,
        stage_two: JobSpec,
    ) -> Result<Self, GraphError> {
        let first_id = stage_one.task_id.clone();
        let second_id = stage_two.task_id.clone();

        let nodes = vec![
            Node::job(stage_one),
            Node::job(stage_two).after([first_id.clone()]),
            Node::aggregate(FINAL_STATUS_NODE).after([first_id, second_id]),
        ];

        Self::new(name, run_id, nodes)
    }

    /// Default ids of the conformance chain, in run order
    pub fn conformance_node_ids() -> [&'static str; 3] {
        [
            Stage::ExtractAndEnrich.task_id(),
            Stage::TransformAndLoad.task_id(),
            FINAL_STATUS_NODE,
        ]
    }

    fn validate(nodes: &[Node]) -> Result<(), GraphError> {
        let mut ids = HashSet::new();
        for node in nodes {
            if !ids.insert(node.id.as_str()) {
                return Err(GraphError::DuplicateNode(node.id.clone()));
            }
        }

        for node in nodes {
            for dep in &node.dependencies {
                if !ids.contains(dep.as_str()) {
                    return Err(GraphError::UnknownDependency {
                        node: node.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        Self::check_cycles(nodes)?;

        let aggregators: Vec<&Node> = nodes.iter().filter(|n| n.is_aggregate()).collect();
        if aggregators.len() != 1 {
            return Err(GraphError::AggregatorCount(aggregators.len()));
        }

        let aggregator = aggregators[0];
        if aggregator.join != JoinPolicy::Unconditional {
            return Err(GraphError::AggregatorPolicy(aggregator.id.clone()));
        }
        for node in nodes.iter().filter(|n| n.id != aggregator.id) {
            if !aggregator.dependencies.contains(&node.id) {
                return Err(GraphError::AggregatorCoverage {
                    aggregator: aggregator.id.clone(),
                    node: node.id.clone(),
                });
            }
        }

        Ok(())
    }

    fn check_cycles(nodes: &[Node]) -> Result<(), GraphError> {
        let mut visited = HashSet::new();
        let mut recursion_stack = HashSet::new();

        for node in nodes {
            if !visited.contains(&node.id) {
                Self::dfs_check(nodes, &node.id, &mut visited, &mut recursion_stack)?;
            }
        }

        Ok(())
    }

    fn dfs_check(
        nodes: &[Node],
        node_id: &str,
        visited: &mut HashSet<String>,
        recursion_stack: &mut HashSet<String>,
    ) -> Result<(), GraphError> {
        visited.insert(node_id.to_string());
        recursion_stack.insert(node_id.to_string());

        if let Some(node) = nodes.iter().find(|n| n.id == node_id) {
            for dep in &node.dependencies {
                if recursion_stack.contains(dep) {
                    return Err(GraphError::Cycle(dep.clone()));
                }
                if !visited.contains(dep) {
                    Self::dfs_check(nodes, dep, visited, recursion_stack)?;
                }
            }
        }

        recursion_stack.remove(node_id);
        Ok(())
    }

    /// Dependencies first, otherwise declaration order
    fn topological_sort(nodes: &[Node]) -> Vec<String> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();

        for node in nodes {
            Self::visit(&node.id, nodes, &mut visited, &mut result);
        }

        result
    }

    fn visit(node_id: &str, nodes: &[Node], visited: &mut HashSet<String>, result: &mut Vec<String>) {
        if !visited.insert(node_id.to_string()) {
            return;
        }

        if let Some(node) = nodes.iter().find(|n| n.id == node_id) {
            for dep in &node.dependencies {
                Self::visit(dep, nodes, visited, result);
            }
        }

        result.push(node_id.to_string());
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Nodes in declaration order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn execution_order(&self) -> &[String] {
        &self.execution_order
    }

    /// Id of the aggregation node
    pub fn aggregator_id(&self) -> Option<&str> {
        self.nodes.iter().find(|n| n.is_aggregate()).map(|n| n.id.as_str())
    }

    /// Job specs in execution order
    pub fn job_specs(&self) -> Vec<&JobSpec> {
        self.execution_order
            .iter()
            .filter_map(|id| self.node(id))
            .filter_map(|node| match &node.kind {
                NodeKind::Job(spec) => Some(spec),
                NodeKind::Aggregate => None,
            })
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.nodes.iter().all(|n| n.state.is_terminal())
    }

    /// Set a node's state; unknown ids are ignored
    pub fn set_state(&mut self, id: &str, state: NodeState) {
        if let Some(node) = self.node_mut(id) {
            node.state = state;
        }
    }

    /// Check whether a node may run given its dependencies' states
    pub fn gate(&self, id: &str) -> Gate {
        let Some(node) = self.node(id) else {
            return Gate::Waiting;
        };

        let deps: Vec<&Node> = node
            .dependencies
            .iter()
            .filter_map(|dep| self.node(dep))
            .collect();

        if deps.iter().any(|d| !d.state.is_terminal()) {
            return Gate::Waiting;
        }

        if node.join == JoinPolicy::Unconditional {
            return Gate::Open;
        }

        if let Some(failed) = deps.iter().find(|d| {
            matches!(d.state, NodeState::Failed { .. } | NodeState::UpstreamFailed { .. })
        }) {
            return Gate::UpstreamFailed(failed.id.clone());
        }

        if let Some(skipped) = deps.iter().find(|d| !d.state.is_success()) {
            return Gate::Skipped(skipped.id.clone());
        }

        Gate::Open
    }
}

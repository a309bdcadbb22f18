// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Execution plan of one pipeline
//!
//! Sequential steps form a chain from `start`. A parallel step hangs off the
//! sequential step before it and joins at `end`, so anything not connected
//! by a path may run at the same time.

use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::errors::{PipeflowError, PipeflowResult};
use crate::pipeline::selector::Selection;
use crate::pipeline::{Pipeline, StepKind};

/// Node of the plan graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Start,
    Step { name: String, kind: StepKind },
    End,
}

impl Node {
    pub fn label(&self) -> &str {
        match self {
            Node::Start => "start",
            Node::Step { name, .. } => name,
            Node::End => "end",
        }
    }
}

/// DAG of the steps of one pipeline
pub struct ExecutionPlan {
    pipeline: String,
    graph: DiGraph<Node, ()>,
    start: NodeIndex,
    end: NodeIndex,
    steps: Vec<NodeIndex>,
}

impl ExecutionPlan {
    /// Plan every step of a pipeline
    pub fn build(pipeline: &Pipeline) -> Self {
        Self::build_filtered(pipeline, |_| true)
    }

    /// Plan the steps a selection includes
    pub fn for_selection(selection: &Selection<'_>) -> Self {
        Self::build_filtered(selection.pipeline, |name| selection.includes(name))
    }

    fn build_filtered(pipeline: &Pipeline, include: impl Fn(&str) -> bool) -> Self {
        let mut graph = DiGraph::new();
        let start = graph.add_node(Node::Start);

        let mut steps = Vec::new();
        let mut joins = Vec::new();
        let mut last_sequential = start;

        for step in pipeline.steps.iter().filter(|s| include(&s.name)) {
            let node = graph.add_node(Node::Step {
                name: step.name.clone(),
                kind: step.kind,
            });
            graph.add_edge(last_sequential, node, ());
            match step.kind {
                StepKind::Sequential => last_sequential = node,
                StepKind::Parallel => joins.push(node),
            }
            steps.push(node);
        }

        let end = graph.add_node(Node::End);
        graph.add_edge(last_sequential, end, ());
        for node in joins {
            graph.add_edge(node, end, ());
        }

        Self {
            pipeline: pipeline.name.clone(),
            graph,
            start,
            end,
            steps,
        }
    }

    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    /// Step names in declaration order
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|&n| self.graph[n].label()).collect()
    }

    fn index_of(&self, step: &str) -> Option<NodeIndex> {
        self.steps
            .iter()
            .copied()
            .find(|&n| self.graph[n].label() == step)
    }

    /// Nodes that must finish before `node` starts, in declaration order
    fn predecessors(&self, node: NodeIndex) -> Vec<&str> {
        let mut before: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(node, Direction::Incoming)
            .collect();
        before.sort();
        before.into_iter().map(|n| self.graph[n].label()).collect()
    }

    /// Names a step waits for (`start` for the first step)
    pub fn dependencies(&self, step: &str) -> Option<Vec<&str>> {
        self.index_of(step).map(|n| self.predecessors(n))
    }

    /// Whether two steps can be running at the same moment
    pub fn may_overlap(&self, a: &str, b: &str) -> bool {
        match (self.index_of(a), self.index_of(b)) {
            (Some(a), Some(b)) if a != b => {
                !has_path_connecting(&self.graph, a, b, None)
                    && !has_path_connecting(&self.graph, b, a, None)
            }
            _ => false,
        }
    }

    /// Whether `end` can only be reached after `step`
    pub fn joins_before_end(&self, step: &str) -> bool {
        self.index_of(step)
            .map(|n| has_path_connecting(&self.graph, n, self.end, None))
            .unwrap_or(false)
    }

    /// Topological order of the step names
    pub fn topological_order(&self) -> PipeflowResult<Vec<&str>> {
        let order = toposort(&self.graph, None).map_err(|cycle| PipeflowError::InvalidPipeline {
            reason: format!(
                "plan of '{}' has a cycle at '{}'",
                self.pipeline,
                self.graph[cycle.node_id()].label()
            ),
            help: None,
        })?;
        Ok(order
            .into_iter()
            .filter(|n| *n != self.start && *n != self.end)
            .map(|n| self.graph[n].label())
            .collect())
    }

    /// Generate text representation of the plan
    pub fn to_text(&self) -> String {
        let mut out = format!("{}\n", self.pipeline);

        for (i, &node) in self.steps.iter().enumerate() {
            if let Node::Step { name, kind } = &self.graph[node] {
                out.push_str(&format!(
                    "  {}. {} ({}) [after: {}]\n",
                    i + 1,
                    name,
                    kind,
                    self.predecessors(node).join(", ")
                ));
            }
        }
        out.push_str(&format!(
            "  end [joins: {}]\n",
            self.predecessors(self.end).join(", ")
        ));

        out
    }

    fn node_id(&self, node: NodeIndex) -> String {
        match self.graph[node] {
            Node::Start => "start".to_string(),
            Node::End => "done".to_string(),
            Node::Step { .. } => format!("step{}", node.index()),
        }
    }

    /// Generate DOT diagram of the plan
    pub fn to_dot(&self) -> String {
        let mut out = format!("digraph \"{}\" {{\n", self.pipeline);
        out.push_str("    rankdir=TB;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for node in self.graph.node_indices() {
            let attrs = match &self.graph[node] {
                Node::Start | Node::End => "shape=circle".to_string(),
                Node::Step {
                    kind: StepKind::Parallel,
                    ..
                } => "style=\"rounded,dashed\"".to_string(),
                Node::Step { .. } => String::new(),
            };
            let label = self.graph[node].label().replace('"', "\\\"");
            let sep = if attrs.is_empty() { "" } else { ", " };
            out.push_str(&format!(
                "    {} [label=\"{}\"{}{}];\n",
                self.node_id(node),
                label,
                sep,
                attrs
            ));
        }
        out.push('\n');

        for edge in self.graph.raw_edges() {
            out.push_str(&format!(
                "    {} -> {};\n",
                self.node_id(edge.source()),
                self.node_id(edge.target())
            ));
        }

        out.push_str("}\n");
        out
    }

    /// Generate Mermaid diagram of the plan
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");

        for node in self.graph.node_indices() {
            let id = self.node_id(node);
            let label = self.graph[node].label().replace('"', "#quot;");
            let shape = match &self.graph[node] {
                Node::Start | Node::End => format!("(({}))", label),
                Node::Step {
                    kind: StepKind::Parallel,
                    ..
                } => format!("[[\"{}\"]]", label),
                Node::Step { .. } => format!("[\"{}\"]", label),
            };
            out.push_str(&format!("    {}{}\n", id, shape));
        }

        for edge in self.graph.raw_edges() {
            out.push_str(&format!(
                "    {} --> {}\n",
                self.node_id(edge.source()),
                self.node_id(edge.target())
            ));
        }

        out
    }
}

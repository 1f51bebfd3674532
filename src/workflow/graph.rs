use std::{collections::HashMap, fmt::Display};

use petgraph::{
    algo::has_path_connecting,
    dot::Dot,
    stable_graph::{NodeIndex, StableGraph},
    visit::EdgeRef,
};
use thiserror::Error;

pub const START: &str = "__start__";
pub const END: &str = "__end__";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Step not found: {0}")]
    StepNotFound(String),
    #[error("Step already exists: {0}")]
    StepExists(String),
    #[error("Step {0} is not connected between start and end")]
    Disconnected(String),
}

/// How a transition is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Always,
    Conditional,
}

impl Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Edge::Always => Ok(()),
            Edge::Conditional => f.write_str("conditional"),
        }
    }
}

/// The declared topology of a workflow: named steps and the transitions allowed between them.
///
/// Workflows run their own control flow; the graph is what they check each transition
/// against and what gets rendered for humans.
#[derive(Debug, Clone)]
pub struct StepGraph {
    graph: StableGraph<String, Edge>,
    steps: HashMap<String, NodeIndex>,
}

impl StepGraph {
    pub fn new() -> Self {
        let mut graph = Self {
            graph: StableGraph::new(),
            steps: HashMap::new(),
        };
        graph.insert(START);
        graph.insert(END);
        graph
    }

    fn insert(&mut self, name: &str) -> NodeIndex {
        let index = self.graph.add_node(name.to_owned());
        self.steps.insert(name.to_owned(), index);
        index
    }

    fn index(&self, name: &str) -> Result<NodeIndex, GraphError> {
        self.steps
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::StepNotFound(name.to_owned()))
    }

    pub fn add_step(&mut self, name: &str) -> Result<&mut Self, GraphError> {
        if self.steps.contains_key(name) {
            return Err(GraphError::StepExists(name.to_owned()));
        }
        self.insert(name);
        Ok(self)
    }

    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<&mut Self, GraphError> {
        let (from, to) = (self.index(from)?, self.index(to)?);
        self.graph.update_edge(from, to, Edge::Always);
        Ok(self)
    }

    /// Declare that a router picks one of `targets` after `from`.
    pub fn add_conditional_edges(
        &mut self,
        from: &str,
        targets: &[&str],
    ) -> Result<&mut Self, GraphError> {
        let from = self.index(from)?;
        for target in targets {
            let to = self.index(target)?;
            self.graph.update_edge(from, to, Edge::Conditional);
        }
        Ok(self)
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        match (self.steps.get(from), self.steps.get(to)) {
            (Some(&from), Some(&to)) => self.graph.contains_edge(from, to),
            _ => false,
        }
    }

    /// Steps reachable in one transition from `name`, sorted.
    pub fn successors(&self, name: &str) -> Result<Vec<&str>, GraphError> {
        let index = self.index(name)?;
        let mut successors: Vec<&str> = self
            .graph
            .edges(index)
            .map(|edge| self.graph[edge.target()].as_str())
            .collect();
        successors.sort_unstable();
        Ok(successors)
    }

    /// Every step must be reachable from [START] and must be able to reach [END].
    pub fn validate(&self) -> Result<(), GraphError> {
        let start = self.index(START)?;
        let end = self.index(END)?;
        let mut names: Vec<_> = self.steps.iter().collect();
        names.sort_unstable();
        for (name, &index) in names {
            if !has_path_connecting(&self.graph, start, index, None)
                || !has_path_connecting(&self.graph, index, end, None)
            {
                return Err(GraphError::Disconnected(name.clone()));
            }
        }
        Ok(())
    }

    /// Graphviz rendering of the workflow.
    pub fn to_dot(&self) -> String {
        format!("{}", Dot::with_config(&self.graph, &[]))
    }
}

impl Default for StepGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loop_graph() -> StepGraph {
        let mut graph = StepGraph::new();
        graph
            .add_step("summarizer")
            .unwrap()
            .add_step("reviewer")
            .unwrap()
            .add_step("final_step")
            .unwrap();
        graph
            .add_edge(START, "summarizer")
            .unwrap()
            .add_edge("summarizer", "reviewer")
            .unwrap()
            .add_conditional_edges("reviewer", &["summarizer", "final_step"])
            .unwrap()
            .add_edge("final_step", END)
            .unwrap();
        graph
    }

    #[test]
    fn declared_edges() {
        let graph = loop_graph();
        assert!(graph.has_edge("reviewer", "summarizer"));
        assert!(!graph.has_edge("summarizer", "final_step"));
        assert!(!graph.has_edge("ghost", END));
        assert_eq!(
            graph.successors("reviewer").unwrap(),
            vec!["final_step", "summarizer"]
        );
        assert_eq!(graph.validate(), Ok(()));
    }

    #[test]
    fn detects_disconnected_steps() {
        let mut graph = loop_graph();
        graph.add_step("orphan").unwrap();
        assert_eq!(
            graph.validate(),
            Err(GraphError::Disconnected("orphan".to_owned()))
        );
        assert_eq!(
            graph.add_step("orphan").err(),
            Some(GraphError::StepExists("orphan".to_owned()))
        );
        assert_eq!(
            graph.add_edge("orphan", "nowhere").err(),
            Some(GraphError::StepNotFound("nowhere".to_owned()))
        );
    }

    #[test]
    fn renders_dot() {
        let dot = loop_graph().to_dot();
        assert!(dot.starts_with("digraph {"));
        assert!(dot.contains("summarizer"));
        assert!(dot.contains("conditional"));
    }
}

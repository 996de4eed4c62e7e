//! Dependency graph of external commands
//!
//! Nodes are plain data: a name, a shell command and the names of the nodes
//! that must succeed first. Executors take the node list by value and own all
//! scheduling state.

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Unique node name; also used as the scheduler job name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub String);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One unit of external work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobNode {
    pub id: NodeId,
    pub command: String,
    pub dependencies: Vec<NodeId>,
}

impl JobNode {
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: NodeId(id.into()),
            command: command.into(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, dependency: &JobNode) -> Self {
        self.dependencies.push(dependency.id.clone());
        self
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Duplicate node name: {0}")]
    DuplicateNode(NodeId),
    #[error("Node {node} depends on unknown node {dependency}")]
    UnknownDependency { node: NodeId, dependency: NodeId },
    #[error("Dependency cycle through node {0}")]
    Cycle(NodeId),
}

/// Split `nodes` into dependency levels.
///
/// Level 0 holds nodes without dependencies; a node sits one level below its
/// deepest dependency. Running levels in order therefore never starts a node
/// before all of its predecessors have finished. Input order is kept within a
/// level.
pub fn dependency_levels(nodes: Vec<JobNode>) -> Result<Vec<Vec<JobNode>>, GraphError> {
    let mut index: HashMap<NodeId, usize> = HashMap::with_capacity(nodes.len());
    for (i, node) in nodes.iter().enumerate() {
        if index.insert(node.id.clone(), i).is_some() {
            return Err(GraphError::DuplicateNode(node.id.clone()));
        }
    }
    for node in &nodes {
        for dep in &node.dependencies {
            if !index.contains_key(dep) {
                return Err(GraphError::UnknownDependency {
                    node: node.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    let mut depth: Vec<Option<usize>> = vec![None; nodes.len()];
    let mut visiting = vec![false; nodes.len()];
    for start in 0..nodes.len() {
        resolve_depth(start, &nodes, &index, &mut depth, &mut visiting)?;
    }

    let max_depth = depth.iter().flatten().copied().max();
    let mut levels: Vec<Vec<JobNode>> = match max_depth {
        Some(max) => vec![Vec::new(); max + 1],
        None => Vec::new(),
    };
    for (node, level) in nodes.into_iter().zip(depth) {
        // every entry was filled by resolve_depth
        if let Some(level) = level {
            levels[level].push(node);
        }
    }
    Ok(levels)
}

fn resolve_depth(
    i: usize,
    nodes: &[JobNode],
    index: &HashMap<NodeId, usize>,
    depth: &mut [Option<usize>],
    visiting: &mut [bool],
) -> Result<usize, GraphError> {
    if let Some(d) = depth[i] {
        return Ok(d);
    }
    if visiting[i] {
        return Err(GraphError::Cycle(nodes[i].id.clone()));
    }
    visiting[i] = true;

    let mut d = 0;
    for dep in &nodes[i].dependencies {
        let j = index[dep];
        d = d.max(resolve_depth(j, nodes, index, depth, visiting)? + 1);
    }

    visiting[i] = false;
    depth[i] = Some(d);
    Ok(d)
}

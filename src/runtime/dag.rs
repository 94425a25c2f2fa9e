/// Execution ordering for workflow graphs
///
/// Builds a petgraph `DiGraph` from the definition and orders it with Kahn's
/// algorithm. Graph node indices follow definition order and outgoing edges are
/// visited in the order they were declared, so ties always resolve the same way.

use crate::error::{DefinitionError, EdgeSide, EngineError, Result};
use crate::workflow::{WorkflowEdge, WorkflowNode};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, VecDeque};

/// Topologically sort `nodes` along `edges`
///
/// Fails with `CycleDetected` if any node is left unordered; no partial order is
/// returned.
pub fn topological_order<'a>(
    nodes: &'a [WorkflowNode],
    edges: &[WorkflowEdge],
) -> Result<Vec<&'a WorkflowNode>> {
    let graph = build_graph(nodes, edges)?;

    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|index| graph.edges_directed(index, Direction::Incoming).count())
        .collect();

    let mut queue: VecDeque<NodeIndex> = graph
        .node_indices()
        .filter(|index| in_degree[index.index()] == 0)
        .collect();

    let mut ordered = Vec::with_capacity(nodes.len());
    while let Some(current) = queue.pop_front() {
        ordered.push(graph[current]);

        let mut outgoing: Vec<_> = graph.edges(current).collect();
        outgoing.sort_by_key(|edge| edge.id());
        for edge in outgoing {
            let target = edge.target();
            in_degree[target.index()] -= 1;
            if in_degree[target.index()] == 0 {
                queue.push_back(target);
            }
        }
    }

    if ordered.len() != nodes.len() {
        tracing::error!(
            "❌ Workflow graph contains a cycle ({} of {} nodes ordered)",
            ordered.len(),
            nodes.len()
        );
        return Err(EngineError::CycleDetected {
            ordered: ordered.len(),
            total: nodes.len(),
        });
    }

    tracing::debug!(
        "📋 Execution order: {:?}",
        ordered.iter().map(|node| node.id.as_str()).collect::<Vec<_>>()
    );
    Ok(ordered)
}

fn build_graph<'a>(
    nodes: &'a [WorkflowNode],
    edges: &[WorkflowEdge],
) -> Result<DiGraph<&'a WorkflowNode, ()>> {
    let mut graph = DiGraph::with_capacity(nodes.len(), edges.len());
    let mut index_of: HashMap<&str, NodeIndex> = HashMap::with_capacity(nodes.len());

    for node in nodes {
        let index = graph.add_node(node);
        index_of.insert(node.id.as_str(), index);
    }

    for edge in edges {
        let source = *index_of.get(edge.source.as_str()).ok_or_else(|| {
            DefinitionError::UnknownNodeReference {
                node_id: edge.source.clone(),
                side: EdgeSide::Source,
            }
        })?;
        let target = *index_of.get(edge.target.as_str()).ok_or_else(|| {
            DefinitionError::UnknownNodeReference {
                node_id: edge.target.clone(),
                side: EdgeSide::Target,
            }
        })?;
        graph.add_edge(source, target, ());
    }

    Ok(graph)
}

//! Graph algorithms over any [`DirectedGraph`] backing.
//!
//! All results are deterministic for a given graph: vertex iteration is
//! ascending and ties are broken by ascending identifier.

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{DirectedGraph, Identifier};

pub type Depth = i32;
pub type DepthMap = FxHashMap<Identifier, Depth>;

/// All vertices `id` directly depends on, ascending.
pub fn direct_dependencies(graph: &dyn DirectedGraph, id: Identifier) -> Vec<Identifier> {
	if !graph.is_in_range(id) {
		return Vec::new();
	}
	graph.vertices().into_iter().filter(|&dep| dep != id && graph.is_directly_depending_on(id, dep)).collect()
}

/// All vertices reachable from `id` along dependency edges, excluding `id` itself. Ascending.
pub fn all_dependencies(graph: &dyn DirectedGraph, id: Identifier) -> Vec<Identifier> {
	if !graph.is_in_range(id) {
		return Vec::new();
	}

	let mut visited = FxHashSet::default();
	let mut to_visit = VecDeque::new();
	to_visit.push_back(id);
	visited.insert(id);

	while let Some(next) = to_visit.pop_front() {
		for dep in direct_dependencies(graph, next) {
			if visited.insert(dep) {
				to_visit.push_back(dep);
			}
		}
	}

	visited.remove(&id);
	let mut dependencies: Vec<_> = visited.into_iter().collect();
	dependencies.sort_unstable();
	dependencies
}

/// All vertices that directly depend on `predecessor`, ascending.
pub fn determine_successors(graph: &dyn DirectedGraph, predecessor: Identifier) -> Vec<Identifier> {
	graph.vertices().into_iter().filter(|&id| graph.is_directly_depending_on(id, predecessor)).collect()
}

/// Whether a dependency path from `start` ends in an edge into `target`.
/// Probing edges rather than visited vertices keeps the start vertex itself
/// from counting as reached, which is what cycle detection relies on.
fn reaches(graph: &dyn DirectedGraph, start: Identifier, target: Identifier) -> bool {
	if start < 0 || target < 0 {
		return false;
	}

	let mut visited = FxHashSet::default();
	let mut to_visit = VecDeque::new();
	to_visit.push_back(start);
	visited.insert(start);

	while let Some(next) = to_visit.pop_front() {
		if graph.is_directly_depending_on(next, target) {
			return true;
		}
		for dep in direct_dependencies(graph, next) {
			if visited.insert(dep) {
				to_visit.push_back(dep);
			}
		}
	}
	false
}

/// Whether `id` depends on `dependency`, directly or transitively.
/// Strict: false for `id == dependency`.
pub fn is_depending_on(graph: &dyn DirectedGraph, id: Identifier, dependency: Identifier) -> bool {
	if id == dependency {
		return false;
	}
	reaches(graph, id, dependency)
}

/// Adds the edge `id -> dependency` unless that would close a cycle.
/// Returns whether the edge was added.
pub fn add_dependency_if_conflict_free(graph: &mut dyn DirectedGraph, id: Identifier, dependency: Identifier) -> bool {
	if id < 0 || dependency < 0 {
		return false;
	}
	if is_depending_on(graph, dependency, id) {
		return false;
	}
	graph.add_dependency(id, dependency);
	true
}

/// Topological order of all vertices: dependencies come before their
/// dependents. Iterative DFS post-order, ties broken by ascending identifier.
pub fn topological_sort(graph: &dyn DirectedGraph) -> Vec<Identifier> {
	enum Visit {
		Child,
		Parent,
	}

	let mut to_visit = Vec::new();
	let mut visited = FxHashSet::default();
	let mut emitted = FxHashSet::default();
	let mut order = Vec::new();

	for id in graph.vertices() {
		if !visited.contains(&id) {
			to_visit.push((Visit::Child, id));
		}

		while let Some((kind, vertex)) = to_visit.pop() {
			match kind {
				Visit::Parent => {
					if emitted.insert(vertex) {
						order.push(vertex);
					}
				}
				Visit::Child => {
					visited.insert(vertex);
					to_visit.push((Visit::Parent, vertex));
					// Reverse so the smallest dependency is visited first.
					for dep in direct_dependencies(graph, vertex).into_iter().rev() {
						if !visited.contains(&dep) {
							to_visit.push((Visit::Child, dep));
						}
					}
				}
			}
		}
	}

	order
}

/// BFS levels from `start` along dependency edges. A vertex reachable over
/// several paths keeps the maximum level.
pub fn determine_depth(graph: &dyn DirectedGraph, start: Identifier) -> DepthMap {
	let mut result = DepthMap::default();
	if !graph.is_in_range(start) {
		return result;
	}

	let depth_limit = graph.size() as Depth;
	let mut to_visit = VecDeque::new();
	to_visit.push_back((start, 0));

	while let Some((vertex, depth)) = to_visit.pop_front() {
		let entry = result.entry(vertex).or_insert(depth);
		*entry = (*entry).max(depth);

		if depth >= depth_limit {
			continue;
		}
		for dep in direct_dependencies(graph, vertex) {
			if result.get(&dep).is_none_or(|&known| depth + 1 > known) {
				to_visit.push_back((dep, depth + 1));
			}
		}
	}
	result
}

/// All vertices without any dependency, ascending.
pub fn in_degree_zero_vertices(graph: &dyn DirectedGraph) -> Vec<Identifier> {
	graph.vertices().into_iter().filter(|&id| !graph.has_predecessors(id)).collect()
}

/// Whether any vertex transitively reaches itself.
pub fn is_cyclic(graph: &dyn DirectedGraph) -> bool {
	graph.vertices().into_iter().any(|vertex| reaches(graph, vertex, vertex))
}

/// Adjacency-matrix dump for debugging.
pub fn graph_to_string(graph: &dyn DirectedGraph) -> String {
	use std::fmt::Write;

	let vertices = graph.vertices();
	let mut output = String::from("\n\t");
	for col in &vertices {
		write!(output, "\t{col}").unwrap();
	}
	output.push('\n');

	for &row in &vertices {
		write!(output, "{row}\t|").unwrap();
		for &col in &vertices {
			output.push('\t');
			output.push(if graph.is_directly_depending_on(row, col) { 'X' } else { ' ' });
		}
		output.push('\n');
	}
	output
}

/// GraphViz projection with edges pointing from dependency to dependent.
pub fn graph_to_graphviz(graph: &dyn DirectedGraph) -> String {
	use std::fmt::Write;

	let mut output = String::from("digraph G {\n");
	for vertex in graph.vertices() {
		for dep in direct_dependencies(graph, vertex) {
			writeln!(output, "\t\"{dep}\" -> \"{vertex}\"").unwrap();
		}
	}
	output.push_str("}\n");
	output
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::{AdjacencyListDirectedGraph, DenseDirectedGraph};

	fn backings() -> Vec<Box<dyn DirectedGraph>> {
		vec![Box::new(DenseDirectedGraph::new(32)), Box::new(AdjacencyListDirectedGraph::new())]
	}

	/// 0 depends on 1 and 2, 1 depends on 3, 2 depends on 3.
	fn diamond(graph: &mut dyn DirectedGraph) {
		graph.add_dependency(0, 1);
		graph.add_dependency(0, 2);
		graph.add_dependency(1, 3);
		graph.add_dependency(2, 3);
	}

	#[test]
	fn vertices_are_created_by_edges() {
		for mut graph in backings() {
			diamond(graph.as_mut());
			assert_eq!(graph.vertices(), vec![0, 1, 2, 3]);
		}
	}

	#[test]
	fn self_dependencies_are_rejected() {
		for mut graph in backings() {
			graph.add_dependency(5, 5);
			assert!(!graph.is_directly_depending_on(5, 5));
		}
	}

	#[test]
	fn direct_and_transitive_dependencies() {
		for mut graph in backings() {
			diamond(graph.as_mut());
			assert_eq!(direct_dependencies(graph.as_ref(), 0), vec![1, 2]);
			assert_eq!(all_dependencies(graph.as_ref(), 0), vec![1, 2, 3]);
			assert!(is_depending_on(graph.as_ref(), 0, 3));
			assert!(!is_depending_on(graph.as_ref(), 3, 0));
			assert!(!is_depending_on(graph.as_ref(), 0, 0));
		}
	}

	#[test]
	fn remove_dependency_only_removes_one_edge() {
		for mut graph in backings() {
			diamond(graph.as_mut());
			graph.remove_dependency(0, 1);
			assert!(!graph.is_directly_depending_on(0, 1));
			assert!(graph.is_directly_depending_on(0, 2));
			// Still reachable through 2.
			assert!(is_depending_on(graph.as_ref(), 0, 3));
		}
	}

	#[test]
	fn remove_vertex_removes_incident_edges() {
		for mut graph in backings() {
			diamond(graph.as_mut());
			graph.remove_vertex(2);
			assert_eq!(graph.vertices(), vec![0, 1, 3]);
			assert!(!graph.is_directly_depending_on(0, 2));
			assert!(!graph.is_directly_depending_on(2, 3));
			// Removing an absent vertex is a no-op.
			graph.remove_vertex(17);
			assert_eq!(graph.vertices(), vec![0, 1, 3]);
		}
	}

	#[test]
	fn topological_sort_is_a_valid_order() {
		for mut graph in backings() {
			diamond(graph.as_mut());
			graph.add_dependency(4, 0);
			let order = topological_sort(graph.as_ref());
			assert_eq!(order.len(), graph.vertices().len());
			let position = |id: Identifier| order.iter().position(|&v| v == id).unwrap();
			for &vertex in &order {
				for dep in direct_dependencies(graph.as_ref(), vertex) {
					assert!(position(dep) < position(vertex), "{dep} must precede {vertex} in {order:?}");
				}
			}
		}
	}

	#[test]
	fn topological_sort_is_deterministic() {
		for mut graph in backings() {
			diamond(graph.as_mut());
			assert_eq!(topological_sort(graph.as_ref()), vec![3, 1, 2, 0]);
		}
	}

	#[test]
	fn depth_map_keeps_the_maximum_level() {
		for mut graph in backings() {
			diamond(graph.as_mut());
			// 3 becomes reachable at level 1 directly and at level 2 via 1 or 2.
			graph.add_dependency(0, 3);
			let depths = determine_depth(graph.as_ref(), 0);
			assert_eq!(depths[&0], 0);
			assert_eq!(depths[&1], 1);
			assert_eq!(depths[&2], 1);
			assert_eq!(depths[&3], 2);
		}
	}

	#[test]
	fn in_degree_zero_lists_leaves() {
		for mut graph in backings() {
			diamond(graph.as_mut());
			assert_eq!(in_degree_zero_vertices(graph.as_ref()), vec![3]);
		}
	}

	#[test]
	fn conflict_free_insertion_refuses_cycles() {
		for mut graph in backings() {
			assert!(add_dependency_if_conflict_free(graph.as_mut(), 1, 0));
			assert!(add_dependency_if_conflict_free(graph.as_mut(), 2, 1));
			assert!(!add_dependency_if_conflict_free(graph.as_mut(), 0, 2));
			assert!(!graph.is_directly_depending_on(0, 2));
			assert!(!is_cyclic(graph.as_ref()));
		}
	}

	#[test]
	fn cycle_detection() {
		for mut graph in backings() {
			diamond(graph.as_mut());
			assert!(!is_cyclic(graph.as_ref()));
			// Close the loop behind the substrate's back.
			graph.add_dependency(3, 0);
			assert!(is_cyclic(graph.as_ref()));
		}
	}

	#[test]
	fn out_of_range_queries_answer_empty() {
		let graph = DenseDirectedGraph::new(4);
		assert!(direct_dependencies(&graph, 9).is_empty());
		assert!(all_dependencies(&graph, -1).is_empty());
		assert!(!is_depending_on(&graph, 9, 1));
		assert!(determine_depth(&graph, 9).is_empty());
	}
}

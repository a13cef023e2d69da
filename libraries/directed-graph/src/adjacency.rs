use std::collections::BTreeSet;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{DirectedGraph, Identifier};

/// Adjacency-list backing that grows with the graph.
///
/// Edge tests are O(1) expected and memory is O(V + E), which suits sparse
/// graphs with large or gappy identifier ranges such as resource-level
/// dependency tracking.
#[derive(Clone, Debug, Default)]
pub struct AdjacencyListDirectedGraph {
	vertices: BTreeSet<Identifier>,
	outgoing: FxHashMap<Identifier, FxHashSet<Identifier>>,
	incoming: FxHashMap<Identifier, FxHashSet<Identifier>>,
	max_vertex_id: Identifier,
}

impl AdjacencyListDirectedGraph {
	pub fn new() -> Self {
		Self {
			max_vertex_id: -1,
			..Default::default()
		}
	}
}

impl DirectedGraph for AdjacencyListDirectedGraph {
	fn add_vertex(&mut self, id: Identifier) {
		if id < 0 {
			return;
		}
		self.vertices.insert(id);
		if id > self.max_vertex_id {
			self.max_vertex_id = id;
		}
	}

	fn remove_vertex(&mut self, id: Identifier) {
		if !self.vertices.remove(&id) {
			return;
		}
		if id == self.max_vertex_id {
			self.max_vertex_id = self.vertices.last().copied().unwrap_or(-1);
		}

		if let Some(dependencies) = self.outgoing.remove(&id) {
			for dependency in dependencies {
				if let Some(dependents) = self.incoming.get_mut(&dependency) {
					dependents.remove(&id);
				}
			}
		}
		if let Some(dependents) = self.incoming.remove(&id) {
			for dependent in dependents {
				if let Some(dependencies) = self.outgoing.get_mut(&dependent) {
					dependencies.remove(&id);
				}
			}
		}
	}

	fn add_dependency(&mut self, id: Identifier, dependency: Identifier) {
		if id == dependency || id < 0 || dependency < 0 {
			return;
		}
		self.add_vertex(id);
		self.add_vertex(dependency);

		self.outgoing.entry(id).or_default().insert(dependency);
		self.incoming.entry(dependency).or_default().insert(id);
	}

	fn remove_dependency(&mut self, id: Identifier, dependency: Identifier) {
		if let Some(dependencies) = self.outgoing.get_mut(&id) {
			dependencies.remove(&dependency);
		}
		if let Some(dependents) = self.incoming.get_mut(&dependency) {
			dependents.remove(&id);
		}
	}

	fn is_directly_depending_on(&self, id: Identifier, dependency: Identifier) -> bool {
		if id == dependency {
			return false;
		}
		self.outgoing.get(&id).is_some_and(|dependencies| dependencies.contains(&dependency))
	}

	fn has_predecessors(&self, id: Identifier) -> bool {
		self.outgoing.get(&id).is_some_and(|dependencies| !dependencies.is_empty())
	}

	fn size(&self) -> usize {
		if self.vertices.is_empty() { 0 } else { self.max_vertex_id as usize + 1 }
	}

	fn is_in_range(&self, id: Identifier) -> bool {
		id >= 0
	}

	fn vertices(&self) -> Vec<Identifier> {
		self.vertices.iter().copied().collect()
	}
}

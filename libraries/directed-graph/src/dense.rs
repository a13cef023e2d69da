use std::collections::BTreeSet;

use crate::{DirectedGraph, Identifier};

/// Bit-matrix backing with a fixed capacity chosen at construction.
///
/// Edge tests are O(1) at the cost of O(size²) memory, which suits the small,
/// densely linked graphs inside a single function model. Identifiers outside
/// `0..size` are ignored by every operation.
#[derive(Clone, Debug)]
pub struct DenseDirectedGraph {
	data: Vec<bool>,
	size: usize,
	vertices: BTreeSet<Identifier>,
	dependencies: Vec<Vec<Identifier>>,
}

impl DenseDirectedGraph {
	pub fn new(size: usize) -> Self {
		Self {
			data: vec![false; size * size],
			size,
			vertices: BTreeSet::new(),
			dependencies: vec![Vec::new(); size],
		}
	}

	fn index(&self, id: Identifier, dependency: Identifier) -> usize {
		id as usize * self.size + dependency as usize
	}
}

impl DirectedGraph for DenseDirectedGraph {
	fn add_vertex(&mut self, id: Identifier) {
		if self.is_in_range(id) {
			self.vertices.insert(id);
		}
	}

	fn remove_vertex(&mut self, id: Identifier) {
		if !self.vertices.remove(&id) {
			return;
		}
		let others: Vec<_> = self.vertices.iter().copied().collect();
		for other in others {
			self.remove_dependency(id, other);
			self.remove_dependency(other, id);
		}
	}

	fn add_dependency(&mut self, id: Identifier, dependency: Identifier) {
		if id == dependency || !self.is_in_range(id) || !self.is_in_range(dependency) {
			return;
		}
		self.add_vertex(id);
		self.add_vertex(dependency);

		let index = self.index(id, dependency);
		if !self.data[index] {
			self.data[index] = true;
			self.dependencies[id as usize].push(dependency);
		}
	}

	fn remove_dependency(&mut self, id: Identifier, dependency: Identifier) {
		if !self.is_in_range(id) || !self.is_in_range(dependency) {
			return;
		}
		let index = self.index(id, dependency);
		if self.data[index] {
			self.data[index] = false;
			self.dependencies[id as usize].retain(|&dep| dep != dependency);
		}
	}

	fn is_directly_depending_on(&self, id: Identifier, dependency: Identifier) -> bool {
		if id == dependency || !self.is_in_range(id) || !self.is_in_range(dependency) {
			return false;
		}
		self.data[self.index(id, dependency)]
	}

	fn has_predecessors(&self, id: Identifier) -> bool {
		self.is_in_range(id) && !self.dependencies[id as usize].is_empty()
	}

	fn size(&self) -> usize {
		self.size
	}

	fn is_in_range(&self, id: Identifier) -> bool {
		id >= 0 && (id as usize) < self.size
	}

	fn vertices(&self) -> Vec<Identifier> {
		self.vertices.iter().copied().collect()
	}
}

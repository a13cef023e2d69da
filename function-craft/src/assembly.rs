use std::collections::BTreeMap;

use directed_graph::{AdjacencyListDirectedGraph, DirectedGraph, Identifier, algorithms};

use crate::model::Model;
use crate::node::NodeKind;
use crate::types::{NodeId, ResourceId};

/// All models of a document, keyed by resource id, with one model designated
/// as the entry point ("assembly model"). Function calls refer to other
/// models only through their resource id and resolve through this map on
/// every lookup.
#[derive(Clone, Debug)]
pub struct Assembly {
	models: BTreeMap<ResourceId, Model>,
	assembly_model_id: ResourceId,
	next_resource_id: ResourceId,
}

/// Outcome of checking whether a model can be deleted from the assembly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemovalCheck {
	pub can_be_removed: bool,
	/// Models that reference the candidate through function calls or
	/// resource nodes.
	pub dependent_models: Vec<ResourceId>,
}

impl Assembly {
	/// An assembly with a single entry model carrying the default
	/// `pos -> shape, color` signature.
	pub fn new() -> Self {
		let mut entry = Model::new(1);
		entry.set_display_name("assembly");
		entry.create_begin_end_with_default_in_and_outs();
		Self {
			models: BTreeMap::from([(1, entry)]),
			assembly_model_id: 1,
			next_resource_id: 2,
		}
	}

	pub fn assembly_model_id(&self) -> ResourceId {
		self.assembly_model_id
	}

	pub fn assembly_model(&self) -> Option<&Model> {
		self.models.get(&self.assembly_model_id)
	}

	pub fn assembly_model_mut(&mut self) -> Option<&mut Model> {
		self.models.get_mut(&self.assembly_model_id)
	}

	pub fn find_model(&self, resource_id: ResourceId) -> Option<&Model> {
		self.models.get(&resource_id)
	}

	pub fn find_model_mut(&mut self, resource_id: ResourceId) -> Option<&mut Model> {
		self.models.get_mut(&resource_id)
	}

	pub fn models(&self) -> impl Iterator<Item = (&ResourceId, &Model)> {
		self.models.iter()
	}

	pub fn models_mut(&mut self) -> impl Iterator<Item = (&ResourceId, &mut Model)> {
		self.models.iter_mut()
	}

	pub fn model_ids(&self) -> Vec<ResourceId> {
		self.models.keys().copied().collect()
	}

	/// Inserts a model under its own resource id, allocating a fresh one if
	/// the model has none yet.
	pub fn add_model(&mut self, mut model: Model) -> ResourceId {
		let id = if model.resource_id() == 0 { self.allocate_resource_id() } else { model.resource_id() };
		model.set_resource_id(id);
		if id >= self.next_resource_id {
			self.next_resource_id = id + 1;
		}
		self.models.insert(id, model);
		id
	}

	/// Creates an empty function model with the minimal `pos -> shape`
	/// signature and returns its resource id.
	pub fn create_function(&mut self, display_name: impl Into<String>) -> ResourceId {
		let id = self.allocate_resource_id();
		let mut model = Model::new(id);
		model.set_display_name(display_name);
		model.create_begin_end();
		self.models.insert(id, model);
		id
	}

	pub fn delete_model(&mut self, resource_id: ResourceId) -> bool {
		if resource_id == self.assembly_model_id {
			return false;
		}
		self.models.remove(&resource_id).is_some()
	}

	fn allocate_resource_id(&mut self) -> ResourceId {
		let id = self.next_resource_id;
		self.next_resource_id += 1;
		id
	}

	/// Dependency graph over resource ids: an edge `a -> b` records that
	/// model `a` references model `b` through a `FunctionCall` or a
	/// `Resource` node carrying `b`'s id.
	pub fn resource_dependency_graph(&self) -> AdjacencyListDirectedGraph {
		let mut graph = AdjacencyListDirectedGraph::new();
		for (&resource_id, model) in &self.models {
			graph.add_vertex(resource_id as Identifier);
			for referenced in model_references(model) {
				if self.models.contains_key(&referenced) {
					graph.add_dependency(resource_id as Identifier, referenced as Identifier);
				}
			}
		}
		graph
	}

	/// A model can be removed when no other model references it and it is
	/// not the entry point.
	pub fn can_model_be_removed(&self, resource_id: ResourceId) -> RemovalCheck {
		if resource_id == self.assembly_model_id {
			return RemovalCheck {
				can_be_removed: false,
				dependent_models: Vec::new(),
			};
		}
		let graph = self.resource_dependency_graph();
		let dependent_models: Vec<ResourceId> =
			algorithms::determine_successors(&graph, resource_id as Identifier).into_iter().map(|id| id as ResourceId).collect();
		RemovalCheck {
			can_be_removed: dependent_models.is_empty(),
			dependent_models,
		}
	}
}

impl Default for Assembly {
	fn default() -> Self {
		Self::new()
	}
}

/// Resource ids a model references through its call and resource nodes.
fn model_references(model: &Model) -> Vec<ResourceId> {
	let mut references = Vec::new();
	for (&node_id, node) in model.nodes() {
		match node.kind() {
			NodeKind::FunctionCall => references.extend(model.resolve_function_id(node_id)),
			NodeKind::Resource => {
				references.extend(resource_node_id(model, node_id));
			}
			_ => {}
		}
	}
	references.sort_unstable();
	references.dedup();
	references
}

fn resource_node_id(model: &Model, node_id: NodeId) -> Option<ResourceId> {
	model
		.get_node(node_id)?
		.parameter(crate::field_names::RESOURCE_ID)?
		.value()
		.as_resource_id()
		.filter(|&id| id != 0)
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn new_assembly_has_an_entry_model() {
		let assembly = Assembly::new();
		let entry = assembly.assembly_model().unwrap();
		assert!(entry.begin_id().is_assigned());
		assert!(entry.end_node().unwrap().parameter("shape").is_some());
		assert!(entry.end_node().unwrap().parameter("color").is_some());
	}

	#[test]
	fn created_functions_get_fresh_resource_ids() {
		let mut assembly = Assembly::new();
		let first = assembly.create_function("one");
		let second = assembly.create_function("two");
		assert_ne!(first, second);
		assert_eq!(assembly.find_model(first).unwrap().display_name(), Some("one"));
	}

	#[test]
	fn the_entry_model_cannot_be_deleted() {
		let mut assembly = Assembly::new();
		assert!(!assembly.delete_model(assembly.assembly_model_id()));
		let id = assembly.create_function("f");
		assert!(assembly.delete_model(id));
		assert!(assembly.find_model(id).is_none());
	}

	#[test]
	fn dependency_tracking_spots_callers() {
		let mut assembly = Assembly::new();
		let callee = assembly.create_function("callee");

		let entry = assembly.assembly_model_mut().unwrap();
		let call = entry.create_node(NodeKind::FunctionCall);
		entry.set_function_id(call, callee);

		let check = assembly.can_model_be_removed(callee);
		assert!(!check.can_be_removed);
		assert_eq!(check.dependent_models, vec![assembly.assembly_model_id()]);

		let unreferenced = assembly.create_function("orphan");
		assert!(assembly.can_model_be_removed(unreferenced).can_be_removed);
	}
}

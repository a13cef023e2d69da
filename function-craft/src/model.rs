use std::collections::BTreeMap;

use directed_graph::{AdjacencyListDirectedGraph, DirectedGraph, Identifier, algorithms};
use log::warn;

use crate::field_names;
use crate::node::{Node, NodeKind};
use crate::parameter::Parameter;
use crate::port::Port;
use crate::resources::{ResourceKey, ResourceLookup};
use crate::types::{NodeId, ParameterId, ParameterType, PortId, ResourceId, Value};

/// Registry entry locating a port or parameter inside its owning node.
#[derive(Clone, Debug)]
struct Registration {
	node_id: NodeId,
	name: String,
}

/// A single typed function graph.
///
/// The model owns its nodes exclusively; ports and parameters are owned by
/// their node and addressed through id registries. A dependency graph over
/// node ids backs ordering and cycle rejection; it is rebuilt from the
/// parameters' sources whenever links changed since the last refresh.
#[derive(Clone, Debug)]
pub struct Model {
	resource_id: ResourceId,
	model_name: String,
	display_name: Option<String>,
	nodes: BTreeMap<NodeId, Node>,
	port_registry: BTreeMap<PortId, Registration>,
	parameter_registry: BTreeMap<ParameterId, Registration>,
	graph: AdjacencyListDirectedGraph,
	next_node_id: u32,
	next_port_id: u32,
	next_parameter_id: u32,
	begin_id: NodeId,
	end_id: NodeId,
	order_dirty: bool,
	valid: bool,
}

impl Model {
	pub fn new(resource_id: ResourceId) -> Self {
		Self {
			resource_id,
			model_name: format!("function_{resource_id}"),
			display_name: None,
			nodes: BTreeMap::new(),
			port_registry: BTreeMap::new(),
			parameter_registry: BTreeMap::new(),
			graph: AdjacencyListDirectedGraph::new(),
			next_node_id: 1,
			next_port_id: 1,
			next_parameter_id: 1,
			begin_id: NodeId::UNASSIGNED,
			end_id: NodeId::UNASSIGNED,
			order_dirty: false,
			valid: true,
		}
	}

	pub fn resource_id(&self) -> ResourceId {
		self.resource_id
	}

	pub fn set_resource_id(&mut self, resource_id: ResourceId) {
		self.resource_id = resource_id;
	}

	pub fn model_name(&self) -> &str {
		&self.model_name
	}

	pub fn display_name(&self) -> Option<&str> {
		self.display_name.as_deref()
	}

	pub fn set_display_name(&mut self, display_name: impl Into<String>) {
		self.display_name = Some(display_name.into());
	}

	pub fn is_valid(&self) -> bool {
		self.valid
	}

	pub fn set_is_valid(&mut self, valid: bool) {
		self.valid = valid;
	}

	// --- Node management ---------------------------------------------------

	/// Inserts a node, assigning fresh identifiers to it and to all of its
	/// ports and parameters, and places it into the dependency graph.
	/// Sources carried by cloned nodes are left untouched for the caller to
	/// rewire.
	pub fn insert(&mut self, mut node: Node) -> NodeId {
		let id = NodeId(self.next_node_id);
		self.next_node_id += 1;

		node.set_id(id);
		node.set_unique_name(format!("{}_{}", node.kind(), id));
		for port in node.outputs_mut().values_mut() {
			port.set_id(PortId::UNASSIGNED);
		}
		for parameter in node.parameters_mut().values_mut() {
			parameter.set_id(ParameterId::UNASSIGNED);
		}

		match node.kind() {
			NodeKind::Begin if !self.begin_id.is_assigned() => self.begin_id = id,
			NodeKind::End if !self.end_id.is_assigned() => self.end_id = id,
			_ => {}
		}

		self.nodes.insert(id, node);
		self.register_node_io(id);
		self.graph.add_vertex(id.0 as Identifier);
		self.order_dirty = true;
		id
	}

	pub fn create_node(&mut self, kind: NodeKind) -> NodeId {
		self.insert(Node::new(kind))
	}

	/// Assigns registry ids to any port or parameter of the node that does
	/// not have one yet. Called after signature or argument changes.
	pub fn register_node_io(&mut self, node_id: NodeId) {
		let Some(node) = self.nodes.get_mut(&node_id) else { return };

		for (name, port) in node.outputs_mut() {
			if !port.id().is_assigned() {
				let id = PortId(self.next_port_id);
				self.next_port_id += 1;
				port.set_id(id);
				self.port_registry.insert(id, Registration { node_id, name: name.clone() });
			}
		}
		for (name, parameter) in node.parameters_mut() {
			if !parameter.id().is_assigned() {
				let id = ParameterId(self.next_parameter_id);
				self.next_parameter_id += 1;
				parameter.set_id(id);
				self.parameter_registry.insert(id, Registration { node_id, name: name.clone() });
			}
		}
	}

	/// Removes a node after disconnecting every link on either side of it.
	pub fn remove(&mut self, node_id: NodeId) -> bool {
		if !self.nodes.contains_key(&node_id) {
			return false;
		}

		// Disconnect all consumers of this node's ports.
		let consumers: Vec<(NodeId, String)> = self
			.nodes
			.iter()
			.flat_map(|(&consumer_id, node)| {
				node.parameters()
					.iter()
					.filter(|(_, parameter)| parameter.source().is_some_and(|source| source.node_id == node_id))
					.map(move |(name, _)| (consumer_id, name.clone()))
			})
			.collect();
		for (consumer_id, parameter_name) in consumers {
			if let Some(parameter) = self.nodes.get_mut(&consumer_id).and_then(|node| node.parameter_mut(&parameter_name)) {
				parameter.clear_source();
			}
		}

		self.remove_without_links(node_id)
	}

	/// Removes a node whose links have already been patched by the caller.
	pub fn remove_without_links(&mut self, node_id: NodeId) -> bool {
		let Some(node) = self.nodes.remove(&node_id) else { return false };

		for port in node.outputs().values() {
			self.port_registry.remove(&port.id());
		}
		for parameter in node.parameters().values() {
			self.parameter_registry.remove(&parameter.id());
		}
		if self.begin_id == node_id {
			self.begin_id = NodeId::UNASSIGNED;
		}
		if self.end_id == node_id {
			self.end_id = NodeId::UNASSIGNED;
		}

		self.graph.remove_vertex(node_id.0 as Identifier);
		self.order_dirty = true;
		true
	}

	// --- Lookup ------------------------------------------------------------

	pub fn get_node(&self, node_id: NodeId) -> Option<&Node> {
		self.nodes.get(&node_id)
	}

	pub fn get_node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
		self.nodes.get_mut(&node_id)
	}

	pub fn find_node(&self, unique_name: &str) -> Option<NodeId> {
		self.nodes.values().find(|node| node.unique_name() == unique_name).map(Node::id)
	}

	/// Locates a node by its display name, the handle documents use when
	/// exposing parameter mutation to the outside.
	pub fn find_node_by_display_name(&self, display_name: &str) -> Option<NodeId> {
		self.nodes.values().find(|node| node.display_name() == display_name).map(Node::id)
	}

	pub fn get_port(&self, port_id: PortId) -> Option<&Port> {
		let registration = self.port_registry.get(&port_id)?;
		self.nodes.get(&registration.node_id)?.find_output_port(&registration.name)
	}

	pub fn get_port_mut(&mut self, port_id: PortId) -> Option<&mut Port> {
		let registration = self.port_registry.get(&port_id)?.clone();
		self.nodes.get_mut(&registration.node_id)?.find_output_port_mut(&registration.name)
	}

	pub fn get_parameter(&self, parameter_id: ParameterId) -> Option<&Parameter> {
		let registration = self.parameter_registry.get(&parameter_id)?;
		self.nodes.get(&registration.node_id)?.parameter(&registration.name)
	}

	pub fn get_parameter_mut(&mut self, parameter_id: ParameterId) -> Option<&mut Parameter> {
		let registration = self.parameter_registry.get(&parameter_id)?.clone();
		self.nodes.get_mut(&registration.node_id)?.parameter_mut(&registration.name)
	}

	pub fn nodes(&self) -> impl Iterator<Item = (&NodeId, &Node)> {
		self.nodes.iter()
	}

	pub fn node_ids(&self) -> Vec<NodeId> {
		self.nodes.keys().copied().collect()
	}

	pub fn node_count(&self) -> usize {
		self.nodes.len()
	}

	/// All `(parameter id, owning node, parameter name)` entries.
	pub fn parameter_registry(&self) -> impl Iterator<Item = (ParameterId, NodeId, &str)> {
		self.parameter_registry.iter().map(|(&id, registration)| (id, registration.node_id, registration.name.as_str()))
	}

	/// All parameters currently sourced from the given port.
	pub fn parameters_sourcing_from_port(&self, port_id: PortId) -> Vec<(NodeId, String)> {
		self.nodes
			.iter()
			.flat_map(|(&node_id, node)| {
				node.parameters()
					.iter()
					.filter(move |(_, parameter)| parameter.source().is_some_and(|source| source.port_id == port_id))
					.map(move |(name, _)| (node_id, name.clone()))
			})
			.collect()
	}

	pub fn begin_id(&self) -> NodeId {
		self.begin_id
	}

	pub fn end_id(&self) -> NodeId {
		self.end_id
	}

	pub fn begin_node(&self) -> Option<&Node> {
		self.nodes.get(&self.begin_id)
	}

	pub fn end_node(&self) -> Option<&Node> {
		self.nodes.get(&self.end_id)
	}

	// --- Begin/End management ----------------------------------------------

	/// Inserts empty Begin/End markers without any default arguments or
	/// outputs. The extractor builds signatures from scratch on top of this.
	pub(crate) fn create_bare_begin_end(&mut self) {
		if !self.begin_id.is_assigned() {
			self.insert(Node::new(NodeKind::Begin));
		}
		if !self.end_id.is_assigned() {
			self.insert(Node::new(NodeKind::End));
		}
	}

	/// Inserts Begin with a `pos` argument and End with a `shape` output,
	/// the minimal signature of a distance function.
	pub fn create_begin_end(&mut self) {
		self.create_bare_begin_end();
		self.add_argument(field_names::POS, ParameterType::Float3);
		self.add_function_output(field_names::SHAPE, Value::Float(0.));
	}

	/// Like [`Self::create_begin_end`] plus the `color` output consumed by
	/// the assembly entry point.
	pub fn create_begin_end_with_default_in_and_outs(&mut self) {
		self.create_begin_end();
		self.add_function_output(field_names::COLOR, Value::Float3(glam::Vec3::ZERO));
	}

	/// Exposes a new function argument as an output port on Begin.
	/// Returns the existing port when the name is already taken.
	pub fn add_argument(&mut self, name: &str, parameter_type: ParameterType) -> Option<PortId> {
		let begin_id = self.begin_id;
		let node = self.nodes.get_mut(&begin_id)?;
		node.add_output_port(name, parameter_type);
		self.register_node_io(begin_id);
		self.order_dirty = true;
		self.nodes.get(&begin_id)?.find_output_port(name).map(Port::id)
	}

	/// Adds (or retypes) a named function output as an input parameter on End.
	pub fn add_function_output(&mut self, name: &str, default: Value) -> Option<ParameterId> {
		let end_id = self.end_id;
		let node = self.nodes.get_mut(&end_id)?;
		match node.parameter_mut(name) {
			Some(parameter) if parameter.parameter_type() == default.parameter_type() => {}
			Some(parameter) => parameter.set_value(default),
			None => {
				node.add_input(name, Parameter::new(default));
			}
		}
		self.register_node_io(end_id);
		self.order_dirty = true;
		self.nodes.get(&end_id)?.parameter(name).map(Parameter::id)
	}

	/// Wipes all nodes and resets the id allocators. The resource id and
	/// names survive so the importer can refill the model in place.
	pub fn clear(&mut self) {
		self.nodes.clear();
		self.port_registry.clear();
		self.parameter_registry.clear();
		self.graph = AdjacencyListDirectedGraph::new();
		self.next_node_id = 1;
		self.next_port_id = 1;
		self.next_parameter_id = 1;
		self.begin_id = NodeId::UNASSIGNED;
		self.end_id = NodeId::UNASSIGNED;
		self.order_dirty = false;
		self.valid = true;
	}

	// --- Links -------------------------------------------------------------

	/// Connects a port to a parameter.
	///
	/// Fails (and changes nothing) when either endpoint is missing, the
	/// types differ (unless `skip_type_check`), both ends belong to the same
	/// node, or the implied dependency edge would close a cycle.
	pub fn add_link(&mut self, port_id: PortId, parameter_id: ParameterId, skip_type_check: bool) -> bool {
		let Some(port) = self.get_port(port_id).cloned() else { return false };
		let Some(parameter_registration) = self.parameter_registry.get(&parameter_id).cloned() else {
			return false;
		};
		let Some(parameter) = self.get_parameter(parameter_id) else { return false };

		if !skip_type_check && parameter.parameter_type() != port.port_type() {
			return false;
		}

		let source_node = port.parent_id();
		let target_node = parameter_registration.node_id;
		if source_node == target_node {
			return false;
		}

		let previous_source = parameter.source().map(|source| source.port_id);
		if previous_source == Some(port_id) {
			return true;
		}

		// Cycle check before any mutation so a failure leaves the previous
		// link in place. An edge out of the target cannot be part of a path
		// into it, so the check is unaffected by the pending replacement.
		if algorithms::is_depending_on(&self.graph, source_node.0 as Identifier, target_node.0 as Identifier) {
			return false;
		}
		if let Some(previous_port) = previous_source {
			self.remove_link(previous_port, parameter_id);
		}
		self.graph.add_dependency(target_node.0 as Identifier, source_node.0 as Identifier);

		if let Some(parameter) = self.get_parameter_mut(parameter_id) {
			parameter.set_input_from_port(&port);
		}
		if let Some(port) = self.get_port_mut(port_id) {
			port.set_is_used(true);
		}
		self.order_dirty = true;
		true
	}

	/// Disconnects the link currently feeding the parameter from the port.
	pub fn remove_link(&mut self, port_id: PortId, parameter_id: ParameterId) -> bool {
		let Some(parameter) = self.get_parameter(parameter_id) else { return false };
		if !parameter.source().is_some_and(|source| source.port_id == port_id) {
			return false;
		}
		let Some(target_node) = self.parameter_registry.get(&parameter_id).map(|registration| registration.node_id) else {
			return false;
		};
		let Some(source_node) = self.port_registry.get(&port_id).map(|registration| registration.node_id) else {
			return false;
		};

		if let Some(parameter) = self.get_parameter_mut(parameter_id) {
			parameter.clear_source();
		}

		// The dependency edge persists while any other link connects the pair.
		let another_link = self.nodes.get(&target_node).is_some_and(|node| {
			node.parameters().values().any(|parameter| parameter.source().is_some_and(|source| source.node_id == source_node))
		});
		if !another_link {
			self.graph.remove_dependency(target_node.0 as Identifier, source_node.0 as Identifier);
		}

		let port_still_used = !self.parameters_sourcing_from_port(port_id).is_empty();
		if let Some(port) = self.get_port_mut(port_id) {
			port.set_is_used(port_still_used);
		}
		self.order_dirty = true;
		true
	}

	pub fn dependency_graph(&self) -> &AdjacencyListDirectedGraph {
		&self.graph
	}

	// --- Ordering and typing -----------------------------------------------

	/// Rebuilds the dependency graph from the parameters' sources, refreshes
	/// port usage flags and writes each node's topological order index.
	/// Cheap when nothing changed since the last call.
	pub fn update_graph_and_order_if_needed(&mut self) {
		if !self.order_dirty {
			return;
		}

		let mut graph = AdjacencyListDirectedGraph::new();
		let mut used_ports: Vec<PortId> = Vec::new();
		for (&node_id, node) in &self.nodes {
			graph.add_vertex(node_id.0 as Identifier);
			for parameter in node.parameters().values() {
				if let Some(source) = parameter.source() {
					if self.nodes.contains_key(&source.node_id) {
						graph.add_dependency(node_id.0 as Identifier, source.node_id.0 as Identifier);
						used_ports.push(source.port_id);
					}
				}
			}
		}
		self.graph = graph;

		for node in self.nodes.values_mut() {
			for port in node.outputs_mut().values_mut() {
				port.set_is_used(false);
			}
		}
		for port_id in used_ports {
			if let Some(port) = self.get_port_mut(port_id) {
				port.set_is_used(true);
			}
		}

		for (index, vertex) in algorithms::topological_sort(&self.graph).into_iter().enumerate() {
			if let Some(node) = self.nodes.get_mut(&NodeId(vertex as u32)) {
				node.set_order(index as u32);
			}
		}
		self.order_dirty = false;
	}

	/// Runs every node's type-rule resolution in topological order so that
	/// producers are typed before their consumers.
	pub fn update_types(&mut self) {
		self.update_graph_and_order_if_needed();

		let mut order: Vec<NodeId> = self.nodes.keys().copied().collect();
		order.sort_by_key(|id| self.nodes[id].order());

		for node_id in order {
			// Refresh the cached source types from the live ports first.
			let mut source_types: Vec<(String, ParameterType)> = Vec::new();
			if let Some(node) = self.nodes.get(&node_id) {
				for (name, parameter) in node.parameters() {
					if let Some(source) = parameter.source() {
						let port_type = self.get_port(source.port_id).map(Port::port_type);
						if let Some(port_type) = port_type {
							source_types.push((name.clone(), port_type));
						}
					}
				}
			}

			let Some(node) = self.nodes.get_mut(&node_id) else { continue };
			let mut observed = crate::rules::TypeMap::new();
			for name in node.parameters().keys() {
				observed.insert(name.clone(), ParameterType::Any);
			}
			for (name, port_type) in &source_types {
				observed.insert(name.clone(), *port_type);
				if let Some(source) = node.parameter_mut(name).and_then(Parameter::source_mut) {
					source.port_type = *port_type;
				}
			}
			node.resolve_type_rule(&observed);
			self.register_node_io(node_id);
		}
	}

	// --- Function references -----------------------------------------------

	/// Resolves the function referenced by a `FunctionCall` node, either
	/// through the Resource node feeding its `functionId` parameter or from
	/// the parameter's literal value.
	pub fn resolve_function_id(&self, node_id: NodeId) -> Option<ResourceId> {
		let node = self.nodes.get(&node_id)?;
		let parameter = node.parameter(field_names::FUNCTION_ID)?;

		if let Some(source) = parameter.source() {
			let source_node = self.nodes.get(&source.node_id)?;
			let resource_parameter = source_node.parameter(field_names::RESOURCE_ID)?;
			return resource_parameter.value().as_resource_id().filter(|&id| id != 0);
		}
		parameter.value().as_resource_id().filter(|&id| id != 0)
	}

	pub fn set_function_id(&mut self, node_id: NodeId, function_id: ResourceId) -> bool {
		let Some(parameter) = self.nodes.get_mut(&node_id).and_then(|node| node.parameter_mut(field_names::FUNCTION_ID)) else {
			return false;
		};
		parameter.set_value(Value::ResourceId(function_id));
		true
	}

	/// Mirrors the callee's Begin/End signature onto a `FunctionCall` node.
	pub fn update_call_node_signature(&mut self, call_id: NodeId, callee: &Model) -> bool {
		let Some(begin) = callee.begin_node() else { return false };
		let Some(end) = callee.end_node() else { return false };

		let arguments: Vec<(String, ParameterType)> = begin.outputs().iter().map(|(name, port)| (name.clone(), port.port_type())).collect();
		let outputs: Vec<(String, ParameterType)> = end.parameters().iter().map(|(name, parameter)| (name.clone(), parameter.parameter_type())).collect();

		let Some(node) = self.nodes.get_mut(&call_id) else { return false };
		// Deregister ports/parameters that the new signature drops.
		let stale_ports: Vec<PortId> = node
			.outputs()
			.iter()
			.filter(|(name, _)| !outputs.iter().any(|(kept, _)| kept == *name))
			.map(|(_, port)| port.id())
			.collect();
		let stale_parameters: Vec<ParameterId> = node
			.parameters()
			.iter()
			.filter(|(name, parameter)| parameter.is_argument() && !arguments.iter().any(|(kept, _)| kept == *name))
			.map(|(_, parameter)| parameter.id())
			.collect();

		node.update_call_signature(&arguments, &outputs);
		for port_id in stale_ports {
			self.port_registry.remove(&port_id);
		}
		for parameter_id in stale_parameters {
			self.parameter_registry.remove(&parameter_id);
		}
		self.register_node_io(call_id);
		self.order_dirty = true;
		true
	}

	/// Nodes that do not transitively feed any End input (Begin and End
	/// themselves are always kept).
	pub fn unused_nodes(&mut self) -> Vec<NodeId> {
		self.update_graph_and_order_if_needed();
		let end = self.end_id;
		let alive = algorithms::all_dependencies(&self.graph, end.0 as Identifier);
		self.nodes
			.keys()
			.copied()
			.filter(|&id| id != end && id != self.begin_id && !alive.contains(&(id.0 as Identifier)))
			.collect()
	}

	// --- Resource extents --------------------------------------------------

	/// Caches external image extents into the sampler nodes' parameters.
	/// A missing resource degrades the sampler to zero extents. Value
	/// providers re-assert that none of their parameters take links, which
	/// matters after imports and clones.
	pub fn update_memory_offsets(&mut self, resources: &dyn ResourceLookup) {
		for node in self.nodes.values_mut() {
			if node.is_exempt_from_input_validation() {
				for parameter in node.parameters_mut().values_mut() {
					parameter.set_input_source_required(false);
				}
			}
		}

		let sampler_ids: Vec<NodeId> = self.nodes.values().filter(|node| node.kind() == NodeKind::ImageSampler).map(Node::id).collect();

		for node_id in sampler_ids {
			let resource_id = self.sampler_resource_id(node_id);
			let extents = resource_id.and_then(|id| resources.extents(ResourceKey(id)));
			if extents.is_none() {
				warn!("image sampler {node_id} has no resolvable image resource, falling back to zero extents");
			}
			let extents = extents.unwrap_or_default();

			let Some(node) = self.nodes.get_mut(&node_id) else { continue };
			if let Some(parameter) = node.parameter_mut(field_names::START) {
				parameter.set_value(Value::Int(extents.start_index));
			}
			if let Some(parameter) = node.parameter_mut(field_names::END) {
				parameter.set_value(Value::Int(extents.end_index));
			}
			if let Some(parameter) = node.parameter_mut(field_names::DIMENSIONS) {
				parameter.set_value(Value::Float3(extents.dimensions));
			}
		}
	}

	/// The image resource a sampler samples: the Resource node feeding its
	/// `resourceId` parameter, or that parameter's literal value.
	fn sampler_resource_id(&self, node_id: NodeId) -> Option<ResourceId> {
		let node = self.nodes.get(&node_id)?;
		let parameter = node.parameter(field_names::RESOURCE_ID)?;
		if let Some(source) = parameter.source() {
			let source_node = self.nodes.get(&source.node_id)?;
			let resource_parameter = source_node.parameter(field_names::RESOURCE_ID)?;
			return resource_parameter.value().as_resource_id().filter(|&id| id != 0);
		}
		parameter.value().as_resource_id().filter(|&id| id != 0)
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	fn addition_pair(model: &mut Model) -> (NodeId, NodeId) {
		let a = model.create_node(NodeKind::Addition);
		let b = model.create_node(NodeKind::Addition);
		(a, b)
	}

	fn port_id(model: &Model, node: NodeId, name: &str) -> PortId {
		model.get_node(node).unwrap().find_output_port(name).unwrap().id()
	}

	fn parameter_id(model: &Model, node: NodeId, name: &str) -> ParameterId {
		model.get_node(node).unwrap().parameter(name).unwrap().id()
	}

	#[test]
	fn insert_assigns_ids_and_unique_names() {
		let mut model = Model::new(7);
		let id = model.create_node(NodeKind::Sine);
		let node = model.get_node(id).unwrap();
		assert_eq!(node.unique_name(), format!("Sine_{id}"));
		let port = node.find_output_port("result").unwrap();
		assert!(port.id().is_assigned());
		assert_eq!(model.get_port(port.id()).unwrap().unique_name(), format!("Sine_{id}_result"));
	}

	#[test]
	fn add_link_connects_matching_types() {
		let mut model = Model::new(1);
		let (a, b) = addition_pair(&mut model);
		assert!(model.add_link(port_id(&model, a, "result"), parameter_id(&model, b, "A"), false));

		let source = model.get_node(b).unwrap().parameter("A").unwrap().source().unwrap().clone();
		assert_eq!(source.node_id, a);
		assert_eq!(source.short_name, "result");
		assert!(model.get_port(source.port_id).unwrap().is_used());
	}

	#[test]
	fn add_link_rejects_type_mismatch_and_leaves_parameter_untouched() {
		let mut model = Model::new(1);
		let constant = model.create_node(NodeKind::ConstantVector);
		let sine = model.create_node(NodeKind::Sine);
		// vector output into the scalar-typed input
		let linked = model.add_link(port_id(&model, constant, "vector"), parameter_id(&model, sine, "A"), false);
		assert!(!linked);
		assert!(model.get_node(sine).unwrap().parameter("A").unwrap().source().is_none());

		// The same link goes through when the check is skipped (flattener path).
		assert!(model.add_link(port_id(&model, constant, "vector"), parameter_id(&model, sine, "A"), true));
	}

	#[test]
	fn add_link_rejects_cycles() {
		let mut model = Model::new(1);
		let (a, b) = addition_pair(&mut model);
		assert!(model.add_link(port_id(&model, a, "result"), parameter_id(&model, b, "A"), false));
		// B -> A would close the loop.
		assert!(!model.add_link(port_id(&model, b, "result"), parameter_id(&model, a, "A"), false));
		assert!(model.get_node(a).unwrap().parameter("A").unwrap().source().is_none());
		model.update_graph_and_order_if_needed();
		assert!(!directed_graph::algorithms::is_cyclic(model.dependency_graph()));
	}

	#[test]
	fn add_link_rejects_self_links() {
		let mut model = Model::new(1);
		let a = model.create_node(NodeKind::Addition);
		assert!(!model.add_link(port_id(&model, a, "result"), parameter_id(&model, a, "A"), false));
	}

	#[test]
	fn remove_link_restores_the_unlinked_state() {
		let mut model = Model::new(1);
		let (a, b) = addition_pair(&mut model);
		let port = port_id(&model, a, "result");
		let parameter = parameter_id(&model, b, "A");
		assert!(model.add_link(port, parameter, false));
		assert!(model.remove_link(port, parameter));
		assert!(model.get_node(b).unwrap().parameter("A").unwrap().source().is_none());
		assert!(!model.get_port(port).unwrap().is_used());
		// Removing again is a failure, not a panic.
		assert!(!model.remove_link(port, parameter));
	}

	#[test]
	fn remove_node_disconnects_consumers() {
		let mut model = Model::new(1);
		let (a, b) = addition_pair(&mut model);
		assert!(model.add_link(port_id(&model, a, "result"), parameter_id(&model, b, "A"), false));
		assert!(model.remove(a));
		assert!(model.get_node(a).is_none());
		assert!(model.get_node(b).unwrap().parameter("A").unwrap().source().is_none());
	}

	#[test]
	fn ordering_places_producers_first() {
		let mut model = Model::new(1);
		model.create_begin_end();
		let sine = model.create_node(NodeKind::Sine);
		let begin = model.begin_id();
		let end = model.end_id();
		assert!(model.add_link(port_id(&model, begin, "pos"), parameter_id(&model, sine, "A"), true));
		assert!(model.add_link(port_id(&model, sine, "result"), parameter_id(&model, end, "shape"), false));
		model.update_graph_and_order_if_needed();

		let order_of = |id: NodeId| model.get_node(id).unwrap().order();
		assert!(order_of(begin) < order_of(sine));
		assert!(order_of(sine) < order_of(end));
	}

	#[test]
	fn update_types_follows_the_producer() {
		let mut model = Model::new(1);
		model.create_begin_end();
		let begin = model.begin_id();
		let add = model.create_node(NodeKind::Addition);
		// pos is a vector; linking it onto A retypes the addition to vector shape.
		assert!(model.add_link(port_id(&model, begin, "pos"), parameter_id(&model, add, "A"), true));
		model.update_types();

		let node = model.get_node(add).unwrap();
		assert_eq!(node.parameter("A").unwrap().parameter_type(), ParameterType::Float3);
		assert_eq!(node.parameter("B").unwrap().parameter_type(), ParameterType::Float3);
		assert_eq!(node.find_output_port("result").unwrap().port_type(), ParameterType::Float3);
	}

	#[test]
	fn nodes_are_findable_by_both_names() {
		let mut model = Model::new(1);
		let sine = model.create_node(NodeKind::Sine);
		model.get_node_mut(sine).unwrap().set_display_name("wave");
		assert_eq!(model.find_node(&format!("Sine_{sine}")), Some(sine));
		assert_eq!(model.find_node_by_display_name("wave"), Some(sine));
		assert_eq!(model.find_node_by_display_name("absent"), None);
	}

	#[test]
	fn clear_preserves_identity() {
		let mut model = Model::new(42);
		model.set_display_name("gyroid");
		model.create_begin_end();
		model.create_node(NodeKind::Sine);
		model.clear();
		assert_eq!(model.resource_id(), 42);
		assert_eq!(model.display_name(), Some("gyroid"));
		assert_eq!(model.node_count(), 0);
		assert!(!model.begin_id().is_assigned());
	}

	#[test]
	fn function_id_resolution_prefers_the_resource_node() {
		let mut model = Model::new(1);
		let resource = model.create_node(NodeKind::Resource);
		let call = model.create_node(NodeKind::FunctionCall);
		model
			.get_node_mut(resource)
			.unwrap()
			.parameter_mut(field_names::RESOURCE_ID)
			.unwrap()
			.set_value(Value::ResourceId(9));
		assert!(model.add_link(port_id(&model, resource, "value"), parameter_id(&model, call, "functionId"), false));
		assert_eq!(model.resolve_function_id(call), Some(9));

		// Without a source the literal value decides.
		let direct = model.create_node(NodeKind::FunctionCall);
		model.set_function_id(direct, 5);
		assert_eq!(model.resolve_function_id(direct), Some(5));
		let unset = model.create_node(NodeKind::FunctionCall);
		assert_eq!(model.resolve_function_id(unset), None);
	}

	#[test]
	fn samplers_cache_extents_and_degrade_to_zero() {
		use crate::resources::{NoResources, ResourceExtents, ResourceKey, ResourceLookup};

		struct OneImage;
		impl ResourceLookup for OneImage {
			fn extents(&self, key: ResourceKey) -> Option<ResourceExtents> {
				(key.0 == 3).then_some(ResourceExtents {
					start_index: 16,
					end_index: 48,
					dimensions: glam::Vec3::new(64., 64., 32.),
				})
			}
		}

		let mut model = Model::new(1);
		let resource = model.create_node(NodeKind::Resource);
		model
			.get_node_mut(resource)
			.unwrap()
			.parameter_mut(field_names::RESOURCE_ID)
			.unwrap()
			.set_value(Value::ResourceId(3));
		let sampler = model.create_node(NodeKind::ImageSampler);
		let value = port_id(&model, resource, "value");
		let resource_input = parameter_id(&model, sampler, "resourceId");
		assert!(model.add_link(value, resource_input, false));

		model.update_memory_offsets(&OneImage);
		let node = model.get_node(sampler).unwrap();
		assert_eq!(node.parameter("start").unwrap().value(), &Value::Int(16));
		assert_eq!(node.parameter("end").unwrap().value(), &Value::Int(48));
		assert_eq!(node.parameter("dimensions").unwrap().value(), &Value::Float3(glam::Vec3::new(64., 64., 32.)));

		// The image disappearing degrades the sampler to zero extents.
		model.update_memory_offsets(&NoResources);
		let node = model.get_node(sampler).unwrap();
		assert_eq!(node.parameter("start").unwrap().value(), &Value::Int(0));
		assert_eq!(node.parameter("end").unwrap().value(), &Value::Int(0));
	}

	#[test]
	fn unused_nodes_are_those_not_feeding_end() {
		let mut model = Model::new(1);
		model.create_begin_end();
		let sine = model.create_node(NodeKind::Sine);
		let orphan = model.create_node(NodeKind::Cosine);
		let begin = model.begin_id();
		let end = model.end_id();
		assert!(model.add_link(port_id(&model, begin, "pos"), parameter_id(&model, sine, "A"), true));
		assert!(model.add_link(port_id(&model, sine, "result"), parameter_id(&model, end, "shape"), false));

		assert_eq!(model.unused_nodes(), vec![orphan]);
	}
}

//! Inlines every `FunctionCall` of an assembly into its entry model.
//!
//! Flattening works depth-first: a callee is flattened before it is cloned
//! into its caller, so inlining only ever copies call-free graphs. The
//! result is a single self-contained model ready for kernel generation.

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::assembly::Assembly;
use crate::field_names;
use crate::model::Model;
use crate::node::NodeKind;
use crate::types::{NodeId, PortId, ResourceId};

/// Recursive call depth after which flattening gives up. Guards against
/// mutually recursive function references.
const MAX_FLATTENING_DEPTH: u32 = 100;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FlattenError {
	#[error("Assembly model not found")]
	AssemblyModelNotFound,
	#[error("Referenced function {0} not found")]
	ReferencedFunctionNotFound(ResourceId),
	#[error("Function {0} references itself")]
	SelfReference(String),
	#[error("Flattening depth of {0} exceeded")]
	DepthExceeded(String),
	#[error("The functionId of the function call {0} could not be resolved")]
	UnresolvedFunctionId(String),
	#[error("Input {input} of function call {call} has no source")]
	UnconnectedInput { input: String, call: String },
	#[error("Output {0} not found in end node")]
	OutputNotFound(String),
	#[error("Parameter {parameter} of node {node} has no source")]
	EndOutputUnlinked { node: String, parameter: String },
	#[error("Source node {0} not found")]
	SourceNodeNotFound(String),
	#[error("Source port {0} not found")]
	SourcePortNotFound(String),
}

/// Consumes an assembly and produces one whose only model is the flattened
/// entry model. Aborts on the first error, leaving the caller to discard the
/// partial result.
pub struct GraphFlattener {
	assembly: Assembly,
	depth: u32,
}

impl GraphFlattener {
	pub fn new(assembly: Assembly) -> Self {
		Self { assembly, depth: 0 }
	}

	pub fn flatten(mut self) -> Result<Assembly, FlattenError> {
		let entry_id = self.assembly.assembly_model_id();
		if self.assembly.assembly_model().is_none() {
			return Err(FlattenError::AssemblyModelNotFound);
		}

		self.flatten_model(entry_id)?;

		// Only the entry model survives.
		for resource_id in self.assembly.model_ids() {
			if resource_id != entry_id {
				self.assembly.delete_model(resource_id);
			}
		}

		// Inlined calls have no consumers left; drop the call nodes.
		let entry = self.assembly.assembly_model_mut().ok_or(FlattenError::AssemblyModelNotFound)?;
		let calls: Vec<NodeId> = entry.nodes().filter(|(_, node)| node.kind() == NodeKind::FunctionCall).map(|(&id, _)| id).collect();
		for call in calls {
			entry.remove(call);
		}
		entry.update_graph_and_order_if_needed();

		Ok(self.assembly)
	}

	/// Inlines every call of the given model, flattening callees first.
	fn flatten_model(&mut self, resource_id: ResourceId) -> Result<(), FlattenError> {
		{
			let model = self.assembly.find_model_mut(resource_id).ok_or(FlattenError::ReferencedFunctionNotFound(resource_id))?;
			model.update_graph_and_order_if_needed();
			model.update_types();
		}

		let call_ids: Vec<NodeId> = {
			let model = self.assembly.find_model(resource_id).ok_or(FlattenError::ReferencedFunctionNotFound(resource_id))?;
			model.nodes().filter(|(_, node)| node.kind() == NodeKind::FunctionCall).map(|(&id, _)| id).collect()
		};

		for call_id in call_ids {
			// Usage flags may have shifted while earlier calls were inlined.
			{
				let model = self.assembly.find_model_mut(resource_id).ok_or(FlattenError::ReferencedFunctionNotFound(resource_id))?;
				model.update_graph_and_order_if_needed();
			}

			let model = self.assembly.find_model(resource_id).ok_or(FlattenError::ReferencedFunctionNotFound(resource_id))?;
			let Some(call) = model.get_node(call_id) else { continue };
			let call_name = call.unique_name().to_string();
			let any_output_used = call.outputs().values().any(|port| port.is_used());
			let function_id = model.resolve_function_id(call_id);

			// A call whose outputs nobody consumes is dead.
			if !any_output_used {
				let model = self.assembly.find_model_mut(resource_id).ok_or(FlattenError::ReferencedFunctionNotFound(resource_id))?;
				model.remove(call_id);
				continue;
			}

			let function_id = function_id.ok_or_else(|| FlattenError::UnresolvedFunctionId(call_name.clone()))?;
			let referenced = self.assembly.find_model(function_id).ok_or(FlattenError::ReferencedFunctionNotFound(function_id))?;
			let referenced_name = referenced.display_name().unwrap_or_default().to_string();
			if function_id == resource_id {
				return Err(FlattenError::SelfReference(referenced_name));
			}
			if self.depth > MAX_FLATTENING_DEPTH {
				return Err(FlattenError::DepthExceeded(referenced_name));
			}

			// All call inputs other than the function reference must be linked.
			let model = self.assembly.find_model(resource_id).ok_or(FlattenError::ReferencedFunctionNotFound(resource_id))?;
			let call = model.get_node(call_id).ok_or_else(|| FlattenError::SourceNodeNotFound(call_name.clone()))?;
			for (input_name, parameter) in call.parameters() {
				if input_name == field_names::FUNCTION_ID {
					continue;
				}
				if parameter.source().is_none() {
					return Err(FlattenError::UnconnectedInput {
						input: input_name.clone(),
						call: call_name.clone(),
					});
				}
			}

			self.depth += 1;
			let result = self.flatten_model(function_id);
			self.depth -= 1;
			result?;

			let callee = self.assembly.find_model(function_id).ok_or(FlattenError::ReferencedFunctionNotFound(function_id))?.clone();
			self.integrate(&callee, resource_id, call_id)?;
		}

		Ok(())
	}

	/// Clones the callee's nodes (except its markers) into the target model
	/// and rewires both sides of the call boundary.
	fn integrate(&mut self, callee: &Model, target_id: ResourceId, call_id: NodeId) -> Result<(), FlattenError> {
		let target = self.assembly.find_model_mut(target_id).ok_or(FlattenError::ReferencedFunctionNotFound(target_id))?;

		// 1. Clone every non-marker node, keeping the id correspondence.
		let mut id_map: FxHashMap<NodeId, NodeId> = FxHashMap::default();
		let mut cloned: Vec<(NodeId, NodeId)> = Vec::new();
		for (&old_id, node) in callee.nodes() {
			if node.is_marker() {
				continue;
			}
			let new_id = target.insert(node.clone());
			id_map.insert(old_id, new_id);
			cloned.push((old_id, new_id));
		}

		// The clones still carry sources into the callee's id space; clear
		// them before rewiring so no stale identifiers survive.
		for &(_, new_id) in &cloned {
			if let Some(node) = target.get_node_mut(new_id) {
				for parameter in node.parameters_mut().values_mut() {
					parameter.clear_source();
				}
			}
		}

		// 2. Rewire the cloned parameters from the callee's wiring.
		for &(old_id, new_id) in &cloned {
			let old_node = callee.get_node(old_id).ok_or_else(|| FlattenError::SourceNodeNotFound(old_id.to_string()))?;
			for (parameter_name, parameter) in old_node.parameters() {
				let Some(source) = parameter.source() else { continue };

				let source_port = if source.node_id == callee.begin_id() {
					// An input from the callee's Begin becomes the port that
					// feeds the call's matching argument.
					call_argument_source(target, call_id, &source.short_name)?
				} else {
					let new_source_id = *id_map.get(&source.node_id).ok_or_else(|| FlattenError::SourceNodeNotFound(source.unique_name.clone()))?;
					target
						.get_node(new_source_id)
						.and_then(|node| node.find_output_port(&source.short_name))
						.map(|port| port.id())
						.ok_or_else(|| FlattenError::SourcePortNotFound(source.short_name.clone()))?
				};

				let parameter_id = target
					.get_node(new_id)
					.and_then(|node| node.parameter(parameter_name))
					.map(|parameter| parameter.id())
					.ok_or_else(|| FlattenError::SourcePortNotFound(parameter_name.clone()))?;
				if !target.add_link(source_port, parameter_id, true) {
					return Err(FlattenError::SourcePortNotFound(parameter_name.clone()));
				}
			}
		}

		// 3. Route every outside consumer of the call's outputs to the
		// cloned producer behind the callee's End.
		let call_outputs: Vec<(String, PortId)> = target
			.get_node(call_id)
			.ok_or_else(|| FlattenError::SourceNodeNotFound(call_id.to_string()))?
			.outputs()
			.iter()
			.map(|(name, port)| (name.clone(), port.id()))
			.collect();

		let end = callee.end_node().ok_or_else(|| FlattenError::OutputNotFound("end".to_string()))?;
		for (output_name, output_port) in call_outputs {
			let consumers = target.parameters_sourcing_from_port(output_port);
			if consumers.is_empty() {
				continue;
			}

			let end_parameter = end.parameter(&output_name).ok_or_else(|| FlattenError::OutputNotFound(output_name.clone()))?;
			let inner_source = end_parameter.source().ok_or_else(|| FlattenError::EndOutputUnlinked {
				node: end.unique_name().to_string(),
				parameter: output_name.clone(),
			})?;

			let replacement_port = if inner_source.node_id == callee.begin_id() {
				// The callee just forwards one of its arguments.
				call_argument_source(target, call_id, &inner_source.short_name)?
			} else {
				let producer = *id_map.get(&inner_source.node_id).ok_or_else(|| FlattenError::SourceNodeNotFound(inner_source.unique_name.clone()))?;
				target
					.get_node(producer)
					.and_then(|node| node.find_output_port(&inner_source.short_name))
					.map(|port| port.id())
					.ok_or_else(|| FlattenError::SourcePortNotFound(inner_source.short_name.clone()))?
			};

			for (consumer_node, parameter_name) in consumers {
				let parameter_id = target
					.get_node(consumer_node)
					.and_then(|node| node.parameter(&parameter_name))
					.map(|parameter| parameter.id())
					.ok_or_else(|| FlattenError::SourcePortNotFound(parameter_name.clone()))?;
				if !target.add_link(replacement_port, parameter_id, true) {
					return Err(FlattenError::SourcePortNotFound(parameter_name));
				}
			}
		}

		Ok(())
	}
}

/// The port in the target model feeding the call argument of the given name.
fn call_argument_source(target: &Model, call_id: NodeId, argument: &str) -> Result<PortId, FlattenError> {
	let call = target.get_node(call_id).ok_or_else(|| FlattenError::SourceNodeNotFound(call_id.to_string()))?;
	let parameter = call.parameter(argument).ok_or_else(|| FlattenError::UnconnectedInput {
		input: argument.to_string(),
		call: call.unique_name().to_string(),
	})?;
	let source = parameter.source().ok_or_else(|| FlattenError::UnconnectedInput {
		input: argument.to_string(),
		call: call.unique_name().to_string(),
	})?;
	Ok(source.port_id)
}

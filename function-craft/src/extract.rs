//! Replaces a selected subgraph with a call to a newly materialized
//! function model, leaving the source model semantically unchanged.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::field_names;
use crate::model::Model;
use crate::node::NodeKind;
use crate::types::{NodeId, PortId, Value};

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ExtractError {
	#[error("selection is empty")]
	EmptySelection,
	#[error("selected node {0} does not exist in the source model")]
	NodeNotFound(NodeId),
	#[error("Begin and End cannot be extracted")]
	MarkerInSelection,
	#[error("could not rebuild a link inside the extracted function")]
	RelinkFailed,
	#[error("could not rewire the call site in the source model")]
	RewireFailed,
}

/// What the extraction produced: the call site and how boundary ports were
/// renamed into arguments and outputs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Extraction {
	pub function_call: NodeId,
	/// External source port (unique name) to generated argument name.
	pub input_name_map: BTreeMap<String, String>,
	/// Internal source port (unique name) to generated output name.
	pub output_name_map: BTreeMap<String, String>,
}

/// Boundary edge entering the selection.
struct ExternalInput {
	target_node: NodeId,
	target_parameter: String,
	external_port: PortId,
}

/// Boundary edges leaving the selection through one port.
struct ExternalOutput {
	source_port: PortId,
	consumers: Vec<(NodeId, String)>,
}

/// Moves the selected nodes from `source` into `destination` (which is
/// cleared first), synthesizes the function signature from the boundary
/// links and replaces the selection with a `FunctionCall` in the source.
pub fn extract_into(source: &mut Model, destination: &mut Model, selection: &BTreeSet<NodeId>) -> Result<Extraction, ExtractError> {
	if selection.is_empty() {
		return Err(ExtractError::EmptySelection);
	}
	for &node_id in selection {
		let node = source.get_node(node_id).ok_or(ExtractError::NodeNotFound(node_id))?;
		if node.is_marker() {
			return Err(ExtractError::MarkerInSelection);
		}
	}
	source.update_graph_and_order_if_needed();

	// 1. Classify the boundary.
	let mut external_inputs: Vec<ExternalInput> = Vec::new();
	let mut external_outputs: BTreeMap<String, ExternalOutput> = BTreeMap::new();
	for &node_id in selection {
		let Some(node) = source.get_node(node_id) else { continue };

		for (parameter_name, parameter) in node.parameters() {
			let Some(parameter_source) = parameter.source() else { continue };
			if !selection.contains(&parameter_source.node_id) {
				external_inputs.push(ExternalInput {
					target_node: node_id,
					target_parameter: parameter_name.clone(),
					external_port: parameter_source.port_id,
				});
			}
		}

		for port in node.outputs().values() {
			let consumers: Vec<(NodeId, String)> = source
				.parameters_sourcing_from_port(port.id())
				.into_iter()
				.filter(|(consumer, _)| !selection.contains(consumer))
				.collect();
			if !consumers.is_empty() {
				external_outputs.insert(
					port.unique_name().to_string(),
					ExternalOutput {
						source_port: port.id(),
						consumers,
					},
				);
			}
		}
	}

	// 2. Fresh destination with bare markers; the signature is built below.
	destination.clear();
	destination.create_bare_begin_end();

	// 3. Clone the selection.
	let mut clone_map: FxHashMap<NodeId, NodeId> = FxHashMap::default();
	for &node_id in selection {
		let Some(node) = source.get_node(node_id) else { continue };
		let cloned = destination.insert(node.clone());
		clone_map.insert(node_id, cloned);
	}
	// The clones carry sources into the source model's id space.
	for &cloned in clone_map.values() {
		if let Some(node) = destination.get_node_mut(cloned) {
			for parameter in node.parameters_mut().values_mut() {
				parameter.clear_source();
			}
		}
	}

	// 4. Recreate the links that were internal to the selection.
	for &node_id in selection {
		let Some(original) = source.get_node(node_id) else { continue };
		let links: Vec<(String, NodeId, String)> = original
			.parameters()
			.iter()
			.filter_map(|(name, parameter)| {
				let parameter_source = parameter.source()?;
				selection
					.contains(&parameter_source.node_id)
					.then(|| (name.clone(), parameter_source.node_id, parameter_source.short_name.clone()))
			})
			.collect();

		for (parameter_name, source_node, port_name) in links {
			let cloned_source = clone_map[&source_node];
			let cloned_target = clone_map[&node_id];
			let port = destination
				.get_node(cloned_source)
				.and_then(|node| node.find_output_port(&port_name))
				.map(|port| port.id())
				.ok_or(ExtractError::RelinkFailed)?;
			let parameter = destination
				.get_node(cloned_target)
				.and_then(|node| node.parameter(&parameter_name))
				.map(|parameter| parameter.id())
				.ok_or(ExtractError::RelinkFailed)?;
			if !destination.add_link(port, parameter, true) {
				return Err(ExtractError::RelinkFailed);
			}
		}
	}

	// 5. One function argument per distinct external source port. `pos` is
	// reserved for the canonical evaluation-point argument.
	let mut result = Extraction::default();
	let mut used_argument_names: FxHashSet<String> = FxHashSet::from_iter([field_names::POS.to_string()]);
	let mut argument_for_port: BTreeMap<String, String> = BTreeMap::new();
	for input in &external_inputs {
		let Some(port) = source.get_port(input.external_port) else {
			return Err(ExtractError::RewireFailed);
		};
		let unique_name = port.unique_name().to_string();
		if !argument_for_port.contains_key(&unique_name) {
			let argument_name = make_unique(port.short_name(), &mut used_argument_names);
			destination.add_argument(&argument_name, port.port_type());
			argument_for_port.insert(unique_name.clone(), argument_name.clone());
			result.input_name_map.insert(unique_name.clone(), argument_name);
		}

		// Wire the argument into the cloned consumer.
		let argument_name = &argument_for_port[&unique_name];
		let begin = destination.begin_id();
		let argument_port = destination
			.get_node(begin)
			.and_then(|node| node.find_output_port(argument_name))
			.map(|port| port.id())
			.ok_or(ExtractError::RelinkFailed)?;
		let cloned_target = clone_map[&input.target_node];
		let parameter = destination
			.get_node(cloned_target)
			.and_then(|node| node.parameter(&input.target_parameter))
			.map(|parameter| parameter.id())
			.ok_or(ExtractError::RelinkFailed)?;
		if !destination.add_link(argument_port, parameter, true) {
			return Err(ExtractError::RelinkFailed);
		}
	}

	// 6. One function output per internal port with outside consumers.
	let mut used_output_names: FxHashSet<String> = FxHashSet::default();
	for (unique_port_name, output) in &external_outputs {
		let Some(port) = source.get_port(output.source_port) else {
			return Err(ExtractError::RewireFailed);
		};
		let base = if port.short_name().is_empty() { "out" } else { port.short_name() };
		let output_name = make_unique(base, &mut used_output_names);
		result.output_name_map.insert(unique_port_name.clone(), output_name.clone());

		let port_type = port.port_type();
		let parameter = destination
			.add_function_output(&output_name, Value::default_for(port_type))
			.ok_or(ExtractError::RelinkFailed)?;
		let cloned_source = clone_map[&port.parent_id()];
		let cloned_port = destination
			.get_node(cloned_source)
			.and_then(|node| node.find_output_port(port.short_name()))
			.map(|port| port.id())
			.ok_or(ExtractError::RelinkFailed)?;
		if !destination.add_link(cloned_port, parameter, true) {
			return Err(ExtractError::RelinkFailed);
		}
	}

	destination.update_graph_and_order_if_needed();
	destination.update_types();

	// 7. Insert the call site and give it the destination's signature.
	let function_call = source.create_node(NodeKind::FunctionCall);
	result.function_call = function_call;
	source.update_call_node_signature(function_call, destination);
	if destination.resource_id() != 0 {
		source.set_function_id(function_call, destination.resource_id());
	}

	// 8. Rewire the source model onto the call site.
	for input in &external_inputs {
		let argument_name = {
			let Some(port) = source.get_port(input.external_port) else {
				return Err(ExtractError::RewireFailed);
			};
			argument_for_port[port.unique_name()].clone()
		};
		let parameter = source
			.get_node(function_call)
			.and_then(|node| node.parameter(&argument_name))
			.map(|parameter| parameter.id())
			.ok_or(ExtractError::RewireFailed)?;
		if !source.add_link(input.external_port, parameter, true) {
			return Err(ExtractError::RewireFailed);
		}
	}

	for (unique_port_name, output) in &external_outputs {
		let output_name = &result.output_name_map[unique_port_name];
		let call_port = source
			.get_node(function_call)
			.and_then(|node| node.find_output_port(output_name))
			.map(|port| port.id())
			.ok_or(ExtractError::RewireFailed)?;
		for (consumer_node, parameter_name) in &output.consumers {
			let parameter = source
				.get_node(*consumer_node)
				.and_then(|node| node.parameter(parameter_name))
				.map(|parameter| parameter.id())
				.ok_or(ExtractError::RewireFailed)?;
			if !source.add_link(call_port, parameter, true) {
				return Err(ExtractError::RewireFailed);
			}
		}
	}

	// 9. The originals disappear; ordering and types settle in both models.
	for &node_id in selection {
		source.remove(node_id);
	}
	source.update_graph_and_order_if_needed();
	source.update_types();

	Ok(result)
}

fn make_unique(base: &str, used: &mut FxHashSet<String>) -> String {
	let base = if base.is_empty() { "arg" } else { base };
	let mut name = base.to_string();
	let mut counter = 1;
	while used.contains(&name) {
		name = format!("{base}_{counter}");
		counter += 1;
	}
	used.insert(name.clone());
	name
}

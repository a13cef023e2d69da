//! The synchronous entry points exposed to external tools.

use function_craft::assembly::Assembly;
use function_craft::expression::{ArgumentKind, FunctionArgument, FunctionOutput, expression_to_graph};
use function_craft::flatten::GraphFlattener;
use function_craft::field_names;
use function_craft::model::Model;
use function_craft::node::NodeKind;
use function_craft::serialization;
use function_craft::types::{NodeId, ParameterType, ResourceId, Value};
use function_craft::validator::Validator;
use serde_json::{Value as Json, json};
use strum::IntoEnumIterator;

use crate::OperationResult;
use crate::values::{decode_value, encode_value};

/// Lists every function of the assembly with its display name.
pub fn list_functions(assembly: &Assembly) -> OperationResult {
	let functions: Vec<Json> = assembly
		.models()
		.map(|(&resource_id, model)| {
			json!({
				"id": resource_id,
				"display_name": model.display_name().unwrap_or_default(),
			})
		})
		.collect();
	OperationResult::ok(json!({ "functions": functions }))
}

/// Returns the minimal-schema projection of one function graph.
pub fn get_function_graph(assembly: &mut Assembly, function_id: ResourceId) -> OperationResult {
	let Some(model) = assembly.find_model_mut(function_id) else {
		return OperationResult::fail(format!("Function {function_id} not found"));
	};
	model.update_graph_and_order_if_needed();
	model.update_types();
	OperationResult::ok(serialization::serialize_minimal(model))
}

/// Applies a serialized graph to one function, returning the id map.
pub fn set_function_graph(assembly: &mut Assembly, function_id: ResourceId, graph: &Json, replace: bool) -> OperationResult {
	let Some(model) = assembly.find_model_mut(function_id) else {
		return OperationResult::fail(format!("Function {function_id} not found"));
	};
	match serialization::apply(model, graph, replace) {
		Ok(id_map) => {
			let map: serde_json::Map<String, Json> = id_map.iter().map(|(client, node)| (client.to_string(), json!(node.0))).collect();
			OperationResult::ok(json!({ "id_map": map }))
		}
		Err(error) => OperationResult::fail(error.to_string()),
	}
}

/// Simplified node description: kind, display name, inputs and outputs.
pub fn get_node_info(assembly: &Assembly, function_id: ResourceId, node_id: u32) -> OperationResult {
	let Some(model) = assembly.find_model(function_id) else {
		return OperationResult::fail(format!("Function {function_id} not found"));
	};
	match node_info_json(model, NodeId(node_id)) {
		Some(info) => OperationResult::ok(info),
		None => OperationResult::fail(format!("Node {node_id} not found in function {function_id}")),
	}
}

/// Creates a node by its catalog name. An unknown name fails and reports the
/// valid types so the caller can correct itself.
pub fn create_node(assembly: &mut Assembly, function_id: ResourceId, node_type: &str, display_name: &str) -> OperationResult {
	let Some(model) = assembly.find_model_mut(function_id) else {
		return OperationResult::fail(format!("Function {function_id} not found"));
	};

	let kind = NodeKind::from_name(node_type).filter(|kind| !matches!(kind, NodeKind::Begin | NodeKind::End));
	let Some(kind) = kind else {
		return OperationResult::fail_with(format!("Unknown node type: {node_type}"), json!({ "valid_types": creatable_node_types() }));
	};

	let node_id = model.create_node(kind);
	if !display_name.is_empty() {
		if let Some(node) = model.get_node_mut(node_id) {
			node.set_display_name(display_name);
		}
	}
	match node_info_json(model, node_id) {
		Some(info) => OperationResult::ok(info),
		None => OperationResult::fail("Node creation failed"),
	}
}

/// Removes a node and all of its links.
pub fn delete_node(assembly: &mut Assembly, function_id: ResourceId, node_id: u32) -> OperationResult {
	let Some(model) = assembly.find_model_mut(function_id) else {
		return OperationResult::fail(format!("Function {function_id} not found"));
	};
	if NodeId(node_id) == model.begin_id() || NodeId(node_id) == model.end_id() {
		return OperationResult::fail("Begin and End cannot be deleted");
	}
	if model.remove(NodeId(node_id)) {
		OperationResult::ok_empty()
	} else {
		OperationResult::fail(format!("Node {node_id} not found in function {function_id}"))
	}
}

/// Assigns a literal value, decoded according to the parameter's type.
pub fn set_parameter_value(assembly: &mut Assembly, function_id: ResourceId, node_id: u32, parameter_name: &str, value: &Json) -> OperationResult {
	let Some(model) = assembly.find_model_mut(function_id) else {
		return OperationResult::fail(format!("Function {function_id} not found"));
	};
	let Some(parameter) = model.get_node(NodeId(node_id)).and_then(|node| node.parameter(parameter_name)) else {
		return OperationResult::fail(format!("Parameter {parameter_name} not found on node {node_id}"));
	};

	let decoded = match decode_value(parameter.parameter_type(), value) {
		Ok(decoded) => decoded,
		Err(error) => return OperationResult::fail(format!("Could not decode value for {parameter_name}: {error}")),
	};
	if let Some(parameter) = model.get_node_mut(NodeId(node_id)).and_then(|node| node.parameter_mut(parameter_name)) {
		parameter.set_value(decoded);
	}
	OperationResult::ok_empty()
}

/// Connects a named port to a named parameter. On failure the payload lists
/// every unconnected required input of the model for context.
pub fn create_link(
	assembly: &mut Assembly,
	function_id: ResourceId,
	source_node: u32,
	source_port: &str,
	target_node: u32,
	target_parameter: &str,
) -> OperationResult {
	let Some(model) = assembly.find_model_mut(function_id) else {
		return OperationResult::fail(format!("Function {function_id} not found"));
	};

	let port = model.get_node(NodeId(source_node)).and_then(|node| node.find_output_port(source_port)).map(|port| port.id());
	let parameter = model
		.get_node(NodeId(target_node))
		.and_then(|node| node.parameter(target_parameter))
		.map(|parameter| parameter.id());
	let (Some(port), Some(parameter)) = (port, parameter) else {
		return OperationResult::fail_with(
			format!("Port {source_node}.{source_port} or parameter {target_node}.{target_parameter} not found"),
			json!({ "unconnected_required_inputs": unconnected_required_inputs(model) }),
		);
	};

	if model.add_link(port, parameter, false) {
		model.update_types();
		OperationResult::ok_empty()
	} else {
		OperationResult::fail_with(
			format!("Could not link {source_node}.{source_port} to {target_node}.{target_parameter} (type mismatch or cycle)"),
			json!({ "unconnected_required_inputs": unconnected_required_inputs(model) }),
		)
	}
}

/// Removes the link feeding the named parameter.
pub fn delete_link(assembly: &mut Assembly, function_id: ResourceId, target_node: u32, target_parameter: &str) -> OperationResult {
	let Some(model) = assembly.find_model_mut(function_id) else {
		return OperationResult::fail(format!("Function {function_id} not found"));
	};
	let Some(parameter) = model.get_node(NodeId(target_node)).and_then(|node| node.parameter(target_parameter)) else {
		return OperationResult::fail(format!("Parameter {target_parameter} not found on node {target_node}"));
	};
	let Some(source) = parameter.source() else {
		return OperationResult::fail(format!("Parameter {target_parameter} of node {target_node} is not linked"));
	};
	let (port_id, parameter_id) = (source.port_id, parameter.id());
	if model.remove_link(port_id, parameter_id) { OperationResult::ok_empty() } else { OperationResult::fail("Could not remove link") }
}

/// Inserts a Resource node carrying the referenced function id plus a
/// FunctionCall wired to it, with the callee's signature mirrored on.
pub fn create_function_call_node(
	assembly: &mut Assembly,
	target_function: ResourceId,
	referenced_function: ResourceId,
	display_name: &str,
) -> OperationResult {
	let Some(referenced) = assembly.find_model(referenced_function).cloned() else {
		return OperationResult::fail(format!("Function {referenced_function} not found"));
	};
	let Some(model) = assembly.find_model_mut(target_function) else {
		return OperationResult::fail(format!("Function {target_function} not found"));
	};

	let resource = model.create_node(NodeKind::Resource);
	if let Some(parameter) = model.get_node_mut(resource).and_then(|node| node.parameter_mut(field_names::RESOURCE_ID)) {
		parameter.set_value(Value::ResourceId(referenced_function));
	}

	let call = model.create_node(NodeKind::FunctionCall);
	if !display_name.is_empty() {
		if let Some(node) = model.get_node_mut(call) {
			node.set_display_name(display_name);
		}
	}
	model.update_call_node_signature(call, &referenced);

	let value_port = model.get_node(resource).and_then(|node| node.find_output_port(field_names::VALUE)).map(|port| port.id());
	let function_id_parameter = model
		.get_node(call)
		.and_then(|node| node.parameter(field_names::FUNCTION_ID))
		.map(|parameter| parameter.id());
	let (Some(port), Some(parameter)) = (value_port, function_id_parameter) else {
		return OperationResult::fail("FunctionCall wiring failed");
	};
	if !model.add_link(port, parameter, false) {
		return OperationResult::fail("FunctionCall wiring failed");
	}

	match node_info_json(model, call) {
		Some(info) => OperationResult::ok(json!({ "function_call": info, "resource_node_id": resource.0 })),
		None => OperationResult::fail("FunctionCall wiring failed"),
	}
}

/// Creates a whole function model from an arithmetic expression. Any
/// failure rolls the partially built model back out of the assembly.
pub fn create_function_from_expression(
	assembly: &mut Assembly,
	name: &str,
	expression: &str,
	output_type: &str,
	arguments: &Json,
	output_name: &str,
) -> OperationResult {
	if name.is_empty() {
		return OperationResult::fail("Function name cannot be empty");
	}
	if expression.is_empty() {
		return OperationResult::fail("Expression cannot be empty");
	}
	let Some(output_kind) = parse_argument_kind(output_type) else {
		return OperationResult::fail(format!("Invalid output type '{output_type}'. Must be 'float' or 'vec3'"));
	};
	let parsed_arguments = match parse_arguments(arguments) {
		Ok(parsed) => parsed,
		Err(error) => return OperationResult::fail(error),
	};

	let function_id = assembly.create_function(name);
	let Some(model) = assembly.find_model_mut(function_id) else {
		return OperationResult::fail("Function creation failed");
	};

	let output = FunctionOutput::new(if output_name.is_empty() { field_names::SHAPE } else { output_name }, output_kind);
	match expression_to_graph(expression, model, &parsed_arguments, &output) {
		Ok(result_node) => OperationResult::ok(json!({
			"function_id": function_id,
			"result_node_id": result_node.0,
		})),
		Err(error) => {
			assembly.delete_model(function_id);
			OperationResult::fail(error.to_string())
		}
	}
}

/// Creates constant nodes for every unconnected required input of a node,
/// optionally linking them in right away.
pub fn create_constants_for_missing_parameters(assembly: &mut Assembly, function_id: ResourceId, node_id: u32, auto_connect: bool) -> OperationResult {
	let Some(model) = assembly.find_model_mut(function_id) else {
		return OperationResult::fail(format!("Function {function_id} not found"));
	};
	let Some(node) = model.get_node(NodeId(node_id)) else {
		return OperationResult::fail(format!("Node {node_id} not found in function {function_id}"));
	};
	if node.is_exempt_from_input_validation() {
		return OperationResult::ok(json!({ "created": [] }));
	}

	let missing: Vec<(String, ParameterType)> = node
		.parameters()
		.iter()
		.filter(|(_, parameter)| parameter.source().is_none() && parameter.is_input_source_required())
		.map(|(name, parameter)| (name.clone(), parameter.parameter_type()))
		.collect();

	let mut created = Vec::new();
	for (parameter_name, parameter_type) in missing {
		let (kind, port_name) = match parameter_type {
			ParameterType::Float => (NodeKind::ConstantScalar, field_names::VALUE),
			ParameterType::Float3 => (NodeKind::ConstantVector, field_names::VECTOR),
			ParameterType::Matrix4 => (NodeKind::ConstantMatrix, field_names::MATRIX),
			ParameterType::ResourceId => (NodeKind::Resource, field_names::VALUE),
			// No constant node exists for the remaining types.
			_ => continue,
		};
		let constant = model.create_node(kind);
		if let Some(constant_node) = model.get_node_mut(constant) {
			constant_node.set_display_name(format!("{parameter_name} default"));
		}

		if auto_connect {
			let port = model.get_node(constant).and_then(|node| node.find_output_port(port_name)).map(|port| port.id());
			let parameter = model
				.get_node(NodeId(node_id))
				.and_then(|node| node.parameter(&parameter_name))
				.map(|parameter| parameter.id());
			if let (Some(port), Some(parameter)) = (port, parameter) {
				model.add_link(port, parameter, false);
			}
		}
		created.push(json!({ "node_id": constant.0, "parameter": parameter_name, "type": parameter_type.wire_name() }));
	}

	OperationResult::ok(json!({ "created": created }))
}

/// Deletes every node that does not transitively feed an End input.
pub fn remove_unused_nodes(assembly: &mut Assembly, function_id: ResourceId) -> OperationResult {
	let Some(model) = assembly.find_model_mut(function_id) else {
		return OperationResult::fail(format!("Function {function_id} not found"));
	};
	let unused = model.unused_nodes();
	for &node_id in &unused {
		model.remove(node_id);
	}
	OperationResult::ok(json!({ "removed": unused.len() }))
}

/// Enumerates the literal parameters of all constant nodes across the
/// assembly, with their current values.
pub fn list_changeable_parameters(assembly: &Assembly) -> OperationResult {
	let mut parameters = Vec::new();
	for (&function_id, model) in assembly.models() {
		for (&node_id, node) in model.nodes() {
			let is_constant = matches!(
				node.kind(),
				NodeKind::ConstantScalar | NodeKind::ConstantVector | NodeKind::ConstantMatrix | NodeKind::Resource
			);
			if !is_constant {
				continue;
			}
			for (parameter_name, parameter) in node.parameters() {
				parameters.push(json!({
					"function_id": function_id,
					"node_id": node_id.0,
					"node": node.display_name(),
					"parameter": parameter_name,
					"type": parameter.parameter_type().wire_name(),
					"value": encode_value(parameter.value()),
				}));
			}
		}
	}
	OperationResult::ok(json!({ "parameters": parameters }))
}

#[derive(Clone, Copy, Debug)]
pub struct ValidationOptions {
	/// Also run the flattening pass that precedes kernel compilation.
	pub compile: bool,
	pub max_messages: usize,
}

impl Default for ValidationOptions {
	fn default() -> Self {
		Self { compile: false, max_messages: 100 }
	}
}

/// Phase 1 validates the graphs; phase 2 (optional) checks that the
/// assembly flattens, which is the precondition for compiling a kernel.
pub fn validate_model(assembly: &mut Assembly, options: &ValidationOptions) -> OperationResult {
	let mut validator = Validator::new();
	let graph_ok = validator.validate(assembly);
	let errors = validator.errors();
	let truncated = errors.len() > options.max_messages;
	let messages: Vec<Json> = errors
		.iter()
		.take(options.max_messages)
		.map(|error| {
			json!({
				"message": error.message,
				"model": error.model,
				"node": error.node,
				"port": error.port,
				"parameter": error.parameter,
			})
		})
		.collect();

	let mut phases = vec![json!({
		"name": "graph_sync",
		"ok": graph_ok,
		"errors": errors.len(),
		"warnings": 0,
		"truncated": truncated,
		"messages": messages,
	})];

	let mut overall = graph_ok;
	if options.compile {
		let compile_result = GraphFlattener::new(assembly.clone()).flatten();
		let (ok, messages) = match compile_result {
			Ok(_) => (true, Vec::new()),
			Err(error) => (false, vec![json!({ "message": error.to_string() })]),
		};
		overall &= ok;
		phases.push(json!({
			"name": "compile",
			"ok": ok,
			"errors": messages.len(),
			"warnings": 0,
			"messages": messages,
		}));
	}

	OperationResult::ok(json!({ "ok": overall, "phases": phases }))
}

/// Node kinds that external tools may instantiate directly.
fn creatable_node_types() -> Vec<String> {
	NodeKind::iter().filter(|kind| !matches!(kind, NodeKind::Begin | NodeKind::End)).map(|kind| kind.to_string()).collect()
}

fn node_info_json(model: &Model, node_id: NodeId) -> Option<Json> {
	let node = model.get_node(node_id)?;
	Some(json!({
		"id": node.id().0,
		"type": node.kind().to_string(),
		"display_name": node.display_name(),
		"inputs": node.parameters().iter().map(|(name, parameter)| {
			json!({
				"name": name,
				"type": parameter.parameter_type().wire_name(),
				"is_connected": parameter.source().is_some(),
			})
		}).collect::<Vec<_>>(),
		"outputs": node.outputs().iter().map(|(name, port)| {
			json!({ "name": name, "type": port.port_type().wire_name() })
		}).collect::<Vec<_>>(),
	}))
}

/// Required inputs without a source across the whole model, as error-payload
/// context for failed link operations.
fn unconnected_required_inputs(model: &Model) -> Vec<Json> {
	let mut unconnected = Vec::new();
	for (&node_id, node) in model.nodes() {
		if node.is_exempt_from_input_validation() {
			continue;
		}
		for (parameter_name, parameter) in node.parameters() {
			if parameter.source().is_none() && parameter.is_input_source_required() {
				unconnected.push(json!({
					"node_id": node_id.0,
					"node": node.display_name(),
					"parameter": parameter_name,
					"type": parameter.parameter_type().wire_name(),
				}));
			}
		}
	}
	unconnected
}

fn parse_argument_kind(kind: &str) -> Option<ArgumentKind> {
	match kind.to_ascii_lowercase().as_str() {
		"float" | "scalar" => Some(ArgumentKind::Scalar),
		"vec3" | "vector" | "float3" => Some(ArgumentKind::Vector),
		_ => None,
	}
}

fn parse_arguments(arguments: &Json) -> Result<Vec<FunctionArgument>, String> {
	if arguments.is_null() {
		return Ok(Vec::new());
	}
	let entries = arguments.as_array().ok_or_else(|| "arguments must be an array".to_string())?;

	let mut parsed = Vec::new();
	for entry in entries {
		let name = entry.get("name").and_then(Json::as_str).ok_or_else(|| format!("argument entry {entry} is missing a name"))?;
		let kind = entry
			.get("kind")
			.or_else(|| entry.get("type"))
			.and_then(Json::as_str)
			.ok_or_else(|| format!("argument '{name}' is missing a kind"))?;
		let kind = parse_argument_kind(kind).ok_or_else(|| format!("argument '{name}' has unsupported kind '{kind}'"))?;
		parsed.push(FunctionArgument::new(name, kind));
	}
	Ok(parsed)
}

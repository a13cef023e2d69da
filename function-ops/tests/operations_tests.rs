use function_craft::assembly::Assembly;
use function_craft::node::NodeKind;
use function_craft::types::Value;
use function_ops::{OperationResult, ValidationOptions};
use pretty_assertions::assert_eq;
use serde_json::json;

fn gyroid_expression() -> &'static str {
	"sin(pos.x)*cos(pos.y) + sin(pos.y)*cos(pos.z) + sin(pos.z)*cos(pos.x)"
}

fn create_gyroid(assembly: &mut Assembly) -> u32 {
	let result = function_ops::create_function_from_expression(
		assembly,
		"gyroid",
		gyroid_expression(),
		"float",
		&json!([{ "name": "pos", "kind": "vector" }]),
		"shape",
	);
	assert!(result.success, "{:?}", result.error);
	result.data.unwrap()["function_id"].as_u64().unwrap() as u32
}

#[test]
fn expression_function_round_trips_through_the_graph_api() {
	let mut assembly = Assembly::new();
	let function_id = create_gyroid(&mut assembly);

	// The created graph carries the expected arithmetic.
	let model = assembly.find_model(function_id).unwrap();
	let count = |kind| model.nodes().filter(|(_, node)| node.kind() == kind).count();
	assert!(count(NodeKind::Sine) >= 1);
	assert!(count(NodeKind::Cosine) >= 1);
	assert!(count(NodeKind::Addition) >= 1);
	assert!(count(NodeKind::Multiplication) >= 1);

	// Serialize, reimport into a fresh function, compare the topology.
	let graph = function_ops::get_function_graph(&mut assembly, function_id);
	assert!(graph.success);
	let graph = graph.data.unwrap();

	let fresh_id = assembly.create_function("gyroid_copy");
	let applied = function_ops::set_function_graph(&mut assembly, fresh_id, &graph, true);
	assert!(applied.success, "{:?}", applied.error);
	assert!(!applied.data.unwrap()["id_map"].as_object().unwrap().is_empty());

	let original = assembly.find_model(function_id).unwrap();
	let copy = assembly.find_model(fresh_id).unwrap();
	assert_eq!(
		function_craft::serialization::node_kind_multiset(copy),
		function_craft::serialization::node_kind_multiset(original)
	);
	assert_eq!(function_craft::serialization::link_count(copy), function_craft::serialization::link_count(original));
	let shape = copy.end_node().unwrap().parameter("shape").unwrap();
	assert_eq!(shape.parameter_type(), function_craft::types::ParameterType::Float);
	assert!(shape.source().is_some());
}

#[test]
fn undeclared_expression_variable_rolls_back_the_function() {
	let mut assembly = Assembly::new();
	let functions_before = assembly.model_ids().len();

	let result = function_ops::create_function_from_expression(
		&mut assembly,
		"bad",
		"pos.x + w",
		"float",
		&json!([{ "name": "pos", "kind": "Vector" }]),
		"",
	);

	assert!(!result.success);
	let error = result.error.unwrap();
	assert!(error.contains("Variable 'w' used in expression is not defined in function arguments"), "{error}");
	// The partial model was rolled back.
	assert_eq!(assembly.model_ids().len(), functions_before);
}

#[test]
fn create_node_reports_valid_types_on_a_typo() {
	let mut assembly = Assembly::new();
	let entry = assembly.assembly_model_id();

	let result = function_ops::create_node(&mut assembly, entry, "Sinus", "");
	assert!(!result.success);
	let valid_types = result.data.unwrap()["valid_types"].as_array().unwrap().clone();
	assert!(valid_types.iter().any(|entry| entry == "Sine"));
	assert!(!valid_types.iter().any(|entry| entry == "Begin"));

	let result = function_ops::create_node(&mut assembly, entry, "Sine", "my sine");
	assert!(result.success);
	let info = result.data.unwrap();
	assert_eq!(info["type"], "Sine");
	assert_eq!(info["display_name"], "my sine");
	assert_eq!(info["outputs"][0]["name"], "result");
}

#[test]
fn links_are_created_and_deleted_by_name() {
	let mut assembly = Assembly::new();
	let entry = assembly.assembly_model_id();
	let sine = function_ops::create_node(&mut assembly, entry, "Sine", "").data.unwrap()["id"].as_u64().unwrap() as u32;
	let constant = function_ops::create_node(&mut assembly, entry, "ConstantScalar", "").data.unwrap()["id"].as_u64().unwrap() as u32;

	let linked = function_ops::create_link(&mut assembly, entry, constant, "value", sine, "A");
	assert!(linked.success, "{:?}", linked.error);

	let info = function_ops::get_node_info(&assembly, entry, sine);
	let inputs = info.data.unwrap()["inputs"].clone();
	assert!(inputs.as_array().unwrap().iter().any(|input| input["name"] == "A" && input["is_connected"] == true));

	let deleted = function_ops::delete_link(&mut assembly, entry, sine, "A");
	assert!(deleted.success);
	let info = function_ops::get_node_info(&assembly, entry, sine);
	let inputs = info.data.unwrap()["inputs"].clone();
	assert!(inputs.as_array().unwrap().iter().any(|input| input["name"] == "A" && input["is_connected"] == false));
}

#[test]
fn failed_link_lists_unconnected_required_inputs() {
	let mut assembly = Assembly::new();
	let entry = assembly.assembly_model_id();
	let vector = function_ops::create_node(&mut assembly, entry, "ConstantVector", "").data.unwrap()["id"].as_u64().unwrap() as u32;
	let sine = function_ops::create_node(&mut assembly, entry, "Sine", "").data.unwrap()["id"].as_u64().unwrap() as u32;

	// vec3 into a float input
	let result = function_ops::create_link(&mut assembly, entry, vector, "vector", sine, "A");
	assert!(!result.success);
	let unconnected = result.data.unwrap()["unconnected_required_inputs"].as_array().unwrap().clone();
	assert!(unconnected.iter().any(|input| input["parameter"] == "A"));
}

#[test]
fn parameter_values_decode_by_type() {
	let mut assembly = Assembly::new();
	let entry = assembly.assembly_model_id();
	let constant = function_ops::create_node(&mut assembly, entry, "ConstantScalar", "").data.unwrap()["id"].as_u64().unwrap() as u32;

	let set = function_ops::set_parameter_value(&mut assembly, entry, constant, "value", &json!(2.25));
	assert!(set.success);
	let model = assembly.find_model(entry).unwrap();
	let node_id = function_craft::types::NodeId(constant);
	assert_eq!(model.get_node(node_id).unwrap().parameter("value").unwrap().value(), &Value::Float(2.25));

	let bad = function_ops::set_parameter_value(&mut assembly, entry, constant, "value", &json!("two"));
	assert!(!bad.success);

	// Matrices accept the nested form.
	let transformation = function_ops::create_node(&mut assembly, entry, "Transformation", "").data.unwrap()["id"].as_u64().unwrap() as u32;
	let set = function_ops::set_parameter_value(
		&mut assembly,
		entry,
		transformation,
		"transformation",
		&json!([[1.0, 0.0, 0.0, 2.0], [0.0, 1.0, 0.0, 3.0], [0.0, 0.0, 1.0, 4.0], [0.0, 0.0, 0.0, 1.0]]),
	);
	assert!(set.success, "{:?}", set.error);
}

#[test]
fn constants_fill_in_missing_required_inputs() {
	let mut assembly = Assembly::new();
	let entry = assembly.assembly_model_id();
	let add = function_ops::create_node(&mut assembly, entry, "Addition", "").data.unwrap()["id"].as_u64().unwrap() as u32;

	let created = function_ops::create_constants_for_missing_parameters(&mut assembly, entry, add, true);
	assert!(created.success);
	let created = created.data.unwrap()["created"].as_array().unwrap().clone();
	assert_eq!(created.len(), 2);

	let info = function_ops::get_node_info(&assembly, entry, add);
	let inputs = info.data.unwrap()["inputs"].clone();
	assert!(inputs.as_array().unwrap().iter().all(|input| input["is_connected"] == true));
}

#[test]
fn unused_nodes_are_removed() {
	let mut assembly = Assembly::new();
	let entry = assembly.assembly_model_id();
	function_ops::create_node(&mut assembly, entry, "Sine", "orphan");
	let nodes_before = assembly.assembly_model().unwrap().node_count();

	let result = function_ops::remove_unused_nodes(&mut assembly, entry);
	assert!(result.success);
	assert_eq!(result.data.unwrap()["removed"], 1);
	assert_eq!(assembly.assembly_model().unwrap().node_count(), nodes_before - 1);
}

#[test]
fn changeable_parameters_span_the_assembly() {
	let mut assembly = Assembly::new();
	let entry = assembly.assembly_model_id();
	let constant = function_ops::create_node(&mut assembly, entry, "ConstantScalar", "radius").data.unwrap()["id"].as_u64().unwrap() as u32;
	function_ops::set_parameter_value(&mut assembly, entry, constant, "value", &json!(5.0));

	let listed = function_ops::list_changeable_parameters(&assembly);
	let parameters = listed.data.unwrap()["parameters"].as_array().unwrap().clone();
	assert!(parameters.iter().any(|parameter| parameter["node"] == "radius" && parameter["value"] == 5.0));
}

#[test]
fn validation_reports_missing_inputs_per_phase() {
	let mut assembly = Assembly::new();
	let entry = assembly.assembly_model_id();
	function_ops::create_node(&mut assembly, entry, "Addition", "half-wired");

	let result = function_ops::validate_model(&mut assembly, &ValidationOptions::default());
	assert!(result.success);
	let data = result.data.unwrap();
	assert_eq!(data["ok"], false);
	let phase = &data["phases"][0];
	assert_eq!(phase["name"], "graph_sync");
	assert_eq!(phase["ok"], false);
	assert!(phase["messages"].as_array().unwrap().iter().any(|message| message["message"] == "Missing input"));
}

#[test]
fn validation_compile_phase_flattens_the_assembly() {
	let mut assembly = Assembly::new();
	let result = function_ops::validate_model(
		&mut assembly,
		&ValidationOptions {
			compile: true,
			max_messages: 10,
		},
	);
	assert!(result.success);
	let data = result.data.unwrap();
	assert_eq!(data["ok"], true);
	assert_eq!(data["phases"][1]["name"], "compile");
	assert_eq!(data["phases"][1]["ok"], true);
}

#[test]
fn function_call_nodes_come_wired_to_a_resource_node() {
	let mut assembly = Assembly::new();
	let entry = assembly.assembly_model_id();
	let callee = create_gyroid(&mut assembly);

	let result = function_ops::create_function_call_node(&mut assembly, entry, callee, "call gyroid");
	assert!(result.success, "{:?}", result.error);
	let data = result.data.unwrap();
	let call_info = &data["function_call"];
	assert_eq!(call_info["type"], "FunctionCall");
	// The callee signature was mirrored onto the call.
	assert!(call_info["inputs"].as_array().unwrap().iter().any(|input| input["name"] == "pos"));
	assert!(call_info["outputs"].as_array().unwrap().iter().any(|output| output["name"] == "shape"));
	// The function reference comes from the linked Resource node.
	assert!(call_info["inputs"].as_array().unwrap().iter().any(|input| input["name"] == "functionId" && input["is_connected"] == true));

	let call_id = call_info["id"].as_u64().unwrap() as u32;
	let model = assembly.find_model(entry).unwrap();
	assert_eq!(model.resolve_function_id(function_craft::types::NodeId(call_id)), Some(callee));

	let missing = function_ops::create_function_call_node(&mut assembly, entry, 999, "");
	assert!(!missing.success);
}

#[test]
fn operation_results_serialize_cleanly() {
	let ok = OperationResult::ok(json!({"n": 1}));
	let serialized = serde_json::to_value(&ok).unwrap();
	assert_eq!(serialized, json!({"success": true, "data": {"n": 1}}));

	let failed = OperationResult::fail("nope");
	let serialized = serde_json::to_value(&failed).unwrap();
	assert_eq!(serialized, json!({"success": false, "error": "nope"}));
}

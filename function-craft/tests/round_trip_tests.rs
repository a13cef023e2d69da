use function_craft::expression::{ArgumentKind, FunctionArgument, FunctionOutput, expression_to_graph, graph_to_expression};
use function_craft::model::Model;
use function_craft::node::NodeKind;
use function_craft::serialization::{apply, link_count, node_kind_multiset, serialize, serialize_minimal};
use function_craft::types::ParameterType;
use pretty_assertions::assert_eq;

fn gyroid() -> Model {
	let mut model = Model::new(2);
	model.set_display_name("gyroid");
	let arguments = [FunctionArgument::new("pos", ArgumentKind::Vector)];
	let output = FunctionOutput::new("shape", ArgumentKind::Scalar);
	expression_to_graph(
		"sin(pos.x)*cos(pos.y) + sin(pos.y)*cos(pos.z) + sin(pos.z)*cos(pos.x)",
		&mut model,
		&arguments,
		&output,
	)
	.unwrap();
	model
}

#[test]
fn gyroid_serializes_and_reimports_with_identical_topology() {
	let model = gyroid();
	let graph = serialize_minimal(&model);

	let mut fresh = Model::new(8);
	fresh.create_begin_end();
	let id_map = apply(&mut fresh, &graph, true).unwrap();
	assert!(!id_map.is_empty());

	assert_eq!(node_kind_multiset(&fresh), node_kind_multiset(&model));
	assert_eq!(link_count(&fresh), link_count(&model));

	let shape = fresh.end_node().unwrap().parameter("shape").unwrap();
	assert_eq!(shape.parameter_type(), ParameterType::Float);
	let source = shape.source().unwrap();
	assert_eq!(fresh.get_port(source.port_id).unwrap().port_type(), ParameterType::Float);
}

#[test]
fn gyroid_contains_the_expected_node_mix() {
	let model = gyroid();
	let count = |kind| model.nodes().filter(|(_, node)| node.kind() == kind).count();
	assert!(count(NodeKind::Sine) >= 1);
	assert!(count(NodeKind::Cosine) >= 1);
	assert!(count(NodeKind::Addition) >= 1);
	assert!(count(NodeKind::Multiplication) >= 1);
}

#[test]
fn verbose_projection_extends_the_minimal_one() {
	let model = gyroid();
	let verbose = serialize(&model);
	let minimal = serialize_minimal(&model);

	assert_eq!(verbose["counts"], minimal["counts"]);
	assert_eq!(verbose["model"]["resource_id"], minimal["model"]["resource_id"]);
	// The verbose depth carries per-port identity the minimal one drops.
	let node = &verbose["nodes"][0];
	assert!(node.get("unique_name").is_some());
	assert!(node.get("order").is_some());
}

#[test]
fn expression_survives_the_graph_and_back() {
	let mut model = Model::new(4);
	let arguments = [FunctionArgument::new("pos", ArgumentKind::Vector)];
	let output = FunctionOutput::new("shape", ArgumentKind::Scalar);
	expression_to_graph("sin(pos.x) * cos(pos.y) + 1", &mut model, &arguments, &output).unwrap();
	assert_eq!(graph_to_expression(&model, "shape").unwrap(), "sin(pos.x) * cos(pos.y) + 1");
}

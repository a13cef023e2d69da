//! Stable JSON projection of a model and the matching importer.
//!
//! Two depths are exposed: [`serialize`] carries everything an external tool
//! could ask for, [`serialize_minimal`] is the round-trip target. The
//! importer rebuilds nodes first and links second, mapping the client's node
//! ids to the freshly assigned ones.

use log::debug;
use rustc_hash::FxHashMap;
use serde_json::{Value as Json, json};
use thiserror::Error;

use crate::model::Model;
use crate::node::NodeKind;
use crate::types::{NodeId, ParameterType, Value};

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ImportError {
	#[error("graph must be a JSON object")]
	NotAnObject,
	#[error("graph.nodes must be an array")]
	MissingNodes,
	#[error("Unknown node type: {0}")]
	UnknownNodeType(String),
}

/// Mapping from the client's node ids to the ids the model assigned.
pub type IdMap = FxHashMap<u32, NodeId>;

/// Full projection: everything about every node, port and parameter.
pub fn serialize(model: &Model) -> Json {
	let nodes: Vec<Json> = model
		.nodes()
		.map(|(_, node)| {
			json!({
				"id": node.id().0,
				"order": node.order(),
				"name": node.kind().to_string(),
				"unique_name": node.unique_name(),
				"display_name": node.display_name(),
				"category": format!("{:?}", node.category()),
				"parameters": node.parameters().iter().map(|(name, parameter)| {
					json!({
						"name": name,
						"type": parameter.parameter_type().wire_name(),
						"modifiable": parameter.is_modifiable(),
						"is_argument": parameter.is_argument(),
						"value": value_to_json(parameter.value()),
						"source": parameter.source().map(|source| json!({
							"node_id": source.node_id.0,
							"port_id": source.port_id.0,
							"unique_name": source.unique_name,
							"short_name": source.short_name,
							"type": source.port_type.wire_name(),
						})),
					})
				}).collect::<Vec<_>>(),
				"outputs": node.outputs().iter().map(|(name, port)| {
					json!({
						"name": name,
						"id": port.id().0,
						"unique_name": port.unique_name(),
						"short_name": port.short_name(),
						"type": port.port_type().wire_name(),
						"visible": port.is_visible(),
						"is_used": port.is_used(),
					})
				}).collect::<Vec<_>>(),
			})
		})
		.collect();

	let links = links_json(model);
	let counts = json!({ "nodes": nodes.len(), "links": links.len() });
	json!({
		"model": model_json(model),
		"nodes": nodes,
		"links": links,
		"counts": counts,
	})
}

/// Minimal projection: the round-trip target consumed by external tools.
pub fn serialize_minimal(model: &Model) -> Json {
	let nodes: Vec<Json> = model
		.nodes()
		.map(|(_, node)| {
			json!({
				"id": node.id().0,
				"type": node.kind().to_string(),
				"display_name": node.display_name(),
				"parameters": node.parameters().iter().map(|(name, parameter)| {
					let mut entry = json!({
						"name": name,
						"type": parameter.parameter_type().wire_name(),
						"is_connected": parameter.source().is_some(),
					});
					if let Some(source) = parameter.source() {
						entry["source"] = json!({ "node_id": source.node_id.0, "port": source.short_name });
					}
					entry
				}).collect::<Vec<_>>(),
				"outputs": node.outputs().iter().map(|(name, port)| {
					json!({ "name": name, "type": port.port_type().wire_name() })
				}).collect::<Vec<_>>(),
			})
		})
		.collect();

	let links = links_json(model);
	let counts = json!({ "nodes": nodes.len(), "links": links.len() });
	json!({
		"model": model_json(model),
		"nodes": nodes,
		"links": links,
		"counts": counts,
	})
}

fn model_json(model: &Model) -> Json {
	json!({
		"resource_id": model.resource_id(),
		"name": model.model_name(),
		"display_name": model.display_name(),
	})
}

/// Links are derived from the parameters that carry a source.
fn links_json(model: &Model) -> Vec<Json> {
	let mut links = Vec::new();
	for (_, node) in model.nodes() {
		for (parameter_name, parameter) in node.parameters() {
			if let Some(source) = parameter.source() {
				links.push(json!({
					"from_node_id": source.node_id.0,
					"from_port": source.short_name,
					"to_node_id": node.id().0,
					"to_parameter": parameter_name,
					"type": parameter.parameter_type().wire_name(),
				}));
			}
		}
	}
	links
}

fn value_to_json(value: &Value) -> Json {
	match value {
		Value::Float(value) => json!(value),
		Value::Float3(value) => json!([value.x, value.y, value.z]),
		// Flat 16-element row-major array.
		Value::Matrix4(value) => {
			let columns = value.to_cols_array();
			let rows: Vec<f32> = (0..4).flat_map(|row| (0..4).map(move |column| columns[column * 4 + row])).collect();
			json!(rows)
		}
		Value::Int(value) => json!(value),
		Value::String(value) => json!(value),
		Value::ResourceId(value) => json!(value),
	}
}

/// Applies a serialized graph to a model.
///
/// With `replace` the model is cleared and refilled from scratch. Nodes are
/// materialized first ("Input"/"Begin" and "Output"/"End" alias the model's
/// own markers), then links are recreated; a link whose endpoints cannot be
/// resolved is skipped so the rest of the import still lands.
pub fn apply(model: &mut Model, graph: &Json, replace: bool) -> Result<IdMap, ImportError> {
	let graph = graph.as_object().ok_or(ImportError::NotAnObject)?;
	let nodes = graph.get("nodes").and_then(Json::as_array).ok_or(ImportError::MissingNodes)?;

	if replace {
		model.clear();
		model.create_begin_end_with_default_in_and_outs();
	}

	let mut id_map = IdMap::default();

	// First pass: materialize nodes.
	for node_json in nodes {
		let Some(node_json) = node_json.as_object() else { continue };
		let client_id = node_json.get("id").and_then(Json::as_u64).unwrap_or(0) as u32;
		let node_type = node_json.get("type").and_then(Json::as_str).unwrap_or("");
		let display_name = node_json.get("display_name").and_then(Json::as_str).unwrap_or("");

		let created = match node_type {
			"Input" | "Begin" => {
				restore_begin_ports(model, node_json);
				model.begin_id()
			}
			"Output" | "End" => {
				restore_end_parameters(model, node_json);
				model.end_id()
			}
			other => {
				let kind = NodeKind::from_name(other).ok_or_else(|| ImportError::UnknownNodeType(other.to_string()))?;
				model.create_node(kind)
			}
		};

		if !display_name.is_empty() {
			if let Some(node) = model.get_node_mut(created) {
				node.set_display_name(display_name);
			}
		}
		if client_id != 0 && created.is_assigned() {
			id_map.insert(client_id, created);
		}
	}

	model.update_graph_and_order_if_needed();

	// Second pass: links. Missing endpoints are skipped, not fatal.
	if let Some(links) = graph.get("links").and_then(Json::as_array) {
		for link in links {
			let Some(link) = link.as_object() else { continue };
			let from_node = link.get("from_node_id").and_then(Json::as_u64).unwrap_or(0) as u32;
			let to_node = link.get("to_node_id").and_then(Json::as_u64).unwrap_or(0) as u32;
			let from_port = link.get("from_port").and_then(Json::as_str).unwrap_or("");
			let to_parameter = link.get("to_parameter").and_then(Json::as_str).unwrap_or("");
			if from_node == 0 || to_node == 0 || from_port.is_empty() || to_parameter.is_empty() {
				continue;
			}

			let (Some(&source), Some(&target)) = (id_map.get(&from_node), id_map.get(&to_node)) else {
				debug!("skipping link {from_node}:{from_port} -> {to_node}:{to_parameter}: unknown endpoint node");
				continue;
			};
			let port = model.get_node(source).and_then(|node| node.find_output_port(from_port)).map(|port| port.id());
			let parameter = model.get_node(target).and_then(|node| node.parameter(to_parameter)).map(|parameter| parameter.id());
			let (Some(port), Some(parameter)) = (port, parameter) else {
				debug!("skipping link {from_node}:{from_port} -> {to_node}:{to_parameter}: endpoint not found");
				continue;
			};
			// Types are still at their defaults here; they settle during the
			// final type resolution, so the link itself is taken as-is.
			if !model.add_link(port, parameter, true) {
				debug!("skipping link {from_node}:{from_port} -> {to_node}:{to_parameter}: rejected by the model");
			}
		}
	}

	model.update_graph_and_order_if_needed();
	model.update_types();
	Ok(id_map)
}

/// Recreates Begin output ports listed by the serialized node so links from
/// custom arguments resolve after a replace-import.
fn restore_begin_ports(model: &mut Model, node_json: &serde_json::Map<String, Json>) {
	let Some(outputs) = node_json.get("outputs").and_then(Json::as_array) else { return };
	for output in outputs {
		let Some(name) = output.get("name").and_then(Json::as_str) else { continue };
		let port_type = output.get("type").and_then(Json::as_str).and_then(ParameterType::from_wire_name).unwrap_or_default();
		model.add_argument(name, port_type);
		let begin = model.begin_id();
		if let Some(port) = model.get_node_mut(begin).and_then(|node| node.find_output_port_mut(name)) {
			port.set_port_type(port_type);
		}
	}
}

/// Recreates End input parameters so links onto custom outputs resolve.
fn restore_end_parameters(model: &mut Model, node_json: &serde_json::Map<String, Json>) {
	let Some(parameters) = node_json.get("parameters").and_then(Json::as_array) else { return };
	for parameter in parameters {
		let Some(name) = parameter.get("name").and_then(Json::as_str) else { continue };
		let parameter_type = parameter.get("type").and_then(Json::as_str).and_then(ParameterType::from_wire_name).unwrap_or_default();
		model.add_function_output(name, Value::default_for(parameter_type));
	}
}

/// Multiset of node kinds, used by round-trip checks.
pub fn node_kind_multiset(model: &Model) -> Vec<String> {
	let mut kinds: Vec<String> = model.nodes().map(|(_, node)| node.kind().to_string()).collect();
	kinds.sort();
	kinds
}

pub fn link_count(model: &Model) -> usize {
	model.nodes().flat_map(|(_, node)| node.parameters().values()).filter(|parameter| parameter.source().is_some()).count()
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::node::NodeKind;

	fn sample_model() -> Model {
		let mut model = Model::new(5);
		model.set_display_name("sample");
		model.create_begin_end();
		let sine = model.create_node(NodeKind::Sine);
		let begin = model.begin_id();
		let decompose = model.create_node(NodeKind::DecomposeVector);
		let pos = model.get_node(begin).unwrap().find_output_port("pos").unwrap().id();
		let a = model.get_node(decompose).unwrap().parameter("A").unwrap().id();
		assert!(model.add_link(pos, a, false));
		let x = model.get_node(decompose).unwrap().find_output_port("x").unwrap().id();
		let sine_a = model.get_node(sine).unwrap().parameter("A").unwrap().id();
		assert!(model.add_link(x, sine_a, false));
		let result = model.get_node(sine).unwrap().find_output_port("result").unwrap().id();
		let shape = model.end_node().unwrap().parameter("shape").unwrap().id();
		assert!(model.add_link(result, shape, false));
		model.update_graph_and_order_if_needed();
		model
	}

	#[test]
	fn minimal_projection_has_the_fixed_shape() {
		let model = sample_model();
		let graph = serialize_minimal(&model);

		assert_eq!(graph["model"]["resource_id"], 5);
		assert_eq!(graph["model"]["display_name"], "sample");
		assert_eq!(graph["counts"]["nodes"], 4);
		assert_eq!(graph["counts"]["links"], 3);
		let links = graph["links"].as_array().unwrap();
		assert!(links.iter().any(|link| link["from_port"] == "x" && link["to_parameter"] == "A"));
	}

	#[test]
	fn import_rejects_malformed_graphs() {
		let mut model = Model::new(1);
		assert_eq!(apply(&mut model, &json!([]), true), Err(ImportError::NotAnObject));
		assert_eq!(apply(&mut model, &json!({"model": {}}), true), Err(ImportError::MissingNodes));
		let unknown = json!({"nodes": [{"id": 1, "type": "Imaginary"}]});
		assert_eq!(apply(&mut model, &unknown, true), Err(ImportError::UnknownNodeType("Imaginary".to_string())));
	}

	#[test]
	fn round_trip_preserves_topology() {
		let model = sample_model();
		let graph = serialize_minimal(&model);

		let mut fresh = Model::new(9);
		fresh.create_begin_end();
		let id_map = apply(&mut fresh, &graph, true).unwrap();

		assert_eq!(node_kind_multiset(&fresh), node_kind_multiset(&model));
		assert_eq!(link_count(&fresh), link_count(&model));
		// End's shape keeps its float source.
		let shape = fresh.end_node().unwrap().parameter("shape").unwrap();
		assert_eq!(shape.parameter_type(), ParameterType::Float);
		assert!(shape.source().is_some());
		// Ids may differ; the map makes the relabeling explicit.
		assert_eq!(id_map.len(), model.node_count());
	}

	#[test]
	fn import_skips_unresolvable_links() {
		let mut model = Model::new(1);
		let graph = json!({
			"nodes": [
				{"id": 7, "type": "Sine", "display_name": "s"},
			],
			"links": [
				{"from_node_id": 99, "from_port": "result", "to_node_id": 7, "to_parameter": "A", "type": "float"},
				{"from_node_id": 7, "from_port": "nope", "to_node_id": 7, "to_parameter": "A", "type": "float"},
			],
		});
		let id_map = apply(&mut model, &graph, true).unwrap();
		assert_eq!(id_map.len(), 1);
		let sine = id_map[&7];
		assert!(model.get_node(sine).unwrap().parameter("A").unwrap().source().is_none());
	}
}

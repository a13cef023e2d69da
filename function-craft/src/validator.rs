use crate::assembly::Assembly;
use crate::field_names;
use crate::model::Model;
use crate::node::NodeKind;
use crate::types::NodeId;

/// One structural, type or reference fault, with enough context to locate it
/// in an editor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
	pub message: String,
	pub model: String,
	pub node: String,
	pub port: String,
	pub parameter: String,
}

pub type ValidationErrors = Vec<ValidationError>;

/// Walks every model of an assembly and accumulates all errors instead of
/// stopping at the first. Each model's validity flag is set accordingly.
#[derive(Debug, Default)]
pub struct Validator {
	errors: ValidationErrors,
}

impl Validator {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns whether the whole assembly is valid.
	pub fn validate(&mut self, assembly: &mut Assembly) -> bool {
		self.errors.clear();
		let model_ids = assembly.model_ids();
		for resource_id in model_ids {
			self.validate_model(assembly, resource_id);
		}
		self.errors.is_empty()
	}

	pub fn errors(&self) -> &ValidationErrors {
		&self.errors
	}

	fn validate_model(&mut self, assembly: &mut Assembly, resource_id: u32) {
		let Some(model) = assembly.find_model_mut(resource_id) else { return };
		model.update_graph_and_order_if_needed();
		model.update_types();
		model.set_is_valid(true);

		let node_ids = model.node_ids();
		let mut model_valid = true;
		for node_id in node_ids {
			model_valid &= self.validate_node(assembly, resource_id, node_id);
		}
		if let Some(model) = assembly.find_model_mut(resource_id) {
			model.set_is_valid(model_valid);
		}
	}

	fn validate_node(&mut self, assembly: &Assembly, resource_id: u32, node_id: NodeId) -> bool {
		let Some(model) = assembly.find_model(resource_id) else { return true };
		let Some(node) = model.get_node(node_id) else { return true };
		let model_info = model_info(model);
		let mut valid = true;

		if !node.is_exempt_from_input_validation() {
			for (parameter_name, parameter) in node.parameters() {
				if parameter.source().is_none() && parameter.is_input_source_required() {
					self.errors.push(ValidationError {
						message: "Missing input".to_string(),
						model: model_info.clone(),
						node: node.display_name().to_string(),
						port: "unknown".to_string(),
						parameter: parameter_name.clone(),
					});
					valid = false;
				}
			}
		}

		for (parameter_name, parameter) in node.parameters() {
			let Some(source) = parameter.source() else { continue };
			let Some(port) = model.get_port(source.port_id) else {
				self.errors.push(ValidationError {
					message: "Parameter references non-existing port".to_string(),
					model: model_info.clone(),
					node: node.display_name().to_string(),
					port: "unknown".to_string(),
					parameter: parameter_name.clone(),
				});
				valid = false;
				continue;
			};
			if parameter.parameter_type() != port.port_type() {
				self.errors.push(ValidationError {
					message: "Datatype mismatch".to_string(),
					model: model_info.clone(),
					node: node.display_name().to_string(),
					port: port.unique_name().to_string(),
					parameter: parameter_name.clone(),
				});
				valid = false;
			}
		}

		if node.kind() == NodeKind::FunctionCall {
			let referenced = model.resolve_function_id(node_id);
			if referenced.and_then(|id| assembly.find_model(id)).is_none() {
				self.errors.push(ValidationError {
					message: "Function reference not found".to_string(),
					model: model_info,
					node: node.display_name().to_string(),
					port: "unknown".to_string(),
					parameter: field_names::FUNCTION_ID.to_string(),
				});
				valid = false;
			}
		}

		valid
	}
}

fn model_info(model: &Model) -> String {
	format!("{} (ID: {})", model.display_name().unwrap_or("unknown"), model.resource_id())
}

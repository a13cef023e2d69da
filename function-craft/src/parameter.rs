use serde::{Deserialize, Serialize};

use crate::port::Port;
use crate::types::{NodeId, ParameterId, ParameterType, PortId, Value};

/// Where a linked parameter takes its value from.
///
/// Everything is recorded by id and name; the port itself stays owned by its
/// node and is looked up through the model when needed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
	pub port_id: PortId,
	pub node_id: NodeId,
	pub short_name: String,
	pub unique_name: String,
	pub port_type: ParameterType,
}

/// Broad classification of what a parameter's value represents, used by
/// editors to pick widgets. Carries no core semantics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
	#[default]
	Generic,
	Position,
	Angle,
	Color,
}

/// A named, typed input of a node; either a literal value or sourced from a
/// port of equal type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Parameter {
	id: ParameterId,
	parent_id: NodeId,
	parameter_type: ParameterType,
	value: Value,
	source: Option<Source>,
	input_source_required: bool,
	argument: bool,
	modifiable: bool,
	valid: bool,
	visible: bool,
	content_type: ContentType,
}

impl Parameter {
	pub fn new(value: Value) -> Self {
		Self {
			id: ParameterId::UNASSIGNED,
			parent_id: NodeId::UNASSIGNED,
			parameter_type: value.parameter_type(),
			value,
			source: None,
			input_source_required: true,
			argument: false,
			modifiable: true,
			valid: true,
			visible: true,
			content_type: ContentType::default(),
		}
	}

	/// A parameter of the given type holding that type's zero value.
	pub fn typed(parameter_type: ParameterType) -> Self {
		let mut parameter = Self::new(Value::default_for(parameter_type));
		parameter.parameter_type = parameter_type;
		parameter
	}

	pub fn id(&self) -> ParameterId {
		self.id
	}

	pub fn set_id(&mut self, id: ParameterId) {
		self.id = id;
	}

	pub fn parent_id(&self) -> NodeId {
		self.parent_id
	}

	pub fn set_parent_id(&mut self, parent_id: NodeId) {
		self.parent_id = parent_id;
	}

	pub fn parameter_type(&self) -> ParameterType {
		self.parameter_type
	}

	pub fn value(&self) -> &Value {
		&self.value
	}

	pub fn set_value(&mut self, value: Value) {
		self.parameter_type = value.parameter_type();
		self.value = value;
	}

	pub fn source(&self) -> Option<&Source> {
		self.source.as_ref()
	}

	pub fn source_mut(&mut self) -> Option<&mut Source> {
		self.source.as_mut()
	}

	pub fn set_source(&mut self, source: Source) {
		self.source = Some(source);
	}

	pub fn clear_source(&mut self) {
		self.source = None;
	}

	/// Installs a source describing the given port.
	pub fn set_input_from_port(&mut self, port: &Port) {
		self.source = Some(Source {
			port_id: port.id(),
			node_id: port.parent_id(),
			short_name: port.short_name().to_string(),
			unique_name: port.unique_name().to_string(),
			port_type: port.port_type(),
		});
	}

	pub fn is_input_source_required(&self) -> bool {
		self.input_source_required
	}

	pub fn set_input_source_required(&mut self, required: bool) {
		self.input_source_required = required;
	}

	/// Whether this parameter is part of a function-call signature, mirroring
	/// an argument of the callee rather than belonging to the node itself.
	pub fn is_argument(&self) -> bool {
		self.argument
	}

	pub fn set_is_argument(&mut self, argument: bool) {
		self.argument = argument;
	}

	pub fn is_modifiable(&self) -> bool {
		self.modifiable
	}

	pub fn set_modifiable(&mut self, modifiable: bool) {
		self.modifiable = modifiable;
	}

	pub fn is_valid(&self) -> bool {
		self.valid
	}

	pub fn set_valid(&mut self, valid: bool) {
		self.valid = valid;
	}

	pub fn is_visible(&self) -> bool {
		self.visible
	}

	pub fn hide(&mut self) {
		self.visible = false;
	}

	pub fn show(&mut self) {
		self.visible = true;
	}

	pub fn content_type(&self) -> ContentType {
		self.content_type
	}

	pub fn set_content_type(&mut self, content_type: ContentType) {
		self.content_type = content_type;
	}
}

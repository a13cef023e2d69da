use serde::{Deserialize, Serialize};

use crate::types::{NodeId, ParameterType, PortId};

/// A named, typed output of a node. The sole source end of a link.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Port {
	id: PortId,
	parent_id: NodeId,
	short_name: String,
	unique_name: String,
	port_type: ParameterType,
	visible: bool,
	is_used: bool,
}

impl Port {
	pub fn new(short_name: impl Into<String>, port_type: ParameterType) -> Self {
		Self {
			id: PortId::UNASSIGNED,
			parent_id: NodeId::UNASSIGNED,
			short_name: short_name.into(),
			unique_name: String::new(),
			port_type,
			visible: true,
			is_used: false,
		}
	}

	pub fn id(&self) -> PortId {
		self.id
	}

	pub fn set_id(&mut self, id: PortId) {
		self.id = id;
	}

	pub fn parent_id(&self) -> NodeId {
		self.parent_id
	}

	pub fn set_parent_id(&mut self, parent_id: NodeId) {
		self.parent_id = parent_id;
	}

	pub fn short_name(&self) -> &str {
		&self.short_name
	}

	/// `<node unique name>_<short name>`, unique within the owning model.
	pub fn unique_name(&self) -> &str {
		&self.unique_name
	}

	pub fn set_unique_name(&mut self, unique_name: impl Into<String>) {
		self.unique_name = unique_name.into();
	}

	pub fn port_type(&self) -> ParameterType {
		self.port_type
	}

	pub fn set_port_type(&mut self, port_type: ParameterType) {
		self.port_type = port_type;
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

	/// Whether at least one parameter is currently linked from this port.
	pub fn is_used(&self) -> bool {
		self.is_used
	}

	pub fn set_is_used(&mut self, is_used: bool) {
		self.is_used = is_used;
	}
}

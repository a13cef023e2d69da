use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Document-level identifier of a model or external resource. Stable across
/// edits and flattening; the only way a `FunctionCall` refers to its callee.
pub type ResourceId = u32;

macro_rules! id_type {
	($(#[doc = $doc:expr])* $name:ident) => {
		$(#[doc = $doc])*
		#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		pub struct $name(pub u32);

		impl $name {
			pub const UNASSIGNED: Self = Self(0);

			pub fn is_assigned(self) -> bool {
				self.0 != 0
			}
		}

		impl core::fmt::Display for $name {
			fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
				write!(f, "{}", self.0)
			}
		}
	};
}

id_type!(
	#[doc = "Identifier of a node within one model. 0 is reserved for \"unassigned\"."]
	NodeId
);
id_type!(
	#[doc = "Identifier of an output port within one model. 0 is reserved for \"unassigned\"."]
	PortId
);
id_type!(
	#[doc = "Identifier of an input parameter within one model. 0 is reserved for \"unassigned\"."]
	ParameterId
);

/// Type tag carried by every parameter and port.
///
/// `Any` is a rule-matching wildcard ("don't constrain this input") and never
/// appears on a linked parameter after type resolution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterType {
	#[default]
	Float,
	Float3,
	Matrix4,
	Int,
	String,
	ResourceId,
	Any,
}

impl ParameterType {
	/// Name used in the JSON graph projection.
	pub fn wire_name(self) -> &'static str {
		match self {
			Self::Float => "float",
			Self::Float3 => "vec3",
			Self::Matrix4 => "mat4",
			Self::Int => "int",
			Self::String => "string",
			Self::ResourceId => "resource_id",
			Self::Any => "unknown",
		}
	}

	pub fn from_wire_name(name: &str) -> Option<Self> {
		match name {
			"float" => Some(Self::Float),
			"vec3" => Some(Self::Float3),
			"mat4" => Some(Self::Matrix4),
			"int" => Some(Self::Int),
			"string" => Some(Self::String),
			"resource_id" => Some(Self::ResourceId),
			_ => None,
		}
	}

	/// Type equality with `Any` matching anything.
	pub fn matches(self, other: Self) -> bool {
		self == other || self == Self::Any || other == Self::Any
	}
}

/// A literal value held by a parameter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
	Float(f32),
	Float3(Vec3),
	Matrix4(Mat4),
	Int(i32),
	String(String),
	ResourceId(ResourceId),
}

impl Value {
	pub fn parameter_type(&self) -> ParameterType {
		match self {
			Self::Float(_) => ParameterType::Float,
			Self::Float3(_) => ParameterType::Float3,
			Self::Matrix4(_) => ParameterType::Matrix4,
			Self::Int(_) => ParameterType::Int,
			Self::String(_) => ParameterType::String,
			Self::ResourceId(_) => ParameterType::ResourceId,
		}
	}

	/// The zero value of the given type. `Any` maps to a float, matching the
	/// default element type of unconstrained rule inputs.
	pub fn default_for(parameter_type: ParameterType) -> Self {
		match parameter_type {
			ParameterType::Float | ParameterType::Any => Self::Float(0.),
			ParameterType::Float3 => Self::Float3(Vec3::ZERO),
			ParameterType::Matrix4 => Self::Matrix4(Mat4::IDENTITY),
			ParameterType::Int => Self::Int(0),
			ParameterType::String => Self::String(String::new()),
			ParameterType::ResourceId => Self::ResourceId(0),
		}
	}

	pub fn as_float(&self) -> Option<f32> {
		match self {
			Self::Float(value) => Some(*value),
			_ => None,
		}
	}

	pub fn as_float3(&self) -> Option<Vec3> {
		match self {
			Self::Float3(value) => Some(*value),
			_ => None,
		}
	}

	pub fn as_int(&self) -> Option<i32> {
		match self {
			Self::Int(value) => Some(*value),
			_ => None,
		}
	}

	pub fn as_resource_id(&self) -> Option<ResourceId> {
		match self {
			Self::ResourceId(id) => Some(*id),
			_ => None,
		}
	}
}

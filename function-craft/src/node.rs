use std::collections::BTreeMap;

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::field_names;
use crate::parameter::Parameter;
use crate::port::Port;
use crate::rules::{self, RuleType, TypeMap, TypeRule};
use crate::types::{NodeId, ParameterType, Value};

/// The closed catalog of node kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter, IntoStaticStr)]
pub enum NodeKind {
	Begin,
	End,
	Transformation,
	BoxMinMax,
	SignedDistanceToMesh,
	UnsignedDistanceToMesh,
	SignedDistanceToBeamLattice,
	Addition,
	Subtraction,
	Multiplication,
	Division,
	Min,
	Max,
	Mod,
	Fmod,
	Pow,
	Abs,
	Sqrt,
	Round,
	Ceil,
	Floor,
	Fract,
	Sign,
	Exp,
	Log,
	Log2,
	Log10,
	Sine,
	Cosine,
	Tangent,
	SinH,
	CosH,
	TanH,
	ArcSin,
	ArcCos,
	ArcTan,
	ArcTan2,
	Mix,
	Clamp,
	Select,
	DotProduct,
	CrossProduct,
	Length,
	VectorFromScalar,
	DecomposeVector,
	ComposeVector,
	DecomposeMatrix,
	ComposeMatrix,
	ComposeMatrixFromRows,
	ComposeMatrixFromColumns,
	MatrixVectorMultiplication,
	Transpose,
	Inverse,
	ConstantScalar,
	ConstantVector,
	ConstantMatrix,
	Resource,
	ImageSampler,
	FunctionCall,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
	Math,
	#[default]
	Internal,
	Misc,
}

/// A typed dataflow node: named input parameters, named output ports and the
/// type rules that keep them consistent when links change.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
	id: NodeId,
	kind: NodeKind,
	category: Category,
	display_name: String,
	unique_name: String,
	tag: String,
	order: u32,
	parameters: BTreeMap<String, Parameter>,
	outputs: BTreeMap<String, Port>,
	type_rules: Vec<TypeRule>,
	rule_type: RuleType,
}

impl Node {
	/// Builds a fresh node of the given kind with its default parameters,
	/// ports and type rules. Identifiers are assigned on model insertion.
	pub fn new(kind: NodeKind) -> Self {
		use NodeKind::*;
		use ParameterType::{Float, Float3, Int, Matrix4 as Mat4Type, ResourceId as ResourceIdType};

		let mut node = Self {
			id: NodeId::UNASSIGNED,
			kind,
			category: kind.category(),
			display_name: String::new(),
			unique_name: String::new(),
			tag: String::new(),
			order: 0,
			parameters: BTreeMap::new(),
			outputs: BTreeMap::new(),
			type_rules: Vec::new(),
			rule_type: RuleType::Default,
		};

		match kind {
			Begin => {
				node.display_name = "Inputs".to_string();
				node.type_rules = vec![TypeRule::new(RuleType::Default, &[], &[])];
			}
			End => {
				node.display_name = "Outputs".to_string();
				node.type_rules = vec![TypeRule::new(RuleType::Default, &[], &[])];
			}

			Addition | Subtraction | Multiplication | Division | Min | Max | Mod | Fmod | Mix => {
				node.type_rules = rules::operator_function_rules();
			}
			ArcTan2 => {
				node.type_rules = rules::two_parameter_function_rules();
			}
			Abs | Sqrt | Round | Ceil | Floor | Fract | Sign | Exp | Log | Log2 | Log10 | Sine | Cosine | Tangent | SinH | CosH | TanH | ArcSin | ArcCos | ArcTan => {
				node.type_rules = rules::function_rules();
			}
			Pow => {
				// Fixed scalar, no shape polymorphism.
				node.type_rules = vec![TypeRule::new(
					RuleType::Default,
					&[(field_names::A, Float), (field_names::B, Float)],
					&[(field_names::RESULT, Float)],
				)];
			}
			Clamp => {
				node.type_rules = vec![
					TypeRule::new(
						RuleType::Scalar,
						&[(field_names::A, Float), (field_names::MIN, Float), (field_names::MAX, Float)],
						&[(field_names::RESULT, Float)],
					),
					TypeRule::new(
						RuleType::Vector,
						&[(field_names::A, Float3), (field_names::MIN, Float3), (field_names::MAX, Float3)],
						&[(field_names::RESULT, Float3)],
					),
					TypeRule::new(
						RuleType::Matrix,
						&[(field_names::A, Mat4Type), (field_names::MIN, Mat4Type), (field_names::MAX, Mat4Type)],
						&[(field_names::RESULT, Mat4Type)],
					),
				];
			}
			Select => {
				// result = A < B ? C : D
				node.type_rules = vec![
					TypeRule::new(
						RuleType::Scalar,
						&[(field_names::A, Float), (field_names::B, Float), (field_names::C, Float), (field_names::D, Float)],
						&[(field_names::RESULT, Float)],
					),
					TypeRule::new(
						RuleType::Vector,
						&[(field_names::A, Float3), (field_names::B, Float3), (field_names::C, Float3), (field_names::D, Float3)],
						&[(field_names::RESULT, Float3)],
					),
					TypeRule::new(
						RuleType::Matrix,
						&[
							(field_names::A, Mat4Type),
							(field_names::B, Mat4Type),
							(field_names::C, Mat4Type),
							(field_names::D, Mat4Type),
						],
						&[(field_names::RESULT, Mat4Type)],
					),
				];
			}

			DotProduct => {
				node.type_rules = vec![TypeRule::new(
					RuleType::Default,
					&[(field_names::A, Float3), (field_names::B, Float3)],
					&[(field_names::RESULT, Float)],
				)];
			}
			CrossProduct => {
				node.type_rules = vec![TypeRule::new(
					RuleType::Default,
					&[(field_names::A, Float3), (field_names::B, Float3)],
					&[(field_names::VECTOR, Float3)],
				)];
			}
			Length => {
				node.type_rules = vec![TypeRule::new(RuleType::Default, &[(field_names::A, Float3)], &[(field_names::RESULT, Float)])];
			}
			VectorFromScalar => {
				node.type_rules = vec![TypeRule::new(RuleType::Default, &[(field_names::A, Float)], &[(field_names::RESULT, Float3)])];
			}
			MatrixVectorMultiplication => {
				node.type_rules = vec![TypeRule::new(
					RuleType::Default,
					&[(field_names::A, Mat4Type), (field_names::B, Float3)],
					&[(field_names::RESULT, Float3)],
				)];
			}
			Transpose | Inverse => {
				node.type_rules = vec![TypeRule::new(RuleType::Default, &[(field_names::A, Mat4Type)], &[(field_names::MATRIX, Mat4Type)])];
			}

			DecomposeVector => {
				node.type_rules = vec![TypeRule::new(
					RuleType::Default,
					&[(field_names::A, Float3)],
					&[(field_names::X, Float), (field_names::Y, Float), (field_names::Z, Float)],
				)];
			}
			ComposeVector => {
				node.type_rules = vec![TypeRule::new(
					RuleType::Default,
					&[(field_names::X, Float), (field_names::Y, Float), (field_names::Z, Float)],
					&[(field_names::RESULT, Float3)],
				)];
			}
			DecomposeMatrix => {
				let components: Vec<_> = field_names::MATRIX_COMPONENTS.iter().map(|&name| (name, Float)).collect();
				node.type_rules = vec![TypeRule::new(RuleType::Default, &[(field_names::MATRIX, Mat4Type)], &components)];
			}
			ComposeMatrix => {
				let components: Vec<_> = field_names::MATRIX_COMPONENTS.iter().map(|&name| (name, Float)).collect();
				node.type_rules = vec![TypeRule::new(RuleType::Default, &components, &[(field_names::MATRIX, Mat4Type)])];
			}
			ComposeMatrixFromRows => {
				node.type_rules = vec![TypeRule::new(
					RuleType::Default,
					&[
						(field_names::ROW0, Float3),
						(field_names::ROW1, Float3),
						(field_names::ROW2, Float3),
						(field_names::ROW3, Float3),
					],
					&[(field_names::MATRIX, Mat4Type)],
				)];
			}
			ComposeMatrixFromColumns => {
				node.type_rules = vec![TypeRule::new(
					RuleType::Default,
					&[
						(field_names::COL0, Float3),
						(field_names::COL1, Float3),
						(field_names::COL2, Float3),
						(field_names::COL3, Float3),
					],
					&[(field_names::MATRIX, Mat4Type)],
				)];
			}

			Transformation => {
				node.type_rules = vec![TypeRule::new(
					RuleType::Default,
					&[(field_names::POS, Float3), (field_names::TRANSFORMATION, Mat4Type)],
					&[(field_names::POS, Float3)],
				)];
			}
			BoxMinMax => {
				node.type_rules = vec![TypeRule::new(
					RuleType::Vector,
					&[(field_names::POS, Float3), (field_names::MIN, Float3), (field_names::MAX, Float3)],
					&[(field_names::SHAPE, Float)],
				)];
			}
			SignedDistanceToMesh | UnsignedDistanceToMesh => {
				node.type_rules = vec![TypeRule::new(
					RuleType::Default,
					&[(field_names::POS, Float3), (field_names::MESH, ResourceIdType)],
					&[(field_names::DISTANCE, Float)],
				)];
			}
			SignedDistanceToBeamLattice => {
				node.type_rules = vec![TypeRule::new(
					RuleType::Default,
					&[(field_names::POS, Float3), (field_names::BEAM_LATTICE, ResourceIdType)],
					&[(field_names::DISTANCE, Float)],
				)];
			}

			ConstantScalar => {
				node.type_rules = vec![TypeRule::new(RuleType::Default, &[(field_names::VALUE, Float)], &[(field_names::VALUE, Float)])];
			}
			ConstantVector => {
				node.type_rules = vec![TypeRule::new(
					RuleType::Default,
					&[(field_names::X, Float), (field_names::Y, Float), (field_names::Z, Float)],
					&[(field_names::VECTOR, Float3)],
				)];
			}
			ConstantMatrix => {
				let components: Vec<_> = field_names::MATRIX_COMPONENTS.iter().map(|&name| (name, Float)).collect();
				node.type_rules = vec![TypeRule::new(RuleType::Default, &components, &[(field_names::MATRIX, Mat4Type)])];
			}

			Resource => {
				node.type_rules = vec![TypeRule::new(
					RuleType::Default,
					&[(field_names::RESOURCE_ID, ResourceIdType)],
					&[(field_names::VALUE, ResourceIdType)],
				)];
			}
			ImageSampler => {
				node.type_rules = vec![TypeRule::new(
					RuleType::Default,
					&[
						(field_names::RESOURCE_ID, ResourceIdType),
						(field_names::UVW, Float3),
						(field_names::FILTER, Int),
						(field_names::TILE_STYLE_U, Int),
						(field_names::TILE_STYLE_V, Int),
						(field_names::TILE_STYLE_W, Int),
						(field_names::DIMENSIONS, Float3),
						(field_names::START, Int),
						(field_names::END, Int),
					],
					&[(field_names::COLOR, Float3), (field_names::ALPHA, Float)],
				)];
			}
			FunctionCall => {
				node.type_rules = vec![TypeRule::new(RuleType::Default, &[(field_names::FUNCTION_ID, ResourceIdType)], &[])];
			}
		}

		if let Some(rule) = node.type_rules.first().cloned() {
			node.apply_type_rule(&rule);
		}
		node.configure_literal_parameters();
		node
	}

	/// Parameters that hold literal values never require an input source.
	fn configure_literal_parameters(&mut self) {
		use NodeKind::*;
		match self.kind {
			ConstantScalar | ConstantVector | ConstantMatrix | Resource => {
				for parameter in self.parameters.values_mut() {
					parameter.set_input_source_required(false);
				}
			}
			Transformation => {
				if let Some(parameter) = self.parameters.get_mut(field_names::TRANSFORMATION) {
					parameter.set_input_source_required(false);
					parameter.set_value(Value::Matrix4(Mat4::IDENTITY));
				}
			}
			FunctionCall => {
				if let Some(parameter) = self.parameters.get_mut(field_names::FUNCTION_ID) {
					parameter.set_input_source_required(false);
				}
			}
			ImageSampler => {
				for name in [field_names::START, field_names::END, field_names::DIMENSIONS] {
					if let Some(parameter) = self.parameters.get_mut(name) {
						parameter.set_input_source_required(false);
						parameter.hide();
					}
				}
				for name in [field_names::FILTER, field_names::TILE_STYLE_U, field_names::TILE_STYLE_V, field_names::TILE_STYLE_W] {
					if let Some(parameter) = self.parameters.get_mut(name) {
						parameter.set_input_source_required(false);
					}
				}
			}
			_ => {}
		}
	}

	pub fn id(&self) -> NodeId {
		self.id
	}

	pub fn set_id(&mut self, id: NodeId) {
		self.id = id;
		self.refresh_child_ids();
	}

	pub fn kind(&self) -> NodeKind {
		self.kind
	}

	pub fn category(&self) -> Category {
		self.category
	}

	pub fn display_name(&self) -> &str {
		if self.display_name.is_empty() { self.kind.into() } else { &self.display_name }
	}

	pub fn set_display_name(&mut self, display_name: impl Into<String>) {
		self.display_name = display_name.into();
	}

	/// `<kind>_<id>`, stable within the owning model.
	pub fn unique_name(&self) -> &str {
		&self.unique_name
	}

	pub fn set_unique_name(&mut self, unique_name: impl Into<String>) {
		self.unique_name = unique_name.into();
		for (name, port) in &mut self.outputs {
			port.set_unique_name(format!("{}_{}", self.unique_name, name));
		}
	}

	/// Layout grouping only, no semantics.
	pub fn tag(&self) -> &str {
		&self.tag
	}

	pub fn set_tag(&mut self, tag: impl Into<String>) {
		self.tag = tag.into();
	}

	/// Position in the model's topological order, filled by
	/// [`crate::Model::update_graph_and_order_if_needed`].
	pub fn order(&self) -> u32 {
		self.order
	}

	pub fn set_order(&mut self, order: u32) {
		self.order = order;
	}

	pub fn parameters(&self) -> &BTreeMap<String, Parameter> {
		&self.parameters
	}

	pub fn parameters_mut(&mut self) -> &mut BTreeMap<String, Parameter> {
		&mut self.parameters
	}

	pub fn parameter(&self, name: &str) -> Option<&Parameter> {
		self.parameters.get(name)
	}

	pub fn parameter_mut(&mut self, name: &str) -> Option<&mut Parameter> {
		self.parameters.get_mut(name)
	}

	pub fn outputs(&self) -> &BTreeMap<String, Port> {
		&self.outputs
	}

	pub fn outputs_mut(&mut self) -> &mut BTreeMap<String, Port> {
		&mut self.outputs
	}

	pub fn find_output_port(&self, name: &str) -> Option<&Port> {
		self.outputs.get(name)
	}

	pub fn find_output_port_mut(&mut self, name: &str) -> Option<&mut Port> {
		self.outputs.get_mut(name)
	}

	/// Adds an output port; its id is assigned when the owning model
	/// registers the node's ports.
	pub fn add_output_port(&mut self, name: &str, port_type: ParameterType) -> &mut Port {
		let mut port = Port::new(name, port_type);
		port.set_parent_id(self.id);
		port.set_unique_name(format!("{}_{name}", self.unique_name));
		self.outputs.entry(name.to_string()).or_insert(port)
	}

	pub fn add_input(&mut self, name: &str, parameter: Parameter) -> &mut Parameter {
		let mut parameter = parameter;
		parameter.set_parent_id(self.id);
		self.parameters.entry(name.to_string()).or_insert(parameter)
	}

	/// Re-establishes parent ids and unique names on all ports and
	/// parameters, e.g. after cloning into another model.
	pub fn refresh_child_ids(&mut self) {
		let unique_name = self.unique_name.clone();
		for (name, port) in &mut self.outputs {
			port.set_parent_id(self.id);
			port.set_unique_name(format!("{unique_name}_{name}"));
		}
		for parameter in self.parameters.values_mut() {
			parameter.set_parent_id(self.id);
		}
	}

	pub fn type_rules(&self) -> &[TypeRule] {
		&self.type_rules
	}

	pub fn rule_type(&self) -> RuleType {
		self.rule_type
	}

	/// Rewrites parameter and port types to those the rule declares.
	/// Parameters keep their identity, source and flags; only the type and
	/// the literal value change. `Any` inputs are left untouched.
	pub fn apply_type_rule(&mut self, rule: &TypeRule) {
		for (name, &expected) in &rule.input {
			if expected == ParameterType::Any {
				continue;
			}
			match self.parameters.get_mut(name) {
				Some(parameter) if parameter.parameter_type() == expected => {}
				Some(parameter) => {
					let mut replacement = Parameter::typed(expected);
					replacement.set_id(parameter.id());
					replacement.set_parent_id(parameter.parent_id());
					replacement.set_input_source_required(parameter.is_input_source_required());
					replacement.set_is_argument(parameter.is_argument());
					replacement.set_modifiable(parameter.is_modifiable());
					if let Some(source) = parameter.source() {
						replacement.set_source(source.clone());
					}
					*parameter = replacement;
				}
				None => {
					let mut parameter = Parameter::typed(expected);
					parameter.set_parent_id(self.id);
					self.parameters.insert(name.clone(), parameter);
				}
			}
		}

		for (name, &port_type) in &rule.output {
			match self.outputs.get_mut(name) {
				Some(port) => port.set_port_type(port_type),
				None => {
					self.add_output_port(name, port_type);
				}
			}
		}

		self.rule_type = rule.rule_type;
		self.refresh_child_ids();
	}

	/// Selects and applies the rule matching the observed input types.
	/// Returns false when no rule matches; the node keeps its last applied
	/// rule and the validator reports the mismatch.
	pub fn resolve_type_rule(&mut self, observed: &TypeMap) -> bool {
		if self.type_rules.is_empty() {
			return true;
		}
		if self.type_rules.len() == 1 {
			let rule = self.type_rules[0].clone();
			self.apply_type_rule(&rule);
			return true;
		}
		match rules::select_rule(&self.type_rules, observed) {
			Some(rule) => {
				let rule = rule.clone();
				self.apply_type_rule(&rule);
				true
			}
			None => false,
		}
	}

	/// Begin, End, Transformation, the constants and Resource provide values
	/// rather than consuming them and skip input validation entirely.
	pub fn is_exempt_from_input_validation(&self) -> bool {
		use NodeKind::*;
		matches!(self.kind, Begin | End | Transformation | ConstantScalar | ConstantVector | ConstantMatrix | Resource)
	}

	pub fn is_marker(&self) -> bool {
		matches!(self.kind, NodeKind::Begin | NodeKind::End)
	}

	/// Mirrors a callee signature onto a `FunctionCall` node: one argument
	/// parameter per callee Begin port, one output port per callee End
	/// parameter. Existing links on still-present names are kept.
	pub fn update_call_signature(&mut self, arguments: &[(String, ParameterType)], outputs: &[(String, ParameterType)]) {
		let argument_names: Vec<_> = arguments.iter().map(|(name, _)| name.clone()).collect();
		self.parameters.retain(|name, parameter| !parameter.is_argument() || argument_names.contains(name));

		for (name, parameter_type) in arguments {
			match self.parameters.get_mut(name) {
				Some(parameter) if parameter.parameter_type() == *parameter_type => {}
				_ => {
					let mut parameter = Parameter::typed(*parameter_type);
					parameter.set_is_argument(true);
					parameter.set_parent_id(self.id);
					self.parameters.insert(name.clone(), parameter);
				}
			}
		}

		let output_names: Vec<_> = outputs.iter().map(|(name, _)| name.clone()).collect();
		self.outputs.retain(|name, _| output_names.contains(name));
		for (name, port_type) in outputs {
			match self.outputs.get_mut(name) {
				Some(port) => port.set_port_type(*port_type),
				None => {
					self.add_output_port(name, *port_type);
				}
			}
		}
		self.refresh_child_ids();
	}

	/// Arguments of a `FunctionCall`: every parameter mirroring the callee
	/// signature, i.e. everything but the function reference itself.
	pub fn call_arguments(&self) -> impl Iterator<Item = (&String, &Parameter)> {
		self.parameters.iter().filter(|(_, parameter)| parameter.is_argument())
	}

	/// Literal value of a `ConstantScalar`.
	pub fn scalar_value(&self) -> f32 {
		self.parameter(field_names::VALUE).and_then(|parameter| parameter.value().as_float()).unwrap_or(0.)
	}

	/// Literal value of a `ConstantVector`, composed from its components.
	pub fn vector_value(&self) -> Vec3 {
		let component = |name| self.parameter(name).and_then(|parameter: &Parameter| parameter.value().as_float()).unwrap_or(0.);
		Vec3::new(component(field_names::X), component(field_names::Y), component(field_names::Z))
	}

	/// Literal value of a `ConstantMatrix`, composed row-major.
	pub fn matrix_value(&self) -> Mat4 {
		let mut components = [0.; 16];
		for (index, name) in field_names::MATRIX_COMPONENTS.iter().enumerate() {
			components[index] = self.parameter(name).and_then(|parameter| parameter.value().as_float()).unwrap_or(0.);
		}
		// Row-major components, column-major storage.
		Mat4::from_cols_array(&components).transpose()
	}
}

impl NodeKind {
	pub fn category(self) -> Category {
		use NodeKind::*;
		match self {
			Begin | End | Transformation | BoxMinMax | SignedDistanceToMesh | UnsignedDistanceToMesh | SignedDistanceToBeamLattice => Category::Internal,
			ConstantScalar | ConstantVector | ConstantMatrix | Resource | ImageSampler | FunctionCall | DecomposeVector | ComposeVector | DecomposeMatrix
			| ComposeMatrix | ComposeMatrixFromRows | ComposeMatrixFromColumns => Category::Misc,
			_ => Category::Math,
		}
	}

	/// The kind constructible from its catalog name, used by the importer.
	pub fn from_name(name: &str) -> Option<Self> {
		name.parse().ok()
	}
}

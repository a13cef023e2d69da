//! Lowers a parsed expression into nodes and links of a model.

use rustc_hash::FxHashMap;

use crate::expression::ExpressionError;
use crate::expression::parser::{self, Expression};
use crate::field_names;
use crate::model::Model;
use crate::node::NodeKind;
use crate::types::{NodeId, ParameterType, PortId, Value};

/// Shape of a function argument or output in an expression signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgumentKind {
	Scalar,
	Vector,
}

impl ArgumentKind {
	pub fn parameter_type(self) -> ParameterType {
		match self {
			Self::Scalar => ParameterType::Float,
			Self::Vector => ParameterType::Float3,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionArgument {
	pub name: String,
	pub kind: ArgumentKind,
}

impl FunctionArgument {
	pub fn new(name: impl Into<String>, kind: ArgumentKind) -> Self {
		Self { name: name.into(), kind }
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionOutput {
	pub name: String,
	pub kind: ArgumentKind,
}

impl FunctionOutput {
	pub fn new(name: impl Into<String>, kind: ArgumentKind) -> Self {
		Self { name: name.into(), kind }
	}
}

struct LoweringContext<'a> {
	arguments: &'a [FunctionArgument],
	/// Lazily created DecomposeVector node per vector argument.
	decompositions: FxHashMap<String, NodeId>,
}

/// Builds the node graph for `expression` inside `model`, wiring free
/// variables from the given arguments and the result into a function output
/// of the given name.
///
/// On success the id of the node feeding the output is returned. On any
/// failure the model is left partially constructed; the caller discards it.
pub fn expression_to_graph(
	expression: &str,
	model: &mut Model,
	arguments: &[FunctionArgument],
	output: &FunctionOutput,
) -> Result<NodeId, ExpressionError> {
	let mut ast = parser::parse(expression)?;

	// Without explicit arguments, x/y/z shorthand becomes a single vector
	// argument `pos` and the remaining free variables become scalars.
	let mut synthesized = Vec::new();
	let arguments = if arguments.is_empty() {
		let variables = ast.free_variables();
		let uses_coordinates = variables.iter().any(|variable| matches!(variable.as_str(), "x" | "y" | "z"));
		if uses_coordinates {
			synthesized.push(FunctionArgument::new(field_names::POS, ArgumentKind::Vector));
			for component in ["x", "y", "z"] {
				ast.rename_variable(component, &format!("{}.{component}", field_names::POS));
			}
		}
		for variable in ast.free_variables() {
			if !variable.contains('.') && !synthesized.iter().any(|argument| argument.name == variable) {
				synthesized.push(FunctionArgument::new(variable, ArgumentKind::Scalar));
			}
		}
		&synthesized
	} else {
		arguments
	};

	// Every free variable must name an argument or a component of a vector
	// argument.
	for variable in ast.free_variables() {
		let resolved = match variable.split_once('.') {
			Some((base, _)) => arguments.iter().any(|argument| argument.name == base && argument.kind == ArgumentKind::Vector),
			None => arguments.iter().any(|argument| argument.name == variable),
		};
		if !resolved {
			return Err(ExpressionError::UndeclaredVariable(variable));
		}
	}

	model.create_bare_begin_end();
	for argument in arguments {
		model.add_argument(&argument.name, argument.kind.parameter_type());
		if let Some(begin) = model.get_node_mut(model.begin_id()) {
			if let Some(port) = begin.find_output_port_mut(&argument.name) {
				port.set_port_type(argument.kind.parameter_type());
			}
		}
	}

	let mut context = LoweringContext {
		arguments,
		decompositions: FxHashMap::default(),
	};
	let (result_node, result_port) = lower(&ast, model, &mut context)?;

	// Types settle in topological order before the output is wired, so the
	// final link is fully checked.
	model.update_types();

	let output_default = Value::default_for(output.kind.parameter_type());
	let output_parameter = model.add_function_output(&output.name, output_default).ok_or(ExpressionError::LinkFailed)?;
	if !model.add_link(result_port, output_parameter, false) {
		return Err(ExpressionError::OutputTypeMismatch);
	}
	model.update_graph_and_order_if_needed();
	Ok(result_node)
}

/// Recursively builds the subgraph for one expression node and returns the
/// node and port feeding its value.
fn lower(expression: &Expression, model: &mut Model, context: &mut LoweringContext) -> Result<(NodeId, PortId), ExpressionError> {
	match expression {
		Expression::Number(value) => {
			let constant = model.create_node(NodeKind::ConstantScalar);
			let node = model.get_node_mut(constant).ok_or(ExpressionError::LinkFailed)?;
			node.set_display_name(format!("{value}"));
			node.parameter_mut(field_names::VALUE)
				.ok_or(ExpressionError::LinkFailed)?
				.set_value(Value::Float(*value as f32));
			Ok((constant, output_port(model, constant, field_names::VALUE)?))
		}

		Expression::Variable(name) => match name.split_once('.') {
			None => {
				let begin = model.begin_id();
				Ok((begin, output_port(model, begin, name)?))
			}
			Some((base, component)) => {
				let decompose = decomposition_for(base, model, context)?;
				Ok((decompose, output_port(model, decompose, component)?))
			}
		},

		Expression::Binary { op, lhs, rhs } => {
			let (_, lhs_port) = lower(lhs, model, context)?;
			let (_, rhs_port) = lower(rhs, model, context)?;
			let operation = model.create_node(op.node_kind());
			link_input(model, lhs_port, operation, field_names::A)?;
			link_input(model, rhs_port, operation, field_names::B)?;
			Ok((operation, output_port(model, operation, field_names::RESULT)?))
		}

		Expression::Call { function, arguments } => {
			let mut ports = Vec::new();
			for argument in arguments {
				ports.push(lower(argument, model, context)?.1);
			}
			let call = model.create_node(function.node_kind());
			let input_names = [field_names::A, field_names::B];
			for (port, input_name) in ports.into_iter().zip(input_names) {
				link_input(model, port, call, input_name)?;
			}
			Ok((call, output_port(model, call, field_names::RESULT)?))
		}
	}
}

/// The DecomposeVector splitting a vector argument, created on first use and
/// shared by all component accesses of that argument.
fn decomposition_for(base: &str, model: &mut Model, context: &mut LoweringContext) -> Result<NodeId, ExpressionError> {
	if let Some(&existing) = context.decompositions.get(base) {
		return Ok(existing);
	}
	if !context.arguments.iter().any(|argument| argument.name == base && argument.kind == ArgumentKind::Vector) {
		return Err(ExpressionError::UndeclaredVariable(base.to_string()));
	}

	let begin = model.begin_id();
	let source = output_port(model, begin, base)?;
	let decompose = model.create_node(NodeKind::DecomposeVector);
	link_input(model, source, decompose, field_names::A)?;
	context.decompositions.insert(base.to_string(), decompose);
	Ok(decompose)
}

fn output_port(model: &Model, node: NodeId, name: &str) -> Result<PortId, ExpressionError> {
	model
		.get_node(node)
		.and_then(|node| node.find_output_port(name))
		.map(|port| port.id())
		.ok_or(ExpressionError::LinkFailed)
}

/// Links a produced value into a named input. The type check is deferred to
/// the type-rule resolution that runs once the whole tree exists.
fn link_input(model: &mut Model, port: PortId, node: NodeId, input: &str) -> Result<(), ExpressionError> {
	let parameter = model
		.get_node(node)
		.and_then(|node| node.parameter(input))
		.map(|parameter| parameter.id())
		.ok_or(ExpressionError::LinkFailed)?;
	if !model.add_link(port, parameter, true) {
		return Err(ExpressionError::LinkFailed);
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::types::ParameterType;

	fn kind_count(model: &Model, kind: NodeKind) -> usize {
		model.nodes().filter(|(_, node)| node.kind() == kind).count()
	}

	#[test]
	fn gyroid_expression_builds_the_expected_nodes() {
		let mut model = Model::new(2);
		let arguments = [FunctionArgument::new("pos", ArgumentKind::Vector)];
		let output = FunctionOutput::new("shape", ArgumentKind::Scalar);
		let result = expression_to_graph(
			"sin(pos.x)*cos(pos.y) + sin(pos.y)*cos(pos.z) + sin(pos.z)*cos(pos.x)",
			&mut model,
			&arguments,
			&output,
		);
		assert!(result.is_ok());

		assert!(kind_count(&model, NodeKind::Sine) >= 1);
		assert!(kind_count(&model, NodeKind::Cosine) >= 1);
		assert!(kind_count(&model, NodeKind::Addition) >= 1);
		assert!(kind_count(&model, NodeKind::Multiplication) >= 1);
		// One decomposition serves all component accesses of `pos`.
		assert_eq!(kind_count(&model, NodeKind::DecomposeVector), 1);

		let end = model.end_node().unwrap();
		let shape = end.parameter("shape").unwrap();
		assert_eq!(shape.parameter_type(), ParameterType::Float);
		assert!(shape.source().is_some());
	}

	#[test]
	fn undeclared_variable_fails_with_the_documented_message() {
		let mut model = Model::new(2);
		let arguments = [FunctionArgument::new("pos", ArgumentKind::Vector)];
		let output = FunctionOutput::new("shape", ArgumentKind::Scalar);
		let result = expression_to_graph("pos.x + w", &mut model, &arguments, &output);
		let error = result.unwrap_err();
		assert_eq!(error, ExpressionError::UndeclaredVariable("w".to_string()));
		assert!(
			error
				.to_string()
				.contains("Variable 'w' used in expression is not defined in function arguments")
		);
	}

	#[test]
	fn auto_detection_synthesizes_a_position_argument() {
		let mut model = Model::new(2);
		let output = FunctionOutput::new("shape", ArgumentKind::Scalar);
		let result = expression_to_graph("sqrt(x*x + y*y + z*z) - 5", &mut model, &[], &output);
		assert!(result.is_ok());

		let begin = model.begin_node().unwrap();
		assert_eq!(begin.find_output_port("pos").unwrap().port_type(), ParameterType::Float3);
		assert_eq!(kind_count(&model, NodeKind::DecomposeVector), 1);
	}

	#[test]
	fn scalar_arguments_connect_straight_from_begin() {
		let mut model = Model::new(2);
		let arguments = [FunctionArgument::new("radius", ArgumentKind::Scalar)];
		let output = FunctionOutput::new("shape", ArgumentKind::Scalar);
		let result = expression_to_graph("radius * 2", &mut model, &arguments, &output);
		assert!(result.is_ok());

		let begin = model.begin_node().unwrap();
		assert_eq!(begin.find_output_port("radius").unwrap().port_type(), ParameterType::Float);
		assert_eq!(kind_count(&model, NodeKind::Multiplication), 1);
		assert_eq!(kind_count(&model, NodeKind::ConstantScalar), 1);
	}

	#[test]
	fn two_argument_functions_wire_both_inputs() {
		let mut model = Model::new(2);
		let arguments = [FunctionArgument::new("pos", ArgumentKind::Vector)];
		let output = FunctionOutput::new("shape", ArgumentKind::Scalar);
		let result = expression_to_graph("atan2(pos.y, pos.x)", &mut model, &arguments, &output);
		let feeding = result.unwrap();

		let node = model.get_node(feeding).unwrap();
		assert_eq!(node.kind(), NodeKind::ArcTan2);
		assert!(node.parameter("A").unwrap().source().is_some());
		assert!(node.parameter("B").unwrap().source().is_some());
	}

	#[test]
	fn vector_valued_expression_feeds_a_vector_output() {
		let mut model = Model::new(2);
		let arguments = [FunctionArgument::new("pos", ArgumentKind::Vector)];
		let output = FunctionOutput::new("offset", ArgumentKind::Vector);
		let result = expression_to_graph("pos + pos", &mut model, &arguments, &output);
		assert!(result.is_ok());

		let end = model.end_node().unwrap();
		assert_eq!(end.parameter("offset").unwrap().parameter_type(), ParameterType::Float3);
	}

	#[test]
	fn scalar_result_into_vector_output_is_rejected() {
		let mut model = Model::new(2);
		let arguments = [FunctionArgument::new("pos", ArgumentKind::Vector)];
		let output = FunctionOutput::new("offset", ArgumentKind::Vector);
		let result = expression_to_graph("pos.x + 1", &mut model, &arguments, &output);
		assert_eq!(result.unwrap_err(), ExpressionError::OutputTypeMismatch);
	}
}

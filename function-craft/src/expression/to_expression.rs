//! Renders a function graph back into infix expression text.
//!
//! The reverse of [`super::lower`], useful for diffing authored graphs and
//! for round-trip checks. Only the expression-representable subset of the
//! catalog is supported; anything else reports an error.

use thiserror::Error;

use crate::field_names;
use crate::model::Model;
use crate::node::{Node, NodeKind};
use crate::types::NodeId;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum ToExpressionError {
	#[error("model has no End node")]
	MissingEnd,
	#[error("output '{0}' not found on the End node")]
	MissingOutput(String),
	#[error("parameter '{parameter}' of node '{node}' is not linked")]
	UnlinkedParameter { node: String, parameter: String },
	#[error("node kind {0} cannot be expressed as an expression")]
	UnsupportedNode(String),
	#[error("source port of '{0}' could not be resolved")]
	DanglingSource(String),
}

const PRECEDENCE_SUM: u8 = 1;
const PRECEDENCE_PRODUCT: u8 = 2;
const PRECEDENCE_ATOM: u8 = 3;

/// Renders the subgraph feeding the named End output as an expression.
pub fn graph_to_expression(model: &Model, output: &str) -> Result<String, ToExpressionError> {
	let end = model.end_node().ok_or(ToExpressionError::MissingEnd)?;
	let parameter = end.parameter(output).ok_or_else(|| ToExpressionError::MissingOutput(output.to_string()))?;
	let source = parameter.source().ok_or_else(|| ToExpressionError::UnlinkedParameter {
		node: end.display_name().to_string(),
		parameter: output.to_string(),
	})?;
	let (text, _) = render_port(model, source.node_id, &source.short_name)?;
	Ok(text)
}

fn render_port(model: &Model, node_id: NodeId, port_name: &str) -> Result<(String, u8), ToExpressionError> {
	let node = model.get_node(node_id).ok_or_else(|| ToExpressionError::DanglingSource(port_name.to_string()))?;

	match node.kind() {
		NodeKind::Begin => Ok((port_name.to_string(), PRECEDENCE_ATOM)),
		NodeKind::ConstantScalar => Ok((format_scalar(node.scalar_value()), PRECEDENCE_ATOM)),

		NodeKind::DecomposeVector => {
			let (base, _) = render_input(model, node, field_names::A)?;
			Ok((format!("{base}.{port_name}"), PRECEDENCE_ATOM))
		}

		NodeKind::Addition => render_binary(model, node, '+', PRECEDENCE_SUM, false),
		NodeKind::Subtraction => render_binary(model, node, '-', PRECEDENCE_SUM, true),
		NodeKind::Multiplication => render_binary(model, node, '*', PRECEDENCE_PRODUCT, false),
		NodeKind::Division => render_binary(model, node, '/', PRECEDENCE_PRODUCT, true),

		kind => {
			let Some(function) = function_name(kind) else {
				return Err(ToExpressionError::UnsupportedNode(kind.to_string()));
			};
			let (first, _) = render_input(model, node, field_names::A)?;
			if node.parameter(field_names::B).is_some() {
				let (second, _) = render_input(model, node, field_names::B)?;
				Ok((format!("{function}({first}, {second})"), PRECEDENCE_ATOM))
			} else {
				Ok((format!("{function}({first})"), PRECEDENCE_ATOM))
			}
		}
	}
}

fn render_binary(model: &Model, node: &Node, symbol: char, precedence: u8, right_sensitive: bool) -> Result<(String, u8), ToExpressionError> {
	let (lhs, lhs_precedence) = render_input(model, node, field_names::A)?;
	let (rhs, rhs_precedence) = render_input(model, node, field_names::B)?;

	let lhs = if lhs_precedence < precedence { format!("({lhs})") } else { lhs };
	// Subtraction and division also need parentheses around same-precedence
	// right operands: a - (b - c).
	let needs_parens = rhs_precedence < precedence || (right_sensitive && rhs_precedence == precedence);
	let rhs = if needs_parens { format!("({rhs})") } else { rhs };

	Ok((format!("{lhs} {symbol} {rhs}"), precedence))
}

fn render_input(model: &Model, node: &Node, input: &str) -> Result<(String, u8), ToExpressionError> {
	let parameter = node.parameter(input).ok_or_else(|| ToExpressionError::UnlinkedParameter {
		node: node.display_name().to_string(),
		parameter: input.to_string(),
	})?;
	match parameter.source() {
		Some(source) => render_port(model, source.node_id, &source.short_name),
		// An unlinked input renders as its literal value.
		None => Ok((format_scalar(parameter.value().as_float().unwrap_or(0.)), PRECEDENCE_ATOM)),
	}
}

fn function_name(kind: NodeKind) -> Option<&'static str> {
	Some(match kind {
		NodeKind::Sine => "sin",
		NodeKind::Cosine => "cos",
		NodeKind::Tangent => "tan",
		NodeKind::ArcSin => "asin",
		NodeKind::ArcCos => "acos",
		NodeKind::ArcTan => "atan",
		NodeKind::ArcTan2 => "atan2",
		NodeKind::SinH => "sinh",
		NodeKind::CosH => "cosh",
		NodeKind::TanH => "tanh",
		NodeKind::Exp => "exp",
		NodeKind::Log => "log",
		NodeKind::Log2 => "log2",
		NodeKind::Log10 => "log10",
		NodeKind::Sqrt => "sqrt",
		NodeKind::Abs => "abs",
		NodeKind::Round => "round",
		NodeKind::Ceil => "ceil",
		NodeKind::Floor => "floor",
		NodeKind::Fract => "fract",
		NodeKind::Sign => "sign",
		NodeKind::Min => "min",
		NodeKind::Max => "max",
		NodeKind::Mod => "mod",
		NodeKind::Fmod => "fmod",
		NodeKind::Pow => "pow",
		_ => return None,
	})
}

fn format_scalar(value: f32) -> String {
	if value == value.trunc() && value.abs() < 1e9 {
		format!("{value:.0}")
	} else {
		format!("{value}")
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::expression::lower::{ArgumentKind, FunctionArgument, FunctionOutput, expression_to_graph};

	fn round_trip(expression: &str) -> String {
		let mut model = Model::new(3);
		let arguments = [FunctionArgument::new("pos", ArgumentKind::Vector), FunctionArgument::new("r", ArgumentKind::Scalar)];
		let output = FunctionOutput::new("shape", ArgumentKind::Scalar);
		expression_to_graph(expression, &mut model, &arguments, &output).unwrap();
		graph_to_expression(&model, "shape").unwrap()
	}

	#[test]
	fn simple_sums_round_trip() {
		assert_eq!(round_trip("pos.x + r"), "pos.x + r");
	}

	#[test]
	fn precedence_parentheses_are_preserved() {
		assert_eq!(round_trip("(pos.x + r) * pos.y"), "(pos.x + r) * pos.y");
		assert_eq!(round_trip("pos.x - (r - 1)"), "pos.x - (r - 1)");
		assert_eq!(round_trip("pos.x * r + 1"), "pos.x * r + 1");
	}

	#[test]
	fn function_calls_round_trip() {
		assert_eq!(round_trip("sin(pos.x) * cos(pos.y)"), "sin(pos.x) * cos(pos.y)");
		assert_eq!(round_trip("atan2(pos.y, pos.x)"), "atan2(pos.y, pos.x)");
	}

	#[test]
	fn unsupported_nodes_are_reported() {
		let mut model = Model::new(3);
		model.create_begin_end();
		let sampler = model.create_node(crate::node::NodeKind::ImageSampler);
		let alpha = model.get_node(sampler).unwrap().find_output_port("alpha").unwrap().id();
		let shape = model.end_node().unwrap().parameter("shape").unwrap().id();
		assert!(model.add_link(alpha, shape, false));
		assert!(matches!(graph_to_expression(&model, "shape"), Err(ToExpressionError::UnsupportedNode(_))));
	}
}

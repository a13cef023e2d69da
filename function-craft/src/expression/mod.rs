//! Textual expressions as an authoring shortcut for function graphs.
//!
//! [`parser`] turns an arithmetic expression into an AST and reports its
//! free variables; [`lower`] builds the equivalent node graph wired from
//! named function arguments; [`to_expression`] renders a graph back into
//! infix text for diffing and round-trip checks.

pub mod lower;
pub mod parser;
pub mod to_expression;

use thiserror::Error;

pub use lower::{ArgumentKind, FunctionArgument, FunctionOutput, expression_to_graph};
pub use parser::{BinaryOp, BuiltinFunction, Expression, parse};
pub use to_expression::graph_to_expression;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum ExpressionError {
	#[error("expression is empty")]
	Empty,
	#[error("unexpected character '{0}' at position {1}")]
	UnexpectedCharacter(char, usize),
	#[error("unexpected end of expression")]
	UnexpectedEnd,
	#[error("expected '{expected}' at position {position}")]
	Expected { expected: char, position: usize },
	#[error("unknown function '{0}'")]
	UnknownFunction(String),
	#[error("function '{function}' expects {expected} argument(s), found {found}")]
	WrongArgumentCount { function: String, expected: usize, found: usize },
	#[error("invalid number literal '{0}'")]
	InvalidNumber(String),
	#[error("unexpected trailing input at position {0}")]
	TrailingInput(usize),
	#[error("invalid component access '{0}', only .x, .y and .z are supported")]
	InvalidComponent(String),
	#[error(
		"Variable '{0}' used in expression is not defined in function arguments. Please define it as a function input or use component access like 'pos.x' for vector inputs."
	)]
	UndeclaredVariable(String),
	#[error("could not wire node inputs while building the graph")]
	LinkFailed,
	#[error("the expression result does not match the declared output type")]
	OutputTypeMismatch,
}

//! Data-driven type dispatch for shape-polymorphic nodes.
//!
//! A node carries an ordered list of [`TypeRule`]s. Whenever links change,
//! the observed input types are matched against the rules and the winning
//! rule rewrites the declared parameter and port types. This replaces
//! runtime polymorphism over type parameters: `Addition` works on scalars,
//! vectors and matrices through three rules instead of three node kinds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::field_names;
use crate::types::ParameterType;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleType {
	#[default]
	Default,
	Scalar,
	Vector,
	Matrix,
}

pub type TypeMap = BTreeMap<String, ParameterType>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypeRule {
	pub rule_type: RuleType,
	pub input: TypeMap,
	pub output: TypeMap,
}

impl TypeRule {
	pub fn new(rule_type: RuleType, input: &[(&str, ParameterType)], output: &[(&str, ParameterType)]) -> Self {
		Self {
			rule_type,
			input: input.iter().map(|&(name, ty)| (name.to_string(), ty)).collect(),
			output: output.iter().map(|&(name, ty)| (name.to_string(), ty)).collect(),
		}
	}
}

/// Map equality with the `Any` wildcard matching any concrete type.
pub fn input_maps_match(rule: &TypeMap, observed: &TypeMap) -> bool {
	rule.len() == observed.len() && rule.iter().all(|(name, &expected)| observed.get(name).is_some_and(|&seen| expected.matches(seen)))
}

/// Selects the rule for the observed input types.
///
/// The first rule whose input map matches wins. When no rule has the observed
/// arity (nodes accepting scalar or vector shapes report `Any` for unlinked
/// inputs), the first rule with at least one concretely matching input is
/// taken instead. Rule order is the declaration order and is significant.
pub fn select_rule<'a>(rules: &'a [TypeRule], observed: &TypeMap) -> Option<&'a TypeRule> {
	rules.iter().find(|rule| {
		if rule.input.len() != observed.len() {
			return observed.iter().any(|(name, &seen)| rule.input.get(name).is_some_and(|&expected| expected == seen));
		}
		input_maps_match(&rule.input, observed)
	})
}

/// `A, B -> result` for scalars, vectors and matrices. Shared by the binary
/// arithmetic operators.
pub fn operator_function_rules() -> Vec<TypeRule> {
	use ParameterType::{Float, Float3, Matrix4};
	vec![
		TypeRule::new(RuleType::Scalar, &[(field_names::A, Float), (field_names::B, Float)], &[(field_names::RESULT, Float)]),
		TypeRule::new(RuleType::Vector, &[(field_names::A, Float3), (field_names::B, Float3)], &[(field_names::RESULT, Float3)]),
		TypeRule::new(RuleType::Matrix, &[(field_names::A, Matrix4), (field_names::B, Matrix4)], &[(field_names::RESULT, Matrix4)]),
	]
}

/// `A -> result` for scalars, vectors and matrices. Shared by the unary
/// component-wise functions.
pub fn function_rules() -> Vec<TypeRule> {
	use ParameterType::{Float, Float3, Matrix4};
	vec![
		TypeRule::new(RuleType::Scalar, &[(field_names::A, Float)], &[(field_names::RESULT, Float)]),
		TypeRule::new(RuleType::Vector, &[(field_names::A, Float3)], &[(field_names::RESULT, Float3)]),
		TypeRule::new(RuleType::Matrix, &[(field_names::A, Matrix4)], &[(field_names::RESULT, Matrix4)]),
	]
}

/// `A, B -> result` for the two-argument math functions.
pub fn two_parameter_function_rules() -> Vec<TypeRule> {
	operator_function_rules()
}

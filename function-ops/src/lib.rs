//! Synchronous operation surface for external tools.
//!
//! Every entry point takes the assembly plus plain-data arguments and
//! returns an [`OperationResult`]: a success flag, an optional JSON payload
//! and an optional human-readable error. Nothing here panics or throws
//! across the boundary; failed operations leave the assembly in its last
//! known-good state.

pub mod operations;
pub mod values;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

pub use operations::*;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
	pub success: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<Json>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl OperationResult {
	pub fn ok(data: Json) -> Self {
		Self {
			success: true,
			data: Some(data),
			error: None,
		}
	}

	pub fn ok_empty() -> Self {
		Self {
			success: true,
			data: None,
			error: None,
		}
	}

	pub fn fail(error: impl Into<String>) -> Self {
		Self {
			success: false,
			data: None,
			error: Some(error.into()),
		}
	}

	/// Failure with a payload giving the caller context to recover, e.g.
	/// the list of valid node types after a typo.
	pub fn fail_with(error: impl Into<String>, data: Json) -> Self {
		Self {
			success: false,
			data: Some(data),
			error: Some(error.into()),
		}
	}
}

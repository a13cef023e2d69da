//! JSON decoding of parameter values, driven by the parameter's type tag.

use function_craft::types::{ParameterType, Value};
use glam::{Mat4, Vec3};
use serde_json::Value as Json;

/// Decodes a JSON value into the variant the parameter expects.
///
/// Matrices are accepted as a flat 16-element row-major array or as four
/// nested rows of four.
pub fn decode_value(parameter_type: ParameterType, json: &Json) -> Result<Value, String> {
	match parameter_type {
		ParameterType::Float => json
			.as_f64()
			.map(|value| Value::Float(value as f32))
			.ok_or_else(|| format!("expected a number, found {json}")),
		ParameterType::Int => json.as_i64().map(|value| Value::Int(value as i32)).ok_or_else(|| format!("expected an integer, found {json}")),
		ParameterType::String => json
			.as_str()
			.map(|value| Value::String(value.to_string()))
			.ok_or_else(|| format!("expected a string, found {json}")),
		ParameterType::ResourceId => json
			.as_u64()
			.map(|value| Value::ResourceId(value as u32))
			.ok_or_else(|| format!("expected a resource id, found {json}")),
		ParameterType::Float3 => {
			let components = number_array(json)?;
			if components.len() != 3 {
				return Err(format!("expected 3 vector components, found {}", components.len()));
			}
			Ok(Value::Float3(Vec3::new(components[0], components[1], components[2])))
		}
		ParameterType::Matrix4 => {
			let rows = matrix_rows(json)?;
			// Row-major input, column-major storage.
			Ok(Value::Matrix4(Mat4::from_cols_array(&rows).transpose()))
		}
		ParameterType::Any => Err("parameter has no concrete type to decode into".to_string()),
	}
}

fn number_array(json: &Json) -> Result<Vec<f32>, String> {
	json.as_array()
		.ok_or_else(|| format!("expected an array, found {json}"))?
		.iter()
		.map(|entry| entry.as_f64().map(|value| value as f32).ok_or_else(|| format!("expected a number, found {entry}")))
		.collect()
}

fn matrix_rows(json: &Json) -> Result<[f32; 16], String> {
	let entries = json.as_array().ok_or_else(|| format!("expected a matrix array, found {json}"))?;

	let flat: Vec<f32> = if entries.len() == 4 && entries.iter().all(Json::is_array) {
		let mut flat = Vec::with_capacity(16);
		for row in entries {
			let row = number_array(row)?;
			if row.len() != 4 {
				return Err(format!("expected 4 columns per matrix row, found {}", row.len()));
			}
			flat.extend(row);
		}
		flat
	} else {
		number_array(json)?
	};

	if flat.len() != 16 {
		return Err(format!("expected 16 matrix components, found {}", flat.len()));
	}
	let mut rows = [0.; 16];
	rows.copy_from_slice(&flat);
	Ok(rows)
}

/// Projects a value into JSON for listings; matrices use the flat form.
pub fn encode_value(value: &Value) -> Json {
	match value {
		Value::Float(value) => serde_json::json!(value),
		Value::Float3(value) => serde_json::json!([value.x, value.y, value.z]),
		Value::Matrix4(value) => {
			let columns = value.to_cols_array();
			let rows: Vec<f32> = (0..4).flat_map(|row| (0..4).map(move |column| columns[column * 4 + row])).collect();
			serde_json::json!(rows)
		}
		Value::Int(value) => serde_json::json!(value),
		Value::String(value) => serde_json::json!(value),
		Value::ResourceId(value) => serde_json::json!(value),
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;

	#[test]
	fn scalars_vectors_and_ids_decode() {
		assert_eq!(decode_value(ParameterType::Float, &json!(2.5)), Ok(Value::Float(2.5)));
		assert_eq!(decode_value(ParameterType::Int, &json!(3)), Ok(Value::Int(3)));
		assert_eq!(decode_value(ParameterType::ResourceId, &json!(7)), Ok(Value::ResourceId(7)));
		assert_eq!(decode_value(ParameterType::Float3, &json!([1, 2, 3])), Ok(Value::Float3(Vec3::new(1., 2., 3.))));
		assert!(decode_value(ParameterType::Float3, &json!([1, 2])).is_err());
		assert!(decode_value(ParameterType::Float, &json!("nan")).is_err());
	}

	#[test]
	fn matrices_decode_flat_and_nested() {
		let flat = json!([1.0, 0.0, 0.0, 4.0, 0.0, 1.0, 0.0, 5.0, 0.0, 0.0, 1.0, 6.0, 0.0, 0.0, 0.0, 1.0]);
		let nested = json!([[1.0, 0.0, 0.0, 4.0], [0.0, 1.0, 0.0, 5.0], [0.0, 0.0, 1.0, 6.0], [0.0, 0.0, 0.0, 1.0]]);
		let from_flat = decode_value(ParameterType::Matrix4, &flat).unwrap();
		let from_nested = decode_value(ParameterType::Matrix4, &nested).unwrap();
		assert_eq!(from_flat, from_nested);
		// Export uses the flat form again.
		assert_eq!(encode_value(&from_flat), flat);
	}
}

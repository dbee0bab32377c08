//! Option trees: recursive merge and the viewport-dependent hover default.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Widths at or below this are treated as coarse-pointer (touch) viewports.
pub const COARSE_POINTER_WIDTH: f64 = 768.0;

/// Merge `patch` into `target`.
///
/// Objects merge key by key, recursively. Any other patch value, arrays and
/// `null` included, replaces what was there.
pub fn merge(target: &mut Value, patch: &Value) {
	match (target, patch) {
		(Value::Object(target), Value::Object(patch)) => {
			for (key, value) in patch {
				match target.get_mut(key) {
					Some(existing) => merge(existing, value),
					None => {
						target.insert(key.clone(), value.clone());
					}
				}
			}
		}
		(target, patch) => *target = patch.clone(),
	}
}

/// Accept an options value as the root of an option tree.
///
/// `null` is read as an empty object; anything else that is not an object is
/// handed back as the error.
pub fn normalize(options: Value) -> Result<Value, Value> {
	match options {
		Value::Null => Ok(Value::Object(Map::new())),
		Value::Object(_) => Ok(options),
		other => Err(other),
	}
}

/// Whether some key path set in `previous` is absent from `next`.
///
/// Paths are followed only while both sides are objects; a subtree replaced
/// by a scalar or array counts as a removal of its keys.
pub fn drops_keys(previous: &Value, next: &Value) -> bool {
	let Value::Object(previous) = previous else {
		return false;
	};
	match next {
		Value::Object(next) => previous.iter().any(|(key, old)| match next.get(key) {
			Some(new) => drops_keys(old, new),
			None => true,
		}),
		_ => !previous.is_empty(),
	}
}

/// Disables hover interaction on narrow viewports.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HoverPolicy {
	/// Largest width, in CSS pixels, still treated as a touch viewport.
	pub coarse_pointer_width: f64,
}

impl Default for HoverPolicy {
	fn default() -> Self {
		Self {
			coarse_pointer_width: COARSE_POINTER_WIDTH,
		}
	}
}

impl HoverPolicy {
	/// Whether `width` falls on the touch side of the threshold.
	pub fn is_coarse(&self, width: f64) -> bool {
		width <= self.coarse_pointer_width
	}

	/// Derive the options the engine should see at `width`.
	///
	/// On a coarse viewport `interaction.hover` is forced off. Otherwise the
	/// host's own setting is kept, defaulting to on. The result always carries
	/// an explicit `interaction.hover`, so an engine that merges option
	/// updates cannot keep a value from an earlier width.
	pub fn effective(&self, host: &Value, width: f64) -> Value {
		let mut options = host.clone();
		let host_hover = host
			.pointer("/interaction/hover")
			.and_then(Value::as_bool)
			.unwrap_or(true);
		let hover = host_hover && !self.is_coarse(width);
		merge(
			&mut options,
			&serde_json::json!({ "interaction": { "hover": hover } }),
		);
		options
	}
}

/// Effective options for `host` under an optional policy.
pub fn effective(policy: Option<&HoverPolicy>, host: &Value, width: f64) -> Value {
	match policy {
		Some(policy) => policy.effective(host, width),
		None => host.clone(),
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn merge_keeps_unrelated_keys() {
		let mut options = json!({
			"physics": {"solver": "forceAtlas2Based", "timestep": 0.35},
			"interaction": {"hover": true},
		});
		merge(&mut options, &json!({"physics": {"timestep": 0.5}}));
		assert_eq!(
			options,
			json!({
				"physics": {"solver": "forceAtlas2Based", "timestep": 0.5},
				"interaction": {"hover": true},
			})
		);
	}

	#[test]
	fn merge_replaces_arrays_scalars_and_nulls() {
		let mut options = json!({"a": [1, 2], "b": {"c": 1}, "d": 1});
		merge(&mut options, &json!({"a": [3], "b": null, "d": {"e": 2}}));
		assert_eq!(options, json!({"a": [3], "b": null, "d": {"e": 2}}));
	}

	#[test]
	fn normalize_accepts_objects_and_null() {
		assert_eq!(normalize(Value::Null), Ok(json!({})));
		assert_eq!(normalize(json!({"a": 1})), Ok(json!({"a": 1})));
		assert_eq!(normalize(json!([1])), Err(json!([1])));
	}

	#[test]
	fn hover_is_disabled_on_narrow_viewports() {
		let policy = HoverPolicy::default();
		let host = json!({"interaction": {"hover": true, "tooltipDelay": 200}});
		assert_eq!(
			policy.effective(&host, 600.0),
			json!({"interaction": {"hover": false, "tooltipDelay": 200}})
		);
		assert_eq!(policy.effective(&host, 1024.0), host);
		assert_eq!(
			policy.effective(&json!({}), 768.0),
			json!({"interaction": {"hover": false}})
		);
		assert_eq!(
			policy.effective(&json!({}), 769.0),
			json!({"interaction": {"hover": true}})
		);
	}

	#[test]
	fn silent_host_gets_hover_back_when_widening() {
		let policy = HoverPolicy::default();
		let narrow = policy.effective(&json!({}), 600.0);
		let mut engine_view = policy.effective(&json!({}), 1024.0);
		merge(&mut engine_view, &narrow);
		merge(&mut engine_view, &policy.effective(&json!({}), 1280.0));
		assert_eq!(engine_view, json!({"interaction": {"hover": true}}));
	}

	#[test]
	fn dropped_keys_are_detected_at_any_depth() {
		let previous = json!({"physics": {"solver": "barnesHut"}, "edges": {"smooth": true}});
		assert!(!drops_keys(&previous, &previous));
		assert!(!drops_keys(
			&previous,
			&json!({"physics": {"solver": "repulsion", "timestep": 1}, "edges": {"smooth": true}})
		));
		assert!(drops_keys(&previous, &json!({"physics": {"solver": "barnesHut"}})));
		assert!(drops_keys(&previous, &json!({"physics": {}, "edges": {"smooth": true}})));
		assert!(drops_keys(&previous, &json!({"physics": false, "edges": {"smooth": true}})));
		assert!(!drops_keys(&json!({"physics": false}), &json!({"physics": {"enabled": false}})));
		assert!(!drops_keys(&json!({}), &json!([])));
	}

	#[test]
	fn explicit_host_choice_survives_wide_viewports() {
		let policy = HoverPolicy::default();
		let host = json!({"interaction": {"hover": false}});
		assert_eq!(policy.effective(&host, 1920.0), host);
	}

	#[test]
	fn no_policy_passes_options_through() {
		let host = json!({"interaction": {"hover": true}});
		assert_eq!(effective(None, &host, 320.0), host);
	}
}

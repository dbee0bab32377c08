//! Identifier and item types shared by the collections, the engine and the
//! event payloads.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use super::error::DataError;

/// A node or edge identifier: an integer or a string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
	/// Integer id.
	Int(i64),
	/// String id, also used for generated ids.
	Str(String),
}

impl Id {
	/// Read an id out of a field value.
	///
	/// `null` means "no id yet" and yields `Ok(None)`. Integral floats are
	/// accepted as integers so `1.0` and `1` address the same item.
	pub fn from_value(field: &str, value: &Value) -> Result<Option<Self>, DataError> {
		match value {
			Value::Null => Ok(None),
			Value::String(s) => Ok(Some(Id::Str(s.clone()))),
			Value::Number(n) => {
				if let Some(i) = n.as_i64() {
					return Ok(Some(Id::Int(i)));
				}
				match n.as_f64() {
					Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
						Ok(Some(Id::Int(f as i64)))
					}
					_ => Err(invalid(field, value)),
				}
			}
			_ => Err(invalid(field, value)),
		}
	}

	/// Read an optional id field from an item. Absent and `null` both yield `None`.
	pub fn from_field(item: &Item, field: &str) -> Result<Option<Self>, DataError> {
		match item.get(field) {
			Some(value) => Self::from_value(field, value),
			None => Ok(None),
		}
	}

	/// The id as a JSON value.
	pub fn to_value(&self) -> Value {
		match self {
			Id::Int(i) => Value::from(*i),
			Id::Str(s) => Value::String(s.clone()),
		}
	}
}

fn invalid(field: &str, value: &Value) -> DataError {
	DataError::InvalidId {
		field: field.to_string(),
		value: value.clone(),
	}
}

impl fmt::Display for Id {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Id::Int(i) => write!(f, "{i}"),
			Id::Str(s) => write!(f, "{s:?}"),
		}
	}
}

impl From<i64> for Id {
	fn from(value: i64) -> Self {
		Id::Int(value)
	}
}

impl From<&str> for Id {
	fn from(value: &str) -> Self {
		Id::Str(value.to_string())
	}
}

impl From<String> for Id {
	fn from(value: String) -> Self {
		Id::Str(value)
	}
}

/// A node or edge as supplied by the host: named fields, id optional.
pub type Item = Map<String, Value>;

/// An item registered with a collection. The id field is always present in
/// `fields` and agrees with `id`.
#[derive(Clone, Debug, PartialEq)]
pub struct FullItem {
	id: Id,
	fields: Item,
}

impl FullItem {
	/// Pair `fields` with `id`, writing the id into `id_field`.
	pub fn new(id: Id, id_field: &str, mut fields: Item) -> Self {
		fields.insert(id_field.to_string(), id.to_value());
		Self { id, fields }
	}

	/// The resolved id.
	pub fn id(&self) -> &Id {
		&self.id
	}

	/// All fields, the id field included.
	pub fn fields(&self) -> &Item {
		&self.fields
	}

	/// One field.
	pub fn get(&self, field: &str) -> Option<&Value> {
		self.fields.get(field)
	}

	/// Take the fields, the id field included.
	pub fn into_fields(self) -> Item {
		self.fields
	}

	/// Edge source endpoint, if set and well-typed.
	pub fn from_id(&self) -> Option<Id> {
		Id::from_field(&self.fields, "from").ok().flatten()
	}

	/// Edge target endpoint, if set and well-typed.
	pub fn to_id(&self) -> Option<Id> {
		Id::from_field(&self.fields, "to").ok().flatten()
	}

	/// Check that `from`/`to`, when present, hold valid ids.
	pub(crate) fn validate_endpoints(&self) -> Result<(), DataError> {
		Id::from_field(&self.fields, "from")?;
		Id::from_field(&self.fields, "to")?;
		Ok(())
	}
}

impl Serialize for FullItem {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		self.fields.serialize(serializer)
	}
}

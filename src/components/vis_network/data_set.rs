//! Id-keyed, insertion-ordered registry of nodes or edges.
//!
//! Each mutation comes in two phases. `prepare_*` validates and computes the
//! result against the current contents without touching them; `commit_*`
//! applies a prepared change and returns the notification payload. The bridge
//! forwards the prepared items to the engine in between, so a change the
//! engine rejects never reaches the registry.

use indexmap::IndexMap;
use serde_json::Value;
use uuid::Uuid;

use super::error::DataError;
use super::events::{AddPayload, RemovePayload, UpdatePayload};
use super::types::{FullItem, Id, Item};

/// Default name of the id field.
pub const DEFAULT_ID_FIELD: &str = "id";

/// An ordered collection of items with unique ids.
#[derive(Clone, Debug)]
pub struct DataSet {
	id_field: String,
	items: IndexMap<Id, FullItem>,
}

/// Result of [`DataSet::prepare_update`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdatePlan {
	/// Items whose id was not registered yet.
	pub added: Vec<FullItem>,
	/// `(before, after)` for items that already existed.
	pub updated: Vec<(FullItem, FullItem)>,
}

impl UpdatePlan {
	/// True when the update touches nothing.
	pub fn is_empty(&self) -> bool {
		self.added.is_empty() && self.updated.is_empty()
	}

	/// Every item the engine must upsert: existing ones first, then new ones.
	pub fn upserts(&self) -> Vec<FullItem> {
		self.updated
			.iter()
			.map(|(_, after)| after.clone())
			.chain(self.added.iter().cloned())
			.collect()
	}
}

impl Default for DataSet {
	fn default() -> Self {
		Self::new(DEFAULT_ID_FIELD)
	}
}

impl DataSet {
	/// An empty collection keyed by `id_field`.
	pub fn new(id_field: impl Into<String>) -> Self {
		Self {
			id_field: id_field.into(),
			items: IndexMap::new(),
		}
	}

	/// Build a collection from initial items, assigning missing ids.
	pub fn with_items(id_field: impl Into<String>, items: Vec<Item>) -> Result<Self, DataError> {
		let mut set = Self::new(id_field);
		set.add(items)?;
		Ok(set)
	}

	/// Name of the id field.
	pub fn id_field(&self) -> &str {
		&self.id_field
	}

	/// Number of items.
	pub fn len(&self) -> usize {
		self.items.len()
	}

	/// Whether the collection holds no items.
	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	/// Item by id.
	pub fn get(&self, id: &Id) -> Option<&FullItem> {
		self.items.get(id)
	}

	/// Whether `id` is registered.
	pub fn contains(&self, id: &Id) -> bool {
		self.items.contains_key(id)
	}

	/// Ids in insertion order.
	pub fn ids(&self) -> impl Iterator<Item = &Id> {
		self.items.keys()
	}

	/// Items in insertion order.
	pub fn iter(&self) -> impl Iterator<Item = &FullItem> {
		self.items.values()
	}

	/// A copy of every item, in insertion order.
	pub fn snapshot(&self) -> Vec<FullItem> {
		self.items.values().cloned().collect()
	}

	/// Read the id of `item`, generating one if it is absent or `null`.
	fn resolve_id(&self, item: &Item) -> Result<Id, DataError> {
		Ok(Id::from_field(item, &self.id_field)?
			.unwrap_or_else(|| Id::Str(Uuid::new_v4().to_string())))
	}

	/// Validate `items` for insertion. Fails on any id that is already
	/// registered or repeated within the batch.
	pub fn prepare_add(&self, items: Vec<Item>) -> Result<Vec<FullItem>, DataError> {
		let mut staged: IndexMap<Id, FullItem> = IndexMap::with_capacity(items.len());
		for item in items {
			let id = self.resolve_id(&item)?;
			if self.items.contains_key(&id) || staged.contains_key(&id) {
				return Err(DataError::DuplicateId(id));
			}
			staged.insert(id.clone(), FullItem::new(id, &self.id_field, item));
		}
		Ok(staged.into_values().collect())
	}

	/// Store items validated by [`DataSet::prepare_add`].
	pub fn commit_add(&mut self, items: Vec<FullItem>) -> AddPayload {
		let ids = items.iter().map(|item| item.id().clone()).collect();
		for item in items {
			self.items.insert(item.id().clone(), item);
		}
		AddPayload { items: ids }
	}

	/// Compute an upsert. Fields of existing items are overwritten one by one;
	/// fields the update does not mention are kept.
	pub fn prepare_update(&self, items: Vec<Item>) -> Result<UpdatePlan, DataError> {
		// Keyed by id so repeated ids within one batch fold into one change.
		let mut before: IndexMap<Id, Option<FullItem>> = IndexMap::new();
		let mut after: IndexMap<Id, Item> = IndexMap::new();

		for item in items {
			let id = self.resolve_id(&item)?;
			let current = match after.get(&id) {
				Some(fields) => Some(fields.clone()),
				None => self.items.get(&id).map(|existing| existing.fields().clone()),
			};
			before
				.entry(id.clone())
				.or_insert_with(|| self.items.get(&id).cloned());
			let merged = match current {
				Some(mut fields) => {
					for (key, value) in item {
						fields.insert(key, value);
					}
					fields
				}
				None => item,
			};
			after.insert(id, merged);
		}

		let mut plan = UpdatePlan::default();
		for (id, fields) in after {
			let next = FullItem::new(id.clone(), &self.id_field, fields);
			match before.shift_remove(&id).flatten() {
				Some(prev) => plan.updated.push((prev, next)),
				None => plan.added.push(next),
			}
		}
		Ok(plan)
	}

	/// Apply a prepared update. Returns the `add` and `update` payloads, each
	/// `None` when it would be empty.
	pub fn commit_update(&mut self, plan: UpdatePlan) -> (Option<AddPayload>, Option<UpdatePayload>) {
		let mut update = UpdatePayload::default();
		for (prev, next) in plan.updated {
			update.items.push(next.id().clone());
			update.old_data.push(prev);
			self.items.insert(next.id().clone(), next);
		}
		let add = (!plan.added.is_empty()).then(|| self.commit_add(plan.added));
		let update = (!update.items.is_empty()).then_some(update);
		(add, update)
	}

	/// Items that a remove of `ids` would drop. Unknown ids are skipped.
	pub fn prepare_remove(&self, ids: &[Id]) -> Vec<FullItem> {
		let mut removed: IndexMap<&Id, FullItem> = IndexMap::new();
		for id in ids {
			if let Some(item) = self.items.get(id) {
				removed.entry(id).or_insert_with(|| item.clone());
			}
		}
		removed.into_values().collect()
	}

	/// Drop the items found by [`DataSet::prepare_remove`].
	pub fn commit_remove(&mut self, removed: Vec<FullItem>) -> RemovePayload {
		let mut payload = RemovePayload::default();
		for item in removed {
			if self.items.shift_remove(item.id()).is_some() {
				payload.items.push(item.id().clone());
				payload.old_data.push(item);
			}
		}
		payload
	}

	/// Validate and insert in one step; all or nothing.
	pub fn add(&mut self, items: Vec<Item>) -> Result<AddPayload, DataError> {
		let prepared = self.prepare_add(items)?;
		Ok(self.commit_add(prepared))
	}

	/// Upsert in one step.
	pub fn update(
		&mut self,
		items: Vec<Item>,
	) -> Result<(Option<AddPayload>, Option<UpdatePayload>), DataError> {
		let plan = self.prepare_update(items)?;
		Ok(self.commit_update(plan))
	}

	/// Remove in one step. Unknown ids are ignored.
	pub fn remove(&mut self, ids: &[Id]) -> RemovePayload {
		let removed = self.prepare_remove(ids);
		self.commit_remove(removed)
	}

	/// Serialize the collection as a JSON array of items.
	pub fn to_value(&self) -> Value {
		Value::Array(
			self.items
				.values()
				.map(|item| Value::Object(item.fields().clone()))
				.collect(),
		)
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn item(value: Value) -> Item {
		value.as_object().cloned().expect("test items are objects")
	}

	#[test]
	fn add_assigns_missing_ids() {
		let mut set = DataSet::default();
		let payload = set
			.add(vec![item(json!({"label": "a"})), item(json!({"id": null}))])
			.unwrap();
		assert_eq!(payload.items.len(), 2);
		for id in &payload.items {
			assert!(matches!(id, Id::Str(_)));
			let stored = set.get(id).unwrap();
			assert_eq!(stored.get("id"), Some(&id.to_value()));
		}
	}

	#[test]
	fn add_rejects_duplicates_without_partial_insert() {
		let mut set = DataSet::with_items("id", vec![item(json!({"id": 1}))]).unwrap();
		let err = set
			.add(vec![item(json!({"id": 2})), item(json!({"id": 1}))])
			.unwrap_err();
		assert_eq!(err, DataError::DuplicateId(Id::Int(1)));
		assert_eq!(set.len(), 1);

		let err = set
			.add(vec![item(json!({"id": 5})), item(json!({"id": 5}))])
			.unwrap_err();
		assert_eq!(err, DataError::DuplicateId(Id::Int(5)));
		assert_eq!(set.len(), 1);
	}

	#[test]
	fn update_merges_fields_and_inserts_unknown_ids() {
		let mut set =
			DataSet::with_items("id", vec![item(json!({"id": 1, "label": "a", "size": 3}))])
				.unwrap();
		let (add, update) = set
			.update(vec![
				item(json!({"id": 1, "label": "b"})),
				item(json!({"id": 2, "label": "c"})),
			])
			.unwrap();

		assert_eq!(add.unwrap().items, vec![Id::Int(2)]);
		let update = update.unwrap();
		assert_eq!(update.items, vec![Id::Int(1)]);
		assert_eq!(
			serde_json::to_value(&update.old_data).unwrap(),
			json!([{"id": 1, "label": "a", "size": 3}])
		);
		assert_eq!(
			Value::Object(set.get(&Id::Int(1)).unwrap().fields().clone()),
			json!({"id": 1, "label": "b", "size": 3})
		);
	}

	#[test]
	fn repeated_ids_in_one_update_fold_together() {
		let mut set = DataSet::with_items("id", vec![item(json!({"id": 1, "a": 0}))]).unwrap();
		let (_, update) = set
			.update(vec![
				item(json!({"id": 1, "a": 1})),
				item(json!({"id": 1, "b": 2})),
			])
			.unwrap();
		let update = update.unwrap();
		assert_eq!(update.items, vec![Id::Int(1)]);
		assert_eq!(
			serde_json::to_value(&update.old_data).unwrap(),
			json!([{"id": 1, "a": 0}])
		);
		assert_eq!(
			Value::Object(set.get(&Id::Int(1)).unwrap().fields().clone()),
			json!({"id": 1, "a": 1, "b": 2})
		);
	}

	#[test]
	fn remove_reports_prior_state_and_skips_unknown_ids() {
		let mut set = DataSet::with_items(
			"id",
			vec![item(json!({"id": 1})), item(json!({"id": 2, "label": "x"}))],
		)
		.unwrap();
		let payload = set.remove(&[Id::Int(2), Id::Int(9), Id::Int(2)]);
		assert_eq!(payload.items, vec![Id::Int(2)]);
		assert_eq!(
			serde_json::to_value(&payload.old_data).unwrap(),
			json!([{"id": 2, "label": "x"}])
		);
		assert_eq!(set.ids().cloned().collect::<Vec<_>>(), vec![Id::Int(1)]);
	}

	#[test]
	fn custom_id_field_is_respected() {
		let set = DataSet::with_items("key", vec![item(json!({"key": "n1"}))]).unwrap();
		assert!(set.contains(&Id::from("n1")));
		assert_eq!(set.to_value(), json!([{"key": "n1"}]));
	}

	#[test]
	fn prepared_changes_do_not_touch_the_registry() {
		let set = DataSet::with_items("id", vec![item(json!({"id": 1}))]).unwrap();
		let _ = set.prepare_add(vec![item(json!({"id": 2}))]).unwrap();
		let _ = set.prepare_update(vec![item(json!({"id": 1, "x": 1}))]).unwrap();
		let _ = set.prepare_remove(&[Id::Int(1)]);
		assert_eq!(set.to_value(), json!([{"id": 1}]));
	}

	#[test]
	fn invalid_id_type_is_rejected() {
		let set = DataSet::default();
		let err = set.prepare_add(vec![item(json!({"id": true}))]).unwrap_err();
		assert!(matches!(err, DataError::InvalidId { .. }));
	}
}

//! The bridge between host-owned graph data and one engine instance.
//!
//! A [`Bridge`] is either unmounted or active. Mounting snapshots the input,
//! builds the engine, registers a callback for every [`EventKey`] and
//! announces both collections. While active, host mutations are validated
//! against the collections, forwarded to the engine, and only then committed
//! and announced. Engine callbacks are parsed and emitted synchronously, in
//! the order the engine fires them. Unmounting deregisters every callback and
//! destroys the engine.
//!
//! Data only flows host to engine. Nothing the engine reports is written back
//! into the collections.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::Value;

use super::data_set::{DEFAULT_ID_FIELD, DataSet};
use super::engine::{Engine, EngineCallback, EngineInput, Viewport};
use super::error::{EngineError, MountError, MutationError};
use super::events::{Collection, CollectionEvent, EventKey, NetworkEvent, Notification, Topic};
use super::options::{self, HoverPolicy};
use super::types::{Id, Item};

/// Static configuration of a bridge.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BridgeConfig {
	/// Field holding a node's id. Defaults to `id`.
	pub node_id_field: String,
	/// Field holding an edge's id. Defaults to `id`.
	pub edge_id_field: String,
	/// `None` leaves `interaction.hover` entirely to the host.
	pub hover_policy: Option<HoverPolicy>,
}

impl Default for BridgeConfig {
	fn default() -> Self {
		Self {
			node_id_field: DEFAULT_ID_FIELD.to_string(),
			edge_id_field: DEFAULT_ID_FIELD.to_string(),
			hover_policy: Some(HoverPolicy::default()),
		}
	}
}

/// The host's initial data.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NetworkInput {
	/// Initial nodes.
	pub nodes: Vec<Item>,
	/// Initial edges.
	pub edges: Vec<Item>,
	/// Initial host options; `null` reads as `{}`.
	pub options: Value,
}

/// Whether a [`Bridge`] currently owns an engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
	/// No engine; data accessors return `None`.
	Unmounted,
	/// Mounted: collections are live and callbacks forward.
	Active,
}

/// Handle returned by [`Bridge::subscribe`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Rc<dyn Fn(&Notification)>;

struct Listener {
	id: SubscriptionId,
	topic: Option<Topic>,
	handler: Handler,
}

/// Fan-out of notifications to subscribers.
#[derive(Default)]
struct Emitter {
	listeners: RefCell<Vec<Listener>>,
	next_id: Cell<u64>,
}

impl Emitter {
	fn subscribe(&self, topic: Option<Topic>, handler: Handler) -> SubscriptionId {
		let id = SubscriptionId(self.next_id.get());
		self.next_id.set(id.0 + 1);
		self.listeners.borrow_mut().push(Listener { id, topic, handler });
		id
	}

	fn unsubscribe(&self, id: SubscriptionId) -> bool {
		let mut listeners = self.listeners.borrow_mut();
		let before = listeners.len();
		listeners.retain(|listener| listener.id != id);
		listeners.len() != before
	}

	fn emit(&self, notification: Notification) {
		let topic = notification.topic();
		// Collected first so handlers can (un)subscribe while being called.
		let handlers: Vec<Handler> = self
			.listeners
			.borrow()
			.iter()
			.filter(|listener| listener.topic.is_none_or(|t| t == topic))
			.map(|listener| Rc::clone(&listener.handler))
			.collect();
		for handler in handlers {
			handler(&notification);
		}
	}
}

/// The pending nodes-mounted and edges-mounted notifications of one mount.
#[must_use]
pub(crate) struct MountAnnouncement {
	emitter: Rc<Emitter>,
	alive: Rc<Cell<bool>>,
}

impl MountAnnouncement {
	/// Emit both notifications, skipping any that would follow a teardown.
	pub(crate) fn announce(self) {
		for collection in [Collection::Nodes, Collection::Edges] {
			if !self.alive.get() {
				return;
			}
			self.emitter
				.emit(Notification::Collection(collection, CollectionEvent::Mounted));
		}
	}
}

/// State that exists only while mounted.
struct Session {
	engine: Box<dyn Engine>,
	nodes: DataSet,
	edges: DataSet,
	host_options: Value,
	options: Value,
	viewport: Viewport,
	/// Cleared on unmount; every engine callback checks it first.
	alive: Rc<Cell<bool>>,
}

/// Owns one engine instance per mount and keeps it in sync with host data.
pub struct Bridge {
	config: BridgeConfig,
	emitter: Rc<Emitter>,
	session: Option<Session>,
}

impl Default for Bridge {
	fn default() -> Self {
		Self::new(BridgeConfig::default())
	}
}

impl Bridge {
	/// An unmounted bridge.
	pub fn new(config: BridgeConfig) -> Self {
		Self {
			config,
			emitter: Rc::new(Emitter::default()),
			session: None,
		}
	}

	/// Static configuration.
	pub fn config(&self) -> &BridgeConfig {
		&self.config
	}

	/// Current lifecycle state.
	pub fn lifecycle(&self) -> Lifecycle {
		if self.session.is_some() {
			Lifecycle::Active
		} else {
			Lifecycle::Unmounted
		}
	}

	/// Shorthand for `lifecycle() == Lifecycle::Active`.
	pub fn is_mounted(&self) -> bool {
		self.session.is_some()
	}

	/// Call `handler` for every notification on `topic`.
	pub fn subscribe(
		&self,
		topic: Topic,
		handler: impl Fn(&Notification) + 'static,
	) -> SubscriptionId {
		self.emitter.subscribe(Some(topic), Rc::new(handler))
	}

	/// Call `handler` for every notification.
	pub fn subscribe_all(&self, handler: impl Fn(&Notification) + 'static) -> SubscriptionId {
		self.emitter.subscribe(None, Rc::new(handler))
	}

	/// Remove a subscription. Returns `false` for an unknown id.
	pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
		self.emitter.unsubscribe(id)
	}

	/// Build the engine from `input` and go active.
	///
	/// Nothing is retained on failure: the bridge stays unmounted and the
	/// factory's engine, if one was built, is dropped.
	pub fn mount<F>(
		&mut self,
		input: NetworkInput,
		viewport: Viewport,
		factory: F,
	) -> Result<(), MountError>
	where
		F: FnOnce(EngineInput<'_>) -> Result<Box<dyn Engine>, EngineError>,
	{
		self.mount_unannounced(input, viewport, factory)?.announce();
		Ok(())
	}

	/// [`Bridge::mount`] without the two mounted notifications, which the
	/// caller sends once it no longer holds the bridge.
	pub(crate) fn mount_unannounced<F>(
		&mut self,
		input: NetworkInput,
		viewport: Viewport,
		factory: F,
	) -> Result<MountAnnouncement, MountError>
	where
		F: FnOnce(EngineInput<'_>) -> Result<Box<dyn Engine>, EngineError>,
	{
		if self.session.is_some() {
			return Err(MountError::AlreadyMounted);
		}

		let nodes = DataSet::with_items(self.config.node_id_field.clone(), input.nodes)?;
		let edges = DataSet::with_items(self.config.edge_id_field.clone(), input.edges)?;
		for edge in edges.iter() {
			edge.validate_endpoints()?;
		}
		let host_options = options::normalize(input.options).map_err(MountError::InvalidOptions)?;
		let options = self.effective_options(&host_options, viewport);

		let node_items = nodes.snapshot();
		let edge_items = edges.snapshot();
		let mut engine = factory(EngineInput {
			nodes: &node_items,
			edges: &edge_items,
			options: &options,
			viewport,
		})?;

		let alive = Rc::new(Cell::new(true));
		for key in EventKey::ALL {
			engine.on(key, self.engine_callback(key, &alive));
		}

		info!(
			"vis-network: mounted with {} nodes, {} edges",
			nodes.len(),
			edges.len()
		);
		self.session = Some(Session {
			engine,
			nodes,
			edges,
			host_options,
			options,
			viewport,
			alive: Rc::clone(&alive),
		});
		Ok(MountAnnouncement {
			emitter: Rc::clone(&self.emitter),
			alive,
		})
	}

	fn engine_callback(&self, key: EventKey, alive: &Rc<Cell<bool>>) -> EngineCallback {
		let emitter = Rc::clone(&self.emitter);
		let alive = Rc::clone(alive);
		Rc::new(move |raw: Value| {
			if !alive.get() {
				debug!("vis-network: dropping `{key}` fired after teardown");
				return;
			}
			emitter.emit(Notification::Network(NetworkEvent::from_raw(key, raw)));
		})
	}

	/// Deregister callbacks and destroy the engine. Returns `false` if the
	/// bridge was not mounted.
	pub fn unmount(&mut self) -> bool {
		let Some(mut session) = self.session.take() else {
			return false;
		};
		session.alive.set(false);
		for key in EventKey::ALL {
			session.engine.off(key);
		}
		session.engine.destroy();
		info!("vis-network: unmounted");
		true
	}

	fn session(&self) -> Result<&Session, MutationError> {
		self.session.as_ref().ok_or(MutationError::NotMounted)
	}

	fn session_mut(&mut self) -> Result<&mut Session, MutationError> {
		self.session.as_mut().ok_or(MutationError::NotMounted)
	}

	fn effective_options(&self, host: &Value, viewport: Viewport) -> Value {
		options::effective(self.config.hover_policy.as_ref(), host, viewport.width)
	}

	/// Add items to a collection. Returns their ids, generated ones included.
	pub fn add(&mut self, collection: Collection, items: Vec<Item>) -> Result<Vec<Id>, MutationError> {
		let session = self.session_mut()?;
		let prepared = session.data_set(collection).prepare_add(items)?;
		if collection == Collection::Edges {
			for edge in &prepared {
				edge.validate_endpoints()?;
			}
		}
		let forwarded = match collection {
			Collection::Nodes => session.engine.add_nodes(&prepared),
			Collection::Edges => session.engine.add_edges(&prepared),
		};
		if let Err(err) = forwarded {
			warn!("vis-network: {} add rejected: {err}", collection.as_str());
			return Err(err.into());
		}
		let payload = session.data_set_mut(collection).commit_add(prepared);
		let ids = payload.items.clone();
		self.emitter
			.emit(Notification::Collection(collection, CollectionEvent::Add(payload)));
		Ok(ids)
	}

	/// Upsert items into a collection. Returns the ids touched.
	pub fn update(
		&mut self,
		collection: Collection,
		items: Vec<Item>,
	) -> Result<Vec<Id>, MutationError> {
		let session = self.session_mut()?;
		let plan = session.data_set(collection).prepare_update(items)?;
		if plan.is_empty() {
			return Ok(Vec::new());
		}
		let upserts = plan.upserts();
		if collection == Collection::Edges {
			for edge in &upserts {
				edge.validate_endpoints()?;
			}
		}
		let forwarded = match collection {
			Collection::Nodes => session.engine.update_nodes(&upserts),
			Collection::Edges => session.engine.update_edges(&upserts),
		};
		if let Err(err) = forwarded {
			warn!("vis-network: {} update rejected: {err}", collection.as_str());
			return Err(err.into());
		}
		let (add, update) = session.data_set_mut(collection).commit_update(plan);
		let ids = upserts.iter().map(|item| item.id().clone()).collect();
		if let Some(update) = update {
			self.emitter
				.emit(Notification::Collection(collection, CollectionEvent::Update(update)));
		}
		if let Some(add) = add {
			self.emitter
				.emit(Notification::Collection(collection, CollectionEvent::Add(add)));
		}
		Ok(ids)
	}

	/// Remove items by id. Unknown ids are ignored. Returns the ids removed.
	///
	/// Removing a node leaves edges that reference it in place.
	pub fn remove(&mut self, collection: Collection, ids: &[Id]) -> Result<Vec<Id>, MutationError> {
		let session = self.session_mut()?;
		let removed = session.data_set(collection).prepare_remove(ids);
		if removed.is_empty() {
			return Ok(Vec::new());
		}
		let removed_ids: Vec<Id> = removed.iter().map(|item| item.id().clone()).collect();
		let forwarded = match collection {
			Collection::Nodes => session.engine.remove_nodes(&removed_ids),
			Collection::Edges => session.engine.remove_edges(&removed_ids),
		};
		if let Err(err) = forwarded {
			warn!("vis-network: {} remove rejected: {err}", collection.as_str());
			return Err(err.into());
		}
		let payload = session.data_set_mut(collection).commit_remove(removed);
		self.emitter
			.emit(Notification::Collection(collection, CollectionEvent::Remove(payload)));
		Ok(removed_ids)
	}

	/// Add nodes; see [`Bridge::add`].
	pub fn add_nodes(&mut self, items: Vec<Item>) -> Result<Vec<Id>, MutationError> {
		self.add(Collection::Nodes, items)
	}

	/// Upsert nodes.
	pub fn update_nodes(&mut self, items: Vec<Item>) -> Result<Vec<Id>, MutationError> {
		self.update(Collection::Nodes, items)
	}

	/// Remove nodes by id.
	pub fn remove_nodes(&mut self, ids: &[Id]) -> Result<Vec<Id>, MutationError> {
		self.remove(Collection::Nodes, ids)
	}

	/// Add edges.
	pub fn add_edges(&mut self, items: Vec<Item>) -> Result<Vec<Id>, MutationError> {
		self.add(Collection::Edges, items)
	}

	/// Upsert edges.
	pub fn update_edges(&mut self, items: Vec<Item>) -> Result<Vec<Id>, MutationError> {
		self.update(Collection::Edges, items)
	}

	/// Remove edges by id.
	pub fn remove_edges(&mut self, ids: &[Id]) -> Result<Vec<Id>, MutationError> {
		self.remove(Collection::Edges, ids)
	}

	/// Merge `patch` into the host options.
	pub fn set_options(&mut self, patch: Value) -> Result<(), MutationError> {
		let patch = options::normalize(patch).map_err(MutationError::InvalidOptions)?;
		let mut host = self.session()?.host_options.clone();
		options::merge(&mut host, &patch);
		self.apply_options(host)
	}

	/// Discard every previous host option and install `options` instead.
	pub fn replace_options(&mut self, options: Value) -> Result<(), MutationError> {
		let host = options::normalize(options).map_err(MutationError::InvalidOptions)?;
		self.session()?;
		self.apply_options(host)
	}

	fn apply_options(&mut self, host: Value) -> Result<(), MutationError> {
		let viewport = self.session()?.viewport;
		let options = self.effective_options(&host, viewport);
		let session = self.session_mut()?;
		if let Err(err) = session.engine.set_options(&options) {
			warn!("vis-network: options rejected: {err}");
			return Err(err.into());
		}
		session.host_options = host;
		session.options = options;
		Ok(())
	}

	/// Tell the bridge the viewport changed size.
	///
	/// The hover policy is re-evaluated first, so the engine already has the
	/// right options when it reports the resize.
	pub fn resize(&mut self, width: f64, height: f64) -> Result<(), MutationError> {
		let viewport = Viewport { width, height };
		let host = self.session()?.host_options.clone();
		let options = self.effective_options(&host, viewport);
		let session = self.session_mut()?;
		if options != session.options {
			session.engine.set_options(&options)?;
			debug!("vis-network: options re-evaluated for {width}x{height}");
			session.options = options;
		}
		session.engine.set_size(width, height)?;
		session.viewport = viewport;
		Ok(())
	}

	/// Live collection, `None` while unmounted.
	pub fn data_set(&self, collection: Collection) -> Option<&DataSet> {
		self.session
			.as_ref()
			.map(|session| session.data_set(collection))
	}

	/// Live node collection.
	pub fn nodes(&self) -> Option<&DataSet> {
		self.data_set(Collection::Nodes)
	}

	/// Live edge collection.
	pub fn edges(&self) -> Option<&DataSet> {
		self.data_set(Collection::Edges)
	}

	/// Effective options as last sent to the engine.
	pub fn options(&self) -> Option<&Value> {
		self.session.as_ref().map(|session| &session.options)
	}

	/// Options as supplied by the host, before the hover policy.
	pub fn host_options(&self) -> Option<&Value> {
		self.session.as_ref().map(|session| &session.host_options)
	}

	/// Last size passed to [`Bridge::resize`], or the mount viewport.
	pub fn viewport(&self) -> Option<Viewport> {
		self.session.as_ref().map(|session| session.viewport)
	}

	/// The raw engine instance, for capabilities the bridge does not cover.
	pub fn engine(&self) -> Option<&dyn Engine> {
		self.session.as_ref().map(|session| &*session.engine)
	}

	/// Mutable escape hatch to the engine. Changes made through it bypass the
	/// collections.
	pub fn engine_mut(&mut self) -> Option<&mut dyn Engine> {
		match self.session.as_mut() {
			Some(session) => Some(&mut *session.engine),
			None => None,
		}
	}

	/// Downcast the engine to a concrete type.
	pub fn engine_as<T: Any>(&self) -> Option<&T> {
		self.engine()?.as_any().downcast_ref()
	}

	/// Mutable downcast of the engine.
	pub fn engine_as_mut<T: Any>(&mut self) -> Option<&mut T> {
		self.engine_mut()?.as_any_mut().downcast_mut()
	}
}

impl Session {
	fn data_set(&self, collection: Collection) -> &DataSet {
		match collection {
			Collection::Nodes => &self.nodes,
			Collection::Edges => &self.edges,
		}
	}

	fn data_set_mut(&mut self, collection: Collection) -> &mut DataSet {
		match collection {
			Collection::Nodes => &mut self.nodes,
			Collection::Edges => &mut self.edges,
		}
	}
}

impl Drop for Bridge {
	fn drop(&mut self) {
		self.unmount();
	}
}

// Shared test utilities: a recording engine and notification capture.
#![allow(dead_code)]

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::{Value, json};
use vis_network_bridge::components::vis_network::options::merge;
use vis_network_bridge::components::vis_network::{
	Bridge, Engine, EngineCallback, EngineError, EngineInput, EventKey, FullItem, Id, Item,
	NetworkInput, Notification, Topic, Viewport,
};

/// Everything the mock engines of one test report back.
#[derive(Default)]
pub struct Harness {
	pub created: Cell<usize>,
	pub destroyed: Cell<usize>,
	pub live: Cell<usize>,
	pub max_live: Cell<usize>,
	/// Every call made on an engine, in order, as `"method:args"`.
	pub calls: RefCell<Vec<String>>,
	pub last_options: RefCell<Value>,
	/// Merge option updates into `last_options` the way `vis.Network`
	/// does, instead of replacing them.
	pub merge_options: Cell<bool>,
	/// Currently registered listeners.
	listeners: RefCell<HashMap<EventKey, EngineCallback>>,
	/// Every listener ever registered, kept past `off`.
	retained: RefCell<Vec<(EventKey, EngineCallback)>>,
	/// Fail the next construction with this message.
	pub fail_construction: RefCell<Option<String>>,
	/// Reject the next call to this method.
	pub reject_next: RefCell<Option<&'static str>>,
}

impl Harness {
	pub fn new() -> Rc<Self> {
		Rc::new(Self::default())
	}

	/// Factory for [`Bridge::mount`].
	pub fn factory(
		self: &Rc<Self>,
	) -> impl FnOnce(EngineInput<'_>) -> Result<Box<dyn Engine>, EngineError> + use<> {
		let harness = Rc::clone(self);
		move |input: EngineInput<'_>| {
			if let Some(reason) = harness.fail_construction.borrow_mut().take() {
				return Err(EngineError::Construction(reason));
			}
			harness.created.set(harness.created.get() + 1);
			harness.live.set(harness.live.get() + 1);
			harness.max_live.set(harness.max_live.get().max(harness.live.get()));
			*harness.last_options.borrow_mut() = input.options.clone();
			harness.record(format!(
				"new:{}n,{}e,{}x{}",
				input.nodes.len(),
				input.edges.len(),
				input.viewport.width,
				input.viewport.height
			));
			Ok(Box::new(MockEngine {
				harness,
				size: (input.viewport.width, input.viewport.height),
				destroyed: false,
			}) as Box<dyn Engine>)
		}
	}

	fn record(&self, call: String) {
		self.calls.borrow_mut().push(call);
	}

	pub fn calls(&self) -> Vec<String> {
		self.calls.borrow().clone()
	}

	pub fn listener_count(&self) -> usize {
		self.listeners.borrow().len()
	}

	/// Fire `key` as the live engine would.
	pub fn fire(&self, key: EventKey, raw: Value) {
		let callback = self.listeners.borrow().get(&key).cloned();
		if let Some(callback) = callback {
			callback(raw);
		}
	}

	/// Invoke every listener ever registered for `key`, including ones
	/// already removed.
	pub fn fire_stale(&self, key: EventKey, raw: Value) {
		let callbacks: Vec<EngineCallback> = self
			.retained
			.borrow()
			.iter()
			.filter(|(k, _)| *k == key)
			.map(|(_, cb)| Rc::clone(cb))
			.collect();
		for callback in callbacks {
			callback(raw.clone());
		}
	}

	fn check(&self, method: &'static str) -> Result<(), EngineError> {
		let mut reject = self.reject_next.borrow_mut();
		if *reject == Some(method) {
			*reject = None;
			return Err(EngineError::Rejected {
				operation: method,
				reason: "refused by test".to_string(),
			});
		}
		Ok(())
	}
}

pub struct MockEngine {
	harness: Rc<Harness>,
	size: (f64, f64),
	destroyed: bool,
}

fn ids(items: &[FullItem]) -> String {
	items
		.iter()
		.map(|item| item.id().to_string())
		.collect::<Vec<_>>()
		.join(",")
}

impl MockEngine {
	fn mutate(&self, method: &'static str, args: String) -> Result<(), EngineError> {
		if self.destroyed {
			return Err(EngineError::Destroyed);
		}
		self.harness.check(method)?;
		self.harness.record(format!("{method}:{args}"));
		Ok(())
	}
}

impl Engine for MockEngine {
	fn add_nodes(&mut self, nodes: &[FullItem]) -> Result<(), EngineError> {
		self.mutate("add_nodes", ids(nodes))
	}

	fn update_nodes(&mut self, nodes: &[FullItem]) -> Result<(), EngineError> {
		self.mutate("update_nodes", ids(nodes))
	}

	fn remove_nodes(&mut self, ids: &[Id]) -> Result<(), EngineError> {
		let args = ids.iter().map(Id::to_string).collect::<Vec<_>>().join(",");
		self.mutate("remove_nodes", args)
	}

	fn add_edges(&mut self, edges: &[FullItem]) -> Result<(), EngineError> {
		self.mutate("add_edges", ids(edges))
	}

	fn update_edges(&mut self, edges: &[FullItem]) -> Result<(), EngineError> {
		self.mutate("update_edges", ids(edges))
	}

	fn remove_edges(&mut self, ids: &[Id]) -> Result<(), EngineError> {
		let args = ids.iter().map(Id::to_string).collect::<Vec<_>>().join(",");
		self.mutate("remove_edges", args)
	}

	fn set_options(&mut self, options: &Value) -> Result<(), EngineError> {
		self.mutate("set_options", options.to_string())?;
		let mut last = self.harness.last_options.borrow_mut();
		if self.harness.merge_options.get() {
			merge(&mut last, options);
		} else {
			*last = options.clone();
		}
		Ok(())
	}

	fn set_size(&mut self, width: f64, height: f64) -> Result<(), EngineError> {
		self.mutate("set_size", format!("{width}x{height}"))?;
		let (old_width, old_height) = std::mem::replace(&mut self.size, (width, height));
		self.harness.fire(
			EventKey::Resize,
			json!({"width": width, "height": height, "oldWidth": old_width, "oldHeight": old_height}),
		);
		Ok(())
	}

	fn on(&mut self, key: EventKey, callback: EngineCallback) {
		self.harness
			.retained
			.borrow_mut()
			.push((key, Rc::clone(&callback)));
		self.harness.listeners.borrow_mut().insert(key, callback);
	}

	fn off(&mut self, key: EventKey) {
		self.harness.listeners.borrow_mut().remove(&key);
	}

	fn destroy(&mut self) {
		self.harness.record("destroy".to_string());
		self.harness.destroyed.set(self.harness.destroyed.get() + 1);
		self.harness.live.set(self.harness.live.get() - 1);
		self.destroyed = true;
	}

	fn as_any(&self) -> &dyn Any {
		self
	}

	fn as_any_mut(&mut self) -> &mut dyn Any {
		self
	}
}

/// Collects every notification a bridge emits.
pub fn record(bridge: &Bridge) -> Rc<RefCell<Vec<Notification>>> {
	let log: Rc<RefCell<Vec<Notification>>> = Rc::default();
	let sink = Rc::clone(&log);
	bridge.subscribe_all(move |notification| sink.borrow_mut().push(notification.clone()));
	log
}

pub fn topics(log: &Rc<RefCell<Vec<Notification>>>) -> Vec<String> {
	log.borrow()
		.iter()
		.map(|notification| notification.topic().to_string())
		.collect()
}

pub fn item(value: Value) -> Item {
	value.as_object().cloned().expect("test items are objects")
}

pub fn items(values: Value) -> Vec<Item> {
	values
		.as_array()
		.expect("test item lists are arrays")
		.iter()
		.map(|value| item(value.clone()))
		.collect()
}

/// Nodes 1..=3, edges 1→2 (id 10) and 2→3 (id 11).
pub fn sample_input(options: Value) -> NetworkInput {
	NetworkInput {
		nodes: items(json!([
			{"id": 1, "label": "one"},
			{"id": 2, "label": "two"},
			{"id": 3, "label": "three"},
		])),
		edges: items(json!([
			{"id": 10, "from": 1, "to": 2},
			{"id": 11, "from": 2, "to": 3},
		])),
		options,
	}
}

pub fn wide() -> Viewport {
	Viewport {
		width: 1024.0,
		height: 768.0,
	}
}

pub fn topic_of(key: EventKey) -> Topic {
	Topic::Network(key)
}

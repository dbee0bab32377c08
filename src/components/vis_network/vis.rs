//! Binding to the JavaScript `vis.Network` loaded on the page.
//!
//! Expects the standalone vis-network build to have defined a global `vis`.
//! Items and options cross the boundary as JSON text.

use std::any::Any;
use std::collections::HashMap;

use js_sys::{JSON, Object, Reflect};
use log::warn;
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;
use web_sys::HtmlElement;

use super::engine::{Engine, EngineCallback, EngineInput};
use super::error::EngineError;
use super::events::EventKey;
use super::options;
use super::types::{FullItem, Id};

#[wasm_bindgen]
extern "C" {
	#[wasm_bindgen(js_namespace = vis, js_name = DataSet)]
	type JsDataSet;

	#[wasm_bindgen(constructor, js_namespace = vis, js_class = "DataSet")]
	fn new(items: &JsValue) -> JsDataSet;

	#[wasm_bindgen(method, catch)]
	fn add(this: &JsDataSet, items: &JsValue) -> Result<JsValue, JsValue>;

	#[wasm_bindgen(method, catch)]
	fn update(this: &JsDataSet, items: &JsValue) -> Result<JsValue, JsValue>;

	#[wasm_bindgen(method, catch)]
	fn remove(this: &JsDataSet, ids: &JsValue) -> Result<JsValue, JsValue>;

	#[wasm_bindgen(js_namespace = vis, js_name = Network)]
	type JsNetwork;

	#[wasm_bindgen(constructor, catch, js_namespace = vis, js_class = "Network")]
	fn new(container: &HtmlElement, data: &JsValue, options: &JsValue) -> Result<JsNetwork, JsValue>;

	#[wasm_bindgen(method)]
	fn on(this: &JsNetwork, event: &str, callback: &js_sys::Function);

	#[wasm_bindgen(method)]
	fn off(this: &JsNetwork, event: &str, callback: &js_sys::Function);

	#[wasm_bindgen(method, catch, js_name = setOptions)]
	fn set_options(this: &JsNetwork, options: &JsValue) -> Result<(), JsValue>;

	#[wasm_bindgen(method, catch, js_name = setSize)]
	fn set_size(this: &JsNetwork, width: &str, height: &str) -> Result<(), JsValue>;

	#[wasm_bindgen(method)]
	fn destroy(this: &JsNetwork);
}

fn describe(err: &JsValue) -> String {
	err.as_string()
		.or_else(|| {
			Reflect::get(err, &JsValue::from_str("message"))
				.ok()
				.and_then(|message| message.as_string())
		})
		.unwrap_or_else(|| format!("{err:?}"))
}

fn to_js(value: &impl Serialize) -> Result<JsValue, String> {
	let text = serde_json::to_string(value).map_err(|err| err.to_string())?;
	JSON::parse(&text).map_err(|err| describe(&err))
}

/// Convert a raw callback argument to JSON.
///
/// The `event` field holds a Hammer.js input event, which is cyclic; only its
/// `type` and `center` are kept.
fn from_js(raw: &JsValue) -> Value {
	let payload = if raw.is_object() {
		let copy = Object::assign(&Object::new(), raw.unchecked_ref());
		if let Ok(event) = Reflect::get(raw, &JsValue::from_str("event")) {
			if event.is_object() {
				let slim = Object::new();
				for field in ["type", "center"] {
					if let Ok(value) = Reflect::get(&event, &JsValue::from_str(field)) {
						let _ = Reflect::set(&slim, &JsValue::from_str(field), &value);
					}
				}
				let _ = Reflect::set(&copy, &JsValue::from_str("event"), &slim);
			}
		}
		copy.into()
	} else {
		raw.clone()
	};

	match JSON::stringify(&payload) {
		Ok(text) => {
			let text: String = text.into();
			serde_json::from_str(&text).unwrap_or(Value::Null)
		}
		Err(err) => {
			warn!("vis-network: unserializable callback payload: {}", describe(&err));
			Value::Null
		}
	}
}

/// [`Engine`] backed by a `vis.Network` rendered into a container element.
///
/// `setOptions` merges into the live configuration, so an update that drops
/// keys rebuilds the network over the same data sets instead.
pub struct VisEngine {
	container: HtmlElement,
	network: JsNetwork,
	data: Object,
	nodes: JsDataSet,
	edges: JsDataSet,
	options: Value,
	listeners: HashMap<EventKey, Closure<dyn FnMut(JsValue)>>,
	destroyed: bool,
}

impl VisEngine {
	/// Build a network in `container` from the initial data and options.
	pub fn new(container: &HtmlElement, input: EngineInput<'_>) -> Result<Self, EngineError> {
		let nodes = JsDataSet::new(&to_js(&input.nodes).map_err(EngineError::Construction)?);
		let edges = JsDataSet::new(&to_js(&input.edges).map_err(EngineError::Construction)?);
		let options = to_js(input.options).map_err(EngineError::Construction)?;

		let data = Object::new();
		let _ = Reflect::set(&data, &JsValue::from_str("nodes"), &nodes);
		let _ = Reflect::set(&data, &JsValue::from_str("edges"), &edges);

		let network = JsNetwork::new(container, &data, &options)
			.map_err(|err| EngineError::Construction(describe(&err)))?;
		Ok(Self {
			container: container.clone(),
			network,
			data,
			nodes,
			edges,
			options: input.options.clone(),
			listeners: HashMap::new(),
			destroyed: false,
		})
	}

	/// Swap in a fresh network configured with exactly `options`, carrying
	/// the registered listeners over.
	fn rebuild(&mut self, options: &JsValue) -> Result<(), EngineError> {
		let network = JsNetwork::new(&self.container, &self.data, options).map_err(|err| {
			EngineError::Rejected {
				operation: "set_options",
				reason: describe(&err),
			}
		})?;
		for (key, listener) in &self.listeners {
			self.network
				.off(key.as_str(), listener.as_ref().unchecked_ref());
			network.on(key.as_str(), listener.as_ref().unchecked_ref());
		}
		let old = std::mem::replace(&mut self.network, network);
		old.destroy();
		Ok(())
	}

	/// Factory rendering into `container`.
	pub fn factory(
		container: HtmlElement,
	) -> impl FnOnce(EngineInput<'_>) -> Result<Box<dyn Engine>, EngineError> {
		move |input: EngineInput<'_>| {
			Ok(Box::new(Self::new(&container, input)?) as Box<dyn Engine>)
		}
	}

	fn ensure_alive(&self) -> Result<(), EngineError> {
		if self.destroyed {
			Err(EngineError::Destroyed)
		} else {
			Ok(())
		}
	}

	fn call(
		&self,
		operation: &'static str,
		f: impl FnOnce() -> Result<JsValue, JsValue>,
	) -> Result<(), EngineError> {
		self.ensure_alive()?;
		f().map(drop).map_err(|err| EngineError::Rejected {
			operation,
			reason: describe(&err),
		})
	}

	fn rejected(operation: &'static str) -> impl FnOnce(String) -> EngineError {
		move |reason| EngineError::Rejected { operation, reason }
	}
}

impl Engine for VisEngine {
	fn add_nodes(&mut self, nodes: &[FullItem]) -> Result<(), EngineError> {
		let items = to_js(&nodes).map_err(Self::rejected("add_nodes"))?;
		self.call("add_nodes", || self.nodes.add(&items))
	}

	fn update_nodes(&mut self, nodes: &[FullItem]) -> Result<(), EngineError> {
		let items = to_js(&nodes).map_err(Self::rejected("update_nodes"))?;
		self.call("update_nodes", || self.nodes.update(&items))
	}

	fn remove_nodes(&mut self, ids: &[Id]) -> Result<(), EngineError> {
		let ids = to_js(&ids).map_err(Self::rejected("remove_nodes"))?;
		self.call("remove_nodes", || self.nodes.remove(&ids))
	}

	fn add_edges(&mut self, edges: &[FullItem]) -> Result<(), EngineError> {
		let items = to_js(&edges).map_err(Self::rejected("add_edges"))?;
		self.call("add_edges", || self.edges.add(&items))
	}

	fn update_edges(&mut self, edges: &[FullItem]) -> Result<(), EngineError> {
		let items = to_js(&edges).map_err(Self::rejected("update_edges"))?;
		self.call("update_edges", || self.edges.update(&items))
	}

	fn remove_edges(&mut self, ids: &[Id]) -> Result<(), EngineError> {
		let ids = to_js(&ids).map_err(Self::rejected("remove_edges"))?;
		self.call("remove_edges", || self.edges.remove(&ids))
	}

	fn set_options(&mut self, options: &Value) -> Result<(), EngineError> {
		let js_options = to_js(options).map_err(Self::rejected("set_options"))?;
		if options::drops_keys(&self.options, options) {
			self.ensure_alive()?;
			self.rebuild(&js_options)?;
		} else {
			self.call("set_options", || {
				self.network.set_options(&js_options).map(|_| JsValue::UNDEFINED)
			})?;
		}
		self.options = options.clone();
		Ok(())
	}

	fn set_size(&mut self, width: f64, height: f64) -> Result<(), EngineError> {
		let (width, height) = (format!("{width}px"), format!("{height}px"));
		self.call("set_size", || {
			self.network
				.set_size(&width, &height)
				.map(|_| JsValue::UNDEFINED)
		})
	}

	fn on(&mut self, key: EventKey, callback: EngineCallback) {
		self.off(key);
		let listener = Closure::<dyn FnMut(JsValue)>::new(move |raw: JsValue| {
			callback(from_js(&raw));
		});
		self.network
			.on(key.as_str(), listener.as_ref().unchecked_ref());
		self.listeners.insert(key, listener);
	}

	fn off(&mut self, key: EventKey) {
		if let Some(listener) = self.listeners.remove(&key) {
			self.network
				.off(key.as_str(), listener.as_ref().unchecked_ref());
		}
	}

	fn destroy(&mut self) {
		if self.destroyed {
			return;
		}
		let keys: Vec<EventKey> = self.listeners.keys().copied().collect();
		for key in keys {
			self.off(key);
		}
		self.network.destroy();
		self.destroyed = true;
	}

	fn as_any(&self) -> &dyn Any {
		self
	}

	fn as_any_mut(&mut self) -> &mut dyn Any {
		self
	}
}

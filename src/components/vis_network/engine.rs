//! The rendering/physics engine as seen by the bridge.
//!
//! The bridge never looks inside an engine. It builds one from snapshots of
//! the collections and options, forwards deltas to it, and listens to the
//! callbacks it fires. Implementations exist for the in-crate
//! [`ForceGraphEngine`](super::simulation::ForceGraphEngine) and, on wasm32,
//! for the JavaScript `vis.Network`.

use std::any::Any;
use std::rc::Rc;

use serde_json::Value;

use super::error::EngineError;
use super::events::EventKey;
use super::types::{FullItem, Id};

/// Listener the engine invokes with its raw event payload.
pub type EngineCallback = Rc<dyn Fn(Value)>;

/// Viewport dimensions in CSS pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
	/// Width in CSS pixels.
	pub width: f64,
	/// Height in CSS pixels.
	pub height: f64,
}

impl Default for Viewport {
	fn default() -> Self {
		Self {
			width: 800.0,
			height: 600.0,
		}
	}
}

/// Everything an engine is constructed from.
#[derive(Clone, Copy, Debug)]
pub struct EngineInput<'a> {
	/// Initial nodes, ids resolved.
	pub nodes: &'a [FullItem],
	/// Initial edges, ids resolved.
	pub edges: &'a [FullItem],
	/// Effective options, hover policy applied.
	pub options: &'a Value,
	/// Size of the container at mount.
	pub viewport: Viewport,
}

/// An engine instance owned by a mounted bridge.
///
/// Every method is synchronous. Callbacks may fire from inside any of them.
pub trait Engine {
	/// Add nodes whose ids are new to the engine.
	fn add_nodes(&mut self, nodes: &[FullItem]) -> Result<(), EngineError>;

	/// Upsert: nodes the engine does not know yet are added.
	fn update_nodes(&mut self, nodes: &[FullItem]) -> Result<(), EngineError>;

	/// Remove nodes by id.
	fn remove_nodes(&mut self, ids: &[Id]) -> Result<(), EngineError>;

	/// Add edges whose ids are new to the engine.
	fn add_edges(&mut self, edges: &[FullItem]) -> Result<(), EngineError>;

	/// Upsert, as for [`Engine::update_nodes`].
	fn update_edges(&mut self, edges: &[FullItem]) -> Result<(), EngineError>;

	/// Remove edges by id.
	fn remove_edges(&mut self, ids: &[Id]) -> Result<(), EngineError>;

	/// Install the complete effective configuration.
	fn set_options(&mut self, options: &Value) -> Result<(), EngineError>;

	/// Resize the drawing surface, in CSS pixels.
	fn set_size(&mut self, width: f64, height: f64) -> Result<(), EngineError>;

	/// Register the single listener for `key`, replacing any previous one.
	fn on(&mut self, key: EventKey, callback: EngineCallback);

	/// Remove the listener for `key`, if any.
	fn off(&mut self, key: EventKey);

	/// Release every resource. Called exactly once, after all `off` calls.
	fn destroy(&mut self);

	/// For downcasting to the concrete engine.
	fn as_any(&self) -> &dyn Any;

	/// Mutable counterpart of [`Engine::as_any`].
	fn as_any_mut(&mut self) -> &mut dyn Any;
}

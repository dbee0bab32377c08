//! vis-network-bridge: keeps a graph engine in sync with reactive host data.
//!
//! This crate provides a bridge that mounts a network engine from host-owned
//! nodes, edges and options, forwards every later change to it, and re-emits
//! the engine's events as typed notifications. A Leptos component hosts the
//! engine in the DOM.

use log::{Level, info, warn};
use wasm_bindgen::JsCast;
use web_sys::{HtmlScriptElement, Window};

pub mod components;

pub use components::vis_network::{
	Bridge, BridgeConfig, EngineFactory, EventKey, ForceGraphEngine, NetworkEvent, NetworkHandle,
	NetworkInput, Notification, Topic, VisNetwork,
};

/// Initialize logging and panic hooks for the WASM target.
pub fn init_logging() {
	let _ = console_log::init_with_level(Level::Debug);
	console_error_panic_hook::set_once();
	info!("vis-network: logging initialized");
}

/// Load initial network data from a script element.
/// Expected format: JSON with { nodes: [...], edges: [...], options: {...} }
pub fn load_network_input(element_id: &str) -> Option<NetworkInput> {
	let window: Window = web_sys::window()?;
	let document = window.document()?;
	let element = document.get_element_by_id(element_id)?;
	let script: HtmlScriptElement = element.dyn_into().ok()?;
	let json_text = script.text().ok()?;

	match serde_json::from_str::<NetworkInput>(&json_text) {
		Ok(input) => {
			info!(
				"vis-network: loaded {} nodes, {} edges from #{element_id}",
				input.nodes.len(),
				input.edges.len()
			);
			Some(input)
		}
		Err(e) => {
			warn!("vis-network: failed to parse #{element_id}: {}", e);
			None
		}
	}
}

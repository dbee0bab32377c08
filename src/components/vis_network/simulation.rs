//! Headless engine backed by the `force_graph` physics simulation.
//!
//! Keeps its own copy of the node and edge records, lays them out with a
//! force simulation, and turns pointer input in screen coordinates into the
//! same events a vis-network instance fires: hover and blur, popups,
//! selection, clicks, drags, zoom, stabilization progress and redraw hooks.
//! It draws nothing; embedders that paint read positions back through
//! [`ForceGraphEngine::position`].

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;

use force_graph::{DefaultNodeIdx, EdgeData, ForceGraph, NodeData, SimulationParameters};
use indexmap::IndexMap;
use serde_json::{Value, json};

use super::engine::{Engine, EngineCallback, EngineInput};
use super::error::EngineError;
use super::events::EventKey;
use super::types::{FullItem, Id};

/// Step used by stabilization and by callers that do not track frame time.
pub const FRAME_DT: f32 = 0.016;

const DEFAULT_NODE_SIZE: f64 = 12.0;
const DEFAULT_STABILIZATION_ITERATIONS: u64 = 100;
const DEFAULT_UPDATE_INTERVAL: u64 = 50;
const EDGE_HIT_DISTANCE: f64 = 6.0;
const LAYOUT_RADIUS: f64 = 100.0;
const MIN_ZOOM: f64 = 0.1;
const MAX_ZOOM: f64 = 10.0;

/// Per-node data attached to each simulated node.
#[derive(Clone, Debug, Default)]
pub struct NodeInfo {
	/// Hit radius in world units.
	pub size: f64,
}

/// Pan and zoom transform applied to the entire graph view.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewTransform {
	/// Horizontal pan, in screen pixels.
	pub x: f64,
	/// Vertical pan, in screen pixels.
	pub y: f64,
	/// Zoom factor (1.0 = 100%, clamped to 0.1..10.0).
	pub k: f64,
}

/// Tracks a pressed pointer until it is released.
#[derive(Clone, Debug, Default)]
struct PressState {
	node: Option<Id>,
	start_x: f64,
	start_y: f64,
	node_start_x: f32,
	node_start_y: f32,
	transform_start_x: f64,
	transform_start_y: f64,
	dragging: bool,
	held: bool,
}

/// Currently selected ids.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SelectionState {
	/// Node ids.
	pub nodes: Vec<Id>,
	/// Edge ids.
	pub edges: Vec<Id>,
}

/// A headless [`Engine`] that simulates layout with `force_graph`.
pub struct ForceGraphEngine {
	graph: ForceGraph<NodeInfo, ()>,
	nodes: IndexMap<Id, FullItem>,
	edges: IndexMap<Id, FullItem>,
	index: HashMap<Id, DefaultNodeIdx>,
	ids: HashMap<DefaultNodeIdx, Id>,
	options: Value,
	callbacks: HashMap<EventKey, EngineCallback>,
	transform: ViewTransform,
	press: Option<PressState>,
	hovered_node: Option<Id>,
	hovered_edge: Option<Id>,
	popup: Option<Id>,
	selection: SelectionState,
	width: f64,
	height: f64,
	needs_stabilization: bool,
	destroyed: bool,
}

fn simulation_parameters() -> SimulationParameters {
	SimulationParameters {
		force_charge: 150.0,
		force_spring: 0.05,
		force_max: 100.0,
		node_speed: 3000.0,
		damping_factor: 0.9,
	}
}

fn number_field(item: &FullItem, field: &str) -> Result<Option<f64>, String> {
	match item.get(field) {
		None | Some(Value::Null) => Ok(None),
		Some(Value::Number(n)) => Ok(n.as_f64()),
		Some(other) => Err(format!("node {} has non-numeric `{field}`: {other}", item.id())),
	}
}

fn check_nodes(nodes: &[FullItem]) -> Result<(), String> {
	for node in nodes {
		number_field(node, "x")?;
		number_field(node, "y")?;
	}
	Ok(())
}

fn check_options(options: &Value) -> Result<(), String> {
	match options.pointer("/physics/stabilization/iterations") {
		None | Some(Value::Null) => Ok(()),
		Some(value) if value.as_u64().is_some() => Ok(()),
		Some(other) => Err(format!(
			"physics.stabilization.iterations must be a non-negative integer, got {other}"
		)),
	}
}

fn ids_value(ids: &[Id]) -> Value {
	Value::Array(ids.iter().map(Id::to_value).collect())
}

/// Distance from `(px, py)` to the segment `(x1, y1)-(x2, y2)`.
fn segment_distance(px: f64, py: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
	let (dx, dy) = (x2 - x1, y2 - y1);
	let len_sq = dx * dx + dy * dy;
	let t = if len_sq < 1e-9 {
		0.0
	} else {
		(((px - x1) * dx + (py - y1) * dy) / len_sq).clamp(0.0, 1.0)
	};
	let (cx, cy) = (x1 + t * dx, y1 + t * dy);
	((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
}

impl ForceGraphEngine {
	/// Build the simulation from the initial data. Node positions may be given as numeric `x`/`y` fields.
	pub fn new(input: EngineInput<'_>) -> Result<Self, EngineError> {
		check_nodes(input.nodes).map_err(EngineError::Construction)?;
		check_options(input.options).map_err(EngineError::Construction)?;

		let mut engine = Self {
			graph: ForceGraph::new(simulation_parameters()),
			nodes: input
				.nodes
				.iter()
				.map(|node| (node.id().clone(), node.clone()))
				.collect(),
			edges: input
				.edges
				.iter()
				.map(|edge| (edge.id().clone(), edge.clone()))
				.collect(),
			index: HashMap::new(),
			ids: HashMap::new(),
			options: input.options.clone(),
			callbacks: HashMap::new(),
			transform: ViewTransform {
				x: input.viewport.width / 2.0,
				y: input.viewport.height / 2.0,
				k: 1.0,
			},
			press: None,
			hovered_node: None,
			hovered_edge: None,
			popup: None,
			selection: SelectionState::default(),
			width: input.viewport.width,
			height: input.viewport.height,
			needs_stabilization: true,
			destroyed: false,
		};
		engine.rebuild(&HashSet::new());
		Ok(engine)
	}

	/// Factory usable with [`Bridge::mount`](super::bridge::Bridge::mount).
	pub fn create(input: EngineInput<'_>) -> Result<Box<dyn Engine>, EngineError> {
		Ok(Box::new(Self::new(input)?))
	}

	fn option_bool(&self, pointer: &str, default: bool) -> bool {
		self.options
			.pointer(pointer)
			.and_then(Value::as_bool)
			.unwrap_or(default)
	}

	fn physics_enabled(&self) -> bool {
		self.option_bool("/physics/enabled", true)
	}

	fn node_size(&self, node: &FullItem) -> f64 {
		node.get("size")
			.and_then(Value::as_f64)
			.or_else(|| self.options.pointer("/nodes/size").and_then(Value::as_f64))
			.unwrap_or(DEFAULT_NODE_SIZE)
	}

	fn is_fixed(node: &FullItem) -> bool {
		node.get("fixed").and_then(Value::as_bool).unwrap_or(false)
	}

	/// Rebuild the simulation from the records. Nodes keep their previous
	/// position unless listed in `placed`, in which case their own `x`/`y`
	/// fields win.
	fn rebuild(&mut self, placed: &HashSet<Id>) {
		let previous = self.positions();
		let mut graph = ForceGraph::new(simulation_parameters());
		self.index.clear();
		self.ids.clear();

		let count = self.nodes.len().max(1) as f64;
		for (i, node) in self.nodes.values().enumerate() {
			let own = match (number_field(node, "x"), number_field(node, "y")) {
				(Ok(Some(x)), Ok(Some(y))) => Some((x, y)),
				_ => None,
			};
			let kept = previous.get(node.id()).copied();
			let (x, y) = match (own, kept) {
				(Some(own), _) if placed.contains(node.id()) => own,
				(_, Some(kept)) => kept,
				(Some(own), None) => own,
				(None, None) => {
					let angle = (i as f64) * 2.0 * PI / count;
					(LAYOUT_RADIUS * angle.cos(), LAYOUT_RADIUS * angle.sin())
				}
			};
			let idx = graph.add_node(NodeData {
				x: x as f32,
				y: y as f32,
				mass: 10.0,
				is_anchor: Self::is_fixed(node),
				user_data: NodeInfo {
					size: self.node_size(node),
				},
			});
			self.index.insert(node.id().clone(), idx);
			self.ids.insert(idx, node.id().clone());
		}

		for edge in self.edges.values() {
			if let (Some(from), Some(to)) = (edge.from_id(), edge.to_id()) {
				if let (Some(&src), Some(&tgt)) = (self.index.get(&from), self.index.get(&to)) {
					graph.add_edge(src, tgt, EdgeData::default());
				}
			}
		}
		self.graph = graph;
	}

	fn positions(&self) -> HashMap<Id, (f64, f64)> {
		let mut positions = HashMap::with_capacity(self.ids.len());
		self.graph.visit_nodes(|node| {
			if let Some(id) = self.ids.get(&node.index()) {
				positions.insert(id.clone(), (node.x() as f64, node.y() as f64));
			}
		});
		positions
	}

	/// World position of a node.
	pub fn position(&self, id: &Id) -> Option<(f64, f64)> {
		let idx = *self.index.get(id)?;
		let mut found = None;
		self.graph.visit_nodes(|node| {
			if node.index() == idx {
				found = Some((node.x() as f64, node.y() as f64));
			}
		});
		found
	}

	/// Edges whose endpoints both exist. Others stay registered but are not
	/// simulated, drawn or hit-tested.
	pub fn rendered_edges(&self) -> Vec<Id> {
		self.edges
			.values()
			.filter(|edge| self.endpoints(edge).is_some())
			.map(|edge| edge.id().clone())
			.collect()
	}

	fn endpoints(&self, edge: &FullItem) -> Option<(Id, Id)> {
		let (from, to) = (edge.from_id()?, edge.to_id()?);
		(self.nodes.contains_key(&from) && self.nodes.contains_key(&to)).then_some((from, to))
	}

	/// Number of simulated nodes.
	pub fn node_count(&self) -> usize {
		self.nodes.len()
	}

	/// Number of simulated edges.
	pub fn edge_count(&self) -> usize {
		self.edges.len()
	}

	/// Effective options currently applied.
	pub fn options(&self) -> &Value {
		&self.options
	}

	/// Current pan and zoom.
	pub fn transform(&self) -> &ViewTransform {
		&self.transform
	}

	/// Current selection.
	pub fn selection(&self) -> &SelectionState {
		&self.selection
	}

	/// Node under the pointer while hover is enabled.
	pub fn hovered_node(&self) -> Option<&Id> {
		self.hovered_node.as_ref()
	}

	/// Width and height of the drawing surface.
	pub fn size(&self) -> (f64, f64) {
		(self.width, self.height)
	}

	/// Whether `destroy` has run.
	pub fn is_destroyed(&self) -> bool {
		self.destroyed
	}

	/// Convert container coordinates to graph coordinates.
	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> (f64, f64) {
		(
			(sx - self.transform.x) / self.transform.k,
			(sy - self.transform.y) / self.transform.k,
		)
	}

	/// Topmost node under a container point.
	pub fn node_at_position(&self, sx: f64, sy: f64) -> Option<Id> {
		let (gx, gy) = self.screen_to_graph(sx, sy);
		let mut found = None;
		self.graph.visit_nodes(|node| {
			let (dx, dy) = (node.x() as f64 - gx, node.y() as f64 - gy);
			if (dx * dx + dy * dy).sqrt() < node.data.user_data.size {
				found = Some(node.index());
			}
		});
		found.and_then(|idx| self.ids.get(&idx).cloned())
	}

	/// Edge within hit distance of a container point, when no node is.
	pub fn edge_at_position(&self, sx: f64, sy: f64) -> Option<Id> {
		let (gx, gy) = self.screen_to_graph(sx, sy);
		let positions = self.positions();
		self.edges.values().find_map(|edge| {
			let (from, to) = self.endpoints(edge)?;
			let (&(x1, y1), &(x2, y2)) = (positions.get(&from)?, positions.get(&to)?);
			(segment_distance(gx, gy, x1, y1, x2, y2) < EDGE_HIT_DISTANCE)
				.then(|| edge.id().clone())
		})
	}

	fn connected_edges(&self, node: &Id) -> Vec<Id> {
		self.edges
			.values()
			.filter(|edge| {
				self.endpoints(edge)
					.is_some_and(|(from, to)| &from == node || &to == node)
			})
			.map(|edge| edge.id().clone())
			.collect()
	}

	fn fire(&self, key: EventKey, payload: Value) {
		if self.destroyed {
			return;
		}
		if let Some(callback) = self.callbacks.get(&key).cloned() {
			callback(payload);
		}
	}

	fn pointer_json(&self, x: f64, y: f64) -> Value {
		let (cx, cy) = self.screen_to_graph(x, y);
		json!({"DOM": {"x": x, "y": y}, "canvas": {"x": cx, "y": cy}})
	}

	fn base_event(&self, kind: &str, nodes: &[Id], edges: &[Id], x: f64, y: f64) -> Value {
		json!({
			"nodes": ids_value(nodes),
			"edges": ids_value(edges),
			"event": {"type": kind, "center": {"x": x, "y": y}},
			"pointer": self.pointer_json(x, y),
		})
	}

	fn hit_items(node: Option<&Id>, edge: Option<&Id>) -> Value {
		match (node, edge) {
			(Some(node), _) => json!([{"nodeId": node.to_value()}]),
			(None, Some(edge)) => json!([{"edgeId": edge.to_value()}]),
			(None, None) => json!([]),
		}
	}

	fn click_event(&self, kind: &str, x: f64, y: f64) -> Value {
		let node = self.node_at_position(x, y);
		let edge = match node {
			Some(_) => None,
			None => self.edge_at_position(x, y),
		};
		let mut event = self.base_event(
			kind,
			node.as_slice(),
			edge.as_slice(),
			x,
			y,
		);
		event["items"] = Self::hit_items(node.as_ref(), edge.as_ref());
		event
	}

	/// Run the stabilization pass now, firing its progress events.
	pub fn stabilize(&mut self) {
		self.needs_stabilization = false;
		if !self.physics_enabled() || !self.option_bool("/physics/stabilization/enabled", true) {
			return;
		}
		let total = self
			.options
			.pointer("/physics/stabilization/iterations")
			.and_then(Value::as_u64)
			.unwrap_or(DEFAULT_STABILIZATION_ITERATIONS);
		let interval = self
			.options
			.pointer("/physics/stabilization/updateInterval")
			.and_then(Value::as_u64)
			.unwrap_or(DEFAULT_UPDATE_INTERVAL)
			.max(1);

		self.fire(EventKey::StartStabilizing, Value::Null);
		for iteration in 1..=total {
			self.graph.update(FRAME_DT);
			if iteration % interval == 0 && iteration < total {
				self.fire(
					EventKey::StabilizationProgress,
					json!({"iterations": iteration, "total": total}),
				);
			}
		}
		self.fire(EventKey::StabilizationIterationsDone, Value::Null);
		self.fire(EventKey::Stabilized, json!({"iterations": total}));
	}

	/// Advance one animation frame. The first frame after construction
	/// stabilizes first.
	pub fn frame(&mut self, dt: f32) {
		if self.destroyed {
			return;
		}
		if self.needs_stabilization {
			self.stabilize();
		}
		self.fire(EventKey::InitRedraw, Value::Null);
		if self.physics_enabled() {
			self.graph.update(dt);
		}
		self.fire(EventKey::BeforeDrawing, Value::Null);
		self.fire(EventKey::AfterDrawing, Value::Null);
	}

	/// Start a press; a node under the pointer becomes the drag target.
	pub fn pointer_down(&mut self, x: f64, y: f64) {
		if self.destroyed {
			return;
		}
		let node = self.node_at_position(x, y);
		let (node_start_x, node_start_y) = node
			.as_ref()
			.and_then(|id| self.position(id))
			.map(|(nx, ny)| (nx as f32, ny as f32))
			.unwrap_or_default();
		self.press = Some(PressState {
			node,
			start_x: x,
			start_y: y,
			node_start_x,
			node_start_y,
			transform_start_x: self.transform.x,
			transform_start_y: self.transform.y,
			dragging: false,
			held: false,
		});
	}

	/// Drag, pan or update hover.
	pub fn pointer_move(&mut self, x: f64, y: f64) {
		if self.destroyed {
			return;
		}
		let Some(mut press) = self.press.take() else {
			self.update_hover(x, y);
			return;
		};
		let drag_node = press
			.node
			.clone()
			.filter(|_| self.option_bool("/interaction/dragNodes", true));
		let drag_view = self.option_bool("/interaction/dragView", true);

		if !press.dragging && (drag_node.is_some() || drag_view) {
			press.dragging = true;
			let nodes: Vec<Id> = drag_node.iter().cloned().collect();
			self.fire(
				EventKey::DragStart,
				self.base_event("panstart", &nodes, &[], x, y),
			);
		}
		if press.dragging {
			if let Some(id) = &drag_node {
				let (dx, dy) = (
					(x - press.start_x) / self.transform.k,
					(y - press.start_y) / self.transform.k,
				);
				let (nx, ny) = (
					press.node_start_x + dx as f32,
					press.node_start_y + dy as f32,
				);
				if let Some(&idx) = self.index.get(id) {
					self.graph.visit_nodes_mut(|node| {
						if node.index() == idx {
							node.data.x = nx;
							node.data.y = ny;
							node.data.is_anchor = true;
						}
					});
				}
			} else {
				self.transform.x = press.transform_start_x + (x - press.start_x);
				self.transform.y = press.transform_start_y + (y - press.start_y);
			}
			let nodes: Vec<Id> = drag_node.iter().cloned().collect();
			self.fire(
				EventKey::Dragging,
				self.base_event("panmove", &nodes, &[], x, y),
			);
		}
		self.press = Some(press);
	}

	/// Finish a press as a drag end, a release after a hold, or a tap.
	pub fn pointer_up(&mut self, x: f64, y: f64) {
		if self.destroyed {
			return;
		}
		let Some(press) = self.press.take() else {
			return;
		};
		if press.dragging {
			let nodes: Vec<Id> = press.node.iter().cloned().collect();
			if let Some(id) = &press.node {
				let fixed = self.nodes.get(id).is_some_and(Self::is_fixed);
				if let Some(&idx) = self.index.get(id) {
					self.graph.visit_nodes_mut(|node| {
						if node.index() == idx {
							node.data.is_anchor = fixed;
						}
					});
				}
			}
			self.fire(
				EventKey::DragEnd,
				self.base_event("panend", &nodes, &[], x, y),
			);
		} else if press.held {
			let event = self.click_event("release", x, y);
			self.fire(EventKey::Release, event);
		} else {
			self.tap(x, y);
		}
	}

	/// Cancel any press and clear hover, as when the pointer leaves the view.
	pub fn pointer_leave(&mut self) {
		self.press = None;
		self.set_hovered(None, None, None);
	}

	/// Report a long press at the current pointer position.
	pub fn hold(&mut self, x: f64, y: f64) {
		if self.destroyed {
			return;
		}
		if let Some(press) = self.press.as_mut() {
			press.held = true;
		}
		let event = self.click_event("press", x, y);
		self.fire(EventKey::Hold, event);
	}

	/// Report a double click.
	pub fn double_click(&mut self, x: f64, y: f64) {
		let event = self.click_event("doubletap", x, y);
		self.fire(EventKey::DoubleClick, event);
	}

	/// Report a right click.
	pub fn context_menu(&mut self, x: f64, y: f64) {
		let event = self.click_event("contextmenu", x, y);
		self.fire(EventKey::Context, event);
	}

	/// Zoom around the pointer. Positive `delta_y` zooms out.
	pub fn wheel(&mut self, x: f64, y: f64, delta_y: f64) {
		if self.destroyed || !self.option_bool("/interaction/zoomView", true) {
			return;
		}
		let factor = if delta_y > 0.0 { 0.9 } else { 1.1 };
		let new_k = (self.transform.k * factor).clamp(MIN_ZOOM, MAX_ZOOM);
		if (new_k - self.transform.k).abs() < f64::EPSILON {
			return;
		}
		let direction = if new_k > self.transform.k { "+" } else { "-" };
		let ratio = new_k / self.transform.k;
		self.transform.x = x - (x - self.transform.x) * ratio;
		self.transform.y = y - (y - self.transform.y) * ratio;
		self.transform.k = new_k;
		self.fire(
			EventKey::Zoom,
			json!({"direction": direction, "scale": new_k, "pointer": {"x": x, "y": y}}),
		);
	}

	/// Centre the view on world position `(x, y)` at `scale`.
	pub fn move_to(&mut self, x: f64, y: f64, scale: f64) {
		if self.destroyed {
			return;
		}
		let k = scale.clamp(MIN_ZOOM, MAX_ZOOM);
		self.transform = ViewTransform {
			x: self.width / 2.0 - x * k,
			y: self.height / 2.0 - y * k,
			k,
		};
		self.fire(EventKey::AnimationFinished, Value::Null);
	}

	fn update_hover(&mut self, x: f64, y: f64) {
		let node = self.node_at_position(x, y);
		let edge = match node {
			Some(_) => None,
			None => self.edge_at_position(x, y),
		};
		self.set_hovered(node, edge, Some((x, y)));
	}

	fn set_hovered(&mut self, node: Option<Id>, edge: Option<Id>, at: Option<(f64, f64)>) {
		let hover = self.option_bool("/interaction/hover", true);
		let pointer = at.map(|(x, y)| self.pointer_json(x, y));
		let payload = |field: &str, id: &Id| {
			let mut value = json!({ field: id.to_value() });
			if let Some(pointer) = &pointer {
				value["pointer"] = pointer.clone();
			}
			value
		};

		if node != self.hovered_node {
			if let Some(prev) = self.hovered_node.take() {
				if hover {
					self.fire(EventKey::BlurNode, payload("node", &prev));
				}
			}
			if let Some(next) = &node {
				if hover {
					self.fire(EventKey::HoverNode, payload("node", next));
				}
			}
			self.hovered_node = node.clone();
		}
		if edge != self.hovered_edge {
			if let Some(prev) = self.hovered_edge.take() {
				if hover {
					self.fire(EventKey::BlurEdge, payload("edge", &prev));
				}
			}
			if let Some(next) = &edge {
				if hover {
					self.fire(EventKey::HoverEdge, payload("edge", next));
				}
			}
			self.hovered_edge = edge.clone();
		}

		let titled = |id: &Id, items: &IndexMap<Id, FullItem>| {
			items.get(id).is_some_and(|item| item.get("title").is_some())
		};
		let popup = node
			.filter(|id| titled(id, &self.nodes))
			.or_else(|| edge.filter(|id| titled(id, &self.edges)));
		if popup != self.popup {
			if self.popup.take().is_some() {
				self.fire(EventKey::HidePopup, Value::Null);
			}
			if let Some(id) = &popup {
				self.fire(EventKey::ShowPopup, id.to_value());
			}
			self.popup = popup;
		}
	}

	fn tap(&mut self, x: f64, y: f64) {
		let node = self.node_at_position(x, y);
		let edge = match node {
			Some(_) => None,
			None => self.edge_at_position(x, y),
		};
		let next = match (&node, &edge) {
			(Some(node), _) => SelectionState {
				nodes: vec![node.clone()],
				edges: self.connected_edges(node),
			},
			(None, Some(edge)) => SelectionState {
				nodes: Vec::new(),
				edges: vec![edge.clone()],
			},
			(None, None) => SelectionState::default(),
		};
		self.change_selection(next, x, y);
		let event = self.click_event("tap", x, y);
		self.fire(EventKey::Click, event);
	}

	fn change_selection(&mut self, next: SelectionState, x: f64, y: f64) {
		if next == self.selection {
			return;
		}
		let prev = std::mem::replace(&mut self.selection, next.clone());
		let previous_selection = json!({
			"nodes": ids_value(&prev.nodes),
			"edges": ids_value(&prev.edges),
		});
		let with_previous = |mut event: Value| {
			event["previousSelection"] = previous_selection.clone();
			event
		};

		if !prev.nodes.is_empty() && prev.nodes != next.nodes {
			let event = self.base_event("tap", &next.nodes, &next.edges, x, y);
			self.fire(EventKey::DeselectNode, with_previous(event));
		} else if !prev.edges.is_empty() && next.nodes.is_empty() && prev.edges != next.edges {
			let event = self.base_event("tap", &next.nodes, &next.edges, x, y);
			self.fire(EventKey::DeselectEdge, with_previous(event));
		}

		let event = self.base_event("tap", &next.nodes, &next.edges, x, y);
		self.fire(EventKey::Select, event.clone());
		if !next.nodes.is_empty() {
			self.fire(EventKey::SelectNode, event);
		} else if !next.edges.is_empty() {
			self.fire(EventKey::SelectEdge, event);
		}
	}

	fn forget(&mut self, removed: &[Id], nodes: bool) {
		if nodes {
			self.selection.nodes.retain(|id| !removed.contains(id));
			if self.hovered_node.as_ref().is_some_and(|id| removed.contains(id)) {
				self.hovered_node = None;
			}
		} else {
			self.selection.edges.retain(|id| !removed.contains(id));
			if self.hovered_edge.as_ref().is_some_and(|id| removed.contains(id)) {
				self.hovered_edge = None;
			}
		}
		if self.popup.as_ref().is_some_and(|id| removed.contains(id)) {
			self.popup = None;
		}
	}

	fn ensure_alive(&self) -> Result<(), EngineError> {
		if self.destroyed {
			Err(EngineError::Destroyed)
		} else {
			Ok(())
		}
	}

	fn upsert_nodes(&mut self, nodes: &[FullItem], operation: &'static str) -> Result<(), EngineError> {
		self.ensure_alive()?;
		check_nodes(nodes).map_err(|reason| EngineError::Rejected { operation, reason })?;
		let mut placed = HashSet::new();
		for node in nodes {
			if node.get("x").is_some() || node.get("y").is_some() {
				placed.insert(node.id().clone());
			}
			self.nodes.insert(node.id().clone(), node.clone());
		}
		self.rebuild(&placed);
		self.needs_stabilization = true;
		Ok(())
	}

	fn upsert_edges(&mut self, edges: &[FullItem]) -> Result<(), EngineError> {
		self.ensure_alive()?;
		for edge in edges {
			self.edges.insert(edge.id().clone(), edge.clone());
		}
		self.rebuild(&HashSet::new());
		self.needs_stabilization = true;
		Ok(())
	}
}

impl Engine for ForceGraphEngine {
	fn add_nodes(&mut self, nodes: &[FullItem]) -> Result<(), EngineError> {
		if let Some(existing) = nodes.iter().find(|node| self.nodes.contains_key(node.id())) {
			return Err(EngineError::Rejected {
				operation: "add_nodes",
				reason: format!("node {} already exists", existing.id()),
			});
		}
		self.upsert_nodes(nodes, "add_nodes")
	}

	fn update_nodes(&mut self, nodes: &[FullItem]) -> Result<(), EngineError> {
		self.upsert_nodes(nodes, "update_nodes")
	}

	fn remove_nodes(&mut self, ids: &[Id]) -> Result<(), EngineError> {
		self.ensure_alive()?;
		for id in ids {
			self.nodes.shift_remove(id);
		}
		self.forget(ids, true);
		self.rebuild(&HashSet::new());
		self.needs_stabilization = true;
		Ok(())
	}

	fn add_edges(&mut self, edges: &[FullItem]) -> Result<(), EngineError> {
		if let Some(existing) = edges.iter().find(|edge| self.edges.contains_key(edge.id())) {
			return Err(EngineError::Rejected {
				operation: "add_edges",
				reason: format!("edge {} already exists", existing.id()),
			});
		}
		self.upsert_edges(edges)
	}

	fn update_edges(&mut self, edges: &[FullItem]) -> Result<(), EngineError> {
		self.upsert_edges(edges)
	}

	fn remove_edges(&mut self, ids: &[Id]) -> Result<(), EngineError> {
		self.ensure_alive()?;
		for id in ids {
			self.edges.shift_remove(id);
		}
		self.forget(ids, false);
		self.rebuild(&HashSet::new());
		self.needs_stabilization = true;
		Ok(())
	}

	fn set_options(&mut self, options: &Value) -> Result<(), EngineError> {
		self.ensure_alive()?;
		check_options(options).map_err(|reason| EngineError::Rejected {
			operation: "set_options",
			reason,
		})?;
		self.options = options.clone();
		// Node sizes may come from `nodes.size`.
		self.rebuild(&HashSet::new());
		Ok(())
	}

	fn set_size(&mut self, width: f64, height: f64) -> Result<(), EngineError> {
		self.ensure_alive()?;
		if width == self.width && height == self.height {
			return Ok(());
		}
		let (old_width, old_height) = (self.width, self.height);
		self.width = width;
		self.height = height;
		self.fire(
			EventKey::Resize,
			json!({
				"width": width,
				"height": height,
				"oldWidth": old_width,
				"oldHeight": old_height,
			}),
		);
		Ok(())
	}

	fn on(&mut self, key: EventKey, callback: EngineCallback) {
		self.callbacks.insert(key, callback);
	}

	fn off(&mut self, key: EventKey) {
		self.callbacks.remove(&key);
	}

	fn destroy(&mut self) {
		self.callbacks.clear();
		self.press = None;
		self.destroyed = true;
	}

	fn as_any(&self) -> &dyn Any {
		self
	}

	fn as_any_mut(&mut self) -> &mut dyn Any {
		self
	}
}

#[cfg(test)]
mod tests {
	use std::cell::RefCell;
	use std::rc::Rc;

	use serde_json::json;

	use super::*;
	use crate::components::vis_network::engine::Viewport;

	type Log = Rc<RefCell<Vec<(EventKey, Value)>>>;

	fn item(id: i64, fields: Value) -> FullItem {
		FullItem::new(Id::Int(id), "id", fields.as_object().cloned().unwrap())
	}

	/// Two nodes at world (-100, 0) and (100, 0), i.e. screen (300, 300) and
	/// (500, 300) in an 800x600 view, joined by edge 10.
	fn engine_with(options: Value) -> (ForceGraphEngine, Log) {
		let nodes = vec![
			item(1, json!({"x": -100.0, "y": 0.0, "title": "one"})),
			item(2, json!({"x": 100.0, "y": 0.0})),
		];
		let edges = vec![item(10, json!({"from": 1, "to": 2}))];
		let mut engine = ForceGraphEngine::new(EngineInput {
			nodes: &nodes,
			edges: &edges,
			options: &options,
			viewport: Viewport::default(),
		})
		.unwrap();
		let log: Log = Rc::default();
		for key in EventKey::ALL {
			let log = Rc::clone(&log);
			engine.on(key, Rc::new(move |raw| log.borrow_mut().push((key, raw))));
		}
		(engine, log)
	}

	fn static_engine() -> (ForceGraphEngine, Log) {
		engine_with(json!({"physics": {"enabled": false}, "interaction": {"hover": true}}))
	}

	fn keys(log: &Log) -> Vec<EventKey> {
		log.borrow().iter().map(|(key, _)| *key).collect()
	}

	#[test]
	fn construction_rejects_non_numeric_positions() {
		let nodes = vec![item(1, json!({"x": "left"}))];
		let result = ForceGraphEngine::new(EngineInput {
			nodes: &nodes,
			edges: &[],
			options: &json!({}),
			viewport: Viewport::default(),
		});
		assert!(matches!(result, Err(EngineError::Construction(_))));
	}

	#[test]
	fn hit_testing_uses_the_view_transform() {
		let (engine, _) = static_engine();
		assert_eq!(engine.node_at_position(300.0, 300.0), Some(Id::Int(1)));
		assert_eq!(engine.node_at_position(500.0, 302.0), Some(Id::Int(2)));
		assert_eq!(engine.node_at_position(400.0, 100.0), None);
		assert_eq!(engine.edge_at_position(400.0, 302.0), Some(Id::Int(10)));
	}

	#[test]
	fn hovering_fires_hover_blur_and_popups() {
		let (mut engine, log) = static_engine();
		engine.pointer_move(300.0, 300.0);
		engine.pointer_move(400.0, 100.0);
		assert_eq!(
			keys(&log),
			vec![
				EventKey::HoverNode,
				EventKey::ShowPopup,
				EventKey::BlurNode,
				EventKey::HidePopup
			]
		);
		assert_eq!(log.borrow()[0].1["node"], json!(1));
		assert_eq!(log.borrow()[1].1, json!(1));
	}

	#[test]
	fn hover_events_respect_the_interaction_option() {
		let (mut engine, log) =
			engine_with(json!({"physics": {"enabled": false}, "interaction": {"hover": false}}));
		engine.pointer_move(500.0, 300.0);
		assert!(log.borrow().is_empty());
		assert_eq!(engine.hovered_node(), Some(&Id::Int(2)));
	}

	#[test]
	fn tapping_selects_before_clicking() {
		let (mut engine, log) = static_engine();
		engine.pointer_down(300.0, 300.0);
		engine.pointer_up(300.0, 300.0);
		assert_eq!(
			keys(&log),
			vec![EventKey::Select, EventKey::SelectNode, EventKey::Click]
		);
		{
			let click = &log.borrow()[2].1;
			assert_eq!(click["items"], json!([{"nodeId": 1}]));
		}
		assert_eq!(engine.selection().nodes, vec![Id::Int(1)]);
		assert_eq!(engine.selection().edges, vec![Id::Int(10)]);

		log.borrow_mut().clear();
		engine.pointer_down(400.0, 100.0);
		engine.pointer_up(400.0, 100.0);
		assert_eq!(
			keys(&log),
			vec![EventKey::DeselectNode, EventKey::Select, EventKey::Click]
		);
		assert_eq!(
			log.borrow()[0].1["previousSelection"],
			json!({"nodes": [1], "edges": [10]})
		);
	}

	#[test]
	fn long_press_reports_hold_then_release_instead_of_a_click() {
		let (mut engine, log) = static_engine();
		engine.pointer_down(300.0, 300.0);
		engine.hold(300.0, 300.0);
		engine.pointer_up(300.0, 300.0);
		assert_eq!(keys(&log), vec![EventKey::Hold, EventKey::Release]);
		assert_eq!(log.borrow()[0].1["items"], json!([{"nodeId": 1}]));
		assert_eq!(log.borrow()[1].1["event"]["type"], json!("release"));
		assert!(engine.selection().nodes.is_empty());
	}

	#[test]
	fn dragging_a_node_moves_it() {
		let (mut engine, log) = static_engine();
		engine.pointer_down(500.0, 300.0);
		engine.pointer_move(520.0, 330.0);
		engine.pointer_move(540.0, 360.0);
		engine.pointer_up(540.0, 360.0);
		assert_eq!(
			keys(&log)
				.into_iter()
				.filter(|key| !matches!(key, EventKey::HoverNode | EventKey::BlurNode))
				.collect::<Vec<_>>(),
			vec![
				EventKey::DragStart,
				EventKey::Dragging,
				EventKey::Dragging,
				EventKey::DragEnd
			]
		);
		assert_eq!(engine.position(&Id::Int(2)), Some((140.0, 60.0)));
	}

	#[test]
	fn dragging_the_background_pans() {
		let (mut engine, _) = static_engine();
		engine.pointer_down(400.0, 100.0);
		engine.pointer_move(450.0, 120.0);
		engine.pointer_up(450.0, 120.0);
		assert_eq!(engine.transform().x, 450.0);
		assert_eq!(engine.transform().y, 320.0);
	}

	#[test]
	fn wheel_zooms_around_the_pointer() {
		let (mut engine, log) = static_engine();
		engine.wheel(400.0, 300.0, -1.0);
		let (key, payload) = log.borrow()[0].clone();
		assert_eq!(key, EventKey::Zoom);
		assert_eq!(payload["direction"], json!("+"));
		assert!((engine.transform().k - 1.1).abs() < 1e-9);
	}

	#[test]
	fn stabilization_reports_progress() {
		let (mut engine, log) = engine_with(json!({
			"physics": {"stabilization": {"iterations": 120, "updateInterval": 50}},
		}));
		engine.frame(FRAME_DT);
		assert_eq!(
			keys(&log),
			vec![
				EventKey::StartStabilizing,
				EventKey::StabilizationProgress,
				EventKey::StabilizationProgress,
				EventKey::StabilizationIterationsDone,
				EventKey::Stabilized,
				EventKey::InitRedraw,
				EventKey::BeforeDrawing,
				EventKey::AfterDrawing,
			]
		);
		assert_eq!(log.borrow()[2].1, json!({"iterations": 100, "total": 120}));
		assert_eq!(log.borrow()[4].1, json!({"iterations": 120}));

		log.borrow_mut().clear();
		engine.frame(FRAME_DT);
		assert_eq!(
			keys(&log),
			vec![
				EventKey::InitRedraw,
				EventKey::BeforeDrawing,
				EventKey::AfterDrawing
			]
		);
	}

	#[test]
	fn removed_endpoint_hides_the_edge() {
		let (mut engine, _) = static_engine();
		engine.remove_nodes(&[Id::Int(2)]).unwrap();
		assert_eq!(engine.edge_count(), 1);
		assert!(engine.rendered_edges().is_empty());
		assert_eq!(engine.edge_at_position(400.0, 300.0), None);
	}

	#[test]
	fn positions_survive_unrelated_updates() {
		let (mut engine, _) = static_engine();
		engine
			.update_nodes(&[item(2, json!({"x": 100.0, "y": 0.0, "label": "two"}))])
			.unwrap();
		engine.add_nodes(&[item(3, json!({}))]).unwrap();
		assert_eq!(engine.position(&Id::Int(1)), Some((-100.0, 0.0)));
		assert!(engine.position(&Id::Int(3)).is_some());
	}

	#[test]
	fn resize_reports_old_and_new_dimensions() {
		let (mut engine, log) = static_engine();
		engine.set_size(600.0, 600.0).unwrap();
		engine.set_size(600.0, 600.0).unwrap();
		assert_eq!(
			log.borrow().as_slice(),
			&[(
				EventKey::Resize,
				json!({"width": 600.0, "height": 600.0, "oldWidth": 800.0, "oldHeight": 600.0})
			)]
		);
	}

	#[test]
	fn destroyed_engine_is_silent_and_rejects_mutations() {
		let (mut engine, log) = static_engine();
		engine.destroy();
		engine.frame(FRAME_DT);
		engine.move_to(0.0, 0.0, 1.0);
		assert!(log.borrow().is_empty());
		assert_eq!(
			engine.add_nodes(&[item(5, json!({}))]),
			Err(EngineError::Destroyed)
		);
	}

	#[test]
	fn invalid_stabilization_option_is_rejected_per_call() {
		let (mut engine, _) = static_engine();
		let err = engine
			.set_options(&json!({"physics": {"stabilization": {"iterations": -1}}}))
			.unwrap_err();
		assert!(matches!(err, EngineError::Rejected { operation: "set_options", .. }));
		assert_eq!(engine.options()["interaction"]["hover"], json!(true));
	}
}

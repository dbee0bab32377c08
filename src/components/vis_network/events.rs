//! The complete vocabulary of notifications the bridge emits.
//!
//! Engine events are keyed by [`EventKey`] and parsed from the engine's raw
//! callback payload into a typed [`NetworkEvent`]. Collection changes are
//! reported separately per collection through [`CollectionEvent`]. Both are
//! wrapped in [`Notification`], which is what subscribers receive.

use std::fmt;
use std::str::FromStr;

use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{FullItem, Id};

/// Every engine event the bridge listens for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKey {
	/// `click`
	Click,
	/// `doubleClick`
	DoubleClick,
	/// `oncontext`, a right click.
	Context,
	/// `hold`, a long press.
	Hold,
	/// `release`, the end of a hold.
	Release,
	/// `select`
	Select,
	/// `selectNode`
	SelectNode,
	/// `selectEdge`
	SelectEdge,
	/// `deselectNode`
	DeselectNode,
	/// `deselectEdge`
	DeselectEdge,
	/// `dragStart`
	DragStart,
	/// `dragging`
	Dragging,
	/// `dragEnd`
	DragEnd,
	/// `controlNodeDragging`, while an edge endpoint is dragged in edit mode.
	ControlNodeDragging,
	/// `controlNodeDragEnd`
	ControlNodeDragEnd,
	/// `hoverNode`
	HoverNode,
	/// `blurNode`
	BlurNode,
	/// `hoverEdge`
	HoverEdge,
	/// `blurEdge`
	BlurEdge,
	/// `zoom`
	Zoom,
	/// `showPopup`
	ShowPopup,
	/// `hidePopup`
	HidePopup,
	/// `startStabilizing`
	StartStabilizing,
	/// `stabilizationProgress`
	StabilizationProgress,
	/// `stabilizationIterationsDone`
	StabilizationIterationsDone,
	/// `stabilized`
	Stabilized,
	/// `resize`
	Resize,
	/// `initRedraw`
	InitRedraw,
	/// `beforeDrawing`
	BeforeDrawing,
	/// `afterDrawing`
	AfterDrawing,
	/// `animationFinished`
	AnimationFinished,
	/// `configChange`
	ConfigChange,
}

impl EventKey {
	/// All keys, in registration order.
	pub const ALL: [EventKey; 32] = [
		EventKey::Click,
		EventKey::DoubleClick,
		EventKey::Context,
		EventKey::Hold,
		EventKey::Release,
		EventKey::Select,
		EventKey::SelectNode,
		EventKey::SelectEdge,
		EventKey::DeselectNode,
		EventKey::DeselectEdge,
		EventKey::DragStart,
		EventKey::Dragging,
		EventKey::DragEnd,
		EventKey::ControlNodeDragging,
		EventKey::ControlNodeDragEnd,
		EventKey::HoverNode,
		EventKey::BlurNode,
		EventKey::HoverEdge,
		EventKey::BlurEdge,
		EventKey::Zoom,
		EventKey::ShowPopup,
		EventKey::HidePopup,
		EventKey::StartStabilizing,
		EventKey::StabilizationProgress,
		EventKey::StabilizationIterationsDone,
		EventKey::Stabilized,
		EventKey::Resize,
		EventKey::InitRedraw,
		EventKey::BeforeDrawing,
		EventKey::AfterDrawing,
		EventKey::AnimationFinished,
		EventKey::ConfigChange,
	];

	/// The engine-side event name.
	pub const fn as_str(self) -> &'static str {
		match self {
			EventKey::Click => "click",
			EventKey::DoubleClick => "doubleClick",
			EventKey::Context => "oncontext",
			EventKey::Hold => "hold",
			EventKey::Release => "release",
			EventKey::Select => "select",
			EventKey::SelectNode => "selectNode",
			EventKey::SelectEdge => "selectEdge",
			EventKey::DeselectNode => "deselectNode",
			EventKey::DeselectEdge => "deselectEdge",
			EventKey::DragStart => "dragStart",
			EventKey::Dragging => "dragging",
			EventKey::DragEnd => "dragEnd",
			EventKey::ControlNodeDragging => "controlNodeDragging",
			EventKey::ControlNodeDragEnd => "controlNodeDragEnd",
			EventKey::HoverNode => "hoverNode",
			EventKey::BlurNode => "blurNode",
			EventKey::HoverEdge => "hoverEdge",
			EventKey::BlurEdge => "blurEdge",
			EventKey::Zoom => "zoom",
			EventKey::ShowPopup => "showPopup",
			EventKey::HidePopup => "hidePopup",
			EventKey::StartStabilizing => "startStabilizing",
			EventKey::StabilizationProgress => "stabilizationProgress",
			EventKey::StabilizationIterationsDone => "stabilizationIterationsDone",
			EventKey::Stabilized => "stabilized",
			EventKey::Resize => "resize",
			EventKey::InitRedraw => "initRedraw",
			EventKey::BeforeDrawing => "beforeDrawing",
			EventKey::AfterDrawing => "afterDrawing",
			EventKey::AnimationFinished => "animationFinished",
			EventKey::ConfigChange => "configChange",
		}
	}
}

impl fmt::Display for EventKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Returned when parsing a name that is not an engine event.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown network event `{0}`")]
pub struct UnknownEventKey(pub String);

impl FromStr for EventKey {
	type Err = UnknownEventKey;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		EventKey::ALL
			.into_iter()
			.find(|key| key.as_str() == s)
			.ok_or_else(|| UnknownEventKey(s.to_string()))
	}
}

/// A point in one coordinate system.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
	/// Horizontal coordinate.
	pub x: f64,
	/// Vertical coordinate.
	pub y: f64,
}

/// Pointer location in device (`DOM`) and world (`canvas`) coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pointer {
	/// Relative to the container.
	#[serde(rename = "DOM")]
	pub dom: Position,
	/// In graph coordinates.
	pub canvas: Position,
}

/// Fields shared by pointer-driven events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BaseEvent {
	/// Selected or hit node ids.
	pub nodes: Vec<Id>,
	/// Selected or hit edge ids.
	pub edges: Vec<Id>,
	/// The originating low-level input event, as the engine reported it.
	#[serde(default)]
	pub event: Value,
	/// Pointer position.
	pub pointer: Pointer,
}

/// An item under the pointer at click time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HitTarget {
	/// A node, or its label.
	Node {
		/// Id of the node.
		#[serde(rename = "nodeId")]
		node_id: Id,
		/// Set when the label, not the shape, was hit.
		#[serde(rename = "labelId", default, skip_serializing_if = "Option::is_none")]
		label_id: Option<u32>,
	},
	/// An edge, or its label.
	Edge {
		/// Id of the edge.
		#[serde(rename = "edgeId")]
		edge_id: Id,
		/// Set when the label, not the shape, was hit.
		#[serde(rename = "labelId", default, skip_serializing_if = "Option::is_none")]
		label_id: Option<u32>,
	},
}

/// Payload of `click`, `doubleClick` and `oncontext`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClickEvent {
	/// Shared pointer fields.
	#[serde(flatten)]
	pub base: BaseEvent,
	/// Items under the pointer, topmost first.
	#[serde(default)]
	pub items: Vec<HitTarget>,
}

/// Selection as it was before a deselect.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
	/// Node ids.
	#[serde(default)]
	pub nodes: Vec<Value>,
	/// Edge ids.
	#[serde(default)]
	pub edges: Vec<Value>,
}

/// Payload of `deselectNode` and `deselectEdge`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeselectEvent {
	/// Shared pointer fields.
	#[serde(flatten)]
	pub base: BaseEvent,
	/// What was selected before.
	#[serde(rename = "previousSelection")]
	pub previous_selection: Selection,
}

/// Endpoints of the edge whose control node is being dragged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlEdge {
	/// Source node.
	#[serde(default)]
	pub from: Option<Id>,
	/// Target node.
	#[serde(default)]
	pub to: Option<Id>,
}

/// Payload of `controlNodeDragging` and `controlNodeDragEnd`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlNodeDraggingEvent {
	/// Shared pointer fields.
	#[serde(flatten)]
	pub base: BaseEvent,
	/// The edge being edited.
	#[serde(rename = "controlEdge")]
	pub control_edge: ControlEdge,
}

/// Payload of `hoverNode` / `blurNode`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeEvent {
	/// The hovered node.
	pub node: Id,
	/// Low-level input event, when the engine sends one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub event: Option<Value>,
	/// Pointer position.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub pointer: Option<Pointer>,
}

/// Payload of `hoverEdge` / `blurEdge`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeEvent {
	/// The hovered edge.
	pub edge: Id,
	/// Low-level input event, when the engine sends one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub event: Option<Value>,
	/// Pointer position.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub pointer: Option<Pointer>,
}

/// Which way a `zoom` went.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoomDirection {
	/// Zoomed in (`+`).
	#[serde(rename = "+")]
	In,
	/// Zoomed out (`-`).
	#[serde(rename = "-")]
	Out,
}

/// Payload of `zoom`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZoomEvent {
	/// `direction`.
	pub direction: ZoomDirection,
	/// Scale after the zoom.
	pub scale: f64,
	/// Pointer position in the container.
	pub pointer: Position,
}

/// Payload of `stabilizationProgress`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StabilizationProgressEvent {
	/// Iterations done so far.
	pub iterations: u32,
	/// Iteration budget.
	pub total: u32,
}

/// Payload of `stabilized`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StabilizedEvent {
	/// Iterations run.
	pub iterations: u32,
}

/// Payload of `resize`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizeEvent {
	/// Width in CSS pixels.
	pub width: f64,
	/// Height in CSS pixels.
	pub height: f64,
	/// Width before the resize.
	pub old_width: f64,
	/// Height before the resize.
	pub old_height: f64,
}

/// A typed engine event.
#[derive(Clone, Debug, PartialEq)]
pub enum NetworkEvent {
	/// `click`.
	Click(ClickEvent),
	/// `doubleClick`.
	DoubleClick(ClickEvent),
	/// `oncontext`.
	Context(ClickEvent),
	/// `hold`.
	Hold(BaseEvent),
	/// `release`.
	Release(BaseEvent),
	/// `select`.
	Select(BaseEvent),
	/// `selectNode`.
	SelectNode(BaseEvent),
	/// `selectEdge`.
	SelectEdge(BaseEvent),
	/// `deselectNode`.
	DeselectNode(DeselectEvent),
	/// `deselectEdge`.
	DeselectEdge(DeselectEvent),
	/// `dragStart`.
	DragStart(BaseEvent),
	/// `dragging`.
	Dragging(BaseEvent),
	/// `dragEnd`.
	DragEnd(BaseEvent),
	/// `controlNodeDragging`.
	ControlNodeDragging(ControlNodeDraggingEvent),
	/// `controlNodeDragEnd`.
	ControlNodeDragEnd(ControlNodeDraggingEvent),
	/// `hoverNode`.
	HoverNode(NodeEvent),
	/// `blurNode`.
	BlurNode(NodeEvent),
	/// `hoverEdge`.
	HoverEdge(EdgeEvent),
	/// `blurEdge`.
	BlurEdge(EdgeEvent),
	/// `zoom`.
	Zoom(ZoomEvent),
	/// Id of the item whose popup is shown.
	ShowPopup(Id),
	/// `hidePopup`.
	HidePopup,
	/// `startStabilizing`.
	StartStabilizing,
	/// `stabilizationProgress`.
	StabilizationProgress(StabilizationProgressEvent),
	/// `stabilizationIterationsDone`.
	StabilizationIterationsDone,
	/// `stabilized`.
	Stabilized(StabilizedEvent),
	/// `resize`.
	Resize(ResizeEvent),
	/// `initRedraw`.
	InitRedraw,
	/// `beforeDrawing`.
	BeforeDrawing,
	/// `afterDrawing`.
	AfterDrawing,
	/// `animationFinished`.
	AnimationFinished,
	/// The options the engine's configurator produced.
	ConfigChange(Value),
	/// The engine fired `key` with a payload that does not fit its schema.
	Unrecognized {
		/// The key it fired under.
		key: EventKey,
		/// The payload as received.
		raw: Value,
	},
}

fn payload<T: DeserializeOwned>(raw: &Value) -> Result<T, serde_json::Error> {
	T::deserialize(raw)
}

impl NetworkEvent {
	/// Build the typed event for `key` from the engine's raw payload.
	///
	/// A payload that does not match the schema is logged and carried through
	/// as [`NetworkEvent::Unrecognized`], never dropped.
	pub fn from_raw(key: EventKey, raw: Value) -> Self {
		match Self::parse(key, &raw) {
			Ok(event) => event,
			Err(err) => {
				warn!("vis-network: unexpected `{key}` payload ({err}), forwarding raw value");
				NetworkEvent::Unrecognized { key, raw }
			}
		}
	}

	fn parse(key: EventKey, raw: &Value) -> Result<Self, serde_json::Error> {
		Ok(match key {
			EventKey::Click => NetworkEvent::Click(payload(raw)?),
			EventKey::DoubleClick => NetworkEvent::DoubleClick(payload(raw)?),
			EventKey::Context => NetworkEvent::Context(payload(raw)?),
			EventKey::Hold => NetworkEvent::Hold(payload(raw)?),
			EventKey::Release => NetworkEvent::Release(payload(raw)?),
			EventKey::Select => NetworkEvent::Select(payload(raw)?),
			EventKey::SelectNode => NetworkEvent::SelectNode(payload(raw)?),
			EventKey::SelectEdge => NetworkEvent::SelectEdge(payload(raw)?),
			EventKey::DeselectNode => NetworkEvent::DeselectNode(payload(raw)?),
			EventKey::DeselectEdge => NetworkEvent::DeselectEdge(payload(raw)?),
			EventKey::DragStart => NetworkEvent::DragStart(payload(raw)?),
			EventKey::Dragging => NetworkEvent::Dragging(payload(raw)?),
			EventKey::DragEnd => NetworkEvent::DragEnd(payload(raw)?),
			EventKey::ControlNodeDragging => NetworkEvent::ControlNodeDragging(payload(raw)?),
			EventKey::ControlNodeDragEnd => NetworkEvent::ControlNodeDragEnd(payload(raw)?),
			EventKey::HoverNode => NetworkEvent::HoverNode(payload(raw)?),
			EventKey::BlurNode => NetworkEvent::BlurNode(payload(raw)?),
			EventKey::HoverEdge => NetworkEvent::HoverEdge(payload(raw)?),
			EventKey::BlurEdge => NetworkEvent::BlurEdge(payload(raw)?),
			EventKey::Zoom => NetworkEvent::Zoom(payload(raw)?),
			EventKey::ShowPopup => NetworkEvent::ShowPopup(payload(raw)?),
			EventKey::HidePopup => NetworkEvent::HidePopup,
			EventKey::StartStabilizing => NetworkEvent::StartStabilizing,
			EventKey::StabilizationProgress => NetworkEvent::StabilizationProgress(payload(raw)?),
			EventKey::StabilizationIterationsDone => NetworkEvent::StabilizationIterationsDone,
			EventKey::Stabilized => NetworkEvent::Stabilized(payload(raw)?),
			EventKey::Resize => NetworkEvent::Resize(payload(raw)?),
			EventKey::InitRedraw => NetworkEvent::InitRedraw,
			EventKey::BeforeDrawing => NetworkEvent::BeforeDrawing,
			EventKey::AfterDrawing => NetworkEvent::AfterDrawing,
			EventKey::AnimationFinished => NetworkEvent::AnimationFinished,
			EventKey::ConfigChange => NetworkEvent::ConfigChange(raw.clone()),
		})
	}

	/// The key this event was fired under.
	pub fn key(&self) -> EventKey {
		match self {
			NetworkEvent::Click(_) => EventKey::Click,
			NetworkEvent::DoubleClick(_) => EventKey::DoubleClick,
			NetworkEvent::Context(_) => EventKey::Context,
			NetworkEvent::Hold(_) => EventKey::Hold,
			NetworkEvent::Release(_) => EventKey::Release,
			NetworkEvent::Select(_) => EventKey::Select,
			NetworkEvent::SelectNode(_) => EventKey::SelectNode,
			NetworkEvent::SelectEdge(_) => EventKey::SelectEdge,
			NetworkEvent::DeselectNode(_) => EventKey::DeselectNode,
			NetworkEvent::DeselectEdge(_) => EventKey::DeselectEdge,
			NetworkEvent::DragStart(_) => EventKey::DragStart,
			NetworkEvent::Dragging(_) => EventKey::Dragging,
			NetworkEvent::DragEnd(_) => EventKey::DragEnd,
			NetworkEvent::ControlNodeDragging(_) => EventKey::ControlNodeDragging,
			NetworkEvent::ControlNodeDragEnd(_) => EventKey::ControlNodeDragEnd,
			NetworkEvent::HoverNode(_) => EventKey::HoverNode,
			NetworkEvent::BlurNode(_) => EventKey::BlurNode,
			NetworkEvent::HoverEdge(_) => EventKey::HoverEdge,
			NetworkEvent::BlurEdge(_) => EventKey::BlurEdge,
			NetworkEvent::Zoom(_) => EventKey::Zoom,
			NetworkEvent::ShowPopup(_) => EventKey::ShowPopup,
			NetworkEvent::HidePopup => EventKey::HidePopup,
			NetworkEvent::StartStabilizing => EventKey::StartStabilizing,
			NetworkEvent::StabilizationProgress(_) => EventKey::StabilizationProgress,
			NetworkEvent::StabilizationIterationsDone => EventKey::StabilizationIterationsDone,
			NetworkEvent::Stabilized(_) => EventKey::Stabilized,
			NetworkEvent::Resize(_) => EventKey::Resize,
			NetworkEvent::InitRedraw => EventKey::InitRedraw,
			NetworkEvent::BeforeDrawing => EventKey::BeforeDrawing,
			NetworkEvent::AfterDrawing => EventKey::AfterDrawing,
			NetworkEvent::AnimationFinished => EventKey::AnimationFinished,
			NetworkEvent::ConfigChange(_) => EventKey::ConfigChange,
			NetworkEvent::Unrecognized { key, .. } => *key,
		}
	}
}

/// Payload of a collection `add`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AddPayload {
	/// Ids of added items, including generated ones.
	pub items: Vec<Id>,
}

/// Payload of a collection `update`.
///
/// Only the prior state is carried; read the collection for current data.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct UpdatePayload {
	/// Ids of the updated items.
	pub items: Vec<Id>,
	/// The items as they were before the update.
	#[serde(rename = "oldData")]
	pub old_data: Vec<FullItem>,
}

/// Payload of a collection `remove`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RemovePayload {
	/// Ids of the removed items.
	pub items: Vec<Id>,
	/// The removed items.
	#[serde(rename = "oldData")]
	pub old_data: Vec<FullItem>,
}

/// One of the two item collections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
	/// The node collection.
	Nodes,
	/// The edge collection.
	Edges,
}

impl Collection {
	/// Prefix of this collection's topics.
	pub const fn as_str(self) -> &'static str {
		match self {
			Collection::Nodes => "nodes",
			Collection::Edges => "edges",
		}
	}
}

/// Kind of collection notification, used for subscriptions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CollectionChange {
	/// Mount announcement.
	Mounted,
	/// Items added.
	Add,
	/// Items changed.
	Update,
	/// Items removed.
	Remove,
}

impl CollectionChange {
	/// Name used in topics.
	pub const fn as_str(self) -> &'static str {
		match self {
			CollectionChange::Mounted => "mounted",
			CollectionChange::Add => "add",
			CollectionChange::Update => "update",
			CollectionChange::Remove => "remove",
		}
	}
}

/// A change to one collection.
#[derive(Clone, Debug, PartialEq)]
pub enum CollectionEvent {
	/// The collection is registered and readable through the bridge.
	Mounted,
	/// Items added.
	Add(AddPayload),
	/// Existing items changed.
	Update(UpdatePayload),
	/// Items removed.
	Remove(RemovePayload),
}

impl CollectionEvent {
	/// The topic kind of this event.
	pub fn change(&self) -> CollectionChange {
		match self {
			CollectionEvent::Mounted => CollectionChange::Mounted,
			CollectionEvent::Add(_) => CollectionChange::Add,
			CollectionEvent::Update(_) => CollectionChange::Update,
			CollectionEvent::Remove(_) => CollectionChange::Remove,
		}
	}
}

/// Identifies one stream of notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
	/// An engine event.
	Network(EventKey),
	/// A collection change.
	Collection(Collection, CollectionChange),
}

impl fmt::Display for Topic {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Topic::Network(key) => f.write_str(key.as_str()),
			Topic::Collection(collection, change) => {
				write!(f, "{}-{}", collection.as_str(), change.as_str())
			}
		}
	}
}

/// Everything a subscriber can receive.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
	/// An engine event.
	Network(NetworkEvent),
	/// A collection change.
	Collection(Collection, CollectionEvent),
}

impl Notification {
	/// The topic handlers subscribe to for this notification.
	pub fn topic(&self) -> Topic {
		match self {
			Notification::Network(event) => Topic::Network(event.key()),
			Notification::Collection(collection, event) => {
				Topic::Collection(*collection, event.change())
			}
		}
	}
}

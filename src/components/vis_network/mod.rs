//! Reactive bridge between host-owned graph data and a network engine.
//!
//! The host owns two collections, nodes and edges, plus an option tree. A
//! [`Bridge`] mounts an [`Engine`] from them, forwards every later add, update,
//! remove and option change, and re-emits everything the engine reports as
//! typed [`Notification`]s:
//! - 32 engine events ([`EventKey`]) with their [`NetworkEvent`] payloads
//! - collection `mounted`, `add`, `update` and `remove` announcements
//!
//! Two engines are provided. [`ForceGraphEngine`] is a headless force-directed
//! simulation that runs anywhere; on wasm32, `VisEngine` drives the
//! JavaScript `vis.Network`. The [`VisNetwork`] component hosts either one in
//! the DOM.
//!
//! # Example
//!
//! ```ignore
//! let handle = NetworkHandle::new(BridgeConfig::default());
//! handle.subscribe(Topic::Network(EventKey::SelectNode), |n| log::info!("{n:?}"))?;
//!
//! view! {
//!     <VisNetwork handle=handle.clone() nodes=nodes edges=edges options=options />
//! }
//! ```

mod bridge;
mod component;
mod data_set;
mod engine;
mod error;
mod events;
pub mod options;
mod simulation;
mod types;
#[cfg(target_arch = "wasm32")]
mod vis;

pub use bridge::{Bridge, BridgeConfig, Lifecycle, NetworkInput, SubscriptionId};
pub use component::{EngineFactory, NetworkHandle, VisNetwork};
pub use data_set::{DEFAULT_ID_FIELD, DataSet, UpdatePlan};
pub use engine::{Engine, EngineCallback, EngineInput, Viewport};
pub use error::{DataError, EngineError, MountError, MutationError};
pub use events::{
	AddPayload, BaseEvent, ClickEvent, Collection, CollectionChange, CollectionEvent, ControlEdge,
	ControlNodeDraggingEvent, DeselectEvent, EdgeEvent, EventKey, HitTarget, NetworkEvent, NodeEvent,
	Notification, Pointer, Position, RemovePayload, ResizeEvent, Selection, StabilizationProgressEvent,
	StabilizedEvent, Topic, UnknownEventKey, UpdatePayload, ZoomDirection, ZoomEvent,
};
pub use options::HoverPolicy;
pub use simulation::{FRAME_DT, ForceGraphEngine, NodeInfo, SelectionState, ViewTransform};
pub use types::{FullItem, Id, Item};
#[cfg(target_arch = "wasm32")]
pub use vis::VisEngine;

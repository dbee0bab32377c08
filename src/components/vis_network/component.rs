//! Leptos component hosting a network engine in a container element.
//!
//! The component mounts a [`Bridge`] once its container exists, keeps the
//! engine sized to the container across window resizes, merges every change
//! of the `options` signal, and tears the engine down on cleanup. When the
//! engine is a [`ForceGraphEngine`] it also forwards mouse input and drives
//! its animation loop via `requestAnimationFrame`.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use leptos::prelude::*;
use log::{error, info, warn};
use serde_json::Value;
use wasm_bindgen::prelude::*;
use web_sys::{HtmlElement, MouseEvent, WheelEvent, Window};

use super::bridge::{Bridge, BridgeConfig, Lifecycle, NetworkInput, SubscriptionId};
use super::engine::{Engine, EngineInput, Viewport};
use super::error::{EngineError, MountError, MutationError};
use super::events::{Notification, Topic};
use super::simulation::{FRAME_DT, ForceGraphEngine};
use super::types::{Id, Item};

type FactoryFn = dyn Fn(&HtmlElement, EngineInput<'_>) -> Result<Box<dyn Engine>, EngineError>;

/// How long a press must last before it counts as a hold.
const HOLD_DELAY_MS: i32 = 500;

/// Pointer travel, in pixels, that cancels a pending hold.
const HOLD_SLOP: f64 = 5.0;

/// Builds the engine for a [`VisNetwork`] inside its container.
#[derive(Clone)]
pub struct EngineFactory(Rc<FactoryFn>);

impl EngineFactory {
	/// Wrap a closure that builds an engine inside the given container.
	pub fn new(
		factory: impl Fn(&HtmlElement, EngineInput<'_>) -> Result<Box<dyn Engine>, EngineError> + 'static,
	) -> Self {
		Self(Rc::new(factory))
	}

	/// The headless [`ForceGraphEngine`].
	pub fn simulation() -> Self {
		Self::new(|_, input| ForceGraphEngine::create(input))
	}

	/// A `vis.Network` rendered into the container.
	#[cfg(target_arch = "wasm32")]
	pub fn vis() -> Self {
		Self::new(|container, input| super::vis::VisEngine::factory(container.clone())(input))
	}

	fn build(
		&self,
		container: &HtmlElement,
		input: EngineInput<'_>,
	) -> Result<Box<dyn Engine>, EngineError> {
		(self.0)(container, input)
	}
}

impl Default for EngineFactory {
	#[cfg(target_arch = "wasm32")]
	fn default() -> Self {
		Self::vis()
	}

	#[cfg(not(target_arch = "wasm32"))]
	fn default() -> Self {
		Self::simulation()
	}
}

/// Clone-able handle to the bridge behind a [`VisNetwork`].
///
/// Calls made while the bridge is already borrowed, for example from a
/// notification handler, fail with [`MutationError::Busy`] instead of
/// re-entering it.
#[derive(Clone, Default)]
pub struct NetworkHandle {
	bridge: Rc<RefCell<Bridge>>,
}

impl NetworkHandle {
	/// A handle to a fresh, unmounted bridge.
	pub fn new(config: BridgeConfig) -> Self {
		Self {
			bridge: Rc::new(RefCell::new(Bridge::new(config))),
		}
	}

	/// Read access to the bridge.
	pub fn with<R>(&self, f: impl FnOnce(&Bridge) -> R) -> Result<R, MutationError> {
		let bridge = self.bridge.try_borrow().map_err(|_| MutationError::Busy)?;
		Ok(f(&bridge))
	}

	/// Write access to the bridge.
	pub fn with_mut<R>(&self, f: impl FnOnce(&mut Bridge) -> R) -> Result<R, MutationError> {
		let mut bridge = self
			.bridge
			.try_borrow_mut()
			.map_err(|_| MutationError::Busy)?;
		Ok(f(&mut bridge))
	}

	/// Run `f` against the engine if it is a `T`.
	pub fn with_engine<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<Option<R>, MutationError> {
		self.with_mut(|bridge| bridge.engine_as_mut::<T>().map(f))
	}

	/// Mount the bridge, then announce both collections once the handle is
	/// released, so mounted handlers may call back into it.
	pub fn mount<F>(&self, input: NetworkInput, viewport: Viewport, factory: F) -> Result<(), MountError>
	where
		F: FnOnce(EngineInput<'_>) -> Result<Box<dyn Engine>, EngineError>,
	{
		let announcement = self
			.with_mut(|bridge| bridge.mount_unannounced(input, viewport, factory))
			.map_err(|_| MountError::Busy)??;
		announcement.announce();
		Ok(())
	}

	/// Current lifecycle. Reports `Active` while the bridge is borrowed.
	pub fn lifecycle(&self) -> Lifecycle {
		self.with(Bridge::lifecycle).unwrap_or(Lifecycle::Active)
	}

	/// Shorthand for `lifecycle() == Lifecycle::Active`.
	pub fn is_mounted(&self) -> bool {
		self.lifecycle() == Lifecycle::Active
	}

	/// See [`Bridge::subscribe`].
	pub fn subscribe(
		&self,
		topic: Topic,
		handler: impl Fn(&Notification) + 'static,
	) -> Result<SubscriptionId, MutationError> {
		self.with(|bridge| bridge.subscribe(topic, handler))
	}

	/// See [`Bridge::subscribe_all`].
	pub fn subscribe_all(
		&self,
		handler: impl Fn(&Notification) + 'static,
	) -> Result<SubscriptionId, MutationError> {
		self.with(|bridge| bridge.subscribe_all(handler))
	}

	/// Drop a subscription. `Ok(false)` if it was already gone.
	pub fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, MutationError> {
		self.with(|bridge| bridge.unsubscribe(id))
	}

	/// Add nodes; see [`Bridge::add`].
	pub fn add_nodes(&self, items: Vec<Item>) -> Result<Vec<Id>, MutationError> {
		self.with_mut(|bridge| bridge.add_nodes(items))?
	}

	/// Upsert nodes; see [`Bridge::update`].
	pub fn update_nodes(&self, items: Vec<Item>) -> Result<Vec<Id>, MutationError> {
		self.with_mut(|bridge| bridge.update_nodes(items))?
	}

	/// Remove nodes by id.
	pub fn remove_nodes(&self, ids: &[Id]) -> Result<Vec<Id>, MutationError> {
		self.with_mut(|bridge| bridge.remove_nodes(ids))?
	}

	/// Add edges.
	pub fn add_edges(&self, items: Vec<Item>) -> Result<Vec<Id>, MutationError> {
		self.with_mut(|bridge| bridge.add_edges(items))?
	}

	/// Upsert edges.
	pub fn update_edges(&self, items: Vec<Item>) -> Result<Vec<Id>, MutationError> {
		self.with_mut(|bridge| bridge.update_edges(items))?
	}

	/// Remove edges by id.
	pub fn remove_edges(&self, ids: &[Id]) -> Result<Vec<Id>, MutationError> {
		self.with_mut(|bridge| bridge.remove_edges(ids))?
	}

	/// Merge `patch` into the host options.
	pub fn set_options(&self, patch: Value) -> Result<(), MutationError> {
		self.with_mut(|bridge| bridge.set_options(patch))?
	}

	/// Replace the host options outright.
	pub fn replace_options(&self, options: Value) -> Result<(), MutationError> {
		self.with_mut(|bridge| bridge.replace_options(options))?
	}

	/// See [`Bridge::resize`].
	pub fn resize(&self, width: f64, height: f64) -> Result<(), MutationError> {
		self.with_mut(|bridge| bridge.resize(width, height))?
	}

	/// Tear the engine down. `Ok(false)` if nothing was mounted.
	pub fn unmount(&self) -> Result<bool, MutationError> {
		self.with_mut(Bridge::unmount)
	}
}

/// Turns a press that stays put into a hold on the simulated engine.
#[derive(Default)]
struct HoldTimer {
	pending: Cell<Option<i32>>,
	origin: Cell<(f64, f64)>,
	callback: RefCell<Option<Closure<dyn FnMut()>>>,
}

impl HoldTimer {
	fn start(self: &Rc<Self>, handle: &NetworkHandle, x: f64, y: f64) {
		self.cancel();
		let Some(window) = web_sys::window() else {
			return;
		};
		self.origin.set((x, y));
		let (timer, handle) = (Rc::downgrade(self), handle.clone());
		let callback = Closure::<dyn FnMut()>::new(move || {
			if let Some(timer) = timer.upgrade() {
				timer.pending.set(None);
			}
			let _ = handle.with_engine::<ForceGraphEngine, _>(|engine| engine.hold(x, y));
		});
		self.pending.set(
			window
				.set_timeout_with_callback_and_timeout_and_arguments_0(
					callback.as_ref().unchecked_ref(),
					HOLD_DELAY_MS,
				)
				.ok(),
		);
		*self.callback.borrow_mut() = Some(callback);
	}

	fn moved(&self, x: f64, y: f64) {
		let (ox, oy) = self.origin.get();
		if (x - ox).hypot(y - oy) > HOLD_SLOP {
			self.cancel();
		}
	}

	fn cancel(&self) {
		if let (Some(id), Some(window)) = (self.pending.take(), web_sys::window()) {
			window.clear_timeout_with_handle(id);
		}
	}
}

/// Listeners, timers and the notification subscription owned by one
/// mounted component.
#[derive(Default)]
struct Attachments {
	resize: Option<Closure<dyn FnMut()>>,
	animate: Rc<RefCell<Option<Closure<dyn FnMut()>>>>,
	frame: Rc<Cell<Option<i32>>>,
	hold: Rc<HoldTimer>,
	subscription: Option<SubscriptionId>,
}

impl Attachments {
	/// Pass every notification to `handler`, replacing an earlier forward.
	fn forward(
		&mut self,
		handle: &NetworkHandle,
		handler: impl Fn(&Notification) + 'static,
	) -> Result<(), MutationError> {
		if let Some(previous) = self.subscription.take() {
			handle.unsubscribe(previous)?;
		}
		self.subscription = Some(handle.subscribe_all(handler)?);
		Ok(())
	}

	/// Unsubscribe the forward and unmount the bridge.
	fn release(&mut self, handle: &NetworkHandle) {
		if let Some(id) = self.subscription.take() {
			if let Err(err) = handle.unsubscribe(id) {
				warn!("vis-network: could not drop notification forward: {err}");
			}
		}
		let _ = handle.unmount();
	}

	fn detach(&mut self) {
		let Some(window) = web_sys::window() else {
			return;
		};
		self.hold.cancel();
		if let Some(cb) = self.resize.take() {
			let _ = window.remove_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
		}
		if let Some(id) = self.frame.take() {
			let _ = window.cancel_animation_frame(id);
		}
		self.animate.borrow_mut().take();
	}
}

fn container_size(container: &HtmlElement) -> Viewport {
	let fallback = Viewport::default();
	let (w, h) = (container.client_width(), container.client_height());
	Viewport {
		width: if w > 0 { w as f64 } else { fallback.width },
		height: if h > 0 { h as f64 } else { fallback.height },
	}
}

fn local_position(container: &HtmlElement, ev: &MouseEvent) -> (f64, f64) {
	let rect = container.get_bounding_client_rect();
	(
		ev.client_x() as f64 - rect.left(),
		ev.client_y() as f64 - rect.top(),
	)
}

/// Hosts a network engine in a `<div>`.
///
/// `nodes`, `edges` and the initial `options` are read once, at mount. Later
/// changes to `options` are merged into the live configuration; node and edge
/// changes go through the `handle`. Every notification is passed to
/// `on_notification`.
#[component]
pub fn VisNetwork(
	/// Bridge shared with the host for mutations and subscriptions.
	handle: NetworkHandle,
	/// Initial nodes.
	#[prop(into, default = Signal::stored(Vec::new()))]
	nodes: Signal<Vec<Item>>,
	/// Initial edges.
	#[prop(into, default = Signal::stored(Vec::new()))]
	edges: Signal<Vec<Item>>,
	/// Host options; later values are merged in.
	#[prop(into, default = Signal::stored(Value::Null))]
	options: Signal<Value>,
	/// Engine to build. Defaults to `vis.Network` on wasm32.
	#[prop(optional)]
	engine: Option<EngineFactory>,
	/// Receives every notification.
	#[prop(optional)]
	on_notification: Option<Callback<Notification>>,
	/// CSS class of the container.
	#[prop(into, default = "vis-network".to_string())]
	class: String,
) -> impl IntoView {
	let container_ref = NodeRef::<leptos::html::Div>::new();
	let (mount_error, set_mount_error) = signal(None::<String>);
	let hold = Rc::new(HoldTimer::default());
	let attachments = StoredValue::new_local(Attachments {
		hold: Rc::clone(&hold),
		..Attachments::default()
	});
	let factory = engine.unwrap_or_default();

	let handle_mount = handle.clone();
	Effect::new(move |_| {
		let Some(div) = container_ref.get() else {
			return;
		};
		if handle_mount.is_mounted() {
			return;
		}
		let container: HtmlElement = div.into();
		let Some(window): Option<Window> = web_sys::window() else {
			return;
		};

		if let Some(callback) = on_notification {
			let forwarded = attachments.try_update_value(|att| {
				att.forward(&handle_mount, move |notification| {
					callback.run(notification.clone());
				})
			});
			if let Some(Err(err)) = forwarded {
				error!("vis-network: could not forward notifications: {err}");
			}
		}

		let input = NetworkInput {
			nodes: nodes.get_untracked(),
			edges: edges.get_untracked(),
			options: options.get_untracked(),
		};
		let viewport = container_size(&container);
		match handle_mount.mount(input, viewport, |input| factory.build(&container, input)) {
			Ok(()) => set_mount_error.set(None),
			Err(MountError::Busy) => {
				error!("vis-network: mount failed: {}", MountError::Busy);
				return;
			}
			Err(err) => {
				error!("vis-network: mount failed: {err}");
				set_mount_error.set(Some(err.to_string()));
				return;
			}
		}

		let (handle_resize, container_resize) = (handle_mount.clone(), container.clone());
		let resize: Closure<dyn FnMut()> = Closure::new(move || {
			let Viewport { width, height } = container_size(&container_resize);
			if let Err(err) = handle_resize.resize(width, height) {
				error!("vis-network: resize to {width}x{height} failed: {err}");
			}
		});
		let _ = window.add_event_listener_with_callback("resize", resize.as_ref().unchecked_ref());

		let simulated = handle_mount
			.with_engine::<ForceGraphEngine, _>(|_| ())
			.ok()
			.flatten()
			.is_some();
		attachments.update_value(|att| {
			att.resize = Some(resize);
			if !simulated {
				return;
			}
			let (animate, frame) = (Rc::clone(&att.animate), Rc::clone(&att.frame));
			let (animate_inner, handle_anim) = (Rc::clone(&animate), handle_mount.clone());
			*animate.borrow_mut() = Some(Closure::new(move || {
				frame.set(None);
				let _ = handle_anim.with_engine::<ForceGraphEngine, _>(|engine| engine.frame(FRAME_DT));
				if !handle_anim.is_mounted() {
					return;
				}
				if let (Some(cb), Some(win)) = (animate_inner.borrow().as_ref(), web_sys::window()) {
					frame.set(win.request_animation_frame(cb.as_ref().unchecked_ref()).ok());
				}
			}));
			if let Some(cb) = animate.borrow().as_ref() {
				att.frame
					.set(window.request_animation_frame(cb.as_ref().unchecked_ref()).ok());
			}
		});
		info!("vis-network: component mounted at {}x{}", viewport.width, viewport.height);
	});

	let handle_options = handle.clone();
	Effect::new(move |_| {
		let patch = options.get();
		if !handle_options.is_mounted() {
			return;
		}
		if let Err(err) = handle_options.set_options(patch) {
			error!("vis-network: options update failed: {err}");
		}
	});

	let handle_cleanup = handle.clone();
	let cleanup = StoredValue::new_local(handle_cleanup);
	on_cleanup(move || {
		attachments.try_update_value(|att| {
			att.detach();
			cleanup.try_with_value(|handle| att.release(handle));
		});
	});

	// Some((x, y)) when a simulated engine took the input.
	let pointer = move |handle: &NetworkHandle, ev: &MouseEvent, f: fn(&mut ForceGraphEngine, f64, f64)| {
		let div = container_ref.get()?;
		let container: HtmlElement = div.into();
		let (x, y) = local_position(&container, ev);
		handle
			.with_engine::<ForceGraphEngine, _>(|engine| f(engine, x, y))
			.ok()
			.flatten()
			.map(|()| (x, y))
	};

	let (handle_md, hold_md) = (handle.clone(), Rc::clone(&hold));
	let on_mousedown = move |ev: MouseEvent| {
		if let Some((x, y)) = pointer(&handle_md, &ev, ForceGraphEngine::pointer_down) {
			hold_md.start(&handle_md, x, y);
		}
	};
	let (handle_mm, hold_mm) = (handle.clone(), Rc::clone(&hold));
	let on_mousemove = move |ev: MouseEvent| {
		if let Some((x, y)) = pointer(&handle_mm, &ev, ForceGraphEngine::pointer_move) {
			hold_mm.moved(x, y);
		}
	};
	let (handle_mu, hold_mu) = (handle.clone(), Rc::clone(&hold));
	let on_mouseup = move |ev: MouseEvent| {
		hold_mu.cancel();
		pointer(&handle_mu, &ev, ForceGraphEngine::pointer_up);
	};
	let handle_dc = handle.clone();
	let on_dblclick = move |ev: MouseEvent| {
		pointer(&handle_dc, &ev, ForceGraphEngine::double_click);
	};
	let handle_cm = handle.clone();
	let on_contextmenu = move |ev: MouseEvent| {
		if handle_cm
			.with_engine::<ForceGraphEngine, _>(|_| ())
			.ok()
			.flatten()
			.is_some()
		{
			ev.prevent_default();
		}
		pointer(&handle_cm, &ev, ForceGraphEngine::context_menu);
	};
	let handle_ml = handle.clone();
	let on_mouseleave = move |_: MouseEvent| {
		hold.cancel();
		let _ = handle_ml.with_engine::<ForceGraphEngine, _>(ForceGraphEngine::pointer_leave);
	};
	let handle_wh = handle;
	let on_wheel = move |ev: WheelEvent| {
		let Some(div) = container_ref.get() else {
			return;
		};
		let container: HtmlElement = div.into();
		let (x, y) = local_position(&container, &ev);
		let delta = ev.delta_y();
		let handled = handle_wh
			.with_engine::<ForceGraphEngine, _>(|engine| engine.wheel(x, y, delta))
			.ok()
			.flatten()
			.is_some();
		if handled {
			ev.prevent_default();
		}
	};

	view! {
		<div
			node_ref=container_ref
			class=class
			on:mousedown=on_mousedown
			on:mousemove=on_mousemove
			on:mouseup=on_mouseup
			on:mouseleave=on_mouseleave
			on:dblclick=on_dblclick
			on:contextmenu=on_contextmenu
			on:wheel=on_wheel
			style="position: relative; width: 100%; height: 100%;"
		>
			{move || {
				mount_error
					.get()
					.map(|message| {
						view! {
							<div class="vis-network-error" role="alert">
								{message}
							</div>
						}
					})
			}}
		</div>
	}
}

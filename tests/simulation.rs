mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::*;
use serde_json::json;
use vis_network_bridge::components::vis_network::{
	Bridge, EngineError, EventKey, FRAME_DT, ForceGraphEngine, Id, MountError, NetworkEvent,
	NetworkInput, Notification, StabilizationProgressEvent, StabilizedEvent, Topic,
};

fn placed_input(options: serde_json::Value) -> NetworkInput {
	NetworkInput {
		nodes: items(json!([
			{"id": 1, "x": -100.0, "y": 0.0},
			{"id": 2, "x": 100.0, "y": 0.0, "title": "second"},
		])),
		edges: items(json!([{"id": 10, "from": 1, "to": 2}])),
		options,
	}
}

fn mount(options: serde_json::Value) -> (Bridge, Rc<RefCell<Vec<Notification>>>) {
	let mut bridge = Bridge::default();
	let log = record(&bridge);
	bridge
		.mount(placed_input(options), wide(), ForceGraphEngine::create)
		.unwrap();
	log.borrow_mut().clear();
	(bridge, log)
}

#[test]
fn first_frame_reports_stabilization_through_the_bridge() {
	let (mut bridge, log) = mount(json!({
		"physics": {"stabilization": {"iterations": 60, "updateInterval": 25}},
	}));

	bridge
		.engine_as_mut::<ForceGraphEngine>()
		.unwrap()
		.frame(FRAME_DT);

	let log = log.borrow();
	let progress: Vec<&NetworkEvent> = log
		.iter()
		.filter_map(|n| match n {
			Notification::Network(event @ NetworkEvent::StabilizationProgress(_)) => Some(event),
			_ => None,
		})
		.collect();
	assert_eq!(
		progress,
		vec![
			&NetworkEvent::StabilizationProgress(StabilizationProgressEvent {
				iterations: 25,
				total: 60
			}),
			&NetworkEvent::StabilizationProgress(StabilizationProgressEvent {
				iterations: 50,
				total: 60
			}),
		]
	);
	assert!(log.contains(&Notification::Network(NetworkEvent::Stabilized(
		StabilizedEvent { iterations: 60 }
	))));
	assert_eq!(
		log.last().map(Notification::topic),
		Some(Topic::Network(EventKey::AfterDrawing))
	);
}

#[test]
fn clicking_a_node_selects_it_via_typed_events() {
	let (mut bridge, log) = mount(json!({"physics": {"enabled": false}}));
	let engine = bridge.engine_as_mut::<ForceGraphEngine>().unwrap();
	// World (100, 0) is screen (612, 384) in a 1024x768 view.
	engine.pointer_down(612.0, 384.0);
	engine.pointer_up(612.0, 384.0);

	assert_eq!(topics(&log), vec!["select", "selectNode", "click"]);
	let log = log.borrow();
	let Notification::Network(NetworkEvent::Click(click)) = &log[2] else {
		panic!("expected a click");
	};
	assert_eq!(click.base.nodes, vec![Id::Int(2)]);
	assert_eq!(click.base.edges, Vec::<Id>::new());
	assert_eq!(click.base.pointer.canvas.x, 100.0);
}

#[test]
fn narrow_viewport_silences_hover_but_keeps_popups() {
	let (mut bridge, log) = mount(json!({"physics": {"enabled": false}}));
	bridge.resize(600.0, 768.0).unwrap();
	log.borrow_mut().clear();

	// The view did not recentre; world (100, 0) is still screen (612, 384).
	let engine = bridge.engine_as_mut::<ForceGraphEngine>().unwrap();
	engine.pointer_move(612.0, 384.0);

	assert_eq!(topics(&log), vec!["showPopup"]);
	assert_eq!(
		log.borrow()[0],
		Notification::Network(NetworkEvent::ShowPopup(Id::Int(2)))
	);
}

#[test]
fn host_mutations_reach_the_simulation() {
	let (mut bridge, _) = mount(json!({"physics": {"enabled": false}}));
	bridge
		.add_nodes(items(json!([{"id": 3, "x": 0.0, "y": 200.0}])))
		.unwrap();
	bridge.remove_edges(&[Id::Int(10)]).unwrap();

	let engine = bridge.engine_as::<ForceGraphEngine>().unwrap();
	assert_eq!(engine.node_count(), 3);
	assert_eq!(engine.position(&Id::Int(3)), Some((0.0, 200.0)));
	assert_eq!(engine.edge_count(), 0);
}

#[test]
fn simulation_rejections_roll_the_collection_back() {
	let (mut bridge, log) = mount(json!({}));
	let err = bridge
		.update_nodes(items(json!([{"id": 1, "x": "far left"}])))
		.unwrap_err();
	assert!(err.to_string().contains("update_nodes"));
	assert!(log.borrow().is_empty());
	assert_eq!(
		bridge.nodes().unwrap().get(&Id::Int(1)).unwrap().get("x"),
		Some(&json!(-100.0))
	);
}

#[test]
fn construction_errors_surface_from_mount() {
	let mut bridge = Bridge::default();
	let input = NetworkInput {
		options: json!({"physics": {"stabilization": {"iterations": "many"}}}),
		..NetworkInput::default()
	};
	let err = bridge
		.mount(input, wide(), ForceGraphEngine::create)
		.unwrap_err();
	assert!(matches!(err, MountError::Engine(EngineError::Construction(_))));
	assert!(!bridge.is_mounted());
}

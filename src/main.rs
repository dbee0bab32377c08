//! Client entrypoint for the CSR build.

// Bin target reuses lib deps, silence noisy lint.
#![allow(unused_crate_dependencies)]

use leptos::prelude::*;
use vis_network_bridge::{BridgeConfig, NetworkHandle, VisNetwork, init_logging, load_network_input};

fn main() {
	init_logging();

	let input = load_network_input("network-data").unwrap_or_default();
	let handle = NetworkHandle::new(BridgeConfig::default());

	mount_to_body(move || {
		view! {
			<VisNetwork
				handle=handle
				nodes=input.nodes
				edges=input.edges
				options=input.options
			/>
		}
	})
}

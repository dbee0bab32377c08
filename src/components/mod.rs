//! Leptos components.

pub mod vis_network;

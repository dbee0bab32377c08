//! Error types for mounting the network and forwarding mutations to it.

use serde_json::Value;

use super::types::Id;

/// A node, edge or option value the collections refuse to hold.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum DataError {
	/// The id (or an edge endpoint) is neither an integer nor a string.
	#[error("invalid `{field}` value {value}: ids must be integers or strings")]
	InvalidId { field: String, value: Value },

	/// An add targeted an id that is already registered.
	#[error("an item with id {0} already exists")]
	DuplicateId(Id),
}

/// Failure reported by the engine instance itself.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum EngineError {
	/// The engine could not be created from the initial data and options.
	#[error("engine construction failed: {0}")]
	Construction(String),

	/// The engine refused a single operation; its other state is unaffected.
	#[error("engine rejected {operation}: {reason}")]
	Rejected {
		/// Which operation was refused.
		operation: &'static str,
		/// The engine's own message.
		reason: String,
	},

	/// The instance was already destroyed.
	#[error("engine instance has been destroyed")]
	Destroyed,
}

/// Why a mount attempt failed. No engine instance survives any of these.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum MountError {
	/// A session is already active; unmount first.
	#[error("bridge is already mounted")]
	AlreadyMounted,

	/// The handle was borrowed when the mount was attempted.
	#[error("network is busy dispatching; retry after the current handler returns")]
	Busy,

	/// Ids or edge endpoints in the initial data.
	#[error("initial data is malformed: {0}")]
	Data(#[from] DataError),

	/// The host passed something other than an object or `null`.
	#[error("initial options must be an object, got {0}")]
	InvalidOptions(Value),

	/// The factory failed.
	#[error(transparent)]
	Engine(#[from] EngineError),
}

/// Why a single add/update/remove or option change failed.
///
/// Local to the call that produced it: the mounted engine stays usable.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum MutationError {
	/// No session is active.
	#[error("bridge is not mounted")]
	NotMounted,

	/// The handle is already borrowed, typically because the call was made
	/// from inside a notification handler.
	#[error("network is busy dispatching; retry after the current handler returns")]
	Busy,

	/// The mutation is malformed; nothing reached the engine.
	#[error(transparent)]
	Data(#[from] DataError),

	/// The patch was not an object or `null`.
	#[error("options must be an object, got {0}")]
	InvalidOptions(Value),

	/// The engine refused; the collections are unchanged.
	#[error(transparent)]
	Engine(#[from] EngineError),
}

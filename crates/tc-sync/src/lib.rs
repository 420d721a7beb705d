//! Session store contract and live state synchronisation.
//!
//! The session server is the single source of truth. Every mutating call
//! returns the full session snapshot, and a push socket broadcasts the same
//! snapshot to every subscriber after each mutation.

pub mod baseline;
pub mod channel;
pub mod config;
pub mod error;
pub mod http;
pub mod memory;
pub mod protocol;
pub mod store;

pub use baseline::Baseline;
pub use channel::{ChannelState, Connector, LiveChannel, ReconnectPolicy, WsConnector};
pub use config::SyncConfig;
pub use error::{StoreError, SyncError};
pub use http::HttpStore;
pub use memory::{MemoryConnector, MemoryStore};
pub use store::{PresetFields, PresetPatch, SessionStore};

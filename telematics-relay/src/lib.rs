//! Relay from the telemetry broker topic to real-time dashboard clients.

pub mod bridge;
pub mod config;
pub mod http;
pub mod hub;
pub mod mqtt;

pub use bridge::{BridgeState, RelayBridge, TopicSubscriber};
pub use hub::{ClientHub, OutboundFrame, PushEvent, VEHICLE_DATA_EVENT};

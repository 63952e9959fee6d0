//! MQTT subscription backend
//!
//! Split into pure connection/state handling (`connection`) and the impure
//! event-loop supervisor (`client`).

pub mod client;
pub mod connection;

pub use client::MqttSubscriber;
pub use connection::{configure_mqtt_options, LinkState, ReconnectConfig};

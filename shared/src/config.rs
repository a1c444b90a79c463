use std::{default::Default, time::Duration};

use serde::{Deserialize, Serialize};

use crate::routing_table::RouteExpiry;

/// Contains Config properties which will be used by a Node
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Never shed links below this degree
    pub min_degree: u32,
    /// How many of the nearest peers a node aims to be linked with
    pub soft_limit: u32,
    /// Absolute maximum number of live links
    pub hard_cap: u32,
    /// How often our own descriptor, and the fresh ones we know of, are
    /// broadcast to every direct neighbor
    pub descriptor_interval: Duration,
    /// A descriptor refreshed longer ago than this is no longer re-gossiped
    pub descriptor_ttl: Duration,
    /// How often the topology pass runs even when no descriptor arrives
    pub optimize_interval: Duration,
    /// A connection still negotiating after this long is abandoned
    pub connect_timeout: Duration,
    /// Wait between a failed negotiation and the next offer
    pub reconnect_backoff: Duration,
    /// How many times in a row a failed negotiation is retried
    pub max_reconnect_attempts: u32,
    /// Whole seconds during which a just-disconnected peer is not re-dialed
    pub block_cooldown_secs: u32,
    /// A `Disconnecting` peer whose link is still up after this long goes
    /// back to `Connected`
    pub disconnect_request_timeout: Duration,
    /// Configuration for the randomized leader rotation
    pub leader: LeaderConfig,
    /// How long learned routes are kept
    pub route_expiry: RouteExpiry,
    /// Distance tiers and the interval at which each is sent published state
    pub send_tiers: Vec<SendTier>,
    /// STUN servers handed to the transport factory
    pub stun_urls: Vec<String>,
    /// Where the rendezvous service listens
    pub signaling_address: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            min_degree: 3,
            soft_limit: 20,
            hard_cap: 80,
            descriptor_interval: Duration::from_millis(1500),
            descriptor_ttl: Duration::from_secs(5),
            optimize_interval: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(3),
            reconnect_backoff: Duration::from_secs(3),
            max_reconnect_attempts: 3,
            block_cooldown_secs: 1,
            disconnect_request_timeout: Duration::from_secs(10),
            leader: LeaderConfig::default(),
            route_expiry: RouteExpiry::Never,
            send_tiers: SendTier::default_tiers(),
            stun_urls: vec!["stun:stun.l.google.com:19302".to_string()],
            signaling_address: "ws://localhost:8080/ws".to_string(),
        }
    }
}

/// Leader rotation staggers topology changes across the swarm: each node
/// acts only when its own randomly-seeded countdown reaches zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderConfig {
    /// When false every optimization pass acts immediately
    pub enabled: bool,
    /// Bounds for the countdown's starting value
    pub initial_min: Duration,
    pub initial_max: Duration,
    /// Bounds for how many countdown seconds pass per real second
    pub decay_min: f32,
    pub decay_max: f32,
}

impl LeaderConfig {
    /// Leader gating switched off, so every pass acts
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

impl Default for LeaderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_min: Duration::from_secs(1),
            initial_max: Duration::from_secs(5),
            decay_min: 0.5,
            decay_max: 1.5,
        }
    }
}

/// Peers within `radius` are sent published state every `interval`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SendTier {
    pub radius: f32,
    pub interval: Duration,
}

impl SendTier {
    pub fn new(radius: f32, interval: Duration) -> Self {
        Self { radius, interval }
    }

    pub fn default_tiers() -> Vec<SendTier> {
        vec![
            SendTier::new(3.0, Duration::from_millis(50)),
            SendTier::new(6.0, Duration::from_millis(100)),
            SendTier::new(12.0, Duration::from_millis(200)),
            SendTier::new(24.0, Duration::from_millis(250)),
            SendTier::new(48.0, Duration::from_millis(500)),
            SendTier::new(96.0, Duration::from_secs(1)),
        ]
    }
}

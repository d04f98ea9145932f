//! # Physical Model
//!
//! Stateless functions turning a pair of node descriptors into the fixed
//! properties of a link: distance, latency, channel kind, quality and
//! bandwidth. All randomness is drawn from the injected `RandomSource`.
//!
//! `assess_link` draws in a fixed order so scripted sources are predictable:
//! 1. channel coin flip (ground-ground pairs only)
//! 2. latency jitter
//! 3. quality noise
//! 4. bandwidth factor

use std::cmp::Ordering;
use std::time::Duration;

use super::config::PhysicsConfig;
use super::entities::{clamp_quality, NodeDescriptor};
use super::value_objects::{ChannelKind, Location, NodeKind};
use crate::ports::RandomSource;

/// Fixed properties of a prospective link.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinkProfile {
    /// Distance in km
    pub distance: f64,
    /// One-way latency
    pub latency: Duration,
    /// Physical medium
    pub channel: ChannelKind,
    /// Initial quality in `[0.5, 1.0]`
    pub quality: f64,
    /// Bandwidth in units/sec
    pub bandwidth: f64,
}

/// Compute every link property for the pair `(a, b)`.
///
/// Each endpoint's `op_latency` is added to the link latency, and the link
/// quality never exceeds either endpoint's `base_quality` (nor drops below
/// `QUALITY_MIN`).
pub fn assess_link(
    a: &NodeDescriptor,
    b: &NodeDescriptor,
    config: &PhysicsConfig,
    rng: &dyn RandomSource,
) -> LinkProfile {
    let distance = distance(&a.location, &b.location, config.earth_radius_km);
    let channel = channel_kind(a.kind, b.kind, rng);
    let latency = latency(distance, a.kind, b.kind, config, rng)
        .saturating_add(a.capability.op_latency)
        .saturating_add(b.capability.op_latency);
    let hardware = a.capability.base_quality.min(b.capability.base_quality);
    let quality = clamp_quality(quality(distance, channel, config, rng).min(hardware));
    let bandwidth = bandwidth(channel, distance, config, rng);
    LinkProfile {
        distance,
        latency,
        channel,
        quality,
        bandwidth,
    }
}

fn location_order(a: &Location, b: &Location) -> Ordering {
    a.latitude
        .total_cmp(&b.latitude)
        .then(a.longitude.total_cmp(&b.longitude))
        .then(a.altitude.unwrap_or(0.0).total_cmp(&b.altitude.unwrap_or(0.0)))
}

/// Distance between two locations in km.
///
/// Great-circle (haversine) distance when neither endpoint has an altitude,
/// otherwise straight-line distance between the Cartesian positions on a
/// sphere of `radius_km` plus each altitude. Endpoints are put in a canonical
/// order first so the result is bit-for-bit symmetric.
pub fn distance(a: &Location, b: &Location, radius_km: f64) -> f64 {
    let (a, b) = match location_order(a, b) {
        Ordering::Greater => (b, a),
        _ => (a, b),
    };

    if a.altitude.is_none() && b.altitude.is_none() {
        haversine(a, b, radius_km)
    } else {
        let pa = cartesian(a, radius_km);
        let pb = cartesian(b, radius_km);
        let dx = pa[0] - pb[0];
        let dy = pa[1] - pb[1];
        let dz = pa[2] - pb[2];
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

fn haversine(a: &Location, b: &Location, radius_km: f64) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * radius_km * h.sqrt().min(1.0).asin()
}

fn cartesian(loc: &Location, radius_km: f64) -> [f64; 3] {
    let r = radius_km + loc.altitude.unwrap_or(0.0);
    let lat = loc.latitude.to_radians();
    let lon = loc.longitude.to_radians();
    [
        r * lat.cos() * lon.cos(),
        r * lat.cos() * lon.sin(),
        r * lat.sin(),
    ]
}

fn duration_from_millis_f64(millis: f64) -> Duration {
    if !millis.is_finite() || millis <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(millis / 1000.0).unwrap_or(Duration::MAX)
}

/// Pure propagation delay over `distance` km.
pub fn propagation_delay(distance: f64, config: &PhysicsConfig) -> Duration {
    duration_from_millis_f64(distance / config.propagation_km_per_ms)
}

/// One-way latency: propagation plus both endpoints' processing delay plus
/// a uniform jitter in `[0, latency_jitter)`. Never below pure propagation.
pub fn latency(
    distance: f64,
    kind_a: NodeKind,
    kind_b: NodeKind,
    config: &PhysicsConfig,
    rng: &dyn RandomSource,
) -> Duration {
    let processing =
        config.processing_delay.for_kind(kind_a) + config.processing_delay.for_kind(kind_b);
    let jitter = config.latency_jitter.mul_f64(rng.next_f64().clamp(0.0, 1.0));
    propagation_delay(distance, config)
        .saturating_add(processing)
        .saturating_add(jitter)
}

/// Channel kind for an unordered pair of node kinds.
///
/// The ground-ground pair is the only nondeterministic entry: a coin flip
/// between guided and relay.
pub fn channel_kind(kind_a: NodeKind, kind_b: NodeKind, rng: &dyn RandomSource) -> ChannelKind {
    use NodeKind::{Airborne, Ground, Orbital, Subsurface};

    match (kind_a, kind_b) {
        (Ground, Ground) => {
            if rng.chance(0.5) {
                ChannelKind::Guided
            } else {
                ChannelKind::Relay
            }
        }
        (Ground, Orbital)
        | (Orbital, Ground)
        | (Orbital, Orbital)
        | (Orbital, Airborne)
        | (Airborne, Orbital) => ChannelKind::LineOfSight,
        (Ground, Subsurface) | (Subsurface, Ground) | (Subsurface, Subsurface) => {
            ChannelKind::Guided
        }
        (Orbital, Subsurface)
        | (Subsurface, Orbital)
        | (Subsurface, Airborne)
        | (Airborne, Subsurface) => ChannelKind::Relay,
        (Ground, Airborne) | (Airborne, Ground) | (Airborne, Airborne) => ChannelKind::Microwave,
    }
}

/// Initial channel quality: `base - degradation * distance + noise`,
/// clamped to `[0.5, 1.0]`.
pub fn quality(
    distance: f64,
    channel: ChannelKind,
    config: &PhysicsConfig,
    rng: &dyn RandomSource,
) -> f64 {
    let profile = config.channels.for_channel(channel);
    let noise = rng.uniform(-config.quality_noise, config.quality_noise);
    clamp_quality(profile.base_quality - profile.degradation_per_km * distance + noise)
}

/// Bandwidth: `base / (1 + distance / scale)` times a factor in
/// `[1 - jitter, 1 + jitter)`, floored at `min_bandwidth`.
pub fn bandwidth(
    channel: ChannelKind,
    distance: f64,
    config: &PhysicsConfig,
    rng: &dyn RandomSource,
) -> f64 {
    let profile = config.channels.for_channel(channel);
    let attenuated = profile.base_bandwidth / (1.0 + distance.max(0.0) / config.bandwidth_scale_km);
    let factor = rng.uniform(1.0 - config.bandwidth_jitter, 1.0 + config.bandwidth_jitter);
    let value = attenuated * factor;
    if value.is_finite() {
        value.max(config.min_bandwidth)
    } else {
        config.min_bandwidth
    }
}

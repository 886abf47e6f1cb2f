// BgpTopo: BGP Session Topology Computation written in Rust
// Copyright (C) 2022-2023 Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Module containing all type definitions

use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub(crate) type IndexType = u32;

/// AS Number
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AsId(pub u32);

impl std::fmt::Display for AsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AS{}", self.0)
    }
}

impl From<u32> for AsId {
    fn from(x: u32) -> Self {
        Self(x)
    }
}

impl<T> From<&T> for AsId
where
    T: Into<AsId> + Copy,
{
    fn from(x: &T) -> Self {
        (*x).into()
    }
}

/// A set of AS numbers, stored as a sorted list of disjoint, inclusive ranges. Used to describe
/// the remote AS numbers a peer accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AsnSpace {
    ranges: Vec<(u32, u32)>,
}

impl AsnSpace {
    /// Create an empty space that accepts no AS number.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the space accepts no AS number at all.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Returns `true` if `asn` lies within the space.
    pub fn contains(&self, asn: impl Into<AsId>) -> bool {
        let x = asn.into().0;
        self.ranges.iter().any(|(lo, hi)| (*lo..=*hi).contains(&x))
    }

    /// If the space contains exactly one AS number, return it.
    pub fn single(&self) -> Option<AsId> {
        match self.ranges.as_slice() {
            [(lo, hi)] if lo == hi => Some(AsId(*lo)),
            _ => None,
        }
    }

    /// Add a single AS number to the space.
    pub fn add(&mut self, asn: impl Into<AsId>) {
        let x = asn.into().0;
        self.add_range(x, x);
    }

    /// Add the inclusive range `lo..=hi` to the space. An empty range (`lo > hi`) is ignored.
    pub fn add_range(&mut self, lo: impl Into<AsId>, hi: impl Into<AsId>) {
        let (lo, hi) = (lo.into().0, hi.into().0);
        if lo > hi {
            return;
        }
        self.ranges.push((lo, hi));
        self.normalize();
    }

    /// Sort the ranges and merge overlapping or adjacent ones.
    fn normalize(&mut self) {
        self.ranges.sort_unstable();
        let mut merged: Vec<(u32, u32)> = Vec::with_capacity(self.ranges.len());
        for (lo, hi) in self.ranges.drain(..) {
            match merged.last_mut() {
                Some((_, last_hi)) if lo <= last_hi.saturating_add(1) => {
                    *last_hi = (*last_hi).max(hi);
                }
                _ => merged.push((lo, hi)),
            }
        }
        self.ranges = merged;
    }
}

impl From<AsId> for AsnSpace {
    fn from(asn: AsId) -> Self {
        let mut s = Self::new();
        s.add(asn);
        s
    }
}

impl From<u32> for AsnSpace {
    fn from(asn: u32) -> Self {
        AsId(asn).into()
    }
}

impl<A: Into<AsId>> FromIterator<A> for AsnSpace {
    fn from_iter<I: IntoIterator<Item = A>>(iter: I) -> Self {
        let mut s = Self::new();
        for asn in iter {
            s.ranges.push({
                let x = asn.into().0;
                (x, x)
            });
        }
        s.normalize();
        s
    }
}

impl std::fmt::Display for AsnSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{{}}}",
            self.ranges
                .iter()
                .map(|(lo, hi)| if lo == hi {
                    lo.to_string()
                } else {
                    format!("{lo}-{hi}")
                })
                .join(", ")
        )
    }
}

/// The kind of a configured BGP peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PeerKind {
    /// Peer configured with a specific remote address; may initiate sessions.
    Active,
    /// Passive peer accepting connections from a range of remote addresses; never initiates.
    Dynamic,
    /// Peer bound to a local interface instead of an IP address.
    Unnumbered,
}

/// The part of a peer's identity that distinguishes it within its host and VRF.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PeerKey {
    /// The configured remote address of an active peer.
    Active(Ipv4Addr),
    /// The accepted remote prefix of a dynamic peer.
    Dynamic(Ipv4Net),
    /// The bound local interface of an unnumbered peer.
    Unnumbered(String),
}

/// Identity of one configured BGP peer: owning host, VRF, and the peer key. Used as graph node
/// and as map key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId {
    /// Hostname of the device that owns the peer configuration.
    pub hostname: String,
    /// Name of the VRF in which the peer is configured.
    pub vrf: String,
    /// The distinguishing key within that host and VRF.
    pub key: PeerKey,
}

impl PeerId {
    /// Identity of an active peer.
    pub fn active(hostname: impl Into<String>, vrf: impl Into<String>, peer: Ipv4Addr) -> Self {
        Self {
            hostname: hostname.into(),
            vrf: vrf.into(),
            key: PeerKey::Active(peer),
        }
    }

    /// Identity of a dynamic (passive) peer.
    pub fn dynamic(hostname: impl Into<String>, vrf: impl Into<String>, prefix: Ipv4Net) -> Self {
        Self {
            hostname: hostname.into(),
            vrf: vrf.into(),
            key: PeerKey::Dynamic(prefix),
        }
    }

    /// Identity of an unnumbered peer.
    pub fn unnumbered(
        hostname: impl Into<String>,
        vrf: impl Into<String>,
        interface: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            vrf: vrf.into(),
            key: PeerKey::Unnumbered(interface.into()),
        }
    }

    /// The kind of the peer, derived from its key.
    pub fn kind(&self) -> PeerKind {
        match self.key {
            PeerKey::Active(_) => PeerKind::Active,
            PeerKey::Dynamic(_) => PeerKind::Dynamic,
            PeerKey::Unnumbered(_) => PeerKind::Unnumbered,
        }
    }

    /// The bound interface of an unnumbered peer, `None` for numbered peers.
    pub fn peer_interface(&self) -> Option<&str> {
        match &self.key {
            PeerKey::Unnumbered(iface) => Some(iface.as_str()),
            _ => None,
        }
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:", self.hostname, self.vrf)?;
        match &self.key {
            PeerKey::Active(ip) => write!(f, "{ip}"),
            PeerKey::Dynamic(net) => write!(f, "{net}"),
            PeerKey::Unnumbered(iface) => write!(f, "{iface}"),
        }
    }
}

/// A (hostname, interface) pair, used to query the layer-3 adjacency oracle.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeInterfacePair {
    /// Hostname of the device.
    pub node: String,
    /// Name of the interface on that device.
    pub interface: String,
}

impl NodeInterfacePair {
    /// Create a new (hostname, interface) pair.
    pub fn new(node: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            interface: interface.into(),
        }
    }
}

impl std::fmt::Display for NodeInterfacePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.node, self.interface)
    }
}

/// IP ownership map: which (hostname, VRF) combinations claim an address.
pub type IpOwners = BTreeMap<Ipv4Addr, BTreeMap<String, BTreeSet<String>>>;

/// Topology computation errors. Only caller contract violations are reported as errors;
/// incomplete peer configurations are silently excluded from edge formation instead.
#[derive(Error, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopologyError {
    /// `check_reachability` and `keep_invalid` were both requested. Reachability checking
    /// presupposes that only valid peers are present.
    #[error("Cannot check reachability while keeping invalid peers")]
    ReachabilityWithInvalidPeers,
    /// `check_reachability` was requested without supplying a traceroute engine.
    #[error("Cannot check reachability without a traceroute engine")]
    MissingTracerouteEngine,
}

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

//! Per-peer candidate search: sanity checks, local-IP inference, and the matching of active and
//! unnumbered peers against all registered receivers.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use log::trace;
use maplit::btreeset;

use crate::config::{
    ActivePeerConfig, DeviceConfig, Fib, NetworkConfigs, PeerConfigRef, UNNUMBERED_LOCAL_IP,
};
use crate::reachability::{can_establish_bgp_session, TracerouteEngine};
use crate::session::{compute_as_pair, has_compatible_as, BgpSessionProperties};
use crate::types::{IpOwners, NodeInterfacePair, PeerId};

/// The external layer-3 adjacency oracle, used to match unnumbered peers by direct link
/// adjacency. Shared read-only across all parallel candidate searches.
pub trait L3Adjacencies: Sync {
    /// Returns whether the two interfaces are in the same point-to-point domain.
    fn in_same_point_to_point_domain(&self, a: &NodeInterfacePair, b: &NodeInterfacePair) -> bool;
}

/// An adjacency oracle that reports no adjacency at all, for networks without unnumbered
/// peering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoL3Adjacencies;

impl L3Adjacencies for NoL3Adjacencies {
    fn in_same_point_to_point_domain(&self, _: &NodeInterfacePair, _: &NodeInterfacePair) -> bool {
        false
    }
}

/// One directed candidate edge produced by the parallel search, committed into the graph by the
/// sequential reducer.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BgpEdge {
    pub(crate) source: PeerId,
    pub(crate) target: PeerId,
    pub(crate) props: BgpSessionProperties,
}

/// All registered receiver candidates, grouped by hostname and VRF. Unnumbered peers are not
/// receivers here; they only form sessions with each other by link adjacency.
pub(crate) type Receivers = BTreeMap<String, BTreeMap<String, Vec<PeerId>>>;

/// Check that a peer configuration is well-formed enough to participate in session formation.
///
/// A numbered peer with a statically configured local IP is valid only if that IP is actually
/// owned by the peer's own host and VRF. A peer without a local IP is provisionally valid (the
/// local IP may be inferred later, or other peers may still initiate towards it). Unnumbered
/// peers carry no IP to check.
pub fn peer_passes_sanity_checks(
    peer: PeerConfigRef<'_>,
    hostname: &str,
    vrf: &str,
    ip_owners: &IpOwners,
) -> bool {
    let local_ip = match peer {
        PeerConfigRef::Unnumbered(_) => return true,
        PeerConfigRef::Active(c) => c.local_ip,
        PeerConfigRef::Dynamic(c) => c.local_ip,
    };
    match local_ip {
        None => true,
        Some(ip) => ip_owners
            .get(&ip)
            .and_then(|hosts| hosts.get(hostname))
            .map(|vrfs| vrfs.contains(vrf))
            .unwrap_or(false),
    }
}

/// The set of source IPs an active peer may use to initiate a session.
///
/// A statically configured local IP is the only candidate. Otherwise, candidates are the
/// addresses bound to the interfaces from which the peer address is reachable according to the
/// VRF's forwarding table. Without a forwarding table, nothing can be inferred and the peer
/// cannot initiate.
pub fn potential_local_ips(
    peer: &ActivePeerConfig,
    fib: Option<&Fib>,
    device: &DeviceConfig,
) -> BTreeSet<Ipv4Addr> {
    if let Some(ip) = peer.local_ip {
        return btreeset![ip];
    }
    match fib {
        Some(fib) => fib
            .egress_interfaces(peer.peer_address)
            .filter_map(|iface| device.interfaces.get(iface))
            .flatten()
            .copied()
            .collect(),
        None => BTreeSet::new(),
    }
}

/// The subset of the initiator's candidate local IPs that the given receiver would accept a
/// connection from. May be empty, in which case the peering is not feasible.
///
/// Against a dynamic receiver, a local IP is feasible iff it falls within the accepted remote
/// prefix. Against an active receiver, the only feasible local IP is the receiver's own
/// configured peer address.
///
/// # Panics
///
/// Panics if the candidate is unnumbered: unnumbered peers are matched by interface adjacency,
/// never by address.
pub fn feasible_local_ips(
    initiator_local_ips: &BTreeSet<Ipv4Addr>,
    candidate: PeerConfigRef<'_>,
) -> BTreeSet<Ipv4Addr> {
    match candidate {
        PeerConfigRef::Dynamic(c) => initiator_local_ips
            .iter()
            .filter(|ip| c.accepts_remote(**ip))
            .copied()
            .collect(),
        PeerConfigRef::Active(c) => {
            if initiator_local_ips.contains(&c.peer_address) {
                btreeset![c.peer_address]
            } else {
                BTreeSet::new()
            }
        }
        PeerConfigRef::Unnumbered(_) => {
            panic!("unnumbered peers are matched by interface adjacency, not by address")
        }
    }
}

/// Check that `candidate` is a feasible receiver for `initiator`: it must live on a different
/// host or VRF, and have a compatible AS configuration.
fn candidate_passes_sanity_checks(
    initiator_id: &PeerId,
    initiator: PeerConfigRef<'_>,
    candidate_id: &PeerId,
    candidate: PeerConfigRef<'_>,
) -> bool {
    if initiator_id.hostname == candidate_id.hostname && initiator_id.vrf == candidate_id.vrf {
        // Do not let the same host/VRF peer with itself.
        return false;
    }
    has_compatible_as(initiator, candidate)
}

/// Emit the two directed edges describing a compatible session between `initiator` and
/// `candidate`, one for each endpoint's perception.
fn session_edges(
    initiator_id: &PeerId,
    initiator: PeerConfigRef<'_>,
    initiator_ip: Ipv4Addr,
    candidate_id: &PeerId,
    candidate: PeerConfigRef<'_>,
) -> Vec<BgpEdge> {
    let as_pair = match compute_as_pair(initiator.asn(), candidate.asn()) {
        Some(pair) => pair,
        None => unreachable!("AS compatibility was verified before emitting edges"),
    };
    vec![
        BgpEdge {
            source: initiator_id.clone(),
            target: candidate_id.clone(),
            props: BgpSessionProperties::from_peers(
                initiator,
                initiator_ip,
                candidate,
                false,
                as_pair,
            ),
        },
        BgpEdge {
            source: candidate_id.clone(),
            target: initiator_id.clone(),
            props: BgpSessionProperties::from_peers(
                initiator,
                initiator_ip,
                candidate,
                true,
                as_pair,
            ),
        },
    ]
}

/// Compute all directed edges in which the given active peer is the session initiator.
///
/// With an engine supplied, every candidate pairing must additionally pass the bidirectional
/// reachability check before its edges are emitted.
pub(crate) fn active_peer_edges(
    initiator_id: &PeerId,
    configs: &NetworkConfigs,
    ip_owners: &IpOwners,
    receivers: &Receivers,
    potential_local_ips: &BTreeSet<Ipv4Addr>,
    engine: Option<&dyn TracerouteEngine>,
) -> Vec<BgpEdge> {
    let initiator = match configs.get_active(initiator_id) {
        Some(c) => c,
        None => return Vec::new(),
    };
    if potential_local_ips.is_empty()
        || initiator.asn.local_as.is_none()
        || initiator.asn.remote_asns.is_empty()
    {
        return Vec::new();
    }
    // Find all devices that own the configured peer address.
    let owners = match ip_owners.get(&initiator.peer_address) {
        Some(o) => o,
        None => return Vec::new(),
    };

    let mut edges = Vec::new();
    for (host, vrfs) in owners {
        let by_vrf = match receivers.get(host) {
            Some(r) => r,
            None => continue,
        };
        for candidate_id in vrfs.iter().flat_map(|vrf| by_vrf.get(vrf)).flatten() {
            let candidate = match configs.get_peer(candidate_id) {
                Some(c) => c,
                None => continue,
            };
            if !candidate_passes_sanity_checks(
                initiator_id,
                PeerConfigRef::Active(initiator),
                candidate_id,
                candidate,
            ) {
                continue;
            }
            let feasible = feasible_local_ips(potential_local_ips, candidate);
            for local_ip in feasible {
                if let Some(engine) = engine {
                    if !can_establish_bgp_session(
                        initiator_id,
                        candidate_id,
                        initiator,
                        candidate,
                        local_ip,
                        engine,
                    ) {
                        trace!("{initiator_id} cannot reach {candidate_id} from {local_ip}");
                        continue;
                    }
                }
                edges.extend(session_edges(
                    initiator_id,
                    PeerConfigRef::Active(initiator),
                    local_ip,
                    candidate_id,
                    candidate,
                ));
            }
        }
    }
    edges
}

/// Compute all directed edges in which the given unnumbered peer is the session initiator.
/// Unnumbered peers only form sessions with each other, over interfaces in the same
/// point-to-point domain.
pub(crate) fn unnumbered_peer_edges(
    initiator_id: &PeerId,
    nodes: &[PeerId],
    configs: &NetworkConfigs,
    adjacencies: &dyn L3Adjacencies,
) -> Vec<BgpEdge> {
    let initiator = match configs.get_unnumbered(initiator_id) {
        Some(c) => c,
        None => return Vec::new(),
    };
    if initiator.asn.local_as.is_none() || initiator.asn.remote_asns.is_empty() {
        return Vec::new();
    }
    let local = NodeInterfacePair::new(&initiator_id.hostname, &initiator.peer_interface);

    let mut edges = Vec::new();
    for candidate_id in nodes {
        let candidate_iface = match candidate_id.peer_interface() {
            Some(iface) => iface,
            None => continue,
        };
        let candidate = match configs.get_peer(candidate_id) {
            Some(c) => c,
            None => continue,
        };
        if !candidate_passes_sanity_checks(
            initiator_id,
            PeerConfigRef::Unnumbered(initiator),
            candidate_id,
            candidate,
        ) {
            continue;
        }
        let remote = NodeInterfacePair::new(&candidate_id.hostname, candidate_iface);
        if !adjacencies.in_same_point_to_point_domain(&local, &remote) {
            continue;
        }
        edges.extend(session_edges(
            initiator_id,
            PeerConfigRef::Unnumbered(initiator),
            UNNUMBERED_LOCAL_IP,
            candidate_id,
            candidate,
        ));
    }
    edges
}

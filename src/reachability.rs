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

//! Data-plane verification of candidate sessions through an injected flow simulator.
//!
//! Control-plane compatibility alone does not guarantee that a session comes up: the initiating
//! TCP SYN must actually be delivered to the listening device, and the response must make it back
//! to the initiator. This module defines the boundary to the external flow-simulation engine and
//! the two verification operations built on top of it.

use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

use itertools::Itertools;
use maplit::btreeset;
use serde::{Deserialize, Serialize};

use crate::config::{ActivePeerConfig, PeerConfigRef};
use crate::session::{session_type, SessionType};
use crate::types::{PeerId, PeerKind};

/// The TCP port a BGP process listens on.
pub const BGP_PORT: u16 = 179;
/// The lowest ephemeral port, used as the source port of initiating flows.
pub const EPHEMERAL_PORT: u16 = 49152;

/// A unidirectional TCP flow, as submitted to and returned by the flow simulator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Flow {
    /// The device on which the flow enters the simulation.
    pub ingress_node: String,
    /// The VRF in which the flow enters the simulation.
    pub ingress_vrf: String,
    /// Source IP address.
    pub src_ip: Ipv4Addr,
    /// Destination IP address.
    pub dst_ip: Ipv4Addr,
    /// Source TCP port.
    pub src_port: u16,
    /// Destination TCP port.
    pub dst_port: u16,
    /// Whether the SYN flag is set.
    pub syn: bool,
}

impl Flow {
    /// The TCP SYN flow a BGP peer sends to initiate a session.
    pub fn bgp_syn(
        ingress_node: impl Into<String>,
        ingress_vrf: impl Into<String>,
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
    ) -> Self {
        Self {
            ingress_node: ingress_node.into(),
            ingress_vrf: ingress_vrf.into(),
            src_ip,
            dst_ip,
            src_port: EPHEMERAL_PORT,
            dst_port: BGP_PORT,
            syn: true,
        }
    }
}

/// The final fate of a simulated flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FlowDisposition {
    /// The flow was delivered to a listening process on the final device.
    Accepted,
    /// The flow was denied by an ingress filter.
    DeniedIn,
    /// The flow was denied by an egress filter.
    DeniedOut,
    /// No route towards the destination existed.
    NoRoute,
    /// The flow was discarded by a null route.
    NullRouted,
    /// The flow entered a forwarding loop.
    Loop,
    /// The flow left the modeled part of the network.
    ExitsNetwork,
    /// The next hop did not respond.
    NeighborUnreachable,
}

/// One simulated path of a flow through the network.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Trace {
    /// The fate of the flow on this path.
    pub disposition: FlowDisposition,
    /// The devices the flow traversed, in order, including the first and the last one.
    pub hops: Vec<String>,
}

/// Firewall or session state established by a forward flow, to be honored when simulating the
/// return flow.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FirewallSession {
    /// The device that holds the session state.
    pub node: String,
    /// The forward flow that established the state.
    pub matching_flow: Flow,
}

/// A simulated trace together with the return flow it would generate on acceptance, and any
/// firewall state established along the way.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TraceAndReverseFlow {
    /// The forward trace.
    pub trace: Trace,
    /// The return flow, present if the forward flow was accepted.
    pub reverse_flow: Option<Flow>,
    /// Firewall state established by the forward flow.
    pub new_sessions: BTreeSet<FirewallSession>,
}

/// The external flow-simulation engine.
///
/// Calls are synchronous and computation-bound; the engine does not hand back control until the
/// result is ready. The engine is shared read-only across all parallel candidate searches.
pub trait TracerouteEngine: Sync {
    /// Simulate the given flows, honoring the given pre-established firewall state, and return
    /// all resulting traces per flow.
    fn compute_traces(
        &self,
        flows: &BTreeSet<Flow>,
        sessions: &BTreeSet<FirewallSession>,
    ) -> BTreeMap<Flow, Vec<TraceAndReverseFlow>>;
}

/// The outcome of initiating a BGP session from one candidate local IP. Captures the flow used
/// and all forward and reverse traces. An empty list of reverse traces implies that initiation
/// already failed in the forward direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInitiationResult {
    /// The initiating TCP SYN flow.
    pub flow: Flow,
    /// All simulated forward traces of that flow.
    pub forward_traces: Vec<Trace>,
    /// All simulated traces of the return flows that reached the listener.
    pub reverse_traces: Vec<Trace>,
    /// Whether the session can be established from this local IP.
    pub successful: bool,
}

/// Returns whether a reverse trace makes it back to the initiating device and is accepted there.
fn reverse_trace_reaches_initiator(trace: &Trace, initiator_hostname: &str) -> bool {
    trace.disposition == FlowDisposition::Accepted
        && trace.hops.last().map(String::as_str) == Some(initiator_hostname)
}

/// Tests whether the active peer `initiator` can establish a BGP session with the peer
/// `listener`, initiating from `initiator_local_ip`.
///
/// Directionality matters: the initiator opens the connection according to its own
/// configuration. The session is deliverable only if the forward SYN is accepted at the
/// listener's host and VRF, a single-hop eBGP session traverses at most two hops, and the
/// return flow is accepted back at the initiating device.
pub fn can_establish_bgp_session(
    initiator_id: &PeerId,
    listener_id: &PeerId,
    initiator: &ActivePeerConfig,
    listener: PeerConfigRef<'_>,
    initiator_local_ip: Ipv4Addr,
    engine: &dyn TracerouteEngine,
) -> bool {
    debug_assert_eq!(initiator_id.kind(), PeerKind::Active);
    let flow = Flow::bgp_syn(
        &initiator_id.hostname,
        &initiator_id.vrf,
        initiator_local_ip,
        initiator.peer_address,
    );
    let forward = engine
        .compute_traces(&btreeset![flow.clone()], &BTreeSet::new())
        .remove(&flow)
        .unwrap_or_default();

    let single_hop =
        session_type(PeerConfigRef::Active(initiator)) == SessionType::EBgpSingleHop;

    forward
        .into_iter()
        .filter_map(|tarf| {
            if tarf.trace.disposition != FlowDisposition::Accepted {
                // The flow was not accepted, so the BGP stack never saw it.
                return None;
            }
            // An accepted forward trace always carries a return flow.
            let reverse = tarf.reverse_flow?;
            if reverse.ingress_node != listener_id.hostname
                || reverse.ingress_vrf != listener_id.vrf
            {
                // Accepted, but at the wrong device or in the wrong VRF.
                return None;
            }
            if listener.check_local_ip_on_accept() {
                if let Some(local_ip) = listener.local_ip() {
                    // The source IP of the return flow is the destination IP of the forward flow
                    // as the listener observed it (post any NAT). It must match the listener's
                    // local IP, or the listener rejects the connection.
                    if local_ip != reverse.src_ip {
                        return None;
                    }
                }
            }
            if single_hop && tarf.trace.hops.len() > 2 {
                return None;
            }
            Some((reverse, tarf.new_sessions))
        })
        // many traces can share the same return flow and firewall state
        .unique()
        .any(|(reverse, sessions)| {
            engine
                .compute_traces(&btreeset![reverse.clone()], &sessions)
                .remove(&reverse)
                .unwrap_or_default()
                .iter()
                .any(|t| reverse_trace_reaches_initiator(&t.trace, &initiator_id.hostname))
        })
}

/// Attempts to initiate a TCP connection from the active peer `initiator` towards the peer
/// `listener`, once for every feasible local IP, and reports the full traces of each attempt.
///
/// This is the diagnostic variant of [`can_establish_bgp_session`]: callers use it to explain
/// why a session is or is not formed.
pub fn initiate_bgp_sessions(
    initiator_id: &PeerId,
    listener_id: &PeerId,
    initiator: &ActivePeerConfig,
    feasible_local_ips: &BTreeSet<Ipv4Addr>,
    engine: &dyn TracerouteEngine,
) -> Vec<SessionInitiationResult> {
    debug_assert_eq!(initiator_id.kind(), PeerKind::Active);
    let single_hop =
        session_type(PeerConfigRef::Active(initiator)) == SessionType::EBgpSingleHop;

    feasible_local_ips
        .iter()
        .map(|&local_ip| {
            let flow = Flow::bgp_syn(
                &initiator_id.hostname,
                &initiator_id.vrf,
                local_ip,
                initiator.peer_address,
            );
            let forward = engine
                .compute_traces(&btreeset![flow.clone()], &BTreeSet::new())
                .remove(&flow)
                .unwrap_or_default();

            let mut reverse_traces = Vec::new();
            for tarf in &forward {
                if tarf.trace.disposition != FlowDisposition::Accepted
                    || (single_hop && tarf.trace.hops.len() > 2)
                {
                    continue;
                }
                let reverse = match &tarf.reverse_flow {
                    Some(r)
                        if r.ingress_node == listener_id.hostname
                            && r.ingress_vrf == listener_id.vrf =>
                    {
                        r
                    }
                    _ => continue,
                };
                reverse_traces.extend(
                    engine
                        .compute_traces(&btreeset![reverse.clone()], &tarf.new_sessions)
                        .remove(reverse)
                        .unwrap_or_default()
                        .into_iter()
                        .map(|t| t.trace),
                );
            }

            let successful = reverse_traces
                .iter()
                .any(|t| reverse_trace_reaches_initiator(t, &initiator_id.hostname));

            SessionInitiationResult {
                flow,
                forward_traces: forward.into_iter().map(|t| t.trace).collect(),
                reverse_traces,
                successful,
            }
        })
        .collect()
}

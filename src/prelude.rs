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

//! Module that re-exports the most important types and functions of the library.

pub use crate::config::{
    ActivePeerConfig, AsnConfig, BgpProcess, DeviceConfig, DynamicPeerConfig, Fib, Fibs,
    NetworkConfigs, PeerConfigRef, UnnumberedPeerConfig, VrfConfig, UNNUMBERED_LOCAL_IP,
};
pub use crate::matcher::{
    feasible_local_ips, peer_passes_sanity_checks, potential_local_ips, L3Adjacencies,
    NoL3Adjacencies,
};
pub use crate::reachability::{
    can_establish_bgp_session, initiate_bgp_sessions, Flow, FlowDisposition,
    SessionInitiationResult, Trace, TraceAndReverseFlow, TracerouteEngine,
};
pub use crate::session::{
    compute_as_pair, has_compatible_as, session_type, AsPair, BgpSessionProperties,
    ConfedSessionType, SessionType,
};
pub use crate::topology::{BgpTopology, TopologyBuilder};
pub use crate::types::{
    AsId, AsnSpace, IpOwners, NodeInterfacePair, PeerId, PeerKey, PeerKind, TopologyError,
};

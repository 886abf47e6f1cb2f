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

//! Module for testing the library, including shared network fixtures and mock engines.

mod test_session;

use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use crate::prelude::*;
use crate::reachability::FirewallSession;

/// Initialize logging for a test run. Safe to call from every test.
pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(crate) fn ip(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

pub(crate) fn net(s: &str) -> Ipv4Net {
    s.parse().unwrap()
}

pub(crate) fn hops(h: &[&str]) -> Vec<String> {
    h.iter().map(|s| s.to_string()).collect()
}

pub(crate) fn trace(disposition: FlowDisposition, h: &[&str]) -> Trace {
    Trace {
        disposition,
        hops: hops(h),
    }
}

pub(crate) fn tarf(trace: Trace, reverse_flow: Option<Flow>) -> TraceAndReverseFlow {
    TraceAndReverseFlow {
        trace,
        reverse_flow,
        new_sessions: BTreeSet::new(),
    }
}

pub(crate) fn active_peer(
    peer: Ipv4Addr,
    local: Option<Ipv4Addr>,
    asn: AsnConfig,
) -> ActivePeerConfig {
    ActivePeerConfig {
        peer_address: peer,
        local_ip: local,
        asn,
        ebgp_multihop: false,
        check_local_ip_on_accept: false,
    }
}

/// A device with a single VRF `default` running the given BGP process.
pub(crate) fn device(hostname: &str, proc: BgpProcess) -> DeviceConfig {
    let mut vrf = VrfConfig::new("default");
    vrf.bgp = Some(proc);
    let mut dev = DeviceConfig::new(hostname);
    dev.vrfs.insert("default".to_string(), vrf);
    dev
}

/// A device with a single active peer in VRF `default`.
pub(crate) fn active_device(
    hostname: &str,
    local: Ipv4Addr,
    peer: Ipv4Addr,
    asn: u32,
    remote: u32,
) -> DeviceConfig {
    let mut proc = BgpProcess::default();
    proc.active_peers
        .insert(peer, active_peer(peer, Some(local), AsnConfig::new(asn, [remote])));
    device(hostname, proc)
}

/// Build an IP ownership map from `(address, hostname)` pairs, all in VRF `default`.
pub(crate) fn owners(entries: &[(Ipv4Addr, &str)]) -> IpOwners {
    let mut map: IpOwners = BTreeMap::new();
    for (addr, host) in entries {
        map.entry(*addr)
            .or_default()
            .entry(host.to_string())
            .or_default()
            .insert("default".to_string());
    }
    map
}

/// A flow simulator answering from a fixed table. Flows without an entry yield no traces.
#[derive(Debug, Default)]
pub(crate) struct MockTraceroute {
    pub(crate) responses: BTreeMap<Flow, Vec<TraceAndReverseFlow>>,
}

impl TracerouteEngine for MockTraceroute {
    fn compute_traces(
        &self,
        flows: &BTreeSet<Flow>,
        _sessions: &BTreeSet<FirewallSession>,
    ) -> BTreeMap<Flow, Vec<TraceAndReverseFlow>> {
        flows
            .iter()
            .map(|f| (f.clone(), self.responses.get(f).cloned().unwrap_or_default()))
            .collect()
    }
}

/// An adjacency oracle over an explicit, symmetric set of interface pairs.
#[derive(Debug, Default)]
pub(crate) struct PairAdjacencies {
    pairs: BTreeSet<(NodeInterfacePair, NodeInterfacePair)>,
}

impl PairAdjacencies {
    pub(crate) fn connect(&mut self, a: NodeInterfacePair, b: NodeInterfacePair) {
        self.pairs.insert((a.clone(), b.clone()));
        self.pairs.insert((b, a));
    }
}

impl L3Adjacencies for PairAdjacencies {
    fn in_same_point_to_point_domain(&self, a: &NodeInterfacePair, b: &NodeInterfacePair) -> bool {
        self.pairs.contains(&(a.clone(), b.clone()))
    }
}

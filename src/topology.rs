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

//! The session topology graph and the builder that computes it from a configuration snapshot.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::Ipv4Addr;

use log::debug;
use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Directed;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_with::{As, Same};

use crate::config::{Fibs, NetworkConfigs, PeerConfigRef};
use crate::matcher::{
    active_peer_edges, peer_passes_sanity_checks, potential_local_ips, unnumbered_peer_edges,
    L3Adjacencies, Receivers,
};
use crate::reachability::TracerouteEngine;
use crate::session::BgpSessionProperties;
use crate::types::{IndexType, IpOwners, PeerId, PeerKind, TopologyError};

/// The computed BGP session topology.
///
/// Nodes are configured peers, not devices. Every compatible session appears as a pair of
/// directed edges, one per endpoint's perception of the session; the two edges carry mirrored
/// AS numbers and addresses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BgpTopology {
    graph: StableGraph<PeerId, BgpSessionProperties, Directed, IndexType>,
    #[serde(with = "As::<Vec<(Same, Same)>>")]
    nodes: HashMap<PeerId, NodeIndex<IndexType>>,
}

impl BgpTopology {
    /// Create an empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer as a node, returning its index. Registering the same peer twice returns
    /// the existing index.
    pub(crate) fn insert_node(&mut self, id: PeerId) -> NodeIndex<IndexType> {
        match self.nodes.get(&id) {
            Some(idx) => *idx,
            None => {
                let idx = self.graph.add_node(id.clone());
                self.nodes.insert(id, idx);
                idx
            }
        }
    }

    /// Insert one direction of a session between two registered peers. Inserting the same
    /// directed pair again replaces the stored properties, so a session can never appear as a
    /// multi-edge.
    pub(crate) fn insert_session(
        &mut self,
        source: &PeerId,
        target: &PeerId,
        props: BgpSessionProperties,
    ) {
        assert_ne!(source, target, "a peer cannot form a session with itself");
        let a = match self.nodes.get(source) {
            Some(idx) => *idx,
            None => panic!("session source {source} was never registered as a node"),
        };
        let b = match self.nodes.get(target) {
            Some(idx) => *idx,
            None => panic!("session target {target} was never registered as a node"),
        };
        self.graph.update_edge(a, b, props);
    }

    /// The number of registered peers.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// The number of directed session edges. A compatible session contributes two.
    pub fn session_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns whether the given peer is registered in the topology.
    pub fn contains_node(&self, id: &PeerId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Iterate over all registered peers.
    pub fn peers(&self) -> impl Iterator<Item = &PeerId> {
        self.graph.node_weights()
    }

    /// Iterate over all directed session edges as `(source, target, properties)`.
    pub fn sessions(&self) -> impl Iterator<Item = (&PeerId, &PeerId, &BgpSessionProperties)> {
        self.graph.edge_references().map(|e| {
            (
                &self.graph[e.source()],
                &self.graph[e.target()],
                e.weight(),
            )
        })
    }

    /// The properties of the directed session edge from `source` to `target`, if present.
    pub fn session(&self, source: &PeerId, target: &PeerId) -> Option<&BgpSessionProperties> {
        let a = *self.nodes.get(source)?;
        let b = *self.nodes.get(target)?;
        self.graph
            .find_edge(a, b)
            .and_then(|e| self.graph.edge_weight(e))
    }

    /// Iterate over the peers the given peer has a session towards.
    pub fn neighbors<'a>(&'a self, id: &PeerId) -> impl Iterator<Item = &'a PeerId> {
        self.nodes
            .get(id)
            .into_iter()
            .flat_map(|idx| self.graph.neighbors(*idx))
            .map(|idx| &self.graph[idx])
    }
}

impl PartialEq for BgpTopology {
    fn eq(&self, other: &Self) -> bool {
        self.peers().collect::<BTreeSet<_>>() == other.peers().collect::<BTreeSet<_>>()
            && self
                .sessions()
                .map(|(a, b, p)| ((a, b), p))
                .collect::<BTreeMap<_, _>>()
                == other
                    .sessions()
                    .map(|(a, b, p)| ((a, b), p))
                    .collect::<BTreeMap<_, _>>()
    }
}

impl Eq for BgpTopology {}

/// Builder for [`BgpTopology`]. Construct it with the mandatory inputs, enable the optional
/// stages, then call [`TopologyBuilder::build`].
pub struct TopologyBuilder<'a> {
    configs: &'a NetworkConfigs,
    ip_owners: &'a IpOwners,
    adjacencies: &'a dyn L3Adjacencies,
    fibs: Option<&'a Fibs>,
    engine: Option<&'a dyn TracerouteEngine>,
    keep_invalid: bool,
    check_reachability: bool,
}

impl std::fmt::Debug for TopologyBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopologyBuilder")
            .field("configs", &self.configs)
            .field("ip_owners", &self.ip_owners)
            .field("fibs", &self.fibs)
            .field("has_engine", &self.engine.is_some())
            .field("keep_invalid", &self.keep_invalid)
            .field("check_reachability", &self.check_reachability)
            .finish()
    }
}

impl<'a> TopologyBuilder<'a> {
    /// Create a builder from the mandatory inputs: the configuration snapshot, the IP ownership
    /// map, and the layer-3 adjacency oracle (use [`crate::matcher::NoL3Adjacencies`] for
    /// networks without unnumbered peering).
    pub fn new(
        configs: &'a NetworkConfigs,
        ip_owners: &'a IpOwners,
        adjacencies: &'a dyn L3Adjacencies,
    ) -> Self {
        Self {
            configs,
            ip_owners,
            adjacencies,
            fibs: None,
            engine: None,
            keep_invalid: false,
            check_reachability: false,
        }
    }

    /// Supply forwarding tables for local-IP inference. Without them, active peers without a
    /// statically configured local IP can never initiate.
    pub fn fibs(mut self, fibs: &'a Fibs) -> Self {
        self.fibs = Some(fibs);
        self
    }

    /// Supply the flow-simulation engine used for reachability checking.
    pub fn traceroute_engine(mut self, engine: &'a dyn TracerouteEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Keep peers that fail the sanity checks as (disconnected) nodes instead of dropping them.
    /// Useful for diagnosing misconfigured peers.
    pub fn keep_invalid(mut self, keep_invalid: bool) -> Self {
        self.keep_invalid = keep_invalid;
        self
    }

    /// Only admit sessions whose initiating TCP flow is deliverable in both directions. Requires
    /// a traceroute engine and is incompatible with `keep_invalid`.
    pub fn check_reachability(mut self, check_reachability: bool) -> Self {
        self.check_reachability = check_reachability;
        self
    }

    /// Compute the topology.
    pub fn build(self) -> Result<BgpTopology, TopologyError> {
        if self.check_reachability && self.keep_invalid {
            return Err(TopologyError::ReachabilityWithInvalidPeers);
        }
        if self.check_reachability && self.engine.is_none() {
            return Err(TopologyError::MissingTracerouteEngine);
        }

        // First pass: register all (valid) peers as nodes, group the numbered ones as receivers,
        // and infer the candidate local IPs of every active peer.
        let mut topo = BgpTopology::new();
        let mut node_ids: Vec<PeerId> = Vec::new();
        let mut receivers: Receivers = Receivers::new();
        let mut local_ips: BTreeMap<PeerId, BTreeSet<Ipv4Addr>> = BTreeMap::new();
        for (hostname, device) in &self.configs.devices {
            for (vrf, vrf_config) in &device.vrfs {
                let Some(bgp) = vrf_config.bgp.as_ref() else {
                    continue;
                };
                let fib = self
                    .fibs
                    .and_then(|fibs| fibs.get(hostname))
                    .and_then(|by_vrf| by_vrf.get(vrf));
                let peers = bgp
                    .active_peers
                    .iter()
                    .map(|(ip, c)| (PeerId::active(hostname, vrf, *ip), PeerConfigRef::Active(c)))
                    .chain(bgp.dynamic_peers.iter().map(|(net, c)| {
                        (PeerId::dynamic(hostname, vrf, *net), PeerConfigRef::Dynamic(c))
                    }))
                    .chain(bgp.unnumbered_peers.iter().map(|(iface, c)| {
                        (
                            PeerId::unnumbered(hostname, vrf, iface),
                            PeerConfigRef::Unnumbered(c),
                        )
                    }));
                for (id, peer) in peers {
                    if !self.keep_invalid
                        && !peer_passes_sanity_checks(peer, hostname, vrf, self.ip_owners)
                    {
                        debug!("excluding {id}: the configured local IP is not owned");
                        continue;
                    }
                    if let PeerConfigRef::Active(c) = peer {
                        local_ips.insert(id.clone(), potential_local_ips(c, fib, device));
                    }
                    if id.kind() != PeerKind::Unnumbered {
                        receivers
                            .entry(hostname.clone())
                            .or_default()
                            .entry(vrf.clone())
                            .or_default()
                            .push(id.clone());
                    }
                    topo.insert_node(id.clone());
                    node_ids.push(id);
                }
            }
        }

        // Second pass: search candidates for every initiating peer in parallel. Dynamic peers
        // never initiate; they only show up as receivers.
        let engine = self.check_reachability.then_some(self.engine).flatten();
        let no_local_ips = BTreeSet::new();
        let edges: Vec<_> = node_ids
            .par_iter()
            .flat_map_iter(|id| match id.kind() {
                PeerKind::Dynamic => Vec::new(),
                PeerKind::Active => active_peer_edges(
                    id,
                    self.configs,
                    self.ip_owners,
                    &receivers,
                    local_ips.get(id).unwrap_or(&no_local_ips),
                    engine,
                ),
                PeerKind::Unnumbered => {
                    unnumbered_peer_edges(id, &node_ids, self.configs, self.adjacencies)
                }
            })
            .collect();

        // Sequential commit. A session discovered from both endpoints inserts each directed edge
        // twice; `insert_session` collapses the duplicates.
        for edge in edges {
            topo.insert_session(&edge.source, &edge.target, edge.props);
        }

        debug!(
            "computed topology: {} peers, {} directed sessions",
            topo.node_count(),
            topo.session_count()
        );
        Ok(topo)
    }
}

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

#![deny(missing_docs, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # BgpTopo
//!
//! This is a library for computing the BGP adjacency graph of a modeled network: given the parsed
//! BGP peer configuration of every device, it determines which pairs of peers would establish a
//! session, in which direction, and with which negotiated session attributes (effective local and
//! remote AS numbers, confederation relationship, and session type).
//!
//! ## Main Concepts
//!
//! The [`topology::TopologyBuilder`] is the main entry point. It consumes a
//! [`config::NetworkConfigs`] snapshot (devices, VRFs, and their BGP processes with active,
//! dynamic, and unnumbered peers), an IP-ownership map, and a layer-3 adjacency oracle, and
//! produces a [`topology::BgpTopology`]: a directed graph (see
//! [Petgraph](https://docs.rs/petgraph/latest/petgraph/index.html)) whose nodes are peer
//! identities ([`types::PeerId`]) and whose edges carry [`session::BgpSessionProperties`]. A
//! compatible pair of peers always yields exactly two directed edges, one for each perception of
//! the session.
//!
//! AS compatibility (including BGP confederations) is decided by the standalone oracle
//! [`session::compute_as_pair`]. Peers without a static local IP can have their candidate source
//! addresses inferred from a per-VRF forwarding table ([`config::Fib`]). Optionally, every
//! candidate session is additionally verified against the data plane by simulating the initiating
//! TCP SYN and its return flow through an injected [`reachability::TracerouteEngine`].
//!
//! The per-peer candidate search is read-only over the shared inputs and runs on a
//! [rayon](https://docs.rs/rayon/latest/rayon/index.html) worker pool; the resulting edges are
//! committed into the graph sequentially.
//!
//! ## Example usage
//!
//! The following example computes the topology of a network with two devices that peer with each
//! other over eBGP:
//!
//! ```
//! use bgptopo::prelude::*;
//! use std::collections::BTreeMap;
//! use std::net::Ipv4Addr;
//!
//! fn device(name: &str, local: Ipv4Addr, peer: Ipv4Addr, asn: u32, remote: u32) -> DeviceConfig {
//!     let mut proc = BgpProcess::default();
//!     proc.active_peers.insert(
//!         peer,
//!         ActivePeerConfig {
//!             peer_address: peer,
//!             local_ip: Some(local),
//!             asn: AsnConfig::new(asn, [remote]),
//!             ebgp_multihop: false,
//!             check_local_ip_on_accept: false,
//!         },
//!     );
//!     let mut vrf = VrfConfig::new("default");
//!     vrf.bgp = Some(proc);
//!     let mut dev = DeviceConfig::new(name);
//!     dev.vrfs.insert("default".to_string(), vrf);
//!     dev
//! }
//!
//! fn main() -> Result<(), TopologyError> {
//!     let a_ip: Ipv4Addr = "10.0.0.1".parse().unwrap();
//!     let b_ip: Ipv4Addr = "10.0.0.2".parse().unwrap();
//!
//!     let configs = NetworkConfigs::new([
//!         device("a", a_ip, b_ip, 65001, 65002),
//!         device("b", b_ip, a_ip, 65002, 65001),
//!     ]);
//!
//!     let mut ip_owners: IpOwners = BTreeMap::new();
//!     ip_owners
//!         .entry(a_ip)
//!         .or_default()
//!         .entry("a".to_string())
//!         .or_default()
//!         .insert("default".to_string());
//!     ip_owners
//!         .entry(b_ip)
//!         .or_default()
//!         .entry("b".to_string())
//!         .or_default()
//!         .insert("default".to_string());
//!
//!     let topology = TopologyBuilder::new(&configs, &ip_owners, &NoL3Adjacencies).build()?;
//!
//!     assert_eq!(topology.node_count(), 2);
//!     assert_eq!(topology.session_count(), 2);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod matcher;
pub mod prelude;
pub mod reachability;
pub mod session;
pub mod topology;
pub mod types;

#[cfg(test)]
mod test;

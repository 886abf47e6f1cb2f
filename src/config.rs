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

//! The consumed device-configuration data model. This module does not parse anything; it is the
//! boundary at which an external parser hands over a full snapshot of all devices.

use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use prefix_trie::PrefixMap;
use serde::{Deserialize, Serialize};

use crate::types::{AsId, AsnSpace, PeerId, PeerKey, PeerKind};

/// The fixed link-local placeholder address used by unnumbered peers.
pub const UNNUMBERED_LOCAL_IP: Ipv4Addr = Ipv4Addr::new(169, 254, 0, 1);

/// The AS configuration shared by all peer kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AsnConfig {
    /// The local AS number. A peer without one can never form a session.
    pub local_as: Option<AsId>,
    /// The confederation identifier, if the peer is a confederation member.
    pub confederation: Option<AsId>,
    /// The AS numbers this peer accepts on the remote side. Must be non-empty to form a session.
    pub remote_asns: AsnSpace,
}

impl AsnConfig {
    /// AS configuration without confederation membership.
    pub fn new<A>(local_as: impl Into<AsId>, remote_asns: A) -> Self
    where
        A: IntoIterator,
        A::Item: Into<AsId>,
    {
        Self {
            local_as: Some(local_as.into()),
            confederation: None,
            remote_asns: remote_asns.into_iter().collect(),
        }
    }

    /// AS configuration of a confederation member.
    pub fn confederated<A>(
        local_as: impl Into<AsId>,
        confederation: impl Into<AsId>,
        remote_asns: A,
    ) -> Self
    where
        A: IntoIterator,
        A::Item: Into<AsId>,
    {
        Self {
            local_as: Some(local_as.into()),
            confederation: Some(confederation.into()),
            remote_asns: remote_asns.into_iter().collect(),
        }
    }
}

/// An active BGP peer, configured with a specific remote address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivePeerConfig {
    /// The remote address this peer initiates sessions towards.
    pub peer_address: Ipv4Addr,
    /// The statically configured local IP. If `None`, candidate local IPs are inferred from the
    /// VRF's forwarding table.
    pub local_ip: Option<Ipv4Addr>,
    /// The AS configuration.
    pub asn: AsnConfig,
    /// Whether eBGP sessions of this peer may span more than one hop.
    pub ebgp_multihop: bool,
    /// Whether this peer, as a listener, only accepts connections addressed to its local IP.
    pub check_local_ip_on_accept: bool,
}

/// A dynamic (passive) BGP peer, accepting connections from a range of remote addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicPeerConfig {
    /// The range of remote addresses this peer accepts connections from.
    pub peer_prefix: Ipv4Net,
    /// The statically configured local IP of the listener, if any.
    pub local_ip: Option<Ipv4Addr>,
    /// The AS configuration.
    pub asn: AsnConfig,
    /// Whether eBGP sessions of this peer may span more than one hop.
    pub ebgp_multihop: bool,
    /// Whether this peer only accepts connections addressed to its local IP.
    pub check_local_ip_on_accept: bool,
}

impl DynamicPeerConfig {
    /// Returns `true` if the given remote address falls within the accepted range.
    pub fn accepts_remote(&self, ip: Ipv4Addr) -> bool {
        self.peer_prefix.contains(&ip)
    }
}

/// An unnumbered BGP peer, bound to a local interface instead of an IP address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnnumberedPeerConfig {
    /// The local interface this peer is bound to.
    pub peer_interface: String,
    /// The AS configuration.
    pub asn: AsnConfig,
}

/// A reference to a peer configuration of any kind. This is the view handed around during
/// candidate matching; the configurations themselves stay in their [`BgpProcess`] collections.
#[derive(Debug, Clone, Copy)]
pub enum PeerConfigRef<'a> {
    /// An active peer.
    Active(&'a ActivePeerConfig),
    /// A dynamic (passive) peer.
    Dynamic(&'a DynamicPeerConfig),
    /// An unnumbered peer.
    Unnumbered(&'a UnnumberedPeerConfig),
}

impl<'a> PeerConfigRef<'a> {
    /// The kind of the referenced peer.
    pub fn kind(&self) -> PeerKind {
        match self {
            Self::Active(_) => PeerKind::Active,
            Self::Dynamic(_) => PeerKind::Dynamic,
            Self::Unnumbered(_) => PeerKind::Unnumbered,
        }
    }

    /// The shared AS configuration.
    pub fn asn(&self) -> &'a AsnConfig {
        match self {
            Self::Active(c) => &c.asn,
            Self::Dynamic(c) => &c.asn,
            Self::Unnumbered(c) => &c.asn,
        }
    }

    /// The local IP of the peer. Unnumbered peers always use the fixed link-local placeholder.
    pub fn local_ip(&self) -> Option<Ipv4Addr> {
        match self {
            Self::Active(c) => c.local_ip,
            Self::Dynamic(c) => c.local_ip,
            Self::Unnumbered(_) => Some(UNNUMBERED_LOCAL_IP),
        }
    }

    /// Whether this peer, as a listener, only accepts connections addressed to its local IP.
    pub fn check_local_ip_on_accept(&self) -> bool {
        match self {
            Self::Active(c) => c.check_local_ip_on_accept,
            Self::Dynamic(c) => c.check_local_ip_on_accept,
            Self::Unnumbered(_) => false,
        }
    }

    /// Whether eBGP sessions of this peer may span more than one hop.
    pub fn ebgp_multihop(&self) -> bool {
        match self {
            Self::Active(c) => c.ebgp_multihop,
            Self::Dynamic(c) => c.ebgp_multihop,
            Self::Unnumbered(_) => false,
        }
    }

    /// Maps the reference to an option, with `Some` only for an active peer.
    pub fn active(self) -> Option<&'a ActivePeerConfig> {
        match self {
            Self::Active(c) => Some(c),
            _ => None,
        }
    }

    /// Maps the reference to an option, with `Some` only for a dynamic peer.
    pub fn dynamic(self) -> Option<&'a DynamicPeerConfig> {
        match self {
            Self::Dynamic(c) => Some(c),
            _ => None,
        }
    }

    /// Maps the reference to an option, with `Some` only for an unnumbered peer.
    pub fn unnumbered(self) -> Option<&'a UnnumberedPeerConfig> {
        match self {
            Self::Unnumbered(c) => Some(c),
            _ => None,
        }
    }
}

/// The BGP process of one VRF, with its three peer collections.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BgpProcess {
    /// Active peers, keyed by their configured remote address.
    pub active_peers: BTreeMap<Ipv4Addr, ActivePeerConfig>,
    /// Dynamic peers, keyed by their accepted remote prefix.
    pub dynamic_peers: BTreeMap<Ipv4Net, DynamicPeerConfig>,
    /// Unnumbered peers, keyed by their bound interface.
    pub unnumbered_peers: BTreeMap<String, UnnumberedPeerConfig>,
}

/// One VRF of a device, optionally running a BGP process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VrfConfig {
    /// Name of the VRF.
    pub name: String,
    /// The BGP process of this VRF, if one is configured.
    pub bgp: Option<BgpProcess>,
}

impl VrfConfig {
    /// Create a VRF without a BGP process.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bgp: None,
        }
    }
}

/// The configuration of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Hostname of the device.
    pub hostname: String,
    /// The addresses bound to each interface, used for local-IP inference.
    pub interfaces: BTreeMap<String, BTreeSet<Ipv4Addr>>,
    /// The VRFs of the device, keyed by name.
    pub vrfs: BTreeMap<String, VrfConfig>,
}

impl DeviceConfig {
    /// Create a device without interfaces or VRFs.
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            interfaces: BTreeMap::new(),
            vrfs: BTreeMap::new(),
        }
    }
}

/// A full snapshot of all device configurations, keyed by hostname.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetworkConfigs {
    /// All devices, keyed by hostname.
    pub devices: BTreeMap<String, DeviceConfig>,
}

impl NetworkConfigs {
    /// Collect a set of devices into a snapshot.
    pub fn new(devices: impl IntoIterator<Item = DeviceConfig>) -> Self {
        Self {
            devices: devices
                .into_iter()
                .map(|d| (d.hostname.clone(), d))
                .collect(),
        }
    }

    /// Get the configuration of a device by hostname.
    pub fn get_device(&self, hostname: &str) -> Option<&DeviceConfig> {
        self.devices.get(hostname)
    }

    /// Get the BGP process of a given host and VRF.
    pub fn get_bgp(&self, hostname: &str, vrf: &str) -> Option<&BgpProcess> {
        self.devices.get(hostname)?.vrfs.get(vrf)?.bgp.as_ref()
    }

    /// Resolve a peer identity to its configuration.
    pub fn get_peer(&self, id: &PeerId) -> Option<PeerConfigRef<'_>> {
        let proc = self.get_bgp(&id.hostname, &id.vrf)?;
        match &id.key {
            PeerKey::Active(ip) => proc.active_peers.get(ip).map(PeerConfigRef::Active),
            PeerKey::Dynamic(net) => proc.dynamic_peers.get(net).map(PeerConfigRef::Dynamic),
            PeerKey::Unnumbered(iface) => {
                proc.unnumbered_peers.get(iface).map(PeerConfigRef::Unnumbered)
            }
        }
    }

    /// Resolve a peer identity to an active peer configuration.
    pub fn get_active(&self, id: &PeerId) -> Option<&ActivePeerConfig> {
        self.get_peer(id)?.active()
    }

    /// Resolve a peer identity to an unnumbered peer configuration.
    pub fn get_unnumbered(&self, id: &PeerId) -> Option<&UnnumberedPeerConfig> {
        self.get_peer(id)?.unnumbered()
    }
}

/// A forwarding table (FIB) of one VRF, mapping destination prefixes to egress interfaces by
/// longest-prefix match. Used only to infer candidate source addresses for active peers without a
/// static local IP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fib {
    routes: PrefixMap<Ipv4Net, BTreeSet<String>>,
}

impl Default for Fib {
    fn default() -> Self {
        Self {
            routes: PrefixMap::new(),
        }
    }
}

impl Fib {
    /// Create an empty forwarding table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an egress interface for the given destination prefix.
    pub fn insert(&mut self, prefix: Ipv4Net, interface: impl Into<String>) {
        self.routes.entry(prefix).or_default().insert(interface.into());
    }

    /// The egress interfaces for reaching `dst`, by longest-prefix match.
    pub fn egress_interfaces(&self, dst: Ipv4Addr) -> impl Iterator<Item = &str> {
        self.routes
            .get_lpm(&Ipv4Net::from(dst))
            .into_iter()
            .flat_map(|(_, ifaces)| ifaces.iter().map(String::as_str))
    }
}

/// All forwarding tables of the network: hostname to VRF name to [`Fib`].
pub type Fibs = BTreeMap<String, BTreeMap<String, Fib>>;

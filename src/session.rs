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

//! AS compatibility resolution and the negotiated properties of a session.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::config::{AsnConfig, PeerConfigRef};
use crate::types::AsId;

/// Whether a session is within a confederation or across its border, if applicable. This is
/// derived from the two peers' configuration, never configured directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConfedSessionType {
    /// Neither peer is a confederation member.
    NoConfed,
    /// Both peers declare membership in the same confederation.
    WithinConfed,
    /// The peers are in different confederations, or only one side is a member.
    AcrossConfedBorder,
}

/// The effective AS numbers of a compatible session, as seen by the first peer. Reversing the
/// pair gives the second peer's view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AsPair {
    /// The AS number the first peer uses on this session.
    pub local_as: AsId,
    /// The AS number the first peer sees on the remote side.
    pub remote_as: AsId,
    /// The confederation relationship of the session.
    pub confed_type: ConfedSessionType,
}

impl AsPair {
    /// The same session, seen from the other peer.
    pub fn reverse(self) -> Self {
        Self {
            local_as: self.remote_as,
            remote_as: self.local_as,
            confed_type: self.confed_type,
        }
    }
}

/// Compute whether two peers' AS configurations allow a session, and if so, the effective AS
/// numbers of that session as seen by the first peer.
///
/// The function is symmetric: swapping the arguments reverses the result. Within a confederation,
/// peers identify each other by their real (member) AS numbers; across a confederation border,
/// a member is only ever visible as its confederation identifier.
pub fn compute_as_pair(initiator: &AsnConfig, listener: &AsnConfig) -> Option<AsPair> {
    // A peer without a local AS is plainly misconfigured. No session.
    let initiator_local = initiator.local_as?;
    let listener_local = listener.local_as?;
    let pair = |local_as, remote_as, confed_type| AsPair {
        local_as,
        remote_as,
        confed_type,
    };
    match (initiator.confederation, listener.confederation) {
        // Simple case: no confederation config
        (None, None) => (listener.remote_asns.contains(initiator_local)
            && initiator.remote_asns.contains(listener_local))
        .then(|| pair(initiator_local, listener_local, ConfedSessionType::NoConfed)),
        // Both peers inside the same confederation: peers use their real AS numbers.
        (Some(c1), Some(c2)) if c1 == c2 => (listener.remote_asns.contains(initiator_local)
            && initiator.remote_asns.contains(listener_local))
        .then(|| {
            pair(
                initiator_local,
                listener_local,
                ConfedSessionType::WithinConfed,
            )
        }),
        // Both peers inside different confederations: only the external identifiers are visible.
        (Some(c1), Some(c2)) => (listener.remote_asns.contains(c1)
            && initiator.remote_asns.contains(c2))
        .then(|| pair(c1, c2, ConfedSessionType::AcrossConfedBorder)),
        // Only the initiator is inside a confederation: it is visible as its confederation
        // identifier, while the listener is visible as its local AS.
        (Some(c1), None) => (listener.remote_asns.contains(c1)
            && initiator.remote_asns.contains(listener_local))
        .then(|| pair(c1, listener_local, ConfedSessionType::AcrossConfedBorder)),
        // Only the listener is inside a confederation.
        (None, Some(c2)) => (listener.remote_asns.contains(initiator_local)
            && initiator.remote_asns.contains(c2))
        .then(|| {
            pair(
                initiator_local,
                c2,
                ConfedSessionType::AcrossConfedBorder,
            )
        }),
    }
}

/// Returns whether the two peers have compatible AS configurations.
pub fn has_compatible_as(a: PeerConfigRef<'_>, b: PeerConfigRef<'_>) -> bool {
    compute_as_pair(a.asn(), b.asn()).is_some()
}

/// The type of a session: internal or external, and for external sessions whether it is
/// restricted to a single network hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SessionType {
    /// Internal BGP.
    IBgp,
    /// External BGP restricted to directly connected peers.
    EBgpSingleHop,
    /// External BGP spanning multiple hops.
    EBgpMultiHop,
    /// Internal BGP over an unnumbered interface.
    IBgpUnnumbered,
    /// External BGP over an unnumbered interface.
    EBgpUnnumbered,
    /// The peer is too incomplete to determine a session type.
    Unset,
}

impl SessionType {
    /// Returns whether the session is external.
    pub fn is_ebgp(&self) -> bool {
        matches!(
            self,
            Self::EBgpSingleHop | Self::EBgpMultiHop | Self::EBgpUnnumbered
        )
    }

    /// Returns whether the session is internal.
    pub fn is_ibgp(&self) -> bool {
        matches!(self, Self::IBgp | Self::IBgpUnnumbered)
    }
}

impl std::fmt::Display for SessionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IBgp => write!(f, "iBGP"),
            Self::EBgpSingleHop => write!(f, "eBGP"),
            Self::EBgpMultiHop => write!(f, "eBGP multihop"),
            Self::IBgpUnnumbered => write!(f, "iBGP unnumbered"),
            Self::EBgpUnnumbered => write!(f, "eBGP unnumbered"),
            Self::Unset => write!(f, "unset"),
        }
    }
}

/// Determine what type of session the given peer is configured to establish as initiator.
///
/// A session is internal if the remote-AS acceptance set is exactly the AS number the initiator
/// itself uses on the session. For confederation members, the acceptance set is compared against
/// the member AS first and the confederation identifier second.
pub fn session_type(initiator: PeerConfigRef<'_>) -> SessionType {
    let asn = initiator.asn();
    let local_as = match asn.local_as {
        Some(local_as) if !asn.remote_asns.is_empty() => local_as,
        _ => return SessionType::Unset,
    };
    if let Some(confed) = asn.confederation {
        if asn.remote_asns.single() == Some(local_as) {
            return session_type_as(initiator, local_as);
        } else if asn.remote_asns.single() == Some(confed) {
            return session_type_as(initiator, confed);
        }
    }
    session_type_as(initiator, local_as)
}

/// The session type under an assumption about which AS number the initiator uses.
fn session_type_as(initiator: PeerConfigRef<'_>, used_as: AsId) -> SessionType {
    let internal = initiator.asn().remote_asns.single() == Some(used_as);
    if matches!(initiator, PeerConfigRef::Unnumbered(_)) {
        if internal {
            SessionType::IBgpUnnumbered
        } else {
            SessionType::EBgpUnnumbered
        }
    } else if internal {
        SessionType::IBgp
    } else if initiator.ebgp_multihop() {
        SessionType::EBgpMultiHop
    } else {
        SessionType::EBgpSingleHop
    }
}

/// The negotiated properties of one direction of a session. An edge from `A` to `B` in the
/// topology describes the session as `A` perceives it; the paired reverse edge carries the
/// swapped AS numbers and IPs. The session type and confederation relationship are shared by
/// both directions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BgpSessionProperties {
    /// The AS number the edge source uses on this session.
    pub local_as: AsId,
    /// The AS number the edge source sees on the remote side.
    pub remote_as: AsId,
    /// The IP address the edge source uses on this session.
    pub local_ip: Ipv4Addr,
    /// The IP address of the remote side.
    pub remote_ip: Ipv4Addr,
    /// The type of the session, derived from the initiator's configuration.
    pub session_type: SessionType,
    /// The confederation relationship of the session.
    pub confed_type: ConfedSessionType,
}

impl BgpSessionProperties {
    /// Construct the properties of one direction of a compatible session.
    ///
    /// `initiator_ip` is the local IP the initiator uses to open the session. With
    /// `reverse_direction`, the properties describe the listener's perception instead of the
    /// initiator's.
    pub fn from_peers(
        initiator: PeerConfigRef<'_>,
        initiator_ip: Ipv4Addr,
        listener: PeerConfigRef<'_>,
        reverse_direction: bool,
        as_pair: AsPair,
    ) -> Self {
        let listener_ip = match listener.local_ip() {
            Some(ip) => ip,
            // The listener has no configured local IP, so it must be active or dynamic, and the
            // initiator must be active (unnumbered peers only ever peer with each other and
            // always carry a local IP).
            None => match initiator {
                PeerConfigRef::Active(c) => c.peer_address,
                _ => unreachable!("a listener without local IP implies an active initiator"),
            },
        };
        let session_type = session_type(initiator);
        let view = if reverse_direction {
            as_pair.reverse()
        } else {
            as_pair
        };
        Self {
            local_as: view.local_as,
            remote_as: view.remote_as,
            local_ip: if reverse_direction {
                listener_ip
            } else {
                initiator_ip
            },
            remote_ip: if reverse_direction {
                initiator_ip
            } else {
                listener_ip
            },
            session_type,
            confed_type: as_pair.confed_type,
        }
    }

    /// Returns whether the session is external.
    pub fn is_ebgp(&self) -> bool {
        self.session_type.is_ebgp()
    }

    /// The same direction of the session, seen from the other endpoint.
    pub fn reverse(&self) -> Self {
        Self {
            local_as: self.remote_as,
            remote_as: self.local_as,
            local_ip: self.remote_ip,
            remote_ip: self.local_ip,
            session_type: self.session_type,
            confed_type: self.confed_type,
        }
    }
}

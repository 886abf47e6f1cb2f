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

//! Test the AS compatibility oracle and session-type derivation.

use pretty_assertions::assert_eq;

use super::{active_peer, ip};
use crate::prelude::*;

#[test]
fn asn_space_ranges() {
    let mut space = AsnSpace::new();
    assert!(space.is_empty());
    space.add(65001u32);
    assert_eq!(space.single(), Some(AsId(65001)));
    space.add_range(64512u32, 64600u32);
    assert!(space.contains(64512u32));
    assert!(space.contains(AsId(64600)));
    assert!(!space.contains(64601u32));
    assert_eq!(space.single(), None);
    assert_eq!(space.to_string(), "{64512-64600, 65001}");

    // adjacent ranges merge
    space.add(64601u32);
    assert!(space.contains(64601u32));
    assert_eq!(space.to_string(), "{64512-64601, 65001}");
}

#[test]
fn as_pair_without_confederations() {
    let a = AsnConfig::new(65001, [65002]);
    let b = AsnConfig::new(65002, [65001]);
    assert_eq!(
        compute_as_pair(&a, &b),
        Some(AsPair {
            local_as: AsId(65001),
            remote_as: AsId(65002),
            confed_type: ConfedSessionType::NoConfed,
        })
    );
}

#[test]
fn as_pair_ibgp() {
    let a = AsnConfig::new(65001, [65001]);
    let b = AsnConfig::new(65001, [65001]);
    assert_eq!(
        compute_as_pair(&a, &b),
        Some(AsPair {
            local_as: AsId(65001),
            remote_as: AsId(65001),
            confed_type: ConfedSessionType::NoConfed,
        })
    );
}

#[test]
fn as_pair_incompatible() {
    let a = AsnConfig::new(65001, [65003]);
    let b = AsnConfig::new(65002, [65001]);
    assert_eq!(compute_as_pair(&a, &b), None);
    assert_eq!(compute_as_pair(&b, &a), None);
}

#[test]
fn as_pair_missing_local_as() {
    let a = AsnConfig {
        local_as: None,
        confederation: None,
        remote_asns: [65002u32].into_iter().collect(),
    };
    let b = AsnConfig::new(65002, [65001]);
    assert_eq!(compute_as_pair(&a, &b), None);
    assert_eq!(compute_as_pair(&b, &a), None);
}

#[test]
fn as_pair_within_confederation() {
    // Inside a confederation, members identify each other by their real AS numbers.
    let a = AsnConfig::confederated(65001, 65000, [65002]);
    let b = AsnConfig::confederated(65002, 65000, [65001]);
    assert_eq!(
        compute_as_pair(&a, &b),
        Some(AsPair {
            local_as: AsId(65001),
            remote_as: AsId(65002),
            confed_type: ConfedSessionType::WithinConfed,
        })
    );
}

#[test]
fn as_pair_across_confederations() {
    // Across the border, only the confederation identifiers are visible.
    let a = AsnConfig::confederated(1, 65000, [65500]);
    let b = AsnConfig::confederated(2, 65500, [65000]);
    assert_eq!(
        compute_as_pair(&a, &b),
        Some(AsPair {
            local_as: AsId(65000),
            remote_as: AsId(65500),
            confed_type: ConfedSessionType::AcrossConfedBorder,
        })
    );
}

#[test]
fn as_pair_one_sided_confederation() {
    let member = AsnConfig::confederated(1, 65000, [65010]);
    let outside = AsnConfig::new(65010, [65000]);
    assert_eq!(
        compute_as_pair(&member, &outside),
        Some(AsPair {
            local_as: AsId(65000),
            remote_as: AsId(65010),
            confed_type: ConfedSessionType::AcrossConfedBorder,
        })
    );
    assert_eq!(
        compute_as_pair(&outside, &member),
        Some(AsPair {
            local_as: AsId(65010),
            remote_as: AsId(65000),
            confed_type: ConfedSessionType::AcrossConfedBorder,
        })
    );
}

#[test]
fn as_pair_confederation_mismatch() {
    // A member peering by its real AS number is invisible outside its confederation.
    let member = AsnConfig::confederated(1, 65000, [65010]);
    let outside = AsnConfig::new(65010, [1]);
    assert_eq!(compute_as_pair(&member, &outside), None);
}

#[test]
fn as_pair_is_symmetric() {
    let configs = [
        AsnConfig::new(65001, [65002]),
        AsnConfig::new(65002, [65001]),
        AsnConfig::confederated(65001, 65000, [65002]),
        AsnConfig::confederated(65002, 65000, [65001]),
        AsnConfig::confederated(2, 65500, [65000]),
        AsnConfig::new(65010, [65000]),
    ];
    for a in &configs {
        for b in &configs {
            assert_eq!(
                compute_as_pair(a, b),
                compute_as_pair(b, a).map(AsPair::reverse),
                "symmetry violated for {a:?} and {b:?}",
            );
        }
    }
}

#[test]
fn as_pair_reverse() {
    let pair = AsPair {
        local_as: AsId(1),
        remote_as: AsId(2),
        confed_type: ConfedSessionType::NoConfed,
    };
    assert_eq!(pair.reverse().reverse(), pair);
    assert_eq!(pair.reverse().local_as, AsId(2));
    assert_eq!(pair.reverse().remote_as, AsId(1));
}

#[test]
fn session_type_of_active_peers() {
    let peer = ip("10.0.0.2");

    let ibgp = active_peer(peer, None, AsnConfig::new(65001, [65001]));
    assert_eq!(session_type(PeerConfigRef::Active(&ibgp)), SessionType::IBgp);

    let ebgp = active_peer(peer, None, AsnConfig::new(65001, [65002]));
    assert_eq!(
        session_type(PeerConfigRef::Active(&ebgp)),
        SessionType::EBgpSingleHop
    );

    let mut multihop = ebgp.clone();
    multihop.ebgp_multihop = true;
    assert_eq!(
        session_type(PeerConfigRef::Active(&multihop)),
        SessionType::EBgpMultiHop
    );

    // Accepting a range of remote AS numbers is never internal.
    let mut range = AsnConfig::new(65001, [] as [u32; 0]);
    range.remote_asns.add_range(65001u32, 65010u32);
    let ebgp_range = active_peer(peer, None, range);
    assert_eq!(
        session_type(PeerConfigRef::Active(&ebgp_range)),
        SessionType::EBgpSingleHop
    );
}

#[test]
fn session_type_of_incomplete_peers() {
    let peer = ip("10.0.0.2");

    let no_remote = active_peer(peer, None, AsnConfig::new(65001, [] as [u32; 0]));
    assert_eq!(
        session_type(PeerConfigRef::Active(&no_remote)),
        SessionType::Unset
    );

    let no_local = active_peer(
        peer,
        None,
        AsnConfig {
            local_as: None,
            confederation: None,
            remote_asns: [65002u32].into_iter().collect(),
        },
    );
    assert_eq!(
        session_type(PeerConfigRef::Active(&no_local)),
        SessionType::Unset
    );
}

#[test]
fn session_type_of_confederation_members() {
    let peer = ip("10.0.0.2");

    // A member peering with its own member AS is internal.
    let member_internal = active_peer(peer, None, AsnConfig::confederated(65001, 65000, [65001]));
    assert_eq!(
        session_type(PeerConfigRef::Active(&member_internal)),
        SessionType::IBgp
    );

    // A member peering with another member is external within the confederation.
    let member_external = active_peer(peer, None, AsnConfig::confederated(65001, 65000, [65002]));
    assert_eq!(
        session_type(PeerConfigRef::Active(&member_external)),
        SessionType::EBgpSingleHop
    );
}

#[test]
fn session_type_of_unnumbered_peers() {
    let ibgp = UnnumberedPeerConfig {
        peer_interface: "eth0".to_string(),
        asn: AsnConfig::new(65001, [65001]),
    };
    assert_eq!(
        session_type(PeerConfigRef::Unnumbered(&ibgp)),
        SessionType::IBgpUnnumbered
    );

    let ebgp = UnnumberedPeerConfig {
        peer_interface: "eth0".to_string(),
        asn: AsnConfig::new(65001, [65002]),
    };
    assert_eq!(
        session_type(PeerConfigRef::Unnumbered(&ebgp)),
        SessionType::EBgpUnnumbered
    );
}

#[test]
fn session_properties_directions() {
    let a_ip = ip("10.0.0.1");
    let b_ip = ip("10.0.0.2");
    let initiator = active_peer(b_ip, Some(a_ip), AsnConfig::new(65001, [65002]));
    let listener = active_peer(a_ip, Some(b_ip), AsnConfig::new(65002, [65001]));
    let as_pair = compute_as_pair(&initiator.asn, &listener.asn).unwrap();

    let fwd = BgpSessionProperties::from_peers(
        PeerConfigRef::Active(&initiator),
        a_ip,
        PeerConfigRef::Active(&listener),
        false,
        as_pair,
    );
    let rev = BgpSessionProperties::from_peers(
        PeerConfigRef::Active(&initiator),
        a_ip,
        PeerConfigRef::Active(&listener),
        true,
        as_pair,
    );

    assert_eq!(fwd.local_as, AsId(65001));
    assert_eq!(fwd.remote_as, AsId(65002));
    assert_eq!(fwd.local_ip, a_ip);
    assert_eq!(fwd.remote_ip, b_ip);
    assert_eq!(fwd.session_type, SessionType::EBgpSingleHop);
    assert!(fwd.is_ebgp());

    // The reverse direction is the exact mirror image.
    assert_eq!(rev, fwd.reverse());
    assert_eq!(rev.local_as, AsId(65002));
    assert_eq!(rev.local_ip, b_ip);
    assert_eq!(rev.remote_ip, a_ip);
}

#[test]
fn session_properties_listener_without_local_ip() {
    let a_ip = ip("10.0.0.1");
    let b_ip = ip("10.0.0.2");
    let initiator = active_peer(b_ip, Some(a_ip), AsnConfig::new(65001, [65002]));
    // The listener is dynamic without a configured local IP. Its address defaults to the address
    // the initiator points at.
    let listener = DynamicPeerConfig {
        peer_prefix: "10.0.0.0/24".parse().unwrap(),
        local_ip: None,
        asn: AsnConfig::new(65002, [65001]),
        ebgp_multihop: false,
        check_local_ip_on_accept: false,
    };
    let as_pair = compute_as_pair(&initiator.asn, &listener.asn).unwrap();

    let fwd = BgpSessionProperties::from_peers(
        PeerConfigRef::Active(&initiator),
        a_ip,
        PeerConfigRef::Dynamic(&listener),
        false,
        as_pair,
    );
    assert_eq!(fwd.remote_ip, b_ip);
}

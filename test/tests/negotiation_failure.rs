/// Failed negotiations and connect timeouts
///
/// A failed offer surfaces as an error, leaves the peer `Disconnected`, and
/// is retried a bounded number of times. A connection that never opens is
/// abandoned after the connect timeout.

use std::time::Duration;

use haze_node::PeerState;
use haze_shared::{MessageType, PeerId, Position};
use haze_test::{assert_no_orphan_connections, eager_config, init_logger, TestSwarm};

fn pair(seed: u64) -> (TestSwarm, PeerId, PeerId) {
    init_logger();
    let mut swarm = TestSwarm::new(seed);
    let a = swarm.add_node_with_id("a", eager_config(), Position::new(0.0, 0.0, 0.0));
    let b = swarm.add_node_with_id("b", eager_config(), Position::new(1.0, 0.0, 0.0));
    (swarm, a, b)
}

// ========== Offer Failure Tests ==========

#[test]
fn failed_offer_is_reported_and_retried() {
    let (mut swarm, a, b) = pair(31);
    swarm.network.fail_offers_from(&a);

    swarm.node_mut(&a).connect(&b);
    swarm.step();

    assert_eq!(swarm.log().errors_for(&a).len(), 1);
    assert_eq!(swarm.node(&a).peer_state(&b), PeerState::Disconnected);
    assert_no_orphan_connections!(swarm);

    swarm.network.heal_offers_from(&a);
    let (a2, b2) = (a.clone(), b.clone());
    assert!(swarm.run_until(Duration::from_secs(6), move |swarm| swarm
        .are_linked(&a2, &b2)));
    assert_eq!(swarm.network.offer_attempts(&a, &b), 2);
    assert_eq!(swarm.log().errors_for(&a).len(), 1);
}

#[test]
fn retries_are_bounded() {
    let (mut swarm, a, b) = pair(37);
    swarm.network.fail_offers_from(&a);

    swarm.node_mut(&a).connect(&b);
    swarm.run_for(Duration::from_secs(15));

    // the first attempt plus three retries
    assert_eq!(swarm.network.offer_attempts(&a, &b), 4);
    assert_eq!(swarm.log().errors_for(&a).len(), 4);
    assert_eq!(swarm.node(&a).peer_state(&b), PeerState::Disconnected);
    assert_no_orphan_connections!(swarm);
}

// ========== Timeout Tests ==========

#[test]
fn connection_that_never_opens_times_out() {
    let (mut swarm, a, b) = pair(41);
    swarm.network.block_link(&a, &b);

    swarm.node_mut(&a).connect(&b);
    swarm.run_for(Duration::from_secs(1));
    assert_eq!(
        swarm.state_between(&a, &b),
        (PeerState::Connecting, PeerState::Connecting)
    );

    swarm.run_for(Duration::from_millis(3500));
    assert_eq!(
        swarm.state_between(&a, &b),
        (PeerState::Disconnected, PeerState::Disconnected)
    );
    assert_no_orphan_connections!(swarm);

    // a timeout is not a negotiation error, so nothing redials
    swarm.run_for(Duration::from_secs(5));
    assert_eq!(swarm.network.offer_attempts(&a, &b), 1);
    assert!(swarm.log().disconnections.is_empty());
}

#[test]
fn reconnect_after_timeout_exchanges_fresh_candidates() {
    let (mut swarm, a, b) = pair(47);
    swarm.network.block_link(&a, &b);

    swarm.node_mut(&a).connect(&b);
    swarm.run_for(Duration::from_millis(4500));
    assert_eq!(
        swarm.state_between(&a, &b),
        (PeerState::Disconnected, PeerState::Disconnected)
    );

    swarm.network.unblock_link(&a, &b);
    swarm.node_mut(&a).connect(&b);
    let (a2, b2) = (a.clone(), b.clone());
    assert!(swarm.run_until(Duration::from_secs(5), move |swarm| swarm
        .are_linked(&a2, &b2)));
    swarm.step();

    assert_eq!(swarm.network.offer_attempts(&a, &b), 2);
    assert!(swarm.network.candidates_received(&a, &b) > 0);
    assert!(swarm.network.candidates_received(&b, &a) > 0);
}

#[test]
fn sends_wait_for_a_negotiating_channel() {
    let (mut swarm, a, b) = pair(43);

    swarm.node_mut(&a).connect(&b);
    swarm
        .node_mut(&a)
        .send(&b, MessageType::Application(3), b"early".to_vec());
    let (a2, b2) = (a.clone(), b.clone());
    assert!(swarm.run_until(Duration::from_secs(5), move |swarm| swarm
        .are_linked(&a2, &b2)));
    swarm.step();

    let received = swarm.log().messages_for(&b);
    assert_eq!(received.len(), 1);
    let (_, info, kind, payload) = received[0];
    assert_eq!(info.source_id, a);
    assert_eq!(*kind, 3);
    assert_eq!(payload.as_slice(), b"early");
}

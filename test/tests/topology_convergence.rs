/// Degree-bounded convergence of the topology optimizer
///
/// Five nodes on a line, linked only as a chain to begin with. With leader
/// gating and cooldowns off, every node must end up linked with its nearest
/// peers while never exceeding its hard cap.

use std::time::Duration;

use haze_shared::{NodeConfig, PeerId, Position};
use haze_test::{
    assert_degree_bounded, assert_no_orphan_connections, eager_config, init_logger, TestSwarm,
};

const SOFT_LIMIT: u32 = 2;

fn config() -> NodeConfig {
    NodeConfig {
        soft_limit: SOFT_LIMIT,
        min_degree: 5,
        hard_cap: 4,
        ..eager_config()
    }
}

/// Ids deliberately out of position order, so both direct connects and
/// connect requests are exercised
fn line() -> TestSwarm {
    init_logger();
    let mut swarm = TestSwarm::new(5);
    let placements = [("e", 0.0), ("b", 1.0), ("d", 3.0), ("a", 7.0), ("c", 15.0)];
    let ids: Vec<PeerId> = placements
        .iter()
        .map(|(id, x)| swarm.add_node_with_id(*id, config(), Position::new(*x, 0.0, 0.0)))
        .collect();

    for pair in ids.windows(2) {
        assert!(swarm.link(&pair[0], &pair[1]), "chain link {}-{}", pair[0], pair[1]);
    }
    swarm
}

fn nearest(swarm: &TestSwarm, id: &PeerId, count: usize) -> Vec<PeerId> {
    let origin = swarm.node(id).position();
    let mut others: Vec<(f32, PeerId)> = swarm
        .nodes()
        .iter()
        .filter(|node| node.id() != id)
        .map(|node| (origin.distance(&node.position()), node.id().clone()))
        .collect();
    others.sort_by(|x, y| x.0.total_cmp(&y.0).then_with(|| x.1.cmp(&y.1)));
    others.into_iter().take(count).map(|(_, id)| id).collect()
}

fn converged(swarm: &TestSwarm) -> bool {
    let wanted = (SOFT_LIMIT as usize).min(swarm.nodes().len() - 1);
    swarm.ids().iter().all(|id| {
        nearest(swarm, id, wanted)
            .iter()
            .all(|peer| swarm.are_linked(id, peer))
    })
}

// ========== Convergence Tests ==========

#[test]
fn every_node_links_its_nearest_peers() {
    let mut swarm = line();

    let done = swarm.run_until(Duration::from_secs(30), converged);
    assert!(done, "swarm did not converge");
    assert_degree_bounded!(swarm);
    assert_no_orphan_connections!(swarm);
}

#[test]
fn converged_swarm_is_stable() {
    let mut swarm = line();
    assert!(swarm.run_until(Duration::from_secs(30), converged));

    let before: Vec<Vec<PeerId>> = swarm
        .nodes()
        .iter()
        .map(|node| node.linked_peers())
        .collect();
    swarm.take_log();
    swarm.run_for(Duration::from_secs(10));

    let after: Vec<Vec<PeerId>> = swarm
        .nodes()
        .iter()
        .map(|node| node.linked_peers())
        .collect();
    assert_eq!(before, after);
    assert!(swarm.log().disconnections.is_empty());
}

#[test]
fn degree_never_exceeds_hard_cap_while_converging() {
    let mut swarm = line();

    for _ in 0..200 {
        swarm.step();
        assert_degree_bounded!(swarm);
    }
}

#[test]
fn far_node_learns_routes_through_gossip() {
    let mut swarm = line();
    assert!(swarm.run_until(Duration::from_secs(30), converged));

    let e = PeerId::from("e");
    let c = PeerId::from("c");
    // e and c are never direct neighbors
    assert!(!swarm.are_linked(&e, &c));
    let hop = swarm.node(&c).routing_table().get(&e, swarm.now()).cloned();
    assert!(hop.is_some_and(|hop| swarm.node(&c).linked_peers().contains(&hop)));
}

/// Assert that no node holds a connection to a peer it considers
/// `Disconnected`
#[macro_export]
macro_rules! assert_no_orphan_connections {
    ($swarm:expr) => {
        for node in $swarm.nodes() {
            for record in node.registry().iter() {
                assert!(
                    record.state() != haze_node::PeerState::Disconnected
                        || record.connection().is_none(),
                    "node {} still holds a connection to disconnected peer {}",
                    node.id(),
                    record.id()
                );
            }
        }
    };
}

/// Assert that every node stays within its configured hard cap
#[macro_export]
macro_rules! assert_degree_bounded {
    ($swarm:expr) => {
        for node in $swarm.nodes() {
            assert!(
                node.degree() <= node.config().hard_cap,
                "node {} has degree {} above hard cap {}",
                node.id(),
                node.degree(),
                node.config().hard_cap
            );
        }
    };
}

/// RPC delivery over the overlay
///
/// Checks argument padding with `MessageInfo`, replies queued from inside a
/// handler, broadcast with local invocation, and the error events raised for
/// unknown keys and mismatched arguments.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use haze_node::RpcOutbox;
use haze_shared::{MessageInfo, NodeConfig, PeerId, Position, RpcSignature, RpcType, RpcValue};
use haze_test::{eager_config, init_logger, TestSwarm};

type Calls = Arc<Mutex<Vec<Vec<RpcValue>>>>;

fn line_config() -> NodeConfig {
    NodeConfig {
        soft_limit: 1,
        min_degree: 5,
        ..eager_config()
    }
}

fn chain() -> (TestSwarm, PeerId, PeerId, PeerId) {
    init_logger();
    let mut swarm = TestSwarm::new(23);
    let a = swarm.add_node_with_id("a", line_config(), Position::new(0.0, 0.0, 0.0));
    let b = swarm.add_node_with_id("b", line_config(), Position::new(1.0, 0.0, 0.0));
    let c = swarm.add_node_with_id("c", line_config(), Position::new(2.0, 0.0, 0.0));

    assert!(swarm.link(&a, &b));
    assert!(swarm.link(&b, &c));
    swarm.run_for(Duration::from_secs(4));
    swarm.take_log();

    (swarm, a, b, c)
}

fn recorder(swarm: &mut TestSwarm, node: &PeerId, key: &str, signature: RpcSignature) -> Calls {
    let calls: Calls = Arc::new(Mutex::new(Vec::new()));
    let sink = calls.clone();
    swarm.node_mut(node).register_rpc(
        key,
        signature,
        move |args: &[RpcValue], _: &mut RpcOutbox| sink.lock().unwrap().push(args.to_vec()),
    );
    calls
}

// ========== Padding Tests ==========

#[test]
fn info_is_appended_with_origin_and_last_hop() {
    let (mut swarm, a, b, c) = chain();
    let calls = recorder(
        &mut swarm,
        &c,
        "crate_Hit",
        RpcSignature::new().param(RpcType::I32).with_info(),
    );

    swarm
        .node_mut(&a)
        .rpc(&c, "crate_Hit", vec![RpcValue::from(5i32)]);
    swarm.run_for(Duration::from_millis(500));

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0][0].as_i32(), Some(5));
    assert_eq!(
        calls[0][1].as_info(),
        Some(&MessageInfo {
            source_id: a,
            sender_id: b,
        })
    );
}

#[test]
fn info_is_appended_after_several_arguments() {
    let (mut swarm, a, b, c) = chain();
    let calls = recorder(
        &mut swarm,
        &c,
        "crate_Label",
        RpcSignature::new()
            .param(RpcType::I32)
            .param(RpcType::String)
            .with_info(),
    );

    swarm.node_mut(&a).rpc(
        &c,
        "crate_Label",
        vec![RpcValue::from(3i32), RpcValue::from("lid")],
    );
    swarm.run_for(Duration::from_millis(500));

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].len(), 3);
    assert_eq!(calls[0][0].as_i32(), Some(3));
    assert_eq!(calls[0][1].as_str(), Some("lid"));
    assert_eq!(
        calls[0][2].as_info(),
        Some(&MessageInfo {
            source_id: a,
            sender_id: b,
        })
    );
}

#[test]
fn handler_without_info_gets_exact_arguments() {
    let (mut swarm, a, _, c) = chain();
    let calls = recorder(
        &mut swarm,
        &c,
        "crate_Move",
        RpcSignature::new()
            .param(RpcType::Position)
            .param(RpcType::String),
    );

    swarm.node_mut(&a).rpc(
        &c,
        "crate_Move",
        vec![
            RpcValue::from(Position::new(1.0, 2.0, 3.0)),
            RpcValue::from("run"),
        ],
    );
    swarm.run_for(Duration::from_millis(500));

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].len(), 2);
    assert_eq!(calls[0][0].as_position(), Some(Position::new(1.0, 2.0, 3.0)));
    assert_eq!(calls[0][1].as_str(), Some("run"));
}

// ========== Reply Tests ==========

#[test]
fn handler_reply_returns_to_caller() {
    let (mut swarm, a, b, c) = chain();
    let acks = recorder(&mut swarm, &a, "crate_Ack", RpcSignature::new().param(RpcType::I64).with_info());

    swarm.node_mut(&c).register_rpc(
        "crate_Ping",
        RpcSignature::new().param(RpcType::I64).with_info(),
        |args: &[RpcValue], outbox: &mut RpcOutbox| {
            if let (Some(value), Some(info)) = (args[0].as_i64(), args[1].as_info()) {
                outbox.rpc(&info.source_id, "crate_Ack", vec![RpcValue::from(value + 1)]);
            }
        },
    );

    swarm
        .node_mut(&a)
        .rpc(&c, "crate_Ping", vec![RpcValue::from(41i64)]);
    swarm.run_for(Duration::from_secs(1));

    let acks = acks.lock().unwrap();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0][0].as_i64(), Some(42));
    let info = acks[0][1].as_info().unwrap();
    assert_eq!(info.source_id, c);
    assert_eq!(info.sender_id, b);
}

#[test]
fn broadcast_with_self_runs_locally_and_on_neighbors() {
    let (mut swarm, a, b, c) = chain();
    let signature = RpcSignature::new().with_info();
    let on_a = recorder(&mut swarm, &a, "crate_Wave", signature.clone());
    let on_b = recorder(&mut swarm, &b, "crate_Wave", signature.clone());
    let on_c = recorder(&mut swarm, &c, "crate_Wave", signature);

    swarm
        .node_mut(&b)
        .rpc_all_with_self("crate_Wave", Vec::new());

    // local invocation happens right away
    assert_eq!(on_b.lock().unwrap().len(), 1);
    assert_eq!(
        on_b.lock().unwrap()[0][0].as_info().map(|info| info.source_id.clone()),
        Some(b.clone())
    );

    swarm.run_for(Duration::from_millis(500));
    assert_eq!(on_a.lock().unwrap().len(), 1);
    assert_eq!(on_c.lock().unwrap().len(), 1);
    assert_eq!(on_b.lock().unwrap().len(), 1);
}

// ========== Error Tests ==========

#[test]
fn unknown_key_surfaces_as_error_event() {
    let (mut swarm, a, _, c) = chain();

    swarm.node_mut(&a).rpc(&c, "crate_Missing", Vec::new());
    swarm.run_for(Duration::from_millis(500));

    let log = swarm.log();
    let errors = log.errors_for(&c);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("crate_Missing"));
}

#[test]
fn mismatched_argument_is_rejected() {
    let (mut swarm, a, _, c) = chain();
    let calls = recorder(
        &mut swarm,
        &c,
        "crate_Hit",
        RpcSignature::new().param(RpcType::I32).with_info(),
    );

    swarm
        .node_mut(&a)
        .rpc(&c, "crate_Hit", vec![RpcValue::from("five")]);
    swarm.run_for(Duration::from_millis(500));

    assert!(calls.lock().unwrap().is_empty());
    assert_eq!(swarm.log().errors_for(&c).len(), 1);
}

#[test]
fn sender_supplied_info_is_rejected() {
    let (mut swarm, a, _, c) = chain();
    let calls = recorder(
        &mut swarm,
        &c,
        "crate_Hit",
        RpcSignature::new().param(RpcType::I32).with_info(),
    );

    let forged = MessageInfo {
        source_id: PeerId::from("admin"),
        sender_id: PeerId::from("admin"),
    };
    swarm.node_mut(&a).rpc(
        &c,
        "crate_Hit",
        vec![RpcValue::from(5i32), RpcValue::Info(forged)],
    );
    swarm.run_for(Duration::from_millis(500));

    assert!(calls.lock().unwrap().is_empty());
    let log = swarm.log();
    let errors = log.errors_for(&c);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("MessageInfo"));
}

#[test]
fn unregistered_handler_is_no_longer_called() {
    let (mut swarm, a, _, c) = chain();
    let calls = recorder(&mut swarm, &c, "crate_Hit", RpcSignature::new());

    swarm.node_mut(&c).unregister_rpc("crate_Hit");
    swarm.node_mut(&a).rpc(&c, "crate_Hit", Vec::new());
    swarm.run_for(Duration::from_millis(500));

    assert!(calls.lock().unwrap().is_empty());
    assert_eq!(swarm.log().errors_for(&c).len(), 1);
}

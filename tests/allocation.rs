mod common;

use std::sync::Arc;

use vpn_allocator::registry::resource::{ProtocolType, ResourceId, ResourceKind, ResourceStatus, TenantId};
use vpn_allocator::registry::ResourceRegistry;
use vpn_allocator::selector::WeightedLeastLoaded;
use vpn_allocator::{AllocError, PickConstraints, Selector};

fn openvpn() -> PickConstraints {
    PickConstraints::protocol(ProtocolType::OpenVpn)
}

#[test]
fn test_least_loaded_walkthrough() {
    let registry = ResourceRegistry::in_memory();
    registry.register(common::server("A", "t1", ProtocolType::OpenVpn, 10));
    registry.register(common::server("B", "t1", ProtocolType::OpenVpn, 45));
    registry.register(common::server("C", "t1", ProtocolType::OpenVpn, 10));
    let selector = Selector::new(registry.clone());
    let tenant = TenantId::from("t1");

    let first = selector.pick(&tenant, &openvpn()).unwrap();
    assert_eq!(first.id.as_str(), "A");

    registry.adjust_load(&first.id, 1).unwrap();
    let second = selector.pick(&tenant, &openvpn()).unwrap();
    assert_eq!(second.id.as_str(), "C");
}

#[test]
fn test_pick_never_crosses_tenants_or_status() {
    let registry = ResourceRegistry::in_memory();
    registry.register(common::server("mine-busy", "t1", ProtocolType::OpenVpn, 90));
    registry.register(common::server("theirs-idle", "t2", ProtocolType::OpenVpn, 0));
    registry.register(common::server("mine-maint", "t1", ProtocolType::OpenVpn, 0).with_status(ResourceStatus::Maintenance));
    registry.register(common::server("mine-off", "t1", ProtocolType::OpenVpn, 0).with_status(ResourceStatus::Offline));
    let selector = Selector::new(registry);

    let picked = selector.pick(&TenantId::from("t1"), &openvpn()).unwrap();
    assert_eq!(picked.id.as_str(), "mine-busy");

    let err = selector.pick(&TenantId::from("t3"), &openvpn()).unwrap_err();
    assert_eq!(err, AllocError::NoSuitableResource { tenant: TenantId::from("t3") });
}

#[test]
fn test_nodes_and_servers_share_pick() {
    let registry = ResourceRegistry::in_memory();
    registry.register(common::server("srv", "t1", ProtocolType::ZeroTier, 5));
    registry.register(common::node("node", "t1", 30));
    let selector = Selector::new(registry);

    let constraints = PickConstraints::protocol(ProtocolType::ZeroTier).of_kind(ResourceKind::Node);
    assert_eq!(selector.pick(&TenantId::from("t1"), &constraints).unwrap().id.as_str(), "node");

    let any_kind = PickConstraints::protocol(ProtocolType::ZeroTier);
    assert_eq!(selector.pick(&TenantId::from("t1"), &any_kind).unwrap().id.as_str(), "srv");
}

#[test]
fn test_weighted_prefers_bigger_machine() {
    let registry = ResourceRegistry::in_memory();
    registry.register(common::server("small", "t1", ProtocolType::OpenVpn, 20));
    registry.register(common::server("large", "t1", ProtocolType::OpenVpn, 30).with_weight(4));
    let selector = Selector::with_strategy(registry, Arc::new(WeightedLeastLoaded::new()));

    assert_eq!(selector.pick(&TenantId::from("t1"), &openvpn()).unwrap().id.as_str(), "large");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adjustments_are_not_lost() {
    let registry = ResourceRegistry::in_memory();
    registry.register(common::server("hot", "t1", ProtocolType::WireGuard, 50));
    let id = ResourceId::from("hot");

    let mut handles = Vec::new();
    for i in 0..80 {
        let registry = registry.clone();
        let id = id.clone();
        let delta = if i % 2 == 0 { 1 } else { -1 };
        handles.push(tokio::spawn(async move { registry.adjust_load(&id, delta) }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Never reaches a bound: 50 ± 40 stays within 0..=100.
    assert_eq!(registry.get(&id).unwrap().capacity_load, 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_allocations_balance_and_release() {
    let registry = ResourceRegistry::in_memory();
    for id in ["a", "b", "c", "d"] {
        registry.register(common::server(id, "t1", ProtocolType::Ikev2, 0));
    }
    let selector = Arc::new(Selector::new(registry.clone()));
    let constraints = PickConstraints::protocol(ProtocolType::Ikev2);

    let mut handles = Vec::new();
    for _ in 0..40 {
        let selector = selector.clone();
        let constraints = constraints.clone();
        handles.push(tokio::spawn(async move {
            selector.allocate(&TenantId::from("t1"), &constraints).unwrap().detach()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let sum: u32 = registry.all().iter().map(|r| u32::from(r.capacity_load)).sum();
    assert_eq!(sum, 40);

    for resource in registry.all() {
        for _ in 0..resource.capacity_load {
            registry.adjust_load(&resource.id, -1).unwrap();
        }
    }
    assert!(registry.all().iter().all(|r| r.capacity_load == 0));
}

#[test]
fn test_guard_drop_releases_load() {
    let registry = ResourceRegistry::in_memory();
    registry.register(common::server("only", "t1", ProtocolType::OpenVpn, 3));
    let selector = Selector::new(registry.clone());

    {
        let guard = selector.allocate(&TenantId::from("t1"), &openvpn()).unwrap();
        assert_eq!(guard.id.as_str(), "only");
        assert_eq!(registry.get(&"only".into()).unwrap().capacity_load, 4);
    }
    assert_eq!(registry.get(&"only".into()).unwrap().capacity_load, 3);
}

#[test]
fn test_load_clamps_at_bounds() {
    let registry = ResourceRegistry::in_memory();
    registry.register(common::server("x", "t1", ProtocolType::OpenVpn, 99));
    let id = ResourceId::from("x");

    assert_eq!(registry.adjust_load(&id, 5).unwrap(), 100);
    assert_eq!(registry.adjust_load(&id, -500).unwrap(), 0);
    assert_eq!(registry.adjust_load(&ResourceId::from("missing"), 1), Err(AllocError::NotFound("missing".into())));
}

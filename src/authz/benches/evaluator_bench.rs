//! Evaluation and assembly benchmarks
//!
//! Evaluation is a linear walk over the policy that reads context fields in
//! place, so cost should scale with permission count.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rolegate_authz::{
    can_evaluate, evaluate, Condition, Fixture, MemoryStore, Permission, PermissionScope, Policy,
    PolicyAssembler, PolicyService, Principal, ResourceContext, Role, ServiceConfig,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn create_test_permissions(count: usize) -> Vec<Permission> {
    (0..count)
        .map(|i| {
            let permission = Permission::new(format!("p{}", i), "read", format!("resource-{}", i % 50));
            match i % 3 {
                0 => permission.with_scope(PermissionScope::Own),
                1 => permission.with_condition(Condition::equals("orgId", "org_1")),
                _ => permission,
            }
        })
        .collect()
}

fn create_test_policy(count: usize) -> Policy {
    Policy {
        principal: Principal::new("u1", "Bench").with_org("org_1"),
        permissions: create_test_permissions(count),
    }
}

fn bench_can_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("can_evaluate");
    let ctx = ResourceContext::new().with("ownerId", "u2").with("orgId", "org_2");

    for count in [10, 100, 1000].iter() {
        let policy = create_test_policy(*count);

        // Worst case: every candidate is walked and none applies
        group.bench_with_input(BenchmarkId::new("deny", count), count, |b, _| {
            b.iter(|| can_evaluate(black_box(Some(&policy)), "read", "resource-7", black_box(&ctx)))
        });

        group.bench_with_input(BenchmarkId::new("miss", count), count, |b, _| {
            b.iter(|| can_evaluate(black_box(Some(&policy)), "delete", "resource-7", black_box(&ctx)))
        });
    }

    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let policy = create_test_policy(100);
    let ctx = ResourceContext::new().with("ownerId", "u1").with("orgId", "org_1");

    c.bench_function("evaluate_allow", |b| {
        b.iter(|| evaluate(black_box(Some(&policy)), "read", "resource-2", black_box(&ctx)))
    });
}

fn bench_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("assemble");

    for count in [10, 100, 1000].iter() {
        let roles: HashMap<_, _> = (0..10)
            .map(|r| {
                let role = Role {
                    permissions: create_test_permissions(*count / 10),
                    ..Role::new(format!("r{}", r), "Bench role")
                };
                (role.id.clone(), role)
            })
            .collect();
        let principal = roles
            .keys()
            .fold(Principal::new("u1", "Bench"), |p, id| p.with_role(id.clone(), "Bench role"));
        let grants = create_test_permissions(*count / 10);

        group.bench_with_input(BenchmarkId::new("permissions", count), count, |b, _| {
            b.iter(|| PolicyAssembler::assemble(principal.clone(), black_box(&roles), grants.clone()))
        });
    }

    group.finish();
}

fn bench_service_refresh(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let service = PolicyService::from_store(
        ServiceConfig::default(),
        Arc::new(MemoryStore::from_fixture(Fixture::demo())),
    );

    c.bench_function("service_refresh", |b| {
        b.to_async(&rt).iter(|| async { service.refresh().await.unwrap() })
    });
}

criterion_group!(
    benches,
    bench_can_evaluate,
    bench_evaluate,
    bench_assemble,
    bench_service_refresh
);
criterion_main!(benches);

use super::{never, Call, MemStore};
use crate::{
    build,
    reconcile::{Error, Op, Outcome, Reconciler},
    DesiredPolicy, InstanceDescriptor,
};
use netroll_k8s_api::network_policy::egress_cidrs;
use pretty_assertions::assert_eq;
use tokio::sync::oneshot;

fn desired(public: Option<&str>, private: Option<&str>) -> DesiredPolicy {
    build(
        &InstanceDescriptor::new("c0ffee", "db1", "team", "myapp", public, private)
            .expect("descriptor must have an address"),
    )
}

#[tokio::test]
async fn creates_missing_policy() {
    let store = MemStore::default();
    let reconciler = Reconciler::new(store.clone());
    let desired = desired(Some("1.1.1.1"), None);

    let outcome = reconciler.reconcile(&desired, never()).await.unwrap();
    assert_eq!(outcome, Outcome::Created);
    assert_eq!(
        store.calls(),
        vec![
            Call::Get("db-myapp-db1".to_string()),
            Call::Create("db-myapp-db1".to_string()),
        ]
    );

    let stored = store
        .policy("team", "db-myapp-db1")
        .expect("policy must be stored");
    assert_eq!(stored.spec, desired.policy.spec);
    assert_eq!(
        stored.metadata.owner_references,
        desired.policy.metadata.owner_references
    );
}

#[tokio::test]
async fn replaces_existing_policy() {
    let store = MemStore::default();
    store.seed(desired(Some("1.1.1.1"), None).policy);
    let reconciler = Reconciler::new(store.clone());
    let desired = desired(Some("1.1.1.1"), Some("10.0.0.5"));

    let outcome = reconciler.reconcile(&desired, never()).await.unwrap();
    assert_eq!(outcome, Outcome::Updated);
    assert_eq!(
        store.calls(),
        vec![
            Call::Get("db-myapp-db1".to_string()),
            Call::Replace("db-myapp-db1".to_string()),
        ]
    );

    let policies = store.policies();
    assert_eq!(policies.len(), 1);
    assert_eq!(
        egress_cidrs(&policies[0]),
        vec!["1.1.1.1/32", "10.0.0.5/32"]
    );
}

#[tokio::test]
async fn writes_even_when_unchanged() {
    let store = MemStore::default();
    let reconciler = Reconciler::new(store.clone());
    let desired = desired(Some("1.1.1.1"), None);

    assert_eq!(
        reconciler.reconcile(&desired, never()).await.unwrap(),
        Outcome::Created
    );
    assert_eq!(
        reconciler.reconcile(&desired, never()).await.unwrap(),
        Outcome::Updated
    );
    assert_eq!(
        reconciler.reconcile(&desired, never()).await.unwrap(),
        Outcome::Updated
    );

    // Every pass reads and then writes.
    assert_eq!(store.calls().len(), 6);

    let policies = store.policies();
    assert_eq!(policies.len(), 1);
    assert_eq!(policies[0].spec, desired.policy.spec);
    assert_eq!(policies[0].metadata.name, desired.policy.metadata.name);
}

#[tokio::test]
async fn get_failure_is_unavailable() {
    let store = MemStore::failing(Op::Get);
    let reconciler = Reconciler::new(store.clone());

    let error = reconciler
        .reconcile(&desired(Some("1.1.1.1"), None), never())
        .await
        .unwrap_err();
    assert!(
        matches!(
            error,
            Error::StoreUnavailable { op: Op::Get, ref name, .. } if name == "db-myapp-db1"
        ),
        "unexpected error: {error}"
    );
    assert_eq!(store.calls(), vec![Call::Get("db-myapp-db1".to_string())]);
    assert!(store.policies().is_empty());
}

#[tokio::test]
async fn create_failure_is_unavailable() {
    let store = MemStore::failing(Op::Create);
    let reconciler = Reconciler::new(store.clone());

    let error = reconciler
        .reconcile(&desired(Some("1.1.1.1"), None), never())
        .await
        .unwrap_err();
    assert!(
        matches!(error, Error::StoreUnavailable { op: Op::Create, .. }),
        "unexpected error: {error}"
    );
    assert!(store.policies().is_empty());
}

#[tokio::test]
async fn replace_failure_is_unavailable() {
    let store = MemStore::failing(Op::Replace);
    let previous = desired(Some("1.1.1.1"), None).policy;
    store.seed(previous.clone());
    let reconciler = Reconciler::new(store.clone());

    let error = reconciler
        .reconcile(&desired(Some("8.8.8.8"), None), never())
        .await
        .unwrap_err();
    assert!(
        matches!(error, Error::StoreUnavailable { op: Op::Replace, .. }),
        "unexpected error: {error}"
    );
    assert_eq!(
        error.to_string(),
        "failed to replace NetworkPolicy team/db-myapp-db1: store unavailable"
    );

    // The stored object is untouched.
    let stored = store.policy("team", "db-myapp-db1").unwrap();
    assert_eq!(egress_cidrs(&stored), vec!["1.1.1.1/32"]);
}

#[tokio::test]
async fn cancels_in_flight_calls() {
    let store = MemStore::hanging();
    let reconciler = Reconciler::new(store.clone());
    let desired = desired(Some("1.1.1.1"), None);

    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
    let cancel = async move {
        let _ = cancel_rx.await;
    };

    let (result, ()) = tokio::join!(reconciler.reconcile(&desired, cancel), async move {
        tokio::task::yield_now().await;
        let _ = cancel_tx.send(());
    });

    let error = result.unwrap_err();
    assert!(error.is_cancelled(), "unexpected error: {error}");
    assert_eq!(store.calls(), vec![Call::Get("db-myapp-db1".to_string())]);
    assert!(store.policies().is_empty());
}

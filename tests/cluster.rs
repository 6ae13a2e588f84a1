//! test of the actor layer: supervised election actors competing through a shared store

use actix_rt::time::sleep;
use async_trait::async_trait;
use lease_election::chaos::{FaultModel, FixedJitter, NeverStall};
use lease_election::config::ElectionConfig;
use lease_election::election::ActorStatus;
use lease_election::error::{Result, StoreError};
use lease_election::state::Role;
use lease_election::store::{CoordinationStore, MemoryStore, RequestOptions, StoreResponse};
use lease_election::supervisor::Supervisor;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

const LEADER_KEY: &str = "shard-5-leader";

fn config(actors: usize) -> ElectionConfig {
    ElectionConfig {
        actors,
        lease_ttl: Duration::from_millis(200),
        stall_probability: 0.0,
        seed: Some(17),
        ..ElectionConfig::default()
    }
}

fn leaders(statuses: &[ActorStatus]) -> Vec<&ActorStatus> {
    statuses.iter().filter(|status| status.is_leader()).collect()
}

/// The single leader among running actors holds the key at the index it last wrote.
fn assert_one_leader(statuses: &[ActorStatus], store: &MemoryStore) -> String {
    let leaders = leaders(statuses);
    assert_eq!(leaders.len(), 1, "{:?}", statuses);
    let key = store.peek(LEADER_KEY).expect("leader key");
    assert_eq!(key.value, leaders[0].actor_id);
    let status = leaders[0];
    match status.role {
        Role::Leader(lease) => assert_eq!(lease.fencing_index, key.modified_index),
        Role::Follower => unreachable!(),
    }
    status.actor_id.clone()
}

#[actix_rt::test]
async fn test_cluster_1() {
    let store = MemoryStore::new();
    let supervisor = Supervisor::start(&config(1), store.clone());
    sleep(Duration::from_millis(300)).await;
    let statuses = supervisor.statuses().await;
    assert_eq!(assert_one_leader(&statuses, &store), "0");
    supervisor.shutdown().await;
}

#[actix_rt::test]
async fn test_cluster_5() {
    let store = MemoryStore::new();
    let supervisor = Supervisor::start(&config(5), store.clone());
    assert_eq!(supervisor.len(), 5);
    sleep(Duration::from_millis(500)).await;
    let statuses = supervisor.statuses().await;
    assert_eq!(statuses.len(), 5);
    assert_one_leader(&statuses, &store);
    // the lease is being renewed, so it carries a TTL
    assert!(store.time_to_live(LEADER_KEY).is_some());
    supervisor.shutdown().await;
}

#[actix_rt::test]
async fn test_cluster_30() {
    let store = MemoryStore::interleaved();
    let supervisor = Supervisor::start(&config(30), store.clone());
    sleep(Duration::from_millis(600)).await;
    let statuses = supervisor.statuses().await;
    assert_eq!(statuses.len(), 30);
    assert_eq!(leaders(&statuses).len(), 1);
    supervisor.shutdown().await;
    assert!(store.peek(LEADER_KEY).is_none());
}

/// Stopping the leader releases the lease and another actor takes over.
#[actix_rt::test]
async fn failover_on_stop() {
    let store = MemoryStore::new();
    let supervisor = Supervisor::start(&config(3), store.clone());
    sleep(Duration::from_millis(300)).await;
    let first: usize = assert_one_leader(&supervisor.statuses().await, &store)
        .parse()
        .unwrap();

    supervisor.stop(first).await;
    // released straight away
    assert!(store
        .peek(LEADER_KEY)
        .map_or(true, |key| key.value != first.to_string()));

    sleep(Duration::from_millis(300)).await;
    let statuses = supervisor.statuses().await;
    assert_eq!(statuses.len(), 2, "stopped actor no longer answers");
    let second = assert_one_leader(&statuses, &store);
    assert_ne!(second, first.to_string());
    supervisor.shutdown().await;
}

/// Stalls on the second leader cycle across the whole cluster, and never again.
struct StallOnce(Rc<Cell<u32>>);

impl FaultModel for StallOnce {
    fn should_stall(&mut self) -> bool {
        let consulted = self.0.get();
        self.0.set(consulted + 1);
        consulted == 1
    }
}

/// A leader that stalls past its lease is overtaken and demotes itself when its renewal is refused.
#[actix_rt::test]
async fn stalled_leader_is_overtaken() {
    let store = MemoryStore::new();
    let config = config(2);
    let ttl = config.lease_ttl;
    let consulted = Rc::new(Cell::new(0));
    let supervisor = Supervisor::start_with(&config, store.clone(), |election| {
        election
            .with_faults(StallOnce(consulted.clone()))
            .with_jitter(FixedJitter(1.0))
            .with_stall(ttl * 4)
    });
    // acquired, renewed once, now stalling
    sleep(ttl).await;
    let first = assert_one_leader(&supervisor.statuses().await, &store);

    // the lease ran out a TTL after the renewal and the follower took it
    sleep(ttl * 3).await;
    let key = store.peek(LEADER_KEY).expect("taken over");
    assert_ne!(key.value, first);

    // once its stall ends the old leader's renewal is refused
    sleep(ttl * 3).await;
    let statuses = supervisor.statuses().await;
    let old = statuses
        .iter()
        .find(|status| status.actor_id == first)
        .unwrap();
    assert!(!old.is_leader());
    assert_one_leader(&statuses, &store);
    supervisor.shutdown().await;
}

#[actix_rt::test]
async fn shutdown_releases_lease() {
    let store = MemoryStore::new();
    let supervisor = Supervisor::start_with(&config(4), store.clone(), |election| {
        election.with_faults(NeverStall)
    });
    sleep(Duration::from_millis(300)).await;
    assert!(store.peek(LEADER_KEY).is_some());
    supervisor.shutdown().await;
    assert!(store.peek(LEADER_KEY).is_none());
}

/// A store that cannot be reached.
#[derive(Clone)]
struct Unreachable;

#[async_trait(?Send)]
impl CoordinationStore for Unreachable {
    async fn get(&self, _key: &str, _options: RequestOptions) -> Result<StoreResponse> {
        Err(StoreError::Encode("unreachable".to_owned()))
    }

    async fn put(&self, _key: &str, _value: &str, _options: RequestOptions) -> Result<StoreResponse> {
        Err(StoreError::Encode("unreachable".to_owned()))
    }

    async fn delete(&self, _key: &str, _options: RequestOptions) -> Result<StoreResponse> {
        Err(StoreError::Encode("unreachable".to_owned()))
    }
}

/// Actors stop for good on a failed exchange with the store.
#[actix_rt::test]
async fn transport_error_stops_actors() {
    let mut supervisor = Supervisor::start(&config(3), Unreachable);
    actix_rt::time::timeout(Duration::from_secs(2), supervisor.wait())
        .await
        .expect("actors stop");
    assert!(supervisor.statuses().await.is_empty());
}

/// Delays every write to the broadcast key.
#[derive(Clone)]
struct SlowBroadcast(MemoryStore, Duration);

#[async_trait(?Send)]
impl CoordinationStore for SlowBroadcast {
    async fn get(&self, key: &str, options: RequestOptions) -> Result<StoreResponse> {
        self.0.get(key, options).await
    }

    async fn put(&self, key: &str, value: &str, options: RequestOptions) -> Result<StoreResponse> {
        if key.ends_with("-broadcast") {
            sleep(self.1).await;
        }
        self.0.put(key, value, options).await
    }

    async fn delete(&self, key: &str, options: RequestOptions) -> Result<StoreResponse> {
        self.0.delete(key, options).await
    }
}

/// Stopping while the acquiring cycle is still publishing waits for it, then releases the
/// lease it created. The created key has no TTL, so nothing else would ever remove it.
#[actix_rt::test]
async fn shutdown_mid_acquisition_releases_lease() {
    let store = MemoryStore::new();
    let slow = SlowBroadcast(store.clone(), Duration::from_millis(200));
    let supervisor = Supervisor::start(&config(1), slow);
    sleep(Duration::from_millis(50)).await;
    let created = store.peek(LEADER_KEY).expect("created");
    assert_eq!(created.value, "0");
    assert_eq!(created.ttl, None);
    // still publishing, so the last completed cycle shows no lease
    assert!(!supervisor.statuses().await[0].is_leader());

    supervisor.shutdown().await;
    assert!(store.peek(LEADER_KEY).is_none());
    assert_eq!(store.peek("shard-5-broadcast").unwrap().value, "0");
}

/// Loses the connection on every write to the broadcast key.
#[derive(Clone)]
struct BroadcastFails(MemoryStore);

#[async_trait(?Send)]
impl CoordinationStore for BroadcastFails {
    async fn get(&self, key: &str, options: RequestOptions) -> Result<StoreResponse> {
        self.0.get(key, options).await
    }

    async fn put(&self, key: &str, value: &str, options: RequestOptions) -> Result<StoreResponse> {
        if key.ends_with("-broadcast") {
            return Err(StoreError::Encode("connection lost".to_owned()));
        }
        self.0.put(key, value, options).await
    }

    async fn delete(&self, key: &str, options: RequestOptions) -> Result<StoreResponse> {
        self.0.delete(key, options).await
    }
}

/// A failed exchange on the publish after acquiring stops the actor, leaving the key it created.
#[actix_rt::test]
async fn transport_error_on_publish_stops_actor() {
    let store = MemoryStore::new();
    let mut supervisor = Supervisor::start(&config(1), BroadcastFails(store.clone()));
    actix_rt::time::timeout(Duration::from_secs(2), supervisor.wait())
        .await
        .expect("actor stops");
    assert!(supervisor.statuses().await.is_empty());
    assert_eq!(store.peek(LEADER_KEY).unwrap().value, "0");
    assert!(store.peek("shard-5-broadcast").is_none());
}

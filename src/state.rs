use super::config::{broadcast_key, leader_key};
use super::{ActorId, StoreIndex};
use log::warn;
use std::time::Duration;

/// Volatile state on leaders: the write that last confirmed the lease.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lease {
    /// `modifiedIndex` of the leader key as written by this actor. A renewal only applies while the
    /// store still reports this index.
    pub fencing_index: StoreIndex,
}

/// Actor roles. Followers poll the leader key and try to create it when it is absent. A leader
/// renews with a compare-and-swap on its fencing index and goes back to following as soon as a
/// renewal is refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Follower,
    Leader(Lease),
}

impl Default for Role {
    fn default() -> Self {
        Self::Follower
    }
}

/// State of one actor. Owned and mutated only by that actor's loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActorState {
    election_key: String,
    actor_id: ActorId,
    role: Role,
    lease_ttl: Duration,
}

impl ActorState {
    pub fn new(election_key: impl Into<String>, actor_id: impl Into<ActorId>, lease_ttl: Duration) -> Self {
        Self {
            election_key: election_key.into(),
            actor_id: actor_id.into(),
            role: Role::default(),
            lease_ttl,
        }
    }

    pub fn election_key(&self) -> &str {
        &self.election_key
    }

    pub fn leader_key(&self) -> String {
        leader_key(&self.election_key)
    }

    pub fn broadcast_key(&self) -> String {
        broadcast_key(&self.election_key)
    }

    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }

    pub fn lease_ttl(&self) -> Duration {
        self.lease_ttl
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_follower(&self) -> bool {
        Role::Follower == self.role
    }

    pub fn is_leader(&self) -> bool {
        matches!(self.role, Role::Leader(_))
    }

    pub fn fencing_index(&self) -> Option<StoreIndex> {
        match self.role {
            Role::Leader(lease) => Some(lease.fencing_index),
            Role::Follower => None,
        }
    }

    /// A write of the leader key took effect at `fencing_index`: created or renewed the lease.
    ///
    /// The index comes from the store and normally increases across renewals. A store that was
    /// wiped or restarted can hand out a lower one, which is taken as is.
    pub fn lead(&mut self, fencing_index: StoreIndex) {
        if let Role::Leader(lease) = self.role {
            if fencing_index <= lease.fencing_index {
                warn!(
                    "[{}] store index went from {} back to {}",
                    self.actor_id, lease.fencing_index, fencing_index
                );
            }
        }
        self.role = Role::Leader(Lease { fencing_index });
    }

    /// The lease is lost or was never held.
    pub fn follow(&mut self) {
        self.role = Role::Follower;
    }
}

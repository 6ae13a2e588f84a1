//! One actor's election algorithm, independent of how its cycles are scheduled.
//!
//! Each cycle reads the leader key and then, depending on what it finds:
//! - absent: try to create it (`prevExist=false`); the store lets at most one creator through.
//! - held by this actor: renew with a compare-and-swap on the `modifiedIndex` just read. A
//!   refusal means someone else wrote the key since, so the actor demotes itself.
//! - held by another actor: follow, no write.
//!
//! Only a failed exchange with the store is an error; every refusal is an ordinary transition.

use super::chaos::{actor_rng, jitter_delay, FaultModel, JitterSource, RandomStall, SeededRandom};
use super::config::ElectionConfig;
use super::error::Result;
use super::state::{ActorState, Role};
use super::store::{CoordinationStore, RequestOptions, StoreResponse};
use super::{ActorId, StoreIndex};
use log::{debug, info};
use std::time::Duration;

/// What a cycle did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Cycle {
    /// Created the absent leader key.
    Acquired,
    /// Found the key absent but another actor created it first.
    LostRace,
    /// Renewed the lease.
    Renewed,
    /// The renewal was refused; the lease is gone.
    Demoted,
    /// Another actor holds the key.
    Following { leader: ActorId },
    /// The read was refused for a reason other than absence; nothing was written.
    Unreadable { error_code: u32 },
}

/// Snapshot of an actor for observers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActorStatus {
    pub actor_id: ActorId,
    pub role: Role,
}

impl ActorStatus {
    pub fn is_leader(&self) -> bool {
        matches!(self.role, Role::Leader(_))
    }
}

pub struct Election<S> {
    state: ActorState,
    store: S,
    faults: Box<dyn FaultModel>,
    jitter: Box<dyn JitterSource>,
    stall: Duration,
}

impl<S: CoordinationStore> Election<S> {
    /// An actor competing in `config`'s election. `stream` distinguishes actors sharing a seed.
    pub fn new(actor_id: impl Into<ActorId>, config: &ElectionConfig, store: S, stream: u64) -> Self {
        let state = ActorState::new(config.shard.clone(), actor_id, config.lease_ttl);
        Self {
            state,
            store,
            faults: Box::new(RandomStall::new(
                config.stall_probability,
                actor_rng(config.seed, stream << 1),
            )),
            jitter: Box::new(SeededRandom::new(actor_rng(config.seed, (stream << 1) | 1))),
            stall: config.stall(),
        }
    }

    pub fn with_faults(mut self, faults: impl FaultModel + 'static) -> Self {
        self.faults = Box::new(faults);
        self
    }

    pub fn with_jitter(mut self, jitter: impl JitterSource + 'static) -> Self {
        self.jitter = Box::new(jitter);
        self
    }

    /// How long a leader stalls when the fault model says so.
    pub fn with_stall(mut self, stall: Duration) -> Self {
        self.stall = stall;
        self
    }

    pub fn state(&self) -> &ActorState {
        &self.state
    }

    pub fn status(&self) -> ActorStatus {
        ActorStatus {
            actor_id: self.state.actor_id().to_owned(),
            role: self.state.role(),
        }
    }

    /// How long to wait before the next cycle.
    pub fn pause(&mut self) -> Duration {
        jitter_delay(self.state.lease_ttl(), self.jitter.sample())
    }

    /// Run one election cycle.
    pub async fn cycle(&mut self) -> Result<Cycle> {
        let current = self
            .store
            .get(&self.state.leader_key(), RequestOptions::default())
            .await?;
        self.cycle_on(current).await
    }

    /// The rest of a cycle, given what the read found.
    async fn cycle_on(&mut self, current: StoreResponse) -> Result<Cycle> {
        if current.is_not_found() {
            self.acquire().await
        } else if !current.is_success() {
            debug!("[{}] leader key unreadable: {}", self.state.actor_id(), current.message);
            Ok(Cycle::Unreadable {
                error_code: current.error_code,
            })
        } else if current.node.value == self.state.actor_id() {
            self.renew(current.node.modified_index).await
        } else {
            if self.state.is_leader() {
                info!("[{}] <- lost to {}", self.state.actor_id(), current.node.value);
            }
            self.state.follow();
            Ok(Cycle::Following {
                leader: current.node.value,
            })
        }
    }

    async fn acquire(&mut self) -> Result<Cycle> {
        let created = self
            .store
            .put(
                &self.state.leader_key(),
                self.state.actor_id(),
                RequestOptions::create(),
            )
            .await?;
        if !created.is_success() {
            info!("[{}] -x failed", self.state.actor_id());
            self.state.follow();
            return Ok(Cycle::LostRace);
        }
        info!("[{}] -> gain", self.state.actor_id());
        self.state.lead(created.node.modified_index);
        // best effort
        let published = self
            .store
            .put(
                &self.state.broadcast_key(),
                self.state.actor_id(),
                RequestOptions::default(),
            )
            .await?;
        self.note_broadcast(&published);
        Ok(Cycle::Acquired)
    }

    async fn renew(&mut self, observed: StoreIndex) -> Result<Cycle> {
        if self.faults.should_stall() {
            info!("[{}] -- give up", self.state.actor_id());
            tokio::time::sleep(self.stall).await;
        }
        let renewed = self
            .store
            .put(
                &self.state.leader_key(),
                self.state.actor_id(),
                RequestOptions::compare_and_swap(observed, self.state.lease_ttl()),
            )
            .await?;
        if !renewed.is_success() {
            info!("[{}] <- lost: {}", self.state.actor_id(), renewed.message);
            self.state.follow();
            return Ok(Cycle::Demoted);
        }
        self.state.lead(renewed.node.modified_index);
        // Create-only, so this is refused once any broadcast value exists. Kept as is; the
        // acquisition path publishes unconditionally.
        let published = self
            .store
            .put(
                &self.state.broadcast_key(),
                self.state.actor_id(),
                RequestOptions::create(),
            )
            .await?;
        self.note_broadcast(&published);
        Ok(Cycle::Renewed)
    }

    fn note_broadcast(&self, published: &StoreResponse) {
        if !published.is_success() {
            debug!(
                "[{}] broadcast not written: {}",
                self.state.actor_id(),
                published.message
            );
        }
    }

    /// Give up the lease, if held, with a delete fenced on the last confirmed index. Whatever the
    /// store answers the actor is a follower afterwards; a refusal means the lease had already
    /// moved on and the key is left alone.
    pub async fn release(&mut self) -> Result<Option<StoreResponse>> {
        let fencing_index = match self.state.fencing_index() {
            Some(fencing_index) => fencing_index,
            None => return Ok(None),
        };
        let released = self
            .store
            .delete(
                &self.state.leader_key(),
                RequestOptions::compare_and_delete(fencing_index),
            )
            .await?;
        self.state.follow();
        Ok(Some(released))
    }
}

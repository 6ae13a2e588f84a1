use super::actor::{ElectionActor, Status, Stop};
use super::config::ElectionConfig;
use super::election::{ActorStatus, Election};
use super::store::CoordinationStore;
use super::ActorId;
use actix::prelude::*;
use futures::channel::oneshot;
use futures::future::join_all;
use log::{info, warn};

/// Starts a fixed number of election actors competing for one shard and owns their shutdown.
///
/// Actors never stop on their own except on a failed exchange with the store, so without a call
/// to [`Supervisor::shutdown`] they run for as long as the process does.
pub struct Supervisor<S: CoordinationStore + Clone + Unpin + 'static> {
    actors: Vec<(Addr<ElectionActor<S>>, oneshot::Receiver<ActorId>)>,
}

impl<S: CoordinationStore + Clone + Unpin + 'static> Supervisor<S> {
    /// Start `config.actors` actors with ids `"0"`, `"1"`, ... each talking to its own clone of
    /// `store`. Must be called from within an actix system.
    pub fn start(config: &ElectionConfig, store: S) -> Self {
        Self::start_with(config, store, |election| election)
    }

    /// Like [`Supervisor::start`], with a hook to adjust each actor's election before it starts,
    /// e.g. to script its faults.
    pub fn start_with(
        config: &ElectionConfig,
        store: S,
        mut adjust: impl FnMut(Election<S>) -> Election<S>,
    ) -> Self {
        info!(
            "starting {} actors on {} (lease {:?})",
            config.actors,
            config.leader_key(),
            config.lease_ttl
        );
        let actors = (0..config.actors)
            .map(|id| {
                let election = adjust(Election::new(id.to_string(), config, store.clone(), id as u64));
                let mut actor = ElectionActor::new(election);
                let stopped = actor.on_stopped();
                (actor.start(), stopped)
            })
            .collect();
        Self { actors }
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Status of every actor still running.
    pub async fn statuses(&self) -> Vec<ActorStatus> {
        join_all(self.actors.iter().map(|(addr, _)| addr.send(Status)))
            .await
            .into_iter()
            .filter_map(Result::ok)
            .collect()
    }

    /// Ask one actor to stop, releasing its lease if it holds one.
    pub async fn stop(&self, actor: usize) {
        if let Some((addr, _)) = self.actors.get(actor) {
            if addr.send(Stop).await.is_err() {
                warn!("actor {} had already stopped", actor);
            }
        }
    }

    /// Resolves once every actor has stopped. Actors only stop on their own when the store
    /// becomes unreachable, so this normally never resolves.
    pub async fn wait(&mut self) {
        join_all(self.actors.iter_mut().map(|(_, stopped)| stopped)).await;
    }

    /// Stop every actor, letting the leader release its lease, and wait for them to finish.
    pub async fn shutdown(mut self) {
        info!("stopping {} actors", self.actors.len());
        join_all(self.actors.iter().map(|(addr, _)| addr.send(Stop))).await;
        self.wait().await;
    }
}

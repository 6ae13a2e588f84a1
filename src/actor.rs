//! Drives an [`Election`] as an actix actor.
//!
//! A `Poll` message starts a cycle; the cycle's store round-trips run as a future spawned on the
//! actor's context so one actor waiting on the store never holds up another. When the cycle
//! completes the next `Poll` is scheduled after the jittered pause. A failed exchange with the
//! store stops the actor for good.

use super::election::{ActorStatus, Election};
use super::state::Role;
use super::store::CoordinationStore;
use super::ActorId;
use actix::prelude::*;
use futures::channel::oneshot;
use log::{error, info, trace, warn};

pub struct ElectionActor<S> {
    /// `None` while a cycle is in flight, and once stopping
    election: Option<Election<S>>,
    /// as of the last completed cycle
    status: ActorStatus,
    next_poll: Option<SpawnHandle>,
    stopping: bool,
    /// Receives the election from the cycle in flight when a `Stop` arrived mid-cycle
    handover: Option<oneshot::Sender<Election<S>>>,
    stopped: Option<oneshot::Sender<ActorId>>,
}

impl<S: CoordinationStore + 'static> ElectionActor<S> {
    pub fn new(election: Election<S>) -> Self {
        Self {
            status: election.status(),
            election: Some(election),
            next_poll: None,
            stopping: false,
            handover: None,
            stopped: None,
        }
    }

    /// Resolves with the actor's id once it has stopped, for whatever reason.
    pub fn on_stopped(&mut self) -> oneshot::Receiver<ActorId> {
        let (sender, receiver) = oneshot::channel();
        self.stopped = Some(sender);
        receiver
    }

    fn actor_id(&self) -> &str {
        &self.status.actor_id
    }
}

impl<S: CoordinationStore + Unpin + 'static> Actor for ElectionActor<S> {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        trace!("[{}] started", self.actor_id());
        ctx.notify(Poll);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        trace!("[{}] stopped", self.actor_id());
        if let Some(stopped) = self.stopped.take() {
            let _ = stopped.send(self.status.actor_id.clone());
        }
    }
}

/// Run one election cycle.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Poll;

impl<S: CoordinationStore + Unpin + 'static> Handler<Poll> for ElectionActor<S> {
    type Result = ();

    fn handle(&mut self, _: Poll, ctx: &mut Self::Context) -> Self::Result {
        self.next_poll = None;
        if self.stopping {
            return;
        }
        let mut election = match self.election.take() {
            Some(election) => election,
            // a cycle is already running
            None => return,
        };
        let cycle = fut::wrap_future(async move {
            let outcome = election.cycle().await;
            (election, outcome)
        })
        .map(|(mut election, outcome), act: &mut Self, ctx: &mut Self::Context| {
            act.status = election.status();
            match outcome {
                Ok(cycle) => {
                    trace!("[{}] {:?}", act.actor_id(), cycle);
                    if let Some(handover) = act.handover.take() {
                        let _ = handover.send(election);
                    } else {
                        let pause = election.pause();
                        act.election = Some(election);
                        act.next_poll = Some(ctx.notify_later(Poll, pause));
                    }
                }
                Err(err) => {
                    error!("[{}] error: {}", act.actor_id(), err);
                    ctx.stop();
                }
            }
        });
        ctx.spawn(cycle);
    }
}

/// Current role of the actor as of its last completed cycle.
#[derive(Message)]
#[rtype(result = "ActorStatus")]
pub struct Status;

impl<S: CoordinationStore + Unpin + 'static> Handler<Status> for ElectionActor<S> {
    type Result = MessageResult<Status>;

    fn handle(&mut self, _: Status, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.status.clone())
    }
}

/// Stop competing. A cycle in flight is allowed to finish, stall included, so that whatever
/// lease it confirmed is the one given up. A held lease is released with a fenced delete.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Stop;

impl<S: CoordinationStore + Unpin + 'static> Handler<Stop> for ElectionActor<S> {
    type Result = ResponseActFuture<Self, ()>;

    fn handle(&mut self, _: Stop, ctx: &mut Self::Context) -> Self::Result {
        if let Some(next_poll) = self.next_poll.take() {
            ctx.cancel_future(next_poll);
        }
        if self.stopping {
            return Box::pin(fut::ready(()));
        }
        self.stopping = true;

        let (handover, election) = oneshot::channel();
        match self.election.take() {
            Some(idle) => {
                let _ = handover.send(idle);
            }
            None => self.handover = Some(handover),
        }
        let actor_id = self.status.actor_id.clone();
        Box::pin(
            fut::wrap_future(async move {
                let mut election = match election.await {
                    Ok(election) => election,
                    // the cycle failed, the actor is stopping already
                    Err(oneshot::Canceled) => return,
                };
                match election.release().await {
                    Ok(Some(res)) if res.is_success() => info!("[{}] <- released", actor_id),
                    Ok(Some(res)) => info!("[{}] lease already gone: {}", actor_id, res.message),
                    Ok(None) => {}
                    Err(err) => warn!("[{}] release failed: {}", actor_id, err),
                }
            })
            .map(|(), act: &mut Self, ctx: &mut Self::Context| {
                act.status.role = Role::Follower;
                ctx.stop();
            }),
        )
    }
}

/*
 * Copyright © 2025, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

//! the tracker actor - the single owner and writer of the [`TrackStore`].
//!
//! All mutations (reconciliation cycles, janitor sweeps and client commands) reach the store as messages that
//! are processed one at a time by synchronous handlers. The actor never awaits network I/O. At the end of each
//! handler that changed the store we execute the configured [`SnapshotAction`] exactly once

use std::{fmt, sync::Arc, time::Duration};
use rand::{SeedableRng, rngs::StdRng};
use tokio::{sync::{mpsc,oneshot}, task::JoinHandle, time::{interval,MissedTickBehavior}};
use tracing::{debug,info,warn,error,trace};
use odin_common::sim_clock::Clock;

use crate::{
    EramConfig, TrackStore, TrackSnapshot,
    janitor::{self,LifecycleThresholds},
    reconcile::{apply_cycle,CycleInput,CycleReport},
    commands::{apply_injection,Injection,HandoffRequest,AcceptHandoffRequest},
    errors::{Result,OdinEramError}
};

/// what the actor does with its store after a change. This is our outbound interface
pub trait SnapshotAction: Send + 'static {
    fn execute (&self, store: &TrackStore);
}

impl<F> SnapshotAction for F where F: Fn(&TrackStore) + Send + 'static {
    fn execute (&self, store: &TrackStore) { self(store) }
}

/// a snapshot action that does nothing, for trackers nobody listens to
pub struct NoAction;
impl SnapshotAction for NoAction {
    fn execute (&self, _store: &TrackStore) {}
}

/// define a message enum with one tuple variant per message type, named like the type, plus the
/// respective From impls so that senders can use the message types directly
macro_rules! define_tracker_msg_set {
    ( $v:vis $name:ident = $( $msg:ident )|* ) => {
        #[derive(Debug)]
        $v enum $name {
            $( $msg($msg) ),*
        }
        $(
            impl From<$msg> for $name {
                fn from (msg: $msg)->Self { $name::$msg(msg) }
            }
        )*
    }
}

//--- the messages we process
#[derive(Debug)] pub struct CycleUpdate(pub CycleInput);
#[derive(Debug)] pub struct JanitorSweep;
#[derive(Debug)] pub struct InjectTrack(pub Injection);
#[derive(Debug)] pub struct InitiateHandoff(pub HandoffRequest);
#[derive(Debug)] pub struct AcceptHandoff(pub AcceptHandoffRequest);
#[derive(Debug)] pub struct Terminate;

/// run a one-shot read-only action on the current store (e.g. to answer snapshot queries)
pub struct ExecSnapshotAction(pub Box<dyn FnOnce(&TrackStore) + Send>);

impl fmt::Debug for ExecSnapshotAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "ExecSnapshotAction(..)") }
}

define_tracker_msg_set! { pub TrackerMsg =
    CycleUpdate | JanitorSweep | InjectTrack | InitiateHandoff | AcceptHandoff | ExecSnapshotAction | Terminate
}

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum ReceiveAction { Continue, Stop }

/// the cloneable sender side of a running tracker
#[derive(Debug,Clone)]
pub struct TrackerHandle {
    tx: mpsc::Sender<TrackerMsg>,
}

impl TrackerHandle {
    pub fn is_running (&self)->bool { !self.tx.is_closed() }

    pub async fn send_msg<M: Into<TrackerMsg>> (&self, msg: M)->Result<()> {
        self.tx.send( msg.into()).await.map_err( |_| OdinEramError::TrackerNotRunning)
    }

    /// non-blocking send, for timers that should drop ticks instead of queueing them
    pub fn try_send_msg<M: Into<TrackerMsg>> (&self, msg: M)->Result<()> {
        self.tx.try_send( msg.into()).map_err( |e| match e {
            mpsc::error::TrySendError::Full(_) => OdinEramError::TrackerQueueFull,
            mpsc::error::TrySendError::Closed(_) => OdinEramError::TrackerNotRunning,
        })
    }

    /// get an owned copy of the current store content
    pub async fn query_snapshot (&self)->Result<TrackSnapshot> {
        let (tx,rx) = oneshot::channel();
        self.send_msg( ExecSnapshotAction( Box::new( move |store: &TrackStore| { tx.send( store.all()).ok(); }))).await?;
        rx.await.map_err( |_| OdinEramError::TrackerNotRunning)
    }
}

pub struct TrackerActor<A> where A: SnapshotAction {
    config: Arc<EramConfig>,
    clock: Arc<dyn Clock>,
    rng: StdRng,
    thresholds: LifecycleThresholds,

    store: TrackStore,

    update_action: A, // what to do with the store once it changed
}

impl<A> TrackerActor<A> where A: SnapshotAction {
    pub fn new (config: Arc<EramConfig>, clock: Arc<dyn Clock>, update_action: A)->Self {
        let thresholds = LifecycleThresholds::from( config.as_ref());
        TrackerActor { config, clock, rng: StdRng::from_os_rng(), thresholds, store: TrackStore::new(), update_action }
    }

    /// replace the random generator, to get reproducible identifiers
    pub fn with_rng (mut self, rng: StdRng)->Self {
        self.rng = rng;
        self
    }

    pub fn store (&self)->&TrackStore { &self.store }

    /// process a single message. This is the atomic section with respect to the store
    pub fn receive (&mut self, msg: TrackerMsg)->ReceiveAction {
        let now = self.clock.now();

        match msg {
            TrackerMsg::CycleUpdate(msg) => {
                let report = apply_cycle( &mut self.store, msg.0, now, &mut self.rng, self.config.unique_flids);
                match &report {
                    CycleReport::Applied{..} => {
                        debug!("{report:?}");
                        info!("tracking {} aircraft", self.store.len());
                    }
                    CycleReport::SkippedEmpty => debug!("empty telemetry, keeping {} tracks", self.store.len()),
                    CycleReport::SkippedFetchFailure(failure) => warn!("{failure}, keeping previous tracks"),
                }
            }

            TrackerMsg::JanitorSweep(_) => {
                let report = janitor::sweep( &mut self.store, now, &self.thresholds);
                if !report.is_empty() {
                    debug!("janitor sweep: coasting {:?}, evicted {:?}", report.coasted, report.evicted);
                }
            }

            TrackerMsg::InjectTrack(msg) => {
                if !apply_injection( &mut self.store, msg.0, now, &mut self.rng, self.config.unique_flids) {
                    trace!("injection did not change store");
                }
            }

            TrackerMsg::InitiateHandoff(msg) => {
                let HandoffRequest { callsign, target_sector } = msg.0;
                if self.store.get(&callsign).is_none() {
                    debug!("ignoring hand-off of unknown track {callsign}");
                } else if self.store.modify( &callsign, |t| t.handoff_target = Some(target_sector.clone())) {
                    info!("hand-off of {callsign} to {target_sector} initiated");
                }
            }

            TrackerMsg::AcceptHandoff(msg) => {
                let callsign = msg.0.callsign;
                if self.store.modify( &callsign, |t| t.handoff_target = None) {
                    info!("hand-off of {callsign} accepted");
                }
            }

            TrackerMsg::ExecSnapshotAction(msg) => {
                (msg.0)( &self.store)
            }

            TrackerMsg::Terminate(_) => {
                return ReceiveAction::Stop
            }
        }

        self.publish_changes();
        ReceiveAction::Continue
    }

    fn publish_changes (&mut self) {
        if self.store.take_changed() {
            self.update_action.execute( &self.store);
        }
    }

    pub async fn run (mut self, mut rx: mpsc::Receiver<TrackerMsg>) {
        while let Some(msg) = rx.recv().await {
            if self.receive(msg) == ReceiveAction::Stop { break }
        }
        debug!("tracker terminated");
    }
}

/// spawn the actor task and return the handle to send it messages
pub fn spawn_tracker<A> (actor: TrackerActor<A>, bounds: usize)->(TrackerHandle, JoinHandle<()>) where A: SnapshotAction {
    let (tx,rx) = mpsc::channel( bounds.max(1));
    let handle = TrackerHandle { tx };
    let join_handle = tokio::spawn( actor.run(rx));
    (handle, join_handle)
}

/// periodically send [`JanitorSweep`] messages. Ticks that find the tracker queue full are dropped, the
/// timer stops once the tracker is gone
pub fn start_janitor_timer (tracker: TrackerHandle, period: Duration)->JoinHandle<()> {
    tokio::spawn( async move {
        let mut ticker = interval( period);
        ticker.set_missed_tick_behavior( MissedTickBehavior::Skip);
        ticker.tick().await; // the first tick completes immediately

        loop {
            ticker.tick().await;
            match tracker.try_send_msg( JanitorSweep) {
                Ok(()) => {}
                Err(OdinEramError::TrackerQueueFull) => debug!("tracker busy, janitor tick dropped"),
                Err(_) => break
            }
        }
        debug!("janitor timer stopped");
    })
}

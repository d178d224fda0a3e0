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

//! periodic upstream polling. Each tick fetches both snapshots concurrently and hands the typed result to the tracker

use std::{future::Future, sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::{interval,timeout,MissedTickBehavior}};
use tracing::{debug,trace};

use crate::{
    Upstream,
    actor::{TrackerHandle,CycleUpdate},
    reconcile::CycleInput,
    upstream::{FetchFailure,FetchResult,UpstreamSource}
};

async fn bounded<T,F> (source: UpstreamSource, max_wait: Duration, fut: F)->FetchResult<T> where F: Future<Output=FetchResult<T>> {
    match timeout( max_wait, fut).await {
        Ok(res) => res,
        Err(_) => Err( FetchFailure::timeout( source, max_wait))
    }
}

/// fetch telemetry and flight plans concurrently, each bounded by `max_wait`
pub async fn fetch_cycle_input (upstream: &dyn Upstream, max_wait: Duration)->CycleInput {
    let (telemetry, flight_plans) = tokio::join!(
        bounded( UpstreamSource::Telemetry, max_wait, upstream.fetch_telemetry()),
        bounded( UpstreamSource::FlightPlans, max_wait, upstream.fetch_flight_plans())
    );
    CycleInput { telemetry, flight_plans }
}

/// start the reconciliation timer. We wait for each fetch pair before the next tick so cycles can't overlap,
/// missed ticks are skipped. The poller stops once the tracker is gone
pub fn spawn_poller (upstream: Arc<dyn Upstream>, tracker: TrackerHandle, period: Duration, max_wait: Duration)->JoinHandle<()> {
    tokio::spawn( async move {
        let mut ticker = interval( period);
        ticker.set_missed_tick_behavior( MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let input = fetch_cycle_input( upstream.as_ref(), max_wait).await;
            trace!("cycle input ready");

            if tracker.send_msg( CycleUpdate(input)).await.is_err() {
                break
            }
        }
        debug!("poller stopped");
    })
}

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

use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
use serde_json::{json, Value};
use rand::{SeedableRng, rngs::StdRng};
use tokio::sync::broadcast;
use odin_common::{datetime::{EpochMillis, secs}, sim_clock::SimClock};
use odin_eram::{
    EramConfig, TrackStore, TelemetrySnapshot,
    actor::*,
    commands::{HandoffRequest, AcceptHandoffRequest},
    reconcile::CycleInput,
    ws_service::{RadarBroadcaster, subscribe_with_snapshot},
};

fn dal123 ()->CycleInput { dal123_at( 1, 2) }

fn dal123_at (x: i64, y: i64)->CycleInput {
    let v = json!({ "k": {"callsign": "DAL123", "playerName": "Pilot1", "position": {"x": x, "y": y}} });
    let telemetry = match v { Value::Object(map) => TelemetrySnapshot::from(map), _ => TelemetrySnapshot::default() };
    CycleInput::new( telemetry, vec![])
}

fn counting_tracker (clock: &SimClock)->(TrackerHandle, Arc<AtomicUsize>) {
    let n = Arc::new( AtomicUsize::new(0));
    let n_action = n.clone();
    let actor = TrackerActor::new(
        Arc::new( EramConfig::default()),
        Arc::new( clock.clone()),
        move |_store: &TrackStore| { n_action.fetch_add(1, Ordering::SeqCst); }
    ).with_rng( StdRng::seed_from_u64(0));

    let (handle, _join_handle) = spawn_tracker( actor, 16);
    (handle, n)
}

#[tokio::test]
async fn test_broadcast_once_per_change () {
    let clock = SimClock::new( EpochMillis::from_secs(1_000));
    let (tracker, n) = counting_tracker( &clock);

    tracker.send_msg( CycleUpdate( dal123())).await.unwrap();
    let snapshot = tracker.query_snapshot().await.unwrap();
    assert_eq!( snapshot.len(), 1);
    assert_eq!( n.load(Ordering::SeqCst), 1);

    // a sweep that doesn't change anything is not published
    tracker.send_msg( JanitorSweep).await.unwrap();
    tracker.query_snapshot().await.unwrap();
    assert_eq!( n.load(Ordering::SeqCst), 1);

    clock.advance( secs(11));
    tracker.send_msg( JanitorSweep).await.unwrap();
    let snapshot = tracker.query_snapshot().await.unwrap();
    assert!( snapshot["DAL123"].coasting);
    assert_eq!( n.load(Ordering::SeqCst), 2);

    tracker.send_msg( Terminate).await.unwrap();
}

#[tokio::test]
async fn test_handoff_messages () {
    let clock = SimClock::new( EpochMillis::from_secs(1_000));
    let (tracker, n) = counting_tracker( &clock);

    // unknown tracks are ignored
    tracker.send_msg( InitiateHandoff( HandoffRequest{ callsign: "NOPE".into(), target_sector: "IZCC".into() })).await.unwrap();
    assert!( tracker.query_snapshot().await.unwrap().is_empty());
    assert_eq!( n.load(Ordering::SeqCst), 0);

    tracker.send_msg( CycleUpdate( dal123())).await.unwrap();
    tracker.send_msg( InitiateHandoff( HandoffRequest{ callsign: "DAL123".into(), target_sector: "IZCC".into() })).await.unwrap();
    clock.advance( secs(1));
    tracker.send_msg( CycleUpdate( dal123())).await.unwrap();

    let snapshot = tracker.query_snapshot().await.unwrap();
    assert_eq!( snapshot["DAL123"].handoff_target(), Some("IZCC"));

    tracker.send_msg( AcceptHandoff( AcceptHandoffRequest{ callsign: "DAL123".into() })).await.unwrap();
    let snapshot = tracker.query_snapshot().await.unwrap();
    assert_eq!( snapshot["DAL123"].handoff_target(), None);

    let n_before = n.load(Ordering::SeqCst);
    tracker.send_msg( AcceptHandoff( AcceptHandoffRequest{ callsign: "DAL123".into() })).await.unwrap();
    tracker.query_snapshot().await.unwrap();
    assert_eq!( n.load(Ordering::SeqCst), n_before);
}

#[tokio::test]
async fn test_radar_broadcaster () {
    let (tx, mut rx) = broadcast::channel::<String>( 8);
    let clock = SimClock::new( EpochMillis::from_secs(1_000));
    let actor = TrackerActor::new( Arc::new( EramConfig::default()), Arc::new( clock), RadarBroadcaster::new( tx));
    let (tracker, _join_handle) = spawn_tracker( actor, 8);

    tracker.send_msg( CycleUpdate( dal123())).await.unwrap();
    let msg = rx.recv().await.unwrap();
    println!("{msg}");

    let v: Value = serde_json::from_str( &msg).unwrap();
    assert_eq!( v["event"], json!("radarUpdate"));
    assert_eq!( v["data"]["DAL123"]["callsign"], json!("DAL123"));
    assert_eq!( v["data"]["DAL123"]["isCoasting"], json!(false));
}

#[tokio::test]
async fn test_new_viewer_gets_snapshot_before_updates () {
    let (tx, _rx) = broadcast::channel::<String>( 8);
    let clock = SimClock::new( EpochMillis::from_secs(1_000));
    let actor = TrackerActor::new( Arc::new( EramConfig::default()), Arc::new( clock.clone()), RadarBroadcaster::new( tx.clone()));
    let (tracker, _join_handle) = spawn_tracker( actor, 8);

    tracker.send_msg( CycleUpdate( dal123())).await.unwrap();

    let (mut rx, snapshot) = subscribe_with_snapshot( &tracker, &tx).await.unwrap();
    let v: Value = serde_json::from_str( &snapshot).unwrap();
    assert_eq!( v["event"], json!("radarUpdate"));
    assert_eq!( v["data"]["DAL123"]["position"]["x"], json!(1.0));

    // the broadcast of the first cycle happened before we subscribed
    assert!( rx.try_recv().is_err());

    clock.advance( secs(1));
    tracker.send_msg( CycleUpdate( dal123_at( 5, 6))).await.unwrap();
    let v: Value = serde_json::from_str( &rx.recv().await.unwrap()).unwrap();
    assert_eq!( v["data"]["DAL123"]["position"]["x"], json!(5.0));
}

#[tokio::test(start_paused = true)]
async fn test_janitor_timer () {
    let clock = SimClock::new( EpochMillis::from_secs(1_000));
    let (tracker, n) = counting_tracker( &clock);

    tracker.send_msg( CycleUpdate( dal123())).await.unwrap();
    tracker.query_snapshot().await.unwrap();

    clock.advance( secs(16));
    let timer = start_janitor_timer( tracker.clone(), secs(2));
    tokio::time::sleep( secs(3)).await;

    assert!( tracker.query_snapshot().await.unwrap().is_empty());
    assert_eq!( n.load(Ordering::SeqCst), 2);
    timer.abort();
}

#[tokio::test]
async fn test_terminated_tracker () {
    let clock = SimClock::new( EpochMillis::from_secs(1_000));
    let (tracker, _n) = counting_tracker( &clock);

    tracker.send_msg( Terminate).await.unwrap();
    tokio::task::yield_now().await;
    while tracker.is_running() { tokio::task::yield_now().await; }

    assert!( tracker.send_msg( JanitorSweep).await.is_err());
    assert!( tracker.query_snapshot().await.is_err());
}

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

//! the reconciliation cycle: merge a telemetry snapshot and a flight plan snapshot into the track store.
//! This is a synchronous function over the store - fetching happens elsewhere (see [`crate::poller`])

use rand::Rng;
use serde_json::{Map,Value};
use odin_common::datetime::EpochMillis;

use crate::{
    Track, TrackStore, Position, TelemetryRecord, TelemetrySnapshot, FlightPlanRecord, FlightPlanInfo,
    correlate, Squawk, ids::{resolve_flid,resolve_squawk}, upstream::FetchFailure
};

/// the typed result of fetching both upstream snapshots for one cycle
#[derive(Debug,Clone)]
pub struct CycleInput {
    pub telemetry: Result<TelemetrySnapshot,FetchFailure>,
    pub flight_plans: Result<Vec<FlightPlanRecord>,FetchFailure>,
}

impl CycleInput {
    pub fn new (telemetry: TelemetrySnapshot, flight_plans: Vec<FlightPlanRecord>)->Self {
        CycleInput { telemetry: Ok(telemetry), flight_plans: Ok(flight_plans) }
    }
}

#[derive(Debug,Clone,PartialEq)]
pub enum CycleReport {
    Applied { n_written: usize, n_malformed: usize },
    SkippedEmpty,
    SkippedFetchFailure(FetchFailure),
}

impl CycleReport {
    pub fn is_applied (&self)->bool { matches!( self, CycleReport::Applied{..}) }
}

/// everything we need to (re)build a track besides what we already have in the store
pub struct TrackUpdate<'a> {
    pub key: String,
    pub player_name: Option<String>,
    pub position: Position,
    pub altitude: f64,
    pub ground_speed: f64,
    pub heading: f64,
    pub plan: Option<&'a FlightPlanRecord>,
    pub squawk: Option<Squawk>, // replaces the carried forward or generated squawk if set
    pub extra: Map<String,Value>,
}

impl<'a> TrackUpdate<'a> {
    pub fn from_telemetry (record: TelemetryRecord, key: String, position: Position, plan: Option<&'a FlightPlanRecord>)->Self {
        TrackUpdate {
            key,
            player_name: record.player_name,
            position,
            altitude: record.altitude,
            ground_speed: record.ground_speed,
            heading: record.heading,
            plan,
            squawk: None,
            extra: record.extra
        }
    }

    pub fn with_squawk (mut self, squawk: Option<Squawk>)->Self {
        self.squawk = squawk;
        self
    }
}

/// build the track for `update` and replace whatever is stored under its key. Identifiers and the
/// hand-off marker are carried forward from an existing track, freshness is reset
pub fn assemble_track<R: Rng + ?Sized> (store: &mut TrackStore, update: TrackUpdate, now: EpochMillis, rng: &mut R, unique_flids: bool)->bool {
    let key = update.key;
    let existing = store.get(&key);

    let flid = resolve_flid( existing, rng, |flid| unique_flids && store.is_flid_in_use( flid, &key));
    let squawk = match update.squawk {
        Some(squawk) => squawk,
        None => resolve_squawk( existing, rng)
    };
    let handoff_target = existing.and_then( |t| t.handoff_target.clone());

    let track = Track {
        callsign: key,
        player_name: update.player_name,
        position: update.position,
        altitude: update.altitude,
        ground_speed: update.ground_speed,
        heading: update.heading,
        last_update: now,
        coasting: false,
        flid,
        handoff_target,
        flight_plan: FlightPlanInfo::from_correlation( update.plan, squawk),
        extra: update.extra
    };

    store.upsert( track)
}

/// apply one cycle. A failed fetch of either source or an empty telemetry snapshot leaves the store untouched
pub fn apply_cycle<R: Rng + ?Sized> (store: &mut TrackStore, input: CycleInput, now: EpochMillis, rng: &mut R, unique_flids: bool)->CycleReport {
    let telemetry = match input.telemetry {
        Ok(telemetry) => telemetry,
        Err(failure) => return CycleReport::SkippedFetchFailure(failure)
    };
    let plans = match input.flight_plans {
        Ok(plans) => plans,
        Err(failure) => return CycleReport::SkippedFetchFailure(failure)
    };

    if telemetry.is_empty() {
        return CycleReport::SkippedEmpty
    }

    let mut n_written = 0;
    let mut n_malformed = 0;

    for (feed_key, raw) in &telemetry.entries {
        let Some(record) = TelemetryRecord::from_value(raw) else { n_malformed += 1; continue };
        let Some(position) = record.position else { n_malformed += 1; continue };

        let key = record.track_key(feed_key);
        let plan = correlate( &record, &key, &plans);
        let update = TrackUpdate::from_telemetry( record, key, position, plan);

        assemble_track( store, update, now, rng, unique_flids);
        n_written += 1;
    }

    CycleReport::Applied { n_written, n_malformed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use rand::{SeedableRng, rngs::StdRng};
    use crate::{flight_plan::parse_flight_plans, generate_flid, generate_squawk};

    fn snapshot (v: Value)->TelemetrySnapshot {
        match v {
            Value::Object(map) => TelemetrySnapshot::from(map),
            _ => TelemetrySnapshot::default()
        }
    }

    #[test]
    fn test_new_track_ignores_plan_squawk () {
        let mut store = TrackStore::new();
        let mut rng = StdRng::seed_from_u64(3);
        let mut expected_rng = StdRng::seed_from_u64(3);
        generate_flid( &mut expected_rng); // new tracks draw their FLID first
        let expected = generate_squawk( &mut expected_rng);
        let input = CycleInput::new(
            snapshot( json!({"k1": {"callsign": "DAL123", "playerName": "Pilot1", "position": {"x": 0, "y": 0}}})),
            parse_flight_plans( json!([{"robloxName": "Pilot1", "squawk": "4521"}]))
        );

        apply_cycle( &mut store, input, EpochMillis::new(1000), &mut rng, false);
        let track = store.get("DAL123").unwrap();
        assert!( !track.flight_plan.is_vfr());
        assert_eq!( track.squawk(), &expected);
        assert_ne!( track.squawk().as_str(), "4521");
    }

    #[test]
    fn test_reserved_plan_squawk_is_replaced () {
        let mut store = TrackStore::new();
        let mut rng = StdRng::seed_from_u64(3);
        let input = CycleInput::new(
            snapshot( json!({"k1": {"callsign": "DAL123", "playerName": "Pilot1", "position": {"x": 0, "y": 0}}})),
            parse_flight_plans( json!([{"robloxName": "Pilot1", "squawk": "7700"}]))
        );

        apply_cycle( &mut store, input, EpochMillis::new(1000), &mut rng, false);
        assert_ne!( store.get("DAL123").unwrap().squawk().as_str(), "7700");
    }

    #[test]
    fn test_key_falls_back_to_feed_key () {
        let mut store = TrackStore::new();
        let mut rng = StdRng::seed_from_u64(3);
        let input = CycleInput::new( snapshot( json!({"feed-1": {"position": {"x": 1, "y": 1}}})), vec![]);

        let report = apply_cycle( &mut store, input, EpochMillis::new(1000), &mut rng, false);
        assert_eq!( report, CycleReport::Applied{ n_written: 1, n_malformed: 0 });
        assert_eq!( store.get("feed-1").unwrap().callsign, "feed-1");
    }

    #[test]
    fn test_unique_flids () {
        let mut store = TrackStore::new();
        let mut rng = StdRng::seed_from_u64(11);

        let mut entries = Map::new();
        for i in 0..200 {
            entries.insert( format!("k{i}"), json!({"callsign": format!("N{i}"), "position": {"x": 0, "y": 0}}));
        }
        let input = CycleInput::new( TelemetrySnapshot::from(entries), vec![]);
        apply_cycle( &mut store, input, EpochMillis::new(1000), &mut rng, true);

        let mut flids: Vec<String> = store.iter().map( |(_,t)| t.flid.to_string()).collect();
        flids.sort();
        flids.dedup();
        assert_eq!( flids.len(), 200);
    }
}

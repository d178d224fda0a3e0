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

//! client commands: manual track injection, flight plan amendments, sector hand-offs and availability queries.
//!
//! Handlers that need upstream data run outside the tracker (they are async) and only send the resulting
//! store mutation to the tracker actor

use std::{collections::BTreeMap, sync::Arc};
use rand::Rng;
use serde::{Serialize,Deserialize};
use serde_json::Value;
use tracing::{debug,info,warn};
use odin_common::datetime::EpochMillis;

use crate::{
    TrackStore, TelemetryRecord, FlightPlanRecord, Upstream, ControllerEntry,
    actor::{TrackerHandle,InjectTrack,InitiateHandoff,AcceptHandoff},
    ids::plan_squawk,
    reconcile::{assemble_track,TrackUpdate},
    errors::{Result,parse_error,OdinEramError}
};

pub const UPDATE_DATA: &str = "updateData";
pub const UPDATE_FPL_FIELD: &str = "updateFPLField";
pub const INITIATE_HANDOFF: &str = "initiateHandoff";
pub const ACCEPT_HANDOFF: &str = "acceptHandoff";
pub const CHECK_AVAILABILITY: &str = "checkAvailability";

#[derive(Serialize,Deserialize,Debug,Clone,PartialEq)]
#[serde(rename_all="camelCase")]
pub struct AmendmentRequest {
    #[serde(default)]
    pub roblox_name: String,
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Serialize,Deserialize,Debug,Clone,PartialEq)]
#[serde(rename_all="camelCase")]
pub struct HandoffRequest {
    pub callsign: String,
    pub target_sector: String,
}

#[derive(Serialize,Deserialize,Debug,Clone,PartialEq)]
#[serde(rename_all="camelCase")]
pub struct AcceptHandoffRequest {
    pub callsign: String,
}

/// a track that was submitted by a client, together with the plan we found for its pilot
#[derive(Debug,Clone)]
pub struct Injection {
    pub record: TelemetryRecord,
    pub plan: Option<FlightPlanRecord>,
}

#[derive(Debug,Clone,PartialEq)]
pub enum ClientEvent {
    UpdateData(Value),
    UpdateFplField(AmendmentRequest),
    InitiateHandoff(HandoffRequest),
    AcceptHandoff(AcceptHandoffRequest),
    CheckAvailability,
}

impl ClientEvent {
    /// map an event name and its payload into a command
    pub fn from_event (event: &str, data: Value)->Result<ClientEvent> {
        match event {
            UPDATE_DATA => Ok( ClientEvent::UpdateData(data)),
            UPDATE_FPL_FIELD => Ok( ClientEvent::UpdateFplField( serde_json::from_value(data)?)),
            INITIATE_HANDOFF => Ok( ClientEvent::InitiateHandoff( serde_json::from_value(data)?)),
            ACCEPT_HANDOFF => Ok( ClientEvent::AcceptHandoff( serde_json::from_value(data)?)),
            CHECK_AVAILABILITY => Ok( ClientEvent::CheckAvailability),
            other => Err( parse_error!("unknown event '{}'", other))
        }
    }

    /// does processing this event involve upstream requests
    pub fn needs_upstream (&self)->bool {
        matches!( self, ClientEvent::UpdateData(_) | ClientEvent::UpdateFplField(_) | ClientEvent::CheckAvailability)
    }
}

/// what a command sends back to the requesting client only
#[derive(Debug,Clone,PartialEq)]
pub enum CommandReply {
    Availability(BTreeMap<String,bool>),
}

/// everything command handlers need, shared by all connections
#[derive(Clone)]
pub struct CommandContext {
    pub upstream: Arc<dyn Upstream>,
    pub tracker: TrackerHandle,
    pub sectors: Vec<String>,
    pub sector_role: String,
}

pub async fn dispatch (ctx: &CommandContext, event: ClientEvent)->Result<Option<CommandReply>> {
    match event {
        ClientEvent::UpdateData(data) => {
            handle_update_data( ctx.upstream.as_ref(), &ctx.tracker, data).await?;
            Ok(None)
        }
        ClientEvent::UpdateFplField(req) => {
            handle_amendment( ctx.upstream.as_ref(), req).await;
            Ok(None)
        }
        ClientEvent::InitiateHandoff(req) => {
            ctx.tracker.send_msg( InitiateHandoff(req)).await?;
            Ok(None)
        }
        ClientEvent::AcceptHandoff(req) => {
            ctx.tracker.send_msg( AcceptHandoff(req)).await?;
            Ok(None)
        }
        ClientEvent::CheckAvailability => {
            let availability = handle_check_availability( ctx.upstream.as_ref(), &ctx.sectors, &ctx.sector_role).await;
            Ok( Some( CommandReply::Availability(availability)))
        }
    }
}

/// manual track injection. Submissions without a player name are ignored. The flight plan lookup is best effort
pub async fn handle_update_data (upstream: &dyn Upstream, tracker: &TrackerHandle, data: Value)->Result<()> {
    let Some(record) = TelemetryRecord::from_value(&data) else {
        warn!("ignoring non-object track submission");
        return Ok(())
    };
    let Some(player_name) = record.player_name.clone() else {
        debug!("ignoring track submission without playerName");
        return Ok(())
    };

    let plan = match upstream.fetch_flight_plan( &player_name).await {
        Ok(plan) => plan,
        Err(failure) => {
            debug!("no flight plan for injected track of {player_name}: {failure}");
            None
        }
    };

    tracker.send_msg( InjectTrack( Injection { record, plan })).await
}

/// the store side of an injection, executed by the tracker. A valid squawk of the looked up plan replaces the
/// one the track had. Returns true if the store changed
pub fn apply_injection<R: Rng + ?Sized> (store: &mut TrackStore, injection: Injection, now: EpochMillis, rng: &mut R, unique_flids: bool)->bool {
    let Injection { record, plan } = injection;
    let Some(player_name) = record.player_name.as_deref() else { return false };

    let key = record.track_key( player_name);
    let position = record.position.unwrap_or_default();
    let squawk = plan.as_ref().and_then( plan_squawk);
    let update = TrackUpdate::from_telemetry( record, key, position, plan.as_ref()).with_squawk( squawk);

    assemble_track( store, update, now, rng, unique_flids)
}

/// forward a field amendment to the flight plan store. Failures are only logged
pub async fn handle_amendment (upstream: &dyn Upstream, req: AmendmentRequest) {
    if req.roblox_name.is_empty() || req.field.is_empty() {
        warn!("dropping incomplete amendment request {req:?}");
        return
    }

    match upstream.patch_flight_plan( &req.roblox_name, &req.field, req.value).await {
        Ok(()) => info!("amended {} of flight plan {}", req.field, req.roblox_name),
        Err(failure) => warn!("amendment of {} for {} not applied: {failure}", req.field, req.roblox_name)
    }
}

/// a sector is available if the roster has a non-empty holder for its `role` position
pub fn sector_availability (roster: &[ControllerEntry], sectors: &[String], role: &str)->BTreeMap<String,bool> {
    sectors.iter().map( |sector| {
        let occupied = roster.iter().any( |e| {
            e.airport.as_deref() == Some(sector.as_str()) && e.position.as_deref() == Some(role) && e.is_held()
        });
        (sector.clone(), occupied)
    }).collect()
}

/// if we can't get the roster we report all sectors as unavailable
pub async fn handle_check_availability (upstream: &dyn Upstream, sectors: &[String], role: &str)->BTreeMap<String,bool> {
    let roster = match upstream.fetch_controllers().await {
        Ok(roster) => roster,
        Err(failure) => {
            warn!("{failure}");
            Vec::new()
        }
    };
    sector_availability( &roster, sectors, role)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use rand::{SeedableRng, rngs::StdRng};
    use crate::Position;

    fn sectors ()->Vec<String> { vec!["IRCC".to_string(), "IZCC".to_string()] }

    #[test]
    fn test_sector_availability () {
        let roster = vec![
            ControllerEntry::new( "IRCC", "CTR", Some("alice")),
            ControllerEntry::new( "IZCC", "TWR", Some("bob")),
            ControllerEntry::new( "IZCC", "CTR", Some("")),
        ];
        let a = sector_availability( &roster, &sectors(), "CTR");
        assert_eq!( a.get("IRCC"), Some(&true));
        assert_eq!( a.get("IZCC"), Some(&false));
        assert_eq!( a.len(), 2);
    }

    #[test]
    fn test_event_parsing () {
        let e = ClientEvent::from_event( INITIATE_HANDOFF, json!({"callsign": "DAL123", "targetSector": "IZCC"})).unwrap();
        assert_eq!( e, ClientEvent::InitiateHandoff( HandoffRequest{ callsign: "DAL123".into(), target_sector: "IZCC".into() }));
        assert!( !e.needs_upstream());

        let e = ClientEvent::from_event( UPDATE_FPL_FIELD, json!({"robloxName": "P1", "field": "arriving"})).unwrap();
        assert_eq!( e, ClientEvent::UpdateFplField( AmendmentRequest{ roblox_name: "P1".into(), field: "arriving".into(), value: Value::Null }));

        assert!( ClientEvent::from_event( CHECK_AVAILABILITY, Value::Null).is_ok());
        assert!( ClientEvent::from_event( "selfDestruct", Value::Null).is_err());
        assert!( ClientEvent::from_event( ACCEPT_HANDOFF, json!(42)).is_err());
    }

    #[test]
    fn test_apply_injection () {
        let mut store = TrackStore::new();
        let mut rng = StdRng::seed_from_u64(5);

        let record = TelemetryRecord::from_value( &json!({"playerName": "Pilot9", "altitude": 1200})).unwrap();
        assert!( apply_injection( &mut store, Injection{ record, plan: None }, EpochMillis::new(10), &mut rng, false));

        let track = store.get("Pilot9").unwrap();
        assert_eq!( track.position, Position::default());
        assert_eq!( track.altitude, 1200.0);
        assert!( track.flight_plan.is_vfr());

        // no player name -> no-op
        let record = TelemetryRecord::from_value( &json!({"callsign": "X"})).unwrap();
        assert!( !apply_injection( &mut store, Injection{ record, plan: None }, EpochMillis::new(10), &mut rng, false));
        assert_eq!( store.len(), 1);
    }
}

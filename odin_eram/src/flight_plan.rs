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

//! flight plan records as served by the flight plan store, the track level plan we derive from them,
//! and the correlation between telemetry and plans

use serde::{Serialize,Deserialize,Deserializer};
use serde_json::{Map,Value};
use odin_common::is_none;

use crate::{Squawk, TelemetryRecord, telemetry::coerce_string};

pub const UNKNOWN: &str = "UNK";
pub const VFR: &str = "VFR";

// derived display fields. Record fields with these names are shadowed by the derived values
const DERIVED_FIELDS: [&str;5] = ["dest", "dep", "type", "level", "squawk"];

/// an externally owned flight plan. We only interpret the fields we need and pass through the rest
#[derive(Serialize,Deserialize,Debug,Clone,PartialEq,Default)]
#[serde(rename_all="camelCase")]
pub struct FlightPlanRecord {
    #[serde(default, deserialize_with="de_stringish", skip_serializing_if="is_none")]
    pub roblox_name: Option<String>,
    #[serde(default, deserialize_with="de_stringish", skip_serializing_if="is_none")]
    pub callsign: Option<String>,
    #[serde(default, deserialize_with="de_stringish", skip_serializing_if="is_none")]
    pub arriving: Option<String>,
    #[serde(default, deserialize_with="de_stringish", skip_serializing_if="is_none")]
    pub departing: Option<String>,
    #[serde(default, deserialize_with="de_stringish", skip_serializing_if="is_none")]
    pub aircraft: Option<String>,
    #[serde(default, deserialize_with="de_stringish", skip_serializing_if="is_none")]
    pub flightlevel: Option<String>,
    #[serde(default, deserialize_with="de_stringish", skip_serializing_if="is_none")]
    pub squawk: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String,Value>,
}

/// upstream is not strict about types - accept strings and numbers, map everything else to None
fn de_stringish<'a,D> (deserializer: D)->Result<Option<String>,D::Error> where D: Deserializer<'a> {
    let v = Value::deserialize(deserializer)?;
    Ok( coerce_string(&v))
}

/// parse the flight plan snapshot. Anything that is not an array counts as "no plans", elements that
/// are not objects are skipped
pub fn parse_flight_plans (v: Value)->Vec<FlightPlanRecord> {
    match v {
        Value::Array(elems) => elems.into_iter()
            .filter( |e| e.is_object())
            .filter_map( |e| serde_json::from_value(e).ok())
            .collect(),
        _ => Vec::new()
    }
}

/// the first record (in snapshot order) that either belongs to the pilot or has the same callsign as the track.
/// Absent names never match each other
pub fn correlate<'a> (record: &TelemetryRecord, track_key: &str, plans: &'a [FlightPlanRecord])->Option<&'a FlightPlanRecord> {
    let player_name = record.player_name.as_deref();

    plans.iter().find( |p| {
        (player_name.is_some() && p.roblox_name.as_deref() == player_name)
        || p.callsign.as_deref() == Some(track_key)
    })
}

/// a correlated plan as we publish it: the record fields plus display fields and the engine squawk
#[derive(Serialize,Debug,Clone,PartialEq)]
pub struct FiledPlan {
    #[serde(flatten)]
    pub record: FlightPlanRecord, // without its own squawk
    pub dest: String,
    pub dep: String,
    #[serde(rename="type")]
    pub aircraft_type: String,
    pub level: String,
    pub squawk: Squawk,
}

impl FiledPlan {
    pub fn new (record: &FlightPlanRecord, squawk: Squawk)->Self {
        let mut record = record.clone();
        record.squawk = None;
        record.extra.retain( |k,_| !DERIVED_FIELDS.contains( &k.as_str()));

        let or_unknown = |v: &Option<String>| v.clone().unwrap_or_else( || UNKNOWN.to_string());

        FiledPlan {
            dest: or_unknown( &record.arriving),
            dep: or_unknown( &record.departing),
            aircraft_type: or_unknown( &record.aircraft),
            level: or_unknown( &record.flightlevel),
            squawk,
            record
        }
    }
}

#[derive(Serialize,Debug,Clone,PartialEq)]
pub struct VfrPlaceholder {
    pub dest: String,
    pub squawk: Squawk,
}

impl VfrPlaceholder {
    pub fn new (squawk: Squawk)->Self { VfrPlaceholder { dest: VFR.to_string(), squawk } }
}

#[derive(Serialize,Debug,Clone,PartialEq)]
#[serde(untagged)]
pub enum FlightPlanInfo {
    Filed(FiledPlan),
    Vfr(VfrPlaceholder),
}

impl FlightPlanInfo {
    pub fn from_correlation (plan: Option<&FlightPlanRecord>, squawk: Squawk)->Self {
        match plan {
            Some(record) => FlightPlanInfo::Filed( FiledPlan::new( record, squawk)),
            None => FlightPlanInfo::Vfr( VfrPlaceholder::new( squawk))
        }
    }

    pub fn squawk (&self)->&Squawk {
        match self {
            FlightPlanInfo::Filed(p) => &p.squawk,
            FlightPlanInfo::Vfr(p) => &p.squawk,
        }
    }

    pub fn dest (&self)->&str {
        match self {
            FlightPlanInfo::Filed(p) => p.dest.as_str(),
            FlightPlanInfo::Vfr(p) => p.dest.as_str(),
        }
    }

    pub fn is_vfr (&self)->bool { matches!( self, FlightPlanInfo::Vfr(_)) }
}

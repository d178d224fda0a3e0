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

//! raw per-cycle telemetry as reported by the upstream feed. The feed is loosely typed (numbers might
//! come as strings, fields might be missing) so we parse leniently from `serde_json::Value`

use serde::{Serialize,Deserialize};
use serde_json::{Map,Value};

/// fields the engine owns or derives. These are never passed through from the raw record
pub const ENGINE_FIELDS: [&str;11] = [
    "callsign", "playerName", "position", "altitude", "groundSpeed", "heading",
    "lastUpdate", "isCoasting", "flid", "handoffTarget", "flightPlan"
];

#[derive(Serialize,Deserialize,Debug,Clone,Copy,PartialEq,Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new (x: f64, y: f64)->Self { Position{x,y} }

    fn from_value (v: &Value)->Option<Position> {
        match v {
            Value::Object(o) => Some( Position {
                x: o.get("x").and_then(coerce_f64).unwrap_or(0.0),
                y: o.get("y").and_then(coerce_f64).unwrap_or(0.0),
            }),
            _ => None
        }
    }
}

/// one aircraft entry of a telemetry snapshot
#[derive(Debug,Clone,PartialEq,Default)]
pub struct TelemetryRecord {
    pub callsign: Option<String>,
    pub player_name: Option<String>,
    pub position: Option<Position>, // records without position are not usable for reconciliation
    pub altitude: f64,
    pub ground_speed: f64,
    pub heading: f64,
    pub extra: Map<String,Value>,
}

impl TelemetryRecord {
    /// returns None if `v` is not a JSON object
    pub fn from_value (v: &Value)->Option<TelemetryRecord> {
        let o = v.as_object()?;

        let extra: Map<String,Value> = o.iter()
            .filter( |(k,_)| !ENGINE_FIELDS.contains( &k.as_str()))
            .map( |(k,v)| (k.clone(), v.clone()))
            .collect();

        Some( TelemetryRecord {
            callsign: o.get("callsign").and_then(coerce_string),
            player_name: o.get("playerName").and_then(coerce_string),
            position: o.get("position").and_then(Position::from_value),
            altitude: o.get("altitude").and_then(coerce_f64).unwrap_or(0.0),
            ground_speed: o.get("groundSpeed").and_then(coerce_f64).unwrap_or(0.0),
            heading: o.get("heading").and_then(coerce_f64).unwrap_or(0.0),
            extra
        })
    }

    /// the reported callsign, or the key the feed uses for this record if there is none
    pub fn track_key (&self, feed_key: &str)->String {
        self.callsign.clone().unwrap_or_else( || feed_key.to_string())
    }
}

/// the complete telemetry response of one reconciliation cycle: feed key -> raw record
#[derive(Debug,Clone,PartialEq,Default)]
pub struct TelemetrySnapshot {
    pub entries: Vec<(String,Value)>,
}

impl TelemetrySnapshot {
    pub fn new (entries: Vec<(String,Value)>)->Self { TelemetrySnapshot{entries} }

    pub fn is_empty (&self)->bool { self.entries.is_empty() }
    pub fn len (&self)->usize { self.entries.len() }
}

impl From<Map<String,Value>> for TelemetrySnapshot {
    fn from (map: Map<String,Value>)->Self {
        TelemetrySnapshot { entries: map.into_iter().collect() }
    }
}

/// numbers are taken as is, strings are parsed. Anything else (or non-finite values) is None
pub fn coerce_f64 (v: &Value)->Option<f64> {
    let x = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None
    }?;
    if x.is_finite() { Some(x) } else { None }
}

/// non-empty strings are taken as is, numbers are formatted. Anything else is None
pub fn coerce_string (v: &Value)->Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None
    }
}

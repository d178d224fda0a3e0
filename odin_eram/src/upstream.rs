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

//! typed clients for the external services we depend on: the relay (telemetry, flight plan snapshot, controller roster)
//! and the flight plan store (single plan lookup and amendments).
//!
//! All failures are mapped into [`FetchFailure`] values that name the source - callers never see transport specifics

use std::{fmt, time::Duration};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Serialize,Deserialize};
use serde_json::{Map,Value};
use url::Url;
use tracing::{debug,warn};
use odin_common::net::{get_json,patch_json,OdinNetError};

use crate::{
    EramConfig, FlightPlanRecord, TelemetrySnapshot,
    errors::{Result,config_error},
    flight_plan::parse_flight_plans, telemetry::coerce_string
};

pub const TELEMETRY_PATH: &str = "acft-data";
pub const FPLS_PATH: &str = "fpls";
pub const CONTROLLERS_PATH: &str = "controllers";

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum UpstreamSource {
    Telemetry,
    FlightPlans,
    FlightPlan,
    Amendment,
    Controllers,
}

impl fmt::Display for UpstreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UpstreamSource::Telemetry => "telemetry",
            UpstreamSource::FlightPlans => "flight plans",
            UpstreamSource::FlightPlan => "flight plan",
            UpstreamSource::Amendment => "amendment",
            UpstreamSource::Controllers => "controllers",
        };
        write!(f, "{s}")
    }
}

/// a failed upstream request. These are transient by nature - nobody retries them, the next poll will
#[derive(Debug,Clone,PartialEq)]
pub struct FetchFailure {
    pub source: UpstreamSource,
    pub reason: String,
}

impl FetchFailure {
    pub fn new (source: UpstreamSource, reason: impl ToString)->Self {
        FetchFailure { source, reason: reason.to_string() }
    }

    pub fn timeout (source: UpstreamSource, dur: Duration)->Self {
        FetchFailure::new( source, format!("timeout after {}ms", dur.as_millis()))
    }

    fn from_net (source: UpstreamSource, e: OdinNetError)->Self {
        FetchFailure::new( source, e)
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} fetch failed: {}", self.source, self.reason)
    }
}

impl std::error::Error for FetchFailure {}

pub type FetchResult<T> = std::result::Result<T,FetchFailure>;

/// one roster entry of the controller service. All fields are optional upstream
#[derive(Serialize,Deserialize,Debug,Clone,PartialEq,Default)]
pub struct ControllerEntry {
    #[serde(default, skip_serializing_if="odin_common::is_none")]
    pub airport: Option<String>,
    #[serde(default, skip_serializing_if="odin_common::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if="odin_common::is_none")]
    pub holder: Option<String>,
}

impl ControllerEntry {
    pub fn new (airport: &str, position: &str, holder: Option<&str>)->Self {
        ControllerEntry {
            airport: Some(airport.to_string()),
            position: Some(position.to_string()),
            holder: holder.map(|s| s.to_string())
        }
    }

    fn from_value (v: &Value)->Option<ControllerEntry> {
        let o = v.as_object()?;
        Some( ControllerEntry {
            airport: o.get("airport").and_then(coerce_string),
            position: o.get("position").and_then(coerce_string),
            holder: o.get("holder").and_then(coerce_string),
        })
    }

    pub fn is_held (&self)->bool {
        self.holder.as_deref().is_some_and( |h| !h.trim().is_empty())
    }
}

/// the upstream services as seen by the engine. Implemented by [`LiveUpstream`] and by mocks in tests
#[async_trait]
pub trait Upstream: Send + Sync {
    /// the current telemetry mapping feed key -> raw record
    async fn fetch_telemetry (&self)->FetchResult<TelemetrySnapshot>;

    /// the complete flight plan snapshot in upstream order
    async fn fetch_flight_plans (&self)->FetchResult<Vec<FlightPlanRecord>>;

    /// the plan filed by `player_name`, None if there is none
    async fn fetch_flight_plan (&self, player_name: &str)->FetchResult<Option<FlightPlanRecord>>;

    /// ask the flight plan store to change a single field of the plan filed by `roblox_name`
    async fn patch_flight_plan (&self, roblox_name: &str, field: &str, value: Value)->FetchResult<()>;

    /// the controller roster
    async fn fetch_controllers (&self)->FetchResult<Vec<ControllerEntry>>;
}

/// the http implementation of [`Upstream`]
#[derive(Debug,Clone)]
pub struct LiveUpstream {
    client: Client,
    relay_base: Url,
    fpl_base: Url,
}

impl LiveUpstream {
    pub fn new (config: &EramConfig)->Result<Self> {
        let relay_base = base_url( &config.relay_base_uri)?;
        let fpl_base = base_url( &config.fpl_base_uri)?;
        let client = Client::builder().timeout( config.fetch_timeout).build()
            .map_err( |e| config_error( format!("cannot create http client: {e}")))?;

        Ok( LiveUpstream { client, relay_base, fpl_base } )
    }

    fn relay_url (&self, path: &[&str])->Url { endpoint( &self.relay_base, path) }
    fn fpl_url (&self, path: &[&str])->Url { endpoint( &self.fpl_base, path) }
}

fn base_url (uri: &str)->Result<Url> {
    let url = Url::parse(uri)?;
    if url.cannot_be_a_base() {
        Err( config_error( format!("not a valid base uri: {uri}")))
    } else {
        Ok(url)
    }
}

/// append path segments (percent encoded) to a base url
pub fn endpoint (base: &Url, path: &[&str])->Url {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().extend( path);
    }
    url
}

#[async_trait]
impl Upstream for LiveUpstream {
    async fn fetch_telemetry (&self)->FetchResult<TelemetrySnapshot> {
        let src = UpstreamSource::Telemetry;
        let url = self.relay_url( &[TELEMETRY_PATH]);
        let v: Value = get_json( &self.client, url.as_str()).await.map_err( |e| FetchFailure::from_net(src,e))?;

        match v {
            Value::Object(map) => Ok( TelemetrySnapshot::from(map)),
            Value::Null => Ok( TelemetrySnapshot::default()),
            _ => Err( FetchFailure::new( src, "response is not a JSON object"))
        }
    }

    async fn fetch_flight_plans (&self)->FetchResult<Vec<FlightPlanRecord>> {
        let src = UpstreamSource::FlightPlans;
        let url = self.relay_url( &[FPLS_PATH]);
        let v: Value = get_json( &self.client, url.as_str()).await.map_err( |e| FetchFailure::from_net(src,e))?;

        if !v.is_array() { debug!("non-array flight plan response treated as empty"); }
        Ok( parse_flight_plans(v))
    }

    async fn fetch_flight_plan (&self, player_name: &str)->FetchResult<Option<FlightPlanRecord>> {
        let src = UpstreamSource::FlightPlan;
        let url = self.fpl_url( &[FPLS_PATH, player_name]);

        match get_json::<Value>( &self.client, url.as_str()).await {
            Ok(v) if v.is_object() => {
                serde_json::from_value(v).map(Some).map_err( |e| FetchFailure::new(src,e))
            }
            Ok(_) => Ok(None),
            Err(OdinNetError::NotFoundError(_)) => Ok(None),
            Err(e) => Err( FetchFailure::from_net(src,e))
        }
    }

    async fn patch_flight_plan (&self, roblox_name: &str, field: &str, value: Value)->FetchResult<()> {
        let src = UpstreamSource::Amendment;
        let url = self.fpl_url( &[FPLS_PATH, roblox_name]);

        let mut body = Map::new();
        body.insert( field.to_string(), value);

        patch_json( &self.client, url.as_str(), &body).await.map_err( |e| FetchFailure::from_net(src,e))
    }

    async fn fetch_controllers (&self)->FetchResult<Vec<ControllerEntry>> {
        let src = UpstreamSource::Controllers;
        let url = self.relay_url( &[CONTROLLERS_PATH]);
        let v: Value = get_json( &self.client, url.as_str()).await.map_err( |e| FetchFailure::from_net(src,e))?;

        match v {
            Value::Array(elems) => Ok( elems.iter().filter_map( ControllerEntry::from_value).collect()),
            _ => {
                warn!("controller roster is not a JSON array");
                Ok( Vec::new())
            }
        }
    }
}

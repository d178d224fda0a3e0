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

#![allow(unused)]

//! track reconciliation and lifecycle engine for a live radar picture.
//!
//! Telemetry and flight plans are polled from upstream services, correlated into [`Track`]s that are
//! kept in a [`store::TrackStore`] owned by the [`actor::TrackerActor`], aged by the janitor and pushed
//! to websocket viewers whenever the store changes.

use std::{fs, net::SocketAddr, path::Path, time::Duration};
use serde::{Serialize,Deserialize};
use serde_json::{Map,Value};
use odin_common::datetime::{EpochMillis,deserialize_duration,serialize_duration,secs};

pub mod errors;
use errors::{Result,OdinEramError,config_error};

pub mod ids;
pub use ids::{Flid,Squawk,generate_flid,generate_squawk};

pub mod telemetry;
pub use telemetry::{Position,TelemetryRecord,TelemetrySnapshot};

pub mod flight_plan;
pub use flight_plan::{FlightPlanRecord,FlightPlanInfo,FiledPlan,VfrPlaceholder,correlate};

pub mod store;
pub use store::{TrackStore,TrackSnapshot};

pub mod janitor;
pub mod reconcile;

pub mod upstream;
pub use upstream::{Upstream,LiveUpstream,FetchFailure,UpstreamSource,ControllerEntry};

pub mod poller;
pub mod actor;
pub mod commands;
pub mod ws_service;

/* #region config *****************************************************************************************/

#[derive(Deserialize,Serialize,Debug,Clone)]
pub struct EramConfig {
    pub relay_base_uri: String, // telemetry, flight plan snapshot and controller roster
    pub fpl_base_uri: String, // single flight plan lookup and amendments

    #[serde(deserialize_with="deserialize_duration",serialize_with="serialize_duration")]
    pub reconcile_interval: Duration,
    #[serde(deserialize_with="deserialize_duration",serialize_with="serialize_duration")]
    pub janitor_interval: Duration,
    #[serde(deserialize_with="deserialize_duration",serialize_with="serialize_duration")]
    pub coasting_threshold: Duration, // no telemetry for longer than this sets the coasting flag
    #[serde(deserialize_with="deserialize_duration",serialize_with="serialize_duration")]
    pub eviction_threshold: Duration, // no telemetry for longer than this removes the track
    #[serde(deserialize_with="deserialize_duration",serialize_with="serialize_duration")]
    pub fetch_timeout: Duration, // upper bound for each upstream request

    #[serde(default)]
    pub unique_flids: bool, // redraw FLIDs that are already used by another live track

    #[serde(default="default_channel_bounds")]
    pub channel_bounds: usize,

    pub sectors: Vec<String>, // sector codes reported by availability queries
    pub sector_role: String, // roster position that counts as sector occupant

    pub server: ServerConfig,
}

#[derive(Deserialize,Serialize,Debug,Clone)]
pub struct ServerConfig {
    pub sock_addr: SocketAddr,
}

pub const DEFAULT_PORT: u16 = 3000;

fn default_channel_bounds ()->usize { 64 }

impl Default for EramConfig {
    fn default()->Self {
        EramConfig {
            relay_base_uri: "https://ws.awdevsoftware.org".to_string(),
            fpl_base_uri: "https://ws.awdevsoftware.org".to_string(),
            reconcile_interval: secs(1),
            janitor_interval: secs(2),
            coasting_threshold: secs(10),
            eviction_threshold: secs(15),
            fetch_timeout: secs(5),
            unique_flids: false,
            channel_bounds: default_channel_bounds(),
            sectors: ["IRCC","IZCC","IPCC","IGCC","IBCC","ISCC"].iter().map(|s| s.to_string()).collect(),
            sector_role: "CTR".to_string(),
            server: ServerConfig { sock_addr: SocketAddr::from( ([0,0,0,0], DEFAULT_PORT)) }
        }
    }
}

impl EramConfig {
    pub fn check (&self)->Result<()> {
        if self.eviction_threshold < self.coasting_threshold {
            return Err( config_error("eviction_threshold has to be >= coasting_threshold"))
        }
        if self.reconcile_interval.is_zero() || self.janitor_interval.is_zero() {
            return Err( config_error("timer intervals have to be > 0"))
        }
        if self.channel_bounds == 0 {
            return Err( config_error("channel_bounds has to be > 0"))
        }
        Ok(())
    }
}

pub fn load_config<P: AsRef<Path>> (path: P)->Result<EramConfig> {
    let input = fs::read_to_string( path.as_ref())?;
    let config: EramConfig = ron::from_str( &input)?;
    config.check()?;
    Ok(config)
}

/* #endregion config */

/* #region track *****************************************************************************************/

/// the merged state of one live aircraft: last telemetry, correlated flight plan and engine assigned
/// identifiers. `callsign` is the key of the track for its whole lifetime
#[derive(Serialize,Debug,Clone,PartialEq)]
#[serde(rename_all="camelCase")]
pub struct Track {
    pub callsign: String,
    pub player_name: Option<String>,

    pub position: Position,
    pub altitude: f64,
    pub ground_speed: f64,
    pub heading: f64,

    pub last_update: EpochMillis,
    #[serde(rename="isCoasting")]
    pub coasting: bool,

    pub flid: Flid,
    pub handoff_target: Option<String>,
    pub flight_plan: FlightPlanInfo,

    // whatever else the telemetry feed reported for this aircraft
    #[serde(flatten)]
    pub extra: Map<String,Value>,
}

impl Track {
    pub fn squawk (&self)->&Squawk { self.flight_plan.squawk() }

    /// the sticky hand-off marker, if any
    pub fn handoff_target (&self)->Option<&str> { self.handoff_target.as_deref() }
}

/* #endregion track */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shipped_config () {
        let config = load_config( concat!( env!("CARGO_MANIFEST_DIR"), "/configs/eram.ron")).unwrap();
        assert_eq!( config.reconcile_interval, secs(1));
        assert_eq!( config.eviction_threshold, secs(15));
        assert_eq!( config.server.sock_addr.port(), DEFAULT_PORT);
        assert_eq!( config.sectors.len(), 6);
        assert!( !config.unique_flids);
    }

    #[test]
    fn test_config_check () {
        let mut config = EramConfig::default();
        assert!( config.check().is_ok());

        config.eviction_threshold = secs(5);
        assert!( matches!( config.check(), Err(OdinEramError::ConfigError(_))));
    }
}

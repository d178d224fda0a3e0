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

//! track aging. Tracks that did not get telemetry for a while are first flagged as coasting and then evicted

use std::time::Duration;
use odin_common::datetime::EpochMillis;
use crate::{EramConfig, TrackStore};

#[derive(Debug,Clone,Copy,PartialEq)]
pub struct LifecycleThresholds {
    pub coasting: Duration,
    pub eviction: Duration,
}

impl LifecycleThresholds {
    pub fn new (coasting: Duration, eviction: Duration)->Self { LifecycleThresholds{coasting,eviction} }
}

impl From<&EramConfig> for LifecycleThresholds {
    fn from (config: &EramConfig)->Self {
        LifecycleThresholds::new( config.coasting_threshold, config.eviction_threshold)
    }
}

/// what a sweep did, in store iteration order
#[derive(Debug,Clone,Default,PartialEq)]
pub struct SweepReport {
    pub coasted: Vec<String>,
    pub evicted: Vec<String>,
}

impl SweepReport {
    pub fn is_empty (&self)->bool { self.coasted.is_empty() && self.evicted.is_empty() }
}

/// age all tracks at `now`. Eviction takes precedence over coasting, and we never reset the coasting flag here.
/// Both thresholds are exclusive, i.e. a track that is exactly `coasting` old is not coasting yet
pub fn sweep (store: &mut TrackStore, now: EpochMillis, thresholds: &LifecycleThresholds)->SweepReport {
    let mut report = SweepReport::default();

    for key in store.keys() {
        let Some((age, coasting)) = store.get(&key).map( |t| (t.last_update.age_at(now), t.coasting)) else { continue };

        if age > thresholds.eviction {
            store.remove(&key);
            report.evicted.push(key);
        } else if age > thresholds.coasting && !coasting {
            store.modify( &key, |t| t.coasting = true);
            report.coasted.push(key);
        }
    }

    report
}

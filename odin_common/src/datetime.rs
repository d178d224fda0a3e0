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

use std::{fmt, ops::{Add,Sub}, time::Duration};
use chrono::{DateTime,Utc};
use serde::{Serialize,Deserialize,Serializer,Deserializer};
use parse_duration::parse;

/// milliseconds since the Unix epoch. This is what we use for all track timestamps since it
/// is what viewers expect on the wire (JS `Date.now()` compatible)
#[derive(Serialize,Deserialize,Debug,Clone,Copy,PartialEq,Eq,PartialOrd,Ord,Hash,Default)]
pub struct EpochMillis(i64);

impl EpochMillis {
    pub fn now ()->Self { EpochMillis( Utc::now().timestamp_millis()) }

    pub const fn new (millis:i64)->Self { EpochMillis(millis) }

    pub const fn from_secs (secs: i64)->Self { EpochMillis(secs*1000) }

    pub fn millis (&self)->i64 { self.0 }

    /// age of `self` relative to a later `now`. Returns ZERO if `self` is in the future
    pub fn age_at (&self, now: EpochMillis)->Duration {
        if now.0 > self.0 { Duration::from_millis( (now.0 - self.0) as u64) } else { Duration::ZERO }
    }
}

impl fmt::Display for EpochMillis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match DateTime::<Utc>::from_timestamp_millis(self.0) {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.3fZ")),
            None => write!(f, "{}ms", self.0)
        }
    }
}

impl Add<Duration> for EpochMillis {
    type Output = EpochMillis;
    fn add (self, rhs: Duration)->EpochMillis { EpochMillis( self.0 + rhs.as_millis() as i64) }
}

impl Sub<Duration> for EpochMillis {
    type Output = EpochMillis;
    fn sub (self, rhs: Duration)->EpochMillis { EpochMillis( self.0 - rhs.as_millis() as i64) }
}

#[inline] pub fn millis (n: u64)->Duration { Duration::from_millis(n) }
#[inline] pub fn secs (n: u64)->Duration { Duration::from_secs(n) }

//--- serde support for human readable durations in config files ("1s", "15 sec", "500ms")

pub fn deserialize_duration <'a,D>(deserializer: D) -> Result<Duration,D::Error>
    where D: Deserializer<'a>
{
    String::deserialize(deserializer).and_then( |string| {
        parse(string.as_str())
            .map_err( |e| serde::de::Error::custom(format!("{:?}",e)))
    })
}

pub fn serialize_duration<S: Serializer> (dur: &Duration, s: S) -> Result<S::Ok, S::Error>  {
    let dfm = format!("{}ms", dur.as_millis());
    s.serialize_str(&dfm)
}

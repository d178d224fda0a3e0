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

//! clock abstraction so that time dependent logic (aging, eviction) can be driven by a simulated
//! clock in tests instead of wall clock time

use std::{fmt::Debug, sync::{Arc, atomic::{AtomicI64,Ordering}}, time::Duration};
use crate::datetime::EpochMillis;

pub trait Clock: Send + Sync + Debug {
    fn now (&self)->EpochMillis;
}

/// the production clock
#[derive(Debug,Clone,Copy,Default)]
pub struct WallClock;

impl Clock for WallClock {
    fn now (&self)->EpochMillis { EpochMillis::now() }
}

/// a manually advanced clock. Clones share the same time value
#[derive(Debug,Clone)]
pub struct SimClock {
    millis: Arc<AtomicI64>
}

impl SimClock {
    pub fn new (start: EpochMillis)->Self {
        SimClock { millis: Arc::new( AtomicI64::new( start.millis())) }
    }

    pub fn set (&self, t: EpochMillis) {
        self.millis.store( t.millis(), Ordering::Relaxed);
    }

    pub fn advance (&self, dt: Duration) {
        self.millis.fetch_add( dt.as_millis() as i64, Ordering::Relaxed);
    }
}

impl Clock for SimClock {
    fn now (&self)->EpochMillis { EpochMillis::new( self.millis.load(Ordering::Relaxed)) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datetime::secs;

    #[test]
    fn test_shared_advance () {
        let clock = SimClock::new( EpochMillis::from_secs(0));
        let c2 = clock.clone();
        clock.advance( secs(12));
        assert_eq!( c2.now(), EpochMillis::from_secs(12));
    }
}

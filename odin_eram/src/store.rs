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

//! the authoritative track table. The store itself is not synchronized - it is owned by the tracker actor,
//! which makes each message handler an atomic section with respect to all other store operations

use std::collections::{BTreeMap,HashMap};
use crate::{Track, Flid};

/// owned, key ordered copy of the store content as we publish it
pub type TrackSnapshot = BTreeMap<String,Track>;

#[derive(Debug,Default)]
pub struct TrackStore {
    tracks: HashMap<String,Track>,
    changed: bool, // set by mutations that changed observable state, reset by take_changed()
}

impl TrackStore {
    pub fn new ()->Self { TrackStore::default() }

    /// insert or replace the track stored under its callsign. Returns true if observable state changed
    pub fn upsert (&mut self, track: Track)->bool {
        let is_change = self.tracks.get( &track.callsign) != Some(&track);
        if is_change {
            self.tracks.insert( track.callsign.clone(), track);
            self.changed = true;
        }
        is_change
    }

    pub fn get (&self, key: &str)->Option<&Track> { self.tracks.get(key) }

    /// unknown keys are ignored
    pub fn remove (&mut self, key: &str)->Option<Track> {
        let removed = self.tracks.remove(key);
        if removed.is_some() { self.changed = true; }
        removed
    }

    /// apply `f` to the track stored under `key`. The key field cannot be changed this way. Returns true if
    /// the track exists and differs after `f` was applied
    pub fn modify<F> (&mut self, key: &str, f: F)->bool where F: FnOnce(&mut Track) {
        if let Some(track) = self.tracks.get_mut(key) {
            let before = track.clone();
            f(track);
            track.callsign = before.callsign.clone();

            if *track != before {
                self.changed = true;
                return true
            }
        }
        false
    }

    pub fn all (&self)->TrackSnapshot {
        self.tracks.iter().map( |(k,t)| (k.clone(), t.clone())).collect()
    }

    pub fn iter (&self)->impl Iterator<Item=(&String,&Track)> { self.tracks.iter() }

    pub fn keys (&self)->Vec<String> { self.tracks.keys().cloned().collect() }

    pub fn len (&self)->usize { self.tracks.len() }
    pub fn is_empty (&self)->bool { self.tracks.is_empty() }

    /// is `flid` used by any track other than the one stored under `except_key`
    pub fn is_flid_in_use (&self, flid: &Flid, except_key: &str)->bool {
        self.tracks.iter().any( |(k,t)| k != except_key && t.flid == *flid)
    }

    pub fn has_changed (&self)->bool { self.changed }

    /// return and reset the change flag. This is what the owner uses to decide if it has to publish
    pub fn take_changed (&mut self)->bool {
        std::mem::replace( &mut self.changed, false)
    }
}

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

//! engine assigned identifiers: the controller facing FLID and the octal transponder code (squawk)

use std::{fmt, ops::RangeInclusive};
use rand::Rng;
use serde::Serialize;

use crate::{Track, FlightPlanRecord};

/// codes we never hand out (VFR, hijack, radio failure, emergency)
pub const RESERVED_SQUAWKS: [&str;4] = ["1200", "7500", "7600", "7700"];

pub const FLID_RANGE: RangeInclusive<u16> = 100..=998;

#[derive(Serialize,Debug,Clone,PartialEq,Eq,Hash)]
pub struct Squawk(String);

impl Squawk {
    /// accepts only 4 octal digits that are not reserved
    pub fn parse (s: &str)->Option<Squawk> {
        let s = s.trim();
        if s.len() == 4 && s.bytes().all(|b| (b'0'..=b'7').contains(&b)) && !RESERVED_SQUAWKS.contains(&s) {
            Some( Squawk(s.to_string()))
        } else {
            None
        }
    }

    pub fn as_str (&self)->&str { self.0.as_str() }
}

impl fmt::Display for Squawk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// draw four independent octal digits until we get a non-reserved code
pub fn generate_squawk<R: Rng + ?Sized> (rng: &mut R)->Squawk {
    loop {
        let code: String = (0..4).map( |_| char::from( b'0' + rng.random_range(0..8u8))).collect();
        if !RESERVED_SQUAWKS.contains( &code.as_str()) {
            return Squawk(code)
        }
    }
}

#[derive(Serialize,Debug,Clone,PartialEq,Eq,Hash)]
pub struct Flid(String);

impl Flid {
    /// accepts only numbers within FLID_RANGE
    pub fn parse (s: &str)->Option<Flid> {
        let n: u16 = s.trim().parse().ok()?;
        if FLID_RANGE.contains(&n) { Some( Flid(n.to_string())) } else { None }
    }

    pub fn as_str (&self)->&str { self.0.as_str() }
}

impl fmt::Display for Flid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

pub fn generate_flid<R: Rng + ?Sized> (rng: &mut R)->Flid {
    Flid( rng.random_range( FLID_RANGE).to_string())
}

/// keep the FLID of an existing track, otherwise draw a new one. `is_taken` is only consulted for new
/// FLIDs. If every value in the range is taken we give up and return the last draw
pub fn resolve_flid<R,F> (existing: Option<&Track>, rng: &mut R, is_taken: F)->Flid
    where R: Rng + ?Sized, F: Fn(&Flid)->bool
{
    if let Some(track) = existing {
        return track.flid.clone()
    }

    let max_draws = FLID_RANGE.len();
    let mut flid = generate_flid(rng);
    for _ in 1..max_draws {
        if !is_taken(&flid) { break }
        flid = generate_flid(rng);
    }
    flid
}

/// the squawk of an existing track is carried forward verbatim, new tracks get a generated one.
/// Squawks of correlated flight plans are not consulted here
pub fn resolve_squawk<R: Rng + ?Sized> (existing: Option<&Track>, rng: &mut R)->Squawk {
    match existing {
        Some(track) => track.squawk().clone(),
        None => generate_squawk(rng)
    }
}

/// the valid squawk a flight plan record carries, if any
pub fn plan_squawk (plan: &FlightPlanRecord)->Option<Squawk> {
    plan.squawk.as_deref().and_then( Squawk::parse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn test_generated_squawks_are_valid () {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..10_000 {
            let sq = generate_squawk( &mut rng);
            let s = sq.as_str();
            assert_eq!( s.len(), 4);
            assert!( s.chars().all(|c| ('0'..='7').contains(&c)), "not octal: {s}");
            assert!( !RESERVED_SQUAWKS.contains(&s), "reserved: {s}");
        }
    }

    #[test]
    fn test_parse_squawk () {
        assert_eq!( Squawk::parse("4521").map(|s| s.to_string()), Some("4521".to_string()));
        assert!( Squawk::parse("7700").is_none());
        assert!( Squawk::parse("1200").is_none());
        assert!( Squawk::parse("4581").is_none()); // 8 is not octal
        assert!( Squawk::parse("452").is_none());
        assert!( Squawk::parse("45210").is_none());
    }

    #[test]
    fn test_flid_range () {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10_000 {
            let flid = generate_flid( &mut rng);
            let n: u16 = flid.as_str().parse().unwrap();
            assert!( FLID_RANGE.contains(&n), "out of range: {n}");
            assert_eq!( flid.as_str().len(), 3);
        }
    }

    #[test]
    fn test_flid_redraw_when_taken () {
        let mut rng = StdRng::seed_from_u64(1);
        let first = generate_flid( &mut StdRng::seed_from_u64(1));

        // the first draw is taken, the next one should be accepted
        let flid = resolve_flid( None, &mut rng, |f| *f == first);
        assert_ne!( flid, first);
    }

    #[test]
    fn test_new_tracks_get_generated_squawk () {
        let mut rng = StdRng::seed_from_u64(9);
        let expected = generate_squawk( &mut StdRng::seed_from_u64(9));
        assert_eq!( resolve_squawk( None, &mut rng), expected);
    }

    #[test]
    fn test_plan_squawk () {
        let mut plan = FlightPlanRecord { squawk: Some("4521".to_string()), ..Default::default() };
        assert_eq!( plan_squawk( &plan).map(|s| s.to_string()), Some("4521".to_string()));

        plan.squawk = Some("7600".to_string());
        assert!( plan_squawk( &plan).is_none());

        plan.squawk = None;
        assert!( plan_squawk( &plan).is_none());
    }
}

// SPDX-FileCopyrightText: 2024 Kerstin Humm <mail@erictapen.name>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Types for the VIA Rail `allData.json` feed.
//!
//! The feed is a single JSON object keyed by train name. Where the feed has no data for a time
//! field it sends [`SENTINEL`] instead of `null`.

use serde::Deserialize;
use serde_with::{serde_as, DefaultOnNull};
use std::collections::HashMap;

/// Placeholder the feed uses for "no time available".
pub const SENTINEL: &str = "&mdash;";

/// One response of the feed: train name to train details.
///
/// The feed object has no meaningful key order, so neither has this type. Anything that needs a
/// stable order has to sort by name itself.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(transparent)]
pub struct Feed {
    trains: HashMap<String, RawTrain>,
}

impl Feed {
    /// All `(name, train)` pairs, in no particular order.
    pub fn trains(&self) -> impl Iterator<Item = (&str, &RawTrain)> {
        self.trains.iter().map(|(name, train)| (name.as_str(), train))
    }

    pub fn len(&self) -> usize {
        self.trains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trains.is_empty()
    }

    /// Total number of station time entries over all trains.
    pub fn station_time_count(&self) -> usize {
        self.trains.values().map(|t| t.times.len()).sum()
    }
}

impl FromIterator<(String, RawTrain)> for Feed {
    fn from_iter<I: IntoIterator<Item = (String, RawTrain)>>(iter: I) -> Self {
        Feed {
            trains: iter.into_iter().collect(),
        }
    }
}

#[serde_as]
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
pub struct RawTrain {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub speed: Option<f64>,
    pub direction: Option<f64>,
    pub poll: Option<String>,
    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub departed: bool,
    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub arrived: bool,
    #[serde(default, rename = "from")]
    #[serde_as(as = "DefaultOnNull")]
    pub from_station: String,
    #[serde(default, rename = "to")]
    #[serde_as(as = "DefaultOnNull")]
    pub to_station: String,
    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub instance: String,
    #[serde(rename = "pollMin")]
    pub poll_min: Option<i32>,
    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub times: Vec<RawStationTime>,
}

#[serde_as]
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
pub struct RawStationTime {
    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub station: String,
    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub code: String,
    pub estimated: Option<String>,
    pub scheduled: Option<String>,
    pub eta: Option<String>,
    pub arrival: Option<RawTimePair>,
    pub departure: Option<RawTimePair>,
    #[serde(default)]
    #[serde_as(as = "DefaultOnNull")]
    pub diff: String,
    #[serde(default, rename = "diffMin")]
    #[serde_as(as = "DefaultOnNull")]
    pub diff_min: i32,
}

/// An estimated and a scheduled time. Either side may be missing on its own.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
pub struct RawTimePair {
    pub estimated: Option<String>,
    pub scheduled: Option<String>,
}

pub fn deserialize(body: &str) -> Result<Feed, serde_json::Error> {
    serde_json::from_str(body)
}

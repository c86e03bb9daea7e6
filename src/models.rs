// SPDX-FileCopyrightText: 2024 Kerstin Humm <mail@erictapen.name>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::schema::*;
use diesel::prelude::*;
use serde::Serialize;
use time::OffsetDateTime;

/// One fetch cycle.
#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = pulls)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Pull {
    pub id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub pulled_at: OffsetDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = pulls)]
pub struct NewPull {
    pub pulled_at: OffsetDateTime,
}

/// A train as seen in one pull. Later pulls produce new rows, never updates to old ones.
#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = trains)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Train {
    pub id: i64,
    #[serde(skip)]
    pub pull_id: i64,
    pub name: String,
    #[serde(rename = "lat")]
    pub latitude: Option<f64>,
    #[serde(rename = "lng")]
    pub longitude: Option<f64>,
    pub speed: Option<f64>,
    pub direction: Option<f64>,
    pub poll: Option<String>,
    pub departed: bool,
    pub arrived: bool,
    #[serde(rename = "from")]
    pub from_station: String,
    #[serde(rename = "to")]
    pub to_station: String,
    pub instance: String,
    #[serde(rename = "pollMin")]
    pub poll_min: Option<i32>,
}

#[derive(Insertable, Debug, PartialEq)]
#[diesel(table_name = trains)]
pub struct NewTrain<'a> {
    pub pull_id: i64,
    pub name: &'a str,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed: Option<f64>,
    pub direction: Option<f64>,
    pub poll: Option<&'a str>,
    pub departed: bool,
    pub arrived: bool,
    pub from_station: &'a str,
    pub to_station: &'a str,
    pub instance: &'a str,
    pub poll_min: Option<i32>,
}

/// A row of the station_times table, arrival and departure still flattened into columns.
#[derive(Queryable, Selectable, Identifiable, Associations, Debug, Clone, PartialEq)]
#[diesel(belongs_to(Train))]
#[diesel(table_name = station_times)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StationTimeRow {
    pub id: i64,
    pub train_id: i64,
    pub station: String,
    pub code: String,
    pub estimated: Option<String>,
    pub scheduled: Option<String>,
    pub eta: Option<String>,
    pub arrival_estimated: Option<String>,
    pub arrival_scheduled: Option<String>,
    pub departure_estimated: Option<String>,
    pub departure_scheduled: Option<String>,
    pub diff: String,
    pub diff_min: i32,
}

#[derive(Insertable, Debug, PartialEq)]
#[diesel(table_name = station_times)]
pub struct NewStationTime<'a> {
    pub train_id: i64,
    pub station: &'a str,
    pub code: &'a str,
    pub estimated: Option<&'a str>,
    pub scheduled: Option<&'a str>,
    pub eta: Option<&'a str>,
    pub arrival_estimated: Option<&'a str>,
    pub arrival_scheduled: Option<&'a str>,
    pub departure_estimated: Option<&'a str>,
    pub departure_scheduled: Option<&'a str>,
    pub diff: &'a str,
    pub diff_min: i32,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TimePair {
    pub estimated: Option<String>,
    pub scheduled: Option<String>,
}

impl TimePair {
    /// Only a pair with at least one side present is a pair at all.
    fn from_columns(estimated: Option<String>, scheduled: Option<String>) -> Option<TimePair> {
        if estimated.is_none() && scheduled.is_none() {
            None
        } else {
            Some(TimePair {
                estimated,
                scheduled,
            })
        }
    }
}

/// Serialization of a station time intended for API clients.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct StationTime {
    pub id: i64,
    pub station: String,
    pub code: String,
    pub estimated: Option<String>,
    pub scheduled: Option<String>,
    pub eta: Option<String>,
    pub arrival: Option<TimePair>,
    pub departure: Option<TimePair>,
    pub diff: String,
    #[serde(rename = "diffMin")]
    pub diff_min: i32,
}

impl From<StationTimeRow> for StationTime {
    fn from(row: StationTimeRow) -> Self {
        StationTime {
            id: row.id,
            station: row.station,
            code: row.code,
            estimated: row.estimated,
            scheduled: row.scheduled,
            eta: row.eta,
            arrival: TimePair::from_columns(row.arrival_estimated, row.arrival_scheduled),
            departure: TimePair::from_columns(row.departure_estimated, row.departure_scheduled),
            diff: row.diff,
            diff_min: row.diff_min,
        }
    }
}

/// A train together with its station times, if those were asked for.
///
/// `times` is left out of the JSON entirely when it is `None`, which is different from an empty
/// list.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TrainDetails {
    #[serde(flatten)]
    pub train: Train,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub times: Option<Vec<StationTime>>,
}

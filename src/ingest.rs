// SPDX-FileCopyrightText: 2024 Kerstin Humm <mail@erictapen.name>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Turning one feed response into one pull.
//!
//! A pull is written in a single transaction: the pull row, one row per train and one row per
//! station time. Either all of them become visible or none.

use crate::models::{NewPull, NewStationTime, NewTrain};
use crate::via_rail_feed::{Feed, RawStationTime, RawTimePair, RawTrain, SENTINEL};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::{debug, info};
use num_format::{Locale, ToFormattedString};
use std::fmt;
use thiserror::Error;
use time::OffsetDateTime;

/// Where in the write path an ingestion failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Pull,
    Train,
    StationTime,
    Transaction,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let stage = match self {
            IngestStage::Pull => "pull",
            IngestStage::Train => "train",
            IngestStage::StationTime => "station time",
            IngestStage::Transaction => "transaction",
        };
        write!(f, "{}", stage)
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to insert pull")]
    InsertPull {
        #[source]
        source: diesel::result::Error,
    },
    #[error("failed to insert train {name}")]
    InsertTrain {
        name: String,
        #[source]
        source: diesel::result::Error,
    },
    #[error("failed to insert station time {station} of train {train}")]
    InsertStationTime {
        train: String,
        station: String,
        #[source]
        source: diesel::result::Error,
    },
    /// Beginning, committing or rolling back the transaction failed.
    #[error("pull transaction failed")]
    Transaction(#[from] diesel::result::Error),
}

impl IngestError {
    pub fn stage(&self) -> IngestStage {
        match self {
            IngestError::InsertPull { .. } => IngestStage::Pull,
            IngestError::InsertTrain { .. } => IngestStage::Train,
            IngestError::InsertStationTime { .. } => IngestStage::StationTime,
            IngestError::Transaction(_) => IngestStage::Transaction,
        }
    }
}

/// Anything that can persist a feed response as a new pull.
pub trait PullSink {
    fn store(&mut self, feed: &Feed) -> Result<i64, IngestError>;
}

impl PullSink for SqliteConnection {
    fn store(&mut self, feed: &Feed) -> Result<i64, IngestError> {
        ingest_pull(self, feed, OffsetDateTime::now_utc())
    }
}

/// `None` for a missing value as well as for the feed's placeholder.
fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| *v != SENTINEL)
}

fn resolve_pair(pair: Option<&RawTimePair>) -> (Option<&str>, Option<&str>) {
    match pair {
        Some(pair) => (
            present(pair.estimated.as_deref()),
            present(pair.scheduled.as_deref()),
        ),
        None => (None, None),
    }
}

impl<'a> NewTrain<'a> {
    pub fn from_raw(pull_id: i64, name: &'a str, raw: &'a RawTrain) -> Self {
        NewTrain {
            pull_id,
            name,
            latitude: raw.lat,
            longitude: raw.lng,
            speed: raw.speed,
            direction: raw.direction,
            poll: raw.poll.as_deref(),
            departed: raw.departed,
            arrived: raw.arrived,
            from_station: &raw.from_station,
            to_station: &raw.to_station,
            instance: &raw.instance,
            poll_min: raw.poll_min,
        }
    }
}

impl<'a> NewStationTime<'a> {
    /// Replace the feed's placeholders with `None`.
    ///
    /// The top level `scheduled` is stored exactly as received, placeholder included, while both
    /// sides of `arrival` and `departure` are filtered. Existing data has been written this way
    /// since the first pull, so don't unify the two without migrating old rows.
    pub fn from_raw(train_id: i64, raw: &'a RawStationTime) -> Self {
        let (arrival_estimated, arrival_scheduled) = resolve_pair(raw.arrival.as_ref());
        let (departure_estimated, departure_scheduled) = resolve_pair(raw.departure.as_ref());
        NewStationTime {
            train_id,
            station: &raw.station,
            code: &raw.code,
            estimated: present(raw.estimated.as_deref()),
            scheduled: raw.scheduled.as_deref(),
            eta: present(raw.eta.as_deref()),
            arrival_estimated,
            arrival_scheduled,
            departure_estimated,
            departure_scheduled,
            diff: &raw.diff,
            diff_min: raw.diff_min,
        }
    }
}

fn insert_train(
    db: &mut SqliteConnection,
    pull_id: i64,
    name: &str,
    raw: &RawTrain,
) -> Result<i64, IngestError> {
    use crate::schema::trains;

    diesel::insert_into(trains::table)
        .values(&NewTrain::from_raw(pull_id, name, raw))
        .returning(trains::id)
        .get_result(db)
        .map_err(|source| IngestError::InsertTrain {
            name: name.to_string(),
            source,
        })
}

fn insert_station_times(
    db: &mut SqliteConnection,
    train_id: i64,
    name: &str,
    times: &[RawStationTime],
) -> Result<(), IngestError> {
    use crate::schema::station_times;

    // One statement per row keeps the ids in feed order, which is the order they are read back in.
    for raw in times {
        diesel::insert_into(station_times::table)
            .values(&NewStationTime::from_raw(train_id, raw))
            .execute(db)
            .map_err(|source| IngestError::InsertStationTime {
                train: name.to_string(),
                station: raw.station.clone(),
                source,
            })?;
    }
    Ok(())
}

/// Store `feed` as a new pull taken at `pulled_at` and return the pull's id.
///
/// Nothing of the pull is left behind if any insert fails.
pub fn ingest_pull(
    db: &mut SqliteConnection,
    feed: &Feed,
    pulled_at: OffsetDateTime,
) -> Result<i64, IngestError> {
    use crate::schema::pulls;

    let pull_id = db.transaction::<_, IngestError, _>(|db| {
        let pull_id: i64 = diesel::insert_into(pulls::table)
            .values(&NewPull { pulled_at })
            .returning(pulls::id)
            .get_result(db)
            .map_err(|source| IngestError::InsertPull { source })?;

        for (name, raw) in feed.trains() {
            let train_id = insert_train(db, pull_id, name, raw)?;
            debug!("Inserted train {} as {}.", name, train_id);
            insert_station_times(db, train_id, name, &raw.times)?;
        }
        Ok(pull_id)
    })?;

    info!(
        "Stored pull {} with {} trains and {} station times.",
        pull_id,
        feed.len().to_formatted_string(&Locale::en),
        feed.station_time_count().to_formatted_string(&Locale::en)
    );
    Ok(pull_id)
}

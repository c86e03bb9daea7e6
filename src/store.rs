// SPDX-FileCopyrightText: 2024 Kerstin Humm <mail@erictapen.name>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Read access to stored pulls, as used by the web API.

use crate::models::{Pull, StationTime, StationTimeRow, Train, TrainDetails};
use crate::schema::{pulls, station_times, trains};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("pull {0} does not exist")]
    PullNotFound(i64),
    #[error("train {0} does not exist")]
    TrainNotFound(i64),
    #[error(transparent)]
    Database(#[from] diesel::result::Error),
}

/// All pulls, oldest first.
pub fn list_pulls(db: &mut SqliteConnection) -> QueryResult<Vec<Pull>> {
    pulls::table
        .order(pulls::id.asc())
        .select(Pull::as_select())
        .load(db)
}

/// The trains of one pull, sorted by name.
///
/// Station times are only queried when `include_station_times` is set, otherwise `times` stays
/// `None` on every train.
pub fn list_trains(
    db: &mut SqliteConnection,
    pull_id: i64,
    include_station_times: bool,
) -> Result<Vec<TrainDetails>, QueryError> {
    let pull_exists: bool =
        diesel::select(diesel::dsl::exists(pulls::table.find(pull_id))).get_result(db)?;
    if !pull_exists {
        return Err(QueryError::PullNotFound(pull_id));
    }

    let trains: Vec<Train> = trains::table
        .filter(trains::pull_id.eq(pull_id))
        .order(trains::name.asc())
        .select(Train::as_select())
        .load(db)?;

    if !include_station_times {
        return Ok(trains
            .into_iter()
            .map(|train| TrainDetails { train, times: None })
            .collect());
    }

    let times = StationTimeRow::belonging_to(&trains)
        .order(station_times::id.asc())
        .select(StationTimeRow::as_select())
        .load::<StationTimeRow>(db)?
        .grouped_by(&trains);

    Ok(trains
        .into_iter()
        .zip(times)
        .map(|(train, rows)| TrainDetails {
            train,
            times: Some(rows.into_iter().map(StationTime::from).collect()),
        })
        .collect())
}

/// One train with all of its station times, in the order the feed listed them.
pub fn get_train(db: &mut SqliteConnection, train_id: i64) -> Result<TrainDetails, QueryError> {
    let train: Train = trains::table
        .find(train_id)
        .select(Train::as_select())
        .first(db)
        .optional()?
        .ok_or(QueryError::TrainNotFound(train_id))?;

    let times = StationTimeRow::belonging_to(&train)
        .order(station_times::id.asc())
        .select(StationTimeRow::as_select())
        .load::<StationTimeRow>(db)?
        .into_iter()
        .map(StationTime::from)
        .collect();

    Ok(TrainDetails {
        train,
        times: Some(times),
    })
}

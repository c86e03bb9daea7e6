// SPDX-FileCopyrightText: 2024 Kerstin Humm <mail@erictapen.name>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Fixtures shared by the unit tests.

use diesel::sqlite::SqliteConnection;
use std::error::Error;
use time::OffsetDateTime;

/// A trimmed down real-world response with two trains.
pub const SAMPLE_FEED: &str = r#"{
  "61": {
    "lat": 45.4995,
    "lng": -73.5664,
    "speed": 0,
    "direction": null,
    "poll": "2024-03-02T13:05:00-05:00",
    "departed": true,
    "arrived": false,
    "from": "MTRL",
    "to": "TRTO",
    "instance": "2024-03-02",
    "pollMin": 1,
    "times": [
      {
        "station": "Montréal",
        "code": "MTRL",
        "estimated": "&mdash;",
        "scheduled": "13:00",
        "eta": "&mdash;",
        "arrival": null,
        "departure": {
          "estimated": "2024-03-02T13:02:00-05:00",
          "scheduled": "2024-03-02T13:00:00-05:00"
        },
        "diff": "goo",
        "diffMin": 2
      },
      {
        "station": "Dorval",
        "code": "DORV",
        "estimated": "13:25",
        "scheduled": "&mdash;",
        "eta": "13:25",
        "arrival": {
          "estimated": "&mdash;",
          "scheduled": "2024-03-02T13:20:00-05:00"
        },
        "departure": {
          "estimated": "&mdash;",
          "scheduled": "&mdash;"
        },
        "diff": "med",
        "diffMin": 5
      }
    ]
  },
  "15 (02)": {
    "lat": null,
    "lng": null,
    "speed": null,
    "direction": null,
    "poll": null,
    "departed": false,
    "arrived": false,
    "from": "MTRL",
    "to": "HLFX",
    "instance": "2024-03-01",
    "pollMin": null,
    "times": [
      {
        "station": "Halifax",
        "code": "HLFX",
        "estimated": "09:10",
        "scheduled": "09:00",
        "eta": null,
        "arrival": {
          "estimated": "2024-03-02T09:10:00-04:00",
          "scheduled": "2024-03-02T09:00:00-04:00"
        },
        "departure": null,
        "diff": "bad",
        "diffMin": 10
      }
    ]
  }
}"#;

/// A fresh, migrated in-memory database.
pub fn connection() -> Result<SqliteConnection, Box<dyn Error>> {
    Ok(crate::db::establish(":memory:")?)
}

/// A fixed point in time with whole seconds, so it survives a trip through SQLite unchanged.
pub fn pulled_at(offset_seconds: i64) -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(1_709_400_000 + offset_seconds)
}

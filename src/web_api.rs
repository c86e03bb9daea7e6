// SPDX-FileCopyrightText: 2023 Kerstin Humm <mail@erictapen.name>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::models::{Pull, TrainDetails};
use crate::store::{self, QueryError};
use log::{error, warn};
use rocket::figment::{
    util::map,
    value::{Map, Value},
    Figment,
};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{catch, catchers, get, routes, Build, Config, Request, Rocket};
use rocket_sync_db_pools::{database, diesel};

#[database("viarail")]
struct DbConn(diesel::SqliteConnection);

fn query_error_status(e: QueryError) -> Status {
    match e {
        QueryError::PullNotFound(_) | QueryError::TrainNotFound(_) => {
            warn!("{}", e);
            Status::NotFound
        }
        QueryError::Database(e) => {
            error!("{}", e);
            Status::InternalServerError
        }
    }
}

/// Rocket hands us the raw path segment if it isn't a number.
fn parse_id(what: &str, id: Result<i64, &str>) -> Result<i64, Status> {
    id.map_err(|raw| {
        warn!("Invalid {} id: {:?}", what, raw);
        Status::BadRequest
    })
}

#[get("/api/pulls", rank = 1)]
async fn pulls(conn: DbConn) -> Result<Json<Vec<Pull>>, Status> {
    conn.run(|db| store::list_pulls(db))
        .await
        .map(Json)
        .map_err(|e| {
            error!("{}", e);
            Status::InternalServerError
        })
}

/// Station times are only included if `full` is given with a non-empty value.
#[get("/api/pulls/<pull_id>?<full>", rank = 2)]
async fn trains(
    conn: DbConn,
    pull_id: Result<i64, &str>,
    full: Option<String>,
) -> Result<Json<Vec<TrainDetails>>, Status> {
    let pull_id = parse_id("pull", pull_id)?;
    let include_station_times = full.is_some_and(|f| !f.is_empty());
    conn.run(move |db| store::list_trains(db, pull_id, include_station_times))
        .await
        .map(Json)
        .map_err(query_error_status)
}

#[get("/api/trains/<train_id>")]
async fn train(
    conn: DbConn,
    train_id: Result<i64, &str>,
) -> Result<Json<TrainDetails>, Status> {
    let train_id = parse_id("train", train_id)?;
    conn.run(move |db| store::get_train(db, train_id))
        .await
        .map(Json)
        .map_err(query_error_status)
}

/// Only ever answer with the reason phrase, whatever went wrong.
#[catch(default)]
fn default_catcher(status: Status, _request: &Request) -> String {
    status.reason_lossy().to_string()
}

pub fn build_rocket(db_url: &str, listen: std::net::IpAddr, port: u16) -> Rocket<Build> {
    let config = Config {
        port,
        address: listen,
        ..Config::debug_default()
    };
    let db_map: Map<_, Value> = map! {
        "url" => db_url.into(),
    };
    let figment = Figment::from(config).merge(("databases", map!["viarail" => db_map]));
    rocket::custom(figment)
        .mount("/", routes![pulls, trains, train])
        .register("/", catchers![default_catcher])
        .attach(DbConn::fairing())
}

/// Serve the API until the server shuts down, e.g. on Ctrl-C.
pub fn webserver(
    db_url: &str,
    listen: std::net::IpAddr,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let rt = rocket::tokio::runtime::Runtime::new()?;
    let builder = build_rocket(db_url, listen, port);
    rt.block_on(async move { builder.launch().await })?;
    Ok(())
}

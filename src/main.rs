// SPDX-FileCopyrightText: 2020 Kerstin Humm <mail@erictapen.name>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::crawler::{HttpFeedSource, IntervalTicker};
use docopt::Docopt;
use log::{error, info, warn};
use serde::Deserialize;
use std::sync::mpsc::channel;

pub mod crawler;
pub mod db;
pub mod ingest;
pub mod models;
pub mod schema;
pub mod store;
pub mod via_rail_feed;
pub mod web_api;

#[cfg(test)]
mod testing;

const USAGE: &'static str = "
Usage: viarail-tracker [options]
       viarail-tracker pull-once [options]
       viarail-tracker run-db-migrations [options]
       viarail-tracker --help

Options:
    -h, --help           Show this message.
    --port <port>        TCP port on which the server listens. [default: 8085]
    -l, --listen IP      IP address to listen on, e.g. ::. [default: 127.0.0.1]
    -d, --database PATH  SQLite database file. Falls back to $DATABASE_URL, then to viarail.db.
    --feed-url URL       Train data to pull. [default: https://tsimobile.viarail.ca/data/allData.json]
    --interval SECONDS   Time between two pulls. [default: 7200]

";

const DEFAULT_DATABASE: &'static str = "viarail.db";

#[derive(Deserialize)]
struct CliArgs {
    flag_port: u16,
    flag_listen: std::net::IpAddr,
    flag_database: Option<String>,
    flag_feed_url: String,
    flag_interval: u64,
    cmd_pull_once: bool,
    cmd_run_db_migrations: bool,
}

fn setup_logging() {
    if systemd_journal_logger::connected_to_journal() {
        // If journald is available.
        match systemd_journal_logger::JournalLog::new().map(|j| j.install()) {
            Ok(Ok(())) => log::set_max_level(log::LevelFilter::Info),
            _ => eprintln!("Couldn't set up logging to journald."),
        }
    } else {
        // Otherwise fall back to logging to standard error.
        simple_logger::SimpleLogger::new()
            .env()
            .init()
            .unwrap_or_else(|e| eprintln!("Couldn't set up logging: {}", e));
    }
}

fn main() {
    setup_logging();

    let args: CliArgs = Docopt::new(USAGE)
        .and_then(|d| d.deserialize())
        .unwrap_or_else(|e| e.exit());

    let interval = crawler::pull_interval(args.flag_interval).unwrap_or_else(|e| {
        error!("{}", e);
        std::process::exit(1);
    });

    let db_url = args
        .flag_database
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| DEFAULT_DATABASE.to_string());

    let mut db = db::establish(&db_url).unwrap_or_else(|e| {
        error!("{}", e);
        std::process::exit(1);
    });
    if args.cmd_run_db_migrations {
        std::process::exit(0);
    }

    let mut source = HttpFeedSource::new(&args.flag_feed_url).unwrap_or_else(|e| {
        error!("Can't set up HTTP client: {}", e);
        std::process::exit(1);
    });

    if args.cmd_pull_once {
        match crawler::pull_once(&mut source, &mut db) {
            Ok(pull_id) => {
                info!("Pull {} complete.", pull_id);
                std::process::exit(0);
            }
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        }
    }

    // Dropping or sending on shutdown_tx ends the crawler after its current pull.
    let (shutdown_tx, shutdown_rx) = channel();
    let crawler_thread = std::thread::spawn(move || {
        let mut ticker = IntervalTicker::new(interval, shutdown_rx);
        crawler::crawler(&mut source, &mut db, &mut ticker);
    });

    info!("Listening on http://{}:{}", args.flag_listen, args.flag_port);
    if let Err(e) = web_api::webserver(&db_url, args.flag_listen, args.flag_port) {
        error!("{}", e);
    }

    info!("Web server stopped, waiting for the crawler to finish.");
    let _ = shutdown_tx.send(());
    if crawler_thread.join().is_err() {
        warn!("Crawler thread panicked.");
    }
}

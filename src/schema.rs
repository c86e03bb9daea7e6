diesel::table! {
    pulls (id) {
        id -> BigInt,
        pulled_at -> TimestamptzSqlite,
    }
}

diesel::table! {
    station_times (id) {
        id -> BigInt,
        train_id -> BigInt,
        station -> Text,
        code -> Text,
        estimated -> Nullable<Text>,
        scheduled -> Nullable<Text>,
        eta -> Nullable<Text>,
        arrival_estimated -> Nullable<Text>,
        arrival_scheduled -> Nullable<Text>,
        departure_estimated -> Nullable<Text>,
        departure_scheduled -> Nullable<Text>,
        diff -> Text,
        diff_min -> Integer,
    }
}

diesel::table! {
    trains (id) {
        id -> BigInt,
        pull_id -> BigInt,
        name -> Text,
        latitude -> Nullable<Double>,
        longitude -> Nullable<Double>,
        speed -> Nullable<Double>,
        direction -> Nullable<Double>,
        poll -> Nullable<Text>,
        departed -> Bool,
        arrived -> Bool,
        from_station -> Text,
        to_station -> Text,
        instance -> Text,
        poll_min -> Nullable<Integer>,
    }
}

diesel::joinable!(station_times -> trains (train_id));
diesel::joinable!(trains -> pulls (pull_id));

diesel::allow_tables_to_appear_in_same_query!(pulls, station_times, trains,);

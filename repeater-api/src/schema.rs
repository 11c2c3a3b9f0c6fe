// Mirrors schema.sql; column names follow the historical MySQL layout.

diesel::table! {
    fmlastheard (id) {
        id -> BigInt,
        event_time -> Timestamp,
        talk -> Text,
        callsign -> Text,
        tg -> Integer,
        server -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    fmstatus (callsign) {
        callsign -> Text,
        event_time -> Timestamp,
        tg -> Integer,
        server -> Text,
        last_update -> Timestamp,
    }
}

diesel::table! {
    nodes (callsign) {
        callsign -> Text,
        location -> Nullable<Text>,
        locator -> Nullable<Text>,
        lat -> Nullable<Double>,
        lon -> Nullable<Double>,
        rx_freq -> Nullable<Text>,
        tx_freq -> Nullable<Text>,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    config (id) {
        id -> Integer,
        callsign -> Text,
        dns_domain -> Nullable<Text>,
        default_tg -> Nullable<Integer>,
        monitor_tgs -> Nullable<Text>,
        #[sql_name = "Location"]
        location -> Nullable<Text>,
        #[sql_name = "Locator"]
        locator -> Nullable<Text>,
        #[sql_name = "SysOp"]
        sysop -> Nullable<Text>,
        #[sql_name = "LAT"]
        lat -> Nullable<Text>,
        #[sql_name = "LON"]
        lon -> Nullable<Text>,
        #[sql_name = "TXFREQ"]
        tx_freq -> Nullable<Text>,
        #[sql_name = "RXFREQ"]
        rx_freq -> Nullable<Text>,
        #[sql_name = "Website"]
        website -> Nullable<Text>,
        #[sql_name = "nodeLocation"]
        node_location -> Nullable<Text>,
        #[sql_name = "CTCSS"]
        ctcss -> Nullable<Text>,
        reboot_requested -> Bool,
        setup_password -> Nullable<Text>,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    fmstats (metric, rank) {
        metric -> Text,
        rank -> Integer,
        callsign -> Nullable<Text>,
        tg -> Nullable<Integer>,
        weekday -> Nullable<Integer>,
        hour -> Nullable<Integer>,
        qso_count -> Nullable<BigInt>,
        total_seconds -> Nullable<Double>,
        score -> Nullable<Double>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(fmlastheard, fmstatus, nodes, config, fmstats);

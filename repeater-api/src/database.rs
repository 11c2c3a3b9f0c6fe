use anyhow::Context;
use diesel::{connection::SimpleConnection, prelude::*, r2d2, sqlite::Sqlite};

use crate::{
    activity::{self, LastHeard, MetricRow, Status, TalkgroupFilter},
    schema::{config, fmstats, fmstatus, nodes},
    station_config::{ConfigUpdate, StationConfig, CONFIG_ID},
    svxlink::SvxlinkSettings,
};

const SCHEMA: &str = include_str!("schema.sql");

const LAST_HEARD_LIMIT: usize = 50;
const TOP_LIMIT: i64 = 10;

const LAST_HEARD_QUERY: &str = "
    SELECT
      s.callsign,
      s.tg,
      s.server,
      s.talk,
      strftime('%Y-%m-%d %H:%M:%S', s.event_time) AS event_time,
      CAST(strftime('%s', s.event_time) AS INTEGER) - CAST(strftime('%s', (
        SELECT MAX(st.event_time)
        FROM fmlastheard st
        WHERE st.callsign = s.callsign
          AND st.tg = s.tg
          AND st.server = s.server
          AND st.talk = 'start'
          AND st.event_time <= s.event_time
      )) AS INTEGER) AS duration_s,
      n.location
    FROM fmlastheard s
    LEFT JOIN nodes n
      ON n.callsign = s.callsign
    WHERE s.talk = 'stop'";

type StatusTuple = (String, time::PrimitiveDateTime, i32, String, Option<String>);

pub type Pool = r2d2::Pool<r2d2::ConnectionManager<SqliteConnection>>;

#[derive(Debug)]
struct ConnectionSetup;

impl r2d2::CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionSetup {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute("PRAGMA busy_timeout = 5000;")
            .map_err(r2d2::Error::QueryError)
    }
}

#[derive(Clone)]
pub struct Database {
    pool: Pool,
}

impl Database {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn open(path: &str, max_size: u32) -> anyhow::Result<Self> {
        let manager = r2d2::ConnectionManager::<SqliteConnection>::new(path);
        let pool = r2d2::Pool::builder()
            .test_on_check_out(true)
            .max_size(max_size)
            .connection_customizer(Box::new(ConnectionSetup))
            .build(manager)
            .context("could not open database")?;
        Ok(Self::new(pool))
    }

    /// Runs blocking diesel work off the async executor.
    async fn run<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().context("DB connection failed")?;
            f(&mut *conn)
        })
        .await?
    }

    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        self.run(|conn| {
            conn.batch_execute(SCHEMA)
                .context("could not create tables")
        })
        .await?;
        log::info!("Database schema is up to date");
        Ok(())
    }

    pub async fn station_config(&self) -> anyhow::Result<Option<StationConfig>> {
        self.run(|conn| {
            config::table
                .order(config::id.asc())
                .select(StationConfig::as_select())
                .first::<StationConfig>(conn)
                .optional()
                .context("could not read config")
        })
        .await
    }

    /// The stored setup password, if one is set and non-empty.
    pub async fn setup_password(&self) -> anyhow::Result<Option<String>> {
        let stored: Option<Option<String>> = self
            .run(|conn| {
                config::table
                    .filter(config::id.eq(CONFIG_ID))
                    .select(config::setup_password)
                    .first::<Option<String>>(conn)
                    .optional()
                    .context("could not read setup password")
            })
            .await?;
        Ok(stored.flatten().filter(|p| !p.is_empty()))
    }

    pub async fn upsert_config(&self, data: ConfigUpdate) -> anyhow::Result<()> {
        let count = self
            .run(move |conn| {
                diesel::insert_into(config::table)
                    .values(&data)
                    .on_conflict(config::id)
                    .do_update()
                    .set(&data)
                    .execute(conn)
                    .context("could not store config")
            })
            .await?;
        log::info!("Stored config ({} rows affected)", count);
        Ok(())
    }

    /// Creates the config row from svxlink settings unless one exists already.
    /// Returns whether a row was inserted.
    pub async fn seed_config(&self, seed: SvxlinkSettings) -> anyhow::Result<bool> {
        let now = now_utc();
        let count = self
            .run(move |conn| {
                diesel::insert_or_ignore_into(config::table)
                    .values((
                        config::id.eq(CONFIG_ID),
                        config::callsign.eq(seed.callsign),
                        config::dns_domain.eq(seed.dns_domain),
                        config::default_tg.eq(seed.default_tg),
                        config::monitor_tgs.eq(seed.monitor_tgs),
                        config::updated_at.eq(now),
                    ))
                    .execute(conn)
                    .context("could not seed config")
            })
            .await?;
        Ok(count > 0)
    }

    pub async fn last_heard(&self, filter: TalkgroupFilter) -> anyhow::Result<Vec<LastHeard>> {
        self.run(move |conn| {
            let mut sql = LAST_HEARD_QUERY.to_owned();
            if let Some(condition) = filter.sql_condition() {
                sql.push_str(" AND ");
                sql.push_str(&condition);
            }
            sql.push_str(&format!(
                " ORDER BY s.event_time DESC LIMIT {}",
                LAST_HEARD_LIMIT
            ));

            let mut query = diesel::sql_query(sql).into_boxed::<Sqlite>();
            for tg in filter.talkgroups() {
                query = query.bind::<diesel::sql_types::Integer, _>(*tg);
            }

            query
                .load::<LastHeard>(conn)
                .context("could not read last heard")
        })
        .await
    }

    pub async fn status(&self) -> anyhow::Result<Vec<Status>> {
        let rows: Vec<StatusTuple> = self
            .run(|conn| {
                fmstatus::table
                    .left_join(nodes::table.on(nodes::callsign.eq(fmstatus::callsign)))
                    .select((
                        fmstatus::callsign,
                        fmstatus::event_time,
                        fmstatus::tg,
                        fmstatus::server,
                        nodes::location.nullable(),
                    ))
                    .order(fmstatus::event_time.desc())
                    .load::<StatusTuple>(conn)
                    .context("could not read status")
            })
            .await?;

        Ok(rows
            .into_iter()
            .map(|(callsign, event_time, tg, server, location)| Status {
                callsign,
                tg,
                server,
                event_time: activity::format_timestamp(event_time),
                location,
            })
            .collect())
    }

    pub async fn heatmap(&self) -> anyhow::Result<Vec<MetricRow>> {
        self.run(|conn| {
            fmstats::table
                .filter(fmstats::metric.eq(activity::HEATMAP_METRIC))
                .order((fmstats::weekday.asc(), fmstats::hour.asc()))
                .select(MetricRow::as_select())
                .load::<MetricRow>(conn)
                .context("could not read heatmap")
        })
        .await
    }

    /// The first ten ranks of a precomputed metric.
    pub async fn top_ranked(&self, metric: &'static str) -> anyhow::Result<Vec<MetricRow>> {
        self.run(move |conn| {
            fmstats::table
                .filter(fmstats::metric.eq(metric))
                .order(fmstats::rank.asc())
                .limit(TOP_LIMIT)
                .select(MetricRow::as_select())
                .load::<MetricRow>(conn)
                .with_context(|| format!("could not read {}", metric))
        })
        .await
    }

    #[cfg(test)]
    pub async fn in_memory() -> Self {
        let db = Self::open(":memory:", 1).unwrap();
        db.ensure_schema().await.unwrap();
        db
    }

    #[cfg(test)]
    pub async fn execute_sql(&self, sql: &'static str) {
        self.run(move |conn| Ok(conn.batch_execute(sql)?))
            .await
            .unwrap();
    }
}

pub fn now_utc() -> time::PrimitiveDateTime {
    let now = time::OffsetDateTime::now_utc();
    time::PrimitiveDateTime::new(now.date(), now.time())
}

#[cfg(test)]
mod test {
    use super::*;

    const EVENTS: &str = "
        INSERT INTO nodes (callsign, location) VALUES ('DB0ABC', 'Kiel');
        INSERT INTO fmlastheard (event_time, talk, callsign, tg, server) VALUES
          ('2024-05-01 10:00:00', 'start', 'DB0ABC', 1, 'A'),
          ('2024-05-01 10:00:42', 'stop',  'DB0ABC', 1, 'A'),
          ('2024-05-01 10:05:00', 'start', 'OE1XYZ', 2, 'A'),
          ('2024-05-01 10:05:10', 'stop',  'OE1XYZ', 2, 'A'),
          ('2024-05-01 10:06:00', 'stop',  'G4ABC',  3, 'B'),
          ('2024-05-01 10:07:00', 'start', 'K1ABC',  4, 'B'),
          ('2024-05-01 10:07:30', 'stop',  'K1ABC',  4, 'B');
    ";

    #[tokio::test]
    async fn schema_is_idempotent() {
        let db = Database::in_memory().await;
        db.ensure_schema().await.unwrap();
        assert!(db.station_config().await.unwrap().is_none());
        assert_eq!(db.setup_password().await.unwrap(), None);
    }

    #[tokio::test]
    async fn last_heard_durations() {
        let db = Database::in_memory().await;
        db.execute_sql(EVENTS).await;

        let rows = db.last_heard(TalkgroupFilter::All).await.unwrap();
        let calls: Vec<&str> = rows.iter().map(|r| r.callsign.as_str()).collect();
        assert_eq!(calls, ["K1ABC", "G4ABC", "OE1XYZ", "DB0ABC"]);
        assert!(rows.iter().all(|r| r.talk == "stop"));

        assert_eq!(rows[0].duration_s, Some(30));
        assert_eq!(rows[1].duration_s, None);
        assert_eq!(rows[3].duration_s, Some(42));
        assert_eq!(rows[3].location.as_deref(), Some("Kiel"));
        assert_eq!(rows[3].event_time, "2024-05-01 10:00:42");
    }

    #[tokio::test]
    async fn last_heard_filters() {
        let db = Database::in_memory().await;
        db.execute_sql(EVENTS).await;

        let rows = db.last_heard(TalkgroupFilter::Local(2)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].callsign, "OE1XYZ");

        let rows = db
            .last_heard(TalkgroupFilter::Monitored(vec![1, 3, 99]))
            .await
            .unwrap();
        let tgs: Vec<i32> = rows.iter().map(|r| r.tg).collect();
        assert_eq!(tgs, [3, 1]);
    }

    #[tokio::test]
    async fn last_heard_is_capped() {
        let db = Database::in_memory().await;
        db.execute_sql(
            "WITH RECURSIVE seq(n) AS (SELECT 0 UNION ALL SELECT n + 1 FROM seq WHERE n < 59)
             INSERT INTO fmlastheard (event_time, talk, callsign, tg, server)
             SELECT datetime('2024-05-01 10:00:00', '+' || n || ' minutes'), 'stop', 'DL1ABC', 1, 'A'
             FROM seq;",
        )
        .await;

        let rows = db.last_heard(TalkgroupFilter::All).await.unwrap();
        assert_eq!(rows.len(), LAST_HEARD_LIMIT);
        assert_eq!(rows[0].event_time, "2024-05-01 10:59:00");
    }

    #[tokio::test]
    async fn status_joins_nodes() {
        let db = Database::in_memory().await;
        db.execute_sql(
            "INSERT INTO nodes (callsign, location) VALUES ('DB0ABC', 'Kiel');
             INSERT INTO fmstatus (callsign, event_time, tg, server) VALUES
               ('DB0ABC', '2024-05-01 10:00:00', 262, 'A'),
               ('OE1XYZ', '2024-05-01 10:01:00', 232, 'B');",
        )
        .await;

        let rows = db.status().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].callsign, "OE1XYZ");
        assert_eq!(rows[0].location, None);
        assert_eq!(rows[1].location.as_deref(), Some("Kiel"));
        assert_eq!(rows[1].event_time, "2024-05-01 10:00:00");
    }

    #[tokio::test]
    async fn top_ranked_limits_and_orders() {
        let db = Database::in_memory().await;
        db.execute_sql(
            "WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < 12)
             INSERT INTO fmstats (metric, rank, callsign, qso_count)
             SELECT 'top_calls_qso', 13 - n, 'DL' || n || 'ABC', n FROM seq;
             INSERT INTO fmstats (metric, rank, callsign, qso_count) VALUES ('other', 1, 'X', 1);",
        )
        .await;

        let rows = db.top_ranked("top_calls_qso").await.unwrap();
        assert_eq!(rows.len(), 10);
        let ranks: Vec<i32> = rows.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, (1..=10).collect::<Vec<_>>());
        assert!(rows.iter().all(|r| r.metric == "top_calls_qso"));
    }

    #[tokio::test]
    async fn seed_never_overwrites() {
        let db = Database::in_memory().await;
        let seed = SvxlinkSettings {
            callsign: "DB0ABC".to_owned(),
            dns_domain: "fm-funknetz.de".to_owned(),
            default_tg: 262,
            monitor_tgs: "262,9".to_owned(),
        };
        assert!(db.seed_config(seed.clone()).await.unwrap());

        let mut other = seed;
        other.callsign = "DB0XYZ".to_owned();
        assert!(!db.seed_config(other).await.unwrap());

        let stored = db.station_config().await.unwrap().unwrap();
        assert_eq!(stored.callsign, "DB0ABC");
        assert_eq!(stored.default_tg, Some(262));
        assert!(!stored.reboot_requested);
    }
}

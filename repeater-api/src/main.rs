mod activity;
mod config_writer;
mod database;
mod helpers;
mod prefix;
mod query;
mod schema;
mod server;
mod settings;
mod station_config;
mod svxlink;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let settings = settings::Settings::from_env()?;
    log::debug!("Starting with {:?}", settings);

    let db = database::Database::open(&settings.database, settings.pool_size)?;
    db.ensure_schema().await?;

    svxlink::seed_config(&db, &settings.svxlink_conf).await;

    server::run_api(db, settings.listen).await
}

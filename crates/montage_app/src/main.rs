mod app;
mod config;
mod effects;
mod logging;
mod persistence;

fn main() -> anyhow::Result<()> {
    let config = config::AppConfig::from_env();
    app::run(config)
}

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info};

use seatwatch::control::FileControlChannel;
use seatwatch::db::Database;
use seatwatch::engine::{Engine, EngineExit, EngineTuning};
use seatwatch::notify::SmtpMailer;
use seatwatch::registrar::{HttpRegistrar, TimedRegistrar};
use seatwatch::settings::SettingsStore;

fn data_dir() -> PathBuf {
    std::env::var_os("SEATWATCH_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./seatwatch-data"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("Seatwatch starting up...");

    let dir = data_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create data directory {}", dir.display()))?;

    let db = Database::new(dir.join("seatwatch.sqlite3"))?;
    let settings = SettingsStore::new(dir.join("settings.json"))?;
    let control = Arc::new(FileControlChannel::new(&dir));
    let mailer = Arc::new(SmtpMailer::from_file(&dir.join("email.json")));

    let registrar = HttpRegistrar::new(settings.registrar())
        .map_err(|err| anyhow::anyhow!("failed to build registrar client: {err}"))?;
    let registrar = TimedRegistrar::new(registrar);

    let tuning = EngineTuning {
        close_session_on_stop: settings.close_session_on_stop(),
        ..EngineTuning::default()
    };

    let engine = Engine::new(db, Box::new(registrar), control, mailer, tuning);

    // Ctrl-C behaves like a stop request from the controller.
    let cancel = engine.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received; stopping monitor");
            cancel.cancel();
        }
    });

    match engine.run().await? {
        EngineExit::Stopped => {
            info!("Monitor stopped");
            Ok(())
        }
        EngineExit::LoginFailed => {
            error!("Monitor could not establish a session");
            std::process::exit(1);
        }
    }
}

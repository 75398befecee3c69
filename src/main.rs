use parklot::config::Settings;
use parklot::datatype::Timestamp;
use parklot::store::OccupancyStore;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() {
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = report(&settings) {
        error!(error = %e, "parklot failed");
        std::process::exit(1);
    }
}

/// Prints the state of the lot: totals, free spaces and who is parked where.
fn report(settings: &Settings) -> parklot::Result<()> {
    let store = OccupancyStore::from_settings(&settings.database)?;
    info!(path = %settings.database.path, "database ready");

    for mismatch in store.audit()? {
        warn!(%mismatch, "inconsistent space status");
    }

    println!("{}", store.summary()?);
    println!("Free spaces:");
    for space in store.list_free_spaces()? {
        println!("  {space}");
    }
    let now = Timestamp::now();
    println!("Parked:");
    for view in store.list_active()? {
        let minutes = view.occupancy.duration(now).num_minutes();
        println!("  {view} ({minutes} min)");
    }
    Ok(())
}

//! EDR Agent - Main Entry Point

mod logic;
pub mod constants;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting {} v{}...", constants::APP_NAME, constants::APP_VERSION);

    // The local log directory is the one mandatory resource: without it the
    // agent would run silently half-configured.
    if let Err(e) = logic::recorder::init(None) {
        log::error!("Cannot create log directory: {} - aborting", e);
        std::process::exit(1);
    }

    logic::relay::init(tokio::runtime::Handle::current());
    logic::baseline::init();

    logic::model::ensure_init();
    if logic::model::availability() == logic::model::Availability::Ready {
        log::info!("Realtime ML model loaded successfully");
    } else {
        log::info!("Realtime ML model not found - using severity fallback");
    }

    tokio::spawn(logic::sensors::process::run());
    log::info!("Process monitoring started");

    tokio::spawn(logic::sensors::process_tree::run());
    log::info!("Process tree monitoring started");

    tokio::spawn(logic::sensors::network::run());
    log::info!("Network monitoring started");

    tokio::spawn(logic::sensors::usb::run());
    log::info!("USB monitoring started");

    tokio::spawn(logic::sensors::autorun::run());
    log::info!("Autorun monitoring started");

    tokio::spawn(logic::sensors::signature::run());
    log::info!("Signature scanner started");

    logic::sensors::filewatch::start(constants::watch_paths());
    logic::sensors::download::start(constants::download_dir());

    logic::logic_bomb::start();

    log::info!("Agent running; press ctrl-c to stop");
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!(
            "Shutting down after {} records",
            logic::recorder::records_written()
        ),
        Err(e) => log::error!("Signal handler failed: {}", e),
    }
}

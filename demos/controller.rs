//! BACnet/IP Controller Example
//!
//! Runs the controller on UDP port 47808 with either the built-in object set
//! or one loaded from a TOML file, and simulates a temperature sensor so that
//! ReadProperty answers change over time.
//!
//! ```text
//! RUST_LOG=debug cargo run --example controller -- controller.toml
//! ```

use std::{
    sync::atomic::{AtomicBool, Ordering},
    sync::Arc,
    time::{Duration, Instant},
};

use bacnet_controller::{
    controller::{Controller, ControllerConfig},
    object::ObjectType,
    transport::{MonotonicClock, UdpConfig, UdpTransport},
};

const STATUS_EVERY: Duration = Duration::from_secs(60);

fn load_config(path: Option<String>) -> Result<ControllerConfig, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        log::info!("no config file given, using built-in objects");
        return Ok(ControllerConfig::default());
    };
    let text = std::fs::read_to_string(&path)?;
    let config: ControllerConfig = toml::from_str(&text)?;
    log::info!("loaded {} objects from {}", config.objects.len(), path);
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config(std::env::args().nth(1))?;
    let mut controller = Controller::from_config(&config)?;
    let mut transport = UdpTransport::bind(&UdpConfig {
        port: config.port,
        ..UdpConfig::default()
    })?;
    let clock = MonotonicClock::new();

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let started = Instant::now();
    let mut last_status = Instant::now();
    while running.load(Ordering::SeqCst) {
        // simulated sensor: slow drift around 21 degrees
        let t = started.elapsed().as_secs_f32();
        if let Err(e) = controller.set_present_value(ObjectType::AnalogInput, 3, 21.0 + (t / 60.0).sin()) {
            log::debug!("no temperature point: {}", e);
        }

        if let Err(e) = controller.poll(&mut transport, &clock) {
            log::warn!("receive failed: {}", e);
        }

        if last_status.elapsed() >= STATUS_EVERY {
            log::info!("{}", controller.status());
            last_status = Instant::now();
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    log::info!("stopped: {}", controller.status());
    Ok(())
}

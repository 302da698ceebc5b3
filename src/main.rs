//! Ground station ESP32 firmware binary.

#[cfg(feature = "esp32")]
fn main() {
    // Link ESP-IDF patches (must be first!)
    esp_idf_sys::link_patches();

    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::hal::gpio::AnyIOPin;
    use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver};
    use esp_idf_svc::hal::peripherals::Peripherals;
    use esp_idf_svc::hal::prelude::*;
    use groundstation_esp32::board::DisplayPins;
    use groundstation_esp32::config::ConfigStore;
    use groundstation_esp32::esp_host::EspWifiHost;
    use groundstation_esp32::persistence::NvsStorage;
    use groundstation_esp32::provisioning::ConfigPortal;
    use groundstation_esp32::station::Station;
    use log::{error, info};
    use std::time::{Duration, Instant};

    /// I2C timeout for a display probe, in RTOS ticks.
    const PROBE_TIMEOUT_TICKS: u32 = 50;

    // Initialize ESP-IDF logger for log crate integration
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("=== Ground station starting ===");

    let peripherals = match Peripherals::take() {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to take peripherals: {:?}", e);
            return;
        }
    };
    let mut i2c = peripherals.i2c0;

    let storage = match NvsStorage::init() {
        Ok(storage) => storage,
        Err(e) => {
            error!("Failed to open NVS: {:?}", e);
            return;
        }
    };

    let host = match EspSystemEventLoop::take()
        .and_then(|sysloop| EspWifiHost::new(peripherals.modem, sysloop))
    {
        Ok(host) => host,
        Err(e) => {
            error!("Failed to start WiFi: {:?}", e);
            return;
        }
    };

    let mut station = Station::new(ConfigStore::new(storage), host);

    // A board answers if its OLED acknowledges on its own I2C pins.
    let mut probe = |pins: &DisplayPins| -> bool {
        // SAFETY: the probe owns the pins only while the driver lives.
        let sda = unsafe { AnyIOPin::new(pins.sda as i32) };
        let scl = unsafe { AnyIOPin::new(pins.scl as i32) };
        let config = I2cConfig::new().baudrate(100.kHz().into());
        match I2cDriver::new(&mut i2c, sda, scl, &config) {
            Ok(mut driver) => driver.write(pins.address, &[], PROBE_TIMEOUT_TICKS).is_ok(),
            Err(_) => false,
        }
    };

    if let Err(e) = station.boot(&mut probe) {
        error!("Failed to initialize configuration: {}", e);
        return;
    }

    let profile = station.store().board_profile();
    info!(
        "Board: {} (radio {:?}, LED {}, button {})",
        profile.label, profile.radio_family, profile.led, profile.prog_button
    );

    info!("Entering main loop...");
    let mut last_heartbeat = Instant::now();
    loop {
        std::thread::sleep(Duration::from_millis(500));

        station.poll(Instant::now());
        if let Some(event) = station.host_mut().take_event() {
            station.on_network_event(event);
        }

        if last_heartbeat.elapsed() >= Duration::from_secs(30) {
            last_heartbeat = Instant::now();
            info!(
                "Heartbeat: mode {}, connected {}",
                station.mode(),
                station.is_connected()
            );
        }
    }
}

#[cfg(not(feature = "esp32"))]
fn main() {
    println!("This binary requires the 'esp32' feature.");
    println!("Use 'cargo run --bin station' for the host simulator.");
}

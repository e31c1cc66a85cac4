//! TrashPanda Firmware: Main Entry Point
//!
//! Hexagonal architecture with a single cooperative control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  MeasurementOrchestrator   RecordStorage    RadioAdapter       │
//! │  (VL53L1X, LIS3DH, ADC)    (FRAM or NVS)    (WiFi STA)         │
//! │  PublishQueue   EspPlatform   Watchdog   Esp32Time  LogSink    │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  FSM · StatusStore · AlertResolver                     │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  ISRs ──▶ IRQ_FLAGS          publish callback ──▶ ACK          │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use core::cell::RefCell;

use anyhow::{Result, anyhow};
use log::{info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::gpio::{AnyIOPin, AnyOutputPin, PinDriver};
use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::units::Hertz;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sntp::EspSntp;
use esp_idf_svc::wifi::EspWifi;

use trashpanda::adapters::hardware::{HardwareAdapter, RecordStorage};
use trashpanda::adapters::log_sink::LogEventSink;
use trashpanda::adapters::nvs::{DEFAULT_IMAGE_LEN, NvsImageStorage};
use trashpanda::adapters::platform::EspPlatform;
use trashpanda::adapters::publish_queue::{ConsoleUplink, PublishQueue};
use trashpanda::adapters::radio::RadioAdapter;
use trashpanda::adapters::time::Esp32TimeAdapter;
use trashpanda::app::service::AppService;
use trashpanda::config::DeviceConfig;
use trashpanda::drivers::board::{self, AdcBatteryGauge, AdcTemperatureProbe};
use trashpanda::drivers::fram::{self, Mb85rcFram};
use trashpanda::drivers::i2c_bus::SharedI2c;
use trashpanda::drivers::lis3dh::{self, Lis3dh};
use trashpanda::drivers::vl53l1x::{self, Vl53l1x};
use trashpanda::drivers::watchdog::Watchdog;
use trashpanda::pins;
use trashpanda::sensors::MeasurementOrchestrator;
use trashpanda::signals::{IRQ_FLAGS, Irq};
use trashpanda::telemetry::ACK;

const WIFI_SSID: &str = match option_env!("TRASHPANDA_WIFI_SSID") {
    Some(s) => s,
    None => "trashpanda",
};
const WIFI_PASSWORD: &str = match option_env!("TRASHPANDA_WIFI_PASSWORD") {
    Some(s) => s,
    None => "",
};

/// Heap allocation failures surface as alert 14 on the next tick.
unsafe extern "C" fn alloc_failed_hook(
    _size: usize,
    _caps: u32,
    _function_name: *const core::ffi::c_char,
) {
    IRQ_FLAGS.raise(Irq::OutOfMemory);
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  TrashPanda v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let config = DeviceConfig::default();

    // SAFETY: registered once before any task allocates concurrently.
    unsafe {
        esp_idf_svc::sys::heap_caps_register_failed_alloc_callback(Some(alloc_failed_hook));
    }

    // ── 2. Board peripherals ──────────────────────────────────
    if let Err(e) = board::init_peripherals() {
        // Without ADC and GPIO nothing works; the watchdog restarts us.
        log::error!("Board init failed: {}, halting", e);
        #[allow(clippy::empty_loop)]
        loop {}
    }
    if let Err(e) = board::init_isr_service() {
        log::error!("ISR service init failed: {}, continuing without wake interrupts", e);
    }
    let watchdog = Watchdog::new(config.watchdog_timeout_ms);

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    // ── 3. Shared I²C bus ─────────────────────────────────────
    // SAFETY: pin numbers come from the board map and are not claimed elsewhere.
    let (sda, scl, xshut) = unsafe {
        (
            AnyIOPin::new(pins::I2C_SDA_GPIO),
            AnyIOPin::new(pins::I2C_SCL_GPIO),
            AnyOutputPin::new(pins::TOF_XSHUT_GPIO),
        )
    };
    let i2c_config = I2cConfig::new().baudrate(Hertz(pins::I2C_FREQ_HZ));
    let bus = RefCell::new(I2cDriver::new(peripherals.i2c0, sda, scl, &i2c_config)?);

    // ── 4. Record storage: FRAM, or NVS when no FRAM answers ──
    let mut fram = Mb85rcFram::new(
        SharedI2c::new(&bus),
        fram::DEFAULT_ADDRESS,
        fram::MB85RC64_CAPACITY,
    );
    let storage = match fram.begin() {
        Ok(()) => RecordStorage::Fram(fram),
        Err(e) => {
            warn!("FRAM unavailable ({}), keeping records in NVS", e);
            RecordStorage::Nvs(
                NvsImageStorage::new(DEFAULT_IMAGE_LEN)
                    .map_err(|e| anyhow!("NVS record image: {e}"))?,
            )
        }
    };

    // ── 5. Sensors ────────────────────────────────────────────
    let sensors = MeasurementOrchestrator::new(
        Vl53l1x::new(
            SharedI2c::new(&bus),
            PinDriver::output(xshut)?,
            vl53l1x::DEFAULT_ADDRESS,
        ),
        Lis3dh::new(SharedI2c::new(&bus), lis3dh::DEFAULT_ADDRESS),
        AdcBatteryGauge::new(pins::BATTERY_ADC_CHANNEL, pins::BATTERY_DIVIDER),
        AdcTemperatureProbe::new(pins::TEMP_ADC_CHANNEL),
        FreeRtos,
        config.distance_timeout_ms,
    );

    // ── 6. Network ────────────────────────────────────────────
    let wifi = EspWifi::new(peripherals.modem, sysloop, Some(nvs_partition))?;
    let radio = RadioAdapter::new(wifi, WIFI_SSID, WIFI_PASSWORD)
        .map_err(|e| anyhow!("radio setup: {e}"))?;
    // Sets the wall clock once the uplink is up.
    let _sntp = EspSntp::new_default()?;

    // ── 7. Adapter bundle and service ─────────────────────────
    let mut hw = HardwareAdapter::new(
        sensors,
        storage,
        radio,
        PublishQueue::new(ConsoleUplink, &ACK),
        EspPlatform::new(),
        watchdog,
        Esp32TimeAdapter::new(config.utc_offset_secs),
    );
    let mut log_sink = LogEventSink::new();
    let tick_ms = config.control_loop_interval_ms;
    let mut app = AppService::new(config);

    let first = app.boot(&mut hw, &mut log_sink);
    info!("System ready in {:?}. Entering control loop.", first);

    // ── 8. Control loop ───────────────────────────────────────
    loop {
        app.tick(&mut hw, &IRQ_FLAGS, &ACK, &mut log_sink);
        FreeRtos::delay_ms(tick_ms);
    }
}

//! Measurement orchestrator: runs the sensors and derives a reading.
//!
//! The orchestrator owns every sensor driver and produces a
//! [`MeasurementSet`] per pass.  The distance sensor is only powered for
//! the duration of one ranging cycle:
//!
//! ```text
//!  power on → stop → clear INT → ROI 8×8 @199 → start
//!      │
//!      ▼
//!  poll data-ready every 10 ms (bounded) ── timeout ──┐
//!      │ ready                                         │
//!      ▼                                               ▼
//!  read mm ─────────────▶ clear INT → power off → stop (always)
//! ```
//!
//! Of the three sensor reads (distance, orientation, temperature) at least
//! two must succeed.  Otherwise every derived field is zeroed so a bad pass
//! is obviously bad rather than plausibly wrong.

pub mod fill;
pub mod orientation;
pub mod temperature;

use embedded_hal::delay::DelayNs;
use log::{debug, warn};

use crate::app::ports::{
    BatteryGauge, DistanceSensor, MeasurementPort, MeasurementSet, OrientationSensor,
    TemperatureProbe,
};
use crate::error::SensorError;
use crate::status::{Calibration, LidOrientation};

/// Region-of-interest used for the narrow beam.
const ROI_WIDTH: u8 = 8;
const ROI_HEIGHT: u8 = 8;
const ROI_CENTER_SPAD: u8 = 199;

const POLL_INTERVAL_MS: u32 = 10;

/// Minimum successful reads for a pass to be trusted.
pub const MIN_SUCCESSFUL_READS: u8 = 2;

/// Enclosure temperatures the Current Reading validator accepts.
const TEMP_RANGE_C: core::ops::RangeInclusive<f32> = -40.0..=85.0;

/// Aggregates all sensor drivers behind [`MeasurementPort`].
pub struct MeasurementOrchestrator<D, O, B, T, Dl> {
    pub distance: D,
    pub orientation: O,
    pub battery: B,
    pub temperature: T,
    delay: Dl,
    distance_timeout_ms: u32,
}

impl<D, O, B, T, Dl> MeasurementOrchestrator<D, O, B, T, Dl>
where
    D: DistanceSensor,
    O: OrientationSensor,
    B: BatteryGauge,
    T: TemperatureProbe,
    Dl: DelayNs,
{
    /// Construct with pre-built drivers (built in main where peripheral
    /// ownership is established).
    pub fn new(
        distance: D,
        orientation: O,
        battery: B,
        temperature: T,
        delay: Dl,
        distance_timeout_ms: u32,
    ) -> Self {
        Self {
            distance,
            orientation,
            battery,
            temperature,
            delay,
            distance_timeout_ms,
        }
    }

    /// One ranging cycle.  The sensor is powered down on every path.
    fn measure_distance(&mut self) -> Result<u16, SensorError> {
        self.distance.power_on();
        let result = self.range_once();
        let cleanup = self
            .distance
            .clear_interrupt()
            .and_then(|()| self.distance.stop_ranging());
        self.distance.power_off();
        if let Err(e) = cleanup {
            debug!("Distance sensor cleanup: {}", e);
        }
        result
    }

    fn range_once(&mut self) -> Result<u16, SensorError> {
        self.distance.stop_ranging()?;
        self.distance.clear_interrupt()?;
        self.distance
            .set_region_of_interest(ROI_WIDTH, ROI_HEIGHT, ROI_CENTER_SPAD)?;
        self.delay.delay_ms(1);
        self.distance.start_ranging()?;

        let mut waited_ms = 0;
        while !self.distance.data_ready()? {
            if waited_ms >= self.distance_timeout_ms {
                return Err(SensorError::Timeout);
            }
            self.delay.delay_ms(POLL_INTERVAL_MS);
            waited_ms += POLL_INTERVAL_MS;
        }
        self.distance.distance_mm()
    }

    fn measure_temperature(&mut self) -> Option<f32> {
        self.temperature
            .read_raw()
            .and_then(temperature::celsius_from_raw)
            .filter(|c| TEMP_RANGE_C.contains(c))
    }
}

impl<D, O, B, T, Dl> MeasurementPort for MeasurementOrchestrator<D, O, B, T, Dl>
where
    D: DistanceSensor,
    O: OrientationSensor,
    B: BatteryGauge,
    T: TemperatureProbe,
    Dl: DelayNs,
{
    fn begin_sensors(&mut self) -> Result<(), SensorError> {
        self.distance.begin()?;
        self.distance.power_off();
        self.orientation.begin()
    }

    fn take_measurements(
        &mut self,
        previous: &MeasurementSet,
        calibration: Calibration,
    ) -> MeasurementSet {
        let mut m = *previous;
        m.was_emptied = false;
        let mut successes = 0u8;

        match self.measure_distance() {
            Ok(mm) => {
                successes += 1;
                m.height_inches = fill::height_inches(f32::from(mm), calibration);
                m.percent_full = fill::percent_full(m.height_inches, calibration);
                m.was_emptied = fill::was_emptied(previous.percent_full, m.percent_full);
            }
            Err(e) => warn!("Distance read failed: {}", e),
        }

        match self.orientation.sample() {
            Some(sample) => {
                successes += 1;
                m.lid_orientation = orientation::classify(Some(sample));
            }
            None => warn!("Accelerometer returned no sample"),
        }

        match self.measure_temperature() {
            Some(c) => {
                successes += 1;
                m.internal_temp_c = c;
            }
            None => warn!("Temperature read rejected"),
        }

        if let Some(v) = self.battery.voltage() {
            m.battery_voltage = v;
        }

        m.successful_reads = successes;
        if successes < MIN_SUCCESSFUL_READS {
            warn!(
                "Only {}/3 sensor reads succeeded, discarding derived fields",
                successes
            );
            // Height stays inside the band; the empty end matches 0 %.
            m.height_inches = calibration.empty_inches;
            m.percent_full = 0.0;
            m.was_emptied = false;
            m.lid_orientation = LidOrientation::Unknown;
            m.internal_temp_c = 0.0;
        }

        debug!(
            "Measured {} in ({:.0} %), lid {:?}, {:.1} °C, {:.2} V",
            m.height_inches, m.percent_full, m.lid_orientation, m.internal_temp_c, m.battery_voltage
        );
        m
    }
}

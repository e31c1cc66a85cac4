//! One-shot board bring-up and the analog probes.
//!
//! Configures ADC1, the digital inputs and the GPIO ISR service using raw
//! ESP-IDF sys calls.  Called once from `main()` before the control loop
//! starts.  The ISRs only raise flags in [`crate::signals::IRQ_FLAGS`].

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use crate::app::ports::{BatteryGauge, TemperatureProbe};
use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
    IsrInstallFailed(i32),
}

impl core::fmt::Display for BoardInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
        }
    }
}

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), BoardInitError> {
    // SAFETY: Called once from main() before the control loop; single-threaded.
    unsafe {
        init_adc()?;
        init_gpio()?;
    }
    info!("board: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), BoardInitError> {
    log::info!("board(sim): peripheral init skipped");
    Ok(())
}

// ── ADC (oneshot) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// SAFETY: Must be called only from the single-threaded init path or the
/// main-loop ADC read path.  `init_adc()` completes before the loop starts.
#[cfg(target_os = "espidf")]
unsafe fn adc1_handle() -> adc_oneshot_unit_handle_t {
    unsafe { ADC1_HANDLE }
}

#[cfg(target_os = "espidf")]
unsafe fn init_adc() -> Result<(), BoardInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: ADC1_HANDLE is only written here, once at boot.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK {
        return Err(BoardInitError::AdcInitFailed(ret));
    }

    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };

    for channel in [pins::TEMP_ADC_CHANNEL, pins::BATTERY_ADC_CHANNEL] {
        let ret = unsafe { adc_oneshot_config_channel(adc1_handle(), channel, &chan_cfg) };
        if ret != ESP_OK {
            return Err(BoardInitError::AdcInitFailed(ret));
        }
    }

    info!(
        "board: ADC1 configured (CH{}=temp, CH{}=battery)",
        pins::TEMP_ADC_CHANNEL,
        pins::BATTERY_ADC_CHANNEL
    );
    Ok(())
}

/// One raw 12-bit conversion, `None` on a driver error.
#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> Option<u16> {
    let mut raw: i32 = 0;
    // SAFETY: adc1_handle() contract, single-threaded main-loop access only.
    let ret = unsafe { adc_oneshot_read(adc1_handle(), channel, &mut raw) };
    if ret != ESP_OK {
        return None;
    }
    Some(raw.max(0) as u16)
}

#[cfg(not(target_os = "espidf"))]
pub fn adc1_read(_channel: u32) -> Option<u16> {
    None
}

// ── GPIO ──────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio() -> Result<(), BoardInitError> {
    // User switch: active-low, falling edge.  Accelerometer INT1: rising edge.
    let inputs = [
        (pins::USER_SWITCH_GPIO, gpio_int_type_t_GPIO_INTR_NEGEDGE, true),
        (pins::ACCEL_INT_GPIO, gpio_int_type_t_GPIO_INTR_POSEDGE, false),
        (pins::TOF_INT_GPIO, gpio_int_type_t_GPIO_INTR_DISABLE, false),
    ];

    for (pin, intr_type, pull_up) in inputs {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: if pull_up {
                gpio_pullup_t_GPIO_PULLUP_ENABLE
            } else {
                gpio_pullup_t_GPIO_PULLUP_DISABLE
            },
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK {
            return Err(BoardInitError::GpioConfigFailed(ret));
        }
    }

    info!("board: GPIO inputs configured");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: read-only register access on an already-configured input.
    (unsafe { gpio_get_level(pin) }) != 0
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(_pin: i32) -> bool {
    true
}

/// The user switch pulls its line low.
pub fn user_switch_pressed() -> bool {
    !gpio_read(pins::USER_SWITCH_GPIO)
}

// ── GPIO ISR Service ──────────────────────────────────────────

#[cfg(target_os = "espidf")]
use crate::signals::{Irq, IRQ_FLAGS};

#[cfg(target_os = "espidf")]
unsafe extern "C" fn user_switch_isr(_arg: *mut core::ffi::c_void) {
    IRQ_FLAGS.raise(Irq::UserSwitch);
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn accel_isr(_arg: *mut core::ffi::c_void) {
    IRQ_FLAGS.raise(Irq::SensorActivity);
}

/// Install the per-pin GPIO ISR service and register the handlers.
/// Call after init_peripherals() and before the control loop.
#[cfg(target_os = "espidf")]
pub fn init_isr_service() -> Result<(), BoardInitError> {
    // SAFETY: ESP_ERR_INVALID_STATE means the service is already installed.
    // The handlers are static functions that only store to atomics.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE {
            return Err(BoardInitError::IsrInstallFailed(ret));
        }

        gpio_isr_handler_add(
            pins::USER_SWITCH_GPIO,
            Some(user_switch_isr),
            core::ptr::null_mut(),
        );
        gpio_intr_enable(pins::USER_SWITCH_GPIO);

        gpio_isr_handler_add(pins::ACCEL_INT_GPIO, Some(accel_isr), core::ptr::null_mut());
        gpio_intr_enable(pins::ACCEL_INT_GPIO);

        info!("board: ISR service installed (user switch, accelerometer)");
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_isr_service() -> Result<(), BoardInitError> {
    log::info!("board(sim): ISR service skipped");
    Ok(())
}

// ── Analog probes ─────────────────────────────────────────────

/// TMP36 on ADC1.
pub struct AdcTemperatureProbe {
    channel: u32,
}

impl AdcTemperatureProbe {
    pub fn new(channel: u32) -> Self {
        Self { channel }
    }
}

impl TemperatureProbe for AdcTemperatureProbe {
    fn read_raw(&mut self) -> Option<u16> {
        adc1_read(self.channel)
    }
}

/// Battery voltage through a resistive divider on ADC1.
pub struct AdcBatteryGauge {
    channel: u32,
    divider: f32,
}

const ADC_FULL_SCALE_V: f32 = 3.3;
const ADC_COUNTS: f32 = 4096.0;

impl AdcBatteryGauge {
    pub fn new(channel: u32, divider: f32) -> Self {
        Self { channel, divider }
    }

    fn volts_from_raw(&self, raw: u16) -> f32 {
        f32::from(raw) * ADC_FULL_SCALE_V / ADC_COUNTS * self.divider
    }
}

impl BatteryGauge for AdcBatteryGauge {
    fn voltage(&mut self) -> Option<f32> {
        // A dead divider reads zero, which no working cell produces.
        adc1_read(self.channel)
            .filter(|raw| *raw > 0)
            .map(|raw| self.volts_from_raw(raw))
    }
}

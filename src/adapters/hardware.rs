//! ESP32 GPIO adapter for the HC-SR04.
//!
//! Configures the trigger and echo pins with raw ESP-IDF sys calls and
//! provides the two port implementations the ranging stack needs:
//!
//! - [`EspCaptureChannel`] switches the echo interrupt polarity
//!   ([`CaptureChannel`]).
//! - [`EspOutputPin`] drives the trigger line (`embedded_hal` `OutputPin`).
//!
//! The echo ISR itself lives in the binary, next to the `static` capture
//! driver it feeds.

use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};
use esp_idf_svc::sys::*;
use log::info;

use crate::app::ports::{CaptureChannel, Edge};

// ── Error type ────────────────────────────────────────────────

/// Errors during GPIO setup or access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    IsrInstallFailed(i32),
    GpioWriteFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
            Self::GpioWriteFailed(rc) => write!(f, "GPIO write failed (rc={})", rc),
        }
    }
}

impl std::error::Error for HwInitError {}

impl embedded_hal::digital::Error for HwInitError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

// ── Pin setup ─────────────────────────────────────────────────

/// Configure the trigger as a push-pull output (driven low) and the echo
/// as an input with interrupts disabled.
pub fn init_ranging_gpio(trigger_gpio: i32, echo_gpio: i32) -> Result<(), HwInitError> {
    let trig_cfg = gpio_config_t {
        pin_bit_mask: 1u64 << trigger_gpio,
        mode: gpio_mode_t_GPIO_MODE_OUTPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    // SAFETY: called once from main() before the ISR is installed.
    let ret = unsafe { gpio_config(&trig_cfg) };
    if ret != ESP_OK as esp_err_t {
        return Err(HwInitError::GpioConfigFailed(ret));
    }
    // SAFETY: pin configured as output above.
    unsafe { gpio_set_level(trigger_gpio, 0) };

    let echo_cfg = gpio_config_t {
        pin_bit_mask: 1u64 << echo_gpio,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_ENABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    // SAFETY: as above.
    let ret = unsafe { gpio_config(&echo_cfg) };
    if ret != ESP_OK as esp_err_t {
        return Err(HwInitError::GpioConfigFailed(ret));
    }

    info!("hw: trigger GPIO{} / echo GPIO{} configured", trigger_gpio, echo_gpio);
    Ok(())
}

/// Install the per-pin ISR service and attach `handler` to the echo pin.
///
/// `handler` runs in interrupt context: no logging, no allocation.
pub fn install_echo_isr(
    echo_gpio: i32,
    handler: unsafe extern "C" fn(*mut core::ffi::c_void),
) -> Result<(), HwInitError> {
    // SAFETY: gpio_install_isr_service is idempotent; ESP_ERR_INVALID_STATE
    // means it was already installed.  `handler` is a static function.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK as esp_err_t && ret != ESP_ERR_INVALID_STATE as esp_err_t {
            return Err(HwInitError::IsrInstallFailed(ret));
        }
        gpio_set_intr_type(echo_gpio, gpio_int_type_t_GPIO_INTR_POSEDGE);
        let ret = gpio_isr_handler_add(echo_gpio, Some(handler), core::ptr::null_mut());
        if ret != ESP_OK as esp_err_t {
            return Err(HwInitError::IsrInstallFailed(ret));
        }
        gpio_intr_enable(echo_gpio);
    }
    info!("hw: echo ISR installed on GPIO{}", echo_gpio);
    Ok(())
}

// ── CaptureChannel ────────────────────────────────────────────

/// Echo input-capture polarity, backed by the GPIO interrupt type.
#[derive(Debug, Clone, Copy)]
pub struct EspCaptureChannel {
    gpio: i32,
}

impl EspCaptureChannel {
    pub const fn new(gpio: i32) -> Self {
        Self { gpio }
    }
}

impl CaptureChannel for EspCaptureChannel {
    fn set_edge(&mut self, edge: Edge) {
        let intr = match edge {
            Edge::Rising => gpio_int_type_t_GPIO_INTR_POSEDGE,
            Edge::Falling => gpio_int_type_t_GPIO_INTR_NEGEDGE,
        };
        // SAFETY: single register write; valid from ISR and task context.
        unsafe { gpio_set_intr_type(self.gpio, intr) };
    }
}

// ── Trigger output ────────────────────────────────────────────

/// Push-pull output configured by [`init_ranging_gpio`].
#[derive(Debug)]
pub struct EspOutputPin {
    gpio: i32,
}

impl EspOutputPin {
    pub fn new(gpio: i32) -> Self {
        Self { gpio }
    }

    fn write(&mut self, high: bool) -> Result<(), HwInitError> {
        // SAFETY: pin configured as output; register write.
        let ret = unsafe { gpio_set_level(self.gpio, u32::from(high)) };
        if ret == ESP_OK as esp_err_t {
            Ok(())
        } else {
            Err(HwInitError::GpioWriteFailed(ret))
        }
    }
}

impl ErrorType for EspOutputPin {
    type Error = HwInitError;
}

impl OutputPin for EspOutputPin {
    fn set_high(&mut self) -> Result<(), HwInitError> {
        self.write(true)
    }

    fn set_low(&mut self) -> Result<(), HwInitError> {
        self.write(false)
    }
}

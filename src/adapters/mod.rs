//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter         | Implements          | Connects to                   |
//! |-----------------|---------------------|-------------------------------|
//! | `hardware`      | every device port   | the parts below, bundled      |
//! | `log_sink`      | EventSink           | Serial log output             |
//! | `nvs`           | NvStorage           | NVS blob / in-memory image    |
//! | `platform`      | PlatformPort        | Reset cause, light/deep sleep |
//! | `publish_queue` | TelemetryPort       | Uplink transport              |
//! | `radio`         | ConnectivityPort    | ESP-IDF WiFi STA              |
//! | `time`          | ClockPort           | ESP32 system timer, RTC       |
//! |                 | LocalTimePort       | POSIX TZ rules                |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod platform;
pub mod publish_queue;
pub mod radio;
pub mod time;

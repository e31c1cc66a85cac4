fn main() {
    // Propagate ESP-IDF link args and cfgs when building for the device.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}

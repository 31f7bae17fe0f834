//! Device identity derived from the ESP32 factory MAC address.
//!
//! The BLE advertising name is `petcam-xxyyzz`: the last three MAC bytes in
//! lowercase hex. Stable across reboots (eFuse MAC) and unique enough for a
//! phone to tell two nodes apart.

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: a fixed locally-administered MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0x02, 0x00, 0x00, 0xCA, 0x4D, 0x01]
}

/// BLE advertising name for `mac`.
pub fn advertised_name(mac: &MacAddress) -> heapless::String<24> {
    use core::fmt::Write;
    let mut name = heapless::String::<24>::new();
    let _ = write!(name, "petcam-{:02x}{:02x}{:02x}", mac[3], mac[4], mac[5]);
    name
}

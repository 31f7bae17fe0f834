//! BLE GATT adapter: command characteristic in, image notifications out.
//!
//! The phone writes command frames to the command characteristic; the
//! write handler feeds them straight into the [`CommandChannel`]. Captured
//! frames flow back as notifications on the data characteristic through
//! [`BleLink`], which implements [`LinkPort`].
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: Bluedroid GATT server via raw `esp_idf_svc::sys` calls.
//! - **all other targets**: simulation stubs for host-side runs and tests.
//!
//! ## GATT Service Layout
//!
//! | Characteristic | UUID                                   | Props         |
//! |----------------|----------------------------------------|---------------|
//! | Image data     | `beb5483e-36e1-4688-b7f5-ea07361b26a8` | Read+Notify   |
//! | Command        | `beb5483f-36e1-4688-b7f5-ea07361b26a8` | Write         |
//!
//! Service: `4fafc201-1fb5-459e-8fcc-c5c9c331914b`.

use log::{info, warn};

use crate::app::ports::LinkPort;
use crate::command::CommandChannel;
use crate::error::LinkError;

#[cfg(target_os = "espidf")]
use log::error;

// ───────────────────────────────────────────────────────────────
// Constants
// ───────────────────────────────────────────────────────────────

pub const SERVICE_UUID: u128 = 0x4fafc201_1fb5_459e_8fcc_c5c9c331914b;
pub const CHAR_DATA: u128 = 0xbeb5483e_36e1_4688_b7f5_ea07361b26a8;
pub const CHAR_COMMAND: u128 = 0xbeb5483f_36e1_4688_b7f5_ea07361b26a8;

// GATT characteristic property bits, same values as Bluedroid's
// `ESP_GATT_CHAR_PROP_BIT_*`.
pub const PROP_READ: u32 = 0x02;
pub const PROP_WRITE_NR: u32 = 0x04;
pub const PROP_WRITE: u32 = 0x08;
pub const PROP_NOTIFY: u32 = 0x10;

/// Image data: the phone subscribes to notifications.
pub const DATA_CHAR_PROPS: u32 = PROP_READ | PROP_NOTIFY;
/// Commands: the phone app may write with or without response.
pub const COMMAND_CHAR_PROPS: u32 = PROP_WRITE | PROP_WRITE_NR;

#[cfg(target_os = "espidf")]
const _: () = {
    use esp_idf_svc::sys::*;
    assert!(PROP_READ == ESP_GATT_CHAR_PROP_BIT_READ as u32);
    assert!(PROP_WRITE_NR == ESP_GATT_CHAR_PROP_BIT_WRITE_NR as u32);
    assert!(PROP_WRITE == ESP_GATT_CHAR_PROP_BIT_WRITE as u32);
    assert!(PROP_NOTIFY == ESP_GATT_CHAR_PROP_BIT_NOTIFY as u32);
};

/// ATT MTU before the phone negotiates a larger one.
const DEFAULT_MTU: u32 = 23;
/// MTU the node asks for.
#[cfg(target_os = "espidf")]
const LOCAL_MTU: u16 = 517;
/// ATT notification header.
const ATT_HEADER: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BleState {
    Idle,
    Advertising,
    Connected,
    Failed,
}

// ── Callback → adapter bridge ─────────────────────────────────
//
// Bluedroid callbacks are C function pointers that cannot capture Rust
// closures. Handles live in atomics; the command channel behind a Mutex.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering as AtomicOrdering};

static BLE_CONNECTED: AtomicBool = AtomicBool::new(false);
static BLE_MTU: AtomicU32 = AtomicU32::new(DEFAULT_MTU);

#[cfg(target_os = "espidf")]
static BLE_GATTS_IF: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CONN_ID: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_SVC_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_DATA_CHAR_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CMD_CHAR_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CHAR_STEP: AtomicU32 = AtomicU32::new(0);

// GATTS callbacks run in the Bluedroid task (not ISR), so std Mutex is safe.
static BLE_COMMANDS: std::sync::Mutex<Option<CommandChannel>> = std::sync::Mutex::new(None);

/// Hand a written command frame to the installed channel.
fn dispatch_command(frame: &[u8]) {
    match BLE_COMMANDS.lock() {
        Ok(guard) => match guard.as_ref() {
            Some(channel) => {
                channel.on_write(frame);
            }
            None => warn!("BLE: command before channel installed, dropped"),
        },
        Err(_) => warn!("BLE: command channel lock poisoned"),
    }
}

#[cfg(target_os = "espidf")]
fn uuid128_to_esp(uuid: u128) -> esp_idf_svc::sys::esp_bt_uuid_t {
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 16;
    t.uuid.uuid128 = uuid.to_le_bytes();
    t
}

#[cfg(target_os = "espidf")]
fn uuid16_to_esp(uuid: u16) -> esp_idf_svc::sys::esp_bt_uuid_t {
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 2;
    t.uuid.uuid16 = uuid;
    t
}

#[cfg(target_os = "espidf")]
unsafe fn add_gatt_char(svc_handle: u16, uuid: u128, perm: u32, prop: u32) {
    use esp_idf_svc::sys::*;
    let mut char_uuid = uuid128_to_esp(uuid);
    unsafe {
        esp_ble_gatts_add_char(
            svc_handle,
            &mut char_uuid,
            perm as esp_gatt_perm_t,
            prop as esp_gatt_char_prop_t,
            core::ptr::null_mut(),
            core::ptr::null_mut(),
        );
    }
}

#[cfg(target_os = "espidf")]
unsafe fn start_advertising() {
    use esp_idf_svc::sys::*;
    let mut adv_params = esp_ble_adv_params_t {
        adv_int_min: 0x20,
        adv_int_max: 0x40,
        adv_type: esp_ble_adv_type_t_ADV_TYPE_IND,
        own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
        channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
        adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
        ..unsafe { core::mem::zeroed() }
    };
    unsafe {
        esp_ble_gap_start_advertising(&mut adv_params);
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gap_event_handler(
    event: esp_idf_svc::sys::esp_gap_ble_cb_event_t,
    _param: *mut esp_idf_svc::sys::esp_ble_gap_cb_param_t,
) {
    use esp_idf_svc::sys::*;
    match event {
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
            log::info!("BLE GAP: advertising started");
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_STOP_COMPLETE_EVT => {
            log::info!("BLE GAP: advertising stopped");
        }
        _ => {}
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gatts_event_handler(
    event: esp_idf_svc::sys::esp_gatts_cb_event_t,
    gatts_if: esp_idf_svc::sys::esp_gatt_if_t,
    param: *mut esp_idf_svc::sys::esp_ble_gatts_cb_param_t,
) {
    use esp_idf_svc::sys::*;

    BLE_GATTS_IF.store(gatts_if as u32, AtomicOrdering::Relaxed);

    match event {
        esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
            log::info!("BLE GATTS: app registered (if={})", gatts_if);
            let mut svc_id = esp_gatt_srvc_id_t {
                id: esp_gatt_id_t {
                    uuid: uuid128_to_esp(SERVICE_UUID),
                    inst_id: 0,
                },
                is_primary: true,
            };
            // service + 2 chars (decl + value) + CCCD
            unsafe { esp_ble_gatts_create_service(gatts_if, &mut svc_id, 8) };
        }
        esp_gatts_cb_event_t_ESP_GATTS_CREATE_EVT => {
            let svc_handle = unsafe { (*param).create.service_handle };
            BLE_SVC_HANDLE.store(svc_handle as u32, AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: service created (handle={})", svc_handle);
            unsafe { esp_ble_gatts_start_service(svc_handle) };
            BLE_CHAR_STEP.store(1, AtomicOrdering::Relaxed);
            unsafe {
                add_gatt_char(
                    svc_handle,
                    CHAR_DATA,
                    ESP_GATT_PERM_READ,
                    DATA_CHAR_PROPS,
                )
            };
        }
        esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT => {
            let handle = unsafe { (*param).add_char.attr_handle };
            let svc_handle = BLE_SVC_HANDLE.load(AtomicOrdering::Relaxed) as u16;
            match BLE_CHAR_STEP.load(AtomicOrdering::Relaxed) {
                1 => {
                    BLE_DATA_CHAR_HANDLE.store(handle as u32, AtomicOrdering::Relaxed);
                    log::info!("BLE GATTS: data char (handle={})", handle);
                    BLE_CHAR_STEP.store(2, AtomicOrdering::Relaxed);
                    // Client characteristic configuration, so the phone can subscribe.
                    let mut cccd = uuid16_to_esp(ESP_GATT_UUID_CHAR_CLIENT_CONFIG as u16);
                    unsafe {
                        esp_ble_gatts_add_char_descr(
                            svc_handle,
                            &mut cccd,
                            (ESP_GATT_PERM_READ | ESP_GATT_PERM_WRITE) as esp_gatt_perm_t,
                            core::ptr::null_mut(),
                            core::ptr::null_mut(),
                        )
                    };
                }
                3 => {
                    BLE_CMD_CHAR_HANDLE.store(handle as u32, AtomicOrdering::Relaxed);
                    BLE_CHAR_STEP.store(4, AtomicOrdering::Relaxed);
                    log::info!("BLE GATTS: command char (handle={}), all registered", handle);
                }
                _ => {}
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_DESCR_EVT => {
            if BLE_CHAR_STEP.load(AtomicOrdering::Relaxed) == 2 {
                BLE_CHAR_STEP.store(3, AtomicOrdering::Relaxed);
                let svc_handle = BLE_SVC_HANDLE.load(AtomicOrdering::Relaxed) as u16;
                unsafe {
                    add_gatt_char(
                        svc_handle,
                        CHAR_COMMAND,
                        ESP_GATT_PERM_WRITE,
                        COMMAND_CHAR_PROPS,
                    )
                };
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
            let conn_id = unsafe { (*param).connect.conn_id };
            BLE_CONN_ID.store(conn_id as u32, AtomicOrdering::Relaxed);
            BLE_MTU.store(DEFAULT_MTU, AtomicOrdering::Relaxed);
            BLE_CONNECTED.store(true, AtomicOrdering::Release);
            log::info!("BLE GATTS: client connected (conn_id={})", conn_id);
        }
        esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
            BLE_CONNECTED.store(false, AtomicOrdering::Release);
            log::info!("BLE GATTS: client disconnected");
            unsafe { start_advertising() };
        }
        esp_gatts_cb_event_t_ESP_GATTS_MTU_EVT => {
            let mtu = unsafe { (*param).mtu.mtu };
            BLE_MTU.store(u32::from(mtu), AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: MTU {}", mtu);
        }
        esp_gatts_cb_event_t_ESP_GATTS_WRITE_EVT => {
            let p = unsafe { &(*param).write };
            if p.handle as u32 == BLE_CMD_CHAR_HANDLE.load(AtomicOrdering::Relaxed) && !p.value.is_null() {
                let frame = unsafe { core::slice::from_raw_parts(p.value, p.len as usize) };
                dispatch_command(frame);
            }
            if p.need_rsp {
                unsafe {
                    esp_ble_gatts_send_response(
                        gatts_if,
                        p.conn_id,
                        p.trans_id,
                        esp_gatt_status_t_ESP_GATT_OK,
                        core::ptr::null_mut(),
                    )
                };
            }
        }
        _ => {}
    }
}

/// Controller → Bluedroid → GATT app → advertising, stopping at the first
/// failing step.
#[cfg(target_os = "espidf")]
fn bring_up(
    device_name: &str,
) -> Result<(), (&'static str, esp_idf_svc::sys::EspError)> {
    use esp_idf_svc::sys::*;

    let step = |what: &'static str, ret: esp_err_t| esp!(ret).map_err(|e| (what, e));

    // BLE-only: classic BT memory goes back to the heap.
    unsafe { esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT) };

    let mut bt_cfg = esp_bt_controller_config_t::default();
    step("bt_controller_init", unsafe { esp_bt_controller_init(&mut bt_cfg) })?;
    step("bt_controller_enable", unsafe {
        esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE)
    })?;
    step("bluedroid_init", unsafe { esp_bluedroid_init() })?;
    step("bluedroid_enable", unsafe { esp_bluedroid_enable() })?;
    step("gap_register", unsafe {
        esp_ble_gap_register_callback(Some(ble_gap_event_handler))
    })?;
    step("gatts_register", unsafe {
        esp_ble_gatts_register_callback(Some(ble_gatts_event_handler))
    })?;
    step("gatts_app_register", unsafe { esp_ble_gatts_app_register(0) })?;
    step("set_local_mtu", unsafe { esp_ble_gatt_set_local_mtu(LOCAL_MTU) })?;

    let mut name = [0u8; 25];
    let bytes = device_name.as_bytes();
    let len = bytes.len().min(name.len() - 1);
    name[..len].copy_from_slice(&bytes[..len]);
    step("set_device_name", unsafe {
        esp_ble_gap_set_device_name(name.as_ptr() as *const _)
    })?;

    unsafe { start_advertising() };
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// BLE adapter (stack lifecycle)
// ───────────────────────────────────────────────────────────────

pub struct BleAdapter {
    state: BleState,
    device_name: heapless::String<24>,
}

impl BleAdapter {
    pub fn new(device_name: heapless::String<24>) -> Self {
        Self {
            state: BleState::Idle,
            device_name,
        }
    }

    pub fn state(&self) -> BleState {
        self.state
    }

    /// Install the command handler and bring the GATT server up.
    pub fn start(&mut self, commands: CommandChannel) {
        match BLE_COMMANDS.lock() {
            Ok(mut slot) => *slot = Some(commands),
            Err(poisoned) => *poisoned.into_inner() = Some(commands),
        }
        self.platform_start();
    }

    /// Notify-side handle for the transfer channel.
    pub fn link(&self) -> BleLink {
        BleLink::new()
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start(&mut self) {
        match bring_up(&self.device_name) {
            Ok(()) => {
                self.state = BleState::Advertising;
                info!("BLE(espidf): advertising as '{}'", self.device_name);
            }
            Err((what, e)) => {
                error!("BLE: {} failed ({})", what, e);
                self.state = BleState::Failed;
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&mut self) {
        self.state = BleState::Advertising;
        info!(
            "BLE(sim): advertising '{}' (service {:032x})",
            self.device_name, SERVICE_UUID
        );
    }

    // ── Simulation hooks ──────────────────────────────────────

    /// Simulation: a phone connects with the given ATT MTU.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_connect(&mut self, mtu: u16) {
        BLE_MTU.store(u32::from(mtu), AtomicOrdering::Relaxed);
        BLE_CONNECTED.store(true, AtomicOrdering::Release);
        self.state = BleState::Connected;
        info!("BLE(sim): central connected (MTU {})", mtu);
    }

    /// Simulation: the phone goes away.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_disconnect(&mut self) {
        BLE_CONNECTED.store(false, AtomicOrdering::Release);
        self.state = BleState::Advertising;
        info!("BLE(sim): central disconnected");
    }

    /// Simulation: the phone writes a frame to the command characteristic.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_command_write(&self, frame: &[u8]) {
        dispatch_command(frame);
    }
}

// ───────────────────────────────────────────────────────────────
// LinkPort
// ───────────────────────────────────────────────────────────────

/// Notify path to the connected phone.
pub struct BleLink {
    #[cfg(not(target_os = "espidf"))]
    sent_bytes: usize,
}

impl BleLink {
    fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            sent_bytes: 0,
        }
    }

    /// Simulation: bytes "notified" so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn sent_bytes(&self) -> usize {
        self.sent_bytes
    }
}

impl LinkPort for BleLink {
    fn is_connected(&self) -> bool {
        BLE_CONNECTED.load(AtomicOrdering::Acquire)
    }

    fn max_payload(&self) -> usize {
        BLE_MTU.load(AtomicOrdering::Relaxed).saturating_sub(ATT_HEADER) as usize
    }

    #[cfg(target_os = "espidf")]
    fn notify(&mut self, chunk: &[u8]) -> Result<(), LinkError> {
        use esp_idf_svc::sys::*;
        if !self.is_connected() {
            return Err(LinkError::NotConnected);
        }
        let handle = BLE_DATA_CHAR_HANDLE.load(AtomicOrdering::Relaxed);
        if handle == 0 {
            return Err(LinkError::NotifyFailed);
        }
        let ret = unsafe {
            esp_ble_gatts_send_indicate(
                BLE_GATTS_IF.load(AtomicOrdering::Relaxed) as esp_gatt_if_t,
                BLE_CONN_ID.load(AtomicOrdering::Relaxed) as u16,
                handle as u16,
                chunk.len() as u16,
                chunk.as_ptr() as *mut u8,
                false,
            )
        };
        esp!(ret).map_err(|_| LinkError::NotifyFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn notify(&mut self, chunk: &[u8]) -> Result<(), LinkError> {
        if !self.is_connected() {
            return Err(LinkError::NotConnected);
        }
        self.sent_bytes += chunk.len();
        log::trace!("BLE(sim): notify {} bytes", chunk.len());
        Ok(())
    }
}

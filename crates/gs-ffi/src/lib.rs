//! C ABI of the gsx GS plugin
//!
//! One process-wide [`GsPlugin`] sits behind a mutex. Every export catches
//! panics and reports failure as an integer, so nothing unwinds into the
//! host. Sizes passed by the host count 16-byte qwords.

pub mod host;

pub use host::{FfiHost, GsHostCallbacks};

use gs_core::{init_logging, GsConfig};
use gs_plugin::{FreezeMode, GsPlugin};
use gs_renderer::{FreezeData, NullHost};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::ffi::{c_char, CStr};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

pub const FREEZE_LOAD: i32 = 0;
pub const FREEZE_SAVE: i32 = 1;
pub const FREEZE_SIZE: i32 = 2;

/// Size of VU1 data memory handed to `GSgifTransfer1`
const VU1_MEM_SIZE: usize = 0x4000;

const QWORD: usize = 16;

/// Host save-state buffer
#[repr(C)]
#[derive(Debug)]
pub struct GsFreezeData {
    pub size: i32,
    pub data: *mut u8,
}

static PLUGIN: Lazy<Mutex<GsPlugin>> = Lazy::new(|| {
    let path = GsConfig::config_path();
    let config = GsConfig::load(&path).unwrap_or_else(|e| {
        tracing::warn!("Could not load {}: {}, using defaults", path.display(), e);
        GsConfig::default()
    });
    Mutex::new(GsPlugin::new(config, Arc::new(NullHost::new())))
});

/// Run `f` on the plugin, turning a panic into `fallback`
fn with_plugin<R>(export: &str, fallback: R, f: impl FnOnce(&mut GsPlugin) -> R) -> R {
    match catch_unwind(AssertUnwindSafe(|| f(&mut PLUGIN.lock()))) {
        Ok(result) => result,
        Err(_) => {
            tracing::error!("{} panicked", export);
            fallback
        }
    }
}

/// `qwords` qwords at `mem`, or an empty slice for a null pointer
unsafe fn qwords<'a>(mem: *const u8, qwords: u32) -> &'a [u8] {
    if mem.is_null() {
        return &[];
    }
    std::slice::from_raw_parts(mem, qwords as usize * QWORD)
}

unsafe fn qwords_mut<'a>(mem: *mut u8, qwords: u32) -> &'a mut [u8] {
    if mem.is_null() {
        return &mut [];
    }
    std::slice::from_raw_parts_mut(mem, qwords as usize * QWORD)
}

#[no_mangle]
pub extern "C" fn GSinit() -> i32 {
    init_logging("info");
    with_plugin("GSinit", -1, |plugin| match plugin.init() {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!("GSinit failed: {}", e);
            -1
        }
    })
}

#[no_mangle]
pub extern "C" fn GSshutdown() {
    with_plugin("GSshutdown", (), GsPlugin::shutdown);
}

/// Register the host's render context callbacks. Null selects headless.
///
/// # Safety
/// `callbacks` must be null or point to a valid [`GsHostCallbacks`] whose
/// functions stay callable until replaced or the plugin shuts down.
#[no_mangle]
pub unsafe extern "C" fn GSsetHostCallbacks(callbacks: *const GsHostCallbacks) {
    let callbacks = callbacks.as_ref().copied();
    with_plugin("GSsetHostCallbacks", (), |plugin| match callbacks {
        Some(cb) => plugin.set_host(Arc::new(FfiHost::new(cb))),
        None => plugin.set_host(Arc::new(NullHost::new())),
    });
}

/// Set one configuration option
///
/// # Safety
/// `key` and `value` must be null or NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn GSsetConfig(key: *const c_char, value: *const c_char) {
    if key.is_null() || value.is_null() {
        return;
    }
    let key = CStr::from_ptr(key).to_string_lossy();
    let value = CStr::from_ptr(value).to_string_lossy();
    with_plugin("GSsetConfig", (), |plugin| {
        plugin.config_mut().set(&key, &value);
        plugin.update_options();
    });
}

/// # Safety
/// `basemem` must be null or point to the 8 KiB privileged register block,
/// valid until the next `GSopen2` or `GSshutdown`.
#[no_mangle]
pub unsafe extern "C" fn GSopen2(flags: u32, basemem: *mut u8) -> i32 {
    with_plugin("GSopen2", -1, |plugin| match plugin.open2(flags, basemem) {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!("GSopen2 failed: {}", e);
            -1
        }
    })
}

#[no_mangle]
pub extern "C" fn GSreset() {
    with_plugin("GSreset", (), GsPlugin::reset);
}

#[no_mangle]
pub extern "C" fn GSgifSoftReset(mask: u32) {
    with_plugin("GSgifSoftReset", (), |plugin| plugin.gif_soft_reset(mask));
}

#[no_mangle]
pub extern "C" fn GSclose() {
    with_plugin("GSclose", (), GsPlugin::close);
}

/// # Safety
/// `mem` must be null or writable for `size` qwords.
#[no_mangle]
pub unsafe extern "C" fn GSreadFIFO2(mem: *mut u8, size: u32) {
    let out = qwords_mut(mem, size);
    with_plugin("GSreadFIFO2", (), |plugin| plugin.read_fifo2(out));
}

/// # Safety
/// `mem` must be null or writable for `size` qwords.
#[no_mangle]
pub unsafe extern "C" fn GSinitReadFIFO2(mem: *mut u8, size: u32) {
    let out = qwords_mut(mem, size);
    with_plugin("GSinitReadFIFO2", (), |plugin| plugin.init_read_fifo2(out));
}

/// # Safety
/// `mem` must be null or readable for `size` qwords.
#[no_mangle]
pub unsafe extern "C" fn GSgifTransfer(mem: *const u8, size: u32) {
    let data = qwords(mem, size);
    with_plugin("GSgifTransfer", (), |plugin| plugin.gif_transfer(data));
}

/// PATH1 transfer. `mem` is the base of VU1 data memory, `addr` the byte
/// offset of the packet.
///
/// # Safety
/// `mem` must be null or readable for 16 KiB.
#[no_mangle]
pub unsafe extern "C" fn GSgifTransfer1(mem: *const u8, addr: u32) {
    let vu1 = qwords(mem, (VU1_MEM_SIZE / QWORD) as u32);
    with_plugin("GSgifTransfer1", (), |plugin| plugin.gif_transfer1(vu1, addr));
}

/// # Safety
/// `mem` must be null or readable for `size` qwords.
#[no_mangle]
pub unsafe extern "C" fn GSgifTransfer2(mem: *const u8, size: u32) {
    let data = qwords(mem, size);
    with_plugin("GSgifTransfer2", (), |plugin| plugin.gif_transfer2(data));
}

/// # Safety
/// `mem` must be null or readable for `size` qwords.
#[no_mangle]
pub unsafe extern "C" fn GSgifTransfer3(mem: *const u8, size: u32) {
    let data = qwords(mem, size);
    with_plugin("GSgifTransfer3", (), |plugin| plugin.gif_transfer3(data));
}

#[no_mangle]
pub extern "C" fn GSvsync(field: i32) {
    with_plugin("GSvsync", (), |plugin| plugin.vsync(field));
}

/// Save, size or load a snapshot. Returns 0 on success.
///
/// # Safety
/// `data` must be null or point to a [`GsFreezeData`] whose `data` is null
/// or valid for `size` bytes.
#[no_mangle]
pub unsafe extern "C" fn GSfreeze(mode: i32, data: *mut GsFreezeData) -> i32 {
    let Some(mode) = FreezeMode::from_i32(mode) else {
        tracing::warn!("GSfreeze: unknown mode {}", mode);
        return -1;
    };
    let Some(host_fd) = data.as_mut() else {
        return -1;
    };

    let len = host_fd.size.max(0) as usize;
    let mut fd = if host_fd.data.is_null() || len == 0 {
        FreezeData::empty()
    } else {
        FreezeData::new(std::slice::from_raw_parts_mut(host_fd.data, len))
    };

    let result = with_plugin("GSfreeze", Err(()), |plugin| {
        plugin.freeze(mode, &mut fd).map_err(|e| tracing::warn!("GSfreeze({:?}) failed: {}", mode, e))
    });
    if result.is_err() {
        return -1;
    }

    if mode == FreezeMode::Size {
        host_fd.size = i32::try_from(fd.size).unwrap_or(i32::MAX);
    }
    0
}

#[no_mangle]
pub extern "C" fn GSsetGameCRC(crc: u32, options: i32) {
    with_plugin("GSsetGameCRC", (), |plugin| plugin.set_game_crc(crc, options));
}

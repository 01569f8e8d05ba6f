//! Plugin lifecycle driven the way a host drives it

use gs_core::GsConfig;
use gs_plugin::{FreezeMode, GsPlugin};
use gs_renderer::regs::{csr, privileged, RegsMemory};
use gs_renderer::{FreezeData, NullHost, RendererType};
use std::sync::Arc;

fn headless() -> GsPlugin {
    let mut plugin = GsPlugin::new(GsConfig::default(), Arc::new(NullHost::new()));
    plugin.init().unwrap();
    plugin
}

#[test]
fn test_null_renderer_survives_any_input() {
    let mut regs = RegsMemory::new();
    let mut plugin = headless();
    unsafe { plugin.open2(0, regs.as_mut_ptr()).unwrap() };
    assert_eq!(plugin.current_renderer_type(), RendererType::Null);

    // junk of every length, on every path
    let junk: Vec<u8> = (0..4099u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8).collect();
    for len in [0, 1, 15, 16, 17, 255, 4099] {
        plugin.gif_transfer(&junk[..len]);
        plugin.gif_transfer2(&junk[..len]);
        plugin.gif_transfer3(&junk[..len]);
        plugin.vsync((len & 1) as i32);
    }
    let vu1 = vec![0xA5u8; 0x4000];
    plugin.gif_transfer1(&vu1, 0x3FF0);
    plugin.gif_transfer1(&vu1, 0x4010);

    let mut out = [0u8; 64];
    plugin.read_fifo2(&mut out);
    plugin.init_read_fifo2(&mut out);

    assert_eq!(plugin.client_rect(), Some((0, 0)));
    assert_eq!(plugin.renderer().map(|r| r.internal_resolution()), Some((0, 0)));
    assert_ne!(regs.read(privileged::CSR) & csr::VSINT, 0);
}

#[test]
fn test_save_state_across_close_and_reopen() {
    let mut regs = RegsMemory::new();
    let mut plugin = headless();
    unsafe { plugin.open(RendererType::Null, -1, regs.as_mut_ptr()).unwrap() };
    plugin.set_game_crc(0x8B02_9334, 0);

    let mut fd = FreezeData::empty();
    plugin.freeze(FreezeMode::Size, &mut fd).unwrap();
    let mut buf = vec![0u8; fd.size];
    plugin.freeze(FreezeMode::Save, &mut FreezeData::new(&mut buf)).unwrap();

    plugin.close();
    plugin.shutdown();
    unsafe { plugin.open(RendererType::Null, -1, regs.as_mut_ptr()).unwrap() };
    assert_eq!(plugin.renderer().map(|r| r.crc()), Some(0));

    plugin.freeze(FreezeMode::Load, &mut FreezeData::new(&mut buf)).unwrap();
    let renderer = plugin.renderer().unwrap();
    assert_eq!(renderer.crc(), 0x8B02_9334);
    assert!(!renderer.active_hacks().is_empty());
}

//! Save-state round trips through the renderer interface

use gs_core::error::FreezeError;
use gs_core::GsConfig;
use gs_renderer::crc::GameHacks;
use gs_renderer::regs::{general, RegsMemory};
use gs_renderer::{FreezeData, HardwareRenderer, NullRenderer, Renderer, SoftwareRenderer};

fn snapshot_size(renderer: &dyn Renderer) -> usize {
    let mut fd = FreezeData::empty();
    renderer.freeze(&mut fd, true).unwrap();
    fd.size
}

#[test]
fn test_hardware_round_trip_keeps_resolution_and_hacks() {
    let mut config = GsConfig::default();
    config.set_i("upscale_multiplier", 2);

    let mut regs = RegsMemory::new();
    regs.set_display(0, 512, 224);

    let mut source = HardwareRenderer::opengl(&config).unwrap();
    unsafe { source.set_regs_mem(regs.as_mut_ptr()) };
    source.vsync(0);
    source.set_game_crc(0x2113_EA2E, 0);
    source.state_mut().write_reg(general::FRAME_1, 0xABCD);
    source.state_mut().memory_mut().write(0x2000, b"local memory");

    let mut buf = vec![0u8; snapshot_size(&source)];
    source.freeze(&mut FreezeData::new(&mut buf), false).unwrap();

    let mut target = HardwareRenderer::opengl(&config).unwrap();
    target.defrost(&FreezeData::new(&mut buf)).unwrap();

    assert_eq!(target.internal_resolution(), (1024, 448));
    assert_eq!(target.crc(), 0x2113_EA2E);
    assert_eq!(target.active_hacks(), GameHacks::SKIP_DRAW);
    assert_eq!(target.frame_count(), 1);
    assert_eq!(target.state().reg(general::FRAME_1), 0xABCD);

    let mut text = [0u8; 12];
    target.state().memory().read(0x2000, &mut text);
    assert_eq!(&text, b"local memory");
}

#[test]
fn test_exact_buffer_succeeds_smaller_fails_untouched() {
    let renderer = NullRenderer::new(&GsConfig::default()).unwrap();
    let size = snapshot_size(&renderer);

    let mut exact = vec![0u8; size];
    renderer.freeze(&mut FreezeData::new(&mut exact), false).unwrap();

    let mut small = vec![0xEEu8; size - 1];
    let err = renderer.freeze(&mut FreezeData::new(&mut small), false).unwrap_err();
    assert_eq!(err, FreezeError::BufferTooSmall { needed: size, got: size - 1 });
    assert!(small.iter().all(|&b| b == 0xEE));
}

#[test]
fn test_snapshot_moves_between_variants() {
    let config = GsConfig::default();
    let mut software = SoftwareRenderer::new(&config, 0).unwrap();
    software.state_mut().write_reg(general::SCISSOR_1, 0x77);

    let mut buf = vec![0u8; snapshot_size(&software)];
    software.freeze(&mut FreezeData::new(&mut buf), false).unwrap();

    let mut null = NullRenderer::new(&config).unwrap();
    null.defrost(&FreezeData::new(&mut buf)).unwrap();
    assert_eq!(null.state().reg(general::SCISSOR_1), 0x77);
}

#[test]
fn test_defrost_rejects_garbage() {
    let mut renderer = NullRenderer::new(&GsConfig::default()).unwrap();
    renderer.state_mut().write_reg(general::FRAME_1, 5);

    let mut junk = vec![0x11u8; snapshot_size(&renderer)];
    assert_eq!(renderer.defrost(&FreezeData::new(&mut junk)), Err(FreezeError::BadHeader));
    assert_eq!(renderer.state().reg(general::FRAME_1), 5);
}

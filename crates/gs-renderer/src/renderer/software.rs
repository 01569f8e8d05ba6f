//! Software renderer
//!
//! The displayed frame buffer is converted from local memory to RGBA8 on
//! vsync and uploaded through a [`SoftwareDevice`](crate::backend::SoftwareDevice).
//! Conversion is split into bands of rows dealt out to scoped worker threads.

use super::{Renderer, RendererCore, RendererType};
use crate::backend::Frame;
use crate::local_memory::LocalMemory;
use crate::regs::DisplayFrameBuffer;
use crate::transfer::{bits_per_pixel, psm};
use gs_core::error::MemoryError;
use gs_core::GsConfig;
use gs_vector::GsVector4i;

/// Largest worker count honoured from `extrathreads`
pub const MAX_EXTRA_THREADS: usize = 32;

pub struct SoftwareRenderer {
    core: RendererCore,
    threads: usize,
    /// log2 of the rows per band
    band_shift: u32,
    pixels: Vec<u8>,
}

impl SoftwareRenderer {
    /// `threads` is the number of extra worker threads; -1 reads
    /// `extrathreads` from `config`
    pub fn new(config: &GsConfig, threads: i32) -> Result<Self, MemoryError> {
        let threads = if threads < 0 { config.get_i("extrathreads") } else { threads };
        let threads = (threads.max(0) as usize).min(MAX_EXTRA_THREADS);
        let band_shift = config.get_i("extrathreads_height").clamp(0, 10) as u32;

        tracing::debug!("Software renderer: {} extra threads, {} rows per band", threads, 1 << band_shift);

        Ok(Self {
            core: RendererCore::new(RendererType::SoftwareGl, config)?,
            threads,
            band_shift,
            pixels: Vec::new(),
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// RGBA8 pixels of the last converted frame
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

impl std::fmt::Debug for SoftwareRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftwareRenderer")
            .field("core", &self.core)
            .field("threads", &self.threads)
            .finish_non_exhaustive()
    }
}

impl Renderer for SoftwareRenderer {
    fn core(&self) -> &RendererCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RendererCore {
        &mut self.core
    }

    /// Native display size
    fn internal_resolution(&self) -> (u32, u32) {
        self.core.display()
    }

    fn vsync(&mut self, field: i32) {
        let circuit = self.core.vsync_state(field);
        if self.core.device().is_none() {
            return;
        }

        let (w, h) = self.core.display();
        let Some(circuit) = circuit else {
            self.core.present(&Frame::blank(w, h));
            return;
        };

        self.pixels.resize(w as usize * h as usize * 4, 0);
        convert_frame(
            self.core.state.memory(),
            &circuit.frame,
            w as usize,
            &mut self.pixels,
            self.threads,
            1 << self.band_shift,
        );
        self.core.present(&Frame::new(w, h, &self.pixels));
    }
}

/// Convert the frame buffer `fb` into tightly packed RGBA8 rows of `width`
/// pixels. `out.len() / (width * 4)` rows are produced.
pub fn convert_frame(
    mem: &LocalMemory,
    fb: &DisplayFrameBuffer,
    width: usize,
    out: &mut [u8],
    threads: usize,
    band_rows: usize,
) {
    let row_bytes = width * 4;
    if row_bytes == 0 {
        return;
    }
    let band_bytes = row_bytes * band_rows.max(1);

    if threads == 0 {
        for (y, row) in out.chunks_exact_mut(row_bytes).enumerate() {
            convert_row(mem, fb, y, row);
        }
        return;
    }

    let mut lanes: Vec<Vec<(usize, &mut [u8])>> = (0..threads).map(|_| Vec::new()).collect();
    for (i, band) in out.chunks_mut(band_bytes).enumerate() {
        lanes[i % threads].push((i * band_rows.max(1), band));
    }

    std::thread::scope(|s| {
        for lane in lanes.into_iter().filter(|l| !l.is_empty()) {
            s.spawn(move || {
                for (first_row, band) in lane {
                    for (dy, row) in band.chunks_exact_mut(row_bytes).enumerate() {
                        convert_row(mem, fb, first_row + dy, row);
                    }
                }
            });
        }
    });
}

fn convert_row(mem: &LocalMemory, fb: &DisplayFrameBuffer, y: usize, row: &mut [u8]) {
    let bpp = bits_per_pixel(fb.psm) as usize;
    let stride = fb.width.max(64) as usize;
    let first = (fb.dby as usize + y) * stride + fb.dbx as usize;
    let base = fb.base as usize;

    match fb.psm {
        psm::CT24 | psm::Z24 => {
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let addr = base + (first + x) * 3;
                px[0] = mem.read_u8(addr);
                px[1] = mem.read_u8(addr + 1);
                px[2] = mem.read_u8(addr + 2);
                px[3] = 0xFF;
            }
        }
        psm::CT16 | psm::CT16S | psm::Z16 | psm::Z16S => {
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let v = mem.read_u16(base + (first + x) * 2);
                px[0] = expand5(v);
                px[1] = expand5(v >> 5);
                px[2] = expand5(v >> 10);
                px[3] = 0xFF;
            }
        }
        _ if bpp == 32 => {
            let alpha = GsVector4i::splat(0xFF00_0000);
            let src = mem.span(base + first * 4, row.len());
            for (dst, chunk) in row.chunks_mut(GsVector4i::BYTES).zip(src.chunks(GsVector4i::BYTES)) {
                (GsVector4i::load_partial(chunk) | alpha).store_masked(dst, chunk.len());
            }
        }
        _ => {
            // indexed formats are shown as grey ramps of their index
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let index = if bpp == 8 {
                    mem.read_u8(base + first + x)
                } else {
                    mem.read_nibble(base * 2 + first + x) * 0x11
                };
                px[..3].fill(index);
                px[3] = 0xFF;
            }
        }
    }
}

#[inline]
fn expand5(v: u16) -> u8 {
    let c = (v & 0x1F) as u8;
    (c << 3) | (c >> 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SoftwareDevice;
    use crate::offscreen::OffscreenHost;
    use crate::regs::RegsMemory;
    use std::sync::Arc;

    fn ct32_frame(width: u32, psm: u8) -> DisplayFrameBuffer {
        DisplayFrameBuffer {
            base: 0,
            width,
            psm,
            dbx: 0,
            dby: 0,
        }
    }

    #[test]
    fn test_threads_from_config() {
        let mut config = GsConfig::default();
        config.set_i("extrathreads", 3);
        assert_eq!(SoftwareRenderer::new(&config, -1).unwrap().threads(), 3);
        assert_eq!(SoftwareRenderer::new(&config, 0).unwrap().threads(), 0);
    }

    #[test]
    fn test_ct32_forces_alpha() {
        let mut mem = LocalMemory::new().unwrap();
        mem.write(0, &[10, 20, 30, 0, 40, 50, 60, 0x80]);

        let mut out = vec![0u8; 64 * 4];
        convert_frame(&mem, &ct32_frame(64, psm::CT32), 64, &mut out, 0, 1);
        assert_eq!(&out[..8], &[10, 20, 30, 0xFF, 40, 50, 60, 0xFF]);
    }

    #[test]
    fn test_ct16_expands_channels() {
        let mut mem = LocalMemory::new().unwrap();
        // r=31, g=0, b=31
        mem.write(0, &0x7C1Fu16.to_le_bytes());

        let mut out = vec![0u8; 64 * 4];
        convert_frame(&mem, &ct32_frame(64, psm::CT16), 64, &mut out, 0, 1);
        assert_eq!(&out[..4], &[0xFF, 0x00, 0xFF, 0xFF]);
    }

    #[test]
    fn test_threaded_matches_inline() {
        let mut mem = LocalMemory::new().unwrap();
        let image: Vec<u8> = (0..64 * 37 * 4).map(|i| (i * 7) as u8).collect();
        mem.write(0, &image);
        let fb = ct32_frame(64, psm::CT32);

        let mut inline = vec![0u8; 64 * 37 * 4];
        let mut threaded = vec![0u8; 64 * 37 * 4];
        convert_frame(&mem, &fb, 64, &mut inline, 0, 1);
        convert_frame(&mem, &fb, 64, &mut threaded, 3, 4);
        assert_eq!(inline, threaded);
    }

    #[test]
    fn test_vsync_presents_display() {
        let host = Arc::new(OffscreenHost::gl());
        let mut regs = RegsMemory::new();
        regs.set_display(0, 64, 2);

        let mut renderer = SoftwareRenderer::new(&GsConfig::default(), 2).unwrap();
        unsafe { renderer.set_regs_mem(regs.as_mut_ptr()) };
        renderer.core_mut().state.memory_mut().write(0, &[1, 2, 3, 4]);

        let mut device = SoftwareDevice::new(host.clone());
        crate::backend::Device::create(&mut device, 640, 480).unwrap();
        renderer.create_device(Box::new(device)).unwrap();
        renderer.vsync(0);

        assert_eq!(renderer.internal_resolution(), (64, 2));
        assert_eq!(renderer.pixels().len(), 64 * 2 * 4);
        let upload = host.gl_capture().last_upload;
        assert_eq!(&upload[..4], &[1, 2, 3, 0xFF]);
    }

    #[test]
    fn test_vsync_without_device_only_updates_state() {
        let mut renderer = SoftwareRenderer::new(&GsConfig::default(), 0).unwrap();
        renderer.vsync(1);
        assert_eq!(renderer.frame_count(), 1);
        assert!(renderer.pixels().is_empty());
    }
}

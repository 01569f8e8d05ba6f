//! gsx - headless GS plugin runner
//!
//! Drives the plugin without a host emulator: either replays a raw GIF dump
//! or uploads a synthetic test pattern, then runs vsyncs and prints stats.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use gs_core::GsConfig;
use gs_plugin::{FreezeMode, GsPlugin};
use gs_renderer::gif::{desc, GifFormat, GifTag};
use gs_renderer::offscreen::OffscreenHost;
use gs_renderer::regs::{general, RegsMemory};
use gs_renderer::{FreezeData, RendererType};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "gsx")]
#[command(about = "Headless PS2 GS plugin runner")]
#[command(version)]
struct Cli {
    /// Renderer to open
    #[arg(short, long, value_enum, default_value_t = Backend::Software)]
    renderer: Backend,

    /// Raw GIF data (whole qwords) sent through PATH3 before every frame
    #[arg(short, long)]
    dump: Option<PathBuf>,

    /// Number of vsyncs to run
    #[arg(short, long, default_value_t = 60)]
    frames: u32,

    /// Display width of the synthetic pattern
    #[arg(long, default_value_t = 320)]
    width: u32,

    /// Display height of the synthetic pattern
    #[arg(long, default_value_t = 224)]
    height: u32,

    /// Extra software conversion threads (-1 reads the config)
    #[arg(short, long, default_value_t = -1)]
    threads: i32,

    /// Save and reload a snapshot after the last frame
    #[arg(long)]
    freeze: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    Null,
    Software,
}

impl From<Backend> for RendererType {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Null => RendererType::Null,
            Backend::Software => RendererType::SoftwareGl,
        }
    }
}

fn qword(lo: u64, hi: u64) -> [u8; 16] {
    let mut q = [0u8; 16];
    q[..8].copy_from_slice(&lo.to_le_bytes());
    q[8..].copy_from_slice(&hi.to_le_bytes());
    q
}

fn tag(nloop: u16, eop: bool, format: GifFormat, nreg: u8, regs: u64) -> [u8; 16] {
    GifTag {
        nloop,
        eop,
        pre: false,
        prim: 0,
        format,
        nreg,
        regs,
    }
    .encode()
}

/// Host-to-local upload of a CT32 gradient covering a `width` x `height`
/// frame buffer at address 0
fn pattern_packet(width: u32, height: u32, frame: u32) -> Result<Vec<u8>> {
    let qwords = width as usize * height as usize * 4 / 16;
    let Ok(nloop) = u16::try_from(qwords) else {
        bail!("{}x{} does not fit one IMAGE packet", width, height);
    };

    let fbw = ((width + 63) / 64) as u64;
    let mut data = Vec::with_capacity((qwords + 6) * 16);
    data.extend_from_slice(&tag(4, false, GifFormat::Packed, 1, desc::A_D as u64));
    data.extend_from_slice(&qword(fbw << 48, general::BITBLTBUF as u64));
    data.extend_from_slice(&qword(0, general::TRXPOS as u64));
    data.extend_from_slice(&qword(width as u64 | ((height as u64) << 32), general::TRXREG as u64));
    data.extend_from_slice(&qword(0, general::TRXDIR as u64));
    data.extend_from_slice(&tag(nloop, true, GifFormat::Image, 0, 0));
    for y in 0..height {
        for x in 0..width {
            data.extend_from_slice(&[(x + frame) as u8, (y + frame) as u8, frame as u8, 0x80]);
        }
    }
    Ok(data)
}

fn main() -> Result<()> {
    gs_core::init_logging("info");

    let cli = Cli::parse();
    if cli.width == 0 || cli.height == 0 {
        bail!("display size must be non-zero");
    }

    let dump = match &cli.dump {
        Some(path) => {
            let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            if data.len() % 16 != 0 {
                tracing::warn!("{} has a partial trailing qword", path.display());
            }
            Some(data)
        }
        None => None,
    };

    let path = GsConfig::config_path();
    let config = GsConfig::load(&path).unwrap_or_else(|e| {
        tracing::debug!("Using default config ({})", e);
        GsConfig::default()
    });

    let mut regs = RegsMemory::new();
    regs.set_display(0, cli.width, cli.height);

    let mut plugin = GsPlugin::new(config, Arc::new(OffscreenHost::gl()));
    plugin.init()?;
    unsafe { plugin.open(cli.renderer.into(), cli.threads, regs.as_mut_ptr())? };
    tracing::info!("Opened {} renderer", plugin.current_renderer_type());

    for frame in 0..cli.frames {
        match &dump {
            Some(data) => plugin.gif_transfer3(data),
            None => plugin.gif_transfer3(&pattern_packet(cli.width, cli.height, frame)?),
        }
        plugin.vsync((frame & 1) as i32);
    }

    if cli.freeze {
        let mut fd = FreezeData::empty();
        plugin.freeze(FreezeMode::Size, &mut fd)?;
        let mut buf = vec![0u8; fd.size];
        plugin.freeze(FreezeMode::Save, &mut FreezeData::new(&mut buf))?;
        plugin.freeze(FreezeMode::Load, &mut FreezeData::new(&mut buf))?;
        println!("snapshot:   {} bytes", buf.len());
    }

    if let Some(renderer) = plugin.renderer() {
        let gs = renderer.state().stats();
        println!("renderer:   {}", renderer.kind());
        println!("frames:     {}", renderer.frame_count());
        println!("resolution: {:?}", renderer.internal_resolution());
        println!("vertices:   {}", gs.vertices);
        println!("primitives: {}", gs.primitives);
        println!("image:      {} bytes", gs.image_bytes);
        if let Some(device) = renderer.core().device() {
            let stats = device.stats();
            println!("presents:   {}", stats.presents);
            println!("uploads:    {}", stats.uploads);
        }
    }

    plugin.shutdown();
    Ok(())
}

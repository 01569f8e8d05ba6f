//! Save-state serialization
//!
//! A snapshot is a 12-byte little-endian header `{magic, version,
//! payload_len}` followed by the payload: general registers, GIF path
//! state, transfer cursors, renderer settings and the local memory image.
//! Device state is never part of a snapshot.

use crate::gif::{GifTag, PathState};
use crate::local_memory::LOCAL_MEMORY_SIZE;
use crate::regs::general;
use crate::state::GsState;
use crate::transfer::{ImageTransfer, TransferDirection};
use gs_core::error::FreezeError;

/// "GSFZ"
pub const FREEZE_MAGIC: u32 = 0x5A46_5347;
pub const FREEZE_VERSION: u32 = 1;

const HEADER_SIZE: usize = 12;
const PATH_SIZE: usize = GifTag::SIZE + 2 + 1;
const TRANSFER_SIZE: usize = 4 + 4 + 1 + 6 * 4 + 8 + 1;
const RENDERER_SIZE: usize = 4 + 4 + 4 + 4 + 4 + 8;

const PAYLOAD_SIZE: usize = general::COUNT * 8
    + 4 * PATH_SIZE
    + 1
    + 2 * TRANSFER_SIZE
    + 4
    + 4
    + RENDERER_SIZE
    + LOCAL_MEMORY_SIZE;

/// Host buffer for freeze and defrost
#[derive(Debug)]
pub struct FreezeData<'a> {
    /// Size of the snapshot. Written by a size query, read by save and load.
    pub size: usize,
    pub data: Option<&'a mut [u8]>,
}

impl<'a> FreezeData<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        Self {
            size: data.len(),
            data: Some(data),
        }
    }

    /// A size query
    pub fn empty() -> Self {
        Self { size: 0, data: None }
    }
}

/// Renderer settings carried in a snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RendererSnapshot {
    pub crc: u32,
    pub options: i32,
    pub hacks: u32,
    pub display: (u32, u32),
    pub frame_count: u64,
}

/// Total snapshot size in bytes
pub const fn snapshot_size() -> usize {
    HEADER_SIZE + PAYLOAD_SIZE
}

struct SnapshotWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> SnapshotWriter<'a> {
    fn bytes(&mut self, src: &[u8]) {
        self.buf[self.pos..self.pos + src.len()].copy_from_slice(src);
        self.pos += src.len();
    }

    fn u8(&mut self, v: u8) {
        self.bytes(&[v]);
    }

    fn u16(&mut self, v: u16) {
        self.bytes(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.bytes(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.bytes(&v.to_le_bytes());
    }

    fn path(&mut self, path: &PathState) {
        self.bytes(&path.tag.encode());
        self.u16(path.nloop);
        self.u8(path.reg);
    }

    fn transfer(&mut self, t: &ImageTransfer) {
        self.u32(t.base);
        self.u32(t.bw);
        self.u8(t.psm);
        for v in [t.x0, t.y0, t.w, t.h, t.x, t.y] {
            self.u32(v);
        }
        self.bytes(&t.pending);
        self.u8(t.pending_len);
    }
}

struct SnapshotReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> SnapshotReader<'a> {
    fn bytes(&mut self, n: usize) -> Result<&'a [u8], FreezeError> {
        let out = self.buf.get(self.pos..self.pos + n).ok_or(FreezeError::BadHeader)?;
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], FreezeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, FreezeError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, FreezeError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, FreezeError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, FreezeError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn path(&mut self) -> Result<PathState, FreezeError> {
        let tag = GifTag::decode(&self.array()?);
        let nloop = self.u16()?;
        let reg = self.u8()?;
        if reg >= tag.nreg {
            return Err(FreezeError::BadHeader);
        }
        Ok(PathState { tag, nloop, reg })
    }

    fn transfer(&mut self) -> Result<ImageTransfer, FreezeError> {
        let base = self.u32()?;
        let bw = self.u32()?;
        let psm = self.u8()?;
        let mut dims = [0u32; 6];
        for d in dims.iter_mut() {
            *d = self.u32()?;
        }
        let pending = self.array()?;
        let pending_len = self.u8()?;

        let [x0, y0, w, h, x, y] = dims;
        let transfer = ImageTransfer {
            base,
            bw,
            psm,
            x0,
            y0,
            w,
            h,
            x,
            y,
            pending,
            pending_len,
        };
        if !transfer.is_consistent() {
            return Err(FreezeError::BadHeader);
        }
        Ok(transfer)
    }
}

fn direction_code(dir: TransferDirection) -> u8 {
    match dir {
        TransferDirection::HostToLocal => 0,
        TransferDirection::LocalToHost => 1,
        TransferDirection::LocalToLocal => 2,
        TransferDirection::Idle => 3,
    }
}

/// Report the snapshot size through `fd.size`
pub fn size(fd: &mut FreezeData) {
    fd.size = snapshot_size();
}

/// Serialize `state` and `renderer` into `fd`. Nothing is written when the
/// buffer is too small.
pub fn save(state: &GsState, renderer: &RendererSnapshot, fd: &mut FreezeData) -> Result<(), FreezeError> {
    let needed = snapshot_size();
    let buf = match fd.data.as_deref_mut() {
        Some(buf) if !buf.is_empty() => buf,
        _ => return Err(FreezeError::NullData),
    };
    let got = fd.size.min(buf.len());
    if got < needed {
        return Err(FreezeError::BufferTooSmall { needed, got });
    }

    let mut w = SnapshotWriter { buf, pos: 0 };
    w.u32(FREEZE_MAGIC);
    w.u32(FREEZE_VERSION);
    w.u32(PAYLOAD_SIZE as u32);

    for reg in state.regs.iter() {
        w.u64(*reg);
    }
    for path in state.paths.iter() {
        w.path(path);
    }
    w.u8(direction_code(state.trxdir));
    w.transfer(&state.transfer);
    w.transfer(&state.readback);
    w.u32(state.q);
    w.u32(state.vertex_queue as u32);

    w.u32(renderer.crc);
    w.u32(renderer.options as u32);
    w.u32(renderer.hacks);
    w.u32(renderer.display.0);
    w.u32(renderer.display.1);
    w.u64(renderer.frame_count);

    let pos = w.pos;
    state.mem.snapshot(&mut w.buf[pos..pos + LOCAL_MEMORY_SIZE]);

    tracing::debug!("Froze GS state: {} bytes", needed);
    Ok(())
}

struct StateImage {
    regs: [u64; general::COUNT],
    paths: [PathState; 4],
    trxdir: TransferDirection,
    transfer: ImageTransfer,
    readback: ImageTransfer,
    q: u32,
    vertex_queue: usize,
    renderer: RendererSnapshot,
}

fn decode(r: &mut SnapshotReader) -> Result<StateImage, FreezeError> {
    let mut regs = [0u64; general::COUNT];
    for reg in regs.iter_mut() {
        *reg = r.u64()?;
    }
    let mut paths = [PathState::default(); 4];
    for path in paths.iter_mut() {
        *path = r.path()?;
    }
    let trxdir = TransferDirection::from(r.u8()? as u64);
    let transfer = r.transfer()?;
    let readback = r.transfer()?;
    let q = r.u32()?;
    let vertex_queue = r.u32()? as usize;

    let renderer = RendererSnapshot {
        crc: r.u32()?,
        options: r.u32()? as i32,
        hacks: r.u32()?,
        display: (r.u32()?, r.u32()?),
        frame_count: r.u64()?,
    };

    Ok(StateImage {
        regs,
        paths,
        trxdir,
        transfer,
        readback,
        q,
        vertex_queue,
        renderer,
    })
}

/// Restore `state` from `fd` and return the renderer settings. The whole
/// snapshot is validated before `state` is touched.
pub fn load(state: &mut GsState, fd: &FreezeData) -> Result<RendererSnapshot, FreezeError> {
    let buf: &[u8] = match fd.data.as_deref() {
        Some(buf) if !buf.is_empty() => buf,
        _ => return Err(FreezeError::NullData),
    };
    let got = fd.size.min(buf.len());
    if got < HEADER_SIZE {
        return Err(FreezeError::BufferTooSmall { needed: snapshot_size(), got });
    }

    let mut r = SnapshotReader { buf: &buf[..got], pos: 0 };
    if r.u32()? != FREEZE_MAGIC {
        return Err(FreezeError::BadHeader);
    }
    let version = r.u32()?;
    if version != FREEZE_VERSION {
        return Err(FreezeError::VersionMismatch(version));
    }
    if r.u32()? as usize != PAYLOAD_SIZE {
        return Err(FreezeError::BadHeader);
    }
    if got < snapshot_size() {
        return Err(FreezeError::BufferTooSmall { needed: snapshot_size(), got });
    }

    let image = decode(&mut r)?;
    let memory = r.bytes(LOCAL_MEMORY_SIZE)?;

    state.regs = image.regs;
    state.paths = image.paths;
    state.trxdir = image.trxdir;
    state.transfer = image.transfer;
    state.readback = image.readback;
    state.q = image.q;
    state.vertex_queue = image.vertex_queue;
    state.mem.restore(memory);

    tracing::debug!("Defrosted GS state (crc {:#010x})", image.renderer.crc);
    Ok(image.renderer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gif::{GifFormat, GifPath};

    fn sample_state() -> GsState {
        let mut gs = GsState::new().unwrap();
        gs.write_reg(general::FRAME_1, 0xABCD);
        gs.write_reg(general::BITBLTBUF, (1u64 << 48) | (0x01u64 << 56));
        gs.write_reg(general::TRXPOS, 0);
        gs.write_reg(general::TRXREG, 3 | (1u64 << 32));
        gs.write_reg(general::TRXDIR, 0);
        // leaves one CT24 pixel half written
        gs.write_reg(general::HWREG, 0x0000_0605_0403_0201);
        gs.memory_mut().write_u32(0x3F_FFF0, 0xCAFEBABE);

        let open = GifTag { nloop: 4, nreg: 3, ..Default::default() }.encode();
        gs.transfer(GifPath::Path2, &open);
        gs
    }

    fn renderer() -> RendererSnapshot {
        RendererSnapshot {
            crc: 0x45D1_9A8D,
            options: 0,
            hacks: 0b100,
            display: (640, 448),
            frame_count: 77,
        }
    }

    #[test]
    fn test_round_trip() {
        let gs = sample_state();
        let mut buf = vec![0u8; snapshot_size()];
        let mut fd = FreezeData::new(&mut buf);
        save(&gs, &renderer(), &mut fd).unwrap();

        let mut restored = GsState::new().unwrap();
        let snap = load(&mut restored, &fd).unwrap();
        assert_eq!(snap, renderer());
        assert_eq!(restored.regs, gs.regs);
        assert_eq!(restored.paths, gs.paths);
        assert_eq!(restored.transfer, gs.transfer);
        assert_eq!(restored.trxdir, TransferDirection::HostToLocal);
        assert_eq!(restored.memory().read_u32(0x3F_FFF0), 0xCAFEBABE);
        assert_eq!(restored.memory().read_u32(0), 0x04030201);
    }

    #[test]
    fn test_size_query() {
        let mut fd = FreezeData::empty();
        size(&mut fd);
        assert_eq!(fd.size, snapshot_size());
        assert!(fd.size > LOCAL_MEMORY_SIZE);
    }

    #[test]
    fn test_save_into_small_buffer_is_untouched() {
        let gs = sample_state();
        let mut buf = vec![0x5Au8; snapshot_size() - 1];
        let mut fd = FreezeData::new(&mut buf);
        let err = save(&gs, &renderer(), &mut fd).unwrap_err();
        assert_eq!(err, FreezeError::BufferTooSmall { needed: snapshot_size(), got: snapshot_size() - 1 });
        assert_eq!(fd.size, snapshot_size() - 1);
        assert!(buf.iter().all(|&b| b == 0x5A));
    }

    #[test]
    fn test_null_data() {
        let gs = sample_state();
        let mut fd = FreezeData::empty();
        assert_eq!(save(&gs, &renderer(), &mut fd), Err(FreezeError::NullData));
        let mut restored = GsState::new().unwrap();
        assert_eq!(load(&mut restored, &fd), Err(FreezeError::NullData));
    }

    #[test]
    fn test_corrupt_snapshot_leaves_state_alone() {
        let gs = sample_state();
        let mut buf = vec![0u8; snapshot_size()];
        save(&gs, &renderer(), &mut FreezeData::new(&mut buf)).unwrap();

        let mut target = GsState::new().unwrap();
        target.write_reg(general::FRAME_2, 9);

        let mut bad_magic = buf.clone();
        bad_magic[0] ^= 0xFF;
        assert_eq!(load(&mut target, &FreezeData::new(&mut bad_magic)), Err(FreezeError::BadHeader));

        let mut bad_version = buf.clone();
        bad_version[4] = 9;
        assert_eq!(
            load(&mut target, &FreezeData::new(&mut bad_version)),
            Err(FreezeError::VersionMismatch(9))
        );

        let mut short = buf[..buf.len() - 1].to_vec();
        assert!(matches!(
            load(&mut target, &FreezeData::new(&mut short)),
            Err(FreezeError::BufferTooSmall { .. })
        ));

        assert_eq!(target.reg(general::FRAME_2), 9);
        assert_eq!(target.reg(general::FRAME_1), 0);
    }

    #[test]
    fn test_inconsistent_transfer_cursor_rejected() {
        let gs = sample_state();
        let mut buf = vec![0u8; snapshot_size()];
        save(&gs, &renderer(), &mut FreezeData::new(&mut buf)).unwrap();

        // host to local cursor: base, bw, psm, x0, y0, w, h, x, y, pending, pending_len
        let transfer = HEADER_SIZE + general::COUNT * 8 + 4 * PATH_SIZE + 1;
        let x = transfer + 4 + 4 + 1 + 4 * 4;
        let y = x + 4;
        let pending_len = transfer + TRANSFER_SIZE - 1;
        assert_eq!(buf[pending_len], 2);

        let mut corrupt = Vec::new();
        for len in [3u8, 5, 8] {
            let mut bad = buf.clone();
            bad[pending_len] = len;
            corrupt.push(bad);
        }
        // x == w on the active row, y past the last row
        for (offset, value) in [(x, 3u32), (y, 2)] {
            let mut bad = buf.clone();
            bad[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
            corrupt.push(bad);
        }

        let mut target = GsState::new().unwrap();
        target.write_reg(general::FRAME_2, 9);
        for mut bad in corrupt {
            assert_eq!(load(&mut target, &FreezeData::new(&mut bad)), Err(FreezeError::BadHeader));
        }
        assert_eq!(target.reg(general::FRAME_2), 9);

        // the intact snapshot resumes the split CT24 pixel
        load(&mut target, &FreezeData::new(&mut buf)).unwrap();
        let mut image = GifTag { nloop: 1, eop: true, format: GifFormat::Image, ..Default::default() }
            .encode()
            .to_vec();
        image.extend_from_slice(&[0x77; 16]);
        target.transfer(GifPath::Path3, &image);
        assert_eq!(target.memory().read_u8(8), 0x77);
        assert_eq!(target.memory().read_u8(6), 0);
    }

    #[test]
    fn test_larger_buffer_accepted() {
        let gs = sample_state();
        let mut buf = vec![0u8; snapshot_size() + 64];
        let mut fd = FreezeData::new(&mut buf);
        save(&gs, &renderer(), &mut fd).unwrap();
        let mut restored = GsState::new().unwrap();
        assert!(load(&mut restored, &fd).is_ok());
    }
}

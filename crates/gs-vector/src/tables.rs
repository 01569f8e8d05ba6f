//! Process-wide vector constant tables

use once_cell::sync::OnceCell;

use crate::float::{GsVector4, GsVector8};
use crate::int::{GsVector4i, GsVector8i};

pub(crate) struct VectorTables {
    pub xff4: [GsVector4i; 17],
    pub x0f4: [GsVector4i; 17],
    pub xff8: [GsVector8i; 33],
    pub x0f8: [GsVector8i; 33],
    pub f4: Vector4Constants,
    pub f8: Vector8Constants,
}

pub(crate) struct Vector4Constants {
    pub ps0123: GsVector4,
    pub ps4567: GsVector4,
    pub half: GsVector4,
    pub one: GsVector4,
    pub two: GsVector4,
    pub four: GsVector4,
    pub x4b000000: GsVector4,
    pub x4f800000: GsVector4,
    pub max: GsVector4,
    pub min: GsVector4,
}

pub(crate) struct Vector8Constants {
    pub half: GsVector8,
    pub one: GsVector8,
    pub x7fffffff: GsVector8,
    pub x80000000: GsVector8,
    pub x4b000000: GsVector8,
    pub x4f800000: GsVector8,
    pub max: GsVector8,
    pub min: GsVector8,
}

static TABLES: OnceCell<VectorTables> = OnceCell::new();

/// Low `n` bytes set to `fill`, the rest zero
fn prefix<const W: usize>(n: usize, fill: u8) -> [u8; W] {
    let mut bytes = [0u8; W];
    bytes[..n].fill(fill);
    bytes
}

impl VectorTables {
    fn build() -> Self {
        Self {
            xff4: std::array::from_fn(|n| GsVector4i::from_bytes(prefix(n, 0xff))),
            x0f4: std::array::from_fn(|n| GsVector4i::from_bytes(prefix(n, 0x0f))),
            xff8: std::array::from_fn(|n| GsVector8i::from_bytes(prefix(n, 0xff))),
            x0f8: std::array::from_fn(|n| GsVector8i::from_bytes(prefix(n, 0x0f))),
            f4: Vector4Constants {
                ps0123: GsVector4::new(0.0, 1.0, 2.0, 3.0),
                ps4567: GsVector4::new(4.0, 5.0, 6.0, 7.0),
                half: GsVector4::splat(0.5),
                one: GsVector4::splat(1.0),
                two: GsVector4::splat(2.0),
                four: GsVector4::splat(4.0),
                x4b000000: GsVector4::splat_bits(0x4b00_0000),
                x4f800000: GsVector4::splat_bits(0x4f80_0000),
                max: GsVector4::splat(f32::MAX),
                min: GsVector4::splat(f32::MIN_POSITIVE),
            },
            f8: Vector8Constants {
                half: GsVector8::splat(0.5),
                one: GsVector8::splat(1.0),
                x7fffffff: GsVector8::splat_bits(0x7fff_ffff),
                x80000000: GsVector8::splat_bits(0x8000_0000),
                x4b000000: GsVector8::splat_bits(0x4b00_0000),
                x4f800000: GsVector8::splat_bits(0x4f80_0000),
                max: GsVector8::splat(f32::MAX),
                min: GsVector8::splat(f32::MIN_POSITIVE),
            },
        }
    }
}

/// Build the lane-mask and float constant tables.
///
/// Call once during single-threaded plugin startup. Later calls are no-ops.
pub fn init_vectors() {
    let mut built = false;
    TABLES.get_or_init(|| {
        built = true;
        VectorTables::build()
    });
    if built {
        tracing::debug!("Vector constant tables initialized");
    }
}

/// Whether [`init_vectors`] (or a first table access) has run
pub fn is_initialized() -> bool {
    TABLES.get().is_some()
}

pub(crate) fn tables() -> &'static VectorTables {
    TABLES.get_or_init(VectorTables::build)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_shape(bytes: &[u8], n: usize, fill: u8) {
        for (i, b) in bytes.iter().enumerate() {
            let expected = if i < n { fill } else { 0 };
            assert_eq!(*b, expected, "lane {} of mask {}", i, n);
        }
    }

    #[test]
    fn test_xff_x0f_128() {
        init_vectors();
        for n in 0..=16 {
            check_shape(&GsVector4i::xff(n).to_bytes(), n, 0xff);
            check_shape(&GsVector4i::x0f(n).to_bytes(), n, 0x0f);
        }
        assert!(GsVector4i::xff(0).is_zero());
        assert_eq!(GsVector4i::xff(16), GsVector4i::splat(0xffff_ffff));
        assert_eq!(GsVector4i::x0f(16), GsVector4i::splat(0x0f0f_0f0f));
    }

    #[test]
    fn test_xff_x0f_256() {
        init_vectors();
        for n in 0..=32 {
            check_shape(&GsVector8i::xff(n).to_bytes(), n, 0xff);
            check_shape(&GsVector8i::x0f(n).to_bytes(), n, 0x0f);
        }
        assert!(GsVector8i::xff(0).is_zero());
        assert_eq!(GsVector8i::xff(32), GsVector8i::splat(0xffff_ffff));
    }

    #[test]
    fn test_known_table_rows() {
        assert_eq!(GsVector4i::xff(3).u32, [0x00ff_ffff, 0, 0, 0]);
        assert_eq!(GsVector4i::xff(5).u32, [0xffff_ffff, 0x0000_00ff, 0, 0]);
        assert_eq!(GsVector4i::x0f(2).u32, [0x0000_0f0f, 0, 0, 0]);
        assert_eq!(GsVector4i::x0f(13).u32, [0x0f0f_0f0f, 0x0f0f_0f0f, 0x0f0f_0f0f, 0x0000_000f]);
        assert_eq!(
            GsVector8i::xff(17).u32,
            [0xffff_ffff, 0xffff_ffff, 0xffff_ffff, 0xffff_ffff, 0x0000_00ff, 0, 0, 0]
        );
    }

    #[test]
    fn test_init_is_idempotent() {
        init_vectors();
        let first = tables() as *const VectorTables;
        init_vectors();
        assert_eq!(first, tables() as *const VectorTables);
        assert!(is_initialized());
    }

    #[test]
    #[should_panic]
    fn test_out_of_range_index_panics() {
        let _ = GsVector4i::xff(17);
    }
}

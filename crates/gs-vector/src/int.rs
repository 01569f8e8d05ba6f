//! Integer vectors

use bytemuck::{Pod, Zeroable};
use std::ops::{BitAnd, BitOr, BitXor, Not};

use crate::tables::tables;

/// 128-bit integer vector (16 byte lanes)
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GsVector4i {
    pub u32: [u32; 4],
}

// Safety: plain integer arrays with size equal to alignment, no padding
unsafe impl Zeroable for GsVector4i {}
unsafe impl Pod for GsVector4i {}

/// 256-bit integer vector (32 byte lanes)
#[repr(C, align(32))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GsVector8i {
    pub u32: [u32; 8],
}

unsafe impl Zeroable for GsVector8i {}
unsafe impl Pod for GsVector8i {}

macro_rules! impl_int_vector {
    ($name:ident, $dwords:expr, $bytes:expr) => {
        impl $name {
            /// Width of the vector in bytes
            pub const BYTES: usize = $bytes;

            pub const fn from_u32s(u32: [u32; $dwords]) -> Self {
                Self { u32 }
            }

            pub const fn zero() -> Self {
                Self { u32: [0; $dwords] }
            }

            pub const fn splat(value: u32) -> Self {
                Self { u32: [value; $dwords] }
            }

            pub fn from_bytes(bytes: [u8; $bytes]) -> Self {
                bytemuck::cast(bytes)
            }

            pub fn to_bytes(self) -> [u8; $bytes] {
                bytemuck::cast(self)
            }

            /// Load up to `BYTES` bytes; missing lanes are zero.
            pub fn load_partial(src: &[u8]) -> Self {
                let mut bytes = [0u8; $bytes];
                let n = src.len().min($bytes);
                bytes[..n].copy_from_slice(&src[..n]);
                Self::from_bytes(bytes)
            }

            /// Mask with the low `n` bytes set to `0xff`
            pub fn xff(n: usize) -> Self {
                Self::xff_table()[n]
            }

            /// Mask with the low `n` bytes set to `0x0f`
            pub fn x0f(n: usize) -> Self {
                Self::x0f_table()[n]
            }

            /// `self & !v`
            #[inline]
            pub fn andnot(self, v: Self) -> Self {
                self & !v
            }

            /// Bitwise select: bits set in `mask` come from `v`, the rest from `self`.
            #[inline]
            pub fn blend(self, v: Self, mask: Self) -> Self {
                (v & mask) | self.andnot(mask)
            }

            pub fn is_zero(&self) -> bool {
                self.u32.iter().all(|&x| x == 0)
            }

            /// Store the low `n` bytes of `self` into `dst`, leaving the rest of
            /// `dst` untouched. `n` is clamped to `dst.len()` and `BYTES`.
            pub fn store_masked(self, dst: &mut [u8], n: usize) {
                let len = dst.len().min($bytes);
                let n = n.min(len);
                if n == 0 {
                    return;
                }

                let old = Self::load_partial(&dst[..len]);
                let merged = old.blend(self, Self::xff(n)).to_bytes();
                dst[..len].copy_from_slice(&merged[..len]);
            }
        }

        impl BitAnd for $name {
            type Output = Self;

            #[inline]
            fn bitand(self, rhs: Self) -> Self {
                let mut out = self;
                for (a, b) in out.u32.iter_mut().zip(rhs.u32) {
                    *a &= b;
                }
                out
            }
        }

        impl BitOr for $name {
            type Output = Self;

            #[inline]
            fn bitor(self, rhs: Self) -> Self {
                let mut out = self;
                for (a, b) in out.u32.iter_mut().zip(rhs.u32) {
                    *a |= b;
                }
                out
            }
        }

        impl BitXor for $name {
            type Output = Self;

            #[inline]
            fn bitxor(self, rhs: Self) -> Self {
                let mut out = self;
                for (a, b) in out.u32.iter_mut().zip(rhs.u32) {
                    *a ^= b;
                }
                out
            }
        }

        impl Not for $name {
            type Output = Self;

            #[inline]
            fn not(self) -> Self {
                let mut out = self;
                for a in out.u32.iter_mut() {
                    *a = !*a;
                }
                out
            }
        }
    };
}

impl_int_vector!(GsVector4i, 4, 16);
impl_int_vector!(GsVector8i, 8, 32);

impl GsVector4i {
    pub const fn new(x: u32, y: u32, z: u32, w: u32) -> Self {
        Self { u32: [x, y, z, w] }
    }

    fn xff_table() -> &'static [GsVector4i; 17] {
        &tables().xff4
    }

    fn x0f_table() -> &'static [GsVector4i; 17] {
        &tables().x0f4
    }
}

impl GsVector8i {
    /// Build from two 128-bit halves (low, high)
    pub fn from_halves(lo: GsVector4i, hi: GsVector4i) -> Self {
        let mut u32 = [0u32; 8];
        u32[..4].copy_from_slice(&lo.u32);
        u32[4..].copy_from_slice(&hi.u32);
        Self { u32 }
    }

    pub fn low(&self) -> GsVector4i {
        GsVector4i::new(self.u32[0], self.u32[1], self.u32[2], self.u32[3])
    }

    pub fn high(&self) -> GsVector4i {
        GsVector4i::new(self.u32[4], self.u32[5], self.u32[6], self.u32[7])
    }

    fn xff_table() -> &'static [GsVector8i; 33] {
        &tables().xff8
    }

    fn x0f_table() -> &'static [GsVector8i; 33] {
        &tables().x0f8
    }
}

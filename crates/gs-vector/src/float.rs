//! Float vectors and their shared constants

use bytemuck::{Pod, Zeroable};
use std::ops::{Add, Mul, Sub};

use crate::tables::tables;

/// 4 x f32
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GsVector4 {
    pub f32: [f32; 4],
}

/// 8 x f32
#[repr(C, align(32))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GsVector8 {
    pub f32: [f32; 8],
}

unsafe impl Zeroable for GsVector4 {}
unsafe impl Pod for GsVector4 {}
unsafe impl Zeroable for GsVector8 {}
unsafe impl Pod for GsVector8 {}

macro_rules! impl_float_vector {
    ($name:ident, $lanes:expr) => {
        impl $name {
            pub const fn splat(value: f32) -> Self {
                Self { f32: [value; $lanes] }
            }

            /// Splat a raw bit pattern into every lane
            pub fn splat_bits(bits: u32) -> Self {
                Self::splat(f32::from_bits(bits))
            }

            pub fn to_bits(self) -> [u32; $lanes] {
                bytemuck::cast(self)
            }

            pub fn min(self, v: Self) -> Self {
                self.zip(v, f32::min)
            }

            pub fn max(self, v: Self) -> Self {
                self.zip(v, f32::max)
            }

            /// Lane-wise floor using the 2^23 magic-number trick the
            /// `x4b000000` constant exists for. Inputs must satisfy `|x| < 2^23`.
            pub fn floor(self) -> Self {
                let magic = Self::x4b000000().f32[0];
                let mut out = self;
                for x in out.f32.iter_mut() {
                    let r = if *x >= 0.0 { (*x + magic) - magic } else { -((-*x + magic) - magic) };
                    *x = if r > *x { r - 1.0 } else { r };
                }
                out
            }

            #[inline]
            fn zip(self, v: Self, f: impl Fn(f32, f32) -> f32) -> Self {
                let mut out = self;
                for (a, b) in out.f32.iter_mut().zip(v.f32) {
                    *a = f(*a, b);
                }
                out
            }
        }

        impl Add for $name {
            type Output = Self;

            fn add(self, rhs: Self) -> Self {
                self.zip(rhs, |a, b| a + b)
            }
        }

        impl Sub for $name {
            type Output = Self;

            fn sub(self, rhs: Self) -> Self {
                self.zip(rhs, |a, b| a - b)
            }
        }

        impl Mul for $name {
            type Output = Self;

            fn mul(self, rhs: Self) -> Self {
                self.zip(rhs, |a, b| a * b)
            }
        }
    };
}

impl_float_vector!(GsVector4, 4);
impl_float_vector!(GsVector8, 8);

impl GsVector4 {
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { f32: [x, y, z, w] }
    }

    pub fn ps0123() -> Self { tables().f4.ps0123 }
    pub fn ps4567() -> Self { tables().f4.ps4567 }
    pub fn half() -> Self { tables().f4.half }
    pub fn one() -> Self { tables().f4.one }
    pub fn two() -> Self { tables().f4.two }
    pub fn four() -> Self { tables().f4.four }
    pub fn x4b000000() -> Self { tables().f4.x4b000000 }
    pub fn x4f800000() -> Self { tables().f4.x4f800000 }
    /// `FLT_MAX` in every lane
    pub fn max_value() -> Self { tables().f4.max }
    /// `FLT_MIN` (smallest positive normal) in every lane
    pub fn min_value() -> Self { tables().f4.min }
}

impl GsVector8 {
    pub fn half() -> Self { tables().f8.half }
    pub fn one() -> Self { tables().f8.one }
    pub fn x7fffffff() -> Self { tables().f8.x7fffffff }
    pub fn x80000000() -> Self { tables().f8.x80000000 }
    pub fn x4b000000() -> Self { tables().f8.x4b000000 }
    pub fn x4f800000() -> Self { tables().f8.x4f800000 }
    pub fn max_value() -> Self { tables().f8.max }
    pub fn min_value() -> Self { tables().f8.min }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        crate::init_vectors();
        assert_eq!(GsVector4::ps0123().f32, [0.0, 1.0, 2.0, 3.0]);
        assert_eq!(GsVector4::ps4567().f32, [4.0, 5.0, 6.0, 7.0]);
        assert_eq!(GsVector4::x4b000000().to_bits(), [0x4b00_0000; 4]);
        assert_eq!(GsVector4::x4f800000().f32[0], 4294967296.0);
        assert_eq!(GsVector4::min_value().f32[0], f32::MIN_POSITIVE);
        assert_eq!(GsVector8::x7fffffff().to_bits(), [0x7fff_ffff; 8]);
        assert_eq!(GsVector8::x80000000().to_bits(), [0x8000_0000; 8]);
        assert_eq!(GsVector8::max_value().f32[7], f32::MAX);
    }

    #[test]
    fn test_arithmetic() {
        let a = GsVector4::ps0123();
        let b = GsVector4::two();
        assert_eq!((a + b).f32, [2.0, 3.0, 4.0, 5.0]);
        assert_eq!((a - b).f32, [-2.0, -1.0, 0.0, 1.0]);
        assert_eq!((a * GsVector4::half()).f32, [0.0, 0.5, 1.0, 1.5]);
        assert_eq!(a.max(GsVector4::one()).f32, [1.0, 1.0, 2.0, 3.0]);
        assert_eq!(a.min(GsVector4::one()).f32, [0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_floor() {
        let v = GsVector4::new(1.5, -1.5, 2.0, -0.25);
        assert_eq!(v.floor().f32, [1.0, -2.0, 2.0, -1.0]);

        let v = GsVector8::splat(3.999);
        assert_eq!(v.floor().f32, [3.0; 8]);
    }
}

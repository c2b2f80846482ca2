//! Typed uniform values.
//!
//! Producers hand the parameter store a [`UniformValue`] (one element) or a
//! [`UniformArray`] (several elements of one kind). The store flattens both
//! into `f32` storage; integers are kept bit-exact via `f32::from_bits`.

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

/// Arity of the setter that last wrote a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SetterKind {
    /// Slot has never been written.
    #[default]
    None,
    Int,
    Float1,
    Float2,
    Float3,
    Float4,
    Mat3,
    Mat4,
}

impl SetterKind {
    /// Floats occupied by one element.
    #[inline]
    #[must_use]
    pub const fn floats_per_element(self) -> usize {
        match self {
            Self::None => 0,
            Self::Int | Self::Float1 => 1,
            Self::Float2 => 2,
            Self::Float3 => 3,
            Self::Float4 => 4,
            Self::Mat3 => 9,
            Self::Mat4 => 16,
        }
    }
}

/// A single typed uniform element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Scalar(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
}

impl UniformValue {
    #[must_use]
    pub fn kind(&self) -> SetterKind {
        match self {
            Self::Int(_) => SetterKind::Int,
            Self::Scalar(_) => SetterKind::Float1,
            Self::Vec2(_) => SetterKind::Float2,
            Self::Vec3(_) => SetterKind::Float3,
            Self::Vec4(_) => SetterKind::Float4,
            Self::Mat3(_) => SetterKind::Mat3,
            Self::Mat4(_) => SetterKind::Mat4,
        }
    }

    /// Writes the value's floats into the front of `out`.
    ///
    /// `out` must hold at least `kind().floats_per_element()` floats.
    pub(crate) fn write_to(&self, out: &mut [f32]) {
        match self {
            Self::Int(v) => out[0] = f32::from_bits(v.cast_unsigned()),
            Self::Scalar(v) => out[0] = *v,
            Self::Vec2(v) => out[..2].copy_from_slice(&v.to_array()),
            Self::Vec3(v) => out[..3].copy_from_slice(&v.to_array()),
            Self::Vec4(v) => out[..4].copy_from_slice(&v.to_array()),
            Self::Mat3(m) => out[..9].copy_from_slice(&m.to_cols_array()),
            Self::Mat4(m) => out[..16].copy_from_slice(&m.to_cols_array()),
        }
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        Self::Scalar(v)
    }
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        Self::Vec2(v)
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        Self::Vec3(v)
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        Self::Vec4(v)
    }
}

impl From<Mat3> for UniformValue {
    fn from(v: Mat3) -> Self {
        Self::Mat3(v)
    }
}

impl From<Mat4> for UniformValue {
    fn from(v: Mat4) -> Self {
        Self::Mat4(v)
    }
}

/// A borrowed run of same-kind elements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformArray<'a> {
    Int(&'a [i32]),
    Scalar(&'a [f32]),
    Vec2(&'a [Vec2]),
    Vec3(&'a [Vec3]),
    Vec4(&'a [Vec4]),
    Mat3(&'a [Mat3]),
    Mat4(&'a [Mat4]),
}

impl UniformArray<'_> {
    #[must_use]
    pub fn kind(&self) -> SetterKind {
        match self {
            Self::Int(_) => SetterKind::Int,
            Self::Scalar(_) => SetterKind::Float1,
            Self::Vec2(_) => SetterKind::Float2,
            Self::Vec3(_) => SetterKind::Float3,
            Self::Vec4(_) => SetterKind::Float4,
            Self::Mat3(_) => SetterKind::Mat3,
            Self::Mat4(_) => SetterKind::Mat4,
        }
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Int(v) => v.len(),
            Self::Scalar(v) => v.len(),
            Self::Vec2(v) => v.len(),
            Self::Vec3(v) => v.len(),
            Self::Vec4(v) => v.len(),
            Self::Mat3(v) => v.len(),
            Self::Mat4(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat float view of the elements.
    #[must_use]
    pub fn as_floats(&self) -> &[f32] {
        match self {
            Self::Int(v) => bytemuck::cast_slice(v),
            Self::Scalar(v) => v,
            Self::Vec2(v) => bytemuck::cast_slice(v),
            Self::Vec3(v) => bytemuck::cast_slice(v),
            Self::Vec4(v) => bytemuck::cast_slice(v),
            Self::Mat3(v) => bytemuck::cast_slice(v),
            Self::Mat4(v) => bytemuck::cast_slice(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_bits_preserved() {
        let mut out = [0.0f32; 1];
        UniformValue::Int(-1).write_to(&mut out);
        assert_eq!(out[0].to_bits(), u32::MAX);
    }

    #[test]
    fn test_array_float_view() {
        let vecs = [Vec4::new(1.0, 2.0, 3.0, 4.0), Vec4::splat(5.0)];
        let array = UniformArray::Vec4(&vecs);
        assert_eq!(array.len(), 2);
        assert_eq!(array.as_floats().len(), 8);
        assert_eq!(array.as_floats()[2], 3.0);
    }

    #[test]
    fn test_mat3_is_nine_floats() {
        let m = [Mat3::IDENTITY];
        assert_eq!(UniformArray::Mat3(&m).as_floats().len(), 9);
        assert_eq!(SetterKind::Mat3.floats_per_element(), 9);
    }
}

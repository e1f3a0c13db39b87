//! Uniform payloads.
//!
//! A uniform payload is a short, fixed-capacity vector of scalars: one to
//! four for scalars and vectors, sixteen for a 4×4 matrix. Storing it inline
//! avoids a heap allocation per binding, which matters because the override
//! tracking copies payloads every draw.

use std::fmt;
use std::ops::Deref;

use bytemuck::Pod;
use glam::{Mat4, Vec2, Vec3, Vec4};
use prism_core::NameId;

use crate::device::UniformLocation;

/// Maximum number of scalars in one payload (a 4×4 matrix).
pub const UNIFORM_CAPACITY: usize = 16;

/// Inline vector of up to [`UNIFORM_CAPACITY`] scalars.
///
/// Values beyond the capacity are silently dropped on construction.
/// Equality compares the raw bits, so `-0.0 != 0.0` and `NaN == NaN` when
/// the bit patterns match. This is the comparison the uniform cache needs:
/// identical bits mean an identical upload.
#[derive(Clone, Copy)]
pub struct UniformVector<T: Pod> {
    data: [T; UNIFORM_CAPACITY],
    len: u8,
}

impl<T: Pod> UniformVector<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: [T::zeroed(); UNIFORM_CAPACITY],
            len: 0,
        }
    }

    /// Copies up to [`UNIFORM_CAPACITY`] values from `values`.
    #[must_use]
    pub fn from_slice(values: &[T]) -> Self {
        let mut vector = Self::new();
        vector.assign(values);
        vector
    }

    /// Replaces the contents with up to [`UNIFORM_CAPACITY`] values from `values`.
    pub fn assign(&mut self, values: &[T]) {
        let len = values.len().min(UNIFORM_CAPACITY);
        self.data[..len].copy_from_slice(&values[..len]);
        self.len = len as u8;
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data[..usize::from(self.len)]
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        usize::from(self.len)
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T: Pod> Default for UniformVector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Pod> Deref for UniformVector<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Pod> PartialEq for UniformVector<T> {
    fn eq(&self, other: &Self) -> bool {
        bytemuck::cast_slice::<T, u8>(self.as_slice())
            == bytemuck::cast_slice::<T, u8>(other.as_slice())
    }
}

impl<T: Pod> Eq for UniformVector<T> {}

impl<T: Pod + fmt::Debug> fmt::Debug for UniformVector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl<T: Pod + fmt::Display> fmt::Display for UniformVector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.as_slice().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        Ok(())
    }
}

impl<T: Pod> From<&[T]> for UniformVector<T> {
    fn from(values: &[T]) -> Self {
        Self::from_slice(values)
    }
}

impl<T: Pod, const N: usize> From<[T; N]> for UniformVector<T> {
    fn from(values: [T; N]) -> Self {
        Self::from_slice(&values)
    }
}

impl<T: Pod> From<Vec<T>> for UniformVector<T> {
    fn from(values: Vec<T>) -> Self {
        Self::from_slice(&values)
    }
}

impl From<f32> for UniformVector<f32> {
    fn from(value: f32) -> Self {
        Self::from_slice(&[value])
    }
}

impl From<Vec2> for UniformVector<f32> {
    fn from(value: Vec2) -> Self {
        Self::from_slice(&value.to_array())
    }
}

impl From<Vec3> for UniformVector<f32> {
    fn from(value: Vec3) -> Self {
        Self::from_slice(&value.to_array())
    }
}

impl From<Vec4> for UniformVector<f32> {
    fn from(value: Vec4) -> Self {
        Self::from_slice(&value.to_array())
    }
}

impl From<Mat4> for UniformVector<f32> {
    /// Column-major, matching what the shader expects.
    fn from(value: Mat4) -> Self {
        Self::from_slice(&value.to_cols_array())
    }
}

/// Float payload, the shape every configured uniform takes.
pub type UniformData = UniformVector<f32>;

/// A uniform addressed by variable name, as supplied by scene code.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformEntry {
    pub name: NameId,
    pub data: UniformData,
}

impl UniformEntry {
    #[must_use]
    pub fn new(name: NameId, data: impl Into<UniformData>) -> Self {
        Self {
            name,
            data: data.into(),
        }
    }
}

/// A uniform resolved to a location in a specific pass's program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundUniform {
    pub location: UniformLocation,
    pub data: UniformData,
}

impl BoundUniform {
    #[must_use]
    pub fn new(location: UniformLocation, data: impl Into<UniformData>) -> Self {
        Self {
            location,
            data: data.into(),
        }
    }
}

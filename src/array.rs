//! Typed one-dimensional buffers.
//!
//! [`VariantArray`] is a closed enum over the element kinds the container
//! format can hold, wrapping one contiguous `Vec` per kind. The reader
//! dispatches on the kind at the two I/O sites and at the serialization
//! boundary; everywhere else the array is passed around opaquely.

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// The closed set of element kinds a [`VariantArray`] can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Char,
}

impl ElementKind {
    /// Stable lowercase name, used wherever a kind is stored as a string.
    pub fn name(self) -> &'static str {
        match self {
            ElementKind::I8 => "int8",
            ElementKind::U8 => "uint8",
            ElementKind::I16 => "int16",
            ElementKind::U16 => "uint16",
            ElementKind::I32 => "int32",
            ElementKind::U32 => "uint32",
            ElementKind::I64 => "int64",
            ElementKind::U64 => "uint64",
            ElementKind::F32 => "float32",
            ElementKind::F64 => "float64",
            ElementKind::Char => "char",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "int8" => Ok(ElementKind::I8),
            "uint8" => Ok(ElementKind::U8),
            "int16" => Ok(ElementKind::I16),
            "uint16" => Ok(ElementKind::U16),
            "int32" => Ok(ElementKind::I32),
            "uint32" => Ok(ElementKind::U32),
            "int64" => Ok(ElementKind::I64),
            "uint64" => Ok(ElementKind::U64),
            "float32" => Ok(ElementKind::F32),
            "float64" => Ok(ElementKind::F64),
            "char" => Ok(ElementKind::Char),
            other => Err(Error::UnsupportedKind { kind: other.to_string() }),
        }
    }
}

/// A typed, contiguous, resizable one-dimensional buffer.
///
/// The kind is fixed at construction; operations that combine two arrays
/// require matching kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VariantArray {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    /// Character data stored as raw bytes, matching the format's char kind.
    Char(Vec<u8>),
}

impl VariantArray {
    /// Construct an array of `len` default-valued elements of the given kind.
    pub fn new(kind: ElementKind, len: usize) -> Self {
        match kind {
            ElementKind::I8 => VariantArray::I8(vec![0; len]),
            ElementKind::U8 => VariantArray::U8(vec![0; len]),
            ElementKind::I16 => VariantArray::I16(vec![0; len]),
            ElementKind::U16 => VariantArray::U16(vec![0; len]),
            ElementKind::I32 => VariantArray::I32(vec![0; len]),
            ElementKind::U32 => VariantArray::U32(vec![0; len]),
            ElementKind::I64 => VariantArray::I64(vec![0; len]),
            ElementKind::U64 => VariantArray::U64(vec![0; len]),
            ElementKind::F32 => VariantArray::F32(vec![0.0; len]),
            ElementKind::F64 => VariantArray::F64(vec![0.0; len]),
            ElementKind::Char => VariantArray::Char(vec![0; len]),
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            VariantArray::I8(_) => ElementKind::I8,
            VariantArray::U8(_) => ElementKind::U8,
            VariantArray::I16(_) => ElementKind::I16,
            VariantArray::U16(_) => ElementKind::U16,
            VariantArray::I32(_) => ElementKind::I32,
            VariantArray::U32(_) => ElementKind::U32,
            VariantArray::I64(_) => ElementKind::I64,
            VariantArray::U64(_) => ElementKind::U64,
            VariantArray::F32(_) => ElementKind::F32,
            VariantArray::F64(_) => ElementKind::F64,
            VariantArray::Char(_) => ElementKind::Char,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            VariantArray::I8(v) => v.len(),
            VariantArray::U8(v) => v.len(),
            VariantArray::I16(v) => v.len(),
            VariantArray::U16(v) => v.len(),
            VariantArray::I32(v) => v.len(),
            VariantArray::U32(v) => v.len(),
            VariantArray::I64(v) => v.len(),
            VariantArray::U64(v) => v.len(),
            VariantArray::F32(v) => v.len(),
            VariantArray::F64(v) => v.len(),
            VariantArray::Char(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grow or shrink to `len`, filling new elements with the default value.
    pub fn resize(&mut self, len: usize) {
        match self {
            VariantArray::I8(v) => v.resize(len, 0),
            VariantArray::U8(v) => v.resize(len, 0),
            VariantArray::I16(v) => v.resize(len, 0),
            VariantArray::U16(v) => v.resize(len, 0),
            VariantArray::I32(v) => v.resize(len, 0),
            VariantArray::U32(v) => v.resize(len, 0),
            VariantArray::I64(v) => v.resize(len, 0),
            VariantArray::U64(v) => v.resize(len, 0),
            VariantArray::F32(v) => v.resize(len, 0.0),
            VariantArray::F64(v) => v.resize(len, 0.0),
            VariantArray::Char(v) => v.resize(len, 0),
        }
    }

    /// Element at `idx`, cast to `f64`. `None` when out of range.
    pub fn get_f64(&self, idx: usize) -> Option<f64> {
        if idx >= self.len() {
            return None;
        }
        Some(match self {
            VariantArray::I8(v) => v[idx] as f64,
            VariantArray::U8(v) => v[idx] as f64,
            VariantArray::I16(v) => v[idx] as f64,
            VariantArray::U16(v) => v[idx] as f64,
            VariantArray::I32(v) => v[idx] as f64,
            VariantArray::U32(v) => v[idx] as f64,
            VariantArray::I64(v) => v[idx] as f64,
            VariantArray::U64(v) => v[idx] as f64,
            VariantArray::F32(v) => v[idx] as f64,
            VariantArray::F64(v) => v[idx],
            VariantArray::Char(v) => v[idx] as f64,
        })
    }

    /// Element at `idx`, cast to `i64`. `None` when out of range.
    pub fn get_i64(&self, idx: usize) -> Option<i64> {
        if idx >= self.len() {
            return None;
        }
        Some(match self {
            VariantArray::I8(v) => v[idx] as i64,
            VariantArray::U8(v) => v[idx] as i64,
            VariantArray::I16(v) => v[idx] as i64,
            VariantArray::U16(v) => v[idx] as i64,
            VariantArray::I32(v) => v[idx] as i64,
            VariantArray::U32(v) => v[idx] as i64,
            VariantArray::I64(v) => v[idx],
            VariantArray::U64(v) => v[idx] as i64,
            VariantArray::F32(v) => v[idx] as i64,
            VariantArray::F64(v) => v[idx] as i64,
            VariantArray::Char(v) => v[idx] as i64,
        })
    }

    /// Store `value` at `idx`, cast to this array's kind.
    pub fn set_f64(&mut self, idx: usize, value: f64) -> Result<()> {
        let len = self.len();
        if idx >= len {
            return Err(Error::OutOfBounds { lo: idx, hi: idx, len });
        }
        match self {
            VariantArray::I8(v) => v[idx] = value as i8,
            VariantArray::U8(v) => v[idx] = value as u8,
            VariantArray::I16(v) => v[idx] = value as i16,
            VariantArray::U16(v) => v[idx] = value as u16,
            VariantArray::I32(v) => v[idx] = value as i32,
            VariantArray::U32(v) => v[idx] = value as u32,
            VariantArray::I64(v) => v[idx] = value as i64,
            VariantArray::U64(v) => v[idx] = value as u64,
            VariantArray::F32(v) => v[idx] = value as f32,
            VariantArray::F64(v) => v[idx] = value,
            VariantArray::Char(v) => v[idx] = value as u8,
        }
        Ok(())
    }

    /// Append all elements of `other`, which must have the same kind.
    pub fn append(&mut self, other: &VariantArray) -> Result<()> {
        match (self, other) {
            (VariantArray::I8(a), VariantArray::I8(b)) => a.extend_from_slice(b),
            (VariantArray::U8(a), VariantArray::U8(b)) => a.extend_from_slice(b),
            (VariantArray::I16(a), VariantArray::I16(b)) => a.extend_from_slice(b),
            (VariantArray::U16(a), VariantArray::U16(b)) => a.extend_from_slice(b),
            (VariantArray::I32(a), VariantArray::I32(b)) => a.extend_from_slice(b),
            (VariantArray::U32(a), VariantArray::U32(b)) => a.extend_from_slice(b),
            (VariantArray::I64(a), VariantArray::I64(b)) => a.extend_from_slice(b),
            (VariantArray::U64(a), VariantArray::U64(b)) => a.extend_from_slice(b),
            (VariantArray::F32(a), VariantArray::F32(b)) => a.extend_from_slice(b),
            (VariantArray::F64(a), VariantArray::F64(b)) => a.extend_from_slice(b),
            (VariantArray::Char(a), VariantArray::Char(b)) => a.extend_from_slice(b),
            (a, b) => {
                return Err(Error::KindMismatch { left: a.kind(), right: b.kind() });
            }
        }
        Ok(())
    }

    /// Copy of the inclusive index range `lo..=hi` as a new array.
    pub fn slice(&self, lo: usize, hi: usize) -> Result<VariantArray> {
        let len = self.len();
        if hi >= len || lo > hi {
            return Err(Error::OutOfBounds { lo, hi, len });
        }
        Ok(match self {
            VariantArray::I8(v) => VariantArray::I8(v[lo..=hi].to_vec()),
            VariantArray::U8(v) => VariantArray::U8(v[lo..=hi].to_vec()),
            VariantArray::I16(v) => VariantArray::I16(v[lo..=hi].to_vec()),
            VariantArray::U16(v) => VariantArray::U16(v[lo..=hi].to_vec()),
            VariantArray::I32(v) => VariantArray::I32(v[lo..=hi].to_vec()),
            VariantArray::U32(v) => VariantArray::U32(v[lo..=hi].to_vec()),
            VariantArray::I64(v) => VariantArray::I64(v[lo..=hi].to_vec()),
            VariantArray::U64(v) => VariantArray::U64(v[lo..=hi].to_vec()),
            VariantArray::F32(v) => VariantArray::F32(v[lo..=hi].to_vec()),
            VariantArray::F64(v) => VariantArray::F64(v[lo..=hi].to_vec()),
            VariantArray::Char(v) => VariantArray::Char(v[lo..=hi].to_vec()),
        })
    }

    /// Typed view of the backing storage for `float32` arrays.
    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            VariantArray::F32(v) => Some(v),
            _ => None,
        }
    }

    /// Typed view of the backing storage for `float64` arrays.
    pub fn as_f64(&self) -> Option<&[f64]> {
        match self {
            VariantArray::F64(v) => Some(v),
            _ => None,
        }
    }

    /// Typed view of the backing storage for `uint64` arrays.
    pub fn as_u64(&self) -> Option<&[u64]> {
        match self {
            VariantArray::U64(v) => Some(v),
            _ => None,
        }
    }
}

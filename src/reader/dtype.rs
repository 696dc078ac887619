use netcdf::types::{FloatType, IntType, NcVariableType};

use crate::array::ElementKind;
use crate::errors::{Error, Result};

/// Map a container element type to an [`ElementKind`]. The format's string,
/// opaque, enum, compound and vlen types have no counterpart here.
pub(crate) fn element_kind(vartype: &NcVariableType) -> Result<ElementKind> {
    match vartype {
        NcVariableType::Int(IntType::I8) => Ok(ElementKind::I8),
        NcVariableType::Int(IntType::U8) => Ok(ElementKind::U8),
        NcVariableType::Int(IntType::I16) => Ok(ElementKind::I16),
        NcVariableType::Int(IntType::U16) => Ok(ElementKind::U16),
        NcVariableType::Int(IntType::I32) => Ok(ElementKind::I32),
        NcVariableType::Int(IntType::U32) => Ok(ElementKind::U32),
        NcVariableType::Int(IntType::I64) => Ok(ElementKind::I64),
        NcVariableType::Int(IntType::U64) => Ok(ElementKind::U64),
        NcVariableType::Float(FloatType::F32) => Ok(ElementKind::F32),
        NcVariableType::Float(FloatType::F64) => Ok(ElementKind::F64),
        NcVariableType::Char => Ok(ElementKind::Char),
        other => Err(Error::UnsupportedKind { kind: format!("{other:?}") }),
    }
}

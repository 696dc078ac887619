//! First-file schema introspection.
//!
//! The first file of the set is taken as authoritative for the mesh geometry
//! and the per-variable schema; only time coordinates are consolidated
//! across the rest of the set.

use tracing::debug;

use crate::array::{ElementKind, VariantArray};
use crate::errors::{Error, Result};
use crate::meta::Metadata;
use crate::reader::dtype::element_kind;

/// Everything the metadata phase learns from the first file.
pub(crate) struct Schema {
    pub(crate) x: VariantArray,
    pub(crate) y: VariantArray,
    pub(crate) z: VariantArray,
    pub(crate) variables: Vec<String>,
    pub(crate) time_variables: Vec<String>,
    pub(crate) attributes: Metadata,
}

pub(crate) fn introspect(
    nc: &netcdf::File,
    x_axis: &str,
    y_axis: Option<&str>,
    z_axis: Option<&str>,
    t_axis: Option<&str>,
) -> Result<Schema> {
    let x = read_axis(nc, x_axis)?;
    // an unconfigured spatial axis collapses to a single default-valued
    // element of the x axis's kind
    let y = match y_axis {
        Some(name) => read_axis(nc, name)?,
        None => VariantArray::new(x.kind(), 1),
    };
    let z = match z_axis {
        Some(name) => read_axis(nc, name)?,
        None => VariantArray::new(x.kind(), 1),
    };

    let mut variables = Vec::new();
    let mut time_variables = Vec::new();
    let mut attributes = Metadata::new();

    for var in nc.variables() {
        let name = var.name().to_string();
        let dims: Vec<String> = var
            .dimensions()
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        if dims.is_empty() {
            continue;
        }
        let kind = match element_kind(&var.vartype()) {
            Ok(kind) => kind,
            Err(e) => {
                debug!(variable = %name, "skipping variable: {e}");
                continue;
            }
        };
        let shape: Vec<u64> = var.dimensions().iter().map(|d| d.len() as u64).collect();

        let mut atts = Metadata::new();
        atts.insert("type", kind.name());
        atts.insert("dims", dims.clone());
        atts.insert("shape", VariantArray::U64(shape));
        atts.insert("centering", "point");
        for att in var.attributes() {
            if let Ok(netcdf::AttributeValue::Str(text)) = att.value() {
                atts.insert(att.name(), trim_attr(&text));
            }
        }

        // a variable shaped by the time axis alone is a per-step scalar; the
        // time coordinate itself is already the t axis
        if dims.len() == 1 && Some(dims[0].as_str()) == t_axis && Some(name.as_str()) != t_axis {
            time_variables.push(name.clone());
        }
        attributes.insert(name.clone(), atts);
        variables.push(name);
    }

    Ok(Schema { x, y, z, variables, time_variables, attributes })
}

/// Read a coordinate axis variable in full. Axes must be floating point.
fn read_axis(nc: &netcdf::File, name: &str) -> Result<VariantArray> {
    let var = nc.variable(name).ok_or_else(|| Error::SchemaQueryFailed {
        name: name.to_string(),
        detail: "no such variable".to_string(),
    })?;
    let kind = element_kind(&var.vartype())?;
    match kind {
        ElementKind::F32 => var
            .get_values::<f32, _>(..)
            .map(VariantArray::F32)
            .map_err(|source| Error::AxisReadFailed { name: name.to_string(), source }),
        ElementKind::F64 => var
            .get_values::<f64, _>(..)
            .map(VariantArray::F64)
            .map_err(|source| Error::AxisReadFailed { name: name.to_string(), source }),
        other => Err(Error::UnsupportedKind { kind: other.name().to_string() }),
    }
}

/// Strip trailing whitespace and control bytes left by fixed-length
/// attribute padding.
pub(crate) fn trim_attr(text: &str) -> String {
    text.trim_end_matches(|c: char| c.is_whitespace() || c.is_control())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_padding_is_trimmed() {
        assert_eq!(trim_attr("days since 2000-01-01\0\0"), "days since 2000-01-01");
        assert_eq!(trim_attr("K  \t"), "K");
        assert_eq!(trim_attr("plain"), "plain");
        assert_eq!(trim_attr(""), "");
    }
}

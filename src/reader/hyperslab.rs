//! Step-to-file resolution and kind-dispatched hyperslab reads.

use netcdf::{Extent, Extents};
use snafu::prelude::*;

use crate::array::{ElementKind, VariantArray};
use crate::errors::{HyperslabReadFailedSnafu, Result, UnsupportedKindSnafu};

/// Walk `step_count` to the file holding `time_step`, returning the file
/// index and the intra-file step offset. A step past the end of the axis
/// clamps to the last valid step of the last file.
pub(crate) fn resolve_step(step_count: &[u64], time_step: u64) -> (usize, u64) {
    let mut acc = 0u64;
    let mut idx = 0usize;
    for (i, &count) in step_count.iter().enumerate() {
        idx = i;
        if time_step < acc + count {
            return (i, time_step - acc);
        }
        acc += count;
    }
    let last = step_count.get(idx).copied().unwrap_or(0);
    (idx, last.saturating_sub(1))
}

fn extents_of(starts: &[usize], counts: &[usize]) -> Extents {
    starts
        .iter()
        .zip(counts)
        .map(|(&start, &count)| Extent::from(start..start + count))
        .collect::<Vec<Extent>>()
        .into()
}

/// Read the (start, count) hyperslab of `var` into a fresh array of `kind`.
pub(crate) fn read_hyperslab(
    var: &netcdf::Variable,
    kind: ElementKind,
    starts: &[usize],
    counts: &[usize],
) -> Result<VariantArray> {
    let name = var.name();
    let extents = extents_of(starts, counts);
    match kind {
        ElementKind::I8 => Ok(VariantArray::I8(
            var.get_values::<i8, _>(extents).context(HyperslabReadFailedSnafu { name })?,
        )),
        ElementKind::U8 => Ok(VariantArray::U8(
            var.get_values::<u8, _>(extents).context(HyperslabReadFailedSnafu { name })?,
        )),
        ElementKind::I16 => Ok(VariantArray::I16(
            var.get_values::<i16, _>(extents).context(HyperslabReadFailedSnafu { name })?,
        )),
        ElementKind::U16 => Ok(VariantArray::U16(
            var.get_values::<u16, _>(extents).context(HyperslabReadFailedSnafu { name })?,
        )),
        ElementKind::I32 => Ok(VariantArray::I32(
            var.get_values::<i32, _>(extents).context(HyperslabReadFailedSnafu { name })?,
        )),
        ElementKind::U32 => Ok(VariantArray::U32(
            var.get_values::<u32, _>(extents).context(HyperslabReadFailedSnafu { name })?,
        )),
        ElementKind::I64 => Ok(VariantArray::I64(
            var.get_values::<i64, _>(extents).context(HyperslabReadFailedSnafu { name })?,
        )),
        ElementKind::U64 => Ok(VariantArray::U64(
            var.get_values::<u64, _>(extents).context(HyperslabReadFailedSnafu { name })?,
        )),
        ElementKind::F32 => Ok(VariantArray::F32(
            var.get_values::<f32, _>(extents).context(HyperslabReadFailedSnafu { name })?,
        )),
        ElementKind::F64 => Ok(VariantArray::F64(
            var.get_values::<f64, _>(extents).context(HyperslabReadFailedSnafu { name })?,
        )),
        ElementKind::Char => UnsupportedKindSnafu { kind: "char" }.fail(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_resolution_walks_per_file_counts() {
        let counts = [3, 2];
        assert_eq!(resolve_step(&counts, 0), (0, 0));
        assert_eq!(resolve_step(&counts, 2), (0, 2));
        assert_eq!(resolve_step(&counts, 3), (1, 0));
        assert_eq!(resolve_step(&counts, 4), (1, 1));
    }

    #[test]
    fn last_step_lands_on_last_file() {
        let counts = [4, 4, 1];
        assert_eq!(resolve_step(&counts, 8), (2, 0));
    }

    #[test]
    fn out_of_range_step_is_clamped() {
        let counts = [3, 2];
        assert_eq!(resolve_step(&counts, 5), (1, 1));
        assert_eq!(resolve_step(&counts, 100), (1, 1));
    }

    #[test]
    fn degenerate_counts_do_not_panic() {
        assert_eq!(resolve_step(&[], 0), (0, 0));
        assert_eq!(resolve_step(&[0], 0), (0, 0));
        assert_eq!(resolve_step(&[3, 0], 2), (0, 2));
        assert_eq!(resolve_step(&[3, 0], 3), (1, 0));
    }
}

//! Parallel consolidation of the time axis across the file set.
//!
//! Per-file opens dominate on networked filesystems, so every file's time
//! coordinate is read by its own pool task. Results are keyed by file index
//! and assembled in enumeration order, independent of completion order.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error};

use crate::array::{ElementKind, VariantArray};
use crate::errors::{Error, Result, TimeAxisReadSnafu};
use crate::handles::HandleCache;
use crate::pool::TaskPool;
use crate::reader::dtype::element_kind;
use crate::reader::hyperslab::read_hyperslab;
use snafu::prelude::*;

/// Read every file's time coordinate and concatenate them in file order.
/// Returns the global axis and the per-file step counts.
pub(crate) fn read_time_axis(
    cache: &Arc<HandleCache>,
    root: &Path,
    files: &[String],
    t_axis: Option<&str>,
    pool_size: i64,
) -> Result<(VariantArray, Vec<u64>)> {
    let t_axis = match t_axis {
        Some(name) => name,
        None => {
            // no time axis configured: one synthetic step
            let mut axis = VariantArray::new(ElementKind::F64, 1);
            axis.set_f64(0, 0.0)?;
            return Ok((axis, vec![1]));
        }
    };

    let mut pool = TaskPool::new(pool_size)?;
    for (index, file) in files.iter().enumerate() {
        let cache = Arc::clone(cache);
        let path = root.join(file);
        let file = file.clone();
        let name = t_axis.to_string();
        pool.submit(move || (index, read_file_time(&cache, &path, &file, &name)));
    }
    let mut by_index: BTreeMap<usize, VariantArray> = pool.wait_all().into_iter().collect();
    debug!(files = files.len(), "time axis tasks complete");

    let mut axis: Option<VariantArray> = None;
    let mut step_count = Vec::with_capacity(files.len());
    for (index, file) in files.iter().enumerate() {
        let piece = by_index
            .remove(&index)
            .unwrap_or_else(|| VariantArray::new(ElementKind::F64, 0));
        if index == 0 {
            ensure!(!piece.is_empty(), TimeAxisReadSnafu { file });
            step_count.push(piece.len() as u64);
            axis = Some(piece);
        } else if piece.is_empty() {
            step_count.push(0);
        } else {
            let axis = axis.as_mut().expect("seeded by the first file");
            match axis.append(&piece) {
                Ok(()) => step_count.push(piece.len() as u64),
                Err(e) => {
                    error!(file = %file, "dropping time coordinate: {e}");
                    step_count.push(0);
                }
            }
        }
    }
    let axis = axis.ok_or_else(|| Error::TimeAxisRead { file: String::new() })?;
    Ok((axis, step_count))
}

/// One pool task: read the full time coordinate of a single file. Failures
/// degrade to an empty array so the assembler can decide what is fatal.
fn read_file_time(cache: &HandleCache, path: &Path, file: &str, t_axis: &str) -> VariantArray {
    match try_read(cache, path, file, t_axis) {
        Ok(axis) => axis,
        Err(e) => {
            error!(file = %file, "time axis read failed: {e}");
            VariantArray::new(ElementKind::F64, 0)
        }
    }
}

fn try_read(cache: &HandleCache, path: &Path, file: &str, t_axis: &str) -> Result<VariantArray> {
    let entry = cache.acquire(file)?;
    let axis = entry.with_open(path, |nc| {
        let var = nc.variable(t_axis).ok_or_else(|| Error::SchemaQueryFailed {
            name: t_axis.to_string(),
            detail: "no such variable".to_string(),
        })?;
        let kind = element_kind(&var.vartype())?;
        let len = var.dimensions().first().map(|d| d.len()).unwrap_or(0);
        read_hyperslab(&var, kind, &[0], &[len])
    });
    // handles opened for the time scan are not kept; the execute phase
    // reopens on demand
    cache.release(file);
    axis
}

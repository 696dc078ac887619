//! The multi-file CF/NetCDF reader.
//!
//! [`CfReader`] is a two-phase pipeline stage. The metadata phase
//! ([`CfReader::metadata`]) consolidates the file set into one global
//! metadata record — schema from the first file, time axis concatenated
//! across all files — and distributes it over the process group so only the
//! coordinator touches the filesystem. The execute phase
//! ([`CfReader::execute`]) resolves a time-step request to a file and
//! intra-file offset and serves a populated [`CartesianMesh`].

mod dtype;
mod hyperslab;
mod schema;
mod time_axis;

use std::path::Path;
use std::sync::{Arc, Mutex};

use smallvec::SmallVec;
use tracing::{debug, error};

use crate::array::{ElementKind, VariantArray};
use crate::comm::Communicator;
use crate::errors::{Error, Result};
use crate::files;
use crate::handles::HandleCache;
use crate::mesh::CartesianMesh;
use crate::meta::Metadata;

use hyperslab::{read_hyperslab, resolve_step};

/// Reader over a time-ordered set of CF/NetCDF files forming one logical
/// dataset.
pub struct CfReader {
    files_regex: Option<String>,
    file_name: Option<String>,
    x_axis_variable: String,
    y_axis_variable: Option<String>,
    z_axis_variable: Option<String>,
    t_axis_variable: Option<String>,
    thread_pool_size: i64,
    cache: Arc<HandleCache>,
    metadata: Mutex<Option<Metadata>>,
}

impl Default for CfReader {
    fn default() -> Self {
        Self {
            files_regex: None,
            file_name: None,
            x_axis_variable: "lon".to_string(),
            y_axis_variable: Some("lat".to_string()),
            z_axis_variable: None,
            t_axis_variable: Some("time".to_string()),
            thread_pool_size: -1,
            cache: Arc::new(HandleCache::new()),
            metadata: Mutex::new(None),
        }
    }
}

impl CfReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the file set by directory + basename regex, e.g.
    /// `/data/cam5/cam5_1_amip_run2\.cam2\.h2\..*\.nc`.
    pub fn set_files_regex(&mut self, pattern: impl Into<String>) {
        self.files_regex = Some(pattern.into());
        self.file_name = None;
        self.invalidate();
    }

    /// Select a single file by path.
    pub fn set_file_name(&mut self, name: impl Into<String>) {
        self.file_name = Some(name.into());
        self.files_regex = None;
        self.invalidate();
    }

    pub fn set_x_axis_variable(&mut self, name: impl Into<String>) {
        self.x_axis_variable = name.into();
        self.invalidate();
    }

    pub fn set_y_axis_variable<S: Into<String>>(&mut self, name: Option<S>) {
        self.y_axis_variable = name.map(Into::into);
        self.invalidate();
    }

    pub fn set_z_axis_variable<S: Into<String>>(&mut self, name: Option<S>) {
        self.z_axis_variable = name.map(Into::into);
        self.invalidate();
    }

    pub fn set_t_axis_variable<S: Into<String>>(&mut self, name: Option<S>) {
        self.t_axis_variable = name.map(Into::into);
        self.invalidate();
    }

    /// Worker count for the metadata-phase time scan; values `<= 0` select
    /// one worker per hardware thread.
    pub fn set_thread_pool_size(&mut self, size: i64) {
        self.thread_pool_size = size;
        self.invalidate();
    }

    /// Drop the cached metadata record and all cached handles. Every
    /// configuration change funnels through here.
    fn invalidate(&self) {
        *self.metadata.lock().expect("metadata lock poisoned") = None;
        self.cache.clear();
    }

    /// Metadata phase. The coordinator (highest rank) assembles the global
    /// record and broadcasts it; other ranks receive it and seed their
    /// handle caches from its file list. Subsequent calls return the cached
    /// record until the configuration changes.
    pub fn metadata(&self, comm: &dyn Communicator) -> Result<Metadata> {
        if let Some(md) = self.metadata.lock().expect("metadata lock poisoned").clone() {
            return Ok(md);
        }
        let coordinator = comm.size() - 1;
        let md = if comm.rank() == coordinator {
            match self.assemble() {
                Ok(md) => {
                    if comm.size() > 1 {
                        let mut bytes = md.to_bytes()?;
                        let mut len = bytes.len() as u64;
                        comm.bcast_u64(&mut len, coordinator)?;
                        comm.bcast_bytes(&mut bytes, coordinator)?;
                        debug!(bytes = bytes.len(), "metadata record broadcast");
                    }
                    md
                }
                Err(e) => {
                    self.cache.clear();
                    // peers block on the length; zero tells them the phase
                    // is aborted
                    if comm.size() > 1 {
                        let mut len = 0u64;
                        comm.bcast_u64(&mut len, coordinator)?;
                    }
                    return Err(e);
                }
            }
        } else {
            let mut len = 0u64;
            comm.bcast_u64(&mut len, coordinator)?;
            if len == 0 {
                return Err(Error::BroadcastFailed {
                    reason: "coordinator aborted the metadata phase".to_string(),
                });
            }
            let mut bytes = vec![0u8; len as usize];
            comm.bcast_bytes(&mut bytes, coordinator)?;
            let md = Metadata::from_bytes(&bytes)?;
            let file_names = md.get_str_list("files")?.to_vec();
            self.cache.initialize(&file_names);
            md
        };
        *self.metadata.lock().expect("metadata lock poisoned") = Some(md.clone());
        Ok(md)
    }

    /// Coordinator-side assembly of the global metadata record.
    fn assemble(&self) -> Result<Metadata> {
        let (root, file_names) =
            files::enumerate(self.file_name.as_deref(), self.files_regex.as_deref())?;
        self.cache.initialize(&file_names);
        debug!(files = file_names.len(), root = %root.display(), "file set enumerated");

        let first = &file_names[0];
        let entry = self.cache.acquire(first)?;
        let schema = entry.with_open(&root.join(first), |nc| {
            schema::introspect(
                nc,
                &self.x_axis_variable,
                self.y_axis_variable.as_deref(),
                self.z_axis_variable.as_deref(),
                self.t_axis_variable.as_deref(),
            )
        })?;
        self.cache.release(first);

        let (t_axis, step_count) = time_axis::read_time_axis(
            &self.cache,
            &root,
            &file_names,
            self.t_axis_variable.as_deref(),
            self.thread_pool_size,
        )?;

        for (name, axis) in [("x", &schema.x), ("y", &schema.y), ("z", &schema.z)] {
            if axis.is_empty() {
                return Err(Error::SchemaQueryFailed {
                    name: name.to_string(),
                    detail: "coordinate axis is empty".to_string(),
                });
            }
        }
        let (nx, ny, nz) = (
            schema.x.len() as u64,
            schema.y.len() as u64,
            schema.z.len() as u64,
        );
        let steps = t_axis.len() as u64;

        let mut coords = Metadata::new();
        coords.insert("x_variable", self.x_axis_variable.clone());
        coords.insert(
            "y_variable",
            self.y_axis_variable.clone().unwrap_or_else(|| "y".to_string()),
        );
        coords.insert(
            "z_variable",
            self.z_axis_variable.clone().unwrap_or_else(|| "z".to_string()),
        );
        coords.insert(
            "t_variable",
            self.t_axis_variable.clone().unwrap_or_else(|| "t".to_string()),
        );
        coords.insert("x", schema.x);
        coords.insert("y", schema.y);
        coords.insert("z", schema.z);
        coords.insert("t", t_axis);

        let mut md = Metadata::new();
        md.insert("variables", schema.variables);
        md.insert("attributes", schema.attributes);
        md.insert("time variables", schema.time_variables);
        md.insert("coordinates", coords);
        md.insert(
            "whole_extent",
            VariantArray::U64(vec![0, nx - 1, 0, ny - 1, 0, nz - 1]),
        );
        md.insert("files", file_names);
        md.insert("root", root.to_string_lossy().into_owned());
        md.insert("step_count", VariantArray::U64(step_count));
        md.insert("number_of_time_steps", VariantArray::U64(vec![steps]));
        Ok(md)
    }

    /// Execute phase: serve one time step of the dataset on the requested
    /// sub-extent. Per-array failures are logged and skipped; a request
    /// against incomplete cached metadata is fatal.
    pub fn execute(&self, request: &Metadata) -> Result<CartesianMesh> {
        let md = self
            .metadata
            .lock()
            .expect("metadata lock poisoned")
            .clone()
            .ok_or_else(|| Error::MetadataMissing { key: "metadata record".to_string() })?;

        let coords = md.get_nested("coordinates")?;
        let whole_extent = to_extent(&md.get_u64s("whole_extent")?)?;
        let step_count = md.get_u64s("step_count")?;
        let root = md.get_str("root")?.to_string();
        let file_names = md.get_str_list("files")?;

        let time_step = if request.contains("time_step") {
            request.get_u64("time_step")?
        } else {
            0
        };
        let extent = if request.contains("extent") {
            to_extent(&request.get_u64s("extent")?)?
        } else {
            whole_extent
        };
        let requested: Vec<String> = if request.contains("arrays") {
            request.get_str_list("arrays")?.to_vec()
        } else {
            Vec::new()
        };

        let (file_index, offset) = resolve_step(&step_count, time_step);
        let file = &file_names[file_index];
        let path = Path::new(&root).join(file);
        debug!(file = %file, offset, time_step, "resolved time step");

        let mut mesh = CartesianMesh::new(whole_extent, extent);
        mesh.set_time_step(time_step);

        let x = coords.get_array("x")?;
        let y = coords.get_array("y")?;
        let z = coords.get_array("z")?;
        let t = coords.get_array("t")?;
        mesh.set_x_coords(x.slice(extent[0] as usize, extent[1] as usize)?);
        mesh.set_y_coords(y.slice(extent[2] as usize, extent[3] as usize)?);
        mesh.set_z_coords(z.slice(extent[4] as usize, extent[5] as usize)?);

        let mut step_time = VariantArray::new(t.kind(), 1);
        if let Some(time) = t.get_f64(time_step as usize) {
            mesh.set_time(time);
            step_time.set_f64(0, time)?;
        }
        mesh.set_t_coords(step_time);

        // calendar and units ride on the time variable's attributes
        if let Some(t_name) = self.t_axis_variable.as_deref() {
            if let Ok(t_atts) = md.get_nested("attributes").and_then(|a| a.get_nested(t_name)) {
                if let Ok(calendar) = t_atts.get_str("calendar") {
                    mesh.set_calendar(calendar);
                }
                if let Ok(units) = t_atts.get_str("units") {
                    mesh.set_time_units(units);
                }
            }
        }

        let target_dims = self.target_dimensions();
        let (starts, counts) = self.slab_for(&extent, offset);
        let time_variables: Vec<String> = md
            .get_str_list("time variables")
            .map(|v| v.to_vec())
            .unwrap_or_default();

        let entry = self.cache.acquire(file)?;
        entry.with_open(&path, |nc| {
            for name in &requested {
                match read_point_array(nc, &md, name, &target_dims, &starts, &counts) {
                    Ok(array) => {
                        if let Err(e) = mesh.add_point_array(name.clone(), array) {
                            error!(array = %name, "dropping point array: {e}");
                        }
                    }
                    Err(e) => error!(array = %name, "skipping point array: {e}"),
                }
            }
            for name in &time_variables {
                match read_time_scalar(nc, &md, name, offset) {
                    Ok(array) => mesh.add_info_array(name.clone(), array),
                    Err(e) => error!(array = %name, "skipping time variable: {e}"),
                }
            }
            Ok(())
        })?;

        Ok(mesh)
    }

    /// Dimension-name order of a mesh variable: (t?, z?, y?, x), omitting
    /// unconfigured axes.
    fn target_dimensions(&self) -> Vec<String> {
        let mut dims = Vec::with_capacity(4);
        if let Some(t) = &self.t_axis_variable {
            dims.push(t.clone());
        }
        if let Some(z) = &self.z_axis_variable {
            dims.push(z.clone());
        }
        if let Some(y) = &self.y_axis_variable {
            dims.push(y.clone());
        }
        dims.push(self.x_axis_variable.clone());
        dims
    }

    /// Hyperslab (start, count) vectors matching the target dimension order.
    fn slab_for(
        &self,
        extent: &[u64; 6],
        offset: u64,
    ) -> (SmallVec<[usize; 4]>, SmallVec<[usize; 4]>) {
        let mut starts: SmallVec<[usize; 4]> = SmallVec::new();
        let mut counts: SmallVec<[usize; 4]> = SmallVec::new();
        if self.t_axis_variable.is_some() {
            starts.push(offset as usize);
            counts.push(1);
        }
        if self.z_axis_variable.is_some() {
            starts.push(extent[4] as usize);
            counts.push((extent[5] - extent[4] + 1) as usize);
        }
        if self.y_axis_variable.is_some() {
            starts.push(extent[2] as usize);
            counts.push((extent[3] - extent[2] + 1) as usize);
        }
        starts.push(extent[0] as usize);
        counts.push((extent[1] - extent[0] + 1) as usize);
        (starts, counts)
    }
}

fn to_extent(values: &[u64]) -> Result<[u64; 6]> {
    values.try_into().map_err(|_| Error::MetadataType {
        key: "extent".to_string(),
        expected: "six unsigned integers".to_string(),
    })
}

/// Read one requested field on the current slab. The variable must be shaped
/// exactly by the target dimensions to qualify as a mesh variable.
fn read_point_array(
    nc: &netcdf::File,
    md: &Metadata,
    name: &str,
    target_dims: &[String],
    starts: &[usize],
    counts: &[usize],
) -> Result<VariantArray> {
    let atts = md.get_nested("attributes")?.get_nested(name)?;
    let kind = ElementKind::from_name(atts.get_str("type")?)?;
    let dims = atts.get_str_list("dims")?;
    if dims != target_dims {
        return Err(Error::DimensionMismatch {
            name: name.to_string(),
            expected: target_dims.to_vec(),
            actual: dims.to_vec(),
        });
    }
    let var = nc.variable(name).ok_or_else(|| Error::SchemaQueryFailed {
        name: name.to_string(),
        detail: "no such variable".to_string(),
    })?;
    read_hyperslab(&var, kind, starts, counts)
}

/// Read the single element of a time variable at the current step offset.
fn read_time_scalar(
    nc: &netcdf::File,
    md: &Metadata,
    name: &str,
    offset: u64,
) -> Result<VariantArray> {
    let atts = md.get_nested("attributes")?.get_nested(name)?;
    let kind = ElementKind::from_name(atts.get_str("type")?)?;
    let var = nc.variable(name).ok_or_else(|| Error::SchemaQueryFailed {
        name: name.to_string(),
        detail: "no such variable".to_string(),
    })?;
    read_hyperslab(&var, kind, &[offset as usize], &[1])
}

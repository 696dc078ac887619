//! The execute-phase output object: a structured Cartesian mesh slice.

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::array::{ElementKind, VariantArray};
use crate::errors::{PointArrayLengthSnafu, Result, SerializationSnafu};

/// A named, ordered collection of [`VariantArray`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArrayCollection {
    entries: Vec<(String, VariantArray)>,
}

impl ArrayCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the array stored under `name`.
    pub fn set(&mut self, name: impl Into<String>, array: VariantArray) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, a)) => *a = array,
            None => self.entries.push((name, array)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&VariantArray> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, a)| a)
    }

    pub fn remove(&mut self, name: &str) -> Option<VariantArray> {
        let idx = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VariantArray)> {
        self.entries.iter().map(|(n, a)| (n.as_str(), a))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// One time step of the dataset on a structured Cartesian grid.
///
/// Carries the four coordinate arrays, the whole and current index extents,
/// point-centered field arrays shaped by the current extent, and information
/// arrays that are not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartesianMesh {
    x_coords: VariantArray,
    y_coords: VariantArray,
    z_coords: VariantArray,
    t_coords: VariantArray,
    whole_extent: [u64; 6],
    extent: [u64; 6],
    point_arrays: ArrayCollection,
    info_arrays: ArrayCollection,
    time: f64,
    time_step: u64,
    calendar: String,
    time_units: String,
}

impl CartesianMesh {
    pub fn new(whole_extent: [u64; 6], extent: [u64; 6]) -> Self {
        Self {
            x_coords: VariantArray::new(ElementKind::F64, 0),
            y_coords: VariantArray::new(ElementKind::F64, 0),
            z_coords: VariantArray::new(ElementKind::F64, 0),
            t_coords: VariantArray::new(ElementKind::F64, 0),
            whole_extent,
            extent,
            point_arrays: ArrayCollection::new(),
            info_arrays: ArrayCollection::new(),
            time: 0.0,
            time_step: 0,
            calendar: String::new(),
            time_units: String::new(),
        }
    }

    /// Number of mesh points implied by the current extent.
    pub fn size(&self) -> usize {
        let e = &self.extent;
        ((e[1] - e[0] + 1) * (e[3] - e[2] + 1) * (e[5] - e[4] + 1)) as usize
    }

    pub fn whole_extent(&self) -> [u64; 6] {
        self.whole_extent
    }

    pub fn extent(&self) -> [u64; 6] {
        self.extent
    }

    pub fn x_coords(&self) -> &VariantArray {
        &self.x_coords
    }

    pub fn y_coords(&self) -> &VariantArray {
        &self.y_coords
    }

    pub fn z_coords(&self) -> &VariantArray {
        &self.z_coords
    }

    pub fn t_coords(&self) -> &VariantArray {
        &self.t_coords
    }

    pub fn set_x_coords(&mut self, coords: VariantArray) {
        self.x_coords = coords;
    }

    pub fn set_y_coords(&mut self, coords: VariantArray) {
        self.y_coords = coords;
    }

    pub fn set_z_coords(&mut self, coords: VariantArray) {
        self.z_coords = coords;
    }

    pub fn set_t_coords(&mut self, coords: VariantArray) {
        self.t_coords = coords;
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    pub fn time_step(&self) -> u64 {
        self.time_step
    }

    pub fn set_time_step(&mut self, step: u64) {
        self.time_step = step;
    }

    pub fn calendar(&self) -> &str {
        &self.calendar
    }

    pub fn set_calendar(&mut self, calendar: impl Into<String>) {
        self.calendar = calendar.into();
    }

    pub fn time_units(&self) -> &str {
        &self.time_units
    }

    pub fn set_time_units(&mut self, units: impl Into<String>) {
        self.time_units = units.into();
    }

    /// Attach a point-centered field array. Its length must equal
    /// [`CartesianMesh::size`].
    pub fn add_point_array(
        &mut self,
        name: impl Into<String>,
        array: VariantArray,
    ) -> Result<()> {
        let name = name.into();
        let expected = self.size();
        ensure!(
            array.len() == expected,
            PointArrayLengthSnafu { name, len: array.len(), expected }
        );
        self.point_arrays.set(name, array);
        Ok(())
    }

    /// Attach a field array not shaped by the mesh.
    pub fn add_info_array(&mut self, name: impl Into<String>, array: VariantArray) {
        self.info_arrays.set(name, array);
    }

    pub fn point_arrays(&self) -> &ArrayCollection {
        &self.point_arrays
    }

    pub fn information_arrays(&self) -> &ArrayCollection {
        &self.info_arrays
    }

    /// True when the mesh carries no coordinates and no field arrays.
    pub fn empty(&self) -> bool {
        self.x_coords.is_empty()
            && self.y_coords.is_empty()
            && self.z_coords.is_empty()
            && self.t_coords.is_empty()
            && self.point_arrays.is_empty()
            && self.info_arrays.is_empty()
    }

    /// Serialize the mesh to an opaque byte stream.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).context(SerializationSnafu)
    }

    /// Reconstruct a mesh from [`CartesianMesh::to_bytes`] output.
    pub fn from_bytes(bytes: &[u8]) -> Result<CartesianMesh> {
        bincode::deserialize(bytes).context(SerializationSnafu)
    }
}

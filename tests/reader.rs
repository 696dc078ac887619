//! End-to-end tests over synthesized CF/NetCDF fixtures.

use std::path::Path;

use ncmesh::{CfReader, LocalGroup, Metadata, NoComm, VariantArray};

fn extents(ranges: &[(usize, usize)]) -> netcdf::Extents {
    ranges
        .iter()
        .map(|&(start, count)| netcdf::Extent::from(start..start + count))
        .collect::<Vec<netcdf::Extent>>()
        .into()
}

/// A lon=4, lat=3 dataset with `tas(time, lat, lon)` and optionally a
/// per-step scalar `step_id(time)`. Field values are `base + flat_index` so
/// tests can pin down exactly which slab was read.
fn write_tas_file(path: &Path, time: &[f64], base: f32, with_step_var: bool) {
    let mut file = netcdf::create(path).unwrap();
    file.add_dimension("lon", 4).unwrap();
    file.add_dimension("lat", 3).unwrap();
    file.add_unlimited_dimension("time").unwrap();

    let mut lon = file.add_variable::<f64>("lon", &["lon"]).unwrap();
    lon.put_values(&[0.0, 1.0, 2.0, 3.0], extents(&[(0, 4)])).unwrap();
    let mut lat = file.add_variable::<f64>("lat", &["lat"]).unwrap();
    lat.put_values(&[10.0, 11.0, 12.0], extents(&[(0, 3)])).unwrap();

    let mut tvar = file.add_variable::<f64>("time", &["time"]).unwrap();
    tvar.put_attribute("units", "days since 2000-01-01 00:00:00").unwrap();
    tvar.put_attribute("calendar", "standard").unwrap();
    tvar.put_values(time, extents(&[(0, time.len())])).unwrap();

    if with_step_var {
        let mut step = file.add_variable::<f64>("step_id", &["time"]).unwrap();
        let ids: Vec<f64> = time.iter().map(|t| t * 100.0).collect();
        step.put_values(&ids, extents(&[(0, time.len())])).unwrap();
    }

    let mut tas = file.add_variable::<f32>("tas", &["time", "lat", "lon"]).unwrap();
    tas.put_attribute("units", "K").unwrap();
    let data: Vec<f32> = (0..time.len() * 12).map(|i| base + i as f32).collect();
    tas.put_values(&data, extents(&[(0, time.len()), (0, 3), (0, 4)])).unwrap();
}

/// A dataset with no latitude axis at all: `v(time, lon)`.
fn write_lon_only_file(path: &Path, time: &[f64]) {
    let mut file = netcdf::create(path).unwrap();
    file.add_dimension("lon", 4).unwrap();
    file.add_unlimited_dimension("time").unwrap();

    let mut lon = file.add_variable::<f64>("lon", &["lon"]).unwrap();
    lon.put_values(&[0.0, 1.0, 2.0, 3.0], extents(&[(0, 4)])).unwrap();
    let mut tvar = file.add_variable::<f64>("time", &["time"]).unwrap();
    tvar.put_values(time, extents(&[(0, time.len())])).unwrap();

    let mut v = file.add_variable::<f32>("v", &["time", "lon"]).unwrap();
    let data: Vec<f32> = (0..time.len() * 4).map(|i| i as f32).collect();
    v.put_values(&data, extents(&[(0, time.len()), (0, 4)])).unwrap();
}

fn request(time_step: Option<u64>, extent: Option<[u64; 6]>, arrays: &[&str]) -> Metadata {
    let mut req = Metadata::new();
    if let Some(step) = time_step {
        req.insert("time_step", VariantArray::U64(vec![step]));
    }
    if let Some(e) = extent {
        req.insert("extent", VariantArray::U64(e.to_vec()));
    }
    if !arrays.is_empty() {
        let names: Vec<String> = arrays.iter().map(|s| s.to_string()).collect();
        req.insert("arrays", names);
    }
    req
}

#[test]
fn single_file_metadata_and_execute() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cf_000.nc");
    write_tas_file(&path, &[0.0, 1.0], 0.0, false);

    let mut reader = CfReader::new();
    reader.set_file_name(path.to_str().unwrap());
    let md = reader.metadata(&NoComm).unwrap();

    assert_eq!(md.get_u64s("whole_extent").unwrap(), [0, 3, 0, 2, 0, 0]);
    assert_eq!(md.get_str_list("files").unwrap(), ["cf_000.nc"]);
    assert_eq!(md.get_u64s("step_count").unwrap(), [2]);
    assert_eq!(md.get_u64("number_of_time_steps").unwrap(), 2);
    let variables = md.get_str_list("variables").unwrap();
    for name in ["lon", "lat", "time", "tas"] {
        assert!(variables.iter().any(|v| v == name), "missing {name}");
    }
    assert!(md.get_str_list("time variables").unwrap().is_empty());

    let coords = md.get_nested("coordinates").unwrap();
    assert_eq!(coords.get_str("x_variable").unwrap(), "lon");
    assert_eq!(coords.get_array("t").unwrap().len(), 2);
    assert_eq!(coords.get_array("x").unwrap().len(), 4);

    let tas_atts = md.get_nested("attributes").unwrap().get_nested("tas").unwrap();
    assert_eq!(tas_atts.get_str("type").unwrap(), "float32");
    assert_eq!(tas_atts.get_str("centering").unwrap(), "point");
    assert_eq!(tas_atts.get_str("units").unwrap(), "K");
    assert_eq!(tas_atts.get_str_list("dims").unwrap(), ["time", "lat", "lon"]);

    let mesh = reader.execute(&request(Some(1), None, &["tas"])).unwrap();
    assert_eq!(mesh.time(), 1.0);
    assert_eq!(mesh.time_step(), 1);
    assert_eq!(mesh.size(), 12);
    assert_eq!(mesh.calendar(), "standard");
    assert_eq!(mesh.time_units(), "days since 2000-01-01 00:00:00");
    assert_eq!(mesh.x_coords().len(), 4);
    assert_eq!(mesh.y_coords().len(), 3);
    assert_eq!(mesh.z_coords().len(), 1);

    let tas = mesh.point_arrays().get("tas").unwrap();
    assert_eq!(tas.len(), 12);
    // time step 1 starts at flat index 12
    assert_eq!(tas.get_f64(0), Some(12.0));
    assert!(mesh.information_arrays().is_empty());
}

#[test]
fn per_step_scalars_become_information_arrays() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cf_000.nc");
    write_tas_file(&path, &[0.0, 1.0, 2.0], 0.0, true);

    let mut reader = CfReader::new();
    reader.set_file_name(path.to_str().unwrap());
    let md = reader.metadata(&NoComm).unwrap();
    assert_eq!(md.get_str_list("time variables").unwrap(), ["step_id"]);

    let mesh = reader.execute(&request(Some(2), None, &[])).unwrap();
    let step_id = mesh.information_arrays().get("step_id").unwrap();
    assert_eq!(step_id.len(), 1);
    assert_eq!(step_id.get_f64(0), Some(200.0));
}

#[test]
fn two_files_concatenate_the_time_axis() {
    let dir = tempfile::tempdir().unwrap();
    write_tas_file(&dir.path().join("cf_000.nc"), &[0.0, 1.0, 2.0], 0.0, false);
    write_tas_file(&dir.path().join("cf_001.nc"), &[3.0, 4.0], 1000.0, false);

    let mut reader = CfReader::new();
    reader.set_files_regex(format!("{}/cf_.*\\.nc", dir.path().display()));
    let md = reader.metadata(&NoComm).unwrap();

    assert_eq!(md.get_str_list("files").unwrap(), ["cf_000.nc", "cf_001.nc"]);
    assert_eq!(md.get_u64s("step_count").unwrap(), [3, 2]);
    assert_eq!(md.get_u64("number_of_time_steps").unwrap(), 5);
    let t = md.get_nested("coordinates").unwrap().get_array("t").unwrap();
    assert_eq!(t.len(), 5);
    assert_eq!(t.get_f64(3), Some(3.0));

    // step 3 is the first step of the second file
    let mesh = reader.execute(&request(Some(3), None, &["tas"])).unwrap();
    assert_eq!(mesh.time(), 3.0);
    assert_eq!(mesh.point_arrays().get("tas").unwrap().get_f64(0), Some(1000.0));

    // the last step lands on the last file at its last offset
    let mesh = reader.execute(&request(Some(4), None, &["tas"])).unwrap();
    assert_eq!(mesh.time(), 4.0);
    assert_eq!(mesh.point_arrays().get("tas").unwrap().get_f64(0), Some(1012.0));
}

#[test]
fn sub_extent_slices_fields_and_coordinates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cf_000.nc");
    write_tas_file(&path, &[0.0, 1.0], 0.0, false);

    let mut reader = CfReader::new();
    reader.set_file_name(path.to_str().unwrap());
    reader.metadata(&NoComm).unwrap();

    let mesh = reader
        .execute(&request(Some(0), Some([1, 2, 0, 1, 0, 0]), &["tas"]))
        .unwrap();
    assert_eq!(mesh.size(), 4);

    let tas = mesh.point_arrays().get("tas").unwrap();
    let values: Vec<f64> = (0..tas.len()).map(|i| tas.get_f64(i).unwrap()).collect();
    assert_eq!(values, [1.0, 2.0, 5.0, 6.0]);

    assert_eq!(mesh.x_coords().as_f64().unwrap(), [1.0, 2.0]);
    assert_eq!(mesh.y_coords().as_f64().unwrap(), [10.0, 11.0]);
}

#[test]
fn unknown_and_mismatched_arrays_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cf_000.nc");
    write_tas_file(&path, &[0.0, 1.0], 0.0, false);

    let mut reader = CfReader::new();
    reader.set_file_name(path.to_str().unwrap());
    reader.metadata(&NoComm).unwrap();

    // nonexistent name and a coordinate variable whose dims don't match the
    // mesh dims both fall out of the result
    let mesh = reader
        .execute(&request(None, None, &["does_not_exist", "lon"]))
        .unwrap();
    assert!(mesh.point_arrays().is_empty());
    assert_eq!(mesh.size(), 12);
}

#[test]
fn missing_y_axis_collapses_to_length_one() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flat.nc");
    write_lon_only_file(&path, &[0.0, 1.0]);

    let mut reader = CfReader::new();
    reader.set_file_name(path.to_str().unwrap());
    reader.set_y_axis_variable(None::<String>);
    let md = reader.metadata(&NoComm).unwrap();

    assert_eq!(md.get_u64s("whole_extent").unwrap(), [0, 3, 0, 0, 0, 0]);
    let coords = md.get_nested("coordinates").unwrap();
    assert_eq!(coords.get_array("y").unwrap().len(), 1);
    assert_eq!(coords.get_array("z").unwrap().len(), 1);
    assert_eq!(coords.get_str("y_variable").unwrap(), "y");
    assert_eq!(coords.get_str("z_variable").unwrap(), "z");

    let mesh = reader.execute(&request(Some(1), None, &["v"])).unwrap();
    let v = mesh.point_arrays().get("v").unwrap();
    assert_eq!(v.len(), 4);
    assert_eq!(v.get_f64(0), Some(4.0));
}

#[test]
fn missing_t_axis_synthesizes_one_step() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cf_000.nc");
    write_tas_file(&path, &[0.0, 1.0], 0.0, false);

    let mut reader = CfReader::new();
    reader.set_file_name(path.to_str().unwrap());
    reader.set_t_axis_variable(None::<String>);
    let md = reader.metadata(&NoComm).unwrap();

    assert_eq!(md.get_u64s("step_count").unwrap(), [1]);
    assert_eq!(md.get_u64("number_of_time_steps").unwrap(), 1);
    assert_eq!(md.get_nested("coordinates").unwrap().get_array("t").unwrap().len(), 1);
    assert_eq!(md.get_nested("coordinates").unwrap().get_str("t_variable").unwrap(), "t");
}

#[test]
fn metadata_is_cached_and_invalidated_by_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cf_000.nc");
    write_tas_file(&path, &[0.0, 1.0], 0.0, false);

    let mut reader = CfReader::new();
    reader.set_file_name(path.to_str().unwrap());

    let first = reader.metadata(&NoComm).unwrap();
    let second = reader.metadata(&NoComm).unwrap();
    assert_eq!(first.to_bytes().unwrap(), second.to_bytes().unwrap());

    // round trip through the broadcast byte stream
    let back = Metadata::from_bytes(&first.to_bytes().unwrap()).unwrap();
    assert_eq!(first, back);

    reader.set_y_axis_variable(None::<String>);
    let err = reader.execute(&request(None, None, &[])).unwrap_err();
    assert!(matches!(err, ncmesh::Error::MetadataMissing { .. }));

    let third = reader.metadata(&NoComm).unwrap();
    assert_eq!(third.get_u64s("whole_extent").unwrap(), [0, 3, 0, 0, 0, 0]);
}

#[test]
fn execute_without_metadata_phase_is_fatal() {
    let reader = CfReader::new();
    let err = reader.execute(&Metadata::new()).unwrap_err();
    assert!(matches!(err, ncmesh::Error::MetadataMissing { .. }));
}

#[test]
fn enumeration_failure_reports_no_match() {
    let dir = tempfile::tempdir().unwrap();
    let mut reader = CfReader::new();
    reader.set_files_regex(format!("{}/nothing_.*\\.nc", dir.path().display()));
    let err = reader.metadata(&NoComm).unwrap_err();
    assert!(matches!(err, ncmesh::Error::EnumerationFailed { .. }));
}

#[test]
fn peer_group_receives_identical_metadata() {
    let dir = tempfile::tempdir().unwrap();
    write_tas_file(&dir.path().join("cf_000.nc"), &[0.0, 1.0, 2.0], 0.0, false);
    write_tas_file(&dir.path().join("cf_001.nc"), &[3.0, 4.0], 1000.0, false);
    let pattern = format!("{}/cf_.*\\.nc", dir.path().display());

    let handles: Vec<_> = LocalGroup::split(3)
        .into_iter()
        .map(|comm| {
            let pattern = pattern.clone();
            std::thread::spawn(move || {
                let mut reader = CfReader::new();
                reader.set_files_regex(pattern);
                let md = reader.metadata(&comm).unwrap();
                // every rank can serve requests from its own cache
                let mesh = reader
                    .execute(&request(Some(3), None, &["tas"]))
                    .unwrap();
                assert_eq!(mesh.time(), 3.0);
                md.to_bytes().unwrap()
            })
        })
        .collect();

    let records: Vec<Vec<u8>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(records.windows(2).all(|pair| pair[0] == pair[1]));
}

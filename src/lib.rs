//! Multi-file CF/NetCDF datasets as per-time-step cartesian meshes.
//!
//! A time-ordered collection of NetCDF files following the climate/forecast
//! conventions is presented as one logical dataset: the metadata phase
//! consolidates the per-file schemas and time coordinates into a single
//! global record (distributed over an optional process group), and the
//! execute phase serves any time step on any spatial sub-extent as a
//! [`CartesianMesh`].
//!
//! ```no_run
//! # fn main() -> ncmesh::Result<()> {
//! use ncmesh::{CfReader, Metadata, NoComm, VariantArray};
//!
//! let mut reader = CfReader::new();
//! reader.set_files_regex(r"/data/cam5/.*\.nc");
//!
//! let md = reader.metadata(&NoComm)?;
//! let steps = md.get_u64("number_of_time_steps")?;
//!
//! let mut request = Metadata::new();
//! request.insert("time_step", VariantArray::U64(vec![steps - 1]));
//! request.insert("arrays", vec!["tas".to_string()]);
//! let mesh = reader.execute(&request)?;
//! println!("t = {}, {} points", mesh.time(), mesh.size());
//! # Ok(())
//! # }
//! ```

pub mod array;
pub mod comm;
pub mod errors;
pub mod mesh;
pub mod meta;
pub mod reader;

mod files;
mod handles;
mod pool;

pub use array::{ElementKind, VariantArray};
pub use comm::{Communicator, LocalGroup, NoComm};
#[cfg(feature = "mpi-support")]
pub use comm::MpiComm;
pub use errors::{Error, Result};
pub use mesh::{ArrayCollection, CartesianMesh};
pub use meta::{Metadata, Value};
pub use reader::CfReader;

//! This is the documentation for the **seqtrace** package, a sequential optical raytracer.
//!
//! An [`OpticalSystem`] consists of a tree of local coordinate systems, surfaces placed in these coordinate systems
//! and the materials behind the surfaces. A [`Propagator`] traces a [`RayBundle`] through a
//! [`Sequence`] of surfaces and returns the bundle at every surface.
//!
//! ```rust
//! use seqtrace::{
//!     builder::{build_simple_optical_system, SurfaceDescriptor},
//!     millimeter, nanometer,
//!     propagator::Propagator,
//!     ray_bundle::RayBundle,
//!     sampling::MeridionalFan,
//! };
//!
//! let (system, sequence) = build_simple_optical_system(&[
//!     SurfaceDescriptor::new("front", Some(millimeter!(100.0)), millimeter!(20.0)).with_index(1.5),
//!     SurfaceDescriptor::new("back", Some(millimeter!(-100.0)), millimeter!(5.0)).with_index(1.0),
//!     SurfaceDescriptor::new("image", None, millimeter!(100.0)),
//! ])
//! .unwrap();
//! let fan = MeridionalFan::new(millimeter!(9.0), 11).unwrap();
//! let bundle = RayBundle::new_collimated(&fan, millimeter!(0.0), nanometer!(587.6)).unwrap();
//! let bundles = Propagator::default().trace(&system, &sequence, bundle).unwrap();
//! assert_eq!(bundles.len(), 3);
//! assert_eq!(bundles[2].nr_of_valid_rays(), 11);
//! ```
#![allow(clippy::module_name_repetitions)]

pub mod aperture;
pub mod builder;
pub mod coordinates;
pub mod error;
pub mod material;
pub mod optical_system;
pub mod parameters;
pub mod propagator;
pub mod ray_bundle;
pub mod refractive_index;
pub mod sampling;
pub mod shape;
pub mod surface;
pub mod utils;

pub use optical_system::{OpticalSystem, Sequence};
pub use propagator::{trace, Propagator, TraceConfig};
pub use ray_bundle::RayBundle;

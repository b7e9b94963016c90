//! Camera and ray math the LOD pass needs. Drawing itself belongs to the host.

pub mod camera;
pub mod ray;

pub use camera::Camera;
pub use ray::{Intersection, Ray};

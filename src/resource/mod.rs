//! Resource model.
//!
//! - [`RoutePath`] / [`Operations`]: addressing and allowed operations
//! - [`ResourceKind`] / [`ResourceValue`]: typed values
//! - [`Device`]: route registry bound to a session
//! - [`build_object_model`]: deterministic wire projection

mod device;
mod model;
mod route;
mod value;

pub use device::Device;
pub use model::{
    build_object_model, ResourceEntry, ResourceOptions, WireInstance, WireObject, WireResource,
};
pub use route::{Operations, RoutePath};
pub use value::{ResourceKind, ResourceValue};

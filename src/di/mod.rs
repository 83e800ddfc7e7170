//! Component registry and descriptors.
//!
//! A [`ComponentRegistry`] holds [`ComponentDescriptor`]s and the singletons
//! built from them. Lookups are by name or by type, and a component can be
//! viewed through any trait object its descriptor declares.

mod descriptor;
mod injectable;
mod lazy;
mod registry;
pub mod serialization;

pub use descriptor::{ComponentDescriptor, ComponentRef, DescriptorBuilder, Scope};
pub use injectable::Injectable;
pub use lazy::LazyRef;
pub use registry::ComponentRegistry;

mod cluster_registry;
mod json_store;

#[rustfmt::skip]
pub use {
    cluster_registry::JsonClusterRegistry,
    json_store::{load_collection, JsonStore},
};

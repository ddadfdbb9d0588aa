pub mod api;
pub mod coordinator;
pub mod exposure;
pub mod model;
pub mod reconcile;
pub mod selection;
pub mod settings;
pub mod token;

pub use api::Error;
pub use coordinator::Coordinator;

// Domain module: problem data, solver contract and value types

pub mod instance;
pub mod models;
pub mod solver_service;
pub mod value_objects;

pub use instance::*;
pub use models::*;
pub use solver_service::*;
pub use value_objects::*;

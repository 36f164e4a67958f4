pub mod attribution;
pub mod binning;
pub mod config;
pub mod dataset;
pub mod error;
pub mod event;
pub mod input;
pub mod model;
pub mod pipeline;
pub mod preprocess;
pub mod rng;
pub mod stage;
pub mod store;
pub mod summary;
pub mod types;
pub mod view_detection;

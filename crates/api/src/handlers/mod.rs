pub mod batch;
pub mod export;
pub mod maintenance;
pub mod project;
pub mod stats;
pub mod task;
pub mod user;

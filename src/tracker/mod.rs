pub mod cluster;
pub mod ingest;
pub mod presence;
pub mod projector;
pub mod ranking;
pub mod registry;

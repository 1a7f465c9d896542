pub mod snapshot;
pub mod server;

pub use server::start_status_server;
pub use snapshot::{CycleReport, LagSnapshot, StatusBoard};

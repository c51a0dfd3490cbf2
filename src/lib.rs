use crate::api::scheduler_config_dto::ClusterConfigDto;
use crate::domain::clock::clock::SharedClock;
use crate::domain::scheduler::scheduler::Scheduler;
use crate::error::Result;
use crate::loader::parser::parse_json_file;

pub mod api;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

/// Reads a cluster configuration file and builds a ready-to-use scheduler on top of it.
pub fn build_scheduler_from_file(file_path: &str, clock: SharedClock) -> Result<Scheduler> {
    logger::init();
    log::info!("Logger initialized. Loading cluster configuration.");

    let config: ClusterConfigDto = parse_json_file::<ClusterConfigDto>(file_path)?;
    log::info!("JSON file parsed successfully.");

    let scheduler = Scheduler::from_dto(&config, clock)?;
    log::info!("Scheduler constructed successfully.");

    Ok(scheduler)
}

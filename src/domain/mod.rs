pub mod allocation;
pub mod clock;
pub mod placement;
pub mod preemption;
pub mod request;
pub mod reservation;
pub mod scheduler;
pub mod topology;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_fixtures;

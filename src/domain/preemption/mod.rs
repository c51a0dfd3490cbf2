pub mod lazy_preemption;
pub mod preemption_engine;

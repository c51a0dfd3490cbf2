pub mod candidate;
pub mod demand;
pub mod placement_tree;
pub mod search_engine;
pub mod strategy;

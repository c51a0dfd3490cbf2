pub mod cell;
pub mod cell_chain;
pub mod cell_store;

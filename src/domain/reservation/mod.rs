pub mod buddy_allocator;
pub mod reservation_map;
pub mod virtual_cell;

pub mod delivery;
pub mod driver;
pub mod driver_assignment;
pub mod order;
pub mod order_item;
pub mod order_status_history;
pub mod restaurant;

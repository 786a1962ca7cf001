pub mod order_service;
pub mod scheduler_service;
pub mod strategy_lock;

pub mod exchange;
pub mod ledger;
pub mod model;
pub mod okx;
pub mod order;
pub mod services;
pub mod strategy;
pub mod task;

pub mod bot;
pub mod exchange_account;

pub use bot::BotEntity;
pub use exchange_account::{ApiCredentials, ExchangeAccountEntity, ExchangeEntity};

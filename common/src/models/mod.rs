pub mod cerebro;
pub mod channel;
pub mod session;

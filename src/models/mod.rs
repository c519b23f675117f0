pub mod account;
pub mod interval;
pub mod token;

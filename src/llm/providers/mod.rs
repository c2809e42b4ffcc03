pub mod chain;
pub mod direct;

pub mod navigate;
pub mod resolve;
pub mod validate;

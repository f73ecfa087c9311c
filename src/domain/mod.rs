pub mod filter;
pub mod notice;
pub mod todo;

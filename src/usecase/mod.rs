pub mod dispatch;
pub mod request;

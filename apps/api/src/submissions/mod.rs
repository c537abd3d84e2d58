//! Application and contact-form relay to Lark (and optionally Base).

pub mod application;
pub mod base;
pub mod dispatch;
pub mod handlers;
pub mod inquiry;
pub mod routing;
pub mod validate;

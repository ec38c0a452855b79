pub mod code;
pub mod discount;
pub mod eligibility;
pub mod error;
pub mod id;
pub mod publisher;
pub mod request;
pub mod shop;
pub mod webhook;

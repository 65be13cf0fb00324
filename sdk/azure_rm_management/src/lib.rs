#![doc = include_str!("../README.md")]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod request;
pub mod response;
pub mod retry;
pub mod transport;

pub use client::{ManagementApi, ManagementClient};
pub use error::{ManagementError, ManagementResult};

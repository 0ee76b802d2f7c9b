#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod client;
pub mod error;
pub mod types;
pub mod ws;

pub use client::{Client, Endpoint};
pub use types::{Envelope, KEEP_ALIVE, parse_envelopes};

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;

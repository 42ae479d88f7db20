//! STAC API Client
//!
//! A small client for [STAC API](https://github.com/radiantearth/stac-api-spec)
//! item search with paging, plus streaming download of item assets to disk.

mod client;
mod datetime;
mod error;
mod types;

pub use client::StacClient;
pub use datetime::datetime_interval;
pub use error::{Result, StacError};
pub use types::{Asset, Item, ItemCollection, Link};

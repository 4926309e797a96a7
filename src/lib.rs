pub mod asset_feed;
pub mod catalog;
pub mod error;
pub mod media_filter;
pub mod normalization;
pub mod remote;
pub mod sync;

pub mod util {
    pub mod env;
}

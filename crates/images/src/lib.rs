//! Photo pipeline for CoralIngest: gallery URL collection and downloads.

pub mod fetch;
pub mod gallery;

pub use fetch::ImageFetcher;
pub use gallery::{collect_gallery_urls, normalize_candidate};

//! Coastal Kiln: a pottery studio tracker
//!
//! Pieces move through the production pipeline from wedging to complete;
//! glazes collect recipes and test tiles; reclaim batches track recycled
//! clay; guilds share posts and resources. Data lives in a hosted backend
//! when one is configured and in a local SQLite store otherwise.

pub mod api;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
pub mod view;

#[cfg(test)]
mod test_support;

pub use error::AppError;

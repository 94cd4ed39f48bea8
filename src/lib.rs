//! Core library for playlist-upsync
pub mod api;
pub mod batch;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod playlist;
pub mod reconcile;
pub mod worker;

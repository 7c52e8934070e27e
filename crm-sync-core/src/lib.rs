#![doc = "crm-sync-core: core logic library for crm-sync."]

//! This crate holds the pipeline logic with no transport dependencies:
//! paginated and windowed fetching, the last-activity merge, snapshot files
//! and the full-replace sheet sync. HTTP clients and the CLI live in the
//! `crm-sync` crate and plug in through the traits in [`contract`].

pub mod config;
pub mod contract;
pub mod error;
pub mod fetch;
pub mod merge;
pub mod models;
pub mod pipeline;
pub mod snapshot;
pub mod synchronise;

//! Private, on-device cycle tracking for couples.
//!
//! [`prediction`] turns logged period days into a [`models::CycleSnapshot`]:
//! grouped periods, inferred cycle length, next period, fertile window and a
//! three-cycle forecast. [`tracker::Tracker`] keeps the logged days in a
//! passphrase-sealed vault and serves both the user's own view and the view of
//! an imported partner share.

pub mod clock;
pub mod config;
pub mod crypto;
pub mod insights;
pub mod models;
pub mod prediction;
pub mod storage;
pub mod store;
pub mod tracker;

//! HTTP surface (base spec §6), grouped by resource the way the teacher
//! groups `routes::{threads, emails, authors, ...}`.

pub mod admin;
pub mod carriers;
pub mod emails;
pub mod health;
pub mod shipments;

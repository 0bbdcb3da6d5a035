//! API route modules.

pub mod db_test;
pub mod health;
pub mod info;
pub mod status;

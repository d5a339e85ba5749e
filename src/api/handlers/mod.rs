//! API request handlers

mod cron;
mod health;
mod penalties;

pub use cron::*;
pub use health::*;
pub use penalties::*;

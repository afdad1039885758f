//! # konkt-application
//!
//! Configuration loading and the composed flows on top of
//! `konkt-core`: plan a meetup from two addresses and page through
//! the venues around the meeting point.

pub mod config;
pub mod error;
mod plan_meetup;
mod services;

pub mod prelude {
    pub use super::{
        config::Config,
        error::AppError,
        plan_meetup::{plan_meetup, MeetupPlan, MeetupRequest},
        services::Services,
        Result,
    };
}

pub use self::{
    plan_meetup::{plan_meetup, MeetupPlan, MeetupRequest},
    services::Services,
};

pub type Result<T> = std::result::Result<T, error::AppError>;

#[cfg(test)]
mod tests;

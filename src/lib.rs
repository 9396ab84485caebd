pub mod api;
pub mod config;
pub mod error;

#[cfg(test)]
mod testing;

pub use api::blackboard::{
    Account, AccountDetails, Course, CourseDetails, Credentials, Endpoint, Endpoints,
    LaunchPayload, NextStart, Occurrence, Session, SessionCookies, SessionRecord,
};
pub use error::{Error, NetworkError, Result};

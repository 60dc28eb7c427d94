//! Account outcome counters.
//!
//! Counters go through the `metrics` facade. Nothing is recorded until a
//! recorder is installed; the server installs a Prometheus recorder and
//! serves it at `/metrics`.

use metrics::{counter, describe_counter};

pub const LOGIN_SUCCESS: &str = "auth.login.success";
pub const LOGIN_FAILURE: &str = "auth.login.failure";
pub const REGISTER_SUCCESS: &str = "auth.register.success";
pub const REGISTER_FAILURE: &str = "auth.register.failure";

/// Result of a counted operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// Register descriptions for all counters with the installed recorder.
pub fn describe() {
    describe_counter!(LOGIN_SUCCESS, "Successful logins");
    describe_counter!(LOGIN_FAILURE, "Failed logins");
    describe_counter!(REGISTER_SUCCESS, "Successful registrations");
    describe_counter!(REGISTER_FAILURE, "Failed registrations");
}

/// Count one login attempt.
pub fn record_login(outcome: Outcome) {
    let name = match outcome {
        Outcome::Success => LOGIN_SUCCESS,
        Outcome::Failure => LOGIN_FAILURE,
    };
    counter!(name).increment(1);
}

/// Count one registration attempt.
pub fn record_register(outcome: Outcome) {
    let name = match outcome {
        Outcome::Success => REGISTER_SUCCESS,
        Outcome::Failure => REGISTER_FAILURE,
    };
    counter!(name).increment(1);
}

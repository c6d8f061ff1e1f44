//! Grade reporting back to the LMS (LTI 1.1 Basic Outcomes).
//!
//! A grade is posted to the `lis_outcome_service_url` of the launch, quoting
//! its `lis_result_sourcedid`, signed with the secret shared with the
//! consumer that issued the launch.

pub mod client;
pub mod oauth;
pub mod pox;

pub use client::{
    ConsumerSecrets, HttpOutcomeClient, OutcomeClient, OutcomeRequest, OutcomeResponse,
    report_score,
};
pub use oauth::OAuthSigner;

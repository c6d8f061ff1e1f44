use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use super::oauth::OAuthSigner;
use super::pox;
use crate::errors::OutcomeError;
use crate::store::{LtiLaunchParams, LtiSession, keys};

/// Shared secrets per consumer key, from the `[consumers]` config table.
#[derive(Debug, Clone, Default)]
pub struct ConsumerSecrets(BTreeMap<String, String>);

impl ConsumerSecrets {
    pub fn new(secrets: BTreeMap<String, String>) -> Self {
        Self(secrets)
    }

    pub fn secret_for(&self, consumer_key: &str) -> Result<&str, OutcomeError> {
        self.0
            .get(consumer_key)
            .map(String::as_str)
            .ok_or_else(|| OutcomeError::UnknownConsumer(consumer_key.to_string()))
    }

    pub fn signer_for(&self, consumer_key: &str) -> Result<OAuthSigner, OutcomeError> {
        let secret = self.secret_for(consumer_key)?;
        Ok(OAuthSigner::new(consumer_key, secret))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ConsumerSecrets {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A validated `replaceResult` call, ready to sign and send.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeRequest {
    pub service_url: Url,
    pub sourcedid: String,
    pub score: f64,
}

impl OutcomeRequest {
    pub fn replace_result(params: &LtiLaunchParams, score: f64) -> Result<Self, OutcomeError> {
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(OutcomeError::ScoreOutOfRange(score));
        }
        let service_url = params
            .get_non_empty(keys::OUTCOME_SERVICE_URL)
            .ok_or(OutcomeError::MissingParam(keys::OUTCOME_SERVICE_URL))?;
        let sourcedid = params
            .get_non_empty(keys::RESULT_SOURCEDID)
            .ok_or(OutcomeError::MissingParam(keys::RESULT_SOURCEDID))?;
        let service_url = Url::parse(service_url).map_err(|source| OutcomeError::InvalidServiceUrl {
            url: service_url.to_string(),
            source,
        })?;

        Ok(Self {
            service_url,
            sourcedid: sourcedid.to_string(),
            score,
        })
    }

    pub fn body(&self, message_id: &str) -> String {
        pox::replace_result_request(message_id, &self.sourcedid, self.score)
    }
}

/// What the LMS answered to an outcome request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeResponse {
    pub status: u16,
    pub code_major: String,
    pub severity: Option<String>,
    pub description: String,
    pub body: String,
}

impl OutcomeResponse {
    /// Interpret a raw HTTP answer. Anything other than a 2xx carrying
    /// `imsx_codeMajor = success` is a rejection.
    pub fn from_http(status: u16, body: String) -> Result<Self, OutcomeError> {
        let parsed = pox::parse_status(&body);
        let success = (200..300).contains(&status) && parsed.is_success();
        let code_major = parsed.code_major.unwrap_or_else(|| "unknown".to_string());
        let description = parsed.description.unwrap_or_default();

        if !success {
            return Err(OutcomeError::Rejected {
                status,
                code_major,
                description,
                body,
            });
        }

        Ok(Self {
            status,
            code_major,
            severity: parsed.severity,
            description,
            body,
        })
    }
}

/// Transport for outcome requests.
/// Real implementation: `HttpOutcomeClient`. Test double: `mock::MockOutcomeClient`.
#[async_trait]
pub trait OutcomeClient: Send + Sync {
    async fn send(
        &self,
        signer: &OAuthSigner,
        request: &OutcomeRequest,
    ) -> Result<OutcomeResponse, OutcomeError>;
}

pub struct HttpOutcomeClient {
    client: reqwest::Client,
}

impl HttpOutcomeClient {
    pub fn new(timeout: Duration) -> Result<Self, OutcomeError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl OutcomeClient for HttpOutcomeClient {
    async fn send(
        &self,
        signer: &OAuthSigner,
        request: &OutcomeRequest,
    ) -> Result<OutcomeResponse, OutcomeError> {
        let body = request.body(&Uuid::new_v4().to_string());
        let authorization = signer.authorization_header(
            "POST",
            &request.service_url,
            body.as_bytes(),
            &Uuid::new_v4().simple().to_string(),
            chrono::Utc::now().timestamp(),
        )?;

        debug!(url = %request.service_url, "posting replaceResult");
        let resp = self
            .client
            .post(request.service_url.clone())
            .header(CONTENT_TYPE, pox::CONTENT_TYPE)
            .header(AUTHORIZATION, authorization)
            .body(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let text = resp.text().await?;
        OutcomeResponse::from_http(status, text)
    }
}

/// Report `score` for the launch recorded in `session`.
///
/// The consumer key stored with the session selects the shared secret, so a
/// grade always goes back to the LMS instance that issued the launch.
pub async fn report_score(
    client: &dyn OutcomeClient,
    secrets: &ConsumerSecrets,
    session: &LtiSession,
    score: f64,
) -> Result<OutcomeResponse, OutcomeError> {
    let request = OutcomeRequest::replace_result(&session.lti_params, score)?;
    let signer = secrets.signer_for(&session.oauth_consumer_key)?;

    match client.send(&signer, &request).await {
        Ok(resp) => {
            info!(
                user_id = %session.user_id,
                resource_link_id = %session.resource_link_id,
                consumer_key = %session.oauth_consumer_key,
                score,
                code_major = %resp.code_major,
                "reported grade"
            );
            Ok(resp)
        }
        Err(err) => {
            warn!(
                user_id = %session.user_id,
                resource_link_id = %session.resource_link_id,
                consumer_key = %session.oauth_consumer_key,
                error = %err,
                "grade report failed"
            );
            Err(err)
        }
    }
}

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Serialize, de::DeserializeOwned};
use url::Url;

use super::ClientError;
use crate::{
    config::HTTP_TIMEOUT,
    models::{
        attempt::{Attempt, StartAttemptRequest, SubmitAttemptRequest},
        cheating::CreateCheatingReportRequest,
        question::PublicTestDefinition,
        response::{ApiFailure, ApiResponse},
        user::CurrentUser,
    },
    services::AppServices,
};

/// What a test session needs from the server.
#[async_trait]
pub trait TestGateway: Send + Sync {
    async fn test_definition(&self, test_id: i64) -> Result<PublicTestDefinition, ClientError>;

    async fn start_attempt(&self, course_id: i64, test_id: i64) -> Result<Attempt, ClientError>;

    async fn submit_attempt(&self, req: SubmitAttemptRequest) -> Result<Attempt, ClientError>;

    async fn report_violation(&self, req: CreateCheatingReportRequest) -> Result<(), ClientError>;
}

/// Talks to the `/api` routes with a bearer token.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
    token: String,
}

impl HttpGateway {
    /// `base_url` is the server root, e.g. `http://localhost:3000`.
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self, ClientError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url,
            token: token.into(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join("api/")?.join(path)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self
            .client
            .get(self.endpoint(path)?)
            .bearer_auth(&self.token)
            .send()
            .await?;
        unwrap_envelope(response).await
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let response = self
            .client
            .post(self.endpoint(path)?)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        unwrap_envelope(response).await
    }
}

async fn unwrap_envelope<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let message = match response.json::<ApiFailure>().await {
            Ok(failure) => failure.message,
            Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
        };
        return Err(ClientError::Api {
            status: status.as_u16(),
            message,
        });
    }

    let body: ApiResponse<T> = response.json().await?;
    Ok(body.data)
}

#[async_trait]
impl TestGateway for HttpGateway {
    async fn test_definition(&self, test_id: i64) -> Result<PublicTestDefinition, ClientError> {
        self.get(&format!("tests/{}/definition", test_id)).await
    }

    async fn start_attempt(&self, course_id: i64, test_id: i64) -> Result<Attempt, ClientError> {
        self.post("tests/start", &StartAttemptRequest { course_id, test_id })
            .await
    }

    async fn submit_attempt(&self, req: SubmitAttemptRequest) -> Result<Attempt, ClientError> {
        self.post("tests/submit", &req).await
    }

    async fn report_violation(&self, req: CreateCheatingReportRequest) -> Result<(), ClientError> {
        let _: serde_json::Value = self.post("cheating-attempt", &req).await?;
        Ok(())
    }
}

/// Calls the services directly, as the given user. Used by embedded setups and tests.
#[derive(Clone)]
pub struct LocalGateway {
    services: AppServices,
    user: CurrentUser,
}

impl LocalGateway {
    pub fn new(services: AppServices, user: CurrentUser) -> Self {
        Self { services, user }
    }
}

#[async_trait]
impl TestGateway for LocalGateway {
    async fn test_definition(&self, test_id: i64) -> Result<PublicTestDefinition, ClientError> {
        Ok(self.services.attempts.public_test(test_id).await?)
    }

    async fn start_attempt(&self, course_id: i64, test_id: i64) -> Result<Attempt, ClientError> {
        Ok(self
            .services
            .attempts
            .start_attempt(&self.user, StartAttemptRequest { course_id, test_id })
            .await?)
    }

    async fn submit_attempt(&self, req: SubmitAttemptRequest) -> Result<Attempt, ClientError> {
        Ok(self.services.attempts.submit_attempt(&self.user, req).await?)
    }

    async fn report_violation(&self, req: CreateCheatingReportRequest) -> Result<(), ClientError> {
        self.services.reports.report(&self.user, req).await?;
        Ok(())
    }
}

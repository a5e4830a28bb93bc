//! Amazon Connect REST client

use crate::sigv4::{self, SignableRequest, SigningParams};
use crate::sts;
use async_trait::async_trait;
use awsext_core::{
    AgentStatusApi, ApiError, ApiResult, ClientConfig, CreateAgentStatusOutput,
    CreateAgentStatusRequest, Credentials, DescribeAgentStatusOutput, ListAgentStatusesOutput,
    ListAgentStatusesRequest, ProviderError, UpdateAgentStatusRequest,
};
use chrono::Utc;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

const SERVICE: &str = "connect";
const ERROR_TYPE_HEADER: &str = "x-amzn-errortype";
const NOT_FOUND: &str = "ResourceNotFoundException";

pub fn connect_endpoint(region: &str) -> String {
    format!("https://{SERVICE}.{region}.amazonaws.com")
}

#[derive(Clone)]
pub struct ConnectClient {
    http: reqwest::Client,
    endpoint: Url,
    region: String,
    credentials: Credentials,
}

impl std::fmt::Debug for ConnectClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("region", &self.region)
            .field("credentials", &self.credentials)
            .finish()
    }
}

#[derive(Serialize)]
struct TagResourceBody<'a> {
    tags: &'a BTreeMap<String, String>,
}

impl ConnectClient {
    /// Client using `config` as is. `role_arn` is ignored; see [`ConnectClient::connect`].
    pub fn new(config: &ClientConfig) -> awsext_core::Result<Self> {
        Self::with_http(reqwest::Client::new(), config, config.credentials.clone())
    }

    /// Client for a resolved provider configuration, assuming `role_arn` first when set.
    #[instrument(skip(config), fields(region = %config.region))]
    pub async fn connect(config: &ClientConfig) -> awsext_core::Result<Self> {
        let http = reqwest::Client::new();
        let credentials = match &config.role_arn {
            Some(role_arn) => sts::assume_role(
                &http,
                &sts::sts_endpoint(&config.region),
                &config.region,
                &config.credentials,
                role_arn,
            )
            .await
            .map_err(|e| ProviderError::Configuration {
                reason: format!("could not assume role {role_arn}: {e}"),
            })?,
            None => config.credentials.clone(),
        };
        Self::with_http(http, config, credentials)
    }

    fn with_http(
        http: reqwest::Client,
        config: &ClientConfig,
        credentials: Credentials,
    ) -> awsext_core::Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| connect_endpoint(&config.region));
        let endpoint = Url::parse(&endpoint).map_err(|e| ProviderError::Configuration {
            reason: format!("invalid Connect endpoint {endpoint}: {e}"),
        })?;

        Ok(Self {
            http,
            endpoint,
            region: config.region.clone(),
            credentials,
        })
    }

    fn url(&self, segments: &[&str], query: &[(String, String)]) -> ApiResult<Url> {
        let path: String = segments
            .iter()
            .map(|segment| format!("/{}", sigv4::uri_encode(segment)))
            .collect();
        let base = self.endpoint.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}{path}")).map_err(|e| ApiError::Transport {
            reason: e.to_string(),
        })?;
        if !query.is_empty() {
            url.set_query(Some(&sigv4::encode_query(query)));
        }
        Ok(url)
    }

    async fn send(&self, method: Method, url: Url, body: Option<Vec<u8>>) -> ApiResult<String> {
        let body = body.unwrap_or_default();
        let content_type: &[(&str, &str)] = if body.is_empty() {
            &[]
        } else {
            &[("content-type", "application/json")]
        };

        let signed = sigv4::sign(
            &SignableRequest {
                method: method.as_str(),
                url: &url,
                headers: content_type,
                body: &body,
            },
            &SigningParams {
                credentials: &self.credentials,
                region: &self.region,
                service: SERVICE,
                time: Utc::now(),
            },
        );

        debug!(%method, path = url.path(), "Calling Connect");
        let mut request = self.http.request(method, url);
        for (name, value) in content_type {
            request = request.header(*name, *value);
        }
        for (name, value) in signed {
            request = request.header(name, value);
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|e| ApiError::Transport {
            reason: e.to_string(),
        })?;
        let status = response.status();
        let error_type = response
            .headers()
            .get(ERROR_TYPE_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let text = response.text().await.map_err(|e| ApiError::Transport {
            reason: e.to_string(),
        })?;

        if status.is_success() {
            Ok(text)
        } else {
            Err(service_error(status.as_u16(), error_type.as_deref(), &text))
        }
    }

    async fn send_json<T: DeserializeOwned + Default>(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> ApiResult<T> {
        let text = self.send(method, url, body).await?;
        if text.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(&text).map_err(|e| ApiError::Decode {
            reason: e.to_string(),
        })
    }
}

fn json_body<T: Serialize>(value: &T) -> ApiResult<Option<Vec<u8>>> {
    serde_json::to_vec(value)
        .map(Some)
        .map_err(|e| ApiError::Decode {
            reason: e.to_string(),
        })
}

/// Map an error response. The code comes from `x-amzn-ErrorType`
/// (`Code:namespace`) or the body's `__type`.
fn service_error(status: u16, error_type: Option<&str>, body: &str) -> ApiError {
    let parsed: serde_json::Value = serde_json::from_str(body).unwrap_or_default();
    let code = error_type
        .map(str::to_string)
        .or_else(|| parsed["__type"].as_str().map(str::to_string))
        .map(|code| {
            let code = code.split(':').next().unwrap_or_default();
            code.rsplit('#').next().unwrap_or_default().to_string()
        })
        .unwrap_or_else(|| format!("HTTP{status}"));
    let message = parsed["Message"]
        .as_str()
        .or_else(|| parsed["message"].as_str())
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string());

    if status == 404 || code == NOT_FOUND {
        ApiError::NotFound { message }
    } else {
        ApiError::Service {
            code,
            status,
            message,
        }
    }
}

#[async_trait]
impl AgentStatusApi for ConnectClient {
    #[instrument(skip(self, request), fields(instance_id = %request.instance_id))]
    async fn create_agent_status(
        &self,
        request: CreateAgentStatusRequest,
    ) -> ApiResult<CreateAgentStatusOutput> {
        let url = self.url(&["agent-status", &request.instance_id], &[])?;
        self.send_json(Method::PUT, url, json_body(&request)?).await
    }

    #[instrument(skip(self))]
    async fn describe_agent_status(
        &self,
        instance_id: &str,
        agent_status_id: &str,
    ) -> ApiResult<DescribeAgentStatusOutput> {
        let url = self.url(&["agent-status", instance_id, agent_status_id], &[])?;
        self.send_json(Method::GET, url, None).await
    }

    #[instrument(skip(self, request), fields(instance_id = %request.instance_id, agent_status_id = %request.agent_status_id))]
    async fn update_agent_status(&self, request: UpdateAgentStatusRequest) -> ApiResult<()> {
        let url = self.url(
            &["agent-status", &request.instance_id, &request.agent_status_id],
            &[],
        )?;
        self.send(Method::POST, url, json_body(&request)?).await?;
        Ok(())
    }

    #[instrument(skip(self, request), fields(instance_id = %request.instance_id))]
    async fn list_agent_statuses(
        &self,
        request: ListAgentStatusesRequest,
    ) -> ApiResult<ListAgentStatusesOutput> {
        let mut query = Vec::new();
        if let Some(max_results) = request.max_results {
            query.push(("maxResults".to_string(), max_results.to_string()));
        }
        if let Some(next_token) = request.next_token {
            query.push(("nextToken".to_string(), next_token));
        }
        let url = self.url(&["agent-status-summary", &request.instance_id], &query)?;
        self.send_json(Method::GET, url, None).await
    }

    #[instrument(skip(self, tags))]
    async fn tag_resource(&self, arn: &str, tags: &BTreeMap<String, String>) -> ApiResult<()> {
        let url = self.url(&["tags", arn], &[])?;
        self.send(Method::POST, url, json_body(&TagResourceBody { tags })?)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn untag_resource(&self, arn: &str, tag_keys: &[String]) -> ApiResult<()> {
        let query: Vec<(String, String)> = tag_keys
            .iter()
            .map(|key| ("tagKeys".to_string(), key.clone()))
            .collect();
        let url = self.url(&["tags", arn], &query)?;
        self.send(Method::DELETE, url, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use awsext_core::{AgentStatusState, CredentialSource};
    use mockito::Matcher;
    use serde_json::json;

    fn client(endpoint: String) -> ConnectClient {
        ConnectClient::new(&ClientConfig {
            region: "us-east-1".to_string(),
            credentials: Credentials::new("AKID", "secret", None),
            source: CredentialSource::Static,
            endpoint: Some(endpoint),
            role_arn: None,
        })
        .unwrap()
    }

    #[test]
    fn default_endpoint_is_regional() {
        let client = ConnectClient::new(&ClientConfig {
            region: "eu-west-2".to_string(),
            credentials: Credentials::new("AKID", "secret", None),
            source: CredentialSource::Environment,
            endpoint: None,
            role_arn: None,
        })
        .unwrap();
        assert_eq!(client.endpoint.as_str(), "https://connect.eu-west-2.amazonaws.com/");
    }

    #[test]
    fn error_codes_are_taken_from_header_or_body() {
        let not_found = service_error(
            400,
            Some("ResourceNotFoundException:http://internal.amazon.com/coral/"),
            r#"{"Message":"gone"}"#,
        );
        assert_eq!(
            not_found,
            ApiError::NotFound {
                message: "gone".to_string()
            }
        );

        let throttled = service_error(
            429,
            None,
            r#"{"__type":"com.amazonaws.connect#ThrottlingException","message":"slow down"}"#,
        );
        assert_eq!(
            throttled,
            ApiError::Service {
                code: "ThrottlingException".to_string(),
                status: 429,
                message: "slow down".to_string()
            }
        );

        assert!(service_error(404, None, "").is_not_found());
    }

    #[tokio::test]
    async fn create_puts_signed_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/agent-status/inst")
            .match_header("authorization", Matcher::Regex("^AWS4-HMAC-SHA256 ".into()))
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({ "Name": "Break", "State": "DISABLED" })))
            .with_status(200)
            .with_body(r#"{"AgentStatusId":"s-1","AgentStatusARN":"arn:s-1"}"#)
            .create_async()
            .await;

        let output = client(server.url())
            .create_agent_status(CreateAgentStatusRequest {
                instance_id: "inst".to_string(),
                name: "Break".to_string(),
                description: None,
                state: AgentStatusState::Disabled,
                display_order: None,
                tags: BTreeMap::new(),
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(output.agent_status_id.as_deref(), Some("s-1"));
        assert_eq!(output.agent_status_arn.as_deref(), Some("arn:s-1"));
    }

    #[tokio::test]
    async fn describe_maps_missing_status_to_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/agent-status/inst/gone")
            .with_status(404)
            .with_header("x-amzn-ErrorType", "ResourceNotFoundException")
            .with_body(r#"{"Message":"Agent status not found"}"#)
            .create_async()
            .await;

        let error = client(server.url())
            .describe_agent_status("inst", "gone")
            .await
            .unwrap_err();
        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn list_passes_the_continuation_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Regex("^/agent-status-summary/inst".into()))
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("nextToken".into(), "page/2".into()),
                Matcher::UrlEncoded("maxResults".into(), "10".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"AgentStatusSummaryList":[{"Id":"s-1","Arn":"arn:s-1","Name":"Break","Type":"CUSTOM"}]}"#,
            )
            .create_async()
            .await;

        let page = client(server.url())
            .list_agent_statuses(ListAgentStatusesRequest {
                instance_id: "inst".to_string(),
                next_token: Some("page/2".to_string()),
                max_results: Some(10),
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(page.agent_status_summary_list.len(), 1);
        assert_eq!(page.next_token, None);
    }

    #[tokio::test]
    async fn update_and_untag_use_their_routes() {
        let mut server = mockito::Server::new_async().await;
        let update = server
            .mock("POST", "/agent-status/inst/s-1")
            .match_body(Matcher::Json(json!({
                "Name": "Break",
                "Description": "",
                "State": "ENABLED",
                "DisplayOrder": 2
            })))
            .with_status(200)
            .create_async()
            .await;
        let untag = server
            .mock("DELETE", Matcher::Regex("^/tags/".into()))
            .match_query(Matcher::UrlEncoded("tagKeys".into(), "team".into()))
            .with_status(200)
            .create_async()
            .await;

        let client = client(server.url());
        client
            .update_agent_status(UpdateAgentStatusRequest {
                instance_id: "inst".to_string(),
                agent_status_id: "s-1".to_string(),
                name: "Break".to_string(),
                description: String::new(),
                state: AgentStatusState::Enabled,
                display_order: Some(2),
            })
            .await
            .unwrap();
        client
            .untag_resource(
                "arn:aws:connect:us-east-1:1:instance/inst/agent-state/s-1",
                &["team".to_string()],
            )
            .await
            .unwrap();

        update.assert_async().await;
        untag.assert_async().await;
    }
}

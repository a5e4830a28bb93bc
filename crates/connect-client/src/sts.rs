//! STS AssumeRole for `role_arn` provider configurations

use crate::sigv4::{self, SignableRequest, SigningParams};
use awsext_core::{ApiError, ApiResult, Credentials};
use chrono::Utc;
use reqwest::Url;
use serde::Deserialize;
use tracing::{info, instrument};

const STS_VERSION: &str = "2011-06-15";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssumeRoleResponse {
    assume_role_result: AssumeRoleResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssumeRoleResult {
    credentials: AssumedCredentials,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssumedCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
}

pub fn sts_endpoint(region: &str) -> String {
    format!("https://sts.{region}.amazonaws.com")
}

/// Exchange `credentials` for temporary credentials of `role_arn`.
#[instrument(skip(http, credentials))]
pub async fn assume_role(
    http: &reqwest::Client,
    endpoint: &str,
    region: &str,
    credentials: &Credentials,
    role_arn: &str,
) -> ApiResult<Credentials> {
    let session_name = format!("awsext-{}", Utc::now().timestamp());
    let query = sigv4::encode_query(&[
        ("Action".to_string(), "AssumeRole".to_string()),
        ("RoleArn".to_string(), role_arn.to_string()),
        ("RoleSessionName".to_string(), session_name),
        ("Version".to_string(), STS_VERSION.to_string()),
    ]);
    let mut url = Url::parse(endpoint).map_err(|e| ApiError::Transport {
        reason: format!("invalid STS endpoint {endpoint}: {e}"),
    })?;
    url.set_query(Some(&query));

    let signed = sigv4::sign(
        &SignableRequest {
            method: "GET",
            url: &url,
            headers: &[],
            body: b"",
        },
        &SigningParams {
            credentials,
            region,
            service: "sts",
            time: Utc::now(),
        },
    );

    let mut request = http.get(url);
    for (name, value) in signed {
        request = request.header(name, value);
    }
    let response = request.send().await.map_err(|e| ApiError::Transport {
        reason: e.to_string(),
    })?;

    let status = response.status();
    let body = response.text().await.map_err(|e| ApiError::Transport {
        reason: e.to_string(),
    })?;
    if !status.is_success() {
        return Err(ApiError::Service {
            code: "AssumeRoleFailed".to_string(),
            status: status.as_u16(),
            message: body,
        });
    }

    let parsed = parse_assume_role(&body)?;
    info!("Assumed provider role");
    Ok(parsed)
}

fn parse_assume_role(body: &str) -> ApiResult<Credentials> {
    let response: AssumeRoleResponse =
        quick_xml::de::from_str(body).map_err(|e| ApiError::Decode {
            reason: e.to_string(),
        })?;
    let assumed = response.assume_role_result.credentials;
    Ok(Credentials::new(
        assumed.access_key_id,
        assumed.secret_access_key,
        Some(assumed.session_token),
    ))
}

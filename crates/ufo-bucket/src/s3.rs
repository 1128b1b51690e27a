use std::env;
use std::error::Error as StdError;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::create_bucket::CreateBucketError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::debug;

use crate::{BucketError, ObjectStore, DEFAULT_REGION};

// S3 rejects an explicit location constraint for its default region.
const US_EAST_1: &str = "us-east-1";

#[derive(Debug, Clone)]
pub struct S3Config {
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub force_path_style: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            force_path_style: false,
        }
    }
}

impl S3Config {
    /// Reads `UFO_S3_*` variables, falling back to [`S3Config::default`] for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            region: non_empty_var("UFO_S3_REGION").unwrap_or(defaults.region),
            endpoint: non_empty_var("UFO_S3_ENDPOINT_URL"),
            access_key_id: non_empty_var("UFO_S3_ACCESS_KEY_ID"),
            secret_access_key: non_empty_var("UFO_S3_SECRET_ACCESS_KEY"),
            session_token: non_empty_var("UFO_S3_SESSION_TOKEN"),
            force_path_style: non_empty_var("UFO_S3_FORCE_PATH_STYLE")
                .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.force_path_style),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

#[derive(Clone, Debug)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub async fn new(config: S3Config) -> Result<Self, BucketError> {
        if config.region.is_empty() {
            return Err(BucketError::Configuration(
                "region cannot be empty".into(),
            ));
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(access_key), Some(secret_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            let credentials = Credentials::new(
                access_key,
                secret_key,
                config.session_token.clone(),
                None,
                "static",
            );
            loader = loader.credentials_provider(SharedCredentialsProvider::new(credentials));
        }

        let shared_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared_config);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        debug!(region = %config.region, endpoint = ?config.endpoint, "configured s3 client");

        Ok(Self {
            client: Client::from_conf(builder.build()),
        })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn create_bucket(&self, bucket: &str, region: &str) -> Result<(), BucketError> {
        self.client
            .create_bucket()
            .bucket(bucket)
            .set_create_bucket_configuration(bucket_configuration(region))
            .send()
            .await
            .map_err(|err| classify_create_bucket(bucket, err))?;
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), BucketError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(classify_sdk)?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, BucketError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .is_some_and(GetObjectError::is_no_such_key)
                {
                    BucketError::NotFound(format!("{bucket}/{key}"))
                } else {
                    classify_sdk(err)
                }
            })?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|err| BucketError::Unexpected(err.to_string()))?;
        Ok(data.into_bytes())
    }
}

/// Location constraint for `region`; `us-east-1` must be sent without one.
fn bucket_configuration(region: &str) -> Option<CreateBucketConfiguration> {
    (region != US_EAST_1).then(|| {
        CreateBucketConfiguration::builder()
            .location_constraint(BucketLocationConstraint::from(region))
            .build()
    })
}

fn classify_create_bucket(bucket: &str, err: SdkError<CreateBucketError>) -> BucketError {
    if let Some(service) = err.as_service_error() {
        if service.is_bucket_already_owned_by_you() {
            return BucketError::AlreadyOwnedByYou(bucket.to_string());
        }
        if service.is_bucket_already_exists() {
            return BucketError::OwnedByOther(bucket.to_string());
        }
    }
    classify_sdk(err)
}

/// Service errors become [`BucketError::Client`]; dispatch, timeout and response
/// failures become [`BucketError::Unexpected`].
fn classify_sdk<E>(err: SdkError<E>) -> BucketError
where
    E: ProvideErrorMetadata + StdError + Send + Sync + 'static,
{
    if let Some(service) = err.as_service_error() {
        return BucketError::client(
            service.code().unwrap_or("Unknown"),
            service.message().unwrap_or_default(),
        );
    }
    BucketError::Unexpected(DisplayErrorContext(&err).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::config::http::HttpResponse;
    use aws_sdk_s3::error::ErrorMetadata;
    use aws_sdk_s3::operation::put_object::PutObjectError;
    use aws_sdk_s3::primitives::SdkBody;
    use aws_sdk_s3::types::error::{BucketAlreadyExists, BucketAlreadyOwnedByYou};
    use aws_smithy_runtime_api::http::StatusCode;

    fn raw(status: u16) -> HttpResponse {
        HttpResponse::new(StatusCode::try_from(status).unwrap(), SdkBody::empty())
    }

    #[test]
    fn us_east_1_sends_no_location_constraint() {
        assert!(bucket_configuration("us-east-1").is_none());

        let configuration = bucket_configuration("eu-central-1").unwrap();
        assert_eq!(
            configuration.location_constraint(),
            Some(&BucketLocationConstraint::EuCentral1)
        );
    }

    #[test]
    fn bucket_conflicts_map_to_ownership_errors() {
        let mine = SdkError::service_error(
            CreateBucketError::BucketAlreadyOwnedByYou(BucketAlreadyOwnedByYou::builder().build()),
            raw(409),
        );
        let theirs = SdkError::service_error(
            CreateBucketError::BucketAlreadyExists(BucketAlreadyExists::builder().build()),
            raw(409),
        );

        assert!(matches!(
            classify_create_bucket("b", mine),
            BucketError::AlreadyOwnedByYou(ref name) if name == "b"
        ));
        assert!(matches!(
            classify_create_bucket("b", theirs),
            BucketError::OwnedByOther(ref name) if name == "b"
        ));
    }

    #[test]
    fn other_service_errors_keep_their_code() {
        let err = SdkError::service_error(
            CreateBucketError::generic(
                ErrorMetadata::builder()
                    .code("IllegalLocationConstraintException")
                    .message("constraint does not match endpoint")
                    .build(),
            ),
            raw(400),
        );

        match classify_create_bucket("b", err) {
            BucketError::Client { code, message } => {
                assert_eq!(code, "IllegalLocationConstraintException");
                assert_eq!(message, "constraint does not match endpoint");
            }
            other => panic!("unexpected classification: {other:?}"),
        }

        let denied = SdkError::service_error(
            PutObjectError::generic(ErrorMetadata::builder().code("AccessDenied").build()),
            raw(403),
        );
        assert!(matches!(
            classify_sdk(denied),
            BucketError::Client { ref code, .. } if code == "AccessDenied"
        ));
    }

    #[test]
    fn transport_failures_are_unexpected() {
        let err: SdkError<CreateBucketError, HttpResponse> =
            SdkError::timeout_error("operation timed out");

        assert!(matches!(
            classify_create_bucket("b", err),
            BucketError::Unexpected(_)
        ));
    }
}

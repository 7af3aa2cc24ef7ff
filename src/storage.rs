//! Blob storage for uploaded document bytes.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder as S3ConfigBuilder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

use crate::config::AppConfig;

#[async_trait]
pub trait ObjectStorage: Send + Sync + 'static {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<()>;

    async fn delete_object(&self, key: &str) -> Result<()>;
}

pub fn document_key(case_id: uuid::Uuid, document_id: uuid::Uuid) -> String {
    format!("cases/{case_id}/documents/{document_id}")
}

pub struct S3Storage {
    client: S3Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let client = build_client(config).await?;
        Ok(Self::new(client, config.s3_bucket.clone()))
    }
}

async fn build_client(config: &AppConfig) -> Result<S3Client> {
    let region_provider =
        RegionProviderChain::first_try(Some(Region::new(config.aws_region.clone())))
            .or_default_provider()
            .or_else("us-east-1");

    #[allow(deprecated)]
    let mut loader = aws_config::from_env().region(region_provider);
    if let Some(endpoint) = &config.aws_endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }
    if let (Some(access_key), Some(secret_key)) = (
        config.aws_access_key_id.clone(),
        config.aws_secret_access_key.clone(),
    ) {
        loader = loader.credentials_provider(Credentials::new(
            access_key, secret_key, None, None, "static",
        ));
    }

    let shared = loader.load().await;
    let s3_config = S3ConfigBuilder::from(&shared).force_path_style(true).build();
    Ok(S3Client::from_conf(s3_config))
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes));
        if let Some(content_type) = content_type {
            request = request.content_type(content_type);
        }

        request
            .send()
            .await
            .with_context(|| format!("failed to store document blob {key}"))?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("failed to delete document blob {key}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::document_key;
    use uuid::Uuid;

    #[test]
    fn document_keys_are_scoped_by_case() {
        let case_id = Uuid::nil();
        let document_id = Uuid::from_u128(7);
        assert_eq!(
            document_key(case_id, document_id),
            format!("cases/{case_id}/documents/{document_id}")
        );
    }
}

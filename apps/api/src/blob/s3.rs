use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{BlobError, BlobInfo, BlobStore, PutOptions};

/// S3 / MinIO backed blob store. Write-once is enforced server-side with
/// `If-None-Match: *`.
#[derive(Clone)]
pub struct S3BlobStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: String,
}

impl S3BlobStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: String, public_base_url: String) -> Self {
        Self {
            client,
            bucket,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, name: &str, body: Bytes, options: PutOptions) -> Result<BlobInfo, BlobError> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(name)
            .body(ByteStream::from(body))
            .content_type(options.content_type)
            .set_cache_control(options.cache_control)
            .set_metadata(Some(options.metadata))
            .if_none_match("*");
        if options.public_read {
            request = request.acl(ObjectCannedAcl::PublicRead);
        }

        request.send().await.map_err(|e| {
            let status = e.raw_response().map(|r| r.status().as_u16());
            if status == Some(412) {
                BlobError::AlreadyExists(name.to_string())
            } else {
                BlobError::Backend(format!("put {name}: {}", DisplayErrorContext(&e)))
            }
        })?;

        info!("Uploaded s3://{}/{}", self.bucket, name);
        self.stat(name).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BlobInfo>, BlobError> {
        let mut blobs = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| BlobError::Backend(format!("list {prefix}: {}", DisplayErrorContext(&e))))?;

            blobs.extend(output.contents().iter().filter_map(|object| {
                let name = object.key()?;
                Some(BlobInfo {
                    name: name.to_string(),
                    time_created: to_utc(object.last_modified()?)?,
                    public_url: self.public_url(name),
                })
            }));

            match output.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        debug!("Listed {} blobs under {prefix}", blobs.len());
        Ok(blobs)
    }

    async fn stat(&self, name: &str) -> Result<BlobInfo, BlobError> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().map(|s| s.is_not_found()).unwrap_or(false) {
                    BlobError::NotFound(name.to_string())
                } else {
                    BlobError::Backend(format!("head {name}: {}", DisplayErrorContext(&e)))
                }
            })?;

        let time_created = output
            .last_modified()
            .and_then(to_utc)
            .ok_or_else(|| BlobError::Backend(format!("head {name}: no Last-Modified")))?;
        Ok(BlobInfo {
            name: name.to_string(),
            time_created,
            public_url: self.public_url(name),
        })
    }

    async fn download(&self, name: &str) -> Result<Bytes, BlobError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().map(|s| s.is_no_such_key()).unwrap_or(false) {
                    BlobError::NotFound(name.to_string())
                } else {
                    BlobError::Backend(format!("get {name}: {}", DisplayErrorContext(&e)))
                }
            })?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| BlobError::Backend(format!("read {name}: {e}")))?;
        Ok(body.into_bytes())
    }

    fn public_url(&self, name: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, self.bucket, name)
    }
}

fn to_utc(time: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(time.secs(), time.subsec_nanos())
}

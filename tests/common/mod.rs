use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, ensure, Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use bates_backend::auth::jwt::JwtService;
use bates_backend::config::AppConfig;
use bates_backend::db::{self, PgPool};
use bates_backend::intake::{PageCountStrategy, DEFAULT_PAGE_SIZE_BYTES};
use bates_backend::routes;
use bates_backend::state::AppState;
use bates_backend::storage::ObjectStorage;
use diesel::connection::SimpleConnection;
use diesel::PgConnection;
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

pub const TEST_POOL_SIZE: u32 = 4;

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[allow(dead_code)]
#[derive(Clone)]
pub struct StoredObject {
    pub key: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<String, StoredObject>>,
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<()> {
        let stored = StoredObject {
            key: key.to_string(),
            bytes,
            content_type,
        };
        let mut guard = self.objects.lock().await;
        guard.insert(stored.key.clone(), stored);
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let mut guard = self.objects.lock().await;
        guard.remove(key);
        Ok(())
    }
}

impl FakeStorage {
    #[allow(dead_code)]
    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        let guard = self.objects.lock().await;
        guard.get(key).cloned()
    }

    #[allow(dead_code)]
    pub async fn object_count(&self) -> usize {
        let guard = self.objects.lock().await;
        guard.len()
    }
}

#[allow(dead_code)]
#[derive(Debug, Deserialize)]
pub struct CaseInfo {
    pub id: Uuid,
    pub name: String,
    pub bates_prefix: Option<String>,
    pub current_bates_number: i64,
}

#[allow(dead_code)]
#[derive(Debug, Deserialize)]
pub struct DocumentInfo {
    pub id: Uuid,
    pub case_id: Uuid,
    pub name: String,
    pub mime_type: Option<String>,
    pub file_size: i64,
    pub checksum: String,
    pub page_count: i32,
    pub bates_start: Option<String>,
    pub bates_end: Option<String>,
    pub deleted_at: Option<String>,
}

#[allow(dead_code)]
#[derive(Debug, Deserialize)]
pub struct ProductionInfo {
    pub id: Uuid,
    pub case_id: Uuid,
    pub name: String,
    pub recipient: String,
    pub produced_date: String,
    pub bates_prefix: Option<String>,
    pub current_bates_number: i64,
}

#[allow(dead_code)]
#[derive(Debug, Deserialize)]
pub struct EntryInfo {
    pub id: Uuid,
    pub production_set_id: Uuid,
    pub document_id: Uuid,
    pub bates_number: Option<String>,
    pub is_privileged: bool,
    pub privilege_reason: Option<String>,
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    storage: Arc<FakeStorage>,
}

#[allow(dead_code)]
impl TestApp {
    pub async fn new() -> Result<Self> {
        let database_url = env::var("TEST_DATABASE_URL")
            .context("TEST_DATABASE_URL must be set for integration tests")?;

        let config = AppConfig {
            database_url: database_url.clone(),
            database_max_pool_size: TEST_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "test-issuer".to_string(),
            jwt_audience: "test-audience".to_string(),
            jwt_expiry_minutes: 60,
            cors_allowed_origin: None,
            aws_endpoint_url: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_region: "us-east-1".to_string(),
            s3_bucket: "test-bucket".to_string(),
            page_size_bytes: DEFAULT_PAGE_SIZE_BYTES,
            page_count_strategy: PageCountStrategy::FileSize,
            allocation_timeout: Duration::from_secs(5),
            max_upload_bytes: 16 * 1024 * 1024,
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let storage = Arc::new(FakeStorage::default());
        let storage_for_state: Arc<dyn ObjectStorage> = storage.clone();
        let jwt = JwtService::from_config(&config)?;
        let state = AppState::new(pool.clone(), config, storage_for_state, jwt);
        let router = routes::create_router(state.clone())?;

        Ok(Self {
            state,
            router,
            storage,
        })
    }

    pub async fn cleanup(&self) -> Result<()> {
        self.with_conn(truncate_all).await
    }

    pub fn storage(&self) -> Arc<FakeStorage> {
        self.storage.clone()
    }

    pub fn token(&self) -> Result<String> {
        self.state
            .jwt
            .generate_token(Uuid::new_v4(), "reviewer", "paralegal")
    }

    pub async fn create_case(&self, name: &str, prefix: Option<&str>, token: &str) -> Result<CaseInfo> {
        #[derive(Serialize)]
        struct Payload<'a> {
            name: &'a str,
            bates_prefix: Option<&'a str>,
        }

        let response = self
            .post_json(
                "/api/cases",
                &Payload {
                    name,
                    bates_prefix: prefix,
                },
                Some(token),
            )
            .await?;
        expect_json(response, StatusCode::CREATED).await
    }

    /// Uploads `size` bytes; with the default page size every 50 000 bytes
    /// is one estimated page.
    pub async fn intake(
        &self,
        case_id: Uuid,
        filename: &str,
        size: usize,
        auto_bates: bool,
        token: &str,
    ) -> Result<DocumentInfo> {
        let data = vec![b'x'; size];
        let response = self
            .upload_document(
                &format!("/api/cases/{case_id}/documents"),
                filename,
                "application/octet-stream",
                &data,
                auto_bates.then_some("true"),
                token,
            )
            .await?;
        expect_json(response, StatusCode::CREATED).await
    }

    pub async fn create_production(
        &self,
        case_id: Uuid,
        name: &str,
        recipient: &str,
        token: &str,
    ) -> Result<ProductionInfo> {
        #[derive(Serialize)]
        struct Payload<'a> {
            name: &'a str,
            recipient: &'a str,
            produced_date: &'a str,
        }

        let response = self
            .post_json(
                &format!("/api/cases/{case_id}/productions"),
                &Payload {
                    name,
                    recipient,
                    produced_date: "2024-06-01",
                },
                Some(token),
            )
            .await?;
        expect_json(response, StatusCode::CREATED).await
    }

    pub async fn add_to_production(
        &self,
        production_id: Uuid,
        document_ids: &[Uuid],
        prefix: Option<&str>,
        token: &str,
    ) -> Result<hyper::Response<Body>> {
        #[derive(Serialize)]
        struct Payload<'a> {
            document_ids: &'a [Uuid],
            bates_prefix: Option<&'a str>,
        }

        self.post_json(
            &format!("/api/productions/{production_id}/documents"),
            &Payload {
                document_ids,
                bates_prefix: prefix,
            },
            Some(token),
        )
        .await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::POST, path, payload, token).await
    }

    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PATCH, path, payload, token).await
    }

    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PUT, path, payload, token).await
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::DELETE).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn upload_document(
        &self,
        path: &str,
        filename: &str,
        content_type: &str,
        data: &[u8],
        auto_bates: Option<&str>,
        token: &str,
    ) -> Result<hyper::Response<Body>> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();
        body.extend(format!("--{boundary}\r\n").as_bytes());
        body.extend(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                filename
            )
            .as_bytes(),
        );
        body.extend(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend(data);
        body.extend(b"\r\n");

        if let Some(flag) = auto_bates {
            body.extend(format!("--{boundary}\r\n").as_bytes());
            body.extend(b"Content-Disposition: form-data; name=\"auto_bates\"\r\n\r\n");
            body.extend(flag.as_bytes());
            body.extend(b"\r\n");
        }

        body.extend(format!("--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .header("authorization", format!("Bearer {token}"))
            .body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

#[allow(dead_code)]
pub async fn expect_json<T: DeserializeOwned>(
    response: hyper::Response<Body>,
    expected: StatusCode,
) -> Result<T> {
    let status = response.status();
    let body = body_to_vec(response.into_body()).await?;
    ensure!(
        status == expected,
        "expected {expected}, got {status}: {}",
        String::from_utf8_lossy(&body)
    );
    Ok(serde_json::from_slice(&body)?)
}

#[allow(dead_code)]
pub async fn error_message(response: hyper::Response<Body>) -> Result<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: String,
    }
    let body = body_to_vec(response.into_body()).await?;
    let parsed: ErrorBody = serde_json::from_slice(&body)?;
    Ok(parsed.error)
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        db::run_migrations(&mut conn)?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE privilege_log_entries, production_documents, production_sets, documents, cases CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}

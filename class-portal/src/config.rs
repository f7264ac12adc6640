use clap::{Parser, ValueEnum};
use class_portal_core::auth::AdminCredentials;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BlobBackend {
    /// Files under `--upload-dir`
    Local,
    /// Objects in `--s3-bucket`, using the standard AWS environment
    S3,
}

#[derive(Parser, Clone, Debug)]
#[command(name = "class-portal")]
#[command(about = "Tuition class content portal")]
pub struct Config {
    /// Listen host
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Listen port
    #[arg(short, long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Directory holding the class documents
    #[arg(long, env = "PORTAL_STORE_DIR", default_value = "data/classes")]
    pub store_dir: PathBuf,

    #[arg(long, env = "PORTAL_BLOB_BACKEND", value_enum, default_value_t = BlobBackend::Local)]
    pub blob_backend: BlobBackend,

    /// Directory for uploaded bytes when the backend is `local`
    #[arg(long, env = "PORTAL_UPLOAD_DIR", default_value = "uploads")]
    pub upload_dir: PathBuf,

    #[arg(long, env = "PORTAL_S3_BUCKET", required_if_eq("blob_backend", "s3"))]
    pub s3_bucket: Option<String>,

    /// Secret used to sign admin tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    #[arg(long, env = "ADMIN_USERNAME")]
    pub admin_username: String,

    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: String,

    /// Base URL used when building file links, e.g. https://portal.example.com
    #[arg(long, env = "PUBLIC_BASE_URL")]
    pub public_base_url: Option<String>,

    #[arg(long, env = "PORTAL_MAX_UPLOAD_BYTES", default_value_t = 10 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    /// Leave fault details out of 500 responses
    #[arg(long, env = "PORTAL_PRODUCTION")]
    pub production: bool,
}

impl Config {
    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    pub fn base_url(&self) -> String {
        match &self.public_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://localhost:{}", self.port),
        }
    }

    pub fn credentials(&self) -> AdminCredentials {
        AdminCredentials {
            username: self.admin_username.clone(),
            password: self.admin_password.clone(),
        }
    }
}

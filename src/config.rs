use anyhow::{Context, Result};
use log::debug;
use reqwest::{
    Client,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use std::path::PathBuf;
use std::sync::Arc;

use crate::{
    archive::TarGzExtractor, http::HttpClient, manifest::DEFAULT_MANIFEST,
    provider::GitHubProvider, runtime::Runtime,
};

pub const DEFAULT_ROOT: &str = "./deps";
pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_ARCHIVE_URL: &str = "https://github.com";
const USER_AGENT: &str = "bpkg-cli";

/// Settings given on the command line. Unset fields fall back to the
/// environment, then to defaults.
#[derive(Debug, Default, Clone)]
pub struct Options {
    pub root: Option<PathBuf>,
    pub api_url: Option<String>,
    pub archive_url: Option<String>,
    pub token: Option<String>,
}

/// Everything an application flow needs, wired once per process.
pub struct Config<R: Runtime> {
    pub runtime: Arc<R>,
    pub root: PathBuf,
    pub manifest_file_name: String,
    pub provider: GitHubProvider<R>,
    pub extractor: TarGzExtractor,
}

impl<R: Runtime + 'static> Config<R> {
    pub fn new(runtime: R, options: Options) -> Result<Self> {
        let runtime = Arc::new(runtime);

        let mut headers = HeaderMap::new();
        let token = options
            .token
            .or_else(|| runtime.env_var("GITHUB_TOKEN").ok())
            .filter(|t| !t.is_empty());
        if let Some(token) = token {
            let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
                .context("GITHUB_TOKEN is not a valid header value")?;
            auth_value.set_sensitive(true);
            headers.insert(AUTHORIZATION, auth_value);
            debug!("Using GitHub token {}", mask(&token));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        let api_url = options.api_url.as_deref().unwrap_or(DEFAULT_API_URL);
        let archive_url = options.archive_url.as_deref().unwrap_or(DEFAULT_ARCHIVE_URL);
        let provider =
            GitHubProvider::new(runtime.clone(), HttpClient::new(client), api_url, archive_url);

        let root = options
            .root
            .or_else(|| runtime.env_var("BPKG_ROOT").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT));
        debug!("Install root: {:?}", root);

        Ok(Self {
            runtime,
            root,
            manifest_file_name: DEFAULT_MANIFEST.to_string(),
            provider,
            extractor: TarGzExtractor,
        })
    }
}

/// Show only the ends of a secret.
fn mask(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 12 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}****{}", head, tail)
}

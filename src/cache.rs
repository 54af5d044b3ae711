use std::borrow::Cow;
use std::fs;
use std::io;
use std::thread;
use std::time::{Duration, SystemTime};

use camino::{Utf8Path, Utf8PathBuf};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::redirect::Policy;
use reqwest::Url;
use tempfile::Builder;
use tracing::debug;

use crate::error::IndexError;
use crate::fs_util::write_bytes_atomic;
use crate::text::sanitize_for_filename;

const HTTP_CACHE_DIR: &str = "http_cache";
const DOWNLOAD_DIR: &str = "downloaded_rdf_files";

/// Network access used by the extractors. Responses and downloaded files are
/// cached on disk so repeated runs avoid hitting the registries again.
pub trait Fetcher: Send + Sync {
    /// GET `url` as text, bypassing the response cache.
    fn fetch(&self, url: &str) -> Result<String, IndexError>;

    /// GET `url` as text, served from the response cache of `namespace` when
    /// a fresh copy exists.
    fn fetch_cached(&self, url: &str, namespace: &str) -> Result<String, IndexError>;

    /// Local copy of the file at `url`, downloaded on first use.
    fn local_file(&self, url: &str) -> Result<Utf8PathBuf, IndexError>;

    /// Where [`Fetcher::local_file`] keeps the copy of `url`.
    fn local_path_for(&self, url: &str) -> Utf8PathBuf;
}

#[derive(Debug, Clone)]
pub struct HttpCacheOptions {
    pub connect_timeout: Duration,
    pub timeout: Duration,
    /// `None` keeps cached responses forever.
    pub response_ttl: Option<Duration>,
}

impl Default for HttpCacheOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            timeout: Duration::from_secs(300),
            response_ttl: None,
        }
    }
}

#[derive(Clone)]
pub struct HttpCache {
    client: Client,
    root: Utf8PathBuf,
    response_ttl: Option<Duration>,
}

impl HttpCache {
    pub fn new(root: &Utf8Path, options: &HttpCacheOptions) -> Result<Self, IndexError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("ontology-index/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| IndexError::Http(err.to_string()))?,
        );

        // several registries serve incomplete certificate chains
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(options.connect_timeout)
            .timeout(options.timeout)
            .redirect(Policy::limited(10))
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|err| IndexError::Http(err.to_string()))?;

        Ok(Self {
            client,
            root: root.to_path_buf(),
            response_ttl: options.response_ttl,
        })
    }

    pub fn response_path(&self, url: &str, namespace: &str) -> Utf8PathBuf {
        self.root
            .join(HTTP_CACHE_DIR)
            .join(sanitize_for_filename(namespace))
            .join(cache_key(&without_api_key(url)))
    }

    fn is_fresh(&self, path: &Utf8Path) -> bool {
        let Ok(meta) = fs::metadata(path.as_std_path()) else {
            return false;
        };
        match self.response_ttl {
            None => true,
            Some(ttl) => meta
                .modified()
                .ok()
                .and_then(|modified| SystemTime::now().duration_since(modified).ok())
                .map(|age| age < ttl)
                .unwrap_or(false),
        }
    }

    fn send_with_retries<F>(&self, url: &str, mut make_req: F) -> Result<Response, IndexError>
    where
        F: FnMut() -> RequestBuilder,
    {
        const MAX_RETRIES: usize = 2;
        const BASE_DELAY_MS: u64 = 500;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send()?;
            let status = response.status().as_u16();
            if response.status().is_success() {
                return Ok(response);
            }
            if attempt < MAX_RETRIES && is_retryable_status(status) {
                let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                debug!(url, status, delay_ms = delay, "retrying request");
                thread::sleep(Duration::from_millis(delay));
                attempt += 1;
                continue;
            }
            return Err(IndexError::HttpStatus {
                status,
                url: url.to_string(),
            });
        }
    }
}

impl Fetcher for HttpCache {
    fn fetch(&self, url: &str) -> Result<String, IndexError> {
        debug!(url, "requesting");
        let response = self.send_with_retries(url, || self.client.get(url))?;
        Ok(response.text()?)
    }

    fn fetch_cached(&self, url: &str, namespace: &str) -> Result<String, IndexError> {
        let path = self.response_path(url, namespace);
        if self.is_fresh(&path) {
            debug!(url, "response cache hit");
            return fs::read_to_string(path.as_std_path())
                .map_err(|err| IndexError::Filesystem(err.to_string()));
        }

        debug!(url, "requesting");
        let response = self.send_with_retries(url, || self.client.get(url))?;
        let body = response.text()?;
        write_bytes_atomic(&path, body.as_bytes())?;
        Ok(body)
    }

    fn local_file(&self, url: &str) -> Result<Utf8PathBuf, IndexError> {
        let path = self.local_path_for(url);
        if path.as_std_path().exists() {
            debug!(url, path = %path, "file cache hit");
            return Ok(path);
        }

        debug!(url, path = %path, "downloading");
        let dir = self.root.join(DOWNLOAD_DIR);
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| IndexError::Filesystem(err.to_string()))?;
        let mut response = self.send_with_retries(url, || self.client.get(url))?;
        let mut temp = Builder::new()
            .prefix(".download")
            .tempfile_in(dir.as_std_path())
            .map_err(|err| IndexError::Filesystem(err.to_string()))?;
        io::copy(&mut response, &mut temp).map_err(|err| {
            // body read errors surface as io errors wrapping the reqwest timeout
            if err.kind() == io::ErrorKind::TimedOut {
                IndexError::Timeout(format!("{url}: {err}"))
            } else {
                IndexError::Http(format!("{url}: {err}"))
            }
        })?;
        temp.persist(path.as_std_path())
            .map_err(|err| IndexError::Filesystem(err.to_string()))?;
        Ok(path)
    }

    fn local_path_for(&self, url: &str) -> Utf8PathBuf {
        self.root
            .join(DOWNLOAD_DIR)
            .join(sanitize_for_filename(&without_api_key(url)))
    }
}

/// `url` minus any `apikey` query parameter, so credentials never end up in
/// cache file names.
fn without_api_key(url: &str) -> Cow<'_, str> {
    let Ok(mut parsed) = Url::parse(url) else {
        return Cow::Borrowed(url);
    };
    let has_key = parsed
        .query_pairs()
        .any(|(key, _)| key.eq_ignore_ascii_case("apikey"));
    if !has_key {
        return Cow::Borrowed(url);
    }
    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !key.eq_ignore_ascii_case("apikey"))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(kept);
    }
    Cow::Owned(parsed.into())
}

/// Non-word characters become `_`.
fn cache_key(url: &str) -> String {
    url.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 502 | 503)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(root: &Utf8Path, ttl: Option<Duration>) -> HttpCache {
        HttpCache::new(
            root,
            &HttpCacheOptions {
                response_ttl: ttl,
                ..HttpCacheOptions::default()
            },
        )
        .unwrap()
    }

    fn utf8_root(dir: &tempfile::TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
    }

    #[test]
    fn cache_layout() {
        let dir = tempfile::tempdir().unwrap();
        let root = utf8_root(&dir);
        let cache = cache(&root, None);
        assert_eq!(
            cache.local_path_for("https://x.org/a-b.ttl"),
            root.join("downloaded_rdf_files/https___x_org_a-b_ttl")
        );
        assert_eq!(
            cache.response_path("https://x.org/a-b?p=1", "ols"),
            root.join("http_cache/ols/https___x_org_a_b_p_1")
        );
    }

    #[test]
    fn serves_cached_response_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let root = utf8_root(&dir);
        let cache = cache(&root, Some(Duration::from_secs(3600)));
        let url = "http://127.0.0.1:9/never-requested";
        let path = cache.response_path(url, "test");
        write_bytes_atomic(&path, b"{\"cached\":true}").unwrap();
        assert_eq!(cache.fetch_cached(url, "test").unwrap(), "{\"cached\":true}");
    }

    #[test]
    fn serves_downloaded_file_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let root = utf8_root(&dir);
        let cache = cache(&root, None);
        let url = "http://127.0.0.1:9/onto.ttl";
        let path = cache.local_path_for(url);
        write_bytes_atomic(&path, b"@prefix owl: <http://www.w3.org/2002/07/owl#> .").unwrap();
        assert_eq!(cache.local_file(url).unwrap(), path);
    }

    #[test]
    fn api_keys_stay_out_of_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let root = utf8_root(&dir);
        let cache = cache(&root, None);
        let with_key = "https://data.bioontology.org/ontologies/ONE/download?apikey=0123abcd-9876-fedc-aaaa-secretkey000&download_format=rdf";
        let without = "https://data.bioontology.org/ontologies/ONE/download?download_format=rdf";

        let download = cache.local_path_for(with_key);
        assert!(!download.as_str().contains("secretkey"));
        assert_eq!(download, cache.local_path_for(without));

        let response = cache.response_path(with_key, "bioportal");
        assert!(!response.as_str().contains("secretkey"));
        assert_eq!(response, cache.response_path(without, "bioportal"));

        let only_key = "https://data.bioontology.org/ontologies?APIKEY=secretkey";
        assert_eq!(
            cache.response_path(only_key, "bioportal"),
            cache.response_path("https://data.bioontology.org/ontologies", "bioportal")
        );
    }
}

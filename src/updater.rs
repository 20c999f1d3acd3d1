//! Release update checks against the GitHub "latest release" endpoint.
//!
//! A newer release can be downloaded and then handed to the desktop: installers
//! are launched, anything else has its folder opened.

use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{Result, TypeAssistError};

/// Version of this build, compared against the remote release tag.
pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

const GITHUB_API: &str = "https://api.github.com";
const CHECK_TIMEOUT: Duration = Duration::from_secs(8);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
/// Asset extensions in order of preference.
const PREFERRED_EXTENSIONS: [&str; 3] = [".exe", ".zip", ".msi"];
/// Downloads that are run directly instead of revealed in their folder.
const INSTALLER_EXTENSIONS: [&str; 2] = [".exe", ".msi"];

#[derive(Debug, Deserialize)]
struct GithubRelease {
    tag_name: Option<String>,
    name: Option<String>,
    body: Option<String>,
    html_url: Option<String>,
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: Option<String>,
    #[serde(default)]
    pub size: u64,
}

/// A release that is newer than the running build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    /// Tag with any leading `v` removed.
    pub tag: String,
    pub body: String,
    pub html_url: Option<String>,
    pub assets: Vec<ReleaseAsset>,
}

impl ReleaseInfo {
    pub fn preferred_asset(&self) -> Option<&ReleaseAsset> {
        select_asset(&self.assets)
    }
}

/// Strip a leading `v`/`V` from a release tag.
pub fn normalize_tag(tag: &str) -> &str {
    let tag = tag.trim();
    tag.strip_prefix(['v', 'V']).unwrap_or(tag)
}

fn numeric_parts(version: &str) -> Option<Vec<u64>> {
    // "1.2.0-beta" compares on "1.2.0"
    let core = version.split(['-', '+']).next()?;
    core.split('.').map(|part| part.parse().ok()).collect()
}

/// Whether `remote` should be offered as an update over `current`.
///
/// Dotted numeric versions are compared component-wise (missing components
/// count as zero). Anything else is treated as newer whenever it differs.
pub fn is_newer(remote: &str, current: &str) -> bool {
    let remote = normalize_tag(remote);
    let current = normalize_tag(current);
    if remote.is_empty() {
        return false;
    }

    match (numeric_parts(remote), numeric_parts(current)) {
        (Some(r), Some(c)) => {
            let len = r.len().max(c.len());
            let at = |v: &[u64], i: usize| v.get(i).copied().unwrap_or(0);
            (0..len)
                .map(|i| at(&r, i).cmp(&at(&c, i)))
                .find(|ordering| *ordering != Ordering::Equal)
                == Some(Ordering::Greater)
        }
        _ => remote != current,
    }
}

/// Pick the asset to download: the first `.exe`, else `.zip`, else `.msi`,
/// else the first asset of any kind.
pub fn select_asset(assets: &[ReleaseAsset]) -> Option<&ReleaseAsset> {
    PREFERRED_EXTENSIONS
        .iter()
        .find_map(|ext| {
            assets
                .iter()
                .find(|asset| asset.name.to_lowercase().ends_with(ext))
        })
        .or_else(|| assets.first())
}

/// Default download directory: `~/Downloads`.
pub fn default_download_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join("Downloads"))
}

/// What to hand to the desktop after downloading `path`: the file itself for
/// installers, otherwise the folder containing it.
pub fn launch_target(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if INSTALLER_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
        return path.to_path_buf();
    }
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Launch a downloaded installer or open the folder holding the download.
/// Returns what was opened.
pub fn open_download(path: &Path) -> Result<PathBuf> {
    let target = launch_target(path);
    info!("Opening {}", target.display());
    open::that_detached(&target)?;
    Ok(target)
}

pub struct Updater {
    client: reqwest::Client,
    api_base: String,
    repo: String,
    current_version: String,
}

impl Updater {
    /// Updater for the GitHub repository `owner/name`.
    pub fn new(repo: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("typeassist/{CURRENT_VERSION}"))
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_base: GITHUB_API.to_string(),
            repo: repo.to_string(),
            current_version: CURRENT_VERSION.to_string(),
        })
    }

    /// Compare against `version` instead of this build's version.
    pub fn with_current_version(mut self, version: impl Into<String>) -> Self {
        self.current_version = version.into();
        self
    }

    /// Query a GitHub-compatible API at `base` instead of api.github.com.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn latest_url(&self) -> String {
        format!("{}/repos/{}/releases/latest", self.api_base, self.repo)
    }

    /// Fetch the latest release. Returns `None` when it is not newer.
    pub async fn check(&self) -> Result<Option<ReleaseInfo>> {
        let url = self.latest_url();
        debug!("Checking {} for updates", url);
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/vnd.github.v3+json")
            .timeout(CHECK_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TypeAssistError::update_check(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let release: GithubRelease = response.json().await?;
        let tag = release
            .tag_name
            .or(release.name)
            .map(|tag| normalize_tag(&tag).to_string())
            .unwrap_or_default();

        if !is_newer(&tag, &self.current_version) {
            info!("No updates found (latest is '{}')", tag);
            return Ok(None);
        }

        info!("Update available: {} (running {})", tag, self.current_version);
        Ok(Some(ReleaseInfo {
            tag,
            body: release.body.unwrap_or_default(),
            html_url: release.html_url,
            assets: release.assets,
        }))
    }

    /// Download the preferred asset of `release` into `dir`.
    ///
    /// `progress` receives the downloaded byte count and, when the server
    /// sent one, the total size. The file is written under a `.partial` name
    /// and renamed once complete.
    pub async fn download<F>(&self, release: &ReleaseInfo, dir: &Path, mut progress: F) -> Result<PathBuf>
    where
        F: FnMut(u64, Option<u64>),
    {
        let asset = release
            .preferred_asset()
            .ok_or_else(|| TypeAssistError::no_downloadable_asset(&release.tag))?;
        let url = asset
            .browser_download_url
            .as_deref()
            .ok_or_else(|| TypeAssistError::no_downloadable_asset(&release.tag))?;

        // Asset names come from the server; never let them escape `dir`.
        let file_name = Path::new(&asset.name)
            .file_name()
            .ok_or_else(|| TypeAssistError::no_downloadable_asset(&release.tag))?;
        let target = dir.join(file_name);
        let partial = dir.join(format!("{}.partial", file_name.to_string_lossy()));

        info!("Downloading {} to {}", url, target.display());
        let response = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?;

        let total = response.content_length();
        fs::create_dir_all(dir).await?;
        progress(0, total);

        if let Err(e) = Self::stream_to(response, &partial, total, &mut progress).await {
            warn!("Download failed, removing {}: {}", partial.display(), e);
            let _ = fs::remove_file(&partial).await;
            return Err(e);
        }
        fs::rename(&partial, &target).await?;

        info!("Download complete: {}", target.display());
        Ok(target)
    }

    async fn stream_to<F>(
        response: reqwest::Response,
        path: &Path,
        total: Option<u64>,
        progress: &mut F,
    ) -> Result<()>
    where
        F: FnMut(u64, Option<u64>),
    {
        let mut file = fs::File::create(path).await?;
        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            progress(downloaded, total);
        }
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(name: &str) -> ReleaseAsset {
        ReleaseAsset {
            name: name.to_string(),
            browser_download_url: Some(format!("https://example.invalid/{name}")),
            size: 0,
        }
    }

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("v1.2.3"), "1.2.3");
        assert_eq!(normalize_tag("V2.0"), "2.0");
        assert_eq!(normalize_tag("1.0.0"), "1.0.0");
    }

    #[test]
    fn test_is_newer_numeric() {
        assert!(is_newer("v1.0.1", "1.0.0"));
        assert!(is_newer("1.10.0", "1.9.9"));
        assert!(is_newer("2", "1.9"));
        assert!(!is_newer("1.0.0", "1.0.0"));
        assert!(!is_newer("v1.0", "1.0.0"));
        assert!(!is_newer("0.9.0", "1.0.0"));
    }

    #[test]
    fn test_is_newer_non_numeric_falls_back_to_difference() {
        assert!(is_newer("nightly-2024", "1.0.0"));
        assert!(!is_newer("", "1.0.0"));
    }

    #[test]
    fn test_select_asset_preference() {
        let assets = vec![asset("notes.txt"), asset("app.ZIP"), asset("setup.exe")];
        assert_eq!(select_asset(&assets).unwrap().name, "setup.exe");

        let assets = vec![asset("notes.txt"), asset("app.msi"), asset("app.zip")];
        assert_eq!(select_asset(&assets).unwrap().name, "app.zip");

        let assets = vec![asset("notes.txt"), asset("source.tar.gz")];
        assert_eq!(select_asset(&assets).unwrap().name, "notes.txt");

        assert!(select_asset(&[]).is_none());
    }

    #[test]
    fn test_launch_target() {
        let dir = Path::new("downloads");
        assert_eq!(launch_target(&dir.join("setup.exe")), dir.join("setup.exe"));
        assert_eq!(launch_target(&dir.join("TypeAssist.MSI")), dir.join("TypeAssist.MSI"));
        assert_eq!(launch_target(&dir.join("TypeAssist.zip")), dir);
        assert_eq!(launch_target(Path::new("notes.txt")), PathBuf::from("."));
    }

    #[test]
    fn test_api_base_override() {
        let updater = Updater::new("owner/name")
            .unwrap()
            .with_api_base("http://127.0.0.1:9/");
        assert_eq!(
            updater.latest_url(),
            "http://127.0.0.1:9/repos/owner/name/releases/latest"
        );
    }

    #[test]
    fn test_release_json_parsing() {
        let json = r#"{
            "tag_name": "v1.1.0",
            "body": "Fixes",
            "html_url": "https://github.com/roheal/AutoType/releases/tag/v1.1.0",
            "assets": [{"name": "TypeAssist.exe", "browser_download_url": "https://example.invalid/a", "size": 10}]
        }"#;
        let release: GithubRelease = serde_json::from_str(json).unwrap();
        assert_eq!(release.tag_name.as_deref(), Some("v1.1.0"));
        assert_eq!(release.assets.len(), 1);
        assert_eq!(release.assets[0].size, 10);
    }
}

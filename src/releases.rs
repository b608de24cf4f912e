use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

const UPSTREAM: &str = "CleverRaven/Cataclysm-DDA";

/// Stable fetches within this window are served from the cache so a busy
/// release browser cannot burn through the upstream API quota.
pub const STABLE_FETCH_MIN_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Stable,
    Experimental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
}

impl Platform {
    pub fn current() -> Self {
        #[cfg(target_os = "macos")]
        {
            Platform::MacOs
        }
        #[cfg(not(target_os = "macos"))]
        {
            Platform::Windows
        }
    }
}

/// Stable tags look like `0.H`, `0.F-3` or `0.G1`.
pub fn is_stable_tag(tag: &str) -> bool {
    let Some(rest) = tag.strip_prefix("0.") else {
        return false;
    };
    let bytes = rest.as_bytes();
    match bytes {
        [letter] => letter.is_ascii_uppercase(),
        [letter, suffix] => {
            letter.is_ascii_uppercase() && (*suffix == b'-' || suffix.is_ascii_digit())
        }
        [letter, b'-', digit] => letter.is_ascii_uppercase() && digit.is_ascii_digit(),
        _ => false,
    }
}

fn is_date_window(window: &[u8]) -> bool {
    window.len() == 15
        && window.iter().enumerate().all(|(i, &c)| match i {
            4 | 7 | 10 => c == b'-',
            _ => c.is_ascii_digit(),
        })
}

/// Extract the `YYYY-MM-DD-HHMM` stamp embedded in an experimental tag.
pub fn experimental_date(tag: &str) -> Option<&str> {
    let bytes = tag.as_bytes();
    if bytes.len() < 15 {
        return None;
    }
    (0..=bytes.len() - 15)
        .find(|&i| is_date_window(&bytes[i..i + 15]))
        .map(|i| &tag[i..i + 15])
}

pub fn classify_tag(tag: &str) -> Option<Channel> {
    if is_stable_tag(tag) {
        Some(Channel::Stable)
    } else if experimental_date(tag).is_some() {
        Some(Channel::Experimental)
    } else {
        None
    }
}

fn browser_url(tag: &str) -> String {
    format!("https://github.com/{}/releases/tag/{}", UPSTREAM, tag)
}

/// Experimental asset names are deterministic, so the download URL can be
/// inferred without touching the release API.
pub fn experimental_download_url(tag: &str, platform: Platform) -> Option<String> {
    let date = experimental_date(tag)?;
    let asset = match platform {
        Platform::Windows => format!("cdda-windows-tiles-sounds-x64-msvc-{}.zip", date),
        Platform::MacOs => format!("cdda-osx-tiles-universal-{}.dmg", date),
    };
    Some(format!(
        "https://github.com/{}/releases/download/{}/{}",
        UPSTREAM, tag, asset
    ))
}

/// Stable asset names are not deterministic; match against the known name
/// fragments each platform has used across releases.
pub fn platform_asset_matches(name: &str, platform: Platform) -> bool {
    match platform {
        Platform::Windows => {
            name.contains("windows-tiles-sounds-x64") || name.contains("Windows_x64")
        }
        Platform::MacOs => name.contains("osx-tiles") || name.contains("OSX-Tiles"),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseInfo {
    pub tag_name: String,
    pub browser_url: String,
    pub download_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

/// Host-side view of the upstream release listing.
pub trait ReleaseSource: Send {
    fn list_tags(&self) -> Result<Vec<String>, String>;

    /// Assets attached to one (stable) release.
    fn release_assets(&self, tag: &str) -> Result<Vec<ReleaseAsset>, String>;
}

/// Monotonic-enough time source, injectable for cache tests.
pub trait Clock: Send {
    fn now(&self) -> Duration;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }
}

/// Release browser state for one platform.
///
/// Stable listings hit the release API per tag, so they go through the
/// rate-limit cache; experimental listings are inferred locally and always
/// fetched fresh.
pub struct ReleaseFeed {
    source: Box<dyn ReleaseSource>,
    clock: Box<dyn Clock>,
    platform: Platform,
    stable_cache: Option<(Duration, Vec<ReleaseInfo>)>,
}

impl ReleaseFeed {
    pub fn new(source: Box<dyn ReleaseSource>, platform: Platform) -> Self {
        Self::with_clock(source, platform, Box::new(SystemClock))
    }

    pub fn with_clock(
        source: Box<dyn ReleaseSource>,
        platform: Platform,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            source,
            clock,
            platform,
            stable_cache: None,
        }
    }

    fn channel_tags(&self, channel: Channel, num: usize) -> Result<Vec<String>, String> {
        let mut tags: Vec<String> = self
            .source
            .list_tags()?
            .into_iter()
            .filter(|t| classify_tag(t) == Some(channel))
            .collect();
        tags.sort_unstable();
        tags.reverse();
        tags.truncate(num);
        Ok(tags)
    }

    /// Newest `num` stable releases, cached for [`STABLE_FETCH_MIN_INTERVAL`].
    pub fn stable_releases(&mut self, num: usize) -> Result<Vec<ReleaseInfo>, String> {
        let now = self.clock.now();
        if let Some((fetched_at, cached)) = &self.stable_cache {
            let fresh = now.saturating_sub(*fetched_at) < STABLE_FETCH_MIN_INTERVAL;
            if fresh && cached.len() >= num {
                log::debug!("serving stable releases from cache");
                return Ok(cached[..num.min(cached.len())].to_vec());
            }
        }

        let tags = self.channel_tags(Channel::Stable, num)?;
        let mut infos = Vec::with_capacity(tags.len());
        for tag in tags {
            let download_url = self
                .source
                .release_assets(&tag)?
                .into_iter()
                .find(|a| platform_asset_matches(&a.name, self.platform))
                .map(|a| a.browser_download_url)
                .unwrap_or_else(|| {
                    log::warn!("no matching asset for tag {}", tag);
                    String::new()
                });
            infos.push(ReleaseInfo {
                browser_url: browser_url(&tag),
                tag_name: tag,
                download_url,
            });
        }
        self.stable_cache = Some((now, infos.clone()));
        Ok(infos)
    }

    /// Newest `num` experimental releases. Never cached: the channel moves
    /// several times a day and the URLs cost no API calls.
    pub fn latest_releases(&mut self, num: usize) -> Result<Vec<ReleaseInfo>, String> {
        let tags = self.channel_tags(Channel::Experimental, num)?;
        Ok(tags
            .into_iter()
            .map(|tag| ReleaseInfo {
                browser_url: browser_url(&tag),
                download_url: experimental_download_url(&tag, self.platform)
                    .unwrap_or_default(),
                tag_name: tag,
            })
            .collect())
    }
}

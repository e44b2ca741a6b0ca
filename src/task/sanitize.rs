//! Turning raw task descriptors into sanitized tasks.
//!
//! `DefaultSanitizer` fills every missing field with a default, resolves the
//! browser binary and assigns the task its identity and working directory.

use log::{debug, info, warn};
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use uuid::Uuid;

use super::types::{
    BrowserSettings, CompletionCondition, CompletionSettings, DataSettings, Destination,
    RawBrowserSettings, RawCompletionSettings, RawDataSettings, RawOutputSettings, RawTask,
    SanitizedTask,
};
use crate::error::ValidationError;
use crate::utils::{
    DEFAULT_CHROMIUM_FLAGS, DEFAULT_MAX_ATTEMPTS, DEFAULT_TIME_AFTER_LOAD_SECS,
    DEFAULT_TIMEOUT_SECS, MAX_SITE_VISIT_SECS, is_valid_url, normalize_url,
};

/// Default directory for local results, relative to the current directory
pub const DEFAULT_LOCAL_OUTPUT_PATH: &str = "results";

/// Converts a raw task descriptor into a fully resolved task
pub trait Sanitizer: Send + Sync {
    /// # Errors
    ///
    /// Returns a `ValidationError` when the raw task cannot be resolved. Such
    /// tasks are dropped, never retried.
    fn sanitize(&self, raw: RawTask) -> Result<SanitizedTask, ValidationError>;
}

#[derive(Debug, Clone)]
pub struct DefaultSanitizer {
    temp_root: PathBuf,
    local_output: PathBuf,
    browser_binary: Option<PathBuf>,
}

impl DefaultSanitizer {
    #[must_use]
    pub fn new(temp_root: impl Into<PathBuf>) -> Self {
        Self {
            temp_root: temp_root.into(),
            local_output: PathBuf::from(DEFAULT_LOCAL_OUTPUT_PATH),
            browser_binary: None,
        }
    }

    /// Local results directory used when a task names no output settings
    #[must_use]
    pub fn local_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_output = path.into();
        self
    }

    /// Browser used when a task names none, skipping system discovery
    #[must_use]
    pub fn browser_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.browser_binary = Some(path.into());
        self
    }

    fn browser(&self, raw: Option<&RawBrowserSettings>) -> Result<BrowserSettings, ValidationError> {
        let requested = raw
            .and_then(|b| b.browser_binary.as_deref())
            .filter(|b| !b.is_empty());

        let binary = match requested {
            Some(name) => resolve_named_browser(name)?,
            None => match &self.browser_binary {
                Some(path) => path.clone(),
                None => find_browser_executable().ok_or(ValidationError::BrowserNotFound)?,
            },
        };

        Ok(BrowserSettings {
            binary,
            flags: merge_flags(raw),
            headless: raw.and_then(|b| b.headless).unwrap_or(false),
        })
    }

    fn destinations(
        &self,
        raw: Option<&RawOutputSettings>,
    ) -> Result<Vec<Destination>, ValidationError> {
        let Some(raw) = raw else {
            return Ok(vec![Destination::Local {
                path: self.local_output.clone(),
            }]);
        };

        let mut destinations = Vec::new();

        if let Some(local) = &raw.local_output_settings
            && local.enable.unwrap_or(true)
        {
            let path = local
                .path
                .as_deref()
                .map_or_else(|| self.local_output.clone(), expand_home);
            destinations.push(Destination::Local { path });
        }

        if let Some(remote) = &raw.remote_output_settings
            && remote.enable.unwrap_or(false)
        {
            match (&remote.host, &remote.path) {
                (Some(host), Some(path)) if !host.is_empty() && !path.is_empty() => {
                    destinations.push(Destination::Remote {
                        host: host.clone(),
                        path: path.clone(),
                    });
                }
                _ => return Err(ValidationError::IncompleteRemoteOutput),
            }
        }

        Ok(destinations)
    }
}

impl Sanitizer for DefaultSanitizer {
    fn sanitize(&self, raw: RawTask) -> Result<SanitizedTask, ValidationError> {
        let url = match raw.url.as_deref().map(str::trim) {
            Some(u) if !u.is_empty() => normalize_url(u),
            _ => return Err(ValidationError::MissingUrl),
        };
        if !is_valid_url(&url) {
            return Err(ValidationError::InvalidUrl(url));
        }

        let completion = completion_settings(raw.completion.as_ref())?;

        let max_attempts = raw.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS);
        if max_attempts == 0 {
            return Err(ValidationError::ZeroMaxAttempts);
        }

        let browser = self.browser(raw.browser.as_ref())?;
        let destinations = self.destinations(raw.output.as_ref())?;
        if destinations.is_empty() {
            return Err(ValidationError::NoDestination);
        }

        let id = Uuid::new_v4();
        let task = SanitizedTask {
            id,
            url,
            browser,
            completion,
            data: data_settings(raw.data.as_ref()),
            destinations,
            max_attempts,
            current_attempt: 1,
            task_failed: false,
            failure_code: String::new(),
            past_failure_codes: Vec::new(),
            working_dir: self.temp_root.join(id.to_string()),
        };

        debug!(
            "Sanitized task {} for {} (max attempts {})",
            task.id, task.url, task.max_attempts
        );
        Ok(task)
    }
}

fn completion_settings(
    raw: Option<&RawCompletionSettings>,
) -> Result<CompletionSettings, ValidationError> {
    let condition = raw
        .and_then(|c| c.completion_condition)
        .unwrap_or(CompletionCondition::TimeoutOnly);

    let timeout = raw
        .and_then(|c| c.timeout)
        .unwrap_or(DEFAULT_TIMEOUT_SECS as i64);
    if timeout <= 0 {
        return Err(ValidationError::ZeroTimeout);
    }

    let time_after_load = raw
        .and_then(|c| c.time_after_load)
        .unwrap_or(DEFAULT_TIME_AFTER_LOAD_SECS as i64);
    if time_after_load < 0 {
        return Err(ValidationError::NegativeTimeAfterLoad);
    }

    let (timeout, time_after_load) = (timeout.unsigned_abs(), time_after_load.unsigned_abs());
    for (field, value) in [("timeout", timeout), ("time after load", time_after_load)] {
        if value > MAX_SITE_VISIT_SECS {
            return Err(ValidationError::DurationTooLong {
                field,
                value,
                max: MAX_SITE_VISIT_SECS,
            });
        }
    }
    // The default post-load delay only matters in TimeAfterLoad mode.
    if condition == CompletionCondition::TimeAfterLoad && time_after_load > timeout {
        return Err(ValidationError::TimeAfterLoadExceedsTimeout {
            time_after_load,
            timeout,
        });
    }

    Ok(CompletionSettings {
        condition,
        timeout: Duration::from_secs(timeout),
        time_after_load: Duration::from_secs(time_after_load),
    })
}

fn data_settings(raw: Option<&RawDataSettings>) -> DataSettings {
    let defaults = DataSettings::default();
    let Some(raw) = raw else {
        return defaults;
    };
    DataSettings {
        resource_metadata: raw.resource_metadata.unwrap_or(defaults.resource_metadata),
        script_metadata: raw.script_metadata.unwrap_or(defaults.script_metadata),
        cookies: raw.cookies.unwrap_or(defaults.cookies),
        dom: raw.dom.unwrap_or(defaults.dom),
        screenshot: raw.screenshot.unwrap_or(defaults.screenshot),
    }
}

/// Default flags plus task additions minus task removals, unless the task
/// replaces the whole set.
fn merge_flags(raw: Option<&RawBrowserSettings>) -> Vec<String> {
    let defaults = || DEFAULT_CHROMIUM_FLAGS.iter().map(|f| (*f).to_string());
    let Some(raw) = raw else {
        return defaults().collect();
    };

    if let Some(set) = raw.set_browser_flags.as_ref().filter(|s| !s.is_empty()) {
        return set.clone();
    }

    let removed = raw.remove_browser_flags.as_deref().unwrap_or_default();
    defaults()
        .chain(raw.add_browser_flags.iter().flatten().cloned())
        .filter(|flag| !removed.contains(flag))
        .collect()
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map_or_else(|| PathBuf::from(path), |h| h.join(rest)),
        None => PathBuf::from(path),
    }
}

/// Resolve a browser named by the task: an existing path, or one of the
/// `chrome` / `chromium` shortcuts.
fn resolve_named_browser(name: &str) -> Result<PathBuf, ValidationError> {
    let path = expand_home(name);
    if path.exists() {
        return Ok(path);
    }

    let candidates: &[&str] = match name.to_lowercase().as_str() {
        "chrome" | "google-chrome" => &["google-chrome", "google-chrome-stable", "chrome"],
        "chromium" | "chromium-browser" => &["chromium", "chromium-browser"],
        _ => return Err(ValidationError::BrowserNotFound),
    };
    platform_paths()
        .into_iter()
        .find(|p| {
            let lower = p.to_string_lossy().to_lowercase();
            p.exists() && candidates.iter().any(|c| lower.contains(c))
        })
        .or_else(|| which(candidates))
        .ok_or(ValidationError::BrowserNotFound)
}

fn platform_paths() -> Vec<PathBuf> {
    let paths: &[&str] = if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\Chromium\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &[
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/opt/homebrew/bin/chromium",
        ]
    } else {
        &[
            "/usr/bin/chromium-browser",
            "/usr/bin/chromium",
            "/snap/bin/chromium",
            "/usr/local/bin/chromium",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/google-chrome",
            "/opt/google/chrome/chrome",
        ]
    };
    paths.iter().map(PathBuf::from).collect()
}

fn which(commands: &[&str]) -> Option<PathBuf> {
    if cfg!(target_os = "windows") {
        return None;
    }
    commands.iter().find_map(|cmd| {
        let output = Command::new("which").arg(cmd).output().ok()?;
        if !output.status.success() {
            return None;
        }
        let found = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!found.is_empty()).then(|| PathBuf::from(found))
    })
}

/// Find a Chrome/Chromium executable: `CHROMIUM_PATH`, well-known install
/// locations (Chromium preferred), then `which`.
#[must_use]
pub fn find_browser_executable() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            info!("Using browser from CHROMIUM_PATH: {}", path.display());
            return Some(path);
        }
        warn!(
            "CHROMIUM_PATH points to non-existent file: {}",
            path.display()
        );
    }

    if let Some(path) = platform_paths().into_iter().find(|p| p.exists()) {
        info!("Found browser at: {}", path.display());
        return Some(path);
    }

    let found = which(&["chromium", "chromium-browser", "google-chrome", "chrome"]);
    if let Some(path) = &found {
        info!("Found browser using 'which': {}", path.display());
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::types::{RawLocalOutput, RawRemoteOutput};

    fn sanitizer() -> (DefaultSanitizer, tempfile::NamedTempFile) {
        let fake_browser = tempfile::NamedTempFile::new().expect("temp file");
        let s = DefaultSanitizer::new("/tmp/mida-sanitize-test").browser_binary(fake_browser.path());
        (s, fake_browser)
    }

    #[test]
    fn fills_defaults() {
        let (s, browser) = sanitizer();
        let task = s.sanitize(RawTask::with_url("example.com")).expect("valid task");

        assert_eq!(task.url, "https://example.com");
        assert_eq!(task.completion.condition, CompletionCondition::TimeoutOnly);
        assert_eq!(task.completion.timeout, Duration::from_secs(10));
        assert_eq!(task.completion.time_after_load, Duration::from_secs(5));
        assert_eq!(task.max_attempts, 1);
        assert_eq!(task.current_attempt, 1);
        assert_eq!(task.browser.binary, browser.path());
        assert_eq!(task.browser.flags.len(), DEFAULT_CHROMIUM_FLAGS.len());
        assert_eq!(task.data, DataSettings::default());
        assert_eq!(
            task.destinations,
            vec![Destination::Local {
                path: PathBuf::from(DEFAULT_LOCAL_OUTPUT_PATH)
            }]
        );
        assert_eq!(
            task.working_dir,
            PathBuf::from("/tmp/mida-sanitize-test").join(task.id.to_string())
        );
    }

    #[test]
    fn each_task_gets_a_fresh_identity() {
        let (s, _browser) = sanitizer();
        let a = s.sanitize(RawTask::with_url("example.com")).expect("valid");
        let b = s.sanitize(RawTask::with_url("example.com")).expect("valid");
        assert_ne!(a.id, b.id);
        assert_ne!(a.working_dir, b.working_dir);
    }

    #[test]
    fn rejects_invalid_input() {
        let (s, _browser) = sanitizer();

        assert_eq!(s.sanitize(RawTask::default()), Err(ValidationError::MissingUrl));
        assert_eq!(
            s.sanitize(RawTask::with_url("   ")),
            Err(ValidationError::MissingUrl)
        );
        assert!(matches!(
            s.sanitize(RawTask::with_url("https://")),
            Err(ValidationError::InvalidUrl(_))
        ));

        let mut raw = RawTask::with_url("example.com");
        raw.completion = Some(RawCompletionSettings {
            timeout: Some(0),
            ..Default::default()
        });
        assert_eq!(s.sanitize(raw), Err(ValidationError::ZeroTimeout));

        let mut raw = RawTask::with_url("example.com");
        raw.completion = Some(RawCompletionSettings {
            completion_condition: Some(CompletionCondition::TimeAfterLoad),
            timeout: Some(5),
            time_after_load: Some(8),
        });
        assert_eq!(
            s.sanitize(raw),
            Err(ValidationError::TimeAfterLoadExceedsTimeout {
                time_after_load: 8,
                timeout: 5
            })
        );

        let mut raw = RawTask::with_url("example.com");
        raw.completion = Some(RawCompletionSettings {
            timeout: Some(i64::MAX),
            ..Default::default()
        });
        assert!(matches!(
            s.sanitize(raw),
            Err(ValidationError::DurationTooLong { field: "timeout", .. })
        ));

        let mut raw = RawTask::with_url("example.com");
        raw.completion = Some(RawCompletionSettings {
            time_after_load: Some(i64::MAX),
            ..Default::default()
        });
        assert!(matches!(
            s.sanitize(raw),
            Err(ValidationError::DurationTooLong { field: "time after load", .. })
        ));

        let mut raw = RawTask::with_url("example.com");
        raw.output = Some(RawOutputSettings {
            local_output_settings: Some(RawLocalOutput {
                enable: Some(false),
                path: None,
            }),
            remote_output_settings: None,
        });
        assert_eq!(s.sanitize(raw), Err(ValidationError::NoDestination));

        let mut raw = RawTask::with_url("example.com");
        raw.max_attempts = Some(0);
        assert_eq!(s.sanitize(raw), Err(ValidationError::ZeroMaxAttempts));

        let mut raw = RawTask::with_url("example.com");
        raw.browser = Some(RawBrowserSettings {
            browser_binary: Some("/definitely/not/a/browser".into()),
            ..Default::default()
        });
        assert_eq!(s.sanitize(raw), Err(ValidationError::BrowserNotFound));
    }

    #[test]
    fn merges_task_flags_with_defaults() {
        let (s, _browser) = sanitizer();
        let mut raw = RawTask::with_url("example.com");
        raw.browser = Some(RawBrowserSettings {
            add_browser_flags: Some(vec!["--mute-audio".into()]),
            remove_browser_flags: Some(vec!["--incognito".into()]),
            ..Default::default()
        });

        let flags = s.sanitize(raw).expect("valid").browser.flags;
        assert!(flags.contains(&"--mute-audio".to_string()));
        assert!(!flags.contains(&"--incognito".to_string()));
        assert!(flags.contains(&"--no-first-run".to_string()));

        let mut raw = RawTask::with_url("example.com");
        raw.browser = Some(RawBrowserSettings {
            set_browser_flags: Some(vec!["--headless".into()]),
            ..Default::default()
        });
        assert_eq!(s.sanitize(raw).expect("valid").browser.flags, vec!["--headless"]);
    }

    #[test]
    fn orders_destinations_local_first() {
        let (s, _browser) = sanitizer();
        let mut raw = RawTask::with_url("example.com");
        raw.output = Some(RawOutputSettings {
            local_output_settings: Some(RawLocalOutput {
                enable: Some(true),
                path: Some("/data/results".into()),
            }),
            remote_output_settings: Some(RawRemoteOutput {
                enable: Some(true),
                host: Some("storage.example.org".into()),
                path: Some("/srv/mida".into()),
            }),
        });

        let destinations = s.sanitize(raw).expect("valid").destinations;
        assert_eq!(
            destinations,
            vec![
                Destination::Local {
                    path: PathBuf::from("/data/results")
                },
                Destination::Remote {
                    host: "storage.example.org".into(),
                    path: "/srv/mida".into()
                },
            ]
        );

        let mut raw = RawTask::with_url("example.com");
        raw.output = Some(RawOutputSettings {
            local_output_settings: None,
            remote_output_settings: Some(RawRemoteOutput {
                enable: Some(true),
                host: None,
                path: Some("/srv/mida".into()),
            }),
        });
        assert_eq!(s.sanitize(raw), Err(ValidationError::IncompleteRemoteOutput));
    }
}

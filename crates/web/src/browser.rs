//! Browser launcher
//!
//! Opening the console is a capability behind [`BrowserLauncher`]. The
//! default implementation, [`SystemBrowser`], picks a per-platform candidate
//! table once at construction and spawns the first browser it finds.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::info;

use kvmrelay_common::{BrowserPreference, Error, Result};

/// Something that can point a browser at a URL
pub trait BrowserLauncher: Send + Sync {
    fn launch(&self, url: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Other
        }
    }
}

/// Program and arguments chosen for a launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub program: PathBuf,
    pub args: Vec<String>,
}

struct Candidates {
    firefox: &'static [&'static str],
    chrome: &'static [&'static str],
    opener: &'static str,
    opener_args: &'static [&'static str],
}

const WINDOWS: Candidates = Candidates {
    firefox: &[
        "C:\\Program Files\\Mozilla Firefox\\firefox.exe",
        "C:\\Program Files (x86)\\Mozilla Firefox\\firefox.exe",
    ],
    chrome: &[
        "C:\\Program Files\\Google\\Chrome\\Application\\chrome.exe",
        "C:\\Program Files (x86)\\Google\\Chrome\\Application\\chrome.exe",
    ],
    opener: "rundll32",
    opener_args: &["url.dll,FileProtocolHandler"],
};

const MACOS: Candidates = Candidates {
    firefox: &["/Applications/Firefox.app/Contents/MacOS/firefox"],
    chrome: &["/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"],
    opener: "open",
    opener_args: &[],
};

// Bare names are looked up on PATH after the fixed install locations.
const LINUX: Candidates = Candidates {
    firefox: &[
        "/usr/bin/firefox",
        "/usr/local/bin/firefox",
        "/snap/bin/firefox",
        "firefox",
    ],
    chrome: &[
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "google-chrome",
        "chromium",
    ],
    opener: "xdg-open",
    opener_args: &[],
};

fn candidates(platform: Platform) -> Option<&'static Candidates> {
    match platform {
        Platform::Windows => Some(&WINDOWS),
        Platform::MacOs => Some(&MACOS),
        Platform::Linux => Some(&LINUX),
        Platform::Other => None,
    }
}

/// Chrome is started with a throwaway profile and with certificate errors
/// ignored, since the relay itself serves a self-signed certificate.
fn chrome_args(url: &str) -> Vec<String> {
    let profile = std::env::temp_dir().join("chrome-temp-profile");
    vec![
        "--ignore-certificate-errors".to_string(),
        "--test-type".to_string(),
        "--allow-insecure-localhost".to_string(),
        "--disable-popup-blocking".to_string(),
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-session-crashed-bubble".to_string(),
        "--disable-infobars".to_string(),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        format!("--user-data-dir={}", profile.display()),
        url.to_string(),
    ]
}

/// Choose what to run for `url`.
///
/// `locate` maps a candidate (absolute path or bare program name) to an
/// executable path if it is installed.
pub fn plan_for(
    platform: Platform,
    preference: BrowserPreference,
    url: &str,
    locate: &dyn Fn(&str) -> Option<PathBuf>,
) -> Result<LaunchPlan> {
    let table = candidates(platform)
        .ok_or_else(|| Error::UnsupportedPlatform(std::env::consts::OS.to_string()))?;

    if preference == BrowserPreference::Firefox {
        if let Some(program) = table.firefox.iter().find_map(|c| locate(c)) {
            return Ok(LaunchPlan {
                program,
                args: vec![url.to_string()],
            });
        }
    }

    if preference != BrowserPreference::System {
        if let Some(program) = table.chrome.iter().find_map(|c| locate(c)) {
            return Ok(LaunchPlan {
                program,
                args: chrome_args(url),
            });
        }
    }

    let mut args: Vec<String> = table.opener_args.iter().map(|a| a.to_string()).collect();
    args.push(url.to_string());
    Ok(LaunchPlan {
        program: PathBuf::from(table.opener),
        args,
    })
}

/// Resolve a candidate against the local filesystem and PATH.
pub fn locate_installed(candidate: &str) -> Option<PathBuf> {
    let path = Path::new(candidate);
    if path.is_absolute() {
        path.exists().then(|| path.to_path_buf())
    } else {
        which::which(candidate).ok()
    }
}

/// Launches browsers installed on this machine
#[derive(Debug, Clone)]
pub struct SystemBrowser {
    platform: Platform,
    preference: BrowserPreference,
}

impl SystemBrowser {
    pub fn new(preference: BrowserPreference) -> Self {
        Self {
            platform: Platform::current(),
            preference,
        }
    }

    pub fn plan(&self, url: &str) -> Result<LaunchPlan> {
        plan_for(self.platform, self.preference, url, &locate_installed)
    }
}

impl BrowserLauncher for SystemBrowser {
    fn launch(&self, url: &str) -> Result<()> {
        let plan = self.plan(url)?;
        info!("Opening {} with {}", url, plan.program.display());

        Command::new(&plan.program)
            .args(&plan.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Browser(format!("{}: {}", plan.program.display(), e)))?;

        Ok(())
    }
}

//! Locating the external download engines on `PATH`.

use std::path::{Path, PathBuf};

use tilefetch_core::TransferError;
use tracing::debug;

/// `HuggingFace` fetcher names, in lookup order.
pub const HF_CLI_CANDIDATES: &[&str] = &["hf", "huggingface-cli"];

/// Vendor download CLI name.
pub const OM_CLI_NAME: &str = "om";

const OM_RELEASES_URL: &str = "https://github.com/pivotal-cf/om/releases";

/// Host operating system, as far as install hints are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    MacOS,
    Windows,
    Linux,
}

/// Detect the current operating system.
#[must_use]
pub const fn detect_host_os() -> HostOs {
    if cfg!(target_os = "macos") {
        HostOs::MacOS
    } else if cfg!(target_os = "windows") {
        HostOs::Windows
    } else {
        HostOs::Linux
    }
}

/// How to install the `HuggingFace` fetcher on `os`.
#[must_use]
pub const fn hf_install_hint(os: HostOs) -> &'static str {
    match os {
        HostOs::MacOS => "HuggingFace CLI not found. Please install: brew install huggingface-cli",
        HostOs::Windows | HostOs::Linux => {
            "huggingface-cli not found. Please install: pip install \"huggingface_hub[cli]\""
        }
    }
}

/// Find the `HuggingFace` fetcher, preferring `hf` over `huggingface-cli`.
pub fn locate_hf_cli() -> Result<PathBuf, TransferError> {
    for candidate in HF_CLI_CANDIDATES {
        if let Ok(path) = which::which(candidate) {
            debug!(path = %path.display(), "Found HuggingFace CLI");
            return Ok(path);
        }
    }

    Err(TransferError::launch(
        HF_CLI_CANDIDATES.join(" / "),
        hf_install_hint(detect_host_os()),
    ))
}

/// Find the vendor CLI. A configured path must exist; otherwise `om` is
/// looked up on `PATH`.
pub fn locate_om_cli(configured: Option<&Path>) -> Result<PathBuf, TransferError> {
    if let Some(path) = configured {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(TransferError::launch(
            path.display().to_string(),
            format!("configured om path does not exist. Download om from {OM_RELEASES_URL}"),
        ));
    }

    which::which(OM_CLI_NAME).map_err(|_| {
        TransferError::launch(
            OM_CLI_NAME,
            format!("om CLI not found on PATH. Download it from {OM_RELEASES_URL}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hint_is_platform_specific() {
        assert!(hf_install_hint(HostOs::MacOS).contains("brew install"));
        assert!(hf_install_hint(HostOs::Linux).contains("pip install"));
        assert!(hf_install_hint(HostOs::Windows).contains("pip install"));
    }

    #[test]
    fn hf_is_preferred_over_legacy_name() {
        assert_eq!(HF_CLI_CANDIDATES.first(), Some(&"hf"));
    }

    #[test]
    fn missing_configured_om_path_names_release_page() {
        let err = locate_om_cli(Some(Path::new("/nonexistent/tilefetch/om"))).unwrap_err();
        match err {
            TransferError::Launch { program, message } => {
                assert_eq!(program, "/nonexistent/tilefetch/om");
                assert!(message.contains(OM_RELEASES_URL));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn configured_om_path_is_used_verbatim() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        let found = locate_om_cli(Some(temp.path())).unwrap();
        assert_eq!(found, temp.path());
    }
}

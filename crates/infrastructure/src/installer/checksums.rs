//! Pinned digests of installer artifacts

use std::collections::HashMap;

use application::ApplicationError;
use domain::Platform;
use tracing::warn;

pub const MACOS_ARTIFACT: &str = "Ollama-darwin.zip";
pub const WINDOWS_ARTIFACT: &str = "OllamaSetup.exe";

/// Installer artifact downloaded for `platform`, if it has one
pub const fn installer_artifact(platform: Platform) -> Option<&'static str> {
    match platform {
        Platform::MacOs => Some(MACOS_ARTIFACT),
        Platform::Windows => Some(WINDOWS_ARTIFACT),
        Platform::Linux => None,
    }
}

/// Expected SHA-256 per `<platform>/<artifact>`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumTable {
    digests: HashMap<String, String>,
}

impl ChecksumTable {
    /// Build from the config map of platform name to digest
    pub fn from_config(pinned: &HashMap<String, String>) -> Self {
        let mut table = Self::default();
        for (platform, digest) in pinned {
            match platform.parse::<Platform>() {
                Ok(platform) => match installer_artifact(platform) {
                    Some(artifact) => table.insert(platform, artifact, digest),
                    None => warn!(%platform, "Platform has no installer artifact, ignoring checksum"),
                },
                Err(e) => warn!(key = %platform, error = %e, "Ignoring checksum for unknown platform"),
            }
        }
        table
    }

    pub fn insert(&mut self, platform: Platform, artifact: &str, sha256: &str) {
        self.digests
            .insert(key(platform, artifact), sha256.trim().to_lowercase());
    }

    pub fn get(&self, platform: Platform, artifact: &str) -> Option<&str> {
        self.digests.get(&key(platform, artifact)).map(String::as_str)
    }

    /// Digest for the artifact; an unpinned artifact is refused
    pub fn require(&self, platform: Platform, artifact: &str) -> Result<&str, ApplicationError> {
        self.get(platform, artifact).ok_or_else(|| {
            ApplicationError::Download(format!(
                "no pinned checksum for {}, refusing to trust the download",
                key(platform, artifact)
            ))
        })
    }
}

fn key(platform: Platform, artifact: &str) -> String {
    format!("{platform}/{artifact}")
}

/// Digest listed for `artifact` in a `sha256sum`-style manifest
pub fn manifest_digest(manifest: &str, artifact: &str) -> Option<String> {
    manifest.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let digest = fields.next()?;
        let file = fields.next_back()?;
        let name = file.trim_start_matches('*').rsplit('/').next()?;

        (name == artifact && digest.len() == 64 && digest.chars().all(|c| c.is_ascii_hexdigit()))
            .then(|| digest.to_lowercase())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_from_platform_keys() {
        let pinned = HashMap::from([
            ("macos".to_string(), "ABC".to_string()),
            ("windows".to_string(), "def".to_string()),
            ("linux".to_string(), "ignored".to_string()),
            ("amiga".to_string(), "ignored".to_string()),
        ]);
        let table = ChecksumTable::from_config(&pinned);

        assert_eq!(table.get(Platform::MacOs, "Ollama-darwin.zip"), Some("abc"));
        assert_eq!(table.get(Platform::Windows, "OllamaSetup.exe"), Some("def"));
        assert_eq!(table.digests.len(), 2);
    }

    #[test]
    fn reads_release_manifest() {
        let zip = "A".repeat(64);
        let exe = "b".repeat(64);
        let manifest = format!(
            "{zip}  ./Ollama-darwin.zip\n{exe} *OllamaSetup.exe\nnot-a-digest  ./ollama-linux-amd64.tgz\n"
        );

        assert_eq!(manifest_digest(&manifest, MACOS_ARTIFACT), Some("a".repeat(64)));
        assert_eq!(manifest_digest(&manifest, WINDOWS_ARTIFACT), Some(exe));
        assert_eq!(manifest_digest(&manifest, "ollama-linux-amd64.tgz"), None);
        assert_eq!(manifest_digest(&manifest, "Ollama.dmg"), None);
        assert_eq!(manifest_digest("", MACOS_ARTIFACT), None);
    }

    #[test]
    fn unpinned_artifact_is_refused() {
        let table = ChecksumTable::default();
        let err = table.require(Platform::MacOs, "Ollama-darwin.zip").unwrap_err();
        assert!(err.to_string().contains("macos/Ollama-darwin.zip"));
    }
}

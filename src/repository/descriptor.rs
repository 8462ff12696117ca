use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use base64::Engine;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::models::descriptor::LENIENT_BASE64;
use crate::models::{Descriptor, Protocol};

/// Repository for a one-descriptor-per-line list file
#[derive(Debug, Clone)]
pub struct DescriptorRepository {
    path: PathBuf,
}

impl DescriptorRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load unique descriptors in first-seen order.
    ///
    /// A missing file yields an empty list.
    pub async fn load(&self) -> Result<Vec<Descriptor>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Descriptor source {} does not exist", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let descriptors = decode_payload(&content);
        info!(
            "Loaded {} unique descriptors from {}",
            descriptors.len(),
            self.path.display()
        );
        Ok(descriptors)
    }

    /// Replace the file with `descriptors`, one per line.
    ///
    /// Writes a sibling temporary file and renames it into place, so readers
    /// see either the previous list or the complete new one.
    pub async fn save(&self, descriptors: &[Descriptor]) -> Result<()> {
        let mut body = String::with_capacity(descriptors.iter().map(|d| d.as_str().len() + 1).sum());
        for descriptor in descriptors {
            body.push_str(descriptor.as_str());
            body.push('\n');
        }

        let tmp = self.temp_path();
        if let Err(e) = fs::write(&tmp, body).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        info!(
            "Saved {} descriptors to {}",
            descriptors.len(),
            self.path.display()
        );
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "descriptors".to_string());
        self.path.with_file_name(format!(".{}.tmp", name))
    }
}

/// Extract unique, protocol-tagged descriptors from a subscription payload.
///
/// Payloads without any recognizable prefix are treated as base64 and
/// decoded first; if decoding fails the text is scanned as-is.
pub fn decode_payload(content: &str) -> Vec<Descriptor> {
    let content = content.trim();
    let has_prefix = Protocol::ALL.iter().any(|p| content.contains(p.prefix()));

    let decoded;
    let text = if has_prefix {
        content
    } else {
        let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
        match LENIENT_BASE64
            .decode(compact.as_bytes())
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
        {
            Some(text) => {
                debug!("Decoded base64 subscription payload");
                decoded = text;
                decoded.as_str()
            }
            None => content,
        }
    };

    let mut seen = HashSet::new();
    text.lines()
        .map(str::trim)
        .filter(|line| Protocol::detect(line).is_some())
        .filter(|line| seen.insert(*line))
        .map(Descriptor::from)
        .collect()
}

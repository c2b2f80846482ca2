//! Program Key Manifest
//!
//! Text file listing keys to precompile at startup, plus the offline
//! equivalence groups:
//!
//! ```text
//! version:5
//! vse:<master>,<key>,<key>
//! pse:<master>,<key>
//! <key>
//! <key>
//! ```
//!
//! A missing or mismatched version line rejects the whole manifest, so
//! stale groups degrade to no folding rather than wrong folding.

use log::warn;

use crate::key::ProgramKey;
use crate::source::ShaderStage;

const VERSION_TAG: &str = "version:";
const VERTEX_GROUP_TAG: &str = "vse:";
const PIXEL_GROUP_TAG: &str = "pse:";

/// Keys whose `stage` sources are identical. `keys[0]` is the master.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquivalenceGroup {
    pub stage: ShaderStage,
    pub keys: Vec<ProgramKey>,
}

impl EquivalenceGroup {
    /// First key of the group, or `None` for an empty group.
    #[inline]
    #[must_use]
    pub fn master(&self) -> Option<ProgramKey> {
        self.keys.first().copied()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub version: u32,
    pub groups: Vec<EquivalenceGroup>,
    /// Keys to precompile, in file order.
    pub keys: Vec<ProgramKey>,
}

impl Manifest {
    /// Parses a manifest, or returns `None` when the version line is
    /// missing or does not equal `expected_version`.
    #[must_use]
    pub fn parse(text: &str, expected_version: u32) -> Option<Self> {
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

        let Some(first) = lines.next() else {
            warn!("Shader manifest is empty, ignoring.");
            return None;
        };
        let Some(version) = first
            .strip_prefix(VERSION_TAG)
            .and_then(|v| v.trim().parse::<u32>().ok())
        else {
            warn!("Shader manifest has no version line, ignoring.");
            return None;
        };
        if version != expected_version {
            warn!("Shader manifest is an old version ({version}, expected {expected_version}), ignoring.");
            return None;
        }

        let mut manifest = Self {
            version,
            ..Self::default()
        };

        for line in lines {
            let group = if let Some(rest) = line.strip_prefix(VERTEX_GROUP_TAG) {
                Some((ShaderStage::Vertex, rest))
            } else {
                line.strip_prefix(PIXEL_GROUP_TAG)
                    .map(|rest| (ShaderStage::Pixel, rest))
            };

            match group {
                Some((stage, list)) => {
                    if let Some(group) = parse_group(stage, list) {
                        manifest.groups.push(group);
                    }
                }
                None => match line.parse::<ProgramKey>() {
                    Ok(key) => manifest.keys.push(key),
                    Err(e) => warn!("Skipping manifest line {line:?}: {e}"),
                },
            }
        }

        Some(manifest)
    }

    /// Groups for one stage, in file order.
    pub fn groups_for(&self, stage: ShaderStage) -> impl Iterator<Item = &EquivalenceGroup> {
        self.groups.iter().filter(move |g| g.stage == stage)
    }

    /// Serializes back to manifest text with CRLF line endings.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = format!("{VERSION_TAG}{}\r\n", self.version);
        for group in &self.groups {
            out.push_str(match group.stage {
                ShaderStage::Vertex => VERTEX_GROUP_TAG,
                ShaderStage::Pixel => PIXEL_GROUP_TAG,
            });
            let keys: Vec<String> = group.keys.iter().map(ToString::to_string).collect();
            out.push_str(&keys.join(","));
            out.push_str("\r\n");
        }
        for key in &self.keys {
            out.push_str(&key.to_string());
            out.push_str("\r\n");
        }
        out
    }
}

fn parse_group(stage: ShaderStage, list: &str) -> Option<EquivalenceGroup> {
    let mut keys = Vec::new();
    for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match item.parse::<ProgramKey>() {
            Ok(key) => keys.push(key),
            Err(e) => {
                warn!("Skipping malformed {stage:?} equivalence group: {e}");
                return None;
            }
        }
    }
    if keys.len() < 2 {
        warn!("Skipping {stage:?} equivalence group with {} key(s)", keys.len());
        return None;
    }
    Some(EquivalenceGroup { stage, keys })
}

use crate::config::PatchConfiguration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// One configuration dimension whose change invalidates every cached rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    PatcherList,
    FunctionWhitelist,
    IncludePaths,
    ExcludePaths,
}

impl Axis {
    pub const ALL: [Axis; 4] = [
        Axis::PatcherList,
        Axis::FunctionWhitelist,
        Axis::IncludePaths,
        Axis::ExcludePaths,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Axis::PatcherList => "patcher_list",
            Axis::FunctionWhitelist => "function_whitelist",
            Axis::IncludePaths => "include_paths",
            Axis::ExcludePaths => "exclude_paths",
        }
    }

    /// Record file name under `<cache>/conf/`.
    pub fn file_name(self) -> String {
        format!("{}.json", self.as_str())
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current value of every axis, as stored in the axis records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisSnapshot {
    pub patcher_list: Vec<String>,
    pub function_whitelist: Vec<String>,
    pub include_paths: Vec<String>,
    pub exclude_paths: Vec<String>,
}

impl AxisSnapshot {
    pub fn from_configuration(config: &PatchConfiguration) -> Self {
        Self {
            patcher_list: config.patcher_list().to_vec(),
            // NameSet iterates in sorted order, so the record is stable.
            function_whitelist: config.whitelist().to_vec(),
            include_paths: display_paths(config.include_paths()),
            exclude_paths: display_paths(config.exclude_paths()),
        }
    }

    pub fn values(&self, axis: Axis) -> &[String] {
        match axis {
            Axis::PatcherList => &self.patcher_list,
            Axis::FunctionWhitelist => &self.function_whitelist,
            Axis::IncludePaths => &self.include_paths,
            Axis::ExcludePaths => &self.exclude_paths,
        }
    }

    /// Combined fingerprint of all axes.
    pub fn generation(&self) -> u64 {
        let mut buf = Vec::new();
        for axis in Axis::ALL {
            buf.extend_from_slice(axis.as_str().as_bytes());
            buf.push(0);
            for value in self.values(axis) {
                buf.extend_from_slice(value.as_bytes());
                buf.push(0);
            }
            buf.push(0xff);
        }
        xxhash_rust::xxh3::xxh3_64(&buf)
    }
}

fn display_paths(paths: &[impl AsRef<Path>]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.as_ref().to_string_lossy().into_owned())
        .collect()
}

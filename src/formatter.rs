// src/formatter.rs

//! Frozen requirements output
//!
//! Formatting is pure: it renders resolved groups into text and never decides
//! anything about conflicts. [`OutputPlan`] renders every requested file in
//! memory before writing any of them.

use crate::error::Result;
use crate::manifest::Exclusions;
use crate::packages::identity;
use crate::resolver::{ManifestResult, VersionGroup};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const GENERATED_HEADER: &str = "# This file has been automatically generated, DO NOT EDIT!";

/// Default suffix of separate frozen requirements files
pub const DEFAULT_SEPARATE_SUFFIX: &str = "-frozen";

/// Default suffix of loose requirements files
pub const DEFAULT_LOOSE_SUFFIX: &str = "-loose";

/// Settings shared by every output file
#[derive(Debug, Clone, Default)]
pub struct FormatOptions {
    pub exclusions: Exclusions,
    pub index_url: Option<String>,
    pub find_links: Vec<String>,
    /// Requirement lines written verbatim after each manifest's pins
    pub external_lines: BTreeMap<String, Vec<String>>,
}

/// Write frozen requirements for `manifests` to `out`
///
/// Each distribution is written once, under the first manifest that
/// mentions it, pinned to its highest version. Names in `loose` are written
/// without a version.
pub fn format_requirements<W: Write>(
    out: &mut W,
    manifests: &[ManifestResult],
    groups: &BTreeMap<String, VersionGroup>,
    options: &FormatOptions,
    loose: Option<&BTreeSet<String>>,
) -> Result<()> {
    let is_loose = |name: &str| loose.is_some_and(|names| names.contains(name));

    writeln!(out, "{}", GENERATED_HEADER)?;
    writeln!(out)?;
    if let Some(url) = &options.index_url {
        writeln!(out, "--index-url {}", url)?;
        writeln!(out)?;
    }
    for url in &options.find_links {
        writeln!(out, "--find-links {}", url)?;
        writeln!(out)?;
    }

    let mut seen = BTreeSet::new();
    for manifest in manifests {
        writeln!(out, "# Frozen requirements for \"{}\"", manifest.manifest_id)?;
        writeln!(out)?;

        let mut names = BTreeSet::new();
        for package in &manifest.packages {
            names.insert(identity::resolve(package)?.name);
        }

        for name in names {
            if seen.contains(&name)
                || options.exclusions.is_excluded_from(&manifest.manifest_id, &name)
            {
                continue;
            }
            let Some(highest) = groups.get(&name).and_then(|g| g.highest()) else {
                continue;
            };

            if let Some(note) = groups.get(&name).and_then(picked_note) {
                writeln!(out, "{}", note)?;
            }
            if is_loose(&name) {
                writeln!(out, "{}", name)?;
            } else {
                writeln!(out, "{}=={}", name, highest.version)?;
            }
            seen.insert(name);
        }

        if let Some(lines) = options.external_lines.get(&manifest.manifest_id) {
            for line in lines {
                match crate::manifest::requirement_name(line) {
                    Some(name) if is_loose(&name) => writeln!(out, "{}", name)?,
                    _ => writeln!(out, "{}", line.trim())?,
                }
            }
        }
        writeln!(out)?;
    }

    Ok(())
}

/// Comment naming the lower versions a pin was picked over
fn picked_note(group: &VersionGroup) -> Option<String> {
    let (highest, lower) = group.versions.split_last()?;
    if lower.is_empty() {
        return None;
    }
    let others: Vec<String> = lower
        .iter()
        .map(|entry| format!("{} ({})", entry.version, entry.sources.join(", ")))
        .collect();
    Some(format!(
        "# {}: picked {} over {}",
        group.name,
        highest.version,
        others.join(", ")
    ))
}

/// Render frozen requirements into a string
pub fn render(
    manifests: &[ManifestResult],
    groups: &BTreeMap<String, VersionGroup>,
    options: &FormatOptions,
    loose: Option<&BTreeSet<String>>,
) -> Result<String> {
    let mut buffer = Vec::new();
    format_requirements(&mut buffer, manifests, groups, options, loose)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Insert `suffix` before the extension: `reqs/base.txt` -> `reqs/base-frozen.txt`
pub fn suffixed_path(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}{}", stem, suffix),
    };
    path.with_file_name(name)
}

/// Where the merged output goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

impl OutputTarget {
    /// `-` means standard output
    pub fn parse(value: &str) -> Self {
        if value == "-" {
            Self::Stdout
        } else {
            Self::File(PathBuf::from(value))
        }
    }
}

/// Output files requested by the user
#[derive(Debug, Clone, Default)]
pub struct OutputPlan {
    pub merged: Option<OutputTarget>,
    pub separate_suffix: Option<String>,
    /// Suffix and names of loose outputs
    pub loose: Option<(String, BTreeSet<String>)>,
}

impl OutputPlan {
    /// Whether more than one independent output is requested
    pub fn has_separate_outputs(&self) -> bool {
        self.separate_suffix.is_some()
    }

    /// Render every requested output
    pub fn render_all(
        &self,
        manifests: &[ManifestResult],
        groups: &BTreeMap<String, VersionGroup>,
        options: &FormatOptions,
    ) -> Result<Vec<(OutputTarget, String)>> {
        let mut rendered = Vec::new();

        if let Some(target) = &self.merged {
            rendered.push((target.clone(), render(manifests, groups, options, None)?));
        }

        if let Some(suffix) = &self.separate_suffix {
            for manifest in manifests {
                let path = suffixed_path(Path::new(&manifest.manifest_id), suffix);
                let text = render(std::slice::from_ref(manifest), groups, options, None)?;
                rendered.push((OutputTarget::File(path), text));
            }
        }

        if let Some((suffix, names)) = &self.loose
            && !names.is_empty()
        {
            for manifest in manifests {
                let path = suffixed_path(Path::new(&manifest.manifest_id), suffix);
                let text = render(std::slice::from_ref(manifest), groups, options, Some(names))?;
                rendered.push((OutputTarget::File(path), text));
            }
        }

        Ok(rendered)
    }

    /// Render then write every requested output
    pub fn write_all(
        &self,
        manifests: &[ManifestResult],
        groups: &BTreeMap<String, VersionGroup>,
        options: &FormatOptions,
    ) -> Result<()> {
        for (target, text) in self.render_all(manifests, groups, options)? {
            match target {
                OutputTarget::Stdout => {
                    let mut stdout = io::stdout().lock();
                    stdout.write_all(text.as_bytes())?;
                    stdout.flush()?;
                }
                OutputTarget::File(path) => {
                    fs::write(&path, text)?;
                    info!("Wrote frozen requirements in {}", path.display());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::aggregate;

    fn sample() -> Vec<ManifestResult> {
        vec![
            ManifestResult::new(
                "r1.txt",
                vec!["foo-1.3.tar.gz".to_string(), "bar-0.1.tar.gz".to_string()],
            ),
            ManifestResult::new(
                "r2.txt",
                vec!["foo-1.4.tar.gz".to_string(), "bar-0.1.tar.gz".to_string()],
            ),
        ]
    }

    #[test]
    fn test_merged_output() {
        let manifests = sample();
        let groups = aggregate(&manifests).unwrap();
        let text = render(&manifests, &groups, &FormatOptions::default(), None).unwrap();

        assert_eq!(
            text,
            "# This file has been automatically generated, DO NOT EDIT!\n\
             \n\
             # Frozen requirements for \"r1.txt\"\n\
             \n\
             bar==0.1\n\
             # foo: picked 1.4 over 1.3 (r1.txt)\n\
             foo==1.4\n\
             \n\
             # Frozen requirements for \"r2.txt\"\n\
             \n\
             \n"
        );
    }

    #[test]
    fn test_formatting_is_idempotent() {
        let manifests = sample();
        let groups = aggregate(&manifests).unwrap();
        let options = FormatOptions {
            index_url: Some("https://pypi.example.com/simple".to_string()),
            find_links: vec!["https://wheels.example.com".to_string()],
            ..Default::default()
        };

        let first = render(&manifests, &groups, &options, None).unwrap();
        let second = render(&manifests, &groups, &options, None).unwrap();
        assert_eq!(first, second);
        assert!(first.contains("--index-url https://pypi.example.com/simple\n\n"));
        assert!(first.contains("--find-links https://wheels.example.com\n\n"));
    }

    #[test]
    fn test_exclusions_and_loose_names() {
        let manifests = vec![ManifestResult::new(
            "r1.txt",
            vec![
                "foo-1.3.tar.gz".to_string(),
                "bar-0.1.tar.gz".to_string(),
                "baz-2.0.tar.gz".to_string(),
            ],
        )];
        let groups = aggregate(&manifests).unwrap();

        let mut options = FormatOptions::default();
        options.exclusions.extend(["r1.txt:baz"]);
        options
            .external_lines
            .insert("r1.txt".to_string(), vec!["extwheel==1.0".to_string()]);
        let loose: BTreeSet<String> = ["foo".to_string(), "extwheel".to_string()].into();

        let text = render(&manifests, &groups, &options, Some(&loose)).unwrap();
        let body: Vec<&str> = text.lines().skip(4).collect();
        assert_eq!(body, vec!["bar==0.1", "foo", "extwheel", ""]);
    }

    #[test]
    fn test_suffixed_path() {
        assert_eq!(
            suffixed_path(Path::new("reqs/base.txt"), "-frozen"),
            PathBuf::from("reqs/base-frozen.txt")
        );
        assert_eq!(
            suffixed_path(Path::new("requirements"), "-loose"),
            PathBuf::from("requirements-loose")
        );
    }

    #[test]
    fn test_output_plan_render_all() {
        let manifests = sample();
        let groups = aggregate(&manifests).unwrap();
        let plan = OutputPlan {
            merged: Some(OutputTarget::parse("-")),
            separate_suffix: Some("-frozen".to_string()),
            loose: Some(("-loose".to_string(), BTreeSet::new())),
        };
        assert!(plan.has_separate_outputs());

        let rendered = plan
            .render_all(&manifests, &groups, &FormatOptions::default())
            .unwrap();
        let targets: Vec<&OutputTarget> = rendered.iter().map(|(t, _)| t).collect();
        assert_eq!(
            targets,
            vec![
                &OutputTarget::Stdout,
                &OutputTarget::File(PathBuf::from("r1-frozen.txt")),
                &OutputTarget::File(PathBuf::from("r2-frozen.txt")),
            ]
        );
        assert!(rendered[2].1.contains("bar==0.1\n"));
    }
}

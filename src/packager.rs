// src/packager.rs
//
// HWPX is a zip package. These wrappers stage a working copy of the
// template package, then bundle the staged directory into the final .hwpx.
// Failures here are fatal and must not leave a partial file at the final
// destination, so the archive is built at a temporary path and renamed into
// place.
use anyhow::{bail, Context};
use log::{debug, info};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Relative path of the section document inside an HWPX package.
pub const SECTION_PATH: &str = "Contents/section0.xml";

/// Copy the template package into a fresh uniquely-named directory under
/// `staging_root`. The destination must not already exist.
pub fn stage_package<P: AsRef<Path>, Q: AsRef<Path>>(
    template_dir: P,
    staging_root: Q,
) -> anyhow::Result<PathBuf> {
    let template_dir = template_dir.as_ref();
    if !template_dir.is_dir() {
        bail!("template package {} is not a directory", template_dir.display());
    }

    let dest = staging_root
        .as_ref()
        .join(format!("hwpx-stage-{}", Uuid::new_v4()));
    if dest.exists() {
        bail!("staging destination {} already exists", dest.display());
    }

    copy_dir_recursive(template_dir, &dest)
        .with_context(|| format!("failed to stage package into {}", dest.display()))?;
    info!("staged template package at {}", dest.display());
    Ok(dest)
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        if from.is_dir() {
            copy_dir_recursive(&from, &to)?;
        } else {
            std::fs::copy(&from, &to)
                .with_context(|| format!("failed to copy {}", from.display()))?;
        }
    }
    Ok(())
}

/// Zip the staged package directory into `output`. The `mimetype` entry is
/// written first and uncompressed, as HWPX readers expect; everything else
/// is deflated. The archive is assembled at a temporary sibling path and
/// renamed over the final destination only on success.
pub fn pack_hwpx<P: AsRef<Path>, Q: AsRef<Path>>(package_dir: P, output: Q) -> anyhow::Result<()> {
    let package_dir = package_dir.as_ref();
    let output = output.as_ref();

    let parent = output.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let tmp_path = parent.join(format!(".{}.hwpx.tmp", Uuid::new_v4()));

    let result = write_archive(package_dir, &tmp_path);
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
        return result;
    }

    std::fs::rename(&tmp_path, output)
        .with_context(|| format!("failed to move archive into {}", output.display()))?;
    info!("packed {} into {}", package_dir.display(), output.display());
    Ok(())
}

fn write_archive(package_dir: &Path, archive_path: &Path) -> anyhow::Result<()> {
    let mut entries = Vec::new();
    let mut empty_dirs = Vec::new();
    collect_files(package_dir, package_dir, &mut entries, &mut empty_dirs)?;
    // mimetype leads the archive, stored uncompressed.
    entries.sort_by_key(|(rel, _)| (rel != "mimetype", rel.clone()));
    empty_dirs.sort();

    let file = File::create(archive_path)
        .with_context(|| format!("failed to create {}", archive_path.display()))?;
    let mut writer = ZipWriter::new(file);

    for (rel, abs) in entries {
        let method = if rel == "mimetype" {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflated
        };
        let options = FileOptions::default().compression_method(method);
        writer.start_file(rel.as_str(), options)?;
        let bytes = std::fs::read(&abs)
            .with_context(|| format!("failed to read {}", abs.display()))?;
        writer.write_all(&bytes)?;
        debug!("archived {}", rel);
    }

    // Directories with no contents still belong in the package; without an
    // explicit entry they would vanish on extraction.
    for rel in empty_dirs {
        writer.add_directory(rel.as_str(), FileOptions::default())?;
        debug!("archived empty directory {}/", rel);
    }

    writer.finish()?;
    Ok(())
}

fn collect_files(
    root: &Path,
    dir: &Path,
    entries: &mut Vec<(String, PathBuf)>,
    empty_dirs: &mut Vec<String>,
) -> anyhow::Result<()> {
    let mut seen_any = false;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        seen_any = true;
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, entries, empty_dirs)?;
        } else {
            entries.push((rel_path(root, &path)?, path));
        }
    }
    if !seen_any && dir != root {
        empty_dirs.push(rel_path(root, dir)?);
    }
    Ok(())
}

fn rel_path(root: &Path, path: &Path) -> anyhow::Result<String> {
    let rel = path
        .strip_prefix(root)
        .with_context(|| format!("{} is outside the package root", path.display()))?
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    Ok(rel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn make_package(dir: &Path) {
        std::fs::create_dir_all(dir.join("Contents")).unwrap();
        std::fs::write(dir.join("mimetype"), "application/hwp+zip").unwrap();
        std::fs::write(dir.join("Contents/section0.xml"), "<hs:sec/>").unwrap();
    }

    #[test]
    fn staging_produces_an_isolated_copy() {
        let tmp = tempfile::tempdir().unwrap();
        let template = tmp.path().join("template");
        make_package(&template);

        let staged = stage_package(&template, tmp.path()).unwrap();
        assert!(staged.join("Contents/section0.xml").is_file());

        std::fs::write(staged.join("Contents/section0.xml"), "<changed/>").unwrap();
        let original = std::fs::read_to_string(template.join("Contents/section0.xml")).unwrap();
        assert_eq!(original, "<hs:sec/>");
    }

    #[test]
    fn staging_missing_template_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(stage_package(tmp.path().join("missing"), tmp.path()).is_err());
    }

    #[test]
    fn packed_archive_contains_all_entries_with_mimetype_first() {
        let tmp = tempfile::tempdir().unwrap();
        let package = tmp.path().join("pkg");
        make_package(&package);
        let output = tmp.path().join("out.hwpx");

        pack_hwpx(&package, &output).unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&output).unwrap()).unwrap();
        assert_eq!(archive.by_index(0).unwrap().name(), "mimetype");
        assert_eq!(
            archive.by_index(0).unwrap().compression(),
            CompressionMethod::Stored
        );

        let mut section = String::new();
        archive
            .by_name("Contents/section0.xml")
            .unwrap()
            .read_to_string(&mut section)
            .unwrap();
        assert_eq!(section, "<hs:sec/>");

        // No stray temp files left next to the output.
        check_no_leftovers(tmp.path());
    }

    #[test]
    fn packed_archive_keeps_empty_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let package = tmp.path().join("pkg");
        make_package(&package);
        std::fs::create_dir_all(package.join("Preview")).unwrap();
        let output = tmp.path().join("out.hwpx");

        pack_hwpx(&package, &output).unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&output).unwrap()).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert!(
            names.iter().any(|n| n == "Preview/"),
            "empty directory missing from {:?}",
            names
        );
    }

    fn check_no_leftovers(dir: &Path) {
        let leftovers: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".hwpx.tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}

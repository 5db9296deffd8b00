use crate::domain::{ValdError, ValdResult};
use globset::Glob;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub fn format_left(value: &str, width: usize) -> String {
    format!("{value:<width$}", width = width)
}

pub fn read_text_input(path: &Path) -> ValdResult<String> {
    fs::read_to_string(path).map_err(|source| {
        ValdError::io_system(
            "IO.INPUT_READ",
            format!("failed to read '{}': {}", path.display(), source),
        )
    })
}

pub fn ensure_directory(path: &Path) -> ValdResult<()> {
    fs::create_dir_all(path).map_err(|source| {
        ValdError::io_system(
            "IO.OUTPUT_DIRECTORY",
            format!("failed to create directory '{}': {}", path.display(), source),
        )
    })
}

/// Opens a temporary file next to `destination` so the final rename stays on one filesystem.
pub fn staging_file_for(destination: &Path) -> ValdResult<NamedTempFile> {
    let parent = destination
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    ensure_directory(parent)?;
    NamedTempFile::new_in(parent).map_err(|source| {
        ValdError::io_system(
            "IO.OUTPUT_STAGING",
            format!(
                "failed to create temporary file in '{}': {}",
                parent.display(),
                source
            ),
        )
    })
}

pub fn persist_staged(staged: NamedTempFile, destination: &Path) -> ValdResult<()> {
    staged.persist(destination).map_err(|error| {
        ValdError::io_system(
            "IO.OUTPUT_RENAME",
            format!(
                "failed to move finished output into '{}': {}",
                destination.display(),
                error.error
            ),
        )
    })?;
    Ok(())
}

/// Writes `content` into a temporary file next to `destination` without persisting it.
pub fn stage_text(destination: &Path, content: &str) -> ValdResult<NamedTempFile> {
    let mut staged = staging_file_for(destination)?;
    staged.write_all(content.as_bytes()).map_err(|source| {
        ValdError::io_system(
            "IO.OUTPUT_WRITE",
            format!("failed to write '{}': {}", destination.display(), source),
        )
    })?;
    Ok(staged)
}

/// Writes `content` to `destination` through a temporary file; nothing is left behind on failure.
pub fn write_text_atomically(destination: &Path, content: &str) -> ValdResult<()> {
    let staged = stage_text(destination, content)?;
    persist_staged(staged, destination)
}

/// Regular files in `directory` whose names match `pattern`, sorted by file name.
pub fn list_input_files(directory: &Path, pattern: &str) -> ValdResult<Vec<PathBuf>> {
    let matcher = Glob::new(pattern)
        .map_err(|source| {
            ValdError::input_validation(
                "INPUT.FILE_PATTERN",
                format!("invalid file pattern '{pattern}': {source}"),
            )
        })?
        .compile_matcher();

    let entries = fs::read_dir(directory).map_err(|source| {
        ValdError::io_system(
            "IO.INPUT_DIRECTORY",
            format!("failed to list '{}': {}", directory.display(), source),
        )
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| {
            ValdError::io_system(
                "IO.INPUT_DIRECTORY",
                format!("failed to list '{}': {}", directory.display(), source),
            )
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .file_name()
            .is_some_and(|name| matcher.is_match(Path::new(name)));
        if matches {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::{format_left, list_input_files, write_text_atomically};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn left_justified_columns_are_padded() {
        assert_eq!(format_left("VALD", 8), "VALD    ");
        assert_eq!(format_left("1234567890", 4), "1234567890");
    }

    #[test]
    fn atomic_writes_replace_existing_content() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("nested/out.lst");

        write_text_atomically(&path, "first\n").expect("first write should succeed");
        write_text_atomically(&path, "second\n").expect("second write should succeed");

        assert_eq!(fs::read_to_string(&path).expect("readable"), "second\n");
        let leftovers = fs::read_dir(path.parent().expect("parent"))
            .expect("listable")
            .count();
        assert_eq!(leftovers, 1, "no staging files should remain");
    }

    #[test]
    fn input_listing_filters_and_sorts() {
        let temp = TempDir::new().expect("tempdir should be created");
        fs::write(temp.path().join("b.lst"), "b").expect("staged");
        fs::write(temp.path().join("a.lst"), "a").expect("staged");
        fs::write(temp.path().join("notes.txt"), "n").expect("staged");
        fs::create_dir(temp.path().join("c.lst")).expect("dir staged");

        let files = list_input_files(temp.path(), "*.lst").expect("listing should succeed");
        let names: Vec<_> = files
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, ["a.lst", "b.lst"]);

        let error = list_input_files(temp.path(), "[").expect_err("bad glob should fail");
        assert_eq!(error.code(), "INPUT.FILE_PATTERN");
    }
}

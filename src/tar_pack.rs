// Copyright 2018 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Bundles a host path (file or directory tree) into a tar archive for
//! upload to a sandbox container via `copy_to_container`. The archive's
//! top-level entry preserves the basename of `host_path`, matching the
//! layout `docker cp` itself produces.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Packs `host_path` into an in-memory tar archive. If `host_path` is a file,
/// the archive contains a single entry named after its basename. If it is a
/// directory, the archive contains the directory and its full contents,
/// rooted at the basename. Symlinks that point outside `host_path` are not
/// followed; only the symlink itself is recorded.
pub fn pack(host_path: &Path) -> io::Result<Vec<u8>> {
    let metadata = fs::symlink_metadata(host_path)?;
    let base_name = host_path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("path has no file name: {}", host_path.display()),
        )
    })?;

    let mut builder = tar::Builder::new(Vec::new());
    builder.follow_symlinks(false);

    if metadata.is_dir() {
        builder.append_dir(base_name, host_path)?;
        for entry in WalkDir::new(host_path).min_depth(1).follow_links(false) {
            let entry = entry.map_err(io::Error::from)?;
            let relative = entry.path().strip_prefix(host_path).map_err(|e| {
                io::Error::new(io::ErrorKind::Other, format!("non-prefix walk entry: {e}"))
            })?;
            let path_in_tar: PathBuf = Path::new(base_name).join(relative);
            let entry_metadata = entry.path().symlink_metadata()?;
            if entry_metadata.is_dir() {
                builder.append_dir(&path_in_tar, entry.path())?;
            } else if entry_metadata.is_symlink() {
                let target = fs::read_link(entry.path())?;
                let mut header = tar::Header::new_gnu();
                header.set_entry_type(tar::EntryType::Symlink);
                header.set_size(0);
                header.set_metadata(&entry_metadata);
                builder.append_link(&mut header, &path_in_tar, &target)?;
            } else {
                let mut file = fs::File::open(entry.path())?;
                builder.append_file(&path_in_tar, &mut file)?;
            }
        }
    } else {
        let mut file = fs::File::open(host_path)?;
        builder.append_file(base_name, &mut file)?;
    }

    builder.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn unpack(tar_bytes: &[u8], dest: &Path) {
        let mut archive = tar::Archive::new(tar_bytes);
        archive.unpack(dest).expect("unpack should succeed");
    }

    #[test]
    fn packs_a_single_file_preserving_basename() {
        let tmp = tempfile::tempdir().unwrap();
        let file_path = tmp.path().join("main.cpp");
        fs::write(&file_path, b"int main() { return 0; }").unwrap();

        let tar_bytes = pack(&file_path).unwrap();

        let dest = tempfile::tempdir().unwrap();
        unpack(&tar_bytes, dest.path());
        let unpacked = dest.path().join("main.cpp");
        assert!(unpacked.exists());
        assert_eq!(fs::read(unpacked).unwrap(), b"int main() { return 0; }");
    }

    #[test]
    fn packs_a_directory_tree_with_preserved_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let submission_dir = tmp.path().join("submission");
        fs::create_dir_all(submission_dir.join("lib")).unwrap();
        fs::write(submission_dir.join("main.cpp"), b"root file").unwrap();
        fs::write(submission_dir.join("lib/helper.h"), b"nested file").unwrap();

        let tar_bytes = pack(&submission_dir).unwrap();

        let dest = tempfile::tempdir().unwrap();
        unpack(&tar_bytes, dest.path());

        let root = dest.path().join("submission");
        assert_eq!(fs::read(root.join("main.cpp")).unwrap(), b"root file");
        assert_eq!(
            fs::read(root.join("lib/helper.h")).unwrap(),
            b"nested file"
        );
    }

    #[test]
    fn round_trip_is_byte_identical() {
        let tmp = tempfile::tempdir().unwrap();
        let submission_dir = tmp.path().join("case");
        fs::create_dir_all(&submission_dir).unwrap();
        let mut contents = Vec::new();
        for i in 0..50u8 {
            contents.push(i);
        }
        fs::write(submission_dir.join("data.bin"), &contents).unwrap();

        let tar_bytes = pack(&submission_dir).unwrap();
        let dest = tempfile::tempdir().unwrap();
        unpack(&tar_bytes, dest.path());

        let mut roundtripped = Vec::new();
        fs::File::open(dest.path().join("case/data.bin"))
            .unwrap()
            .read_to_end(&mut roundtripped)
            .unwrap();
        assert_eq!(roundtripped, contents);
    }
}

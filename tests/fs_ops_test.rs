//! File system API (C5) operation-by-operation tests.

use blockfs::{FileSystem, FsError};
use std::io::Cursor;
use tempfile::NamedTempFile;

fn fresh_fs() -> FileSystem<blockfs::FileBlockDevice> {
    let tmp = NamedTempFile::new().unwrap();
    let mut fs = FileSystem::open(tmp.path()).unwrap();
    fs.format().unwrap();
    fs
}

fn create(fs: &mut FileSystem<blockfs::FileBlockDevice>, path: &str, content: &str) {
    let mut input = Cursor::new(format!("{content}\n\n"));
    fs.create(path, &mut input).unwrap();
}

#[test]
fn create_then_cat_round_trips_bytes() {
    let mut fs = fresh_fs();
    create(&mut fs, "/a", "hi");
    assert_eq!(fs.cat("/a").unwrap(), b"hi\n");
}

#[test]
fn create_rejects_duplicate_leaf() {
    let mut fs = fresh_fs();
    create(&mut fs, "/a", "hi");
    let mut input = Cursor::new("bye\n\n");
    assert!(matches!(fs.create("/a", &mut input), Err(FsError::AlreadyExists)));
}

#[test]
fn create_rejects_name_fifty_six_bytes_and_accepts_fifty_five() {
    let mut fs = fresh_fs();
    let ok_name = format!("/{}", "a".repeat(55));
    let too_long_name = format!("/{}", "a".repeat(56));

    create(&mut fs, &ok_name, "x");
    assert!(fs.cat(&ok_name).is_ok());

    let mut input = Cursor::new("x\n\n");
    assert!(matches!(
        fs.create(&too_long_name, &mut input),
        Err(FsError::NameTooLong)
    ));
}

#[test]
fn create_with_no_input_makes_a_zero_byte_file() {
    let mut fs = fresh_fs();
    let mut input = Cursor::new("\n");
    fs.create("/empty", &mut input).unwrap();
    assert_eq!(fs.cat("/empty").unwrap(), Vec::<u8>::new());
}

#[test]
fn cat_on_directory_is_rejected() {
    let mut fs = fresh_fs();
    fs.mkdir("/d").unwrap();
    assert!(matches!(fs.cat("/d"), Err(FsError::IsADirectory)));
}

#[test]
fn cat_respects_read_permission() {
    let mut fs = fresh_fs();
    create(&mut fs, "/a", "secret");
    fs.chmod("2", "/a").unwrap(); // write-only
    assert!(matches!(fs.cat("/a"), Err(FsError::PermissionDenied)));
}

#[test]
fn cat_emits_full_last_block_on_exact_multiple_of_block_size() {
    let mut fs = fresh_fs();
    let mut body = "a".repeat(4095);
    body.push('\n'); // exactly one block: 4095 bytes + '\n' appended by create = 4096
    let mut input = Cursor::new(format!("{body}\n"));
    fs.create("/full", &mut input).unwrap();
    let data = fs.cat("/full").unwrap();
    assert_eq!(data.len(), 4096);
}

#[test]
fn ls_lists_entries_with_type_and_access() {
    let mut fs = fresh_fs();
    create(&mut fs, "/a", "x");
    fs.mkdir("/d").unwrap();

    let listing = fs.ls().unwrap();
    assert!(listing.contains("a"));
    assert!(listing.contains("file"));
    assert!(listing.contains("rw-"));
    assert!(listing.contains("d"));
    assert!(listing.contains("dir"));
    assert!(listing.contains("rwx"));
}

#[test]
fn cp_creates_an_independent_copy() {
    let mut fs = fresh_fs();
    create(&mut fs, "/a", "abc");
    fs.cp("/a", "/b").unwrap();

    assert_eq!(fs.cat("/a").unwrap(), fs.cat("/b").unwrap());

    fs.rm("/a").unwrap();
    assert_eq!(fs.cat("/b").unwrap(), b"abc\n");
}

#[test]
fn cp_into_existing_directory_keeps_source_name() {
    let mut fs = fresh_fs();
    create(&mut fs, "/a", "abc");
    fs.mkdir("/d").unwrap();
    fs.cp("/a", "/d").unwrap();

    assert_eq!(fs.cat("/d/a").unwrap(), b"abc\n");
}

#[test]
fn cp_onto_existing_file_fails() {
    let mut fs = fresh_fs();
    create(&mut fs, "/a", "abc");
    create(&mut fs, "/b", "xyz");
    assert!(matches!(fs.cp("/a", "/b"), Err(FsError::AlreadyExists)));
}

#[test]
fn mv_renames_in_place() {
    let mut fs = fresh_fs();
    create(&mut fs, "/a", "x");
    fs.mv("/a", "/b").unwrap();

    assert!(matches!(fs.cat("/a"), Err(FsError::NotFound)));
    assert_eq!(fs.cat("/b").unwrap(), b"x\n");
}

#[test]
fn mv_into_existing_directory_preserves_name() {
    let mut fs = fresh_fs();
    fs.mkdir("/d").unwrap();
    fs.mkdir("/e").unwrap();
    fs.mv("/d", "/e").unwrap();

    assert!(fs.cd("/d").is_err());

    fs.cd("/e/d").unwrap();
    assert_eq!(fs.pwd().unwrap(), "/e/d");
}

#[test]
fn mv_rewrites_dotdot_when_crossing_parents() {
    let mut fs = fresh_fs();
    fs.mkdir("/src").unwrap();
    fs.mkdir("/dst").unwrap();
    fs.cd("/src").unwrap();
    fs.mkdir("moved").unwrap();
    fs.cd("/").unwrap();

    fs.mv("/src/moved", "/dst/moved").unwrap();

    fs.cd("/dst/moved").unwrap();
    assert_eq!(fs.pwd().unwrap(), "/dst/moved");
    fs.cd("..").unwrap();
    assert_eq!(fs.pwd().unwrap(), "/dst");
}

#[test]
fn mv_onto_existing_file_fails() {
    let mut fs = fresh_fs();
    create(&mut fs, "/a", "x");
    create(&mut fs, "/b", "y");
    assert!(matches!(fs.mv("/a", "/b"), Err(FsError::AlreadyExists)));
}

#[test]
fn rm_frees_the_files_blocks() {
    let mut fs = fresh_fs();
    let before = fs.free_block_count();
    create(&mut fs, "/a", "x");
    assert!(fs.free_block_count() < before);

    fs.rm("/a").unwrap();
    assert_eq!(fs.free_block_count(), before);
}

#[test]
fn rm_rejects_non_empty_directory() {
    let mut fs = fresh_fs();
    fs.mkdir("/d").unwrap();
    fs.cd("/d").unwrap();
    create(&mut fs, "f", "x");
    fs.cd("/").unwrap();

    assert!(matches!(fs.rm("/d"), Err(FsError::NotEmpty)));
}

#[test]
fn rm_rejects_cwd_and_root() {
    let mut fs = fresh_fs();
    fs.mkdir("/d").unwrap();
    fs.cd("/d").unwrap();
    assert!(matches!(fs.rm("../d"), Err(FsError::CannotRemoveCwd)));
}

#[test]
fn mkdir_then_rm_restores_free_block_count() {
    let mut fs = fresh_fs();
    let before = fs.free_block_count();
    fs.mkdir("/d").unwrap();
    assert_eq!(fs.free_block_count(), before - 1);

    fs.rm("/d").unwrap();
    assert_eq!(fs.free_block_count(), before);
}

#[test]
fn append_concatenates_and_updates_size() {
    let mut fs = fresh_fs();
    create(&mut fs, "/a", "one");
    create(&mut fs, "/b", "two");

    fs.append("/a", "/b").unwrap();

    assert_eq!(fs.cat("/b").unwrap(), b"two\none\n");
    assert_eq!(fs.cat("/a").unwrap(), b"one\n");
}

#[test]
fn append_requires_write_on_destination() {
    let mut fs = fresh_fs();
    create(&mut fs, "/a", "one");
    create(&mut fs, "/b", "two");
    fs.chmod("4", "/b").unwrap(); // read-only

    assert!(matches!(fs.append("/a", "/b"), Err(FsError::PermissionDenied)));
}

#[test]
fn append_spans_a_new_block_when_destination_overflows() {
    let mut fs = fresh_fs();
    let mut big = Cursor::new(format!("{}\n\n", "x".repeat(4090)));
    fs.create("/a", &mut big).unwrap(); // 4091 bytes, one block with 5 bytes to spare
    create(&mut fs, "/b", "0123456789"); // 11 bytes, overflows the spare room

    fs.append("/b", "/a").unwrap();
    let data = fs.cat("/a").unwrap();
    assert_eq!(data.len(), 4091 + 11);
    assert_eq!(&data[4091..], b"0123456789\n");
}

#[test]
fn cd_and_pwd_round_trip() {
    let mut fs = fresh_fs();
    fs.mkdir("/a").unwrap();
    fs.cd("/a").unwrap();
    fs.mkdir("b").unwrap();
    fs.cd("b").unwrap();

    assert_eq!(fs.pwd().unwrap(), "/a/b");

    fs.cd("..").unwrap();
    assert_eq!(fs.pwd().unwrap(), "/a");

    fs.cd("/").unwrap();
    assert_eq!(fs.pwd().unwrap(), "/");
}

#[test]
fn pwd_at_root_is_slash() {
    let mut fs = fresh_fs();
    assert_eq!(fs.pwd().unwrap(), "/");
}

#[test]
fn cd_dotdot_at_root_is_a_no_op() {
    let mut fs = fresh_fs();
    fs.cd("..").unwrap();
    assert_eq!(fs.pwd().unwrap(), "/");
}

#[test]
fn chmod_updates_access_bits_visible_in_ls() {
    let mut fs = fresh_fs();
    create(&mut fs, "/a", "x");
    fs.chmod("4", "/a").unwrap();

    let listing = fs.ls().unwrap();
    let line = listing.lines().find(|l| l.starts_with('a')).unwrap();
    assert!(line.contains("r--"));
}

#[test]
fn format_resets_free_block_count_and_cwd() {
    let mut fs = fresh_fs();
    let baseline = fs.free_block_count();
    fs.mkdir("/d").unwrap();
    fs.cd("/d").unwrap();

    fs.format().unwrap();

    assert_eq!(fs.free_block_count(), baseline);
    assert_eq!(fs.pwd().unwrap(), "/");
}

//! The readers plug into `std::io` consumers

use blobfs_testing::{TestAccount, LOREM_IPSUM};
use std::io::{BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom};

#[test]
fn test_read_to_string() {
    let account = TestAccount::new().unwrap();
    let mut stream = account.fs().open_input_stream(&account.object_path()).unwrap();

    let mut contents = String::new();
    stream.read_to_string(&mut contents).unwrap();
    assert_eq!(contents, LOREM_IPSUM);
}

#[test]
fn test_buffered_lines() {
    let account = TestAccount::new().unwrap();
    let file = account.fs().open_input_file(&account.object_path()).unwrap();

    let lines: Vec<String> = BufReader::new(file).lines().map(|l| l.unwrap()).collect();
    assert_eq!(lines.len(), LOREM_IPSUM.lines().count());
    assert!(lines[1].starts_with("Lorem ipsum"));
}

#[test]
fn test_seek_from_end_and_current() {
    let account = TestAccount::new().unwrap();
    let mut file = account.fs().open_input_file(&account.object_path()).unwrap();
    let size = LOREM_IPSUM.len() as u64;

    assert_eq!(file.seek(SeekFrom::End(-8)).unwrap(), size - 8);
    let mut tail = String::new();
    file.read_to_string(&mut tail).unwrap();
    assert_eq!(tail, "aborum.\n");

    assert_eq!(file.seek(SeekFrom::Start(1)).unwrap(), 1);
    assert_eq!(file.seek(SeekFrom::Current(6)).unwrap(), 7);
    let mut word = [0u8; 5];
    file.read_exact(&mut word).unwrap();
    assert_eq!(&word, b"ipsum");
}

#[test]
fn test_seek_errors_map_to_io_kinds() {
    let account = TestAccount::new().unwrap();
    let mut file = account.fs().open_input_file(&account.object_path()).unwrap();

    let err = file.seek(SeekFrom::Current(-1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    let err = file.seek(SeekFrom::End(1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[test]
fn test_missing_object_maps_to_not_found() {
    let account = TestAccount::new().unwrap();
    let err = account
        .fs()
        .open_input_stream(&account.not_found_object_path())
        .unwrap_err();
    let io: std::io::Error = err.into();
    assert_eq!(io.kind(), ErrorKind::NotFound);
}

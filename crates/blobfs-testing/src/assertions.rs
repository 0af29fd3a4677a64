//! Common assertions for blobfs testing

use anyhow::{bail, Result};
use blobfs::{BlobFsError, ErrorKind, InputStream};
use std::fmt::Debug;

/// Asserts that `result` failed with an error of `kind`
pub fn assert_error_kind<T: Debug>(result: blobfs::Result<T>, kind: ErrorKind) -> BlobFsError {
    match result {
        Ok(value) => panic!("expected {:?} error, got Ok({:?})", kind, value),
        Err(err) => {
            assert_eq!(err.kind(), kind, "unexpected error: {}", err);
            err
        }
    }
}

/// Reads `stream` to the end in chunks of `chunk`, returning everything read
pub fn read_to_end(stream: &dyn InputStream, chunk: usize) -> Result<Vec<u8>> {
    if chunk == 0 {
        bail!("chunk size must be positive");
    }
    let mut contents = Vec::new();
    loop {
        let bytes = stream.read(chunk)?;
        if bytes.is_empty() {
            break;
        }
        contents.extend_from_slice(&bytes);
    }
    Ok(contents)
}

/// Asserts that reading `stream` to the end yields exactly `expected`
pub fn assert_stream_contents(stream: &dyn InputStream, chunk: usize, expected: &[u8]) -> Result<()> {
    let contents = read_to_end(stream, chunk)?;
    assert_eq!(
        contents.len(),
        expected.len(),
        "Length mismatch: {} vs {}",
        contents.len(),
        expected.len()
    );
    assert!(contents == expected, "Content mismatch");
    Ok(())
}

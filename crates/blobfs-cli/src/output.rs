//! Human-readable and JSON rendering of filesystem results

use anyhow::Result;
use blobfs::{FileInfo, FileType, MetadataRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct FileInfoOutput<'a> {
    path: &'a str,
    #[serde(rename = "type")]
    file_type: &'static str,
    size: Option<u64>,
    modified: Option<String>,
}

impl<'a> From<&'a FileInfo> for FileInfoOutput<'a> {
    fn from(info: &'a FileInfo) -> Self {
        Self {
            path: &info.path,
            file_type: type_name(info.file_type),
            size: info.size,
            modified: info.mtime.as_ref().map(DateTime::<Utc>::to_rfc3339),
        }
    }
}

#[derive(Serialize)]
struct MetadataEntry<'a> {
    key: &'a str,
    value: &'a str,
}

fn type_name(file_type: FileType) -> &'static str {
    match file_type {
        FileType::File => "file",
        FileType::Directory => "directory",
        FileType::NotFound => "not_found",
    }
}

fn format_modified(mtime: Option<&DateTime<Utc>>) -> String {
    mtime
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn print_file_info(out: &mut impl Write, info: &FileInfo, json: bool) -> Result<()> {
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&FileInfoOutput::from(info))?)?;
        return Ok(());
    }

    writeln!(out, "Path:     {}", info.path)?;
    writeln!(out, "Type:     {}", type_name(info.file_type))?;
    if let Some(size) = info.size {
        writeln!(out, "Size:     {}", size)?;
    }
    if info.mtime.is_some() {
        writeln!(out, "Modified: {}", format_modified(info.mtime.as_ref()))?;
    }
    Ok(())
}

pub fn print_metadata(out: &mut impl Write, metadata: &MetadataRecord, json: bool) -> Result<()> {
    if json {
        // An array keeps the canonical key order
        let entries: Vec<MetadataEntry<'_>> = metadata
            .iter()
            .map(|(key, value)| MetadataEntry { key, value })
            .collect();
        writeln!(out, "{}", serde_json::to_string_pretty(&entries)?)?;
        return Ok(());
    }

    let width = metadata.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    for (key, value) in metadata.iter() {
        writeln!(out, "{:<width$}  {}", key, value, width = width)?;
    }
    Ok(())
}

pub fn print_listing(out: &mut impl Write, entries: &[FileInfo], json: bool) -> Result<()> {
    if json {
        let entries: Vec<FileInfoOutput<'_>> = entries.iter().map(FileInfoOutput::from).collect();
        writeln!(out, "{}", serde_json::to_string_pretty(&entries)?)?;
        return Ok(());
    }

    for entry in entries {
        let size = match entry.file_type {
            FileType::Directory => "<DIR>".to_string(),
            _ => entry.size.map(|s| s.to_string()).unwrap_or_default(),
        };
        writeln!(
            out,
            "{:>12} {:>20} {}",
            size,
            format_modified(entry.mtime.as_ref()),
            entry.path
        )?;
    }
    Ok(())
}

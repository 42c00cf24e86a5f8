//! Folder-listing document rendering.
//!
//! Produces the `x-obex/folder-listing` XML object returned for listing GETs:
//!
//! ```text
//! <?xml version="1.0"?>
//! <!DOCTYPE folder-listing SYSTEM "obex-folder-listing.dtd">
//! <folder-listing version="1.0">
//! <folder name="photos" size="0" user-perm="RW" modified="20240102T030400Z"/>
//! <file name="a.jpg" size="100" user-perm="R" modified="20240102T030400Z"/>
//! </folder-listing>
//! ```
//!
//! Lines end with CRLF. Timestamps are rendered in UTC at minute precision.

use std::fmt::Write as _;
use std::time::SystemTime;

use chrono::{DateTime, Utc};

use super::entry::{EntryKind, FileEntry};

const PROLOGUE: &str = "<?xml version=\"1.0\"?>\r\n\
<!DOCTYPE folder-listing SYSTEM \"obex-folder-listing.dtd\">\r\n\
<folder-listing version=\"1.0\">\r\n";

const EPILOGUE: &str = "</folder-listing>\r\n";

/// Render a listing document for `entries`, in the given order.
pub fn render(entries: &[FileEntry]) -> String {
    let mut out = String::with_capacity(PROLOGUE.len() + EPILOGUE.len() + entries.len() * 96);
    out.push_str(PROLOGUE);

    for entry in entries {
        let tag = match entry.kind {
            EntryKind::Folder => "folder",
            EntryKind::File => "file",
        };
        // Writing into a String never fails
        let _ = write!(
            out,
            "<{tag} name=\"{}\" size=\"{}\" user-perm=\"{}\" modified=\"{}\"/>\r\n",
            escape(&entry.name),
            entry.size,
            permission_string(entry.readable, entry.writable),
            timestamp(entry.modified),
        );
    }

    out.push_str(EPILOGUE);
    out
}

/// `RW`, `R`, `W` or empty.
pub fn permission_string(readable: bool, writable: bool) -> &'static str {
    match (readable, writable) {
        (true, true) => "RW",
        (true, false) => "R",
        (false, true) => "W",
        (false, false) => "",
    }
}

/// Compact `YYYYMMDDThhmm00Z` timestamp.
pub fn timestamp(time: SystemTime) -> String {
    let time: DateTime<Utc> = time.into();
    time.format("%Y%m%dT%H%M00Z").to_string()
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

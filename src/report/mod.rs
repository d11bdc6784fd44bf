//! Report generation: the HTML analysis report and the IP trace map.
//!
//! Artifacts are named `<prefix>_<YYYYMMDDHHMMSS>.html` from the local
//! wall-clock time. A name already taken gets `_1`, `_2`, ... appended;
//! files are created exclusively, so nothing is ever overwritten.

pub mod html;
pub mod map;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::info;

use crate::error::{ForensicError, Result};

pub use self::html::{render_report, write_report, ReportInput};
pub use self::map::{render_map, write_map};

/// File name prefix of analysis reports.
pub const REPORT_PREFIX: &str = "email_report";

/// File name prefix of trace maps.
pub const MAP_PREFIX: &str = "ip_trace_map";

/// Upper bound on same-second suffixes before giving up.
const MAX_SUFFIX: u32 = 1000;

/// `<prefix>_<YYYYMMDDHHMMSS>` for a timestamp.
pub fn artifact_stem(prefix: &str, stamp: NaiveDateTime) -> String {
    format!("{prefix}_{}", stamp.format("%Y%m%d%H%M%S"))
}

/// Write `content` to a fresh `<prefix>_<stamp>[_N].html` inside `dir`.
///
/// Creates `dir` if needed. Returns the path written.
pub fn write_artifact(
    dir: &Path,
    prefix: &str,
    stamp: NaiveDateTime,
    content: &str,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| ForensicError::report_write(dir, e))?;

    let stem = artifact_stem(prefix, stamp);
    for n in 0..MAX_SUFFIX {
        let name = if n == 0 {
            format!("{stem}.html")
        } else {
            format!("{stem}_{n}.html")
        };
        let path = dir.join(name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(content.as_bytes())
                    .and_then(|_| file.flush())
                    .map_err(|e| ForensicError::report_write(&path, e))?;
                info!(path = %path.display(), bytes = content.len(), "Wrote artifact");
                return Ok(path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(ForensicError::report_write(&path, e)),
        }
    }

    Err(ForensicError::report_write(
        dir.join(format!("{stem}.html")),
        std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "too many artifacts with the same timestamp",
        ),
    ))
}

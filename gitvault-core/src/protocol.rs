// gitvault-core/src/protocol.rs
//
// The Git credential wire format: newline-delimited `key=value` pairs
// terminated by a blank line. Git itself uses ordinal (case-sensitive)
// keys; UI helper processes answer with case-insensitive keys, which we
// normalize to lowercase on read.

use std::collections::HashMap;
use std::io::{BufRead, Write};

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use gitvault_common::error::Error;

/// Read a `key=value` block from `reader` until a blank line or EOF.
/// Accepts both LF and CRLF line endings. Lines without `=` are ignored.
pub fn read_dictionary<R: BufRead>(reader: &mut R) -> Result<HashMap<String, String>, Error> {
    let mut dict = HashMap::new();
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        if let Some((key, value)) = trimmed.split_once('=') {
            dict.insert(key.to_string(), value.to_string());
        }
    }
    Ok(dict)
}

/// Async variant used for helper subprocess output. With
/// `ignore_case` set, keys are lowercased on insert.
pub async fn read_dictionary_async<R>(
    reader: R,
    ignore_case: bool,
) -> Result<HashMap<String, String>, Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut dict = HashMap::new();
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim_end_matches('\r');
        if trimmed.is_empty() {
            break;
        }
        if let Some((key, value)) = trimmed.split_once('=') {
            let key = if ignore_case {
                key.to_lowercase()
            } else {
                key.to_string()
            };
            dict.insert(key, value.to_string());
        }
    }
    Ok(dict)
}

/// Write an ordered `key=value` block followed by the blank-line
/// terminator, then flush. Order matters to keep output stable for Git.
pub fn write_dictionary<W: Write>(writer: &mut W, pairs: &[(String, String)]) -> Result<(), Error> {
    for (key, value) in pairs {
        writeln!(writer, "{}={}", key, value)?;
    }
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

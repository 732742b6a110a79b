//! Machine-readable output on stdout.
//!
//! # Important
//!
//! - **stdout**: report lines only (one JSON document per line)
//! - **stderr**: logs, never parsed
//! - **Never use `println!`**: it may add `\r\n` on Windows
//!
//! The terminal display also draws on stdout; the summary line is only
//! written after the display has finished.

use std::io::Write;

use serde::Serialize;

use crate::error::Result;

/// Write a line to stdout followed by a single `\n`, then flush.
pub fn write_stdout_line(line: &str) -> std::io::Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    write_line(&mut handle, line)
}

/// Serialize `value` as one line of JSON on stdout.
pub fn write_stdout_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string(value)?;
    write_stdout_line(&json)?;
    Ok(())
}

/// Serialize `value` as one line of JSON into any writer.
pub fn write_json_line<W: Write, T: Serialize>(out: &mut W, value: &T) -> Result<()> {
    let json = serde_json::to_string(value)?;
    write_line(out, &json)?;
    Ok(())
}

fn write_line<W: Write>(out: &mut W, line: &str) -> std::io::Result<()> {
    out.write_all(line.as_bytes())?;
    out.write_all(b"\n")?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Report {
        frames: u64,
        reason: &'static str,
    }

    #[test]
    fn test_json_line_is_newline_terminated() {
        let mut out = Vec::new();
        write_json_line(
            &mut out,
            &Report {
                frames: 7,
                reason: "end_of_stream",
            },
        )
        .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"frames\":7,\"reason\":\"end_of_stream\"}\n"
        );
    }

    #[test]
    fn test_write_stdout_json_does_not_panic() {
        let result = write_stdout_json(&Report {
            frames: 0,
            reason: "end_of_stream",
        });
        assert!(result.is_ok());
    }
}

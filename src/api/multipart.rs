//! Minimal `multipart/form-data` parsing.
//!
//! Covers exactly what the analyze endpoint needs: boundary extraction
//! from the `Content-Type` header, part splitting on the boundary
//! delimiter, and `Content-Disposition` name/filename parameters. Payload
//! bytes are returned verbatim. Nested multipart and transfer encodings
//! are out of scope.

use anyhow::{anyhow, Result};

/// One body part. `filename` distinguishes file parts (`Some`, possibly
/// empty when the client submitted no file) from plain form fields
/// (`None`).
#[derive(Clone, Debug)]
pub struct Part {
    pub name: String,
    pub filename: Option<String>,
    pub data: Vec<u8>,
}

/// Extract the boundary parameter from a `Content-Type` header value.
/// Returns `None` unless the media type is `multipart/form-data` with a
/// non-empty boundary.
pub fn boundary(content_type: &str) -> Option<String> {
    let mut segments = content_type.split(';');
    let media_type = segments.next()?.trim();
    if !media_type.eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }
    for segment in segments {
        if let Some((key, value)) = segment.trim().split_once('=') {
            if key.trim().eq_ignore_ascii_case("boundary") {
                let value = value.trim().trim_matches('"');
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

/// Split a multipart body into its parts.
pub fn parse(body: &[u8], boundary: &str) -> Result<Vec<Part>> {
    let delimiter = format!("--{boundary}").into_bytes();
    let mut parts = Vec::new();

    let mut pos = find_bytes(body, &delimiter, 0)
        .ok_or_else(|| anyhow!("multipart boundary not found in body"))?;
    loop {
        let after = pos + delimiter.len();
        if matches!(body.get(after..after + 2), Some(b"--")) {
            // Closing delimiter.
            break;
        }
        let content_start = match body.get(after..after + 2) {
            Some(b"\r\n") => after + 2,
            _ => return Err(anyhow!("malformed multipart delimiter")),
        };

        let next = find_bytes(body, &delimiter, content_start)
            .ok_or_else(|| anyhow!("unterminated multipart part"))?;
        let content_end = next
            .checked_sub(2)
            .filter(|end| *end >= content_start)
            .ok_or_else(|| anyhow!("malformed multipart part"))?;
        let segment = &body[content_start..content_end];

        let header_end = find_bytes(segment, b"\r\n\r\n", 0)
            .ok_or_else(|| anyhow!("multipart part missing header terminator"))?;
        let (mut name, mut filename) = (None, None);
        for line in String::from_utf8_lossy(&segment[..header_end]).split("\r\n") {
            if line
                .to_ascii_lowercase()
                .starts_with("content-disposition:")
            {
                let (n, f) = disposition_params(line);
                name = n;
                filename = f;
            }
        }

        parts.push(Part {
            name: name.unwrap_or_default(),
            filename,
            data: segment[header_end + 4..].to_vec(),
        });
        pos = next;
    }

    Ok(parts)
}

fn disposition_params(line: &str) -> (Option<String>, Option<String>) {
    let mut name = None;
    let mut filename = None;
    if let Some((_, rest)) = line.split_once(':') {
        for param in rest.split(';') {
            if let Some((key, value)) = param.trim().split_once('=') {
                let value = value.trim().trim_matches('"').to_string();
                match key.trim().to_ascii_lowercase().as_str() {
                    "name" => name = Some(value),
                    "filename" => filename = Some(value),
                    _ => {}
                }
            }
        }
    }
    (name, filename)
}

fn find_bytes(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|idx| idx + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_with(parts: &[(&str, Option<&str>, &[u8])], boundary: &str) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, filename, data) in parts {
            body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            let disposition = match filename {
                Some(filename) => format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n"
                ),
                None => format!("Content-Disposition: form-data; name=\"{name}\"\r\n"),
            };
            body.extend_from_slice(disposition.as_bytes());
            body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        body
    }

    #[test]
    fn extracts_the_boundary_parameter() {
        assert_eq!(
            boundary("multipart/form-data; boundary=XyZ123").as_deref(),
            Some("XyZ123")
        );
        assert_eq!(
            boundary("multipart/form-data; boundary=\"quoted value\"").as_deref(),
            Some("quoted value")
        );
        assert!(boundary("application/json").is_none());
        assert!(boundary("multipart/form-data").is_none());
    }

    #[test]
    fn parses_binary_file_parts() {
        // Payload contains CRLF bytes to prove the parser is not line-based.
        let payload = b"\x89PNG\r\n\x1a\n binary \r\n bytes";
        let body = body_with(
            &[
                ("note", None, b"hello".as_slice()),
                ("image", Some("selfie.jpg"), payload.as_slice()),
            ],
            "bnd",
        );

        let parts = parse(&body, "bnd").unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name, "note");
        assert_eq!(parts[0].filename, None);
        assert_eq!(parts[0].data, b"hello");
        assert_eq!(parts[1].name, "image");
        assert_eq!(parts[1].filename.as_deref(), Some("selfie.jpg"));
        assert_eq!(parts[1].data, payload);
    }

    #[test]
    fn preserves_empty_filenames() {
        let body = body_with(&[("image", Some(""), b"".as_slice())], "bnd");
        let parts = parse(&body, "bnd").unwrap();
        assert_eq!(parts[0].filename.as_deref(), Some(""));
    }

    #[test]
    fn rejects_bodies_without_the_boundary() {
        assert!(parse(b"no delimiters here", "bnd").is_err());
    }

    #[test]
    fn rejects_unterminated_parts() {
        let body = b"--bnd\r\nContent-Disposition: form-data; name=\"image\"\r\n\r\ndata";
        assert!(parse(body, "bnd").is_err());
    }
}

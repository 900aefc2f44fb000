//! Splitting a `header=1` transport reply into status, headers and body.

use weeslack_types::HttpError;

const SEPARATOR: &str = "\r\n\r\n";

/// A parsed reply. Header names keep their original case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Response {
    /// First header named `name`, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Seconds from a `Retry-After` header holding an integer.
    #[must_use]
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.header("retry-after")?.trim().parse().ok()
    }
}

/// Parse `raw` into a [`Response`].
///
/// A leading `1xx` block or a proxy's `Connection established` reply is
/// skipped when another status line follows it. Everything after the
/// separator of the remaining block is the body, even if it starts with
/// `HTTP/`.
pub fn parse_response(url: &str, return_code: i32, raw: &str) -> Result<Response, HttpError> {
    let malformed = |reason: &str| HttpError::new(url, return_code, 0, reason);

    let mut start = 0;
    let (head, status, body) = loop {
        let Some(offset) = raw[start..].find(SEPARATOR) else {
            return Err(malformed("response has no header separator"));
        };
        let end = start + offset;
        let head = &raw[start..end];
        let (status, reason) = head
            .split("\r\n")
            .next()
            .and_then(parse_status_line)
            .ok_or_else(|| malformed("response has an invalid status line"))?;
        let rest = &raw[end + SEPARATOR.len()..];
        if is_interim(status, reason) && rest.starts_with("HTTP/") {
            start = end + SEPARATOR.len();
            continue;
        }
        break (head, status, rest);
    };

    let headers = head
        .split("\r\n")
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.to_string(), value.trim().to_string()))
        .collect();

    Ok(Response {
        status,
        headers,
        body: body.to_string(),
    })
}

/// Status code and reason phrase of `HTTP/x.y 200 OK`.
fn parse_status_line(line: &str) -> Option<(u16, &str)> {
    let mut parts = line.splitn(3, ' ');
    if !parts.next()?.starts_with("HTTP/") {
        return None;
    }
    let status = parts.next()?.parse().ok()?;
    Some((status, parts.next().unwrap_or_default()))
}

fn is_interim(status: u16, reason: &str) -> bool {
    (100..200).contains(&status)
        || (status == 200 && reason.trim().eq_ignore_ascii_case("connection established"))
}

#[cfg(test)]
mod tests {
    use super::parse_response;

    #[test]
    fn splits_status_headers_and_body() {
        let raw = "HTTP/2 200\r\ncontent-type: application/json\r\nX-Thing: a:b\r\n\r\n{\"ok\":true}";
        let response = parse_response("u", 0, raw).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.header("Content-Type"), Some("application/json"));
        assert_eq!(response.header("x-thing"), Some("a:b"));
        assert_eq!(response.body, "{\"ok\":true}");
    }

    #[test]
    fn body_may_contain_blank_lines() {
        let raw = "HTTP/1.1 200 OK\r\n\r\nline1\r\n\r\nline2";
        assert_eq!(parse_response("u", 0, raw).unwrap().body, "line1\r\n\r\nline2");
    }

    #[test]
    fn skips_proxy_and_continue_blocks() {
        let raw = "HTTP/1.1 200 Connection established\r\n\r\n\
                   HTTP/1.1 100 Continue\r\n\r\n\
                   HTTP/1.1 404 Not Found\r\nServer: x\r\n\r\nmissing";
        let response = parse_response("u", 0, raw).unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(response.header("server"), Some("x"));
        assert_eq!(response.body, "missing");
    }

    #[test]
    fn body_starting_with_status_text_is_kept() {
        let response = parse_response("u", 0, "HTTP/1.1 200 OK\r\n\r\nHTTP/1.1 is a protocol").unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "HTTP/1.1 is a protocol");

        let response = parse_response("u", 0, "HTTP/1.1 200 OK\r\n\r\nHTTP/1.1 example\r\n\r\nrest").unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "HTTP/1.1 example\r\n\r\nrest");
    }

    #[test]
    fn continue_block_without_following_status_is_the_response() {
        let response = parse_response("u", 0, "HTTP/1.1 100 Continue\r\n\r\n").unwrap();
        assert_eq!(response.status, 100);
        assert_eq!(response.body, "");
    }

    #[test]
    fn retry_after_must_be_integer_seconds() {
        let raw = "HTTP/1.1 429 Too Many Requests\r\nretry-after:  7 \r\n\r\n";
        assert_eq!(parse_response("u", 0, raw).unwrap().retry_after_secs(), Some(7));

        let raw = "HTTP/1.1 429 Too Many Requests\r\nRetry-After: soon\r\n\r\n";
        assert_eq!(parse_response("u", 0, raw).unwrap().retry_after_secs(), None);
    }

    #[test]
    fn malformed_replies_are_http_errors_without_status() {
        let err = parse_response("http://x", 0, "garbage").unwrap_err();
        assert_eq!(err.http_status, 0);
        assert_eq!(err.url, "http://x");
        assert_eq!(err.error, "response has no header separator");

        let err = parse_response("http://x", 0, "HTTP/1.1 abc\r\n\r\nbody").unwrap_err();
        assert_eq!(err.error, "response has an invalid status line");
    }
}

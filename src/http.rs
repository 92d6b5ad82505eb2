use http::request::Builder;
use http::{HeaderValue, Method, Request, Response, StatusCode};
use rand::{thread_rng, Rng};
use ring::digest::{Context, SHA1_FOR_LEGACY_USE_ONLY};

pub fn upgrade_request() -> Builder {
    let mut nonce = [0u8; 16];
    thread_rng().fill(&mut nonce);
    Request::builder()
        .method(Method::GET)
        .header("Connection", "Upgrade")
        .header("Upgrade", "websocket")
        .header("Sec-WebSocket-Version", "13")
        .header("Sec-WebSocket-Key", base64::encode(nonce))
}

pub fn is_upgrade_request<T>(request: &Request<T>) -> bool {
    request.method() == http::Method::GET
        && request
            .headers()
            .get("Connection")
            .iter()
            .flat_map(|v| v.as_bytes().split(|&c| c == b' ' || c == b','))
            .filter(|h| h.eq_ignore_ascii_case(b"Upgrade"))
            .next()
            .is_some()
        && request
            .headers()
            .get("Upgrade")
            .filter(|v| v.as_bytes().eq_ignore_ascii_case(b"websocket"))
            .is_some()
        && request
            .headers()
            .get("Sec-WebSocket-Version")
            .map(HeaderValue::as_bytes)
            == Some(b"13")
        && request.headers().get("Sec-WebSocket-Key").is_some()
}

pub fn upgrade_response<T>(request: &Request<T>) -> Option<Response<()>> {
    let challenge = match (
        is_upgrade_request(request),
        request.headers().get("Sec-WebSocket-Key"),
    ) {
        (false, _) | (true, None) => return None,
        (true, Some(challenge)) => challenge.as_bytes(),
    };

    let response = Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .version(request.version())
        .header("Connection", "Upgrade")
        .header("Upgrade", "websocket")
        .header(
            "Sec-WebSocket-Accept",
            upgrade_challenge_response(challenge),
        )
        .body(())
        .unwrap();
    Some(response)
}

pub fn upgrade_challenge_response(challenge: &[u8]) -> String {
    let mut ctx = Context::new(&SHA1_FOR_LEGACY_USE_ONLY);
    ctx.update(challenge);
    ctx.update(b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11");
    base64::encode(ctx.finish())
}

/// Serializes a request head the way the upgrade handshake sends it: request
/// line, a Host header synthesized from the uri authority, then the
/// builder's headers.
pub fn encode_request_head<T>(request: &Request<T>) -> Vec<u8> {
    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let host = request
        .uri()
        .authority()
        .map(|authority| authority.as_str())
        .unwrap_or("");
    let mut head = format!(
        "{} {} HTTP/1.1\r\nHost: {}\r\n",
        request.method(),
        path,
        host
    );
    for (name, value) in request.headers() {
        head.push_str(name.as_str());
        head.push_str(": ");
        head.push_str(&String::from_utf8_lossy(value.as_bytes()));
        head.push_str("\r\n");
    }
    head.push_str("\r\n");
    head.into_bytes()
}

#[derive(thiserror::Error, Debug)]
pub enum ResponseHeadParseError {
    #[error("incomplete, response head not yet terminated")]
    Incomplete,
    #[error("malformed http response: {0}")]
    Malformed(&'static str),
}

/// Parses a response head terminated by an empty line from the start of
/// `buffer`, returning it together with the number of bytes it occupied.
/// Bytes past the terminator are the caller's to interpret.
pub fn parse_response_head(
    buffer: &[u8],
) -> Result<(Response<()>, usize), ResponseHeadParseError> {
    let head_end = match buffer.windows(4).position(|w| w == b"\r\n\r\n") {
        Some(position) => position,
        None => return Err(ResponseHeadParseError::Incomplete),
    };
    let head = std::str::from_utf8(&buffer[..head_end])
        .map_err(|_| ResponseHeadParseError::Malformed("head is not valid utf-8"))?;
    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap_or("");
    let mut parts = status_line.splitn(3, ' ');
    match parts.next() {
        Some(version) if version.starts_with("HTTP/") => {}
        _ => return Err(ResponseHeadParseError::Malformed("bad status line")),
    }
    let status = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .ok_or(ResponseHeadParseError::Malformed("bad status code"))?;
    let mut response = Response::builder().status(status);
    for line in lines {
        let mut kv = line.splitn(2, ':');
        let name = kv.next().unwrap_or("").trim();
        let value = match kv.next() {
            Some(value) => value.trim(),
            None => return Err(ResponseHeadParseError::Malformed("header line without colon")),
        };
        response = response.header(name, value);
    }
    let response = response
        .body(())
        .map_err(|_| ResponseHeadParseError::Malformed("invalid header"))?;
    Ok((response, head_end + 4))
}

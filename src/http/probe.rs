use crate::http::method::Method;
use crate::http::url::TargetUrl;

/// Builds the CL.TE probe: front-end honors `Content-Length`, back-end honors
/// `Transfer-Encoding`. Byte-exact per spec — no header canonicalization.
pub fn cl_te(method: Method, url: &TargetUrl, mutation_header: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(mutation_header.len() + url.path.len() + 96);
    out.extend_from_slice(method.as_str().as_bytes());
    out.push(b' ');
    out.extend_from_slice(url.path.as_bytes());
    out.extend_from_slice(b" HTTP/1.1\r\nHost: ");
    out.extend_from_slice(url.host_header().as_bytes());
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(mutation_header);
    out.extend_from_slice(b"\r\nContent-Length: 4\r\n\r\n1\r\nA\r\nX");
    out
}

/// Builds the TE.CL probe: front-end honors `Transfer-Encoding`, back-end
/// honors `Content-Length`. Byte-exact per spec.
pub fn te_cl(method: Method, url: &TargetUrl, mutation_header: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(mutation_header.len() + url.path.len() + 96);
    out.extend_from_slice(method.as_str().as_bytes());
    out.push(b' ');
    out.extend_from_slice(url.path.as_bytes());
    out.extend_from_slice(b" HTTP/1.1\r\nHost: ");
    out.extend_from_slice(url.host_header().as_bytes());
    out.extend_from_slice(b"\r\nContent-Length: 6\r\n");
    out.extend_from_slice(mutation_header);
    out.extend_from_slice(b"\r\n\r\n0\r\n\r\nX");
    out
}

/// The well-formed baseline request: a plain `GET /` with `Connection: close`
/// so the peer tears down the socket promptly once it has replied.
pub fn baseline_request(url: &TargetUrl) -> Vec<u8> {
    format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        url.path,
        url.host_header()
    )
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> TargetUrl {
        TargetUrl::parse(s).unwrap()
    }

    #[test]
    fn cl_te_is_byte_exact_for_space_before_colon() {
        let u = url("https://target.example/path");
        let bytes = cl_te(Method::POST, &u, b"Transfer-Encoding : chunked");
        let expected = b"POST /path HTTP/1.1\r\n\
Host: target.example\r\n\
Transfer-Encoding : chunked\r\n\
Content-Length: 4\r\n\
\r\n\
1\r\n\
A\r\n\
X";
        assert_eq!(bytes, expected);
    }

    #[test]
    fn te_cl_is_byte_exact_for_space_before_colon() {
        let u = url("https://target.example/path");
        let bytes = te_cl(Method::POST, &u, b"Transfer-Encoding : chunked");
        let expected = b"POST /path HTTP/1.1\r\n\
Host: target.example\r\n\
Content-Length: 6\r\n\
Transfer-Encoding : chunked\r\n\
\r\n\
0\r\n\
\r\n\
X";
        assert_eq!(bytes, expected);
    }

    #[test]
    fn host_header_includes_nondefault_port() {
        let u = url("http://target.example:8080/");
        let bytes = cl_te(Method::GET, &u, b"Transfer-Encoding: chunked");
        assert!(bytes.windows(b"Host: target.example:8080\r\n".len()).any(|w| w == b"Host: target.example:8080\r\n"));
    }

    #[test]
    fn baseline_request_is_well_formed() {
        let u = url("http://example.com/query?a=1");
        let req = baseline_request(&u);
        assert_eq!(
            req,
            b"GET /query?a=1 HTTP/1.1\r\nHost: example.com\r\nConnection: close\r\n\r\n".to_vec()
        );
    }
}

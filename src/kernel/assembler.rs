//! Response assembly from completed collectors.

use crate::http::response::Response;
use crate::transport::{ContentCollector, HeaderCollector, TransferInfo};

/// Build the response for a handle whose header collector saw a status line.
///
/// Pure function of the collector state. Cookies were already filtered by the
/// collector, so nothing here can fail. A collector without a status code
/// yields status 0; the engine never calls this in that case.
pub fn assemble(content: &ContentCollector, headers: &HeaderCollector, transfer: TransferInfo) -> Response {
    let mut response = Response::new(
        headers.code().unwrap_or_default(),
        headers.message(),
        headers.version(),
        headers.retrieve(),
        content.retrieve(),
    );

    for cookie in headers.cookies() {
        response.add_cookie(cookie.clone());
    }
    response.set_transfer(transfer);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_mirrors_collectors() {
        let mut headers = HeaderCollector::new();
        for line in [
            "HTTP/1.0 418 I'm a teapot\r\n",
            "Content-Type: text/plain\r\n",
            "Set-Cookie: flavour=earl-grey; HttpOnly\r\n",
            "Set-Cookie: =broken\r\n",
            "\r\n",
        ] {
            headers.collect(line.as_bytes());
        }
        let mut content = ContentCollector::new();
        content.collect(b"short and stout");

        let transfer = TransferInfo {
            url: "http://pot/".into(),
            size_download: 15,
            ..Default::default()
        };
        let response = assemble(&content, &headers, transfer.clone());

        assert_eq!(response.status_code(), 418);
        assert_eq!(response.reason(), "I'm a teapot");
        assert_eq!(response.protocol_version(), "1.0");
        assert_eq!(response.body(), b"short and stout");
        assert_eq!(response.cookies().len(), 1);
        assert_eq!(response.cookies()[0].value, "earl-grey");
        assert_eq!(response.headers().get("content-type"), Some("text/plain"));
        assert_eq!(response.transfer(), &transfer);
    }
}

use log::{debug, warn};
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, CONTENT_ENCODING, LOCATION, USER_AGENT,
};
use reqwest::redirect::Policy;
use reqwest::{Client, Response, StatusCode, Url};

use crate::body::BodyReader;
use crate::config::Settings;
use crate::error::{Error, Result};

/// Initial request plus at most two redirects.
pub const MAX_REQUESTS: usize = 3;

const ACCEPTED_ENCODINGS: &str = "gzip, deflate";

/// Statuses handed to the caller as-is; anything else aborts.
const ACCEPTED_STATUSES: [StatusCode; 4] = [
    StatusCode::OK,
    StatusCode::BAD_REQUEST,
    StatusCode::UNAUTHORIZED,
    StatusCode::NOT_FOUND,
];

/// The last response of a request chain.
#[derive(Debug)]
pub struct Fetched {
    pub url: Url,
    pub requests: usize,
    pub response: Response,
}

impl Fetched {
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn content_length(&self) -> Option<u64> {
        self.response.content_length()
    }

    pub fn is_gzip(&self) -> bool {
        self.response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("gzip"))
    }

    /// Hand the body over to a [`BodyReader`], decompressing gzip bodies.
    pub fn into_body(self) -> BodyReader {
        let gzip = self.is_gzip();
        BodyReader::spawn(self.response.bytes_stream(), gzip)
    }
}

/// Client with redirects disabled; [`fetch`] follows them itself.
pub fn build_client(settings: &Settings) -> Result<Client> {
    let mut builder = Client::builder()
        .redirect(Policy::none())
        .danger_accept_invalid_certs(settings.unsecure);

    if let Some(timeout) = settings.request_timeout() {
        builder = builder.timeout(timeout);
    }
    if settings.unsecure {
        warn!("TLS certificate verification is disabled");
    }

    builder.build().map_err(Error::Network)
}

pub fn request_headers(settings: &Settings) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    // an empty client string sends no User-Agent at all
    if !settings.client.is_empty() {
        let agent = HeaderValue::from_str(&settings.client)
            .map_err(|e| Error::config(format!("invalid client string: {e}")))?;
        headers.insert(USER_AGENT, agent);
    }
    headers.insert(ACCEPT, HeaderValue::from_static(settings.format.media_type()));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static(ACCEPTED_ENCODINGS));
    Ok(headers)
}

pub fn check_status(status: StatusCode) -> Result<()> {
    if ACCEPTED_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(Error::UnexpectedStatus(status))
    }
}

/// GET `settings.url`, following up to two 302 redirects.
///
/// A 302 that ends the chain (the request limit is reached or it carries no
/// usable `Location`) is returned like an accepted status.
pub async fn fetch(client: &Client, settings: &Settings) -> Result<Fetched> {
    let headers = request_headers(settings)?;
    let mut url = settings.url.clone();
    let mut requests = 0;

    let response = loop {
        debug!("Request: GET {url} {headers:?}");
        let response = client.get(url.clone()).headers(headers.clone()).send().await?;
        requests += 1;
        debug!(
            "Response: {} {:?}",
            response.status(),
            response.headers()
        );

        if response.status() != StatusCode::FOUND {
            break response;
        }
        if requests >= MAX_REQUESTS {
            warn!("not following redirect after {requests} requests");
            break response;
        }
        match relocation(&url, &response) {
            Some(next) => {
                debug!("Redirect: {url} -> {next}");
                url = next;
            }
            None => {
                warn!("redirect from {url} has no usable Location header");
                break response;
            }
        }
    };

    if response.status() != StatusCode::FOUND {
        check_status(response.status())?;
    }

    Ok(Fetched {
        url,
        requests,
        response,
    })
}

fn relocation(current: &Url, response: &Response) -> Option<Url> {
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    current.join(location).ok()
}

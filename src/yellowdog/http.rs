//! Request plumbing shared by the client operations.

use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;

use super::YellowDogError;

/// Builds an authenticated request.
pub(crate) fn request(http: &Client, method: Method, url: Url, authorization: &str) -> RequestBuilder {
    http.request(method, url)
        .header(reqwest::header::AUTHORIZATION, authorization)
}

/// Appends `segments` to `base`, percent-encoding each one.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, YellowDogError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| YellowDogError::InvalidUrl {
            url: base.to_string(),
            message: String::from("URL cannot be a base"),
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Passes successful responses through and turns the rest into errors.
pub(crate) async fn check_status(
    method: Method,
    url: &Url,
    response: Response,
) -> Result<Response, YellowDogError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(YellowDogError::Status {
        method: method.to_string(),
        path: url.path().to_owned(),
        status: status.as_u16(),
        body,
    })
}

/// Decodes a JSON body.
pub(crate) async fn decode<T: DeserializeOwned>(
    response: Response,
    what: &str,
) -> Result<T, YellowDogError> {
    response.json::<T>().await.map_err(|err| YellowDogError::Decode {
        what: what.to_owned(),
        message: err.to_string(),
    })
}

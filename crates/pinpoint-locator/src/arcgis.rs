use std::fmt::Write as _;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use exn::ResultExt;
use isahc::prelude::*;
use isahc::{HttpClient, Request};
use pinpoint_map::geometry::{Envelope, Point, SpatialReference};
use pinpoint_map::graphics::Attributes;

use crate::{Error, GeocodeParameters, GeocodeResult, LoadStatus, Locator, SuggestResult};

/// ArcGIS World Geocoding Service.
pub const WORLD_GEOCODE_SERVER: &str =
    "https://geocode.arcgis.com/arcgis/rest/services/World/GeocodeServer";

const USER_AGENT: &str = "Pinpoint/0.1";
/// Field name used for single-line input when the service does not say.
const DEFAULT_SINGLE_LINE_FIELD: &str = "SingleLine";
/// Half size, in degrees, of the extent given to candidates that have none.
const DEFAULT_EXTENT_HALF_SIZE: f64 = 0.005;

/// Locator backed by an ArcGIS `GeocodeServer` REST endpoint.
pub struct Backend {
    client: HttpClient,
    url: String,
    timeout: Duration,
    status: Mutex<LoadStatus>,
    single_line_field: Mutex<String>,
    /// One permit; whoever holds it may fetch service info.
    load_permit: (async_channel::Sender<()>, async_channel::Receiver<()>),
}

/// Returns the load permit when dropped.
struct LoadPermit<'a>(&'a async_channel::Sender<()>);

impl Drop for LoadPermit<'_> {
    fn drop(&mut self) {
        let _ = self.0.try_send(());
    }
}

impl Backend {
    /// Create a locator for the service at `url`. Nothing is fetched until
    /// [`Locator::load`].
    pub fn new(url: &str, timeout: Duration) -> exn::Result<Self, Error> {
        let client = HttpClient::new().or_raise(|| Error::Network("create HTTP client".into()))?;
        let load_permit = async_channel::bounded(1);
        let _ = load_permit.0.try_send(());
        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_owned(),
            timeout,
            status: Mutex::new(LoadStatus::NotLoaded),
            single_line_field: Mutex::new(DEFAULT_SINGLE_LINE_FIELD.to_owned()),
            load_permit,
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Wait for any load in flight to finish, then hold off others.
    async fn acquire_load(&self) -> LoadPermit<'_> {
        let (permits, waiting) = &self.load_permit;
        // Cannot fail: the sender lives as long as `self`.
        let _ = waiting.recv().await;
        LoadPermit(permits)
    }

    fn set_status(&self, status: LoadStatus) {
        *self.status.lock().expect("poisoned") = status;
    }

    async fn get(&self, url: &str) -> exn::Result<String, Error> {
        let request = Request::get(url)
            .timeout(self.timeout)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json")
            .body(())
            .or_raise(|| Error::Network("build HTTP request".into()))?;
        let mut response = self
            .client
            .send_async(request)
            .await
            .or_raise(|| Error::Network(format!("send request to {}", self.url)))?;
        if !response.status().is_success() {
            return Err(Error::Status(response.status().as_u16()).into());
        }
        response
            .text()
            .await
            .or_raise(|| Error::Network("read response body".into()))
    }

    /// Fetch service metadata and record the outcome as the load status.
    async fn fetch_info(&self) -> LoadStatus {
        self.set_status(LoadStatus::Loading);
        let url = format!("{}?f=json", self.url);
        let info = match self.get(&url).await {
            Ok(body) => parse_service_info(&body),
            Err(e) => Err(e),
        };
        let status = match info {
            Ok(info) => {
                if let Some(field) = info.single_line_address_field {
                    *self.single_line_field.lock().expect("poisoned") = field.name;
                }
                tracing::info!(
                    url = %self.url,
                    version = ?info.current_version,
                    "locator loaded"
                );
                LoadStatus::Loaded
            }
            Err(e) => {
                tracing::warn!(url = %self.url, error = ?e, "locator failed to load");
                LoadStatus::FailedToLoad
            }
        };
        self.set_status(status);
        status
    }
}

impl Locator for Backend {
    fn load_status(&self) -> LoadStatus {
        *self.status.lock().expect("poisoned")
    }

    fn load(&self) -> Pin<Box<dyn Future<Output = LoadStatus> + Send + '_>> {
        Box::pin(async move {
            let _permit = self.acquire_load().await;
            match self.load_status() {
                LoadStatus::NotLoaded | LoadStatus::Loading => self.fetch_info().await,
                status @ (LoadStatus::Loaded | LoadStatus::FailedToLoad) => status,
            }
        })
    }

    fn retry_load(&self) -> Pin<Box<dyn Future<Output = LoadStatus> + Send + '_>> {
        Box::pin(async move {
            let _permit = self.acquire_load().await;
            match self.load_status() {
                LoadStatus::Loaded => LoadStatus::Loaded,
                _ => self.fetch_info().await,
            }
        })
    }

    fn suggest(
        &self,
        text: String,
    ) -> Pin<Box<dyn Future<Output = exn::Result<Vec<SuggestResult>, Error>> + Send + '_>> {
        Box::pin(async move {
            let body = self.get(&suggest_url(&self.url, &text)).await?;
            parse_suggestions(&body)
        })
    }

    fn geocode<'a>(
        &'a self,
        text: String,
        params: &'a GeocodeParameters,
    ) -> Pin<Box<dyn Future<Output = exn::Result<Vec<GeocodeResult>, Error>> + Send + 'a>> {
        Box::pin(async move {
            if !self.load_status().is_loaded() {
                return Err(Error::NotLoaded.into());
            }
            let field = self.single_line_field.lock().expect("poisoned").clone();
            let url = geocode_url(&self.url, &field, &text, params);
            let body = self.get(&url).await?;
            parse_candidates(&body, params.max_results)
        })
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// Either an error document or the expected payload. Error replies come
/// back with HTTP 200.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum Reply<T> {
    Failure { error: ServiceError },
    Success(T),
}

#[derive(serde::Deserialize)]
struct ServiceError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: Vec<String>,
}

impl<T> Reply<T> {
    fn into_result(self) -> exn::Result<T, Error> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure { error } => {
                let mut message = error.message;
                for detail in error.details {
                    let _ = write!(message, "; {detail}");
                }
                Err(Error::Service {
                    code: error.code,
                    message,
                }
                .into())
            }
        }
    }
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceInfo {
    current_version: Option<f64>,
    single_line_address_field: Option<AddressField>,
}

#[derive(serde::Deserialize)]
struct AddressField {
    name: String,
}

#[derive(serde::Deserialize)]
struct SuggestResponse {
    suggestions: Vec<WireSuggestion>,
}

#[derive(serde::Deserialize)]
struct WireSuggestion {
    text: String,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidatesResponse {
    spatial_reference: Option<WireSpatialReference>,
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSpatialReference {
    wkid: Option<u32>,
    latest_wkid: Option<u32>,
}

#[derive(serde::Deserialize)]
struct Candidate {
    address: String,
    location: WirePoint,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    attributes: Attributes,
    extent: Option<WireExtent>,
}

#[derive(serde::Deserialize)]
struct WirePoint {
    x: f64,
    y: f64,
}

#[derive(serde::Deserialize)]
struct WireExtent {
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
}

fn parse<T: serde::de::DeserializeOwned>(body: &str) -> exn::Result<T, Error> {
    let reply: Reply<T> =
        serde_json::from_str(body).or_raise(|| Error::Parse(truncate(body, 200)))?;
    reply.into_result()
}

fn parse_service_info(body: &str) -> exn::Result<ServiceInfo, Error> {
    parse(body)
}

fn parse_suggestions(body: &str) -> exn::Result<Vec<SuggestResult>, Error> {
    let response: SuggestResponse = parse(body)?;
    Ok(response
        .suggestions
        .into_iter()
        .map(|s| SuggestResult::new(s.text))
        .collect())
}

fn parse_candidates(body: &str, max_results: u32) -> exn::Result<Vec<GeocodeResult>, Error> {
    let response: CandidatesResponse = parse(body)?;
    let spatial_reference = response
        .spatial_reference
        .and_then(|sr| sr.latest_wkid.or(sr.wkid))
        .map_or(SpatialReference::WGS84, |wkid| SpatialReference { wkid });

    Ok(response
        .candidates
        .into_iter()
        .take(max_results as usize)
        .map(|c| {
            let location = Point::new(c.location.x, c.location.y, spatial_reference);
            let extent = c.extent.map_or_else(
                || Envelope::around(&location, DEFAULT_EXTENT_HALF_SIZE),
                |e| Envelope::new(e.xmin, e.ymin, e.xmax, e.ymax, spatial_reference),
            );
            GeocodeResult {
                label: c.address,
                display_location: location,
                extent,
                score: c.score,
                attributes: c.attributes,
            }
        })
        .collect())
}

fn suggest_url(base: &str, text: &str) -> String {
    format!("{base}/suggest?text={}&f=json", percent_encode(text))
}

fn geocode_url(base: &str, field: &str, text: &str, params: &GeocodeParameters) -> String {
    let mut url = format!(
        "{base}/findAddressCandidates?{}={}&maxLocations={}",
        percent_encode(field),
        percent_encode(text),
        params.max_results,
    );
    if !params.result_attribute_names.is_empty() {
        let _ = write!(
            url,
            "&outFields={}",
            percent_encode(&params.result_attribute_names.join(","))
        );
    }
    url.push_str("&f=json");
    url
}

/// Percent-encode a string for use in a URL query parameter.
fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len() * 2);
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            b' ' => out.push('+'),
            _ => {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
    out
}

/// Shorten a response body for error messages, cutting on a char boundary.
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_owned();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write as _};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use futures_lite::future;

    use super::*;
    use crate::PLACE_NAME;

    /// Answer every request with `status` and `body`. Returns the service
    /// URL and a count of requests served.
    fn serve(status: &'static str, body: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/GeocodeServer", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                counter.fetch_add(1, Ordering::SeqCst);
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });
        (url, hits)
    }

    const SERVICE_INFO: &str = r#"{"currentVersion":11.1,"singleLineAddressField":{"name":"SingleLine"}}"#;

    #[test]
    fn suggest_url_encodes_text() {
        assert_eq!(
            suggest_url(WORLD_GEOCODE_SERVER, "1 Infinite Loop, Cupertino"),
            format!("{WORLD_GEOCODE_SERVER}/suggest?text=1+Infinite+Loop%2C+Cupertino&f=json")
        );
    }

    #[test]
    fn geocode_url_includes_parameters() {
        let params = GeocodeParameters::default().with_attribute(PLACE_NAME);
        assert_eq!(
            geocode_url("http://host/GeocodeServer", "SingleLine", "Oslo", &params),
            "http://host/GeocodeServer/findAddressCandidates?SingleLine=Oslo&maxLocations=1&outFields=PlaceName&f=json"
        );
    }

    #[test]
    fn geocode_url_without_attributes() {
        let params = GeocodeParameters::default().with_max_results(3);
        let url = geocode_url("http://host/GeocodeServer", "SingleLine", "Oslo", &params);
        assert!(url.contains("maxLocations=3"));
        assert!(!url.contains("outFields"));
    }

    #[test]
    fn parses_suggestions_in_order() {
        let body = r#"{"suggestions":[
            {"text":"1 Infinite Loop, Cupertino, CA, USA","magicKey":"abc","isCollection":false},
            {"text":"1 Infinite Loop, Austin, TX, USA","magicKey":"def","isCollection":false},
            {"text":"Coffee","isCollection":true}
        ]}"#;
        let suggestions = parse_suggestions(body).unwrap();
        assert_eq!(suggestions.len(), 3);
        assert_eq!(suggestions[0].label, "1 Infinite Loop, Cupertino, CA, USA");
        assert_eq!(suggestions[2].label, "Coffee");
    }

    #[test]
    fn parses_candidates_with_extent() {
        let body = r#"{
            "spatialReference":{"wkid":4326,"latestWkid":4326},
            "candidates":[{
                "address":"Apple Park",
                "location":{"x":-122.0090,"y":37.3349},
                "score":100,
                "attributes":{"PlaceName":"Apple Park"},
                "extent":{"xmin":-122.0140,"ymin":37.3299,"xmax":-122.0040,"ymax":37.3399}
            },{
                "address":"Second",
                "location":{"x":0,"y":0},
                "score":80,
                "attributes":{}
            }]
        }"#;
        let results = parse_candidates(body, 1).unwrap();
        assert_eq!(results.len(), 1);
        let r = &results[0];
        assert_eq!(r.label, "Apple Park");
        assert_eq!(r.place_name(), Some("Apple Park"));
        assert!((r.display_location.lat() - 37.3349).abs() < 1e-9);
        assert!(r.extent.contains(&r.display_location));
        assert_eq!(r.display_location.spatial_reference, SpatialReference::WGS84);
    }

    #[test]
    fn candidate_without_extent_gets_default() {
        let body = r#"{"candidates":[{"address":"x","location":{"x":10,"y":20}}]}"#;
        let results = parse_candidates(body, 5).unwrap();
        assert_eq!(results.len(), 1);
        let e = results[0].extent;
        assert!((e.width() - 2.0 * DEFAULT_EXTENT_HALF_SIZE).abs() < 1e-12);
        assert!(e.contains(&results[0].display_location));
        assert_eq!(results[0].score, 0.0);
    }

    #[test]
    fn empty_candidates() {
        let results = parse_candidates(r#"{"candidates":[]}"#, 1).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn service_error_document() {
        let body = r#"{"error":{"code":498,"message":"Invalid Token","details":["expired"]}}"#;
        assert!(parse_candidates(body, 1).is_err());
        assert!(parse_suggestions(body).is_err());
    }

    #[test]
    fn malformed_body() {
        assert!(parse_suggestions("<html>gateway timeout</html>").is_err());
    }

    #[test]
    fn service_info_single_line_field() {
        let body = r#"{"currentVersion":11.1,"singleLineAddressField":{"name":"SingleLine","type":"esriFieldTypeString"}}"#;
        let info = parse_service_info(body).unwrap();
        assert_eq!(info.current_version, Some(11.1));
        assert_eq!(info.single_line_address_field.map(|f| f.name).as_deref(), Some("SingleLine"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééé", 3), "é...");
    }

    #[test]
    fn new_backend_is_not_loaded() {
        let backend = Backend::new(&format!("{WORLD_GEOCODE_SERVER}/"), Duration::from_secs(1)).unwrap();
        assert_eq!(backend.url(), WORLD_GEOCODE_SERVER);
        assert_eq!(backend.load_status(), LoadStatus::NotLoaded);
    }

    #[test]
    fn failed_load_is_cached_until_retry() {
        let (url, hits) = serve("500 Internal Server Error", "{}");
        let backend = Backend::new(&url, Duration::from_secs(5)).unwrap();

        assert_eq!(future::block_on(backend.load()), LoadStatus::FailedToLoad);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert_eq!(future::block_on(backend.load()), LoadStatus::FailedToLoad);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert_eq!(future::block_on(backend.retry_load()), LoadStatus::FailedToLoad);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unreachable_service_fails_to_load() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/GeocodeServer", listener.local_addr().unwrap());
        drop(listener);
        let backend = Backend::new(&url, Duration::from_secs(5)).unwrap();
        assert_eq!(future::block_on(backend.load()), LoadStatus::FailedToLoad);
        assert_eq!(backend.load_status(), LoadStatus::FailedToLoad);
    }

    #[test]
    fn concurrent_loads_share_one_fetch() {
        let (url, hits) = serve("200 OK", SERVICE_INFO);
        let backend = Backend::new(&url, Duration::from_secs(5)).unwrap();

        let (first, second) = future::block_on(future::zip(backend.load(), backend.load()));
        assert_eq!((first, second), (LoadStatus::Loaded, LoadStatus::Loaded));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert_eq!(future::block_on(backend.retry_load()), LoadStatus::Loaded);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn geocode_requires_load() {
        let (url, hits) = serve("200 OK", SERVICE_INFO);
        let backend = Backend::new(&url, Duration::from_secs(5)).unwrap();
        let params = GeocodeParameters::default();
        assert!(future::block_on(backend.geocode("Oslo".into(), &params)).is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}

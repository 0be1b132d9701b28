//! Stand-in for the webserviceX GlobalWeather service.
//!
//! Answers `GetCitiesByCountry` from an in-memory table, wrapping the city
//! dataset as escaped XML inside the result element the way the real .NET
//! service does. Both SOAP 1.1 and 1.2 requests are accepted; the response
//! uses the version of the request.

use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::Response,
    routing::post,
    Router,
};
use quick_xml::{escape::escape, events::Event, Reader};
use tokio::net::TcpListener;

pub const SERVICE_PATH: &str = "/globalweather.asmx";
pub const NAMESPACE: &str = "http://www.webserviceX.NET";
pub const ACTION: &str = "http://www.webserviceX.NET/GetCitiesByCountry";

const SOAP11_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const SOAP12_NS: &str = "http://www.w3.org/2003/05/soap-envelope";

/// Country name → cities, in the order the service returns them. Read-only
/// once the router is built.
pub type Db = Arc<HashMap<String, Vec<String>>>;

pub fn default_cities() -> HashMap<String, Vec<String>> {
    let table: [(&str, &[&str]); 3] = [
        ("France", &["Le Touquet", "Agen", "Cognac", "Brest", "Lyon / Bron"]),
        ("Chile", &["Arica / Chacalluta", "Iquique / Diego Aracena", "Santiago / Pudahuel"]),
        ("Trinidad & Tobago", &["Crown Point", "Piarco International Airport"]),
    ];
    table
        .into_iter()
        .map(|(country, cities)| {
            (
                country.to_string(),
                cities.iter().map(|c| c.to_string()).collect(),
            )
        })
        .collect()
}

pub fn app() -> Router {
    app_with(default_cities())
}

pub fn app_with(cities: HashMap<String, Vec<String>>) -> Router {
    let db: Db = Arc::new(cities);
    Router::new()
        .route(SERVICE_PATH, post(get_cities_by_country))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Soap11,
    Soap12,
}

async fn get_cities_by_country(
    State(db): State<Db>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let dialect = if content_type.starts_with("application/soap+xml") {
        Dialect::Soap12
    } else {
        Dialect::Soap11
    };

    let action = match dialect {
        Dialect::Soap12 => content_type_action(content_type),
        Dialect::Soap11 => headers
            .get("soapaction")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().trim_matches('"').to_string()),
    };
    if action.as_deref() != Some(ACTION) {
        tracing::debug!(?action, "Rejecting request with unexpected action");
        return fault(dialect, "Unable to handle request without a valid action parameter.");
    }

    let country = match country_name(&body) {
        Some(country) => country,
        None => return fault(dialect, "Server was unable to read request. CountryName is missing."),
    };

    let cities = db
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(country.trim()))
        .map(|(name, cities)| (name.as_str(), cities.as_slice()));
    tracing::debug!(%country, found = cities.is_some(), "GetCitiesByCountry");

    soap_response(dialect, StatusCode::OK, &result_envelope(dialect, cities))
}

/// The `action="..."` parameter of a SOAP 1.2 content type.
fn content_type_action(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("action="))
        .map(|v| v.trim_matches('"').to_string())
}

/// Text of the first `CountryName` element in the request envelope.
fn country_name(body: &str) -> Option<String> {
    let mut reader = Reader::from_str(body);
    let mut inside = false;
    let mut value = String::new();
    loop {
        match reader.read_event().ok()? {
            Event::Start(e) if e.local_name().as_ref() == b"CountryName" => inside = true,
            Event::Empty(e) if e.local_name().as_ref() == b"CountryName" => return Some(String::new()),
            Event::Text(e) if inside => value.push_str(&e.unescape().ok()?),
            Event::End(e) if inside && e.local_name().as_ref() == b"CountryName" => return Some(value),
            Event::Eof => return None,
            _ => {}
        }
    }
}

fn dataset(cities: Option<(&str, &[String])>) -> String {
    let Some((country, cities)) = cities.filter(|(_, c)| !c.is_empty()) else {
        return "<NewDataSet />".to_string();
    };
    let mut out = String::from("<NewDataSet>\n");
    for city in cities {
        out.push_str(&format!(
            "  <Table>\n    <Country>{}</Country>\n    <City>{}</City>\n  </Table>\n",
            escape(country),
            escape(city.as_str())
        ));
    }
    out.push_str("</NewDataSet>");
    out
}

fn envelope_ns(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Soap11 => SOAP11_NS,
        Dialect::Soap12 => SOAP12_NS,
    }
}

fn result_envelope(dialect: Dialect, cities: Option<(&str, &[String])>) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="utf-8"?>"#,
            r#"<soap:Envelope xmlns:soap="{ns}" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema">"#,
            r#"<soap:Body><GetCitiesByCountryResponse xmlns="{service}">"#,
            r#"<GetCitiesByCountryResult>{result}</GetCitiesByCountryResult>"#,
            r#"</GetCitiesByCountryResponse></soap:Body></soap:Envelope>"#
        ),
        ns = envelope_ns(dialect),
        service = NAMESPACE,
        result = escape(dataset(cities).as_str()),
    )
}

fn fault(dialect: Dialect, reason: &str) -> Response {
    let detail = match dialect {
        Dialect::Soap12 => format!(
            r#"<soap:Code><soap:Value>soap:Sender</soap:Value></soap:Code><soap:Reason><soap:Text xml:lang="en">{}</soap:Text></soap:Reason>"#,
            escape(reason)
        ),
        Dialect::Soap11 => format!(
            "<faultcode>soap:Client</faultcode><faultstring>{}</faultstring>",
            escape(reason)
        ),
    };
    let body = format!(
        r#"<?xml version="1.0" encoding="utf-8"?><soap:Envelope xmlns:soap="{}"><soap:Body><soap:Fault>{detail}</soap:Fault></soap:Body></soap:Envelope>"#,
        envelope_ns(dialect)
    );
    soap_response(dialect, StatusCode::INTERNAL_SERVER_ERROR, &body)
}

fn soap_response(dialect: Dialect, status: StatusCode, body: &str) -> Response {
    let content_type = match dialect {
        Dialect::Soap11 => "text/xml; charset=utf-8",
        Dialect::Soap12 => "application/soap+xml; charset=utf-8",
    };
    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static(content_type),
    );
    response
}

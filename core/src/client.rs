//! Stateless SOAP request builder and response parser.
//!
//! # Design
//! `SoapClient` holds only the endpoint URL. `build_call` produces an
//! `HttpRequest` for an envelope and `parse_call` consumes the matching
//! `HttpResponse`; the round-trip in between belongs to the caller, so the
//! client itself never blocks.

use crate::envelope::{RequestEnvelope, SoapVersion};
use crate::error::FetchError;
use crate::http::{HttpRequest, HttpResponse};
use crate::response::{decode_envelope, RawResponse};

const USER_AGENT: &str = concat!("cities-soap/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct SoapClient {
    endpoint: String,
}

impl SoapClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.trim().to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build the POST carrying `envelope`, tagged with `action`.
    ///
    /// SOAP 1.2 puts the action in the content type; SOAP 1.1 uses the
    /// `SOAPAction` header.
    pub fn build_call(
        &self,
        envelope: &RequestEnvelope,
        action: &str,
    ) -> Result<HttpRequest, FetchError> {
        let body = envelope.to_xml()?;
        let mut headers = vec![("user-agent".to_string(), USER_AGENT.to_string())];
        match envelope.version {
            SoapVersion::V12 => headers.push((
                "content-type".to_string(),
                format!("application/soap+xml;charset=utf-8;action=\"{action}\""),
            )),
            SoapVersion::V11 => {
                headers.push((
                    "content-type".to_string(),
                    "text/xml;charset=utf-8".to_string(),
                ));
                headers.push(("soapaction".to_string(), format!("\"{action}\"")));
            }
        }
        Ok(HttpRequest {
            url: self.endpoint.clone(),
            headers,
            body,
        })
    }

    /// Decode the response to a `build_call` request.
    ///
    /// 200 and 500 bodies are decoded (a 500 normally carries a SOAP fault,
    /// which surfaces as `MalformedResponse`). Any other status is a
    /// transport failure. A blank body means there is no response.
    pub fn parse_call(&self, response: HttpResponse) -> Result<Option<RawResponse>, FetchError> {
        if response.status != 200 && response.status != 500 {
            return Err(FetchError::TransportFailure(format!(
                "HTTP {}: {}",
                response.status,
                response.body.trim()
            )));
        }
        if response.body.trim().is_empty() {
            if response.status == 500 {
                return Err(FetchError::TransportFailure("HTTP 500 with empty body".to_string()));
            }
            return Ok(None);
        }
        decode_envelope(&response.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::SoapRequestBuilder;

    const ACTION: &str = "http://www.webserviceX.NET/GetCitiesByCountry";

    fn client() -> SoapClient {
        SoapClient::new("http://localhost:3000/globalweather.asmx?WSDL")
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn build_call_soap12_puts_action_in_content_type() {
        let envelope = SoapRequestBuilder::default().build("France").unwrap();
        let req = client().build_call(&envelope, ACTION).unwrap();
        assert_eq!(req.url, "http://localhost:3000/globalweather.asmx?WSDL");
        assert_eq!(
            req.header("content-type"),
            Some(r#"application/soap+xml;charset=utf-8;action="http://www.webserviceX.NET/GetCitiesByCountry""#)
        );
        assert_eq!(req.header("soapaction"), None);
        assert!(req.header("user-agent").unwrap().starts_with("cities-soap/"));
        assert_eq!(req.body, envelope.to_xml().unwrap());
    }

    #[test]
    fn build_call_soap11_uses_soapaction_header() {
        let envelope = SoapRequestBuilder::new(SoapVersion::V11, true)
            .build("France")
            .unwrap();
        let req = client().build_call(&envelope, ACTION).unwrap();
        assert_eq!(req.header("content-type"), Some("text/xml;charset=utf-8"));
        assert_eq!(
            req.header("soapaction"),
            Some(r#""http://www.webserviceX.NET/GetCitiesByCountry""#)
        );
    }

    #[test]
    fn parse_call_success() {
        let body = r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope"><soap:Body><GetCitiesByCountryResponse xmlns="http://www.webserviceX.NET"><GetCitiesByCountryResult>&lt;NewDataSet&gt;&lt;Table&gt;&lt;City&gt;Perth&lt;/City&gt;&lt;/Table&gt;&lt;/NewDataSet&gt;</GetCitiesByCountryResult></GetCitiesByCountryResponse></soap:Body></soap:Envelope>"#;
        let raw = client().parse_call(response(200, body)).unwrap().unwrap();
        assert_eq!(raw.city_names().unwrap(), vec!["Perth"]);
    }

    #[test]
    fn parse_call_empty_body_is_absent() {
        assert_eq!(client().parse_call(response(200, "")).unwrap(), None);
        assert_eq!(client().parse_call(response(200, " \n")).unwrap(), None);
    }

    #[test]
    fn parse_call_unexpected_status() {
        let err = client().parse_call(response(404, "not here")).unwrap_err();
        assert_eq!(
            err,
            FetchError::TransportFailure("HTTP 404: not here".to_string())
        );
    }

    #[test]
    fn parse_call_fault_on_500() {
        let body = r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope"><soap:Body><soap:Fault><soap:Reason><soap:Text>boom</soap:Text></soap:Reason></soap:Fault></soap:Body></soap:Envelope>"#;
        let err = client().parse_call(response(500, body)).unwrap_err();
        assert_eq!(err, FetchError::MalformedResponse("SOAP fault: boom".to_string()));
    }

    #[test]
    fn parse_call_bad_xml() {
        let err = client().parse_call(response(200, "not xml")).unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse(_)));
    }
}

//! SOAP request envelopes for the `GetCitiesByCountry` operation.
//!
//! # Design
//! The request schema is fixed (one string parameter), so it is a plain
//! struct rather than a property bag. `SoapRequestBuilder` holds the
//! envelope settings and stamps a fresh `RequestEnvelope` per query.

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::Deserialize;

use crate::error::FetchError;

pub const NAMESPACE: &str = "http://www.webserviceX.NET";
pub const OPERATION: &str = "GetCitiesByCountry";
pub const COUNTRY_NAME_PARAM: &str = "CountryName";

const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";

/// SOAP protocol version of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum SoapVersion {
    #[serde(rename = "1.1")]
    V11,
    #[default]
    #[serde(rename = "1.2")]
    V12,
}

impl SoapVersion {
    pub fn envelope_namespace(self) -> &'static str {
        match self {
            SoapVersion::V11 => "http://schemas.xmlsoap.org/soap/envelope/",
            SoapVersion::V12 => "http://www.w3.org/2003/05/soap-envelope",
        }
    }

    pub fn encoding_namespace(self) -> &'static str {
        match self {
            SoapVersion::V11 => "http://schemas.xmlsoap.org/soap/encoding/",
            SoapVersion::V12 => "http://www.w3.org/2003/05/soap-encoding",
        }
    }
}

impl FromStr for SoapVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1.1" => Ok(SoapVersion::V11),
            "1.2" => Ok(SoapVersion::V12),
            other => Err(format!("unknown SOAP version '{other}' (expected 1.1 or 1.2)")),
        }
    }
}

impl fmt::Display for SoapVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoapVersion::V11 => write!(f, "1.1"),
            SoapVersion::V12 => write!(f, "1.2"),
        }
    }
}

/// The single-parameter request body of `GetCitiesByCountry`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitiesRequest {
    pub country_name: String,
}

impl CitiesRequest {
    /// Parameters in wire order.
    pub fn parameters(&self) -> [(&'static str, &str); 1] {
        [(COUNTRY_NAME_PARAM, self.country_name.as_str())]
    }
}

/// A fully specified SOAP call, ready to be serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEnvelope {
    pub namespace: String,
    pub operation: String,
    pub request: CitiesRequest,
    /// .NET compatibility: the operation element declares the service
    /// namespace as the default namespace and parameters carry no
    /// `xsi:type` attributes.
    pub dot_net: bool,
    pub version: SoapVersion,
}

impl RequestEnvelope {
    /// The SOAP action URI, `namespace/operation`.
    pub fn action(&self) -> String {
        format!("{}/{}", self.namespace, self.operation)
    }

    /// Serialize the envelope to an XML document.
    pub fn to_xml(&self) -> Result<String, FetchError> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(encode)?;

        let mut envelope = BytesStart::new("v:Envelope");
        envelope.push_attribute(("xmlns:i", XSI_NS));
        envelope.push_attribute(("xmlns:d", XSD_NS));
        envelope.push_attribute(("xmlns:c", self.version.encoding_namespace()));
        envelope.push_attribute(("xmlns:v", self.version.envelope_namespace()));
        writer.write_event(Event::Start(envelope)).map_err(encode)?;
        writer
            .write_event(Event::Empty(BytesStart::new("v:Header")))
            .map_err(encode)?;
        writer
            .write_event(Event::Start(BytesStart::new("v:Body")))
            .map_err(encode)?;

        let op_name = if self.dot_net {
            self.operation.clone()
        } else {
            format!("n0:{}", self.operation)
        };
        let mut op = BytesStart::new(op_name.as_str());
        if self.dot_net {
            op.push_attribute(("xmlns", self.namespace.as_str()));
        } else {
            op.push_attribute(("xmlns:n0", self.namespace.as_str()));
        }
        writer.write_event(Event::Start(op)).map_err(encode)?;

        for (name, value) in self.request.parameters() {
            let mut param = BytesStart::new(name);
            if !self.dot_net {
                param.push_attribute(("i:type", "d:string"));
            }
            writer.write_event(Event::Start(param)).map_err(encode)?;
            writer
                .write_event(Event::Text(BytesText::new(value)))
                .map_err(encode)?;
            writer
                .write_event(Event::End(BytesEnd::new(name)))
                .map_err(encode)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new(op_name.as_str())))
            .map_err(encode)?;
        writer
            .write_event(Event::End(BytesEnd::new("v:Body")))
            .map_err(encode)?;
        writer
            .write_event(Event::End(BytesEnd::new("v:Envelope")))
            .map_err(encode)?;

        String::from_utf8(writer.into_inner().into_inner()).map_err(encode)
    }
}

fn encode(err: impl std::fmt::Display) -> FetchError {
    FetchError::TransportFailure(format!("encoding request: {err}"))
}

/// Builds `GetCitiesByCountry` envelopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapRequestBuilder {
    pub version: SoapVersion,
    pub dot_net: bool,
}

impl Default for SoapRequestBuilder {
    fn default() -> Self {
        Self {
            version: SoapVersion::V12,
            dot_net: true,
        }
    }
}

impl SoapRequestBuilder {
    pub fn new(version: SoapVersion, dot_net: bool) -> Self {
        Self { version, dot_net }
    }

    /// Build the envelope for `query`. Blank queries are rejected with
    /// `FetchError::EmptyInput`; anything else is passed through verbatim.
    pub fn build(&self, query: &str) -> Result<RequestEnvelope, FetchError> {
        if query.trim().is_empty() {
            return Err(FetchError::EmptyInput);
        }
        Ok(RequestEnvelope {
            namespace: NAMESPACE.to_string(),
            operation: OPERATION.to_string(),
            request: CitiesRequest {
                country_name: query.to_string(),
            },
            dot_net: self.dot_net,
            version: self.version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_sets_fixed_operation_and_namespace() {
        let envelope = SoapRequestBuilder::default().build("France").unwrap();
        assert_eq!(envelope.operation, "GetCitiesByCountry");
        assert_eq!(envelope.namespace, "http://www.webserviceX.NET");
        assert_eq!(envelope.request.parameters(), [("CountryName", "France")]);
        assert_eq!(envelope.version, SoapVersion::V12);
        assert!(envelope.dot_net);
        assert_eq!(
            envelope.action(),
            "http://www.webserviceX.NET/GetCitiesByCountry"
        );
    }

    #[test]
    fn build_rejects_blank_query() {
        let builder = SoapRequestBuilder::default();
        assert_eq!(builder.build(""), Err(FetchError::EmptyInput));
        assert_eq!(builder.build("  \t\n"), Err(FetchError::EmptyInput));
    }

    #[test]
    fn build_keeps_query_verbatim() {
        let envelope = SoapRequestBuilder::default().build(" New Zealand ").unwrap();
        assert_eq!(envelope.request.country_name, " New Zealand ");
    }

    #[test]
    fn dot_net_xml_uses_default_namespace() {
        let xml = SoapRequestBuilder::default()
            .build("France")
            .unwrap()
            .to_xml()
            .unwrap();
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="utf-8"?>"#));
        assert!(xml.contains(r#"xmlns:v="http://www.w3.org/2003/05/soap-envelope""#));
        assert!(xml.contains(
            r#"<GetCitiesByCountry xmlns="http://www.webserviceX.NET"><CountryName>France</CountryName></GetCitiesByCountry>"#
        ));
        assert!(xml.contains("<v:Header/>"));
        assert!(xml.ends_with("</v:Body></v:Envelope>"));
    }

    #[test]
    fn plain_xml_uses_prefix_and_type_attributes() {
        let xml = SoapRequestBuilder::new(SoapVersion::V11, false)
            .build("Chile")
            .unwrap()
            .to_xml()
            .unwrap();
        assert!(xml.contains(r#"xmlns:v="http://schemas.xmlsoap.org/soap/envelope/""#));
        assert!(xml.contains(r#"<n0:GetCitiesByCountry xmlns:n0="http://www.webserviceX.NET">"#));
        assert!(xml.contains(r#"<CountryName i:type="d:string">Chile</CountryName>"#));
    }

    #[test]
    fn query_text_is_escaped() {
        let xml = SoapRequestBuilder::default()
            .build("Trinidad & <Tobago>")
            .unwrap()
            .to_xml()
            .unwrap();
        assert!(xml.contains("<CountryName>Trinidad &amp; &lt;Tobago&gt;</CountryName>"));
    }

    #[test]
    fn version_parse() {
        assert_eq!("1.1".parse::<SoapVersion>(), Ok(SoapVersion::V11));
        assert_eq!(" 1.2 ".parse::<SoapVersion>(), Ok(SoapVersion::V12));
        assert!("2.0".parse::<SoapVersion>().is_err());
        assert_eq!(SoapVersion::V11.to_string(), "1.1");
    }
}

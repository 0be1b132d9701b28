//! Decoding of SOAP response envelopes.
//!
//! `decode_envelope` turns the response XML into a [`RawResponse`]: the first
//! element inside `Body` and its direct children as name/value pairs. A
//! property holding child elements keeps them as re-serialized markup. The
//! webserviceX result is an XML dataset, usually escaped, which
//! [`RawResponse::city_names`] reads in a second pass.

use std::fmt;

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::FetchError;

/// The decoded operation response object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub name: String,
    pub properties: Vec<(String, String)>,
}

impl RawResponse {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// The operation result: the first property of the response object.
    pub fn result(&self) -> Option<&str> {
        self.properties.first().map(|(_, v)| v.as_str())
    }

    /// City names from the `<NewDataSet><Table><City>` document carried in
    /// the result, in document order. Blank names are skipped.
    pub fn city_names(&self) -> Result<Vec<String>, FetchError> {
        let dataset = match self.result() {
            Some(text) if !text.trim().is_empty() => text,
            _ => return Ok(Vec::new()),
        };

        let mut reader = Reader::from_str(dataset);
        let mut cities = Vec::new();
        let mut depth = 0usize;
        let mut city: Option<String> = None;

        loop {
            match reader.read_event().map_err(FetchError::malformed)? {
                Event::Start(e) => {
                    depth += 1;
                    if e.local_name().as_ref() == b"City" {
                        city = Some(String::new());
                    }
                }
                Event::End(e) => {
                    depth = depth.saturating_sub(1);
                    if e.local_name().as_ref() == b"City" {
                        if let Some(name) = city.take() {
                            let name = name.trim();
                            if !name.is_empty() {
                                cities.push(name.to_string());
                            }
                        }
                    }
                }
                Event::Text(e) => {
                    if let Some(name) = city.as_mut() {
                        name.push_str(&e.unescape().map_err(FetchError::malformed)?);
                    }
                }
                Event::CData(e) => {
                    if let Some(name) = city.as_mut() {
                        name.push_str(&String::from_utf8_lossy(&e));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if depth != 0 {
            return Err(FetchError::malformed("city dataset ended inside an element"));
        }
        Ok(cities)
    }
}

/// Renders as `name{key=value; key=value; }`.
impl fmt::Display for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.name)?;
        for (key, value) in &self.properties {
            write!(f, "{key}={value}; ")?;
        }
        write!(f, "}}")
    }
}

/// Decode a SOAP 1.1 or 1.2 response envelope.
///
/// Returns `Ok(None)` when the `Body` is empty, and `MalformedResponse` for
/// XML errors, a missing `Envelope`/`Body`, or a `Fault`.
pub fn decode_envelope(xml: &str) -> Result<Option<RawResponse>, FetchError> {
    let mut reader = Reader::from_str(xml);
    let mut decoder = EnvelopeDecoder::default();

    loop {
        match reader.read_event().map_err(FetchError::malformed)? {
            Event::Start(e) => {
                decoder.nested_markup(&format!("<{}>", utf8(&e)?));
                decoder.open(utf8(e.local_name().as_ref())?)?;
            }
            Event::Empty(e) => {
                decoder.nested_markup(&format!("<{}/>", utf8(&e)?));
                decoder.open(utf8(e.local_name().as_ref())?)?;
                decoder.close();
            }
            Event::End(e) => {
                decoder.close();
                decoder.nested_markup(&format!("</{}>", utf8(e.name().as_ref())?));
            }
            Event::Text(e) => decoder.text(&e.unescape().map_err(FetchError::malformed)?),
            Event::CData(e) => decoder.cdata(&String::from_utf8_lossy(&e)),
            Event::Eof => break,
            _ => {}
        }
    }

    decoder.finish()
}

fn utf8(bytes: &[u8]) -> Result<&str, FetchError> {
    std::str::from_utf8(bytes).map_err(FetchError::malformed)
}

/// Depth 0 is `Envelope`, 1 is `Header`/`Body`, 2 the response object
/// (or `Fault`), 3 its properties. Anything deeper belongs to a property
/// value.
#[derive(Default)]
struct EnvelopeDecoder {
    depth: usize,
    saw_body: bool,
    in_body: bool,
    capturing: bool,
    fault: Option<Vec<String>>,
    response: Option<RawResponse>,
    property: Option<(String, String)>,
    /// The open property has child elements; its value is markup.
    nested: bool,
}

impl EnvelopeDecoder {
    fn open(&mut self, name: &str) -> Result<(), FetchError> {
        match self.depth {
            0 if name != "Envelope" => {
                return Err(FetchError::malformed(format!(
                    "expected SOAP Envelope, found <{name}>"
                )));
            }
            1 if name == "Body" => {
                self.saw_body = true;
                self.in_body = true;
            }
            2 if self.in_body => {
                if name == "Fault" {
                    self.fault.get_or_insert_with(Vec::new);
                } else if self.response.is_none() {
                    self.response = Some(RawResponse::new(name));
                    self.capturing = true;
                }
            }
            3 if self.capturing => {
                self.property = Some((name.to_string(), String::new()));
                self.nested = false;
            }
            _ => {}
        }
        self.depth += 1;
        Ok(())
    }

    fn close(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        match self.depth {
            1 => self.in_body = false,
            2 => self.capturing = false,
            3 => {
                if let (Some(property), Some(response)) =
                    (self.property.take(), self.response.as_mut())
                {
                    response.properties.push(property);
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if !self.in_body {
            return;
        }
        if let Some(fault) = self.fault.as_mut() {
            let text = text.trim();
            if !text.is_empty() {
                fault.push(text.to_string());
            }
        } else if let Some((_, value)) = self.property.as_mut() {
            if self.nested {
                value.push_str(&escape(text));
            } else {
                value.push_str(text);
            }
        }
    }

    fn cdata(&mut self, text: &str) {
        if self.nested && self.fault.is_none() {
            if let Some((_, value)) = self.property.as_mut() {
                value.push_str(&format!("<![CDATA[{text}]]>"));
                return;
            }
        }
        self.text(text);
    }

    /// Append a tag to the open property when it sits below the property
    /// element. Text collected before the first child is re-escaped so the
    /// whole value stays well-formed.
    fn nested_markup(&mut self, markup: &str) {
        if self.depth < 4 {
            return;
        }
        if let Some((_, value)) = self.property.as_mut() {
            if !self.nested {
                *value = escape(value.as_str()).into_owned();
                self.nested = true;
            }
            value.push_str(markup);
        }
    }

    fn finish(self) -> Result<Option<RawResponse>, FetchError> {
        if self.depth != 0 {
            return Err(FetchError::malformed("envelope ended inside an element"));
        }
        if !self.saw_body {
            return Err(FetchError::malformed("missing SOAP Body"));
        }
        if let Some(fault) = self.fault {
            return Err(FetchError::MalformedResponse(format!(
                "SOAP fault: {}",
                fault.join(" ")
            )));
        }
        Ok(self.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRANCE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope">
  <soap:Body>
    <GetCitiesByCountryResponse xmlns="http://www.webserviceX.NET">
      <GetCitiesByCountryResult>&lt;NewDataSet&gt;
  &lt;Table&gt;
    &lt;Country&gt;France&lt;/Country&gt;
    &lt;City&gt;Le Touquet&lt;/City&gt;
  &lt;/Table&gt;
  &lt;Table&gt;
    &lt;Country&gt;France&lt;/Country&gt;
    &lt;City&gt;Agen&lt;/City&gt;
  &lt;/Table&gt;
&lt;/NewDataSet&gt;</GetCitiesByCountryResult>
    </GetCitiesByCountryResponse>
  </soap:Body>
</soap:Envelope>"#;

    #[test]
    fn decodes_response_object() {
        let raw = decode_envelope(FRANCE).unwrap().unwrap();
        assert_eq!(raw.name, "GetCitiesByCountryResponse");
        assert_eq!(raw.properties.len(), 1);
        assert_eq!(raw.properties[0].0, "GetCitiesByCountryResult");
        assert!(raw
            .property("GetCitiesByCountryResult")
            .unwrap()
            .starts_with("<NewDataSet>"));
    }

    #[test]
    fn city_names_in_server_order() {
        let raw = decode_envelope(FRANCE).unwrap().unwrap();
        assert_eq!(raw.city_names().unwrap(), vec!["Le Touquet", "Agen"]);
    }

    #[test]
    fn empty_body_is_absent() {
        let xml = r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope"><s:Body/></s:Envelope>"#;
        assert_eq!(decode_envelope(xml).unwrap(), None);
    }

    #[test]
    fn header_is_ignored() {
        let xml = r#"<s:Envelope xmlns:s="x"><s:Header><Trace>abc</Trace></s:Header><s:Body><R><V>1</V></R></s:Body></s:Envelope>"#;
        let raw = decode_envelope(xml).unwrap().unwrap();
        assert_eq!(raw.name, "R");
        assert_eq!(raw.properties, vec![("V".to_string(), "1".to_string())]);
    }

    #[test]
    fn fault_is_malformed() {
        let xml = r#"<s:Envelope xmlns:s="x"><s:Body><s:Fault><s:Code><s:Value>s:Receiver</s:Value></s:Code><s:Reason><s:Text>Server was unable to process request.</s:Text></s:Reason></s:Fault></s:Body></s:Envelope>"#;
        let err = decode_envelope(xml).unwrap_err();
        assert_eq!(
            err,
            FetchError::MalformedResponse(
                "SOAP fault: s:Receiver Server was unable to process request.".to_string()
            )
        );
    }

    #[test]
    fn non_envelope_root_is_malformed() {
        let err = decode_envelope("<html><body>503</body></html>").unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse(_)));
    }

    #[test]
    fn plain_text_is_malformed() {
        let err = decode_envelope("Service Unavailable").unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse(_)));
    }

    #[test]
    fn mismatched_tags_are_malformed() {
        let err = decode_envelope("<s:Envelope><s:Body></s:Envelope>").unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse(_)));
    }

    #[test]
    fn display_matches_property_bag_form() {
        let mut raw = RawResponse::new("GetCitiesByCountryResponse");
        raw.properties
            .push(("GetCitiesByCountryResult".to_string(), "<NewDataSet />".to_string()));
        assert_eq!(
            raw.to_string(),
            "GetCitiesByCountryResponse{GetCitiesByCountryResult=<NewDataSet />; }"
        );
        assert_eq!(RawResponse::new("Empty").to_string(), "Empty{}");
    }

    #[test]
    fn empty_dataset_has_no_cities() {
        let mut raw = RawResponse::new("GetCitiesByCountryResponse");
        raw.properties
            .push(("GetCitiesByCountryResult".to_string(), "<NewDataSet />".to_string()));
        assert!(raw.city_names().unwrap().is_empty());
        assert!(RawResponse::new("R").city_names().unwrap().is_empty());
    }

    #[test]
    fn broken_dataset_is_malformed() {
        let mut raw = RawResponse::new("GetCitiesByCountryResponse");
        raw.properties.push((
            "GetCitiesByCountryResult".to_string(),
            "<NewDataSet><Table><City>Agen</Table>".to_string(),
        ));
        assert!(matches!(
            raw.city_names(),
            Err(FetchError::MalformedResponse(_))
        ));
    }

    const FRANCE_INLINE: &str = r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope"><s:Body><GetCitiesByCountryResponse xmlns="http://www.webserviceX.NET"><GetCitiesByCountryResult><NewDataSet><Table><Country>France</Country><City>Agen</City></Table><Table><Country>France</Country><City>Brest &amp; Co</City></Table></NewDataSet></GetCitiesByCountryResult></GetCitiesByCountryResponse></s:Body></s:Envelope>"#;

    #[test]
    fn inline_dataset_keeps_its_markup() {
        let raw = decode_envelope(FRANCE_INLINE).unwrap().unwrap();
        assert_eq!(raw.properties.len(), 1);
        assert_eq!(
            raw.result().unwrap(),
            "<NewDataSet><Table><Country>France</Country><City>Agen</City></Table>\
             <Table><Country>France</Country><City>Brest &amp; Co</City></Table></NewDataSet>"
        );
        assert_eq!(raw.city_names().unwrap(), vec!["Agen", "Brest & Co"]);
    }

    #[test]
    fn inline_dataset_formats_as_list() {
        use crate::format::{DisplayMode, DisplayResult, ResponseFormatter};

        let raw = decode_envelope(FRANCE_INLINE).unwrap().unwrap();
        let result = ResponseFormatter::format(DisplayMode::List, Some(&raw)).unwrap();
        assert_eq!(
            result,
            DisplayResult::Cities(vec!["Agen".to_string(), "Brest & Co".to_string()])
        );
    }

    #[test]
    fn nested_empty_and_cdata_children_are_kept() {
        let xml = r#"<s:Envelope xmlns:s="x"><s:Body><R><V>a &lt; b<W/><X><![CDATA[1 < 2]]></X></V><U>plain</U></R></s:Body></s:Envelope>"#;
        let raw = decode_envelope(xml).unwrap().unwrap();
        assert_eq!(
            raw.properties,
            vec![
                ("V".to_string(), "a &lt; b<W/><X><![CDATA[1 < 2]]></X>".to_string()),
                ("U".to_string(), "plain".to_string()),
            ]
        );
    }

    #[test]
    fn blank_city_entries_are_skipped() {
        let mut raw = RawResponse::new("R");
        raw.properties.push((
            "Result".to_string(),
            "<NewDataSet><Table><City> </City></Table><Table><City> Lyon </City></Table></NewDataSet>"
                .to_string(),
        ));
        assert_eq!(raw.city_names().unwrap(), vec!["Lyon"]);
    }
}

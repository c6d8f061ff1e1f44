//! IMS "Plain Old XML" envelopes for LTI 1.1 Basic Outcomes.
//!
//! Only `replaceResultRequest` is built. Responses are read by tag name
//! rather than with a full XML parser; LMS responses are small and the
//! three status fields have fixed tag names.

pub const CONTENT_TYPE: &str = "application/xml";

const NAMESPACE: &str = "http://www.imsglobal.org/services/ltiv1p1/xsd/imsoms_v1p0";

/// Escape text for inclusion in an XML element body.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Build a `replaceResultRequest` body.
pub fn replace_result_request(message_id: &str, sourcedid: &str, score: f64) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<imsx_POXEnvelopeRequest xmlns="{ns}">
  <imsx_POXHeader>
    <imsx_POXRequestHeaderInfo>
      <imsx_version>V1.0</imsx_version>
      <imsx_messageIdentifier>{id}</imsx_messageIdentifier>
    </imsx_POXRequestHeaderInfo>
  </imsx_POXHeader>
  <imsx_POXBody>
    <replaceResultRequest>
      <resultRecord>
        <sourcedGUID>
          <sourcedId>{sourcedid}</sourcedId>
        </sourcedGUID>
        <result>
          <resultScore>
            <language>en</language>
            <textString>{score}</textString>
          </resultScore>
        </result>
      </resultRecord>
    </replaceResultRequest>
  </imsx_POXBody>
</imsx_POXEnvelopeRequest>
"#,
        ns = NAMESPACE,
        id = escape(message_id),
        sourcedid = escape(sourcedid),
        score = score,
    )
}

/// Status block of a POX response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoxStatus {
    pub code_major: Option<String>,
    pub severity: Option<String>,
    pub description: Option<String>,
}

impl PoxStatus {
    pub fn is_success(&self) -> bool {
        self.code_major.as_deref() == Some("success")
    }
}

/// Text of the first `<tag>` element, tolerating a namespace prefix
/// (`<ims:tag>`) and attributes.
fn element_text(xml: &str, tag: &str) -> Option<String> {
    let mut search = xml;
    loop {
        let lt = search.find('<')?;
        let rest = &search[lt + 1..];
        let name_end = rest.find(|c: char| c == '>' || c == '/' || c.is_whitespace())?;
        let name = &rest[..name_end];
        let local = name.rsplit(':').next().unwrap_or(name);
        if local == tag {
            let open_end = rest.find('>')?;
            if rest[..open_end].ends_with('/') {
                return Some(String::new());
            }
            let body = &rest[open_end + 1..];
            let close = format!("</{}>", name);
            let end = body.find(&close)?;
            return Some(unescape(body[..end].trim()));
        }
        search = rest;
    }
}

/// Read the `imsx_statusInfo` fields out of a response body.
pub fn parse_status(xml: &str) -> PoxStatus {
    PoxStatus {
        code_major: element_text(xml, "imsx_codeMajor"),
        severity: element_text(xml, "imsx_severity"),
        description: element_text(xml, "imsx_description"),
    }
}

//! SOAP action argument builder.
//!
//! Action parameters become child elements of the action element. Text
//! values are escaped; raw values are inserted verbatim for the structured
//! actions whose arguments are themselves (entity-encoded) XML fragments.

enum ArgValue {
    Text(String),
    Raw(String),
}

/// Ordered argument list for a SOAP action.
///
/// ```
/// use wemo_api::SoapArgs;
///
/// let payload = SoapArgs::new()
///     .text("BinaryState", "1")
///     .to_payload();
/// assert_eq!(payload, "<BinaryState>1</BinaryState>");
/// ```
#[derive(Default)]
pub struct SoapArgs {
    args: Vec<(String, ArgValue)>,
}

impl SoapArgs {
    /// Create an empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a text argument; the value is XML-escaped on serialization.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.push((name.into(), ArgValue::Text(value.into())));
        self
    }

    /// Append a raw argument inserted without escaping.
    ///
    /// The caller is responsible for the fragment being well-formed in
    /// place, e.g. already entity-encoded bridge status payloads.
    pub fn raw(mut self, name: impl Into<String>, fragment: impl Into<String>) -> Self {
        self.args.push((name.into(), ArgValue::Raw(fragment.into())));
        self
    }

    /// Whether no arguments have been added.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Serialize the arguments as the action element's inner XML.
    pub fn to_payload(&self) -> String {
        let mut payload = String::new();
        for (name, value) in &self.args {
            payload.push('<');
            payload.push_str(name);
            payload.push('>');
            match value {
                ArgValue::Text(text) => payload.push_str(&xml_escape(text)),
                ArgValue::Raw(fragment) => payload.push_str(fragment),
            }
            payload.push_str("</");
            payload.push_str(name);
            payload.push('>');
        }
        payload
    }
}

/// Escape a string for use as XML text content.
pub(crate) fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

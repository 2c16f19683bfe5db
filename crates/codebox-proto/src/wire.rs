use std::fmt;

/// Separator between the command code and each field.
///
/// Fields are not escaped. A plain field (email, path) containing this
/// character corrupts the frame; base64 and JSON fields never contain it.
pub const FIELD_SEPARATOR: char = '~';

/// One frame on the wire, before any per-field decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    code: String,
    fields: Vec<String>,
}

impl WireMessage {
    pub fn new(code: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            code: code.into(),
            fields,
        }
    }

    pub fn bare(code: impl Into<String>) -> Self {
        Self::new(code, Vec::new())
    }

    /// Splits a raw frame. Never fails: an empty or short field list is
    /// passed through and typed decoding checks field indices.
    pub fn decode(raw: &str) -> Self {
        let mut segments = raw.split(FIELD_SEPARATOR);
        let code = segments.next().unwrap_or_default().to_string();
        let fields = segments.map(str::to_string).collect();
        Self { code, fields }
    }

    pub fn encode(&self) -> String {
        let capacity = self.code.len() + self.fields.iter().map(|f| f.len() + 1).sum::<usize>();
        let mut out = String::with_capacity(capacity);
        out.push_str(&self.code);
        for field in &self.fields {
            out.push(FIELD_SEPARATOR);
            out.push_str(field);
        }
        out
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }
}

impl fmt::Display for WireMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_timeout::timeout]
    fn decode_splits_code_and_fields() {
        let msg = WireMessage::decode("LOGN~user@x.com~pw1");
        assert_eq!(msg.code(), "LOGN");
        assert_eq!(msg.fields(), ["user@x.com", "pw1"]);
    }

    #[test_timeout::timeout]
    fn decode_tolerates_short_frames() {
        let empty = WireMessage::decode("");
        assert_eq!(empty.code(), "");
        assert!(empty.fields().is_empty());

        let bare = WireMessage::decode("SAVR");
        assert_eq!(bare.code(), "SAVR");
        assert_eq!(bare.field(0), None);

        let trailing = WireMessage::decode("OUTP~");
        assert_eq!(trailing.field(0), Some(""));
    }

    #[test_timeout::timeout]
    fn reencoding_restores_frames_without_separators_in_fields() {
        for raw in [
            "REGR",
            "LOGR~[]",
            "SAVF~{\"path\":\"a/b.py\",\"content\":\"x = 1\"}",
            "ERRR~301",
            "DONE~0",
            "OUTP~aGVsbG8K",
            "A~~B",
        ] {
            assert_eq!(WireMessage::decode(raw).encode(), raw);
        }
    }

    #[test_timeout::timeout]
    fn separator_inside_plain_field_splits_the_field() {
        let sent = WireMessage::new("RUNF", vec!["odd~name.py".to_string()]);
        let received = WireMessage::decode(&sent.encode());
        assert_eq!(received.fields(), ["odd", "name.py"]);
    }
}

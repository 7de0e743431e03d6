//! Payload codec
//!
//! Maps an [`Identifier`] to the records written on a tag and back:
//! - one URL record `{scheme}://{host}{path}?item_tag_id=..&type=..`
//! - for staff tags, one extra platform-hint record naming the app package
//!
//! Decoding keeps only URL records whose scheme and host match the
//! configured profile; anything other than exactly one match is "no usable
//! record".

pub mod ndef;
pub mod uri;

pub use ndef::{CodecError, NdefMessage, NdefRecord, Tnf};

use crate::identifier::{Identifier, Role};
use qtag_common::config::{
    RecordConfig, DEFAULT_ANDROID_PACKAGE, DEFAULT_HOST, DEFAULT_PATH, DEFAULT_SCHEME,
};
use url::{form_urlencoded, Url};

/// Query field carrying the opaque slot identifier
pub const ID_FIELD: &str = "item_tag_id";

/// Query field carrying the role token
pub const TYPE_FIELD: &str = "type";

/// Fixed application constants used to build and recognise records
///
/// Scheme, host and path are stored in the normalised form the URL parser
/// produces, so records written with a profile always decode with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordProfile {
    scheme: String,
    host: String,
    path: String,
    android_package: String,
}

impl Default for RecordProfile {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_string(),
            host: DEFAULT_HOST.to_string(),
            path: DEFAULT_PATH.to_string(),
            android_package: DEFAULT_ANDROID_PACKAGE.to_string(),
        }
    }
}

impl TryFrom<&RecordConfig> for RecordProfile {
    type Error = CodecError;

    fn try_from(config: &RecordConfig) -> Result<Self, Self::Error> {
        let base = config
            .parse_base_url()
            .map_err(|e| CodecError::InvalidProfile(e.to_string()))?;
        Ok(Self {
            scheme: base.scheme().to_string(),
            host: base.host_str().unwrap_or_default().to_string(),
            path: base.path().to_string(),
            android_package: config.android_package.clone(),
        })
    }
}

impl RecordProfile {
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn android_package(&self) -> &str {
        &self.android_package
    }

    fn matches(&self, url: &Url) -> bool {
        url.scheme() == self.scheme && url.host_str() == Some(self.host.as_str())
    }
}

/// Query fields extracted from the single matching URL record
///
/// Missing fields are left empty; the classifier decides what that means.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedFields {
    pub id: String,
    pub role_token: String,
}

/// Encode an identifier into the records written on a tag
///
/// Returns one record for `Secondary`, two for `Primary`.
pub fn encode(identifier: &Identifier, profile: &RecordProfile) -> NdefMessage {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair(ID_FIELD, &identifier.id)
        .append_pair(TYPE_FIELD, identifier.role.token())
        .finish();
    let uri = format!("{}://{}{}?{}", profile.scheme, profile.host, profile.path, query);

    let mut records = vec![NdefRecord::uri(&uri)];
    if identifier.role == Role::Primary {
        records.push(NdefRecord::android_application(&profile.android_package));
    }
    NdefMessage::new(records)
}

/// Decode a scanned record set into query fields
///
/// Returns `None` unless exactly one record is a URL with the profile's
/// scheme and host.
pub fn decode(records: &[NdefRecord], profile: &RecordProfile) -> Option<DecodedFields> {
    let mut matching = records
        .iter()
        .filter_map(NdefRecord::uri_content)
        .filter_map(|content| Url::parse(&content).ok())
        .filter(|url| profile.matches(url));

    let url = matching.next()?;
    if matching.next().is_some() {
        return None;
    }

    let mut fields = DecodedFields::default();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            ID_FIELD if fields.id.is_empty() => fields.id = value.into_owned(),
            TYPE_FIELD if fields.role_token.is_empty() => fields.role_token = value.into_owned(),
            _ => {}
        }
    }
    Some(fields)
}

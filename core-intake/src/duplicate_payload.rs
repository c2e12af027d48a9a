//! Duplicate-candidate payload carried in a remote task's error text.
//!
//! Format: `DUPLICATE_CANDIDATE|id=<v>|name=<v>[|phone=<v>][|email=<v>]`,
//! values percent-encoded. The backend may prefix the marker with free text,
//! for example `Parse aborted: DUPLICATE_CANDIDATE|id=42|name=%E5%BC%A0%E4%B8%89`.

use std::borrow::Cow;

use crate::item::DuplicateInfo;

/// Marks the start of an encoded duplicate payload.
pub const DUPLICATE_MARKER: &str = "DUPLICATE_CANDIDATE";

const FIELD_SEPARATOR: char = '|';

/// Encode duplicate details in the wire format.
pub fn encode_duplicate_error_payload(info: &DuplicateInfo) -> String {
    let mut encoded = format!(
        "{DUPLICATE_MARKER}|id={}|name={}",
        urlencoding::encode(&info.candidate_id),
        urlencoding::encode(&info.candidate_name)
    );
    if let Some(phone) = &info.candidate_phone {
        encoded.push_str("|phone=");
        encoded.push_str(&urlencoding::encode(phone));
    }
    if let Some(email) = &info.candidate_email {
        encoded.push_str("|email=");
        encoded.push_str(&urlencoding::encode(email));
    }
    encoded
}

/// Decode duplicate details from remote error text.
///
/// Returns `None` when the marker is absent or `id`/`name` are missing.
/// Unknown keys are ignored.
pub fn parse_duplicate_error_payload(text: &str) -> Option<DuplicateInfo> {
    let start = text.find(DUPLICATE_MARKER)?;
    let payload = text[start + DUPLICATE_MARKER.len()..].lines().next()?;

    let mut id = None;
    let mut name = None;
    let mut phone = None;
    let mut email = None;

    for field in payload.split(FIELD_SEPARATOR).skip(1) {
        let Some((key, value)) = field.split_once('=') else {
            continue;
        };
        let slot = match key.trim() {
            "id" => &mut id,
            "name" => &mut name,
            "phone" => &mut phone,
            "email" => &mut email,
            _ => continue,
        };
        let value = decode(value.trim())?;
        if !value.is_empty() {
            *slot = Some(value);
        }
    }

    Some(DuplicateInfo {
        candidate_id: id?,
        candidate_name: name?,
        candidate_phone: phone,
        candidate_email: email,
    })
}

fn decode(value: &str) -> Option<String> {
    urlencoding::decode(value).ok().map(Cow::into_owned)
}

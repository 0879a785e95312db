// # AliDNS Request Signing
//
// RPC-style signature, version 1.0:
//
// 1. Percent-encode every parameter name and value (RFC 3986 unreserved
//    characters stay as-is, space becomes `%20`)
// 2. Sort by name and join as `k=v&k=v`
// 3. `StringToSign = METHOD & %2F & encode(canonical)`
// 4. `Signature = base64(HMAC-SHA1(secret + "&", StringToSign))`

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sha1::Sha1;
use std::collections::BTreeMap;
use uddns_core::{Error, Result};

const RFC3986: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn encode(raw: &str) -> String {
    utf8_percent_encode(raw, RFC3986).to_string()
}

/// Canonical string for `method` over `params`
pub(crate) fn string_to_sign(method: &str, params: &BTreeMap<String, String>) -> String {
    let canonical = params
        .iter()
        .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}&{}&{}", method, encode("/"), encode(&canonical))
}

/// Base64 HMAC-SHA1 of `string_to_sign`, keyed with `secret&`
pub(crate) fn sign(string_to_sign: &str, secret: &str) -> Result<String> {
    let mut mac = Hmac::<Sha1>::new_from_slice(format!("{}&", secret).as_bytes())
        .map_err(|e| Error::config(format!("aliyun: unusable access key secret: {}", e)))?;
    mac.update(string_to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn documented_request() -> BTreeMap<String, String> {
        [
            ("Format", "XML"),
            ("AccessKeyId", "testid"),
            ("Action", "DescribeDomainRecords"),
            ("SignatureMethod", "HMAC-SHA1"),
            ("DomainName", "example.com"),
            ("SignatureNonce", "f59ed6a9-83fc-473b-9cc6-99c95df3856e"),
            ("SignatureVersion", "1.0"),
            ("Version", "2015-01-09"),
            ("Timestamp", "2016-03-24T16:41:54Z"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn string_to_sign_is_sorted_and_double_encoded() {
        assert_eq!(
            string_to_sign("GET", &documented_request()),
            "GET&%2F&AccessKeyId%3Dtestid%26Action%3DDescribeDomainRecords\
             %26DomainName%3Dexample.com%26Format%3DXML%26SignatureMethod%3DHMAC-SHA1\
             %26SignatureNonce%3Df59ed6a9-83fc-473b-9cc6-99c95df3856e\
             %26SignatureVersion%3D1.0%26Timestamp%3D2016-03-24T16%253A41%253A54Z\
             %26Version%3D2015-01-09"
        );
    }

    #[test]
    fn matches_published_signature() {
        let sts = string_to_sign("GET", &documented_request());
        assert_eq!(sign(&sts, "testsecret").unwrap(), "uRpHwaSEt3J+6KQD//svCh/x+pI=");
    }

    #[test]
    fn space_and_star_are_encoded() {
        assert_eq!(encode("a b*c~d"), "a%20b%2Ac~d");
    }
}

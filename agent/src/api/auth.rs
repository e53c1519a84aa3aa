/*
 * Copyright 2026 Backup Agent Contributors
 */

//! Constant-time HTTP Basic Auth check, so a timing side channel never
//! narrows down the configured credentials byte by byte.

use hyper::header::AUTHORIZATION;

use super::prelude::*;

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

fn decode_basic(header_value: &str) -> Option<(String, String)> {
    let rest = header_value.strip_prefix("Basic ")?;
    let decoded = base64_decode(rest.trim())?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, pass) = text.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// Minimal RFC 4648 base64 decoder: Basic Auth payloads are small and
/// this avoids pulling in a dedicated base64 crate for one call site.
fn base64_decode(input: &str) -> Option<Vec<u8>> {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut lut = [255u8; 256];
    for (i, &c) in ALPHABET.iter().enumerate() {
        lut[c as usize] = i as u8;
    }

    let clean: Vec<u8> = input.bytes().filter(|&b| b != b'=').collect();
    let mut out = Vec::with_capacity(clean.len() * 3 / 4 + 3);
    for chunk in clean.chunks(4) {
        let mut buf = [0u8; 4];
        for (i, &c) in chunk.iter().enumerate() {
            let v = lut[c as usize];
            if v == 255 {
                return None;
            }
            buf[i] = v;
        }
        let n = chunk.len();
        out.push((buf[0] << 2) | (buf[1] >> 4));
        if n > 2 {
            out.push((buf[1] << 4) | (buf[2] >> 2));
        }
        if n > 3 {
            out.push((buf[2] << 6) | buf[3]);
        }
    }
    Some(out)
}

/// Require valid Basic Auth credentials against the configured
/// username/password, comparing in constant time.
pub(crate) fn check(central: &Central, rqctx: &RequestContext<Arc<Central>>) -> DSResult<()> {
    let header = rqctx
        .request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let Some(header) = header else {
        return unauth_response();
    };

    let Some((user, pass)) = decode_basic(header) else {
        return unauth_response();
    };

    let user_ok = constant_time_eq(user.as_bytes(), central.config.client_username.as_bytes());
    let pass_ok = constant_time_eq(pass.as_bytes(), central.config.client_password.as_bytes());

    if user_ok && pass_ok {
        Ok(())
    } else {
        unauth_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_known_header() {
        let decoded = base64_decode("YWRtaW46aHVudGVyMg==").unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "admin:hunter2");
    }

    #[test]
    fn decode_basic_splits_user_and_password() {
        let (user, pass) = decode_basic("Basic YWRtaW46aHVudGVyMg==").unwrap();
        assert_eq!(user, "admin");
        assert_eq!(pass, "hunter2");
    }

    #[test]
    fn constant_time_eq_rejects_different_lengths() {
        assert!(!constant_time_eq(b"abc", b"ab"));
    }

    #[test]
    fn constant_time_eq_matches_equal_bytes() {
        assert!(constant_time_eq(b"abc", b"abc"));
    }

    #[test]
    fn decode_basic_rejects_non_basic_scheme() {
        assert!(decode_basic("Bearer abc").is_none());
    }
}

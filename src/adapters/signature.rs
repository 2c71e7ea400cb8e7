use {
    crate::domain::error::PipelineError,
    chrono::{DateTime, Utc},
    hmac::{Hmac, Mac},
    sha2::Sha256,
    std::time::Duration,
    subtle::ConstantTimeEq,
};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-signature";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Parsed `X-Signature: ts=<unix>,v1=<hex-hmac>` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub ts: i64,
    pub v1: String,
}

impl SignatureHeader {
    pub fn parse(raw: &str) -> Result<Self, PipelineError> {
        let mut ts = None;
        let mut v1 = None;

        for part in raw.split(',') {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            match key.trim() {
                "ts" => {
                    ts = Some(value.trim().parse::<i64>().map_err(|_| {
                        PipelineError::Signature("non-numeric ts in signature header".into())
                    })?);
                }
                "v1" => v1 = Some(value.trim().to_string()),
                _ => {}
            }
        }

        match (ts, v1) {
            (Some(ts), Some(v1)) if !v1.is_empty() => Ok(Self { ts, v1 }),
            _ => Err(PipelineError::Signature(
                "signature header missing ts or v1".into(),
            )),
        }
    }
}

/// HMAC verifier for inbound webhook notifications.
///
/// The processor signs a manifest string, not the body:
/// `id:<data.id>;request-id:<x-request-id>;ts:<ts>;` with the data id
/// lowercased. Verification recomputes the digest with the shared secret
/// and compares constant-time, then rejects timestamps outside the
/// freshness window — a matching digest on a stale request is a replay.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: String,
    freshness_window: Duration,
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<String>, freshness_window: Duration) -> Self {
        Self {
            secret: secret.into(),
            freshness_window,
        }
    }

    pub fn manifest(data_id: &str, request_id: &str, ts: i64) -> String {
        format!(
            "id:{};request-id:{request_id};ts:{ts};",
            data_id.to_ascii_lowercase()
        )
    }

    pub fn verify(
        &self,
        data_id: &str,
        request_id: &str,
        header: &SignatureHeader,
        now: DateTime<Utc>,
    ) -> Result<(), PipelineError> {
        let age = (now.timestamp() - header.ts).unsigned_abs();
        if age > self.freshness_window.as_secs() {
            return Err(PipelineError::Signature(format!(
                "timestamp outside freshness window ({age}s old)"
            )));
        }

        let provided = hex::decode(&header.v1)
            .map_err(|_| PipelineError::Signature("v1 is not valid hex".into()))?;

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| PipelineError::Signature("invalid secret".into()))?;
        mac.update(Self::manifest(data_id, request_id, header.ts).as_bytes());
        let expected = mac.finalize().into_bytes();

        if expected.ct_eq(provided.as_slice()).unwrap_u8() != 1 {
            return Err(PipelineError::Signature("digest mismatch".into()));
        }
        Ok(())
    }
}

/// Test/client helper: produce a valid `v1` digest for a manifest.
pub fn sign_manifest(secret: &str, data_id: &str, request_id: &str, ts: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key size");
    mac.update(SignatureVerifier::manifest(data_id, request_id, ts).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const WINDOW: Duration = Duration::from_secs(300);

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new(SECRET, WINDOW)
    }

    #[test]
    fn parses_well_formed_header() {
        let h = SignatureHeader::parse("ts=1700000000,v1=deadbeef").unwrap();
        assert_eq!(h.ts, 1700000000);
        assert_eq!(h.v1, "deadbeef");
    }

    #[test]
    fn rejects_header_without_v1() {
        assert!(SignatureHeader::parse("ts=1700000000").is_err());
        assert!(SignatureHeader::parse("garbage").is_err());
    }

    #[test]
    fn accepts_valid_signature() {
        let now = Utc::now();
        let ts = now.timestamp();
        let v1 = sign_manifest(SECRET, "555001", "req-1", ts);
        let header = SignatureHeader { ts, v1 };
        verifier().verify("555001", "req-1", &header, now).unwrap();
    }

    #[test]
    fn data_id_is_lowercased_in_manifest() {
        let now = Utc::now();
        let ts = now.timestamp();
        let v1 = sign_manifest(SECRET, "ABC123", "req-1", ts);
        let header = SignatureHeader { ts, v1 };
        verifier().verify("ABC123", "req-1", &header, now).unwrap();
    }

    #[test]
    fn rejects_wrong_secret() {
        let now = Utc::now();
        let ts = now.timestamp();
        let v1 = sign_manifest("other_secret", "555001", "req-1", ts);
        let header = SignatureHeader { ts, v1 };
        let err = verifier().verify("555001", "req-1", &header, now).unwrap_err();
        assert!(matches!(err, PipelineError::Signature(_)));
    }

    #[test]
    fn rejects_stale_timestamp_even_with_matching_digest() {
        let now = Utc::now();
        let ts = now.timestamp() - 3600;
        let v1 = sign_manifest(SECRET, "555001", "req-1", ts);
        let header = SignatureHeader { ts, v1 };
        let err = verifier().verify("555001", "req-1", &header, now).unwrap_err();
        assert!(matches!(err, PipelineError::Signature(_)));
    }

    #[test]
    fn rejects_tampered_request_id() {
        let now = Utc::now();
        let ts = now.timestamp();
        let v1 = sign_manifest(SECRET, "555001", "req-1", ts);
        let header = SignatureHeader { ts, v1 };
        assert!(verifier().verify("555001", "req-2", &header, now).is_err());
    }
}

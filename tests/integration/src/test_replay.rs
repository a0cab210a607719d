//! Replay protection integration tests.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use apisign_auth::{AuthError, HmacDigest, SignatureAlgorithm, SigningRequest};

    use crate::{NOW, sign_as_abc123, verifier_from};

    const ALG: SignatureAlgorithm = SignatureAlgorithm::KeyedHash(HmacDigest::Sha1);

    fn transfer(nonce: i64) -> SigningRequest {
        let request = SigningRequest::new(
            "POST",
            "api.example.com",
            "/v1/transfers",
            [("amount", "100"), ("to", "acct-9")],
        );
        sign_as_abc123(request, ALG, NOW, nonce)
    }

    #[test]
    fn test_should_accept_replay_when_protection_disabled() {
        let (verifier, _key_file) = verifier_from(&[]);
        let request = transfer(5);

        assert!(verifier.verify_at(&request, ALG, NOW).is_ok());
        assert!(verifier.verify_at(&request, ALG, NOW + 1).is_ok());
    }

    #[test]
    fn test_should_reject_replay_when_protection_enabled() {
        let (verifier, _key_file) = verifier_from(&[("APISIGN_REPLAY_PROTECTION", "true")]);
        let request = transfer(5);

        assert!(verifier.verify_at(&request, ALG, NOW).is_ok());
        let err = verifier.verify_at(&request, ALG, NOW + 1).unwrap_err();
        assert!(matches!(err, AuthError::NonceReused { nonce: 5, .. }));
        assert_eq!(err.kind().as_str(), "NonceReused");

        assert!(verifier.verify_at(&transfer(6), ALG, NOW + 1).is_ok());
    }

    #[test]
    fn test_should_expire_replayed_request_before_nonce_is_forgotten() {
        let (verifier, _key_file) = verifier_from(&[
            ("APISIGN_REPLAY_PROTECTION", "1"),
            ("APISIGN_SIGNATURE_LIFETIME", "30"),
        ]);
        let request = transfer(5);

        assert!(verifier.verify_at(&request, ALG, NOW).is_ok());
        assert!(matches!(
            verifier.verify_at(&request, ALG, NOW + 29),
            Err(AuthError::NonceReused { .. })
        ));
        assert!(matches!(
            verifier.verify_at(&request, ALG, NOW + 30),
            Err(AuthError::SignatureExpired)
        ));
    }

    #[test]
    fn test_should_admit_one_of_many_concurrent_replays() {
        let (verifier, _key_file) = verifier_from(&[("APISIGN_REPLAY_PROTECTION", "true")]);
        let request = transfer(11);
        let accepted = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    if verifier.verify_at(&request, ALG, NOW).is_ok() {
                        accepted.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }
}

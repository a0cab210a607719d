//! Key file and configuration integration tests.

#[cfg(test)]
mod tests {
    use apisign_auth::registry::{AsymmetricKey, SigningSecret};
    use apisign_auth::{
        AuthError, DeploymentMode, HmacDigest, KeyRegistry, Outcome, SignatureAlgorithm,
        SigningRequest, StaticKeyRegistry,
    };

    use crate::{ED25519_SEED, NOW, config_from, key_file_json, sign_as_abc123, verifier_from};

    fn orders_request() -> SigningRequest {
        SigningRequest::new(
            "GET",
            "api.example.com:443",
            "/v1/orders",
            [("status", "open"), ("limit", "20")],
        )
    }

    #[test]
    fn test_should_verify_every_algorithm_with_key_file_registry() {
        let (verifier, _key_file) = verifier_from(&[]);

        for alg in SignatureAlgorithm::ALL {
            let request = sign_as_abc123(orders_request(), alg, NOW - 30, 42);
            let outcome = verifier.verify_at(&request, alg, NOW);
            assert_eq!(
                outcome.ok(),
                Some(Outcome::Accepted {
                    key_id: "abc123".to_owned()
                }),
                "{alg}"
            );
        }
    }

    #[test]
    fn test_should_match_reference_md5_signature() {
        let (verifier, _key_file) = verifier_from(&[]);
        let canonical = "GETapi.example.com/v1/ordersKeyID=abc123Nonce=42Timestamp=1700000000";
        let expected = apisign_auth::engine::generate(
            canonical,
            &SigningSecret::HashSymmetric("s3cr3t"),
        )
        .unwrap();

        let request = SigningRequest::new(
            "GET",
            "api.example.com",
            "/v1/orders",
            [
                ("KeyID", "abc123"),
                ("Nonce", "42"),
                ("Timestamp", "1700000000"),
                ("Signature", expected.as_str()),
            ],
        );
        assert_eq!(request.canonical_string(), canonical);
        assert!(
            verifier
                .verify_at(&request, SignatureAlgorithm::HashSymmetric, NOW + 60)
                .is_ok()
        );
    }

    #[test]
    fn test_should_verify_with_public_key_only_caller() {
        let (verifier, _key_file) = verifier_from(&[]);

        // The caller signs with a private key the server never sees.
        let caller_key =
            AsymmetricKey::from_hex(None, Some(&hex::encode(ED25519_SEED))).unwrap();
        let mut request = orders_request();
        request.set_param("KeyID", "verify-only");
        request.set_param("Timestamp", NOW.to_string());
        request.set_param("Nonce", "9");
        let signature = apisign_auth::engine::generate(
            &request.canonical_string(),
            &SigningSecret::Asymmetric(&caller_key),
        )
        .unwrap();
        request.set_param("Signature", signature);

        assert_eq!(
            verifier
                .verify_at(&request, SignatureAlgorithm::Asymmetric, NOW)
                .ok(),
            Some(Outcome::Accepted {
                key_id: "verify-only".to_owned()
            })
        );

        request.set_param("limit", "21");
        assert!(matches!(
            verifier.verify_at(&request, SignatureAlgorithm::Asymmetric, NOW),
            Err(AuthError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_should_refuse_debug_issuance_without_private_key() {
        let (verifier, _key_file) = verifier_from(&[("APISIGN_RUN_MODE", "debug")]);
        let request = SigningRequest::new(
            "GET",
            "h",
            "/",
            [("KeyID", "verify-only"), ("debug", "1")],
        );
        assert!(matches!(
            verifier.verify_at(&request, SignatureAlgorithm::Asymmetric, NOW),
            Err(AuthError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_should_report_unconfigured_family_as_unsupported() {
        let (verifier, _key_file) = verifier_from(&[]);
        let request = SigningRequest::new(
            "GET",
            "h",
            "/",
            [
                ("KeyID", "verify-only"),
                ("Timestamp", "1700000000"),
                ("Nonce", "1"),
                ("Signature", "00"),
            ],
        );
        let result = verifier.verify_at(
            &request,
            SignatureAlgorithm::KeyedHash(HmacDigest::Sha1),
            NOW,
        );
        assert!(matches!(result, Err(AuthError::UnsupportedAlgorithm(_))));
    }

    #[test]
    fn test_should_load_configuration_from_environment_lookup() {
        let config = config_from(&[
            ("APISIGN_RUN_MODE", "debug"),
            ("APISIGN_SIGNATURE_LIFETIME", "60"),
            ("APISIGN_REPLAY_PROTECTION", "true"),
        ]);
        assert_eq!(config.run_mode, DeploymentMode::Debug);
        assert_eq!(config.signature_lifetime_secs, 60);
        assert!(config.replay_protection);
        assert_eq!(config.keys_file, "keys.json");
    }

    #[test]
    fn test_should_apply_configured_lifetime() {
        let (verifier, _key_file) = verifier_from(&[("APISIGN_SIGNATURE_LIFETIME", "60")]);
        let alg = SignatureAlgorithm::KeyedHash(HmacDigest::Md5);

        let inside = sign_as_abc123(orders_request(), alg, NOW - 59, 1);
        assert!(verifier.verify_at(&inside, alg, NOW).is_ok());

        let outside = sign_as_abc123(orders_request(), alg, NOW - 60, 2);
        assert!(matches!(
            verifier.verify_at(&outside, alg, NOW),
            Err(AuthError::SignatureExpired)
        ));
    }

    #[test]
    fn test_should_reject_malformed_key_files() {
        let cases = [
            ("not json", "malformed"),
            (r#"{"callers": [{"key_id": "a"}], "extra": 1}"#, "malformed"),
            (
                r#"{"callers": [{"key_id": "a"}, {"key_id": "a"}]}"#,
                "duplicate",
            ),
            (
                r#"{"callers": [{"key_id": "a", "cipher_key": "short"}]}"#,
                "",
            ),
            (
                r#"{"callers": [{"key_id": "a", "public_key": "zz"}]}"#,
                "",
            ),
        ];

        for (json, needle) in cases {
            let err = StaticKeyRegistry::from_json(json).unwrap_err();
            assert!(matches!(err, AuthError::InvalidKeyMaterial(_)), "{json}: {err}");
            assert!(err.to_string().contains(needle), "{json}: {err}");
            assert!(!err.is_authentication_failure());
        }
    }

    #[test]
    fn test_should_report_missing_key_file_as_internal() {
        let err = StaticKeyRegistry::from_json_file("/nonexistent/apisign/keys.json").unwrap_err();
        assert!(matches!(err, AuthError::Internal(_)));
        assert_eq!(err.kind().as_str(), "InternalError");
    }

    #[test]
    fn test_should_not_leak_secrets_in_debug_output() {
        let registry = StaticKeyRegistry::from_json(&key_file_json()).unwrap();
        let record = registry.lookup("abc123").unwrap();
        let rendered = format!("{record:?} {registry:?}");
        for secret in ["s3cr3t", "k3y", "0123456789abcdef"] {
            assert!(!rendered.contains(secret), "{secret} leaked: {rendered}");
        }
    }
}

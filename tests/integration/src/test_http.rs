//! HTTP request integration tests.

#[cfg(test)]
mod tests {
    use apisign_auth::{
        AuthError, HmacDigest, IssuedSignature, Outcome, SignatureAlgorithm, SigningRequest,
    };

    use crate::{NOW, sign_as_abc123, verifier_from};

    const ROUTE: &str = "/v1/orders/:id";

    fn parts(method: &str, uri: &str, form: bool) -> http::request::Parts {
        let mut builder = http::Request::builder()
            .method(method)
            .uri(uri)
            .header(http::header::HOST, "api.example.com:8443");
        if form {
            builder = builder.header(
                http::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            );
        }
        builder.body(()).unwrap().into_parts().0
    }

    /// Encode the signed parameters of `request` as a query string.
    fn query_of(request: &SigningRequest) -> String {
        let mut pairs: Vec<(&str, &str)> = request.params().collect();
        pairs.sort_unstable();
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish()
    }

    fn template(method: &str) -> SigningRequest {
        SigningRequest::new(
            method,
            "api.example.com",
            ROUTE,
            [("expand", "items lines"), ("currency", "EUR")],
        )
    }

    #[test]
    fn test_should_verify_signed_query_request() {
        let (verifier, _key_file) = verifier_from(&[]);
        let alg = SignatureAlgorithm::KeyedHash(HmacDigest::Sha256);
        let signed = sign_as_abc123(template("GET"), alg, NOW - 1, 77);

        let uri = format!("https://api.example.com:8443/v1/orders/17?{}", query_of(&signed));
        let request = SigningRequest::from_http(&parts("GET", &uri, false), ROUTE, b"").unwrap();

        assert_eq!(request.canonical_string(), signed.canonical_string());
        assert_eq!(
            verifier.verify_at(&request, alg, NOW).ok(),
            Some(Outcome::Accepted {
                key_id: "abc123".to_owned()
            })
        );
    }

    #[test]
    fn test_should_verify_signed_form_body() {
        let (verifier, _key_file) = verifier_from(&[]);
        let alg = SignatureAlgorithm::CipherSymmetric;
        let signed = sign_as_abc123(template("POST"), alg, NOW, 78);

        let body = query_of(&signed);
        let request = SigningRequest::from_http(
            &parts("POST", "https://api.example.com:8443/v1/orders/17", true),
            ROUTE,
            body.as_bytes(),
        )
        .unwrap();

        assert!(verifier.verify_at(&request, alg, NOW).is_ok());
    }

    #[test]
    fn test_should_reject_request_routed_to_different_template() {
        let (verifier, _key_file) = verifier_from(&[]);
        let alg = SignatureAlgorithm::HashSymmetric;
        let signed = sign_as_abc123(template("GET"), alg, NOW, 79);

        let uri = format!("https://api.example.com/v1/orders?{}", query_of(&signed));
        let request =
            SigningRequest::from_http(&parts("GET", &uri, false), "/v1/orders", b"").unwrap();

        assert!(matches!(
            verifier.verify_at(&request, alg, NOW),
            Err(AuthError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_should_issue_debug_triple_over_http_in_debug_mode() {
        let (verifier, _key_file) = verifier_from(&[("APISIGN_RUN_MODE", "debug")]);
        let alg = SignatureAlgorithm::Asymmetric;

        let uri = "https://api.example.com:8443/v1/orders/17?KeyID=abc123&currency=EUR&debug=1";
        let request = SigningRequest::from_http(&parts("GET", uri, false), ROUTE, b"").unwrap();
        let Ok(Outcome::DebugIssued(issued)) = verifier.verify_at(&request, alg, NOW) else {
            panic!("expected debug issuance");
        };

        // Round-trip through JSON as a client would receive it.
        let body = serde_json::to_string(&issued).unwrap();
        let received: IssuedSignature = serde_json::from_str(&body).unwrap();

        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("KeyID", "abc123")
            .append_pair("currency", "EUR")
            .append_pair("Timestamp", &received.timestamp)
            .append_pair("Nonce", &received.nonce)
            .append_pair("Signature", &received.signature)
            .finish();
        let follow_up = format!("https://api.example.com:8443/v1/orders/17?{query}");
        let request =
            SigningRequest::from_http(&parts("GET", &follow_up, false), ROUTE, b"").unwrap();
        assert!(verifier.verify_at(&request, alg, NOW + 5).is_ok());
    }

    #[test]
    fn test_should_forbid_debug_over_http_in_release_mode() {
        let (verifier, _key_file) = verifier_from(&[("APISIGN_RUN_MODE", "production")]);
        let uri = "https://api.example.com/v1/orders/17?KeyID=abc123&debug=1";
        let request = SigningRequest::from_http(&parts("GET", uri, false), ROUTE, b"").unwrap();

        let err = verifier
            .verify_at(&request, SignatureAlgorithm::HashSymmetric, NOW)
            .unwrap_err();
        assert!(matches!(err, AuthError::DebugForbidden));
        assert_eq!(err.to_string(), "debug forbidden in release runmode");
    }

    #[test]
    fn test_should_report_unknown_caller_from_http() {
        let (verifier, _key_file) = verifier_from(&[]);
        let uri = "https://api.example.com/v1/orders/17?KeyID=ghost&Timestamp=1&Nonce=1&Signature=x";
        let request = SigningRequest::from_http(&parts("GET", uri, false), ROUTE, b"").unwrap();

        let err = verifier
            .verify_at(&request, SignatureAlgorithm::HashSymmetric, NOW)
            .unwrap_err();
        assert_eq!(err.to_string(), "KeyID 'ghost' not found");
    }
}

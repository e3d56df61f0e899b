//! Functions used to send and consume push http messages.
//! This module can be used to build custom clients.

use http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE};
use http::{Request, StatusCode};

use crate::{error::ErrorInfo, error::WebPushError, message::WebPushMessage};

/// Builds the request to send to the push service.
///
/// This function is generic over the request body, this means that you can swap out client implementations
/// even if they use different body types.
///
/// # Example
///
/// ```no_run
/// # use fitpush::{SubscriptionInfo, WebPushMessageBuilder};
/// # use fitpush::request_builder::build_request;
/// let info = SubscriptionInfo::new(
///  "https://updates.push.services.mozilla.com/wpush/v2/gAAAAABaso4Vajy4STM25r5y5oFfyN451rUmES6mhQngxABxbZB5q",
///  "BLMbF9ffKBiWQLCKvTHb6LO8Nb6dcUh6TItC455vu2kElga6PQvUmaFyCdykxY2nOSSL3yKgfbmFLRTUaGv4yV8",
///  "xS03Fi5ErfTNH_l9WHE9Ig",
///  );
///
///  let builder = WebPushMessageBuilder::new(&info);
///
///  //Build the request with a plain byte body
///  let request = build_request::<Vec<u8>>(builder.build().unwrap()).unwrap();
///  //Send using a http client
/// ```
pub fn build_request<T>(message: WebPushMessage) -> Result<Request<T>, WebPushError>
where
    T: From<Vec<u8>> + From<&'static str>, //This bound can be reduced to a &[u8] instead of str if needed
{
    let mut builder = Request::builder()
        .method("POST")
        .uri(message.endpoint)
        .header("TTL", format!("{}", message.ttl).as_bytes())
        .header("Urgency", message.urgency.to_string());

    let request = if let Some(payload) = message.payload {
        builder = builder
            .header(CONTENT_ENCODING, payload.content_encoding)
            .header(CONTENT_LENGTH, format!("{}", payload.content.len() as u64).as_bytes())
            .header(CONTENT_TYPE, "application/octet-stream");

        for (k, v) in payload.crypto_headers.into_iter() {
            let v: &str = v.as_ref();
            builder = builder.header(k, v);
        }

        builder.body(payload.content.into())?
    } else {
        builder.body("".into())?
    };

    Ok(request)
}

/// Parses the response from the push service, and will return `Err` if the request was bad.
pub fn parse_response(response_status: StatusCode, body: Vec<u8>) -> Result<(), WebPushError> {
    if response_status.is_success() {
        return Ok(());
    }

    let info: ErrorInfo = serde_json::from_slice(&body).unwrap_or_else(|_| ErrorInfo {
        code: response_status.as_u16(),
        errno: 999,
        error: "unknown error".into(),
        message: String::from_utf8(body).unwrap_or_else(|_| "-".into()),
    });

    match response_status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(WebPushError::Unauthorized(info)),
        StatusCode::GONE => Err(WebPushError::EndpointNotValid(info)),
        StatusCode::NOT_FOUND => Err(WebPushError::EndpointNotFound(info)),
        StatusCode::PAYLOAD_TOO_LARGE => Err(WebPushError::PayloadRejected(info)),
        StatusCode::BAD_REQUEST => Err(WebPushError::BadRequest(info)),
        status if status.is_server_error() => Err(WebPushError::ServerError {
            retry_after: None,
            info,
        }),
        _ => Err(WebPushError::Other(info)),
    }
}

#[cfg(test)]
mod tests {
    use http::Uri;
    use p256::{elliptic_curve::sec1::ToEncodedPoint, SecretKey};
    use rand::rngs::OsRng;

    use crate::base64url;
    use crate::clients::request_builder::*;
    use crate::error::WebPushError;
    use crate::message::{SubscriptionInfo, Urgency, WebPushMessageBuilder};
    use crate::vapid::VapidSignature;

    fn subscription_info() -> SubscriptionInfo {
        let secret = SecretKey::random(&mut OsRng);

        SubscriptionInfo {
            endpoint: "https://fcm.googleapis.com/fcm/send/eKClHsXFm9E:APA91bH2x3gNOMv4dF1lQfCgIfOet8E".into(),
            keys: crate::message::SubscriptionKeys {
                p256dh: base64url::encode(secret.public_key().to_encoded_point(false).as_bytes()),
                auth: "EvcWjEgzr4rbvhfi3yds0A".into(),
            },
        }
    }

    #[test]
    fn builds_a_correct_request_with_empty_payload() {
        let info = subscription_info();
        let mut builder = WebPushMessageBuilder::new(&info);

        builder.set_ttl(420);
        builder.set_urgency(Urgency::VeryLow);

        let request = build_request::<Vec<u8>>(builder.build().unwrap()).unwrap();
        let ttl = request.headers().get("TTL").unwrap().to_str().unwrap();
        let urgency = request.headers().get("Urgency").unwrap().to_str().unwrap();
        let expected_uri: Uri = "fcm.googleapis.com".parse().unwrap();

        assert_eq!("420", ttl);
        assert_eq!("very-low", urgency);
        assert_eq!(expected_uri.host(), request.uri().host());
        assert!(request.body().is_empty());
    }

    #[test]
    fn builds_a_correct_request_with_payload() {
        let info = subscription_info();
        let mut builder = WebPushMessageBuilder::new(&info);

        builder.set_payload("test".as_bytes());
        builder.set_vapid_signature(VapidSignature {
            auth_t: "foo".into(),
            auth_k: "bar".into(),
        });

        let request = build_request::<Vec<u8>>(builder.build().unwrap()).unwrap();
        let header = |name: &str| request.headers().get(name).unwrap().to_str().unwrap().to_string();

        // 86 bytes of header, 4 bytes of content, the delimiter and the tag
        assert_eq!("107", header("Content-Length"));
        assert_eq!("aes128gcm", header("Content-Encoding"));
        assert_eq!("application/octet-stream", header("Content-Type"));
        assert_eq!("vapid t=foo, k=bar", header("Authorization"));
        assert_eq!("86400", header("TTL"));
        assert_eq!("normal", header("Urgency"));
        assert_eq!(&http::Method::POST, request.method());
        assert_eq!(107, request.body().len());
    }

    #[test]
    fn parses_a_successful_response_correctly() {
        assert!(matches!(parse_response(StatusCode::OK, vec![]), Ok(())));
        assert!(matches!(parse_response(StatusCode::CREATED, vec![]), Ok(())));
    }

    #[test]
    fn parses_an_unauthorized_response_correctly() {
        assert!(matches!(
            parse_response(StatusCode::UNAUTHORIZED, vec![]),
            Err(WebPushError::Unauthorized(_))
        ));
        assert!(matches!(
            parse_response(StatusCode::FORBIDDEN, vec![]),
            Err(WebPushError::Unauthorized(_))
        ));
    }

    #[test]
    fn parses_a_gone_response_correctly() {
        assert!(matches!(
            parse_response(StatusCode::GONE, vec![]),
            Err(WebPushError::EndpointNotValid(_))
        ));
    }

    #[test]
    fn parses_a_not_found_response_correctly() {
        assert!(matches!(
            parse_response(StatusCode::NOT_FOUND, vec![]),
            Err(WebPushError::EndpointNotFound(_))
        ));
    }

    #[test]
    fn parses_a_payload_too_large_response_correctly() {
        assert!(matches!(
            parse_response(StatusCode::PAYLOAD_TOO_LARGE, vec![]),
            Err(WebPushError::PayloadRejected(_))
        ));

        match parse_response(StatusCode::PAYLOAD_TOO_LARGE, b"Payload exceeds 4096 bytes".to_vec()) {
            Err(WebPushError::PayloadRejected(info)) => {
                assert_eq!(413, info.code);
                assert_eq!("Payload exceeds 4096 bytes", info.message);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn parses_a_server_error_response_correctly() {
        assert!(matches!(
            parse_response(StatusCode::INTERNAL_SERVER_ERROR, vec![]),
            Err(WebPushError::ServerError { .. })
        ));
    }

    #[test]
    fn keeps_a_plain_text_body_as_diagnostics() {
        match parse_response(StatusCode::SERVICE_UNAVAILABLE, b"relay overloaded".to_vec()) {
            Err(WebPushError::ServerError { info, .. }) => {
                assert_eq!(503, info.code);
                assert_eq!("relay overloaded", info.message);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn parses_a_bad_request_response_with_body_correctly() {
        let json = r#"
            {
                "code": 400,
                "errno": 103,
                "error": "FooBar",
                "message": "No message found"
            }
        "#;

        assert!(matches!(
            parse_response(StatusCode::BAD_REQUEST, json.as_bytes().to_vec()),
            Err(WebPushError::BadRequest(ErrorInfo {
                code: 400,
                errno: 103,
                error: _,
                message: _,
            })),
        ));
    }

    #[test]
    fn parses_other_statuses_as_other() {
        assert!(matches!(
            parse_response(StatusCode::TOO_MANY_REQUESTS, vec![]),
            Err(WebPushError::Other(_))
        ));
    }
}

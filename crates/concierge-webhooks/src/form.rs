//! Form-encoded webhook bodies.

use concierge_types::{ConciergeError, WebhookRequest};

/// Parses an `application/x-www-form-urlencoded` body into ordered
/// name/value pairs. Order is preserved because URL signatures are
/// computed over a sorted copy while handlers read the original.
pub fn parse_form_body(request: &WebhookRequest) -> Result<Vec<(String, String)>, ConciergeError> {
    serde_urlencoded::from_bytes(&request.body)
        .map_err(|e| ConciergeError::Serialization(format!("webhook body is not a valid form: {e}")))
}

/// First value for a form field.
pub fn form_value<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_types::WebhookMethod;

    fn request(body: &[u8]) -> WebhookRequest {
        WebhookRequest {
            method: WebhookMethod::Post,
            url: "https://hooks.host.example/apps/twilio/sms".into(),
            headers: vec![],
            query: vec![],
            body: body.to_vec(),
        }
    }

    #[test]
    fn parses_encoded_fields_in_order() {
        let params =
            parse_form_body(&request(b"From=%2B15550002222&To=%2B15550001111&Body=hello+there"))
                .unwrap();
        assert_eq!(
            params,
            vec![
                ("From".to_string(), "+15550002222".to_string()),
                ("To".to_string(), "+15550001111".to_string()),
                ("Body".to_string(), "hello there".to_string()),
            ]
        );
        assert_eq!(form_value(&params, "Body"), Some("hello there"));
        assert_eq!(form_value(&params, "CallSid"), None);
    }

    #[test]
    fn malformed_escapes_are_a_serialization_error() {
        let err = parse_form_body(&request(b"Body=%zz")).unwrap_err();
        assert!(matches!(err, ConciergeError::Serialization(_)));
    }
}

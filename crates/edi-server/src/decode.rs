//! Request decoding and per-request caps

use axum::body::{Body, Bytes};
use axum::extract::{FromRequestParts, Query};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use edi_adapter_db::{MAX_PAGE_SIZE, Page};
use edi_pipeline::{Error, Result};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

const DEFAULT_PAGE_SIZE: i64 = 50;

fn body_too_large() -> Error {
    Error::validation("request body exceeds maximum size of 10 MiB")
}

/// Read the whole body, refusing anything over [`MAX_BODY_BYTES`].
pub async fn read_body(headers: &HeaderMap, body: Body) -> Result<Bytes> {
    let declared = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if let Some(declared) = declared {
        if declared > MAX_BODY_BYTES as u64 {
            return Err(body_too_large());
        }
    }

    match Limited::new(body, MAX_BODY_BYTES).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => Err(body_too_large()),
        Err(err) => Err(Error::validation(format!("failed to read request body: {err}"))),
    }
}

/// Accepted request body formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFormat {
    /// `{"edi_content": "ISA*..."}`
    Json,
    /// Bare X12 bytes
    Raw,
}

/// Classify the request by its `Content-Type`.
pub fn body_format(headers: &HeaderMap) -> Result<BodyFormat> {
    let Some(value) = headers.get(CONTENT_TYPE) else {
        return Err(Error::invalid_field(
            "Content-Type",
            "Content-Type header is required",
            "required",
        ));
    };
    let media_type = value
        .to_str()
        .unwrap_or_default()
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match media_type.as_str() {
        "application/json" => Ok(BodyFormat::Json),
        "text/plain" | "application/edi" | "application/x12" => Ok(BodyFormat::Raw),
        other => Err(Error::invalid_field(
            "Content-Type",
            format!("unsupported content type: {other}"),
            "content_type",
        )),
    }
}

#[derive(Deserialize)]
struct EdiEnvelope {
    #[serde(default)]
    edi_content: String,
}

/// The X12 payload of an ingest request.
pub fn edi_payload(format: BodyFormat, body: Bytes) -> Result<Vec<u8>> {
    let payload = match format {
        BodyFormat::Raw => body.to_vec(),
        BodyFormat::Json => {
            let envelope: EdiEnvelope = serde_json::from_slice(&body)
                .map_err(|err| Error::validation(format!("invalid JSON body: {err}")))?;
            envelope.edi_content.into_bytes()
        }
    };
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Err(Error::invalid_field("edi_content", "EDI content is required", "required"));
    }
    Ok(payload)
}

/// A required, well-formed partner id.
pub fn partner_id(value: Option<&str>) -> Result<String> {
    let partner_id = value.map(str::trim).filter(|v| !v.is_empty()).ok_or_else(|| {
        Error::invalid_field("partner_id", "partner_id is required", "required")
    })?;
    edi_profile::loader::validate_partner_id(partner_id)?;
    Ok(partner_id.to_string())
}

/// `limit`/`offset` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageQuery {
    pub fn page(&self) -> Result<Page> {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE as i64).contains(&limit) {
            return Err(Error::invalid_field(
                "limit",
                format!("limit must be between 1 and {MAX_PAGE_SIZE}"),
                "range",
            ));
        }
        let offset = self.offset.unwrap_or(0);
        if offset < 0 {
            return Err(Error::invalid_field("offset", "offset must not be negative", "range"));
        }
        Ok(Page::new(limit as usize, offset as usize)?)
    }
}

/// [`Query`] with rejections rendered as validation errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> std::result::Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError(Error::validation(rejection.body_text()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        headers
    }

    #[test]
    fn test_body_format() {
        assert_eq!(body_format(&headers("application/json; charset=utf-8")).unwrap(), BodyFormat::Json);
        assert_eq!(body_format(&headers("Application/X12")).unwrap(), BodyFormat::Raw);
        assert_eq!(body_format(&headers("text/plain")).unwrap(), BodyFormat::Raw);

        let err = body_format(&headers("application/xml")).unwrap_err();
        assert_eq!(err.fields()[0].field, "Content-Type");
        assert!(body_format(&HeaderMap::new()).is_err());
    }

    #[test]
    fn test_edi_payload() {
        let json = Bytes::from_static(br#"{"edi_content":"ISA*00"}"#);
        assert_eq!(edi_payload(BodyFormat::Json, json).unwrap(), b"ISA*00".to_vec());
        assert!(edi_payload(BodyFormat::Json, Bytes::from_static(b"{}")).is_err());
        assert!(edi_payload(BodyFormat::Json, Bytes::from_static(b"ISA*")).is_err());
        assert!(edi_payload(BodyFormat::Raw, Bytes::from_static(b" \n")).is_err());
    }

    #[test]
    fn test_page_bounds() {
        let page = |limit, offset| PageQuery { limit, offset }.page();
        assert!(page(Some(0), None).is_err());
        assert!(page(Some(1001), None).is_err());
        assert!(page(None, Some(-1)).is_err());
        assert_eq!(page(Some(1000), Some(20)).unwrap().limit(), 1000);
        assert_eq!(page(None, None).unwrap().limit(), 50);
    }

    #[test]
    fn test_partner_id() {
        assert_eq!(partner_id(Some("ACME")).unwrap(), "ACME");
        assert!(partner_id(None).is_err());
        assert!(partner_id(Some("  ")).is_err());
        assert!(partner_id(Some("A!")).is_err());
    }

    #[tokio::test]
    async fn test_body_cap() {
        let exact = vec![b'x'; MAX_BODY_BYTES];
        let bytes = read_body(&HeaderMap::new(), Body::from(exact)).await.unwrap();
        assert_eq!(bytes.len(), MAX_BODY_BYTES);

        let over = vec![b'x'; MAX_BODY_BYTES + 1];
        let err = read_body(&HeaderMap::new(), Body::from(over)).await.unwrap_err();
        assert!(err.to_string().contains("10 MiB"));
    }
}

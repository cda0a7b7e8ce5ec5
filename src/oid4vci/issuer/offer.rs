//! # Credential Offer Endpoint Handler
//!
//! Serves pre-minted credential offers by UUID. Offers are created out of
//! band (e.g. by a provisioning portal), stored with a short time-to-live,
//! and purged on first collection. The response carries the offer
//! parameters together with a QR rendering of the wallet deep link.

use std::io::Cursor;

use anyhow::anyhow;
use base64ct::{Base64, Encoding};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use qrcode::QrCode;

use crate::endpoint::{Body, Handler, NoHeaders, Request, Response};
use crate::oid4vci::types::{OfferRequest, OfferResponse};
use crate::provider::{OfferStore, Provider};
use crate::{Result, invalid, server};

/// Credential offer request handler.
async fn offer(
    _issuer: &str, provider: &impl Provider, request: OfferRequest,
) -> Result<OfferResponse> {
    tracing::debug!("offer");

    // retrieve and then purge the offer: collection is one-shot
    let offer = OfferStore::offer(provider, &request.id)
        .await
        .map_err(|e| server!("issue fetching offer: {e}"))?
        .ok_or_else(|| invalid!("unknown credential offer"))?;
    OfferStore::purge_offer(provider, &request.id)
        .await
        .map_err(|e| server!("issue purging offer: {e}"))?;

    if offer.is_expired() {
        return Err(invalid!("credential offer has expired"));
    }

    let offer_json = serde_json::to_string(&offer.credential_offer)
        .map_err(|e| server!("issue serializing offer: {e}"))?;
    let deep_link = format!(
        "openid-credential-offer://?credential_offer={}",
        utf8_percent_encode(&offer_json, NON_ALPHANUMERIC)
    );
    let qr_code =
        to_qrcode(&deep_link).map_err(|e| server!("issue rendering offer QR: {e}"))?;

    Ok(OfferResponse { credential_offer: offer.credential_offer, qr_code: Some(qr_code) })
}

/// Render a value as a base64-encoded PNG image of a QR code, in data URI
/// form.
fn to_qrcode(value: &str) -> anyhow::Result<String> {
    let qr_code = QrCode::new(value).map_err(|e| anyhow!("failed to create QR code: {e}"))?;
    let img_buf = qr_code.render::<image::Luma<u8>>().build();

    let mut buffer: Vec<u8> = Vec::new();
    let mut writer = Cursor::new(&mut buffer);
    img_buf
        .write_to(&mut writer, image::ImageFormat::Png)
        .map_err(|e| anyhow!("failed to render QR code: {e}"))?;

    Ok(format!("data:image/png;base64,{}", Base64::encode_string(buffer.as_slice())))
}

impl Handler for Request<OfferRequest, NoHeaders> {
    type Response = OfferResponse;

    fn handle(
        self, issuer: &str, provider: &impl Provider,
    ) -> impl Future<Output = Result<impl Into<Response<Self::Response>>>> + Send {
        offer(issuer, provider, self.body)
    }
}

impl Body for OfferRequest {}

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::env_utils::KaitenConfig;
use crate::error::{self, WebhookError};
use crate::kaiten::{CardCreator, OutboundCard};
use crate::tilda::InboundForm;
use crate::SharedAppState;

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: String,
    pub card: CardSummary,
}

#[derive(Debug, Serialize)]
pub struct CardSummary {
    pub id: Value,
    pub title: String,
    pub url: String,
}

pub async fn handler(
    State(state): State<SharedAppState>,
    body: Result<Bytes, BytesRejection>,
) -> error::Result<Json<WebhookResponse>> {
    let body = body.map_err(|rejection| WebhookError::MalformedRequest(rejection.body_text()))?;
    let response = handle(&state.kaiten, state.card_creator.as_ref(), &body).await?;
    Ok(Json(response))
}

/// Relays one Tilda submission to Kaiten as a new card.
pub async fn handle(
    kaiten: &KaitenConfig,
    card_creator: &dyn CardCreator,
    body: &[u8],
) -> error::Result<WebhookResponse> {
    info!("Tilda webhook received ({} bytes)", body.len());

    let missing = kaiten.missing();
    if !missing.is_empty() {
        return Err(WebhookError::ConfigurationError(missing));
    }
    debug!("Kaiten configuration validated");

    let form = InboundForm::from_slice(body)?;
    info!(
        formid = form.formid.as_deref().unwrap_or_default(),
        formname = form.formname.as_deref().unwrap_or_default(),
        fields = form.len(),
        "Parsed Tilda submission"
    );

    let card = OutboundCard::from_form(&form, &kaiten.board_id);

    info!(board_id = %card.board_id, "Creating Kaiten card");
    let created = card_creator.create_card(&card).await?;
    info!(card_id = %created.id, "Kaiten card created");

    let url = created.card_url(&kaiten.api_url);
    let title = match created.title {
        Some(title) if !title.is_empty() => title,
        _ => card.title,
    };

    Ok(WebhookResponse {
        status: "success".to_string(),
        card: CardSummary {
            id: created.id,
            title,
            url,
        },
    })
}

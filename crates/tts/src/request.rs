use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequest, Multipart, multipart::Field},
};

use crate::{
    error::TtsError,
    server::Server,
    staging::Upload,
    types::SynthesisForm,
};

/// Extractor for the synthesis multipart form
///
/// Collects raw fields only; validation happens in [`Server::synthesize`].
/// Readiness is checked before the body is read so an unready engine answers
/// 503 whatever the request looks like.
pub struct ExtractSynthesisForm(pub SynthesisForm);

impl FromRequest<Arc<Server>> for ExtractSynthesisForm {
    type Rejection = TtsError;

    async fn from_request(request: http::Request<Body>, server: &Arc<Server>) -> Result<Self, Self::Rejection> {
        if !server.engine_ready() {
            return Err(TtsError::EngineNotReady);
        }

        let (parts, body) = request.into_parts();

        let is_multipart = parts
            .headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("multipart/form-data"));

        if !is_multipart {
            return Err(TtsError::UnsupportedMediaType);
        }

        let limit = server.body_limit();

        let bytes = axum::body::to_bytes(body, limit).await.map_err(|err| {
            if std::error::Error::source(&err).is_some_and(|source| source.is::<http_body_util::LengthLimitError>()) {
                TtsError::PayloadTooLarge(limit)
            } else {
                TtsError::InvalidForm(format!("failed to read request body: {err}"))
            }
        })?;

        // Extensions survive the rebuild, including the router's body-limit override
        let rebuilt = http::Request::from_parts(parts, Body::from(bytes));

        let mut multipart = Multipart::from_request(rebuilt, &())
            .await
            .map_err(|e| TtsError::InvalidForm(e.body_text()))?;

        let mut form = SynthesisForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| TtsError::InvalidForm(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match name.as_str() {
                "text" => form.text = Some(text(field).await?),
                "emoControlMode" | "emo_control_mode" => form.emo_control_mode = Some(text(field).await?),
                "emoAlpha" | "emo_alpha" => form.emo_alpha = Some(text(field).await?),
                "emoVector" | "emo_vector" => form.emo_vector = Some(text(field).await?),
                "emoText" | "emo_text" => form.emo_text = Some(text(field).await?),
                "useRandom" | "use_random" => form.use_random = Some(text(field).await?),
                "maxTextTokensPerSegment" | "max_text_tokens_per_segment" => {
                    form.max_text_tokens_per_segment = Some(text(field).await?);
                }
                "verbose" => form.verbose = Some(text(field).await?),
                "speakerAudio" | "speaker_audio" => form.speaker_audio = upload(field).await?,
                "emotionAudio" | "emotion_audio" => form.emotion_audio = upload(field).await?,
                other => tracing::debug!(field = other, "ignoring unknown form field"),
            }
        }

        Ok(Self(form))
    }
}

async fn text(field: Field<'_>) -> Result<String, TtsError> {
    let name = field.name().unwrap_or_default().to_string();

    field
        .text()
        .await
        .map_err(|e| TtsError::InvalidForm(format!("failed to read field '{name}': {}", e.body_text())))
}

/// An empty file part is what browsers send for an unselected file input
async fn upload(field: Field<'_>) -> Result<Option<Upload>, TtsError> {
    let name = field.name().unwrap_or_default().to_string();
    let file_name = field.file_name().map(str::to_string);
    let content_type = field.content_type().map(str::to_string);

    let data = field
        .bytes()
        .await
        .map_err(|e| TtsError::InvalidForm(format!("failed to read file '{name}': {}", e.body_text())))?;

    if data.is_empty() {
        return Ok(None);
    }

    Ok(Some(Upload {
        file_name,
        content_type,
        data,
    }))
}

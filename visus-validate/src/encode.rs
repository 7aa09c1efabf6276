use crate::ValidationError;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use visus_capture::AudioSample;

/// Encodes a recording as a `data:<mime>;base64,<payload>` URI.
pub fn encode_sample(sample: &AudioSample) -> Result<String, ValidationError> {
    let mime = sample.mime_type.trim();
    if !mime.starts_with("audio/") || mime.len() == "audio/".len() {
        return Err(ValidationError::Encoding(format!(
            "unsupported media type '{mime}'"
        )));
    }
    if sample.is_empty() {
        return Err(ValidationError::Encoding("recording is empty".into()));
    }
    Ok(format!("data:{mime};base64,{}", STANDARD.encode(&sample.data)))
}

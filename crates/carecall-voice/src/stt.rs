//! **Speech-to-Text (STT)**: turn a captured `WavAsset` into text for the dialogue log.
//!
//! `ClovaSpeechStt` posts the raw WAV to the remote recognizer; `PlaceholderStt`
//! answers without a network for dry runs and tests.

use crate::error::{VoiceError, VoiceResult};
use crate::wav::WavAsset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_CLOVA_SPEECH_URL: &str = "https://clovaspeech-gw.ncloud.com/recog/v1/stt";
const API_KEY_HEADER: &str = "X-CLOVASPEECH-API-KEY";

/// Recognized text plus the remaining usage quota reported by the service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    #[serde(default)]
    pub quota: i64,
}

/// Backend converting one captured utterance to text.
pub trait SttBackend {
    fn transcribe(&self, wav: &WavAsset) -> VoiceResult<Transcript>;
}

/// Placeholder STT: returns a fixed string. Use for exercising the turn loop without the API.
#[derive(Debug, Default)]
pub struct PlaceholderStt {
    /// If set, return this instead of the default message.
    pub response: Option<String>,
}

impl PlaceholderStt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(s: impl Into<String>) -> Self {
        Self { response: Some(s.into()) }
    }
}

impl SttBackend for PlaceholderStt {
    fn transcribe(&self, wav: &WavAsset) -> VoiceResult<Transcript> {
        let text = match self.response {
            Some(ref r) => r.clone(),
            None => format!(
                "[STT placeholder: {} bytes, {:.1}s]",
                wav.pcm().len(),
                wav.duration().as_secs_f32()
            ),
        };
        Ok(Transcript { text, quota: 0 })
    }
}

/// Clova Speech short-utterance recognizer.
///
/// Sends the WAV as an `application/octet-stream` body with `lang` and any extra
/// parameters in the query string. Any non-2xx status is an error; there is no retry.
#[derive(Debug, Clone)]
pub struct ClovaSpeechStt {
    pub url: String,
    pub api_key: String,
    /// Language tag, e.g. `Kor`
    pub language: String,
    /// Extra named parameters (e.g. `assessment=false`, `graph=false`)
    pub params: BTreeMap<String, String>,
    client: reqwest::blocking::Client,
}

impl ClovaSpeechStt {
    /// Create a client; `timeout` of `None` waits indefinitely.
    pub fn new(url: impl Into<String>, api_key: impl Into<String>, timeout: Option<Duration>) -> VoiceResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VoiceError::Transcription(e.to_string()))?;
        let mut params = BTreeMap::new();
        params.insert("assessment".to_string(), "false".to_string());
        params.insert("graph".to_string(), "false".to_string());
        Ok(Self {
            url: url.into(),
            api_key: api_key.into(),
            language: "Kor".to_string(),
            params,
            client,
        })
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    fn request(&self, wav: &WavAsset) -> reqwest::blocking::RequestBuilder {
        self.client
            .post(&self.url)
            .query(&[("lang", self.language.as_str())])
            .query(&self.params)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .header(API_KEY_HEADER, &self.api_key)
            .body(wav.as_bytes().to_vec())
    }
}

/// Decode the recognizer's JSON body.
pub fn parse_transcript(body: &str) -> VoiceResult<Transcript> {
    serde_json::from_str(body).map_err(|e| VoiceError::Transcription(format!("error unmarshalling response body: {}", e)))
}

impl SttBackend for ClovaSpeechStt {
    fn transcribe(&self, wav: &WavAsset) -> VoiceResult<Transcript> {
        let res = self
            .request(wav)
            .send()
            .map_err(|e| VoiceError::Transcription(e.to_string()))?;
        let status = res.status();
        let body = res.text().unwrap_or_default();
        if !status.is_success() {
            warn!("STT API error: response status {}", status);
            return Err(VoiceError::Transcription(format!("STT API error {}: {}", status, body)));
        }
        let transcript = parse_transcript(&body)?;
        debug!(quota = transcript.quota, "STT recognized {} chars", transcript.text.chars().count());
        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wav::encode_wav;

    fn tiny_wav() -> WavAsset {
        encode_wav(&[0u8; 320], 16000, 1, 16)
    }

    #[test]
    fn placeholder_returns_message() {
        let stt = PlaceholderStt::new();
        let t = stt.transcribe(&tiny_wav()).unwrap();
        assert!(t.text.contains("STT placeholder"));
        assert!(t.text.contains("320"));
    }

    #[test]
    fn placeholder_with_response() {
        let stt = PlaceholderStt::with_response("저는 두통이 있어요");
        assert_eq!(stt.transcribe(&tiny_wav()).unwrap().text, "저는 두통이 있어요");
    }

    #[test]
    fn request_carries_language_params_key_and_body() {
        let stt = ClovaSpeechStt::new(DEFAULT_CLOVA_SPEECH_URL, "secret", None)
            .unwrap()
            .with_param("diarization", "false");
        let wav = tiny_wav();
        let req = stt.request(&wav).build().unwrap();

        assert_eq!(req.method(), reqwest::Method::POST);
        assert_eq!(
            req.url().as_str(),
            "https://clovaspeech-gw.ncloud.com/recog/v1/stt?lang=Kor&assessment=false&diarization=false&graph=false"
        );
        assert_eq!(req.headers()[API_KEY_HEADER], "secret");
        assert_eq!(req.headers()[reqwest::header::CONTENT_TYPE], "application/octet-stream");
        assert_eq!(req.body().and_then(|b| b.as_bytes()), Some(wav.as_bytes()));
    }

    #[test]
    fn parse_transcript_reads_text_and_quota() {
        let t = parse_transcript(r#"{"text":"성별과 나이","quota":42}"#).unwrap();
        assert_eq!(t.text, "성별과 나이");
        assert_eq!(t.quota, 42);

        let no_quota = parse_transcript(r#"{"text":"hi"}"#).unwrap();
        assert_eq!(no_quota.quota, 0);
    }

    #[test]
    fn parse_transcript_rejects_malformed_payload() {
        assert!(matches!(parse_transcript("<html>bad gateway</html>"), Err(VoiceError::Transcription(_))));
        assert!(matches!(parse_transcript(r#"{"quota":1}"#), Err(VoiceError::Transcription(_))));
    }
}

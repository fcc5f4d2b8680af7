use std::sync::Mutex;

use anyhow::{anyhow, Result};
use base64::Engine as _;

use crate::images::ImageSource;
use crate::vision::{Credentials, RequestPart, VisionClient, VisionReply, VisionRequest};

/// Vision client double that records every request and answers with a
/// canned reply or error.
pub(crate) struct RecordingClient {
    reply: std::result::Result<String, String>,
    requests: Mutex<Vec<VisionRequest>>,
}

impl RecordingClient {
    pub(crate) fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }

    pub(crate) fn last_request(&self) -> VisionRequest {
        self.requests
            .lock()
            .expect("requests lock")
            .last()
            .cloned()
            .expect("a recorded request")
    }
}

impl VisionClient for RecordingClient {
    fn complete(&self, _credentials: &Credentials, request: &VisionRequest) -> Result<VisionReply> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        match &self.reply {
            Ok(text) => Ok(VisionReply {
                text: text.clone(),
                model: request.model.clone(),
                input_tokens: Some(812),
                output_tokens: Some(64),
            }),
            Err(message) => Err(anyhow!(message.clone())),
        }
    }
}

pub(crate) fn inline_image(bytes: &[u8]) -> ImageSource {
    ImageSource::Inline {
        data: base64::engine::general_purpose::STANDARD.encode(bytes),
        mime: "image/png".to_string(),
    }
}

pub(crate) fn part_labels(request: &VisionRequest) -> Vec<String> {
    request
        .parts
        .iter()
        .map(|part| match part {
            RequestPart::Text(text) => text.lines().next().unwrap_or_default().to_string(),
            RequestPart::Image(image) => format!("<image {}>", String::from_utf8_lossy(&image.bytes)),
        })
        .collect()
}

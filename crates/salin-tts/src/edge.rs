//! Microsoft Edge neural TTS over its public WebSocket endpoint
//!
//! The service speaks a framed protocol: two text messages configure the
//! session (speech.config, then SSML), after which audio arrives as
//! binary frames carrying MP3 data behind a small header. A text message
//! containing `Path:turn.end` terminates the turn.

use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use salin_audio::PcmAudio;
use salin_foundation::ShutdownToken;
use tracing::debug;
use tungstenite::Message;

use crate::decode::decode_mp3;
use crate::error::{TtsError, TtsResult};
use crate::speaker::SynthesisBackend;

const EDGE_TTS_HOST: &str = "speech.platform.bing.com";
const TRUSTED_CLIENT_TOKEN: &str = "6A5AA1D4EAFF4E9FB37E23D68491D6F4";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Socket read timeout; bounds how long a cancellation can go unnoticed
/// while waiting for the next frame.
const READ_POLL: Duration = Duration::from_millis(500);
/// A turn that goes this long without any message is treated as a dropped
/// connection.
const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(15);

/// Synthesis backend that fetches MP3 audio from Edge TTS and decodes it
/// to PCM. One WebSocket connection per utterance.
pub struct EdgeBackend {
    voice: String,
}

impl EdgeBackend {
    pub fn new(voice: impl Into<String>) -> Self {
        Self {
            voice: voice.into(),
        }
    }

    fn fetch_mp3(&self, text: &str, token: &ShutdownToken) -> TtsResult<Vec<u8>> {
        let url = connection_url();
        let addr = (EDGE_TTS_HOST, 443)
            .to_socket_addrs()
            .map_err(|e| TtsError::Connect(format!("resolving {}: {}", EDGE_TTS_HOST, e)))?
            .next()
            .ok_or_else(|| TtsError::Connect(format!("no address for {}", EDGE_TTS_HOST)))?;

        let tcp = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
            .map_err(|e| TtsError::Connect(e.to_string()))?;
        tcp.set_read_timeout(Some(READ_POLL))
            .map_err(|e| TtsError::Connect(e.to_string()))?;
        tcp.set_nodelay(true)
            .map_err(|e| TtsError::Connect(e.to_string()))?;

        let connector =
            native_tls::TlsConnector::new().map_err(|e| TtsError::Connect(e.to_string()))?;
        let tls = connector
            .connect(EDGE_TTS_HOST, tcp)
            .map_err(|e| TtsError::Connect(e.to_string()))?;

        let (mut socket, _response) = tungstenite::client(url.as_str(), tls).map_err(|e| match e {
            tungstenite::HandshakeError::Failure(tungstenite::Error::Http(resp)) => {
                TtsError::Rejected(format!("handshake returned HTTP {}", resp.status()))
            }
            other => TtsError::Connect(other.to_string()),
        })?;

        socket
            .send(Message::Text(speech_config_message().into()))
            .map_err(ws_error)?;
        socket
            .send(Message::Text(
                ssml_message(&new_request_id(), &self.voice, text).into(),
            ))
            .map_err(ws_error)?;

        let mut mp3 = Vec::new();
        let mut last_data = Instant::now();

        loop {
            if token.is_cancelled() {
                return Err(TtsError::Cancelled);
            }
            if last_data.elapsed() > INACTIVITY_TIMEOUT {
                return Err(TtsError::Connect(
                    "synthesis service went silent mid-stream".to_string(),
                ));
            }

            match socket.read() {
                Ok(Message::Binary(frame)) => {
                    last_data = Instant::now();
                    if let Some(payload) = extract_audio_payload(&frame) {
                        mp3.extend_from_slice(payload);
                    }
                }
                Ok(Message::Text(control)) => {
                    last_data = Instant::now();
                    if control.contains("Path:turn.end") {
                        break;
                    }
                }
                Ok(Message::Close(_)) => break,
                Err(tungstenite::Error::Io(ref e))
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(e) => return Err(ws_error(e)),
                _ => {}
            }
        }

        let _ = socket.close(None);
        debug!(bytes = mp3.len(), voice = %self.voice, "Fetched synthesis audio");
        Ok(mp3)
    }
}

impl SynthesisBackend for EdgeBackend {
    fn synthesize(&self, text: &str, token: &ShutdownToken) -> TtsResult<PcmAudio> {
        if token.is_cancelled() {
            return Err(TtsError::Cancelled);
        }
        let mp3 = self.fetch_mp3(text, token)?;
        if mp3.is_empty() {
            return Err(TtsError::NoAudio);
        }
        decode_mp3(&mp3)
    }
}

fn ws_error(e: tungstenite::Error) -> TtsError {
    match e {
        tungstenite::Error::Http(resp) => {
            TtsError::Rejected(format!("synthesis service returned HTTP {}", resp.status()))
        }
        other => TtsError::Connect(other.to_string()),
    }
}

fn connection_url() -> String {
    format!(
        "wss://{}/consumer/speech/synthesize/readaloud/edge/v1?TrustedClientToken={}&ConnectionId={}",
        EDGE_TTS_HOST, TRUSTED_CLIENT_TOKEN, new_request_id()
    )
}

fn new_request_id() -> String {
    format!(
        "{:032x}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    )
}

fn timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

fn speech_config_message() -> String {
    format!(
        "X-Timestamp:{}\r\nContent-Type:application/json; charset=utf-8\r\nPath:speech.config\r\n\r\n\
         {{\"context\":{{\"synthesis\":{{\"audio\":{{\"metadataoptions\":{{\"sentenceBoundaryEnabled\":\"false\",\"wordBoundaryEnabled\":\"false\"}},\"outputFormat\":\"audio-24khz-48kbitrate-mono-mp3\"}}}}}}}}",
        timestamp()
    )
}

fn ssml_message(request_id: &str, voice: &str, text: &str) -> String {
    let ssml = format!(
        "<speak version=\"1.0\" xmlns=\"http://www.w3.org/2001/10/synthesis\" xml:lang=\"en-US\">\
         <voice name=\"{}\"><prosody pitch=\"+0Hz\" rate=\"+0%\" volume=\"+0%\">{}</prosody></voice></speak>",
        voice,
        escape_xml(text)
    );
    format!(
        "X-RequestId:{}\r\nContent-Type:application/ssml+xml\r\nX-Timestamp:{}\r\nPath:ssml\r\n\r\n{}",
        request_id,
        timestamp(),
        ssml
    )
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Binary frame format: 2-byte big-endian header length, header text,
/// then the payload. Only frames whose header carries `Path:audio` hold
/// MP3 data.
fn extract_audio_payload(frame: &[u8]) -> Option<&[u8]> {
    if frame.len() < 2 {
        return None;
    }
    let header_len = u16::from_be_bytes([frame[0], frame[1]]) as usize;
    let audio_start = 2 + header_len;
    if frame.len() <= audio_start {
        return None;
    }
    let header = &frame[2..audio_start];
    if header.windows(11).any(|w| w == b"Path:audio\r") {
        Some(&frame[audio_start..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_frame(header: &[u8], payload: &[u8]) -> Vec<u8> {
        let mut frame = (header.len() as u16).to_be_bytes().to_vec();
        frame.extend_from_slice(header);
        frame.extend_from_slice(payload);
        frame
    }

    #[test]
    fn audio_frames_yield_their_payload() {
        let frame = binary_frame(b"X-RequestId:abc\r\nPath:audio\r\n", b"MP3DATA");
        assert_eq!(extract_audio_payload(&frame), Some(&b"MP3DATA"[..]));
    }

    #[test]
    fn non_audio_frames_are_ignored() {
        let frame = binary_frame(b"Path:metadata\r\n", b"{}");
        assert_eq!(extract_audio_payload(&frame), None);
    }

    #[test]
    fn truncated_frames_are_ignored() {
        assert_eq!(extract_audio_payload(&[0x00]), None);
        // Header length pointing past the end of the frame.
        let frame = binary_frame(b"Path:audio\r\n", b"");
        assert_eq!(extract_audio_payload(&frame), None);
    }

    #[test]
    fn xml_special_characters_are_escaped() {
        assert_eq!(
            escape_xml("Tom & Jerry's <show> \"live\""),
            "Tom &amp; Jerry&apos;s &lt;show&gt; &quot;live&quot;"
        );
    }

    #[test]
    fn ssml_message_carries_voice_and_escaped_text() {
        let msg = ssml_message("req-1", "fil-PH-BlessicaNeural", "Kumusta & salamat");
        assert!(msg.contains("Path:ssml"));
        assert!(msg.contains("X-RequestId:req-1"));
        assert!(msg.contains("<voice name=\"fil-PH-BlessicaNeural\">"));
        assert!(msg.contains("Kumusta &amp; salamat"));
        assert!(msg.contains("pitch=\"+0Hz\""));
    }

    #[test]
    fn speech_config_requests_mono_mp3() {
        let msg = speech_config_message();
        assert!(msg.contains("Path:speech.config"));
        assert!(msg.contains("audio-24khz-48kbitrate-mono-mp3"));
    }

    #[test]
    fn connection_url_carries_token_and_id() {
        let url = connection_url();
        assert!(url.starts_with("wss://speech.platform.bing.com/"));
        assert!(url.contains(TRUSTED_CLIENT_TOKEN));
        assert!(url.contains("ConnectionId="));
    }
}

//! MP3 to PCM decoding for fetched synthesis audio

use std::io::Cursor;

use minimp3::{Decoder, Frame};
use salin_audio::PcmAudio;

use crate::error::{TtsError, TtsResult};

/// Decode an MP3 byte stream into mono PCM at the stream's native rate.
///
/// Decoding stops at the first unreadable frame; whatever decoded before
/// it still plays. A stream with no decodable frames at all reports
/// `NoAudio` so the caller can retry the fetch.
pub fn decode_mp3(data: &[u8]) -> TtsResult<PcmAudio> {
    let mut decoder = Decoder::new(Cursor::new(data));
    let mut samples: Vec<i16> = Vec::new();
    let mut sample_rate = 24_000u32;

    loop {
        match decoder.next_frame() {
            Ok(Frame {
                data,
                sample_rate: rate,
                channels,
                ..
            }) => {
                sample_rate = rate as u32;
                samples.extend(downmix_to_mono(data, channels));
            }
            Err(minimp3::Error::Eof) => break,
            Err(_) => break,
        }
    }

    if samples.is_empty() {
        return Err(TtsError::NoAudio);
    }

    Ok(PcmAudio {
        samples,
        sample_rate,
    })
}

fn downmix_to_mono(data: Vec<i16>, channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return data;
    }
    data.chunks(channels)
        .map(|frame| (frame.iter().map(|&s| s as i32).sum::<i32>() / channels as i32) as i16)
        .collect()
}

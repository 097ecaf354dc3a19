use super::{AudioDecoder, DecodeError, DecodedAudio};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::{Cursor, ErrorKind};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// MP3 decoder running on the blocking pool
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AudioDecoder for SymphoniaDecoder {
    async fn decode(&self, encoded: Bytes) -> Result<DecodedAudio, DecodeError> {
        tokio::task::spawn_blocking(move || decode_blocking(encoded))
            .await
            .map_err(|e| DecodeError::Malformed(format!("decode task failed: {e}")))?
    }
}

fn decode_blocking(encoded: Bytes) -> Result<DecodedAudio, DecodeError> {
    let encoded_size = encoded.len();
    let mss = MediaSourceStream::new(Box::new(Cursor::new(encoded)), Default::default());

    let mut hint = Hint::new();
    hint.with_extension("mp3");

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoAudioTrack)?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;

    let mut channels = codec_params.channels.map(|c| c.count() as u16).unwrap_or(1);
    let mut sample_rate = codec_params.sample_rate.unwrap_or(0);
    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(DecodeError::Malformed(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(buffer) => {
                let spec = *buffer.spec();
                channels = spec.channels.count() as u16;
                sample_rate = spec.rate;

                let mut sample_buffer = SampleBuffer::<f32>::new(buffer.capacity() as u64, spec);
                sample_buffer.copy_interleaved_ref(buffer);
                samples.extend_from_slice(sample_buffer.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::debug!(error = %e, "Skipping undecodable packet");
            }
            Err(e) => return Err(DecodeError::Malformed(e.to_string())),
        }
    }

    if samples.is_empty() || sample_rate == 0 {
        return Err(DecodeError::Malformed("no audio frames decoded".to_string()));
    }

    let audio = DecodedAudio::new(channels, sample_rate, samples);
    tracing::debug!(
        encoded_size,
        channels = audio.channels,
        sample_rate = audio.sample_rate,
        duration_ms = audio.duration().as_millis(),
        "Audio decoded"
    );

    Ok(audio)
}

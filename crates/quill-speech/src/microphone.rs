//! Microphone recognizer: default input device plus a remote transcription
//! endpoint.
//!
//! Audio is captured with `cpal` on a dedicated thread (the stream handle is
//! not `Send` on every platform), cut into fixed-length chunks, encoded as WAV
//! and posted to an OpenAI-compatible `/audio/transcriptions` endpoint. Each
//! non-empty transcription is pushed as a recognized segment, in chunk order.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use futures::stream::{FuturesOrdered, StreamExt};
use hound::{SampleFormat as HoundSampleFormat, WavSpec, WavWriter};
use quill_core::{QuillError, Result};
use reqwest::Client;
use serde_json::Value;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::recognizer::{EventSender, RecognitionEvent, Recognizer};

/// Chunks shorter than this are dropped when flushing at stop.
const MIN_FLUSH_SECS: f32 = 0.5;

/// Settings for the microphone recognizer.
#[derive(Debug, Clone)]
pub struct MicrophoneConfig {
    pub endpoint: String,
    pub model: String,
    /// BCP-47 locale; only the primary language subtag is sent.
    pub language: String,
    pub chunk_duration_secs: u32,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct AudioFormat {
    sample_rate: u32,
    channels: u16,
}

struct ActiveCapture {
    stop_capture: std::sync::mpsc::Sender<()>,
    chunker: JoinHandle<()>,
}

/// Continuous recognizer over the default input device.
pub struct MicrophoneRecognizer {
    config: MicrophoneConfig,
    client: Client,
    active: Mutex<Option<ActiveCapture>>,
}

impl MicrophoneRecognizer {
    pub fn new(config: MicrophoneConfig) -> Self {
        Self {
            config,
            client: Client::new(),
            active: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Recognizer for MicrophoneRecognizer {
    fn name(&self) -> &str {
        "microphone"
    }

    async fn start(&self, events: EventSender) -> Result<()> {
        let mut active = self.active.lock().await;
        if active.is_some() {
            return Err(QuillError::Recognition(
                "microphone capture already running".to_string(),
            ));
        }

        let (sample_tx, sample_rx) = unbounded_channel::<Vec<f32>>();
        let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();
        let (ready_tx, ready_rx) = oneshot::channel::<std::result::Result<AudioFormat, String>>();

        std::thread::spawn(move || run_capture(sample_tx, stop_rx, ready_tx));

        let format = ready_rx
            .await
            .map_err(|_| QuillError::Recognition("capture thread exited".to_string()))?
            .map_err(QuillError::Recognition)?;

        tracing::info!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            "Microphone capture started"
        );

        let transcriber = Arc::new(ChunkTranscriber {
            client: self.client.clone(),
            config: self.config.clone(),
            format,
        });
        let samples_per_chunk = (format.sample_rate as usize)
            .saturating_mul(self.config.chunk_duration_secs.max(1) as usize)
            .saturating_mul(format.channels as usize);
        let chunker = tokio::spawn(run_chunker(sample_rx, events, transcriber, samples_per_chunk));

        *active = Some(ActiveCapture {
            stop_capture: stop_tx,
            chunker,
        });
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let Some(capture) = self.active.lock().await.take() else {
            return Ok(());
        };
        // Dropping the stream closes the sample channel; the chunker then
        // flushes the partial chunk and waits for in-flight requests.
        let _ = capture.stop_capture.send(());
        capture
            .chunker
            .await
            .map_err(|e| QuillError::Recognition(format!("chunker task failed: {}", e)))?;
        tracing::info!("Microphone capture stopped");
        Ok(())
    }
}

fn run_capture(
    sender: UnboundedSender<Vec<f32>>,
    stop: std::sync::mpsc::Receiver<()>,
    ready: oneshot::Sender<std::result::Result<AudioFormat, String>>,
) {
    let stream = match build_input_stream(sender) {
        Ok((stream, format)) => {
            let _ = ready.send(Ok(format));
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    // Block until stop is requested or the recognizer is dropped.
    let _ = stop.recv();
    drop(stream);
}

fn build_input_stream(
    sender: UnboundedSender<Vec<f32>>,
) -> std::result::Result<(cpal::Stream, AudioFormat), String> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| "no default input device".to_string())?;
    let input_config = device
        .default_input_config()
        .map_err(|e| format!("failed to read input configuration: {}", e))?;

    let stream_config: StreamConfig = input_config.clone().into();
    let format = AudioFormat {
        sample_rate: stream_config.sample_rate.0,
        channels: stream_config.channels,
    };
    let err_fn = |err: cpal::StreamError| tracing::warn!(error = %err, "Input stream error");

    let stream = match input_config.sample_format() {
        SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _| {
                let _ = sender.send(data.to_vec());
            },
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _| {
                let scale = 1.0 / i16::MAX as f32;
                let _ = sender.send(data.iter().map(|s| *s as f32 * scale).collect());
            },
            err_fn,
            None,
        ),
        SampleFormat::U16 => device.build_input_stream(
            &stream_config,
            move |data: &[u16], _| {
                const MIDPOINT: f32 = 32768.0;
                let _ = sender.send(data.iter().map(|s| (*s as f32 - MIDPOINT) / MIDPOINT).collect());
            },
            err_fn,
            None,
        ),
        other => return Err(format!("input sample format {:?} is not supported", other)),
    }
    .map_err(|e| format!("failed to build input stream: {}", e))?;

    stream
        .play()
        .map_err(|e| format!("failed to start input stream: {}", e))?;
    Ok((stream, format))
}

struct ChunkTranscriber {
    client: Client,
    config: MicrophoneConfig,
    format: AudioFormat,
}

impl ChunkTranscriber {
    async fn transcribe(self: Arc<Self>, samples: Vec<f32>, chunk_id: usize) -> Result<String> {
        let wav = encode_wav(&samples, self.format.sample_rate, self.format.channels)?;
        let part = reqwest::multipart::Part::bytes(wav)
            .file_name(format!("chunk-{chunk_id}.wav"))
            .mime_str("audio/wav")
            .map_err(|e| QuillError::Recognition(e.to_string()))?;
        let mut form = reqwest::multipart::Form::new()
            .text("model", self.config.model.clone())
            .part("file", part);
        if let Some(lang) = self.config.language.split('-').next().filter(|l| !l.is_empty()) {
            form = form.text("language", lang.to_lowercase());
        }

        let mut request = self.client.post(&self.config.endpoint).multipart(form);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| QuillError::Recognition(e.to_string()))?;
        let payload: Value = response
            .json()
            .await
            .map_err(|e| QuillError::Recognition(e.to_string()))?;
        Ok(payload
            .get("text")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_string())
    }
}

async fn run_chunker(
    mut samples: UnboundedReceiver<Vec<f32>>,
    events: EventSender,
    transcriber: Arc<ChunkTranscriber>,
    samples_per_chunk: usize,
) {
    let mut buffer: Vec<f32> = Vec::with_capacity(samples_per_chunk * 2);
    let mut pending = FuturesOrdered::new();
    let mut chunk_id = 0usize;

    loop {
        tokio::select! {
            data = samples.recv() => match data {
                Some(data) => {
                    buffer.extend(data);
                    while buffer.len() >= samples_per_chunk {
                        let chunk: Vec<f32> = buffer.drain(..samples_per_chunk).collect();
                        pending.push_back(transcriber.clone().transcribe(chunk, chunk_id));
                        chunk_id += 1;
                    }
                }
                None => break,
            },
            Some(result) = pending.next(), if !pending.is_empty() => forward(&events, result),
        }
    }

    let format = transcriber.format;
    let min_samples =
        (format.sample_rate as f32 * format.channels as f32 * MIN_FLUSH_SECS) as usize;
    if buffer.len() >= min_samples {
        pending.push_back(transcriber.clone().transcribe(std::mem::take(&mut buffer), chunk_id));
    }
    while let Some(result) = pending.next().await {
        forward(&events, result);
    }
}

/// Pass a chunk's text on as a recognized segment.
///
/// A failed chunk is logged and skipped; later chunks in the turn still count.
fn forward(events: &EventSender, result: Result<String>) {
    match result {
        Ok(text) if text.is_empty() => {}
        Ok(text) => {
            let _ = events.send(RecognitionEvent::Recognized(text));
        }
        Err(e) => {
            tracing::warn!(error = %e, "Chunk transcription failed; skipping chunk");
        }
    }
}

fn encode_wav(samples: &[f32], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: HoundSampleFormat::Int,
    };
    let wav_err = |e: hound::Error| QuillError::Recognition(format!("WAV encoding failed: {}", e));
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut buffer, spec).map_err(wav_err)?;
        for &sample in samples {
            let amplitude = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer.write_sample(amplitude).map_err(wav_err)?;
        }
        writer.finalize().map_err(wav_err)?;
    }
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_wav_header_and_length() {
        let samples = vec![0.0, 0.5, -0.5, 2.0];
        let wav = encode_wav(&samples, 16_000, 1).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        // 44-byte header plus two bytes per sample.
        assert_eq!(wav.len(), 44 + samples.len() * 2);
    }

    #[test]
    fn test_forward_skips_empty_and_failed_chunks() {
        let (tx, mut rx) = unbounded_channel();
        forward(&tx, Ok(String::new()));
        forward(&tx, Ok("hello".to_string()));
        forward(&tx, Err(QuillError::Recognition("HTTP 401".into())));
        forward(&tx, Ok("again".to_string()));
        drop(tx);

        assert_eq!(
            rx.try_recv().unwrap(),
            RecognitionEvent::Recognized("hello".into())
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            RecognitionEvent::Recognized("again".into())
        );
        assert!(rx.try_recv().is_err());
    }
}

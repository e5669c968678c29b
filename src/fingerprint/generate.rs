use anyhow::{Context, Result};
use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::Fingerprint;

/// Fixed analysis FFT size for fingerprinting; independent of the live
/// analyser's configured size so fingerprints stay comparable.
const FFT_SIZE: usize = 1024;
/// Only bins 1..=100 (~0-4.3 kHz at 44.1 kHz) are scanned: bin 0 is DC, and
/// the low spectrum is where dominant content sits regardless of genre.
const SCAN_LO: usize = 1;
const SCAN_HI: usize = 100;
/// dB window of the byte magnitude scale (0 maps to -100 dB, 255 to -30 dB).
const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;

/// Deterministic, offline fingerprint extraction from a decodable clip.
pub struct FingerprintGenerator {
    noise_floor: u8,
}

impl FingerprintGenerator {
    pub fn new(noise_floor: u8) -> Self {
        Self { noise_floor }
    }

    /// Fingerprint a clip. Never fails: decode or render problems are logged
    /// and yield an empty fingerprint, indistinguishable from a clip too
    /// short or too quiet to fingerprint.
    pub fn generate(&self, clip: &[u8]) -> Fingerprint {
        match self.try_generate(clip) {
            Ok(fp) => fp,
            Err(err) => {
                log::warn!("Fingerprinting failed: {:#}", err);
                Fingerprint::new()
            }
        }
    }

    fn try_generate(&self, clip: &[u8]) -> Result<Fingerprint> {
        let samples = decode_clip(clip)?;
        let hann = hann_window(FFT_SIZE);
        let noise_floor = self.noise_floor;

        // Non-overlapping blocks; each finds its dominant low bin. The set
        // union is order-independent, so the parallel scan stays
        // deterministic for identical input bytes.
        let bins: Vec<u32> = samples
            .par_chunks_exact(FFT_SIZE)
            .filter_map(|block| {
                let mut buffer: Vec<Complex<f32>> = block
                    .iter()
                    .enumerate()
                    .map(|(i, &s)| Complex::new(s * hann[i], 0.0))
                    .collect();
                // Per-worker planner (rayon-safe).
                let mut planner = FftPlanner::<f32>::new();
                planner.plan_fft_forward(FFT_SIZE).process(&mut buffer);

                let mut peak_bin = 0usize;
                let mut peak_mag = 0u8;
                for bin in SCAN_LO..=SCAN_HI {
                    let mag = byte_magnitude(buffer[bin].norm());
                    if mag > peak_mag {
                        peak_mag = mag;
                        peak_bin = bin;
                    }
                }
                (peak_mag > noise_floor).then_some(peak_bin as u32)
            })
            .collect();

        let fingerprint: Fingerprint = bins.into_iter().collect();
        log::debug!(
            "Fingerprinted {} samples into {} bins",
            samples.len(),
            fingerprint.len()
        );
        Ok(fingerprint)
    }
}

/// Map a linear FFT magnitude onto the 0-255 byte scale used by live
/// analyser snapshots, so the noise floor means the same thing in both
/// domains.
fn byte_magnitude(norm: f32) -> u8 {
    let mag = norm / FFT_SIZE as f32;
    let db = 20.0 * mag.max(1e-10).log10();
    let scaled = (db - MIN_DB) / (MAX_DB - MIN_DB) * 255.0;
    scaled.clamp(0.0, 255.0) as u8
}

/// Decode an in-memory clip to mono f32 PCM.
fn decode_clip(clip: &[u8]) -> Result<Vec<f32>> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(clip.to_vec())), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("Failed to probe clip format")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .context("No audio tracks in clip")?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count());

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create clip decoder")?;

    let mut all_samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        let samples = sample_buf.samples();

        if channels == 1 {
            all_samples.extend_from_slice(samples);
        } else {
            for frame_samples in samples.chunks(channels) {
                let mono: f32 = frame_samples.iter().sum::<f32>() / channels as f32;
                all_samples.push(mono);
            }
        }
    }

    Ok(all_samples)
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos()))
        .collect()
}

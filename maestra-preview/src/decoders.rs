// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Decoders for the datagram formats a preview proxy may see on its UDP
//! data plane, one per proxyable stream type (`sensor`, `data`/`osc`/
//! `midi`, `audio`), plus the `raw` fallback for anything that fails to
//! parse. Byte layouts here must match the publisher side exactly;
//! the SDRF layout is grounded in the reference `rtl-sdr` publisher's
//! `pack_spectrum_packet`.

use serde_json::{json, Value};

/// `"SDRF"` read as a little-endian `u32`.
pub const SDRF_MAGIC: u32 = 0x5344_5246;

/// `magic(4) + seq(4) + center_freq(8) + sample_rate(8) + reserved(8) +
/// fft_size(4)`, before the `fft_size` trailing `f32` bins.
pub const SDRF_HEADER_LEN: usize = 36;

/// One decoded spectrum frame: a sequence number, the sweep's center
/// frequency and sample rate, and one power reading per FFT bin.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFrame {
    pub seq: u32,
    pub center_freq: f64,
    pub sample_rate: f64,
    pub power_db: Vec<f32>,
}

impl SpectrumFrame {
    /// Packs this frame into its wire form: little-endian
    /// `u32 magic, u32 seq, f64 center_freq, f64 sample_rate, f64
    /// reserved(=0.0), u32 fft_size`, followed by `fft_size` little-endian
    /// `f32` power readings.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(SDRF_HEADER_LEN + self.power_db.len() * 4);
        buf.extend_from_slice(&SDRF_MAGIC.to_le_bytes());
        buf.extend_from_slice(&self.seq.to_le_bytes());
        buf.extend_from_slice(&self.center_freq.to_le_bytes());
        buf.extend_from_slice(&self.sample_rate.to_le_bytes());
        buf.extend_from_slice(&0f64.to_le_bytes());
        #[allow(clippy::cast_possible_truncation)]
        let fft_size = self.power_db.len() as u32;
        buf.extend_from_slice(&fft_size.to_le_bytes());
        for bin in &self.power_db {
            buf.extend_from_slice(&bin.to_le_bytes());
        }
        buf
    }

    /// Parses a datagram as an SDRF frame.
    ///
    /// Returns `None` if the magic doesn't match or the datagram is
    /// shorter than the header plus its declared bin count requires.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < SDRF_HEADER_LEN {
            return None;
        }
        let magic = u32::from_le_bytes(bytes[0..4].try_into().ok()?);
        if magic != SDRF_MAGIC {
            return None;
        }
        let seq = u32::from_le_bytes(bytes[4..8].try_into().ok()?);
        let center_freq = f64::from_le_bytes(bytes[8..16].try_into().ok()?);
        let sample_rate = f64::from_le_bytes(bytes[16..24].try_into().ok()?);
        let fft_size = u32::from_le_bytes(bytes[32..36].try_into().ok()?) as usize;
        if bytes.len() < SDRF_HEADER_LEN + fft_size * 4 {
            return None;
        }
        let mut power_db = Vec::with_capacity(fft_size);
        for i in 0..fft_size {
            let start = SDRF_HEADER_LEN + i * 4;
            power_db.push(f32::from_le_bytes(bytes[start..start + 4].try_into().ok()?));
        }
        Some(Self { seq, center_freq, sample_rate, power_db })
    }

    fn to_json(&self) -> Value {
        json!({
            "type": "sensor",
            "seq": self.seq,
            "center_freq": self.center_freq,
            "sample_rate": self.sample_rate,
            "fft_size": self.power_db.len(),
            "power_db": self.power_db,
        })
    }
}

/// Decodes a `sensor`-type datagram, falling back to [`decode_raw`] if it
/// isn't a well-formed SDRF frame.
#[must_use]
pub fn decode_sensor(bytes: &[u8]) -> Value {
    SpectrumFrame::decode(bytes).map_or_else(|| decode_raw(bytes), |frame| frame.to_json())
}

/// Decodes a `data`/`osc`/`midi`-type datagram as UTF-8 JSON. An object
/// root passes through unchanged; any other root (array, string, number)
/// is wrapped as `{"payload": …}`. Falls back to [`decode_raw`] if the
/// bytes aren't valid UTF-8 JSON at all.
#[must_use]
pub fn decode_json_like(bytes: &[u8]) -> Value {
    let Ok(text) = std::str::from_utf8(bytes) else {
        return decode_raw(bytes);
    };
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Value::Object(map),
        Ok(other) => json!({ "payload": other }),
        Err(_) => decode_raw(bytes),
    }
}

/// Decodes an `audio`-type datagram as little-endian signed 16-bit PCM.
/// Reports `rms_db`/`peak_db` (dBFS relative to full scale `32768`,
/// floored at `1e-12` before the log to avoid `-inf` on silence) plus
/// `rms_level`/`peak_level` normalised to `[0, 1]`, and the sample count.
#[must_use]
pub fn decode_audio(bytes: &[u8]) -> Value {
    let samples: Vec<i16> = bytes.chunks_exact(2).map(|c| i16::from_le_bytes([c[0], c[1]])).collect();
    if samples.is_empty() {
        return json!({
            "type": "audio",
            "sample_count": 0,
            "rms_db": -240.0,
            "peak_db": -240.0,
            "rms_level": 0.0,
            "peak_level": 0.0,
        });
    }

    let full_scale = 32768.0_f64;
    let sum_squares: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    let rms = (sum_squares / samples.len() as f64).sqrt();
    let peak = samples.iter().map(|&s| f64::from(s.unsigned_abs())).fold(0.0_f64, f64::max);

    let rms_level = (rms / full_scale).max(0.0).min(1.0);
    let peak_level = (peak / full_scale).max(0.0).min(1.0);
    let rms_db = 20.0 * (rms_level.max(1e-12)).log10();
    let peak_db = 20.0 * (peak_level.max(1e-12)).log10();

    json!({
        "type": "audio",
        "sample_count": samples.len(),
        "rms_db": rms_db,
        "peak_db": peak_db,
        "rms_level": rms_level,
        "peak_level": peak_level,
    })
}

/// The fallback for an unknown stream type or a decode failure: the byte
/// length plus the first 256 bytes hex-encoded.
#[must_use]
pub fn decode_raw(bytes: &[u8]) -> Value {
    let prefix = &bytes[..bytes.len().min(256)];
    let hex: String = prefix.iter().map(|b| format!("{b:02x}")).collect();
    json!({
        "type": "raw",
        "size": bytes.len(),
        "hex": hex,
    })
}

/// Dispatches on `stream_type` to the matching decoder.
#[must_use]
pub fn decode_for_stream_type(stream_type: &str, bytes: &[u8]) -> Value {
    match stream_type {
        "sensor" => decode_sensor(bytes),
        "data" | "osc" | "midi" => decode_json_like(bytes),
        "audio" => decode_audio(bytes),
        _ => decode_raw(bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn spectrum_frame_round_trips() {
        let frame = SpectrumFrame { seq: 42, center_freq: 100_000_000.0, sample_rate: 2_400_000.0, power_db: vec![-90.5, -80.25, -70.0] };
        let bytes = frame.encode();
        assert_eq!(bytes.len(), SDRF_HEADER_LEN + 12);
        let decoded = SpectrumFrame::decode(&bytes).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn spectrum_frame_rejects_wrong_magic() {
        let mut bytes = SpectrumFrame { seq: 1, center_freq: 1.0, sample_rate: 1.0, power_db: vec![1.0] }.encode();
        bytes[0] = 0;
        assert!(SpectrumFrame::decode(&bytes).is_none());
    }

    #[test]
    fn spectrum_frame_rejects_truncated_body() {
        let bytes = SpectrumFrame { seq: 1, center_freq: 1.0, sample_rate: 1.0, power_db: vec![1.0, 2.0] }.encode();
        assert!(SpectrumFrame::decode(&bytes[..bytes.len() - 1]).is_none());
    }

    #[test]
    fn decode_sensor_falls_back_to_raw_on_bad_magic() {
        let value = decode_sensor(b"not a spectrum frame at all");
        assert_eq!(value["type"], "raw");
    }

    #[test]
    fn decode_json_like_passes_through_object_root() {
        let value = decode_json_like(br#"{"note": 60, "velocity": 100}"#);
        assert_eq!(value["note"], 60);
    }

    #[test]
    fn decode_json_like_wraps_non_object_root() {
        let value = decode_json_like(b"42");
        assert_eq!(value["payload"], 42);
    }

    #[test]
    fn decode_json_like_falls_back_to_raw_on_invalid_utf8() {
        let value = decode_json_like(&[0xff, 0xfe, 0xfd]);
        assert_eq!(value["type"], "raw");
    }

    #[test]
    fn decode_audio_reports_full_scale_square_wave() {
        let samples: Vec<u8> = [i16::MAX, i16::MIN, i16::MAX, i16::MIN].iter().flat_map(|s| s.to_le_bytes()).collect();
        let value = decode_audio(&samples);
        assert_eq!(value["sample_count"], 4);
        assert!(value["rms_level"].as_f64().unwrap() > 0.99);
        assert!(value["peak_level"].as_f64().unwrap() > 0.99);
    }

    #[test]
    fn decode_audio_handles_silence_without_producing_infinite_db() {
        let value = decode_audio(&[0, 0, 0, 0]);
        assert!(value["rms_db"].as_f64().unwrap().is_finite());
        assert!(value["peak_db"].as_f64().unwrap().is_finite());
    }

    #[test]
    fn decode_raw_truncates_hex_to_256_bytes() {
        let bytes = vec![0xab; 300];
        let value = decode_raw(&bytes);
        assert_eq!(value["size"], 300);
        assert_eq!(value["hex"].as_str().unwrap().len(), 256 * 2);
    }

    #[test_case("data", br#"{"a": 1}"#, "a"; "data passes object through")]
    #[test_case("osc", br#"{"address": "/1/fader1"}"#, "address"; "osc passes object through")]
    #[test_case("midi", br#"{"note": 60}"#, "note"; "midi passes object through")]
    fn dispatch_routes_json_like_types(stream_type: &str, bytes: &[u8], expected_key: &str) {
        let value = decode_for_stream_type(stream_type, bytes);
        assert!(value.get(expected_key).is_some());
    }

    #[test]
    fn dispatch_routes_unknown_type_to_raw() {
        assert_eq!(decode_for_stream_type("unknown-type", b"x")["type"], "raw");
    }
}

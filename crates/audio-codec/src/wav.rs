//! WAV file I/O.

use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, instrument, warn};

use echo_core::{AudioBuffer, AudioCodec, EchoError, EchoResult};

/// Size of a canonical PCM WAV header in bytes.
pub const WAV_HEADER_BYTES: u64 = 44;

/// Sample encoding used when writing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WavEncoding {
    /// 32-bit IEEE float, lossless for engine output.
    #[default]
    Float32,
    /// 16-bit signed integer PCM.
    Pcm16,
}

impl WavEncoding {
    fn spec(self, channels: u16, sample_rate: u32) -> WavSpec {
        match self {
            WavEncoding::Float32 => WavSpec {
                channels,
                sample_rate,
                bits_per_sample: 32,
                sample_format: SampleFormat::Float,
            },
            WavEncoding::Pcm16 => WavSpec {
                channels,
                sample_rate,
                bits_per_sample: 16,
                sample_format: SampleFormat::Int,
            },
        }
    }
}

/// Map a hound error: I/O stays I/O, everything else is a format problem.
fn map_hound(path: &Path, err: hound::Error) -> EchoError {
    match err {
        hound::Error::IoError(e) => EchoError::io(path, e),
        other => EchoError::audio_format(format!("{}: {other}", path.display())),
    }
}

fn pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// WAV codec backed by `hound`.
///
/// Saves go to a temporary file in the destination directory which is
/// renamed over the target once complete, so a failed save never leaves a
/// truncated file behind.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavCodec {
    encoding: WavEncoding,
}

impl WavCodec {
    pub fn new(encoding: WavEncoding) -> Self {
        Self { encoding }
    }

    pub fn encoding(&self) -> WavEncoding {
        self.encoding
    }

    fn check_writable(buffer: &AudioBuffer, sample_rate: u32) -> EchoResult<()> {
        if buffer.is_empty() {
            return Err(EchoError::invalid_request("cannot save an empty buffer"));
        }
        if sample_rate == 0 {
            return Err(EchoError::invalid_request("sample rate must be positive"));
        }
        if !buffer.is_finite() {
            return Err(EchoError::invalid_request(
                "buffer contains non-finite samples",
            ));
        }
        Ok(())
    }

    /// Encode into any seekable writer.
    pub fn write_to<W: Write + Seek>(
        &self,
        writer: W,
        buffer: &AudioBuffer,
        sample_rate: u32,
        path: &Path,
    ) -> EchoResult<()> {
        let spec = self.encoding.spec(buffer.channels, sample_rate);
        let mut wav = WavWriter::new(writer, spec).map_err(|e| map_hound(path, e))?;

        match self.encoding {
            WavEncoding::Float32 => {
                for &sample in buffer.samples.iter() {
                    wav.write_sample(sample).map_err(|e| map_hound(path, e))?;
                }
            }
            WavEncoding::Pcm16 => {
                let mut ints = wav.get_i16_writer(buffer.samples.len() as u32);
                for &sample in buffer.samples.iter() {
                    ints.write_sample(pcm16(sample));
                }
                ints.flush().map_err(|e| map_hound(path, e))?;
            }
        }

        wav.finalize().map_err(|e| map_hound(path, e))
    }

    /// Encode a buffer to an in-memory WAV image.
    pub fn encode_to_vec(&self, buffer: &AudioBuffer, sample_rate: u32) -> EchoResult<Vec<u8>> {
        Self::check_writable(buffer, sample_rate)?;
        let mut cursor = Cursor::new(Vec::new());
        self.write_to(&mut cursor, buffer, sample_rate, Path::new("<memory>"))?;
        Ok(cursor.into_inner())
    }

    /// Decode from any reader. Integer formats are scaled to `[-1, 1]`.
    pub fn read_from<R: Read>(reader: R, path: &Path) -> EchoResult<(AudioBuffer, u32)> {
        let mut wav = WavReader::new(reader).map_err(|e| map_hound(path, e))?;
        let spec = wav.spec();

        let samples: Vec<f32> = match spec.sample_format {
            SampleFormat::Int => {
                let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
                wav.samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / max_val))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| map_hound(path, e))?
            }
            SampleFormat::Float => wav
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| map_hound(path, e))?,
        };

        let buffer = AudioBuffer::interleaved(samples, spec.channels, spec.sample_rate)?;
        Ok((buffer, spec.sample_rate))
    }

    /// Decode an in-memory WAV image.
    pub fn decode_slice(bytes: &[u8]) -> EchoResult<(AudioBuffer, u32)> {
        Self::read_from(Cursor::new(bytes), Path::new("<memory>"))
    }
}

impl AudioCodec for WavCodec {
    #[instrument(skip(self, buffer), fields(path = %path.display(), samples = buffer.num_samples()))]
    fn save(&self, buffer: &AudioBuffer, path: &Path, sample_rate: u32) -> EchoResult<()> {
        Self::check_writable(buffer, sample_rate)?;
        if sample_rate != buffer.sample_rate {
            warn!(
                buffer_rate = buffer.sample_rate,
                header_rate = sample_rate,
                "saving with a sample rate different from the buffer's"
            );
        }

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| EchoError::io(path, e))?;

        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            self.write_to(&mut writer, buffer, sample_rate, path)?;
            writer.flush().map_err(|e| EchoError::io(path, e))?;
        }
        tmp.as_file()
            .sync_all()
            .map_err(|e| EchoError::io(path, e))?;
        tmp.persist(path).map_err(|e| EchoError::io(path, e.error))?;

        debug!(encoding = ?self.encoding, "wrote wav");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    fn load(&self, path: &Path) -> EchoResult<(AudioBuffer, u32)> {
        let file = std::fs::File::open(path).map_err(|e| EchoError::io(path, e))?;
        let (buffer, sample_rate) = Self::read_from(BufReader::new(file), path)?;
        debug!(samples = buffer.num_samples(), sample_rate, "read wav");
        Ok((buffer, sample_rate))
    }
}

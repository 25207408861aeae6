//! AIFF / AIFF-C decoder producing canonical linear-PCM WAV files.
//!
//! The container is big-endian and chunked: a `FORM` header with form type
//! `AIFF` or `AIFC`, followed by `tag + u32 size + payload` chunks padded to
//! even length. Only the `COMM` (format) and `SSND` (sample data) chunks are
//! read. Sample data is streamed in fixed-size chunks and byte-swapped to
//! little-endian unless the file already declares `sowt` samples.

use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::CoreError;

/// Rate used when the header carries an implausible sample rate.
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Plausible sample-rate band in Hz.
const MIN_SAMPLE_RATE: f64 = 800.0;
const MAX_SAMPLE_RATE: f64 = 768_000.0;

/// Size of the canonical WAV header written before the samples.
pub const WAV_HEADER_LEN: usize = 44;

/// Payload is copied in chunks of this size.
pub const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// channels(2) + frames(4) + bits(2) + rate(10)
const COMM_MIN_LEN: u32 = 18;
/// AIFF-C adds a 4-byte compression tag after the base fields.
const COMM_AIFC_MIN_LEN: u32 = 22;
const COMM_READ_LIMIT: u32 = 64;

/// Offset and block-size fields preceding the samples in `SSND`.
const SSND_SUBHEADER_LEN: u64 = 8;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from parsing or converting a legacy container.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("{0}")]
    Format(String),

    #[error("unsupported compression type '{0}'")]
    UnsupportedCompression(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<DecodeError> for CoreError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Format(msg) => CoreError::Format(msg),
            DecodeError::UnsupportedCompression(tag) => CoreError::UnsupportedCompression(tag),
            DecodeError::Io(e) => CoreError::Io(e),
        }
    }
}

fn format_err(msg: impl Into<String>) -> DecodeError {
    DecodeError::Format(msg.into())
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// Sample byte order declared by the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// `NONE`: big-endian PCM, swapped on output.
    None,
    /// `sowt`: little-endian PCM, copied unchanged.
    LittleEndian,
}

impl Compression {
    fn from_tag(tag: &[u8]) -> Result<Self, DecodeError> {
        match tag {
            b"NONE" => Ok(Self::None),
            b"sowt" => Ok(Self::LittleEndian),
            other => Err(DecodeError::UnsupportedCompression(
                String::from_utf8_lossy(other).into_owned(),
            )),
        }
    }
}

/// Format and payload location of a legacy container, derived from its
/// `COMM` and `SSND` chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioStreamDescriptor {
    pub channels: u16,
    pub frames: u32,
    pub bits_per_sample: u16,
    pub sample_rate: u32,
    pub compression: Compression,
    /// Absolute byte offset of the first sample in the source file.
    pub data_offset: u64,
    /// Reconciled payload length in bytes.
    pub data_len: u64,
    block_align: u16,
    byte_rate: u32,
}

impl AudioStreamDescriptor {
    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bits_per_sample).div_ceil(8)
    }

    pub fn block_align(&self) -> u16 {
        self.block_align
    }

    pub fn byte_rate(&self) -> u32 {
        self.byte_rate
    }

    /// Payload length rounded down to whole samples.
    pub fn aligned_data_len(&self) -> u64 {
        let width = self.bytes_per_sample() as u64;
        self.data_len - self.data_len % width
    }
}

// ---------------------------------------------------------------------------
// 80-bit extended float
// ---------------------------------------------------------------------------

/// Decode a big-endian IEEE 754 80-bit extended-precision float.
pub fn decode_extended(bytes: &[u8; 10]) -> f64 {
    let sign = if bytes[0] & 0x80 != 0 { -1.0 } else { 1.0 };
    let exponent = (u16::from(bytes[0] & 0x7f) << 8) | u16::from(bytes[1]);
    let hi = u32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
    let lo = u32::from_be_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]);

    if exponent == 0x7fff {
        return sign * f64::INFINITY;
    }
    if exponent == 0 && hi == 0 && lo == 0 {
        return 0.0;
    }

    let mantissa = ((u64::from(hi) << 32) | u64::from(lo)) as f64 / 2f64.powi(63);
    sign * mantissa * 2f64.powi(i32::from(exponent) - 16383)
}

/// Clamp a decoded rate into the plausible band, falling back to
/// [`DEFAULT_SAMPLE_RATE`].
pub fn normalize_sample_rate(raw: f64) -> u32 {
    if raw.is_finite() && (MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&raw) {
        raw.round() as u32
    } else {
        DEFAULT_SAMPLE_RATE
    }
}

// ---------------------------------------------------------------------------
// Header parsing
// ---------------------------------------------------------------------------

/// WAV `block_align` and `byte_rate` for a format, or `None` when either
/// does not fit its header field.
fn wav_frame_layout(channels: u16, bits_per_sample: u16, sample_rate: u32) -> Option<(u16, u32)> {
    let width = u32::from(bits_per_sample).div_ceil(8);
    let block_align = u16::try_from(width.checked_mul(u32::from(channels))?).ok()?;
    let byte_rate = sample_rate.checked_mul(u32::from(block_align))?;
    Some((block_align, byte_rate))
}

struct CommonChunk {
    channels: u16,
    frames: u32,
    bits_per_sample: u16,
    raw_rate: f64,
    compression_tag: Option<[u8; 4]>,
}

struct SoundChunk {
    data_offset: u64,
    declared_len: u64,
}

fn read_at<R: Read + Seek>(reader: &mut R, pos: u64, buf: &mut [u8]) -> Result<(), DecodeError> {
    reader.seek(SeekFrom::Start(pos))?;
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            format_err(format!("truncated chunk at byte {pos}"))
        } else {
            DecodeError::Io(e)
        }
    })
}

fn read_common<R: Read + Seek>(
    reader: &mut R,
    start: u64,
    size: u32,
    is_aifc: bool,
) -> Result<CommonChunk, DecodeError> {
    if size < COMM_MIN_LEN {
        return Err(format_err(format!("COMM chunk too short ({size} bytes)")));
    }
    let mut comm = vec![0u8; size.min(COMM_READ_LIMIT) as usize];
    read_at(reader, start, &mut comm)?;

    let mut rate = [0u8; 10];
    rate.copy_from_slice(&comm[8..18]);

    let compression_tag = if is_aifc && size >= COMM_AIFC_MIN_LEN {
        let mut tag = [0u8; 4];
        tag.copy_from_slice(&comm[18..22]);
        Some(tag)
    } else {
        None
    };

    Ok(CommonChunk {
        channels: u16::from_be_bytes([comm[0], comm[1]]),
        frames: u32::from_be_bytes([comm[2], comm[3], comm[4], comm[5]]),
        bits_per_sample: u16::from_be_bytes([comm[6], comm[7]]),
        raw_rate: decode_extended(&rate),
        compression_tag,
    })
}

fn read_sound<R: Read + Seek>(
    reader: &mut R,
    start: u64,
    size: u32,
) -> Result<SoundChunk, DecodeError> {
    let mut sub = [0u8; 8];
    read_at(reader, start, &mut sub)?;
    let offset = u64::from(u32::from_be_bytes([sub[0], sub[1], sub[2], sub[3]]));
    Ok(SoundChunk {
        data_offset: start + SSND_SUBHEADER_LEN + offset,
        declared_len: u64::from(size).saturating_sub(SSND_SUBHEADER_LEN + offset),
    })
}

/// Walk the container and describe its sample stream.
///
/// Fails with [`DecodeError::Format`] for a bad signature or form type, a
/// missing `COMM`/`SSND` chunk, or zero channels/frames/bit depth, and with
/// [`DecodeError::UnsupportedCompression`] for any tag other than `NONE` or
/// `sowt`.
pub fn parse_header<R: Read + Seek>(reader: &mut R) -> Result<AudioStreamDescriptor, DecodeError> {
    let file_len = reader.seek(SeekFrom::End(0))?;
    if file_len < 12 {
        return Err(format_err("file too short for a FORM header"));
    }

    let mut head = [0u8; 12];
    read_at(reader, 0, &mut head)?;
    if &head[0..4] != b"FORM" {
        return Err(format_err("missing FORM signature"));
    }
    let is_aifc = match &head[8..12] {
        b"AIFF" => false,
        b"AIFC" => true,
        other => {
            return Err(format_err(format!(
                "unsupported form type '{}'",
                String::from_utf8_lossy(other)
            )))
        }
    };

    let mut common: Option<CommonChunk> = None;
    let mut sound: Option<SoundChunk> = None;
    let mut pos: u64 = 12;

    while pos + 8 <= file_len {
        let mut chunk_head = [0u8; 8];
        read_at(reader, pos, &mut chunk_head)?;
        let size = u32::from_be_bytes([chunk_head[4], chunk_head[5], chunk_head[6], chunk_head[7]]);
        let start = pos + 8;

        match &chunk_head[0..4] {
            b"COMM" => common = Some(read_common(reader, start, size, is_aifc)?),
            b"SSND" => sound = Some(read_sound(reader, start, size)?),
            _ => {}
        }

        pos = start + u64::from(size) + u64::from(size % 2);
        if common.is_some() && sound.is_some() {
            break;
        }
    }

    let common = common.ok_or_else(|| format_err("missing COMM chunk"))?;
    let sound = sound.ok_or_else(|| format_err("missing SSND chunk"))?;

    if common.channels == 0 || common.frames == 0 || common.bits_per_sample == 0 {
        return Err(format_err(format!(
            "empty stream (channels={}, frames={}, bits={})",
            common.channels, common.frames, common.bits_per_sample
        )));
    }
    if common.bits_per_sample > 32 {
        return Err(format_err(format!(
            "unsupported sample size {} bits",
            common.bits_per_sample
        )));
    }

    let sample_rate = normalize_sample_rate(common.raw_rate);
    let (block_align, byte_rate) =
        wav_frame_layout(common.channels, common.bits_per_sample, sample_rate).ok_or_else(|| {
            format_err(format!(
                "{} channels of {} bits at {sample_rate} Hz exceed WAV header limits",
                common.channels, common.bits_per_sample
            ))
        })?;

    let compression = match &common.compression_tag {
        Some(tag) => Compression::from_tag(tag)?,
        None => Compression::None,
    };

    let width = u64::from(common.bits_per_sample).div_ceil(8);
    let computed_len = u64::from(common.frames) * u64::from(common.channels) * width;
    let nominal_len = if sound.declared_len > 0 {
        sound.declared_len
    } else {
        computed_len
    };
    let available = file_len.saturating_sub(sound.data_offset);

    Ok(AudioStreamDescriptor {
        channels: common.channels,
        frames: common.frames,
        bits_per_sample: common.bits_per_sample,
        sample_rate,
        compression,
        data_offset: sound.data_offset,
        data_len: nominal_len.min(available),
        block_align,
        byte_rate,
    })
}

// ---------------------------------------------------------------------------
// Streaming conversion
// ---------------------------------------------------------------------------

/// Reorders sample bytes across arbitrary chunk boundaries.
///
/// Bytes of a sample split between two chunks are held back and prefixed
/// onto the next chunk, so only whole samples are ever emitted.
struct SampleSwapper {
    width: usize,
    swap: bool,
    carry: Vec<u8>,
}

impl SampleSwapper {
    fn new(width: usize, compression: Compression) -> Self {
        Self {
            width,
            swap: compression == Compression::None && width > 1,
            carry: Vec::with_capacity(width),
        }
    }

    fn feed(&mut self, chunk: &[u8], out: &mut Vec<u8>) {
        out.clear();
        out.append(&mut self.carry);
        out.extend_from_slice(chunk);

        let aligned = out.len() - out.len() % self.width;
        self.carry.extend_from_slice(&out[aligned..]);
        out.truncate(aligned);

        if self.swap {
            for sample in out.chunks_exact_mut(self.width) {
                sample.reverse();
            }
        }
    }
}

/// Write the canonical 44-byte linear-PCM header for `desc`.
pub fn write_wav_header<W: Write>(
    desc: &AudioStreamDescriptor,
    data_len: u32,
    writer: &mut W,
) -> io::Result<()> {
    let mut header = [0u8; WAV_HEADER_LEN];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&data_len.saturating_add(36).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes());
    header[22..24].copy_from_slice(&desc.channels.to_le_bytes());
    header[24..28].copy_from_slice(&desc.sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&desc.byte_rate().to_le_bytes());
    header[32..34].copy_from_slice(&desc.block_align().to_le_bytes());
    header[34..36].copy_from_slice(&desc.bits_per_sample.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_len.to_le_bytes());
    writer.write_all(&header)
}

/// Write a WAV header followed by the little-endian sample payload.
///
/// Returns the number of payload bytes written.
pub fn stream_convert<R: Read + Seek, W: Write>(
    desc: &AudioStreamDescriptor,
    reader: &mut R,
    writer: &mut W,
) -> Result<u64, DecodeError> {
    stream_convert_chunked(desc, reader, writer, STREAM_CHUNK_SIZE)
}

fn stream_convert_chunked<R: Read + Seek, W: Write>(
    desc: &AudioStreamDescriptor,
    reader: &mut R,
    writer: &mut W,
    chunk_size: usize,
) -> Result<u64, DecodeError> {
    let total = desc.aligned_data_len();
    let header_len = u32::try_from(total)
        .map_err(|_| format_err(format!("payload of {total} bytes exceeds WAV limits")))?;
    write_wav_header(desc, header_len, writer)?;

    reader.seek(SeekFrom::Start(desc.data_offset))?;
    let mut swapper = SampleSwapper::new(desc.bytes_per_sample(), desc.compression);
    let mut buf = vec![0u8; chunk_size];
    let mut out = Vec::with_capacity(chunk_size + 4);
    let mut remaining = total;
    let mut written = 0u64;

    while remaining > 0 {
        let to_read = remaining.min(chunk_size as u64) as usize;
        let n = reader.read(&mut buf[..to_read])?;
        if n == 0 {
            return Err(DecodeError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("sample data ended {remaining} bytes early"),
            )));
        }
        remaining -= n as u64;

        swapper.feed(&buf[..n], &mut out);
        writer.write_all(&out)?;
        written += out.len() as u64;
    }

    Ok(written)
}

// ---------------------------------------------------------------------------
// File-level API
// ---------------------------------------------------------------------------

/// Whether `path` carries a legacy container extension (`.aif` / `.aiff`).
pub fn is_legacy_container(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("aif") || e.eq_ignore_ascii_case("aiff"))
        .unwrap_or(false)
}

/// Convert `src` to a WAV file at `dest`, blocking.
///
/// `dest` is only created once the header has been validated; a failure
/// while streaming removes the partial file.
pub fn convert_file(src: &Path, dest: &Path) -> Result<AudioStreamDescriptor, DecodeError> {
    let mut reader = File::open(src)?;
    let desc = parse_header(&mut reader)?;
    tracing::debug!(
        src = %src.display(),
        channels = desc.channels,
        frames = desc.frames,
        bits = desc.bits_per_sample,
        sample_rate = desc.sample_rate,
        compression = ?desc.compression,
        data_len = desc.data_len,
        "Parsed AIFF header",
    );

    let result = File::create(dest).map_err(DecodeError::from).and_then(|file| {
        let mut writer = BufWriter::new(file);
        let written = stream_convert(&desc, &mut reader, &mut writer)?;
        writer.flush()?;
        Ok(written)
    });

    match result {
        Ok(written) => {
            tracing::debug!(dest = %dest.display(), bytes = written, "AIFF converted to WAV");
            Ok(desc)
        }
        Err(e) => {
            let _ = std::fs::remove_file(dest);
            Err(e)
        }
    }
}

/// Convert `src` to a WAV file at `dest` on the blocking thread pool.
pub async fn convert_aiff_to_wav(src: &Path, dest: &Path) -> Result<AudioStreamDescriptor, DecodeError> {
    let src = src.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || convert_file(&src, &dest))
        .await
        .map_err(|e| DecodeError::Io(io::Error::other(e)))?
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use assert_matches::assert_matches;

    use super::*;

    /// Encode an integer rate as an 80-bit extended float.
    fn extended(rate: u32) -> [u8; 10] {
        let msb = 31 - rate.leading_zeros();
        let exponent = 16383 + msb as u16;
        let mantissa = u64::from(rate) << (63 - msb);
        let mut out = [0u8; 10];
        out[0..2].copy_from_slice(&exponent.to_be_bytes());
        out[2..10].copy_from_slice(&mantissa.to_be_bytes());
        out
    }

    fn chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(id);
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(body);
        if body.len() % 2 == 1 {
            out.push(0);
        }
        out
    }

    fn comm(channels: u16, frames: u32, bits: u16, rate: [u8; 10], tag: Option<&[u8; 4]>) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&channels.to_be_bytes());
        body.extend_from_slice(&frames.to_be_bytes());
        body.extend_from_slice(&bits.to_be_bytes());
        body.extend_from_slice(&rate);
        if let Some(tag) = tag {
            body.extend_from_slice(tag);
            body.extend_from_slice(&[0, 0]);
        }
        chunk(b"COMM", &body)
    }

    fn ssnd(samples: &[u8]) -> Vec<u8> {
        let mut body = vec![0u8; 8];
        body.extend_from_slice(samples);
        chunk(b"SSND", &body)
    }

    fn container(form: &[u8; 4], chunks: &[Vec<u8>]) -> Vec<u8> {
        let body_len: usize = 4 + chunks.iter().map(Vec::len).sum::<usize>();
        let mut out = Vec::new();
        out.extend_from_slice(b"FORM");
        out.extend_from_slice(&(body_len as u32).to_be_bytes());
        out.extend_from_slice(form);
        for c in chunks {
            out.extend_from_slice(c);
        }
        out
    }

    /// Pull the `data` payload back out of a canonical WAV file.
    fn wav_payload(wav: &[u8]) -> &[u8] {
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[36..40], b"data");
        let len = u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]) as usize;
        &wav[WAV_HEADER_LEN..WAV_HEADER_LEN + len]
    }

    fn convert(bytes: Vec<u8>) -> Result<(AudioStreamDescriptor, Vec<u8>), DecodeError> {
        let mut reader = Cursor::new(bytes);
        let desc = parse_header(&mut reader)?;
        let mut out = Vec::new();
        stream_convert(&desc, &mut reader, &mut out)?;
        Ok((desc, out))
    }

    // -- extended float --

    #[test]
    fn decodes_common_sample_rates() {
        let rate_44k1 = [0x40, 0x0E, 0xAC, 0x44, 0, 0, 0, 0, 0, 0];
        assert_eq!(decode_extended(&rate_44k1), 44_100.0);
        assert_eq!(decode_extended(&extended(48_000)), 48_000.0);
        assert_eq!(decode_extended(&extended(8_000)), 8_000.0);
    }

    #[test]
    fn decodes_zero_and_infinity() {
        assert_eq!(decode_extended(&[0; 10]), 0.0);
        let mut inf = [0u8; 10];
        inf[0] = 0xFF;
        inf[1] = 0xFF;
        assert_eq!(decode_extended(&inf), f64::NEG_INFINITY);
    }

    #[test]
    fn implausible_rates_fall_back_to_default() {
        assert_eq!(normalize_sample_rate(f64::INFINITY), DEFAULT_SAMPLE_RATE);
        assert_eq!(normalize_sample_rate(0.0), DEFAULT_SAMPLE_RATE);
        assert_eq!(normalize_sample_rate(1_000_000.0), DEFAULT_SAMPLE_RATE);
        assert_eq!(normalize_sample_rate(22_050.0), 22_050);
    }

    // -- header parsing --

    #[test]
    fn all_ones_exponent_normalizes_to_default_rate() {
        let mut rate = [0u8; 10];
        rate[0] = 0x7F;
        rate[1] = 0xFF;
        rate[2] = 0x80;
        let file = container(b"AIFF", &[comm(1, 2, 16, rate, None), ssnd(&[0, 1, 0, 2])]);
        let desc = parse_header(&mut Cursor::new(file)).expect("parse");
        assert_eq!(desc.sample_rate, DEFAULT_SAMPLE_RATE);
    }

    #[test]
    fn skips_unknown_odd_sized_chunks() {
        let file = container(
            b"AIFF",
            &[
                chunk(b"NAME", b"abc"),
                comm(2, 1, 16, extended(44_100), None),
                ssnd(&[0x12, 0x34, 0x56, 0x78]),
            ],
        );
        let desc = parse_header(&mut Cursor::new(file)).expect("parse");
        assert_eq!(desc.channels, 2);
        assert_eq!(desc.sample_rate, 44_100);
        assert_eq!(desc.data_len, 4);
    }

    #[test]
    fn rejects_bad_signature_and_form_type() {
        let mut file = container(b"AIFF", &[comm(1, 1, 16, extended(44_100), None), ssnd(&[0, 0])]);
        file[0..4].copy_from_slice(b"RIFF");
        assert_matches!(parse_header(&mut Cursor::new(file)), Err(DecodeError::Format(_)));

        let file = container(b"WAVE", &[comm(1, 1, 16, extended(44_100), None), ssnd(&[0, 0])]);
        assert_matches!(
            parse_header(&mut Cursor::new(file)),
            Err(DecodeError::Format(msg)) if msg.contains("form type")
        );
    }

    #[test]
    fn missing_comm_chunk_is_a_format_error() {
        let file = container(b"AIFF", &[ssnd(&[0, 1, 0, 2])]);
        assert_matches!(
            parse_header(&mut Cursor::new(file)),
            Err(DecodeError::Format(msg)) if msg.contains("COMM")
        );
    }

    #[test]
    fn zero_channel_count_is_a_format_error() {
        let file = container(b"AIFF", &[comm(0, 2, 16, extended(44_100), None), ssnd(&[0, 1])]);
        assert_matches!(parse_header(&mut Cursor::new(file)), Err(DecodeError::Format(_)));
    }

    #[test]
    fn block_align_overflow_is_a_format_error() {
        // 20000 channels * 4 bytes does not fit the u16 block_align field.
        let file = container(b"AIFF", &[comm(20_000, 1, 32, extended(44_100), None), ssnd(&[0; 8])]);
        assert_matches!(
            parse_header(&mut Cursor::new(file)),
            Err(DecodeError::Format(msg)) if msg.contains("exceed WAV header limits")
        );
    }

    #[test]
    fn byte_rate_overflow_is_a_format_error() {
        // block_align 8000 fits, 768 kHz * 8000 does not fit u32.
        let file = container(b"AIFF", &[comm(2_000, 1, 32, extended(768_000), None), ssnd(&[0; 8])]);
        assert_matches!(
            parse_header(&mut Cursor::new(file)),
            Err(DecodeError::Format(msg)) if msg.contains("768000 Hz")
        );
    }

    #[test]
    fn largest_layouts_that_fit_still_parse() {
        let file = container(b"AIFF", &[comm(16_383, 1, 32, extended(8_000), None), ssnd(&[0; 8])]);
        let desc = parse_header(&mut Cursor::new(file)).expect("parse");
        assert_eq!(desc.block_align(), 65_532);
        assert_eq!(desc.byte_rate(), 8_000 * 65_532);
    }

    #[test]
    fn unsupported_compression_is_rejected() {
        let file = container(
            b"AIFC",
            &[comm(1, 2, 16, extended(44_100), Some(b"ulaw")), ssnd(&[0, 1, 0, 2])],
        );
        assert_matches!(
            parse_header(&mut Cursor::new(file)),
            Err(DecodeError::UnsupportedCompression(tag)) if tag == "ulaw"
        );
    }

    #[test]
    fn truncated_payload_is_clamped_to_file_size() {
        let mut file = container(b"AIFF", &[comm(1, 100, 16, extended(44_100), None), ssnd(&[0; 200])]);
        file.truncate(file.len() - 150);
        let desc = parse_header(&mut Cursor::new(file)).expect("parse");
        assert_eq!(desc.data_len, 50);
        assert_eq!(desc.aligned_data_len(), 50);
    }

    #[test]
    fn empty_sound_chunk_size_falls_back_to_frame_math() {
        // SSND declares only its sub-header, samples follow anyway.
        let mut body = container(b"AIFF", &[comm(2, 3, 16, extended(44_100), None)]);
        body.extend_from_slice(b"SSND");
        body.extend_from_slice(&8u32.to_be_bytes());
        body.extend_from_slice(&[0u8; 8]);
        body.extend_from_slice(&[7u8; 12]);
        let desc = parse_header(&mut Cursor::new(body)).expect("parse");
        assert_eq!(desc.data_len, 12);
    }

    // -- conversion --

    #[test]
    fn big_endian_16_bit_round_trips_through_wav() {
        let samples: Vec<u8> = (0u8..64).collect();
        let file = container(b"AIFF", &[comm(2, 16, 16, extended(44_100), None), ssnd(&samples)]);
        let (desc, wav) = convert(file).expect("convert");

        assert_eq!(wav.len(), WAV_HEADER_LEN + samples.len());
        assert_eq!(u16::from_le_bytes([wav[20], wav[21]]), 1);
        assert_eq!(u16::from_le_bytes([wav[22], wav[23]]), 2);
        assert_eq!(u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]), 44_100);
        assert_eq!(u32::from_le_bytes([wav[28], wav[29], wav[30], wav[31]]), 44_100 * 4);
        assert_eq!(u16::from_le_bytes([wav[32], wav[33]]), desc.block_align());
        assert_eq!(u16::from_le_bytes([wav[34], wav[35]]), 16);

        let mut back = wav_payload(&wav).to_vec();
        for sample in back.chunks_exact_mut(2) {
            sample.reverse();
        }
        assert_eq!(back, samples);
    }

    #[test]
    fn little_endian_samples_pass_through_unchanged() {
        let samples: Vec<u8> = (10u8..30).collect();
        let file = container(
            b"AIFC",
            &[comm(1, 10, 16, extended(48_000), Some(b"sowt")), ssnd(&samples)],
        );
        let (desc, wav) = convert(file).expect("convert");
        assert_eq!(desc.compression, Compression::LittleEndian);
        assert_eq!(wav_payload(&wav), samples.as_slice());
    }

    #[test]
    fn carries_partial_samples_across_chunk_boundaries() {
        let samples: Vec<u8> = (0..=255u8).cycle().take(3 * 101).collect();
        let file = container(b"AIFF", &[comm(1, 101, 24, extended(44_100), None), ssnd(&samples)]);

        let mut reader = Cursor::new(file);
        let desc = parse_header(&mut reader).expect("parse");
        let mut small = Vec::new();
        stream_convert_chunked(&desc, &mut reader, &mut small, 7).expect("convert");
        let mut large = Vec::new();
        stream_convert(&desc, &mut reader, &mut large).expect("convert");

        assert_eq!(small, large);
        let payload = wav_payload(&small);
        for (out, src) in payload.chunks_exact(3).zip(samples.chunks_exact(3)) {
            assert_eq!(out, [src[2], src[1], src[0]]);
        }
    }

    #[test]
    fn trailing_partial_sample_is_dropped() {
        let file = container(b"AIFF", &[comm(1, 3, 16, extended(44_100), None), ssnd(&[1, 2, 3, 4, 5])]);
        let (desc, wav) = convert(file).expect("convert");
        assert_eq!(desc.data_len, 5);
        assert_eq!(wav_payload(&wav), [2, 1, 4, 3]);
        assert_eq!(wav.len(), WAV_HEADER_LEN + 4);
    }

    #[test]
    fn convert_file_writes_nothing_when_comm_is_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("broken.aiff");
        let dest = dir.path().join("broken.wav");
        std::fs::write(&src, container(b"AIFF", &[ssnd(&[0, 1, 0, 2])])).expect("write");

        assert_matches!(convert_file(&src, &dest), Err(DecodeError::Format(_)));
        assert!(!dest.exists());
    }

    #[test]
    fn convert_file_writes_nothing_for_unsupported_compression() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("alaw.aifc");
        let dest = dir.path().join("alaw.wav");
        let file = container(
            b"AIFC",
            &[comm(1, 2, 16, extended(44_100), Some(b"alaw")), ssnd(&[0, 1, 0, 2])],
        );
        std::fs::write(&src, file).expect("write");

        assert_matches!(
            convert_file(&src, &dest),
            Err(DecodeError::UnsupportedCompression(_))
        );
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn async_conversion_produces_wav_on_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("voice.aiff");
        let dest = dir.path().join("voice.wav");
        std::fs::write(
            &src,
            container(b"AIFF", &[comm(1, 2, 16, extended(22_050), None), ssnd(&[0x01, 0x02, 0x03, 0x04])]),
        )
        .expect("write");

        let desc = convert_aiff_to_wav(&src, &dest).await.expect("convert");
        assert_eq!(desc.sample_rate, 22_050);
        let wav = std::fs::read(&dest).expect("read");
        assert_eq!(wav_payload(&wav), [0x02, 0x01, 0x04, 0x03]);
    }

    #[test]
    fn legacy_extension_detection_is_case_insensitive() {
        assert!(is_legacy_container(Path::new("/a/voice.AIFF")));
        assert!(is_legacy_container(Path::new("/a/voice.aif")));
        assert!(!is_legacy_container(Path::new("/a/voice.wav")));
        assert!(!is_legacy_container(Path::new("/a/voice")));
    }
}

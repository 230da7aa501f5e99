//! Out-of-band encodings.
//!
//! A signed request becomes a scannable-code payload:
//! `{app identifier}://R/{base36(signed request bytes)}`. The base-36 text
//! stays inside the 2-D code alphanumeric charset (digits and uppercase
//! letters), so the external encoder packs the identifier prefix as a byte
//! segment and the tail as a dense alphanumeric segment.
//!
//! An encrypted response that has to travel by file or clipboard instead of
//! a live channel becomes a lowercase hex string.

use qrcode::render::svg;
use qrcode::{Color, QrCode};

use crate::errors::ProofkitError;
use crate::Result;

const REQUEST_ROUTE: &str = "://R/";
const LEGACY_INTENT_ROUTE: &str = "://I/";
const BASE36_ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Base-36 text length for a byte buffer: `ceil(len * ln 256 / ln 36)`.
pub fn base36_encoded_len(byte_len: usize) -> usize {
    (byte_len as f64 * (256f64).ln() / (36f64).ln()).ceil() as usize
}

/// Byte buffer length for base-36 text: `floor(len * ln 36 / ln 256)`.
///
/// Callers must size buffers with exactly this formula — anything else is
/// off by one byte for some input lengths.
pub fn base36_decoded_len(text_len: usize) -> usize {
    (text_len as f64 * (36f64).ln() / (256f64).ln()).floor() as usize
}

/// Encode bytes as uppercase base-36 text.
///
/// The output width is fixed by the input length, so leading zero bytes
/// survive the round trip as leading `0` digits.
pub fn base36_encode(bytes: &[u8]) -> String {
    let width = base36_encoded_len(bytes.len());
    let mut digits = Vec::with_capacity(width);
    let mut num = bytes.to_vec();
    let mut start = 0;
    while start < num.len() {
        let mut rem: u32 = 0;
        for byte in num.iter_mut().skip(start) {
            let v = (rem << 8) | *byte as u32;
            *byte = (v / 36) as u8;
            rem = v % 36;
        }
        digits.push(BASE36_ALPHABET[rem as usize]);
        while start < num.len() && num[start] == 0 {
            start += 1;
        }
    }
    while digits.len() < width {
        digits.push(b'0');
    }
    digits.reverse();
    String::from_utf8(digits).expect("base36 alphabet is ascii")
}

/// Decode base-36 text (either letter case) back into bytes.
pub fn base36_decode(text: &str) -> Result<Vec<u8>> {
    let width = base36_decoded_len(text.len());
    let mut out = vec![0u8; width];
    for ch in text.chars() {
        let digit = match ch {
            '0'..='9' => ch as u32 - '0' as u32,
            'a'..='z' => ch as u32 - 'a' as u32 + 10,
            'A'..='Z' => ch as u32 - 'A' as u32 + 10,
            other => {
                return Err(ProofkitError::MalformedWireData(format!(
                    "invalid base36 digit {other:?}"
                )))
            }
        };
        let mut carry = digit;
        for byte in out.iter_mut().rev() {
            let v = (*byte as u32) * 36 + carry;
            *byte = (v & 0xff) as u8;
            carry = v >> 8;
        }
        if carry != 0 {
            return Err(ProofkitError::MalformedWireData(
                "base36 value overflows its computed size".into(),
            ));
        }
    }
    Ok(out)
}

/// Margin and scale knobs for rendered codes.
#[derive(Clone, Copy, Debug)]
pub struct RenderConfig {
    /// Pixels per module.
    pub module_size: u32,
    /// Quiet-zone width around the code, in modules.
    pub margin: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            module_size: 8,
            margin: 4,
        }
    }
}

/// An 8-bit luma image, row-major, `width` pixels square.
#[derive(Clone, Debug)]
pub struct RasterImage {
    pub width: usize,
    pub pixels: Vec<u8>,
}

/// A scannable-code payload, renderable as text, vector markup or raster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScannableCode {
    payload: String,
}

impl ScannableCode {
    /// Build the payload for a signed request buffer.
    pub fn for_request(signed_request: &[u8], app_identifier: &str) -> Result<Self> {
        if app_identifier.is_empty() {
            return Err(ProofkitError::validation("app identifier must not be empty"));
        }
        if signed_request.is_empty() {
            return Err(ProofkitError::validation("signed request must not be empty"));
        }
        Ok(Self {
            payload: format!(
                "{app_identifier}{REQUEST_ROUTE}{}",
                base36_encode(signed_request)
            ),
        })
    }

    /// The raw payload string handed to the code encoder.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    fn encode(&self) -> Result<QrCode> {
        QrCode::new(self.payload.as_bytes()).map_err(|e| {
            ProofkitError::validation(format!("payload does not fit a scannable code: {e}"))
        })
    }

    /// Render as a terminal-printable block string.
    pub fn to_text(&self) -> Result<String> {
        let code = self.encode()?;
        Ok(code
            .render::<char>()
            .quiet_zone(false)
            .module_dimensions(2, 1)
            .build())
    }

    /// Render as SVG markup.
    pub fn to_svg(&self, config: &RenderConfig) -> Result<String> {
        let code = self.encode()?;
        Ok(code
            .render::<svg::Color>()
            .quiet_zone(config.margin > 0)
            .module_dimensions(config.module_size, config.module_size)
            .build())
    }

    /// Render as a raster image.
    pub fn to_raster(&self, config: &RenderConfig) -> Result<RasterImage> {
        let code = self.encode()?;
        let side = code.width();
        let modules = code.to_colors();
        let scale = config.module_size.max(1) as usize;
        let margin = config.margin as usize;
        let width = (side + 2 * margin) * scale;

        let mut pixels = vec![0xffu8; width * width];
        for y in 0..side {
            for x in 0..side {
                if modules[y * side + x] == Color::Dark {
                    for dy in 0..scale {
                        let row = ((margin + y) * scale + dy) * width;
                        for dx in 0..scale {
                            pixels[row + (margin + x) * scale + dx] = 0x00;
                        }
                    }
                }
            }
        }
        Ok(RasterImage { width, pixels })
    }
}

/// A decoded scannable payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScannedPayload {
    /// A signed request, as produced by [`ScannableCode::for_request`].
    Request {
        app_identifier: String,
        signed_request: Vec<u8>,
    },
    /// The legacy intent form: public key, request bytes and a detached
    /// signature, dash-separated. Still decoded, no longer produced.
    LegacyIntent {
        app_identifier: String,
        public_key: Vec<u8>,
        request: Vec<u8>,
        signature: Vec<u8>,
    },
}

/// Parse scanned text back into its payload.
pub fn decode_scannable_text(text: &str) -> Result<ScannedPayload> {
    if let Some(pos) = text.find(REQUEST_ROUTE) {
        let tail = &text[pos + REQUEST_ROUTE.len()..];
        return Ok(ScannedPayload::Request {
            app_identifier: text[..pos].to_string(),
            signed_request: base36_decode(tail)?,
        });
    }
    if let Some(pos) = text.find(LEGACY_INTENT_ROUTE) {
        let tail = &text[pos + LEGACY_INTENT_ROUTE.len()..];
        let mut parts = tail.split('-');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(request), Some(signature), None) => {
                return Ok(ScannedPayload::LegacyIntent {
                    app_identifier: text[..pos].to_string(),
                    public_key: base36_decode(key)?,
                    request: base36_decode(request)?,
                    signature: base36_decode(signature)?,
                });
            }
            _ => {
                return Err(ProofkitError::MalformedWireData(
                    "legacy intent payload needs exactly three parts".into(),
                ))
            }
        }
    }
    Err(ProofkitError::MalformedWireData(
        "unrecognized scannable payload".into(),
    ))
}

/// Hex form of an encrypted response for manual (file/clipboard) transfer.
pub fn to_transfer_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Parse a manual-transfer hex string.
pub fn from_transfer_hex(text: &str) -> Result<Vec<u8>> {
    let text = text.trim();
    if text.len() % 2 != 0 {
        return Err(ProofkitError::OddLengthHex);
    }
    hex::decode(text).map_err(|e| ProofkitError::validation(format!("invalid hex: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base36_round_trip_preserves_leading_zeros() {
        for bytes in [
            vec![],
            vec![0u8],
            vec![0, 0, 1],
            vec![255, 255, 255, 255],
            (0u8..64).collect::<Vec<_>>(),
        ] {
            let text = base36_encode(&bytes);
            assert_eq!(text.len(), base36_encoded_len(bytes.len()));
            assert_eq!(base36_decode(&text).unwrap(), bytes, "{text}");
        }
    }

    #[test]
    fn test_base36_known_values() {
        // 255 = 7*36 + 3 -> "73", padded to the 2-char width of one byte.
        assert_eq!(base36_encode(&[255]), "73");
        assert_eq!(base36_encode(&[0]), "00");
        assert_eq!(base36_decode("73").unwrap(), vec![255]);
        // Lowercase input decodes too: 5*36 + 10 = 190.
        assert_eq!(base36_decode("5a").unwrap(), vec![190]);
        assert_eq!(base36_decode("5A").unwrap(), vec![190]);
    }

    #[test]
    fn test_base36_rejects_garbage() {
        assert!(matches!(
            base36_decode("7!"),
            Err(ProofkitError::MalformedWireData(_))
        ));
        // "ZZ" encodes 1295, more than one byte can hold.
        assert!(matches!(
            base36_decode("ZZ"),
            Err(ProofkitError::MalformedWireData(_))
        ));
    }

    #[test]
    fn test_size_formulas() {
        assert_eq!(base36_encoded_len(38), 59);
        assert_eq!(base36_decoded_len(59), 38);
        for len in 0..200 {
            assert_eq!(base36_decoded_len(base36_encoded_len(len)), len);
        }
    }

    #[test]
    fn test_scannable_round_trip() {
        let signed = vec![7u8; 120];
        let code = ScannableCode::for_request(&signed, "proofkit").unwrap();
        assert!(code.payload().starts_with("proofkit://R/"));

        match decode_scannable_text(code.payload()).unwrap() {
            ScannedPayload::Request {
                app_identifier,
                signed_request,
            } => {
                assert_eq!(app_identifier, "proofkit");
                assert_eq!(signed_request, signed);
            }
            other => panic!("wrong payload: {other:?}"),
        }
    }

    #[test]
    fn test_legacy_intent_decodes() {
        let key = [1u8; 32];
        let request = [2u8; 10];
        let signature = [3u8; 64];
        let text = format!(
            "app://I/{}-{}-{}",
            base36_encode(&key),
            base36_encode(&request),
            base36_encode(&signature)
        );

        match decode_scannable_text(&text).unwrap() {
            ScannedPayload::LegacyIntent {
                public_key,
                request: req,
                signature: sig,
                ..
            } => {
                assert_eq!(public_key, key);
                assert_eq!(req, request);
                assert_eq!(sig, signature);
            }
            other => panic!("wrong payload: {other:?}"),
        }
    }

    #[test]
    fn test_unrecognized_payload_rejected() {
        assert!(matches!(
            decode_scannable_text("https://example.com"),
            Err(ProofkitError::MalformedWireData(_))
        ));
    }

    #[test]
    fn test_transfer_hex() {
        let bytes = vec![0xde, 0xad, 0xbe, 0xef];
        let text = to_transfer_hex(&bytes);
        assert_eq!(text, "deadbeef");
        assert_eq!(from_transfer_hex(&text).unwrap(), bytes);

        assert!(matches!(
            from_transfer_hex("abc"),
            Err(ProofkitError::OddLengthHex)
        ));
        assert!(matches!(
            from_transfer_hex("zzzz"),
            Err(ProofkitError::Validation(_))
        ));
    }

    #[test]
    fn test_render_modes() {
        let code = ScannableCode::for_request(&[9u8; 40], "proofkit").unwrap();

        let text = code.to_text().unwrap();
        assert!(!text.is_empty());

        let svg = code.to_svg(&RenderConfig::default()).unwrap();
        assert!(svg.contains("<svg"));

        let raster = code
            .to_raster(&RenderConfig {
                module_size: 2,
                margin: 1,
            })
            .unwrap();
        assert_eq!(raster.pixels.len(), raster.width * raster.width);
        assert!(raster.pixels.contains(&0x00));
        assert!(raster.pixels.contains(&0xff));
    }
}

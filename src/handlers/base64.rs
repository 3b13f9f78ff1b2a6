//! Base64 handler: wraps any payload as base64 text and unwraps it again.
//!
//! This handler accepts any input, so the capability graph connects every
//! known format to `base64` and `bin` through it. It is the catch-all bridge
//! when no format-aware handler links two formats.
//!
//! | input    | output   | effect                          |
//! |----------|----------|---------------------------------|
//! | anything | `base64` | encode, append `.b64`           |
//! | `base64` | `bin`    | decode, strip `.b64`            |
//! | anything | `bin`    | bytes unchanged, `.bin` name    |

use crate::error::HandlerError;
use crate::format::{FileRecord, FormatDescriptor};
use crate::handler::FormatHandler;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};

pub struct Base64Handler;

impl Base64Handler {
    pub const NAME: &'static str = "base64";
}

#[async_trait]
impl FormatHandler for Base64Handler {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn supports_any_input(&self) -> bool {
        true
    }

    async fn init(&self) -> Result<Vec<FormatDescriptor>, HandlerError> {
        Ok(vec![
            FormatDescriptor::new("Base64 Text", "base64", "b64", "text/x-base64")
                .readable()
                .writable()
                .lossless(true),
            FormatDescriptor::new("Raw Bytes", "bin", "bin", "application/octet-stream")
                .writable()
                .lossless(true),
        ])
    }

    async fn convert(
        &self,
        files: Vec<FileRecord>,
        input: &FormatDescriptor,
        output: &FormatDescriptor,
        _args: Option<&[String]>,
    ) -> Result<Vec<FileRecord>, HandlerError> {
        let is_b64 = |d: &FormatDescriptor| d.format == "base64";

        match (is_b64(input), output.format.as_str()) {
            (false, "base64") => Ok(files
                .into_iter()
                .map(|f| FileRecord::new(format!("{}.b64", f.name), STANDARD.encode(&f.bytes)))
                .collect()),
            (true, "bin") => files
                .into_iter()
                .map(|f| -> Result<FileRecord, HandlerError> {
                    let text: Vec<u8> = f
                        .bytes
                        .iter()
                        .copied()
                        .filter(|b| !b.is_ascii_whitespace())
                        .collect();
                    let bytes = STANDARD
                        .decode(&text)
                        .map_err(|e| HandlerError::Decode(format!("{}: {e}", f.name)))?;
                    let name = match f.name.strip_suffix(".b64") {
                        Some(stem) if !stem.is_empty() => stem.to_string(),
                        _ => f.renamed_with_extension("bin"),
                    };
                    Ok(FileRecord::new(name, bytes))
                })
                .collect(),
            (false, "bin") => Ok(files
                .into_iter()
                .map(|f| FileRecord::new(f.renamed_with_extension("bin"), f.bytes))
                .collect()),
            _ => Err(HandlerError::Unsupported {
                from: input.format.clone(),
                to: output.format.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png() -> FormatDescriptor {
        FormatDescriptor::new("PNG", "png", "png", "image/png").readable()
    }

    async fn declared(code: &str) -> FormatDescriptor {
        Base64Handler
            .init()
            .await
            .unwrap()
            .into_iter()
            .find(|d| d.format == code)
            .unwrap()
    }

    #[tokio::test]
    async fn encode_then_decode_restores_name_and_bytes() {
        let b64 = declared("base64").await;
        let bin = declared("bin").await;
        let original = FileRecord::new("dot.png", vec![0x89, b'P', b'N', b'G']);

        let encoded = Base64Handler
            .convert(vec![original.clone()], &png(), &b64, None)
            .await
            .unwrap();
        assert_eq!(encoded[0].name, "dot.png.b64");
        assert_eq!(encoded[0].bytes, b"iVBORw==");

        let decoded = Base64Handler
            .convert(encoded, &b64, &bin, None)
            .await
            .unwrap();
        assert_eq!(decoded[0], original);
    }

    #[tokio::test]
    async fn decode_ignores_line_breaks() {
        let b64 = declared("base64").await;
        let bin = declared("bin").await;
        let out = Base64Handler
            .convert(vec![FileRecord::new("x", b"aGVs\nbG8=\n".to_vec())], &b64, &bin, None)
            .await
            .unwrap();
        assert_eq!(out[0].bytes, b"hello");
        assert_eq!(out[0].name, "x.bin");
    }

    #[tokio::test]
    async fn invalid_base64_is_a_decode_error() {
        let b64 = declared("base64").await;
        let bin = declared("bin").await;
        let err = Base64Handler
            .convert(vec![FileRecord::new("x.b64", b"!!!".to_vec())], &b64, &bin, None)
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Decode(_)));
    }

    #[tokio::test]
    async fn base64_to_base64_is_unsupported() {
        let b64 = declared("base64").await;
        let err = Base64Handler
            .convert(vec![FileRecord::new("x.b64", b"aA==".to_vec())], &b64, &b64, None)
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Unsupported { .. }));
    }
}
